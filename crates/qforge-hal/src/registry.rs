//! Provider registry.
//!
//! The [`ProviderRegistry`] is built once at startup and handed to every
//! component that needs capability data. It is read-only after
//! construction in practice; `register` exists so tests and embedders can
//! add their own providers before sharing it.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::capability::ProviderCapability;
use crate::error::{HalError, HalResult};

/// Name-keyed collection of provider capabilities.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: FxHashMap<String, Arc<ProviderCapability>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in providers `A`, `B` and `C`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for cap in [
            ProviderCapability::provider_a(),
            ProviderCapability::provider_b(),
            ProviderCapability::provider_c(),
        ] {
            let name = cap.name.clone();
            registry.providers.insert(name, Arc::new(cap));
        }
        registry
    }

    /// Register a provider. Names must be unique.
    pub fn register(&mut self, capability: ProviderCapability) -> HalResult<()> {
        capability.validate()?;
        if self.providers.contains_key(&capability.name) {
            return Err(HalError::DuplicateProvider(capability.name));
        }
        debug!(provider = %capability.name, qubits = capability.num_qubits, "Registering provider");
        self.providers
            .insert(capability.name.clone(), Arc::new(capability));
        Ok(())
    }

    /// Look up a provider by name.
    pub fn lookup(&self, name: &str) -> HalResult<Arc<ProviderCapability>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| HalError::ProviderNotFound(name.to_string()))
    }

    /// Check if a provider is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Capabilities in name order.
    pub fn capabilities(&self) -> Vec<Arc<ProviderCapability>> {
        let mut caps: Vec<_> = self.providers.values().cloned().collect();
        caps.sort_by(|a, b| a.name.cmp(&b.name));
        caps
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
