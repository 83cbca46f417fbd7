//! Append-only error analytics.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::details::{ErrorDetails, ErrorKind, Severity};

/// Provider label used for errors that carry none.
pub const UNATTRIBUTED: &str = "unattributed";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LedgerKey {
    kind: ErrorKind,
    provider: Option<String>,
    day: NaiveDate,
}

#[derive(Debug, Default)]
struct LedgerInner {
    entries: Vec<ErrorDetails>,
    index: FxHashMap<LedgerKey, usize>,
}

/// Aggregate view of a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    /// Number of recorded errors.
    pub total: usize,
    /// Counts per kind.
    pub by_kind: BTreeMap<ErrorKind, usize>,
    /// Counts per provider.
    pub by_provider: BTreeMap<String, usize>,
    /// Counts per severity.
    pub by_severity: BTreeMap<Severity, usize>,
}

/// Every error observed by the recovery engine.
///
/// Writers are serialized; readers run concurrently. Entries are never
/// removed or modified.
#[derive(Debug, Default)]
pub struct ErrorLedger {
    inner: RwLock<LedgerInner>,
}

impl ErrorLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty ledger with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(LedgerInner {
                entries: Vec::with_capacity(capacity),
                index: FxHashMap::default(),
            }),
        }
    }

    /// Append `details`.
    pub fn record(&self, details: ErrorDetails) {
        let key = LedgerKey {
            kind: details.kind(),
            provider: details.provider().map(str::to_string),
            day: details.occurred_at().date_naive(),
        };
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *inner.index.entry(key).or_insert(0) += 1;
        inner.entries.push(details);
    }

    /// Errors of `kind` from `provider` recorded on `day`.
    pub fn count(&self, kind: ErrorKind, provider: Option<&str>, day: NaiveDate) -> usize {
        let key = LedgerKey {
            kind,
            provider: provider.map(str::to_string),
            day,
        };
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.index.get(&key).copied().unwrap_or(0)
    }

    /// Errors of `kind` from `provider` recorded at or after `since`.
    pub fn count_since(&self, kind: ErrorKind, provider: Option<&str>, since: DateTime<Utc>) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .iter()
            .filter(|e| e.kind() == kind && e.provider() == provider && e.occurred_at() >= since)
            .count()
    }

    /// Counts per kind.
    pub fn counts_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        self.tally(|e| e.kind())
    }

    /// Counts per provider; errors without one are filed under [`UNATTRIBUTED`].
    pub fn counts_by_provider(&self) -> BTreeMap<String, usize> {
        self.tally(|e| e.provider().unwrap_or(UNATTRIBUTED).to_string())
    }

    /// Counts per severity.
    pub fn counts_by_severity(&self) -> BTreeMap<Severity, usize> {
        self.tally(|e| e.severity())
    }

    fn tally<K: Ord>(&self, key: impl Fn(&ErrorDetails) -> K) -> BTreeMap<K, usize> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BTreeMap::new();
        for entry in &inner.entries {
            *counts.entry(key(entry)).or_insert(0) += 1;
        }
        counts
    }

    /// All three tallies at once.
    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            total: self.len(),
            by_kind: self.counts_by_kind(),
            by_provider: self.counts_by_provider(),
            by_severity: self.counts_by_severity(),
        }
    }

    /// The last `n` errors, newest first.
    pub fn recent(&self, n: usize) -> Vec<ErrorDetails> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.iter().rev().take(n).cloned().collect()
    }

    /// Number of recorded errors.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
