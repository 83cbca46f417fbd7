//! qforge Hardware Abstraction Layer
//!
//! This crate describes the providers qforge can target and the execution
//! seam the scheduler drives.
//!
//! # Overview
//!
//! - [`ProviderCapability`] is a static record per provider: native gates,
//!   [`Topology`], [`NoiseProfile`], [`CostTable`] and [`ErrorCorrectionLevel`]
//! - [`ProviderRegistry`] is the injected name→capability map
//! - [`Backend`] is the async submit/wait trait, with [`SimulatedBackend`]
//!   as the in-process implementation
//!
//! # Built-in Providers
//!
//! | Provider | Qubits | Topology | Error correction | Native gates |
//! |----------|--------|----------|------------------|--------------|
//! | `A` | 32 | fully connected | advanced | x y z rx ry rz rxx |
//! | `B` | 127 | chain + chords | basic | x sx rz cx |
//! | `C` | 1024 | 32x32 grid | logical | x h rx ry rz cz |
//!
//! # Example
//!
//! ```rust
//! use qforge_hal::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_defaults();
//! let b = registry.lookup("B").unwrap();
//! assert!(b.is_native("cx"));
//! assert!(!b.topology.is_connected(0, 5));
//! ```

pub mod backend;
pub mod capability;
pub mod error;
pub mod registry;
pub mod simulated;

pub use backend::{Backend, ExecutionHandle, ExecutionReport, ExecutionRequest};
pub use capability::{
    CostTable, ErrorCorrectionLevel, GateSet, NoiseProfile, ProviderCapability, Topology,
    TopologyKind,
};
pub use error::{HalError, HalResult};
pub use registry::ProviderRegistry;
pub use simulated::{FaultPoint, SimulatedBackend};
