//! qforge Circuit Optimizer
//!
//! Provider-aware circuit transformation built on a pass pipeline. Each
//! stage is a [`Pass`]; the [`PassManager`] runs them in pipeline order and
//! measures what every stage changed.
//!
//! # Pipeline
//!
//! ```text
//! Input Circuit
//!       │
//!       ▼
//! ┌─────────────┐
//! │ PassManager │ ◄── PropertySet (provider, layout, expected fidelity)
//! └─────────────┘
//!       │
//!       ├── GateCancellation      adjacent inverse pairs
//!       ├── SingleQubitMerge      exact 2x2 composition into one U
//!       ├── CommutationReorder    entanglers past disjoint 1q gates
//!       ├── GreedyLayout          placement on sparse topologies
//!       ├── NativeTranslation     lowering into the native gate set
//!       ├── CostSubstitution      strictly cheaper equivalents
//!       └── EchoInjection         echo pairs after noisy gates
//!       │
//!       ▼
//! OptimizationResult (optimized circuit, per-stage and end-to-end impact)
//! ```
//!
//! Only transpilation and error mitigation may add gates.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use qforge_compile::{OptimizationStage, Optimizer, OptimizerConfig};
//! use qforge_hal::ProviderRegistry;
//! use qforge_ir::{Circuit, QubitId};
//!
//! let optimizer = Optimizer::new(
//!     Arc::new(ProviderRegistry::with_defaults()),
//!     OptimizerConfig::default(),
//! );
//!
//! let mut circuit = Circuit::with_size("xx", 1, 0);
//! circuit.x(QubitId(0)).unwrap().x(QubitId(0)).unwrap();
//!
//! let result = optimizer
//!     .optimize(&circuit, "A", Some(&[OptimizationStage::GateCancellation]))
//!     .unwrap();
//! assert!(result.optimized_circuit.instructions().is_empty());
//! assert_eq!(result.impact.gate_reduction_pct, 100.0);
//! ```
//!
//! # Custom Passes
//!
//! ```rust
//! use qforge_compile::{CompileResult, OptimizationStage, Pass, PropertySet};
//! use qforge_ir::Circuit;
//!
//! struct Tag;
//!
//! impl Pass for Tag {
//!     fn name(&self) -> &str { "tag" }
//!     fn stage(&self) -> OptimizationStage { OptimizationStage::CostOptimization }
//!
//!     fn run(&self, _circuit: &mut Circuit, props: &mut PropertySet) -> CompileResult<()> {
//!         props.record("tagged");
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
pub mod manager;
pub mod optimizer;
pub mod pass;
pub mod property;
pub mod result;
pub mod stage;
pub mod unitary;

// Built-in passes
pub mod passes;

pub use error::{CompileError, CompileResult};
pub use manager::PassManager;
pub use optimizer::{Optimizer, OptimizerConfig};
pub use pass::Pass;
pub use property::{Layout, PropertySet};
pub use result::{CircuitMetrics, OptimizationImpact, OptimizationResult, StageImpact};
pub use stage::OptimizationStage;
pub use unitary::Unitary2x2;
