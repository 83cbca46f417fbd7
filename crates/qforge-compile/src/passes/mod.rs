//! Built-in optimization passes, one per pipeline stage.

pub mod cancel;
pub mod commute;
pub mod cost;
pub mod layout;
pub mod merge;
pub mod mitigation;
pub mod translation;

pub use cancel::GateCancellation;
pub use commute::CommutationReorder;
pub use cost::CostSubstitution;
pub use layout::GreedyLayout;
pub use merge::SingleQubitMerge;
pub use mitigation::EchoInjection;
pub use translation::NativeTranslation;
