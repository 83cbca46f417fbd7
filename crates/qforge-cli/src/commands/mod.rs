//! CLI command implementations.

pub mod batch;
pub mod common;
pub mod estimate;
pub mod mitigate;
pub mod optimize;
pub mod providers;
pub mod suggest;
