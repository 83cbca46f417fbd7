//! The pass trait.

use qforge_ir::Circuit;

use crate::error::CompileResult;
use crate::property::PropertySet;
use crate::stage::OptimizationStage;

/// A transformation applied to a circuit as one stage of the pipeline.
pub trait Pass: Send + Sync {
    /// Name used in logs and traces.
    fn name(&self) -> &str;

    /// The pipeline stage this pass implements.
    fn stage(&self) -> OptimizationStage;

    /// Rewrite `circuit`, reading and updating `properties`.
    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()>;

    /// Whether the pass applies to this circuit and target.
    fn should_run(&self, _circuit: &Circuit, _properties: &PropertySet) -> bool {
        true
    }
}
