//! Pass manager for orchestrating the pipeline.

use tracing::{debug, info, instrument};

use qforge_ir::Circuit;
use qforge_noise::estimate;

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::passes::{
    CommutationReorder, CostSubstitution, EchoInjection, GateCancellation, GreedyLayout,
    NativeTranslation, SingleQubitMerge,
};
use crate::property::PropertySet;
use crate::result::{CircuitMetrics, StageImpact};
use crate::stage::OptimizationStage;

/// Runs a sequence of passes and records what each one changed.
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create an empty pass manager.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Pass manager running `stages` in pipeline order.
    pub fn for_stages(stages: &[OptimizationStage]) -> Self {
        let mut pm = Self::new();
        for stage in OptimizationStage::normalize(stages) {
            match stage {
                OptimizationStage::GateCancellation => pm.add_pass(GateCancellation),
                OptimizationStage::SingleQubitMerge => pm.add_pass(SingleQubitMerge),
                OptimizationStage::CommutationReorder => pm.add_pass(CommutationReorder),
                OptimizationStage::LayoutMapping => pm.add_pass(GreedyLayout),
                OptimizationStage::Transpilation => pm.add_pass(NativeTranslation::default()),
                OptimizationStage::CostOptimization => pm.add_pass(CostSubstitution),
                OptimizationStage::ErrorMitigation => pm.add_pass(EchoInjection),
            }
        }
        pm
    }

    /// Append a pass.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Run every pass on `circuit`.
    ///
    /// `properties.expected_fidelity` must hold the fidelity of the input;
    /// it is updated after every pass that runs.
    #[instrument(skip_all, fields(provider = %properties.provider.name))]
    pub fn run(
        &self,
        circuit: &mut Circuit,
        properties: &mut PropertySet,
    ) -> CompileResult<Vec<StageImpact>> {
        info!(
            passes = self.passes.len(),
            qubits = circuit.num_qubits(),
            gates = circuit.num_gates(),
            "Running pass manager"
        );

        let mut impacts = Vec::with_capacity(self.passes.len());
        let mut current =
            CircuitMetrics::measure(circuit, &properties.provider, properties.expected_fidelity);

        for pass in &self.passes {
            if !pass.should_run(circuit, properties) {
                debug!(pass = pass.name(), "Skipping pass");
                impacts.push(StageImpact {
                    stage: pass.stage(),
                    pass: pass.name().to_string(),
                    ran: false,
                    before: current,
                    after: current,
                });
                continue;
            }

            debug!(pass = pass.name(), "Running pass");
            pass.run(circuit, properties)?;

            let fidelity = properties
                .modeled_fidelity
                .take()
                .unwrap_or_else(|| estimate(circuit, &properties.provider).overall_fidelity);
            properties.expected_fidelity = fidelity;
            let after = CircuitMetrics::measure(circuit, &properties.provider, fidelity);

            debug!(
                pass = pass.name(),
                gates = after.gates,
                depth = after.depth,
                fidelity,
                "Pass completed"
            );
            impacts.push(StageImpact {
                stage: pass.stage(),
                pass: pass.name().to_string(),
                ran: true,
                before: current,
                after,
            });
            current = after;
        }

        info!(
            gates = current.gates,
            depth = current.depth,
            fidelity = current.fidelity,
            "Pass manager completed"
        );
        Ok(impacts)
    }

    /// Number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether there are no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Stages in run order.
    pub fn stages(&self) -> Vec<OptimizationStage> {
        self.passes.iter().map(|p| p.stage()).collect()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::for_stages(&OptimizationStage::ALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use qforge_hal::ProviderCapability;
    use qforge_ir::QubitId;

    fn props(cap: ProviderCapability, circuit: &Circuit) -> PropertySet {
        let cap = Arc::new(cap);
        let mut props = PropertySet::new(cap.clone());
        props.expected_fidelity = estimate(circuit, &cap).overall_fidelity;
        props
    }

    #[test]
    fn test_default_has_every_stage() {
        let pm = PassManager::default();
        assert_eq!(pm.len(), 7);
        assert_eq!(pm.stages(), OptimizationStage::ALL.to_vec());
    }

    #[test]
    fn test_for_stages_orders() {
        let pm = PassManager::for_stages(&[
            OptimizationStage::Transpilation,
            OptimizationStage::GateCancellation,
        ]);
        assert_eq!(pm.stages(), OptimizationStage::CONSERVATIVE.to_vec());
    }

    #[test]
    fn test_impacts_chain() {
        let mut circuit = Circuit::with_size("t", 2, 0);
        circuit.x(QubitId(0)).unwrap();
        circuit.x(QubitId(0)).unwrap();
        circuit.h(QubitId(1)).unwrap();
        let mut p = props(ProviderCapability::provider_b(), &circuit);
        let impacts = PassManager::for_stages(&OptimizationStage::CONSERVATIVE)
            .run(&mut circuit, &mut p)
            .unwrap();
        assert_eq!(impacts.len(), 2);
        assert_eq!(impacts[0].before.gates, 3);
        assert_eq!(impacts[0].after.gates, 1);
        assert_eq!(impacts[1].before, impacts[0].after);
        assert!(circuit.instructions().iter().all(|i| {
            i.as_gate().is_some_and(|g| p.is_native(g.name()))
        }));
    }

    #[test]
    fn test_skipped_pass_recorded() {
        let mut circuit = Circuit::bell().unwrap();
        let mut p = props(ProviderCapability::provider_a(), &circuit);
        let impacts = PassManager::for_stages(&[OptimizationStage::LayoutMapping])
            .run(&mut circuit, &mut p)
            .unwrap();
        assert!(!impacts[0].ran);
        assert_eq!(impacts[0].before, impacts[0].after);
    }
}
