//! Gate-count invariants of the pipeline stages.

use std::sync::Arc;

use proptest::prelude::*;

use qforge_compile::{OptimizationStage, Optimizer, OptimizerConfig};
use qforge_hal::ProviderRegistry;
use qforge_ir::{Circuit, ClbitId, QubitId, StandardGate};

fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (2u32..=8).prop_flat_map(|n| {
        let op = (0u8..9, 0..n, 0..n, -3.0f64..3.0);
        prop::collection::vec(op, 0..50).prop_map(move |ops| {
            let mut c = Circuit::with_size("prop", n, n);
            for (kind, a, b, theta) in ops {
                let (qa, qb) = (QubitId(a), QubitId(b));
                let _ = match kind {
                    0 => c.apply(StandardGate::H, [qa]),
                    1 => c.apply(StandardGate::X, [qa]),
                    2 => c.apply(StandardGate::Rz(theta), [qa]),
                    3 => c.apply(StandardGate::S, [qa]),
                    4 if a != b => c.apply(StandardGate::CX, [qa, qb]),
                    5 if a != b => c.apply(StandardGate::CZ, [qa, qb]),
                    6 => c.measure(qa, ClbitId(a)),
                    7 => c.apply(StandardGate::Sdg, [qa]),
                    _ => c.apply(StandardGate::T, [qa]),
                };
            }
            c
        })
    })
}

fn optimizer() -> Optimizer {
    Optimizer::new(
        Arc::new(ProviderRegistry::with_defaults()),
        OptimizerConfig::default(),
    )
}

proptest! {
    #[test]
    fn only_growing_stages_add_gates(circuit in arb_circuit()) {
        let opt = optimizer();
        for provider in ["A", "B", "C"] {
            let result = opt.optimize(&circuit, provider, None).unwrap();
            for stage in &result.stage_impacts {
                if !stage.stage.may_grow() {
                    prop_assert!(stage.gate_delta() <= 0, "{:?} grew on {}", stage.stage, provider);
                }
            }
            let cancel = result.stage(OptimizationStage::GateCancellation).unwrap();
            prop_assert!(cancel.after.gates <= cancel.before.gates);
            let mitigation = result.stage(OptimizationStage::ErrorMitigation).unwrap();
            prop_assert!(mitigation.after.gates >= mitigation.before.gates);
            prop_assert!(mitigation.after.fidelity >= mitigation.before.fidelity);
        }
    }

    #[test]
    fn stage_impacts_chain(circuit in arb_circuit()) {
        let result = optimizer().optimize(&circuit, "B", None).unwrap();
        for pair in result.stage_impacts.windows(2) {
            prop_assert_eq!(pair[0].after, pair[1].before);
        }
        let first = &result.stage_impacts[0];
        prop_assert_eq!(first.before.gates, circuit.num_gates());
        prop_assert!(result.expected_fidelity > 0.0 && result.expected_fidelity <= 1.0);
    }

    #[test]
    fn measurements_are_kept(circuit in arb_circuit()) {
        let result = optimizer().optimize(&circuit, "C", None).unwrap();
        prop_assert_eq!(
            result.optimized_circuit.measurement_count(),
            circuit.measurement_count()
        );
    }
}

#[test]
fn test_cancellation_scenario() {
    let mut c = Circuit::with_size("xx", 1, 0);
    c.x(QubitId(0)).unwrap().x(QubitId(0)).unwrap();
    let result = optimizer()
        .optimize(&c, "A", Some(&[OptimizationStage::GateCancellation]))
        .unwrap();
    assert!(result.optimized_circuit.instructions().is_empty());
    assert_eq!(result.impact.gate_reduction_pct, 100.0);
    assert_eq!(result.stage_impacts.len(), 1);
}
