//! Property tests for circuit validation and depth.

use proptest::prelude::*;
use qforge_ir::{Circuit, ClbitId, Instruction, IrError, QubitId, StandardGate};

#[derive(Debug, Clone)]
enum Op {
    One(StandardGate, u32),
    Two(StandardGate, u32, u32),
    Measure(u32),
    Barrier,
}

impl Op {
    fn into_instruction(self) -> Instruction {
        match self {
            Op::One(g, q) => Instruction::single_qubit_gate(g, QubitId(q)),
            Op::Two(g, a, b) => Instruction::two_qubit_gate(g, QubitId(a), QubitId(b)),
            Op::Measure(q) => Instruction::measure(QubitId(q), ClbitId(q)),
            Op::Barrier => Instruction::barrier([]),
        }
    }
}

fn arb_op(n: u32) -> BoxedStrategy<Op> {
    let one = prop_oneof![
        Just(StandardGate::H),
        Just(StandardGate::X),
        Just(StandardGate::T),
        Just(StandardGate::Rz(0.25)),
    ];
    let single = prop_oneof![
        4 => (one, 0..n).prop_map(|(g, q)| Op::One(g, q)),
        1 => (0..n).prop_map(Op::Measure),
        1 => Just(Op::Barrier),
    ];
    if n < 2 {
        return single.boxed();
    }
    let pair = (0..n, 0..n).prop_filter("operands must differ", |(a, b)| a != b);
    let two = prop_oneof![Just(StandardGate::CX), Just(StandardGate::CZ)];
    prop_oneof![
        3 => single,
        2 => (two, pair).prop_map(|(g, (a, b))| Op::Two(g, a, b)),
    ]
    .boxed()
}

fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (1_u32..=8).prop_flat_map(|n| {
        prop::collection::vec(arb_op(n), 0..=40).prop_map(move |ops| {
            let instructions = ops.into_iter().map(Op::into_instruction).collect();
            Circuit::from_instructions("prop", n, n, instructions)
                .expect("generated circuits are valid")
        })
    })
}

proptest! {
    #[test]
    fn test_depth_is_bounded_by_operations(circuit in arb_circuit()) {
        let operations = circuit
            .instructions()
            .iter()
            .filter(|inst| !inst.is_barrier())
            .count();
        prop_assert!(circuit.depth() <= operations);

        let busiest = (0..circuit.num_qubits())
            .map(|q| {
                circuit
                    .instructions()
                    .iter()
                    .filter(|inst| !inst.is_barrier() && inst.qubits.contains(&QubitId(q)))
                    .count()
            })
            .max()
            .unwrap_or(0);
        prop_assert!(circuit.depth() >= busiest);
        prop_assert_eq!(circuit.depth() == 0, operations == 0);
    }

    #[test]
    fn test_appending_one_gate_adds_at_most_one_layer(
        circuit in arb_circuit(),
        q in 0_u32..8,
    ) {
        let q = q % circuit.num_qubits();
        let mut longer = circuit.clone();
        longer.h(QubitId(q)).unwrap();
        prop_assert!(longer.depth() >= circuit.depth());
        prop_assert!(longer.depth() <= circuit.depth() + 1);
    }

    #[test]
    fn test_out_of_range_operand_rejected(n in 1_u32..8, extra in 0_u32..4) {
        let inst = Instruction::single_qubit_gate(StandardGate::H, QubitId(n + extra));
        let err = Circuit::from_instructions("bad", n, 0, vec![inst]).unwrap_err();
        let is_out_of_range = matches!(err, IrError::QubitOutOfRange { .. });
        prop_assert!(is_out_of_range);
    }
}
