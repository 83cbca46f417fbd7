//! Topology-aware qubit placement.

use rustc_hash::FxHashMap;
use tracing::debug;

use qforge_hal::Topology;
use qforge_ir::{Circuit, QubitId};

use crate::error::{CompileError, CompileResult};
use crate::pass::Pass;
use crate::property::{Layout, PropertySet};
use crate::stage::OptimizationStage;

/// Cost charged for a partner on an unreachable physical qubit.
const UNREACHABLE: u64 = 1 << 20;

/// Greedy placement of logical qubits onto a sparse topology.
///
/// The logical qubit with the most interactions is placed on the physical
/// qubit of highest degree. Each further qubit, taken in order of interaction
/// weight with already placed qubits, goes to the free physical qubit with
/// the smallest weighted distance to its placed partners. Qubits without
/// interactions fill the lowest free indices. The result is kept only when
/// it leaves fewer entangling gates on uncoupled pairs than the identity.
pub struct GreedyLayout;

/// Interaction weights between every operand pair of multi-qubit gates.
fn interaction_graph(circuit: &Circuit) -> Vec<FxHashMap<u32, u64>> {
    let mut graph = vec![FxHashMap::default(); circuit.num_qubits() as usize];
    for inst in circuit.instructions().iter().filter(|i| i.is_multi_qubit_gate()) {
        for (a, b) in inst.operand_pairs() {
            let (a, b) = (a.0, b.0);
            *graph[a as usize].entry(b).or_insert(0) += 1;
            *graph[b as usize].entry(a).or_insert(0) += 1;
        }
    }
    graph
}

/// Entangling gates with an operand pair that is not coupled under `place`.
pub fn nonadjacent_gates(circuit: &Circuit, adjacency: &[Vec<u32>], place: impl Fn(u32) -> u32) -> usize {
    let coupled = |a: u32, b: u32| {
        adjacency
            .get(a as usize)
            .is_some_and(|nbrs| nbrs.contains(&b))
    };
    circuit
        .instructions()
        .iter()
        .filter(|i| i.is_multi_qubit_gate())
        .filter(|i| {
            i.operand_pairs()
                .any(|(a, b)| !coupled(place(a.0), place(b.0)))
        })
        .count()
}

struct Placer<'a> {
    topology: &'a Topology,
    degree: Vec<usize>,
    occupied: Vec<bool>,
    distances: FxHashMap<u32, Vec<Option<u32>>>,
}

impl<'a> Placer<'a> {
    fn new(topology: &'a Topology, adjacency: &[Vec<u32>]) -> Self {
        Self {
            topology,
            degree: adjacency.iter().map(Vec::len).collect(),
            occupied: vec![false; adjacency.len()],
            distances: FxHashMap::default(),
        }
    }

    fn free(&self) -> impl Iterator<Item = u32> + '_ {
        self.occupied
            .iter()
            .enumerate()
            .filter(|(_, taken)| !**taken)
            .map(|(p, _)| p as u32)
    }

    /// Free qubit with the highest degree, lowest index on ties.
    fn best_hub(&self) -> Option<u32> {
        self.free()
            .max_by(|&a, &b| {
                self.degree[a as usize]
                    .cmp(&self.degree[b as usize])
                    .then(b.cmp(&a))
            })
    }

    /// Free qubit minimising weighted distance to `partners`.
    fn nearest(&mut self, partners: &[(u32, u64)]) -> Option<u32> {
        let topology = self.topology;
        for &(phys, _) in partners {
            self.distances
                .entry(phys)
                .or_insert_with(|| topology.distances_from(phys));
        }
        let score = |p: u32| -> u64 {
            partners
                .iter()
                .map(|&(phys, w)| {
                    let d = self
                        .distances
                        .get(&phys)
                        .and_then(|row| row.get(p as usize).copied().flatten())
                        .map_or(UNREACHABLE, u64::from);
                    w * d
                })
                .sum()
        };
        self.free().min_by(|&a, &b| {
            score(a)
                .cmp(&score(b))
                .then(self.degree[b as usize].cmp(&self.degree[a as usize]))
                .then(a.cmp(&b))
        })
    }

    fn take(&mut self, p: u32) {
        self.occupied[p as usize] = true;
    }
}

/// Compute the greedy layout for `circuit` on `topology`.
pub fn greedy_layout(
    circuit: &Circuit,
    topology: &Topology,
    adjacency: &[Vec<u32>],
) -> CompileResult<Layout> {
    let n = circuit.num_qubits() as usize;
    let graph = interaction_graph(circuit);
    let total: Vec<u64> = graph.iter().map(|m| m.values().sum()).collect();

    let mut placer = Placer::new(topology, adjacency);
    let mut placed: Vec<Option<u32>> = vec![None; n];
    let mut layout = Layout::new();
    let exhausted = || CompileError::PassFailed {
        pass: "GreedyLayout".into(),
        message: format!("no free physical qubit for a {n}-qubit circuit"),
    };

    loop {
        // Strongest pull towards the placed set, then most interactions.
        let next = (0..n)
            .filter(|&l| placed[l].is_none() && total[l] > 0)
            .map(|l| {
                let pull: u64 = graph[l]
                    .iter()
                    .filter(|(partner, _)| placed[**partner as usize].is_some())
                    .map(|(_, w)| *w)
                    .sum();
                (l, pull)
            })
            .max_by(|&(la, pa), &(lb, pb)| {
                pa.cmp(&pb)
                    .then(total[la].cmp(&total[lb]))
                    .then(lb.cmp(&la))
            });
        let Some((logical, pull)) = next else {
            break;
        };

        let physical = if pull == 0 {
            placer.best_hub()
        } else {
            let partners: Vec<(u32, u64)> = graph[logical]
                .iter()
                .filter_map(|(partner, w)| placed[*partner as usize].map(|p| (p, *w)))
                .collect();
            placer.nearest(&partners)
        }
        .ok_or_else(exhausted)?;

        placer.take(physical);
        placed[logical] = Some(physical);
        layout.add(QubitId(logical as u32), physical);
    }

    for logical in 0..n {
        if placed[logical].is_none() {
            let physical = placer.free().next().ok_or_else(exhausted)?;
            placer.take(physical);
            placed[logical] = Some(physical);
            layout.add(QubitId(logical as u32), physical);
        }
    }
    Ok(layout)
}

/// Rewrite every operand of `circuit` through `layout`.
pub fn apply_layout(circuit: &mut Circuit, layout: &Layout) {
    let mut ops = circuit.take_instructions();
    for inst in &mut ops {
        for q in &mut inst.qubits {
            if let Some(p) = layout.get_physical(*q) {
                *q = QubitId(p);
            }
        }
    }
    if let Some(max) = layout.max_physical() {
        circuit.ensure_qubits(max + 1);
    }
    circuit.set_instructions(ops);
}

impl Pass for GreedyLayout {
    fn name(&self) -> &'static str {
        "GreedyLayout"
    }

    fn stage(&self) -> OptimizationStage {
        OptimizationStage::LayoutMapping
    }

    fn should_run(&self, circuit: &Circuit, properties: &PropertySet) -> bool {
        !properties.provider.topology.is_fully_connected() && circuit.two_qubit_gate_count() > 0
    }

    fn run(&self, circuit: &mut Circuit, properties: &mut PropertySet) -> CompileResult<()> {
        let topology = &properties.provider.topology;
        let adjacency = topology.adjacency();
        let baseline = nonadjacent_gates(circuit, &adjacency, |q| q);
        let candidate = greedy_layout(circuit, topology, &adjacency)?;
        let mapped = nonadjacent_gates(circuit, &adjacency, |q| {
            candidate.get_physical(QubitId(q)).unwrap_or(q)
        });

        debug!(baseline, mapped, "Layout candidate evaluated");
        if mapped < baseline {
            apply_layout(circuit, &candidate);
            properties.record(format!(
                "layout-mapping: greedy placement cut non-adjacent entangling gates from {baseline} to {mapped}"
            ));
            properties.layout = Some(candidate);
        } else {
            properties.record(format!(
                "layout-mapping: kept identity layout ({baseline} non-adjacent entangling gate(s))"
            ));
            properties.layout = Some(Layout::trivial(circuit.num_qubits()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use qforge_hal::ProviderCapability;

    fn props(cap: ProviderCapability) -> PropertySet {
        PropertySet::new(Arc::new(cap))
    }

    #[test]
    fn test_skipped_on_full_topology() {
        let p = props(ProviderCapability::provider_a());
        assert!(!GreedyLayout.should_run(&Circuit::bell().unwrap(), &p));
    }

    #[test]
    fn test_skipped_without_entanglers() {
        let p = props(ProviderCapability::provider_b());
        let mut c = Circuit::with_size("t", 2, 0);
        c.h(QubitId(0)).unwrap();
        assert!(!GreedyLayout.should_run(&c, &p));
    }

    #[test]
    fn test_identity_kept_when_already_adjacent() {
        let mut p = props(ProviderCapability::provider_b());
        let mut c = Circuit::bell().unwrap();
        GreedyLayout.run(&mut c, &mut p).unwrap();
        assert!(p.layout.as_ref().unwrap().is_trivial());
        assert_eq!(c, Circuit::bell().unwrap());
    }

    #[test]
    fn test_star_interactions_on_grid() {
        // q0 talks to q1..q4; on a 32-wide grid the identity leaves q0-q2,
        // q0-q3 and q0-q4 uncoupled. A degree-4 hub fixes all of them.
        let mut p = props(ProviderCapability::provider_c());
        let mut c = Circuit::with_size("star", 5, 0);
        for t in 1..5 {
            c.cz(QubitId(0), QubitId(t)).unwrap();
        }
        let adjacency = p.provider.topology.adjacency();
        assert_eq!(nonadjacent_gates(&c, &adjacency, |q| q), 3);

        GreedyLayout.run(&mut c, &mut p).unwrap();
        let layout = p.layout.clone().unwrap();
        assert!(!layout.is_trivial());
        assert_eq!(layout.len(), 5);
        assert_eq!(nonadjacent_gates(&c, &adjacency, |q| q), 0);
        assert_eq!(c.num_gates(), 4);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_three_qubit_gate_counts_outer_pair() {
        // On a line ccx(0, 1, 2) couples 0-1 and 1-2 but not 0-2.
        let topology = Topology::linear(3);
        let adjacency = topology.adjacency();
        let mut c = Circuit::with_size("t", 3, 0);
        c.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        assert_eq!(nonadjacent_gates(&c, &adjacency, |q| q), 1);

        let graph = interaction_graph(&c);
        assert_eq!(graph[0].get(&2), Some(&1));
        assert_eq!(graph[2].get(&0), Some(&1));
        assert_eq!(graph[1].len(), 2);
    }

    #[test]
    fn test_layout_is_injective() {
        let topology = Topology::linear(6);
        let adjacency = topology.adjacency();
        let mut c = Circuit::with_size("t", 4, 0);
        c.cx(QubitId(0), QubitId(3)).unwrap();
        c.cx(QubitId(3), QubitId(1)).unwrap();
        c.cx(QubitId(1), QubitId(2)).unwrap();
        let layout = greedy_layout(&c, &topology, &adjacency).unwrap();
        let mut physical: Vec<u32> = layout.iter().map(|(_, p)| p).collect();
        physical.sort_unstable();
        physical.dedup();
        assert_eq!(physical.len(), 4);
        // a path 0-3-1-2 embeds into a line without uncoupled pairs
        assert_eq!(
            nonadjacent_gates(&c, &adjacency, |q| layout.get_physical(QubitId(q)).unwrap()),
            0
        );
    }
}
