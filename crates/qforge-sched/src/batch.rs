//! Batch aggregates: rollup metrics, derived status and the merged view.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use qforge_hal::ProviderCapability;
use qforge_ir::{Circuit, ClbitId, Instruction, IrResult, QubitId};
use qforge_noise::{NoiseEstimator, analyze, circuit_cost};

use crate::error::{SchedError, SchedResult};
use crate::job::{BatchId, Job, JobId, JobStatus};

/// Qubit usage of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Qubits summed over all jobs.
    pub total_qubits: u32,
    /// Widest job.
    pub max_qubits: u32,
    /// Job count per target provider.
    pub jobs_per_provider: BTreeMap<String, usize>,
}

/// Rollup metrics of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// Gates summed over all jobs.
    pub total_gates: usize,
    /// Mean of depth × qubits.
    pub average_complexity: f64,
    /// Summed price of every job on its provider.
    pub estimated_cost: f64,
    /// Providers run in parallel, jobs on one provider back to back (µs).
    pub estimated_time_us: f64,
    /// Qubit usage.
    pub resource_usage: ResourceUsage,
}

impl BatchMetrics {
    /// Metrics of `jobs`, each priced on its capability from `caps`.
    pub fn compute(jobs: &[Job], caps: &BTreeMap<String, Arc<ProviderCapability>>) -> Self {
        let mut metrics = Self::default();
        let mut runtime_per_provider: BTreeMap<&str, f64> = BTreeMap::new();
        let mut complexity = 0.0;

        for job in jobs {
            let qubits = job.num_qubits();
            metrics.total_gates += job.circuit.num_gates();
            complexity += (job.circuit.depth() as f64) * f64::from(qubits);

            let usage = &mut metrics.resource_usage;
            usage.total_qubits += qubits;
            usage.max_qubits = usage.max_qubits.max(qubits);
            *usage.jobs_per_provider.entry(job.provider.clone()).or_insert(0) += 1;

            if let Some(cap) = caps.get(&job.provider) {
                metrics.estimated_cost += circuit_cost(&job.circuit, cap);
                *runtime_per_provider.entry(job.provider.as_str()).or_insert(0.0) +=
                    analyze(&job.circuit, cap).estimated_runtime_us;
            }
        }

        if !jobs.is_empty() {
            metrics.average_complexity = complexity / jobs.len() as f64;
        }
        metrics.estimated_time_us = runtime_per_provider.values().copied().fold(0.0, f64::max);
        metrics
    }
}

/// Status of a batch derived from its jobs.
///
/// Once every job is terminal: failed beats cancelled beats completed.
/// Before that, the most advanced active job decides; retrying counts as
/// running.
pub fn derive_status(statuses: impl IntoIterator<Item = JobStatus>) -> JobStatus {
    fn rank(status: JobStatus) -> u8 {
        match status {
            JobStatus::Running | JobStatus::Retrying => 4,
            JobStatus::Submitted => 3,
            JobStatus::Optimizing => 2,
            JobStatus::Queued => 1,
            _ => 0,
        }
    }

    let mut all_terminal = true;
    let (mut failed, mut cancelled) = (false, false);
    let mut active = JobStatus::Pending;
    for status in statuses {
        match status {
            JobStatus::Failed => failed = true,
            JobStatus::Cancelled => cancelled = true,
            JobStatus::Completed => {}
            other => {
                all_terminal = false;
                if rank(other) > rank(active) {
                    active = other;
                }
            }
        }
    }

    if !all_terminal {
        return match active {
            JobStatus::Retrying => JobStatus::Running,
            other => other,
        };
    }
    if failed {
        JobStatus::Failed
    } else if cancelled {
        JobStatus::Cancelled
    } else {
        JobStatus::Completed
    }
}

/// Jobs of a batch laid side by side in one circuit, for reporting.
#[derive(Debug, Clone)]
pub struct MergedCircuit {
    /// The combined circuit.
    pub circuit: Circuit,
    /// Instructions dropped because another job owned one of their qubits.
    pub conflicts: usize,
}

/// Lay `circuits` side by side within `max_width` qubits.
///
/// Each circuit gets the next free offset; one that no longer fits is
/// anchored at `width - num_qubits`. A physical qubit claimed twice goes
/// to the claim with the higher local index (the first claim wins a tie),
/// and only instructions whose qubits all belong to their own circuit are
/// kept.
pub fn merge_circuits(name: &str, circuits: &[&Circuit], max_width: u32) -> IrResult<MergedCircuit> {
    let total: u32 = circuits.iter().map(|c| c.num_qubits()).sum();
    let width = total.min(max_width).max(1);

    let mut offsets = Vec::with_capacity(circuits.len());
    let mut cursor = 0u32;
    for circuit in circuits {
        let n = circuit.num_qubits();
        if cursor + n <= width {
            offsets.push(cursor);
            cursor += n;
        } else {
            offsets.push(width.saturating_sub(n));
        }
    }

    // owner[physical] = (circuit index, local qubit)
    let mut owner: Vec<Option<(usize, u32)>> = vec![None; width as usize];
    for (idx, (circuit, &offset)) in circuits.iter().zip(&offsets).enumerate() {
        for local in 0..circuit.num_qubits() {
            let Some(slot) = owner.get_mut((offset + local) as usize) else {
                continue;
            };
            match slot {
                Some((_, claimed)) if *claimed >= local => {}
                _ => *slot = Some((idx, local)),
            }
        }
    }

    let mut instructions = Vec::new();
    let mut conflicts = 0;
    let mut clbit_offset = 0u32;
    for (idx, (circuit, &offset)) in circuits.iter().zip(&offsets).enumerate() {
        for inst in circuit.instructions() {
            let owned = inst.qubits.iter().all(|q| {
                owner.get((offset + q.0) as usize).copied().flatten() == Some((idx, q.0))
            });
            if !owned {
                conflicts += 1;
                continue;
            }
            instructions.push(Instruction {
                kind: inst.kind.clone(),
                qubits: inst.qubits.iter().map(|q| QubitId(q.0 + offset)).collect(),
                clbits: inst
                    .clbits
                    .iter()
                    .map(|c| ClbitId(c.0 + clbit_offset))
                    .collect(),
            });
        }
        clbit_offset += circuit.num_clbits();
    }

    let circuit = Circuit::from_instructions(name, width, clbit_offset, instructions)?;
    Ok(MergedCircuit { circuit, conflicts })
}

/// A named group of jobs scheduled with one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    /// Unique batch identifier.
    pub id: BatchId,
    /// Human-readable name.
    pub name: String,
    /// Scheduling strategy.
    pub strategy: String,
    /// Member jobs in submission order.
    pub job_ids: Vec<JobId>,
    /// Derived status; see [`derive_status`].
    pub status: JobStatus,
    /// Rollup metrics.
    pub metrics: BatchMetrics,
    /// Side-by-side view of the member circuits.
    pub merged_circuit: Circuit,
    /// Instructions left out of the merged view.
    pub merge_conflicts: usize,
    /// Best provider among those the jobs target.
    pub optimal_provider: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the last job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// Build the aggregate for `jobs`.
    pub fn create(
        name: impl Into<String>,
        strategy: impl Into<String>,
        jobs: &[Job],
        estimator: &NoiseEstimator,
    ) -> SchedResult<Self> {
        let Some(widest) = jobs.iter().max_by_key(|j| j.num_qubits()) else {
            return Err(SchedError::EmptyBatch);
        };
        let name = name.into();

        let mut caps = BTreeMap::new();
        for job in jobs {
            if !caps.contains_key(&job.provider) {
                let cap = estimator.registry().lookup(&job.provider)?;
                caps.insert(job.provider.clone(), cap);
            }
        }
        let used: Vec<Arc<ProviderCapability>> = caps.values().cloned().collect();
        let ranked = estimator.suggest_among(&widest.circuit, &used)?;
        let optimal = ranked
            .first()
            .map(|c| c.provider.clone())
            .ok_or(SchedError::EmptyBatch)?;
        let max_width = caps.get(&optimal).map_or(1, |c| c.num_qubits);

        let circuits: Vec<&Circuit> = jobs.iter().map(|j| &j.circuit).collect();
        let merged = merge_circuits(&format!("{name}_merged"), &circuits, max_width)?;
        let metrics = BatchMetrics::compute(jobs, &caps);
        debug!(
            batch = %name,
            jobs = jobs.len(),
            optimal_provider = %optimal,
            merge_conflicts = merged.conflicts,
            "Created batch"
        );

        Ok(Self {
            id: BatchId::new(),
            name,
            strategy: strategy.into(),
            job_ids: jobs.iter().map(|j| j.id).collect(),
            status: derive_status(jobs.iter().map(Job::status)),
            metrics,
            merged_circuit: merged.circuit,
            merge_conflicts: merged.conflicts,
            optimal_provider: optimal,
            created_at: Utc::now(),
            completed_at: None,
        })
    }

    /// Re-derive the status from the current job statuses.
    pub fn refresh(&mut self, statuses: impl IntoIterator<Item = JobStatus>) {
        self.status = derive_status(statuses);
        if self.status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Whether every job reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A batch together with clones of its jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSnapshot {
    /// The batch.
    pub batch: BatchJob,
    /// Its jobs, in submission order.
    pub jobs: Vec<Job>,
}

impl BatchSnapshot {
    /// Job counts per status name.
    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for job in &self.jobs {
            *counts.entry(job.status().name()).or_insert(0) += 1;
        }
        counts
    }
}
