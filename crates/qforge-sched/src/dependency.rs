//! Dependency resolution.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{SchedError, SchedResult};
use crate::job::{Dependency, JobId, JobStatus};

/// Where a pending job stands with respect to its required dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every required dependency is satisfied.
    Ready,
    /// Some required dependency has not finished yet.
    Waiting,
    /// A required dependency ended in a way that can never satisfy it.
    Blocked {
        /// The dead dependency.
        dependency: JobId,
    },
}

/// Readiness of a job with `dependencies`, looking statuses up in `status_of`.
///
/// Optional dependencies never block.
pub fn readiness(
    dependencies: &[Dependency],
    status_of: impl Fn(&JobId) -> Option<JobStatus>,
) -> Readiness {
    let mut waiting = false;
    for dep in dependencies.iter().filter(|d| !d.optional) {
        match status_of(&dep.job_id) {
            Some(status) if dep.is_satisfied_by(status) => {}
            Some(status) if dep.is_dead(status) => {
                return Readiness::Blocked {
                    dependency: dep.job_id,
                };
            }
            Some(_) => waiting = true,
            None => {
                return Readiness::Blocked {
                    dependency: dep.job_id,
                };
            }
        }
    }
    if waiting {
        Readiness::Waiting
    } else {
        Readiness::Ready
    }
}

/// Optional dependencies of a job that are not satisfied (yet).
///
/// Unknown ids are ignored.
pub fn unsatisfied_optional(
    dependencies: &[Dependency],
    status_of: impl Fn(&JobId) -> Option<JobStatus>,
) -> usize {
    dependencies
        .iter()
        .filter(|d| d.optional)
        .filter(|d| status_of(&d.job_id).is_some_and(|s| !d.is_satisfied_by(s)))
        .count()
}

/// Number of jobs naming each job as a dependency.
pub fn dependents<'a>(
    jobs: impl IntoIterator<Item = &'a [Dependency]>,
) -> FxHashMap<JobId, usize> {
    let mut counts = FxHashMap::default();
    for deps in jobs {
        for dep in deps {
            *counts.entry(dep.job_id).or_insert(0) += 1;
        }
    }
    counts
}

/// Graph of required dependency edges, `dependency -> dependent`.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    dag: DiGraph<JobId, ()>,
    index: FxHashMap<JobId, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of required edges between `jobs`.
    ///
    /// Edges to ids outside `jobs` are skipped.
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = (JobId, &'a [Dependency])>) -> Self {
        let jobs: Vec<(JobId, &[Dependency])> = jobs.into_iter().collect();
        let mut graph = Self::new();
        for (id, _) in &jobs {
            graph.add_job(*id);
        }
        for (id, deps) in &jobs {
            for dep in deps.iter().filter(|d| !d.optional) {
                graph.add_edge(dep.job_id, *id);
            }
        }
        graph
    }

    /// Add a node.
    pub fn add_job(&mut self, id: JobId) -> NodeIndex {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.dag.add_node(id);
        self.index.insert(id, idx);
        idx
    }

    /// `from` has to finish before `to`. Unknown ids are ignored.
    pub fn add_edge(&mut self, from: JobId, to: JobId) {
        if let (Some(&a), Some(&b)) = (self.index.get(&from), self.index.get(&to)) {
            self.dag.add_edge(a, b, ());
        }
    }

    /// A cycle as a closed path of job ids, if any exists.
    pub fn find_cycle(&self) -> Option<Vec<JobId>> {
        for scc in tarjan_scc(&self.dag) {
            let start = scc[0];
            if scc.len() == 1 && self.dag.find_edge(start, start).is_none() {
                continue;
            }
            let members: FxHashSet<NodeIndex> = scc.iter().copied().collect();
            let mut path = vec![self.dag[start]];
            let mut visited = FxHashSet::default();
            visited.insert(start);
            let mut current = start;
            loop {
                let Some(next) = self
                    .dag
                    .neighbors(current)
                    .filter(|n| members.contains(n))
                    .min_by_key(|n| usize::from(*n != start))
                else {
                    break;
                };
                path.push(self.dag[next]);
                if !visited.insert(next) {
                    break;
                }
                current = next;
            }
            return Some(path);
        }
        None
    }

    /// Fail with [`SchedError::DependencyCycle`] if the graph has a cycle.
    pub fn ensure_acyclic(&self) -> SchedResult<()> {
        match self.find_cycle() {
            Some(cycle) => Err(SchedError::DependencyCycle(
                cycle.iter().map(ToString::to_string).collect(),
            )),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::DependencyKind;

    fn req(id: JobId) -> Dependency {
        Dependency::required(id, DependencyKind::Success)
    }

    #[test]
    fn test_readiness() {
        let (a, b) = (JobId::new(), JobId::new());
        let deps = vec![req(a), Dependency::optional(b, DependencyKind::Success)];
        let status = |running: JobStatus| {
            move |id: &JobId| {
                if *id == a { Some(running) } else { Some(JobStatus::Pending) }
            }
        };
        assert_eq!(readiness(&deps, status(JobStatus::Running)), Readiness::Waiting);
        assert_eq!(readiness(&deps, status(JobStatus::Completed)), Readiness::Ready);
        assert_eq!(
            readiness(&deps, status(JobStatus::Failed)),
            Readiness::Blocked { dependency: a }
        );
        assert_eq!(unsatisfied_optional(&deps, status(JobStatus::Completed)), 1);
    }

    #[test]
    fn test_optional_unknown_ignored() {
        let deps = vec![Dependency::optional(JobId::new(), DependencyKind::Data)];
        assert_eq!(readiness(&deps, |_| None), Readiness::Ready);
        assert_eq!(unsatisfied_optional(&deps, |_| None), 0);
    }

    #[test]
    fn test_acyclic_chain() {
        let (a, b, c) = (JobId::new(), JobId::new(), JobId::new());
        let deps_b = vec![req(a)];
        let deps_c = vec![req(b), req(a)];
        let graph = DependencyGraph::from_jobs([
            (a, &[][..]),
            (b, deps_b.as_slice()),
            (c, deps_c.as_slice()),
        ]);
        assert!(graph.ensure_acyclic().is_ok());
    }

    #[test]
    fn test_cycle_reported_as_path() {
        let (a, b, c) = (JobId::new(), JobId::new(), JobId::new());
        let deps_a = vec![req(c)];
        let deps_b = vec![req(a)];
        let deps_c = vec![req(b)];
        let graph = DependencyGraph::from_jobs([
            (a, deps_a.as_slice()),
            (b, deps_b.as_slice()),
            (c, deps_c.as_slice()),
        ]);
        let cycle = graph.find_cycle().unwrap();
        assert_eq!(cycle.len(), 4);
        assert_eq!(cycle.first(), cycle.last());
        assert!(matches!(
            graph.ensure_acyclic(),
            Err(SchedError::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let a = JobId::new();
        let deps = vec![req(a)];
        let graph = DependencyGraph::from_jobs([(a, deps.as_slice())]);
        assert_eq!(graph.find_cycle(), Some(vec![a, a]));
    }

    #[test]
    fn test_optional_edges_never_cycle() {
        let (a, b) = (JobId::new(), JobId::new());
        let deps_a = vec![Dependency::optional(b, DependencyKind::Completion)];
        let deps_b = vec![req(a)];
        let graph = DependencyGraph::from_jobs([(a, deps_a.as_slice()), (b, deps_b.as_slice())]);
        assert!(graph.find_cycle().is_none());
    }

    #[test]
    fn test_dependents_count() {
        let (a, b) = (JobId::new(), JobId::new());
        let d1 = vec![req(a)];
        let d2 = vec![req(a), req(b)];
        let counts = dependents([d1.as_slice(), d2.as_slice()]);
        assert_eq!(counts[&a], 2);
        assert_eq!(counts[&b], 1);
    }
}
