//! Pipeline stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// One stage of the optimization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizationStage {
    /// Cancel adjacent inverse pairs.
    GateCancellation,
    /// Merge single-qubit runs into one `U`.
    SingleQubitMerge,
    /// Move entangling gates earlier past disjoint single-qubit gates.
    CommutationReorder,
    /// Place logical qubits on the provider topology.
    LayoutMapping,
    /// Lower gates into the provider's native set.
    Transpilation,
    /// Substitute cheaper native equivalents.
    CostOptimization,
    /// Append echo pairs after noisy gates.
    ErrorMitigation,
}

impl OptimizationStage {
    /// Every stage in pipeline order.
    pub const ALL: [OptimizationStage; 7] = [
        OptimizationStage::GateCancellation,
        OptimizationStage::SingleQubitMerge,
        OptimizationStage::CommutationReorder,
        OptimizationStage::LayoutMapping,
        OptimizationStage::Transpilation,
        OptimizationStage::CostOptimization,
        OptimizationStage::ErrorMitigation,
    ];

    /// Stages of the conservative fallback pipeline.
    pub const CONSERVATIVE: [OptimizationStage; 2] = [
        OptimizationStage::GateCancellation,
        OptimizationStage::Transpilation,
    ];

    /// Kebab-case name.
    pub fn name(self) -> &'static str {
        match self {
            OptimizationStage::GateCancellation => "gate-cancellation",
            OptimizationStage::SingleQubitMerge => "single-qubit-merge",
            OptimizationStage::CommutationReorder => "commutation-reorder",
            OptimizationStage::LayoutMapping => "layout-mapping",
            OptimizationStage::Transpilation => "transpilation",
            OptimizationStage::CostOptimization => "cost-optimization",
            OptimizationStage::ErrorMitigation => "error-mitigation",
        }
    }

    /// Whether the stage may add gates.
    pub fn may_grow(self) -> bool {
        matches!(
            self,
            OptimizationStage::Transpilation | OptimizationStage::ErrorMitigation
        )
    }

    /// Deduplicate and put `stages` into pipeline order.
    pub fn normalize(stages: &[OptimizationStage]) -> Vec<OptimizationStage> {
        let mut out = stages.to_vec();
        out.sort();
        out.dedup();
        out
    }

    /// Parse a list of stage names.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<OptimizationStage>, CompileError> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl fmt::Display for OptimizationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptimizationStage {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        OptimizationStage::ALL
            .into_iter()
            .find(|stage| stage.name() == key)
            .ok_or_else(|| CompileError::UnknownStage(s.to_string()))
    }
}
