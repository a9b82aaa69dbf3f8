//! Task identifiers, results, and the [`LpTasks`] seam.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use allot_core::{AllocationSpec, AllotResult, FamilyId, UnitId};

use crate::model::DistributionMode;

/// The three atomic solver tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    MinSatisfaction,
    UnitDistribution,
    WorstUnitsPruning,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::MinSatisfaction => "min_satisfaction",
            TaskKind::UnitDistribution => "unit_distribution",
            TaskKind::WorstUnitsPruning => "worst_units_pruning",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskData {
    MinSatisfaction { min_satisfaction: u32 },
    Distribution { distribution: BTreeMap<FamilyId, UnitId> },
    Pruning { dropped: BTreeSet<UnitId> },
}

/// Timing and captured files for one task invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskMetadata {
    pub elapsed_ms: u64,
    /// File contents keyed by basename.
    pub artifacts: BTreeMap<String, String>,
    /// SHA-256 of each artifact.
    pub digests: BTreeMap<String, String>,
    /// Solver stdout.
    pub solver_output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    pub task: TaskKind,
    pub data: TaskData,
    pub metadata: TaskMetadata,
}

impl TaskResult {
    pub fn new(task: TaskKind, data: TaskData) -> Self {
        Self {
            task,
            data,
            metadata: TaskMetadata::default(),
        }
    }

    pub fn min_satisfaction(&self) -> Option<u32> {
        match &self.data {
            TaskData::MinSatisfaction { min_satisfaction } => Some(*min_satisfaction),
            _ => None,
        }
    }

    pub fn distribution(&self) -> Option<&BTreeMap<FamilyId, UnitId>> {
        match &self.data {
            TaskData::Distribution { distribution } => Some(distribution),
            _ => None,
        }
    }

    pub fn dropped(&self) -> Option<&BTreeSet<UnitId>> {
        match &self.data {
            TaskData::Pruning { dropped } => Some(dropped),
            _ => None,
        }
    }
}

/// Per-call context threaded through every task.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    /// Key under which audit records are filed.
    pub execution_id: &'a str,
    /// Solver budget for this call, in seconds.
    pub timeout_secs: u64,
}

impl<'a> TaskContext<'a> {
    pub fn new(execution_id: &'a str, timeout_secs: u64) -> Self {
        Self {
            execution_id,
            timeout_secs,
        }
    }

    pub fn with_timeout(self, timeout_secs: u64) -> Self {
        Self { timeout_secs, ..self }
    }
}

/// The atomic optimization tasks the orchestrator composes.
pub trait LpTasks {
    /// Smallest worst rank achievable by a complete assignment.
    fn min_satisfaction(&self, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<TaskResult>;

    /// A complete assignment, optionally capped at rank `floor` for every family.
    fn unit_distribution(
        &self,
        spec: &AllocationSpec,
        floor: Option<u32>,
        mode: DistributionMode,
        ctx: TaskContext<'_>,
    ) -> AllotResult<TaskResult>;

    /// Units to discard so the remaining unit count equals the family count.
    fn worst_units_pruning(&self, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<TaskResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_names() {
        assert_eq!(TaskKind::MinSatisfaction.to_string(), "min_satisfaction");
        assert_eq!(
            serde_json::to_string(&TaskKind::WorstUnitsPruning).unwrap(),
            "\"worst_units_pruning\""
        );
    }

    #[test]
    fn test_accessors_match_payload() {
        let result = TaskResult::new(
            TaskKind::MinSatisfaction,
            TaskData::MinSatisfaction { min_satisfaction: 3 },
        );
        assert_eq!(result.min_satisfaction(), Some(3));
        assert!(result.distribution().is_none());
        assert!(result.dropped().is_none());
    }

    #[test]
    fn test_payload_json_shape() {
        let data = TaskData::Distribution {
            distribution: BTreeMap::from([(1, UnitId::Real(10))]),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["distribution"]["distribution"]["1"], "u10");
    }
}
