//! Optimization orchestrator: composes the atomic LP tasks into a max-min
//! fair assignment.
//!
//! Phase 1 finds the optimal satisfaction level S with the strategy picked
//! by [`select_strategy`]. Phase 2 solves for a complete assignment with
//! every family at rank S or better, minimizing the total rank.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, info};

use allot_core::{AllocationSpec, AllotError, AllotResult, FamilyId, SolverConfig, UnitId};
use allot_glpk::{DistributionMode, LpTasks, TaskContext, TaskKind};

use crate::strategy::{
    BinarySearchStrategy, DirectStrategy, SatisfactionStrategy, StrategyKind, select_strategy,
};

/// A complete assignment together with its satisfaction level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub assignments: BTreeMap<FamilyId, UnitId>,
    pub min_satisfaction: u32,
    pub strategy: StrategyKind,
}

pub struct Orchestrator<T> {
    tasks: T,
    config: SolverConfig,
}

impl<T: LpTasks> Orchestrator<T> {
    pub fn new(tasks: T, config: SolverConfig) -> Self {
        Self { tasks, config }
    }

    pub fn tasks(&self) -> &T {
        &self.tasks
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn strategy_for(&self, spec: &AllocationSpec) -> StrategyKind {
        select_strategy(spec.family_count(), &self.config)
    }

    /// Phase 1 only: the optimal satisfaction level.
    pub fn min_satisfaction(&self, spec: &AllocationSpec, execution_id: &str) -> AllotResult<u32> {
        let ctx = self.context(execution_id);
        match self.strategy_for(spec) {
            StrategyKind::Direct => DirectStrategy::new(&self.config).solve(&self.tasks, spec, ctx),
            StrategyKind::BinarySearch => BinarySearchStrategy.solve(&self.tasks, spec, ctx),
        }
    }

    /// Max-min fair assignment of every family in `spec`.
    ///
    /// Requires at least as many units as families; callers balance the spec
    /// first.
    pub fn distribute_units(&self, spec: &AllocationSpec, execution_id: &str) -> AllotResult<Distribution> {
        let strategy = self.strategy_for(spec);
        if spec.family_count() == 0 {
            return Ok(Distribution {
                assignments: BTreeMap::new(),
                min_satisfaction: 0,
                strategy,
            });
        }

        let start = Instant::now();
        let s = self.min_satisfaction(spec, execution_id)?;
        info!(
            execution_id,
            %strategy,
            min_satisfaction = s,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 1 complete"
        );

        let start = Instant::now();
        let result = self.tasks.unit_distribution(
            spec,
            Some(s),
            DistributionMode::MinimizeRankSum,
            self.context(execution_id),
        )?;
        let assignments = result.distribution().cloned().ok_or_else(|| {
            AllotError::infeasible(TaskKind::UnitDistribution, "task returned no distribution")
        })?;
        info!(
            execution_id,
            families = assignments.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "phase 2 complete"
        );

        Ok(Distribution {
            assignments,
            min_satisfaction: s,
            strategy,
        })
    }

    /// Units whose removal leaves exactly one unit per family at the best
    /// achievable satisfaction level.
    pub fn identify_worst_units(&self, spec: &AllocationSpec, execution_id: &str) -> AllotResult<BTreeSet<UnitId>> {
        if spec.unit_count() <= spec.family_count() {
            return Ok(BTreeSet::new());
        }
        let result = self.tasks.worst_units_pruning(spec, self.context(execution_id))?;
        let dropped = result.dropped().cloned().ok_or_else(|| {
            AllotError::infeasible(TaskKind::WorstUnitsPruning, "task returned no dropped units")
        })?;
        debug!(execution_id, dropped = dropped.len(), "identified worst units");
        Ok(dropped)
    }

    fn context<'a>(&self, execution_id: &'a str) -> TaskContext<'a> {
        TaskContext::new(execution_id, self.config.timeout_secs)
    }
}
