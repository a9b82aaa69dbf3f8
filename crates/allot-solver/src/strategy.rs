//! Phase 1 strategies: find the optimal satisfaction level S.
//!
//! Two implementations share [`SatisfactionStrategy`]:
//!
//! - **Direct** solves the min-max LP in one shot under a short budget and
//!   falls back to the binary search if the solver runs out of time.
//! - **Binary search** probes fixed S values with feasibility-only LPs, which
//!   stay cheap on inputs where the min-max LP blows up.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use allot_core::{AllocationSpec, AllotError, AllotResult, SolverConfig};
use allot_glpk::{DistributionMode, LpTasks, TaskContext, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Direct,
    BinarySearch,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Direct => f.write_str("direct"),
            StrategyKind::BinarySearch => f.write_str("binary_search"),
        }
    }
}

/// Direct for small problems with a non-zero Phase 1 budget, binary search
/// otherwise.
pub fn select_strategy(family_count: usize, config: &SolverConfig) -> StrategyKind {
    if family_count < config.phase1_max_size && config.phase1_time_budget > 0.0 {
        StrategyKind::Direct
    } else {
        StrategyKind::BinarySearch
    }
}

/// Computes the smallest worst rank any complete assignment can achieve.
pub trait SatisfactionStrategy<T: LpTasks> {
    fn solve(&self, tasks: &T, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<u32>;
}

#[derive(Debug, Clone, Copy)]
pub struct DirectStrategy {
    /// Solver budget for the min-max LP.
    pub phase1_timeout_secs: u64,
}

impl DirectStrategy {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            phase1_timeout_secs: config.phase1_timeout_secs(),
        }
    }
}

impl<T: LpTasks> SatisfactionStrategy<T> for DirectStrategy {
    fn solve(&self, tasks: &T, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<u32> {
        let phase1 = ctx.with_timeout(self.phase1_timeout_secs);
        match tasks.min_satisfaction(spec, phase1) {
            Ok(result) => result.min_satisfaction().ok_or_else(|| {
                AllotError::infeasible(TaskKind::MinSatisfaction, "task returned no satisfaction level")
            }),
            Err(e) if e.is_timeout() => {
                warn!(
                    execution_id = ctx.execution_id,
                    budget_secs = self.phase1_timeout_secs,
                    error = %e,
                    "direct phase 1 timed out, falling back to binary search"
                );
                BinarySearchStrategy.solve(tasks, spec, ctx)
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySearchStrategy;

impl<T: LpTasks> SatisfactionStrategy<T> for BinarySearchStrategy {
    fn solve(&self, tasks: &T, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<u32> {
        let max_rank = spec.max_rank();
        if max_rank == 0 {
            return Err(AllotError::infeasible(
                TaskKind::UnitDistribution,
                "no family ranks any unit",
            ));
        }

        if probe(tasks, spec, max_rank, ctx)? == Probe::Infeasible {
            return Err(AllotError::infeasible(
                TaskKind::UnitDistribution,
                format!("no complete assignment within rank {max_rank}"),
            ));
        }

        let (mut lo, mut hi) = (1, max_rank);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match probe(tasks, spec, mid, ctx)? {
                Probe::Feasible => hi = mid,
                Probe::Infeasible => lo = mid + 1,
            }
        }

        info!(execution_id = ctx.execution_id, min_satisfaction = hi, "binary search converged");
        Ok(hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Feasible,
    Infeasible,
}

/// Feasibility of serving every family within rank `s`. Timeouts and process
/// failures abort the search.
fn probe<T: LpTasks>(tasks: &T, spec: &AllocationSpec, s: u32, ctx: TaskContext<'_>) -> AllotResult<Probe> {
    let start = Instant::now();
    let outcome = match tasks.unit_distribution(spec, Some(s), DistributionMode::Feasibility, ctx) {
        Ok(_) => Probe::Feasible,
        Err(e) if e.is_infeasible() => Probe::Infeasible,
        Err(e) => {
            warn!(execution_id = ctx.execution_id, s, error = %e, "probe failed, aborting search");
            return Err(e);
        }
    };
    debug!(
        execution_id = ctx.execution_id,
        s,
        outcome = ?outcome,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "probe"
    );
    Ok(outcome)
}
