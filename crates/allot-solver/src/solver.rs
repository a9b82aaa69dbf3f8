//! Top-level allocation entry point.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{info, info_span};

use allot_core::{AllocationResult, AllocationSpec, AllotResult, SolverConfig};
use allot_glpk::{AuditSink, GlpkTasks, LpTasks};

use crate::balancer::{add_mock_units, prune_worst_units};
use crate::orchestrator::{Distribution, Orchestrator};

/// Solves allocation specs of any shape: balanced, more units than families,
/// or more families than units.
pub struct AllocationSolver<T> {
    orchestrator: Orchestrator<T>,
}

impl AllocationSolver<GlpkTasks> {
    /// Solver backed by `glpsol`, recording every task to `audit`.
    pub fn glpk(config: SolverConfig, audit: Arc<dyn AuditSink>) -> Self {
        let tasks = GlpkTasks::new(config.clone()).with_audit(audit);
        Self::new(Orchestrator::new(tasks, config))
    }
}

impl<T: LpTasks> AllocationSolver<T> {
    pub fn new(orchestrator: Orchestrator<T>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator<T> {
        &self.orchestrator
    }

    pub fn solve(&self, spec: &AllocationSpec, execution_id: &str) -> AllotResult<AllocationResult> {
        let span = info_span!(
            "allocate",
            execution_id,
            families = spec.family_count(),
            units = spec.unit_count()
        );
        let _enter = span.enter();

        if spec.family_count() == 0 || spec.unit_count() == 0 {
            info!("nothing to allocate");
            return Ok(AllocationResult::unassigned(spec));
        }

        let distribution = match spec.family_count().cmp(&spec.unit_count()) {
            Ordering::Equal => self.orchestrator.distribute_units(spec, execution_id)?,
            Ordering::Less => {
                let balanced = prune_worst_units(&self.orchestrator, spec, execution_id)?;
                self.distribute_padded(&balanced.spec, execution_id)?
            }
            Ordering::Greater => self.distribute_padded(spec, execution_id)?,
        };

        let result = AllocationResult::assemble(
            spec,
            &distribution.assignments,
            Some(distribution.min_satisfaction),
        )?;
        info!(
            strategy = %distribution.strategy,
            min_satisfaction = distribution.min_satisfaction,
            assigned = result.assignments().len(),
            unassigned_families = result.unassigned_families().len(),
            unassigned_units = result.unassigned_units().len(),
            "allocation complete"
        );
        Ok(result)
    }

    /// Distribute after topping the spec up with placeholders if it is short
    /// of units.
    fn distribute_padded(&self, spec: &AllocationSpec, execution_id: &str) -> AllotResult<Distribution> {
        if spec.family_count() > spec.unit_count() {
            self.orchestrator.distribute_units(&add_mock_units(spec), execution_id)
        } else {
            self.orchestrator.distribute_units(spec, execution_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{ExactTasks, smallest_cap};
    use allot_core::{FamilyId, UnitId};
    use allot_glpk::TaskKind;
    use std::collections::BTreeSet;

    fn solver() -> AllocationSolver<ExactTasks> {
        AllocationSolver::new(Orchestrator::new(ExactTasks::new(), SolverConfig::default()))
    }

    /// Every family and every real unit is accounted for exactly once.
    fn assert_conserved(spec: &AllocationSpec, result: &AllocationResult) {
        let mut families: BTreeSet<FamilyId> = result.assignments().keys().copied().collect();
        assert!(families.is_disjoint(result.unassigned_families()));
        families.extend(result.unassigned_families());
        assert_eq!(families, spec.family_ids());

        let assigned: BTreeSet<u64> = result.assignments().values().copied().collect();
        assert_eq!(assigned.len(), result.assignments().len(), "unit assigned twice");
        assert!(assigned.is_disjoint(result.unassigned_units()));
        let mut units = assigned;
        units.extend(result.unassigned_units());
        assert_eq!(units, spec.real_units());

        for (f, u) in result.assignments() {
            assert!(spec.rank_of(*f, UnitId::Real(*u)).is_some());
        }
    }

    #[test]
    fn test_balanced_two_by_two() {
        let spec = AllocationSpec::new([10, 20], [(1, vec![10, 20]), (2, vec![20, 10])]).unwrap();
        let result = solver().solve(&spec, "scenario-2x2").unwrap();

        assert_eq!(result.unit_for(1), Some(10));
        assert_eq!(result.unit_for(2), Some(20));
        assert_eq!(result.min_satisfaction(), Some(1));
        assert!(result.unassigned_families().is_empty());
        assert!(result.unassigned_units().is_empty());
    }

    #[test]
    fn test_more_units_than_families() {
        let spec = AllocationSpec::new(
            [10, 20, 30, 40],
            [(1, vec![10, 20, 30, 40]), (2, vec![10, 20, 30, 40])],
        )
        .unwrap();
        let result = solver().solve(&spec, "scenario-2x4").unwrap();

        assert_conserved(&spec, &result);
        assert_eq!(result.assignments().len(), 2);
        assert_eq!(result.unassigned_units(), &BTreeSet::from([30, 40]));
        assert_eq!(result.min_satisfaction(), Some(2));
    }

    #[test]
    fn test_more_families_than_units() {
        let spec = AllocationSpec::new(
            [10, 20],
            [(1, vec![10, 20]), (2, vec![10, 20]), (3, vec![20, 10])],
        )
        .unwrap();
        let result = solver().solve(&spec, "scenario-3x2").unwrap();

        assert_conserved(&spec, &result);
        assert_eq!(result.assignments().len(), 2);
        assert_eq!(result.unassigned_families().len(), 1);
        assert!(result.unassigned_units().is_empty());
        // family 3 is the only one whose first choice is 20
        assert_eq!(result.unit_for(3), Some(20));
    }

    #[test]
    fn test_unranked_surplus_is_padded() {
        let spec = AllocationSpec::new([10, 20, 30], [(1, vec![10]), (2, vec![10])]).unwrap();
        let result = solver().solve(&spec, "unranked").unwrap();

        assert_conserved(&spec, &result);
        assert_eq!(result.assignments().len(), 1);
        assert_eq!(result.unassigned_units(), &BTreeSet::from([20, 30]));
    }

    #[test]
    fn test_surplus_with_contested_prefix_stays_feasible() {
        let spec = AllocationSpec::new(
            [10, 20, 30, 40, 50, 60, 70],
            [
                (1, vec![10, 20, 50]),
                (2, vec![10, 20, 60]),
                (3, vec![10, 20, 70]),
                (4, vec![30, 40]),
            ],
        )
        .unwrap();
        let result = solver().solve(&spec, "contested").unwrap();

        assert_conserved(&spec, &result);
        assert_eq!(result.assignments().len(), 4);
        assert_eq!(result.min_satisfaction(), Some(3));
        assert_eq!(result.min_satisfaction(), smallest_cap(&spec));
    }

    #[test]
    fn test_empty_inputs() {
        let empty = AllocationSpec::new(Vec::new(), Vec::new()).unwrap();
        assert_eq!(solver().solve(&empty, "empty").unwrap(), AllocationResult::default());

        let no_units = AllocationSpec::new(Vec::new(), [(1, Vec::new())]).unwrap();
        let result = solver().solve(&no_units, "no-units").unwrap();
        assert_eq!(result.unassigned_families(), &BTreeSet::from([1]));

        let no_families = AllocationSpec::new([10], Vec::new()).unwrap();
        let s = solver();
        let result = s.solve(&no_families, "no-families").unwrap();
        assert_eq!(result.unassigned_units(), &BTreeSet::from([10]));
        assert!(s.orchestrator().tasks().calls().is_empty());
    }

    #[test]
    fn test_infeasible_balanced_spec() {
        let spec = AllocationSpec::new([10, 20], [(1, vec![10]), (2, vec![10])]).unwrap();
        let err = solver().solve(&spec, "infeasible").unwrap_err();
        assert!(err.is_infeasible());
    }

    #[test]
    fn test_result_satisfaction_is_optimal() {
        let spec = AllocationSpec::new(
            [1, 2, 3, 4],
            [
                (1, vec![1, 2, 3, 4]),
                (2, vec![1, 2, 4, 3]),
                (3, vec![2, 1, 3, 4]),
                (4, vec![3, 4, 1, 2]),
            ],
        )
        .unwrap();
        let s = solver();
        let result = s.solve(&spec, "optimal").unwrap();
        assert_conserved(&spec, &result);
        assert_eq!(result.min_satisfaction(), smallest_cap(&spec));
        assert_eq!(s.orchestrator().tasks().count(TaskKind::WorstUnitsPruning), 0);
    }
}
