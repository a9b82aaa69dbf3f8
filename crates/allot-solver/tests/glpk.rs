//! End-to-end allocation through a real `glpsol`. Skipped when the solver is
//! not installed.

use std::process::Command;
use std::sync::Arc;

use allot_core::{AllocationSpec, SolverConfig, UnitId};
use allot_glpk::{MemoryAuditSink, TaskKind};
use allot_solver::AllocationSolver;
use allot_solver::testkit::smallest_cap;

fn glpsol_available() -> bool {
    Command::new("glpsol")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! require_glpsol {
    () => {
        if !glpsol_available() {
            eprintln!("glpsol not found on PATH, skipping");
            return;
        }
    };
}

fn solver(config: SolverConfig) -> (AllocationSolver<allot_glpk::GlpkTasks>, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    (AllocationSolver::glpk(config, audit.clone()), audit)
}

#[test]
fn balanced_two_by_two() {
    require_glpsol!();
    let spec = AllocationSpec::new([10, 20], [(1, vec![10, 20]), (2, vec![20, 10])]).unwrap();
    let (solver, audit) = solver(SolverConfig::default());
    let result = solver.solve(&spec, "glpk-2x2").unwrap();

    assert_eq!(result.unit_for(1), Some(10));
    assert_eq!(result.unit_for(2), Some(20));
    assert_eq!(result.min_satisfaction(), Some(1));

    let records = audit.records_for("glpk-2x2");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].task, TaskKind::MinSatisfaction);
    assert_eq!(records[1].task, TaskKind::UnitDistribution);
    assert!(records.iter().all(|r| r.succeeded()));
    assert!(records[0].metadata.artifacts.keys().any(|name| name.ends_with(".mod")));
}

#[test]
fn strategies_agree_under_glpk() {
    require_glpsol!();
    let spec = AllocationSpec::new(
        [1, 2, 3, 4, 5],
        [
            (1, vec![1, 2, 3, 4, 5]),
            (2, vec![1, 3, 2, 5, 4]),
            (3, vec![2, 1, 4, 3, 5]),
            (4, vec![1, 2, 3, 4, 5]),
            (5, vec![1, 5, 2, 4, 3]),
        ],
    )
    .unwrap();
    let (direct, _) = solver(SolverConfig::default());
    let (search, _) = solver(SolverConfig {
        phase1_time_budget: 0.0,
        ..SolverConfig::default()
    });

    let a = direct.solve(&spec, "glpk-direct").unwrap();
    let b = search.solve(&spec, "glpk-search").unwrap();
    assert_eq!(a.min_satisfaction(), b.min_satisfaction());
    assert_eq!(a.min_satisfaction(), smallest_cap(&spec));
}

#[test]
fn surplus_units_are_pruned() {
    require_glpsol!();
    let spec = AllocationSpec::new(
        [10, 20, 30, 40],
        [(1, vec![10, 20, 30, 40]), (2, vec![10, 30, 20, 40])],
    )
    .unwrap();
    let (solver, audit) = solver(SolverConfig::default());
    let result = solver.solve(&spec, "glpk-prune").unwrap();

    assert_eq!(result.assignments().len(), 2);
    assert_eq!(result.unassigned_units().len(), 2);
    assert!(result.unassigned_units().contains(&40));
    assert!(
        audit
            .records()
            .iter()
            .any(|r| r.task == TaskKind::WorstUnitsPruning)
    );
}

#[test]
fn families_on_placeholders_are_unassigned() {
    require_glpsol!();
    let spec = AllocationSpec::new(
        [10, 20],
        [(1, vec![10, 20]), (2, vec![10, 20]), (3, vec![20, 10])],
    )
    .unwrap();
    let (solver, _) = solver(SolverConfig::default());
    let result = solver.solve(&spec, "glpk-pad").unwrap();

    assert_eq!(result.assignments().len(), 2);
    assert_eq!(result.unassigned_families().len(), 1);
    assert!(result.unassigned_units().is_empty());
    assert!(
        result
            .assignments()
            .values()
            .all(|u| spec.units().contains(&UnitId::Real(*u)))
    );
}

#[test]
fn infeasible_spec_is_reported() {
    require_glpsol!();
    let spec = AllocationSpec::new([10, 20], [(1, vec![10]), (2, vec![10])]).unwrap();
    let (solver, audit) = solver(SolverConfig::default());
    let err = solver.solve(&spec, "glpk-infeasible").unwrap_err();
    assert!(err.is_infeasible(), "{err}");
    assert!(audit.records().iter().any(|r| !r.succeeded()));
}
