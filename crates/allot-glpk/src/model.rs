//! GMPL model and data rendering for the three solver tasks.
//!
//! All models share the same data layout:
//! - `F`: families, `U`: units
//! - `P within F cross U`: acceptable (family, unit) pairs
//! - `rank{P}`: 1-based position of the unit in the family's list
//!
//! and the same assignment core: `x{P}` binary, every family gets exactly
//! one unit, every unit goes to at most one family. Models print their
//! result to the `--display` file in the line format parsed by
//! [`crate::solution`], terminated by `end`.

use std::fmt::Write;

use allot_core::{AllocationSpec, family_symbol};

/// Objective used when distributing units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionMode {
    /// Any assignment satisfying the floor (binary-search probes).
    Feasibility,
    /// Among floor-satisfying assignments, minimize the total rank.
    MinimizeRankSum,
}

const ASSIGNMENT_CORE: &str = "\
set F;
set U;
set P within F cross U;
param rank{P} > 0, integer;

var x{P} binary;

s.t. one_unit{f in F}: sum{u in U: (f, u) in P} x[f, u] = 1;
s.t. unit_once{u in U}: sum{f in F: (f, u) in P} x[f, u] <= 1;
";

const PRINT_ASSIGNMENTS: &str = "printf{(f, u) in P: x[f, u] > 0.5} \"assign %s %s\\n\", f, u;\n";

const WORST_RANK: &str = "s.t. worst_rank{f in F}: sum{u in U: (f, u) in P} rank[f, u] * x[f, u] <= S;\n";

/// Phase 1: the smallest worst rank any complete assignment can achieve.
pub fn min_satisfaction_model() -> String {
    let mut model = String::from(ASSIGNMENT_CORE);
    model.push_str("\nvar S >= 0;\n");
    model.push_str(WORST_RANK);
    model.push_str("\nminimize worst: S;\n\nsolve;\n\n");
    model.push_str("printf \"min_satisfaction %d\\n\", round(S);\n");
    model.push_str(PRINT_ASSIGNMENTS);
    model.push_str("printf \"end\\n\";\n\nend;\n");
    model
}

/// Phase 2: an assignment whose worst rank does not exceed `floor`.
///
/// With a floor, `S` is pinned by an equality constraint and bounds every
/// family's rank.
pub fn unit_distribution_model(with_floor: bool, mode: DistributionMode) -> String {
    let mut model = String::from(ASSIGNMENT_CORE);
    if with_floor {
        model.push_str("\nparam floor integer, >= 0;\nvar S;\n");
        model.push_str("s.t. fix_floor: S = floor;\n");
        model.push_str(WORST_RANK);
    }
    if mode == DistributionMode::MinimizeRankSum {
        model.push_str("\nminimize total_rank: sum{(f, u) in P} rank[f, u] * x[f, u];\n");
    }
    model.push_str("\nsolve;\n\n");
    model.push_str(PRINT_ASSIGNMENTS);
    model.push_str("printf \"end\\n\";\n\nend;\n");
    model
}

/// Pruning: choose which surplus units to drop.
///
/// Lexicographic objective `W·S + Σ rank·x` with `W` larger than any rank
/// sum, so the worst rank is minimized first and the total rank second.
/// Units left unassigned by the optimum are the ones to drop.
pub fn worst_units_pruning_model() -> String {
    let mut model = String::from(ASSIGNMENT_CORE);
    model.push_str("\nparam W integer, > 0;\nvar S >= 0;\n");
    model.push_str(WORST_RANK);
    model.push_str("\nminimize fairness: W * S + sum{(f, u) in P} rank[f, u] * x[f, u];\n\nsolve;\n\n");
    model.push_str(PRINT_ASSIGNMENTS);
    model.push_str("printf{u in U: sum{f in F: (f, u) in P} x[f, u] < 0.5} \"drop %s\\n\", u;\n");
    model.push_str("printf \"end\\n\";\n\nend;\n");
    model
}

/// Weight that makes the pruning objective lexicographic.
pub fn pruning_weight(spec: &AllocationSpec) -> u64 {
    spec.family_count() as u64 * u64::from(spec.max_rank()) + 1
}

/// Render the data section for `spec` plus scalar parameters.
pub fn render_data(spec: &AllocationSpec, params: &[(&str, u64)]) -> String {
    let mut data = String::from("data;\n\n");

    data.push_str("set F :=");
    for family in spec.families().keys() {
        let _ = write!(data, " {}", family_symbol(*family));
    }
    data.push_str(";\n");

    data.push_str("set U :=");
    for unit in spec.units() {
        let _ = write!(data, " {unit}");
    }
    data.push_str(";\n");

    data.push_str("set P :=");
    for (family, prefs) in spec.families() {
        for unit in prefs {
            let _ = write!(data, "\n  ({}, {unit})", family_symbol(*family));
        }
    }
    data.push_str(";\n");

    data.push_str("param rank :=");
    for (family, prefs) in spec.families() {
        for (idx, unit) in prefs.iter().enumerate() {
            let _ = write!(data, "\n  {} {unit} {}", family_symbol(*family), idx + 1);
        }
    }
    data.push_str(";\n");

    for (name, value) in params {
        let _ = writeln!(data, "param {name} := {value};");
    }

    data.push_str("\nend;\n");
    data
}
