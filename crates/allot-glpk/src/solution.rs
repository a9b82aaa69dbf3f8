//! Solution file parsing and validation.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use allot_core::{AllocationSpec, AllotError, AllotResult, FamilyId, UnitId, parse_family_symbol};

/// Phrases glpsol prints when the problem has no feasible solution.
const INFEASIBLE_MARKERS: &[&str] = &[
    "NO PRIMAL FEASIBLE SOLUTION",
    "NO INTEGER FEASIBLE SOLUTION",
    "HAS NO FEASIBLE SOLUTION",
];

/// Whether solver output reports infeasibility.
pub fn reports_infeasible(output: &str) -> bool {
    INFEASIBLE_MARKERS.iter().any(|m| output.contains(m))
}

/// Raw contents of a solution file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Solution {
    pub min_satisfaction: Option<u32>,
    pub assignments: Vec<(FamilyId, UnitId)>,
    pub dropped: Vec<UnitId>,
}

/// Parse the line format written by the models in [`crate::model`].
///
/// A file without the trailing `end` line was truncated and is rejected.
pub fn parse_solution(path: &Path, content: &str) -> AllotResult<Solution> {
    let mut solution = Solution::default();
    let mut complete = false;

    for (lineno, line) in content.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let bad = |reason: &str| AllotError::artifact(path, format!("line {}: {reason}: {line:?}", lineno + 1));

        match fields.as_slice() {
            [] => continue,
            _ if complete => return Err(bad("content after end marker")),
            ["min_satisfaction", value] => {
                let s = value.parse::<u32>().map_err(|_| bad("invalid satisfaction level"))?;
                solution.min_satisfaction = Some(s);
            }
            ["assign", family, unit] => {
                let family = parse_family_symbol(family).map_err(|e| bad(&e))?;
                let unit = unit.parse::<UnitId>().map_err(|e| bad(&e))?;
                solution.assignments.push((family, unit));
            }
            ["drop", unit] => {
                let unit = unit.parse::<UnitId>().map_err(|e| bad(&e))?;
                solution.dropped.push(unit);
            }
            ["end"] => complete = true,
            _ => return Err(bad("unrecognized line")),
        }
    }

    if !complete {
        return Err(AllotError::artifact(path, "truncated solution: missing end marker"));
    }
    Ok(solution)
}

/// Check that `pairs` is a complete assignment for `spec`: every family
/// exactly once, every unit at most once, only acceptable pairs.
///
/// An incomplete assignment (including the all-zero solution glpsol reports
/// for an infeasible model) is `Infeasible`, never an empty success.
pub fn validate_assignment(
    spec: &AllocationSpec,
    pairs: &[(FamilyId, UnitId)],
    task: &str,
) -> AllotResult<BTreeMap<FamilyId, UnitId>> {
    let mut assignments = BTreeMap::new();
    let mut used = BTreeSet::new();

    for (family, unit) in pairs {
        if spec.rank_of(*family, *unit).is_none() {
            return Err(AllotError::infeasible(
                task,
                format!("family {family} assigned {unit}, which it did not rank"),
            ));
        }
        if assignments.insert(*family, *unit).is_some() {
            return Err(AllotError::infeasible(task, format!("family {family} assigned twice")));
        }
        if !used.insert(*unit) {
            return Err(AllotError::infeasible(task, format!("{unit} assigned twice")));
        }
    }

    if assignments.len() != spec.family_count() {
        return Err(AllotError::infeasible(
            task,
            format!(
                "solver assigned {} of {} families",
                assignments.len(),
                spec.family_count()
            ),
        ));
    }
    Ok(assignments)
}

/// Worst rank of a complete assignment.
pub fn worst_rank(spec: &AllocationSpec, assignments: &BTreeMap<FamilyId, UnitId>) -> u32 {
    assignments
        .iter()
        .filter_map(|(f, u)| spec.rank_of(*f, *u))
        .max()
        .unwrap_or(0)
}
