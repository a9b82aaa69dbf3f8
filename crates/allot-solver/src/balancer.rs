//! Cardinality balancing: make the unit count equal the family count.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use allot_core::{AllocationSpec, AllotError, AllotResult, FamilyId, UnitId};
use allot_glpk::{LpTasks, TaskKind};

use crate::orchestrator::Orchestrator;

/// A spec reduced to (at most) one unit per family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balanced {
    pub spec: AllocationSpec,
    /// Units excluded from the balanced spec.
    pub dropped: BTreeSet<UnitId>,
}

/// Units ranked within the top `depth` of some family, for the smallest
/// depth whose union lets every family take a distinct unit.
///
/// Falls back to every ranked unit when no depth admits such an assignment.
pub fn preference_depth_candidates(spec: &AllocationSpec) -> BTreeSet<UnitId> {
    let needed = spec.family_count();
    let mut candidates = BTreeSet::new();
    for depth in 0..spec.max_rank() as usize {
        for prefs in spec.families().values() {
            if let Some(unit) = prefs.get(depth) {
                candidates.insert(*unit);
            }
        }
        if candidates.len() >= needed && covers_every_family(&spec.filter(Some(&candidates), None)) {
            debug!(depth = depth + 1, candidates = candidates.len(), "preference depth reached");
            break;
        }
    }
    candidates
}

/// Whether every family can take a distinct unit it ranks.
pub fn covers_every_family(spec: &AllocationSpec) -> bool {
    let mut owner: BTreeMap<UnitId, FamilyId> = BTreeMap::new();
    spec.families().keys().all(|&family| {
        let mut seen = BTreeSet::new();
        augment(spec, family, &mut seen, &mut owner)
    })
}

fn augment(
    spec: &AllocationSpec,
    family: FamilyId,
    seen: &mut BTreeSet<UnitId>,
    owner: &mut BTreeMap<UnitId, FamilyId>,
) -> bool {
    for unit in spec.preferences(family).unwrap_or_default() {
        if !seen.insert(*unit) {
            continue;
        }
        let free = match owner.get(unit).copied() {
            None => true,
            Some(other) => augment(spec, other, seen, owner),
        };
        if free {
            owner.insert(*unit, family);
            return true;
        }
    }
    false
}

/// Drop surplus units until the spec has one unit per family.
///
/// Units nobody ranks near the top go first. If the depth heuristic still
/// leaves a surplus, the pruning LP picks the remaining units to drop.
pub fn prune_worst_units<T: LpTasks>(
    orchestrator: &Orchestrator<T>,
    spec: &AllocationSpec,
    execution_id: &str,
) -> AllotResult<Balanced> {
    let candidates = preference_depth_candidates(spec);
    let mut retained = spec.filter(Some(&candidates), None);

    if retained.unit_count() > retained.family_count() {
        if !covers_every_family(&retained) {
            return Err(AllotError::infeasible(
                TaskKind::WorstUnitsPruning,
                "no complete assignment among ranked units",
            ));
        }
        let worst = orchestrator.identify_worst_units(&retained, execution_id)?;
        let kept: BTreeSet<UnitId> = retained.units().difference(&worst).copied().collect();
        retained = retained.filter(Some(&kept), None);
    }

    let dropped: BTreeSet<UnitId> = spec.units().difference(retained.units()).copied().collect();
    info!(
        execution_id,
        candidates = candidates.len(),
        retained = retained.unit_count(),
        dropped = dropped.len(),
        "pruned surplus units"
    );
    Ok(Balanced {
        spec: retained,
        dropped,
    })
}

/// Pad the spec with placeholder units, least-preferred by every family,
/// until units match families.
pub fn add_mock_units(spec: &AllocationSpec) -> AllocationSpec {
    let missing = spec.family_count().saturating_sub(spec.unit_count());
    debug!(placeholders = missing, "padding spec");
    spec.with_placeholders(missing as u32)
}
