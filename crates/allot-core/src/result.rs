//! Allocation outcome.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::spec::AllocationSpec;
use crate::types::{FamilyId, UnitId};

/// The immutable outcome of one allocation.
///
/// Every family of the original spec is either a key of `assignments` or a
/// member of `unassigned_families`; every real unit is either a value of
/// `assignments` or a member of `unassigned_units`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    assignments: BTreeMap<FamilyId, u64>,
    unassigned_families: BTreeSet<FamilyId>,
    unassigned_units: BTreeSet<u64>,
    min_satisfaction: Option<u32>,
}

impl AllocationResult {
    /// Assemble a result for `spec` from solver assignments.
    ///
    /// Families matched to a placeholder end up unassigned. Assignments that
    /// reference unknown IDs or reuse a unit are rejected.
    pub fn assemble(
        spec: &AllocationSpec,
        assignments: &BTreeMap<FamilyId, UnitId>,
        min_satisfaction: Option<u32>,
    ) -> Result<Self, ValidationError> {
        let real_units = spec.real_units();
        let mut sanitized = BTreeMap::new();
        let mut used = BTreeSet::new();

        for (family, unit) in assignments {
            if spec.preferences(*family).is_none() {
                return Err(ValidationError::InvalidIdentifier {
                    value: family.to_string(),
                    reason: "assigned family is not part of the spec",
                });
            }
            let Some(id) = unit.real() else { continue };
            if !real_units.contains(&id) {
                return Err(ValidationError::InvalidIdentifier {
                    value: id.to_string(),
                    reason: "assigned unit is not part of the spec",
                });
            }
            if !used.insert(id) {
                return Err(ValidationError::InvalidIdentifier {
                    value: id.to_string(),
                    reason: "unit assigned to more than one family",
                });
            }
            sanitized.insert(*family, id);
        }

        let unassigned_families = spec
            .families()
            .keys()
            .filter(|f| !sanitized.contains_key(f))
            .copied()
            .collect();
        let unassigned_units = real_units.difference(&used).copied().collect();

        Ok(Self {
            assignments: sanitized,
            unassigned_families,
            unassigned_units,
            min_satisfaction,
        })
    }

    /// Result for a spec where nothing could be assigned.
    pub fn unassigned(spec: &AllocationSpec) -> Self {
        Self {
            assignments: BTreeMap::new(),
            unassigned_families: spec.family_ids(),
            unassigned_units: spec.real_units(),
            min_satisfaction: None,
        }
    }

    pub fn assignments(&self) -> &BTreeMap<FamilyId, u64> {
        &self.assignments
    }

    pub fn unassigned_families(&self) -> &BTreeSet<FamilyId> {
        &self.unassigned_families
    }

    pub fn unassigned_units(&self) -> &BTreeSet<u64> {
        &self.unassigned_units
    }

    /// Worst rank any assigned family received in the solved sub-problem.
    pub fn min_satisfaction(&self) -> Option<u32> {
        self.min_satisfaction
    }

    pub fn unit_for(&self, family: FamilyId) -> Option<u64> {
        self.assignments.get(&family).copied()
    }
}
