//! Allocation problem description.
//!
//! An [`AllocationSpec`] is the immutable input of one allocation attempt:
//! the set of units on offer and, per family, the ranked list of units that
//! family would accept (most-preferred first). Construction validates the
//! spec; every transformation (`filter`, `with_placeholders`) produces a new
//! value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::types::{FamilyId, UnitId};

/// Loosely typed spec as it arrives from JSON.
///
/// Identifiers may be JSON integers or numeric strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSpec {
    pub units: Vec<Value>,
    pub families: BTreeMap<String, Vec<Value>>,
}

/// A validated allocation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSpec {
    units: BTreeSet<UnitId>,
    families: BTreeMap<FamilyId, Vec<UnitId>>,
}

impl AllocationSpec {
    /// Build a spec from plain integer identifiers.
    pub fn new<U, F>(units: U, families: F) -> Result<Self, ValidationError>
    where
        U: IntoIterator<Item = u64>,
        F: IntoIterator<Item = (FamilyId, Vec<u64>)>,
    {
        Self::from_unit_ids(
            units.into_iter().map(UnitId::Real),
            families
                .into_iter()
                .map(|(f, prefs)| (f, prefs.into_iter().map(UnitId::Real).collect())),
        )
    }

    /// Build a spec from typed unit identifiers (placeholders allowed).
    pub fn from_unit_ids<U, F>(units: U, families: F) -> Result<Self, ValidationError>
    where
        U: IntoIterator<Item = UnitId>,
        F: IntoIterator<Item = (FamilyId, Vec<UnitId>)>,
    {
        let mut unit_set = BTreeSet::new();
        for unit in units {
            if !unit_set.insert(unit) {
                return Err(match unit {
                    UnitId::Real(id) => ValidationError::DuplicateUnit(id),
                    UnitId::Placeholder(_) => ValidationError::InvalidIdentifier {
                        value: unit.symbol(),
                        reason: "duplicate placeholder",
                    },
                });
            }
        }

        let mut family_map = BTreeMap::new();
        for (family, prefs) in families {
            let mut seen = BTreeSet::new();
            for unit in &prefs {
                if !unit_set.contains(unit) {
                    return Err(ValidationError::UnknownUnit {
                        family,
                        unit: unit.symbol(),
                    });
                }
                if !seen.insert(*unit) {
                    return Err(ValidationError::DuplicatePreference {
                        family,
                        unit: unit.symbol(),
                    });
                }
            }
            if family_map.insert(family, prefs).is_some() {
                return Err(ValidationError::DuplicateFamily(family));
            }
        }

        Ok(Self {
            units: unit_set,
            families: family_map,
        })
    }

    /// Build a spec from raw JSON input, sanitizing identifiers to integers.
    pub fn from_raw(raw: &RawSpec) -> Result<Self, ValidationError> {
        let units = raw
            .units
            .iter()
            .map(parse_id)
            .collect::<Result<Vec<_>, _>>()?;

        let mut families = Vec::with_capacity(raw.families.len());
        for (key, prefs) in &raw.families {
            let family = parse_id_str(key)?;
            let prefs = prefs
                .iter()
                .map(parse_id)
                .collect::<Result<Vec<_>, _>>()?;
            families.push((family, prefs));
        }

        Self::new(units, families)
    }

    pub fn units(&self) -> &BTreeSet<UnitId> {
        &self.units
    }

    pub fn families(&self) -> &BTreeMap<FamilyId, Vec<UnitId>> {
        &self.families
    }

    pub fn family_ids(&self) -> BTreeSet<FamilyId> {
        self.families.keys().copied().collect()
    }

    pub fn preferences(&self, family: FamilyId) -> Option<&[UnitId]> {
        self.families.get(&family).map(Vec::as_slice)
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// 1-based position of `unit` in the family's preference list.
    pub fn rank_of(&self, family: FamilyId, unit: UnitId) -> Option<u32> {
        self.families
            .get(&family)?
            .iter()
            .position(|u| *u == unit)
            .map(|idx| idx as u32 + 1)
    }

    /// Length of the longest preference list (the worst achievable rank).
    pub fn max_rank(&self) -> u32 {
        self.families.values().map(Vec::len).max().unwrap_or(0) as u32
    }

    /// Real (caller-facing) unit IDs, placeholders excluded.
    pub fn real_units(&self) -> BTreeSet<u64> {
        self.units.iter().filter_map(UnitId::real).collect()
    }

    /// Restrict the spec to the given units and/or families.
    ///
    /// `None` keeps everything on that axis. Preference lists are re-derived
    /// with excluded units stripped; relative order is preserved.
    pub fn filter(
        &self,
        units: Option<&BTreeSet<UnitId>>,
        families: Option<&BTreeSet<FamilyId>>,
    ) -> Self {
        let kept_units: BTreeSet<UnitId> = match units {
            Some(keep) => self.units.intersection(keep).copied().collect(),
            None => self.units.clone(),
        };

        let kept_families = self
            .families
            .iter()
            .filter(|(f, _)| families.is_none_or(|keep| keep.contains(f)))
            .map(|(f, prefs)| {
                let prefs = prefs
                    .iter()
                    .filter(|u| kept_units.contains(u))
                    .copied()
                    .collect();
                (*f, prefs)
            })
            .collect();

        Self {
            units: kept_units,
            families: kept_families,
        }
    }

    /// Add `count` placeholder units, appended in order as the least-preferred
    /// choices of every family.
    pub fn with_placeholders(&self, count: u32) -> Self {
        let first = self
            .units
            .iter()
            .filter_map(|u| match u {
                UnitId::Placeholder(n) => Some(n + 1),
                UnitId::Real(_) => None,
            })
            .max()
            .unwrap_or(0);
        let placeholders: Vec<UnitId> = (first..first + count).map(UnitId::Placeholder).collect();

        let mut units = self.units.clone();
        units.extend(placeholders.iter().copied());

        let families = self
            .families
            .iter()
            .map(|(f, prefs)| {
                let mut prefs = prefs.clone();
                prefs.extend(placeholders.iter().copied());
                (*f, prefs)
            })
            .collect();

        Self { units, families }
    }
}

fn parse_id(value: &Value) -> Result<u64, ValidationError> {
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| ValidationError::InvalidIdentifier {
            value: n.to_string(),
            reason: "identifiers must be non-negative integers",
        }),
        Value::String(s) => parse_id_str(s),
        other => Err(ValidationError::InvalidIdentifier {
            value: other.to_string(),
            reason: "identifiers must be numeric",
        }),
    }
}

fn parse_id_str(s: &str) -> Result<u64, ValidationError> {
    s.trim()
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidIdentifier {
            value: s.to_string(),
            reason: "identifiers must be non-negative integers",
        })
}
