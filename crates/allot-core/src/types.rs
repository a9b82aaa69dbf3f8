//! Shared identifier types used across allot crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a family (claimant).
pub type FamilyId = u64;

/// Identifier of a unit (resource).
///
/// Real units carry the caller's numeric ID. Placeholders are synthesized by
/// the balancer when families outnumber units and never leave the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum UnitId {
    Real(u64),
    Placeholder(u32),
}

impl UnitId {
    /// The caller-facing ID, or `None` for placeholders.
    pub fn real(&self) -> Option<u64> {
        match self {
            UnitId::Real(id) => Some(*id),
            UnitId::Placeholder(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, UnitId::Placeholder(_))
    }

    /// Symbol used for this unit inside solver model/data files.
    pub fn symbol(&self) -> String {
        self.to_string()
    }
}

impl From<u64> for UnitId {
    fn from(id: u64) -> Self {
        UnitId::Real(id)
    }
}

impl From<UnitId> for String {
    fn from(unit: UnitId) -> Self {
        unit.symbol()
    }
}

impl TryFrom<String> for UnitId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitId::Real(id) => write!(f, "u{id}"),
            UnitId::Placeholder(n) => write!(f, "p{n}"),
        }
    }
}

impl FromStr for UnitId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix('u') {
            rest.parse::<u64>()
                .map(UnitId::Real)
                .map_err(|_| format!("invalid unit symbol: {s}"))
        } else if let Some(rest) = s.strip_prefix('p') {
            rest.parse::<u32>()
                .map(UnitId::Placeholder)
                .map_err(|_| format!("invalid placeholder symbol: {s}"))
        } else {
            Err(format!("invalid unit symbol: {s}"))
        }
    }
}

/// Symbol used for a family inside solver model/data files.
pub fn family_symbol(id: FamilyId) -> String {
    format!("f{id}")
}

/// Parse a family symbol (`f<id>`) back into its ID.
pub fn parse_family_symbol(s: &str) -> Result<FamilyId, String> {
    s.strip_prefix('f')
        .and_then(|rest| rest.parse::<u64>().ok())
        .ok_or_else(|| format!("invalid family symbol: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_symbols_parse_back() {
        assert_eq!("u10".parse::<UnitId>().unwrap(), UnitId::Real(10));
        assert_eq!("p3".parse::<UnitId>().unwrap(), UnitId::Placeholder(3));
        assert_eq!(UnitId::Real(42).symbol(), "u42");
        assert!("x1".parse::<UnitId>().is_err());
        assert!("u-1".parse::<UnitId>().is_err());
    }

    #[test]
    fn test_unit_serializes_as_symbol() {
        let json = serde_json::to_string(&vec![UnitId::Real(10), UnitId::Placeholder(2)]).unwrap();
        assert_eq!(json, r#"["u10","p2"]"#);
        let back: Vec<UnitId> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![UnitId::Real(10), UnitId::Placeholder(2)]);
    }

    #[test]
    fn test_family_symbols() {
        assert_eq!(family_symbol(7), "f7");
        assert_eq!(parse_family_symbol("f7").unwrap(), 7);
        assert!(parse_family_symbol("7").is_err());
    }

    #[test]
    fn test_placeholders_sort_after_real_units() {
        assert!(UnitId::Real(u64::MAX) < UnitId::Placeholder(0));
        assert_eq!(UnitId::Placeholder(1).real(), None);
        assert_eq!(UnitId::Real(5).real(), Some(5));
    }
}
