use std::cmp::Ordering;
use std::path::Path;

use allot_core::{AllocationSpec, SolverConfig};
use allot_solver::{preference_depth_candidates, select_strategy};

pub fn check(spec_path: &Path, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let spec = super::load_spec(spec_path)?;
    print!("{}", describe(&spec, &config.solver));
    Ok(())
}

fn describe(spec: &AllocationSpec, solver: &SolverConfig) -> String {
    let shape = match spec.family_count().cmp(&spec.unit_count()) {
        Ordering::Equal => "balanced".to_string(),
        Ordering::Less => format!(
            "{} surplus units ({} survive the depth heuristic)",
            spec.unit_count() - spec.family_count(),
            preference_depth_candidates(spec).len()
        ),
        Ordering::Greater => format!(
            "{} placeholder units needed",
            spec.family_count() - spec.unit_count()
        ),
    };
    let unranked = spec
        .families()
        .values()
        .filter(|prefs| prefs.is_empty())
        .count();

    let mut lines = vec![
        "✓ Spec is valid".to_string(),
        format!("  Families: {}", spec.family_count()),
        format!("  Units:    {}", spec.unit_count()),
        format!("  Max rank: {}", spec.max_rank()),
        format!("  Shape:    {shape}"),
        format!("  Strategy: {}", select_strategy(spec.family_count(), solver)),
    ];
    if unranked > 0 {
        lines.push(format!("  Warning: {unranked} families rank no units"));
    }
    lines.join("\n") + "\n"
}
