pub mod check;
pub mod config;
pub mod solve;

use std::path::Path;

use anyhow::Context;

use allot_core::{AllocationSpec, AllotConfig, RawSpec};

/// Load allot.toml, or the built-in defaults (with env overrides) when no
/// path is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AllotConfig> {
    match path {
        Some(path) => AllotConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let mut config = AllotConfig::default();
            config.solver.apply_env();
            config.solver.validate()?;
            Ok(config)
        }
    }
}

pub fn load_spec(path: &Path) -> anyhow::Result<AllocationSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spec {}", path.display()))?;
    let raw: RawSpec = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid spec document", path.display()))?;
    AllocationSpec::from_raw(&raw).with_context(|| format!("invalid spec {}", path.display()))
}
