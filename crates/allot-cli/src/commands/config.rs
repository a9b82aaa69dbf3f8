use std::path::Path;

use allot_core::AllotConfig;

/// Print the effective configuration as TOML.
pub fn show(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

pub fn init(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    std::fs::write(path, AllotConfig::scaffold().to_toml_string()?)?;
    println!("✓ Generated {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allot.toml");
        init(&path).unwrap();

        let config = AllotConfig::from_file(&path).unwrap();
        assert_eq!(config.solver.timeout_secs, 60);
        assert!(config.audit.is_some());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allot.toml");
        std::fs::write(&path, "# mine\n").unwrap();

        assert!(init(&path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");
    }
}
