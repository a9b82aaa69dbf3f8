//! allot.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AllotError, AllotResult};

/// Environment variable that overrides `[solver].executable`.
pub const GLPSOL_PATH_ENV: &str = "ALLOT_GLPSOL_PATH";

/// Upper bound for `[solver].timeout_secs`: one day.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllotConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    pub audit: Option<AuditConfig>,
}

/// Settings for the external LP solver and the optimization strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Path to (or name of) the `glpsol` binary.
    pub executable: PathBuf,
    /// Directory for model, data and solution files. Defaults to the OS temp dir.
    pub temp_dir: Option<PathBuf>,
    /// Per-call solver budget in seconds.
    pub timeout_secs: u64,
    /// Budget for the direct Phase 1 LP, in seconds. Zero forces binary search.
    pub phase1_time_budget: f64,
    /// Family count at or above which the binary-search strategy is forced.
    pub phase1_max_size: usize,
    /// How often the process runner polls the child.
    pub poll_interval_ms: u64,
    /// Leave solver files on disk after each task (debugging).
    pub keep_artifacts: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("glpsol"),
            temp_dir: None,
            timeout_secs: 60,
            phase1_time_budget: 10.0,
            phase1_max_size: 50,
            poll_interval_ms: 100,
            keep_artifacts: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines file every task record is appended to.
    pub path: PathBuf,
}

impl AllotConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AllotConfig = toml::from_str(&content)?;
        config.solver.apply_env();
        config.solver.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold an allot.toml with every setting spelled out.
    pub fn scaffold() -> Self {
        AllotConfig {
            solver: SolverConfig {
                temp_dir: Some(std::env::temp_dir()),
                ..SolverConfig::default()
            },
            audit: Some(AuditConfig {
                path: PathBuf::from("allot-audit.jsonl"),
            }),
        }
    }
}

impl SolverConfig {
    /// Apply `ALLOT_GLPSOL_PATH` if it is set.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var(GLPSOL_PATH_ENV)
            && !path.is_empty()
        {
            self.executable = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> AllotResult<()> {
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(AllotError::Config(format!(
                "solver.timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}, got {}",
                self.timeout_secs
            )));
        }
        if !self.phase1_time_budget.is_finite() || self.phase1_time_budget < 0.0 {
            return Err(AllotError::Config(format!(
                "solver.phase1_time_budget must be a non-negative number, got {}",
                self.phase1_time_budget
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(AllotError::Config(
                "solver.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.executable.as_os_str().is_empty() {
            return Err(AllotError::Config("solver.executable cannot be empty".into()));
        }
        Ok(())
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Phase 1 budget rounded up to whole seconds, at least one.
    pub fn phase1_timeout_secs(&self) -> u64 {
        (self.phase1_time_budget.ceil() as u64).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold_round_trips() {
        let config = AllotConfig::scaffold();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("glpsol"));
        assert!(toml_str.contains("allot-audit.jsonl"));
    }

    #[test]
    fn test_parse_minimal() {
        let config: AllotConfig = toml::from_str("").unwrap();
        assert_eq!(config.solver.timeout_secs, 60);
        assert_eq!(config.solver.phase1_max_size, 50);
        assert!(config.audit.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let toml_str = r#"
[solver]
executable = "/opt/glpk/bin/glpsol"
timeout_secs = 5
phase1_time_budget = 0.5
phase1_max_size = 12
"#;
        let config: AllotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.solver.executable, PathBuf::from("/opt/glpk/bin/glpsol"));
        assert_eq!(config.solver.timeout_secs, 5);
        assert_eq!(config.solver.phase1_timeout_secs(), 1);
        assert_eq!(config.solver.poll_interval_ms, 100);
        config.solver.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SolverConfig {
            timeout_secs: 0,
            ..SolverConfig::default()
        };
        assert!(matches!(config.validate(), Err(AllotError::Config(_))));

        let config = SolverConfig {
            timeout_secs: u64::MAX,
            ..SolverConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        let config = SolverConfig {
            phase1_time_budget: f64::NAN,
            ..SolverConfig::default()
        };
        assert!(matches!(config.validate(), Err(AllotError::Config(_))));

        let config = SolverConfig {
            phase1_time_budget: -1.0,
            ..SolverConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SolverConfig {
            timeout_secs: MAX_TIMEOUT_SECS,
            ..SolverConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allot.toml");
        std::fs::write(&path, "[solver]\ntimeout_secs = 0\n").unwrap();
        let err = AllotConfig::from_file(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<AllotError>(), Some(AllotError::Config(_))));

        std::fs::write(&path, "[solver]\ntimeout_secs = 3\n").unwrap();
        let config = AllotConfig::from_file(&path).unwrap();
        assert_eq!(config.solver.timeout_secs, 3);
    }
}
