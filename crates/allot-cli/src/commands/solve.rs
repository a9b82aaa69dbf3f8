use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tracing::info;

use allot_core::{AllocationResult, AllotConfig};
use allot_glpk::{AuditSink, JsonlAuditSink, TracingAuditSink};
use allot_solver::AllocationSolver;

pub struct SolveArgs {
    pub spec: PathBuf,
    pub config: Option<PathBuf>,
    pub execution_id: Option<String>,
    pub audit_log: Option<PathBuf>,
    pub json: bool,
}

pub fn solve(args: &SolveArgs) -> anyhow::Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let spec = super::load_spec(&args.spec)?;
    let execution_id = args.execution_id.clone().unwrap_or_else(generate_execution_id);
    info!(
        %execution_id,
        spec = %args.spec.display(),
        executable = %config.solver.executable.display(),
        "solving"
    );

    let solver = AllocationSolver::glpk(config.solver.clone(), audit_sink(&config, args.audit_log.as_ref()));
    let result = solver
        .solve(&spec, &execution_id)
        .with_context(|| format!("allocation {execution_id} failed"))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", format_result(&execution_id, &result));
    }
    Ok(())
}

/// `--audit-log` wins over `[audit].path`; without either, records go to the log.
fn audit_sink(config: &AllotConfig, audit_log: Option<&PathBuf>) -> Arc<dyn AuditSink> {
    let path = audit_log.or(config.audit.as_ref().map(|a| &a.path));
    match path {
        Some(path) => Arc::new(JsonlAuditSink::new(path)),
        None => Arc::new(TracingAuditSink),
    }
}

fn generate_execution_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("allot-{}-{millis}", std::process::id())
}

fn format_result(execution_id: &str, result: &AllocationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "✓ Allocation {execution_id}");
    match result.min_satisfaction() {
        Some(s) => {
            let _ = writeln!(out, "  Satisfaction level: {s}");
        }
        None => {
            let _ = writeln!(out, "  Nothing to allocate");
        }
    }
    for (family, unit) in result.assignments() {
        let _ = writeln!(out, "  family {family} → unit {unit}");
    }
    if !result.unassigned_families().is_empty() {
        let _ = writeln!(out, "  Unassigned families: {}", join(result.unassigned_families()));
    }
    if !result.unassigned_units().is_empty() {
        let _ = writeln!(out, "  Unassigned units: {}", join(result.unassigned_units()));
    }
    out
}

fn join<'a>(ids: impl IntoIterator<Item = &'a u64>) -> String {
    ids.into_iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
}
