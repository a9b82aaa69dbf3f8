//! GLPK-backed task runners.
//!
//! Pipeline per task:
//! 1. Render the GMPL model and data section for the spec
//! 2. Write both through a fresh [`ArtifactStore`] and reserve a solution path
//! 3. Invoke `glpsol --model <m> --data <d> --display <sol> --tmlim <secs>`
//! 4. Reject infeasible runs, parse and validate the solution file
//! 5. Hand an [`AuditRecord`] to the audit sink, success or not

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use allot_core::{AllocationSpec, AllotError, AllotResult, SolverConfig, UnitId};

use crate::artifacts::ArtifactStore;
use crate::audit::{AuditRecord, AuditSink, NullAuditSink};
use crate::model::{self, DistributionMode};
use crate::process::ProcessRunner;
use crate::solution::{self, Solution};
use crate::task::{LpTasks, TaskContext, TaskData, TaskKind, TaskMetadata, TaskResult};

/// Runs the three solver tasks against an external `glpsol`.
#[derive(Clone)]
pub struct GlpkTasks {
    config: SolverConfig,
    runner: ProcessRunner,
    audit: Arc<dyn AuditSink>,
}

impl GlpkTasks {
    pub fn new(config: SolverConfig) -> Self {
        let runner = ProcessRunner::new(Duration::from_millis(config.poll_interval_ms));
        Self {
            config,
            runner,
            audit: Arc::new(NullAuditSink),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Run one task end to end and audit the outcome.
    fn execute<F>(
        &self,
        kind: TaskKind,
        model: &str,
        data: &str,
        ctx: TaskContext<'_>,
        interpret: F,
    ) -> AllotResult<TaskResult>
    where
        F: FnOnce(&Solution) -> AllotResult<TaskData>,
    {
        let started = Instant::now();
        let mut store = ArtifactStore::new(self.config.temp_dir()).keep_files(self.config.keep_artifacts);
        let mut solver_output = String::new();

        let outcome = self
            .invoke(&mut store, kind, model, data, ctx.timeout_secs, &mut solver_output)
            .and_then(|(path, content)| solution::parse_solution(&path, &content))
            .and_then(|parsed| interpret(&parsed));

        if let Err(AllotError::Timeout { output, .. } | AllotError::Process { output, .. }) = &outcome {
            solver_output.clone_from(output);
        }

        let metadata = TaskMetadata {
            elapsed_ms: started.elapsed().as_millis() as u64,
            artifacts: store.artifacts().clone(),
            digests: store.digests(),
            solver_output,
        };
        self.audit
            .record(&AuditRecord::new(ctx.execution_id, kind, &outcome, &metadata));

        let data = outcome?;
        info!(
            execution_id = ctx.execution_id,
            task = %kind,
            elapsed_ms = metadata.elapsed_ms,
            "task completed"
        );
        Ok(TaskResult {
            task: kind,
            data,
            metadata,
        })
    }

    /// Write the input files, run the solver and read its solution file.
    fn invoke(
        &self,
        store: &mut ArtifactStore,
        kind: TaskKind,
        model: &str,
        data: &str,
        timeout_secs: u64,
        solver_output: &mut String,
    ) -> AllotResult<(std::path::PathBuf, String)> {
        let prefix = format!("allot-{kind}-");
        let model_path = store.write(&prefix, ".mod", model)?;
        let data_path = store.write(&prefix, ".dat", data)?;
        let solution_path = store.reserve_solution_path(&prefix)?;

        let args: Vec<OsString> = vec![
            "--model".into(),
            model_path.into_os_string(),
            "--data".into(),
            data_path.into_os_string(),
            "--display".into(),
            solution_path.clone().into_os_string(),
            "--tmlim".into(),
            timeout_secs.to_string().into(),
        ];

        debug!(task = %kind, timeout_secs, "invoking solver");
        let stdout = self.runner.execute(&self.config.executable, &args[..], timeout_secs)?;
        *solver_output = stdout;

        if solution::reports_infeasible(solver_output) {
            return Err(AllotError::infeasible(kind, "solver reported no feasible solution"));
        }

        let content = store.read(&solution_path)?;
        Ok((solution_path, content))
    }
}

impl LpTasks for GlpkTasks {
    fn min_satisfaction(&self, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<TaskResult> {
        let kind = TaskKind::MinSatisfaction;
        if spec.family_count() == 0 {
            return Ok(TaskResult::new(kind, TaskData::MinSatisfaction { min_satisfaction: 0 }));
        }

        let model = model::min_satisfaction_model();
        let data = model::render_data(spec, &[]);
        self.execute(kind, &model, &data, ctx, |parsed| {
            let assignments = solution::validate_assignment(spec, &parsed.assignments, kind.as_str())?;
            let reported = parsed
                .min_satisfaction
                .ok_or_else(|| AllotError::infeasible(kind, "solution has no satisfaction level"))?;
            let achieved = solution::worst_rank(spec, &assignments);
            if reported != achieved {
                return Err(AllotError::infeasible(
                    kind,
                    format!("reported level {reported} but assignment reaches rank {achieved}"),
                ));
            }
            Ok(TaskData::MinSatisfaction {
                min_satisfaction: reported,
            })
        })
    }

    fn unit_distribution(
        &self,
        spec: &AllocationSpec,
        floor: Option<u32>,
        mode: DistributionMode,
        ctx: TaskContext<'_>,
    ) -> AllotResult<TaskResult> {
        let kind = TaskKind::UnitDistribution;
        if spec.family_count() == 0 {
            return Ok(TaskResult::new(kind, TaskData::Distribution { distribution: Default::default() }));
        }
        if floor == Some(0) {
            return Err(AllotError::infeasible(kind, "no family can be served at rank 0"));
        }

        let model = model::unit_distribution_model(floor.is_some(), mode);
        let params: Vec<(&str, u64)> = floor.map(|s| ("floor", u64::from(s))).into_iter().collect();
        let data = model::render_data(spec, &params);
        self.execute(kind, &model, &data, ctx, |parsed| {
            let distribution = solution::validate_assignment(spec, &parsed.assignments, kind.as_str())?;
            if let Some(floor) = floor {
                let worst = solution::worst_rank(spec, &distribution);
                if worst > floor {
                    return Err(AllotError::infeasible(
                        kind,
                        format!("assignment reaches rank {worst}, above floor {floor}"),
                    ));
                }
            }
            Ok(TaskData::Distribution { distribution })
        })
    }

    fn worst_units_pruning(&self, spec: &AllocationSpec, ctx: TaskContext<'_>) -> AllotResult<TaskResult> {
        let kind = TaskKind::WorstUnitsPruning;
        let surplus = spec.unit_count().saturating_sub(spec.family_count());
        if surplus == 0 {
            return Ok(TaskResult::new(kind, TaskData::Pruning { dropped: BTreeSet::new() }));
        }
        if spec.family_count() == 0 {
            return Ok(TaskResult::new(kind, TaskData::Pruning { dropped: spec.units().clone() }));
        }

        let model = model::worst_units_pruning_model();
        let data = model::render_data(spec, &[("W", model::pruning_weight(spec))]);
        self.execute(kind, &model, &data, ctx, |parsed| {
            let assignments = solution::validate_assignment(spec, &parsed.assignments, kind.as_str())?;
            let dropped: BTreeSet<UnitId> = parsed.dropped.iter().copied().collect();

            if dropped.len() != surplus || dropped.len() != parsed.dropped.len() {
                return Err(AllotError::infeasible(
                    kind,
                    format!("expected {surplus} dropped units, solver reported {}", parsed.dropped.len()),
                ));
            }
            if let Some(unit) = dropped
                .iter()
                .find(|u| !spec.units().contains(*u) || assignments.values().any(|a| a == *u))
            {
                return Err(AllotError::infeasible(kind, format!("cannot drop {unit}")));
            }
            Ok(TaskData::Pruning { dropped })
        })
    }
}
