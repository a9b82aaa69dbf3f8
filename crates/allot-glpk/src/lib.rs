//! allot-glpk: run allocation tasks through GLPK's `glpsol`.
//!
//! Each task renders a GMPL model and data file, runs the solver as an
//! external process under an enforced budget, and parses the solution file
//! it writes.
//!
//! # Components
//!
//! - **`process`**: subprocess execution with solver and failsafe timeouts
//! - **`artifacts`**: temporary model/data/solution files, kept for audit
//! - **`model`**: GMPL model and data rendering
//! - **`solution`**: solution parsing and assignment validation
//! - **`task`**: task identifiers, results and the `LpTasks` trait
//! - **`runner`**: `GlpkTasks`, the `glpsol`-backed `LpTasks`
//! - **`audit`**: audit sinks receiving one record per task

pub mod artifacts;
pub mod audit;
pub mod model;
pub mod process;
pub mod runner;
pub mod solution;
pub mod task;

pub use artifacts::ArtifactStore;
pub use audit::{AuditRecord, AuditSink, JsonlAuditSink, MemoryAuditSink, NullAuditSink, TaskOutcome, TracingAuditSink};
pub use model::DistributionMode;
pub use process::{ProcessRunner, ProcessState, failsafe_secs};
pub use runner::GlpkTasks;
pub use task::{LpTasks, TaskContext, TaskData, TaskKind, TaskMetadata, TaskResult};
