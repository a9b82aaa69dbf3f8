//! allot core types: allocation specs and results, identifiers, errors and
//! configuration shared by the solver crates.

pub mod config;
pub mod error;
pub mod result;
pub mod spec;
pub mod types;

pub use config::{AllotConfig, AuditConfig, SolverConfig};
pub use error::{AllotError, AllotResult, TimeoutSource, ValidationError};
pub use result::AllocationResult;
pub use spec::{AllocationSpec, RawSpec};
pub use types::*;
