//! Max-min fair allocation of units to families.
//!
//! Composes the LP tasks of `allot-glpk` into a complete allocation:
//!
//! - **`strategy`**: Phase 1 strategies (direct LP, binary search)
//! - **`orchestrator`**: Phase 1 + Phase 2, worst-unit identification
//! - **`balancer`**: pruning surplus units, padding with placeholders
//! - **`solver`**: entry point for specs of any shape

pub mod balancer;
pub mod orchestrator;
pub mod solver;
pub mod strategy;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use balancer::{Balanced, add_mock_units, covers_every_family, preference_depth_candidates, prune_worst_units};
pub use orchestrator::{Distribution, Orchestrator};
pub use solver::AllocationSolver;
pub use strategy::{BinarySearchStrategy, DirectStrategy, SatisfactionStrategy, StrategyKind, select_strategy};
