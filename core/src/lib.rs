//! SQL risk gate
//!
//! Continuous-integration quality gate for SQL statements. A run flows through
//! four stages, each consuming the previous stage's full output in order:
//!
//! 1. [`classifier`]: split raw SQL into comment-free, kind-tagged statements
//! 2. [`profiler`]: capture each statement's plan inside a rolled-back transaction
//! 3. [`evaluator`]: score each statement (local heuristic or remote model)
//! 4. [`gate`]: fold all verdicts into a pass/fail decision
//!
//! [`pipeline`] wires the stages together with bounded concurrency and
//! cancellation; [`input`] and [`report`] are the file boundaries.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod gate;
pub mod input;
pub mod pipeline;
pub mod profiler;
pub mod report;
pub mod retry;
pub mod statement;
pub mod verdict;

pub use error::{GateError, Result};
pub use evaluator::Evaluator;
pub use gate::{GateDecision, GatePolicy, decide};
pub use pipeline::{Pipeline, RunOutcome};
pub use profiler::{PlanOutcome, PlanResult, Profiler};
pub use statement::{Statement, StatementKind};
pub use verdict::{EvaluationTier, RiskVerdict, SeverityTier};
