pub mod artifacts;
pub mod plan;
pub mod types;

pub use artifacts::{AttemptLayout, TestCaseLayout};
pub use plan::write_execution_plan;
pub use types::{ExecutionSummary, RunSummary};
