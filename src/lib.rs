pub mod driver;
pub mod error;
pub mod extract;
pub mod llm;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use error::{GenError, GenResult};
pub use report::write_execution_plan;
pub use runner::run_generation;
