use serde::{Deserialize, Serialize};

/// Counts written next to the execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub feature_path: String,
    pub refined_data_path: String,
    pub modules: usize,
    pub steps: usize,
}

/// Totals of one generation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub test_cases: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Modules processed across all attempts
    pub modules: usize,
    /// Extraction or refinement passes that yielded no data
    pub crawl_failures: usize,
    pub total_duration_ms: u64,
}
