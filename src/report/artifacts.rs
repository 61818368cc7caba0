//! Where a test case's artifacts live and how they are written

use std::path::{Path, PathBuf};

use crate::error::GenResult;
use crate::parser::types::TestCase;
use crate::report::plan::{summary_path, PLAN_FILE};
use crate::utils::fs::{ensure_dir, write_json};

pub const EXTRACTED_FILE: &str = "ExtractedData.json";
pub const REFINED_FILE: &str = "RefinedExtractedData.json";

/// Output tree of one test case: `<output>/<stem>/`
#[derive(Debug, Clone)]
pub struct TestCaseLayout {
    pub root: PathBuf,
    pub stem: String,
}

impl TestCaseLayout {
    pub fn new(output_dir: &Path, stem: &str) -> Self {
        Self {
            root: output_dir.join(stem),
            stem: stem.to_string(),
        }
    }

    /// Decomposed test case, `Refined<stem>.json`
    pub fn decomposed_path(&self) -> PathBuf {
        self.root.join(format!("Refined{}.json", self.stem))
    }

    /// Files of attempt `n` (1-based), under `<n>.<stem>/`
    pub fn attempt(&self, n: u32) -> AttemptLayout {
        AttemptLayout::new(self.root.join(format!("{}.{}", n, self.stem)))
    }
}

/// Files written for one attempt
#[derive(Debug, Clone)]
pub struct AttemptLayout {
    pub dir: PathBuf,
    pub extracted: PathBuf,
    pub refined: PathBuf,
    pub plan_log: PathBuf,
    pub summary: PathBuf,
}

impl AttemptLayout {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            extracted: dir.join(EXTRACTED_FILE),
            refined: dir.join(REFINED_FILE),
            plan_log: dir.join(PLAN_FILE),
            summary: summary_path(&dir),
            dir,
        }
    }

    pub fn create(&self) -> GenResult<()> {
        ensure_dir(&self.dir)
    }
}

/// Overwrite `path` with the full test case state
pub fn write_test_case(path: &Path, test_case: &TestCase) -> GenResult<()> {
    write_json(path, test_case)?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}
