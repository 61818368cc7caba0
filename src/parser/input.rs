use std::path::{Path, PathBuf};

use crate::error::{GenError, GenResult};

/// A plain-text test case description loaded from disk
#[derive(Debug, Clone)]
pub struct TestCaseInput {
    pub path: PathBuf,
    /// File name without extension; names the output folders
    pub stem: String,
    pub description: String,
}

impl TestCaseInput {
    pub fn load(path: &Path) -> GenResult<Self> {
        let description =
            std::fs::read_to_string(path).map_err(|e| GenError::fs(path, e))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "test_case".to_string());

        Ok(Self {
            path: path.to_path_buf(),
            stem,
            description,
        })
    }
}

/// Collect test case files from a directory (or a single file)
///
/// Only direct children that are regular, non-hidden files are taken, sorted
/// by name. `filter` keeps the entries whose file name or stem equals it.
pub fn collect_inputs(path: &Path, filter: Option<&str>) -> GenResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(GenError::fs(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "input directory not found"),
        ));
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path().to_path_buf())
        .collect();

    if let Some(wanted) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        files.retain(|p| matches_filter(p, wanted));
        if files.is_empty() {
            log::warn!("No test case in {} matches '{}'", path.display(), wanted);
        }
    }

    Ok(files)
}

fn matches_filter(path: &Path, wanted: &str) -> bool {
    let name = path.file_name().map(|s| s.to_string_lossy());
    let stem = path.file_stem().map(|s| s.to_string_lossy());
    name.as_deref() == Some(wanted) || stem.as_deref() == Some(wanted)
}
