use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{GenError, GenResult};

/// Create a directory and its parents; existing directories are fine
pub fn ensure_dir(path: &Path) -> GenResult<()> {
    std::fs::create_dir_all(path).map_err(|e| GenError::fs(path, e))
}

/// Indent of test case artifacts
pub const ARTIFACT_INDENT: &[u8] = b"    ";
/// Indent of run summaries
pub const SUMMARY_INDENT: &[u8] = b"  ";

/// Serialize `value` as JSON indented by 4 spaces, non-ASCII kept as-is
pub fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    to_json_with_indent(value, ARTIFACT_INDENT)
}

pub fn to_json_with_indent<T: Serialize>(value: &T, indent: &[u8]) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Overwrite `path` with the JSON form of `value`, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> GenResult<()> {
    write_json_with_indent(path, value, ARTIFACT_INDENT)
}

pub fn write_json_with_indent<T: Serialize>(
    path: &Path,
    value: &T,
    indent: &[u8],
) -> GenResult<()> {
    let json = to_json_with_indent(value, indent).map_err(|e| {
        GenError::fs(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    write_text(path, &json)
}

/// Overwrite `path` with `content`, creating parent directories
pub fn write_text(path: &Path, content: &str) -> GenResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    std::fs::write(path, content).map_err(|e| GenError::fs(path, e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> GenResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| GenError::fs(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        GenError::SchemaValidation(format!("{} is not a valid artifact: {}", path.display(), e))
    })
}

/// Absolute form of `path` without requiring it to exist
pub fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
