use std::collections::HashMap;
use std::path::Path;

use crate::error::{GenError, GenResult};

/// `key=value` pairs read from a `.properties` file
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    /// Parse `key=value` lines; blank lines and `#` comments are skipped
    pub fn parse(content: &str) -> Self {
        let mut values = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Self { values }
    }

    /// Load a file, treating a missing file as empty
    pub fn load(path: &Path) -> GenResult<Self> {
        if !path.exists() {
            log::debug!("No properties file at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| GenError::fs(path, e))?;
        Ok(Self::parse(&content))
    }

    /// Value for `key`; empty values count as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
