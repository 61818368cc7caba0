use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the generation pipeline
#[derive(Debug, Error)]
pub enum GenError {
    /// No usable provider settings (missing API key, unknown provider, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Model output could not be parsed into the expected structure
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// Page could not be fetched, rendered or extracted
    #[error("crawl failed for {url}: {reason}")]
    CrawlFailure { url: String, reason: String },

    /// Directory creation or artifact write/read failed
    #[error("file system error at {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport or HTTP-level failure talking to the LLM endpoint
    #[error("LLM request failed: {0}")]
    Llm(String),

    /// Browser could not be started or driven
    #[error("browser error: {0}")]
    Browser(String),
}

impl GenError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenError::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn crawl(url: &str, reason: impl Into<String>) -> Self {
        GenError::CrawlFailure {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error should stop the whole run rather than a single file or module
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GenError::Configuration(_)
                | GenError::FileSystem { .. }
                | GenError::Llm(_)
                | GenError::Browser(_)
        )
    }
}

impl From<reqwest::Error> for GenError {
    fn from(err: reqwest::Error) -> Self {
        GenError::Llm(err.to_string())
    }
}

pub type GenResult<T> = std::result::Result<T, GenError>;
