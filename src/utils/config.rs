use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::driver::dispatcher::DispatcherConfig;
use crate::driver::web::WebDriverConfig;
use crate::error::{GenError, GenResult};
use crate::extract::strategy::ExtractionConfig;
use crate::utils::properties::Properties;

pub const DEFAULT_OLLAMA_API_BASE: &str = "http://localhost:11434/v1";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5vl:32b";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Browser binary used instead of the discovered one
pub const CHROMIUM_EXECUTABLE_ENV: &str = "PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH";

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(GenError::Configuration(format!(
                "unknown LLM provider '{}', expected 'openai' or 'ollama'",
                other
            ))),
        }
    }
}

/// Provider settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
}

/// Environment snapshot: process variables layered over an optional `.env` file
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Capture the process environment, with `.env` values as fallback
    pub fn capture(dotenv: Option<&Path>) -> GenResult<Self> {
        Self::layered(dotenv, std::env::vars())
    }

    /// `process` variables over the `.env` file at `dotenv`
    ///
    /// A missing file is treated as empty. The process environment is not modified.
    pub fn layered<I>(dotenv: Option<&Path>, process: I) -> GenResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars = match dotenv {
            Some(path) if path.exists() => read_dotenv(path)?,
            Some(path) => {
                log::debug!("No .env file at {}", path.display());
                HashMap::new()
            }
            None => HashMap::new(),
        };
        vars.extend(process);
        Ok(Self { vars })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value for `key`; empty values count as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

fn read_dotenv(path: &Path) -> GenResult<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| dotenv_error(path, e))?;
    iter.map(|item| item.map_err(|e| dotenv_error(path, e)))
        .collect()
}

fn dotenv_error(path: &Path, err: dotenvy::Error) -> GenError {
    match err {
        dotenvy::Error::Io(source) => GenError::fs(path, source),
        other => GenError::Configuration(format!("invalid {}: {}", path.display(), other)),
    }
}

/// Resolved LLM connection settings
#[derive(Clone, PartialEq)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

/// Keys consulted for one provider, per source
struct ProviderKeys {
    env_key: &'static str,
    env_base: &'static str,
    env_model: &'static str,
    prop_key: &'static str,
    prop_base: &'static str,
    prop_model: &'static str,
    default_base: &'static str,
    default_model: &'static str,
}

impl ProviderKind {
    fn keys(&self) -> ProviderKeys {
        match self {
            ProviderKind::Ollama => ProviderKeys {
                env_key: "OLLAMA_API_KEY",
                env_base: "OLLAMA_API_BASE",
                env_model: "OLLAMA_MODEL",
                prop_key: "ollamaApiKey",
                prop_base: "ollamaApiBase",
                prop_model: "ollamaModel",
                default_base: DEFAULT_OLLAMA_API_BASE,
                default_model: DEFAULT_OLLAMA_MODEL,
            },
            ProviderKind::OpenAi => ProviderKeys {
                env_key: "OPENAI_API_KEY",
                env_base: "OPENAI_BASE_URL",
                env_model: "OPENAI_MODEL",
                prop_key: "openaiApiKey",
                prop_base: "openaiBaseUrl",
                prop_model: "openaiModel",
                default_base: DEFAULT_OPENAI_API_BASE,
                default_model: DEFAULT_OPENAI_MODEL,
            },
        }
    }
}

impl LlmSettings {
    /// Resolve with precedence CLI > environment > properties file > default
    ///
    /// Fails before any network activity when the selected provider has no API key.
    pub fn resolve(cli: &CliOverrides, env: &EnvSource, props: &Properties) -> GenResult<Self> {
        let provider_name = first_set([
            cli.provider.as_deref(),
            env.get("LLM_PROVIDER"),
            props.get("llmProvider"),
        ])
        .unwrap_or("ollama");
        let provider: ProviderKind = provider_name.parse()?;
        let keys = provider.keys();

        let api_key = first_set([
            cli.api_key.as_deref(),
            env.get(keys.env_key),
            props.get(keys.prop_key),
        ])
        .ok_or_else(|| match provider {
            ProviderKind::OpenAi => GenError::Configuration(
                "OPENAI_API_KEY is required when LLM_PROVIDER is 'openai'".to_string(),
            ),
            ProviderKind::Ollama => GenError::Configuration(
                "missing Ollama API key: set OLLAMA_API_KEY or provide ollamaApiKey in config.properties"
                    .to_string(),
            ),
        })?;

        let api_base = first_set([
            cli.api_base.as_deref(),
            env.get(keys.env_base),
            props.get(keys.prop_base),
        ])
        .unwrap_or(keys.default_base);

        let model = first_set([
            cli.model.as_deref(),
            env.get(keys.env_model),
            props.get(keys.prop_model),
        ])
        .unwrap_or(keys.default_model);

        Ok(Self {
            provider,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// `provider/model` label used in logs and run summaries
    pub fn qualified_model(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

fn first_set<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Everything a generation run needs besides LLM credentials
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory of plain-text test case descriptions (or a single file)
    pub input_dir: PathBuf,

    /// Root directory for generated artifacts
    pub output_dir: PathBuf,

    /// Extraction/refinement attempts per test case
    pub attempts: u32,

    /// Only process the test case with this file name or stem
    pub test_case_filter: Option<String>,

    pub browser: WebDriverConfig,
    pub dispatcher: DispatcherConfig,
    pub extraction: ExtractionConfig,
}

impl RunConfig {
    /// Fill settings left unset on the command line from the environment
    pub fn apply_env(&mut self, env: &EnvSource) {
        if self.test_case_filter.is_none() {
            self.test_case_filter = env.get("TEST_CASE").map(String::from);
        }
        if self.browser.executable_path.is_none() {
            self.browser.executable_path = env.get(CHROMIUM_EXECUTABLE_ENV).map(PathBuf::from);
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("TestCaseExamples"),
            output_dir: PathBuf::from("TestCases"),
            attempts: 1,
            test_case_filter: None,
            browser: WebDriverConfig::default(),
            dispatcher: DispatcherConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}
