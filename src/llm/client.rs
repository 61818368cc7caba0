use async_trait::async_trait;
use std::time::Instant;

use crate::error::{GenError, GenResult};
use crate::llm::api::{
    ApiMessage, ApiRequest, ApiResponse, JsonSchemaSpec, ResponseFormat,
};
use crate::parser::types::UsageStats;
use crate::utils::config::{LlmSettings, ProviderKind};

/// How the model is asked to shape its answer
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseMode {
    /// Any JSON object
    JsonObject,
    /// JSON validated by the endpoint against `schema`
    JsonSchema {
        name: String,
        schema: serde_json::Value,
    },
}

/// One chat completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ApiMessage>,
    pub temperature: Option<f32>,
    pub mode: ResponseMode,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ApiMessage::system(system), ApiMessage::user(user)],
            temperature: None,
            mode: ResponseMode::JsonObject,
        }
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text answer plus the usage the endpoint reported
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: UsageStats,
}

/// Chat completion capability
///
/// The pipeline only needs "complete a prompt, optionally against a schema",
/// which keeps the endpoint replaceable by a fixture in tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Whether the endpoint enforces `ResponseMode::JsonSchema`
    fn supports_json_schema(&self) -> bool {
        false
    }

    async fn complete(&self, request: ChatRequest) -> GenResult<Completion>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (OpenAI, Ollama)
pub struct OpenAiClient {
    http: reqwest::Client,
    settings: LlmSettings,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(settings: &LlmSettings) -> GenResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GenError::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.api_base.trim_end_matches('/')),
            settings: settings.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Translate a [`ChatRequest`] into the wire body
    pub fn build_request(&self, request: &ChatRequest) -> ApiRequest {
        let response_format = match &request.mode {
            ResponseMode::JsonObject => ResponseFormat::JsonObject,
            ResponseMode::JsonSchema { name, schema } if self.supports_json_schema() => {
                ResponseFormat::JsonSchema {
                    json_schema: JsonSchemaSpec {
                        name: name.clone(),
                        schema: schema.clone(),
                        strict: false,
                    },
                }
            }
            // Endpoint cannot enforce the schema; the caller validates the JSON itself
            ResponseMode::JsonSchema { .. } => ResponseFormat::JsonObject,
        };

        ApiRequest {
            model: self.settings.model.clone(),
            messages: request.messages.clone(),
            temperature: request.temperature,
            response_format: Some(response_format),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.settings.model
    }

    fn supports_json_schema(&self) -> bool {
        self.settings.provider == ProviderKind::OpenAi
    }

    async fn complete(&self, request: ChatRequest) -> GenResult<Completion> {
        let body = self.build_request(&request);
        let start = Instant::now();

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let raw = resp.text().await?;

        log::debug!(
            "chat completion: model={} status={} latency={:?} body_len={}",
            self.settings.model,
            status,
            start.elapsed(),
            raw.len()
        );

        if !status.is_success() {
            return Err(GenError::Llm(format!("endpoint returned {}: {}", status, raw)));
        }

        let parsed: ApiResponse = serde_json::from_str(&raw)
            .map_err(|e| GenError::Llm(format!("unreadable completion response: {e}")))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| GenError::SchemaValidation("completion has no choices".to_string()))?;

        if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
            return Err(GenError::SchemaValidation(format!("model refused: {refusal}")));
        }

        let content = message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                GenError::SchemaValidation("completion has empty message content".to_string())
            })?;

        Ok(Completion {
            content,
            usage: parsed.usage.unwrap_or_default(),
        })
    }
}
