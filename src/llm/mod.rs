pub mod api;
pub mod client;
pub mod prompts;
pub mod schema;

pub use client::{ChatRequest, Completion, LlmClient, OpenAiClient, ResponseMode};
