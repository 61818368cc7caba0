//! LLM extraction over rendered HTML

use serde_json::Value;

use crate::error::{GenError, GenResult};
use crate::extract::html::{chunk_words, clean_html};
use crate::llm::client::{ChatRequest, LlmClient};
use crate::llm::schema::element_schema;
use crate::parser::json::parse_elements;
use crate::parser::types::{ExtractedElement, UsageStats};

/// Chunking and sampling settings for extraction
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    pub temperature: f32,
    /// Approximate token budget per chunk
    pub chunk_token_threshold: usize,
    /// Fraction of each chunk repeated at the start of the next
    pub overlap_rate: f64,
    /// Tokens per word used to turn the token budget into a word count
    pub word_token_rate: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            chunk_token_threshold: 2048,
            overlap_rate: 0.1,
            word_token_rate: 0.75,
        }
    }
}

impl ExtractionConfig {
    /// Words per chunk and overlap in words
    pub fn chunk_window(&self) -> (usize, usize) {
        let rate = if self.word_token_rate > 0.0 {
            self.word_token_rate
        } else {
            1.0
        };
        let words = ((self.chunk_token_threshold as f64) / rate).floor().max(1.0) as usize;
        let overlap = ((words as f64) * self.overlap_rate.clamp(0.0, 0.9)).floor() as usize;
        (words, overlap)
    }
}

/// Elements pulled from one page plus what it cost
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    pub elements: Vec<ExtractedElement>,
    /// Usage of each chunk request that got an answer
    pub usages: Vec<UsageStats>,
    pub total_usage: UsageStats,
    pub chunk_count: usize,
    /// Chunks whose request failed at transport level
    pub failed_chunks: usize,
}

/// Instruction + item schema applied to every chunk of a page
#[derive(Debug, Clone)]
pub struct ExtractionStrategy {
    pub instruction: String,
    pub schema: Value,
    pub config: ExtractionConfig,
}

impl ExtractionStrategy {
    pub fn new(instruction: impl Into<String>, config: ExtractionConfig) -> Self {
        Self {
            instruction: instruction.into(),
            schema: element_schema(),
            config,
        }
    }

    /// Run the instruction over `html`, one completion per chunk
    ///
    /// Fails only when every chunk request failed; unparsable answers
    /// contribute no elements.
    pub async fn run(
        &self,
        llm: &dyn LlmClient,
        url: &str,
        html: &str,
    ) -> GenResult<ExtractionOutput> {
        let cleaned = clean_html(html);
        let (words, overlap) = self.config.chunk_window();
        let chunks = chunk_words(&cleaned, words, overlap);

        if chunks.is_empty() {
            return Err(GenError::crawl(url, "page has no content to extract from"));
        }

        let mut output = ExtractionOutput {
            chunk_count: chunks.len(),
            ..Default::default()
        };
        let mut last_error = None;

        for (idx, chunk) in chunks.iter().enumerate() {
            let request = ChatRequest::new(self.system_prompt(), self.chunk_prompt(url, chunk))
                .with_temperature(self.config.temperature);

            let completion = match llm.complete(request).await {
                Ok(c) => c,
                Err(e) => {
                    log::warn!(
                        "Extraction chunk {}/{} for {} failed: {}",
                        idx + 1,
                        chunks.len(),
                        url,
                        e
                    );
                    output.failed_chunks += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            output.total_usage.accumulate(&completion.usage);
            output.usages.push(completion.usage);

            match parse_elements(&completion.content) {
                Ok(mut elements) => output.elements.append(&mut elements),
                Err(e) => log::warn!(
                    "Ignoring chunk {}/{} answer for {}: {}",
                    idx + 1,
                    chunks.len(),
                    url,
                    e
                ),
            }
        }

        if output.failed_chunks == output.chunk_count {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "all extraction requests failed".to_string());
            return Err(GenError::crawl(url, reason));
        }

        log::debug!(
            "Extracted {} element(s) from {} in {} chunk(s), usages: {:?}",
            output.elements.len(),
            url,
            output.chunk_count,
            output.usages
        );

        Ok(output)
    }

    fn system_prompt(&self) -> String {
        "You extract structured data from web page HTML. Answer with a single JSON object \
         of the form {\"elements\": [...]} and nothing else."
            .to_string()
    }

    fn chunk_prompt(&self, url: &str, chunk: &str) -> String {
        let schema = serde_json::to_string(&self.schema).unwrap_or_default();
        format!(
            "Here is the content from the URL:\n<url>{url}</url>\n\n<url_content>\n{chunk}\n</url_content>\n\n\
             The user has made the following request for what information to extract from the above content:\n\n\
             <user_request>\n{instruction}\n</user_request>\n\n\
             Every item of \"elements\" must follow this JSON schema:\n<schema_block>\n{schema}\n</schema_block>\n\n\
             If no element of this content is needed, return {{\"elements\": []}}.",
            instruction = self.instruction
        )
    }
}
