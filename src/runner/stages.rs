//! Per-module pipeline stages
//!
//! Each stage takes a [`Module`] value and returns the transformed module, so
//! they can be chained and tested without a network.

use crate::error::GenResult;
use crate::extract::crawler::{CrawlResult, Crawler};
use crate::extract::strategy::{ExtractionConfig, ExtractionStrategy};
use crate::llm::client::{ChatRequest, LlmClient, ResponseMode};
use crate::llm::prompts::{decomposition_prompt, extraction_instruction, refinement_instruction};
use crate::llm::schema::{test_case_schema, TEST_CASE_SCHEMA_NAME};
use crate::parser::json::parse_test_case;
use crate::parser::types::{Module, TestCase, UsageStats};
use crate::runner::reconcile::{reconcile_in_place, ReconcileOutcome};

/// Crawl-and-extract passes run for every module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Find the elements each step needs
    Extraction,
    /// Review and correct already extracted elements
    Refinement,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Extraction => "Identifying relevant elements",
            Stage::Refinement => "Refining extracted elements",
        }
    }

    /// Short name used in usage logs
    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Extraction => "llm1",
            Stage::Refinement => "llm2",
        }
    }

    fn instruction(&self, context: &Module) -> String {
        match self {
            Stage::Extraction => extraction_instruction(context),
            Stage::Refinement => refinement_instruction(context),
        }
    }
}

/// Result of one stage on one module
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub module: Module,
    /// Placement counts, or the crawl error when the page yielded nothing
    pub outcome: Result<ReconcileOutcome, String>,
}

/// Split a free-text test case into page modules
pub async fn decompose(
    llm: &dyn LlmClient,
    test_case: &str,
) -> GenResult<(TestCase, UsageStats)> {
    let prompt = decomposition_prompt(test_case);
    let request =
        ChatRequest::new(prompt.system, prompt.user).with_mode(ResponseMode::JsonSchema {
            name: TEST_CASE_SCHEMA_NAME.to_string(),
            schema: test_case_schema(),
        });

    let completion = llm.complete(request).await?;
    let parsed = parse_test_case(&completion.content)?;

    log::info!(
        "Decomposed \"{}\" into {} module(s), {} step(s)",
        parsed.name,
        parsed.modules.len(),
        parsed.step_count()
    );
    Ok((parsed, completion.usage))
}

/// Run `stage` for the page of `context` and fold the result into `target`
///
/// `context` is what the prompt shows the model; `target` receives the
/// extracted data. They are the same module for extraction.
pub async fn run_stage(
    crawler: &dyn Crawler,
    stage: Stage,
    context: &Module,
    target: Module,
    config: &ExtractionConfig,
) -> StageOutput {
    let strategy = ExtractionStrategy::new(stage.instruction(context), config.clone());
    let urls = vec![context.url.clone()];

    let result = crawler
        .crawl_many(&urls, &strategy)
        .await
        .into_iter()
        .next()
        .unwrap_or_else(|| CrawlResult {
            url: context.url.clone(),
            error_message: Some("crawler returned no result".to_string()),
            ..Default::default()
        });

    if let Some(ref usage) = result.usage {
        log::info!(
            "Usages {} for {}: prompt={} completion={} total={}",
            stage.tag(),
            result.url,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        );
    }

    apply_crawl(target, result)
}

/// Copy a crawl result onto `module` and reconcile it
///
/// A failed crawl leaves the module's data as it was.
pub fn apply_crawl(mut module: Module, result: CrawlResult) -> StageOutput {
    if !result.success {
        let reason = result
            .error_message
            .unwrap_or_else(|| "unknown crawl error".to_string());
        log::warn!("Crawl failed for {}: {}", result.url, reason);
        reconcile_in_place(&mut module);
        return StageOutput {
            module,
            outcome: Err(reason),
        };
    }

    module.extracted_data = Some(result.extracted);
    module.token = result.usage;
    module.dispatcher = result.dispatch;
    let outcome = reconcile_in_place(&mut module);

    StageOutput {
        module,
        outcome: Ok(outcome),
    }
}
