pub mod events;
pub mod reconcile;
pub mod stages;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::error::GenResult;
use crate::extract::crawler::Crawler;
use crate::llm::client::LlmClient;
use crate::parser::input::{collect_inputs, TestCaseInput};
use crate::parser::types::{Module, TestCase};
use crate::report::artifacts::{write_test_case, TestCaseLayout};
use crate::report::plan::write_execution_plan;
use crate::report::types::RunSummary;
use crate::utils::config::RunConfig;
use crate::utils::fs::{absolute, ensure_dir};

pub use events::*;
use stages::{run_stage, Stage, StageOutput};

/// What processing one test case file produced
#[derive(Debug, Clone, Default)]
pub struct TestCaseReport {
    pub modules: usize,
    pub crawl_failures: usize,
}

/// Generate element data for every test case file under `config.input_dir`
///
/// A file whose decomposition cannot be parsed is reported and skipped;
/// configuration, filesystem, LLM transport and browser errors stop the run.
pub async fn run_generation(
    config: &RunConfig,
    llm: Arc<dyn LlmClient>,
    crawler: Arc<dyn Crawler>,
    events: &EventEmitter,
) -> Result<RunSummary> {
    let started = Instant::now();

    let files = collect_inputs(&config.input_dir, config.test_case_filter.as_deref())
        .with_context(|| {
            format!(
                "Failed to read test cases from {}",
                config.input_dir.display()
            )
        })?;
    ensure_dir(&config.output_dir).context("Failed to create output directory")?;

    log::info!(
        "Found {} test case(s) in {}",
        files.len(),
        config.input_dir.display()
    );

    let mut summary = RunSummary {
        test_cases: files.len(),
        ..Default::default()
    };

    for path in &files {
        match process_test_case(path, config, llm.as_ref(), crawler.as_ref(), events).await {
            Ok(report) => {
                summary.succeeded += 1;
                summary.modules += report.modules;
                summary.crawl_failures += report.crawl_failures;
            }
            Err(e) if e.is_fatal() => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Aborting run at {}", path.display())));
            }
            Err(e) => {
                log::error!("Skipping {}: {}", path.display(), e);
                summary.failed += 1;
                events.emit(GenEvent::TestCaseFailed {
                    name: display_name(path),
                    error: e.to_string(),
                });
            }
        }
    }

    summary.total_duration_ms = started.elapsed().as_millis() as u64;
    events.emit(GenEvent::RunFinished {
        summary: summary.clone(),
    });
    Ok(summary)
}

/// Decompose one test case and run every attempt on it
pub async fn process_test_case(
    path: &Path,
    config: &RunConfig,
    llm: &dyn LlmClient,
    crawler: &dyn Crawler,
    events: &EventEmitter,
) -> GenResult<TestCaseReport> {
    let started = Instant::now();
    let input = TestCaseInput::load(path)?;
    events.emit(GenEvent::TestCaseStarted {
        name: input.stem.clone(),
        path: path.display().to_string(),
    });

    let (decomposed, usage) = stages::decompose(llm, &input.description).await?;
    log::info!(
        "Decomposition usage: prompt={} completion={} total={}",
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.total_tokens
    );
    events.emit(GenEvent::Decomposed {
        name: decomposed.name.clone(),
        modules: decomposed.modules.len(),
        steps: decomposed.step_count(),
    });

    let layout = TestCaseLayout::new(&config.output_dir, &input.stem);
    let decomposed_path = layout.decomposed_path();
    write_test_case(&decomposed_path, &decomposed)?;
    artifact_written(events, &decomposed_path);

    let attempts = config.attempts.max(1);
    let mut report = TestCaseReport::default();

    for attempt in 1..=attempts {
        events.emit(GenEvent::AttemptStarted { attempt, attempts });
        crawler.begin_attempt();

        let files = layout.attempt(attempt);
        files.create()?;

        let (extracted, refined) =
            run_attempt(&decomposed, config, crawler, events, &mut report).await;

        write_test_case(&files.extracted, &extracted)?;
        artifact_written(events, &files.extracted);
        write_test_case(&files.refined, &refined)?;
        artifact_written(events, &files.refined);

        write_execution_plan(
            &absolute(&input.path),
            &absolute(&files.refined),
            &absolute(&files.dir),
            &files.plan_log,
        )?;
        artifact_written(events, &files.plan_log);
    }

    events.emit(GenEvent::TestCaseFinished {
        name: input.stem,
        duration_ms: started.elapsed().as_millis() as u64,
    });
    Ok(report)
}

/// Extract then refine every module in order
///
/// Returns the first-pass test case and the refined one. Refinement fills a
/// fresh copy of the decomposed module, prompted with the first-pass result.
async fn run_attempt(
    decomposed: &TestCase,
    config: &RunConfig,
    crawler: &dyn Crawler,
    events: &EventEmitter,
    report: &mut TestCaseReport,
) -> (TestCase, TestCase) {
    let mut extracted = decomposed.clone();
    let mut refined = decomposed.clone();
    let module_count = decomposed.modules.len();

    for (idx, module) in decomposed.modules.iter().enumerate() {
        let first = timed_stage(events, idx, module_count, module, Stage::Extraction, || {
            run_stage(
                crawler,
                Stage::Extraction,
                module,
                module.clone(),
                &config.extraction,
            )
        })
        .await;
        report.crawl_failures += usize::from(first.outcome.is_err());
        extracted.modules[idx] = first.module;

        let second = timed_stage(events, idx, module_count, module, Stage::Refinement, || {
            run_stage(
                crawler,
                Stage::Refinement,
                &extracted.modules[idx],
                module.clone(),
                &config.extraction,
            )
        })
        .await;
        report.crawl_failures += usize::from(second.outcome.is_err());
        refined.modules[idx] = second.module;

        report.modules += 1;
    }

    (extracted, refined)
}

async fn timed_stage<F, Fut>(
    events: &EventEmitter,
    idx: usize,
    module_count: usize,
    module: &Module,
    stage: Stage,
    run: F,
) -> StageOutput
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = StageOutput>,
{
    let started = Instant::now();
    events.emit(GenEvent::StageStarted {
        module: idx + 1,
        module_count,
        url: module.url.clone(),
        stage,
    });

    let output = run().await;

    events.emit(GenEvent::StageFinished {
        module: idx + 1,
        stage,
        outcome: output.outcome.clone(),
        duration_ms: started.elapsed().as_millis() as u64,
    });
    output
}

fn artifact_written(events: &EventEmitter, path: &Path) {
    events.emit(GenEvent::ArtifactWritten {
        path: path.display().to_string(),
    });
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
