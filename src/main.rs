use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use lumi_gen::driver::dispatcher::MemoryAdaptiveDispatcher;
use lumi_gen::driver::web::{install_browsers, WebDriver};
use lumi_gen::extract::crawler::{Crawler, WebCrawler};
use lumi_gen::llm::client::{LlmClient, OpenAiClient};
use lumi_gen::runner::{self, ConsoleEventListener, EventEmitter, GenEvent};
use lumi_gen::utils::config::{CliOverrides, EnvSource, LlmSettings, RunConfig};
use lumi_gen::utils::properties::Properties;

#[derive(Parser)]
#[command(name = "lumi-gen")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Generate element locators for end-to-end test cases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose test cases and extract the elements each step needs
    Generate {
        /// Directory of test case descriptions, or a single file
        #[arg(default_value = "TestCaseExamples")]
        input: PathBuf,

        /// Output directory for generated artifacts
        #[arg(short, long, default_value = "TestCases")]
        output: PathBuf,

        /// LLM provider (openai, ollama)
        #[arg(long)]
        provider: Option<String>,

        /// API key for the selected provider
        #[arg(long)]
        api_key: Option<String>,

        /// Base URL for the selected provider
        #[arg(long)]
        api_base: Option<String>,

        /// Model name for the selected provider
        #[arg(long)]
        model: Option<String>,

        /// Properties file with provider settings
        #[arg(short, long, default_value = "config.properties")]
        config: PathBuf,

        /// Dotenv file read before the process environment
        #[arg(long, default_value = ".env")]
        env_file: PathBuf,

        /// Extraction/refinement attempts per test case
        #[arg(long, default_value = "1")]
        attempts: u32,

        /// Only process this test case (file name or stem); falls back to TEST_CASE
        #[arg(short, long)]
        test_case: Option<String>,

        /// Show the browser window
        #[arg(long, default_value = "false")]
        headed: bool,

        /// Chromium binary to launch; falls back to PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH
        #[arg(long)]
        browser_path: Option<PathBuf>,

        /// Navigation timeout per page in milliseconds
        #[arg(long, default_value = "60000")]
        page_timeout: u64,

        /// Maximum concurrent browser sessions
        #[arg(long, default_value = "20")]
        max_sessions: usize,
    },

    /// Rebuild the execution plan and summary from a refined artifact
    Plan {
        /// Path to RefinedExtractedData.json
        refined: PathBuf,

        /// Test case description the artifact was generated from
        #[arg(short, long)]
        feature: Option<PathBuf>,

        /// Directory for execution_plan.log and execution_summary.json
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage system components
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand)]
enum SystemCommands {
    /// Install Playwright and its browsers
    Install,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            input,
            output,
            provider,
            api_key,
            api_base,
            model,
            config,
            env_file,
            attempts,
            test_case,
            headed,
            browser_path,
            page_timeout,
            max_sessions,
        } => {
            let env = EnvSource::capture(Some(env_file.as_path()))?;
            let props = Properties::load(&config)?;
            let overrides = CliOverrides {
                provider,
                api_key,
                api_base,
                model,
            };
            let settings = LlmSettings::resolve(&overrides, &env, &props)?;

            let mut run_config = RunConfig {
                input_dir: input,
                output_dir: output,
                attempts,
                test_case_filter: test_case,
                ..Default::default()
            };
            run_config.browser.headless = !headed;
            run_config.browser.executable_path = browser_path;
            run_config.apply_env(&env);
            run_config.browser.page_timeout_ms = page_timeout;
            run_config.dispatcher.max_session_permit = max_sessions;

            println!(
                "{} Generating from: {}",
                "▶".green().bold(),
                run_config.input_dir.display()
            );
            println!("  Model: {}", settings.qualified_model().cyan());
            println!("  Endpoint: {}", settings.api_base.cyan());
            println!(
                "  Output: {}",
                run_config.output_dir.display().to_string().cyan()
            );
            if let Some(ref name) = run_config.test_case_filter {
                println!("  Test case: {}", name.yellow());
            }
            if attempts > 1 {
                println!("  Attempts: {}", attempts.to_string().yellow());
            }

            let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(&settings)?);
            let renderer = Arc::new(
                WebDriver::new(run_config.browser.clone())
                    .await
                    .context("Failed to start the browser")?,
            );
            let dispatcher = Arc::new(MemoryAdaptiveDispatcher::new(run_config.dispatcher.clone()));
            let crawler: Arc<dyn Crawler> =
                Arc::new(WebCrawler::new(renderer, llm.clone(), dispatcher));

            let (emitter, receiver) = EventEmitter::new();
            let listener = tokio::spawn(ConsoleEventListener::listen(receiver));
            emitter.emit(GenEvent::RunStarted {
                provider: settings.provider.to_string(),
                model: settings.model.clone(),
                input: run_config.input_dir.display().to_string(),
                output: run_config.output_dir.display().to_string(),
            });

            let result = runner::run_generation(&run_config, llm, crawler, &emitter).await;
            drop(emitter);
            let _ = listener.await;

            let summary = result?;
            if summary.failed > 0 {
                std::process::exit(1);
            }
        }

        Commands::Plan {
            refined,
            feature,
            output,
        } => {
            let output_dir = output
                .or_else(|| refined.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));
            let log_path = output_dir.join(lumi_gen::report::plan::PLAN_FILE);

            println!(
                "{} Writing execution outline for: {}",
                "📋".to_string().blue(),
                refined.display()
            );
            let summary = lumi_gen::write_execution_plan(
                &feature.unwrap_or_default(),
                &lumi_gen::utils::fs::absolute(&refined),
                &output_dir,
                &log_path,
            )?;
            println!(
                "{} {} module(s), {} step(s) -> {}",
                "✅".green(),
                summary.modules,
                summary.steps,
                log_path.display()
            );
        }

        Commands::System { command } => match command {
            SystemCommands::Install => {
                install_browsers().await?;
            }
        },
    }

    Ok(())
}
