use crate::report::types::RunSummary;
use crate::runner::reconcile::ReconcileOutcome;
use crate::runner::stages::Stage;
use tokio::sync::broadcast;

/// Generation events for real-time updates
#[derive(Debug, Clone)]
pub enum GenEvent {
    // Run events
    RunStarted {
        provider: String,
        model: String,
        input: String,
        output: String,
    },
    RunFinished {
        summary: RunSummary,
    },

    // Test case events
    TestCaseStarted {
        name: String,
        path: String,
    },
    Decomposed {
        name: String,
        modules: usize,
        steps: usize,
    },
    TestCaseFailed {
        name: String,
        error: String,
    },
    TestCaseFinished {
        name: String,
        duration_ms: u64,
    },
    AttemptStarted {
        attempt: u32,
        attempts: u32,
    },

    // Module stage events
    StageStarted {
        module: usize,
        module_count: usize,
        url: String,
        stage: Stage,
    },
    StageFinished {
        module: usize,
        stage: Stage,
        outcome: Result<ReconcileOutcome, String>,
        duration_ms: u64,
    },

    ArtifactWritten {
        path: String,
    },
}

/// Event emitter for broadcasting generation events
pub struct EventEmitter {
    sender: broadcast::Sender<GenEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<GenEvent>) {
        let (sender, receiver) = broadcast::channel(100);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: GenEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<GenEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            // Piped output gets no terminal escape codes
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut stage_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("Console listener skipped {} event(s)", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                GenEvent::RunStarted {
                    provider,
                    model,
                    input,
                    output,
                } => {
                    multi
                        .println(format!(
                            "\n{} Generating test data with {}/{}",
                            "▶".green().bold(),
                            provider.cyan(),
                            model.cyan()
                        ))
                        .ok();
                    multi.println(format!("  Input: {}", input)).ok();
                    multi.println(format!("  Output: {}", output)).ok();
                }

                GenEvent::RunFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish();
                    }
                    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

                    println!("\n{} Generation finished", "■".blue().bold());
                    println!("  Test cases: {}", summary.test_cases);
                    println!(
                        "  {} succeeded, {} failed",
                        summary.succeeded.to_string().green(),
                        summary.failed.to_string().red()
                    );
                    println!(
                        "  Modules: {} ({} crawl failure(s))",
                        summary.modules,
                        summary.crawl_failures.to_string().yellow()
                    );
                    println!("  Duration: {}ms", summary.total_duration_ms);
                    break;
                }

                GenEvent::TestCaseStarted { name, path } => {
                    println!(
                        "\n  {} Test case: {} ({})",
                        "→".blue(),
                        name.white().bold(),
                        path.dimmed()
                    );
                }

                GenEvent::Decomposed {
                    modules, steps, ..
                } => {
                    println!(
                        "    {} Split into {} module(s), {} step(s)",
                        "✓".green(),
                        modules,
                        steps
                    );
                }

                GenEvent::TestCaseFailed { name, error } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("  {} Test case {} [{}]", "←".blue(), name, "FAILED".red().bold());
                    println!("    {}", error.red());
                }

                GenEvent::TestCaseFinished { name, duration_ms } => {
                    println!(
                        "  {} Test case {} [{}]",
                        "←".blue(),
                        name,
                        "DONE".green().bold()
                    );
                    println!("    Duration: {}ms", duration_ms);
                }

                GenEvent::AttemptStarted { attempt, attempts } => {
                    println!("    {} Attempt {}/{}", "↻".cyan(), attempt, attempts);
                }

                GenEvent::StageStarted {
                    module,
                    module_count,
                    url,
                    stage,
                } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("      {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }

                    let body = format!(
                        "[{}/{}] {} {}... ",
                        module,
                        module_count,
                        stage.label(),
                        url.dimmed()
                    );
                    pb.set_message(body.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));

                    spinner = Some(pb);
                    stage_text = body;
                }

                GenEvent::StageFinished {
                    outcome,
                    duration_ms,
                    ..
                } => {
                    let done_msg = match outcome {
                        Ok(counts) if counts.unplaced() == 0 => format!(
                            "      {} {}({} element(s), {}ms)",
                            "✓".green(),
                            stage_text,
                            counts.placed,
                            duration_ms
                        ),
                        Ok(counts) => format!(
                            "      {} {}({}/{} placed, {}ms)",
                            "⚠".yellow(),
                            stage_text,
                            counts.placed,
                            counts.total,
                            duration_ms
                        ),
                        Err(reason) => format!(
                            "      {} {}({}, {}ms)",
                            "✗".red(),
                            stage_text,
                            reason.dimmed(),
                            duration_ms
                        ),
                    };

                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                    }
                    println!("{}", done_msg);
                }

                GenEvent::ArtifactWritten { path } => {
                    multi
                        .println(format!("      {} {}", "💾", path.dimmed()))
                        .ok();
                }
            }
        }
    }
}
