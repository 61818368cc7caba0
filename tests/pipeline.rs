use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use lumi_gen::extract::crawler::{CrawlResult, Crawler};
use lumi_gen::extract::strategy::ExtractionStrategy;
use lumi_gen::llm::client::{ChatRequest, Completion, LlmClient};
use lumi_gen::parser::types::{DispatchStats, ExtractedElement, TestCase, UsageStats};
use lumi_gen::report::types::ExecutionSummary;
use lumi_gen::runner::{run_generation, EventEmitter};
use lumi_gen::utils::config::RunConfig;
use lumi_gen::{GenError, GenResult};

const DECOMPOSED: &str = r#"{
    "testCase": "Checkout",
    "modules": [
        {
            "url": "https://shop.test/login",
            "purpose": "Sign in",
            "execution_steps": [
                {"step": "Enter email", "extracted_data": []},
                {"step": "Click Login", "extracted_data": []}
            ]
        },
        {
            "url": "https://shop.test/cart",
            "purpose": "Review cart",
            "execution_steps": [
                {"step": "Click Checkout", "extracted_data": []}
            ]
        },
        {
            "url": "https://offline.test/receipt",
            "purpose": "Receipt",
            "execution_steps": [
                {"step": "Verify receipt", "extracted_data": []}
            ]
        }
    ]
}"#;

/// Answers decomposition requests; inputs mentioning "broken" get non-JSON
struct FakeLlm;

#[async_trait]
impl LlmClient for FakeLlm {
    fn model(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: ChatRequest) -> GenResult<Completion> {
        let user = &request.messages[1].content;
        let content = if user.contains("broken") {
            "I cannot help with that".to_string()
        } else {
            DECOMPOSED.to_string()
        };
        Ok(Completion {
            content,
            usage: UsageStats {
                prompt_tokens: 100,
                completion_tokens: 50,
                total_tokens: 150,
                ..Default::default()
            },
        })
    }
}

/// An endpoint that refuses every connection
#[derive(Default)]
struct UnreachableLlm {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for UnreachableLlm {
    fn model(&self) -> &str {
        "unreachable"
    }

    async fn complete(&self, _request: ChatRequest) -> GenResult<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GenError::Llm("error sending request: connection refused".into()))
    }
}

/// Returns one element per known step; the offline host always fails
#[derive(Default)]
struct FakeCrawler {
    attempts: AtomicUsize,
    calls: AtomicUsize,
}

fn element(step: &str, xpath: &str) -> ExtractedElement {
    ExtractedElement {
        element_type: "button".into(),
        request_description: format!("Control for {step}"),
        identifier_type: "XPath".into(),
        identifier_tracking: xpath.into(),
        step_name: step.into(),
    }
}

#[async_trait]
impl Crawler for FakeCrawler {
    fn begin_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    async fn crawl_many(&self, urls: &[String], strategy: &ExtractionStrategy) -> Vec<CrawlResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let refining = strategy.instruction.contains("ALREADY EXTRACTED");

        urls.iter()
            .map(|url| {
                if url.contains("offline") {
                    return CrawlResult {
                        url: url.clone(),
                        success: false,
                        error_message: Some("net::ERR_CONNECTION_REFUSED".into()),
                        ..Default::default()
                    };
                }

                let suffix = if refining { "-refined" } else { "" };
                let extracted = if url.ends_with("/login") {
                    vec![
                        element("Enter email", &format!("//input[@name='email']{suffix}")),
                        element("Click Login", &format!("//button[@id='login']{suffix}")),
                    ]
                } else {
                    // The second element names a step that does not exist
                    vec![
                        element("Click Checkout", &format!("//button[@id='checkout']{suffix}")),
                        element("Apply coupon", "//input[@id='coupon']"),
                    ]
                };

                CrawlResult {
                    url: url.clone(),
                    success: true,
                    error_message: None,
                    extracted,
                    usage: Some(UsageStats {
                        total_tokens: 42,
                        ..Default::default()
                    }),
                    dispatch: Some(DispatchStats {
                        memory_usage_mb: 2.0,
                        peak_memory_mb: 150.0,
                        start_time: "2024-05-01T10:00:00.000000".into(),
                        end_time: "2024-05-01T10:00:01.250000".into(),
                        duration_seconds: 1.25,
                    }),
                }
            })
            .collect()
    }
}

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&raw).unwrap()
}

fn setup(files: &[(&str, &str)]) -> (TempDir, RunConfig) {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("TestCaseExamples");
    std::fs::create_dir_all(&input).unwrap();
    for (name, content) in files {
        std::fs::write(input.join(name), content).unwrap();
    }

    let config = RunConfig {
        input_dir: input,
        output_dir: dir.path().join("TestCases"),
        ..Default::default()
    };
    (dir, config)
}

#[tokio::test]
async fn test_full_run_writes_consistent_artifacts() {
    let (_dir, config) = setup(&[(
        "Checkout.txt",
        "Log in at https://shop.test/login, check out from the cart, verify the receipt.",
    )]);
    let crawler = Arc::new(FakeCrawler::default());

    let summary = run_generation(
        &config,
        Arc::new(FakeLlm),
        crawler.clone(),
        &EventEmitter::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.test_cases, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.modules, 3);
    // Extraction and refinement both fail for the offline module
    assert_eq!(summary.crawl_failures, 2);
    assert_eq!(crawler.calls.load(Ordering::SeqCst), 6);
    assert_eq!(crawler.attempts.load(Ordering::SeqCst), 1);

    let root = config.output_dir.join("Checkout");
    let decomposed: TestCase = read(&root.join("RefinedCheckout.json"));
    assert_eq!(decomposed.modules.len(), 3);
    assert!(decomposed.modules.iter().all(|m| m.token.is_none()));

    let attempt = root.join("1.Checkout");
    let extracted: TestCase = read(&attempt.join("ExtractedData.json"));
    let refined: TestCase = read(&attempt.join("RefinedExtractedData.json"));
    let summary_file: ExecutionSummary = read(&attempt.join("execution_summary.json"));

    // Artifact round-trip
    assert_eq!(summary_file.modules, refined.modules.len());
    assert_eq!(summary_file.steps, refined.step_count());
    assert!(Path::new(&summary_file.refined_data_path).is_absolute());
    assert!(summary_file.feature_path.ends_with("Checkout.txt"));

    // Login: everything placed, flat list gone
    let login = &refined.modules[0];
    assert!(login.extracted_data.is_none());
    assert_eq!(login.token.as_ref().unwrap().total_tokens, 42);
    assert_eq!(login.dispatcher.as_ref().unwrap().duration_seconds, 1.25);
    assert_eq!(
        login.execution_steps[1].extracted_data[0].identifier_tracking,
        "//button[@id='login']-refined"
    );

    // Cart: one element names an unknown step and keeps the flat list
    let cart = &refined.modules[1];
    assert_eq!(cart.execution_steps[0].extracted_data.len(), 1);
    assert_eq!(cart.extracted_data.as_ref().unwrap().len(), 2);

    // Receipt: crawl failed, module untouched
    let receipt = &refined.modules[2];
    assert!(receipt.extracted_data.is_none());
    assert!(receipt.token.is_none());
    assert!(receipt.execution_steps[0].extracted_data.is_empty());

    // First pass keeps its own locators
    assert_eq!(
        extracted.modules[0].execution_steps[0].extracted_data[0].identifier_tracking,
        "//input[@name='email']"
    );

    let plan = std::fs::read_to_string(attempt.join("execution_plan.log")).unwrap();
    assert!(plan.starts_with("Feature file: "));
    assert!(plan.contains("Module 2: https://shop.test/cart"));
    assert!(plan.contains(
        "    - Element: button | Control for Click Checkout | XPath: //button[@id='checkout']-refined"
    ));
}

#[tokio::test]
async fn test_bad_decomposition_skips_only_that_file() {
    let (_dir, config) = setup(&[
        ("A_broken.txt", "this one is broken"),
        ("B_good.txt", "Log in and check out"),
    ]);

    let summary = run_generation(
        &config,
        Arc::new(FakeLlm),
        Arc::new(FakeCrawler::default()),
        &EventEmitter::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.test_cases, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.succeeded, 1);
    assert!(!config.output_dir.join("A_broken").exists());
    assert!(config
        .output_dir
        .join("B_good/1.B_good/RefinedExtractedData.json")
        .exists());
}

#[tokio::test]
async fn test_attempts_and_filter() {
    let (_dir, mut config) = setup(&[("One.txt", "first"), ("Two.txt", "second")]);
    config.attempts = 2;
    config.test_case_filter = Some("Two".into());
    let crawler = Arc::new(FakeCrawler::default());

    let summary = run_generation(
        &config,
        Arc::new(FakeLlm),
        crawler.clone(),
        &EventEmitter::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.test_cases, 1);
    assert_eq!(crawler.attempts.load(Ordering::SeqCst), 2);
    assert!(!config.output_dir.join("One").exists());
    for n in 1..=2 {
        let dir = config.output_dir.join(format!("Two/{n}.Two"));
        assert!(dir.join("ExtractedData.json").exists());
        assert!(dir.join("execution_plan.log").exists());
    }
}

#[tokio::test]
async fn test_missing_input_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = RunConfig {
        input_dir: dir.path().join("nope"),
        output_dir: dir.path().join("out"),
        ..Default::default()
    };

    let result = run_generation(
        &config,
        Arc::new(FakeLlm),
        Arc::new(FakeCrawler::default()),
        &EventEmitter::default(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_unreachable_llm_stops_the_run() {
    let (_dir, config) = setup(&[
        ("A.txt", "first"),
        ("B.txt", "second"),
        ("C.txt", "third"),
    ]);
    let llm = Arc::new(UnreachableLlm::default());
    let crawler = Arc::new(FakeCrawler::default());

    let result = run_generation(
        &config,
        llm.clone(),
        crawler.clone(),
        &EventEmitter::default(),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GenError>(),
        Some(GenError::Llm(_))
    ));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    assert_eq!(crawler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_artifact_write_failure_stops_the_run() {
    let (_dir, config) = setup(&[("A.txt", "first"), ("B.txt", "second")]);
    std::fs::create_dir_all(&config.output_dir).unwrap();
    // A regular file where the test case directory should go
    std::fs::write(config.output_dir.join("A"), "not a directory").unwrap();

    let result = run_generation(
        &config,
        Arc::new(FakeLlm),
        Arc::new(FakeCrawler::default()),
        &EventEmitter::default(),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GenError>(),
        Some(GenError::FileSystem { .. })
    ));
    assert!(!config.output_dir.join("B").exists());
}
