//! Human-readable execution outline and run summary

use std::path::{Path, PathBuf};

use crate::error::GenResult;
use crate::parser::types::TestCase;
use crate::report::types::ExecutionSummary;
use crate::utils::fs::{read_json, write_json_with_indent, write_text, SUMMARY_INDENT};

pub const PLAN_FILE: &str = "execution_plan.log";
pub const SUMMARY_FILE: &str = "execution_summary.json";

/// Render the outline of `test_case`, one line per module header, step and element
pub fn render_execution_plan(
    feature_path: &str,
    refined_data_path: &str,
    test_case: &TestCase,
) -> String {
    let mut lines = vec![
        format!("Feature file: {}", feature_path),
        format!("Refined data: {}", refined_data_path),
        "Execution outline:".to_string(),
    ];

    for (module_idx, module) in test_case.modules.iter().enumerate() {
        lines.push(format!("Module {}: {}", module_idx + 1, module.url));
        lines.push(format!("Purpose: {}", module.purpose));
        for (step_idx, step) in module.execution_steps.iter().enumerate() {
            lines.push(format!("  {}. {}", step_idx + 1, step.step));
            for element in &step.extracted_data {
                lines.push(format!(
                    "    - Element: {} | {} | {}: {}",
                    element.element_type,
                    element.request_description,
                    element.identifier_type,
                    element.identifier_tracking
                ));
            }
        }
    }

    lines.join("\n")
}

/// Read the refined artifact back and write the outline plus `execution_summary.json`
///
/// The summary lands in `output_dir`; the outline at `log_path`.
pub fn write_execution_plan(
    feature_path: &Path,
    refined_data_path: &Path,
    output_dir: &Path,
    log_path: &Path,
) -> GenResult<ExecutionSummary> {
    let test_case: TestCase = read_json(refined_data_path)?;

    let feature = feature_path.display().to_string();
    let refined = refined_data_path.display().to_string();

    write_text(log_path, &render_execution_plan(&feature, &refined, &test_case))?;

    let summary = ExecutionSummary {
        feature_path: feature,
        refined_data_path: refined,
        modules: test_case.modules.len(),
        steps: test_case.step_count(),
    };
    write_json_with_indent(&summary_path(output_dir), &summary, SUMMARY_INDENT)?;

    log::info!(
        "Execution outline saved to {} ({} module(s), {} step(s))",
        log_path.display(),
        summary.modules,
        summary.steps
    );
    Ok(summary)
}

pub fn summary_path(output_dir: &Path) -> PathBuf {
    output_dir.join(SUMMARY_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{Module, StepElement};
    use crate::utils::fs::write_json;
    use tempfile::TempDir;

    fn sample_case() -> TestCase {
        let mut login = Module::new(
            "https://app.test/login",
            "Sign in",
            &["Enter email", "Click Login"],
        );
        login.execution_steps[0].extracted_data = vec![StepElement {
            element_type: "input".into(),
            request_description: "Email field".into(),
            identifier_type: "XPath".into(),
            identifier_tracking: "//input[@name='email']".into(),
        }];
        let home = Module::new("https://app.test/home", "Landing page", &["Verify greeting"]);

        TestCase {
            name: "Login".into(),
            modules: vec![login, home],
        }
    }

    #[test]
    fn test_render_execution_plan() {
        let plan = render_execution_plan("/in/Login.txt", "/out/Refined.json", &sample_case());
        let expected = "\
Feature file: /in/Login.txt
Refined data: /out/Refined.json
Execution outline:
Module 1: https://app.test/login
Purpose: Sign in
  1. Enter email
    - Element: input | Email field | XPath: //input[@name='email']
  2. Click Login
Module 2: https://app.test/home
Purpose: Landing page
  1. Verify greeting";
        assert_eq!(plan, expected);
    }

    #[test]
    fn test_write_execution_plan_counts_from_disk() {
        let dir = TempDir::new().unwrap();
        let refined = dir.path().join("RefinedExtractedData.json");
        write_json(&refined, &sample_case()).unwrap();

        let log_path = dir.path().join("nested").join(PLAN_FILE);
        let summary =
            write_execution_plan(Path::new("/in/Login.txt"), &refined, dir.path(), &log_path)
                .unwrap();

        assert_eq!(summary.modules, 2);
        assert_eq!(summary.steps, 3);
        assert!(log_path.exists());

        let on_disk: ExecutionSummary = read_json(&summary_path(dir.path())).unwrap();
        assert_eq!(on_disk, summary);

        let raw = std::fs::read_to_string(summary_path(dir.path())).unwrap();
        assert!(raw.starts_with("{\n  \"feature_path\": \"/in/Login.txt\""));
        assert!(raw.contains("\n  \"steps\": 3\n}"));
        assert_eq!(on_disk.refined_data_path, refined.display().to_string());
    }

    #[test]
    fn test_write_execution_plan_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let err = write_execution_plan(
            Path::new("f.txt"),
            &dir.path().join("missing.json"),
            dir.path(),
            &dir.path().join(PLAN_FILE),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }
}
