use serde::{Deserialize, Deserializer, Serialize};

/// A test case split into page-scoped modules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Test case name
    #[serde(rename = "testCase")]
    pub name: String,

    /// Modules in page-visitation order
    pub modules: Vec<Module>,
}

impl TestCase {
    /// Total number of execution steps across all modules
    pub fn step_count(&self) -> usize {
        self.modules.iter().map(|m| m.execution_steps.len()).sum()
    }
}

/// All actions performed on a single page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Page URL, always carrying a URI scheme
    pub url: String,

    /// Role of the page in the test case
    pub purpose: String,

    /// Actions and verifications in execution order
    pub execution_steps: Vec<ExecutionStep>,

    /// Flat extraction output, present until every element is placed on a step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Vec<ExtractedElement>>,

    /// LLM token usage of the last extraction pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<UsageStats>,

    /// Dispatch timing/memory of the last extraction pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatcher: Option<DispatchStats>,
}

impl Module {
    pub fn new(url: &str, purpose: &str, steps: &[&str]) -> Self {
        Self {
            url: url.to_string(),
            purpose: purpose.to_string(),
            execution_steps: steps.iter().map(|s| ExecutionStep::new(s)).collect(),
            extracted_data: None,
            token: None,
            dispatcher: None,
        }
    }

    /// Number of elements assigned to steps
    pub fn placed_element_count(&self) -> usize {
        self.execution_steps
            .iter()
            .map(|s| s.extracted_data.len())
            .sum()
    }
}

/// One user action or verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub step: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub extracted_data: Vec<StepElement>,
}

impl ExecutionStep {
    pub fn new(step: &str) -> Self {
        Self {
            step: step.to_string(),
            extracted_data: Vec::new(),
        }
    }
}

/// Element descriptor as produced by the extraction model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedElement {
    /// HTML element type (input, button, select, ...)
    #[serde(rename = "type")]
    pub element_type: String,

    /// What the element asks from the user
    pub request_description: String,

    /// Locator strategy, preferably XPath
    pub identifier_type: String,

    /// Locator value
    pub identifier_tracking: String,

    /// Text of the step that uses this element
    pub step_name: String,
}

impl ExtractedElement {
    /// Drop `step_name`, which becomes implicit once nested under its step
    pub fn project(&self) -> StepElement {
        StepElement {
            element_type: self.element_type.clone(),
            request_description: self.request_description.clone(),
            identifier_type: self.identifier_type.clone(),
            identifier_tracking: self.identifier_tracking.clone(),
        }
    }
}

/// Element descriptor nested under its owning step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub request_description: String,
    pub identifier_type: String,
    pub identifier_tracking: String,
}

/// Token usage reported by the LLM endpoint (pass-through)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub completion_tokens_details: Option<serde_json::Value>,
    #[serde(default)]
    pub prompt_tokens_details: Option<serde_json::Value>,
}

impl UsageStats {
    /// Add another usage record into this one
    pub fn accumulate(&mut self, other: &UsageStats) {
        self.completion_tokens += other.completion_tokens;
        self.prompt_tokens += other.prompt_tokens;
        self.total_tokens += other.total_tokens;
        if other.completion_tokens_details.is_some() {
            self.completion_tokens_details = other.completion_tokens_details.clone();
        }
        if other.prompt_tokens_details.is_some() {
            self.prompt_tokens_details = other.prompt_tokens_details.clone();
        }
    }
}

/// Timing and memory of one dispatched crawl (pass-through)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchStats {
    #[serde(rename = "memory_usage_MB")]
    pub memory_usage_mb: f64,
    #[serde(rename = "peak_memory_MB")]
    pub peak_memory_mb: f64,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_case_field_names() {
        let json = r#"{
            "testCase": "Login",
            "modules": [{
                "url": "https://example.com/login",
                "purpose": "Sign in",
                "execution_steps": [
                    {"step": "Enter email", "extracted_data": []},
                    {"step": "Click Login", "extracted_data": null},
                    {"step": "See dashboard"}
                ]
            }]
        }"#;

        let tc: TestCase = serde_json::from_str(json).unwrap();
        assert_eq!(tc.name, "Login");
        assert_eq!(tc.step_count(), 3);
        assert!(tc.modules[0].extracted_data.is_none());

        let out = serde_json::to_value(&tc).unwrap();
        assert!(out.get("testCase").is_some());
        assert!(out["modules"][0].get("extracted_data").is_none());
        assert!(out["modules"][0].get("token").is_none());
        assert_eq!(
            out["modules"][0]["execution_steps"][2]["extracted_data"],
            serde_json::json!([])
        );
    }

    #[test]
    fn test_element_uses_type_key() {
        let el = ExtractedElement {
            element_type: "input".into(),
            request_description: "Email".into(),
            identifier_type: "XPath".into(),
            identifier_tracking: "//input[@id='email']".into(),
            step_name: "Enter email".into(),
        };
        let v = serde_json::to_value(el.project()).unwrap();
        assert_eq!(v["type"], "input");
        assert!(v.get("step_name").is_none());
    }

    #[test]
    fn test_dispatch_stats_keys() {
        let stats = DispatchStats {
            memory_usage_mb: 120.5,
            peak_memory_mb: 130.0,
            start_time: "2024-01-01T10:00:00".into(),
            end_time: "2024-01-01T10:00:02".into(),
            duration_seconds: 2.0,
        };
        let v = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["memory_usage_MB"], 120.5);
        assert_eq!(v["peak_memory_MB"], 130.0);
    }

    #[test]
    fn test_usage_accumulate() {
        let mut total = UsageStats::default();
        total.accumulate(&UsageStats {
            completion_tokens: 10,
            prompt_tokens: 100,
            total_tokens: 110,
            ..Default::default()
        });
        total.accumulate(&UsageStats {
            completion_tokens: 5,
            prompt_tokens: 50,
            total_tokens: 55,
            prompt_tokens_details: Some(serde_json::json!({"cached_tokens": 0})),
            ..Default::default()
        });
        assert_eq!(total.total_tokens, 165);
        assert_eq!(total.prompt_tokens, 150);
        assert!(total.prompt_tokens_details.is_some());
    }
}
