//! Parsing of model output into the test case structures
//!
//! Models wrap JSON in Markdown fences, return objects where an array was asked
//! for, and occasionally drop fields. Everything here is best-effort where the
//! data is per-element and strict where the whole structure is at stake.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{GenError, GenResult};
use crate::parser::types::{ExtractedElement, TestCase};

fn scheme_regex() -> &'static Regex {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    SCHEME.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").unwrap())
}

/// Remove a surrounding ```json ... ``` fence if present
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string ("json", "JSON", ...)
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse the decomposition output into a [`TestCase`]
///
/// Step-level `extracted_data` is cleared since it is only filled by reconciliation,
/// and scheme-less module URLs get `https://`.
pub fn parse_test_case(content: &str) -> GenResult<TestCase> {
    let body = strip_code_fences(content);
    let mut test_case: TestCase = serde_json::from_str(body)
        .map_err(|e| GenError::SchemaValidation(format!("test case does not match schema: {e}")))?;

    if test_case.modules.is_empty() {
        log::warn!("Test case '{}' was decomposed into zero modules", test_case.name);
    }

    for module in &mut test_case.modules {
        module.url = normalize_url(&module.url);
        for step in &mut module.execution_steps {
            if !step.extracted_data.is_empty() {
                log::warn!(
                    "Discarding {} element(s) the model attached to step '{}' during decomposition",
                    step.extracted_data.len(),
                    step.step
                );
                step.extracted_data.clear();
            }
        }
        module.extracted_data = None;
        module.token = None;
        module.dispatcher = None;
    }

    Ok(test_case)
}

/// Ensure the URL carries a scheme
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if scheme_regex().is_match(url) {
        url.to_string()
    } else {
        log::warn!("Module URL '{}' has no scheme, assuming https", url);
        format!("https://{}", url.trim_start_matches('/'))
    }
}

/// Parse an extraction answer into element descriptors
///
/// Accepts a bare array, or an object holding the array (under `elements`
/// or, failing that, the first array-valued key). Items missing required
/// fields are dropped.
pub fn parse_elements(content: &str) -> GenResult<Vec<ExtractedElement>> {
    let body = strip_code_fences(content);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GenError::SchemaValidation(format!("extraction output is not JSON: {e}")))?;

    let items = find_item_array(value).ok_or_else(|| {
        GenError::SchemaValidation("extraction output holds no element array".to_string())
    })?;

    let mut elements = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<ExtractedElement>(item) {
            Ok(el) => elements.push(el),
            Err(e) => log::warn!("Dropping extracted item #{}: {}", idx, e),
        }
    }
    Ok(elements)
}

fn find_item_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove("elements") {
                return Some(items);
            }
            map.into_iter().find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
    }

    #[test]
    fn test_parse_test_case_normalizes() {
        let content = r#"```json
{
  "testCase": "Checkout",
  "modules": [
    {
      "url": "shop.example.com/cart",
      "purpose": "Review cart",
      "execution_steps": [
        {"step": "Click Checkout", "extracted_data": [
          {"type": "button", "request_description": "x", "identifier_type": "XPath",
           "identifier_tracking": "//button", "step_name": "Click Checkout"}
        ]}
      ]
    }
  ]
}
```"#;
        let tc = parse_test_case(content).unwrap();
        assert_eq!(tc.modules[0].url, "https://shop.example.com/cart");
        assert!(tc.modules[0].execution_steps[0].extracted_data.is_empty());
    }

    #[test]
    fn test_parse_test_case_rejects_bad_schema() {
        let err = parse_test_case(r#"{"testCase": "x", "modules": [{"url": "https://a"}]}"#)
            .unwrap_err();
        assert!(matches!(err, GenError::SchemaValidation(_)));

        let err = parse_test_case("I could not do that").unwrap_err();
        assert!(matches!(err, GenError::SchemaValidation(_)));
    }

    #[test]
    fn test_normalize_url_keeps_scheme() {
        assert_eq!(normalize_url("http://localhost:3000/"), "http://localhost:3000/");
        assert_eq!(normalize_url(" https://a.test "), "https://a.test");
        assert_eq!(normalize_url("//a.test/x"), "https://a.test/x");
    }

    #[test]
    fn test_parse_elements_shapes() {
        let item = r#"{"type": "input", "request_description": "Email", "identifier_type": "XPath",
                       "identifier_tracking": "//input[1]", "step_name": "Enter email"}"#;

        let bare = parse_elements(&format!("[{item}]")).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = parse_elements(&format!(r#"{{"elements": [{item}, {item}]}}"#)).unwrap();
        assert_eq!(wrapped.len(), 2);

        let other_key = parse_elements(&format!(r#"{{"label": "x", "items": [{item}]}}"#)).unwrap();
        assert_eq!(other_key[0].step_name, "Enter email");
    }

    #[test]
    fn test_parse_elements_drops_incomplete_items() {
        let content = r#"[
            {"type": "button", "request_description": "Submit", "identifier_type": "XPath",
             "identifier_tracking": "//button", "step_name": "Submit form"},
            {"type": "button", "request_description": "No locator", "step_name": "Submit form"},
            "garbage"
        ]"#;
        let elements = parse_elements(content).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].request_description, "Submit");
    }

    #[test]
    fn test_parse_elements_without_array() {
        let err = parse_elements(r#"{"label": "nothing"}"#).unwrap_err();
        assert!(matches!(err, GenError::SchemaValidation(_)));
    }
}
