//! JSON schemas handed to the model for structured answers.

use serde_json::{json, Value};

pub const TEST_CASE_SCHEMA_NAME: &str = "TestCaseModel";
pub const ELEMENT_SCHEMA_NAME: &str = "ExtractedElement";

/// Schema of one extracted element descriptor
pub fn element_schema() -> Value {
    json!({
        "title": ELEMENT_SCHEMA_NAME,
        "type": "object",
        "properties": {
            "type": {
                "type": "string",
                "description": "HTML element type, e.g. 'input', 'button', 'select'."
            },
            "request_description": {
                "type": "string",
                "description": "What the element asks from the user, e.g. 'Enter your First Name'."
            },
            "identifier_type": {
                "type": "string",
                "description": "Locator strategy. Prefer 'XPath'; ID, name or another unique attribute are allowed."
            },
            "identifier_tracking": {
                "type": "string",
                "description": "Exact locator value. For XPath, the full and correct path, e.g. '//*[@id=\"root\"]/div/form/input[2]'."
            },
            "step_name": {
                "type": "string",
                "description": "Text of the test case step that uses this element, copied verbatim."
            }
        },
        "required": [
            "type",
            "request_description",
            "identifier_type",
            "identifier_tracking",
            "step_name"
        ]
    })
}

/// Schema of the decomposed test case
pub fn test_case_schema() -> Value {
    json!({
        "title": TEST_CASE_SCHEMA_NAME,
        "type": "object",
        "properties": {
            "testCase": {
                "type": "string",
                "description": "Test case name."
            },
            "modules": {
                "type": "array",
                "description": "One module per page (URL) visited by the test case, in visiting order.",
                "items": {
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Full URL of the page, including the scheme (e.g. 'https://')."
                        },
                        "purpose": {
                            "type": "string",
                            "description": "Short description of the page's role in the test case."
                        },
                        "execution_steps": {
                            "type": "array",
                            "description": "User actions and verifications performed on this page, in order.",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "step": {
                                        "type": "string",
                                        "description": "The user action or verification."
                                    },
                                    "extracted_data": {
                                        "type": "array",
                                        "description": "Always empty at this stage.",
                                        "items": element_schema()
                                    }
                                },
                                "required": ["step", "extracted_data"]
                            }
                        }
                    },
                    "required": ["url", "purpose", "execution_steps"]
                }
            }
        },
        "required": ["testCase", "modules"]
    })
}
