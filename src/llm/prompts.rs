use crate::parser::types::Module;
use crate::utils::fs::to_pretty_json;

/// System + user prompt pair
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/* ============================================================
   Module decomposition
   ============================================================ */

pub fn decomposition_prompt(test_case: &str) -> Prompt {
    let system = r#"
You are a highly skilled software test automation engineer. Analyze the high-level test case
given by the user and break it into well-separated modules. Each module represents one web page,
identified by its full URL.

OBJECTIVE:
- Break the test case into a list of modules.
- Each module groups the actions performed on a single page (same URL).
- An action that navigates to another page is the final step of its module.
- The next module starts with the new URL.

RULES:
- Do NOT omit any URL. Every page transition must carry its full URL.
- Every action or verification in the test case MUST be assigned to exactly one module.
- No step may be left out or described outside of the modules.

STRUCTURE PER MODULE:
- url: full URL of the page, including 'https://'
- purpose: short description of the page's role in the test
- execution_steps: list of objects with
    - step: the user action or verification
    - extracted_data: ALWAYS an empty list at this stage

MODEL SCHEMA:
TestCaseModel:
  testCase: str
  modules: List[ModuleModel]
ModuleModel:
  url: str
  purpose: str
  execution_steps: List[ExecutionStepModel]
ExecutionStepModel:
  step: str
  extracted_data: List (leave it empty)

EXAMPLE:
- If a step says 'Click Login', it ends the current module.
- If the next step says 'Enter username and password', a new module starts with the login page URL.

Return only clean JSON matching the schema above.
"#
    .trim()
    .to_string();

    let user = format!("Test Case:\n{}", test_case.trim());

    Prompt { system, user }
}

/* ============================================================
   Element extraction (first pass)
   ============================================================ */

pub fn extraction_instruction(module: &Module) -> String {
    format!(
        r#"You are a QA test automation manager. Extract only the HTML elements required to execute the following module of a test case:

{module}

Each entry of `execution_steps` holds a `step` description. Analyze the HTML of the page and extract the elements required to execute that step.

Output: a JSON list of element objects, for example:
[
    {{
        "type": "input",
        "request_description": "Field to enter the user's name",
        "identifier_type": "XPath",
        "identifier_tracking": "//*[@id='form']/input[1]",
        "step_name": "Enter incorrect email address and password"
    }},
    {{
        "type": "input",
        "request_description": "Field to enter the user's email",
        "identifier_type": "XPath",
        "identifier_tracking": "//*[@id='form']/input[2]",
        "step_name": "Enter incorrect email address and password"
    }}
]

Notes:
- Only include elements required to execute this test case. Do not inventory the page.
- `step_name` must repeat the text of its step exactly.
- Be precise and avoid redundancy."#,
        module = module_context(module)
    )
}

/* ============================================================
   Element refinement (second pass)
   ============================================================ */

pub fn refinement_instruction(module: &Module) -> String {
    format!(
        r#"You are a highly skilled software tester specialized in end-to-end automation.

Your task is to analyze and refine a list of ALREADY EXTRACTED elements of a test module.

Constraints:
- DO NOT add new elements unless absolutely necessary.
- DO NOT remove existing ones unless absolutely necessary.
- Your role is to make the elements already found accurate and reliable.

Focus:
- Check that each element's `identifier_tracking` (XPath) identifies it correctly and uniquely.
- Improve a locator only when needed to correct it or make it less fragile.
- Check that `type`, `request_description` and `step_name` describe the element and its use.
- Follow best practices for XPath and element identification in automated tests.

Module with the extracted data to review:
{module}

Return ONLY the improved list of element objects, each with "type", "request_description",
"identifier_type", "identifier_tracking" and "step_name"."#,
        module = module_context(module)
    )
}

/// Module rendered for prompt context
fn module_context(module: &Module) -> String {
    to_pretty_json(module).unwrap_or_else(|_| format!("{:?}", module))
}
