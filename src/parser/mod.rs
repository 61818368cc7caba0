pub mod input;
pub mod json;
pub mod types;

pub use types::{ExecutionStep, ExtractedElement, Module, StepElement, TestCase};
