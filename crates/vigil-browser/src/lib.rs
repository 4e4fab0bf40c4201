//! Browser-facing process collaborators for Vigil.
//!
//! Wraps the page-inspection helper and the Playwright test runner behind
//! synchronous traits so the pipeline can swap them for fakes in tests.

pub mod page_inspection;
mod process;
pub mod test_execution;

pub use page_inspection::{
    ButtonElement, CommandPageInspector, InputElement, InspectError, LinkElement, PageInspector,
    PageSnapshot,
};
pub use process::{parse_command_line, CommandLine};
pub use test_execution::{
    ExecutionOutcome, ExecutionTarget, ExecutorError, PlaywrightTestExecutor, TestExecutor,
};
