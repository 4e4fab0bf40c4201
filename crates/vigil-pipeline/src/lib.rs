//! Test-execution orchestration and remediation for Vigil.
//!
//! Turns inspected pages into scenario documents, scenario documents into
//! Playwright scripts, and failing runs into a bounded classify/repair/retry
//! episode whose on-disk artifacts stay consistent across re-runs.

pub mod artifact_store;
pub mod classifier;
pub mod cleanup;
pub mod dedup;
mod error;
pub mod generated_text;
pub mod layout;
pub mod pipeline;
mod prompts;
pub mod remediation;
pub mod runner;
pub mod scenario;
pub mod scenario_generator;
pub mod summary;
pub mod synthesizer;
pub mod text_generation;

pub use artifact_store::{ArtifactStore, RetryCounter};
pub use classifier::{
    Classification, FailureCategory, FailureClassifier, FailureVerdict, FixSource, VerdictParse,
};
pub use cleanup::{CleanupCoordinator, CleanupReport};
pub use dedup::{load_existing, ExistingScenarios};
pub use error::PipelineError;
pub use layout::ArtifactLayout;
pub use pipeline::{Collaborators, ExecutionReport, Pipeline, RunReport, ScriptSource};
pub use remediation::{
    FixDecision, RemediationEngine, RemediationOutcome, RemediationReport, MAX_RETRY,
};
pub use runner::{ExecutionResult, ExecutionRunner};
pub use scenario::{ScenarioBlock, ScenarioCategory, ScenarioRecord};
pub use scenario_generator::{GenerationReport, ScenarioGenerator};
pub use summary::{ExecutionSummary, FinalStatus};
pub use synthesizer::{ExtractionStrategy, ScriptArtifact, ScriptSynthesizer};
pub use text_generation::{LlmTextGenerator, TextGenerationError, TextGenerator};
