use thiserror::Error;
use vigil_browser::{ExecutorError, InspectError};

use crate::text_generation::TextGenerationError;

/// Conditions that end a pipeline phase before it reaches a terminal state.
///
/// Test failures are not errors: they are execution results that drive the
/// remediation engine.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
    #[error("no valid scenarios: {0}")]
    NoValidScenarios(String),
    #[error("no valid script: {0}")]
    NoValidScript(String),
    #[error("page failed to load: {url} ({reason})")]
    PageLoadTimeout { url: String, reason: String },
    #[error("artifact store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    /// Fatal errors terminate the process abnormally; the rest are reported
    /// and the phase ends normally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CollaboratorUnavailable(_) | Self::Store(_))
    }
}

impl From<TextGenerationError> for PipelineError {
    fn from(error: TextGenerationError) -> Self {
        Self::CollaboratorUnavailable(error.to_string())
    }
}

impl From<ExecutorError> for PipelineError {
    fn from(error: ExecutorError) -> Self {
        Self::CollaboratorUnavailable(error.to_string())
    }
}

impl From<InspectError> for PipelineError {
    fn from(error: InspectError) -> Self {
        match error {
            InspectError::PageLoadTimeout { url, reason } => Self::PageLoadTimeout { url, reason },
            InspectError::Unavailable(detail) => Self::CollaboratorUnavailable(detail),
            InspectError::InvalidSnapshot(detail) => {
                Self::CollaboratorUnavailable(format!("invalid page snapshot: {detail}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use vigil_browser::InspectError;

    use super::PipelineError;

    #[test]
    fn unit_only_collaborator_and_store_errors_are_fatal() {
        assert!(PipelineError::CollaboratorUnavailable("no key".to_string()).is_fatal());
        assert!(PipelineError::Store(anyhow::anyhow!("disk full")).is_fatal());
        assert!(!PipelineError::NoValidScenarios("empty".to_string()).is_fatal());
        assert!(!PipelineError::NoValidScript("empty".to_string()).is_fatal());
        assert!(!PipelineError::PageLoadTimeout {
            url: "https://example.test".to_string(),
            reason: "slow".to_string(),
        }
        .is_fatal());
    }

    #[test]
    fn unit_inspect_timeout_keeps_url_and_reason() {
        let error = PipelineError::from(InspectError::PageLoadTimeout {
            url: "https://example.test".to_string(),
            reason: "30s elapsed".to_string(),
        });
        assert_eq!(
            error.to_string(),
            "page failed to load: https://example.test (30s elapsed)"
        );
    }
}
