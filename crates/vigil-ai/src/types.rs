use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One prompt sent to a model. Vigil never holds a conversation: every
/// scenario, script, analysis, and fix is a fresh single-turn request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system_instruction: None,
            temperature: None,
            max_output_tokens: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Text the model produced for a [`GenerationRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Generation {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: TokenUsage,
}

impl Generation {
    /// True when the model stopped at its output limit; scripts cut off this
    /// way usually fail extraction.
    pub fn is_truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("MAX_TOKENS")
    }
}

#[derive(Debug, Error)]
pub enum VigilAiError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("prompt blocked by provider: {0}")]
    Blocked(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Async text-generation backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: GenerationRequest) -> Result<Generation, VigilAiError>;
}

#[cfg(test)]
mod tests {
    use super::{Generation, GenerationRequest, TokenUsage};

    #[test]
    fn unit_request_builder_leaves_optional_fields_unset() {
        let request = GenerationRequest::new("gemini-2.0-flash", "hello");
        assert_eq!(request.model, "gemini-2.0-flash");
        assert_eq!(request.prompt, "hello");
        assert!(request.system_instruction.is_none());
        assert!(request.max_output_tokens.is_none());

        let request = request.with_temperature(Some(0.2));
        assert_eq!(request.temperature, Some(0.2));
    }

    #[test]
    fn unit_truncation_follows_finish_reason() {
        let mut generation = Generation {
            text: "test('TC001".to_string(),
            finish_reason: Some("MAX_TOKENS".to_string()),
            usage: TokenUsage::default(),
        };
        assert!(generation.is_truncated());
        generation.finish_reason = Some("STOP".to_string());
        assert!(!generation.is_truncated());
    }
}
