use std::sync::Arc;

use thiserror::Error;
use vigil_ai::{GenerationRequest, LlmClient};

#[derive(Debug, Error)]
#[error("text generation failed: {0}")]
pub struct TextGenerationError(pub String);

/// Trait contract for the text-generation collaborator.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, TextGenerationError>;
}

/// Blocking adapter over an async [`LlmClient`].
///
/// Owns a current-thread runtime so callers stay synchronous; must not be
/// used from inside another Tokio runtime.
pub struct LlmTextGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
    runtime: tokio::runtime::Runtime,
}

impl LlmTextGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
    ) -> Result<Self, TextGenerationError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                TextGenerationError(format!("failed to start generation runtime: {error}"))
            })?;
        Ok(Self {
            client,
            model: model.into(),
            temperature: None,
            runtime,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl TextGenerator for LlmTextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, TextGenerationError> {
        let request =
            GenerationRequest::new(self.model.clone(), prompt).with_temperature(self.temperature);
        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "requesting completion");

        let generation = self
            .runtime
            .block_on(self.client.complete(request))
            .map_err(|error| TextGenerationError(error.to_string()))?;
        if generation.is_truncated() {
            tracing::warn!(model = %self.model, "completion hit the output token limit");
        }
        let text = generation.text.trim().to_string();
        if text.is_empty() {
            return Err(TextGenerationError(format!(
                "model '{}' returned an empty completion",
                self.model
            )));
        }
        Ok(text)
    }
}
