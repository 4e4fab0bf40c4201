use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::retry::{
    is_retryable_http_error, new_request_id, parse_retry_after_ms, should_retry_status,
    RetryPolicy,
};
use crate::{Generation, GenerationRequest, LlmClient, TokenUsage, VigilAiError};

pub const DEFAULT_GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_budget_ms: u64,
    pub retry_jitter: bool,
}

/// Gemini `generateContent` client.
///
/// Transient statuses (429, 5xx) and transport errors are retried under the
/// configured [`RetryPolicy`]; everything else surfaces on the first attempt.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    client: reqwest::Client,
    config: GoogleConfig,
}

enum AttemptError {
    Transient {
        error: VigilAiError,
        retry_after_ms: Option<u64>,
    },
    Final(VigilAiError),
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Result<Self, VigilAiError> {
        if config.api_key.trim().is_empty() {
            return Err(VigilAiError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    fn generate_content_url(&self, model: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if base.contains(":generateContent") {
            return base.replace("{model}", model);
        }
        format!("{base}/models/{model}:generateContent")
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_retries,
            budget_ms: self.config.retry_budget_ms,
            jitter: self.config.retry_jitter,
        }
    }

    async fn attempt(
        &self,
        url: &str,
        body: &GenerateContentBody<'_>,
        attempt: usize,
    ) -> Result<Generation, AttemptError> {
        let response = self
            .client
            .post(url)
            .header("x-vigil-request-id", new_request_id())
            .header("x-vigil-retry-attempt", attempt.to_string())
            .query(&[("key", self.config.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|error| {
                if is_retryable_http_error(&error) {
                    AttemptError::Transient {
                        error: VigilAiError::Http(error),
                        retry_after_ms: None,
                    }
                } else {
                    AttemptError::Final(VigilAiError::Http(error))
                }
            })?;

        let status = response.status().as_u16();
        let retry_after_ms = parse_retry_after_ms(response.headers());
        let raw = response
            .text()
            .await
            .map_err(|error| AttemptError::Final(VigilAiError::Http(error)))?;
        if (200..300).contains(&status) {
            return parse_generate_content_response(&raw).map_err(AttemptError::Final);
        }

        let error = VigilAiError::HttpStatus { status, body: raw };
        if should_retry_status(status) {
            Err(AttemptError::Transient {
                error,
                retry_after_ms,
            })
        } else {
            Err(AttemptError::Final(error))
        }
    }
}

#[async_trait]
impl LlmClient for GoogleClient {
    async fn complete(&self, request: GenerationRequest) -> Result<Generation, VigilAiError> {
        let body = GenerateContentBody::from_request(&request);
        let url = self.generate_content_url(&request.model);
        let policy = self.retry_policy();
        let started = Instant::now();
        let mut attempt = 0_usize;

        loop {
            match self.attempt(&url, &body, attempt).await {
                Ok(generation) => {
                    tracing::debug!(
                        model = %request.model,
                        attempt,
                        total_tokens = generation.usage.total_tokens,
                        truncated = generation.is_truncated(),
                        "gemini completion received"
                    );
                    return Ok(generation);
                }
                Err(AttemptError::Final(error)) => return Err(error),
                Err(AttemptError::Transient {
                    error,
                    retry_after_ms,
                }) => {
                    let elapsed_ms =
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    let Some(delay_ms) =
                        policy.next_delay_ms(attempt, elapsed_ms, retry_after_ms)
                    else {
                        return Err(error);
                    };
                    tracing::debug!(attempt, delay_ms, %error, "retrying gemini request");
                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

impl<'a> GenerateContentBody<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let system_instruction = request
            .system_instruction
            .as_deref()
            .filter(|text| !text.trim().is_empty())
            .map(|text| SystemInstruction {
                parts: [Part { text }],
            });
        let generation_config = (request.temperature.is_some()
            || request.max_output_tokens.is_some())
        .then_some(GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        });
        Self {
            contents: [Content {
                role: "user",
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
            system_instruction,
            generation_config,
        }
    }
}

fn parse_generate_content_response(raw: &str) -> Result<Generation, VigilAiError> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)?;
    let usage = parsed
        .usage_metadata
        .map(|usage| TokenUsage {
            prompt_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        })
        .unwrap_or_default();

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        let block_reason = parsed
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason);
        return Err(match block_reason {
            Some(reason) => VigilAiError::Blocked(reason),
            None => VigilAiError::InvalidResponse("response contained no candidates".to_string()),
        });
    };

    let text = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if text.is_empty() && candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(VigilAiError::Blocked("candidate withheld for safety".to_string()));
    }

    Ok(Generation {
        text,
        finish_reason: candidate.finish_reason,
        usage,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UsageMetadata {
    prompt_token_count: u64,
    candidates_token_count: u64,
    total_token_count: u64,
}
