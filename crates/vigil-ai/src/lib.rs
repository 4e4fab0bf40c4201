//! Text-generation client surface for Vigil.
//!
//! Defines the provider-neutral `LlmClient` contract and the Gemini
//! `generateContent` client the pipeline uses to draft scenarios, scripts,
//! failure analyses, and script fixes.

mod google;
mod retry;
mod types;

pub use google::{GoogleClient, GoogleConfig, DEFAULT_GOOGLE_API_BASE};
pub use types::{Generation, GenerationRequest, LlmClient, TokenUsage, VigilAiError};
