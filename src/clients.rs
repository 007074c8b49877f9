//! Clients for the external generation capabilities.
//!
//! The pipeline only sees the [`TextGenerator`] and [`MusicGenerator`]
//! contracts; the HTTP clients below are the production implementations.

pub mod openai;
pub mod suno;

use async_trait::async_trait;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use suno::{Clip, GenerateRequest, SunoClient, SunoConfig};

/// A single text-generation call: system role, user prompt and model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    pub system: String,
    pub prompt: String,
    pub model: String,
}

/// Text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, request: &TextRequest) -> anyhow::Result<String>;
}

/// Music-generation capability.
#[async_trait]
pub trait MusicGenerator: Send + Sync {
    /// Submits a synthesis request and returns the produced clips (possibly none).
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<Vec<Clip>>;

    /// Re-fetches the current state of a clip.
    async fn get_clip(&self, clip_id: &str) -> anyhow::Result<Clip>;
}
