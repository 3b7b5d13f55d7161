//! Generation service abstraction and the OpenAI-compatible client.
//!
//! Handlers build a [`GenerationRequest`] and call a [`Generator`]; the client behind it is
//! constructed once at startup.

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation api error: {0}")]
    Api(String),
    #[error("generation returned no text")]
    EmptyResponse,
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
}

/// One role-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message with mixed parts (text + image).
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// Plain string content, or a list of parts when an image is attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// A single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    /// True if any message carries an image part.
    pub fn has_image(&self) -> bool {
        self.messages.iter().any(|m| match &m.content {
            MessageContent::Parts(parts) => parts
                .iter()
                .any(|p| matches!(p, ContentPart::ImageUrl { .. })),
            MessageContent::Text(_) => false,
        })
    }
}

/// Turns a prompt into text. At most one call per need; no retries.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

/// Run `generator` with an optional upper bound; elapsing the bound is a [`LlmError::Timeout`].
pub async fn generate_within(
    generator: &dyn Generator,
    request: &GenerationRequest,
    timeout: Option<Duration>,
) -> Result<String, LlmError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, generator.generate(request))
            .await
            .map_err(|_| LlmError::Timeout(limit))?,
        None => generator.generate(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Generator for Slow {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    fn request(messages: Vec<ChatMessage>) -> GenerationRequest {
        GenerationRequest {
            model: "m".to_string(),
            messages,
            max_tokens: 10,
            temperature: 0.0,
        }
    }

    #[test]
    fn detects_image_parts() {
        assert!(!request(vec![ChatMessage::user("hi")]).has_image());
        assert!(request(vec![ChatMessage::user_parts(vec![ContentPart::image_url(
            "data:image/png;base64,AA"
        )])])
        .has_image());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_maps_to_error() {
        let err = generate_within(&Slow, &request(vec![]), Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d == Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn no_timeout_waits_for_result() {
        let out = generate_within(&Slow, &request(vec![]), None).await.unwrap();
        assert_eq!(out, "late");
    }
}
