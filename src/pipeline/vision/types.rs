//! Wire types for the OpenAI-compatible `/chat/completions` endpoint and
//! the `VisionClient` seam the pipeline talks through.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::VisionError;

/// Base64 text of a compressed image, ready to embed in a request.
///
/// Built immediately before a remote call and never decoded back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub media_type: String,
    pub base64: String,
}

impl EncodedPayload {
    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Self {
        Self {
            media_type: media_type.to_string(),
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// `data:<mime>;base64,<payload>` form accepted by `image_url` parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

/// Remote multimodal completion capability.
///
/// One call: a prompt, zero or more images, a model id → completion text.
pub trait VisionClient: Send + Sync {
    fn chat_with_images(
        &self,
        model: &str,
        user_prompt: &str,
        images: &[EncodedPayload],
    ) -> Result<String, VisionError>;
}

// ──────────────────────────────────────────────
// Request
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatCompletionRequest {
    /// Single user turn: the prompt text followed by each image.
    pub fn single_user(model: &str, prompt: &str, images: &[EncodedPayload]) -> Self {
        let mut content = Vec::with_capacity(images.len() + 1);
        content.push(ContentPart::Text {
            text: prompt.to_string(),
        });
        content.extend(images.iter().map(|img| ContentPart::ImageUrl {
            image_url: ImageUrl { url: img.data_url() },
        }));

        Self {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

// ──────────────────────────────────────────────
// Response
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, as sent. No choices or `null` content is
    /// malformed; an empty string is a valid (if unhelpful) reply.
    pub fn into_text(self) -> Result<String, VisionError> {
        self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::MalformedResponse("response has no choices".into()))?
            .message
            .content
            .ok_or_else(|| VisionError::MalformedResponse("first choice has no content".into()))
    }
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}
