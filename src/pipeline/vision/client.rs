use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use zeroize::Zeroizing;

use super::retry::{with_retry, RetryPolicy};
use super::types::{
    ApiErrorEnvelope, ChatCompletionRequest, ChatCompletionResponse, EncodedPayload, VisionClient,
};
use super::VisionError;
use crate::config::Settings;

/// Longest slice of an error body kept in `VisionError::ApiError`.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Blocking HTTP client for an OpenAI-compatible chat-completions API
/// (Groq by default).
pub struct ChatCompletionsClient {
    base_url: String,
    api_key: Zeroizing<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        api_key: Zeroizing<String>,
        timeout_secs: u64,
        retry: RetryPolicy,
    ) -> Result<Self, VisionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VisionError::ClientBuild(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_secs,
            retry,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, VisionError> {
        Self::new(
            &settings.base_url,
            settings.api_key.clone(),
            settings.timeout_secs,
            settings.retry.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn send_once(&self, body: &ChatCompletionRequest) -> Result<String, VisionError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.as_str())
            .json(body)
            .send()
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            return Err(VisionError::ApiError {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| VisionError::MalformedResponse(e.to_string()))?;
        parsed.into_text()
    }

    fn map_transport_error(&self, e: reqwest::Error) -> VisionError {
        if e.is_timeout() {
            VisionError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            VisionError::Unreachable(self.base_url.clone())
        } else {
            VisionError::Network(e.to_string())
        }
    }
}

impl VisionClient for ChatCompletionsClient {
    fn chat_with_images(
        &self,
        model: &str,
        user_prompt: &str,
        images: &[EncodedPayload],
    ) -> Result<String, VisionError> {
        let _span = tracing::info_span!(
            "chat_completion",
            model = %model,
            images = images.len(),
            payload_chars = images.iter().map(|i| i.base64.len()).sum::<usize>(),
        )
        .entered();
        let start = std::time::Instant::now();

        let body = ChatCompletionRequest::single_user(model, user_prompt, images);
        let text = with_retry(&self.retry, "chat_completion", |_| self.send_once(&body))?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            response_len = text.len(),
            "Chat completion received"
        );
        Ok(text)
    }
}

/// Pull `error.message` out of an API error body, else the (truncated) raw text.
fn error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(body) {
        return envelope.error.message;
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

// ──────────────────────────────────────────────
// MockVisionClient (testing)
// ──────────────────────────────────────────────

/// One call observed by [`MockVisionClient`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub prompt: String,
    pub images: Vec<EncodedPayload>,
}

/// Mock vision client for testing.
///
/// Replies from a scripted queue, then falls back to a fixed response.
/// Every call is recorded for inspection.
pub struct MockVisionClient {
    scripted: Mutex<VecDeque<Result<String, VisionError>>>,
    fallback: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockVisionClient {
    pub fn new(response: &str) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: response.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies returned in order before falling back to `new`'s response.
    pub fn with_replies(self, replies: Vec<Result<String, VisionError>>) -> Self {
        *self.scripted.lock().unwrap_or_else(|e| e.into_inner()) = replies.into();
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl VisionClient for MockVisionClient {
    fn chat_with_images(
        &self,
        model: &str,
        user_prompt: &str,
        images: &[EncodedPayload],
    ) -> Result<String, VisionError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                model: model.to_string(),
                prompt: user_prompt.to_string(),
                images: images.to_vec(),
            });

        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
