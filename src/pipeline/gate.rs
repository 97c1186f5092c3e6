//! Produce/non-produce gate: picks the preprocessing branch from a remote
//! classification of the untouched input photo.
//!
//! The verdict is a keyword heuristic over free text. It misses replies that
//! never say "fruit" or "vegetable" (e.g. "it shows a banana"); such photos
//! take the resize-only path. That is a known precision limit, not an error,
//! and the heuristic sits behind `ProduceClassifier` so it can be replaced.

use std::sync::Arc;

use serde::Serialize;

use super::preprocess::detect_media_type;
use super::vision::{EncodedPayload, VisionClient, VisionError};

/// Substrings (lowercase) that mark a reply as "this is produce".
pub const PRODUCE_KEYWORDS: &[&str] = &["fruit", "vegetable"];

/// Turns a classification reply into a produce verdict.
pub trait ProduceClassifier: Send + Sync {
    fn is_produce(&self, reply: &str) -> bool;
}

/// Case-insensitive substring match against [`PRODUCE_KEYWORDS`].
pub struct KeywordProduceClassifier;

impl ProduceClassifier for KeywordProduceClassifier {
    fn is_produce(&self, reply: &str) -> bool {
        mentions_produce(reply)
    }
}

pub fn mentions_produce(text: &str) -> bool {
    let lower = text.to_lowercase();
    PRODUCE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Which preprocessing path an image takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Budget resize only; colour and detail kept for packaging OCR.
    ResizeOnly,
    /// Legibility pass; edge/contrast emphasis for produce quality.
    Enhance,
}

impl Branch {
    pub fn for_verdict(is_produce: bool) -> Self {
        if is_produce {
            Branch::Enhance
        } else {
            Branch::ResizeOnly
        }
    }
}

/// Outcome of one classification call.
#[derive(Debug, Clone)]
pub struct Classification {
    pub reply: String,
    pub is_produce: bool,
}

impl Classification {
    pub fn branch(&self) -> Branch {
        Branch::for_verdict(self.is_produce)
    }
}

pub struct ImageClassificationGate {
    client: Arc<dyn VisionClient>,
    model: String,
    prompt: String,
    classifier: Box<dyn ProduceClassifier>,
}

impl ImageClassificationGate {
    pub fn new(client: Arc<dyn VisionClient>, model: &str, prompt: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            prompt: prompt.to_string(),
            classifier: Box::new(KeywordProduceClassifier),
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn ProduceClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Classify the original, unmodified image bytes.
    pub fn classify(&self, original: &[u8]) -> Result<Classification, VisionError> {
        let payload = EncodedPayload::from_bytes(detect_media_type(original), original);
        let reply = self
            .client
            .chat_with_images(&self.model, &self.prompt, &[payload])?;
        let is_produce = self.classifier.is_produce(&reply);

        if is_produce {
            tracing::info!("Classification: produce, taking enhancement branch");
        } else {
            tracing::info!("Classification: not produce, taking resize-only branch");
            tracing::debug!(reply = %reply, "No produce keyword in classification reply");
        }

        Ok(Classification { reply, is_produce })
    }

    pub fn is_produce(&self, original: &[u8]) -> Result<bool, VisionError> {
        self.classify(original).map(|c| c.is_produce)
    }
}
