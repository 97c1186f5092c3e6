use std::sync::Arc;

use super::preprocess::{SizedImage, JPEG_MEDIA_TYPE};
use super::vision::{EncodedPayload, VisionClient, VisionError};

/// Sends the processed image with the assessment prompt and returns the
/// model's text unmodified.
pub struct AssessmentRequester {
    client: Arc<dyn VisionClient>,
    model: String,
    prompt: String,
}

impl AssessmentRequester {
    pub fn new(client: Arc<dyn VisionClient>, model: &str, prompt: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            prompt: prompt.to_string(),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn assess(&self, processed: &SizedImage) -> Result<String, VisionError> {
        let payload = EncodedPayload::from_bytes(JPEG_MEDIA_TYPE, &processed.jpeg);
        tracing::debug!(
            width = processed.width(),
            height = processed.height(),
            payload_bytes = processed.byte_len(),
            "Requesting assessment"
        );
        self.client
            .chat_with_images(&self.model, &self.prompt, &[payload])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::vision::MockVisionClient;
    use image::{DynamicImage, RgbImage};

    fn sized() -> SizedImage {
        SizedImage {
            image: DynamicImage::ImageRgb8(RgbImage::new(4, 4)),
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            scales: vec![1.0],
        }
    }

    #[test]
    fn reply_is_returned_verbatim() {
        let reply = "  - Best before: 2026-11-02\n- Apples look firm, no bruising.\n";
        let mock = Arc::new(MockVisionClient::new(reply));
        let r = AssessmentRequester::new(mock, "m", "Assess freshness.");
        assert_eq!(r.assess(&sized()).unwrap(), reply);
    }

    #[test]
    fn sends_processed_jpeg_with_prompt() {
        let mock = Arc::new(MockVisionClient::new("ok"));
        let r = AssessmentRequester::new(mock.clone(), "vision", "Assess freshness.");
        let img = sized();
        r.assess(&img).unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "vision");
        assert_eq!(calls[0].prompt, "Assess freshness.");
        assert_eq!(
            calls[0].images,
            vec![EncodedPayload::from_bytes("image/jpeg", &img.jpeg)]
        );
    }

    #[test]
    fn error_propagates() {
        let mock = Arc::new(MockVisionClient::new("x").with_replies(vec![Err(
            VisionError::ApiError {
                status: 401,
                message: "Invalid API Key".into(),
            },
        )]));
        let r = AssessmentRequester::new(mock, "m", "p");
        assert!(matches!(
            r.assess(&sized()),
            Err(VisionError::ApiError { status: 401, .. })
        ));
    }
}
