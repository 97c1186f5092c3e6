//! End-to-end run: decode, classify, preprocess on the chosen branch, assess.
//!
//! The input is decoded before any remote call so an unreadable file fails
//! without spending a request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use uuid::Uuid;

use super::assess::AssessmentRequester;
use super::diagnostic::{self, dump_binary, dump_dir_for, dump_json, dump_text};
use super::gate::{Branch, ImageClassificationGate};
use super::preprocess::{
    decode_image, read_image_file, ImagingError, LegibilityEnhancer, SizeBudgetResizer,
    SizedImage,
};
use super::vision::{ChatCompletionsClient, PromptSet, VisionClient};
use super::PipelineError;
use crate::config::Settings;

/// Outcome of one assessment run.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub run_id: Uuid,
    /// Model text, exactly as returned.
    pub assessment: String,
    pub is_produce: bool,
    pub branch: Branch,
    pub width: u32,
    pub height: u32,
    pub payload_bytes: usize,
    /// Shrink passes needed beyond the first encode.
    pub resize_passes: usize,
}

#[derive(Serialize)]
struct InputInfo<'a> {
    run_id: String,
    started_at: String,
    input_bytes: usize,
    media_type: &'a str,
    width: u32,
    height: u32,
    orientation: u32,
}

pub struct FreshnessPipeline {
    gate: ImageClassificationGate,
    resizer: SizeBudgetResizer,
    enhancer: LegibilityEnhancer,
    requester: AssessmentRequester,
    dump_root: Option<PathBuf>,
}

impl FreshnessPipeline {
    pub fn new(
        client: Arc<dyn VisionClient>,
        model: &str,
        prompts: &PromptSet,
        resizer: SizeBudgetResizer,
    ) -> Self {
        Self {
            gate: ImageClassificationGate::new(client.clone(), model, &prompts.classification),
            enhancer: LegibilityEnhancer::new(resizer.clone()),
            resizer,
            requester: AssessmentRequester::new(client, model, &prompts.assessment),
            dump_root: None,
        }
    }

    /// Production wiring: HTTP client, budgets and dump root from settings.
    pub fn from_settings(settings: &Settings, prompts: &PromptSet) -> Result<Self, PipelineError> {
        let client = ChatCompletionsClient::from_settings(settings)?;
        let resizer = SizeBudgetResizer::new(settings.max_dimension, settings.max_bytes)
            .with_quality(settings.jpeg_quality);
        Ok(
            Self::new(Arc::new(client), &settings.model, prompts, resizer)
                .with_dump_dir(settings.dump_dir.clone()),
        )
    }

    pub fn with_dump_dir(mut self, dump_root: Option<PathBuf>) -> Self {
        self.dump_root = dump_root;
        self
    }

    pub fn assess_file(&self, path: &Path) -> Result<AssessmentReport, PipelineError> {
        let bytes = read_image_file(path)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "Image loaded");
        self.assess_bytes(&bytes)
    }

    pub fn assess_bytes(&self, bytes: &[u8]) -> Result<AssessmentReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("assessment_run", run_id = %run_id).entered();
        let start = std::time::Instant::now();

        let decoded = decode_image(bytes)?;
        let dump = dump_dir_for(self.dump_root.as_deref(), &run_id);

        if let Some(dir) = &dump {
            dump_json(
                dir,
                diagnostic::INPUT_INFO,
                &InputInfo {
                    run_id: run_id.to_string(),
                    started_at: chrono::Utc::now().to_rfc3339(),
                    input_bytes: bytes.len(),
                    media_type: decoded.media_type,
                    width: decoded.image.width(),
                    height: decoded.image.height(),
                    orientation: decoded.orientation,
                },
            );
            dump_text(dir, diagnostic::CLASSIFICATION_PROMPT_FILE, self.gate.prompt());
        }

        let classification = self.gate.classify(bytes)?;
        if let Some(dir) = &dump {
            dump_text(
                dir,
                diagnostic::CLASSIFICATION_RESPONSE_FILE,
                &classification.reply,
            );
        }

        let branch = classification.branch();
        let processed = self.prepare(branch, &decoded.image)?;
        tracing::info!(
            branch = ?branch,
            width = processed.width(),
            height = processed.height(),
            payload_bytes = processed.byte_len(),
            resize_passes = processed.extra_passes(),
            "Image prepared"
        );
        if let Some(dir) = &dump {
            dump_binary(dir, diagnostic::PROCESSED_IMAGE_FILE, &processed.jpeg);
            dump_json(dir, diagnostic::PROCESSED_INFO_FILE, &processed.info());
            dump_text(dir, diagnostic::ASSESSMENT_PROMPT_FILE, self.requester.prompt());
        }

        let assessment = self.requester.assess(&processed)?;
        if let Some(dir) = &dump {
            dump_text(dir, diagnostic::ASSESSMENT_RESPONSE_FILE, &assessment);
        }

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            is_produce = classification.is_produce,
            "Assessment complete"
        );

        Ok(AssessmentReport {
            run_id,
            assessment,
            is_produce: classification.is_produce,
            branch,
            width: processed.width(),
            height: processed.height(),
            payload_bytes: processed.byte_len(),
            resize_passes: processed.extra_passes(),
        })
    }

    /// Preprocess for `branch`. Deterministic for a given image.
    pub fn prepare(&self, branch: Branch, image: &DynamicImage) -> Result<SizedImage, ImagingError> {
        match branch {
            Branch::ResizeOnly => self.resizer.resize(image),
            Branch::Enhance => self.enhancer.enhance(image),
        }
    }
}
