pub mod assess;
pub mod diagnostic;
pub mod gate;
pub mod orchestrator;
pub mod preprocess;
pub mod vision;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use preprocess::ImagingError;
use vision::VisionError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Image processing failed: {0}")]
    Imaging(#[from] ImagingError),

    #[error("Vision request failed: {0}")]
    Vision(#[from] VisionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot render report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("Cannot read prompt file {path}: {source}")]
    PromptFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_failure_becomes_report_error() {
        let err: PipelineError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, PipelineError::Report(_)));
        assert!(err.to_string().starts_with("Cannot render report"));
    }
}
