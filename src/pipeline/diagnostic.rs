//! Per-run diagnostic dump. Writes each stage's artifacts to disk so a run
//! can be inspected after the fact.
//!
//! Disabled unless a dump root is configured (`SHELFSIGHT_DUMP_DIR` or
//! `--dump-dir`). Every writer logs and swallows its own failure; a dump
//! never changes the outcome of a run.
//!
//! ```text
//! {dump_root}/{run_id}/
//!   00-input-info.json
//!   01-classification-prompt.txt
//!   01-classification-response.txt
//!   02-processed.jpg
//!   02-processed.json
//!   03-assessment-prompt.txt
//!   03-assessment-response.txt
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const INPUT_INFO: &str = "00-input-info.json";
pub const CLASSIFICATION_PROMPT_FILE: &str = "01-classification-prompt.txt";
pub const CLASSIFICATION_RESPONSE_FILE: &str = "01-classification-response.txt";
pub const PROCESSED_IMAGE_FILE: &str = "02-processed.jpg";
pub const PROCESSED_INFO_FILE: &str = "02-processed.json";
pub const ASSESSMENT_PROMPT_FILE: &str = "03-assessment-prompt.txt";
pub const ASSESSMENT_RESPONSE_FILE: &str = "03-assessment-response.txt";

/// Returns the dump directory for a run, or `None` if diagnostics are
/// disabled or the directory cannot be created.
pub fn dump_dir_for(base: Option<&Path>, run_id: &Uuid) -> Option<PathBuf> {
    let dir = base?.join(run_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

pub fn dump_binary(dir: &Path, filename: &str, data: &[u8]) {
    write_artifact(dir, filename, data, "binary");
}

pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    write_artifact(dir, filename, text.as_bytes(), "text");
}

/// Pretty-printed JSON of any serializable value.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => write_artifact(dir, filename, json.as_bytes(), "JSON"),
        Err(e) => tracing::warn!(
            path = %dir.join(filename).display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

fn write_artifact(dir: &Path, filename: &str, data: &[u8], kind: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, data) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = data.len(),
            kind,
            "Diagnostic dump: artifact written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            kind,
            "Diagnostic dump: failed to write artifact"
        ),
    }
}
