use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::Settings;
use crate::pipeline::orchestrator::{AssessmentReport, FreshnessPipeline};
use crate::pipeline::vision::PromptSet;
use crate::pipeline::PipelineError;

#[derive(Parser, Debug)]
#[command(name = "shelfsight", version)]
#[command(
    about = "Read expiration dates and judge produce freshness from a photo",
    long_about = None
)]
pub struct Cli {
    /// Photo to assess (JPEG, PNG or WebP)
    pub image: PathBuf,

    /// Vision model id (overrides SHELFSIGHT_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// File whose contents replace the assessment prompt
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// Write per-run diagnostic artifacts under this directory
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Print the full report as JSON instead of the assessment text
    #[arg(long)]
    pub json: bool,
}

/// Run one assessment and render what goes to stdout.
pub fn execute(cli: &Cli) -> Result<String, PipelineError> {
    let mut settings = Settings::from_env()?;
    if let Some(model) = &cli.model {
        settings.model = model.clone();
    }
    if cli.dump_dir.is_some() {
        settings.dump_dir = cli.dump_dir.clone();
    }

    let prompts = match &cli.prompt_file {
        Some(path) => PromptSet::default().with_assessment(&read_prompt_file(path)?),
        None => PromptSet::default(),
    };

    tracing::debug!(settings = ?settings, "Settings resolved");
    let pipeline = FreshnessPipeline::from_settings(&settings, &prompts)?;
    let report = pipeline.assess_file(&cli.image)?;
    render(report, cli.json)
}

/// Stdout text for a finished run: the assessment, or the whole report.
pub fn render(report: AssessmentReport, json: bool) -> Result<String, PipelineError> {
    if json {
        Ok(serde_json::to_string_pretty(&report)?)
    } else {
        Ok(report.assessment)
    }
}

fn read_prompt_file(path: &Path) -> Result<String, PipelineError> {
    std::fs::read_to_string(path).map_err(|source| PipelineError::PromptFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gate::Branch;

    #[test]
    fn parses_positional_image_and_flags() {
        let cli = Cli::try_parse_from([
            "shelfsight",
            "shelf.jpg",
            "--model",
            "llava",
            "--prompt-file",
            "p.txt",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.image, PathBuf::from("shelf.jpg"));
        assert_eq!(cli.model.as_deref(), Some("llava"));
        assert_eq!(cli.prompt_file, Some(PathBuf::from("p.txt")));
        assert!(cli.dump_dir.is_none());
        assert!(cli.json);
    }

    #[test]
    fn image_argument_is_required() {
        assert!(Cli::try_parse_from(["shelfsight"]).is_err());
    }

    fn report() -> AssessmentReport {
        AssessmentReport {
            run_id: uuid::Uuid::new_v4(),
            assessment: "- Best before 2026-11-02".into(),
            is_produce: false,
            branch: Branch::ResizeOnly,
            width: 800,
            height: 533,
            payload_bytes: 91_204,
            resize_passes: 0,
        }
    }

    #[test]
    fn render_plain_prints_assessment_only() {
        assert_eq!(render(report(), false).unwrap(), "- Best before 2026-11-02");
    }

    #[test]
    fn render_json_prints_full_report() {
        let out = render(report(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["branch"], "resize_only");
        assert_eq!(value["width"], 800);
        assert_eq!(value["assessment"], "- Best before 2026-11-02");
    }

    #[test]
    fn missing_prompt_file_is_reported() {
        let err = read_prompt_file(Path::new("/nonexistent/prompt.txt")).unwrap_err();
        assert!(matches!(err, PipelineError::PromptFile { .. }));
    }

    #[test]
    fn prompt_file_contents_are_read() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "List the use-by date.").unwrap();
        assert_eq!(read_prompt_file(tmp.path()).unwrap(), "List the use-by date.");
    }
}
