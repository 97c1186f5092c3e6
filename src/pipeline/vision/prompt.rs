//! Prompt text for the two remote calls.
//!
//! Prompts are configuration, not structure: one pipeline serves every
//! wording, and `--prompt-file` swaps the assessment text at runtime.

/// Classification question asked about the untouched input photo.
pub const CLASSIFICATION_PROMPT: &str = "Does this image contain fruits or vegetables?";

/// Assessment instructions sent with the processed photo.
pub const ASSESSMENT_PROMPT: &str = "\
Analyze the image and extract detailed information from the product packaging, \
including the expiration date or use-by date if available. If no such date is \
present, do not mention it. Assess the freshness of the item if it is a fruit or \
vegetable; if it is not, refrain from discussing its freshness. For fruits and \
vegetables, provide an estimation of how long they will remain edible, considering \
factors such as quality, defects, discoloration, or irregular shapes. Be rigorous \
in your evaluation and present your findings in clear, concise points, focusing on \
packaging details as well as any visible product quality issues.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub classification: String,
    pub assessment: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            classification: CLASSIFICATION_PROMPT.to_string(),
            assessment: ASSESSMENT_PROMPT.to_string(),
        }
    }
}

impl PromptSet {
    /// Replace the assessment prompt. Blank text keeps the current one.
    pub fn with_assessment(mut self, text: &str) -> Self {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.assessment = trimmed.to_string();
        }
        self
    }
}
