//! Content refinement prompts and outcomes
//!
//! The completion call itself lives in the shell; this module decides whether
//! a value needs refinement, builds the instruction prompt, and folds the
//! completion result into a [`RefinementOutcome`]. Refinement never fails from
//! the caller's point of view: an error falls back to the original text.

use serde::Serialize;

use crate::classify::{ContentType, TITLE_FONT_SIZE};
use crate::deck::TextStyle;

/// System instruction sent with every refinement request.
pub const REFINEMENT_SYSTEM_INSTRUCTION: &str = "You are a content refinement expert that improves text for presentations. \
Your task is to refine and optimize content to make it more concise, impactful, and suitable for slides. \
Maintain the core information while making it more presentable.";

/// Content shorter than this is left alone unless refinement is forced.
pub const MIN_REFINEMENT_CHARS: usize = 20;

/// Font size assumed when an element carries no explicit size.
pub const DEFAULT_FONT_SIZE: f64 = 11.0;

/// Explicit knobs for a single refinement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct RefinementOptions {
    pub target_length: Option<String>,
    pub style: Option<String>,
    pub bullet_points: bool,
    pub additional_instructions: Option<String>,
    pub force_refinement: bool,
}

/// Where the value is going to be rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefinementContext {
    pub slide_number: usize,
    pub is_title: bool,
    pub font_size: f64,
    pub bold: bool,
    pub italic: bool,
}

impl RefinementContext {
    pub fn from_style(style: &TextStyle, slide_number: usize) -> Self {
        let font_size = style.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        Self {
            slide_number,
            is_title: font_size >= TITLE_FONT_SIZE,
            font_size,
            bold: style.bold,
            italic: style.italic,
        }
    }
}

/// Which path a refinement took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefinementOutcome {
    /// The completion service produced new text.
    Refined(String),
    /// The content was empty or too short to bother.
    Skipped(String),
    /// The completion failed; the original text is kept.
    Fallback { original: String, reason: String },
}

impl RefinementOutcome {
    pub fn text(&self) -> &str {
        match self {
            RefinementOutcome::Refined(text) | RefinementOutcome::Skipped(text) => text,
            RefinementOutcome::Fallback { original, .. } => original,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            RefinementOutcome::Refined(text) | RefinementOutcome::Skipped(text) => text,
            RefinementOutcome::Fallback { original, .. } => original,
        }
    }
}

/// Whether `content` should be sent to the completion service at all.
pub fn needs_refinement(content: &str, options: &RefinementOptions) -> bool {
    if content.trim().is_empty() {
        return false;
    }
    options.force_refinement || content.chars().count() >= MIN_REFINEMENT_CHARS
}

/// Build the user prompt for refining `content` of field `field_name`.
pub fn build_refinement_prompt(
    field_name: &str,
    content: &str,
    options: &RefinementOptions,
) -> String {
    let content_type = ContentType::from_field_name(field_name);
    let target_length = options
        .target_length
        .clone()
        .unwrap_or_else(|| content_type.default_target_length(content.chars().count()));
    let style = options
        .style
        .as_deref()
        .unwrap_or_else(|| content_type.default_style());

    let mut prompt = format!(
        "# Content Refinement Task\n\n\
## Original Content (Field: {field_name})\n\"\"\"\n{content}\n\"\"\"\n\n\
## Content Type\n{content_type}\n\n\
## Refinement Instructions\n\
Please refine this content to make it more suitable for a presentation slide:\n\n\
1. Make it {target_length}\n\
2. Use a {style} style\n\
3. Maintain the core information and key points\n\
4. Optimize for visual presentation and impact\n\
5. Ensure it fits well on a slide\n"
    );

    if options.bullet_points {
        prompt.push_str("6. Format as bullet points where appropriate\n");
    }
    if let Some(extra) = &options.additional_instructions {
        prompt.push_str(&format!("7. {}\n", extra));
    }

    prompt.push_str(
        "\n## Output\nProvide ONLY the refined content, with no explanations or additional text.\n",
    );
    prompt
}

/// Fold a completion result into an outcome, falling back to `original`.
pub fn finish_refinement<E: std::fmt::Display>(
    original: &str,
    response: Result<String, E>,
) -> RefinementOutcome {
    match response {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() {
                RefinementOutcome::Fallback {
                    original: original.to_string(),
                    reason: "empty completion".to_string(),
                }
            } else {
                RefinementOutcome::Refined(text.to_string())
            }
        }
        Err(e) => RefinementOutcome::Fallback {
            original: original.to_string(),
            reason: e.to_string(),
        },
    }
}
