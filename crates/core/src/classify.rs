//! Field classification heuristics
//!
//! Everything here is keyword-based: a field is an image when its name looks
//! like one, a value is worth refining when it is long enough or the field
//! name suggests prose, and the content type drives the default target length
//! and style of the refinement prompt.
//!
//! The keyword tables are plain static slices so the same data drives both
//! classification and the tests.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::refine::{RefinementContext, RefinementOptions};

/// Substrings that mark a field as image-bearing.
pub const IMAGE_KEYWORDS: &[&str] = &["image", "logo", "photo", "picture", "icon", "thumbnail"];

/// Field-name prefix/suffix that marks a field as image-bearing.
pub const IMAGE_AFFIX: &str = "img";

/// Below this many characters a value is never refined.
pub const MIN_REFINE_CHARS: usize = 10;
/// Above this many characters a value is always refined.
pub const LONG_CONTENT_CHARS: usize = 100;
/// Threshold for fields that match no keyword rule.
pub const DEFAULT_REFINE_CHARS: usize = 50;

pub const ALWAYS_REFINE_KEYWORDS: &[&str] = &["problem", "solution", "model", "feature", "benefit"];
pub const NEVER_REFINE_KEYWORDS: &[&str] = &["name", "contact", "email", "phone", "website"];
pub const BULLET_KEYWORDS: &[&str] = &["feature", "benefit", "point"];

/// Font size at or above which a text element is treated as a title.
pub const TITLE_FONT_SIZE: f64 = 18.0;
/// Font size above which a text element gets a brief target length.
pub const LARGE_FONT_SIZE: f64 = 14.0;

/// Whether a field name denotes an image.
///
/// Used both when tagging image columns during ingestion and when deciding
/// how to substitute a placeholder, so the two can never disagree.
pub fn is_image_field(field_name: &str) -> bool {
    if field_name.is_empty() {
        return false;
    }
    let field = field_name.to_lowercase();
    IMAGE_KEYWORDS.iter().any(|keyword| field.contains(keyword))
        || field.starts_with(IMAGE_AFFIX)
        || field.ends_with(IMAGE_AFFIX)
}

/// Prefixes pairing puts in front of a source column name.
const PAIRED_PREFIXES: &[&str] = &["item1", "item2", "company1", "company2"];

/// Whether a placeholder names an image, either by its own name or because
/// it refers to a column tagged as holding images during ingestion.
///
/// Paired names (`item2Hero`) match the source column (`Hero`).
pub fn is_image_column(field_name: &str, image_columns: &BTreeSet<String>) -> bool {
    if is_image_field(field_name) {
        return true;
    }
    if image_columns.is_empty() {
        return false;
    }
    let unprefixed = PAIRED_PREFIXES
        .iter()
        .find_map(|prefix| {
            field_name
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &field_name[prefix.len()..])
        })
        .filter(|rest| !rest.is_empty());
    image_columns.iter().any(|column| {
        column.eq_ignore_ascii_case(field_name)
            || unprefixed.is_some_and(|rest| column.eq_ignore_ascii_case(rest))
    })
}

/// Which rule decided a refinement eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineRule {
    TooShort,
    DescriptionOrLong,
    ProseKeyword,
    IdentifierKeyword,
    LengthThreshold,
}

/// Evaluate the refinement rules in order and report the one that decided.
pub fn refine_decision(field_name: &str, content: &str) -> (RefineRule, bool) {
    let length = content.chars().count();
    if length < MIN_REFINE_CHARS {
        return (RefineRule::TooShort, false);
    }

    let field = field_name.to_lowercase();
    if field.contains("description") || length > LONG_CONTENT_CHARS {
        return (RefineRule::DescriptionOrLong, true);
    }
    if ALWAYS_REFINE_KEYWORDS.iter().any(|k| field.contains(k)) {
        return (RefineRule::ProseKeyword, true);
    }
    if NEVER_REFINE_KEYWORDS.iter().any(|k| field.contains(k)) {
        return (RefineRule::IdentifierKeyword, false);
    }

    (RefineRule::LengthThreshold, length > DEFAULT_REFINE_CHARS)
}

/// Whether the value of `field_name` should go through refinement.
pub fn should_refine(field_name: &str, content: &str) -> bool {
    refine_decision(field_name, content).1
}

/// Coarse content taxonomy inferred from a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContentType {
    LongDescription,
    ShortIdentifier,
    ProblemStatement,
    SolutionDescription,
    ProcessDescription,
    MarketInformation,
    ComparativeInformation,
    PeopleInformation,
    ContactInformation,
    FeaturesBenefits,
    NumericalData,
    TemporalInformation,
    LocationInformation,
    GeneralInformation,
}

/// Keyword table checked top to bottom; the first row with a matching
/// keyword wins. `ShortIdentifier` also matches names ending in `id`.
pub const CONTENT_TYPE_RULES: &[(ContentType, &[&str])] = &[
    (ContentType::LongDescription, &["description", "about", "summary"]),
    (ContentType::ShortIdentifier, &["name", "title"]),
    (ContentType::ProblemStatement, &["problem", "challenge", "issue"]),
    (ContentType::SolutionDescription, &["solution", "approach", "method"]),
    (ContentType::ProcessDescription, &["model", "process", "system"]),
    (ContentType::MarketInformation, &["market", "industry", "sector"]),
    (ContentType::ComparativeInformation, &["competitor", "alternative", "comparison"]),
    (ContentType::PeopleInformation, &["team", "member", "staff", "employee"]),
    (ContentType::ContactInformation, &["contact", "email", "phone", "address"]),
    (ContentType::FeaturesBenefits, &["feature", "benefit", "advantage", "capability"]),
    (ContentType::NumericalData, &["stat", "metric", "number", "percentage"]),
    (ContentType::TemporalInformation, &["date", "time", "schedule", "deadline"]),
    (ContentType::LocationInformation, &["location", "place", "region", "country"]),
];

impl ContentType {
    pub fn from_field_name(field_name: &str) -> Self {
        let field = field_name.to_lowercase();
        for (content_type, keywords) in CONTENT_TYPE_RULES {
            let keyword_hit = keywords.iter().any(|k| field.contains(k));
            let id_suffix = *content_type == ContentType::ShortIdentifier && field.ends_with("id");
            if keyword_hit || id_suffix {
                return *content_type;
            }
        }
        ContentType::GeneralInformation
    }

    /// Human-readable label used inside prompts.
    pub fn label(self) -> &'static str {
        match self {
            ContentType::LongDescription => "Long Description",
            ContentType::ShortIdentifier => "Short Identifier",
            ContentType::ProblemStatement => "Problem Statement",
            ContentType::SolutionDescription => "Solution Description",
            ContentType::ProcessDescription => "Process Description",
            ContentType::MarketInformation => "Market Information",
            ContentType::ComparativeInformation => "Comparative Information",
            ContentType::PeopleInformation => "People Information",
            ContentType::ContactInformation => "Contact Information",
            ContentType::FeaturesBenefits => "Features/Benefits",
            ContentType::NumericalData => "Numerical Data",
            ContentType::TemporalInformation => "Temporal Information",
            ContentType::LocationInformation => "Location Information",
            ContentType::GeneralInformation => "General Information",
        }
    }

    /// Default target-length phrase for content of `original_chars` characters.
    pub fn default_target_length(self, original_chars: usize) -> String {
        let phrase = match self {
            ContentType::ShortIdentifier => "concise (1-5 words)",
            ContentType::LongDescription => "brief but comprehensive (30-50 words)",
            ContentType::ProblemStatement => "clear and concise (20-40 words)",
            ContentType::SolutionDescription => "focused and clear (30-50 words)",
            ContentType::ProcessDescription => "concise (20-30 words)",
            ContentType::MarketInformation => "data-focused (30-40 words)",
            ContentType::ComparativeInformation => "brief but insightful (30-40 words)",
            ContentType::PeopleInformation => "brief highlights (20-30 words)",
            ContentType::ContactInformation => "essential only (10-20 words)",
            ContentType::FeaturesBenefits => "bullet-point friendly (30-50 words)",
            ContentType::NumericalData => "precise and concise (10-20 words)",
            ContentType::TemporalInformation => "clear and specific (10-20 words)",
            ContentType::LocationInformation => "specific and concise (10-20 words)",
            ContentType::GeneralInformation => {
                // Roughly 60% of the original, at five characters per word.
                let words = ((original_chars as f64 * 0.6 / 5.0).round() as usize).max(20);
                return format!("concise (about {} words)", words);
            }
        };
        phrase.to_string()
    }

    pub fn default_style(self) -> &'static str {
        match self {
            ContentType::ShortIdentifier => "bold, attention-grabbing",
            ContentType::LongDescription => "professional, clear",
            ContentType::ProblemStatement => "direct, compelling",
            ContentType::SolutionDescription => "confident, solution-oriented",
            ContentType::ProcessDescription => "straightforward, structured",
            ContentType::MarketInformation => "data-driven, factual",
            ContentType::ComparativeInformation => "analytical, comparative",
            ContentType::PeopleInformation => "professional, achievement-focused",
            ContentType::ContactInformation => "clear, straightforward",
            ContentType::FeaturesBenefits => "benefit-oriented, impactful",
            ContentType::NumericalData => "precise, data-focused",
            ContentType::TemporalInformation => "chronological, clear",
            ContentType::LocationInformation => "specific, contextual",
            ContentType::GeneralInformation => "professional, concise",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derive refinement options from the field name and the element's styling.
pub fn refinement_options(field_name: &str, context: &RefinementContext) -> RefinementOptions {
    let field = field_name.to_lowercase();
    let mut options = RefinementOptions {
        bullet_points: BULLET_KEYWORDS.iter().any(|k| field.contains(k)),
        ..RefinementOptions::default()
    };

    if context.is_title {
        options.target_length = Some("very concise (1-5 words)".to_string());
    } else if context.font_size > LARGE_FONT_SIZE {
        options.target_length = Some("brief (10-20 words)".to_string());
    }

    if context.bold {
        options.style = Some("impactful, attention-grabbing".to_string());
    } else if context.italic {
        options.style = Some("descriptive, flowing".to_string());
    }

    options
}
