//! Model-assisted data mapping
//!
//! When the input is free-form, a model maps it onto the template in two
//! steps: an analysis of the data's structure, then a mapping prompt that
//! combines the data, the analysis and the [`TemplateManifest`]. The model is
//! asked for `{"items": [...], "metadata": {...}}`; [`parse_mapping_response`]
//! tolerates prose around the JSON.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::{truncate_data, DataFormat};
use crate::item::Item;
use crate::pairing::Layout;
use crate::template::{ElementDescriptor, TemplateManifest};

pub const ANALYSIS_SYSTEM_INSTRUCTION: &str = "You are a data analysis expert that can identify structure and patterns in any data format. Provide detailed analysis that will help with data transformation.";
pub const MAPPING_SYSTEM_INSTRUCTION: &str = "You are a data transformation expert that maps source data to target templates with high accuracy. Always return valid JSON that matches the requested format exactly.";

pub const ANALYSIS_DATA_CHARS: usize = 8000;
pub const MAPPING_DATA_CHARS: usize = 6000;

const TEXT_PREVIEW_CHARS: usize = 50;
const CELL_PREVIEW_CHARS: usize = 30;
const CELL_EXAMPLES: usize = 3;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Failed to process data: {source}")]
    Unparseable {
        source: serde_json::Error,
        raw_response: String,
    },
    #[error("Mapped data contains no 'items' array")]
    MissingItems,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingMetadata {
    #[serde(default)]
    pub detected_format: Option<String>,
    #[serde(default)]
    pub total_items: Option<u64>,
    #[serde(default)]
    pub mapping_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MappedData {
    pub items: Vec<Item>,
    #[serde(default)]
    pub metadata: Option<MappingMetadata>,
}

/// Prompt asking the model to describe the structure of `raw`.
pub fn analysis_prompt(raw: &str, format: Option<DataFormat>) -> String {
    let data = truncate_data(raw, ANALYSIS_DATA_CHARS);
    let hint = match format {
        Some(format) if format != DataFormat::Unknown => {
            format!("The data appears to be in {} format.", format)
        }
        _ => "Please analyze the format of the data without any assumptions.".to_string(),
    };

    format!(
        "I need you to analyze the structure of the following data:\n\n\
{data}\n\n\
{hint}\n\n\
Please provide a detailed analysis including:\n\
1. What format is this data in? (CSV, JSON, table, etc.)\n\
2. What are the column headers or key fields?\n\
3. How many records/rows are in the data?\n\
4. What types of values are in each column/field?\n\
5. Are there any patterns or relationships between fields?\n\
6. What appears to be the primary entity or subject of this data?\n\
7. What fields would be most important for a presentation about this data?\n\n\
Your analysis will be used to help map this data to a presentation template.\n"
    )
}

/// Prompt asking the model to map `raw` onto the template's fields.
pub fn mapping_prompt(
    raw: &str,
    manifest: &TemplateManifest,
    analysis: &str,
    layout: Layout,
) -> String {
    let data = truncate_data(raw, MAPPING_DATA_CHARS);
    let layout_label = match layout {
        Layout::Double => "DOUBLE (Two items per slide)",
        Layout::Single => "SINGLE (One item per slide)",
    };

    format!(
        "# Data Transformation Task\n\n\
## Source Data\n```\n{data}\n```\n\n\
## Data Analysis\n{analysis}\n\n\
## Template Information\nLayout Type: {layout_label}\n\n\
{description}\n\
## Required Mappings\n{mappings}\n\
## Your Task\n\
Transform the source data to match the template requirements. For each item in the source data:\n\
1. Extract the relevant information\n\
2. Map it to the corresponding template fields (all placeholders use the {{{{field}}}} format)\n\
3. Transform content as needed (summarize long text, format dates, etc.)\n\
4. Ensure the output matches the exact format required by the template\n\n\
IMPORTANT NOTES:\n\
- The template ONLY uses {{{{field}}}} format for placeholders (e.g., {{{{name}}}}, {{{{description}}}})\n\
- If this is a \"double\" layout template, the fields will be prefixed with \"item1\" and \"item2\" (e.g., {{{{item1Name}}}}, {{{{item2Description}}}})\n\
- If this is a \"single\" layout template, the fields will not have these prefixes (e.g., {{{{name}}}}, {{{{description}}}})\n\
- Image fields (e.g., {{{{logo}}}}, {{{{image}}}}, {{{{photo}}}}) will be detected automatically and processed differently\n\
- For image fields, provide a URL, base64 data, or a descriptive text that can be used to generate a placeholder\n\
- All text content will be dynamically refined for presentation quality based on the field type and context\n\
- Extract all relevant information from the source data, even if not explicitly requested in the template\n\n\
Return a JSON object with this structure:\n\
```json\n\
{{\n  \"items\": [\n    {{ \"field\": \"value\" }}\n  ],\n  \"metadata\": {{\n    \"detectedFormat\": \"csv\",\n    \"totalItems\": 0,\n    \"mappingConfidence\": 0.0\n  }}\n}}\n\
```\n\n\
Only return the JSON object, nothing else. Ensure it is valid JSON that can be parsed.\n",
        description = template_description(manifest),
        mappings = required_mappings(manifest, layout),
    )
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Human-readable outline of the template for prompts.
pub fn template_description(manifest: &TemplateManifest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Template Name: {}", manifest.name);
    let _ = writeln!(out, "Description: {}", manifest.description);
    if manifest.slide_count > 0 {
        let _ = writeln!(out, "Number of Slides: {}", manifest.slide_count);
    }

    if !manifest.slide_structure.is_empty() {
        out.push_str("\nSlide Structure:\n");
        for slide in &manifest.slide_structure {
            let _ = writeln!(out, "\nSlide {}:", slide.slide_number);
            for element in &slide.elements {
                match element {
                    ElementDescriptor::Text { text, is_title, .. } => {
                        let role = if *is_title { "Title" } else { "Text" };
                        let _ = writeln!(
                            out,
                            "- {}: \"{}\"",
                            role,
                            preview(text, TEXT_PREVIEW_CHARS)
                        );
                    }
                    ElementDescriptor::Table {
                        rows, cols, cells, ..
                    } => {
                        let _ = writeln!(out, "- Table ({}x{})", rows, cols);
                        for cell in cells.iter().take(CELL_EXAMPLES) {
                            let _ = writeln!(
                                out,
                                "  - Cell [{},{}]: \"{}\"",
                                cell.row,
                                cell.col,
                                preview(&cell.text, CELL_PREVIEW_CHARS)
                            );
                        }
                        if cells.len() > CELL_EXAMPLES {
                            let _ = writeln!(
                                out,
                                "  - ({} more cells...)",
                                cells.len() - CELL_EXAMPLES
                            );
                        }
                    }
                }
            }
        }
    }
    out
}

/// Field-by-field mapping requirements for prompts.
pub fn required_mappings(manifest: &TemplateManifest, layout: Layout) -> String {
    if manifest.fields.is_empty() {
        return "No specific mapping requirements. Please extract any relevant information from the data.\n"
            .to_string();
    }

    let mut out = String::from("The following fields need to be mapped from the source data:\n\n");
    out.push_str("NOTE: All placeholders in the template use the {{field}} format.\n\n");
    if layout == Layout::Double {
        out.push_str("IMPORTANT: This is a DOUBLE layout template. Fields should be prefixed with 'item1' and 'item2'.\n");
        out.push_str("For backward compatibility, you can also use 'company1' and 'company2' prefixes.\n\n");
    }

    for field in &manifest.fields {
        let _ = writeln!(out, "### {{{{{}}}}}", field.name);
        let _ = writeln!(out, "Description: {}", field.description);
        let _ = writeln!(out, "Required: {}", if field.required { "Yes" } else { "No" });
        if !field.examples.is_empty() {
            out.push_str("Examples of where this appears in the template:\n");
            for example in &field.examples {
                let _ = writeln!(
                    out,
                    "- Slide {}: \"{}\"",
                    example.slide_number, example.context
                );
            }
        }
        out.push('\n');
    }

    out.push_str("## Image Field Guidance\n\n");
    out.push_str("Some fields may represent images (e.g., logo, image, photo, thumbnail, icon):\n");
    out.push_str("1. For image fields, provide one of the following:\n");
    out.push_str("   - A direct URL to an image (e.g., 'https://example.com/image.jpg')\n");
    out.push_str("   - An image store file ID\n");
    out.push_str("   - Base64 encoded image data\n");
    out.push_str("   - A descriptive text that can be used to generate a placeholder\n");
    out.push_str("2. Image fields will be automatically detected based on their names\n");
    out.push_str("3. The system will handle positioning and sizing of images automatically\n\n");

    if layout == Layout::Double {
        out.push_str("## Double Layout Guidance\n\n");
        out.push_str("For this double layout template, you need to:\n");
        out.push_str("1. Pair up the data items (two items per slide)\n");
        out.push_str("2. Format each pair with item1 and item2 prefixes\n");
        out.push_str("3. For example, map 'name' to {{item1Name}} and {{item2Name}}\n");
        out.push_str("4. Also include {{company1Name}}, {{company1Description}}, {{company2Name}} and {{company2Description}} aliases\n\n");
    }

    out
}

/// Parse the model's mapping answer.
///
/// Falls back to the outermost `{...}` block when the answer wraps the JSON
/// in prose or code fences.
pub fn parse_mapping_response(response: &str) -> Result<MappedData, MappingError> {
    let value = match serde_json::from_str::<Value>(response.trim()) {
        Ok(value) => value,
        Err(first_error) => JSON_BLOCK
            .find(response)
            .and_then(|block| serde_json::from_str::<Value>(block.as_str()).ok())
            .ok_or_else(|| MappingError::Unparseable {
                source: first_error,
                raw_response: response.to_string(),
            })?,
    };

    if !value.get("items").is_some_and(Value::is_array) {
        return Err(MappingError::MissingItems);
    }

    serde_json::from_value(value).map_err(|source| MappingError::Unparseable {
        source,
        raw_response: response.to_string(),
    })
}
