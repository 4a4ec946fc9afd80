//! Template introspection
//!
//! Scans a template [`Deck`] for `{{field}}` placeholders and describes what
//! the template needs as a [`TemplateManifest`]: the ordered set of fields,
//! where each one appears, and a per-slide structural summary used when
//! prompting a model to map raw data onto the template.
//!
//! Also hosts the helpers that work on template references rather than
//! template contents: layout detection from the template name, deck id
//! extraction from share URLs, and the built-in layout presets.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::deck::{Deck, ElementBody, Geometry, Slide};
use crate::pairing::Layout;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("valid regex"));
static LEGACY_SQUARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").expect("valid regex"));
static LEGACY_ANGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("valid regex"));
static LEGACY_DOLLAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));
static DECK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").expect("valid regex"));

/// At most this many example occurrences are kept per field.
pub const MAX_FIELD_EXAMPLES: usize = 3;
/// Font size reported when an element carries none.
pub const MANIFEST_DEFAULT_FONT_SIZE: f64 = 12.0;

const FIRST_SLIDE_TITLE_TOP: f64 = 150.0;
const TITLE_TOP: f64 = 100.0;

/// A `{{token}}` occurrence in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    /// The token as written, braces included.
    pub raw: String,
    /// The trimmed field name.
    pub name: String,
}

/// All `{{field}}` tokens in `text`, in order of appearance.
pub fn placeholder_tokens(text: &str) -> Vec<PlaceholderToken> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| PlaceholderToken {
            raw: caps[0].to_string(),
            name: caps[1].trim().to_string(),
        })
        .collect()
}

/// Field names referenced by `text`, in order of appearance.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    placeholder_tokens(text).into_iter().map(|t| t.name).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldExample {
    pub slide_number: usize,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRequirement {
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<FieldExample>,
}

impl FieldRequirement {
    fn preset(name: &str, description: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required,
            examples: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDescriptor {
    pub row: usize,
    pub col: usize,
    pub text: String,
    pub font_size: f64,
    pub is_bold: bool,
    pub is_italic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementDescriptor {
    #[serde(rename_all = "camelCase")]
    Text {
        kind: &'static str,
        index: usize,
        text: String,
        is_title: bool,
        font_size: f64,
        is_bold: bool,
        is_italic: bool,
        position: Geometry,
    },
    #[serde(rename_all = "camelCase")]
    Table {
        index: usize,
        rows: usize,
        cols: usize,
        cells: Vec<CellDescriptor>,
    },
}

/// Slide category inferred from its title text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideKind {
    Unknown,
    Overview,
    Problem,
    Solution,
    Market,
    Product,
    BusinessModel,
    Team,
    Contact,
    General,
}

const SLIDE_KIND_RULES: &[(SlideKind, &[&str])] = &[
    (SlideKind::Overview, &["overview", "introduction"]),
    (SlideKind::Problem, &["problem"]),
    (SlideKind::Solution, &["solution"]),
    (SlideKind::Market, &["market", "opportunity"]),
    (SlideKind::Product, &["product", "service"]),
    (SlideKind::BusinessModel, &["business", "model"]),
    (SlideKind::Team, &["team"]),
    (SlideKind::Contact, &["contact", "thank"]),
];

impl SlideKind {
    pub fn from_title(title: &str) -> Self {
        if title.trim().is_empty() {
            return SlideKind::Unknown;
        }
        let title = title.to_lowercase();
        SLIDE_KIND_RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| title.contains(k)))
            .map(|(kind, _)| *kind)
            .unwrap_or(SlideKind::General)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideDescriptor {
    pub slide_number: usize,
    pub kind: SlideKind,
    pub elements: Vec<ElementDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateManifest {
    pub name: String,
    pub description: String,
    pub slide_count: usize,
    pub fields: Vec<FieldRequirement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slide_structure: Vec<SlideDescriptor>,
}

impl TemplateManifest {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Whether an element at `top` is probably the title of slide `slide_index`.
pub fn is_likely_title(top: f64, slide_index: usize) -> bool {
    if slide_index == 0 {
        top < FIRST_SLIDE_TITLE_TOP
    } else {
        top < TITLE_TOP
    }
}

/// Text of the first title-positioned shape or text box on the slide.
pub fn slide_title(slide: &Slide, slide_index: usize) -> Option<&str> {
    slide.elements.iter().find_map(|element| {
        let (text, _) = element.text()?;
        (is_likely_title(element.geometry.top, slide_index) && !text.trim().is_empty())
            .then_some(text)
    })
}

/// Build the field manifest of a template deck.
///
/// Running it twice over the same deck yields the same manifest.
pub fn build_manifest(deck: &Deck) -> TemplateManifest {
    let mut fields: Vec<FieldRequirement> = Vec::new();
    let mut slide_structure = Vec::with_capacity(deck.slides.len());

    let mut record = |name: String, slide_number: usize, context: &str| {
        let position = match fields.iter().position(|f| f.name == name) {
            Some(position) => position,
            None => {
                fields.push(FieldRequirement {
                    description: format!("Replace \"{}\" in the template", name),
                    name,
                    required: true,
                    examples: Vec::new(),
                });
                fields.len() - 1
            }
        };
        let field = &mut fields[position];
        let already_seen = field
            .examples
            .iter()
            .any(|e| e.slide_number == slide_number && e.context == context);
        if field.examples.len() < MAX_FIELD_EXAMPLES && !already_seen {
            field.examples.push(FieldExample {
                slide_number,
                context: context.to_string(),
            });
        }
    };

    for (slide_index, slide) in deck.slides.iter().enumerate() {
        let slide_number = slide_index + 1;
        let mut elements = Vec::new();
        let mut text_index = 0;
        let mut table_index = 0;

        for element in &slide.elements {
            match &element.body {
                ElementBody::Shape { text, style } | ElementBody::TextBox { text, style } => {
                    let index = text_index;
                    text_index += 1;
                    if text.trim().is_empty() {
                        continue;
                    }
                    for name in extract_placeholders(text) {
                        record(name, slide_number, text);
                    }
                    elements.push(ElementDescriptor::Text {
                        kind: element.kind_name(),
                        index,
                        text: text.clone(),
                        is_title: is_likely_title(element.geometry.top, slide_index),
                        font_size: style.font_size.unwrap_or(MANIFEST_DEFAULT_FONT_SIZE),
                        is_bold: style.bold,
                        is_italic: style.italic,
                        position: element.geometry,
                    });
                }
                ElementBody::Table { rows, cols, cells } => {
                    let index = table_index;
                    table_index += 1;
                    let mut described = Vec::new();
                    for (row, row_cells) in cells.iter().enumerate() {
                        for (col, cell) in row_cells.iter().enumerate() {
                            if cell.text.trim().is_empty() {
                                continue;
                            }
                            for name in extract_placeholders(&cell.text) {
                                record(name, slide_number, &cell.text);
                            }
                            described.push(CellDescriptor {
                                row,
                                col,
                                text: cell.text.clone(),
                                font_size: cell
                                    .style
                                    .font_size
                                    .unwrap_or(MANIFEST_DEFAULT_FONT_SIZE),
                                is_bold: cell.style.bold,
                                is_italic: cell.style.italic,
                            });
                        }
                    }
                    if !described.is_empty() {
                        elements.push(ElementDescriptor::Table {
                            index,
                            rows: *rows,
                            cols: *cols,
                            cells: described,
                        });
                    }
                }
                ElementBody::Image { .. } => {}
            }
        }

        slide_structure.push(SlideDescriptor {
            slide_number,
            kind: SlideKind::from_title(slide_title(slide, slide_index).unwrap_or("")),
            elements,
        });
    }

    TemplateManifest {
        name: deck.name.clone(),
        description: "Auto-detected template structure".to_string(),
        slide_count: deck.slides.len(),
        fields,
        slide_structure,
    }
}

/// Rewrite `[X]`, `<X>` and `${X}` tokens as `{{X}}`.
///
/// Returns the new text and the number of tokens converted.
pub fn convert_legacy_placeholders(text: &str) -> (String, usize) {
    let mut converted = text.to_string();
    let mut count = 0;

    for pattern in [&*LEGACY_SQUARE, &*LEGACY_ANGLE, &*LEGACY_DOLLAR] {
        for caps in pattern.captures_iter(text) {
            let replacement = format!("{{{{{}}}}}", caps[1].trim());
            converted = converted.replacen(&caps[0], &replacement, 1);
            count += 1;
        }
    }

    (converted, count)
}

/// Convert legacy placeholders in every text-bearing element of the deck.
pub fn convert_deck(deck: &mut Deck) -> usize {
    let mut total = 0;
    let mut convert = |text: &mut String| {
        let (converted, count) = convert_legacy_placeholders(text.as_str());
        if count > 0 {
            *text = converted;
            total += count;
        }
    };

    for slide in &mut deck.slides {
        for element in &mut slide.elements {
            match &mut element.body {
                ElementBody::Shape { text, .. } | ElementBody::TextBox { text, .. } => {
                    convert(text)
                }
                ElementBody::Table { cells, .. } => {
                    cells.iter_mut().flatten().for_each(|cell| convert(&mut cell.text))
                }
                ElementBody::Image { .. } => {}
            }
        }
    }

    total
}

/// The name part of a template reference.
///
/// Plain ids are returned as-is; for paths and URLs the second-to-last
/// segment is used (the last one when that is empty).
pub fn template_name(template_ref: &str) -> &str {
    if !template_ref.contains('/') {
        return template_ref;
    }
    let parts: Vec<&str> = template_ref.split('/').collect();
    let second_to_last = parts[parts.len() - 2];
    if second_to_last.is_empty() {
        parts[parts.len() - 1]
    } else {
        second_to_last
    }
}

/// Layout implied by a template's name, if any.
pub fn detect_layout(template_ref: &str) -> Option<Layout> {
    let name = template_name(template_ref).to_lowercase();
    if name.contains("single") {
        Some(Layout::Single)
    } else if name.contains("double") {
        Some(Layout::Double)
    } else {
        None
    }
}

/// Deck id from a share URL (`.../d/<id>/edit`), or the input when it is
/// already a bare id.
pub fn extract_deck_id(reference: &str) -> String {
    DECK_ID
        .captures(reference)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| reference.trim().to_string())
}

/// Built-in field requirements for templates that expose no placeholders.
///
/// Known template names take precedence over the layout preset; an unknown
/// layout gets the generic preset.
pub fn preset_manifest(template_ref: &str, layout: Option<Layout>) -> TemplateManifest {
    let name = template_name(template_ref).to_lowercase();
    if name.contains("startup_pitch") {
        return manifest(
            "Pitch Deck Template",
            "Template for pitch presentations",
            &[
                ("name", "Name or title", true),
                ("tagline", "Short tagline or slogan", false),
                ("description", "Brief description (50 words max)", true),
                ("problem", "Problem being addressed", true),
                ("solution", "Solution being offered", true),
                ("model", "Business or operational model", true),
                ("market", "Target market information", false),
                ("competitors", "Main competitors or alternatives", false),
                ("team", "Key team members", false),
                ("status", "Current status or stage", false),
                ("contact", "Contact information", false),
                ("logo", "Logo or main image", false),
            ],
        );
    }
    if name.contains("comparison") {
        return manifest(
            "Comparison Template",
            "Template for comparing items",
            &[
                ("title", "Comparison title", true),
                ("item1Name", "Name of first item", true),
                ("item1Description", "Description of first item", true),
                ("item1Image", "Image of first item", false),
                ("item2Name", "Name of second item", true),
                ("item2Description", "Description of second item", true),
                ("item2Image", "Image of second item", false),
                ("comparisonTable", "Comparison table data", false),
            ],
        );
    }

    match layout {
        Some(Layout::Single) => manifest(
            "Single Item Template",
            "Template for single item presentations",
            &[
                ("name", "Name or title of the item", true),
                ("description", "Brief description (50 words max)", true),
                ("category", "Category or type", false),
                ("details", "Additional details", false),
                ("location", "Location information", false),
                ("date", "Date or time information", false),
                ("features", "Key features or characteristics", false),
                ("link", "Related link or URL", false),
                ("image", "Image of the item", false),
            ],
        ),
        Some(Layout::Double) => manifest(
            "Double Item Template",
            "Template for comparing two items",
            &[
                ("item1Name", "Name of the first item", true),
                ("item1Description", "Brief description of first item", true),
                ("item1Category", "Category of first item", false),
                ("item1Image", "Image of the first item", false),
                ("item2Name", "Name of the second item", true),
                ("item2Description", "Brief description of second item", true),
                ("item2Category", "Category of second item", false),
                ("item2Image", "Image of the second item", false),
                ("comparisonPoints", "Key comparison points", false),
            ],
        ),
        None => manifest(
            "Generic Template",
            "Generic presentation template",
            &[
                ("title", "Slide title", true),
                ("content", "Slide content", true),
                ("image", "Slide image", false),
            ],
        ),
    }
}

fn manifest(name: &str, description: &str, fields: &[(&str, &str, bool)]) -> TemplateManifest {
    TemplateManifest {
        name: name.to_string(),
        description: description.to_string(),
        slide_count: 0,
        fields: fields
            .iter()
            .map(|(name, description, required)| {
                FieldRequirement::preset(name, description, *required)
            })
            .collect(),
        slide_structure: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{Cell, Element, TextStyle};

    fn at(top: f64) -> Geometry {
        Geometry {
            left: 10.0,
            top,
            width: 300.0,
            height: 50.0,
        }
    }

    fn fixture_deck() -> Deck {
        Deck {
            id: "tpl".to_string(),
            name: "Company Single".to_string(),
            slides: vec![
                Slide {
                    object_id: "s1".to_string(),
                    elements: vec![
                        Element::shape(
                            "{{ name }}",
                            at(40.0),
                            TextStyle {
                                font_size: Some(28.0),
                                bold: true,
                                italic: false,
                            },
                        ),
                        Element::text_box("{{description}}", at(200.0), TextStyle::default()),
                        Element::shape("   ", at(300.0), TextStyle::default()),
                    ],
                },
                Slide {
                    object_id: "s2".to_string(),
                    elements: vec![
                        Element::shape("Team overview", at(20.0), TextStyle::default()),
                        Element::table(
                            vec![
                                vec![Cell::new("Name"), Cell::new("{{name}}")],
                                vec![Cell::new(""), Cell::new("{{team}}")],
                            ],
                            at(120.0),
                        ),
                    ],
                },
            ],
        }
    }

    #[test]
    fn test_extract_placeholders() {
        assert_eq!(
            extract_placeholders("Hello {{name}}, welcome to {{city}}"),
            vec!["name", "city"]
        );
        assert_eq!(extract_placeholders("{{ spaced }}"), vec!["spaced"]);
        assert!(extract_placeholders("{single} [legacy] ${x}").is_empty());
    }

    #[test]
    fn test_manifest_single_text() {
        let deck = Deck {
            id: "d".to_string(),
            name: "Greeting".to_string(),
            slides: vec![Slide {
                object_id: "s1".to_string(),
                elements: vec![Element::shape(
                    "Hello {{name}}, welcome to {{city}}",
                    at(200.0),
                    TextStyle::default(),
                )],
            }],
        };
        let manifest = build_manifest(&deck);
        assert_eq!(manifest.field_names(), vec!["name", "city"]);
        for field in &manifest.fields {
            assert!(field.required);
            assert_eq!(field.examples.len(), 1);
            assert_eq!(field.examples[0].slide_number, 1);
        }
    }

    #[test]
    fn test_manifest_fields_and_examples() {
        let manifest = build_manifest(&fixture_deck());
        assert_eq!(manifest.name, "Company Single");
        assert_eq!(manifest.slide_count, 2);
        assert_eq!(manifest.field_names(), vec!["name", "description", "team"]);

        let name = &manifest.fields[0];
        assert_eq!(name.description, "Replace \"name\" in the template");
        assert_eq!(
            name.examples,
            vec![
                FieldExample {
                    slide_number: 1,
                    context: "{{ name }}".to_string()
                },
                FieldExample {
                    slide_number: 2,
                    context: "{{name}}".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_manifest_examples_are_capped() {
        let slides = (0..5)
            .map(|i| Slide {
                object_id: format!("s{i}"),
                elements: vec![Element::shape("{{x}}", at(300.0), TextStyle::default())],
            })
            .collect();
        let deck = Deck {
            id: "d".to_string(),
            name: "n".to_string(),
            slides,
        };
        assert_eq!(build_manifest(&deck).fields[0].examples.len(), MAX_FIELD_EXAMPLES);
    }

    #[test]
    fn test_manifest_slide_structure() {
        let manifest = build_manifest(&fixture_deck());
        let first = &manifest.slide_structure[0];
        // The blank shape is skipped.
        assert_eq!(first.elements.len(), 2);
        match &first.elements[0] {
            ElementDescriptor::Text {
                kind,
                is_title,
                font_size,
                is_bold,
                ..
            } => {
                assert_eq!(*kind, "shape");
                assert!(*is_title);
                assert_eq!(*font_size, 28.0);
                assert!(*is_bold);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
        match &first.elements[1] {
            ElementDescriptor::Text {
                is_title, font_size, ..
            } => {
                assert!(!*is_title);
                assert_eq!(*font_size, MANIFEST_DEFAULT_FONT_SIZE);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }

        let second = &manifest.slide_structure[1];
        assert_eq!(second.kind, SlideKind::Overview);
        match &second.elements[1] {
            ElementDescriptor::Table {
                rows, cols, cells, ..
            } => {
                assert_eq!((*rows, *cols), (2, 2));
                assert_eq!(cells.len(), 3);
            }
            other => panic!("unexpected descriptor: {other:?}"),
        }
    }

    #[test]
    fn test_manifest_is_idempotent() {
        let deck = fixture_deck();
        assert_eq!(build_manifest(&deck), build_manifest(&deck));
    }

    #[test]
    fn test_title_thresholds() {
        assert!(is_likely_title(120.0, 0));
        assert!(!is_likely_title(120.0, 1));
        assert!(is_likely_title(99.0, 3));
    }

    #[test]
    fn test_slide_kind_from_title() {
        assert_eq!(SlideKind::from_title(""), SlideKind::Unknown);
        assert_eq!(SlideKind::from_title("The Problem"), SlideKind::Problem);
        assert_eq!(SlideKind::from_title("Business Model"), SlideKind::BusinessModel);
        assert_eq!(SlideKind::from_title("Thank you!"), SlideKind::Contact);
        assert_eq!(SlideKind::from_title("Roadmap"), SlideKind::General);
    }

    #[test]
    fn test_convert_legacy_placeholders() {
        let (text, count) = convert_legacy_placeholders("[Name] is a <Role> in ${City}");
        assert_eq!(text, "{{Name}} is a {{Role}} in {{City}}");
        assert_eq!(count, 3);

        let (text, count) = convert_legacy_placeholders("Already {{standard}}");
        assert_eq!(text, "Already {{standard}}");
        assert_eq!(count, 0);

        let (text, _) = convert_legacy_placeholders("[ spaced ]");
        assert_eq!(text, "{{spaced}}");
    }

    #[test]
    fn test_convert_deck() {
        let mut deck = Deck {
            id: "d".to_string(),
            name: "n".to_string(),
            slides: vec![Slide {
                object_id: "s1".to_string(),
                elements: vec![
                    Element::shape("[Name]", at(0.0), TextStyle::default()),
                    Element::table(vec![vec![Cell::new("<Role>")]], at(0.0)),
                ],
            }],
        };
        assert_eq!(convert_deck(&mut deck), 2);
        assert_eq!(deck.slides[0].texts(), vec!["{{Name}}", "{{Role}}"]);
        assert_eq!(build_manifest(&deck).field_names(), vec!["Name", "Role"]);
    }

    #[test]
    fn test_detect_layout() {
        assert_eq!(detect_layout("Company_Double_Template"), Some(Layout::Double));
        assert_eq!(detect_layout("decks/single-company/edit"), Some(Layout::Single));
        assert_eq!(detect_layout("decks/other/"), None);
        assert_eq!(detect_layout("pitch"), None);
    }

    #[test]
    fn test_template_name() {
        assert_eq!(template_name("abc"), "abc");
        assert_eq!(template_name("https://host/d/ID123/edit"), "ID123");
        assert_eq!(template_name("folder/"), "folder");
    }

    #[test]
    fn test_extract_deck_id() {
        assert_eq!(
            extract_deck_id("https://docs.google.com/presentation/d/1AbC_d-E/edit#slide=id.p"),
            "1AbC_d-E"
        );
        assert_eq!(extract_deck_id(" plain-id "), "plain-id");
    }

    #[test]
    fn test_preset_manifest() {
        let pitch = preset_manifest("my_startup_pitch_v2", Some(Layout::Double));
        assert_eq!(pitch.name, "Pitch Deck Template");
        assert_eq!(pitch.fields.len(), 12);

        let double = preset_manifest("plain", Some(Layout::Double));
        assert_eq!(double.fields[0].name, "item1Name");
        assert!(double.fields[0].required);

        let generic = preset_manifest("plain", None);
        assert_eq!(generic.field_names(), vec!["title", "content", "image"]);
    }
}
