//! Two-stage placeholder substitution
//!
//! Stage one ([`plan_element`]) looks every `{{field}}` token of a text up in
//! the item and decides what it becomes: left alone, plain text (possibly
//! marked for refinement), or an image. The shell refines the text entries,
//! then [`render`] writes the values into the text, leaving an
//! `[IMAGE:field]` marker for each image. Stage two happens against the live
//! slide: each marker is resolved to an inserted image (marker stripped) or
//! an inline error (marker replaced), see [`replace_marker`].

use std::collections::BTreeSet;

use serde::Serialize;

use crate::classify::{is_image_column, should_refine};
use crate::image::image_marker;
use crate::item::Item;
use crate::resolve::resolve;
use crate::template::placeholder_tokens;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlannedValue {
    /// No matching field; the token stays verbatim.
    Unresolved,
    Text { value: String, refine: bool },
    Image { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPlaceholder {
    /// Token as it appears in the text.
    pub raw: String,
    pub field: String,
    pub value: PlannedValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstitutionPlan {
    pub original: String,
    pub placeholders: Vec<PlannedPlaceholder>,
}

impl SubstitutionPlan {
    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Text entries the shell should send through refinement.
    pub fn refinable(&mut self) -> impl Iterator<Item = (&str, &mut String)> {
        self.placeholders.iter_mut().filter_map(|p| match &mut p.value {
            PlannedValue::Text {
                value,
                refine: true,
            } => Some((p.field.as_str(), value)),
            _ => None,
        })
    }
}

/// An image waiting to be resolved against the live slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub pending_images: Vec<PendingImage>,
}

impl Rendered {
    pub fn changed(&self, original: &str) -> bool {
        self.text != original
    }
}

/// Stage one: decide what every placeholder in `text` turns into.
///
/// `image_columns` are the columns ingestion tagged as holding images; they
/// take the image branch even when their name does not look like one.
pub fn plan_element(
    text: &str,
    item: &Item,
    image_columns: &BTreeSet<String>,
) -> SubstitutionPlan {
    let placeholders = placeholder_tokens(text)
        .into_iter()
        .map(|token| {
            let value = match resolve(item, &token.name) {
                None => PlannedValue::Unresolved,
                Some(value) if is_image_column(&token.name, image_columns) => {
                    PlannedValue::Image { value }
                }
                Some(value) => {
                    let refine = should_refine(&token.name, &value);
                    PlannedValue::Text { value, refine }
                }
            };
            PlannedPlaceholder {
                raw: token.raw,
                field: token.name,
                value,
            }
        })
        .collect();

    SubstitutionPlan {
        original: text.to_string(),
        placeholders,
    }
}

/// Write the planned values into the text.
///
/// Each placeholder replaces the first remaining occurrence of its token, so
/// repeated tokens are filled in order.
pub fn render(plan: &SubstitutionPlan) -> Rendered {
    let mut text = plan.original.clone();
    let mut pending_images = Vec::new();

    for placeholder in &plan.placeholders {
        match &placeholder.value {
            PlannedValue::Unresolved => {}
            PlannedValue::Text { value, .. } => {
                text = text.replacen(&placeholder.raw, value, 1);
            }
            PlannedValue::Image { value } => {
                text = text.replacen(&placeholder.raw, &image_marker(&placeholder.field), 1);
                pending_images.push(PendingImage {
                    field: placeholder.field.clone(),
                    value: value.clone(),
                });
            }
        }
    }

    Rendered {
        text,
        pending_images,
    }
}

/// Stage two: replace the first `[IMAGE:field]` marker with `replacement`.
///
/// Returns `None` when the marker is no longer in the text.
pub fn replace_marker(text: &str, field: &str, replacement: &str) -> Option<String> {
    let marker = image_marker(field);
    text.contains(&marker)
        .then(|| text.replacen(&marker, replacement, 1))
}
