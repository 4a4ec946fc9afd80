//! Presentation document model
//!
//! A [`Deck`] is what the document store hands out and takes back: an ordered
//! list of slides, each holding positioned elements. Only the element kinds
//! the generator cares about are modelled: shapes and text boxes with styled
//! text, tables of styled cells, and embedded images.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("Invalid deck document: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("Deck '{0}' has no slides")]
    Empty(String),
}

/// Position and size of an element, in points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

/// One table cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: TextStyle,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementBody {
    Shape {
        #[serde(default)]
        text: String,
        #[serde(default)]
        style: TextStyle,
    },
    TextBox {
        #[serde(default)]
        text: String,
        #[serde(default)]
        style: TextStyle,
    },
    Table {
        rows: usize,
        cols: usize,
        cells: Vec<Vec<Cell>>,
    },
    Image {
        mime_type: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub geometry: Geometry,
    pub body: ElementBody,
}

impl Element {
    pub fn shape(text: impl Into<String>, geometry: Geometry, style: TextStyle) -> Self {
        Self {
            geometry,
            body: ElementBody::Shape {
                text: text.into(),
                style,
            },
        }
    }

    pub fn text_box(text: impl Into<String>, geometry: Geometry, style: TextStyle) -> Self {
        Self {
            geometry,
            body: ElementBody::TextBox {
                text: text.into(),
                style,
            },
        }
    }

    pub fn table(cells: Vec<Vec<Cell>>, geometry: Geometry) -> Self {
        let rows = cells.len();
        let cols = cells.iter().map(Vec::len).max().unwrap_or(0);
        Self {
            geometry,
            body: ElementBody::Table { rows, cols, cells },
        }
    }

    pub fn image(data: Vec<u8>, mime_type: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            geometry,
            body: ElementBody::Image {
                mime_type: mime_type.into(),
                data,
                source: None,
            },
        }
    }

    /// Text and style of a shape or text box.
    pub fn text(&self) -> Option<(&str, &TextStyle)> {
        match &self.body {
            ElementBody::Shape { text, style } | ElementBody::TextBox { text, style } => {
                Some((text.as_str(), style))
            }
            _ => None,
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut String> {
        match &mut self.body {
            ElementBody::Shape { text, .. } | ElementBody::TextBox { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.body {
            ElementBody::Shape { .. } => "shape",
            ElementBody::TextBox { .. } => "text_box",
            ElementBody::Table { .. } => "table",
            ElementBody::Image { .. } => "image",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub object_id: String,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Slide {
    /// Every text run on the slide, shapes and text boxes first then table cells.
    pub fn texts(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        for element in &self.elements {
            match &element.body {
                ElementBody::Shape { text, .. } | ElementBody::TextBox { text, .. } => {
                    texts.push(text.as_str())
                }
                ElementBody::Table { cells, .. } => {
                    texts.extend(cells.iter().flatten().map(|c| c.text.as_str()))
                }
                ElementBody::Image { .. } => {}
            }
        }
        texts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slides: Vec<Slide>,
}

impl Deck {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            slides: Vec::new(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, DeckError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String, DeckError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fail with [`DeckError::Empty`] when there is nothing to copy from.
    pub fn ensure_not_empty(&self) -> Result<(), DeckError> {
        if self.slides.is_empty() {
            return Err(DeckError::Empty(self.name.clone()));
        }
        Ok(())
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_deck_fixture() {
        let deck: Deck = serde_json::from_value(json!({
            "id": "tpl",
            "name": "Single Template",
            "slides": [{
                "object_id": "s1",
                "elements": [
                    {
                        "geometry": {"left": 10.0, "top": 20.0, "width": 300.0, "height": 40.0},
                        "body": {"kind": "shape", "text": "{{name}}", "style": {"font_size": 24.0, "bold": true}}
                    },
                    {
                        "body": {"kind": "table", "rows": 1, "cols": 2,
                                 "cells": [[{"text": "{{a}}"}, {"text": "b"}]]}
                    }
                ]
            }]
        }))
        .unwrap();

        let slide = &deck.slides[0];
        assert_eq!(slide.texts(), vec!["{{name}}", "{{a}}", "b"]);
        let (text, style) = slide.elements[0].text().unwrap();
        assert_eq!(text, "{{name}}");
        assert_eq!(style.font_size, Some(24.0));
        assert!(!style.italic);
        assert_eq!(slide.elements[1].geometry, Geometry::default());
    }

    #[test]
    fn test_image_data_is_base64_on_the_wire() {
        let element = Element::image(vec![1, 2, 3], "image/png", Geometry::default());
        let value = serde_json::to_value(&element).unwrap();
        assert_eq!(value["body"]["kind"], "image");
        assert_eq!(value["body"]["data"], "AQID");

        let back: Element = serde_json::from_value(value).unwrap();
        assert_eq!(back, element);
    }

    #[test]
    fn test_table_constructor_counts_dimensions() {
        let element = Element::table(
            vec![vec![Cell::new("a")], vec![Cell::new("b"), Cell::new("c")]],
            Geometry::default(),
        );
        match element.body {
            ElementBody::Table { rows, cols, .. } => assert_eq!((rows, cols), (2, 2)),
            _ => panic!("expected table"),
        }
        assert_eq!(element.kind_name(), "table");
    }

    #[test]
    fn test_text_mut_and_json_errors() {
        let mut element = Element::text_box("a", Geometry::default(), TextStyle::default());
        element.text_mut().unwrap().push('b');
        assert_eq!(element.text().map(|(t, _)| t), Some("ab"));
        assert!(Element::table(Vec::new(), Geometry::default())
            .text_mut()
            .is_none());

        assert!(matches!(Deck::from_json("{"), Err(DeckError::Invalid(_))));
        let deck = Deck::new("d", "Empty");
        assert_eq!(
            deck.ensure_not_empty().unwrap_err().to_string(),
            "Deck 'Empty' has no slides"
        );
        let back = Deck::from_json(&deck.to_json().unwrap()).unwrap();
        assert_eq!(back, deck);
    }
}
