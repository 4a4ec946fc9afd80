//! Field-name resolution
//!
//! Template authors rarely spell a placeholder exactly the way the data source
//! spells its column. [`resolve`] bridges the gap: exact key, then
//! case-insensitive key, then a fixed list of naming-convention variations,
//! and finally dotted-path traversal into nested objects.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::item::{display_value, Item};

static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));
static SNAKE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([a-z])").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w\S*").expect("valid regex"));

/// Look up `field_name` in `item` and return its display string.
pub fn resolve(item: &Item, field_name: &str) -> Option<String> {
    resolve_value(item, field_name).map(display_value)
}

/// Same lookup as [`resolve`], returning the raw value.
pub fn resolve_value<'a>(item: &'a Item, field_name: &str) -> Option<&'a Value> {
    if let Some(value) = item.get(field_name) {
        return Some(value);
    }

    let lower = field_name.to_lowercase();
    if let Some((_, value)) = item.iter().find(|(key, _)| key.to_lowercase() == lower) {
        return Some(value);
    }

    for variation in field_name_variations(field_name) {
        if let Some(value) = item.get(&variation) {
            return Some(value);
        }
    }

    if field_name.contains('.') {
        return resolve_path(item, field_name);
    }

    None
}

/// Walk a dotted path (`company.address.city`) through nested objects.
///
/// Numeric segments index into arrays. Any missing segment is a miss.
fn resolve_path<'a>(item: &'a Item, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = item.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(values) => values.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Naming-convention variations of a field name, in lookup order.
///
/// The order matters: earlier variations win when an item carries several
/// spellings of the same column.
pub fn field_name_variations(field_name: &str) -> Vec<String> {
    let mut variations = Vec::new();
    let has_camel_hump = LOWER_UPPER.is_match(field_name);

    if has_camel_hump {
        variations.push(
            LOWER_UPPER
                .replace_all(field_name, "${1}_${2}")
                .to_lowercase(),
        );
    }

    if field_name.contains('_') {
        variations.push(
            SNAKE_SEGMENT
                .replace_all(field_name, |caps: &Captures| caps[1].to_uppercase())
                .into_owned(),
        );
    }

    if field_name.contains(' ') {
        variations.push(WHITESPACE.replace_all(field_name, "").into_owned());
    }

    if has_camel_hump {
        variations.push(LOWER_UPPER.replace_all(field_name, "${1} ${2}").into_owned());
    }

    variations.push(title_case(field_name));
    variations.push(field_name.to_lowercase());
    variations.push(field_name.to_uppercase());

    variations
}

fn title_case(text: &str) -> String {
    WORD.replace_all(text, |caps: &Captures| {
        let word = &caps[0];
        let mut chars = word.chars();
        match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.as_str().to_lowercase().chars())
                .collect(),
            None => String::new(),
        }
    })
    .into_owned()
}
