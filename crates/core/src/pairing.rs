//! Layout pairing
//!
//! A `double` template shows two records side by side. [`pair`] merges
//! consecutive items into one record whose keys are prefixed `item1`/`item2`,
//! plus `company1*`/`company2*` aliases older templates still reference.

use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::item::{is_truthy, Item};

pub const MISSING_NAME: &str = "N/A";
pub const MISSING_DESCRIPTION: &str = "No information available.";

const NAME_SOURCES: &[&str] = &["companyName", "name", "title"];
const DESCRIPTION_SOURCES: &[&str] = &["description", "about"];
/// Keys already covered by the name/description aliases.
const UNMIRRORED_KEYS: &[&str] = &["companyName", "name", "description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Single,
    Double,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid layout '{0}', expected 'single' or 'double'")]
pub struct InvalidLayout(pub String);

impl FromStr for Layout {
    type Err = InvalidLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(Layout::Single),
            "double" => Ok(Layout::Double),
            _ => Err(InvalidLayout(s.to_string())),
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Single => f.write_str("single"),
            Layout::Double => f.write_str("double"),
        }
    }
}

/// Uppercase the first character, leaving the rest untouched.
pub fn capitalize_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether `items` already went through pairing.
pub fn is_already_paired(items: &[Item]) -> bool {
    items.first().is_some_and(|first| {
        ["company1", "company1Name"]
            .iter()
            .any(|key| first.get(key).is_some_and(is_truthy))
    })
}

/// Combine items for `layout`.
///
/// `single` and already-paired input pass through untouched, so pairing
/// twice is the same as pairing once.
pub fn pair(items: Vec<Item>, layout: Layout) -> Vec<Item> {
    if layout != Layout::Double || items.is_empty() || is_already_paired(&items) {
        return items;
    }

    items
        .chunks(2)
        .map(|chunk| match chunk {
            [first, second] => pair_two(first, second),
            [single] => pair_trailing(single),
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

fn pair_two(first: &Item, second: &Item) -> Item {
    let mut paired = Item::new();
    add_side(&mut paired, first, 1);
    add_side(&mut paired, second, 2);
    paired
}

fn pair_trailing(single: &Item) -> Item {
    let mut paired = Item::new();
    add_side(&mut paired, single, 1);
    paired.insert("item2Name", MISSING_NAME);
    paired.insert("company2Name", MISSING_NAME);
    paired.insert("item2Description", MISSING_DESCRIPTION);
    paired.insert("company2Description", MISSING_DESCRIPTION);
    paired
}

/// Add one source item under the `item<n>`/`company<n>` prefixes.
fn add_side(paired: &mut Item, source: &Item, n: usize) {
    for (key, value) in source.iter() {
        paired.insert(format!("item{}{}", n, capitalize_first(key)), value.clone());
    }

    let name_alias = format!("company{}Name", n);
    let description_alias = format!("company{}Description", n);
    let name = first_truthy(source, NAME_SOURCES)
        .unwrap_or_else(|| Value::from(format!("Item {}", n)));
    let description =
        first_truthy(source, DESCRIPTION_SOURCES).unwrap_or_else(|| Value::from(""));
    paired.insert(name_alias.clone(), name);
    paired.insert(description_alias.clone(), description);

    for (key, value) in source.iter() {
        if UNMIRRORED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let mirrored = format!("company{}{}", n, capitalize_first(key));
        if mirrored == name_alias || mirrored == description_alias {
            continue;
        }
        paired.insert(mirrored, value.clone());
    }
}

fn first_truthy(item: &Item, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| item.get(key))
        .find(|value| is_truthy(value))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use serde_json::json;

    fn items(value: Value) -> Vec<Item> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("double".parse::<Layout>(), Ok(Layout::Double));
        assert_eq!(" Single ".parse::<Layout>(), Ok(Layout::Single));
        assert_eq!(
            "triple".parse::<Layout>(),
            Err(InvalidLayout("triple".to_string()))
        );
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("name"), "Name");
        assert_eq!(capitalize_first("dateFounded"), "DateFounded");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn test_single_layout_is_identity() {
        let input = items(json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]));
        assert_eq!(pair(input.clone(), Layout::Single), input);
    }

    #[test]
    fn test_empty_input() {
        assert!(pair(Vec::new(), Layout::Double).is_empty());
    }

    #[test]
    fn test_pair_two_items() {
        let input = items(json!([
            {"name": "A", "description": "short"},
            {"name": "B", "description": "short"}
        ]));
        let paired = pair(input, Layout::Double);
        assert_eq!(paired.len(), 1);

        let record = &paired[0];
        assert_eq!(resolve(record, "item1Name").as_deref(), Some("A"));
        assert_eq!(resolve(record, "item2Name").as_deref(), Some("B"));
        assert_eq!(resolve(record, "company1Name").as_deref(), Some("A"));
        assert_eq!(resolve(record, "company1Description").as_deref(), Some("short"));
        assert_eq!(resolve(record, "company2Description").as_deref(), Some("short"));
    }

    #[test]
    fn test_alias_fallbacks() {
        let input = items(json!([
            {"companyName": "", "title": "Titled", "about": "About A"},
            {"stage": "seed"}
        ]));
        let record = &pair(input, Layout::Double)[0];
        assert_eq!(record.display("company1Name").as_deref(), Some("Titled"));
        assert_eq!(record.display("company1Description").as_deref(), Some("About A"));
        assert_eq!(record.display("company2Name").as_deref(), Some("Item 2"));
        assert_eq!(record.display("company2Description").as_deref(), Some(""));
        assert_eq!(record.display("company2Stage").as_deref(), Some("seed"));
        assert_eq!(record.display("company1About").as_deref(), Some("About A"));
    }

    #[test]
    fn test_odd_count_pads_last_record() {
        let input = items(json!([
            {"name": "A"}, {"name": "B"}, {"name": "C", "sector": "Fintech", "description": "d"}
        ]));
        let paired = pair(input, Layout::Double);
        assert_eq!(paired.len(), 2);

        let last = &paired[1];
        assert_eq!(last.display("item1Name").as_deref(), Some("C"));
        assert_eq!(last.display("item2Name").as_deref(), Some(MISSING_NAME));
        assert_eq!(last.display("company2Name").as_deref(), Some(MISSING_NAME));
        assert_eq!(
            last.display("item2Description").as_deref(),
            Some(MISSING_DESCRIPTION)
        );
        assert_eq!(last.display("company1Sector").as_deref(), Some("Fintech"));
        assert_eq!(last.display("company1Description").as_deref(), Some("d"));
    }

    #[test]
    fn test_mirrors_never_overwrite_aliases() {
        let input = items(json!([
            {"Name": "Raw", "companyName": "Alias"},
            {"Description": "raw", "description": "alias"}
        ]));
        let record = &pair(input, Layout::Double)[0];
        assert_eq!(record.display("company1Name").as_deref(), Some("Alias"));
        assert_eq!(record.display("company2Description").as_deref(), Some("alias"));
    }

    #[test]
    fn test_pairing_is_idempotent() {
        let input = items(json!([{"name": "A"}, {"name": "B"}, {"name": "C"}]));
        let once = pair(input, Layout::Double);
        let twice = pair(once.clone(), Layout::Double);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_paired_count_is_half_rounded_up() {
        for n in 1usize..=7 {
            let input: Vec<Item> = (0..n)
                .map(|i| items(json!([{"name": format!("N{i}")}])).remove(0))
                .collect();
            assert_eq!(pair(input, Layout::Double).len(), n.div_ceil(2));
        }
    }
}
