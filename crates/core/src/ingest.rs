//! Input normalization
//!
//! Records arrive either from the tabular API (one JSON object of `fields`
//! per row) or as raw text (JSON, CSV or TSV). Both end up as
//! [`NormalizedData`]: a list of [`Item`]s with a uniform, sorted column set,
//! attachment lists collapsed to a single URL, founding dates cut to the
//! year, and the image-bearing columns tagged.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::classify::is_image_field;
use crate::item::{display_value, is_truthy, Item};

/// One raw input record.
pub type Record = Map<String, Value>;

/// Column whose attachments prefer the expiring download URL.
pub const SCREENSHOT_COLUMN: &str = "Screenshot";
const FOUNDING_DATE_MARKER: &str = "date founded";

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No data provided")]
    Empty,
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("JSON input must be an array of objects or an object with an 'items' or 'records' array")]
    UnsupportedJsonShape,
    #[error("Could not detect the data format (expected JSON, CSV or TSV)")]
    UnrecognizedFormat,
    #[error("Row {row} has {found} columns, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Response body of a table listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TableResponse {
    #[serde(default)]
    pub records: Vec<TableRecord>,
    /// Cursor for the next page, absent on the last page.
    #[serde(default)]
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub fields: Record,
    #[serde(default)]
    pub created_time: Option<String>,
}

/// Base and table ids addressed by a table URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLocation {
    pub base_id: String,
    pub table_id: String,
}

/// Extract the base and table ids from a table URL such as
/// `https://airtable.com/appXXXX/tblYYYY/viwZZZZ?blocks=hide`.
///
/// Scheme and host are optional. The ids are the segment starting with `app`
/// and the one after it, falling back to the fourth and fifth segments of the
/// full URL.
pub fn parse_table_url(url: &str) -> Option<TableLocation> {
    let url = url.trim();
    let path = match url.find("airtable.com/") {
        Some(index) => &url[index + "airtable.com/".len()..],
        None => url.trim_start_matches('/'),
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let full = format!("https://airtable.com/{}", path);
    let parts: Vec<&str> = full.split('/').collect();
    if parts.len() < 5 {
        return None;
    }

    let by_prefix = parts
        .iter()
        .position(|part| part.starts_with("app"))
        .and_then(|index| Some((parts[index], *parts.get(index + 1)?)));
    let (base_id, table_id) = match by_prefix {
        Some((base, table)) if !table.is_empty() => (base, table),
        _ => (parts[3], parts[4]),
    };
    if base_id.is_empty() || table_id.is_empty() {
        return None;
    }

    Some(TableLocation {
        base_id: base_id.to_string(),
        table_id: table_id.to_string(),
    })
}

/// Normalized items plus the columns that hold images.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedData {
    pub items: Vec<Item>,
    pub image_fields: BTreeSet<String>,
}

impl NormalizedData {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Normalize raw records into items sharing one sorted column set.
///
/// Missing or falsy cells become empty strings.
pub fn normalize_records(records: Vec<Record>) -> NormalizedData {
    let headers: BTreeSet<String> = records
        .iter()
        .flat_map(|record| record.keys().cloned())
        .collect();

    let attachment_columns: BTreeSet<String> = records
        .iter()
        .flat_map(|record| record.iter())
        .filter(|(_, value)| is_attachment_list(value))
        .map(|(column, _)| column.clone())
        .collect();

    let items = records
        .into_iter()
        .map(|mut record| {
            headers
                .iter()
                .map(|header| {
                    let value = record
                        .remove(header)
                        .filter(is_truthy)
                        .unwrap_or_else(|| Value::from(""));
                    let value = collapse_value(header, value);
                    let value = if header.to_lowercase().contains(FOUNDING_DATE_MARKER) {
                        Value::from(founding_year(&value))
                    } else {
                        value
                    };
                    (header.clone(), value)
                })
                .collect::<Item>()
        })
        .collect();

    let image_fields = headers
        .into_iter()
        .filter(|header| is_image_field(header) || attachment_columns.contains(header))
        .collect();

    NormalizedData {
        items,
        image_fields,
    }
}

/// A non-empty list whose first element carries an attachment URL.
fn is_attachment_list(value: &Value) -> bool {
    match value {
        Value::Array(values) => matches!(
            values.first(),
            Some(Value::Object(first))
                if first.contains_key("url") || first.contains_key("expiring_download_url")
        ),
        _ => false,
    }
}

/// Collapse list values to a single scalar.
///
/// Attachment lists become one URL, other lists their first element's
/// display string, empty lists an empty string. Scalars pass through.
pub fn collapse_value(column: &str, value: Value) -> Value {
    let Value::Array(values) = value else {
        return value;
    };
    let Some(first) = values.into_iter().next() else {
        return Value::from("");
    };

    if let Value::Object(attachment) = &first {
        let url = attachment.get("url").filter(|v| is_truthy(v));
        let expiring = attachment
            .get("expiring_download_url")
            .filter(|v| is_truthy(v));
        if url.is_some() || expiring.is_some() {
            let chosen = if column == SCREENSHOT_COLUMN {
                expiring.or(url)
            } else {
                url.or(expiring)
            };
            return chosen.cloned().unwrap_or_else(|| Value::from(""));
        }
    }

    Value::from(display_value(&first))
}

/// The four-digit year of a founding date.
///
/// Full dates and timestamps are parsed; other strings of at least four
/// characters keep their first four, anything else is empty.
pub fn founding_year(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return String::new(),
    };

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(&text) {
        return timestamp.year().to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        return date.year().to_string();
    }
    if text.chars().count() >= 4 {
        return text.chars().take(4).collect();
    }
    String::new()
}

/// Records from a table listing body.
pub fn parse_table_response(body: &str) -> Result<TableResponse, IngestError> {
    Ok(serde_json::from_str(body)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Csv,
    Tsv,
    Unknown,
}

impl DataFormat {
    /// Guess the format of raw text.
    ///
    /// JSON must parse; CSV and TSV need the same non-zero count of
    /// separators on the first two lines.
    pub fn detect(data: &str) -> Self {
        let trimmed = data.trim();
        let json_like = (trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('[') && trimmed.ends_with(']'));
        if json_like && serde_json::from_str::<Value>(trimmed).is_ok() {
            return DataFormat::Json;
        }

        let mut lines = trimmed.lines();
        let (Some(first), Some(second)) = (lines.next(), lines.next()) else {
            return DataFormat::Unknown;
        };

        let count = |line: &str, sep: char| line.matches(sep).count();
        if count(first, ',') > 0 && count(first, ',') == count(second, ',') {
            return DataFormat::Csv;
        }
        if count(first, '\t') > 0 && count(first, '\t') == count(second, '\t') {
            return DataFormat::Tsv;
        }
        DataFormat::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::Csv => "csv",
            DataFormat::Tsv => "tsv",
            DataFormat::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(DataFormat::Json),
            "csv" => Ok(DataFormat::Csv),
            "tsv" => Ok(DataFormat::Tsv),
            _ => Err(IngestError::UnrecognizedFormat),
        }
    }
}

/// Parse raw text into records, detecting the format.
pub fn parse_raw_text(data: &str) -> Result<Vec<Record>, IngestError> {
    parse_with_format(data, DataFormat::detect(data))
}

/// Parse raw text in a known format, skipping detection.
pub fn parse_with_format(data: &str, format: DataFormat) -> Result<Vec<Record>, IngestError> {
    if data.trim().is_empty() {
        return Err(IngestError::Empty);
    }
    match format {
        DataFormat::Json => parse_json_records(data.trim()),
        DataFormat::Csv => parse_delimited(data, ','),
        DataFormat::Tsv => parse_delimited(data, '\t'),
        DataFormat::Unknown => Err(IngestError::UnrecognizedFormat),
    }
}

/// Records from JSON text.
///
/// Accepts an array of objects, a single object, or an object wrapping an
/// `items` or `records` array. Table-style records (`{"fields": {...}}`) are
/// unwrapped.
pub fn parse_json_records(data: &str) -> Result<Vec<Record>, IngestError> {
    let value: Value = serde_json::from_str(data)?;
    let list = match value {
        Value::Array(values) => values,
        Value::Object(mut map) => match map.remove("items").or_else(|| map.remove("records")) {
            Some(Value::Array(values)) => values,
            Some(_) => return Err(IngestError::UnsupportedJsonShape),
            None => vec![Value::Object(map)],
        },
        _ => return Err(IngestError::UnsupportedJsonShape),
    };

    list.into_iter()
        .map(|value| match value {
            Value::Object(mut map) => match map.remove("fields") {
                Some(Value::Object(fields)) if map.contains_key("id") => Ok(fields),
                Some(other) => {
                    map.insert("fields".to_string(), other);
                    Ok(map)
                }
                None => Ok(map),
            },
            _ => Err(IngestError::UnsupportedJsonShape),
        })
        .collect()
}

/// Records from CSV/TSV text with a header row.
///
/// Quoted fields may contain separators, newlines and doubled quotes.
/// Blank rows are skipped; short rows are padded with empty cells.
pub fn parse_delimited(data: &str, separator: char) -> Result<Vec<Record>, IngestError> {
    let mut rows = split_rows(data, separator).into_iter();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.into_iter().map(|h| h.trim().to_string()).collect(),
        None => return Err(IngestError::Empty),
    };

    let mut records = Vec::new();
    for (index, row) in rows.enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if row.len() > headers.len() {
            return Err(IngestError::RaggedRow {
                row: index + 2,
                expected: headers.len(),
                found: row.len(),
            });
        }
        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = row.get(i).map(|c| c.trim()).unwrap_or_default();
            record.insert(header.clone(), Value::from(cell));
        }
        records.push(record);
    }
    Ok(records)
}

fn split_rows(data: &str, separator: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = data.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.push('"');
                }
                '"' => in_quotes = false,
                _ => cell.push(c),
            }
            continue;
        }
        match c {
            '"' if cell.trim().is_empty() => {
                cell.clear();
                in_quotes = true;
            }
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            c if c == separator => row.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }

    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    rows
}

/// Shorten `data` to roughly `max_chars` for inclusion in a prompt.
///
/// Line-based data keeps its header row and as many rows as fit on average,
/// followed by a note of how many rows were dropped.
pub fn truncate_data(data: &str, max_chars: usize) -> String {
    let total = data.chars().count();
    if total <= max_chars {
        return data.to_string();
    }

    if data.contains('\n') {
        let lines: Vec<&str> = data.split('\n').collect();
        let header = lines[0];
        let average = total as f64 / lines.len() as f64;
        let budget = max_chars.saturating_sub(header.chars().count()) as f64;
        let estimated = (budget / average).floor() as usize;
        let end = estimated.clamp(1, lines.len());
        let mut kept = vec![header];
        kept.extend_from_slice(&lines[1..end]);
        return format!(
            "{}\n... [truncated, {} more rows]",
            kept.join("\n"),
            lines.len().saturating_sub(estimated)
        );
    }

    let head: String = data.chars().take(max_chars).collect();
    format!("{}... [truncated]", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_uniform_sorted_columns() {
        let data = normalize_records(records(json!([
            {"name": "A", "Logo": "https://x/a.png"},
            {"description": "B desc", "name": "B"}
        ])));
        assert_eq!(data.len(), 2);
        let keys: Vec<_> = data.items[0].keys().cloned().collect();
        assert_eq!(keys, vec!["Logo", "description", "name"]);
        assert_eq!(data.items[0].display("description").as_deref(), Some(""));
        assert_eq!(data.items[1].display("Logo").as_deref(), Some(""));
        assert_eq!(
            data.image_fields.iter().cloned().collect::<Vec<_>>(),
            vec!["Logo"]
        );
    }

    #[test]
    fn test_attachment_columns_are_image_fields() {
        let data = normalize_records(records(json!([
            {"name": "A", "Hero": [{"url": "https://cdn/hero.png"}], "Tags": ["x", "y"]},
            {"name": "B", "Hero": []}
        ])));
        assert_eq!(
            data.image_fields.iter().cloned().collect::<Vec<_>>(),
            vec!["Hero"]
        );
        assert_eq!(data.items[0].display("Hero").as_deref(), Some("https://cdn/hero.png"));
        assert_eq!(data.items[0].display("Tags").as_deref(), Some("x"));
    }

    #[test]
    fn test_collapse_attachments() {
        let attachment = json!([{
            "url": "https://cdn/u.png",
            "expiring_download_url": "https://cdn/e.png"
        }]);
        assert_eq!(
            collapse_value("Screenshot", attachment.clone()),
            json!("https://cdn/e.png")
        );
        assert_eq!(collapse_value("Logo", attachment), json!("https://cdn/u.png"));
        assert_eq!(
            collapse_value("Screenshot", json!([{"url": "https://cdn/only.png"}])),
            json!("https://cdn/only.png")
        );
        assert_eq!(
            collapse_value("Logo", json!([{"expiring_download_url": "https://cdn/e.png"}])),
            json!("https://cdn/e.png")
        );
    }

    #[test]
    fn test_collapse_plain_lists() {
        assert_eq!(collapse_value("Tags", json!([])), json!(""));
        assert_eq!(collapse_value("Tags", json!(["fintech", "b2b"])), json!("fintech"));
        assert_eq!(collapse_value("Linked", json!([42])), json!("42"));
        assert_eq!(collapse_value("Count", json!(7)), json!(7));
    }

    #[test]
    fn test_founding_year() {
        assert_eq!(founding_year(&json!("2019-04-01")), "2019");
        assert_eq!(founding_year(&json!("2020-01-15T10:00:00.000Z")), "2020");
        assert_eq!(founding_year(&json!("1998 (spin-off)")), "1998");
        assert_eq!(founding_year(&json!(2015)), "2015");
        assert_eq!(founding_year(&json!("n/a")), "");
        assert_eq!(founding_year(&Value::Null), "");
    }

    #[test]
    fn test_normalize_truncates_founding_dates() {
        let data = normalize_records(records(json!([
            {"Date Founded": "2017-09-30", "name": "A"}
        ])));
        assert_eq!(data.items[0].display("Date Founded").as_deref(), Some("2017"));
    }

    #[test]
    fn test_parse_table_response() {
        let response = parse_table_response(
            r#"{"records": [{"id": "rec1", "createdTime": "2024-01-01T00:00:00.000Z",
                 "fields": {"Company Name": "Acme"}}], "offset": "itr2"}"#,
        )
        .unwrap();
        assert_eq!(response.records.len(), 1);
        assert_eq!(response.records[0].fields["Company Name"], "Acme");
        assert_eq!(response.offset.as_deref(), Some("itr2"));
    }

    #[test]
    fn test_parse_table_url() {
        let expected = Some(TableLocation {
            base_id: "appaC3tF3jXr0rlJ0".to_string(),
            table_id: "tblBygTSOQPGWQX0p".to_string(),
        });
        assert_eq!(
            parse_table_url(
                "https://airtable.com/appaC3tF3jXr0rlJ0/tblBygTSOQPGWQX0p/viw73WLa9jNIUE3DW?blocks=hide"
            ),
            expected
        );
        assert_eq!(
            parse_table_url("airtable.com/appaC3tF3jXr0rlJ0/tblBygTSOQPGWQX0p"),
            expected
        );
        assert_eq!(
            parse_table_url("appaC3tF3jXr0rlJ0/tblBygTSOQPGWQX0p"),
            expected
        );
        assert_eq!(parse_table_url("https://airtable.com/appOnly"), None);
        assert_eq!(parse_table_url(""), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<DataFormat>().unwrap(), DataFormat::Csv);
        assert_eq!(" json".parse::<DataFormat>().unwrap(), DataFormat::Json);
        assert!("xml".parse::<DataFormat>().is_err());
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(DataFormat::detect(r#"[{"a": 1}]"#), DataFormat::Json);
        assert_eq!(DataFormat::detect("a,b\n1,2"), DataFormat::Csv);
        assert_eq!(DataFormat::detect("a\tb\n1\t2"), DataFormat::Tsv);
        assert_eq!(DataFormat::detect("{not json}"), DataFormat::Unknown);
        assert_eq!(DataFormat::detect("just one line, here"), DataFormat::Unknown);
    }

    #[test]
    fn test_parse_json_shapes() {
        let array = parse_raw_text(r#"[{"name": "A"}, {"name": "B"}]"#).unwrap();
        assert_eq!(array.len(), 2);

        let wrapped = parse_raw_text(r#"{"items": [{"name": "A"}]}"#).unwrap();
        assert_eq!(wrapped[0]["name"], "A");

        let table = parse_raw_text(r#"{"records": [{"id": "rec1", "fields": {"name": "T"}}]}"#)
            .unwrap();
        assert_eq!(table[0]["name"], "T");

        let single = parse_raw_text(r#"{"name": "Solo"}"#).unwrap();
        assert_eq!(single.len(), 1);

        assert!(matches!(
            parse_raw_text("[1, 2]"),
            Err(IngestError::UnsupportedJsonShape)
        ));
    }

    #[test]
    fn test_parse_csv_with_quotes() {
        let csv = "name,description,city\n\
                   \"Acme, Inc\",\"Says \"\"hi\"\"\",Lisbon\n\
                   Beta,\"multi\nline\",\n\
                   ,,\n";
        let rows = parse_delimited(csv, ',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Acme, Inc");
        assert_eq!(rows[0]["description"], "Says \"hi\"");
        assert_eq!(rows[1]["description"], "multi\nline");
        assert_eq!(rows[1]["city"], "");
    }

    #[test]
    fn test_parse_tsv() {
        let rows = parse_raw_text("name\tsector\r\nAcme\tFintech\r\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["sector"], "Fintech");
    }

    #[test]
    fn test_parse_ragged_row() {
        let err = parse_delimited("a,b\n1,2,3\n", ',').unwrap_err();
        assert!(matches!(
            err,
            IngestError::RaggedRow {
                row: 2,
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert!(matches!(parse_raw_text("   "), Err(IngestError::Empty)));
        assert!(matches!(
            parse_raw_text("hello world"),
            Err(IngestError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn test_truncate_short_data_untouched() {
        assert_eq!(truncate_data("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_single_line() {
        assert_eq!(truncate_data("abcdefghij", 4), "abcd... [truncated]");
    }

    #[test]
    fn test_truncate_keeps_header() {
        let data = (0..20)
            .map(|i| format!("row{:02}", i))
            .collect::<Vec<_>>()
            .join("\n");
        // 20 lines, 119 chars, average 5.95 per line.
        let truncated = truncate_data(&data, 40);
        let lines: Vec<&str> = truncated.lines().collect();
        assert_eq!(lines[0], "row00");
        // (40 - 5) / 5.95 = 5 estimated lines: header plus rows 1..5.
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[5], "... [truncated, 15 more rows]");
    }
}
