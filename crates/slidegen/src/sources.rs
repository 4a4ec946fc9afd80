use crate::config::AirtableConfig;
use crate::prelude::*;
use slidegen_core::ingest::{
    parse_raw_text, parse_table_response, parse_with_format, DataFormat, Record, TableLocation,
};
use slidegen_core::outcome::ErrorKind;
use std::path::Path;

/// Where input records come from.
#[allow(async_fn_in_trait)]
pub trait DataSource {
    async fn fetch(&self) -> std::result::Result<Vec<Record>, Error>;

    /// The unparsed input, when the source has one.
    fn raw_text(&self) -> Option<&str> {
        None
    }

    /// Format the raw input was declared or detected as.
    fn format(&self) -> Option<DataFormat> {
        None
    }
}

/// Records from a table API, following `offset` pagination.
pub struct AirtableSource {
    client: reqwest::Client,
    config: AirtableConfig,
    location: TableLocation,
    filter: Option<String>,
}

impl AirtableSource {
    pub fn new(config: AirtableConfig, location: TableLocation, filter: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            location,
            filter,
        }
    }

    fn page_url(&self, offset: Option<&str>) -> String {
        page_url(
            &self.config.base_url,
            &self.location,
            self.filter.as_deref(),
            offset,
        )
    }
}

/// URL of one page of a table listing.
pub fn page_url(
    base_url: &str,
    location: &TableLocation,
    filter: Option<&str>,
    offset: Option<&str>,
) -> String {
    let mut url = format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        location.base_id,
        urlencoding::encode(&location.table_id)
    );
    let mut query = Vec::new();
    if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
        query.push(format!("filterByFormula={}", urlencoding::encode(filter)));
    }
    if let Some(offset) = offset {
        query.push(format!("offset={}", urlencoding::encode(offset)));
    }
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    url
}

/// Map a failed table API status to the taxonomy.
pub fn status_error(status: u16, body: &str) -> Error {
    let kind = match status {
        401 | 403 => ErrorKind::SourceAuthentication,
        404 => ErrorKind::SourceNotFound,
        429 => ErrorKind::SourceRateLimit,
        _ => ErrorKind::Unknown,
    };
    let body: String = body.chars().take(500).collect();
    Error::upstream(kind, format!("HTTP {}: {}", status, body))
}

impl DataSource for AirtableSource {
    async fn fetch(&self) -> std::result::Result<Vec<Record>, Error> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let url = self.page_url(offset.as_deref());
            log::debug!("Fetching table page: {}", url);

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.config.api_key)
                .send()
                .await
                .map_err(|e| Error::upstream(ErrorKind::Unknown, e.to_string()))?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::upstream(ErrorKind::Unknown, e.to_string()))?;

            if !status.is_success() {
                return Err(status_error(status.as_u16(), &body));
            }

            let page = parse_table_response(&body)
                .map_err(|e| Error::upstream(ErrorKind::Unknown, e.to_string()))?;
            log::debug!("Retrieved {} records", page.records.len());
            records.extend(page.records.into_iter().map(|record| record.fields));

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        log::info!("Retrieved {} records from the table API", records.len());
        Ok(records)
    }
}

/// Records parsed from JSON, CSV or TSV text.
pub struct RawTextSource {
    text: String,
    format: Option<DataFormat>,
}

impl RawTextSource {
    pub fn new(text: impl Into<String>, format: Option<DataFormat>) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }

    pub async fn from_file(path: &Path, format: Option<DataFormat>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read file '{}': {}", path.display(), e))?;
        Ok(Self::new(text, format))
    }
}

impl DataSource for RawTextSource {
    async fn fetch(&self) -> std::result::Result<Vec<Record>, Error> {
        let parsed = match self.format {
            Some(format) => parse_with_format(&self.text, format),
            None => parse_raw_text(&self.text),
        };
        parsed.map_err(|e| Error::validation(ErrorKind::UnsupportedSource, e.to_string()))
    }

    fn raw_text(&self) -> Option<&str> {
        Some(&self.text)
    }

    fn format(&self) -> Option<DataFormat> {
        Some(self.format.unwrap_or_else(|| DataFormat::detect(&self.text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> TableLocation {
        TableLocation {
            base_id: "appBase".to_string(),
            table_id: "Startups 2024".to_string(),
        }
    }

    #[test]
    fn test_page_url() {
        assert_eq!(
            page_url("https://api.airtable.com/v0/", &location(), None, None),
            "https://api.airtable.com/v0/appBase/Startups%202024"
        );
        assert_eq!(
            page_url(
                "https://api.airtable.com/v0",
                &location(),
                Some("{Ready} = 1"),
                Some("itr/rec")
            ),
            "https://api.airtable.com/v0/appBase/Startups%202024?filterByFormula=%7BReady%7D%20%3D%201&offset=itr%2Frec"
        );
    }

    #[test]
    fn test_status_error_mapping() {
        assert_eq!(status_error(401, "").kind(), ErrorKind::SourceAuthentication);
        assert_eq!(status_error(403, "").kind(), ErrorKind::SourceAuthentication);
        assert_eq!(status_error(404, "").kind(), ErrorKind::SourceNotFound);
        assert_eq!(status_error(429, "").kind(), ErrorKind::SourceRateLimit);

        let err = status_error(500, &"x".repeat(1000));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.details().len(), "HTTP 500: ".len() + 500);
    }

    #[tokio::test]
    async fn test_raw_text_source() {
        let source = RawTextSource::new("name,city\nAcme,Lisbon\n", None);
        let records = source.fetch().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["city"], "Lisbon");
        assert_eq!(source.format(), Some(DataFormat::Csv));
        assert_eq!(source.raw_text(), Some("name,city\nAcme,Lisbon\n"));
    }

    #[tokio::test]
    async fn test_raw_text_source_explicit_format() {
        let source = RawTextSource::new("a\tb\n1\t2", Some(DataFormat::Tsv));
        let records = source.fetch().await.unwrap();
        assert_eq!(records[0]["b"], "2");

        let err = RawTextSource::new("", None).fetch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSource);
    }

    #[tokio::test]
    async fn test_raw_text_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        tokio::fs::write(&path, r#"[{"name": "Acme"}]"#).await.unwrap();

        let source = RawTextSource::from_file(&path, None).await.unwrap();
        assert_eq!(source.fetch().await.unwrap().len(), 1);
        assert!(RawTextSource::from_file(&dir.path().join("nope"), None)
            .await
            .is_err());
    }
}
