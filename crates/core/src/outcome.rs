//! Run outcomes and the error taxonomy
//!
//! Every run ends in a [`RunOutcome`]. Failures that abort a run are one of
//! the [`ErrorKind`]s, each with a stable numeric code, a category, a message
//! for the person running the tool and a hint on how to fix it.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingDataSourceKey,
    MissingAiKeys,
    MissingSourceUrl,
    InvalidSourceUrl,
    SourceAuthentication,
    SourceNotFound,
    SourceRateLimit,
    NoMatchingRecords,
    AiAllAttemptsFailed,
    AiMappingUnparseable,
    MissingTemplateId,
    MissingDestinationId,
    TemplateUnreadable,
    DestinationUnreadable,
    EmptyTemplate,
    MissingDeckUrls,
    InvalidLayout,
    UnsupportedSource,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    #[serde(rename = "Configuration Error")]
    Configuration,
    #[serde(rename = "Data Source Error")]
    UpstreamSource,
    #[serde(rename = "AI API Error")]
    Ai,
    #[serde(rename = "Template Error")]
    Template,
    #[serde(rename = "Input Validation Error")]
    Validation,
    #[serde(rename = "Unknown Error")]
    System,
}

impl ErrorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "Configuration Error",
            ErrorCategory::UpstreamSource => "Data Source Error",
            ErrorCategory::Ai => "AI API Error",
            ErrorCategory::Template => "Template Error",
            ErrorCategory::Validation => "Input Validation Error",
            ErrorCategory::System => "Unknown Error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl ErrorKind {
    pub const ALL: &'static [ErrorKind] = &[
        ErrorKind::MissingDataSourceKey,
        ErrorKind::MissingAiKeys,
        ErrorKind::MissingSourceUrl,
        ErrorKind::InvalidSourceUrl,
        ErrorKind::SourceAuthentication,
        ErrorKind::SourceNotFound,
        ErrorKind::SourceRateLimit,
        ErrorKind::NoMatchingRecords,
        ErrorKind::AiAllAttemptsFailed,
        ErrorKind::AiMappingUnparseable,
        ErrorKind::MissingTemplateId,
        ErrorKind::MissingDestinationId,
        ErrorKind::TemplateUnreadable,
        ErrorKind::DestinationUnreadable,
        ErrorKind::EmptyTemplate,
        ErrorKind::MissingDeckUrls,
        ErrorKind::InvalidLayout,
        ErrorKind::UnsupportedSource,
        ErrorKind::Unknown,
    ];

    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::MissingDataSourceKey => 101,
            ErrorKind::MissingAiKeys => 102,
            ErrorKind::MissingSourceUrl => 201,
            ErrorKind::InvalidSourceUrl => 202,
            ErrorKind::SourceAuthentication => 203,
            ErrorKind::SourceNotFound => 204,
            ErrorKind::SourceRateLimit => 205,
            ErrorKind::NoMatchingRecords => 206,
            ErrorKind::AiAllAttemptsFailed => 401,
            ErrorKind::AiMappingUnparseable => 402,
            ErrorKind::MissingTemplateId => 501,
            ErrorKind::MissingDestinationId => 502,
            ErrorKind::TemplateUnreadable => 503,
            ErrorKind::DestinationUnreadable => 504,
            ErrorKind::EmptyTemplate => 505,
            ErrorKind::MissingDeckUrls => 601,
            ErrorKind::InvalidLayout => 602,
            ErrorKind::UnsupportedSource => 604,
            ErrorKind::Unknown => 999,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            100..=199 => ErrorCategory::Configuration,
            200..=299 => ErrorCategory::UpstreamSource,
            400..=499 => ErrorCategory::Ai,
            500..=599 => ErrorCategory::Template,
            600..=699 => ErrorCategory::Validation,
            _ => ErrorCategory::System,
        }
    }

    /// Short internal description, used in logs.
    pub fn summary(&self) -> &'static str {
        match self {
            ErrorKind::MissingDataSourceKey => "Data source API key is not configured",
            ErrorKind::MissingAiKeys => "No valid AI API keys found",
            ErrorKind::MissingSourceUrl => "Data source URL is missing",
            ErrorKind::InvalidSourceUrl => "Could not extract Base ID or Table ID from URL",
            ErrorKind::SourceAuthentication => "Data source authentication failed",
            ErrorKind::SourceNotFound => "Data source base or table not found",
            ErrorKind::SourceRateLimit => "Data source rate limit exceeded",
            ErrorKind::NoMatchingRecords => "No records match the filter criteria",
            ErrorKind::AiAllAttemptsFailed => "All AI API attempts failed",
            ErrorKind::AiMappingUnparseable => "AI mapping response could not be parsed",
            ErrorKind::MissingTemplateId => "Template deck ID is missing",
            ErrorKind::MissingDestinationId => "Destination deck ID is missing",
            ErrorKind::TemplateUnreadable => "Could not open template deck",
            ErrorKind::DestinationUnreadable => "Could not open destination deck",
            ErrorKind::EmptyTemplate => "Template deck has no slides",
            ErrorKind::MissingDeckUrls => "Missing deck URLs",
            ErrorKind::InvalidLayout => "Invalid layout type",
            ErrorKind::UnsupportedSource => "Unsupported data source type",
            ErrorKind::Unknown => "Unexpected error",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::MissingDataSourceKey => "The data source API key is missing. Please set it before running.",
            ErrorKind::MissingAiKeys => "AI processing is unavailable due to missing API keys.",
            ErrorKind::MissingSourceUrl => "Please provide a data source URL to continue.",
            ErrorKind::InvalidSourceUrl => "The data source URL format is invalid. Please provide a valid table URL.",
            ErrorKind::SourceAuthentication => "Could not authenticate with the data source. The API key may be invalid or expired.",
            ErrorKind::SourceNotFound => "The specified base or table could not be found. Please check the URL.",
            ErrorKind::SourceRateLimit => "Too many requests to the data source. Please try again in a few minutes.",
            ErrorKind::NoMatchingRecords => "No records matched the filter. Please check your data.",
            ErrorKind::AiAllAttemptsFailed => "Could not process the data with AI. All API keys have been exhausted or are invalid.",
            ErrorKind::AiMappingUnparseable => "The AI response could not be turned into slide data.",
            ErrorKind::MissingTemplateId => "Please select a template deck to continue.",
            ErrorKind::MissingDestinationId => "Please provide the destination deck.",
            ErrorKind::TemplateUnreadable => "The template deck could not be opened. Please check the id and permissions.",
            ErrorKind::DestinationUnreadable => "The destination deck could not be opened or created.",
            ErrorKind::EmptyTemplate => "The selected template deck is empty. Please select a template with at least one slide.",
            ErrorKind::MissingDeckUrls => "Please provide both template and destination decks.",
            ErrorKind::InvalidLayout => "The layout must be 'single' or 'double'.",
            ErrorKind::UnsupportedSource => "The requested data source type is not supported.",
            ErrorKind::Unknown => "An unexpected error occurred. Please try again.",
        }
    }

    pub fn resolution(&self) -> &'static str {
        match self {
            ErrorKind::MissingDataSourceKey => "Set AIRTABLE_API_KEY or pass --airtable-api-key",
            ErrorKind::MissingAiKeys => "Set at least one GEMINI_API_KEY_<n>, or use --backend ollama",
            ErrorKind::MissingSourceUrl => "Pass --airtable-url, or use --raw-text/--raw-file",
            ErrorKind::InvalidSourceUrl => "Use the table URL from the browser address bar",
            ErrorKind::SourceAuthentication => "Check and update the data source API key",
            ErrorKind::SourceNotFound => "Verify the table URL is correct and accessible",
            ErrorKind::SourceRateLimit => "Wait and try again later",
            ErrorKind::NoMatchingRecords => "Relax the filter formula or mark some records as ready",
            ErrorKind::AiAllAttemptsFailed => "Check the AI API keys or try again later",
            ErrorKind::AiMappingUnparseable => "Retry, or provide structured JSON/CSV input and skip AI mapping",
            ErrorKind::MissingTemplateId => "Pass --template",
            ErrorKind::MissingDestinationId => "Pass --destination",
            ErrorKind::TemplateUnreadable => "Ensure the template deck exists in the deck directory",
            ErrorKind::DestinationUnreadable => "Check the deck directory is writable",
            ErrorKind::EmptyTemplate => "Choose a different template or add slides to this one",
            ErrorKind::MissingDeckUrls => "Fill in all required options",
            ErrorKind::InvalidLayout => "Use --layout single or --layout double",
            ErrorKind::UnsupportedSource => "Use one of: airtable, raw_text, text, csv, json",
            ErrorKind::Unknown => "Re-run with --verbose and inspect the logs",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.summary())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Success,
    Error,
    #[serde(rename = "No data")]
    NoData,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => f.write_str("Success"),
            RunStatus::Error => f.write_str("Error"),
            RunStatus::NoData => f.write_str("No data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub result: RunStatus,
    pub processed: usize,
    pub slides_generated: usize,
    pub message: String,
    pub presentation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RunOutcome {
    pub fn success(
        processed: usize,
        slides_generated: usize,
        message: impl Into<String>,
        presentation_id: impl Into<String>,
    ) -> Self {
        Self {
            result: RunStatus::Success,
            processed,
            slides_generated,
            message: message.into(),
            presentation_id: presentation_id.into(),
            error_code: None,
            error_category: None,
            suggestions: None,
            details: None,
        }
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self {
            result: RunStatus::NoData,
            ..Self::success(0, 0, message, "")
        }
    }

    pub fn error(kind: ErrorKind, details: impl Into<String>) -> Self {
        let details = details.into();
        Self {
            result: RunStatus::Error,
            error_code: Some(kind.code()),
            error_category: Some(kind.category()),
            suggestions: Some(kind.resolution().to_string()),
            details: (!details.is_empty()).then_some(details),
            ..Self::success(0, 0, kind.user_message(), "")
        }
    }

    pub fn is_error(&self) -> bool {
        self.result == RunStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique_and_categorised() {
        let codes: HashSet<u16> = ErrorKind::ALL.iter().map(ErrorKind::code).collect();
        assert_eq!(codes.len(), ErrorKind::ALL.len());

        assert_eq!(ErrorKind::MissingAiKeys.category(), ErrorCategory::Configuration);
        assert_eq!(ErrorKind::SourceRateLimit.category(), ErrorCategory::UpstreamSource);
        assert_eq!(ErrorKind::AiMappingUnparseable.category(), ErrorCategory::Ai);
        assert_eq!(ErrorKind::EmptyTemplate.category(), ErrorCategory::Template);
        assert_eq!(ErrorKind::UnsupportedSource.category(), ErrorCategory::Validation);
        assert_eq!(ErrorKind::Unknown.category(), ErrorCategory::System);
    }

    #[test]
    fn test_error_outcome_json() {
        let outcome = RunOutcome::error(ErrorKind::SourceNotFound, "HTTP 404");
        assert!(outcome.is_error());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "Error");
        assert_eq!(json["errorCode"], 204);
        assert_eq!(json["errorCategory"], "Data Source Error");
        assert_eq!(json["slidesGenerated"], 0);
        assert_eq!(json["details"], "HTTP 404");
        assert_eq!(json["message"], ErrorKind::SourceNotFound.user_message());
    }

    #[test]
    fn test_success_and_no_data_json() {
        let json = serde_json::to_value(RunOutcome::success(
            2,
            4,
            "Generated 4 slides for 2 items",
            "deck-1",
        ))
        .unwrap();
        assert_eq!(json["result"], "Success");
        assert_eq!(json["presentationId"], "deck-1");
        assert!(json.get("errorCode").is_none());

        let json = serde_json::to_value(RunOutcome::no_data("nothing")).unwrap();
        assert_eq!(json["result"], "No data");
        assert_eq!(json["processed"], 0);
    }

    #[test]
    fn test_empty_details_are_omitted() {
        let outcome = RunOutcome::error(ErrorKind::MissingTemplateId, "");
        assert_eq!(outcome.details, None);
        assert_eq!(
            ErrorKind::MissingTemplateId.to_string(),
            "[501] Template deck ID is missing"
        );
    }
}
