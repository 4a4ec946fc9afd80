use slidegen_core::outcome::ErrorKind;

/// Failures that abort a run, each tied to a taxonomy entry.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{kind}: {details}")]
    Upstream { kind: ErrorKind, details: String },

    #[error("{kind}: {details}")]
    Template { kind: ErrorKind, details: String },

    #[error("{kind}: {details}")]
    Configuration { kind: ErrorKind, details: String },

    #[error("{kind}: {details}")]
    Validation { kind: ErrorKind, details: String },

    #[error("{kind}: {details}")]
    Ai { kind: ErrorKind, details: String },
}

impl Error {
    pub fn upstream(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self::Upstream {
            kind,
            details: details.into(),
        }
    }

    pub fn template(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self::Template {
            kind,
            details: details.into(),
        }
    }

    pub fn configuration(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self::Configuration {
            kind,
            details: details.into(),
        }
    }

    pub fn validation(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            details: details.into(),
        }
    }

    pub fn ai(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self::Ai {
            kind,
            details: details.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Upstream { kind, .. }
            | Error::Template { kind, .. }
            | Error::Configuration { kind, .. }
            | Error::Validation { kind, .. }
            | Error::Ai { kind, .. } => *kind,
        }
    }

    pub fn details(&self) -> &str {
        match self {
            Error::Upstream { details, .. }
            | Error::Template { details, .. }
            | Error::Configuration { details, .. }
            | Error::Validation { details, .. }
            | Error::Ai { details, .. } => details,
        }
    }
}
