use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("missing required configuration: {key}")]
    ConfigurationMissing { key: String },

    #[error("source unavailable: {details}")]
    SourceUnavailable { details: String },

    #[error("watermark store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("archive write to '{key}' failed: {details}")]
    Archive { key: String, details: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::SourceUnavailable {
            details: e.to_string(),
        }
    }
}

impl Error {
    pub fn source_unavailable(details: impl Into<String>) -> Self {
        Error::SourceUnavailable {
            details: details.into(),
        }
    }

    pub fn missing(key: impl Into<String>) -> Self {
        Error::ConfigurationMissing { key: key.into() }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::ConfigurationMissing { .. } => "configuration_missing",
            Error::SourceUnavailable { .. } => "source_unavailable",
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::Archive { .. } => "archive",
            Error::Serialization(_) => "serialization",
            Error::Validation(_) => "validation",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::ConfigurationMissing { .. } | Error::Validation(_)
        )
    }
}
