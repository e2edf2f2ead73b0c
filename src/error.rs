use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported file type: {0} (expected pdf, xlsx, xls or csv)")]
    UnsupportedFormat(String),

    #[error("{strategy} failed: {message}")]
    Extraction {
        strategy: &'static str,
        message: String,
    },

    #[error("All extraction strategies failed: {}", .0.join("; "))]
    ExtractionExhausted(Vec<String>),

    #[error("Processing timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Processing worker failed: {0}")]
    Worker(String),

    #[error("Chart rendering error: {0}")]
    Chart(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn extraction(strategy: &'static str, message: impl std::fmt::Display) -> Self {
        Error::Extraction {
            strategy,
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Error::Extraction { .. } | Error::ExtractionExhausted(_) => "EXTRACTION_ERROR",
            Error::Timeout(_) => "TIMEOUT_ERROR",
            Error::Config(_) | Error::Json(_) => "VALIDATION_ERROR",
            Error::Chart(_) | Error::Worker(_) | Error::Io(_) => "PROCESSING_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_lists_every_strategy() {
        let err = Error::ExtractionExhausted(vec![
            "pdf-extract failed: bad xref".to_string(),
            "lopdf failed: invalid file header".to_string(),
        ]);
        let text = err.to_string();
        assert!(text.contains("bad xref"));
        assert!(text.contains("invalid file header"));
        assert_eq!(err.category(), "EXTRACTION_ERROR");
    }

    #[test]
    fn timeout_reports_budget_in_seconds() {
        let err = Error::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "Processing timed out after 60s");
        assert_eq!(err.category(), "TIMEOUT_ERROR");
    }
}
