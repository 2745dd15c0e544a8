use thiserror::Error;

#[derive(Error, Debug)]
pub enum Form13fError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid CIK: {0}")]
    InvalidCik(String),

    #[error("Snapshot history is not sorted by filing date (position {position})")]
    HistoryOutOfOrder { position: usize },

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(
        "Unexpected content type from URL {url}. Expected pattern {expected_pattern}, but got Content-Type: {got_content_type}. Content preview: {content_preview}..."
    )]
    UnexpectedContentType {
        url: String,
        expected_pattern: String,
        got_content_type: String,
        content_preview: String,
    },
}

impl From<quick_xml::Error> for Form13fError {
    fn from(error: quick_xml::Error) -> Self {
        Form13fError::XmlError(error.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Form13fError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        Form13fError::XmlError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Form13fError>;
