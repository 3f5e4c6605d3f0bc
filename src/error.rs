use thiserror::Error;

/// Errors raised while turning an uploaded document into plain text
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Empty upload: no PDF bytes received")]
    EmptyUpload,

    #[error("PDF could not be read: {0}")]
    Unreadable(String),

    /// Every page parsed but none carried text (typically a scanned document)
    #[error("Document appears empty: no text could be extracted")]
    NoText,
}

#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CompanionError>;
