use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovtreeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input is not well-formed XML.
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// The input is XML but has no `<coverage>` document element.
    #[error("Invalid coverage schema: {0}")]
    InvalidSchema(String),

    #[error("Both coverage datasets are required for a comparison")]
    ComparisonInputMissing,

    #[error("{0}")]
    Other(String),
}

impl CovtreeError {
    /// Notification title shown to the user when parsing fails.
    pub fn title(&self) -> &'static str {
        match self {
            CovtreeError::MalformedXml(_) => "Invalid XML Format",
            _ => "XML Parsing Error",
        }
    }
}

pub type Result<T> = std::result::Result<T, CovtreeError>;
