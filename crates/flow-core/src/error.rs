use thiserror::Error;

/// Failure to obtain an observation from a source adapter.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Field not found: {0}")]
    MissingField(String),
}

/// Failure to obtain reference prices.
#[derive(Error, Debug)]
pub enum PriceError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Reference price series is empty")]
    Empty,

    #[error("Invalid reference price: {0}")]
    InvalidValue(f64),
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for PriceError {
    fn from(e: serde_json::Error) -> Self {
        PriceError::Parse(e.to_string())
    }
}
