/// Unified error handling module
use thiserror::Error;

/// Failure to get any HTTP response back from TNS
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("could not read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("could not build HTTP client: {0}")]
    Setup(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else if err.is_builder() {
            TransportError::Setup(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Errors raised while assembling an AT report from a light curve
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    #[error("unknown filter code {0}, expected 1 (g), 2 (r) or 3 (i)")]
    UnknownFilter(u8),

    #[error("photometry columns differ in length: {field} has {found} entries, obsdates has {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("candidate has no photometry points")]
    NoPhotometry,

    #[error("{field} is not a finite number")]
    NotFinite { field: String },

    #[error("could not encode report: {0}")]
    Encoding(String),
}

/// Lookup failures on loosely typed JSON envelopes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("key '{0}' not found")]
    MissingKey(String),

    #[error("value at '{0}' is not an object")]
    NotAnObject(String),

    #[error("value at '{0}' cannot be parsed")]
    Unparseable(String),
}
