use thiserror::Error;

/// Errors returned by an external capability call.
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The call did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {message}")]
    Service { status: u16, message: String },

    /// The response body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CapabilityError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CapabilityError::Timeout
        } else if e.is_decode() {
            CapabilityError::InvalidResponse(e.to_string())
        } else {
            CapabilityError::Request(e.to_string())
        }
    }
}

/// Errors writing enrichment results back to the item record.
#[derive(Debug, Clone, Error)]
pub enum PersistError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors resolving an item's display name.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("lookup failed: {0}")]
    Lookup(String),
}
