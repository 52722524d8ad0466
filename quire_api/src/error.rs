use quire_access::CommentError;
use quire_config::ConfigError;

use crate::inflight::MutationKind;

/// Everything that can go wrong talking to the platform, as a closed set of
/// kinds so callers match on the kind instead of probing response bodies.
#[derive(Debug)]
pub enum ApiError {
    /// The server rejected the presented credentials
    Auth(String),
    /// A required field was missing or malformed, caught on either side
    Validation(String),
    /// The caller holds no access path to the document being acted on
    Authorization(String),
    /// Unknown id or token; an expired share link surfaces here too
    NotFound(String),
    /// A submission of the same kind is still in flight
    Busy(MutationKind),
    /// Transport-level failure
    Network(reqwest::Error),
    /// The local configuration or credential store failed
    Config(ConfigError),
    /// Local file handling failed
    Io(std::io::Error),
    /// A response the client has no mapping for
    Unexpected(u16, String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> ApiError {
        ApiError::Network(e)
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> ApiError {
        ApiError::Config(e)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> ApiError {
        ApiError::Io(e)
    }
}

impl From<CommentError> for ApiError {
    fn from(e: CommentError) -> ApiError {
        ApiError::Validation(e.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Auth(detail) => write!(f, "authentication failed: {}", detail),
            ApiError::Validation(detail) => write!(f, "invalid request: {}", detail),
            ApiError::Authorization(detail) => write!(f, "not permitted: {}", detail),
            ApiError::NotFound(detail) => write!(f, "not found: {}", detail),
            ApiError::Busy(kind) => write!(f, "another {} is still in progress", kind),
            ApiError::Network(e) => write!(f, "unable to reach the server: {}", e),
            ApiError::Config(e) => write!(f, "configuration error: {}", e),
            ApiError::Io(e) => write!(f, "file error: {}", e),
            ApiError::Unexpected(status, detail) => {
                write!(f, "unexpected response ({}): {}", status, detail)
            }
        }
    }
}

impl std::error::Error for ApiError {}
