//! Error types for the control-plane client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when calling the control plane
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

const DOES_NOT_EXIST: &str = "does not exist";
const ALREADY_EXISTS: &str = "already exists";
const NO_UPDATES: &str = "no updates are to be performed";

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Message matching only applies to caller-side rejections; a 5xx body
    /// never classifies an error
    fn message_contains(&self, needle: &str) -> bool {
        match self {
            Self::ApiError { message, .. } if self.is_client_error() => {
                message.to_lowercase().contains(needle)
            }
            Self::InvalidRequest(message) => message.to_lowercase().contains(needle),
            _ => false,
        }
    }

    /// Check if this error is a "not found" error
    ///
    /// The stack engine reports a missing stack as a validation error whose
    /// message says the stack "does not exist"; that counts too.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
            || matches!(self, Self::ApiError { status: 404, .. })
            || self.message_contains(DOES_NOT_EXIST)
    }

    /// Check if this error reports a name collision
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
            || matches!(self, Self::ApiError { status: 409, .. })
            || self.message_contains(ALREADY_EXISTS)
    }

    /// Check if an update was rejected because nothing changed
    pub fn is_no_changes(&self) -> bool {
        self.message_contains(NO_UPDATES)
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }
}

impl From<ClientError> for ferry_core::Error {
    fn from(err: ClientError) -> Self {
        ferry_core::Error::remote("control plane request", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(ClientError::NotFound("stack".into()).is_not_found());
        assert!(ClientError::api_error(404, "missing").is_not_found());
        assert!(
            ClientError::api_error(400, "Stack with id demo does not exist").is_not_found()
        );
        assert!(!ClientError::api_error(400, "Template format error").is_not_found());
    }

    #[test]
    fn test_no_changes_classification() {
        let err = ClientError::InvalidRequest("No updates are to be performed.".into());
        assert!(err.is_no_changes());
        assert!(!err.is_not_found());
        assert!(!ClientError::api_error(500, "boom").is_no_changes());
    }

    #[test]
    fn test_already_exists_classification() {
        assert!(ClientError::api_error(409, "conflict").is_already_exists());
        assert!(ClientError::AlreadyExists("sm".into()).is_already_exists());
        assert!(ClientError::api_error(400, "Stack [demo] already exists").is_already_exists());
    }

    #[test]
    fn test_server_error_messages_do_not_classify() {
        assert!(ClientError::api_error(422, "bad").is_client_error());
        let err = ClientError::api_error(503, "Stack with id demo does not exist");
        assert!(!err.is_client_error());
        assert!(!err.is_not_found());
        assert!(!ClientError::api_error(500, "No updates are to be performed.").is_no_changes());
        assert!(!ClientError::api_error(502, "Stack [demo] already exists").is_already_exists());
    }

    #[test]
    fn test_converts_into_remote_error() {
        let err: ferry_core::Error = ClientError::api_error(500, "boom").into();
        assert!(matches!(err, ferry_core::Error::Remote { .. }));
    }
}
