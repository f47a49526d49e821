//! Dispatch error taxonomy
//!
//! Every failure on the request path ends up as one of these variants and is
//! turned into a fixed JSON error response by the dispatcher.

use hyper::StatusCode;
use std::time::Duration;

/// Failure raised while routing, reading or dispatching a request
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No resource is registered at the normalized path
    #[error("No resource found at path '{0}'.")]
    NotFound(String),

    /// The resource exists but has no handler for the method
    #[error("HTTP method '{method}' is not implemented at '{path}'")]
    MethodNotAllowed { method: String, path: String },

    /// The matched handler returned an error or panicked
    #[error("{0}")]
    Handler(anyhow::Error),

    /// The request target could not be turned into a URL
    #[error("Invalid request target '{0}'")]
    BadRequest(String),

    /// The request body exceeded the configured limit
    #[error("Request body exceeds the limit of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// The request body did not finish within the configured deadline
    #[error("Request body not received within {}ms", .timeout.as_millis())]
    RequestTimeout { timeout: Duration },

    /// The body stream failed while it was being drained
    #[error("Failed to read request body: {0}")]
    Body(String),
}

impl DispatchError {
    /// Status code of the error response for this failure
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

/// Human-readable message sent as the JSON body of an error response
///
/// Statuses outside the table fall back to the 500 message.
pub fn message_for(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Bad request",
        404 => "Not found",
        405 => "This method has no power here",
        408 => "Request timeout",
        413 => "Payload too large",
        _ => "Internal server error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            DispatchError::NotFound("x".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        let err = DispatchError::MethodNotAllowed {
            method: "DELETE".to_string(),
            path: "ping".to_string(),
        };
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            DispatchError::Handler(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            DispatchError::PayloadTooLarge { limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            DispatchError::RequestTimeout {
                timeout: Duration::from_secs(1)
            }
            .status(),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            DispatchError::NotFound("missing".to_string()).to_string(),
            "No resource found at path 'missing'."
        );
        let err = DispatchError::MethodNotAllowed {
            method: "DELETE".to_string(),
            path: "ping".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP method 'DELETE' is not implemented at 'ping'"
        );
    }

    #[test]
    fn test_timeout_message_keeps_sub_second_deadline() {
        let err = DispatchError::RequestTimeout {
            timeout: Duration::from_millis(300),
        };
        assert_eq!(err.to_string(), "Request body not received within 300ms");
    }

    #[test]
    fn test_message_table() {
        assert_eq!(message_for(StatusCode::NOT_FOUND), "Not found");
        assert_eq!(
            message_for(StatusCode::METHOD_NOT_ALLOWED),
            "This method has no power here"
        );
        assert_eq!(
            message_for(StatusCode::INTERNAL_SERVER_ERROR),
            "Internal server error"
        );
        // 406 is not part of the table
        assert_eq!(
            message_for(StatusCode::NOT_ACCEPTABLE),
            "Internal server error"
        );
    }
}
