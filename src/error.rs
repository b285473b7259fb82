//! Error taxonomy for talking to the playout server.
//!
//! Three failure classes matter to callers:
//! - [`ApiError::Api`]: the server answered with its error envelope
//!   (`{"status":"error","message":...}`). The message is user-facing.
//! - [`ApiError::Transport`]: the request never completed.
//! - [`ApiError::Protocol`]: we got a response but it was not the expected
//!   envelope.
//!
//! Connectivity state is *not* derived from these errors; only the event
//! channel's stream lifecycle drives it.

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Business failure reported inside a completed HTTP exchange.
    #[error("{0}")]
    Api(String),

    /// The request never completed (connect failure, timeout, broken pipe).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body was not the expected JSON envelope.
    #[error("unexpected response from server: {0}")]
    Protocol(String),

    /// The server redirected us. Redirects are refused, never followed.
    #[error("unexpected redirect ({0})")]
    Redirect(reqwest::StatusCode),
}

impl ApiError {
    /// The string a control surface should show the user for a failed
    /// command: the server's own message when there is one, a generic
    /// fallback otherwise.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Api(message) => message.clone(),
            _ => "operation failed".to_string(),
        }
    }

    /// True if the server itself rejected the request (as opposed to the
    /// request not getting through).
    pub fn is_business(&self) -> bool {
        matches!(self, ApiError::Api(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = ApiError::Api("File not found.".to_string());
        assert_eq!(err.user_message(), "File not found.");
    }

    #[test]
    fn test_user_message_falls_back_for_protocol_errors() {
        let err = ApiError::Protocol("response is not valid JSON".to_string());
        assert_eq!(err.user_message(), "operation failed");
        assert!(!err.is_business());
    }
}
