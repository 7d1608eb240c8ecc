use thiserror::Error;

/// Closed error taxonomy for clamd operations.
///
/// Protocol errors are derived purely from reply-text classification: the
/// clamd protocol carries no structured status field, so nothing is ever
/// inferred from the TCP layer beyond `Network`.
#[derive(Error, Debug)]
pub enum ClamdError {
    #[error("clamd network error: {0}")]
    Network(#[source] std::io::Error),

    #[error("unknown command")]
    UnknownCommand,

    #[error("unknown response from clamd")]
    UnknownResponse,

    #[error("unexpected response from clamd: expected {expected:?}, got {actual:?}")]
    UnexpectedResponse { expected: String, actual: String },

    #[error("size limit exceeded")]
    SizeLimitExceeded,

    /// Not a system failure: the exchange succeeded and the daemon reported
    /// a detection. Carries the raw reply so the signature name can be
    /// extracted (see [`crate::clamav::commands::parse_signature`]).
    #[error("virus found: {reply}")]
    VirusFound { reply: String },

    /// Declared INSTREAM size of 0 or above u32::MAX; rejected locally
    /// before any byte reaches the daemon.
    #[error("invalid stream size: {0} (must fit in a non-zero u32)")]
    InvalidStreamSize(u64),

    /// freshclam exited non-zero with no recognized success phrase.
    /// Carries the combined stdout/stderr for diagnostics.
    #[error("freshclam update failed (exit status {status:?})")]
    FreshclamFailed { status: Option<i32>, output: String },

    #[error("configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ClamdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virus_found_display_carries_reply() {
        let err = ClamdError::VirusFound {
            reply: "stream: Eicar-Signature FOUND".to_string(),
        };
        assert_eq!(err.to_string(), "virus found: stream: Eicar-Signature FOUND");
    }

    #[test]
    fn test_unexpected_response_display() {
        let err = ClamdError::UnexpectedResponse {
            expected: "RELOADING".to_string(),
            actual: "PONG".to_string(),
        };
        assert!(err.to_string().contains("RELOADING"));
        assert!(err.to_string().contains("PONG"));
    }
}
