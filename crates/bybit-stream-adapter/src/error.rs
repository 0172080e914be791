/*
[INPUT]:  Error sources (transport, auth, serialization, lifecycle misuse)
[OUTPUT]: Structured error types with retry and terminal hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing lifecycle failure modes
*/

use thiserror::Error;

/// Main error type for the Bybit stream adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BybitError {
    /// Initial transport could not be opened
    #[error("Failed to dial {url}: {message}")]
    Dial { url: String, message: String },

    /// Auth frame rejected or acknowledgment never arrived
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Writing a frame to the transport failed
    #[error("WebSocket write failed: {0}")]
    Write(String),

    /// Reading from the transport failed or the peer closed it
    #[error("WebSocket read failed: {0}")]
    Read(String),

    /// Every bounded reconnection attempt failed
    #[error("Reconnection gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// Operation attempted after `close()`
    #[error("Attempt to use a closed connection")]
    ClosedConnectionUse,

    /// No transport handle is currently held (e.g. mid-reconnect)
    #[error("No available connection")]
    NoAvailableConnection,

    /// `connect()` called while a connection is already in progress or live
    #[error("Connection already {state}")]
    AlreadyConnected { state: String },

    /// A pending request belonged to a superseded connection epoch
    #[error("Request superseded by connection epoch {epoch}")]
    Stale { epoch: u64 },

    /// HMAC primitive could not be keyed
    #[error("Signature error: {0}")]
    Signature(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Topic payload did not match its expected shape
    #[error("Failed to decode {topic} payload: {message}")]
    Decode { topic: String, message: String },

    /// Requested channel was not configured on the facade
    #[error("{0} channel is not configured")]
    ChannelUnavailable(String),
}

impl BybitError {
    /// Check if the error is retryable by the connection manager
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BybitError::Write(_)
                | BybitError::Read(_)
                | BybitError::NoAvailableConnection
        )
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            BybitError::Authentication { .. } | BybitError::Signature(_)
        )
    }

    /// Check if the error leaves the connection permanently closed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BybitError::Dial { .. }
                | BybitError::Authentication { .. }
                | BybitError::ReconnectExhausted { .. }
                | BybitError::ClosedConnectionUse
        )
    }
}

impl From<serde_json::Error> for BybitError {
    fn from(err: serde_json::Error) -> Self {
        BybitError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for BybitError {
    fn from(err: url::ParseError) -> Self {
        BybitError::UrlParse(err.to_string())
    }
}

/// Result type alias for Bybit stream operations
pub type Result<T> = std::result::Result<T, BybitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(BybitError::Write("broken pipe".into()).is_retryable());
        assert!(BybitError::Read("reset".into()).is_retryable());
        assert!(!BybitError::ClosedConnectionUse.is_retryable());
        assert!(!BybitError::ReconnectExhausted { attempts: 3 }.is_retryable());
    }

    #[test]
    fn test_error_is_auth_error() {
        let err = BybitError::Authentication {
            message: "invalid signature".into(),
        };
        assert!(err.is_auth_error());
        assert!(!BybitError::NoAvailableConnection.is_auth_error());
    }

    #[test]
    fn test_terminal_errors() {
        assert!(BybitError::ReconnectExhausted { attempts: 3 }.is_terminal());
        assert!(
            !BybitError::Write("send timed out after 5000ms".into()).is_terminal()
        );
        assert!(BybitError::ClosedConnectionUse.is_terminal());
        assert!(!BybitError::Write("x".into()).is_terminal());
    }
}
