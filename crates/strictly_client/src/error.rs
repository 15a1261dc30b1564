//! Client error types.

use derive_more::{Display, Error};
use strictly_checkers::{ErrorBody, ErrorKind};

/// Failures seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ClientError {
    /// The server answered with an error body.
    #[display("{message}")]
    Api {
        /// Failure category.
        kind: ErrorKind,
        /// Stable machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
    /// The connection failed or was cut.
    #[display("Transport failure: {_0}")]
    Transport(#[error(not(source))] String),
    /// The request ran out of time.
    #[display("Request timed out")]
    Timeout,
    /// The response could not be decoded.
    #[display("Failed to decode response: {_0}")]
    Decode(#[error(not(source))] String),
}

impl ClientError {
    /// Category used for recovery decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Api { kind, .. } => *kind,
            ClientError::Transport(_) | ClientError::Decode(_) => ErrorKind::TransportFailure,
            ClientError::Timeout => ErrorKind::Timeout,
        }
    }

    /// Returns true when resubscribing may help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransportFailure | ErrorKind::Timeout
        )
    }
}

impl From<ErrorBody> for ClientError {
    fn from(body: ErrorBody) -> Self {
        ClientError::Api {
            kind: body.kind,
            code: body.code,
            message: body.message,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
