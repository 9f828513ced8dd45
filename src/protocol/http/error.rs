use crate::domain::{
    FORBIDDEN_MESSAGE, GENERIC_ERROR_MESSAGE, NETWORK_ERROR_MESSAGE, NOT_FOUND_MESSAGE,
    SERVER_ERROR_MESSAGE, SESSION_EXPIRED_MESSAGE,
};
use crate::protocol::http::Response;
use reqwest::StatusCode;
use thiserror::Error;

/// Failure category of a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkUnreachable,
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError,
    Unexpected,
    SessionInvalid,
    RefreshFailed,
}

impl ErrorKind {
    /// Classifies a non-success status.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            s if s >= 500 => Self::ServerError,
            _ => Self::Unexpected,
        }
    }

    /// Human-readable message shown to the user for this kind.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::NetworkUnreachable => NETWORK_ERROR_MESSAGE,
            Self::Unauthorized | Self::SessionInvalid | Self::RefreshFailed => SESSION_EXPIRED_MESSAGE,
            Self::Forbidden => FORBIDDEN_MESSAGE,
            Self::NotFound => NOT_FOUND_MESSAGE,
            Self::ServerError => SERVER_ERROR_MESSAGE,
            Self::Unexpected => GENERIC_ERROR_MESSAGE,
        }
    }
}

/// Failure before a complete response exists.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server unreachable: {0}")]
    Unreachable(String),
    /// The status line arrived but the body could not be read.
    #[error("failed to read {status} response body: {message}")]
    Body { status: StatusCode, message: String },
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-success status; the response is kept
    /// so callers can inspect the body.
    #[error("server responded with {}", .0.status)]
    Status(Response),

    #[error("session has no refresh token")]
    SessionInvalid,

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("response body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(TransportError::Body { status, .. }) if !status.is_success() => {
                ErrorKind::from_status(*status)
            }
            Self::Transport(TransportError::Body { .. }) => ErrorKind::Unexpected,
            Self::Transport(_) => ErrorKind::NetworkUnreachable,
            Self::Status(response) => ErrorKind::from_status(response.status),
            Self::SessionInvalid => ErrorKind::SessionInvalid,
            Self::RefreshFailed(_) => ErrorKind::RefreshFailed,
            Self::InvalidRequest(_) | Self::Decode(_) => ErrorKind::Unexpected,
        }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Status(response) => Some(response),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|response| response.status)
    }
}
