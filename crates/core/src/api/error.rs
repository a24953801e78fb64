use crate::api::types::HttpValidationError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("request rejected: {0}")]
    Validation(HttpValidationError),
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Network-level failure or a non-validation HTTP error status.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Status { .. })
    }

    pub fn validation(&self) -> Option<&HttpValidationError> {
        match self {
            ApiError::Validation(v) => Some(v),
            _ => None,
        }
    }
}
