use thiserror::Error;

use crate::core::models::TaskStatus;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("Webhook verification failed: {0}")]
    Verification(String),

    #[error("Failed to parse webhook payload: {0}")]
    Parse(String),

    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    #[error("Failed to dispatch reply: {0}")]
    Dispatch(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Failed to send HTTP request: {0}")]
    Http(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Illegal task transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

impl From<reqwest::Error> for HookError {
    fn from(error: reqwest::Error) -> Self {
        HookError::Http(error.to_string())
    }
}

impl From<serde_json::Error> for HookError {
    fn from(error: serde_json::Error) -> Self {
        HookError::Parse(error.to_string())
    }
}
