use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::io;

use crate::templating::TemplateError;

/// Body returned to callers rejected by a runbook's allowlist.
pub const UNAUTHORIZED_BODY: &str = "Not authorized.";

/// Everything that can end a hook request early
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Hook '{runbook}' is not allowed from {remote_addr}")]
    Unauthorized {
        runbook: String,
        remote_addr: String,
    },

    #[error("Templating error: {0}")]
    Templating(#[from] TemplateError),

    #[error("Script execution failed: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl HookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HookError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HookError {
    fn into_response(self) -> Response {
        match self {
            // never leak which address or runbook was rejected
            HookError::Unauthorized { .. } => {
                (StatusCode::UNAUTHORIZED, UNAUTHORIZED_BODY).into_response()
            }
            other => (other.status_code(), other.to_string()).into_response(),
        }
    }
}

/// Helper type for Results that use HookError
pub type Result<T> = std::result::Result<T, HookError>;
