use thiserror::Error;

use crate::backends::BackendError;
use crate::eval::{EvalError, ValidationError};

/// Failure inside a command handler.
///
/// Never escalates: the router renders every variant into a reply line.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Evaluation(String),

    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("store error: {0}")]
    Store(#[from] feedbridge_store::StoreError),
}

impl From<EvalError> for CommandError {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::Validation(v) => CommandError::Validation(v),
            EvalError::Evaluation(msg) => CommandError::Evaluation(msg),
        }
    }
}

impl CommandError {
    /// Reply line shown in the feed.
    pub fn to_reply(&self) -> String {
        format!("error: {self}")
    }
}
