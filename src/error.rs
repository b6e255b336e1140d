// Model-level error types
use thiserror::Error;

use crate::database::StoreError;
use crate::filter::FilterError;
use crate::observer::{HookError, HookPoint};
use crate::types::Operation;

/// Every failure a `Model` or `ModelInstance` call can produce.
///
/// `Configuration`, `Filter` and `InvalidPayload` are raised before anything
/// is scheduled. `Store` and `Hook` surface through the returned `Pending`
/// once the write transaction has aborted.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{model} cannot {operation}: {reason}")]
    Configuration {
        model: &'static str,
        operation: Operation,
        reason: String,
    },

    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{hook} hook of {model} failed: {source}")]
    Hook {
        model: &'static str,
        hook: HookPoint,
        #[source]
        source: HookError,
    },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

impl ModelError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ModelError::Configuration { .. })
    }

    /// True when a before-hook vetoed the write
    pub fn is_hook(&self) -> bool {
        matches!(self, ModelError::Hook { .. })
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
