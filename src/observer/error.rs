use thiserror::Error;

/// Error returned by a lifecycle hook.
///
/// From a before-hook it aborts the enclosing transaction; from an
/// after-hook it is logged by the scheduler and goes no further.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Hook panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    pub fn rejected(message: impl Into<String>) -> Self {
        HookError::Rejected(message.into())
    }
}

/// Outcome of draining the after-hook queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub executed: usize,
    pub failed: usize,
}
