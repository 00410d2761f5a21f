//! Error taxonomy for the progression core.
//!
//! `Validation` rejects a request before any mutation; `NotFound` skips the
//! specific reward step that referenced a missing catalog entry; `Store`
//! wraps backend failures. Cascading side effects (notifications,
//! broadcasts, key grants fired by a level-up) are logged and swallowed at
//! the call site rather than surfaced through this type.

use crate::storage::StoreError;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }
}
