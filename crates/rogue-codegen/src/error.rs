//! Codegen error types.

use thiserror::Error;

/// Errors raised while assembling the guest module.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Function bodies were registered out of index order.
    #[error("guest layout mismatch: {0}")]
    Internal(String),

    #[error("emitted guest module is invalid: {0}")]
    ValidationFailed(String),

    /// Static strings overlap the allocator's heap start.
    #[error("static data too large: {0}")]
    LimitExceeded(String),
}

pub type CodegenResult<T> = Result<T, CodegenError>;
