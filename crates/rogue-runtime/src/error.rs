//! Bridge error types.
//!
//! Errors are grouped into the categories a caller has to react to
//! differently: bad input caught before the module was touched, bad bytes
//! read back out of module memory, misuse of the boundary itself, and failures
//! the module signalled.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error category, determined by the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Host input rejected before any module state was touched.
    Encoding,
    /// Bytes read from module memory were out of range or malformed.
    Decoding,
    /// The boundary contract was violated (freed handle, stale reference).
    Boundary,
    /// The module called `throw`.
    ModuleThrow,
    /// The module trapped without going through `throw`.
    Trap,
    /// Instantiation, linking or configuration failed.
    Setup,
}

/// Programmer errors at the boundary.  These indicate a memory-safety
/// violation was about to happen and are never produced by the module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryViolation {
    #[error("{type_name} used after free")]
    UseAfterFree { type_name: &'static str },

    #[error("{type_name} constructor returned a null pointer")]
    NullHandle { type_name: &'static str },

    #[error("heap index {0} is out of range")]
    HeapIndexOutOfRange(u32),

    #[error("heap slot {index} is vacant")]
    VacantHeapSlot { index: u32 },

    #[error("stale heap reference to slot {index}: generation {found}, slot is at {current}")]
    StaleHeapRef { index: u32, found: u32, current: u32 },

    #[error("object heap is full ({0} slots)")]
    HeapExhausted(u32),

    #[error("expected {expected} in heap slot {index}, found {found}")]
    UnexpectedHeapValue {
        index: u32,
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors surfaced by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("cannot encode string of {len} bytes (limit {limit})")]
    Encoding { len: usize, limit: u32 },

    #[error("read of {len} bytes at {ptr} is out of bounds (memory is {memory_len} bytes)")]
    Decoding { ptr: u32, len: u32, memory_len: usize },

    #[error("invalid JSON from module: {0}")]
    Json(#[from] serde_json::Error),

    #[error("boundary violation: {0}")]
    Boundary(#[from] BoundaryViolation),

    #[error("module threw: {0}")]
    ModuleThrow(String),

    #[error("module trapped: {0}")]
    Trap(String),

    #[error("missing export `{name}`: {reason}")]
    MissingExport { name: String, reason: String },

    #[error("link error: {0}")]
    Link(String),

    #[error("instantiation failed: {0}")]
    Instantiate(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Get the category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Encoding { .. } => ErrorCategory::Encoding,
            Self::Decoding { .. } | Self::Json(_) => ErrorCategory::Decoding,
            Self::Boundary(_) => ErrorCategory::Boundary,
            Self::ModuleThrow(_) => ErrorCategory::ModuleThrow,
            Self::Trap(_) => ErrorCategory::Trap,
            Self::MissingExport { .. }
            | Self::Link(_)
            | Self::Instantiate(_)
            | Self::Config(_) => ErrorCategory::Setup,
        }
    }

    /// The boundary violation, if this is one.
    pub fn as_boundary(&self) -> Option<&BoundaryViolation> {
        match self {
            Self::Boundary(violation) => Some(violation),
            _ => None,
        }
    }
}

/// Result type used throughout the bridge.
pub type Result<T> = std::result::Result<T, BridgeError>;
