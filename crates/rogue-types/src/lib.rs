//! Shared types for the rogue host ↔ module bridge.
//!
//! This crate defines the boundary contract both sides agree on: the names of
//! every import and export, the reserved layout of the host object heap, the
//! bit layout of heap references, and the serde-serialisable signature table
//! that describes the host-facing API.

pub mod abi;
pub mod signature;

pub use signature::{InterfaceTable, MethodKind, MethodSignature, Param, TypeSignature, ValueKind};
