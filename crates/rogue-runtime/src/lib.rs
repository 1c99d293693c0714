//! Host side of the rogue bridge.
//!
//! ```text
//! host code ──► Handle<T> / Bridge::call ──► codec + heap ──► module export
//!                                                               │
//! host handlers ◄── imports (decode strings, take/borrow refs) ◄┘
//! ```
//!
//! The bridge owns exactly one module instance.  Its linear-memory view cache
//! and object heap live in the store state and are only ever touched from the
//! thread that owns the [`Bridge`]; handles are `!Send` to keep it that way.

pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod handle;
pub mod heap;
mod imports;
pub mod memory;
pub mod value;

pub use bridge::Bridge;
pub use codec::StringTransfer;
pub use config::BridgeConfig;
pub use error::{BoundaryViolation, BridgeError, ErrorCategory, Result};
pub use handle::{ExportedType, Handle};
pub use heap::{HeapRef, ObjectHeap};
pub use memory::{ByteView, ByteViewMut, MemoryViewCache};
pub use value::{DisplaySurface, HostHandlers, HostValue};
