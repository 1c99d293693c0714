//! UTF-8 string codec for the boundary.
//!
//! Host → module: the string is encoded, a buffer of exactly the encoded length
//! is allocated through the module's `malloc`, and the bytes are copied in.
//! Module → host: `(ptr, len)` is bounds-checked and decoded.  Invalid UTF-8 is
//! replaced with U+FFFD rather than rejected.

use std::borrow::Cow;

use rogue_types::abi;

use crate::error::{BridgeError, Result};
use crate::memory::{ByteView, ByteViewMut};

/// A string that has been copied into module memory.
///
/// The module buffer is owned by whoever holds the transfer.  It must be
/// released with [`Bridge::release`](crate::Bridge::release) unless the module
/// takes ownership of it.  The type is move-only: releasing consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct StringTransfer {
    pub ptr: u32,
    /// Length in elements (bytes, for UTF-8).
    pub len: u32,
}

impl StringTransfer {
    pub fn byte_len(&self) -> u32 {
        self.len * abi::STRING_ELEMENT_SIZE
    }

    /// The `(ptr, len)` pair as passed to module exports.
    pub fn abi(&self) -> (i32, i32) {
        (self.ptr as i32, self.len as i32)
    }
}

/// Encoded length of `text`, or an encoding error if it exceeds `limit`.
pub fn checked_len(text: &str, limit: u32) -> Result<u32> {
    let len = text.len();
    match u32::try_from(len) {
        Ok(n) if n <= limit => Ok(n),
        _ => Err(BridgeError::Encoding { len, limit }),
    }
}

/// Copy `text` into a buffer the module allocated at `ptr`.
pub fn write_str(view: &mut ByteViewMut<'_>, ptr: u32, text: &str) -> Result<StringTransfer> {
    view.write(ptr, text.as_bytes())?;
    Ok(StringTransfer {
        ptr,
        len: text.len() as u32,
    })
}

/// Decode `len` bytes at `ptr`.
pub fn decode<'a>(view: &ByteView<'a>, ptr: u32, len: u32) -> Result<Cow<'a, str>> {
    let bytes = view.read(ptr, len)?;
    Ok(String::from_utf8_lossy(bytes))
}

/// Read a `(ptr, len)` return slot written by the module.
pub fn read_return_slot(view: &ByteView<'_>, slot: u32) -> Result<StringTransfer> {
    let ptr = view.read_u32(slot)?;
    let len = view.read_u32(slot + 4)?;
    Ok(StringTransfer { ptr, len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryViewCache;

    #[test]
    fn encode_then_decode_multibyte() {
        let mut buffer = vec![0u8; 64];
        let mut cache = MemoryViewCache::new();
        let text = "héllo ☃";
        let len = checked_len(text, 1024).unwrap();
        assert_eq!(len as usize, text.len());

        let transfer = write_str(&mut cache.view_mut(&mut buffer), 8, text).unwrap();
        assert_eq!(transfer, StringTransfer { ptr: 8, len });
        let view = cache.view(&buffer);
        assert_eq!(decode(&view, transfer.ptr, transfer.len).unwrap(), text);
    }

    #[test]
    fn empty_string_is_valid() {
        let buffer = vec![0u8; 4];
        let mut cache = MemoryViewCache::new();
        assert_eq!(checked_len("", 0).unwrap(), 0);
        assert_eq!(decode(&cache.view(&buffer), 4, 0).unwrap(), "");
    }

    #[test]
    fn oversized_string_is_rejected() {
        let err = checked_len("abcdef", 4).unwrap_err();
        assert!(matches!(err, BridgeError::Encoding { len: 6, limit: 4 }));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let buffer = vec![b'a', 0xff, b'b'];
        let mut cache = MemoryViewCache::new();
        assert_eq!(decode(&cache.view(&buffer), 0, 3).unwrap(), "a\u{fffd}b");
    }

    #[test]
    fn decode_out_of_bounds_fails() {
        let buffer = vec![0u8; 8];
        let mut cache = MemoryViewCache::new();
        assert!(decode(&cache.view(&buffer), 6, 4).is_err());
    }

    #[test]
    fn return_slot_is_little_endian_pair() {
        let mut buffer = vec![0u8; 16];
        buffer[8..12].copy_from_slice(&100u32.to_le_bytes());
        buffer[12..16].copy_from_slice(&5u32.to_le_bytes());
        let mut cache = MemoryViewCache::new();
        let slot = read_return_slot(&cache.view(&buffer), 8).unwrap();
        assert_eq!(slot, StringTransfer { ptr: 100, len: 5 });
        assert_eq!(slot.byte_len(), 5);
    }
}
