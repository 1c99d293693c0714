//! Cached views over module linear memory.
//!
//! Linear memory may be reallocated whenever the module grows it, which
//! invalidates any previously obtained view.  The cache remembers the identity
//! of the buffer it last handed out a view for and bumps an epoch whenever the
//! identity changes, so callers can tell a rebuilt view from a reused one.
//!
//! Views borrow the buffer, so the borrow checker already prevents holding a
//! view across a module call.  The epoch exists for diagnostics and tests.

use tracing::debug;

use crate::error::{BridgeError, Result};

/// Identity of a linear-memory buffer: its base address and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferIdentity {
    base: usize,
    len: usize,
}

impl BufferIdentity {
    fn of(bytes: &[u8]) -> Self {
        Self {
            base: bytes.as_ptr() as usize,
            len: bytes.len(),
        }
    }
}

/// Tracks the current linear-memory buffer and hands out views over it.
#[derive(Debug, Default)]
pub struct MemoryViewCache {
    identity: Option<BufferIdentity>,
    epoch: u64,
}

impl MemoryViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the view has been (re)built.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn refresh(&mut self, identity: BufferIdentity) {
        if self.identity == Some(identity) {
            return;
        }
        self.epoch += 1;
        debug!(
            epoch = self.epoch,
            len = identity.len,
            "rebuilt linear memory view"
        );
        self.identity = Some(identity);
    }

    /// Read-only view of `bytes`, rebuilding the cached identity if the
    /// buffer moved or changed size.
    pub fn view<'a>(&mut self, bytes: &'a [u8]) -> ByteView<'a> {
        self.refresh(BufferIdentity::of(bytes));
        ByteView { bytes }
    }

    /// Mutable view of `bytes`.
    pub fn view_mut<'a>(&mut self, bytes: &'a mut [u8]) -> ByteViewMut<'a> {
        self.refresh(BufferIdentity::of(bytes));
        ByteViewMut { bytes }
    }
}

fn range(ptr: u32, len: u32, memory_len: usize) -> Result<std::ops::Range<usize>> {
    let start = ptr as usize;
    let end = start.checked_add(len as usize);
    match end {
        Some(end) if end <= memory_len => Ok(start..end),
        _ => Err(BridgeError::Decoding {
            ptr,
            len,
            memory_len,
        }),
    }
}

/// Bounds-checked read access to linear memory.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteView<'a> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn read(&self, ptr: u32, len: u32) -> Result<&'a [u8]> {
        let range = range(ptr, len, self.bytes.len())?;
        Ok(&self.bytes[range])
    }

    /// Little-endian `u32` at `ptr`.
    pub fn read_u32(&self, ptr: u32) -> Result<u32> {
        let bytes = self.read(ptr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Bounds-checked write access to linear memory.
#[derive(Debug)]
pub struct ByteViewMut<'a> {
    bytes: &'a mut [u8],
}

impl ByteViewMut<'_> {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn write(&mut self, ptr: u32, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| BridgeError::Decoding {
            ptr,
            len: u32::MAX,
            memory_len: self.bytes.len(),
        })?;
        let range = range(ptr, len, self.bytes.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn read(&self, ptr: u32, len: u32) -> Result<&[u8]> {
        let range = range(ptr, len, self.bytes.len())?;
        Ok(&self.bytes[range])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_buffer_reuses_view() {
        let buffer = vec![0u8; 64];
        let mut cache = MemoryViewCache::new();
        cache.view(&buffer);
        cache.view(&buffer);
        assert_eq!(cache.epoch(), 1);
    }

    #[test]
    fn growth_rebuilds_view() {
        let mut buffer = vec![7u8; 64];
        let mut cache = MemoryViewCache::new();
        assert_eq!(cache.view(&buffer).len(), 64);

        buffer.resize(128, 0);
        let view = cache.view(&buffer);
        assert_eq!(view.len(), 128);
        assert_eq!(view.read(0, 1).unwrap(), &[7]);
        assert_eq!(cache.epoch(), 2);
    }

    #[test]
    fn reads_are_bounds_checked() {
        let buffer = vec![1u8; 16];
        let mut cache = MemoryViewCache::new();
        let view = cache.view(&buffer);
        assert!(view.read(12, 4).is_ok());
        let err = view.read(12, 8).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Decoding {
                ptr: 12,
                len: 8,
                memory_len: 16
            }
        ));
        assert!(view.read(u32::MAX, 2).is_err());
    }

    #[test]
    fn writes_land_in_buffer() {
        let mut buffer = vec![0u8; 16];
        let mut cache = MemoryViewCache::new();
        let mut view = cache.view_mut(&mut buffer);
        view.write(4, &42u32.to_le_bytes()).unwrap();
        assert!(view.write(14, b"abc").is_err());
        assert_eq!(cache.view(&buffer).read_u32(4).unwrap(), 42);
    }
}
