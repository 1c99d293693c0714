//! Typed, move-only handles to module objects.

use std::fmt;
use std::marker::PhantomData;

use tracing::{trace, warn};

use crate::bridge::Bridge;
use crate::error::{BoundaryViolation, Result};

/// A type the module exports a constructor and destructor for.
pub trait ExportedType {
    const TYPE_NAME: &'static str;
    /// Export called with the object pointer to destroy it.
    const DESTRUCTOR: &'static str;
}

/// Owning handle to a module-side object of type `T`.
///
/// The handle is neither `Clone` nor `Send`: it belongs to the thread that
/// owns the bridge, and exactly one value is responsible for freeing the
/// object.  Freeing zeroes the stored pointer before the destructor runs, so
/// a second `free` is a no-op and later method calls report use-after-free.
pub struct Handle<T: ExportedType> {
    ptr: u32,
    _type: PhantomData<*const T>,
}

impl<T: ExportedType> Handle<T> {
    /// Wrap a pointer returned by a constructor export.
    pub fn from_raw(ptr: i32) -> Result<Self> {
        if ptr == 0 {
            return Err(BoundaryViolation::NullHandle {
                type_name: T::TYPE_NAME,
            }
            .into());
        }
        Ok(Self {
            ptr: ptr as u32,
            _type: PhantomData,
        })
    }

    /// The pointer to pass as the receiver of an export.
    pub fn ptr(&self) -> Result<i32> {
        if self.ptr == 0 {
            return Err(BoundaryViolation::UseAfterFree {
                type_name: T::TYPE_NAME,
            }
            .into());
        }
        Ok(self.ptr as i32)
    }

    pub fn is_freed(&self) -> bool {
        self.ptr == 0
    }

    /// Run the destructor.  Returns `false` if the handle was already freed.
    pub fn free(&mut self, bridge: &mut Bridge) -> Result<bool> {
        let ptr = std::mem::replace(&mut self.ptr, 0);
        if ptr == 0 {
            trace!(type_name = T::TYPE_NAME, "free of freed handle ignored");
            return Ok(false);
        }
        bridge.call::<i32, ()>(T::DESTRUCTOR, ptr as i32)?;
        Ok(true)
    }
}

impl<T: ExportedType> Drop for Handle<T> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            warn!(
                type_name = T::TYPE_NAME,
                ptr = self.ptr,
                "handle dropped without free; module object leaked"
            );
        }
    }
}

impl<T: ExportedType> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x})", T::TYPE_NAME, self.ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::value::HostHandlers;

    struct Widget;

    impl ExportedType for Widget {
        const TYPE_NAME: &'static str = "Widget";
        const DESTRUCTOR: &'static str = "widget_free";
    }

    struct Quiet;

    impl HostHandlers for Quiet {
        fn alert(&mut self, _message: &str) {}
        fn stats_updated(&mut self, _stats: serde_json::Value) {}
    }

    #[test]
    fn null_pointer_is_rejected() {
        let err = Handle::<Widget>::from_raw(0).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Boundary(BoundaryViolation::NullHandle { type_name: "Widget" })
        ));
    }

    #[test]
    fn debug_names_the_type() {
        let handle = Handle::<Widget>::from_raw(0x400).unwrap();
        assert_eq!(format!("{handle:?}"), "Widget(0x400)");
        assert_eq!(handle.ptr().unwrap(), 0x400);
        assert!(!handle.is_freed());
        std::mem::forget(handle);
    }

    #[test]
    fn failed_destructor_still_frees_the_handle() {
        let wasm = rogue_codegen::emit_module().unwrap();
        let mut bridge = Bridge::new(&wasm, Quiet).unwrap();
        // The generated module has no `widget_free`, so the destructor fails.
        let mut handle = Handle::<Widget>::from_raw(0x400).unwrap();

        let err = handle.free(&mut bridge).unwrap_err();
        assert!(matches!(err, BridgeError::MissingExport { ref name, .. } if name == "widget_free"));
        assert!(handle.is_freed());
        assert!(!handle.free(&mut bridge).unwrap());
        assert!(matches!(
            handle.ptr().unwrap_err(),
            BridgeError::Boundary(BoundaryViolation::UseAfterFree { type_name: "Widget" })
        ));
    }
}
