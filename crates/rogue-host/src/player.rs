//! `PlayerCore` wrapper.

use std::rc::Rc;

use rogue_runtime::{
    BoundaryViolation, Bridge, DisplaySurface, ExportedType, Handle, HeapRef, HostValue, Result,
};
use rogue_types::abi;
use tracing::trace;

/// A player living in module memory.
#[derive(Debug)]
pub struct PlayerCore {
    handle: Handle<PlayerCore>,
}

impl ExportedType for PlayerCore {
    const TYPE_NAME: &'static str = "PlayerCore";
    const DESTRUCTOR: &'static str = abi::PLAYERCORE_FREE;
}

impl PlayerCore {
    /// Construct a player at `(x, y)`.
    ///
    /// The module keeps its own copy of `name` and holds a heap reference to
    /// `display` until the player is freed.
    pub fn new(
        bridge: &mut Bridge,
        x: i32,
        y: i32,
        name: &str,
        display: &Rc<dyn DisplaySurface>,
    ) -> Result<Self> {
        let display_ref = bridge.add_object(HostValue::display(Rc::clone(display)))?;
        let constructed = bridge
            .with_strings(&[name], |b, s| {
                let (ptr, len) = s[0].abi();
                b.call::<(i32, i32, i32, i32, i32), i32>(
                    abi::PLAYERCORE_NEW,
                    (x, y, ptr, len, display_ref.to_abi()),
                )
            })
            .and_then(Handle::from_raw);
        match constructed {
            Ok(handle) => Ok(Self { handle }),
            Err(err) => {
                // The module never stored the reference.
                if let Err(drop_err) = bridge.drop_object(display_ref) {
                    trace!(error = %drop_err, "display reference already released");
                }
                Err(err)
            }
        }
    }

    pub(crate) fn ptr(&self) -> Result<i32> {
        self.handle.ptr()
    }

    pub fn x(&self, bridge: &mut Bridge) -> Result<i32> {
        bridge.call(abi::PLAYERCORE_X, self.ptr()?)
    }

    pub fn y(&self, bridge: &mut Bridge) -> Result<i32> {
        bridge.call(abi::PLAYERCORE_Y, self.ptr()?)
    }

    pub fn hitpoints(&self, bridge: &mut Bridge) -> Result<i32> {
        bridge.call(abi::PLAYERCORE_HITPOINTS, self.ptr()?)
    }

    pub fn name(&self, bridge: &mut Bridge) -> Result<String> {
        bridge.call_returning_string(abi::PLAYERCORE_NAME, self.ptr()?)
    }

    pub fn move_to(&self, bridge: &mut Bridge, x: i32, y: i32) -> Result<()> {
        bridge.call(abi::PLAYERCORE_MOVE_TO, (self.ptr()?, x, y))
    }

    pub fn draw(&self, bridge: &mut Bridge) -> Result<()> {
        bridge.call(abi::PLAYERCORE_DRAW, self.ptr()?)
    }

    /// Apply `hits` damage and return the remaining hitpoints.
    pub fn take_damage(&self, bridge: &mut Bridge, hits: i32) -> Result<i32> {
        bridge.call(abi::PLAYERCORE_TAKE_DAMAGE, (self.ptr()?, hits))
    }

    /// Current stats as a JSON object.
    pub fn stats(&self, bridge: &mut Bridge) -> Result<serde_json::Value> {
        let obj: i32 = bridge.call(abi::PLAYERCORE_STATS, self.ptr()?)?;
        let heap_ref = HeapRef::from_abi(obj);
        let value = bridge.take_object(heap_ref)?;
        let found = value.kind();
        value.into_json().ok_or_else(|| {
            BoundaryViolation::UnexpectedHeapValue {
                index: heap_ref.index(),
                expected: "json",
                found,
            }
            .into()
        })
    }

    /// Publish the current stats through the host's `stats_updated` handler.
    pub fn emit_stats(&self, bridge: &mut Bridge) -> Result<()> {
        bridge.call(abi::PLAYERCORE_EMIT_STATS, self.ptr()?)
    }

    /// Destroy the module object.  Returns `false` if it was already freed.
    pub fn free(&mut self, bridge: &mut Bridge) -> Result<bool> {
        self.handle.free(bridge)
    }

    pub fn is_freed(&self) -> bool {
        self.handle.is_freed()
    }
}
