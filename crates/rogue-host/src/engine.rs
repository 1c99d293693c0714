//! `Engine` wrapper: the dungeon grid.

use std::rc::Rc;

use rogue_runtime::{Bridge, DisplaySurface, ExportedType, Handle, HostValue, Result};
use rogue_types::abi;
use tracing::trace;

use crate::player::PlayerCore;

/// The dungeon engine.  Players are borrowed per call and never retained by
/// the module.
#[derive(Debug)]
pub struct Engine {
    handle: Handle<Engine>,
}

impl ExportedType for Engine {
    const TYPE_NAME: &'static str = "Engine";
    const DESTRUCTOR: &'static str = abi::ENGINE_FREE;
}

impl Engine {
    pub fn new(bridge: &mut Bridge, display: &Rc<dyn DisplaySurface>) -> Result<Self> {
        let display_ref = bridge.add_object(HostValue::display(Rc::clone(display)))?;
        let constructed = bridge
            .call::<i32, i32>(abi::ENGINE_NEW, display_ref.to_abi())
            .and_then(Handle::from_raw);
        match constructed {
            Ok(handle) => Ok(Self { handle }),
            Err(err) => {
                if let Err(drop_err) = bridge.drop_object(display_ref) {
                    trace!(error = %drop_err, "display reference already released");
                }
                Err(err)
            }
        }
    }

    fn ptr(&self) -> Result<i32> {
        self.handle.ptr()
    }

    /// Record a dug cell.  A zero `value` carves floor.
    pub fn on_dig(&self, bridge: &mut Bridge, x: i32, y: i32, value: i32) -> Result<()> {
        bridge.call(abi::ENGINE_ON_DIG, (self.ptr()?, x, y, value))
    }

    pub fn draw_map(&self, bridge: &mut Bridge) -> Result<()> {
        bridge.call(abi::ENGINE_DRAW_MAP, self.ptr()?)
    }

    pub fn redraw_at(&self, bridge: &mut Bridge, x: i32, y: i32) -> Result<()> {
        bridge.call(abi::ENGINE_REDRAW_AT, (self.ptr()?, x, y))
    }

    pub fn place_box(&self, bridge: &mut Bridge, x: i32, y: i32) -> Result<()> {
        bridge.call(abi::ENGINE_PLACE_BOX, (self.ptr()?, x, y))
    }

    /// Mark the box at `(x, y)` as the one holding the prize.
    pub fn mark_wasmprize(&self, bridge: &mut Bridge, x: i32, y: i32) -> Result<()> {
        bridge.call(abi::ENGINE_MARK_WASMPRIZE, (self.ptr()?, x, y))
    }

    pub fn open_box(
        &self,
        bridge: &mut Bridge,
        player: &PlayerCore,
        x: i32,
        y: i32,
    ) -> Result<()> {
        bridge.call(abi::ENGINE_OPEN_BOX, (self.ptr()?, player.ptr()?, x, y))
    }

    pub fn move_player(
        &self,
        bridge: &mut Bridge,
        player: &PlayerCore,
        x: i32,
        y: i32,
    ) -> Result<()> {
        bridge.call(abi::ENGINE_MOVE_PLAYER, (self.ptr()?, player.ptr()?, x, y))
    }

    /// Whether `(x, y)` is walkable floor.
    pub fn free_cell(&self, bridge: &mut Bridge, x: i32, y: i32) -> Result<bool> {
        let free: i32 = bridge.call(abi::ENGINE_FREE_CELL, (self.ptr()?, x, y))?;
        Ok(free != 0)
    }

    pub fn free(&mut self, bridge: &mut Bridge) -> Result<bool> {
        self.handle.free(bridge)
    }

    pub fn is_freed(&self) -> bool {
        self.handle.is_freed()
    }
}
