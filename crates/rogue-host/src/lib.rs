//! Typed host API for the rogue module.
//!
//! One wrapper per exported type, each holding a move-only
//! [`Handle`](rogue_runtime::Handle).  Wrappers never own the bridge; every
//! method takes it explicitly so the borrow checker serialises module calls.
//!
//! # Usage
//!
//! ```no_run
//! use std::rc::Rc;
//! use rogue_host::{Bridge, DisplaySurface, HostHandlers, PlayerCore};
//!
//! struct Console;
//! impl DisplaySurface for Console {
//!     fn draw(&self, x: i32, y: i32, glyph: &str, _color: Option<&str>) {
//!         println!("{glyph} at {x},{y}");
//!     }
//! }
//!
//! struct Quiet;
//! impl HostHandlers for Quiet {
//!     fn alert(&mut self, message: &str) { println!("{message}"); }
//!     fn stats_updated(&mut self, _stats: serde_json::Value) {}
//! }
//!
//! # fn run(wasm: &[u8]) -> rogue_host::Result<()> {
//! let mut bridge = Bridge::new(wasm, Quiet)?;
//! let display: Rc<dyn DisplaySurface> = Rc::new(Console);
//! let mut player = PlayerCore::new(&mut bridge, 5, 5, "explorer", &display)?;
//! assert_eq!(player.x(&mut bridge)?, 5);
//! player.free(&mut bridge)?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod player;
pub mod signatures;

pub use engine::Engine;
pub use player::PlayerCore;
pub use rogue_runtime::{Bridge, BridgeConfig, BridgeError, DisplaySurface, HostHandlers, Result};
pub use signatures::interface;

/// The interface table as pretty-printed JSON.
pub fn interface_json() -> String {
    interface().to_json().unwrap_or_else(|e| {
        format!(r#"{{"types":[],"error":"Serialization error: {e}"}}"#)
    })
}

/// The interface table as a declaration file.
pub fn declarations() -> String {
    interface().render_declarations()
}

/// Return the host library version string.
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
