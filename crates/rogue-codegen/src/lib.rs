//! Reference guest module generator: emits the rogue `.wasm` module.
//!
//! # Architecture
//!
//! The generated module is the module side of the bridge contract defined in
//! [`rogue_types::abi`].  It is deliberately small: it owns a bump allocator,
//! two exported object types and the static strings they need, and it talks to
//! the host only through the `env.*` imports.
//!
//! ## Imports
//! - `env.alert(ptr, len)`, `env.log(ptr, len)`
//! - `env.stats_updated(obj)`
//! - `env.display_draw(obj, x, y, ptr, len)`
//! - `env.display_draw_color(obj, x, y, ptr, len, color_ptr, color_len)`
//! - `env.json_parse(ptr, len) -> obj`
//! - `env.object_drop_ref(obj)`
//! - `env.throw(ptr, len)`
//!
//! ## Exports
//! - `memory`, `malloc(size) -> ptr`, `free(ptr, len)`, `live_objects()`
//! - `playercore_*`: a player with position, hitpoints and a name
//! - `engine_*`: a dungeon grid with boxes and a hidden prize

pub mod compiler;
pub mod engine;
pub mod error;
pub mod player;
pub mod runtime;
pub mod types;

pub use compiler::emit_module;
pub use error::{CodegenError, CodegenResult};
