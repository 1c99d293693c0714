//! Guest memory layout, record layouts and fixed module indices.
//!
//! ```text
//! 0 .. STATIC_DATA_START        : never used (keeps pointer 0 invalid)
//! STATIC_DATA_START .. HEAP_START : interned string constants
//! HEAP_START ..                  : bump-allocated records and strings
//! ```
//!
//! # Record layouts
//!
//! | PlayerCore (32 bytes) | Engine (16 bytes)   |
//! |-----------------------|---------------------|
//! | +0  x                 | +0  display obj     |
//! | +4  y                 | +4  prize x (-1)    |
//! | +8  hitpoints         | +8  prize y (-1)    |
//! | +12 moves             | +12 grid ptr        |
//! | +16 name ptr          |                     |
//! | +20 name len          |                     |
//! | +24 display obj       |                     |

// ── Memory ───────────────────────────────────────────────────────────────────

/// Initial linear memory size in pages (64 KiB each).
pub const INITIAL_MEMORY_PAGES: u64 = 1;
/// Maximum linear memory pages (16 MiB).
pub const MAX_MEMORY_PAGES: u64 = 256;
/// First byte of the static data segment.
pub const STATIC_DATA_START: u32 = 16;
/// Heap starts after the static data region.
pub const HEAP_START: u32 = 1024;
/// Every allocation is rounded up to this many bytes.
pub const ALLOC_ALIGN: i32 = 8;

// ── PlayerCore ───────────────────────────────────────────────────────────────

pub const PLAYER_SIZE: i32 = 32;
pub const PLAYER_X: u64 = 0;
pub const PLAYER_Y: u64 = 4;
pub const PLAYER_HP: u64 = 8;
pub const PLAYER_MOVES: u64 = 12;
pub const PLAYER_NAME_PTR: u64 = 16;
pub const PLAYER_NAME_LEN: u64 = 20;
pub const PLAYER_DISPLAY: u64 = 24;

/// Hitpoints a freshly constructed player starts with.
pub const MAX_HITPOINTS: i32 = 100;
/// Damage dealt by opening an empty box.
pub const BOOBY_TRAP_DAMAGE: i32 = 10;
/// Scratch buffer size for the stats JSON document.
pub const STATS_BUFFER_SIZE: i32 = 96;

// ── Engine ───────────────────────────────────────────────────────────────────

pub const ENGINE_SIZE: i32 = 16;
pub const ENGINE_DISPLAY: u64 = 0;
pub const ENGINE_PRIZE_X: u64 = 4;
pub const ENGINE_PRIZE_Y: u64 = 8;
pub const ENGINE_GRID: u64 = 12;

pub const GRID_WIDTH: i32 = 64;
pub const GRID_HEIGHT: i32 = 32;
pub const GRID_SIZE: i32 = GRID_WIDTH * GRID_HEIGHT;

pub const CELL_EMPTY: i32 = 0;
pub const CELL_FLOOR: i32 = 1;
pub const CELL_BOX: i32 = 2;

// ── Global variable indices ──────────────────────────────────────────────────
// (order must match the global section emission in compiler.rs)

/// Bump allocation pointer: next free byte in linear memory.
pub const GLOBAL_HEAP_PTR: u32 = 0;
/// Number of live PlayerCore + Engine records.
pub const GLOBAL_LIVE_OBJECTS: u32 = 1;

// ── WASM type indices ────────────────────────────────────────────────────────
// Fixed type indices in the type section (see compiler.rs emit_types).

/// `() -> i32`
pub const TYPE_VOID_I32: u32 = 0;
/// `(i32) -> ()`
pub const TYPE_I32_VOID: u32 = 1;
/// `(i32) -> i32`
pub const TYPE_I32_I32: u32 = 2;
/// `(i32, i32) -> ()`
pub const TYPE_I32X2_VOID: u32 = 3;
/// `(i32, i32) -> i32`
pub const TYPE_I32X2_I32: u32 = 4;
/// `(i32, i32, i32) -> ()`
pub const TYPE_I32X3_VOID: u32 = 5;
/// `(i32, i32, i32) -> i32`
pub const TYPE_I32X3_I32: u32 = 6;
/// `(i32, i32, i32, i32) -> ()`
pub const TYPE_I32X4_VOID: u32 = 7;
/// `(i32, i32, i32, i32, i32) -> ()`
pub const TYPE_I32X5_VOID: u32 = 8;
/// `(i32, i32, i32, i32, i32) -> i32`
pub const TYPE_I32X5_I32: u32 = 9;
/// `(i32 × 7) -> ()`
pub const TYPE_I32X7_VOID: u32 = 10;

// ── Imported function indices ────────────────────────────────────────────────
// (order must match the import section emission in compiler.rs)

pub const IMPORT_ALERT: u32 = 0;
pub const IMPORT_LOG: u32 = 1;
pub const IMPORT_STATS_UPDATED: u32 = 2;
pub const IMPORT_DISPLAY_DRAW: u32 = 3;
pub const IMPORT_DISPLAY_DRAW_COLOR: u32 = 4;
pub const IMPORT_JSON_PARSE: u32 = 5;
pub const IMPORT_OBJECT_DROP_REF: u32 = 6;
pub const IMPORT_THROW: u32 = 7;

/// Number of imported functions (offset for locally-defined function indices).
pub const IMPORT_COUNT: u32 = 8;

// ── Custom section ───────────────────────────────────────────────────────────

/// Custom section name for generator metadata.
pub const CUSTOM_SECTION_NAME: &str = "rogue";
/// Generator version embedded in the custom section.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");
