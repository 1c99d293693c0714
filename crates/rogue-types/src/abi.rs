//! Boundary ABI: names and numeric layout shared by guest and host.
//!
//! Every value that crosses the boundary is an `i32`.  Strings travel as
//! `(ptr, len)` pairs into linear memory, host objects travel as heap
//! references (see the `HEAP_*` constants), and module-side objects travel as
//! raw allocation pointers.
//!
//! ```text
//! heap reference (u32, always non-negative as i32)
//!   bit 31      : 0
//!   bits 20..31 : generation (0 for reserved slots)
//!   bits 0..20  : slot index
//! ```

// ── Import namespace ─────────────────────────────────────────────────────────

/// Module name every host import lives under.
pub const IMPORT_MODULE: &str = "env";

/// `alert(ptr, len)`: user-facing message.
pub const IMPORT_ALERT: &str = "alert";
/// `log(ptr, len)`: diagnostic message.
pub const IMPORT_LOG: &str = "log";
/// `stats_updated(obj)`: consumes a heap reference to a stats record.
pub const IMPORT_STATS_UPDATED: &str = "stats_updated";
/// `display_draw(obj, x, y, ptr, len)`: draw a glyph on a borrowed display.
pub const IMPORT_DISPLAY_DRAW: &str = "display_draw";
/// `display_draw_color(obj, x, y, ptr, len, color_ptr, color_len)`.
pub const IMPORT_DISPLAY_DRAW_COLOR: &str = "display_draw_color";
/// `json_parse(ptr, len) -> obj`: parse JSON into a fresh heap reference.
pub const IMPORT_JSON_PARSE: &str = "json_parse";
/// `object_drop_ref(obj)`: the module releases a heap reference it owned.
pub const IMPORT_OBJECT_DROP_REF: &str = "object_drop_ref";
/// `throw(ptr, len)`: unrecoverable module failure.  Never returns.
pub const IMPORT_THROW: &str = "throw";

// ── Core exports ─────────────────────────────────────────────────────────────

/// Linear memory.
pub const EXPORT_MEMORY: &str = "memory";
/// `malloc(size) -> ptr`
pub const EXPORT_MALLOC: &str = "malloc";
/// `free(ptr, len)`
pub const EXPORT_FREE: &str = "free";
/// `live_objects() -> i32`: number of constructed, not yet freed objects.
pub const EXPORT_LIVE_OBJECTS: &str = "live_objects";

// ── PlayerCore exports ───────────────────────────────────────────────────────

pub const PLAYERCORE_NEW: &str = "playercore_new";
pub const PLAYERCORE_FREE: &str = "playercore_free";
pub const PLAYERCORE_X: &str = "playercore_x";
pub const PLAYERCORE_Y: &str = "playercore_y";
pub const PLAYERCORE_HITPOINTS: &str = "playercore_hitpoints";
/// `playercore_name(ret_slot, self)`: writes `(ptr, len)` into `ret_slot`.
pub const PLAYERCORE_NAME: &str = "playercore_name";
pub const PLAYERCORE_MOVE_TO: &str = "playercore_move_to";
pub const PLAYERCORE_DRAW: &str = "playercore_draw";
pub const PLAYERCORE_TAKE_DAMAGE: &str = "playercore_take_damage";
/// `playercore_stats(self) -> obj`
pub const PLAYERCORE_STATS: &str = "playercore_stats";
pub const PLAYERCORE_EMIT_STATS: &str = "playercore_emit_stats";

// ── Engine exports ───────────────────────────────────────────────────────────

pub const ENGINE_NEW: &str = "engine_new";
pub const ENGINE_FREE: &str = "engine_free";
pub const ENGINE_ON_DIG: &str = "engine_on_dig";
pub const ENGINE_DRAW_MAP: &str = "engine_draw_map";
pub const ENGINE_REDRAW_AT: &str = "engine_redraw_at";
pub const ENGINE_PLACE_BOX: &str = "engine_place_box";
pub const ENGINE_MARK_WASMPRIZE: &str = "engine_mark_wasmprize";
pub const ENGINE_OPEN_BOX: &str = "engine_open_box";
pub const ENGINE_MOVE_PLAYER: &str = "engine_move_player";
pub const ENGINE_FREE_CELL: &str = "engine_free_cell";

// ── Object heap layout ───────────────────────────────────────────────────────

/// Slots below this index are reserved sentinels and are never freed.
pub const HEAP_RESERVED: u32 = 36;
/// Slots `0..HEAP_PREALLOCATED` are padding holding `undefined`.
pub const HEAP_PREALLOCATED: u32 = 32;
pub const HEAP_UNDEFINED: u32 = 32;
pub const HEAP_NULL: u32 = 33;
pub const HEAP_TRUE: u32 = 34;
pub const HEAP_FALSE: u32 = 35;

/// Number of low bits of a heap reference holding the slot index.
pub const HEAP_INDEX_BITS: u32 = 20;
/// Largest slot index representable in a heap reference.
pub const HEAP_MAX_INDEX: u32 = (1 << HEAP_INDEX_BITS) - 1;
/// Largest generation representable in a heap reference (keeps bit 31 clear).
pub const HEAP_MAX_GENERATION: u32 = (1 << (31 - HEAP_INDEX_BITS)) - 1;

// ── Guest memory layout ──────────────────────────────────────────────────────

/// Size in bytes of a string return slot: `[ptr: u32, len: u32]`.
pub const RETURN_SLOT_SIZE: u32 = 8;
/// Size in bytes of one string element (UTF-8 code unit).
pub const STRING_ELEMENT_SIZE: u32 = 1;
/// Linear memory page size.
pub const WASM_PAGE_SIZE: u32 = 64 * 1024;
