//! Runtime helper functions emitted into the guest module.
//!
//! These provide the allocation and byte-manipulation primitives that the
//! PlayerCore and Engine exports build upon.  Every function is registered
//! during module assembly (in `compiler.rs`) and referenced by its function
//! index.

use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::types::*;

// ══════════════════════════════════════════════════════════════════════════════
// Local function index offsets (relative to IMPORT_COUNT)
// ══════════════════════════════════════════════════════════════════════════════

/// Bump-allocate `size` bytes, growing memory on demand; returns pointer.
///
/// `malloc(size: i32) -> i32`
pub const RT_MALLOC: u32 = 0;

/// Release an allocation.  Only the most recent allocation is reclaimed.
///
/// `free(ptr: i32, len: i32)`
pub const RT_FREE: u32 = 1;

/// Byte-by-byte copy; `memcpy(dst: i32, src: i32, len: i32)`
pub const RT_MEMCPY: u32 = 2;

/// Write the decimal form of a signed integer; returns bytes written.
///
/// `itoa(dst: i32, value: i32) -> i32`
pub const RT_ITOA: u32 = 3;

/// Address of a grid cell, throwing on out-of-range coordinates.
///
/// `cell_addr(engine: i32, x: i32, y: i32) -> i32`
pub const RT_CELL_ADDR: u32 = 4;

/// `live_objects() -> i32`
pub const RT_LIVE_OBJECTS: u32 = 5;

/// Draw a single grid cell on the engine's display (internal).
///
/// `draw_cell(engine: i32, x: i32, y: i32)`
pub const RT_DRAW_CELL: u32 = 6;

/// Number of runtime helper functions.
pub const RT_FUNC_COUNT: u32 = 7;

/// Compute the absolute WASM function index of a locally-defined function.
#[inline]
pub const fn func_idx(offset: u32) -> u32 {
    IMPORT_COUNT + offset
}

pub(crate) fn memarg(offset: u64, align: u32) -> wasm_encoder::MemArg {
    wasm_encoder::MemArg {
        offset,
        align,
        memory_index: 0,
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Static data
// ══════════════════════════════════════════════════════════════════════════════

/// A string constant in the static data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticStr {
    pub ptr: u32,
    pub len: u32,
}

/// Accumulates the bytes of the static data segment.
#[derive(Debug, Clone)]
pub struct StaticData {
    base: u32,
    bytes: Vec<u8>,
}

impl StaticData {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            bytes: Vec::new(),
        }
    }

    /// Append `text` and return where it lives.
    pub fn intern(&mut self, text: &str) -> StaticStr {
        let ptr = self.base + self.bytes.len() as u32;
        self.bytes.extend_from_slice(text.as_bytes());
        StaticStr {
            ptr,
            len: text.len() as u32,
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// First byte past the interned data.
    pub fn end(&self) -> u32 {
        self.base + self.bytes.len() as u32
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Well-known strings referenced by the emitted functions.
#[derive(Debug, Clone)]
pub struct Strings {
    pub player_glyph: StaticStr,
    pub player_color: StaticStr,
    pub floor_glyph: StaticStr,
    pub box_glyph: StaticStr,
    pub engine_ready: StaticStr,
    pub out_of_memory: StaticStr,
    pub null_pointer: StaticStr,
    pub negative_damage: StaticStr,
    pub cell_out_of_bounds: StaticStr,
    pub no_box: StaticStr,
    pub prize_found: StaticStr,
    pub booby_trap: StaticStr,
    pub stats_open: StaticStr,
    pub stats_moves: StaticStr,
    pub stats_close: StaticStr,
}

impl Strings {
    pub fn intern(data: &mut StaticData) -> Self {
        Self {
            player_glyph: data.intern("@"),
            player_color: data.intern("#ff0"),
            floor_glyph: data.intern("."),
            box_glyph: data.intern("*"),
            engine_ready: data.intern("engine ready"),
            out_of_memory: data.intern("out of memory"),
            null_pointer: data.intern("null pointer passed to module"),
            negative_damage: data.intern("damage must be non-negative"),
            cell_out_of_bounds: data.intern("cell out of bounds"),
            no_box: data.intern("There's no box here."),
            prize_found: data.intern("Congratulations! You've found the WebAssembly Module!"),
            booby_trap: data.intern("Woops! This was a booby trap!"),
            stats_open: data.intern("{\"hitpoints\":"),
            stats_moves: data.intern(&format!(",\"max_hitpoints\":{MAX_HITPOINTS},\"moves\":")),
            stats_close: data.intern("}"),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Shared instruction sequences
// ══════════════════════════════════════════════════════════════════════════════

/// Emit `throw(msg)` followed by `unreachable`.
pub fn emit_throw(f: &mut Function, msg: StaticStr) {
    f.instruction(&Instruction::I32Const(msg.ptr as i32));
    f.instruction(&Instruction::I32Const(msg.len as i32));
    f.instruction(&Instruction::Call(IMPORT_THROW));
    f.instruction(&Instruction::Unreachable);
}

/// Emit a call to `alert(msg)`.
pub fn emit_alert(f: &mut Function, msg: StaticStr) {
    f.instruction(&Instruction::I32Const(msg.ptr as i32));
    f.instruction(&Instruction::I32Const(msg.len as i32));
    f.instruction(&Instruction::Call(IMPORT_ALERT));
}

/// Throw if the pointer held in `local` is zero.
pub fn emit_null_check(f: &mut Function, local: u32, strings: &Strings) {
    f.instruction(&Instruction::LocalGet(local));
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_throw(f, strings.null_pointer);
    f.instruction(&Instruction::End);
}

/// Push the `i32` field at `offset` of the record pointed to by `local`.
pub fn emit_load_field(f: &mut Function, local: u32, offset: u64) {
    f.instruction(&Instruction::LocalGet(local));
    f.instruction(&Instruction::I32Load(memarg(offset, 2)));
}

/// Add `delta` to the live-object counter.
pub fn emit_live_delta(f: &mut Function, delta: i32) {
    f.instruction(&Instruction::GlobalGet(GLOBAL_LIVE_OBJECTS));
    f.instruction(&Instruction::I32Const(delta));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::GlobalSet(GLOBAL_LIVE_OBJECTS));
}

// ══════════════════════════════════════════════════════════════════════════════
// Emit helpers: each builds a `wasm_encoder::Function`
// ══════════════════════════════════════════════════════════════════════════════

/// Emit the `malloc(size: i32) -> i32` function.
///
/// Bump allocator: rounds `size` up to [`ALLOC_ALIGN`], returns the current
/// `heap_ptr` and advances it.  When the new end passes the current memory
/// size, `memory.grow` is asked for the missing pages; a refused grow throws.
pub fn emit_malloc(strings: &Strings) -> Function {
    // Locals: 0=size, 1=old_ptr, 2=end, 3=mem_bytes
    let mut f = Function::new(vec![(3, ValType::I32)]);
    // size = (size + 7) & -8
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Const(ALLOC_ALIGN - 1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(-ALLOC_ALIGN));
    f.instruction(&Instruction::I32And);
    f.instruction(&Instruction::LocalSet(0));
    // old_ptr = heap_ptr; end = old_ptr + size
    f.instruction(&Instruction::GlobalGet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::LocalTee(1));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(2));
    // mem_bytes = memory.size << 16
    f.instruction(&Instruction::MemorySize(0));
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32Shl);
    f.instruction(&Instruction::LocalSet(3));
    // if end > mem_bytes → grow by ceil((end - mem_bytes) / 64 KiB)
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32GtU);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::I32Const(0xFFFF));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(16));
    f.instruction(&Instruction::I32ShrU);
    f.instruction(&Instruction::MemoryGrow(0));
    f.instruction(&Instruction::I32Const(-1));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_throw(&mut f, strings.out_of_memory);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    // heap_ptr = end; return old_ptr
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::GlobalSet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::End);
    f
}

/// Emit `free(ptr: i32, len: i32)`.
///
/// Rolls `heap_ptr` back when the released range is the newest allocation;
/// anything else stays allocated until the instance is discarded.
pub fn emit_free() -> Function {
    let mut f = Function::new(vec![]);
    // ptr + align(len) == heap_ptr ?
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(ALLOC_ALIGN - 1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(-ALLOC_ALIGN));
    f.instruction(&Instruction::I32And);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::GlobalGet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::GlobalSet(GLOBAL_HEAP_PTR));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f
}

/// Emit `memcpy(dst: i32, src: i32, len: i32)`.
pub fn emit_memcpy() -> Function {
    // Locals: 0=dst, 1=src, 2=len, 3=i
    let mut f = Function::new(vec![(1, ValType::I32)]);
    f.instruction(&Instruction::Block(BlockType::Empty));
    f.instruction(&Instruction::Loop(BlockType::Empty));
    // if i >= len break
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32GeU);
    f.instruction(&Instruction::BrIf(1));
    // dst[i] = src[i]
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Load8U(memarg(0, 0)));
    f.instruction(&Instruction::I32Store8(memarg(0, 0)));
    // i += 1
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(3));
    f.instruction(&Instruction::Br(0));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f
}

/// Emit `itoa(dst: i32, value: i32) -> i32`.
///
/// Writes the decimal digits of `value` (with a leading `-` when negative)
/// and returns the number of bytes written.
pub fn emit_itoa() -> Function {
    // Locals: 0=dst, 1=value, 2=sign_len, 3=tmp/pos, 4=digits
    let mut f = Function::new(vec![(3, ValType::I32)]);

    // Negative: write '-', advance dst, negate value
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::I32LtS);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Const(b'-' as i32));
    f.instruction(&Instruction::I32Store8(memarg(0, 0)));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(0));
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::LocalSet(1));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::LocalSet(2));
    f.instruction(&Instruction::End);

    // Count digits (unsigned, so i32::MIN still works)
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalSet(3));
    f.instruction(&Instruction::Loop(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(4));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(4));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Const(10));
    f.instruction(&Instruction::I32DivU);
    f.instruction(&Instruction::LocalTee(3));
    f.instruction(&Instruction::BrIf(0));
    f.instruction(&Instruction::End);

    // Write digits right to left
    f.instruction(&Instruction::LocalGet(4));
    f.instruction(&Instruction::LocalSet(3));
    f.instruction(&Instruction::Loop(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::LocalSet(3));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(10));
    f.instruction(&Instruction::I32RemU);
    f.instruction(&Instruction::I32Const(b'0' as i32));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Store8(memarg(0, 0)));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(10));
    f.instruction(&Instruction::I32DivU);
    f.instruction(&Instruction::LocalSet(1));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::BrIf(0));
    f.instruction(&Instruction::End);

    // return digits + sign_len
    f.instruction(&Instruction::LocalGet(4));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::End);
    f
}

/// Emit `cell_addr(engine: i32, x: i32, y: i32) -> i32`.
pub fn emit_cell_addr(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    // Unsigned compares reject negative coordinates too.
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(GRID_WIDTH));
    f.instruction(&Instruction::I32GeU);
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Const(GRID_HEIGHT));
    f.instruction(&Instruction::I32GeU);
    f.instruction(&Instruction::I32Or);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_throw(&mut f, strings.cell_out_of_bounds);
    f.instruction(&Instruction::End);
    // grid + y * W + x
    emit_load_field(&mut f, 0, ENGINE_GRID);
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Const(GRID_WIDTH));
    f.instruction(&Instruction::I32Mul);
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::End);
    f
}

/// Emit `live_objects() -> i32`.
pub fn emit_live_objects() -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::GlobalGet(GLOBAL_LIVE_OBJECTS));
    f.instruction(&Instruction::End);
    f
}

/// Emit `draw_cell(engine: i32, x: i32, y: i32)`.
///
/// Floor cells draw `.`, boxes draw `*`, undug cells draw nothing.
pub fn emit_draw_cell(strings: &Strings) -> Function {
    // Locals: 0=engine, 1=x, 2=y, 3=cell
    let mut f = Function::new(vec![(1, ValType::I32)]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::Call(func_idx(RT_CELL_ADDR)));
    f.instruction(&Instruction::I32Load8U(memarg(0, 0)));
    f.instruction(&Instruction::LocalSet(3));

    for (cell, glyph) in [(CELL_FLOOR, strings.floor_glyph), (CELL_BOX, strings.box_glyph)] {
        f.instruction(&Instruction::LocalGet(3));
        f.instruction(&Instruction::I32Const(cell));
        f.instruction(&Instruction::I32Eq);
        f.instruction(&Instruction::If(BlockType::Empty));
        emit_load_field(&mut f, 0, ENGINE_DISPLAY);
        f.instruction(&Instruction::LocalGet(1));
        f.instruction(&Instruction::LocalGet(2));
        f.instruction(&Instruction::I32Const(glyph.ptr as i32));
        f.instruction(&Instruction::I32Const(glyph.len as i32));
        f.instruction(&Instruction::Call(IMPORT_DISPLAY_DRAW));
        f.instruction(&Instruction::End);
    }
    f.instruction(&Instruction::End);
    f
}
