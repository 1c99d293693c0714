//! PlayerCore exports.
//!
//! A player is a 32-byte record (see [`crate::types`]) holding its position,
//! hitpoints, move counter, an owned copy of its name and the heap reference
//! of the display it draws on.  The display reference is owned by the record
//! and handed back to the host with `object_drop_ref` in the destructor.

use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::runtime::{
    emit_live_delta, emit_load_field, emit_null_check, emit_throw, func_idx, memarg, StaticStr,
    Strings, RT_FREE, RT_ITOA, RT_MALLOC, RT_MEMCPY,
};
use crate::types::*;

// ── Local function index offsets ─────────────────────────────────────────────

pub const PC_NEW: u32 = 7;
pub const PC_FREE: u32 = 8;
pub const PC_X: u32 = 9;
pub const PC_Y: u32 = 10;
pub const PC_HITPOINTS: u32 = 11;
pub const PC_NAME: u32 = 12;
pub const PC_MOVE_TO: u32 = 13;
pub const PC_DRAW: u32 = 14;
pub const PC_TAKE_DAMAGE: u32 = 15;
pub const PC_STATS: u32 = 16;
pub const PC_EMIT_STATS: u32 = 17;

/// Emit `playercore_new(x, y, name_ptr, name_len, display) -> ptr`.
///
/// The name bytes belong to the caller and are released by it after the call
/// returns, so the constructor keeps its own copy.
pub fn emit_new() -> Function {
    // Locals: 0=x, 1=y, 2=name_ptr, 3=name_len, 4=display, 5=rec, 6=name_copy
    let mut f = Function::new(vec![(2, ValType::I32)]);
    f.instruction(&Instruction::I32Const(PLAYER_SIZE));
    f.instruction(&Instruction::Call(func_idx(RT_MALLOC)));
    f.instruction(&Instruction::LocalSet(5));

    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::Call(func_idx(RT_MALLOC)));
    f.instruction(&Instruction::LocalSet(6));
    f.instruction(&Instruction::LocalGet(6));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::Call(func_idx(RT_MEMCPY)));

    let fields: [(u64, Instruction<'static>); 7] = [
        (PLAYER_X, Instruction::LocalGet(0)),
        (PLAYER_Y, Instruction::LocalGet(1)),
        (PLAYER_HP, Instruction::I32Const(MAX_HITPOINTS)),
        (PLAYER_MOVES, Instruction::I32Const(0)),
        (PLAYER_NAME_PTR, Instruction::LocalGet(6)),
        (PLAYER_NAME_LEN, Instruction::LocalGet(3)),
        (PLAYER_DISPLAY, Instruction::LocalGet(4)),
    ];
    for (offset, value) in &fields {
        f.instruction(&Instruction::LocalGet(5));
        f.instruction(value);
        f.instruction(&Instruction::I32Store(memarg(*offset, 2)));
    }

    emit_live_delta(&mut f, 1);
    f.instruction(&Instruction::LocalGet(5));
    f.instruction(&Instruction::End);
    f
}

/// Emit `playercore_free(self)`.
pub fn emit_free(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    emit_load_field(&mut f, 0, PLAYER_DISPLAY);
    f.instruction(&Instruction::Call(IMPORT_OBJECT_DROP_REF));
    // Name was allocated after the record; release it first.
    emit_load_field(&mut f, 0, PLAYER_NAME_PTR);
    emit_load_field(&mut f, 0, PLAYER_NAME_LEN);
    f.instruction(&Instruction::Call(func_idx(RT_FREE)));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Const(PLAYER_SIZE));
    f.instruction(&Instruction::Call(func_idx(RT_FREE)));
    emit_live_delta(&mut f, -1);
    f.instruction(&Instruction::End);
    f
}

/// Emit a `(self) -> i32` accessor for the field at `offset`.
pub fn emit_getter(offset: u64, strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    emit_load_field(&mut f, 0, offset);
    f.instruction(&Instruction::End);
    f
}

/// Emit `playercore_name(ret_slot, self)`.
///
/// Writes `(ptr, len)` of a fresh copy of the name into `ret_slot`; the copy
/// belongs to the caller.
pub fn emit_name(strings: &Strings) -> Function {
    // Locals: 0=ret_slot, 1=self, 2=copy
    let mut f = Function::new(vec![(1, ValType::I32)]);
    emit_null_check(&mut f, 1, strings);
    emit_load_field(&mut f, 1, PLAYER_NAME_LEN);
    f.instruction(&Instruction::Call(func_idx(RT_MALLOC)));
    f.instruction(&Instruction::LocalSet(2));
    f.instruction(&Instruction::LocalGet(2));
    emit_load_field(&mut f, 1, PLAYER_NAME_PTR);
    emit_load_field(&mut f, 1, PLAYER_NAME_LEN);
    f.instruction(&Instruction::Call(func_idx(RT_MEMCPY)));

    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Store(memarg(0, 2)));
    f.instruction(&Instruction::LocalGet(0));
    emit_load_field(&mut f, 1, PLAYER_NAME_LEN);
    f.instruction(&Instruction::I32Store(memarg(4, 2)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `playercore_move_to(self, x, y)`.
pub fn emit_move_to(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Store(memarg(PLAYER_X, 2)));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Store(memarg(PLAYER_Y, 2)));
    // moves += 1
    f.instruction(&Instruction::LocalGet(0));
    emit_load_field(&mut f, 0, PLAYER_MOVES);
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Store(memarg(PLAYER_MOVES, 2)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `playercore_draw(self)`.
pub fn emit_draw(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    emit_load_field(&mut f, 0, PLAYER_DISPLAY);
    emit_load_field(&mut f, 0, PLAYER_X);
    emit_load_field(&mut f, 0, PLAYER_Y);
    f.instruction(&Instruction::I32Const(strings.player_glyph.ptr as i32));
    f.instruction(&Instruction::I32Const(strings.player_glyph.len as i32));
    f.instruction(&Instruction::I32Const(strings.player_color.ptr as i32));
    f.instruction(&Instruction::I32Const(strings.player_color.len as i32));
    f.instruction(&Instruction::Call(IMPORT_DISPLAY_DRAW_COLOR));
    f.instruction(&Instruction::End);
    f
}

/// Emit `playercore_take_damage(self, hits) -> remaining`.
///
/// Negative damage throws; hitpoints never drop below zero.
pub fn emit_take_damage(strings: &Strings) -> Function {
    // Locals: 0=self, 1=hits, 2=hp
    let mut f = Function::new(vec![(1, ValType::I32)]);
    emit_null_check(&mut f, 0, strings);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::I32LtS);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_throw(&mut f, strings.negative_damage);
    f.instruction(&Instruction::End);

    emit_load_field(&mut f, 0, PLAYER_HP);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::LocalSet(2));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::I32LtS);
    f.instruction(&Instruction::If(BlockType::Empty));
    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::LocalSet(2));
    f.instruction(&Instruction::End);

    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Store(memarg(PLAYER_HP, 2)));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::End);
    f
}

/// Emit `playercore_stats(self) -> obj`.
///
/// Formats `{"hitpoints":N,"max_hitpoints":100,"moves":M}` into a scratch
/// buffer, hands it to `json_parse` and returns the resulting heap reference.
pub fn emit_stats(strings: &Strings) -> Function {
    // Locals: 0=self, 1=buf, 2=pos, 3=obj
    let mut f = Function::new(vec![(3, ValType::I32)]);
    emit_null_check(&mut f, 0, strings);
    f.instruction(&Instruction::I32Const(STATS_BUFFER_SIZE));
    f.instruction(&Instruction::Call(func_idx(RT_MALLOC)));
    f.instruction(&Instruction::LocalTee(1));
    f.instruction(&Instruction::LocalSet(2));

    emit_append(&mut f, 2, strings.stats_open);
    emit_append_int(&mut f, 2, 0, PLAYER_HP);
    emit_append(&mut f, 2, strings.stats_moves);
    emit_append_int(&mut f, 2, 0, PLAYER_MOVES);
    emit_append(&mut f, 2, strings.stats_close);

    // obj = json_parse(buf, pos - buf)
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Sub);
    f.instruction(&Instruction::Call(IMPORT_JSON_PARSE));
    f.instruction(&Instruction::LocalSet(3));

    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(STATS_BUFFER_SIZE));
    f.instruction(&Instruction::Call(func_idx(RT_FREE)));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::End);
    f
}

/// Emit `playercore_emit_stats(self)`: `stats_updated(playercore_stats(self))`.
pub fn emit_emit_stats() -> Function {
    let mut f = Function::new(vec![]);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::Call(func_idx(PC_STATS)));
    f.instruction(&Instruction::Call(IMPORT_STATS_UPDATED));
    f.instruction(&Instruction::End);
    f
}

/// `memcpy(pos, text); pos += text.len`
fn emit_append(f: &mut Function, pos: u32, text: StaticStr) {
    f.instruction(&Instruction::LocalGet(pos));
    f.instruction(&Instruction::I32Const(text.ptr as i32));
    f.instruction(&Instruction::I32Const(text.len as i32));
    f.instruction(&Instruction::Call(func_idx(RT_MEMCPY)));
    f.instruction(&Instruction::LocalGet(pos));
    f.instruction(&Instruction::I32Const(text.len as i32));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(pos));
}

/// `pos += itoa(pos, record.field)`
fn emit_append_int(f: &mut Function, pos: u32, record: u32, offset: u64) {
    f.instruction(&Instruction::LocalGet(pos));
    emit_load_field(f, record, offset);
    f.instruction(&Instruction::Call(func_idx(RT_ITOA)));
    f.instruction(&Instruction::LocalGet(pos));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(pos));
}
