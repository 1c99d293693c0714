//! Engine exports: the dungeon grid.
//!
//! The engine owns a `GRID_WIDTH × GRID_HEIGHT` byte grid of cells (empty,
//! floor, box), the position of the prize box and the heap reference of its
//! display.  Player handles are borrowed per call, never stored.

use wasm_encoder::{BlockType, Function, Instruction, ValType};

use crate::player::{PC_DRAW, PC_EMIT_STATS, PC_MOVE_TO, PC_TAKE_DAMAGE};
use crate::runtime::{
    emit_alert, emit_live_delta, emit_load_field, emit_null_check, func_idx, memarg, Strings,
    RT_CELL_ADDR, RT_DRAW_CELL, RT_FREE, RT_MALLOC,
};
use crate::types::*;

// ── Local function index offsets ─────────────────────────────────────────────

pub const EN_NEW: u32 = 18;
pub const EN_FREE: u32 = 19;
pub const EN_ON_DIG: u32 = 20;
pub const EN_DRAW_MAP: u32 = 21;
pub const EN_REDRAW_AT: u32 = 22;
pub const EN_PLACE_BOX: u32 = 23;
pub const EN_MARK_WASMPRIZE: u32 = 24;
pub const EN_OPEN_BOX: u32 = 25;
pub const EN_MOVE_PLAYER: u32 = 26;
pub const EN_FREE_CELL: u32 = 27;

/// Total number of locally-defined functions (runtime + player + engine).
pub const LOCAL_FUNC_COUNT: u32 = 28;

/// Push `cell_addr(self, x, y)` using locals 0, `x` and `y`.
fn emit_cell_addr(f: &mut Function, x: u32, y: u32) {
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(x));
    f.instruction(&Instruction::LocalGet(y));
    f.instruction(&Instruction::Call(func_idx(RT_CELL_ADDR)));
}

/// Emit `engine_new(display) -> ptr`.
pub fn emit_new(strings: &Strings) -> Function {
    // Locals: 0=display, 1=rec, 2=grid, 3=i
    let mut f = Function::new(vec![(3, ValType::I32)]);
    f.instruction(&Instruction::I32Const(ENGINE_SIZE));
    f.instruction(&Instruction::Call(func_idx(RT_MALLOC)));
    f.instruction(&Instruction::LocalSet(1));
    f.instruction(&Instruction::I32Const(GRID_SIZE));
    f.instruction(&Instruction::Call(func_idx(RT_MALLOC)));
    f.instruction(&Instruction::LocalSet(2));

    // Reclaimed memory may hold stale bytes; clear the grid.
    f.instruction(&Instruction::Block(BlockType::Empty));
    f.instruction(&Instruction::Loop(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Const(GRID_SIZE));
    f.instruction(&Instruction::I32GeU);
    f.instruction(&Instruction::BrIf(1));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::I32Const(CELL_EMPTY));
    f.instruction(&Instruction::I32Store8(memarg(0, 0)));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(3));
    f.instruction(&Instruction::Br(0));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);

    let fields: [(u64, Instruction<'static>); 4] = [
        (ENGINE_DISPLAY, Instruction::LocalGet(0)),
        (ENGINE_PRIZE_X, Instruction::I32Const(-1)),
        (ENGINE_PRIZE_Y, Instruction::I32Const(-1)),
        (ENGINE_GRID, Instruction::LocalGet(2)),
    ];
    for (offset, value) in &fields {
        f.instruction(&Instruction::LocalGet(1));
        f.instruction(value);
        f.instruction(&Instruction::I32Store(memarg(*offset, 2)));
    }

    f.instruction(&Instruction::I32Const(strings.engine_ready.ptr as i32));
    f.instruction(&Instruction::I32Const(strings.engine_ready.len as i32));
    f.instruction(&Instruction::Call(IMPORT_LOG));

    emit_live_delta(&mut f, 1);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_free(self)`.
pub fn emit_free(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    emit_load_field(&mut f, 0, ENGINE_DISPLAY);
    f.instruction(&Instruction::Call(IMPORT_OBJECT_DROP_REF));
    emit_load_field(&mut f, 0, ENGINE_GRID);
    f.instruction(&Instruction::I32Const(GRID_SIZE));
    f.instruction(&Instruction::Call(func_idx(RT_FREE)));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::I32Const(ENGINE_SIZE));
    f.instruction(&Instruction::Call(func_idx(RT_FREE)));
    emit_live_delta(&mut f, -1);
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_on_dig(self, x, y, value)`: a zero value carves floor.
pub fn emit_on_dig(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Eqz);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_cell_addr(&mut f, 1, 2);
    f.instruction(&Instruction::I32Const(CELL_FLOOR));
    f.instruction(&Instruction::I32Store8(memarg(0, 0)));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_draw_map(self)`: draws every non-empty cell, row by row.
pub fn emit_draw_map(strings: &Strings) -> Function {
    // Locals: 0=self, 1=x, 2=y
    let mut f = Function::new(vec![(2, ValType::I32)]);
    emit_null_check(&mut f, 0, strings);

    f.instruction(&Instruction::Block(BlockType::Empty));
    f.instruction(&Instruction::Loop(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Const(GRID_HEIGHT));
    f.instruction(&Instruction::I32GeS);
    f.instruction(&Instruction::BrIf(1));

    f.instruction(&Instruction::I32Const(0));
    f.instruction(&Instruction::LocalSet(1));
    f.instruction(&Instruction::Block(BlockType::Empty));
    f.instruction(&Instruction::Loop(BlockType::Empty));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(GRID_WIDTH));
    f.instruction(&Instruction::I32GeS);
    f.instruction(&Instruction::BrIf(1));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::Call(func_idx(RT_DRAW_CELL)));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(1));
    f.instruction(&Instruction::Br(0));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);

    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Const(1));
    f.instruction(&Instruction::I32Add);
    f.instruction(&Instruction::LocalSet(2));
    f.instruction(&Instruction::Br(0));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_redraw_at(self, x, y)`.
pub fn emit_redraw_at(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::Call(func_idx(RT_DRAW_CELL)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_place_box(self, x, y)`.
pub fn emit_place_box(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    emit_cell_addr(&mut f, 1, 2);
    f.instruction(&Instruction::I32Const(CELL_BOX));
    f.instruction(&Instruction::I32Store8(memarg(0, 0)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_mark_wasmprize(self, x, y)`.
pub fn emit_mark_wasmprize(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    // Validates the coordinates.
    emit_cell_addr(&mut f, 1, 2);
    f.instruction(&Instruction::Drop);
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Store(memarg(ENGINE_PRIZE_X, 2)));
    f.instruction(&Instruction::LocalGet(0));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Store(memarg(ENGINE_PRIZE_Y, 2)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_open_box(self, player, x, y)`.
///
/// No box: alert.  Prize box: alert.  Any other box is a booby trap that
/// damages the player and emits fresh stats.  Opened boxes become floor.
pub fn emit_open_box(strings: &Strings) -> Function {
    // Locals: 0=self, 1=player, 2=x, 3=y, 4=addr
    let mut f = Function::new(vec![(1, ValType::I32)]);
    emit_null_check(&mut f, 0, strings);
    emit_null_check(&mut f, 1, strings);
    emit_cell_addr(&mut f, 2, 3);
    f.instruction(&Instruction::LocalSet(4));

    f.instruction(&Instruction::LocalGet(4));
    f.instruction(&Instruction::I32Load8U(memarg(0, 0)));
    f.instruction(&Instruction::I32Const(CELL_BOX));
    f.instruction(&Instruction::I32Ne);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_alert(&mut f, strings.no_box);
    f.instruction(&Instruction::Return);
    f.instruction(&Instruction::End);

    f.instruction(&Instruction::LocalGet(4));
    f.instruction(&Instruction::I32Const(CELL_FLOOR));
    f.instruction(&Instruction::I32Store8(memarg(0, 0)));

    // prize_x == x && prize_y == y
    emit_load_field(&mut f, 0, ENGINE_PRIZE_X);
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::I32Eq);
    emit_load_field(&mut f, 0, ENGINE_PRIZE_Y);
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::I32And);
    f.instruction(&Instruction::If(BlockType::Empty));
    emit_alert(&mut f, strings.prize_found);
    f.instruction(&Instruction::Else);
    emit_alert(&mut f, strings.booby_trap);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::I32Const(BOOBY_TRAP_DAMAGE));
    f.instruction(&Instruction::Call(func_idx(PC_TAKE_DAMAGE)));
    f.instruction(&Instruction::Drop);
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::Call(func_idx(PC_EMIT_STATS)));
    f.instruction(&Instruction::End);
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_move_player(self, player, x, y)`.
///
/// Redraws the cell the player leaves, moves it and draws it again.
pub fn emit_move_player(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    emit_null_check(&mut f, 1, strings);
    f.instruction(&Instruction::LocalGet(0));
    emit_load_field(&mut f, 1, PLAYER_X);
    emit_load_field(&mut f, 1, PLAYER_Y);
    f.instruction(&Instruction::Call(func_idx(RT_DRAW_CELL)));

    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::LocalGet(2));
    f.instruction(&Instruction::LocalGet(3));
    f.instruction(&Instruction::Call(func_idx(PC_MOVE_TO)));
    f.instruction(&Instruction::LocalGet(1));
    f.instruction(&Instruction::Call(func_idx(PC_DRAW)));
    f.instruction(&Instruction::End);
    f
}

/// Emit `engine_free_cell(self, x, y) -> bool`.
pub fn emit_free_cell(strings: &Strings) -> Function {
    let mut f = Function::new(vec![]);
    emit_null_check(&mut f, 0, strings);
    emit_cell_addr(&mut f, 1, 2);
    f.instruction(&Instruction::I32Load8U(memarg(0, 0)));
    f.instruction(&Instruction::I32Const(CELL_FLOOR));
    f.instruction(&Instruction::I32Eq);
    f.instruction(&Instruction::End);
    f
}
