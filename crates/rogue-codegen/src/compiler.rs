//! Guest module assembler.
//!
//! Orchestrates module emission:
//! 1. Intern the static strings into the data segment
//! 2. Emit runtime helpers, PlayerCore and Engine functions in index order
//! 3. Assemble all WASM sections into a valid module
//! 4. Validate with `wasmparser`

use rogue_types::abi;
use wasm_encoder::{
    CodeSection, ConstExpr, CustomSection, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, MemorySection,
    MemoryType, Module, TypeSection, ValType,
};

use crate::engine::{self, LOCAL_FUNC_COUNT};
use crate::error::{CodegenError, CodegenResult};
use crate::player;
use crate::runtime::{self, StaticData, Strings};
use crate::types::*;

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Emit the reference guest module.
///
/// Returns the raw bytes of a valid WebAssembly module on success, or a
/// [`CodegenError`] describing what went wrong.
pub fn emit_module() -> CodegenResult<Vec<u8>> {
    ModuleBuilder::new().build()
}

// ══════════════════════════════════════════════════════════════════════════════
// ModuleBuilder
// ══════════════════════════════════════════════════════════════════════════════

/// One locally-defined function awaiting assembly.
struct LocalFunc {
    offset: u32,
    type_idx: u32,
    export: Option<&'static str>,
    body: Function,
}

struct ModuleBuilder {
    data: StaticData,
    strings: Strings,
}

impl ModuleBuilder {
    fn new() -> Self {
        let mut data = StaticData::new(STATIC_DATA_START);
        let strings = Strings::intern(&mut data);
        Self { data, strings }
    }

    fn build(&self) -> CodegenResult<Vec<u8>> {
        if self.data.end() > HEAP_START {
            return Err(CodegenError::LimitExceeded(format!(
                "static data ends at {} but the heap starts at {HEAP_START}",
                self.data.end()
            )));
        }

        let funcs = self.local_functions();
        Self::check_order(&funcs)?;

        let mut module = Module::new();
        module.section(&self.emit_types());
        module.section(&self.emit_imports());

        let mut func_section = FunctionSection::new();
        let mut code_section = CodeSection::new();
        for func in &funcs {
            func_section.function(func.type_idx);
            code_section.function(&func.body);
        }
        module.section(&func_section);

        module.section(&self.emit_memory());
        module.section(&self.emit_globals());
        module.section(&self.emit_exports(&funcs));
        module.section(&code_section);
        module.section(&self.emit_data());
        module.section(&self.emit_custom());

        let wasm_bytes = module.finish();

        wasmparser::validate(&wasm_bytes)
            .map_err(|e| CodegenError::ValidationFailed(format!("{e}")))?;

        Ok(wasm_bytes)
    }

    /// Every local function in index order.
    fn local_functions(&self) -> Vec<LocalFunc> {
        let s = &self.strings;
        let func = |offset, type_idx, export, body| LocalFunc {
            offset,
            type_idx,
            export,
            body,
        };
        vec![
            // ── Runtime ──────────────────────────────────────────────────
            func(runtime::RT_MALLOC, TYPE_I32_I32, Some(abi::EXPORT_MALLOC), runtime::emit_malloc(s)),
            func(runtime::RT_FREE, TYPE_I32X2_VOID, Some(abi::EXPORT_FREE), runtime::emit_free()),
            func(runtime::RT_MEMCPY, TYPE_I32X3_VOID, None, runtime::emit_memcpy()),
            func(runtime::RT_ITOA, TYPE_I32X2_I32, None, runtime::emit_itoa()),
            func(runtime::RT_CELL_ADDR, TYPE_I32X3_I32, None, runtime::emit_cell_addr(s)),
            func(runtime::RT_LIVE_OBJECTS, TYPE_VOID_I32, Some(abi::EXPORT_LIVE_OBJECTS), runtime::emit_live_objects()),
            func(runtime::RT_DRAW_CELL, TYPE_I32X3_VOID, None, runtime::emit_draw_cell(s)),
            // ── PlayerCore ───────────────────────────────────────────────
            func(player::PC_NEW, TYPE_I32X5_I32, Some(abi::PLAYERCORE_NEW), player::emit_new()),
            func(player::PC_FREE, TYPE_I32_VOID, Some(abi::PLAYERCORE_FREE), player::emit_free(s)),
            func(player::PC_X, TYPE_I32_I32, Some(abi::PLAYERCORE_X), player::emit_getter(PLAYER_X, s)),
            func(player::PC_Y, TYPE_I32_I32, Some(abi::PLAYERCORE_Y), player::emit_getter(PLAYER_Y, s)),
            func(player::PC_HITPOINTS, TYPE_I32_I32, Some(abi::PLAYERCORE_HITPOINTS), player::emit_getter(PLAYER_HP, s)),
            func(player::PC_NAME, TYPE_I32X2_VOID, Some(abi::PLAYERCORE_NAME), player::emit_name(s)),
            func(player::PC_MOVE_TO, TYPE_I32X3_VOID, Some(abi::PLAYERCORE_MOVE_TO), player::emit_move_to(s)),
            func(player::PC_DRAW, TYPE_I32_VOID, Some(abi::PLAYERCORE_DRAW), player::emit_draw(s)),
            func(player::PC_TAKE_DAMAGE, TYPE_I32X2_I32, Some(abi::PLAYERCORE_TAKE_DAMAGE), player::emit_take_damage(s)),
            func(player::PC_STATS, TYPE_I32_I32, Some(abi::PLAYERCORE_STATS), player::emit_stats(s)),
            func(player::PC_EMIT_STATS, TYPE_I32_VOID, Some(abi::PLAYERCORE_EMIT_STATS), player::emit_emit_stats()),
            // ── Engine ───────────────────────────────────────────────────
            func(engine::EN_NEW, TYPE_I32_I32, Some(abi::ENGINE_NEW), engine::emit_new(s)),
            func(engine::EN_FREE, TYPE_I32_VOID, Some(abi::ENGINE_FREE), engine::emit_free(s)),
            func(engine::EN_ON_DIG, TYPE_I32X4_VOID, Some(abi::ENGINE_ON_DIG), engine::emit_on_dig(s)),
            func(engine::EN_DRAW_MAP, TYPE_I32_VOID, Some(abi::ENGINE_DRAW_MAP), engine::emit_draw_map(s)),
            func(engine::EN_REDRAW_AT, TYPE_I32X3_VOID, Some(abi::ENGINE_REDRAW_AT), engine::emit_redraw_at(s)),
            func(engine::EN_PLACE_BOX, TYPE_I32X3_VOID, Some(abi::ENGINE_PLACE_BOX), engine::emit_place_box(s)),
            func(engine::EN_MARK_WASMPRIZE, TYPE_I32X3_VOID, Some(abi::ENGINE_MARK_WASMPRIZE), engine::emit_mark_wasmprize(s)),
            func(engine::EN_OPEN_BOX, TYPE_I32X4_VOID, Some(abi::ENGINE_OPEN_BOX), engine::emit_open_box(s)),
            func(engine::EN_MOVE_PLAYER, TYPE_I32X4_VOID, Some(abi::ENGINE_MOVE_PLAYER), engine::emit_move_player(s)),
            func(engine::EN_FREE_CELL, TYPE_I32X3_I32, Some(abi::ENGINE_FREE_CELL), engine::emit_free_cell(s)),
        ]
    }

    /// Function bodies call each other by fixed index, so the emission order
    /// must match the declared offsets exactly.
    fn check_order(funcs: &[LocalFunc]) -> CodegenResult<()> {
        if funcs.len() as u32 != LOCAL_FUNC_COUNT {
            return Err(CodegenError::Internal(format!(
                "expected {LOCAL_FUNC_COUNT} local functions, emitted {}",
                funcs.len()
            )));
        }
        for (position, func) in funcs.iter().enumerate() {
            if func.offset != position as u32 {
                return Err(CodegenError::Internal(format!(
                    "function with offset {} emitted at position {position}",
                    func.offset
                )));
            }
        }
        Ok(())
    }

    // ── Type section ─────────────────────────────────────────────────────

    fn emit_types(&self) -> TypeSection {
        let mut types = TypeSection::new();
        let i32s = |n: usize| vec![ValType::I32; n];

        // TYPE_VOID_I32
        types.ty().function(vec![], i32s(1));
        // TYPE_I32_VOID
        types.ty().function(i32s(1), vec![]);
        // TYPE_I32_I32
        types.ty().function(i32s(1), i32s(1));
        // TYPE_I32X2_VOID
        types.ty().function(i32s(2), vec![]);
        // TYPE_I32X2_I32
        types.ty().function(i32s(2), i32s(1));
        // TYPE_I32X3_VOID
        types.ty().function(i32s(3), vec![]);
        // TYPE_I32X3_I32
        types.ty().function(i32s(3), i32s(1));
        // TYPE_I32X4_VOID
        types.ty().function(i32s(4), vec![]);
        // TYPE_I32X5_VOID
        types.ty().function(i32s(5), vec![]);
        // TYPE_I32X5_I32
        types.ty().function(i32s(5), i32s(1));
        // TYPE_I32X7_VOID
        types.ty().function(i32s(7), vec![]);

        types
    }

    // ── Import section ───────────────────────────────────────────────────

    fn emit_imports(&self) -> ImportSection {
        let mut imports = ImportSection::new();
        let env = abi::IMPORT_MODULE;

        imports.import(env, abi::IMPORT_ALERT, EntityType::Function(TYPE_I32X2_VOID));
        imports.import(env, abi::IMPORT_LOG, EntityType::Function(TYPE_I32X2_VOID));
        imports.import(env, abi::IMPORT_STATS_UPDATED, EntityType::Function(TYPE_I32_VOID));
        imports.import(env, abi::IMPORT_DISPLAY_DRAW, EntityType::Function(TYPE_I32X5_VOID));
        imports.import(env, abi::IMPORT_DISPLAY_DRAW_COLOR, EntityType::Function(TYPE_I32X7_VOID));
        imports.import(env, abi::IMPORT_JSON_PARSE, EntityType::Function(TYPE_I32X2_I32));
        imports.import(env, abi::IMPORT_OBJECT_DROP_REF, EntityType::Function(TYPE_I32_VOID));
        imports.import(env, abi::IMPORT_THROW, EntityType::Function(TYPE_I32X2_VOID));

        imports
    }

    // ── Memory section ───────────────────────────────────────────────────

    fn emit_memory(&self) -> MemorySection {
        let mut memory = MemorySection::new();
        memory.memory(MemoryType {
            minimum: INITIAL_MEMORY_PAGES,
            maximum: Some(MAX_MEMORY_PAGES),
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        memory
    }

    // ── Global section ───────────────────────────────────────────────────

    fn emit_globals(&self) -> GlobalSection {
        let mut globals = GlobalSection::new();
        let mutable_i32 = GlobalType {
            val_type: ValType::I32,
            mutable: true,
            shared: false,
        };

        // GLOBAL_HEAP_PTR: starts after the static data
        globals.global(mutable_i32, &ConstExpr::i32_const(HEAP_START as i32));
        // GLOBAL_LIVE_OBJECTS
        globals.global(mutable_i32, &ConstExpr::i32_const(0));

        globals
    }

    // ── Export section ───────────────────────────────────────────────────

    fn emit_exports(&self, funcs: &[LocalFunc]) -> ExportSection {
        let mut exports = ExportSection::new();
        exports.export(abi::EXPORT_MEMORY, ExportKind::Memory, 0);
        for func in funcs {
            if let Some(name) = func.export {
                exports.export(name, ExportKind::Func, runtime::func_idx(func.offset));
            }
        }
        exports
    }

    // ── Data section ─────────────────────────────────────────────────────

    fn emit_data(&self) -> DataSection {
        let mut data_sec = DataSection::new();
        data_sec.active(
            0,
            &ConstExpr::i32_const(self.data.base() as i32),
            self.data.bytes().iter().copied(),
        );
        data_sec
    }

    // ── Custom section ───────────────────────────────────────────────────

    fn emit_custom(&self) -> CustomSection<'_> {
        CustomSection {
            name: std::borrow::Cow::Borrowed(CUSTOM_SECTION_NAME),
            data: std::borrow::Cow::Borrowed(GENERATOR_VERSION.as_bytes()),
        }
    }
}
