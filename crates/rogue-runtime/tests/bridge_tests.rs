//! Integration tests for the bridge, run against the generated guest module.
//!
//! Tests validate:
//! - Instantiation, export checks and the module fingerprint
//! - String transfer in both directions, including growth of linear memory
//! - Heap traffic through imports (display borrow, stats take, drop on free)
//! - The throw channel and the poisoned flag

use std::cell::RefCell;
use std::rc::Rc;

use rogue_codegen::emit_module;
use rogue_codegen::types::HEAP_START;
use rogue_runtime::{
    BoundaryViolation, Bridge, BridgeConfig, BridgeError, DisplaySurface, ErrorCategory,
    HeapRef, HostHandlers, HostValue,
};
use rogue_types::abi;
use serde_json::json;
use wasm_encoder::{
    CodeSection, ConstExpr, ExportKind, ExportSection, Function, FunctionSection, GlobalSection,
    GlobalType, Instruction, MemArg, MemorySection, MemoryType, Module, TypeSection, ValType,
};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Recorded {
    alerts: Vec<String>,
    logs: Vec<String>,
    stats: Vec<serde_json::Value>,
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Recorded>>);

impl HostHandlers for Recorder {
    fn alert(&mut self, message: &str) {
        self.0.borrow_mut().alerts.push(message.to_string());
    }

    fn log(&mut self, message: &str) {
        self.0.borrow_mut().logs.push(message.to_string());
    }

    fn stats_updated(&mut self, stats: serde_json::Value) {
        self.0.borrow_mut().stats.push(stats);
    }
}

#[derive(Default)]
struct Canvas {
    draws: RefCell<Vec<(i32, i32, String, Option<String>)>>,
}

impl DisplaySurface for Canvas {
    fn draw(&self, x: i32, y: i32, glyph: &str, color: Option<&str>) {
        self.draws
            .borrow_mut()
            .push((x, y, glyph.to_string(), color.map(str::to_string)));
    }
}

fn bridge() -> (Bridge, Recorder) {
    bridge_with(BridgeConfig::default())
}

fn bridge_with(config: BridgeConfig) -> (Bridge, Recorder) {
    let wasm = emit_module().expect("module emits");
    let recorder = Recorder::default();
    let bridge = Bridge::with_config(&wasm, recorder.clone(), config).expect("bridge starts");
    (bridge, recorder)
}

fn malloc(bridge: &mut Bridge, size: i32) -> i32 {
    bridge.call::<i32, i32>(abi::EXPORT_MALLOC, size).unwrap()
}

fn new_player(bridge: &mut Bridge, name: &str, display: HeapRef) -> i32 {
    bridge
        .with_strings(&[name], |b, s| {
            let (ptr, len) = s[0].abi();
            b.call::<(i32, i32, i32, i32, i32), i32>(
                abi::PLAYERCORE_NEW,
                (5, 5, ptr, len, display.to_abi()),
            )
        })
        .unwrap()
}

fn word(offset: u64) -> MemArg {
    MemArg {
        offset,
        align: 2,
        memory_index: 0,
    }
}

/// A one-page module whose `malloc` hands out an 8-byte slot at 16 and
/// every other request at the last six bytes of memory.  `free` only counts
/// its calls (`frees()`), and `fill(slot, ptr)` writes `(ptr, 4)` to `slot`.
fn cramped_module() -> Vec<u8> {
    let mut types = TypeSection::new();
    types.ty().function(vec![ValType::I32], vec![ValType::I32]);
    types.ty().function(vec![ValType::I32, ValType::I32], vec![]);
    types.ty().function(vec![], vec![ValType::I32]);

    let mut funcs = FunctionSection::new();
    let mut code = CodeSection::new();

    let mut malloc = Function::new(vec![]);
    malloc.instruction(&Instruction::I32Const(16));
    malloc.instruction(&Instruction::I32Const(65530));
    malloc.instruction(&Instruction::LocalGet(0));
    malloc.instruction(&Instruction::I32Const(abi::RETURN_SLOT_SIZE as i32));
    malloc.instruction(&Instruction::I32Eq);
    malloc.instruction(&Instruction::Select);
    malloc.instruction(&Instruction::End);
    funcs.function(0);
    code.function(&malloc);

    let mut free = Function::new(vec![]);
    free.instruction(&Instruction::GlobalGet(0));
    free.instruction(&Instruction::I32Const(1));
    free.instruction(&Instruction::I32Add);
    free.instruction(&Instruction::GlobalSet(0));
    free.instruction(&Instruction::End);
    funcs.function(1);
    code.function(&free);

    let mut fill = Function::new(vec![]);
    fill.instruction(&Instruction::LocalGet(0));
    fill.instruction(&Instruction::LocalGet(1));
    fill.instruction(&Instruction::I32Store(word(0)));
    fill.instruction(&Instruction::LocalGet(0));
    fill.instruction(&Instruction::I32Const(4));
    fill.instruction(&Instruction::I32Store(word(4)));
    fill.instruction(&Instruction::End);
    funcs.function(1);
    code.function(&fill);

    let mut frees = Function::new(vec![]);
    frees.instruction(&Instruction::GlobalGet(0));
    frees.instruction(&Instruction::End);
    funcs.function(2);
    code.function(&frees);

    let mut memory = MemorySection::new();
    memory.memory(MemoryType {
        minimum: 1,
        maximum: Some(1),
        memory64: false,
        shared: false,
        page_size_log2: None,
    });

    let mut globals = GlobalSection::new();
    globals.global(
        GlobalType {
            val_type: ValType::I32,
            mutable: true,
            shared: false,
        },
        &ConstExpr::i32_const(0),
    );

    let mut exports = ExportSection::new();
    exports.export(abi::EXPORT_MEMORY, ExportKind::Memory, 0);
    exports.export(abi::EXPORT_MALLOC, ExportKind::Func, 0);
    exports.export(abi::EXPORT_FREE, ExportKind::Func, 1);
    exports.export("fill", ExportKind::Func, 2);
    exports.export("frees", ExportKind::Func, 3);

    let mut module = Module::new();
    module.section(&types);
    module.section(&funcs);
    module.section(&memory);
    module.section(&globals);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

fn frees(bridge: &mut Bridge) -> i32 {
    bridge.call::<(), i32>("frees", ()).unwrap()
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests: Instantiation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_bridge_starts_clean() {
    let (bridge, _) = bridge();
    assert_eq!(bridge.module_hash().len(), 64);
    assert_eq!(bridge.memory_len(), abi::WASM_PAGE_SIZE as usize);
    assert_eq!(bridge.heap().live(), 0);
    assert_eq!(bridge.heap().len(), abi::HEAP_RESERVED as usize);
    assert!(!bridge.is_poisoned());
}

#[test]
fn test_fingerprint_is_stable() {
    let (a, _) = bridge();
    let (b, _) = bridge();
    assert_eq!(a.module_hash(), b.module_hash());
}

#[test]
fn test_invalid_module_is_a_setup_error() {
    let err = Bridge::new(b"\0asm not really", Recorder::default()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Setup);
}

#[test]
fn test_invalid_config_is_rejected() {
    let wasm = emit_module().unwrap();
    let config = BridgeConfig {
        max_heap_slots: 4,
        ..BridgeConfig::default()
    };
    let err = Bridge::with_config(&wasm, Recorder::default(), config).unwrap_err();
    assert!(matches!(err, BridgeError::Config(_)));
}

#[test]
fn test_missing_export_is_reported() {
    let (mut bridge, _) = bridge();
    let err = bridge.check_exports(&[abi::PLAYERCORE_NEW, "nope"]).unwrap_err();
    assert!(matches!(err, BridgeError::MissingExport { ref name, .. } if name == "nope"));
    let err = bridge.call::<(), ()>("nope", ()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Setup);
    assert!(!bridge.is_poisoned());
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests: Strings
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_strings_survive_the_round_trip() {
    let (mut bridge, _) = bridge();
    for text in ["", "explorer", "naïve ☃ 🦀"] {
        let transfer = bridge.encode_str(text).unwrap();
        assert_eq!(transfer.len as usize, text.len());
        assert_eq!(bridge.decode_str(transfer.ptr, transfer.len).unwrap(), text);
        bridge.release(transfer).unwrap();
    }
    assert_eq!(malloc(&mut bridge, 1), HEAP_START as i32);
}

#[test]
fn test_with_strings_releases_in_reverse_order() {
    let (mut bridge, _) = bridge();
    let seen = bridge
        .with_strings(&["alpha", "beta"], |b, s| {
            assert_eq!(s.len(), 2);
            assert!(s[1].ptr > s[0].ptr);
            b.decode_str(s[1].ptr, s[1].len)
        })
        .unwrap();
    assert_eq!(seen, "beta");
    // Both buffers were handed back to the stack allocator.
    assert_eq!(malloc(&mut bridge, 1), HEAP_START as i32);
}

#[test]
fn test_with_strings_releases_on_failure() {
    let (mut bridge, _) = bridge();
    let err = bridge
        .with_strings(&["x"], |b, _| {
            b.call::<(i32, i32), i32>(abi::PLAYERCORE_TAKE_DAMAGE, (0, 1))
        })
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::ModuleThrow);
    assert_eq!(malloc(&mut bridge, 1), HEAP_START as i32);
}

#[test]
fn test_oversized_string_never_reaches_the_module() {
    let config = BridgeConfig {
        max_string_bytes: 4,
        ..BridgeConfig::default()
    };
    let (mut bridge, _) = bridge_with(config);
    let err = bridge.encode_str("hello").unwrap_err();
    assert!(matches!(err, BridgeError::Encoding { len: 5, limit: 4 }));
    assert!(!bridge.is_poisoned());
    assert_eq!(malloc(&mut bridge, 1), HEAP_START as i32);
}

#[test]
fn test_decode_out_of_bounds_is_a_decoding_error() {
    let (mut bridge, _) = bridge();
    let len = bridge.memory_len() as u32;
    let err = bridge.decode_str(len - 2, 4).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Decoding);
}

#[test]
fn test_memory_growth_rebuilds_the_view() {
    let (mut bridge, _) = bridge();
    let small = bridge.encode_str("before").unwrap();
    let epoch = bridge.view_epoch();

    let big = "r".repeat(200_000);
    let transfer = bridge.encode_str(&big).unwrap();
    assert!(bridge.memory_len() > abi::WASM_PAGE_SIZE as usize);
    assert!(bridge.view_epoch() > epoch);

    assert_eq!(bridge.decode_str(transfer.ptr, transfer.len).unwrap(), big);
    assert_eq!(bridge.decode_str(small.ptr, small.len).unwrap(), "before");
}

#[test]
fn test_memory_limit_turns_growth_into_a_throw() {
    let config = BridgeConfig {
        max_memory_bytes: Some(2 * abi::WASM_PAGE_SIZE as usize),
        ..BridgeConfig::default()
    };
    let (mut bridge, _) = bridge_with(config);
    let err = bridge.encode_str(&"r".repeat(200_000)).unwrap_err();
    assert!(matches!(err, BridgeError::ModuleThrow(ref msg) if msg == "out of memory"));
}

#[test]
fn test_string_return_is_decoded_and_freed() {
    let (mut bridge, _) = bridge();
    let canvas: Rc<dyn DisplaySurface> = Rc::new(Canvas::default());
    let display = bridge.add_object(HostValue::display(canvas)).unwrap();
    let player = new_player(&mut bridge, "explorer", display);

    let mark = malloc(&mut bridge, 8);
    bridge
        .call::<(i32, i32), ()>(abi::EXPORT_FREE, (mark, 8))
        .unwrap();

    let name = bridge
        .call_returning_string(abi::PLAYERCORE_NAME, player)
        .unwrap();
    assert_eq!(name, "explorer");
    // Name copy and return slot were both reclaimed.
    assert_eq!(malloc(&mut bridge, 8), mark);
}

#[test]
fn test_released_buffer_is_handed_out_again() {
    let (mut bridge, _) = bridge();
    let old = bridge.encode_str("abc").unwrap();
    let old_ptr = old.ptr;
    bridge.release(old).unwrap();

    let live = bridge.encode_str("xyz").unwrap();
    assert_eq!(live.ptr, old_ptr);
    let other = bridge.encode_str("QQQ").unwrap();
    assert_ne!(other.ptr, live.ptr);
    assert_eq!(bridge.decode_str(live.ptr, live.len).unwrap(), "xyz");
    bridge.release(other).unwrap();
    bridge.release(live).unwrap();
}

#[test]
fn test_failed_write_releases_the_allocation() {
    let mut bridge = Bridge::new(&cramped_module(), Recorder::default()).unwrap();
    let err = bridge.encode_str("hello world").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Decoding);
    assert_eq!(frees(&mut bridge), 1);
}

#[test]
fn test_undecodable_return_releases_string_and_slot() {
    let mut bridge = Bridge::new(&cramped_module(), Recorder::default()).unwrap();
    let err = bridge.call_returning_string("fill", 70_000).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Decoding);
    assert_eq!(frees(&mut bridge), 2);
    assert!(!bridge.is_poisoned());
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests: Heap traffic through imports
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_display_is_borrowed_then_dropped_by_destructor() {
    let (mut bridge, _) = bridge();
    let canvas = Rc::new(Canvas::default());
    let display = bridge
        .add_object(HostValue::display(canvas.clone()))
        .unwrap();
    let player = new_player(&mut bridge, "p", display);

    bridge.call::<i32, ()>(abi::PLAYERCORE_DRAW, player).unwrap();
    bridge.call::<i32, ()>(abi::PLAYERCORE_DRAW, player).unwrap();
    assert_eq!(
        canvas.draws.borrow()[0],
        (5, 5, "@".to_string(), Some("#ff0".to_string()))
    );
    assert_eq!(canvas.draws.borrow().len(), 2);
    assert_eq!(bridge.heap().live(), 1);

    bridge.call::<i32, ()>(abi::PLAYERCORE_FREE, player).unwrap();
    assert_eq!(bridge.heap().live(), 0);
    assert!(bridge.heap().borrow(display).is_err());
}

#[test]
fn test_stats_object_is_taken_by_host() {
    let (mut bridge, _) = bridge();
    let player = new_player(&mut bridge, "p", HeapRef::NULL);
    let obj = bridge.call::<i32, i32>(abi::PLAYERCORE_STATS, player).unwrap();
    let stats = bridge.take_object(HeapRef::from_abi(obj)).unwrap();
    assert_eq!(
        stats.into_json(),
        Some(json!({"hitpoints": 100, "max_hitpoints": 100, "moves": 0}))
    );
    assert_eq!(bridge.heap().live(), 0);
}

#[test]
fn test_emit_stats_reaches_handler() {
    let (mut bridge, recorder) = bridge();
    let player = new_player(&mut bridge, "p", HeapRef::NULL);
    bridge
        .call::<(i32, i32), i32>(abi::PLAYERCORE_TAKE_DAMAGE, (player, 25))
        .unwrap();
    bridge.call::<i32, ()>(abi::PLAYERCORE_EMIT_STATS, player).unwrap();

    let recorded = recorder.0.borrow();
    assert_eq!(recorded.stats.len(), 1);
    assert_eq!(recorded.stats[0]["hitpoints"], 75);
    assert_eq!(bridge.heap().live(), 0);
}

#[test]
fn test_log_and_alert_reach_handler() {
    let (mut bridge, recorder) = bridge();
    let engine = bridge
        .call::<i32, i32>(abi::ENGINE_NEW, HeapRef::NULL.to_abi())
        .unwrap();
    let player = new_player(&mut bridge, "p", HeapRef::NULL);
    bridge
        .call::<(i32, i32, i32, i32), ()>(abi::ENGINE_OPEN_BOX, (engine, player, 3, 3))
        .unwrap();

    let recorded = recorder.0.borrow();
    assert_eq!(recorded.logs, vec!["engine ready".to_string()]);
    assert_eq!(recorded.alerts, vec!["There's no box here.".to_string()]);
}

#[test]
fn test_bad_heap_reference_from_module_is_a_boundary_fault() {
    let (mut bridge, _) = bridge();
    let player = new_player(&mut bridge, "p", HeapRef::from_abi(999));
    let err = bridge.call::<i32, ()>(abi::PLAYERCORE_DRAW, player).unwrap_err();
    assert_eq!(
        err.as_boundary(),
        Some(&BoundaryViolation::HeapIndexOutOfRange(999))
    );
    assert!(bridge.is_poisoned());
}

#[test]
fn test_drawing_on_a_non_display_is_rejected() {
    let (mut bridge, _) = bridge();
    let not_a_display = bridge.add_object(HostValue::Json(json!(1))).unwrap();
    let player = new_player(&mut bridge, "p", not_a_display);
    let err = bridge.call::<i32, ()>(abi::PLAYERCORE_DRAW, player).unwrap_err();
    assert!(matches!(
        err.as_boundary(),
        Some(BoundaryViolation::UnexpectedHeapValue {
            expected: "display",
            found: "json",
            ..
        })
    ));
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests: Throw channel
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_throw_carries_the_module_message() {
    let (mut bridge, _) = bridge();
    let player = new_player(&mut bridge, "p", HeapRef::NULL);
    let err = bridge
        .call::<(i32, i32), i32>(abi::PLAYERCORE_TAKE_DAMAGE, (player, -5))
        .unwrap_err();
    assert!(matches!(err, BridgeError::ModuleThrow(ref msg) if msg == "damage must be non-negative"));
    assert_eq!(err.category(), ErrorCategory::ModuleThrow);
    assert!(bridge.is_poisoned());

    // The instance is still callable; the next fault is not confused with
    // the previous one.
    assert_eq!(
        bridge.call::<i32, i32>(abi::PLAYERCORE_HITPOINTS, player).unwrap(),
        100
    );
}

#[test]
fn test_plain_trap_is_not_a_throw() {
    let (mut bridge, _) = bridge();
    let err = bridge
        .call::<i32, i32>(abi::PLAYERCORE_X, 0x7fff_fff0)
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Trap);
}
