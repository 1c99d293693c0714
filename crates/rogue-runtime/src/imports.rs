//! Host functions linked into the module's `env` namespace.
//!
//! Imports never let a failure escape as a bare trap.  The structured error is
//! parked in [`HostState::pending_fault`] and the import returns a
//! `wasmi::Error`; [`Bridge::call`](crate::Bridge::call) picks the parked
//! error back up once the export unwinds.

use std::rc::Rc;

use rogue_types::abi;
use tracing::trace;
use wasmi::{Caller, Extern, Linker};

use crate::bridge::HostState;
use crate::codec;
use crate::error::{BoundaryViolation, BridgeError, Result};
use crate::heap::HeapRef;
use crate::value::{DisplaySurface, HostValue};

type ImportResult<T> = std::result::Result<T, wasmi::Error>;

/// Park `err` as the store's pending fault and produce the trap that unwinds
/// the module.  The first fault of a call wins.
fn fault(caller: &mut Caller<'_, HostState>, err: BridgeError) -> wasmi::Error {
    let message = err.to_string();
    let state = caller.data_mut();
    if state.pending_fault.is_none() {
        state.pending_fault = Some(err);
    }
    wasmi::Error::new(message)
}

fn guard<T>(caller: &mut Caller<'_, HostState>, result: Result<T>) -> ImportResult<T> {
    result.map_err(|err| fault(caller, err))
}

fn read_string(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> Result<String> {
    let memory = caller
        .get_export(abi::EXPORT_MEMORY)
        .and_then(Extern::into_memory)
        .ok_or_else(|| BridgeError::MissingExport {
            name: abi::EXPORT_MEMORY.to_string(),
            reason: "not exported by the calling instance".to_string(),
        })?;
    let (data, state) = memory.data_and_store_mut(&mut *caller);
    let view = state.views.view(data);
    Ok(codec::decode(&view, ptr as u32, len as u32)?.into_owned())
}

fn expect_display(caller: &Caller<'_, HostState>, obj: i32) -> Result<Rc<dyn DisplaySurface>> {
    let heap_ref = HeapRef::from_abi(obj);
    let value = caller.data().heap.borrow(heap_ref)?;
    value.as_display().cloned().ok_or_else(|| {
        BridgeError::from(BoundaryViolation::UnexpectedHeapValue {
            index: heap_ref.index(),
            expected: "display",
            found: value.kind(),
        })
    })
}

fn link_err(err: impl std::fmt::Display) -> BridgeError {
    BridgeError::Link(err.to_string())
}

/// Register every import the module may reference.
pub(crate) fn link(linker: &mut Linker<HostState>) -> Result<()> {
    let env = abi::IMPORT_MODULE;

    linker
        .func_wrap(
            env,
            abi::IMPORT_ALERT,
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> ImportResult<()> {
                let message = read_string(&mut caller, ptr, len);
                let message = guard(&mut caller, message)?;
                caller.data_mut().handlers.alert(&message);
                Ok(())
            },
        )
        .map_err(link_err)?;

    linker
        .func_wrap(
            env,
            abi::IMPORT_LOG,
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> ImportResult<()> {
                let message = read_string(&mut caller, ptr, len);
                let message = guard(&mut caller, message)?;
                caller.data_mut().handlers.log(&message);
                Ok(())
            },
        )
        .map_err(link_err)?;

    linker
        .func_wrap(
            env,
            abi::IMPORT_STATS_UPDATED,
            |mut caller: Caller<'_, HostState>, obj: i32| -> ImportResult<()> {
                let heap_ref = HeapRef::from_abi(obj);
                let taken = caller
                    .data_mut()
                    .heap
                    .take(heap_ref)
                    .map_err(BridgeError::from)
                    .and_then(|value| {
                        let found = value.kind();
                        value.into_json().ok_or_else(|| {
                            BridgeError::from(BoundaryViolation::UnexpectedHeapValue {
                                index: heap_ref.index(),
                                expected: "json",
                                found,
                            })
                        })
                    });
                let stats = guard(&mut caller, taken)?;
                caller.data_mut().handlers.stats_updated(stats);
                Ok(())
            },
        )
        .map_err(link_err)?;

    linker
        .func_wrap(
            env,
            abi::IMPORT_DISPLAY_DRAW,
            |mut caller: Caller<'_, HostState>,
             obj: i32,
             x: i32,
             y: i32,
             ptr: i32,
             len: i32|
             -> ImportResult<()> {
                let glyph = read_string(&mut caller, ptr, len);
                let glyph = guard(&mut caller, glyph)?;
                let display = expect_display(&caller, obj);
                let display = guard(&mut caller, display)?;
                display.draw(x, y, &glyph, None);
                Ok(())
            },
        )
        .map_err(link_err)?;

    linker
        .func_wrap(
            env,
            abi::IMPORT_DISPLAY_DRAW_COLOR,
            |mut caller: Caller<'_, HostState>,
             obj: i32,
             x: i32,
             y: i32,
             ptr: i32,
             len: i32,
             color_ptr: i32,
             color_len: i32|
             -> ImportResult<()> {
                let glyph = read_string(&mut caller, ptr, len);
                let glyph = guard(&mut caller, glyph)?;
                let color = read_string(&mut caller, color_ptr, color_len);
                let color = guard(&mut caller, color)?;
                let display = expect_display(&caller, obj);
                let display = guard(&mut caller, display)?;
                display.draw(x, y, &glyph, Some(&color));
                Ok(())
            },
        )
        .map_err(link_err)?;

    linker
        .func_wrap(
            env,
            abi::IMPORT_JSON_PARSE,
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> ImportResult<i32> {
                let text = read_string(&mut caller, ptr, len);
                let text = guard(&mut caller, text)?;
                let added = serde_json::from_str::<serde_json::Value>(&text)
                    .map_err(BridgeError::from)
                    .and_then(|value| {
                        Ok(caller.data_mut().heap.add(HostValue::Json(value))?)
                    });
                let heap_ref = guard(&mut caller, added)?;
                Ok(heap_ref.to_abi())
            },
        )
        .map_err(link_err)?;

    linker
        .func_wrap(
            env,
            abi::IMPORT_OBJECT_DROP_REF,
            |mut caller: Caller<'_, HostState>, obj: i32| -> ImportResult<()> {
                let dropped = caller
                    .data_mut()
                    .heap
                    .drop(HeapRef::from_abi(obj))
                    .map_err(BridgeError::from);
                guard(&mut caller, dropped)
            },
        )
        .map_err(link_err)?;

    linker
        .func_wrap(
            env,
            abi::IMPORT_THROW,
            |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> ImportResult<()> {
                let message = match read_string(&mut caller, ptr, len) {
                    Ok(message) => message,
                    Err(err) => format!("<undecodable message: {err}>"),
                };
                trace!(%message, "module threw");
                Err(fault(&mut caller, BridgeError::ModuleThrow(message)))
            },
        )
        .map_err(link_err)?;

    Ok(())
}
