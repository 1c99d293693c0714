//! One module instance and the host state around it.

use rogue_types::abi;
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};
use wasmi::{
    Engine, Instance, Linker, Memory, Module, Store, StoreLimits, StoreLimitsBuilder, WasmParams,
    WasmResults,
};

use crate::codec::{self, StringTransfer};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::heap::{HeapRef, ObjectHeap};
use crate::imports;
use crate::memory::MemoryViewCache;
use crate::value::{HostHandlers, HostValue};

/// Store data shared by the bridge and its imports.
pub(crate) struct HostState {
    pub(crate) heap: ObjectHeap,
    pub(crate) views: MemoryViewCache,
    pub(crate) handlers: Box<dyn HostHandlers>,
    /// Structured error recorded by an import before it trapped.
    pub(crate) pending_fault: Option<BridgeError>,
    limits: StoreLimits,
}

/// A linked, started module instance.
///
/// All module traffic goes through `&mut Bridge`, so at most one call is in
/// flight at a time.
pub struct Bridge {
    store: Store<HostState>,
    instance: Instance,
    memory: Memory,
    config: BridgeConfig,
    module_hash: String,
    poisoned: bool,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("module_hash", &self.module_hash)
            .field("config", &self.config)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

fn fingerprint(wasm: &[u8]) -> String {
    format!("{:x}", Sha256::digest(wasm))
}

/// Keep the primary error; a cleanup failure only surfaces when the work
/// itself succeeded.
fn settle<T>(result: Result<T>, cleanup: Result<()>) -> Result<T> {
    match (result, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            warn!(error = %cleanup_err, "cleanup after failed call also failed");
            Err(err)
        }
    }
}

impl Bridge {
    /// Instantiate `wasm` with the default configuration.
    pub fn new(wasm: &[u8], handlers: impl HostHandlers + 'static) -> Result<Self> {
        Self::with_config(wasm, handlers, BridgeConfig::default())
    }

    pub fn with_config(
        wasm: &[u8],
        handlers: impl HostHandlers + 'static,
        config: BridgeConfig,
    ) -> Result<Self> {
        config.validate()?;
        let module_hash = fingerprint(wasm);

        let engine = Engine::default();
        let module =
            Module::new(&engine, wasm).map_err(|e| BridgeError::Instantiate(e.to_string()))?;

        let mut limits = StoreLimitsBuilder::new();
        if let Some(bytes) = config.max_memory_bytes {
            limits = limits.memory_size(bytes);
        }
        let state = HostState {
            heap: ObjectHeap::new(config.max_heap_slots, config.heap_capacity_hint),
            views: MemoryViewCache::new(),
            handlers: Box::new(handlers),
            pending_fault: None,
            limits: limits.build(),
        };
        let mut store = Store::new(&engine, state);
        store.limiter(|state| &mut state.limits);

        let mut linker = Linker::<HostState>::new(&engine);
        imports::link(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(|e| BridgeError::Instantiate(e.to_string()))?;

        let memory = instance
            .get_memory(&store, abi::EXPORT_MEMORY)
            .ok_or_else(|| BridgeError::MissingExport {
                name: abi::EXPORT_MEMORY.to_string(),
                reason: "module does not export its linear memory".to_string(),
            })?;

        let bridge = Self {
            store,
            instance,
            memory,
            config,
            module_hash,
            poisoned: false,
        };
        bridge.check_exports(&[abi::EXPORT_MALLOC, abi::EXPORT_FREE])?;
        debug!(
            module_hash = %bridge.module_hash,
            memory_len = bridge.memory_len(),
            "module instantiated"
        );
        Ok(bridge)
    }

    /// Hex SHA-256 of the module bytes.
    pub fn module_hash(&self) -> &str {
        &self.module_hash
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// True once any call has failed.  Handles touched by the failed call
    /// may refer to half-updated module state.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Fail with [`BridgeError::MissingExport`] for the first absent name.
    pub fn check_exports(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if self.instance.get_export(&self.store, name).is_none() {
                return Err(BridgeError::MissingExport {
                    name: (*name).to_string(),
                    reason: "not exported".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Call a typed export.
    ///
    /// A fault recorded by an import during the call (a `throw`, a bad heap
    /// reference, undecodable bytes) is returned as is; any other failure is
    /// a [`BridgeError::Trap`].
    pub fn call<P, R>(&mut self, export: &str, params: P) -> Result<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self
            .instance
            .get_typed_func::<P, R>(&self.store, export)
            .map_err(|e| BridgeError::MissingExport {
                name: export.to_string(),
                reason: e.to_string(),
            })?;

        self.store.data_mut().pending_fault = None;
        trace!(export, "call");
        match func.call(&mut self.store, params) {
            Ok(results) => Ok(results),
            Err(err) => {
                self.poisoned = true;
                let fault = self
                    .store
                    .data_mut()
                    .pending_fault
                    .take()
                    .unwrap_or_else(|| BridgeError::Trap(err.to_string()));
                warn!(export, category = ?fault.category(), error = %fault, "call aborted");
                Err(fault)
            }
        }
    }

    /// Number of module objects constructed and not yet freed.
    pub fn live_objects(&mut self) -> Result<i32> {
        self.call::<(), i32>(abi::EXPORT_LIVE_OBJECTS, ())
    }

    // ── Strings ─────────────────────────────────────────────────────────────

    /// Copy `text` into a fresh module allocation.  Oversized input is
    /// rejected before the module is called.
    pub fn encode_str(&mut self, text: &str) -> Result<StringTransfer> {
        let len = codec::checked_len(text, self.config.max_string_bytes)?;
        let ptr = self.call::<i32, i32>(abi::EXPORT_MALLOC, len as i32)?;
        let (data, state) = self.memory.data_and_store_mut(&mut self.store);
        let mut view = state.views.view_mut(data);
        let written = codec::write_str(&mut view, ptr as u32, text);
        if written.is_err() {
            let lost = StringTransfer { ptr: ptr as u32, len };
            return settle(written, self.release(lost));
        }
        written
    }

    /// Return a string buffer to the module allocator.  The transfer is
    /// consumed, so a released buffer cannot be released twice.
    ///
    /// ```compile_fail
    /// # fn twice(bridge: &mut rogue_runtime::Bridge) -> rogue_runtime::Result<()> {
    /// let transfer = bridge.encode_str("abc")?;
    /// bridge.release(transfer)?;
    /// bridge.release(transfer)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn release(&mut self, transfer: StringTransfer) -> Result<()> {
        self.call::<(i32, i32), ()>(
            abi::EXPORT_FREE,
            (transfer.ptr as i32, transfer.byte_len() as i32),
        )
    }

    pub fn decode_str(&mut self, ptr: u32, len: u32) -> Result<String> {
        let (data, state) = self.memory.data_and_store_mut(&mut self.store);
        let view = state.views.view(data);
        Ok(codec::decode(&view, ptr, len)?.into_owned())
    }

    /// Encode `texts`, run `f` with the transfers, then release every buffer
    /// in reverse order whether or not `f` succeeded.
    pub fn with_strings<T>(
        &mut self,
        texts: &[&str],
        f: impl FnOnce(&mut Self, &[StringTransfer]) -> Result<T>,
    ) -> Result<T> {
        let mut transfers = Vec::with_capacity(texts.len());
        for text in texts {
            match self.encode_str(text) {
                Ok(transfer) => transfers.push(transfer),
                Err(err) => return settle(Err(err), self.release_all(transfers)),
            }
        }

        let result = f(self, &transfers);
        settle(result, self.release_all(transfers))
    }

    fn release_all(&mut self, transfers: Vec<StringTransfer>) -> Result<()> {
        let mut first_err = None;
        for transfer in transfers.into_iter().rev() {
            let (ptr, len) = (transfer.ptr, transfer.len);
            if let Err(err) = self.release(transfer) {
                warn!(ptr, len, error = %err, "release failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Decode a string the module allocated for the host, then free it.
    /// The buffer is released even when decoding fails.
    pub fn take_string(&mut self, transfer: StringTransfer) -> Result<String> {
        let text = self.decode_str(transfer.ptr, transfer.len);
        settle(text, self.release(transfer))
    }

    /// Call `export(ret_slot, receiver)`, which writes a `(ptr, len)` pair
    /// into an 8-byte slot, and take the string it describes.
    pub fn call_returning_string(&mut self, export: &str, receiver: i32) -> Result<String> {
        let slot = self.call::<i32, i32>(abi::EXPORT_MALLOC, abi::RETURN_SLOT_SIZE as i32)?;
        let slot_alloc = StringTransfer {
            ptr: slot as u32,
            len: abi::RETURN_SLOT_SIZE,
        };
        let text = self
            .call::<(i32, i32), ()>(export, (slot, receiver))
            .and_then(|()| {
                let (data, state) = self.memory.data_and_store_mut(&mut self.store);
                codec::read_return_slot(&state.views.view(data), slot as u32)
            })
            .and_then(|transfer| self.take_string(transfer));
        settle(text, self.release(slot_alloc))
    }

    // ── Object heap ─────────────────────────────────────────────────────────

    pub fn add_object(&mut self, value: HostValue) -> Result<HeapRef> {
        Ok(self.store.data_mut().heap.add(value)?)
    }

    pub fn take_object(&mut self, heap_ref: HeapRef) -> Result<HostValue> {
        Ok(self.store.data_mut().heap.take(heap_ref)?)
    }

    pub fn drop_object(&mut self, heap_ref: HeapRef) -> Result<()> {
        Ok(self.store.data_mut().heap.drop(heap_ref)?)
    }

    pub fn heap(&self) -> &ObjectHeap {
        &self.store.data().heap
    }

    // ── Memory ──────────────────────────────────────────────────────────────

    /// Current size of linear memory in bytes.
    pub fn memory_len(&self) -> usize {
        self.memory.data(&self.store).len()
    }

    /// How many times the memory view has been rebuilt.
    pub fn view_epoch(&self) -> u64 {
        self.store.data().views.epoch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_lowercase_sha256_hex() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn cleanup_failure_never_masks_the_primary_error() {
        let primary = settle::<()>(
            Err(BridgeError::Trap("call".into())),
            Err(BridgeError::Trap("free".into())),
        );
        assert!(matches!(primary, Err(BridgeError::Trap(ref msg)) if msg == "call"));
        let cleanup = settle(Ok(1), Err(BridgeError::Trap("free".into())));
        assert!(matches!(cleanup, Err(BridgeError::Trap(ref msg)) if msg == "free"));
        assert_eq!(settle(Ok(1), Ok(())).unwrap(), 1);
    }
}
