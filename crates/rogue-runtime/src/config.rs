//! Bridge configuration.

use rogue_types::abi;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Limits applied to one bridge instance.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```json
/// { "max_string_bytes": 4096, "max_memory_bytes": 1048576 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Longest host string `encode` accepts, in bytes.
    pub max_string_bytes: u32,
    /// Maximum number of heap slots, reserved sentinels included.
    pub max_heap_slots: u32,
    /// Slots to pre-allocate in the heap vector.
    pub heap_capacity_hint: usize,
    /// Upper bound on linear memory; growth past it is refused.
    pub max_memory_bytes: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_string_bytes: 1 << 20,
            max_heap_slots: 1 << 16,
            heap_capacity_hint: 128,
            max_memory_bytes: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_heap_slots <= abi::HEAP_RESERVED {
            return Err(BridgeError::Config(format!(
                "max_heap_slots must exceed the {} reserved slots",
                abi::HEAP_RESERVED
            )));
        }
        if self.max_heap_slots > abi::HEAP_MAX_INDEX + 1 {
            return Err(BridgeError::Config(format!(
                "max_heap_slots cannot exceed {}",
                abi::HEAP_MAX_INDEX + 1
            )));
        }
        if self.max_string_bytes > i32::MAX as u32 {
            return Err(BridgeError::Config(
                "max_string_bytes must fit a 32-bit signed length".to_string(),
            ));
        }
        if let Some(limit) = self.max_memory_bytes {
            if limit < abi::WASM_PAGE_SIZE as usize {
                return Err(BridgeError::Config(
                    "max_memory_bytes must allow at least one page".to_string(),
                ));
            }
        }
        Ok(())
    }
}
