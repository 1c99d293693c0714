//! Generational object heap.
//!
//! Host values cannot cross into linear memory, so the module refers to them
//! by [`HeapRef`].  The heap is an append-only vector of slots: the first
//! [`abi::HEAP_RESERVED`] slots hold sentinels and are never released, every
//! other slot is either occupied or on an intrusive free list.
//!
//! Each slot carries a generation that advances on release.  A reference
//! whose generation no longer matches its slot is reported as stale instead
//! of silently aliasing whatever now lives there.

use rogue_types::abi;
use tracing::trace;

use crate::error::BoundaryViolation;
use crate::value::HostValue;

/// Reference to a heap slot as seen by the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapRef(u32);

impl HeapRef {
    pub const UNDEFINED: HeapRef = HeapRef(abi::HEAP_UNDEFINED);
    pub const NULL: HeapRef = HeapRef(abi::HEAP_NULL);
    pub const TRUE: HeapRef = HeapRef(abi::HEAP_TRUE);
    pub const FALSE: HeapRef = HeapRef(abi::HEAP_FALSE);

    fn new(index: u32, generation: u32) -> Self {
        Self((generation << abi::HEAP_INDEX_BITS) | index)
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::TRUE
        } else {
            Self::FALSE
        }
    }

    /// Reinterpret an `i32` received from the module.
    pub fn from_abi(raw: i32) -> Self {
        Self(raw as u32)
    }

    pub fn to_abi(self) -> i32 {
        self.0 as i32
    }

    pub fn index(self) -> u32 {
        self.0 & abi::HEAP_MAX_INDEX
    }

    pub fn generation(self) -> u32 {
        self.0 >> abi::HEAP_INDEX_BITS
    }

    pub fn is_reserved(self) -> bool {
        self.index() < abi::HEAP_RESERVED
    }
}

fn next_generation(generation: u32) -> u32 {
    if generation >= abi::HEAP_MAX_GENERATION {
        1
    } else {
        generation + 1
    }
}

#[derive(Debug)]
enum Slot {
    Reserved(HostValue),
    Occupied { generation: u32, value: HostValue },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// Slot table mapping [`HeapRef`]s to host values.
#[derive(Debug)]
pub struct ObjectHeap {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    live: usize,
    max_slots: u32,
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new(abi::HEAP_MAX_INDEX + 1, 0)
    }
}

impl ObjectHeap {
    /// Create a heap holding at most `max_slots` slots, sentinels included.
    pub fn new(max_slots: u32, capacity_hint: usize) -> Self {
        let reserved = abi::HEAP_RESERVED as usize;
        let mut slots = Vec::with_capacity(reserved + capacity_hint);
        for index in 0..abi::HEAP_RESERVED {
            let value = match index {
                abi::HEAP_NULL => HostValue::Null,
                abi::HEAP_TRUE => HostValue::Bool(true),
                abi::HEAP_FALSE => HostValue::Bool(false),
                _ => HostValue::Undefined,
            };
            slots.push(Slot::Reserved(value));
        }
        Self {
            slots,
            free_head: None,
            live: 0,
            max_slots: max_slots.min(abi::HEAP_MAX_INDEX + 1),
        }
    }

    /// Store `value` and return a fresh reference to it.
    pub fn add(&mut self, value: HostValue) -> Result<HeapRef, BoundaryViolation> {
        let kind = value.kind();
        let heap_ref = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let Slot::Vacant {
                    generation,
                    next_free,
                } = *slot
                else {
                    return Err(BoundaryViolation::VacantHeapSlot { index });
                };
                *slot = Slot::Occupied { generation, value };
                self.free_head = next_free;
                HeapRef::new(index, generation)
            }
            None => {
                let index = self.slots.len() as u32;
                if index >= self.max_slots {
                    return Err(BoundaryViolation::HeapExhausted(self.max_slots));
                }
                self.slots.push(Slot::Occupied {
                    generation: 1,
                    value,
                });
                HeapRef::new(index, 1)
            }
        };
        self.live += 1;
        trace!(index = heap_ref.index(), generation = heap_ref.generation(), kind, "heap add");
        Ok(heap_ref)
    }

    /// Look up a value without releasing it.
    pub fn borrow(&self, heap_ref: HeapRef) -> Result<&HostValue, BoundaryViolation> {
        let index = heap_ref.index();
        match self.slots.get(index as usize) {
            None => Err(BoundaryViolation::HeapIndexOutOfRange(index)),
            Some(Slot::Reserved(value)) if heap_ref.generation() == 0 => Ok(value),
            Some(Slot::Reserved(_)) => Err(BoundaryViolation::StaleHeapRef {
                index,
                found: heap_ref.generation(),
                current: 0,
            }),
            Some(Slot::Vacant { .. }) => Err(BoundaryViolation::VacantHeapSlot { index }),
            Some(Slot::Occupied { generation, value }) => {
                if *generation == heap_ref.generation() {
                    Ok(value)
                } else {
                    Err(BoundaryViolation::StaleHeapRef {
                        index,
                        found: heap_ref.generation(),
                        current: *generation,
                    })
                }
            }
        }
    }

    /// Return the value and release its slot.  Reserved slots are never
    /// released; taking one yields a copy of the sentinel.
    pub fn take(&mut self, heap_ref: HeapRef) -> Result<HostValue, BoundaryViolation> {
        if heap_ref.is_reserved() {
            let value = self.borrow(heap_ref)?.clone();
            trace!(index = heap_ref.index(), "take of reserved slot ignored");
            return Ok(value);
        }
        self.borrow(heap_ref)?;

        let index = heap_ref.index();
        let slot = &mut self.slots[index as usize];
        let vacant = Slot::Vacant {
            generation: next_generation(heap_ref.generation()),
            next_free: self.free_head,
        };
        let Slot::Occupied { value, .. } = std::mem::replace(slot, vacant) else {
            return Err(BoundaryViolation::VacantHeapSlot { index });
        };
        self.free_head = Some(index);
        self.live -= 1;
        trace!(index, "heap take");
        Ok(value)
    }

    /// Release a slot without returning its value.
    pub fn drop(&mut self, heap_ref: HeapRef) -> Result<(), BoundaryViolation> {
        self.take(heap_ref).map(|_| ())
    }

    /// Number of occupied, non-reserved slots.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Total number of slots, sentinels and vacant slots included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn free_slots(&self) -> usize {
        self.slots.len() - abi::HEAP_RESERVED as usize - self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn heap() -> ObjectHeap {
        ObjectHeap::new(1024, 8)
    }

    #[test]
    fn first_add_lands_after_reserved_slots() {
        let mut heap = heap();
        let r = heap.add(HostValue::Json(json!(1))).unwrap();
        assert_eq!(r.index(), abi::HEAP_RESERVED);
        assert_eq!(r.generation(), 1);
        assert!(r.to_abi() > 0);
    }

    #[test]
    fn add_then_take_returns_value_and_reuses_index() {
        let mut heap = heap();
        let r = heap.add(HostValue::Json(json!({"hp": 3}))).unwrap();
        let value = heap.take(r).unwrap();
        assert_eq!(value.into_json(), Some(json!({"hp": 3})));
        assert_eq!(heap.live(), 0);
        assert_eq!(heap.free_slots(), 1);

        let again = heap.add(HostValue::Bool(true)).unwrap();
        assert_eq!(again.index(), r.index());
        assert_ne!(again, r);
        assert_eq!(heap.free_slots(), 0);
    }

    #[test]
    fn reserved_slots_are_never_released() {
        let mut heap = heap();
        for _ in 0..3 {
            assert!(matches!(heap.take(HeapRef::NULL).unwrap(), HostValue::Null));
            heap.drop(HeapRef::TRUE).unwrap();
            assert!(matches!(heap.borrow(HeapRef::TRUE).unwrap(), HostValue::Bool(true)));
            assert!(matches!(
                heap.borrow(HeapRef::UNDEFINED).unwrap(),
                HostValue::Undefined
            ));
        }
        heap.drop(HeapRef::from_abi(0)).unwrap();
        assert_eq!(heap.free_slots(), 0);
        let r = heap.add(HostValue::Null).unwrap();
        assert_eq!(r.index(), abi::HEAP_RESERVED);
    }

    #[test]
    fn stale_reference_is_detected() {
        let mut heap = heap();
        let old = heap.add(HostValue::Json(json!("a"))).unwrap();
        heap.drop(old).unwrap();
        assert_eq!(
            heap.borrow(old).unwrap_err(),
            BoundaryViolation::VacantHeapSlot { index: old.index() }
        );

        let new = heap.add(HostValue::Json(json!("b"))).unwrap();
        assert_eq!(
            heap.take(old).unwrap_err(),
            BoundaryViolation::StaleHeapRef {
                index: old.index(),
                found: 1,
                current: 2,
            }
        );
        assert_eq!(heap.borrow(new).unwrap().kind(), "json");
    }

    #[test]
    fn sentinel_with_a_generation_is_rejected() {
        let mut heap = heap();
        let forged = HeapRef::from_abi((5 << abi::HEAP_INDEX_BITS) | abi::HEAP_TRUE as i32);
        assert!(forged.is_reserved());
        let expected = BoundaryViolation::StaleHeapRef {
            index: abi::HEAP_TRUE,
            found: 5,
            current: 0,
        };
        assert_eq!(heap.take(forged).unwrap_err(), expected);
        assert_eq!(heap.borrow(forged).unwrap_err(), expected);
        assert!(matches!(heap.borrow(HeapRef::TRUE).unwrap(), HostValue::Bool(true)));
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let heap = heap();
        let bogus = HeapRef::from_abi(500);
        assert_eq!(
            heap.borrow(bogus).unwrap_err(),
            BoundaryViolation::HeapIndexOutOfRange(500)
        );
    }

    #[test]
    fn free_list_is_lifo() {
        let mut heap = heap();
        let refs: Vec<_> = (0..4)
            .map(|i| heap.add(HostValue::Json(json!(i))).unwrap())
            .collect();
        heap.drop(refs[1]).unwrap();
        heap.drop(refs[3]).unwrap();
        assert_eq!(heap.add(HostValue::Null).unwrap().index(), refs[3].index());
        assert_eq!(heap.add(HostValue::Null).unwrap().index(), refs[1].index());
        assert_eq!(heap.len(), abi::HEAP_RESERVED as usize + 4);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut heap = ObjectHeap::new(abi::HEAP_RESERVED + 2, 0);
        heap.add(HostValue::Null).unwrap();
        let r = heap.add(HostValue::Null).unwrap();
        assert_eq!(
            heap.add(HostValue::Null).unwrap_err(),
            BoundaryViolation::HeapExhausted(abi::HEAP_RESERVED + 2)
        );
        heap.drop(r).unwrap();
        heap.add(HostValue::Null).unwrap();
    }

    #[test]
    fn generation_wraps_without_touching_sign_bit() {
        assert_eq!(next_generation(abi::HEAP_MAX_GENERATION), 1);
        let r = HeapRef::new(abi::HEAP_MAX_INDEX, abi::HEAP_MAX_GENERATION);
        assert!(r.to_abi() > 0);
        assert_eq!(HeapRef::from_abi(r.to_abi()), r);
        assert!(!r.is_reserved());
        assert!(HeapRef::from_bool(false).is_reserved());
    }
}
