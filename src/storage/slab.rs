// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size item slot pool (C1).
//!
//! A contiguous array of `N` slots, `N` fixed at construction. The pool
//! is the sole owner of item storage; every reference elsewhere is a
//! [`SlotHandle`] — a slot index plus a generation counter — valid only
//! while the slot remains occupied with the generation it was issued
//! under. The generation bumps on every clear, so a handle captured
//! before an eviction or delete fails loudly instead of silently
//! observing a different key's data.

use crate::value::Value;

/// A single fixed-footprint storage cell.
#[derive(Clone, Debug)]
struct Slot {
    occupied: bool,
    generation: u32,
    key: Vec<u8>,
    value: Value,
    flags: u32,
    expiry: u64,
    cas: u64,
}

impl Slot {
    fn empty() -> Self {
        Self {
            occupied: false,
            generation: 0,
            key: Vec::new(),
            value: Value::Str(Vec::new()),
            flags: 0,
            expiry: 0,
            cas: 0,
        }
    }
}

/// Opaque reference to a slot, returned by lookup/insert and consumed by
/// update. Carries the generation the slot had when the handle was
/// issued; [`SlotPool::get`]/`get_mut` return `None` if the slot has
/// since been cleared and reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotHandle {
    pub(crate) index: usize,
    generation: u32,
}

/// A read view of an occupied slot's contents.
pub struct ItemView<'a> {
    pub key: &'a [u8],
    pub value: &'a Value,
    pub flags: u32,
    pub expiry: u64,
    pub cas: u64,
}

pub struct SlotPool {
    slots: Vec<Slot>,
}

impl SlotPool {
    /// Allocate a pool of exactly `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Slot::empty()).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `index` currently holds an occupied slot.
    pub fn is_occupied(&self, index: usize) -> bool {
        self.slots[index].occupied
    }

    /// Key bytes of the slot at `index`, regardless of occupancy state.
    /// Used by the cuckoo table to test key equality before committing
    /// to a handle.
    pub fn key_at(&self, index: usize) -> &[u8] {
        &self.slots[index].key
    }

    pub fn handle_at(&self, index: usize) -> SlotHandle {
        SlotHandle {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// Resolve a handle to its current contents, or `None` if the slot
    /// has been cleared/reused since the handle was issued.
    pub fn get(&self, handle: SlotHandle) -> Option<ItemView<'_>> {
        let slot = &self.slots[handle.index];
        if !slot.occupied || slot.generation != handle.generation {
            return None;
        }
        Some(ItemView {
            key: &slot.key,
            value: &slot.value,
            flags: slot.flags,
            expiry: slot.expiry,
            cas: slot.cas,
        })
    }

    /// Write a new occupant into `index`, overwriting whatever was
    /// there (the caller is responsible for having evicted/cleared
    /// first if needed). Bumps the generation and assigns `cas`.
    /// Returns the handle for the newly written slot.
    pub fn occupy(
        &mut self,
        index: usize,
        key: Vec<u8>,
        value: Value,
        flags: u32,
        expiry: u64,
        cas: u64,
    ) -> SlotHandle {
        let slot = &mut self.slots[index];
        slot.occupied = true;
        slot.generation = slot.generation.wrapping_add(1);
        slot.key = key;
        slot.value = value;
        slot.flags = flags;
        slot.expiry = expiry;
        slot.cas = cas;
        SlotHandle {
            index,
            generation: slot.generation,
        }
    }

    /// Rewrite value/flags/expiry/cas of an already-occupied slot in
    /// place, preserving its key and generation (the occupant's
    /// *identity* — same key — is unchanged, only its content is).
    pub fn rewrite(&mut self, index: usize, value: Value, flags: u32, expiry: u64, cas: u64) {
        let slot = &mut self.slots[index];
        debug_assert!(slot.occupied, "rewrite of an unoccupied slot");
        slot.value = value;
        slot.flags = flags;
        slot.expiry = expiry;
        slot.cas = cas;
    }

    /// Clear occupancy at `index`, bumping its generation so any
    /// outstanding handles become stale. Returns `true` if the slot was
    /// occupied.
    pub fn clear(&mut self, index: usize) -> bool {
        let slot = &mut self.slots[index];
        if !slot.occupied {
            return false;
        }
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.key = Vec::new();
        slot.value = Value::Str(Vec::new());
        true
    }
}
