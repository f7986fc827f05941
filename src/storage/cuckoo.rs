// SPDX-License-Identifier: Apache-2.0 OR MIT

//! d-ary cuckoo hash table over the slot pool (C2).
//!
//! Each key has `ways` candidate positions computed from independent
//! hash functions. A lookup is `O(ways)`. An insert either lands
//! directly in a free (or lazily-reclaimed expired) candidate, or walks
//! a bounded displacement chain started at the key's first candidate —
//! the source's own policy for picking the starting victim — evicting
//! whatever is left at the end of the chain if `max_hops` is exhausted.
//!
//! No LRU, no background expiry sweep: expired occupants are reclaimed
//! only when a lookup or displacement happens to visit their slot.

use crate::clock::Clock;
use crate::error::{CacheError, Result};
use crate::storage::slab::{SlotHandle, SlotPool};
use crate::value::Value;

/// Outcome of a successful insert, carrying the bookkeeping the command
/// processor needs for its storage-event counters.
pub struct InsertReport {
    pub handle: SlotHandle,
    /// Number of displacement hops performed before landing the item.
    pub hops: usize,
    /// Whether landing the item required forcing out a prior occupant.
    pub evicted: bool,
}

pub struct Cuckoo {
    pool: SlotPool,
    ways: usize,
    max_hops: usize,
    mask: usize,
    key_max: usize,
    val_max: usize,
    cas_counter: u64,
}

impl Cuckoo {
    /// `capacity` must be a power of two (callers should round via
    /// [`crate::config::CacheConfig::normalized_slot_count`]).
    pub fn new(capacity: usize, ways: usize, max_hops: usize, key_max: usize, val_max: usize) -> Self {
        assert!(capacity.is_power_of_two(), "slot count must be a power of two");
        assert!(ways >= 1, "need at least one hash function");
        Self {
            pool: SlotPool::new(capacity),
            ways,
            max_hops,
            mask: capacity - 1,
            key_max,
            val_max,
            cas_counter: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    fn next_cas(&mut self) -> u64 {
        self.cas_counter += 1;
        self.cas_counter
    }

    fn candidate(&self, key: &[u8], way: usize) -> usize {
        let h = fnv1a64(key);
        let mixed = splitmix64(h ^ (way as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        (mixed as usize) & self.mask
    }

    fn candidates(&self, key: &[u8]) -> Vec<usize> {
        (0..self.ways).map(|w| self.candidate(key, w)).collect()
    }

    /// Whether the slot at `idx` is available to receive a new key:
    /// either never occupied, or holding an item whose expiry has
    /// passed.
    fn slot_is_free(&self, idx: usize, clock: &Clock) -> bool {
        if !self.pool.is_occupied(idx) {
            return true;
        }
        let handle = self.pool.handle_at(idx);
        match self.pool.get(handle) {
            Some(view) => clock.is_expired(view.expiry),
            None => true,
        }
    }

    /// Find an occupied, non-expired slot holding `key`. `O(ways)`.
    pub fn lookup(&mut self, key: &[u8], clock: &Clock) -> Option<SlotHandle> {
        for idx in self.candidates(key) {
            if !self.pool.is_occupied(idx) || self.pool.key_at(idx) != key {
                continue;
            }
            let handle = self.pool.handle_at(idx);
            let view = self.pool.get(handle)?;
            if clock.is_expired(view.expiry) {
                // Lazy reclamation: an expired occupant is logically
                // absent, so free its slot now rather than leave it
                // for a future displacement to find.
                self.pool.clear(idx);
                return None;
            }
            return Some(handle);
        }
        None
    }

    fn validate_fit(&self, key: &[u8], value: &Value) -> Result<()> {
        if key.len() > self.key_max {
            return Err(CacheError::KeyTooLarge {
                len: key.len(),
                max: self.key_max,
            });
        }
        if value.encoded_len() > self.val_max {
            return Err(CacheError::ValueTooLarge {
                len: value.encoded_len(),
                max: self.val_max,
            });
        }
        Ok(())
    }

    /// Insert a new key. The caller (command processor) is responsible
    /// for having already established the key is absent — this does not
    /// collapse insert/update.
    pub fn insert(
        &mut self,
        key: &[u8],
        value: Value,
        flags: u32,
        expiry: u64,
        clock: &Clock,
    ) -> Result<InsertReport> {
        self.validate_fit(key, &value)?;

        let candidates = self.candidates(key);
        if let Some(&idx) = candidates.iter().find(|&&idx| self.slot_is_free(idx, clock)) {
            if self.pool.is_occupied(idx) {
                self.pool.clear(idx); // reclaim an expired occupant first
            }
            let cas = self.next_cas();
            let handle = self.pool.occupy(idx, key.to_vec(), value, flags, expiry, cas);
            return Ok(InsertReport {
                handle,
                hops: 0,
                evicted: false,
            });
        }

        self.displace(key, value, flags, expiry, clock, candidates[0])
    }

    /// Bounded displacement chain. `start` is the new key's first
    /// candidate position — the deterministic starting victim per the
    /// source's policy.
    fn displace(
        &mut self,
        key: &[u8],
        value: Value,
        flags: u32,
        expiry: u64,
        clock: &Clock,
        start: usize,
    ) -> Result<InsertReport> {
        let mut carry_key = key.to_vec();
        let mut carry_value = value;
        let mut carry_flags = flags;
        let mut carry_expiry = expiry;
        let mut target = start;

        // The new key's own resting slot is whichever `occupy()` call
        // first writes `carry_key` while it still holds `key` (the very
        // first iteration that doesn't early-return). Every later
        // `occupy()` call in this loop writes a bumped-out victim, not
        // the key the caller asked to insert, so the handle returned to
        // the caller must be this one, not the loop's last `occupy()`.
        let mut new_key_handle: Option<SlotHandle> = None;

        for hop in 0..=self.max_hops {
            if self.slot_is_free(target, clock) || hop == self.max_hops {
                let occupied = self.pool.is_occupied(target);
                // Only a forced placement after exhausting max_hops counts
                // as an eviction; landing on a slot freed by lazy
                // reclamation of an expired item is not one.
                let evicted = hop == self.max_hops && occupied;
                if occupied {
                    self.pool.clear(target);
                }
                let cas = self.next_cas();
                let final_handle = self
                    .pool
                    .occupy(target, carry_key, carry_value, carry_flags, carry_expiry, cas);
                let handle = new_key_handle.unwrap_or(final_handle);
                return Ok(InsertReport {
                    handle,
                    hops: hop,
                    evicted,
                });
            }

            // target is occupied by a live item: bump it out and carry
            // it forward to one of its own alternative positions.
            let victim_key = self.pool.key_at(target).to_vec();
            let victim_handle = self.pool.handle_at(target);
            let victim = self.pool.get(victim_handle).expect("checked occupied above");
            let (victim_value, victim_flags, victim_expiry) =
                (victim.value.clone(), victim.flags, victim.expiry);

            let cas = self.next_cas();
            let placed = self
                .pool
                .occupy(target, carry_key, carry_value, carry_flags, carry_expiry, cas);
            if new_key_handle.is_none() {
                new_key_handle = Some(placed);
            }

            let next = self
                .candidates(&victim_key)
                .into_iter()
                .find(|&p| p != target)
                .unwrap_or(target);

            carry_key = victim_key;
            carry_value = victim_value;
            carry_flags = victim_flags;
            carry_expiry = victim_expiry;
            target = next;
        }
        unreachable!("loop always returns by hop == max_hops");
    }

    /// Rewrite an already-located slot's value/flags/expiry in place,
    /// preserving its key, bumping CAS. Fails (without mutating) if the
    /// new value does not fit.
    pub fn update(&mut self, handle: SlotHandle, value: Value, flags: u32, expiry: u64) -> Result<SlotHandle> {
        let key_len = self
            .pool
            .get(handle)
            .map(|v| v.key.len())
            .expect("update called with a stale handle");
        if value.encoded_len() > self.val_max {
            return Err(CacheError::ValueTooLarge {
                len: value.encoded_len(),
                max: self.val_max,
            });
        }
        debug_assert!(key_len <= self.key_max);
        let cas = self.next_cas();
        self.pool.rewrite(handle.index, value, flags, expiry, cas);
        Ok(handle)
    }

    /// Add `delta` (incr) or subtract it (decr) from an integer-typed
    /// slot, wrapping on unsigned 64-bit overflow/underflow. Bumps CAS.
    /// Returns the new value.
    pub fn incr_decr(&mut self, handle: SlotHandle, delta: u64, incr: bool) -> Result<u64> {
        let view = self.pool.get(handle).expect("stale handle");
        let current = view.value.as_int().ok_or(CacheError::TypeMismatch)?;
        let flags = view.flags;
        let expiry = view.expiry;
        let new_val = if incr {
            current.wrapping_add(delta)
        } else {
            current.wrapping_sub(delta)
        };
        let cas = self.next_cas();
        self.pool.rewrite(handle.index, Value::Int(new_val), flags, expiry, cas);
        Ok(new_val)
    }

    /// Remove `key` if present. Returns whether a removal occurred.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        for idx in self.candidates(key) {
            if self.pool.is_occupied(idx) && self.pool.key_at(idx) == key {
                return self.pool.clear(idx);
            }
        }
        false
    }

    pub fn get_view(&self, handle: SlotHandle) -> Option<crate::storage::slab::ItemView<'_>> {
        self.pool.get(handle)
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
