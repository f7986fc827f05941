// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Server configuration.
//!
//! Controls the slot pool size, cuckoo table shape, and the per-item
//! footprint limits, plus the listener address and worker tick interval.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Cache server configuration.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    // === Listener ===
    /// Address to bind the TCP listener to.
    pub listen_addr: SocketAddr,

    /// TCP listen backlog (pending connection queue size).
    pub listen_backlog: u32,

    // === Storage shape ===
    /// Number of slots in the pool. Rounded up to the next power of two
    /// (cuckoo bucket math assumes a power-of-two table size).
    pub slot_count: usize,

    /// Number of independent hash functions / candidate positions per key.
    pub ways: usize,

    /// Maximum number of cuckoo displacements attempted before forcing
    /// an eviction.
    pub max_hops: usize,

    // === Item limits ===
    /// Maximum key length in bytes.
    pub key_max: usize,

    /// Maximum value length in bytes.
    pub val_max: usize,

    // === Worker loop ===
    /// How often the worker refreshes its monotonic clock and polls for
    /// I/O readiness when idle.
    pub tick_interval: Duration,

    /// Maximum events drained from `mio::Poll` per iteration.
    pub max_events_per_tick: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 11311),
            listen_backlog: 1024,

            slot_count: 1 << 20, // ~1M slots
            ways: 4,
            max_hops: 64,

            key_max: 250,
            val_max: 1024,

            tick_interval: Duration::from_secs(1),
            max_events_per_tick: 1024,
        }
    }
}

impl CacheConfig {
    /// Round `slot_count` up to the next power of two, with a floor of
    /// `ways` (a bucket needs at least `ways` slots to make progress).
    pub fn normalized_slot_count(&self) -> usize {
        self.slot_count
            .max(self.ways)
            .next_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_loopback() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.listen_addr.port(), 11311);
    }

    #[test]
    fn slot_count_rounds_to_power_of_two() {
        let mut cfg = CacheConfig::default();
        cfg.slot_count = 1000;
        assert_eq!(cfg.normalized_slot_count(), 1024);

        cfg.slot_count = 1024;
        assert_eq!(cfg.normalized_slot_count(), 1024);
    }

    #[test]
    fn slot_count_floor_is_ways() {
        let mut cfg = CacheConfig::default();
        cfg.slot_count = 1;
        cfg.ways = 4;
        assert_eq!(cfg.normalized_slot_count(), 4);
    }
}
