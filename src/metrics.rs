// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atomic counters for command invocations, outcomes, and storage-engine
//! events (C5). Every handler in [`crate::command`] increments exactly
//! one outcome counter; multi-key reads additionally increment a
//! per-key hit/miss counter once per key.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

macro_rules! counters {
    ($($field:ident),+ $(,)?) => {
        #[derive(Default)]
        pub struct Metrics {
            $(pub(crate) $field: AtomicU64,)+
            start_time: Option<Instant>,
        }

        impl Metrics {
            /// Iterate every named counter, for `STATS` rendering.
            pub fn for_each_stat(&self, mut f: impl FnMut(&str, u64)) {
                $(f(stringify!($field), self.$field.load(Ordering::Relaxed));)+
            }
        }
    };
}

counters! {
    // Per-verb invocation counters.
    cmd_get,
    cmd_gets,
    cmd_set,
    cmd_add,
    cmd_replace,
    cmd_cas,
    cmd_delete,
    cmd_incr,
    cmd_decr,
    cmd_stats,
    cmd_quit,

    // Per-key hit/miss, incremented once per key in a multi-key read.
    cmd_get_key_hit,
    cmd_get_key_miss,
    cmd_gets_key_hit,
    cmd_gets_key_miss,

    // Per-outcome counters, one increment per handler invocation.
    cmd_set_stored,
    cmd_set_ex,
    cmd_add_stored,
    cmd_add_notstored,
    cmd_add_ex,
    cmd_replace_stored,
    cmd_replace_notstored,
    cmd_replace_ex,
    cmd_cas_stored,
    cmd_cas_exists,
    cmd_cas_notfound,
    cmd_cas_ex,
    cmd_delete_deleted,
    cmd_delete_notfound,
    cmd_incr_stored,
    cmd_incr_notfound,
    cmd_incr_ex,
    cmd_decr_stored,
    cmd_decr_notfound,
    cmd_decr_ex,

    // Storage engine events, incremented by the cuckoo table's caller.
    storage_insertions,
    storage_evictions,
    storage_displacement_hops,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn incr(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
