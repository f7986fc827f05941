// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command processor (C4): dispatch a parsed [`Request`] onto the
//! storage engine and compose the matching protocol-correct response.
//!
//! Every handler increments exactly one outcome counter and, unless
//! `noreply` was set, writes exactly one response frame.

use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics::Metrics;
use crate::protocol::{Request, ResponseWriter, Verb};
use crate::storage::Cuckoo;
use crate::value::Value;

/// What the caller should do with the connection after this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    Continue,
    /// `QUIT` was processed; the caller should flush and close.
    Quit,
}

pub struct Processor {
    table: Cuckoo,
    pub metrics: Metrics,
    pub clock: Clock,
}

impl Processor {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            table: Cuckoo::new(
                config.normalized_slot_count(),
                config.ways,
                config.max_hops,
                config.key_max,
                config.val_max,
            ),
            metrics: Metrics::new(),
            clock: Clock::new(),
        }
    }

    /// Resolve a wire expiry (seconds from now, 0 = never) into the
    /// absolute clock value the storage engine compares against.
    fn resolve_expiry(&self, raw: u64) -> u64 {
        if raw == 0 {
            0
        } else {
            self.clock.now().saturating_add(raw)
        }
    }

    pub fn dispatch(&mut self, req: &Request, out: &mut ResponseWriter) -> DispatchResult {
        match req.verb {
            Verb::Get => {
                self.metrics.incr(&self.metrics.cmd_get);
                self.handle_get(&req.keys, false, out);
                DispatchResult::Continue
            }
            Verb::Gets => {
                self.metrics.incr(&self.metrics.cmd_gets);
                self.handle_get(&req.keys, true, out);
                DispatchResult::Continue
            }
            Verb::Delete => {
                self.metrics.incr(&self.metrics.cmd_delete);
                self.handle_delete(&req.keys[0], req.noreply, out);
                DispatchResult::Continue
            }
            Verb::Set | Verb::Add | Verb::Replace | Verb::Cas => {
                self.handle_store(req, out);
                DispatchResult::Continue
            }
            Verb::Incr | Verb::Decr => {
                self.handle_incr_decr(req, out);
                DispatchResult::Continue
            }
            Verb::Stats => {
                self.metrics.incr(&self.metrics.cmd_stats);
                self.handle_stats(out);
                DispatchResult::Continue
            }
            Verb::Quit => {
                self.metrics.incr(&self.metrics.cmd_quit);
                DispatchResult::Quit
            }
        }
    }

    fn handle_get(&mut self, keys: &[Vec<u8>], with_cas: bool, out: &mut ResponseWriter) {
        for key in keys {
            match self.table.lookup(key, &self.clock) {
                Some(handle) => {
                    let view = self.table.get_view(handle).expect("just looked up");
                    let cas = with_cas.then_some(view.cas);
                    let rendered = view.value.render();
                    out.value(key, view.flags, &rendered, cas);
                    if with_cas {
                        self.metrics.incr(&self.metrics.cmd_gets_key_hit);
                    } else {
                        self.metrics.incr(&self.metrics.cmd_get_key_hit);
                    }
                }
                None => {
                    if with_cas {
                        self.metrics.incr(&self.metrics.cmd_gets_key_miss);
                    } else {
                        self.metrics.incr(&self.metrics.cmd_get_key_miss);
                    }
                }
            }
        }
        out.end();
    }

    fn handle_delete(&mut self, key: &[u8], noreply: bool, out: &mut ResponseWriter) {
        if self.table.delete(key) {
            self.metrics.incr(&self.metrics.cmd_delete_deleted);
            if !noreply {
                out.deleted();
            }
        } else {
            self.metrics.incr(&self.metrics.cmd_delete_notfound);
            if !noreply {
                out.not_found();
            }
        }
    }

    fn record_insert(&self, report: &crate::storage::InsertReport) {
        self.metrics.incr(&self.metrics.storage_insertions);
        if report.evicted {
            self.metrics.incr(&self.metrics.storage_evictions);
        }
        self.metrics
            .storage_displacement_hops
            .fetch_add(report.hops as u64, std::sync::atomic::Ordering::Relaxed);
    }

    fn handle_store(&mut self, req: &Request, out: &mut ResponseWriter) {
        let key = &req.keys[0];
        let value = Value::classify(req.value.as_deref().unwrap_or_default());
        let expiry = self.resolve_expiry(req.expiry);
        let existing = self.table.lookup(key, &self.clock);

        match req.verb {
            Verb::Set => {
                self.metrics.incr(&self.metrics.cmd_set);
                let result = match existing {
                    Some(h) => self.table.update(h, value, req.flags, expiry).map(|_| None),
                    None => self
                        .table
                        .insert(key, value, req.flags, expiry, &self.clock)
                        .map(Some),
                };
                match result {
                    Ok(report) => {
                        if let Some(r) = &report {
                            self.record_insert(r);
                        }
                        self.metrics.incr(&self.metrics.cmd_set_stored);
                        if !req.noreply {
                            out.stored();
                        }
                    }
                    Err(e) => self.reject_store(&self.metrics.cmd_set_ex, &e, req.noreply, out),
                }
            }

            Verb::Add => {
                self.metrics.incr(&self.metrics.cmd_add);
                if existing.is_some() {
                    self.metrics.incr(&self.metrics.cmd_add_notstored);
                    if !req.noreply {
                        out.not_stored();
                    }
                    return;
                }
                match self.table.insert(key, value, req.flags, expiry, &self.clock) {
                    Ok(report) => {
                        self.record_insert(&report);
                        self.metrics.incr(&self.metrics.cmd_add_stored);
                        if !req.noreply {
                            out.stored();
                        }
                    }
                    Err(e) => self.reject_store(&self.metrics.cmd_add_ex, &e, req.noreply, out),
                }
            }

            Verb::Replace => {
                self.metrics.incr(&self.metrics.cmd_replace);
                match existing {
                    None => {
                        self.metrics.incr(&self.metrics.cmd_replace_notstored);
                        if !req.noreply {
                            out.not_stored();
                        }
                    }
                    Some(h) => match self.table.update(h, value, req.flags, expiry) {
                        Ok(_) => {
                            self.metrics.incr(&self.metrics.cmd_replace_stored);
                            if !req.noreply {
                                out.stored();
                            }
                        }
                        Err(e) => {
                            self.reject_store(&self.metrics.cmd_replace_ex, &e, req.noreply, out)
                        }
                    },
                }
            }

            Verb::Cas => {
                self.metrics.incr(&self.metrics.cmd_cas);
                match existing {
                    None => {
                        self.metrics.incr(&self.metrics.cmd_cas_notfound);
                        if !req.noreply {
                            out.not_found();
                        }
                    }
                    Some(h) => {
                        let stored_cas = self.table.get_view(h).expect("just looked up").cas;
                        if Some(stored_cas) != req.cas {
                            self.metrics.incr(&self.metrics.cmd_cas_exists);
                            if !req.noreply {
                                out.exists();
                            }
                            return;
                        }
                        match self.table.update(h, value, req.flags, expiry) {
                            Ok(_) => {
                                self.metrics.incr(&self.metrics.cmd_cas_stored);
                                if !req.noreply {
                                    out.stored();
                                }
                            }
                            Err(e) => {
                                self.reject_store(&self.metrics.cmd_cas_ex, &e, req.noreply, out)
                            }
                        }
                    }
                }
            }

            _ => unreachable!("handle_store only called for storage verbs"),
        }
    }

    fn reject_store(
        &self,
        counter: &std::sync::atomic::AtomicU64,
        err: &CacheError,
        noreply: bool,
        out: &mut ResponseWriter,
    ) {
        self.metrics.incr(counter);
        if !noreply {
            out.client_error(&err.to_string());
        }
    }

    fn handle_incr_decr(&mut self, req: &Request, out: &mut ResponseWriter) {
        let is_incr = req.verb == Verb::Incr;
        self.metrics.incr(if is_incr { &self.metrics.cmd_incr } else { &self.metrics.cmd_decr });
        let key = &req.keys[0];
        let delta = req.delta.expect("incr/decr always carries a delta");

        match self.table.lookup(key, &self.clock) {
            None => {
                self.metrics.incr(if is_incr {
                    &self.metrics.cmd_incr_notfound
                } else {
                    &self.metrics.cmd_decr_notfound
                });
                if !req.noreply {
                    out.not_found();
                }
            }
            Some(handle) => match self.table.incr_decr(handle, delta, is_incr) {
                Ok(new_val) => {
                    self.metrics.incr(if is_incr {
                        &self.metrics.cmd_incr_stored
                    } else {
                        &self.metrics.cmd_decr_stored
                    });
                    if !req.noreply {
                        out.integer(new_val);
                    }
                }
                Err(e) => {
                    self.metrics.incr(if is_incr {
                        &self.metrics.cmd_incr_ex
                    } else {
                        &self.metrics.cmd_decr_ex
                    });
                    if !req.noreply {
                        out.client_error(&e.to_string());
                    }
                }
            },
        }
    }

    fn handle_stats(&self, out: &mut ResponseWriter) {
        self.metrics.for_each_stat(|name, value| out.stat(name, value));
        out.stat("uptime", self.metrics.uptime_secs());
        out.end();
    }
}
