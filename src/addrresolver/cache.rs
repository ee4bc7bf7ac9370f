// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! EID → RLOC16 address cache and its Address-Query lifecycle
//! (`SPEC_FULL.md` §4.11).
//!
//! Grounded on `address_resolver.hpp` (`examples/original_source/`):
//! `kCacheEntries = 8`, `kDiscoverTimeout = 3s`, the
//! `Invalid/Discover/Retry/Valid` state machine, and `Remove(routerId)`.

use crate::error::{Result, ThreadError};
use crate::net::address::Ipv6Addr;
use crate::net::mac_address::Rloc16;

/// `kCacheEntries`.
pub const CACHE_ENTRIES: usize = 8;
/// `kDiscoverTimeout` (3 seconds), in this crate's millisecond time base.
pub const DISCOVER_TIMEOUT_MS: u32 = 3_000;
/// `mFailureCount` is a 4-bit field in the original; once it saturates the
/// entry gives up and reverts to `Invalid`.
pub const MAX_FAILURE_COUNT: u8 = 15;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheState {
    Invalid,
    Discover,
    Retry,
    Valid,
}

#[derive(Clone, Copy)]
struct CacheEntry {
    target: Ipv6Addr,
    rloc16: Rloc16,
    state: CacheState,
    /// Absolute time the current `Discover`/`Retry` wait expires.
    timeout_at: u32,
    failure_count: u8,
}

impl CacheEntry {
    const fn invalid() -> Self {
        Self {
            target: Ipv6Addr::UNSPECIFIED,
            rloc16: Rloc16::INVALID,
            state: CacheState::Invalid,
            timeout_at: 0,
            failure_count: 0,
        }
    }
}

/// The EID→RLOC16 cache plus its query lifecycle (`SPEC_FULL.md` §4.11).
pub struct AddressResolver {
    entries: [CacheEntry; CACHE_ENTRIES],
}

impl AddressResolver {
    pub const fn new() -> Self {
        Self {
            entries: [CacheEntry::invalid(); CACHE_ENTRIES],
        }
    }

    /// `Clear()`.
    pub fn clear(&mut self) {
        self.entries = [CacheEntry::invalid(); CACHE_ENTRIES];
    }

    /// `Remove(routerId)`: invalidates every entry whose RLOC16 belongs to
    /// `router_id`, called when that router leaves the partition.
    pub fn remove_router(&mut self, router_id: u8) {
        for entry in &mut self.entries {
            if entry.state != CacheState::Invalid && entry.rloc16.router_id() == router_id {
                *entry = CacheEntry::invalid();
            }
        }
    }

    fn find(&self, eid: &Ipv6Addr) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.state != CacheState::Invalid && e.target == *eid)
    }

    fn find_free_or_oldest(&self) -> usize {
        self.entries
            .iter()
            .position(|e| e.state == CacheState::Invalid)
            .unwrap_or_else(|| {
                self.entries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.timeout_at)
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            })
    }

    /// `Resolve(eid, &rloc)`: returns the cached RLOC16 immediately if
    /// `Valid`; otherwise allocates (or reuses) a slot, marks it
    /// `Discover`, and returns [`ThreadError::AddressQuery`] to signal that
    /// a multicast Address-Query CoAP request must be sent and the caller
    /// should retry once the resolver reports a notification.
    pub fn resolve(&mut self, eid: Ipv6Addr, now: u32) -> Result<Rloc16> {
        if let Some(idx) = self.find(&eid) {
            if self.entries[idx].state == CacheState::Valid {
                return Ok(self.entries[idx].rloc16);
            }
            return Err(ThreadError::AddressQuery);
        }
        let idx = self.find_free_or_oldest();
        self.entries[idx] = CacheEntry {
            target: eid,
            rloc16: Rloc16::INVALID,
            state: CacheState::Discover,
            timeout_at: now.wrapping_add(DISCOVER_TIMEOUT_MS),
            failure_count: 0,
        };
        Err(ThreadError::AddressQuery)
    }

    /// `HandleAddressNotification`: promotes a `Discover`/`Retry` slot
    /// matching `eid` to `Valid` with the carried RLOC16. Returns `true` if
    /// a pending slot was promoted (meaning datagrams queued against this
    /// EID can now be dispatched).
    pub fn handle_address_notification(&mut self, eid: Ipv6Addr, rloc16: Rloc16) -> bool {
        let Some(idx) = self.find(&eid) else {
            return false;
        };
        if self.entries[idx].state == CacheState::Valid {
            return false;
        }
        self.entries[idx].state = CacheState::Valid;
        self.entries[idx].rloc16 = rloc16;
        self.entries[idx].failure_count = 0;
        true
    }

    /// One-second aging tick (`SPEC_FULL.md` §4.11): `Discover` slots whose
    /// timeout has expired move to `Retry` (bumping `failure_count`);
    /// `Retry` slots that have exhausted their failure budget revert to
    /// `Invalid`, otherwise re-arm the timeout for another round.
    pub fn tick(&mut self, now: u32) {
        for entry in &mut self.entries {
            match entry.state {
                CacheState::Discover | CacheState::Retry if now >= entry.timeout_at => {
                    if entry.failure_count >= MAX_FAILURE_COUNT {
                        *entry = CacheEntry::invalid();
                    } else {
                        entry.failure_count += 1;
                        entry.state = CacheState::Retry;
                        entry.timeout_at = now.wrapping_add(DISCOVER_TIMEOUT_MS);
                    }
                }
                _ => {}
            }
        }
    }

    #[cfg(test)]
    fn state_of(&self, eid: &Ipv6Addr) -> Option<CacheState> {
        self.find(eid).map(|i| self.entries[i].state)
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new()
    }
}
