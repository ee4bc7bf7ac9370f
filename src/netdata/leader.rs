// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Leader's authoritative, partition-wide Network Data: merges every
//! border router's registration, allocates 6LoWPAN compression context
//! IDs, and tracks the `version`/`stable_version` counters distributed in
//! MLE Data Responses (`SPEC_FULL.md` §4.10).
//!
//! Grounded on `network_data_leader.h` (`examples/original_source/`):
//! `kMinContextId = 1`, `kNumContextIds = 15`,
//! `kContextIdReuseDelay = 48h`, `context_used_` bitmask plus
//! `context_last_used_[]` timestamps, `RouteLookup`, `IsOnMesh`,
//! `RemoveBorderRouter`.

use crate::error::{Result, ThreadError};
use crate::net::address::Ipv6Addr;
use crate::net::mac_address::Rloc16;
use crate::net::routing::NetworkDataRoutes;
use crate::netdata::tlv::{PrefixEntry, CONTEXT_ID_REUSE_DELAY_MS, MAX_ENTRIES, MIN_CONTEXT_ID, NUM_CONTEXT_IDS};

pub struct Leader {
    entries: heapless::Vec<PrefixEntry, MAX_ENTRIES>,
    version: u8,
    stable_version: u8,
    /// Bit `i` set means context id `MIN_CONTEXT_ID + i` is currently
    /// assigned to some entry.
    context_used: u16,
    /// When context id `MIN_CONTEXT_ID + i` was last freed; `0` if never
    /// used. Consulted by [`Self::allocate_context`] to enforce the reuse
    /// delay.
    context_last_used_ms: [u32; NUM_CONTEXT_IDS],
    context_id_reuse_delay_ms: u32,
}

impl Leader {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
            version: 0,
            stable_version: 0,
            context_used: 0,
            context_last_used_ms: [0; NUM_CONTEXT_IDS],
            context_id_reuse_delay_ms: CONTEXT_ID_REUSE_DELAY_MS,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn stable_version(&self) -> u8 {
        self.stable_version
    }

    pub fn context_id_reuse_delay_ms(&self) -> u32 {
        self.context_id_reuse_delay_ms
    }

    pub fn set_context_id_reuse_delay_ms(&mut self, delay: u32) {
        self.context_id_reuse_delay_ms = delay;
    }

    /// `GetContext(address)`: the longest-matching prefix entry carrying a
    /// context ID, for 6LoWPAN compression lookups.
    pub fn get_context_by_address(&self, addr: &Ipv6Addr) -> Option<(u8, u8)> {
        self.entries
            .iter()
            .filter(|e| e.context_id.is_some() && e.matches(addr))
            .max_by_key(|e| e.prefix_len)
            .map(|e| (e.context_id.unwrap(), e.prefix_len))
    }

    /// `GetContext(context_id)`: the prefix that owns this context ID.
    pub fn get_context_by_id(&self, context_id: u8) -> Option<&PrefixEntry> {
        self.entries.iter().find(|e| e.context_id == Some(context_id))
    }

    /// `IsOnMesh(address)`: whether some on-mesh prefix entry covers
    /// `address`.
    pub fn is_on_mesh(&self, addr: &Ipv6Addr) -> bool {
        self.entries.iter().any(|e| e.on_mesh && e.matches(addr))
    }

    fn find_entry(&self, prefix: &Ipv6Addr, prefix_len: u8, rloc16: Rloc16) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.prefix == *prefix && e.prefix_len == prefix_len && e.rloc16 == rloc16)
    }

    /// `HandleServerData`: merges one border router's registered entries
    /// into the partition-wide table, allocating context IDs for any new
    /// on-mesh prefix that needs 6LoWPAN compression, and bumps `version`
    /// (and `stable_version` if a stable TLV changed) on any actual change
    /// (`SPEC_FULL.md` §4.10). Returns whether anything changed.
    pub fn handle_server_data(&mut self, rloc16: Rloc16, registered: &[PrefixEntry], now: u32) -> Result<bool> {
        let mut changed = false;
        let mut stable_changed = false;
        for incoming in registered {
            match self.find_entry(&incoming.prefix, incoming.prefix_len, rloc16) {
                Some(idx) if entries_equal_ignoring_context(&self.entries[idx], incoming) => {}
                Some(idx) => {
                    stable_changed |= self.entries[idx].stable || incoming.stable;
                    let context_id = self.entries[idx].context_id;
                    self.entries[idx] = *incoming;
                    self.entries[idx].context_id = context_id;
                    changed = true;
                }
                None => {
                    let mut entry = *incoming;
                    if entry.on_mesh && entry.context_id.is_none() {
                        entry.context_id = self.allocate_context(now);
                    }
                    self.entries.push(entry).map_err(|_| ThreadError::NoBufs)?;
                    stable_changed |= entry.stable;
                    changed = true;
                }
            }
        }
        if changed {
            self.version = self.version.wrapping_add(1);
            if stable_changed {
                self.stable_version = self.stable_version.wrapping_add(1);
            }
        }
        Ok(changed)
    }

    /// `RemoveBorderRouter(rloc)`: drops every entry registered by `rloc16`,
    /// freeing (with the reuse delay applied) any context ID it held, and
    /// bumps `stable_version` too if any removed entry was stable
    /// (`SPEC_FULL.md` §4.10: "stable_version if any stable TLV changed").
    pub fn remove_border_router(&mut self, rloc16: Rloc16, now: u32) {
        let mut removed_any = false;
        let mut stable_removed = false;
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].rloc16 == rloc16 {
                if let Some(id) = self.entries[i].context_id {
                    self.free_context(id, now);
                }
                stable_removed |= self.entries[i].stable;
                self.entries.remove(i);
                removed_any = true;
            } else {
                i += 1;
            }
        }
        if removed_any {
            self.version = self.version.wrapping_add(1);
            if stable_removed {
                self.stable_version = self.stable_version.wrapping_add(1);
            }
        }
    }

    /// `AllocateContext()`: picks the lowest-numbered context id that is
    /// neither in use nor still within its reuse delay window.
    fn allocate_context(&mut self, now: u32) -> Option<u8> {
        for i in 0..NUM_CONTEXT_IDS {
            let in_use = self.context_used & (1 << i) != 0;
            if in_use {
                continue;
            }
            let last_used = self.context_last_used_ms[i];
            if last_used != 0 && now.wrapping_sub(last_used) < self.context_id_reuse_delay_ms {
                continue;
            }
            self.context_used |= 1 << i;
            return Some(MIN_CONTEXT_ID + i as u8);
        }
        None
    }

    /// `FreeContext(context_id)`: releases the id, starting its reuse delay
    /// clock from `now`.
    fn free_context(&mut self, context_id: u8, now: u32) {
        if context_id < MIN_CONTEXT_ID {
            return;
        }
        let i = (context_id - MIN_CONTEXT_ID) as usize;
        if i >= NUM_CONTEXT_IDS {
            return;
        }
        self.context_used &= !(1 << i);
        self.context_last_used_ms[i] = now;
    }
}

/// Equality for the merge check in [`Leader::handle_server_data`], ignoring
/// `context_id` since that's Leader-assigned state the registering router
/// never carries.
fn entries_equal_ignoring_context(a: &PrefixEntry, b: &PrefixEntry) -> bool {
    a.prefix == b.prefix
        && a.prefix_len == b.prefix_len
        && a.rloc16 == b.rloc16
        && a.stable == b.stable
        && a.on_mesh == b.on_mesh
        && a.has_route == b.has_route
        && a.preference == b.preference
}

impl Default for Leader {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkDataRoutes for Leader {
    /// `RouteLookup(destination)`: best-matching on-mesh or has-route entry
    /// covering `dest`, resolved to the mesh-local address of the
    /// registering border router's RLOC16.
    fn route_lookup(&self, dest: &Ipv6Addr) -> Option<Ipv6Addr> {
        let entry = self
            .entries
            .iter()
            .filter(|e| (e.on_mesh || e.has_route) && e.matches(dest))
            .max_by_key(|e| e.prefix_len)?;
        Some(Ipv6Addr::mesh_local_from_rloc16(dest, entry.rloc16.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(last: u8) -> Ipv6Addr {
        Ipv6Addr::new([0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, last])
    }

    fn entry(prefix: Ipv6Addr, prefix_len: u8, rloc16: Rloc16, on_mesh: bool, stable: bool) -> PrefixEntry {
        PrefixEntry {
            prefix,
            prefix_len,
            rloc16,
            stable,
            on_mesh,
            has_route: false,
            preference: 0,
            context_id: None,
        }
    }

    #[test]
    fn new_on_mesh_prefix_bumps_version_and_allocates_context() {
        let mut leader = Leader::new();
        let rloc = Rloc16::new(1, 0);
        let changed = leader
            .handle_server_data(rloc, &[entry(prefix(0), 64, rloc, true, true)], 0)
            .unwrap();
        assert!(changed);
        assert_eq!(leader.version(), 1);
        assert_eq!(leader.stable_version(), 1);
        assert!(leader.get_context_by_address(&prefix(0)).is_some());
        assert!(leader.is_on_mesh(&prefix(0)));
    }

    #[test]
    fn identical_registration_is_not_a_change() {
        let mut leader = Leader::new();
        let rloc = Rloc16::new(1, 0);
        leader
            .handle_server_data(rloc, &[entry(prefix(0), 64, rloc, true, false)], 0)
            .unwrap();
        let changed = leader
            .handle_server_data(rloc, &[entry(prefix(0), 64, rloc, true, false)], 10)
            .unwrap();
        assert!(!changed);
        assert_eq!(leader.version(), 1);
    }

    #[test]
    fn remove_border_router_drops_its_entries_and_frees_context() {
        let mut leader = Leader::new();
        let rloc = Rloc16::new(1, 0);
        leader
            .handle_server_data(rloc, &[entry(prefix(0), 64, rloc, true, true)], 0)
            .unwrap();
        assert!(leader.is_on_mesh(&prefix(0)));
        let stable_version_before = leader.stable_version();
        leader.remove_border_router(rloc, 1_000);
        assert!(!leader.is_on_mesh(&prefix(0)));
        assert_eq!(leader.stable_version(), stable_version_before + 1);
    }

    #[test]
    fn remove_border_router_leaves_stable_version_alone_when_entry_was_not_stable() {
        let mut leader = Leader::new();
        let rloc = Rloc16::new(1, 0);
        leader
            .handle_server_data(rloc, &[entry(prefix(0), 64, rloc, true, false)], 0)
            .unwrap();
        let stable_version_before = leader.stable_version();
        let version_before = leader.version();
        leader.remove_border_router(rloc, 1_000);
        assert!(!leader.is_on_mesh(&prefix(0)));
        assert_eq!(leader.stable_version(), stable_version_before);
        assert_eq!(leader.version(), version_before + 1);
    }

    #[test]
    fn freed_context_is_not_reused_before_the_delay_elapses() {
        let mut leader = Leader::new();
        let rloc_a = Rloc16::new(1, 0);
        let rloc_b = Rloc16::new(2, 0);
        leader
            .handle_server_data(rloc_a, &[entry(prefix(0), 64, rloc_a, true, true)], 0)
            .unwrap();
        let first_context = leader.get_context_by_address(&prefix(0)).unwrap().0;
        leader.remove_border_router(rloc_a, 1_000);

        // Exhaust every other context id so the freed one is the only
        // candidate, and confirm it's refused before the delay elapses.
        for (i, id) in (0..14).enumerate() {
            let p = prefix(10 + id);
            leader
                .handle_server_data(
                    rloc_b,
                    &[entry(p, 64, rloc_b, true, true)],
                    1_000 + i as u32,
                )
                .unwrap();
        }
        let new_prefix = prefix(200);
        leader
            .handle_server_data(rloc_b, &[entry(new_prefix, 64, rloc_b, true, true)], 1_000)
            .unwrap();
        assert!(leader.get_context_by_address(&new_prefix).is_none());

        // After the reuse delay elapses, the same id becomes available
        // again for a fresh registration.
        let far_future = 1_000 + CONTEXT_ID_REUSE_DELAY_MS;
        leader.remove_border_router(rloc_b, far_future);
        let rloc_c = Rloc16::new(3, 0);
        leader
            .handle_server_data(rloc_c, &[entry(prefix(250), 64, rloc_c, true, true)], far_future)
            .unwrap();
        let reused = leader.get_context_by_address(&prefix(250)).unwrap().0;
        assert_eq!(reused, first_context);
    }

    #[test]
    fn route_lookup_resolves_to_mesh_local_address_of_registering_router() {
        let mut leader = Leader::new();
        let rloc = Rloc16::new(5, 0);
        leader
            .handle_server_data(rloc, &[entry(prefix(0), 64, rloc, true, false)], 0)
            .unwrap();
        let resolved = leader.route_lookup(&prefix(7)).unwrap();
        assert_eq!(resolved, Ipv6Addr::mesh_local_from_rloc16(&prefix(7), rloc.as_u16()));
    }
}
