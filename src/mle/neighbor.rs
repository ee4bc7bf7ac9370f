// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The neighbor table: per-peer link quality, RLOC16, frame-counter replay
//! state, and the previous-key-valid bit (`SPEC_FULL.md` §4.8, §4.9,
//! §10.5).
//!
//! Implements [`crate::mac::ReplayFilter`] and
//! [`crate::keymgr::NeighborKeyRollover`] so the `mac` and `keymgr` modules
//! can drive replay rejection and key rollover without depending on `mle`
//! (`DESIGN.md`'s decoupling-trait pattern, mirroring
//! `net::routing::NetworkDataRoutes`).

use crate::error::{Result, ThreadError};
use crate::keymgr::NeighborKeyRollover;
use crate::mac::ReplayFilter;
use crate::net::mac_address::Rloc16;

/// Upper bound on concurrently-tracked neighbors (parent, children, and
/// router peers together); `mle_constants.hpp`'s `kMaxRouters = 32` plus
/// headroom for a router's attached children.
pub const MAX_NEIGHBORS: usize = 32;

/// `kMaxNeighborAge` (100 s), in this crate's millisecond time base:
/// neighbors not heard from within this window are aged out.
pub const MAX_NEIGHBOR_AGE_MS: u32 = 100 * 1_000;

/// Link-quality-to-cost mapping used by route-cost computation
/// (`SPEC_FULL.md` §4.9: "sum of link costs mapped from link quality:
/// 1=6, 2=2, 3=1").
pub fn link_cost(link_quality: u8) -> u8 {
    match link_quality {
        1 => 6,
        2 => 2,
        3 => 1,
        _ => 6,
    }
}

#[derive(Clone, Copy)]
struct NeighborEntry {
    ext_address: [u8; 8],
    rloc16: Rloc16,
    link_quality: u8,
    last_heard_ms: u32,
    frame_counter: u32,
    previous_key_valid: bool,
    in_use: bool,
}

impl NeighborEntry {
    const fn empty() -> Self {
        Self {
            ext_address: [0; 8],
            rloc16: Rloc16::INVALID,
            link_quality: 0,
            last_heard_ms: 0,
            frame_counter: 0,
            previous_key_valid: false,
            in_use: false,
        }
    }
}

pub struct NeighborTable {
    entries: heapless::Vec<NeighborEntry, MAX_NEIGHBORS>,
}

impl NeighborTable {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    fn find(&self, ext_address: &[u8; 8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.in_use && &e.ext_address == ext_address)
    }

    /// Adds a neighbor, or updates its RLOC16/link quality/`last_heard` if
    /// already known.
    pub fn update(&mut self, ext_address: [u8; 8], rloc16: Rloc16, link_quality: u8, now: u32) -> Result<()> {
        if let Some(idx) = self.find(&ext_address) {
            self.entries[idx].rloc16 = rloc16;
            self.entries[idx].link_quality = link_quality;
            self.entries[idx].last_heard_ms = now;
            return Ok(());
        }
        let entry = NeighborEntry {
            ext_address,
            rloc16,
            link_quality,
            last_heard_ms: now,
            frame_counter: 0,
            previous_key_valid: false,
            in_use: true,
        };
        if let Some(idx) = self.entries.iter().position(|e| !e.in_use) {
            self.entries[idx] = entry;
            return Ok(());
        }
        self.entries.push(entry).map_err(|_| ThreadError::NoBufs)
    }

    pub fn remove(&mut self, ext_address: &[u8; 8]) {
        if let Some(idx) = self.find(ext_address) {
            self.entries[idx].in_use = false;
        }
    }

    pub fn rloc16(&self, ext_address: &[u8; 8]) -> Option<Rloc16> {
        self.find(ext_address).map(|idx| self.entries[idx].rloc16)
    }

    pub fn link_quality(&self, ext_address: &[u8; 8]) -> Option<u8> {
        self.find(ext_address).map(|idx| self.entries[idx].link_quality)
    }

    pub fn count(&self) -> usize {
        self.entries.iter().filter(|e| e.in_use).count()
    }

    /// `kMaxNeighborAge` eviction: drops neighbors not heard from within the
    /// aging window.
    pub fn age_out(&mut self, now: u32) {
        for entry in &mut self.entries {
            if entry.in_use && now.wrapping_sub(entry.last_heard_ms) > MAX_NEIGHBOR_AGE_MS {
                entry.in_use = false;
            }
        }
    }
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayFilter for NeighborTable {
    fn last_frame_counter(&self, ext_address: &[u8; 8]) -> Option<u32> {
        let idx = self.find(ext_address)?;
        if self.entries[idx].frame_counter == 0 {
            None
        } else {
            Some(self.entries[idx].frame_counter)
        }
    }

    fn record_frame_counter(&mut self, ext_address: &[u8; 8], counter: u32) {
        if let Some(idx) = self.find(ext_address) {
            self.entries[idx].frame_counter = counter;
        }
    }
}

impl NeighborKeyRollover for NeighborTable {
    fn mark_all_previous_key_valid(&mut self, valid: bool) {
        for entry in &mut self.entries {
            if entry.in_use {
                entry.previous_key_valid = valid;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(n: u8) -> [u8; 8] {
        [n; 8]
    }

    #[test]
    fn update_then_lookup_returns_latest_rloc16() {
        let mut table = NeighborTable::new();
        table.update(ext(1), Rloc16::new(1, 0), 3, 0).unwrap();
        assert_eq!(table.rloc16(&ext(1)), Some(Rloc16::new(1, 0)));
        table.update(ext(1), Rloc16::new(1, 2), 2, 10).unwrap();
        assert_eq!(table.rloc16(&ext(1)), Some(Rloc16::new(1, 2)));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn aged_out_neighbor_is_removed() {
        let mut table = NeighborTable::new();
        table.update(ext(1), Rloc16::new(1, 0), 3, 0).unwrap();
        table.age_out(MAX_NEIGHBOR_AGE_MS + 1);
        assert_eq!(table.rloc16(&ext(1)), None);
    }

    #[test]
    fn replay_filter_rejects_non_increasing_counters() {
        let mut table = NeighborTable::new();
        table.update(ext(1), Rloc16::new(1, 0), 3, 0).unwrap();
        assert!(crate::mac::accept_frame_counter(&mut table, &ext(1), 5).is_ok());
        assert_eq!(
            crate::mac::accept_frame_counter(&mut table, &ext(1), 5),
            Err(ThreadError::Security)
        );
    }

    #[test]
    fn key_rollover_marks_every_known_neighbor() {
        let mut table = NeighborTable::new();
        table.update(ext(1), Rloc16::new(1, 0), 3, 0).unwrap();
        table.update(ext(2), Rloc16::new(2, 0), 3, 0).unwrap();
        table.mark_all_previous_key_valid(true);
        assert!(table.entries[0].previous_key_valid);
        assert!(table.entries[1].previous_key_valid);
    }

    #[test]
    fn removed_slot_is_reused_by_a_later_update() {
        let mut table = NeighborTable::new();
        table.update(ext(1), Rloc16::new(1, 0), 3, 0).unwrap();
        table.remove(&ext(1));
        assert_eq!(table.rloc16(&ext(1)), None);
        table.update(ext(9), Rloc16::new(9, 0), 3, 0).unwrap();
        assert_eq!(table.count(), 1);
    }
}
