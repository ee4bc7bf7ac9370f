// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Receive-address whitelist filter (`SPEC_FULL.md` §4.4). Grounded on
//! `mac_whitelist.{hpp,cc}` (`examples/original_source/`): up to
//! `kMaxEntries` extended addresses, each with an independent RSSI
//! override used to normalize link-quality metrics in testbeds.

use crate::error::{Result, ThreadError};

pub const MAX_ENTRIES: usize = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Entry {
    ext_address: [u8; 8],
    rssi: Option<i8>,
}

/// Filters incoming frames by extended source address when enabled.
pub struct Whitelist {
    entries: heapless::Vec<Entry, MAX_ENTRIES>,
    enabled: bool,
}

impl Whitelist {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
            enabled: false,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_entries(&self) -> usize {
        MAX_ENTRIES
    }

    fn find(&self, ext_address: &[u8; 8]) -> Option<usize> {
        self.entries.iter().position(|e| &e.ext_address == ext_address)
    }

    /// Adds `ext_address`, returning its entry index. A duplicate add
    /// returns the existing index rather than creating a second entry. The
    /// 33rd distinct add returns `NoBufs` and leaves existing entries
    /// untouched (`SPEC_FULL.md` §8: "33rd whitelist add returns no slot").
    pub fn add(&mut self, ext_address: [u8; 8]) -> Result<usize> {
        if let Some(idx) = self.find(&ext_address) {
            return Ok(idx);
        }
        self.entries
            .push(Entry {
                ext_address,
                rssi: None,
            })
            .map_err(|_| ThreadError::NoBufs)?;
        Ok(self.entries.len() - 1)
    }

    pub fn remove(&mut self, ext_address: &[u8; 8]) {
        if let Some(idx) = self.find(ext_address) {
            self.entries.remove(idx);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, ext_address: &[u8; 8]) -> bool {
        self.find(ext_address).is_some()
    }

    pub fn set_rssi(&mut self, entry: usize, rssi: i8) -> Result<()> {
        self.entries
            .get_mut(entry)
            .map(|e| e.rssi = Some(rssi))
            .ok_or(ThreadError::Failed)
    }

    pub fn clear_rssi(&mut self, entry: usize) -> Result<()> {
        self.entries
            .get_mut(entry)
            .map(|e| e.rssi = None)
            .ok_or(ThreadError::Failed)
    }

    pub fn rssi(&self, entry: usize) -> Option<i8> {
        self.entries.get(entry).and_then(|e| e.rssi)
    }

    /// Whether a frame from `ext_address` should be accepted: always when
    /// the whitelist is disabled, otherwise only when the address is
    /// listed.
    pub fn accepts(&self, ext_address: &[u8; 8]) -> bool {
        !self.enabled || self.contains(ext_address)
    }

    /// Substitutes the per-entry RSSI override for `measured`, if one is
    /// set for `ext_address` (`SPEC_FULL.md` §9: "per-entry, not global").
    pub fn normalize_rssi(&self, ext_address: &[u8; 8], measured: i8) -> i8 {
        self.find(ext_address)
            .and_then(|idx| self.rssi(idx))
            .unwrap_or(measured)
    }
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_whitelist_accepts_everyone() {
        let wl = Whitelist::new();
        assert!(wl.accepts(&[1; 8]));
    }

    #[test]
    fn enabled_whitelist_rejects_unlisted_peers() {
        let mut wl = Whitelist::new();
        wl.enable();
        wl.add([1; 8]).unwrap();
        assert!(wl.accepts(&[1; 8]));
        assert!(!wl.accepts(&[2; 8]));
    }

    #[test]
    fn thirty_third_add_is_rejected_and_table_unchanged() {
        let mut wl = Whitelist::new();
        for i in 0..32u8 {
            wl.add([i; 8]).unwrap();
        }
        assert_eq!(wl.add([32; 8]), Err(ThreadError::NoBufs));
        assert!(wl.contains(&[0; 8]));
        assert_eq!(wl.max_entries(), 32);
    }

    #[test]
    fn rssi_override_is_per_entry() {
        let mut wl = Whitelist::new();
        let a = wl.add([1; 8]).unwrap();
        wl.add([2; 8]).unwrap();
        wl.set_rssi(a, -40).unwrap();
        assert_eq!(wl.normalize_rssi(&[1; 8], -90), -40);
        assert_eq!(wl.normalize_rssi(&[2; 8], -90), -90);
    }

    #[test]
    fn duplicate_add_returns_same_index() {
        let mut wl = Whitelist::new();
        let a = wl.add([9; 8]).unwrap();
        let b = wl.add([9; 8]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn remove_forgets_entry() {
        let mut wl = Whitelist::new();
        wl.add([5; 8]).unwrap();
        wl.remove(&[5; 8]);
        assert!(!wl.contains(&[5; 8]));
    }
}
