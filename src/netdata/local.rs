// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The locally-registered half of Network Data: the on-mesh prefixes and
//! has-route entries this node wants advertised, registered with the
//! Leader via Server Data CoAP on change (`SPEC_FULL.md` §4.10).
//!
//! Grounded on `network_data_local.hpp` (`examples/original_source/`):
//! `AddOnMeshPrefix`/`RemoveOnMeshPrefix`, `AddHasRoutePrefix`/
//! `RemoveHasRoutePrefix`, and `Register(destination)`.

use crate::error::{Result, ThreadError};
use crate::net::address::Ipv6Addr;
use crate::net::mac_address::Rloc16;
use crate::netdata::tlv::{PrefixEntry, MAX_LOCAL_ENTRIES};

/// Prefixes this node currently wants registered with the Leader.
pub struct Local {
    entries: heapless::Vec<PrefixEntry, MAX_LOCAL_ENTRIES>,
}

impl Local {
    pub const fn new() -> Self {
        Self {
            entries: heapless::Vec::new(),
        }
    }

    pub fn add_on_mesh_prefix(
        &mut self,
        prefix: Ipv6Addr,
        prefix_len: u8,
        preference: i8,
        stable: bool,
        rloc16: Rloc16,
    ) -> Result<()> {
        self.upsert(PrefixEntry {
            prefix,
            prefix_len,
            rloc16,
            stable,
            on_mesh: true,
            has_route: false,
            preference,
            context_id: None,
        })
    }

    pub fn add_has_route_prefix(
        &mut self,
        prefix: Ipv6Addr,
        prefix_len: u8,
        preference: i8,
        stable: bool,
        rloc16: Rloc16,
    ) -> Result<()> {
        self.upsert(PrefixEntry {
            prefix,
            prefix_len,
            rloc16,
            stable,
            on_mesh: false,
            has_route: true,
            preference,
            context_id: None,
        })
    }

    fn upsert(&mut self, entry: PrefixEntry) -> Result<()> {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.prefix == entry.prefix && e.prefix_len == entry.prefix_len)
        {
            existing.on_mesh |= entry.on_mesh;
            existing.has_route |= entry.has_route;
            existing.stable = entry.stable;
            existing.preference = entry.preference;
            return Ok(());
        }
        self.entries.push(entry).map_err(|_| ThreadError::NoBufs)
    }

    pub fn remove_on_mesh_prefix(&mut self, prefix: &Ipv6Addr, prefix_len: u8) -> bool {
        self.remove_where(prefix, prefix_len, |e| e.on_mesh = false)
    }

    pub fn remove_has_route_prefix(&mut self, prefix: &Ipv6Addr, prefix_len: u8) -> bool {
        self.remove_where(prefix, prefix_len, |e| e.has_route = false)
    }

    fn remove_where(&mut self, prefix: &Ipv6Addr, prefix_len: u8, clear: impl Fn(&mut PrefixEntry)) -> bool {
        let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.prefix == *prefix && e.prefix_len == prefix_len)
        else {
            return false;
        };
        clear(&mut self.entries[pos]);
        let entry = self.entries[pos];
        if !entry.on_mesh && !entry.has_route {
            self.entries.remove(pos);
        }
        true
    }

    /// The set of entries to send as the Server Data registration payload
    /// (`Register(destination)`, §4.10: "`Local` registers with the Leader
    /// via Server Data CoAP").
    pub fn entries(&self) -> &[PrefixEntry] {
        &self.entries
    }
}

impl Default for Local {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(last: u8) -> Ipv6Addr {
        Ipv6Addr::new([0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, last])
    }

    #[test]
    fn adding_on_mesh_then_has_route_merges_into_one_entry() {
        let mut local = Local::new();
        let rloc = Rloc16::new(1, 0);
        local.add_on_mesh_prefix(prefix(0), 64, 0, true, rloc).unwrap();
        local.add_has_route_prefix(prefix(0), 64, 0, true, rloc).unwrap();
        assert_eq!(local.entries().len(), 1);
        assert!(local.entries()[0].on_mesh);
        assert!(local.entries()[0].has_route);
    }

    #[test]
    fn removing_last_sub_entry_drops_the_prefix() {
        let mut local = Local::new();
        let rloc = Rloc16::new(1, 0);
        local.add_on_mesh_prefix(prefix(0), 64, 0, true, rloc).unwrap();
        assert!(local.remove_on_mesh_prefix(&prefix(0), 64));
        assert!(local.entries().is_empty());
    }

    #[test]
    fn removing_unknown_prefix_reports_not_found() {
        let mut local = Local::new();
        assert!(!local.remove_on_mesh_prefix(&prefix(9), 64));
    }
}
