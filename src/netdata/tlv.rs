// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Network Data record shape and context-ID constants (`SPEC_FULL.md` §4.10).
//!
//! Grounded on `network_data_leader.h` (`examples/original_source/`): a
//! `Prefix` entry optionally carries a Border Router sub-entry (on-mesh),
//! a Has Route sub-entry (external route), and a context ID used for
//! 6LoWPAN compression. This crate stores the merged result as a flat
//! table of [`PrefixEntry`] records (the arena-of-records strategy recorded
//! in `DESIGN.md`) rather than re-deriving a byte-level recursive TLV
//! stream on every query.

use crate::net::address::Ipv6Addr;
use crate::net::mac_address::Rloc16;

/// `kMinContextId` (`examples/original_source/include/thread/network_data_leader.h`).
pub const MIN_CONTEXT_ID: u8 = 1;
/// `kNumContextIds`.
pub const NUM_CONTEXT_IDS: usize = 15;
/// `kContextIdReuseDelay` (48 hours), expressed in this crate's millisecond
/// time base rather than the original's seconds.
pub const CONTEXT_ID_REUSE_DELAY_MS: u32 = 48 * 60 * 60 * 1000;

/// Upper bound on distinct prefix entries the Leader's merged table holds.
pub const MAX_ENTRIES: usize = 32;
/// Upper bound on a single node's locally-registered prefixes.
pub const MAX_LOCAL_ENTRIES: usize = 8;

/// One merged Network Data record: a prefix plus whichever of
/// on-mesh/has-route/context sub-entries apply to it, and the RLOC16 of the
/// border router that registered it (`SPEC_FULL.md` §4.10).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PrefixEntry {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    pub rloc16: Rloc16,
    pub stable: bool,
    /// Carries a Border Router sub-TLV: usable as an on-mesh prefix.
    pub on_mesh: bool,
    /// Carries a Has Route sub-TLV: an external route via this border
    /// router, not itself on-mesh.
    pub has_route: bool,
    /// Route/prefix preference, `-1..=1` (`SPEC_FULL.md` §10.5 doesn't name
    /// this explicitly; carried as plain route-preference per RFC 4191).
    pub preference: i8,
    /// 6LoWPAN compression context ID, if the Leader has allocated one for
    /// this prefix.
    pub context_id: Option<u8>,
}

impl PrefixEntry {
    pub fn matches(&self, addr: &Ipv6Addr) -> bool {
        addr.matches_prefix(&self.prefix, self.prefix_len)
    }
}

/// `PrefixMatch(a, b, length)`: number of leading bits the two prefixes
/// share, used to decide whether a newly registered prefix merges with one
/// already in the table.
pub fn prefix_match(a: &Ipv6Addr, b: &Ipv6Addr) -> u8 {
    a.common_prefix_len(b)
}
