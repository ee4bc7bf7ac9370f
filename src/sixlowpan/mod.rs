// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RFC 6282 header compression and RFC 4944 fragmentation for IPv6
//! datagrams carried over 802.15.4 (`SPEC_FULL.md` §4.5).

pub mod frag;
pub mod iphc;

pub use frag::{
    FirstFragmentHeader, Fragmenter, ReassemblyTable, SubsequentFragmentHeader, needs_fragmentation,
};
pub use iphc::{CompressionContextTable, NoContexts};
