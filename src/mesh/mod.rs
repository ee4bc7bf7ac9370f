// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mesh Header addressing and the mesh forwarder sitting between 6LoWPAN
//! and the MAC layer (`SPEC_FULL.md` §4.5).

pub mod forwarder;
pub mod header;

pub use forwarder::{
    Disposition, MeshForwarder, NeighborLastHeard, NextHopResolver, SleepyChildren, process_received,
};
pub use header::MeshHeader;
