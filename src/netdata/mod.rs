// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Network Data: the partition-wide table of on-mesh prefixes, external
//! routes, and 6LoWPAN compression contexts, split between a node's local
//! registration (`local`) and the Leader's authoritative merge (`leader`)
//! (`SPEC_FULL.md` §4.10).
//!
//! Grounded on `network_data.h`, `network_data_local.hpp`,
//! `network_data_leader.h` (`examples/original_source/`).

pub mod leader;
pub mod local;
pub mod tlv;

pub use leader::Leader;
pub use local::Local;
pub use tlv::PrefixEntry;
