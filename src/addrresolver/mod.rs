// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The EID→RLOC16 address resolver (`SPEC_FULL.md` §4.11), grounded on
//! `address_resolver.hpp` (`examples/original_source/`).

pub mod cache;

pub use cache::{AddressResolver, CacheState, CACHE_ENTRIES, DISCOVER_TIMEOUT_MS};
