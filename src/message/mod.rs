// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The Message buffer pool: a fixed-count block allocator backing every
//! layer's send/receive path (`SPEC_FULL.md` §3, §4.2).
//!
//! Messages are not Rust values the caller owns directly — they are handles
//! ([`MessageId`]) into a [`pool::MessagePool`] arena, mirroring the
//! redesign note in `SPEC_FULL.md` §9 ("arena of fixed-size records
//! addressed by index") rather than the donor's raw linked list of
//! `&'static mut` buffers, since this crate's pool is a single long-lived
//! value rather than per-call buffer ownership transfer.

pub mod pool;
pub mod queue;

pub use pool::{MessageId, MessagePool, MessageType, BLOCK_SIZE};
pub use queue::MessageQueue;
