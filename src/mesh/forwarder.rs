// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mesh forwarder: per-destination send queues, next-hop resolution,
//! send-retry bookkeeping, indirect transmission to sleepy children, and
//! the forward-vs-deliver decision on receive (`SPEC_FULL.md` §4.5).
//!
//! Grounded on `thread_utils.rs`'s RLOC16 helpers
//! (`examples/tock-tock/capsules/extra/src/net/thread/thread_utils.rs`) for
//! the addressing this operates on; the queue/retry/indirect machinery
//! itself has no counterpart retrieved in the pack and is built from
//! §4.5's text directly, reusing [`crate::message::queue::MessageQueue`]
//! and repurposing [`crate::message::pool::MessagePool::timeout`] as a
//! per-message retry counter rather than adding a side table.

use log::{debug, trace, warn};

use crate::error::{Result, ThreadError};
use crate::mesh::header::MeshHeader;
use crate::message::pool::{MessageId, MessagePool};
use crate::message::queue::MessageQueue;
use crate::net::mac_address::{MacAddress, Rloc16};

/// Concurrently-tracked destination queues: one per direct neighbor or
/// sleepy child currently owed traffic. Mirrors
/// [`crate::mle::neighbor::MAX_NEIGHBORS`] without depending on `mle`.
pub const MAX_DESTINATIONS: usize = 32;

/// `SPEC_FULL.md` §4.5: "requeue for retry... up to a small retry budget".
pub const MAX_SEND_RETRIES: u32 = 3;

/// Implemented by whatever resolves a RLOC16 destination to the MAC address
/// of the next hop — a direct neighbor, or the result of
/// `MleRouter::GetNextHop` for a multi-hop destination (`SPEC_FULL.md`
/// §4.5). Kept as a trait so `mesh` has no upward dependency on `mle`.
pub trait NextHopResolver {
    fn next_hop(&self, destination: Rloc16) -> Option<MacAddress>;
}

/// Implemented by the neighbor table so a successful send can update
/// `last_heard` without `mesh` depending on `mle`.
pub trait NeighborLastHeard {
    fn mark_heard(&mut self, mac: &MacAddress, now_ms: u32);
}

/// Implemented by the neighbor/child table so the forwarder knows which
/// destinations require indirect (poll-triggered) transmission
/// (`SPEC_FULL.md` §4.5: "Indirect transmission").
pub trait SleepyChildren {
    fn is_sleepy(&self, mac: &MacAddress) -> bool;
}

/// What a received, mesh-headered datagram should do next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// Final destination is this node (or no Mesh Header was present):
    /// hand the payload up to 6LoWPAN decompression and IPv6 delivery.
    Deliver,
    /// Not ours: re-enqueue toward `header`'s (hop-decremented) next hop.
    Forward(MeshHeader),
}

/// `SPEC_FULL.md` §4.5: "dispatch IPv6 to either local delivery... or
/// forward (decrement hop limit, re-enqueue)."
pub fn process_received(header: MeshHeader, own_rloc16: Rloc16) -> Result<Disposition> {
    if header.final_destination == own_rloc16 {
        return Ok(Disposition::Deliver);
    }
    match header.decrement_hops() {
        Some(decremented) => Ok(Disposition::Forward(decremented)),
        None => {
            warn!(target: "thread_core::mesh", "mesh datagram exhausted hop limit, dropping");
            Err(ThreadError::Drop)
        }
    }
}

#[derive(Clone, Copy)]
struct Destination {
    mac: MacAddress,
    in_use: bool,
    indirect: bool,
}

impl Destination {
    const fn empty() -> Self {
        Self {
            mac: MacAddress::Short(0),
            in_use: false,
            indirect: false,
        }
    }
}

/// Owns one [`MessageQueue`] per tracked destination plus the single
/// in-flight-send slot the concurrency model allows
/// (`SPEC_FULL.md` §5: "MAC transmissions complete... before the next
/// transmission to the same radio is started").
pub struct MeshForwarder {
    destinations: [Destination; MAX_DESTINATIONS],
    queues: [MessageQueue; MAX_DESTINATIONS],
    in_flight: Option<(usize, MessageId)>,
    dropped: u32,
}

impl MeshForwarder {
    pub fn new() -> Self {
        Self {
            destinations: [Destination::empty(); MAX_DESTINATIONS],
            queues: core::array::from_fn(|_| MessageQueue::new()),
            in_flight: None,
            dropped: 0,
        }
    }

    /// Total datagrams dropped after exhausting the retry budget, for
    /// diagnostics (`SPEC_FULL.md` §4.5: "drop with diagnostic").
    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }

    fn find(&self, mac: &MacAddress) -> Option<usize> {
        self.destinations.iter().position(|d| d.in_use && d.mac == *mac)
    }

    fn find_or_allocate(&mut self, mac: MacAddress, indirect: bool) -> Result<usize> {
        if let Some(idx) = self.find(&mac) {
            return Ok(idx);
        }
        let idx = self
            .destinations
            .iter()
            .position(|d| !d.in_use)
            .ok_or(ThreadError::NoBufs)?;
        self.destinations[idx] = Destination {
            mac,
            in_use: true,
            indirect,
        };
        Ok(idx)
    }

    /// Resolves `destination` to a next hop and enqueues `msg` on its
    /// per-destination (or per-child, if sleepy) send queue
    /// (`SPEC_FULL.md` §4.5).
    pub fn send<R, S>(
        &mut self,
        pool: &MessagePool,
        destination: Rloc16,
        msg: MessageId,
        resolver: &R,
        sleepy: &S,
    ) -> Result<()>
    where
        R: NextHopResolver,
        S: SleepyChildren,
    {
        let mac = resolver.next_hop(destination).ok_or(ThreadError::NoRoute)?;
        let indirect = sleepy.is_sleepy(&mac);
        let idx = self.find_or_allocate(mac, indirect)?;
        pool.set_timeout(msg, 0)?;
        self.queues[idx].enqueue(pool, msg)?;
        trace!(target: "thread_core::mesh", "queued message for rloc16={:#06x} indirect={}", destination.as_u16(), indirect);
        Ok(())
    }

    /// Pops the next message owed to a directly-transmitted (non-sleepy)
    /// destination, marking it as the single in-flight send. Returns
    /// `None` if every queue is empty or a send is already in flight.
    pub fn dequeue_next(&mut self, pool: &MessagePool) -> Result<Option<(MacAddress, MessageId)>> {
        if self.in_flight.is_some() {
            return Ok(None);
        }
        for idx in 0..MAX_DESTINATIONS {
            if !self.destinations[idx].in_use || self.destinations[idx].indirect {
                continue;
            }
            if let Some(msg) = self.queues[idx].dequeue(pool)? {
                self.in_flight = Some((idx, msg));
                return Ok(Some((self.destinations[idx].mac, msg)));
            }
        }
        Ok(None)
    }

    /// Pops one message held for `child`, only ever called once the child
    /// has polled with a Data Request (`SPEC_FULL.md` §4.5: "Indirect
    /// transmission").
    pub fn poll_indirect(&mut self, pool: &MessagePool, child: &MacAddress) -> Result<Option<MessageId>> {
        let Some(idx) = self.find(child) else {
            return Ok(None);
        };
        if !self.destinations[idx].indirect || self.in_flight.is_some() {
            return Ok(None);
        }
        let msg = self.queues[idx].dequeue(pool)?;
        if let Some(msg) = msg {
            self.in_flight = Some((idx, msg));
        }
        Ok(msg)
    }

    /// Completes the single in-flight send. On success, clears it and
    /// marks the neighbor heard. On a transient MAC failure, re-enqueues
    /// up to [`MAX_SEND_RETRIES`] times before dropping
    /// (`SPEC_FULL.md` §4.5: "requeue for retry... or drop with
    /// diagnostic").
    pub fn send_done<N: NeighborLastHeard>(
        &mut self,
        pool: &MessagePool,
        success: bool,
        transient_failure: bool,
        neighbors: &mut N,
        now_ms: u32,
    ) -> Result<()> {
        let Some((idx, msg)) = self.in_flight.take() else {
            return Err(ThreadError::InvalidState);
        };
        let mac = self.destinations[idx].mac;
        if success {
            neighbors.mark_heard(&mac, now_ms);
            pool.free(msg)?;
            return Ok(());
        }
        if transient_failure {
            let retries = pool.timeout(msg)? + 1;
            if retries <= MAX_SEND_RETRIES {
                pool.set_timeout(msg, retries)?;
                debug!(target: "thread_core::mesh", "requeueing send, attempt {} of {}", retries, MAX_SEND_RETRIES);
                self.queues[idx].enqueue(pool, msg)?;
                return Ok(());
            }
        }
        warn!(target: "thread_core::mesh", "dropping message after send failure");
        self.dropped += 1;
        pool.free(msg)?;
        Ok(())
    }

    /// Drops a tracked destination (e.g. the neighbor left the network),
    /// freeing every message still queued for it.
    pub fn remove_destination(&mut self, pool: &MessagePool, mac: &MacAddress) -> Result<()> {
        let Some(idx) = self.find(mac) else {
            return Ok(());
        };
        while let Some(msg) = self.queues[idx].dequeue(pool)? {
            pool.free(msg)?;
        }
        self.destinations[idx].in_use = false;
        Ok(())
    }
}

impl Default for MeshForwarder {
    fn default() -> Self {
        Self::new()
    }
}
