// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The error kinds surfaced by every fallible entry point in this crate.

use core::fmt;

/// Result alias used throughout the core.
pub type Result<T> = core::result::Result<T, ThreadError>;

/// Every failure mode a caller of this crate's public API can observe.
///
/// `Drop` is not really an error: layers that decide to silently discard a
/// frame or datagram (bad FCS, failed security check, malformed CoAP option)
/// return it so the caller can bump a diagnostic counter, but it is never
/// propagated past the layer that produced it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ThreadError {
    /// Generic fatal error with no more specific kind.
    Failed,
    /// Packet intentionally discarded; not surfaced past the producing layer.
    Drop,
    /// A fixed-size pool or table (messages, neighbors, whitelist, ...) is
    /// exhausted.
    NoBufs,
    /// No route to the destination is known.
    NoRoute,
    /// The operation is already in progress (e.g. posting an enqueued
    /// tasklet).
    Busy,
    /// Malformed input.
    Parse,
    /// Caller contract violation (bad argument combination).
    InvalidArgs,
    /// A cryptographic check (MIC, replay counter) failed.
    Security,
    /// No suitable source address exists for the destination.
    NoAddress,
    /// The radio is not in a receiving state.
    NotReceiving,
    /// The operation was cancelled.
    Abort,
    /// The state machine is in the wrong state for the requested operation.
    InvalidState,
    /// CSMA-CA could not find an idle channel within the backoff budget.
    ChannelAccessFailure,
    /// No acknowledgment was received within the retry budget.
    NoAck,
    /// Address resolution is pending; the caller should retry once a
    /// notification arrives.
    AddressQuery,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreadError::Failed => "failed",
            ThreadError::Drop => "dropped",
            ThreadError::NoBufs => "no buffers available",
            ThreadError::NoRoute => "no route",
            ThreadError::Busy => "busy",
            ThreadError::Parse => "parse error",
            ThreadError::InvalidArgs => "invalid arguments",
            ThreadError::Security => "security check failed",
            ThreadError::NoAddress => "no suitable source address",
            ThreadError::NotReceiving => "radio not receiving",
            ThreadError::Abort => "aborted",
            ThreadError::InvalidState => "invalid state",
            ThreadError::ChannelAccessFailure => "channel access failure",
            ThreadError::NoAck => "no ack",
            ThreadError::AddressQuery => "address query pending",
        };
        f.write_str(s)
    }
}
