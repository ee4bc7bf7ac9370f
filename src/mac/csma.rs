// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CSMA-CA transmission state machine (`SPEC_FULL.md` §4.4).
//!
//! Modeled as a pure reducer: callers feed it CCA results, transmit
//! outcomes, and backoff-timer expiries, and it replies with the next
//! [`CsmaAction`] to perform. It owns no radio or alarm reference itself —
//! per the split documented on [`crate::runtime::platform::Radio`], the
//! radio only performs the physical CCA/send/receive; this reducer is "the
//! CSMA-CA, ACK wait, and retry [that] live above this trait".

use core::cell::Cell;

use log::{debug, warn};

use crate::error::ThreadError;
use crate::runtime::platform::TxOutcome;

/// `macMinBE` in IEEE 802.15.4-2006 terms.
pub const MIN_BACKOFF_EXPONENT: u8 = 3;
/// `macMaxBE`.
pub const MAX_BACKOFFF_EXPONENT: u8 = 5;
pub const MAX_BACKOFFS: u8 = 4;
pub const MAX_RETRIES: u8 = 3;
/// One backoff unit, per `SPEC_FULL.md` §4.4 ("timeout 864 µs × some
/// constant (PHY-dependent)").
pub const ACK_TIMEOUT_UNIT_US: u32 = 864;
/// Number of units the MAC waits for an ACK before declaring `NoAck`.
pub const ACK_TIMEOUT_UNITS: u32 = 12;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Idle,
    Cca,
    Backoff,
    Sending,
    AckWait,
}

/// What the caller should do in response to the last event fed to
/// [`CsmaTx`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CsmaAction {
    PerformCca,
    /// Start a backoff timer for `delay_ms` before retrying CCA.
    StartBackoff { delay_ms: u32 },
    Transmit,
    /// Wait up to `timeout_us` for an Ack frame matching the outgoing
    /// sequence number.
    WaitAck { timeout_us: u32 },
    Done(Result<(), ThreadError>),
}

/// One outstanding transmission's CSMA-CA state (`SPEC_FULL.md` §4.4:
/// `Disabled, Sleep, Idle, ActiveScan, EnergyScan,
/// Transmit(Cca|Backoff|Sending|AckWait|Retrying), Receive`; the scan and
/// sleep states are modeled separately in [`crate::mac::scan`] and the
/// surrounding MAC driver, so this reducer only covers the `Transmit`
/// substates plus `Idle`).
pub struct CsmaTx {
    state: Cell<State>,
    be: Cell<u8>,
    backoffs: Cell<u8>,
    retries: Cell<u8>,
    ack_requested: Cell<bool>,
}

impl CsmaTx {
    pub const fn new() -> Self {
        Self {
            state: Cell::new(State::Idle),
            be: Cell::new(MIN_BACKOFF_EXPONENT),
            backoffs: Cell::new(0),
            retries: Cell::new(0),
            ack_requested: Cell::new(false),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state.get(), State::Idle)
    }

    /// Begins a new transmission: `Idle -> Transmit.Cca`.
    pub fn start(&self, ack_requested: bool) -> CsmaAction {
        self.state.set(State::Cca);
        self.be.set(MIN_BACKOFF_EXPONENT);
        self.backoffs.set(0);
        self.retries.set(0);
        self.ack_requested.set(ack_requested);
        CsmaAction::PerformCca
    }

    /// Feeds the result of a CCA sample. `jitter` is an entropy-sourced
    /// value the caller masks down to the current backoff window.
    pub fn cca_result(&self, idle: bool, jitter: u32) -> CsmaAction {
        if idle {
            self.state.set(State::Sending);
            return CsmaAction::Transmit;
        }
        self.channel_busy(jitter)
    }

    fn channel_busy(&self, jitter: u32) -> CsmaAction {
        if self.backoffs.get() >= MAX_BACKOFFS {
            warn!(target: "thread_core::mac", "channel access failure after {} backoffs", self.backoffs.get());
            self.state.set(State::Idle);
            return CsmaAction::Done(Err(ThreadError::ChannelAccessFailure));
        }
        self.backoffs.set(self.backoffs.get() + 1);
        self.be.set(core::cmp::min(self.be.get() + 1, MAX_BACKOFFF_EXPONENT));
        self.state.set(State::Backoff);
        let window = 1u32 << self.be.get();
        CsmaAction::StartBackoff {
            delay_ms: jitter % window,
        }
    }

    /// The backoff timer expired; retry CCA.
    pub fn backoff_elapsed(&self) -> CsmaAction {
        self.state.set(State::Cca);
        CsmaAction::PerformCca
    }

    /// Feeds the outcome of a physical transmit attempt.
    pub fn transmit_done(&self, outcome: TxOutcome) -> CsmaAction {
        match outcome {
            TxOutcome::Sent { ack_pending } => {
                if self.ack_requested.get() && ack_pending {
                    self.state.set(State::AckWait);
                    CsmaAction::WaitAck {
                        timeout_us: ACK_TIMEOUT_UNIT_US * ACK_TIMEOUT_UNITS,
                    }
                } else {
                    self.state.set(State::Idle);
                    CsmaAction::Done(Ok(()))
                }
            }
            TxOutcome::ChannelAccessFailure => {
                self.state.set(State::Idle);
                CsmaAction::Done(Err(ThreadError::ChannelAccessFailure))
            }
            TxOutcome::NoAck => self.retry_or_fail(),
            TxOutcome::Aborted => {
                self.state.set(State::Idle);
                CsmaAction::Done(Err(ThreadError::Abort))
            }
        }
    }

    /// A matching Ack frame arrived while in `AckWait`.
    pub fn ack_received(&self) -> CsmaAction {
        self.state.set(State::Idle);
        CsmaAction::Done(Ok(()))
    }

    /// The ACK-wait timeout elapsed with no matching Ack.
    pub fn ack_timeout(&self) -> CsmaAction {
        self.retry_or_fail()
    }

    fn retry_or_fail(&self) -> CsmaAction {
        if self.retries.get() >= MAX_RETRIES {
            warn!(target: "thread_core::mac", "no ack after {} retries, giving up", self.retries.get());
            self.state.set(State::Idle);
            CsmaAction::Done(Err(ThreadError::NoAck))
        } else {
            self.retries.set(self.retries.get() + 1);
            debug!(target: "thread_core::mac", "no ack, retrying (attempt {})", self.retries.get());
            self.state.set(State::Cca);
            CsmaAction::PerformCca
        }
    }
}

impl Default for CsmaTx {
    fn default() -> Self {
        Self::new()
    }
}
