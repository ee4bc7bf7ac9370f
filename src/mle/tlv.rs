// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! MLE TLV type numbers and the shared get/encode helper
//! (`SPEC_FULL.md` §4.9).
//!
//! Type numbers match the ones `find_challenge` and `form_parent_req` hard-
//! code in `thread_utils.rs`
//! (`examples/tock-tock/capsules/extra/src/net/thread/thread_utils.rs`:
//! Challenge is type `3`); `mle_tlvs.cpp`
//! (`examples/original_source/src/core/thread/mle_tlvs.cpp`) supplies the
//! generic `GetTlv(message, type, max_length)` linear-scan shape this
//! module's [`find`] follows.

use crate::error::{Result, ThreadError};

pub const TYPE_SOURCE_ADDRESS: u8 = 0;
pub const TYPE_MODE: u8 = 1;
pub const TYPE_TIMEOUT: u8 = 2;
pub const TYPE_CHALLENGE: u8 = 3;
pub const TYPE_RESPONSE: u8 = 4;
pub const TYPE_LINK_LAYER_FRAME_COUNTER: u8 = 5;
pub const TYPE_MLE_FRAME_COUNTER: u8 = 7;
pub const TYPE_ROUTE64: u8 = 9;
pub const TYPE_ADDRESS16: u8 = 10;
pub const TYPE_LEADER_DATA: u8 = 11;
pub const TYPE_NETWORK_DATA: u8 = 12;
pub const TYPE_TLV_REQUEST: u8 = 13;
pub const TYPE_SCAN_MASK: u8 = 14;
pub const TYPE_CONNECTIVITY: u8 = 15;
pub const TYPE_VERSION: u8 = 18;

/// Largest single TLV value this crate ever encodes (the Route64 TLV's
/// id-mask-plus-per-router-cost payload is the largest).
pub const MAX_TLV_VALUE_LEN: usize = 64;

/// One decoded `{type, length, value}` record. `value` borrows from the
/// buffer passed to [`find`]/[`parse_all`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Tlv<'a> {
    pub tlv_type: u8,
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Encodes a single `{type, length, value}` record into `out`, returning
    /// the number of bytes written.
    pub fn encode(tlv_type: u8, value: &[u8], out: &mut [u8]) -> Result<usize> {
        if value.len() > u8::MAX as usize || out.len() < 2 + value.len() {
            return Err(ThreadError::NoBufs);
        }
        out[0] = tlv_type;
        out[1] = value.len() as u8;
        out[2..2 + value.len()].copy_from_slice(value);
        Ok(2 + value.len())
    }
}

/// `Tlv::GetTlv`: a linear scan of a TLV stream for the first entry of
/// `tlv_type`, bounded by `message[..end]`.
pub fn find(message: &[u8], tlv_type: u8) -> Result<Tlv<'_>> {
    let mut offset = 0;
    while offset + 2 <= message.len() {
        let t = message[offset];
        let len = message[offset + 1] as usize;
        let value_end = offset + 2 + len;
        if value_end > message.len() {
            break;
        }
        if t == tlv_type {
            return Ok(Tlv {
                tlv_type: t,
                value: &message[offset + 2..value_end],
            });
        }
        offset = value_end;
    }
    Err(ThreadError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_find_round_trips() {
        let mut buf = [0u8; 16];
        let mode_len = Tlv::encode(TYPE_MODE, &[0x0f], &mut buf).unwrap();
        let challenge_len = Tlv::encode(TYPE_CHALLENGE, &[1, 2, 3, 4], &mut buf[mode_len..]).unwrap();
        let total = mode_len + challenge_len;

        let mode = find(&buf[..total], TYPE_MODE).unwrap();
        assert_eq!(mode.value, &[0x0f]);
        let challenge = find(&buf[..total], TYPE_CHALLENGE).unwrap();
        assert_eq!(challenge.value, &[1, 2, 3, 4]);
    }

    #[test]
    fn missing_type_is_a_parse_error() {
        let mut buf = [0u8; 8];
        let len = Tlv::encode(TYPE_MODE, &[0x0f], &mut buf).unwrap();
        assert_eq!(find(&buf[..len], TYPE_VERSION), Err(ThreadError::Parse));
    }
}
