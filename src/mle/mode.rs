// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The MLE Mode TLV (`SPEC_FULL.md` §4.9, §10.5; bit layout recorded as an
//! open-question decision in `DESIGN.md`).
//!
//! Grounded on `LinkMode` in
//! `examples/tock-tock/capsules/extra/src/net/thread/thread_utils.rs`'s
//! `form_parent_req`/`form_child_id_req` (`ReceiverOnWhenIdle`,
//! `SecureDataRequests`, `FullThreadDevice`, `FullNetworkDataRequired` summed
//! into one byte); this crate expresses the same four bits as a
//! `bitflags` set rather than four separate enum-variant-as-integer sums.

bitflags::bitflags! {
    /// `DESIGN.md`: bit0 = rx-on-when-idle, bit1 = secure-data-requests,
    /// bit2 = full-function-device, bit3 = full-network-data.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct Mode: u8 {
        const RX_ON_WHEN_IDLE = 0x01;
        const SECURE_DATA_REQUESTS = 0x02;
        const FULL_FUNCTION_DEVICE = 0x04;
        const FULL_NETWORK_DATA = 0x08;
    }
}

impl Mode {
    /// The mode a router or leader always advertises: always-on, secured,
    /// full-function, full network data.
    pub const ROUTER: Mode = Mode::RX_ON_WHEN_IDLE
        .union(Mode::SECURE_DATA_REQUESTS)
        .union(Mode::FULL_FUNCTION_DEVICE)
        .union(Mode::FULL_NETWORK_DATA);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_mode_sets_all_four_bits() {
        assert_eq!(Mode::ROUTER.bits(), 0x0f);
    }

    #[test]
    fn bits_round_trip_through_from_bits_truncate() {
        let mode = Mode::from_bits_truncate(0x03);
        assert!(mode.contains(Mode::RX_ON_WHEN_IDLE));
        assert!(mode.contains(Mode::SECURE_DATA_REQUESTS));
        assert!(!mode.contains(Mode::FULL_FUNCTION_DEVICE));
    }
}
