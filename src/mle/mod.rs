// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mesh Link Establishment: role state machine, neighbor table,
//! route-cost table, advertisements, and message security
//! (`SPEC_FULL.md` §4.9).
//!
//! Grounded on `mle_constants.hpp` (`examples/original_source/`) for the
//! numeric constants and on `thread.rs`/`thread_utils.rs`
//! (`examples/tock-tock/capsules/extra/src/net/thread/`) for
//! `MacAddress`/RLOC16 usage and the MLE command set.

pub mod mode;
pub mod neighbor;
pub mod role;
pub mod route;
pub mod security;
pub mod tlv;

pub use mode::Mode;
pub use neighbor::NeighborTable;
pub use role::{LeaderCandidacy, ParentCandidate, Role, RoleState};
pub use route::RouteCostTable;

/// The MLE command set (`SPEC_FULL.md` §4.9), named and numbered after
/// `MleCommand` in
/// `examples/tock-tock/capsules/extra/src/net/thread/thread_utils.rs`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    LinkRequest = 0,
    LinkAccept = 1,
    LinkAcceptAndRequest = 2,
    LinkAdvertisement = 4,
    DataRequest = 7,
    DataResponse = 8,
    ParentRequest = 9,
    ParentResponse = 10,
    ChildIdRequest = 11,
    ChildIdResponse = 12,
    ChildUpdateRequest = 13,
    ChildUpdateResponse = 14,
    Announce = 15,
    DiscoverRequest = 16,
    DiscoverResponse = 17,
}

impl Command {
    pub fn from_u8(v: u8) -> crate::Result<Self> {
        match v {
            0 => Ok(Command::LinkRequest),
            1 => Ok(Command::LinkAccept),
            2 => Ok(Command::LinkAcceptAndRequest),
            4 => Ok(Command::LinkAdvertisement),
            7 => Ok(Command::DataRequest),
            8 => Ok(Command::DataResponse),
            9 => Ok(Command::ParentRequest),
            10 => Ok(Command::ParentResponse),
            11 => Ok(Command::ChildIdRequest),
            12 => Ok(Command::ChildIdResponse),
            13 => Ok(Command::ChildUpdateRequest),
            14 => Ok(Command::ChildUpdateResponse),
            15 => Ok(Command::Announce),
            16 => Ok(Command::DiscoverRequest),
            17 => Ok(Command::DiscoverResponse),
            _ => Err(crate::ThreadError::Parse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_from_u8_rejects_unknown_values() {
        assert_eq!(Command::from_u8(9), Ok(Command::ParentRequest));
        assert!(Command::from_u8(200).is_err());
    }
}
