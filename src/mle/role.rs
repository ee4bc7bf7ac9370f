// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The MLE role state machine: `Disabled, Detached, Child, Router, Leader`
//! (`SPEC_FULL.md` §4.9).
//!
//! Grounded directly on §4.9's transition list; RLOC16 and advertisement
//! interval constants cross-checked against `mle_constants.hpp`
//! (`examples/original_source/src/core/thread/mle_constants.hpp`):
//! `kUdpPort = 19788`, `kNetworkIdTimeout = 120s`,
//! `kAdvertiseIntervalMin/Max = 1/32s`, `kRouterDowngradeThreshold = 23`,
//! `kRouterUpgradeThreshold = 16` (original spells this
//! `kRouterUpgradeThreadhold`; corrected here, see `DESIGN.md`).

use crate::net::mac_address::{MacAddress, Rloc16};

pub const UDP_PORT: u16 = 19788;
/// `kNetworkIdTimeout`, in this crate's millisecond time base.
pub const NETWORK_ID_TIMEOUT_MS: u32 = 120 * 1_000;
pub const ADVERTISE_INTERVAL_MIN_MS: u32 = 1_000;
pub const ADVERTISE_INTERVAL_MAX_MS: u32 = 32_000;
pub const ROUTER_DOWNGRADE_THRESHOLD: u8 = 23;
pub const ROUTER_UPGRADE_THRESHOLD: u8 = 16;
pub const PARENT_REQUEST_ROUTER_TIMEOUT_MS: u32 = 1_000;
pub const PARENT_REQUEST_CHILD_TIMEOUT_MS: u32 = 2_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Disabled,
    Detached,
    Child,
    Router,
    Leader,
}

/// A candidate Parent Response, compared by link margin then leader route
/// cost when picking which parent to attach to (§4.9: "pick best response
/// by link margin + leader route cost").
#[derive(Clone, Copy, Debug)]
pub struct ParentCandidate {
    pub source: MacAddress,
    pub rloc16: Rloc16,
    pub link_margin: u8,
    pub leader_route_cost: u8,
}

impl ParentCandidate {
    fn is_better_than(&self, other: &ParentCandidate) -> bool {
        if self.link_margin != other.link_margin {
            self.link_margin > other.link_margin
        } else {
            self.leader_route_cost < other.leader_route_cost
        }
    }
}

/// The node's own tie-break identity for leader election
/// (`SPEC_FULL.md` §4.9: "winning leader-weight/ext-address tie-break").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LeaderCandidacy {
    pub leader_weight: u8,
    pub ext_address: [u8; 8],
}

impl LeaderCandidacy {
    /// `true` if `self` should become leader ahead of `other`: higher
    /// weight wins, ties broken by the numerically larger extended address.
    pub fn wins_against(&self, other: &LeaderCandidacy) -> bool {
        if self.leader_weight != other.leader_weight {
            self.leader_weight > other.leader_weight
        } else {
            self.ext_address > other.ext_address
        }
    }
}

/// Owns the role state machine plus the partition/leader-data fields every
/// role transition reads or writes.
pub struct RoleState {
    role: Role,
    rloc16: Rloc16,
    leader_rloc16: Rloc16,
    partition_id: u32,
    leader_weight: u8,
    data_version: u8,
    stable_data_version: u8,
    best_parent: Option<ParentCandidate>,
}

impl RoleState {
    pub const fn new() -> Self {
        Self {
            role: Role::Disabled,
            rloc16: Rloc16::INVALID,
            leader_rloc16: Rloc16::INVALID,
            partition_id: 0,
            leader_weight: 0,
            data_version: 0,
            stable_data_version: 0,
            best_parent: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn rloc16(&self) -> Rloc16 {
        self.rloc16
    }

    pub fn leader_rloc16(&self) -> Rloc16 {
        self.leader_rloc16
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    /// `Start()`: begin attaching, awaiting Parent Responses
    /// (`SPEC_FULL.md` §4.9: "Detached → Child").
    pub fn start(&mut self) {
        self.role = Role::Detached;
        self.best_parent = None;
    }

    /// Records one Parent Response candidate, keeping only the best seen so
    /// far (link margin, then leader route cost).
    pub fn consider_parent(&mut self, candidate: ParentCandidate) {
        match &self.best_parent {
            Some(current) if !candidate.is_better_than(current) => {}
            _ => self.best_parent = Some(candidate),
        }
    }

    pub fn best_parent(&self) -> Option<ParentCandidate> {
        self.best_parent
    }

    /// Child ID Response received: attach as `Child` with the allocated
    /// RLOC16 (`SPEC_FULL.md` §4.9).
    pub fn attach_as_child(&mut self, rloc16: Rloc16, partition_id: u32, leader_rloc16: Rloc16) {
        self.role = Role::Child;
        self.rloc16 = rloc16;
        self.partition_id = partition_id;
        self.leader_rloc16 = leader_rloc16;
        self.best_parent = None;
    }

    /// Address-Solicit accepted by the Leader: assume the allocated Router
    /// ID and start advertising (`SPEC_FULL.md` §4.9: "Child → Router").
    pub fn promote_to_router(&mut self, router_id: u8) {
        self.role = Role::Router;
        self.rloc16 = Rloc16::new(router_id, 0);
    }

    /// `SPEC_FULL.md` §4.9: "Router → Child. Downgrade if neighbor count
    /// falls below `kRouterDowngradeThreshold` for a sustained period."
    /// Returns whether the downgrade actually applies (only meaningful from
    /// `Router`).
    pub fn downgrade_to_child(&mut self, neighbor_count: u8) -> bool {
        if self.role != Role::Router || neighbor_count >= ROUTER_DOWNGRADE_THRESHOLD {
            return false;
        }
        let router_id = self.rloc16.router_id();
        self.role = Role::Child;
        self.rloc16 = Rloc16::new(router_id, 1);
        true
    }

    /// Whether the current neighbor count satisfies the promotion
    /// criterion for sending an Address-Solicit (`SPEC_FULL.md` §4.9:
    /// "router upgrade threshold").
    pub fn satisfies_router_upgrade(&self, active_routers: u8) -> bool {
        self.role == Role::Child && active_routers < ROUTER_UPGRADE_THRESHOLD
    }

    /// `SPEC_FULL.md` §4.9: "Router → Leader. Only on partition formation
    /// or when no Leader is detected for `kNetworkIdTimeout` and the local
    /// node has the winning leader-weight/ext-address tie-break." Returns
    /// whether this node should become Leader.
    pub fn should_become_leader(
        &self,
        time_since_leader_heard_ms: u32,
        own: &LeaderCandidacy,
        best_known: Option<&LeaderCandidacy>,
    ) -> bool {
        if self.role != Role::Router {
            return false;
        }
        if time_since_leader_heard_ms < NETWORK_ID_TIMEOUT_MS {
            return false;
        }
        match best_known {
            Some(other) => own.wins_against(other),
            None => true,
        }
    }

    /// Forms (or wins) a new partition as Leader.
    pub fn become_leader(&mut self, partition_id: u32, leader_weight: u8) {
        let router_id = self.rloc16.router_id();
        self.role = Role::Leader;
        self.partition_id = partition_id;
        self.leader_weight = leader_weight;
        self.rloc16 = Rloc16::new(router_id, 0);
        self.leader_rloc16 = self.rloc16;
    }

    pub fn data_version(&self) -> u8 {
        self.data_version
    }

    pub fn stable_data_version(&self) -> u8 {
        self.stable_data_version
    }

    /// Applies the counters carried by a received Leader Data TLV.
    pub fn apply_leader_data(&mut self, data_version: u8, stable_data_version: u8) {
        self.data_version = data_version;
        self.stable_data_version = stable_data_version;
    }

    /// Exponential MLE Advertisement interval for the current attempt
    /// count, clamped to `[kAdvertiseIntervalMin, kAdvertiseIntervalMax]`
    /// (`SPEC_FULL.md` §4.9: "every 1-32 seconds with exponential backoff").
    pub fn advertise_interval_ms(attempt: u32) -> u32 {
        let doubled = ADVERTISE_INTERVAL_MIN_MS.saturating_mul(1u32 << attempt.min(5));
        doubled.min(ADVERTISE_INTERVAL_MAX_MS)
    }
}

impl Default for RoleState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_candidate_selection_prefers_link_margin_then_route_cost() {
        let mut role = RoleState::new();
        role.start();
        role.consider_parent(ParentCandidate {
            source: MacAddress::Short(1),
            rloc16: Rloc16::new(1, 0),
            link_margin: 10,
            leader_route_cost: 5,
        });
        role.consider_parent(ParentCandidate {
            source: MacAddress::Short(2),
            rloc16: Rloc16::new(2, 0),
            link_margin: 20,
            leader_route_cost: 9,
        });
        assert_eq!(role.best_parent().unwrap().rloc16, Rloc16::new(2, 0));
    }

    #[test]
    fn full_attach_sequence_detached_to_child_to_router() {
        let mut role = RoleState::new();
        role.start();
        assert_eq!(role.role(), Role::Detached);
        role.attach_as_child(Rloc16::new(3, 2), 42, Rloc16::new(3, 0));
        assert_eq!(role.role(), Role::Child);
        assert_eq!(role.partition_id(), 42);

        assert!(role.satisfies_router_upgrade(5));
        role.promote_to_router(7);
        assert_eq!(role.role(), Role::Router);
        assert_eq!(role.rloc16().router_id(), 7);
    }

    #[test]
    fn router_downgrades_below_threshold_and_stays_above_it() {
        let mut role = RoleState::new();
        role.start();
        role.attach_as_child(Rloc16::new(1, 1), 1, Rloc16::new(1, 0));
        role.promote_to_router(1);
        assert!(!role.downgrade_to_child(ROUTER_DOWNGRADE_THRESHOLD));
        assert_eq!(role.role(), Role::Router);
        assert!(role.downgrade_to_child(ROUTER_DOWNGRADE_THRESHOLD - 1));
        assert_eq!(role.role(), Role::Child);
    }

    #[test]
    fn leader_election_requires_timeout_and_winning_tie_break() {
        let mut role = RoleState::new();
        role.start();
        role.attach_as_child(Rloc16::new(4, 1), 1, Rloc16::new(4, 0));
        role.promote_to_router(4);

        let own = LeaderCandidacy {
            leader_weight: 64,
            ext_address: [9; 8],
        };
        let rival = LeaderCandidacy {
            leader_weight: 64,
            ext_address: [1; 8],
        };
        assert!(!role.should_become_leader(NETWORK_ID_TIMEOUT_MS - 1, &own, Some(&rival)));
        assert!(role.should_become_leader(NETWORK_ID_TIMEOUT_MS, &own, Some(&rival)));

        role.become_leader(99, 64);
        assert_eq!(role.role(), Role::Leader);
        assert_eq!(role.partition_id(), 99);
    }

    #[test]
    fn advertise_interval_doubles_up_to_the_max() {
        assert_eq!(RoleState::advertise_interval_ms(0), 1_000);
        assert_eq!(RoleState::advertise_interval_ms(1), 2_000);
        assert_eq!(RoleState::advertise_interval_ms(10), ADVERTISE_INTERVAL_MAX_MS);
    }
}
