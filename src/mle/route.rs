// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The router-to-router route-cost table built from received Route64 TLVs
//! (`SPEC_FULL.md` §4.9: "Routers recompute next-hop tables from received
//! advertisements using shortest-cost path").
//!
//! Grounded on `mle_constants.hpp`'s `kMaxRouterId = 62`/`kMaxRouters = 32`
//! (`examples/original_source/src/core/thread/mle_constants.hpp`); the
//! Route64 TLV's own wire layout was not retrieved in the pack, so this
//! module carries the decoded `(router_id, cost)` pairs a received TLV
//! yields, parsed by whatever layer terminates the MLE message (kept out of
//! this table to avoid re-deriving an unretrieved byte format).

use crate::net::mac_address::MAX_ROUTER_ID;

pub const MAX_ROUTE_ENTRIES: usize = MAX_ROUTER_ID as usize + 1;
/// `kMaxRouteCost` (`mle_constants.hpp`): a cost at or above this value
/// means "no route".
pub const MAX_ROUTE_COST: u8 = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct RouteEntry {
    next_hop_router_id: u8,
    cost: u8,
}

/// Per-router-id next hop and cumulative cost, recomputed whenever a
/// neighbor's advertised Route64 data changes.
pub struct RouteCostTable {
    entries: [Option<RouteEntry>; MAX_ROUTE_ENTRIES],
}

impl RouteCostTable {
    pub const fn new() -> Self {
        Self {
            entries: [None; MAX_ROUTE_ENTRIES],
        }
    }

    /// The direct cost to reach `router_id` itself, one hop away, at the
    /// given link quality (`SPEC_FULL.md` §4.9's 1=6/2=2/3=1 mapping).
    pub fn set_direct_neighbor(&mut self, router_id: u8, link_quality: u8) {
        let cost = crate::mle::neighbor::link_cost(link_quality);
        self.relax(router_id, router_id, cost);
    }

    /// Incorporates one neighbor's advertised `(destination_router_id,
    /// advertised_cost)` pairs: our own cost to `destination` via that
    /// neighbor is `cost_to(neighbor) + advertised_cost`, relaxed against
    /// whatever's already known (shortest-path update, mirroring a single
    /// Bellman-Ford relaxation round per advertisement received).
    pub fn update_from_advertisement(&mut self, neighbor_router_id: u8, advertised: &[(u8, u8)]) {
        let Some(cost_to_neighbor) = self.cost_to(neighbor_router_id) else {
            return;
        };
        for &(dest, advertised_cost) in advertised {
            if dest == neighbor_router_id {
                continue;
            }
            let total = cost_to_neighbor.saturating_add(advertised_cost);
            self.relax(dest, neighbor_router_id, total);
        }
    }

    fn relax(&mut self, router_id: u8, next_hop: u8, cost: u8) {
        let Some(slot) = self.entries.get_mut(router_id as usize) else {
            return;
        };
        let improves = match slot {
            Some(existing) => cost < existing.cost,
            None => true,
        };
        if improves && cost < MAX_ROUTE_COST {
            *slot = Some(RouteEntry {
                next_hop_router_id: next_hop,
                cost,
            });
        }
    }

    pub fn cost_to(&self, router_id: u8) -> Option<u8> {
        self.entries.get(router_id as usize)?.map(|e| e.cost)
    }

    pub fn next_hop(&self, router_id: u8) -> Option<u8> {
        self.entries.get(router_id as usize)?.map(|e| e.next_hop_router_id)
    }

    pub fn remove_router(&mut self, router_id: u8) {
        if let Some(slot) = self.entries.get_mut(router_id as usize) {
            *slot = None;
        }
        for slot in &mut self.entries {
            if let Some(entry) = slot {
                if entry.next_hop_router_id == router_id {
                    *slot = None;
                }
            }
        }
    }
}

impl Default for RouteCostTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_neighbor_cost_matches_link_quality_mapping() {
        let mut table = RouteCostTable::new();
        table.set_direct_neighbor(3, 3);
        assert_eq!(table.cost_to(3), Some(1));
        assert_eq!(table.next_hop(3), Some(3));
    }

    #[test]
    fn relayed_cost_is_additive_through_a_neighbor() {
        let mut table = RouteCostTable::new();
        table.set_direct_neighbor(2, 3); // cost 1 to router 2
        table.update_from_advertisement(2, &[(5, 2)]); // router 2 claims cost 2 to router 5
        assert_eq!(table.cost_to(5), Some(3));
        assert_eq!(table.next_hop(5), Some(2));
    }

    #[test]
    fn worse_relayed_cost_does_not_replace_a_better_route() {
        let mut table = RouteCostTable::new();
        table.set_direct_neighbor(2, 3); // cost 1
        table.set_direct_neighbor(5, 3); // direct cost 1 to router 5 too
        table.update_from_advertisement(2, &[(5, 10)]); // would be cost 11 via router 2
        assert_eq!(table.cost_to(5), Some(1));
        assert_eq!(table.next_hop(5), Some(5));
    }

    #[test]
    fn remove_router_clears_it_and_anything_routed_through_it() {
        let mut table = RouteCostTable::new();
        table.set_direct_neighbor(2, 3);
        table.update_from_advertisement(2, &[(5, 2)]);
        table.remove_router(2);
        assert_eq!(table.cost_to(2), None);
        assert_eq!(table.cost_to(5), None);
    }
}
