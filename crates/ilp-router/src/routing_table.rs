use crate::PeerId;
use dashmap::DashMap;
use ilp_packet::Address;
use once_cell::sync::Lazy;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, trace};

static RANDOM: Lazy<SystemRandom> = Lazy::new(SystemRandom::new);

/// A route toward every address under `prefix`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub prefix: Address,
    pub next_hop: PeerId,
    /// Connectors the route announcement has already passed through
    #[serde(default)]
    pub path: Vec<PeerId>,
}

impl Route {
    pub fn new(prefix: Address, next_hop: PeerId) -> Self {
        Route {
            prefix,
            next_hop,
            path: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: Vec<PeerId>) -> Self {
        self.path = path;
        self
    }

    pub fn passes_through(&self, id: &PeerId) -> bool {
        self.path.iter().any(|hop| hop == id)
    }
}

/// The routing table is identified by an ID (a UUID in array form) and an "epoch".
/// When a connector restarts it generates a new ID for its routing table.
/// Each insert or removal increments the epoch, so it acts as a version tracker
/// for the route-exchange collaborator.
///
/// Routes are sharded by prefix, so writers only exclude readers of the same
/// prefix.
pub struct RoutingTable {
    id: [u8; 16],
    epoch: AtomicU32,
    own_id: PeerId,
    routes: DashMap<Address, Route>,
}

impl RoutingTable {
    /// Create a table for the connector identified by `own_id`. Routes whose
    /// path already contains `own_id` are never resolved.
    pub fn new(own_id: PeerId) -> Self {
        let mut id = [0; 16];
        RANDOM.fill(&mut id).expect("Unable to get randomness");
        RoutingTable::with_id(id, own_id)
    }

    pub fn with_id(id: [u8; 16], own_id: PeerId) -> Self {
        RoutingTable {
            id,
            epoch: AtomicU32::new(0),
            own_id,
            routes: DashMap::new(),
        }
    }

    pub fn id(&self) -> [u8; 16] {
        self.id
    }

    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn own_id(&self) -> &PeerId {
        &self.own_id
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Set the route for `route.prefix`, replacing the one that was there
    /// before. Returns the replaced route.
    pub fn insert(&self, route: Route) -> Option<Route> {
        trace!(
            "Setting route for prefix {} via {} (path: {:?})",
            route.prefix,
            route.next_hop,
            route.path
        );
        let previous = self.routes.insert(route.prefix.clone(), route);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        previous
    }

    /// Remove the route for exactly this prefix. Returns the removed route.
    pub fn remove(&self, prefix: &Address) -> Option<Route> {
        let removed = self.routes.remove(prefix).map(|(_, route)| route);
        if removed.is_some() {
            trace!("Removed route for prefix {}", prefix);
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    /// The route stored for exactly this prefix
    pub fn get(&self, prefix: &Address) -> Option<Route> {
        self.routes.get(prefix).map(|entry| entry.value().clone())
    }

    /// Get the best route for the destination: the longest stored prefix
    /// (counted in segments) whose route does not loop back through us.
    pub fn resolve(&self, destination: &Address) -> Option<Route> {
        self.resolve_excluding(destination, &[])
    }

    /// Like `resolve`, but also skips routes whose next hop is one of
    /// `excluded`. Used to find an alternate route after a peer failed.
    pub fn resolve_excluding(&self, destination: &Address, excluded: &[PeerId]) -> Option<Route> {
        // Each prefix of the destination is one hash lookup, longest first
        for prefix in destination.prefixes() {
            let route = match self.routes.get(prefix) {
                Some(entry) => entry,
                None => continue,
            };
            if route.passes_through(&self.own_id) {
                trace!(
                    "Ignoring route for {} because its path contains our own id {}",
                    prefix,
                    self.own_id
                );
                continue;
            }
            if excluded.contains(&route.next_hop) {
                continue;
            }
            return Some(route.value().clone());
        }
        None
    }

    /// Withdraw every route whose next hop is `peer`. Returns the withdrawn
    /// prefixes.
    pub fn withdraw_peer(&self, peer: &PeerId) -> Vec<Address> {
        let prefixes: Vec<Address> = self
            .routes
            .iter()
            .filter(|entry| &entry.value().next_hop == peer)
            .map(|entry| entry.key().clone())
            .collect();

        let withdrawn: Vec<Address> = prefixes
            .into_iter()
            .filter(|prefix| {
                self.routes
                    .remove_if(prefix, |_, route| &route.next_hop == peer)
                    .is_some()
            })
            .collect();

        if !withdrawn.is_empty() {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            debug!(
                "Withdrew {} route(s) via peer {}: {:?}",
                withdrawn.len(),
                peer,
                withdrawn
            );
        }
        withdrawn
    }

    /// Stored prefixes equal to or under `prefix` (segment-wise), sorted.
    /// Pass `None` to list every prefix.
    pub fn prefixes_starting_with(&self, prefix: Option<&Address>) -> Vec<Address> {
        let mut prefixes: Vec<Address> = self
            .routes
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|stored| prefix.map_or(true, |prefix| prefix.is_prefix_of(stored)))
            .collect();
        prefixes.sort();
        prefixes
    }

    /// A snapshot of all routes, sorted by prefix
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self
            .routes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        routes.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        routes
    }

    /// Find the shortest unambiguous prefix of `address`.
    ///
    /// The best route for `a.b.c` might be stored under `a`, but that route
    /// does not apply to everything under `a` if a more specific prefix such
    /// as `a.c` exists. This returns the least specific prefix of `address`,
    /// never shorter than `minimum`, under which no other stored prefix
    /// lives (here `a.b`).
    ///
    /// Returns `None` if `minimum` is not a prefix of `address`.
    pub fn shortest_unambiguous_prefix(
        &self,
        address: &Address,
        minimum: &Address,
    ) -> Option<Address> {
        if !minimum.is_prefix_of(address) {
            return None;
        }
        let total_segments = address.segment_count();
        let mut segments = minimum.segment_count();
        let mut candidate = minimum.clone();

        for stored in self.prefixes_starting_with(Some(minimum)) {
            while candidate != stored && candidate.is_prefix_of(&stored) {
                if segments == total_segments {
                    return Some(candidate);
                }
                segments += 1;
                candidate = address.truncate(segments)?;
            }
        }
        Some(candidate)
    }
}
