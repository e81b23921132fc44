//! # ilp-router
//!
//! The connector's routing table: a longest-matching-prefix map from ILP
//! address prefixes to the peer that is the next hop toward them.
//!
//! The table does not build itself. Routes are either configured statically
//! or inserted and withdrawn by a route-exchange (CCP) collaborator; the
//! table only resolves destinations and enumerates what it holds.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

mod routing_table;

pub use self::routing_table::{Route, RoutingTable};

/// Identifier of a peer (or of this connector) in the routing fabric.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        PeerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        PeerId(id.to_string())
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The type of business relationship we have with a peer
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingRelation {
    /// The peer we receive our ILP address from and send unroutable packets to
    Parent = 1,
    /// A peer we exchange routes with on equal footing
    Peer = 2,
    /// A peer that gets its address from us
    Child = 3,
}

impl FromStr for RoutingRelation {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, ()> {
        match string.to_lowercase().as_str() {
            "parent" => Ok(RoutingRelation::Parent),
            "peer" => Ok(RoutingRelation::Peer),
            "child" => Ok(RoutingRelation::Child),
            _ => Err(()),
        }
    }
}

impl RoutingRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingRelation::Parent => "parent",
            RoutingRelation::Peer => "peer",
            RoutingRelation::Child => "child",
        }
    }
}

impl fmt::Display for RoutingRelation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relation_case_insensitively() {
        assert_eq!(RoutingRelation::from_str("Parent"), Ok(RoutingRelation::Parent));
        assert_eq!(RoutingRelation::from_str("PEER"), Ok(RoutingRelation::Peer));
        assert_eq!(RoutingRelation::from_str("child"), Ok(RoutingRelation::Child));
        assert!(RoutingRelation::from_str("sibling").is_err());
        assert_eq!(RoutingRelation::Child as u8, 3);
    }

    #[test]
    fn peer_id_is_a_plain_string_on_the_wire() {
        let id = PeerId::from("example.peer-a");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"example.peer-a\"");
        assert_eq!(id.to_string(), "example.peer-a");
    }
}
