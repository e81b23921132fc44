//! # ilp-connector
//!
//! The core of an Interledger connector. Incoming Prepare packets are routed
//! by longest matching prefix, the transfer between the incoming and
//! outgoing peers' accounts is reserved in the ledger, and the packet is
//! relayed to the next hop. A Fulfill whose preimage matches the packet's
//! condition commits the transfer; rejects, timeouts and bad fulfillments
//! roll it back.
//!
//! Transports, wire encodings and the administrative APIs live outside this
//! crate. Peers are plugged in through the [`PeerConnection`] trait and
//! outcomes are published on the [`EventBus`].

mod config;
mod connector;
mod error;
mod events;
mod forwarder;
mod peer;
mod registry;
mod trace;

pub use self::config::{AccountConfig, ConnectorConfig, PeerConfig, StaticRoute, ENV_PREFIX};
pub use self::connector::Connector;
pub use self::error::ConnectorError;
pub use self::events::{AlertKind, EventBus, OperatorAlert, Outcome, SettlementEvent};
pub use self::forwarder::{ForwardError, Forwarder, PacketState};
pub use self::peer::{connection_fn, ConnectionFn, PeerConnection, PeerDescriptor};
pub use self::registry::{Deregistered, PeerRegistry, ReleaseReservations};

pub use ::config::FileFormat;
pub use ilp_router::{PeerId, RoutingRelation};
