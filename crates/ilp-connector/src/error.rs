use ilp_errors::{LedgerError, PeerError, RoutingError, TrustlineError};
use thiserror::Error;

/// Errors from setting up and administering a [`Connector`](crate::Connector).
/// Packet failures are answered with Reject packets instead.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConnectorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Trustline(#[from] TrustlineError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("peer {0} is not configured")]
    UnknownPeer(String),
}
