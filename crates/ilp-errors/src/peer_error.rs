use thiserror::Error;

/// Errors for the Peer Registry and the peer transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PeerError {
    #[error("peer {0} is unreachable")]
    PeerUnreachable(String),
    #[error("peer {0} is already registered")]
    AlreadyRegistered(String),
}
