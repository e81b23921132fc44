//! Error types shared by the connector core crates.

mod ledger_store_error;
pub use ledger_store_error::LedgerStoreError;

mod ledger_error;
pub use ledger_error::{LedgerError, Leg};

mod trustline_error;
pub use trustline_error::TrustlineError;

mod peer_error;
pub use peer_error::PeerError;

mod routing_error;
pub use routing_error::RoutingError;
