//! Interledger addresses, packets and fulfillment conditions.

mod address;
pub mod condition;
mod error;
mod packet;

pub use self::address::{Address, AddressError, Prefixes};
pub use self::error::{ErrorClass, ErrorCode};

pub use self::packet::{Fulfill, IlpResult, Prepare, Reject};
pub use self::packet::{FulfillBuilder, PrepareBuilder, RejectBuilder};
