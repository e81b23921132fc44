//! Semantic ILP packets.
//!
//! Only the fields the connector needs for routing and settlement are
//! modelled; the OER wire encoding lives with the transport.

use crate::{Address, ErrorCode};
use bytes::Bytes;
use std::fmt;
use std::time::SystemTime;

pub type IlpResult = Result<Fulfill, Reject>;

#[derive(Clone, PartialEq)]
pub struct Prepare {
    destination: Address,
    amount: u64,
    expires_at: SystemTime,
    execution_condition: [u8; 32],
    data: Bytes,
}

impl Prepare {
    #[inline]
    pub fn destination(&self) -> &Address {
        &self.destination
    }

    #[inline]
    pub fn amount(&self) -> u64 {
        self.amount
    }

    #[inline]
    pub fn set_amount(&mut self, amount: u64) {
        self.amount = amount;
    }

    #[inline]
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    #[inline]
    pub fn set_expires_at(&mut self, expires_at: SystemTime) {
        self.expires_at = expires_at;
    }

    #[inline]
    pub fn execution_condition(&self) -> &[u8; 32] {
        &self.execution_condition
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns true once `now` has reached the packet's expiry.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Prepare {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Prepare")
            .field("destination", &self.destination)
            .field("amount", &self.amount)
            .field("expires_at", &self.expires_at)
            .field(
                "execution_condition",
                &hex::encode(&self.execution_condition),
            )
            .field("data_length", &self.data.len())
            .finish()
    }
}

#[derive(Clone, PartialEq)]
pub struct Fulfill {
    fulfillment: [u8; 32],
    data: Bytes,
}

impl Fulfill {
    #[inline]
    pub fn fulfillment(&self) -> &[u8; 32] {
        &self.fulfillment
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Fulfill {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("Fulfill")
            .field("fulfillment", &hex::encode(&self.fulfillment))
            .field("data_length", &self.data.len())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reject {
    code: ErrorCode,
    message: Bytes,
    triggered_by: Option<Address>,
    data: Bytes,
}

impl Reject {
    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[inline]
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    #[inline]
    pub fn triggered_by(&self) -> Option<&Address> {
        self.triggered_by.as_ref()
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrepareBuilder<'a> {
    pub destination: Address,
    pub amount: u64,
    pub expires_at: SystemTime,
    pub execution_condition: &'a [u8; 32],
    pub data: &'a [u8],
}

impl<'a> PrepareBuilder<'a> {
    pub fn build(&self) -> Prepare {
        Prepare {
            destination: self.destination.clone(),
            amount: self.amount,
            expires_at: self.expires_at,
            execution_condition: *self.execution_condition,
            data: Bytes::copy_from_slice(self.data),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FulfillBuilder<'a> {
    pub fulfillment: &'a [u8; 32],
    pub data: &'a [u8],
}

impl<'a> FulfillBuilder<'a> {
    pub fn build(&self) -> Fulfill {
        Fulfill {
            fulfillment: *self.fulfillment,
            data: Bytes::copy_from_slice(self.data),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RejectBuilder<'a> {
    pub code: ErrorCode,
    pub message: &'a [u8],
    pub triggered_by: Option<&'a Address>,
    pub data: &'a [u8],
}

impl<'a> RejectBuilder<'a> {
    pub fn build(&self) -> Reject {
        Reject {
            code: self.code,
            message: Bytes::copy_from_slice(self.message),
            triggered_by: self.triggered_by.cloned(),
            data: Bytes::copy_from_slice(self.data),
        }
    }
}
