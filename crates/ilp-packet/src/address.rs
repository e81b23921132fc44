//! ILP address types.
//!
//! Reference: [ILP Addresses - v2.0.0](https://github.com/interledger/rfcs/blob/master/0015-ilp-addresses/0015-ilp-addresses.md).
//!
//! Addresses double as routing prefixes, so a single segment such as `g` is
//! accepted. All prefix comparisons are segment-wise: `g.alice` is a prefix of
//! `g.alice.wallet` but not of `g.alicebob`.

// Addresses are never empty.
#![allow(clippy::len_without_is_empty)]

use std::borrow::Borrow;
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const MAX_ADDRESS_LENGTH: usize = 1023;
const SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("address is longer than 1023 bytes")]
    TooLong,
    #[error("address contains an empty segment")]
    EmptySegment,
    #[error("address contains invalid byte {0:#04x}")]
    InvalidByte(u8),
}

/// A validated, dot-segmented ILP address. Cloning is cheap.
#[derive(Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Address(Arc<str>);

impl Address {
    /// # Panics
    ///
    /// Panics if the string is not a valid ILP address. Intended for
    /// constants and tests; use `Address::from_str` otherwise.
    pub fn new(address: &'static str) -> Self {
        Address::from_str(address).expect("invalid ILP address")
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn segments(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.split(SEPARATOR)
    }

    pub fn segment_count(&self) -> usize {
        self.0.matches(SEPARATOR).count() + 1
    }

    /// The first segment (`g`, `test`, `private`, ...).
    pub fn scheme(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// Returns true if `self` is `other` or a segment-wise prefix of it.
    pub fn is_prefix_of(&self, other: &Address) -> bool {
        let prefix = self.as_str();
        let other = other.as_str();
        other.starts_with(prefix)
            && (other.len() == prefix.len()
                || other.as_bytes()[prefix.len()] == SEPARATOR as u8)
    }

    /// All segment-wise prefixes of this address, longest (the address
    /// itself) first.
    pub fn prefixes(&self) -> Prefixes<'_> {
        Prefixes {
            remaining: Some(self.as_str()),
        }
    }

    /// The address truncated to its first `segments` segments.
    pub fn truncate(&self, segments: usize) -> Option<Address> {
        if segments == 0 {
            return None;
        }
        self.prefixes()
            .find(|prefix| prefix.matches(SEPARATOR).count() + 1 == segments)
            .map(|prefix| Address(Arc::from(prefix)))
    }

    pub fn with_suffix(&self, suffix: &str) -> Result<Address, AddressError> {
        let mut address = String::with_capacity(self.len() + 1 + suffix.len());
        address.push_str(self.as_str());
        address.push(SEPARATOR);
        address.push_str(suffix);
        Address::try_from(address)
    }
}

/// Iterator over the segment-wise prefixes of an address.
pub struct Prefixes<'a> {
    remaining: Option<&'a str>,
}

impl<'a> Iterator for Prefixes<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let current = self.remaining?;
        self.remaining = current.rfind(SEPARATOR).map(|index| &current[..index]);
        Some(current)
    }
}

fn validate(address: &str) -> Result<(), AddressError> {
    if address.is_empty() {
        return Err(AddressError::Empty);
    }
    if address.len() > MAX_ADDRESS_LENGTH {
        return Err(AddressError::TooLong);
    }
    for segment in address.split(SEPARATOR) {
        if segment.is_empty() {
            return Err(AddressError::EmptySegment);
        }
        if let Some(&byte) = segment.as_bytes().iter().find(|&&b| !is_segment_byte(b)) {
            return Err(AddressError::InvalidByte(byte));
        }
    }
    Ok(())
}

/// <https://github.com/interledger/rfcs/blob/master/0015-ilp-addresses/0015-ilp-addresses.md#address-requirements>
fn is_segment_byte(byte: u8) -> bool {
    byte == b'_' || byte == b'-' || byte == b'~' || byte.is_ascii_alphanumeric()
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        validate(src)?;
        Ok(Address(Arc::from(src)))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(src: String) -> Result<Self, Self::Error> {
        validate(&src)?;
        Ok(Address(Arc::from(src)))
    }
}

impl AsRef<str> for Address {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Borrow<str> for Address {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.debug_tuple("Address").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let string = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Address::from_str(&string).map_err(serde::de::Error::custom)
    }
}
