//! Binding between an execution condition and its fulfillment.
//!
//! A condition is the SHA-256 digest of a 32-byte preimage (the fulfillment).

use ring::constant_time::verify_slices_are_equal;
use ring::digest::{digest, SHA256};

/// Hash a fulfillment preimage into the condition a Prepare must carry.
pub fn derive_condition(preimage: &[u8; 32]) -> [u8; 32] {
    let mut out = [0; 32];
    out.copy_from_slice(digest(&SHA256, preimage).as_ref());
    out
}

/// Returns true if `sha256(fulfillment) == condition`.
///
/// The comparison runs in constant time with respect to the position of the
/// first differing byte.
pub fn verify(condition: &[u8; 32], fulfillment: &[u8; 32]) -> bool {
    let generated = digest(&SHA256, fulfillment);
    verify_slices_are_equal(generated.as_ref(), condition).is_ok()
}
