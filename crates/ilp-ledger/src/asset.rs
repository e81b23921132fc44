//! Conversion of integer amounts between asset scales.

/// An amount converted to another scale, together with what the conversion
/// dropped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Normalized {
    pub amount: u64,
    /// The fractional part truncated away when scaling down, expressed in the
    /// source scale. Always zero when scaling up.
    pub remainder: u64,
}

/// Convert `amount` from `from_scale` to `to_scale`.
///
/// Scaling up multiplies by `10^(to - from)` exactly; scaling down divides by
/// `10^(from - to)` and truncates. Returns `None` if the result does not fit
/// in a `u64`.
pub fn normalize(amount: u64, from_scale: u8, to_scale: u8) -> Option<u64> {
    normalize_with_remainder(amount, from_scale, to_scale).map(|normalized| normalized.amount)
}

/// Like `normalize`, but also reports the truncated remainder so it can be
/// recorded as a rounding loss.
pub fn normalize_with_remainder(amount: u64, from_scale: u8, to_scale: u8) -> Option<Normalized> {
    if from_scale == to_scale {
        return Some(Normalized {
            amount,
            remainder: 0,
        });
    }

    if to_scale > from_scale {
        let factor = 10u64.checked_pow(u32::from(to_scale - from_scale))?;
        let amount = amount.checked_mul(factor)?;
        Some(Normalized {
            amount,
            remainder: 0,
        })
    } else {
        // 10^20 exceeds u64::MAX, at which point every u64 truncates to zero
        match 10u64.checked_pow(u32::from(from_scale - to_scale)) {
            Some(divisor) => Some(Normalized {
                amount: amount / divisor,
                remainder: amount % divisor,
            }),
            None => Some(Normalized {
                amount: 0,
                remainder: amount,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_scale_is_identity() {
        assert_eq!(normalize(12345, 6, 6), Some(12345));
    }

    #[test]
    fn scales_up_exactly() {
        assert_eq!(normalize(500, 2, 9), Some(5_000_000_000));
        assert_eq!(normalize(1, 0, 19), Some(10_000_000_000_000_000_000));
    }

    #[test]
    fn scales_down_with_truncation() {
        assert_eq!(
            normalize_with_remainder(5_000_000_123, 9, 2),
            Some(Normalized {
                amount: 500,
                remainder: 123,
            })
        );
        assert_eq!(normalize(99, 2, 0), Some(0));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(normalize(u64::MAX, 0, 1), None);
        assert_eq!(normalize(1, 0, 20), None);
    }

    #[test]
    fn huge_scale_down_truncates_to_zero() {
        assert_eq!(
            normalize_with_remainder(u64::MAX, 25, 0),
            Some(Normalized {
                amount: 0,
                remainder: u64::MAX,
            })
        );
    }

    proptest! {
        #[test]
        fn scale_up_then_down_round_trips(
            amount in 0u64..1_000_000_000_000,
            from in 0u8..10,
            up in 0u8..7,
        ) {
            let to = from + up;
            let scaled = normalize(amount, from, to).unwrap();
            prop_assert_eq!(normalize(scaled, to, from), Some(amount));
        }

        #[test]
        fn scale_down_then_up_never_overshoots(
            amount in any::<u64>(),
            to in 0u8..10,
            down in 1u8..10,
        ) {
            let from = to + down;
            let normalized = normalize_with_remainder(amount, from, to).unwrap();
            if let Some(restored) = normalize(normalized.amount, to, from) {
                prop_assert!(restored <= amount);
                prop_assert_eq!(restored + normalized.remainder, amount);
            }
        }
    }
}
