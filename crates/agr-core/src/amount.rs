//! # Token Amounts
//!
//! `Amount` is the unit every balance, collateral and fee is expressed in.
//! Arithmetic is checked: overflow and underflow surface as
//! [`CoreError`] instead of wrapping silently.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A non-negative token amount in the token's smallest unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Create an amount from raw units.
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Raw units.
    pub fn units(&self) -> u64 {
        self.0
    }

    /// True for the zero amount.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Amount) -> Result<Amount, CoreError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(CoreError::AmountOverflow {
                left: self.0,
                right: rhs.0,
            })
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, CoreError> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount)
            .ok_or(CoreError::AmountUnderflow {
                left: self.0,
                right: rhs.0,
            })
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_sub(rhs.0))
    }

    /// Split into two halves; the second half carries the odd unit.
    pub fn split_half(self) -> (Amount, Amount) {
        let lower = self.0 / 2;
        (Amount(lower), Amount(self.0 - lower))
    }
}

impl From<u64> for Amount {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn checked_add_overflow_is_an_error() {
        let err = Amount(u64::MAX).checked_add(Amount(1)).unwrap_err();
        assert!(matches!(err, CoreError::AmountOverflow { .. }));
    }

    #[test]
    fn checked_sub_underflow_is_an_error() {
        let err = Amount(1).checked_sub(Amount(2)).unwrap_err();
        assert!(matches!(err, CoreError::AmountUnderflow { left: 1, right: 2 }));
    }

    #[test]
    fn saturating_sub_clamps_at_zero() {
        assert_eq!(Amount(5).saturating_sub(Amount(9)), Amount::ZERO);
        assert_eq!(Amount(9).saturating_sub(Amount(5)), Amount(4));
    }

    #[test]
    fn split_half_gives_odd_unit_to_second_half() {
        assert_eq!(Amount(7).split_half(), (Amount(3), Amount(4)));
        assert_eq!(Amount(8).split_half(), (Amount(4), Amount(4)));
    }

    proptest! {
        #[test]
        fn split_half_conserves_total(units in any::<u64>()) {
            let (a, b) = Amount(units).split_half();
            prop_assert_eq!(a.checked_add(b).unwrap(), Amount(units));
        }

        #[test]
        fn add_then_sub_is_identity(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let sum = Amount(a).checked_add(Amount(b)).unwrap();
            prop_assert_eq!(sum.checked_sub(Amount(b)).unwrap(), Amount(a));
        }
    }
}
