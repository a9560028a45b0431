//! `Weight`: the signed 64-bit ring every `ZSet`/`IndexedZSet` leaf carries.
//!
//! Unlike the teacher's `CheckedInt<T>` (`algebra::checked_int`), which
//! panics on overflow (appropriate when overflow is a dataflow-internal
//! invariant violation), `Weight` arithmetic used by the public `ZSet`
//! surface goes through `checked_*` and returns `None` on saturation, so
//! callers can build a `DbspError::WeightOverflow { key }` with the
//! offending key in hand rather than aborting the process.

use crate::algebra::{AddAssignByRef, AddByRef, HasOne, HasZero, MulByRef, NegByRef};
use std::fmt::{self, Display, Formatter};
use std::ops::{Add, AddAssign, Neg, Sub};

/// A signed 64-bit multiplicity. Weight `0` is equivalent to absence.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
#[repr(transparent)]
pub struct Weight(i64);

impl Weight {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked multiplication; `None` on overflow.
    pub fn checked_mul(self, other: Self) -> Option<Self> {
        self.0.checked_mul(other.0).map(Self)
    }

    /// Checked negation; `None` on overflow (only possible at `i64::MIN`).
    pub fn checked_neg(self) -> Option<Self> {
        self.0.checked_neg().map(Self)
    }
}

impl From<i64> for Weight {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Weight> for i64 {
    fn from(value: Weight) -> Self {
        value.0
    }
}

impl HasZero for Weight {
    fn is_zero(&self) -> bool {
        self.0 == 0
    }

    fn zero() -> Self {
        Self(0)
    }
}

impl HasOne for Weight {
    fn one() -> Self {
        Self(1)
    }
}

// Infallible operator overloads are provided for convenience and test code;
// they panic on overflow like `CheckedInt`, which is acceptable there since
// test fixtures never approach i64's range. Code on the public `ZSet` path
// must use the `checked_*` methods above instead.
impl Add for Weight {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.checked_add(other).expect("weight overflow")
    }
}

impl Sub for Weight {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.checked_add(other.checked_neg().expect("weight overflow"))
            .expect("weight overflow")
    }
}

impl AddAssign for Weight {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl AddByRef for Weight {
    fn add_by_ref(&self, other: &Self) -> Self {
        *self + *other
    }
}

impl AddAssignByRef for Weight {
    fn add_assign_by_ref(&mut self, other: &Self) {
        *self = *self + *other;
    }
}

impl NegByRef for Weight {
    fn neg_by_ref(&self) -> Self {
        self.checked_neg().expect("weight overflow")
    }
}

impl Neg for Weight {
    type Output = Self;

    fn neg(self) -> Self {
        self.neg_by_ref()
    }
}

impl MulByRef for Weight {
    fn mul_by_ref(&self, other: &Self) -> Self {
        self.checked_mul(*other).expect("weight overflow")
    }
}

impl Display for Weight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

#[cfg(feature = "with-serde")]
impl serde::Serialize for Weight {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(feature = "with-serde")]
impl<'de> serde::Deserialize<'de> for Weight {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_arithmetic_detects_overflow() {
        let max = Weight::new(i64::MAX);
        assert_eq!(max.checked_add(Weight::new(1)), None);
        assert_eq!(max.checked_add(Weight::new(0)), Some(max));
    }

    #[test]
    fn zero_and_one() {
        assert!(Weight::zero().is_zero());
        assert!(!Weight::one().is_zero());
        assert_eq!(Weight::one().get(), 1);
    }

    #[test]
    fn negation_and_addition() {
        let five = Weight::new(5);
        let neg_five = five.neg_by_ref();
        assert_eq!(five.add_by_ref(&neg_five), Weight::zero());
    }
}
