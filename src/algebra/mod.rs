//! The weighted-multiset algebra (L0): the value domain every operator
//! communicates through.
//!
//! The trait family below (`HasZero`, `AddByRef`, `NegByRef`, ...) mirrors
//! the teacher's generic-ring-of-values approach rather than hard-coding
//! `+`/`-` on a single concrete type, so `Weight` and the group of
//! `ZSet`/`IndexedZSet` containers built on top of it share one vocabulary.

pub mod finite_map;
pub mod indexed_zset;
pub mod weight;
pub mod zset;

pub use indexed_zset::IndexedZSet;
pub use weight::Weight;
pub use zset::{ZSet, ZSetBuilder};

/// A value with a distinguished zero / identity element.
pub trait HasZero {
    fn is_zero(&self) -> bool;
    fn zero() -> Self;
}

/// A value with a distinguished multiplicative identity.
pub trait HasOne {
    fn one() -> Self;
}

/// Addition that does not consume its operands.
pub trait AddByRef {
    fn add_by_ref(&self, other: &Self) -> Self;
}

/// In-place addition by reference.
pub trait AddAssignByRef {
    fn add_assign_by_ref(&mut self, other: &Self);
}

/// Negation that does not consume its operand.
pub trait NegByRef {
    fn neg_by_ref(&self) -> Self;
}

/// Multiplication that does not consume its operands.
pub trait MulByRef {
    fn mul_by_ref(&self, other: &Self) -> Self;
}

/// A value from a commutative monoid: has a zero and an associative,
/// commutative addition.
pub trait MonoidValue: Clone + Eq + HasZero + AddAssignByRef + 'static {}

impl<T> MonoidValue for T where T: Clone + Eq + HasZero + AddAssignByRef + 'static {}

/// A value from a commutative group: a monoid with negation. This is the
/// bound every weight type used as a `ZSet`/`IndexedZSet` leaf must satisfy.
pub trait GroupValue: MonoidValue + AddByRef + NegByRef {}

impl<T> GroupValue for T where T: MonoidValue + AddByRef + NegByRef {}

/// Values that can report how many leaf entries they contribute, used by
/// the trace layer's size accounting.
pub trait WithNumEntries {
    fn num_entries(&self) -> usize;
}
