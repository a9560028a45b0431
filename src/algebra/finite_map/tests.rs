use super::*;
use crate::algebra::Weight;

#[test]
fn increment_coalesces_and_drops_zero() {
    let mut map: FiniteHashMap<&str, Weight> = FiniteHashMap::empty();
    map.increment(&"a", Weight::new(2));
    map.increment(&"a", Weight::new(-2));
    assert!(!map.contains_key(&"a"));

    map.increment(&"b", Weight::new(3));
    assert_eq!(map.lookup(&"b"), Weight::new(3));
}

#[test]
fn add_merges_smaller_into_larger() {
    let mut a: FiniteHashMap<&str, Weight> = FiniteHashMap::empty();
    a.increment(&"x", Weight::new(1));
    a.increment(&"y", Weight::new(1));

    let mut b: FiniteHashMap<&str, Weight> = FiniteHashMap::empty();
    b.increment(&"y", Weight::new(-1));
    b.increment(&"z", Weight::new(5));

    let sum = a.add_by_ref(&b);
    assert_eq!(sum.lookup(&"x"), Weight::new(1));
    assert!(!sum.contains_key(&"y"));
    assert_eq!(sum.lookup(&"z"), Weight::new(5));
}

#[test]
fn negation_is_inverse() {
    let mut a: FiniteHashMap<&str, Weight> = FiniteHashMap::empty();
    a.increment(&"x", Weight::new(4));
    let neg = a.neg_by_ref();
    assert!(a.add_by_ref(&neg).is_zero());
}
