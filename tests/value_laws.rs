//! Property-based tests for the value protocol.
//!
//! `a.equals(b)` must imply `a.hash_code() == b.hash_code()` for every
//! built-in implementation, and equality must be reflexive and symmetric.

use persistent_collections::persistent::{OrderedMap, PersistentList, PersistentMap, PersistentSet};
use persistent_collections::value::{Hash, Structural, Value, hash, is, smi};
use proptest::prelude::*;
use rstest::rstest;

fn assert_contract<T: Value + ?Sized>(first: &T, second: &T) -> Result<(), TestCaseError> {
    prop_assert!(first.equals(first));
    prop_assert_eq!(first.equals(second), second.equals(first));
    if first.equals(second) {
        prop_assert_eq!(first.hash_code(), second.hash_code());
    }
    Ok(())
}

fn is_small(hash: Hash) -> bool {
    smi(hash) == hash
}

proptest! {
    #[test]
    fn prop_integer_contract(first in any::<i64>(), second in any::<i64>()) {
        assert_contract(&first, &second)?;
        assert_contract(&first, &first.clone())?;
        prop_assert!(is_small(first.hash_code()));
    }

    #[test]
    fn prop_float_contract(first in any::<f64>(), second in any::<f64>()) {
        assert_contract(&first, &second)?;
        prop_assert!(is_small(first.hash_code()));
    }

    #[test]
    fn prop_integral_float_matches_integer(value in -1_000_000_i64..1_000_000) {
        #[allow(clippy::cast_precision_loss)]
        let float = value as f64;
        prop_assert_eq!(float.hash_code(), value.hash_code());
    }

    #[test]
    fn prop_string_contract(first in ".{0,40}", second in ".{0,40}") {
        assert_contract(first.as_str(), second.as_str())?;
        prop_assert_eq!(first.hash_code(), first.as_str().hash_code());
        prop_assert!(is_small(first.hash_code()));
    }

    #[test]
    fn prop_tuple_contract(first in (any::<u8>(), ".{0,4}"), second in (any::<u8>(), ".{0,4}")) {
        assert_contract(&first, &second)?;
    }

    #[test]
    fn prop_structural_contract(first in any::<(u8, bool)>(), second in any::<(u8, bool)>()) {
        assert_contract(&Structural(first), &Structural(second))?;
    }

    #[test]
    fn prop_container_contract(first in prop::collection::vec(0_u8..8, 0..6), second in prop::collection::vec(0_u8..8, 0..6)) {
        let lists = (
            first.iter().copied().collect::<PersistentList<u8>>(),
            second.iter().copied().collect::<PersistentList<u8>>(),
        );
        assert_contract(&lists.0, &lists.1)?;

        let sets = (
            first.iter().copied().collect::<PersistentSet<u8>>(),
            second.iter().copied().collect::<PersistentSet<u8>>(),
        );
        assert_contract(&sets.0, &sets.1)?;

        let maps = (
            first.iter().map(|&key| (key, u16::from(key))).collect::<PersistentMap<u8, u16>>(),
            second.iter().map(|&key| (key, u16::from(key))).collect::<PersistentMap<u8, u16>>(),
        );
        assert_contract(&maps.0, &maps.1)?;

        let ordered = (
            first.iter().map(|&key| (key, ())).collect::<OrderedMap<u8, ()>>(),
            second.iter().map(|&key| (key, ())).collect::<OrderedMap<u8, ()>>(),
        );
        assert_contract(&ordered.0, &ordered.1)?;
    }
}

#[rstest]
fn test_nan_is_self_equal() {
    assert!(is(&f64::NAN, &f64::NAN));
    assert!(f64::NAN.equals(&-f64::NAN));
    assert_eq!(hash(&f64::NAN), 0);
}

#[rstest]
fn test_nan_works_as_a_map_key() {
    let map = PersistentMap::new().set(f64::NAN, "nan").set(1.5, "one and a half");
    assert_eq!(map.get(&f64::NAN), Some(&"nan"));
    assert_eq!(map.set(f64::NAN, "again").len(), 2);
}

#[rstest]
fn test_signed_zero_keys_collapse() {
    let map = PersistentMap::new().set(0.0_f64, 'a').set(-0.0_f64, 'b');
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&0.0), Some(&'b'));
}

#[rstest]
fn test_containers_nest_as_keys() {
    let key = PersistentList::of([PersistentSet::of([1, 2])]);
    let map = PersistentMap::new().set(key, "nested");
    let probe = PersistentList::of([PersistentSet::of([2, 1])]);
    assert_eq!(map.get(&probe), Some(&"nested"));
}
