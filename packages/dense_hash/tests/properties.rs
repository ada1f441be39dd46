//! Model-based property tests: random operation sequences are applied both to the collections
//! and to the standard library equivalents, which must agree after every step.

use std::collections::{HashMap, HashSet};

use buffer_pool::PoolSet;
use dense_hash::{Dictionary, Set};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, u32),
    Set(u16, u32),
    Remove(u16),
    Clear,
    Reserve(u16),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0..256_u16, any::<u32>()).prop_map(|(key, value)| Op::Insert(key, value)),
        3 => (0..256_u16, any::<u32>()).prop_map(|(key, value)| Op::Set(key, value)),
        4 => (0..256_u16).prop_map(Op::Remove),
        1 => Just(Op::Clear),
        1 => (0..600_u16).prop_map(Op::Reserve),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn dictionary_agrees_with_hash_map(ops in prop::collection::vec(op(), 0..400)) {
        let pools = PoolSet::diagnostic();

        {
            let mut dictionary = Dictionary::new_in(&pools);
            let mut model = HashMap::new();

            for op in ops {
                match op {
                    Op::Insert(key, value) => {
                        let inserted = dictionary.try_insert(key, value).unwrap();
                        prop_assert_eq!(inserted, !model.contains_key(&key));
                        model.entry(key).or_insert(value);
                    }
                    Op::Set(key, value) => {
                        prop_assert_eq!(dictionary.set(key, value).unwrap(), model.insert(key, value));
                    }
                    Op::Remove(key) => {
                        prop_assert_eq!(dictionary.remove(&key).unwrap(), model.remove(&key));
                    }
                    Op::Clear => {
                        dictionary.clear().unwrap();
                        model.clear();
                    }
                    Op::Reserve(capacity) => {
                        let capacity = usize::from(capacity);
                        prop_assert!(dictionary.ensure_capacity(capacity).unwrap() >= capacity);
                    }
                }

                dictionary.integrity_check();
                prop_assert_eq!(dictionary.len(), model.len());
                prop_assert!(dictionary.len() <= dictionary.capacity());
            }

            for (key, value) in &model {
                prop_assert_eq!(dictionary.get(key).unwrap(), Some(value));
            }

            let walked: HashMap<u16, u32> = dictionary
                .iter()
                .unwrap()
                .map(|(key, value)| (*key, *value))
                .collect();
            prop_assert_eq!(walked, model);
        }

        pools.assert_all_returned();
    }

    #[test]
    fn set_algebra_agrees_with_hash_set(
        left in prop::collection::vec(0..64_u8, 0..48),
        right in prop::collection::vec(0..64_u8, 0..48),
    ) {
        let pools = PoolSet::diagnostic();

        {
            let model_left: HashSet<u8> = left.iter().copied().collect();
            let model_right: HashSet<u8> = right.iter().copied().collect();

            let provider = &pools;
            let build = move |items: &[u8]| {
                let mut set = Set::new_in(provider);
                set.union_with(items.iter().copied()).unwrap();
                set
            };

            let set = build(&left);
            prop_assert_eq!(set.len(), model_left.len());

            let mut union = build(&left);
            union.union_with(right.iter().copied()).unwrap();
            union.integrity_check();
            let expected: HashSet<u8> = model_left.union(&model_right).copied().collect();
            prop_assert_eq!(union.iter().unwrap().copied().collect::<HashSet<u8>>(), expected);

            let mut intersection = build(&left);
            intersection.intersect_with(&right).unwrap();
            intersection.integrity_check();
            let expected: HashSet<u8> = model_left.intersection(&model_right).copied().collect();
            prop_assert_eq!(intersection.iter().unwrap().copied().collect::<HashSet<u8>>(), expected);

            let mut difference = build(&left);
            difference.except_with(&right).unwrap();
            difference.integrity_check();
            let expected: HashSet<u8> = model_left.difference(&model_right).copied().collect();
            prop_assert_eq!(difference.iter().unwrap().copied().collect::<HashSet<u8>>(), expected);

            let mut symmetric = build(&left);
            symmetric.symmetric_except_with(right.iter().copied()).unwrap();
            symmetric.integrity_check();
            let expected: HashSet<u8> =
                model_left.symmetric_difference(&model_right).copied().collect();
            prop_assert_eq!(symmetric.iter().unwrap().copied().collect::<HashSet<u8>>(), expected);

            prop_assert_eq!(set.is_subset_of(&right).unwrap(), model_left.is_subset(&model_right));
            prop_assert_eq!(set.is_superset_of(&right).unwrap(), model_left.is_superset(&model_right));
            prop_assert_eq!(
                set.is_proper_subset_of(&right).unwrap(),
                model_left.is_subset(&model_right) && model_left.len() < model_right.len()
            );
            prop_assert_eq!(
                set.is_proper_superset_of(&right).unwrap(),
                model_left.is_superset(&model_right) && model_left.len() > model_right.len()
            );
            prop_assert_eq!(set.overlaps(&right).unwrap(), !model_left.is_disjoint(&model_right));
            prop_assert_eq!(set.set_equals(&right).unwrap(), model_left == model_right);
        }

        pools.assert_all_returned();
    }
}
