//! Property-based tests for PersistentList.
//!
//! Every list operation is checked against `Vec` as a model.

use persistent_collections::persistent::PersistentList;
use persistent_collections::value::Value;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Push(i32),
    Pop,
    Unshift(i32),
    Shift,
    Set(usize, i32),
    Slice(usize, usize),
}

fn arbitrary_operations() -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(
        prop_oneof![
            6 => any::<i32>().prop_map(Operation::Push),
            2 => Just(Operation::Pop),
            3 => any::<i32>().prop_map(Operation::Unshift),
            2 => Just(Operation::Shift),
            2 => (any::<usize>(), any::<i32>()).prop_map(|(index, value)| Operation::Set(index, value)),
            1 => (any::<usize>(), any::<usize>()).prop_map(|(begin, end)| Operation::Slice(begin, end)),
        ],
        0..300,
    )
}

fn apply(list: &PersistentList<i32>, model: &mut Vec<i32>, operation: &Operation) -> PersistentList<i32> {
    match *operation {
        Operation::Push(value) => {
            model.push(value);
            list.push(value)
        }
        Operation::Pop => {
            model.pop();
            list.pop()
        }
        Operation::Unshift(value) => {
            model.insert(0, value);
            list.unshift(value)
        }
        Operation::Shift => {
            if !model.is_empty() {
                model.remove(0);
            }
            list.shift()
        }
        Operation::Set(index, value) => {
            if model.is_empty() {
                return list.clone();
            }
            let index = index % model.len();
            model[index] = value;
            list.set(index, value)
        }
        Operation::Slice(begin, end) => {
            let length = model.len() + 1;
            let (begin, end) = (begin % length, end % length);
            if begin < end {
                *model = model[begin..end].to_vec();
            } else {
                model.clear();
            }
            list.slice(begin..end)
        }
    }
}

proptest! {
    #[test]
    fn prop_matches_vec(operations in arbitrary_operations()) {
        let mut model = Vec::new();
        let mut list = PersistentList::new();
        for operation in &operations {
            list = apply(&list, &mut model, operation);
            prop_assert_eq!(list.len(), model.len());
        }
        prop_assert_eq!(list.to_vec(), model.clone());
        prop_assert!(list.iter().rev().eq(model.iter().rev()));
    }

    #[test]
    fn prop_persistence(initial in prop::collection::vec(any::<i32>(), 0..200), operations in arbitrary_operations()) {
        let base: PersistentList<i32> = initial.iter().copied().collect();
        let mut model = initial.clone();
        let _ = operations.iter().fold(base.clone(), |list, operation| apply(&list, &mut model, operation));
        prop_assert_eq!(base.to_vec(), initial);
    }

    #[test]
    fn prop_round_trip(values in prop::collection::vec(any::<i32>(), 0..2000)) {
        let list: PersistentList<i32> = values.iter().copied().collect();
        let rebuilt: PersistentList<i32> = list.to_vec().into_iter().collect();
        prop_assert_eq!(&rebuilt, &list);
        prop_assert_eq!(list.to_vec(), values);
    }

    #[test]
    fn prop_batch_equivalence(values in prop::collection::vec(any::<i32>(), 0..500)) {
        let individual = values.iter().fold(PersistentList::new(), |list, &value| {
            if value % 2 == 0 { list.push(value) } else { list.unshift(value) }
        });
        let batched = PersistentList::new().with_mutations(|list| {
            for &value in &values {
                if value % 2 == 0 { list.push(value) } else { list.unshift(value) }
            }
        });
        prop_assert_eq!(&individual, &batched);
        prop_assert_eq!(individual.hash_code(), batched.hash_code());
    }

    #[test]
    fn prop_insert_remove_inverse(values in prop::collection::vec(any::<i32>(), 0..300), index in any::<usize>(), value in any::<i32>()) {
        let list: PersistentList<i32> = values.into_iter().collect();
        let index = index % (list.len() + 1);
        let inserted = list.insert(index, value);
        prop_assert_eq!(inserted.get(index), Some(&value));
        prop_assert_eq!(inserted.remove(index), list);
    }
}
