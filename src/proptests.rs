use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::SubjectTree;

/// Reference implementation: a plain ordered map.
#[derive(Default)]
struct Model {
    map: BTreeMap<Vec<u8>, u64>,
}

impl Model {
    fn insert(&mut self, key: Vec<u8>, value: u64) -> Option<u64> {
        self.map.insert(key, value)
    }

    fn get(&self, key: &[u8]) -> Option<&u64> {
        self.map.get(key)
    }

    fn remove(&mut self, key: &[u8]) -> Option<u64> {
        self.map.remove(key)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Actions replayed against both the tree and the model.
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(KeyValue),
    Find(Key),
    Delete(Key),
}

#[derive(Debug, Clone)]
struct Key(Vec<u8>);

#[derive(Debug, Clone)]
struct KeyValue {
    key: Key,
    value: u64,
}

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            // Dotted subjects over a tiny alphabet: lots of shared
            // prefixes, splits and collapses.
            "[ab]{1,3}(\\.[ab0-9]{1,3}){0,3}".prop_map(|s| Key(s.into_bytes())),
            // Single flat tokens.
            "[a-z]{1,8}".prop_map(|s| Key(s.into_bytes())),
            // Deeper service-style subjects.
            "svc\\.[a-d]{1,2}\\.[0-9]{1,3}\\.[a-d]{1,2}".prop_map(|s| Key(s.into_bytes())),
            // Arbitrary bytes, minus the reserved no-pivot byte that
            // insert would reject.
            prop::collection::vec(any::<u8>().prop_filter("no DEL", |b| *b != 0x7F), 1..12)
                .prop_map(Key),
        ]
        .boxed()
    }
}

impl Arbitrary for KeyValue {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Key>(), any::<u64>())
            .prop_map(|(key, value)| KeyValue { key, value })
            .boxed()
    }
}

/// Harness running each action against both implementations.
#[derive(Default)]
struct Test {
    tree: SubjectTree<u64>,
    model: Model,
}

impl Test {
    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(kv) => {
                let key = kv.key.0;
                let (old, updated) = self.tree.insert(&key, kv.value);
                let model_old = self.model.insert(key.clone(), kv.value);
                assert_eq!(
                    old, model_old,
                    "insert mismatch for key {:?}",
                    key.escape_ascii().to_string()
                );
                assert_eq!(updated, model_old.is_some());
            }
            Action::Find(key) => {
                let tree_result = self.tree.find(&key.0);
                let model_result = self.model.get(&key.0);
                assert_eq!(
                    tree_result,
                    model_result,
                    "find mismatch for key {:?}",
                    key.0.escape_ascii().to_string()
                );
            }
            Action::Delete(key) => {
                let tree_result = self.tree.delete(&key.0);
                let model_result = self.model.remove(&key.0);
                assert_eq!(
                    tree_result,
                    model_result,
                    "delete mismatch for key {:?}",
                    key.0.escape_ascii().to_string()
                );
            }
        }
        assert_eq!(self.tree.size(), self.model.len() as u64);
        assert_eq!(self.tree.is_empty(), self.model.is_empty());
    }

    /// Whole-tree checks run after a full action sequence.
    fn check_against_model(&self) {
        // Ordered iteration delivers exactly the model's keys, in the
        // model's (lexicographic) order.
        let mut walked = Vec::new();
        self.tree.iter_ordered(|subject, value| {
            walked.push((subject.to_vec(), *value));
            true
        });
        let expected: Vec<(Vec<u8>, u64)> =
            self.model.map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(walked, expected);

        // The fast walk visits every entry exactly once.
        let mut fast = Vec::new();
        self.tree.iter_fast(|subject, value| {
            fast.push((subject.to_vec(), *value));
            true
        });
        fast.sort();
        let mut sorted_expected = expected.clone();
        sorted_expected.sort();
        assert_eq!(fast, sorted_expected);

        // A stored subject used verbatim as a filter matches itself and
        // nothing else, as long as it holds no wildcard bytes. A leading
        // separator is folded away by the filter parser, so such keys are
        // not self-matching.
        for (key, value) in self.model.map.iter().take(16) {
            if key.contains(&crate::PWC)
                || key.contains(&crate::FWC)
                || key.first() == Some(&crate::TSEP)
            {
                continue;
            }
            let mut hits = Vec::new();
            self.tree.match_filter(key, |subject, v| hits.push((subject.to_vec(), *v)));
            assert_eq!(
                hits,
                [(key.clone(), *value)],
                "literal match for {:?}",
                key.escape_ascii().to_string()
            );
        }

        assert_eq!(self.tree.verify_integrity(), Vec::<String>::new());
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn behaves_like_btreemap(actions in prop::collection::vec(any::<Action>(), 1..64)) {
        let mut test = Test::default();
        for action in actions {
            test.execute(action);
        }
        test.check_against_model();
    }
}
