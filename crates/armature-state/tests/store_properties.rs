//! Property tests for the store: any JSON-serializable state round-trips
//! through save/load on every field, and key derivation is deterministic.

use std::rc::Rc;

use armature_state::key::derive_key;
use armature_state::{JsonMap, MemoryTier, PersistentStateStore, StateKey};
use proptest::collection::btree_map;
use proptest::prelude::*;
use serde_json::Value;

#[derive(Debug, Clone)]
enum Leaf {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<i64>),
}

impl Leaf {
    fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::from(s.clone()),
            Self::List(ns) => Value::from(ns.clone()),
        }
    }
}

fn leaf_strategy() -> impl Strategy<Value = Leaf> {
    prop_oneof![
        Just(Leaf::Null),
        any::<bool>().prop_map(Leaf::Bool),
        any::<i64>().prop_map(Leaf::Int),
        // Finite floats only: NaN/inf are not JSON.
        (-1.0e9f64..1.0e9).prop_map(Leaf::Float),
        "[a-zA-Z0-9 àéñ🙂]{0,12}".prop_map(Leaf::Text),
        proptest::collection::vec(any::<i64>(), 0..4).prop_map(Leaf::List),
    ]
}

fn state_strategy() -> impl Strategy<Value = JsonMap> {
    btree_map("[a-z_][a-z0-9_]{0,8}", leaf_strategy(), 0..8).prop_map(|fields| {
        fields
            .into_iter()
            .map(|(k, v)| (k, v.to_value()))
            .collect()
    })
}

fn memory_store() -> PersistentStateStore {
    PersistentStateStore::new(Rc::new(MemoryTier::new()), Rc::new(MemoryTier::new()))
}

proptest! {
    #[test]
    fn save_load_round_trips_every_field(state in state_strategy()) {
        let store = memory_store();
        let key = StateKey::from("prop-key");
        prop_assert!(store.save(&key, &state));
        let loaded = store.load(&key).expect("record present after save");
        for (field, value) in &state {
            prop_assert_eq!(loaded.get(field), Some(value));
        }
        prop_assert_eq!(loaded.len(), state.len());
    }

    #[test]
    fn repeated_saves_serve_the_last_write(
        first in state_strategy(),
        second in state_strategy(),
    ) {
        let store = memory_store();
        let key = StateKey::from("prop-key");
        store.save(&key, &first);
        store.save(&key, &second);
        prop_assert_eq!(store.load(&key), Some(second));
    }

    #[test]
    fn explicit_id_derivation_ignores_uid(
        id in "[a-z][a-z0-9-]{0,16}",
        uid_a in "[0-9]{1,12}-[0-9]{1,6}",
        uid_b in "[0-9]{1,12}-[0-9]{1,6}",
    ) {
        prop_assert_eq!(
            derive_key(Some(&id), "Widget", &uid_a),
            derive_key(Some(&id), "Widget", &uid_b),
        );
    }

    #[test]
    fn uid_derivation_separates_instances(
        uid_a in "[0-9]{1,12}-[0-9]{1,6}",
        uid_b in "[0-9]{1,12}-[0-9]{1,6}",
    ) {
        prop_assume!(uid_a != uid_b);
        prop_assert_ne!(
            derive_key(None, "Widget", &uid_a),
            derive_key(None, "Widget", &uid_b),
        );
    }
}
