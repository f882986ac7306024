// Property tests for the policy file codec and key-store.
//
// Arbitrary stores are built from a sequence of set/delete/clear operations,
// then pushed through serialize/parse to check that nothing is lost and that
// re-serialization is byte-identical.

use gp_registry::{codec, PolEntry, PolStore, RegistryStore, TypedValue};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Set(String, String, TypedValue),
    Delete(String, String),
    Clear(String),
}

fn name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ._-]{0,12}"
}

fn key() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        r"Software\Policies\Acme".to_string(),
        r"Software\Policies\Acme\List".to_string(),
        r"SOFTWARE\Policies\Contoso".to_string(),
    ])
}

fn value() -> impl Strategy<Value = TypedValue> {
    prop_oneof![
        "[^\u{0}]{0,20}".prop_map(TypedValue::String),
        "[^\u{0}]{0,20}".prop_map(TypedValue::ExpandString),
        any::<u32>().prop_map(TypedValue::U32),
        any::<u64>().prop_map(TypedValue::U64),
        prop::collection::vec("[^\u{0}]{1,8}", 0..4).prop_map(TypedValue::MultiString),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(TypedValue::Bytes),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (key(), name(), value()).prop_map(|(k, n, v)| Op::Set(k, n, v)),
        2 => (key(), name()).prop_map(|(k, n)| Op::Delete(k, n)),
        1 => key().prop_map(Op::Clear),
    ]
}

fn build(ops: &[Op]) -> PolStore {
    let mut store = PolStore::new();
    for op in ops {
        match op {
            Op::Set(k, n, v) => store.set(k, n, v.clone()).unwrap(),
            Op::Delete(k, n) => store.delete(k, n).unwrap(),
            Op::Clear(k) => store.clear_key(k).unwrap(),
        }
    }
    store
}

proptest! {
    #[test]
    fn reserialization_is_byte_identical(ops in prop::collection::vec(op(), 0..40)) {
        let bytes = build(&ops).serialize();
        let reparsed = PolStore::parse(&bytes).unwrap();
        prop_assert_eq!(reparsed.serialize(), bytes);
    }

    #[test]
    fn parsed_store_answers_like_the_original(ops in prop::collection::vec(op(), 0..40)) {
        let store = build(&ops);
        let reparsed = PolStore::parse(&store.serialize()).unwrap();
        prop_assert_eq!(reparsed.entries(), store.entries());
        for key in [r"Software\Policies\Acme", r"Software\Policies\Acme\List", r"SOFTWARE\Policies\Contoso"] {
            // Write order survives the file, not just the set of names.
            let names = store.value_names(key);
            prop_assert_eq!(&names, &reparsed.value_names(key));
            for n in &names {
                prop_assert_eq!(store.get(key, n).unwrap(), reparsed.get(key, n).unwrap());
            }
        }
    }

    #[test]
    fn raw_entries_survive_the_codec(entries in prop::collection::vec(
        (name(), name(), any::<u32>(), prop::collection::vec(any::<u8>(), 0..24)),
        0..10,
    )) {
        let entries: Vec<PolEntry> = entries
            .into_iter()
            .map(|(key, value_name, kind, data)| PolEntry { key, value_name, kind, data })
            .collect();
        prop_assert_eq!(codec::parse(&codec::serialize(&entries)).unwrap(), entries);
    }
}

#[test]
fn typed_values_come_back_typed() {
    let mut store = PolStore::new();
    let key = r"Software\Policies\Acme";
    let values = vec![
        ("s", TypedValue::String("hello".into())),
        ("e", TypedValue::ExpandString("%SystemRoot%".into())),
        ("d", TypedValue::U32(u32::MAX)),
        ("q", TypedValue::U64(1 << 40)),
        ("m", TypedValue::MultiString(vec!["one".into()])),
        ("b", TypedValue::Bytes(vec![0xde, 0xad])),
    ];
    for (n, v) in &values {
        store.set(key, n, v.clone()).unwrap();
    }
    let reparsed = PolStore::parse(&store.serialize()).unwrap();
    for (n, v) in values {
        assert_eq!(reparsed.get(key, n).unwrap(), Some(v));
    }
}
