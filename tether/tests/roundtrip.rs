//! Round-trip laws over the supported universe.

use std::collections::{
    BTreeMap,
    HashMap,
};
use std::time::Duration;
use tether::{
    prelude::*,
    Codec,
    Describe,
};

fn kernel() -> Tether {
    Tether::new(Config::default()).expect("kernel")
}

fn roundtrip<T: Codec + PartialEq + core::fmt::Debug>(value: T) {
    let kernel = kernel();
    let bytes = kernel.to_bytes(&value).expect("encode");
    let out: T = kernel.decode(&bytes).expect("decode");
    assert_eq!(out, value);
}

#[derive(Codec, Describe, Default, Debug, Clone, PartialEq)]
struct Account {
    balance: i64,
    id: u32,
    name: String,
    tags: Vec<String>,
}

#[derive(Codec, Describe, Default, Debug, Clone, PartialEq)]
struct Ledger {
    accounts: Vec<Account>,
    totals: BTreeMap<String, i64>,
}

#[derive(Codec, Describe, Default, Debug, Clone, PartialEq)]
struct Pair<T> {
    left: T,
    right: T,
}

#[derive(Codec, Describe, Default, Debug, Clone, PartialEq)]
struct Wrapped(u16, String);

#[derive(Codec, Describe, Default, Debug, Clone, PartialEq)]
struct Cached {
    key: String,
    #[tether(skip)]
    hits: u64,
}

#[test]
fn derived_aggregates_roundtrip() {
    roundtrip(Account {
        balance: -250,
        id: 19,
        name: "savings".into(),
        tags: vec!["cold".into(), "insured".into()],
    });

    roundtrip(Ledger {
        accounts: vec![Account::default(), Account {
            balance: 1,
            id: 2,
            name: "x".into(),
            tags: vec![],
        }],
        totals: BTreeMap::from([("eur".to_string(), 40)]),
    });

    roundtrip(Pair {
        left: vec![1u32, 2],
        right: vec![3u32],
    });
    roundtrip(Wrapped(7, "tuple".into()));
}

#[test]
fn members_encode_in_identifier_order() {
    // `balance` precedes `id` precedes `name`, whatever the declaration
    // order says.
    #[derive(Codec, Describe, Default, Debug, PartialEq)]
    struct Shuffled {
        name: u8,
        balance: u8,
        id: u8,
    }

    let kernel = kernel();
    let bytes = kernel
        .to_bytes(&Shuffled {
            name: 3,
            balance: 1,
            id: 2,
        })
        .unwrap();
    assert_eq!(bytes, [1, 2, 3]);
}

#[test]
fn skipped_members_decode_to_their_default() {
    let kernel = kernel();
    let bytes = kernel
        .to_bytes(&Cached {
            key: "k".into(),
            hits: 999,
        })
        .unwrap();
    let out: Cached = kernel.decode(&bytes).unwrap();
    assert_eq!(out.key, "k");
    assert_eq!(out.hits, 0);
}

#[test]
fn std_universe_roundtrips() {
    roundtrip(HashMap::from([(1u32, vec!["a".to_string()]), (2, vec![])]));
    roundtrip(Duration::from_millis(1500));
    roundtrip((u8::MAX, i64::MIN, f32::MIN_POSITIVE));
    roundtrip(MdArray::<i16, 3>::new([2, 1, 2], [0, 0, 5], vec![1, 2, 3, 4]).unwrap());
}

#[test]
fn aggregates_may_hold_reference_slots() {
    #[derive(Codec, Describe, Default, Debug)]
    struct Holder {
        one: Option<Ref<String>>,
        two: Option<Ref<String>>,
    }

    let kernel = kernel();
    let shared = Ref::new(String::from("shared"));
    let holder = Holder {
        one: Some(shared.clone()),
        two: Some(shared),
    };

    let out: Holder = kernel.decode(&kernel.to_bytes(&holder).unwrap()).unwrap();
    let one = out.one.expect("first slot");
    let two = out.two.expect("second slot");
    assert!(one.ptr_eq(&two));
    assert_eq!(*one.lock(), "shared");
}

#[test]
fn nested_generic_aggregates_roundtrip() {
    roundtrip(Pair {
        left: Pair {
            left: 1u8,
            right: 2u8,
        },
        right: Pair {
            left: 3u8,
            right: 4u8,
        },
    });
}
