//! Identity- and cycle-preserving reference slots.

use tether::{
    error::Malformed,
    prelude::*,
    Codec,
    Describe,
    Error,
};

fn kernel() -> Tether {
    Tether::new(Config::default()).expect("kernel")
}

#[derive(Codec, Describe, Default, Debug)]
struct Node {
    next: Option<Ref<Node>>,
    value: u32,
}

#[test]
fn shared_references_write_one_payload_and_one_back_reference() {
    let kernel = kernel();
    let a = Ref::new(1u32);
    let b = Ref::new(2u32);
    let list = vec![a.clone(), b, a];

    let bytes = kernel.to_bytes(&list).expect("encode");
    // Three slots: NEW payload-a, NEW payload-b, BACK(0).
    assert_eq!(
        bytes,
        [
            0x03, // length
            0x01, 0x01, 0x00, 0x00, 0x00, // NEW, a = 1
            0x01, 0x02, 0x00, 0x00, 0x00, // NEW, b = 2
            0x02, // BACK(0)
        ]
    );

    let out: Vec<Ref<u32>> = kernel.decode(&bytes).expect("decode");
    assert_eq!(out.len(), 3);
    assert!(out[0].ptr_eq(&out[2]));
    assert!(!out[0].ptr_eq(&out[1]));
    assert_eq!(*out[0].lock(), 1);
    assert_eq!(*out[1].lock(), 2);
}

#[test]
fn equal_values_are_not_coalesced() {
    // Identity is by reference, never by structural equality.
    let kernel = kernel();
    let a = Ref::new(7u32);
    let b = Ref::new(7u32);
    let out: Vec<Ref<u32>> = kernel
        .decode(&kernel.to_bytes(&vec![a, b]).unwrap())
        .unwrap();
    assert!(!out[0].ptr_eq(&out[1]));
}

#[test]
fn self_loop_roundtrips() {
    let kernel = kernel();
    let node = Ref::new(Node {
        next: None,
        value: 7,
    });
    node.lock().next = Some(node.clone());

    let bytes = kernel.to_bytes(&node).expect("encode");
    // NEW, then the payload resolves the self-reference as BACK(0).
    assert_eq!(bytes, [0x01, 0x02, 0x07, 0x00, 0x00, 0x00]);

    let out: Ref<Node> = kernel.decode(&bytes).expect("decode");
    let inner = out.lock().next.clone().expect("self link");
    assert!(inner.ptr_eq(&out));
    assert_eq!(out.lock().value, 7);
}

#[test]
fn two_node_cycle_roundtrips() {
    let kernel = kernel();
    let a = Ref::new(Node {
        next: None,
        value: 1,
    });
    let b = Ref::new(Node {
        next: Some(a.clone()),
        value: 2,
    });
    a.lock().next = Some(b.clone());

    let out: Ref<Node> = kernel.decode(&kernel.to_bytes(&a).unwrap()).unwrap();
    let second = out.lock().next.clone().expect("a -> b");
    let third = second.lock().next.clone().expect("b -> a");
    assert!(third.ptr_eq(&out));
    assert_eq!(second.lock().value, 2);
}

#[test]
fn null_slots_roundtrip_and_nonnull_slots_reject_null() {
    let kernel = kernel();
    let bytes = kernel.to_bytes(&Option::<Ref<u32>>::None).unwrap();
    assert_eq!(bytes, [0x00]);
    let out: Option<Ref<u32>> = kernel.decode(&bytes).unwrap();
    assert!(out.is_none());

    assert!(matches!(
        kernel.decode::<Ref<u32>>(&bytes),
        Err(Error::Malformed(Malformed::UnexpectedNull))
    ));
}

#[test]
fn dangling_back_reference_is_malformed() {
    let kernel = kernel();
    // BACK(3) with no slots allocated.
    assert!(matches!(
        kernel.decode::<Ref<u32>>(&[0x05]),
        Err(Error::Malformed(Malformed::BadIndex { index: 3, count: 0 }))
    ));
}

#[test]
fn identity_is_per_call() {
    let kernel = kernel();
    let node = Ref::new(9u32);
    let first = kernel.to_bytes(&node).unwrap();
    let second = kernel.to_bytes(&node).unwrap();
    // A second top-level encode starts a fresh identity table, so the same
    // object is NEW again rather than a cross-call back-reference.
    assert_eq!(first, second);
    assert_eq!(first[0], 0x01);
}

#[test]
fn decoded_graph_topology_matches_encode_counts() {
    let kernel = kernel();
    let shared = Ref::new(Node {
        next: None,
        value: 3,
    });
    let graph = vec![
        Ref::new(Node {
            next: Some(shared.clone()),
            value: 1,
        }),
        Ref::new(Node {
            next: Some(shared.clone()),
            value: 2,
        }),
        shared,
    ];

    let out: Vec<Ref<Node>> = kernel.decode(&kernel.to_bytes(&graph).unwrap()).unwrap();
    let first_next = out[0].lock().next.clone().unwrap();
    let second_next = out[1].lock().next.clone().unwrap();
    assert!(first_next.ptr_eq(&second_next));
    assert!(first_next.ptr_eq(&out[2]));
}
