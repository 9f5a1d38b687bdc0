//! Randomized round-trip laws.

use quickcheck_macros::quickcheck;
use tether::prelude::*;

fn kernel() -> Tether {
    Tether::new(Config::default()).expect("kernel")
}

fn holds<T: tether::Codec + PartialEq>(value: T) -> bool {
    let kernel = kernel();
    let bytes = match kernel.to_bytes(&value) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    kernel.decode::<T>(&bytes).map_or(false, |out| out == value)
}

#[quickcheck]
fn scalars_roundtrip(a: u64, b: i64, c: bool, d: char) -> bool {
    holds(a) && holds(b) && holds(c) && holds(d)
}

#[quickcheck]
fn strings_roundtrip(value: String) -> bool {
    holds(value)
}

#[quickcheck]
fn byte_vectors_roundtrip(value: Vec<u8>) -> bool {
    holds(value)
}

#[quickcheck]
fn nested_vectors_roundtrip(value: Vec<Vec<u32>>) -> bool {
    holds(value)
}

#[quickcheck]
fn maps_roundtrip(value: std::collections::BTreeMap<String, i64>) -> bool {
    holds(value)
}

#[quickcheck]
fn shared_graphs_preserve_identity(values: Vec<u32>, shares: Vec<u8>) -> bool {
    // Build a slot list where each entry either introduces a fresh node or
    // aliases an earlier one, then check the alias classes survive.
    let kernel = kernel();
    let mut nodes: Vec<Ref<u32>> = Vec::new();
    let mut alias_of: Vec<usize> = Vec::new();
    for (index, value) in values.iter().enumerate() {
        let share = shares.get(index).copied().unwrap_or(0) as usize;
        if !nodes.is_empty() && share % 3 == 0 {
            let target = share % nodes.len();
            nodes.push(nodes[target].clone());
            alias_of.push(alias_of[target]);
        } else {
            nodes.push(Ref::new(*value));
            alias_of.push(index);
        }
    }

    let bytes = kernel.to_bytes(&nodes).expect("encode");
    let out: Vec<Ref<u32>> = kernel.decode(&bytes).expect("decode");
    if out.len() != nodes.len() {
        return false
    }
    for i in 0..out.len() {
        for j in 0..out.len() {
            let aliased_in = alias_of[i] == alias_of[j];
            let aliased_out = out[i].ptr_eq(&out[j]);
            if aliased_in != aliased_out {
                return false
            }
        }
    }
    true
}

#[quickcheck]
fn decode_never_panics_on_random_bytes(bytes: Vec<u8>) -> bool {
    // Arbitrary input must either decode or fail cleanly, never panic.
    let kernel = kernel();
    let _ = kernel.decode::<Vec<String>>(&bytes);
    let _ = kernel.decode::<Ref<u32>>(&bytes);
    let _ = kernel.decode::<ObjRef>(&bytes);
    true
}
