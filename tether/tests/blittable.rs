//! The byte-copy fast path and the analysis that authorizes it.

use tether::{
    prelude::*,
    Codec,
    Describe,
};

#[derive(Codec, Describe, Default, Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct Vec3 {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Codec, Describe, Default, Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct Padded {
    a: u8,
    b: u32,
}

#[derive(Codec, Describe, Default, Debug, Clone, Copy, PartialEq)]
struct Unordered {
    x: f32,
    y: f32,
}

#[derive(Codec, Describe, Default, Debug, Clone, Copy, PartialEq)]
#[repr(C)]
struct Flagged {
    on: bool,
    pad1: bool,
    pad2: bool,
    pad3: bool,
}

#[test]
fn blittability_requires_layout_members_and_no_padding() {
    // Declared layout, blittable members, sum of sizes equals the whole.
    assert!(Vec3::BLITTABLE);
    // Padding between `a` and `b` breaks the size equation.
    assert!(!Padded::BLITTABLE);
    // No declared layout.
    assert!(!Unordered::BLITTABLE);
    // A bool member cannot be reconstructed from arbitrary bytes.
    assert!(!Flagged::BLITTABLE);
}

#[test]
fn non_blittable_aggregates_still_roundtrip_member_wise() {
    let kernel = Tether::new(Config::default()).unwrap();
    let value = Padded { a: 7, b: 0x01020304 };
    let bytes = kernel.to_bytes(&value).unwrap();
    // One byte for `a`, four for `b`: five bytes, not size_of::<Padded>().
    assert_eq!(bytes, [0x07, 0x04, 0x03, 0x02, 0x01]);
    assert_eq!(kernel.decode::<Padded>(&bytes).unwrap(), value);
}

#[test]
fn byte_copy_formatter_agrees_with_the_member_wise_one() {
    let kernel = Tether::new(Config::default().register::<Vec3>()).unwrap();
    let value = Vec3 {
        x: 1.0,
        y: -2.5,
        z: 0.125,
    };

    // Member-wise bytes come from the typed path.
    let member_wise = kernel.to_bytes(&value).unwrap();
    assert_eq!(member_wise.len(), core::mem::size_of::<Vec3>());

    // The polymorphic path routes through the chain, which picks the
    // byte-copy formatter for a blittable aggregate.
    let erased = kernel.to_bytes(&ObjRef::new(value)).unwrap();
    let payload = &erased[erased.len() - member_wise.len()..];
    assert_eq!(payload, member_wise);

    let out: ObjRef = kernel.decode(&erased).unwrap();
    assert_eq!(*out.downcast::<Vec3>().unwrap().lock(), value);
}

#[test]
fn blittable_element_blocks_roundtrip() {
    let kernel = Tether::new(Config::default()).unwrap();

    let points = vec![
        Vec3 {
            x: 1.0,
            y: 2.0,
            z: 3.0,
        },
        Vec3 {
            x: -1.0,
            y: -2.0,
            z: -3.0,
        },
    ];
    let bytes = kernel.to_bytes(&points).unwrap();
    assert_eq!(bytes.len(), 1 + 2 * core::mem::size_of::<Vec3>());
    assert_eq!(kernel.decode::<Vec<Vec3>>(&bytes).unwrap(), points);

    let raw = vec![0x01u8, 0x02, 0x03];
    let bytes = kernel.to_bytes(&raw).unwrap();
    assert_eq!(bytes, [0x03, 0x01, 0x02, 0x03]);
    assert_eq!(kernel.decode::<Vec<u8>>(&bytes).unwrap(), raw);
}

#[test]
fn truncated_blittable_block_is_malformed() {
    let kernel = Tether::new(Config::default()).unwrap();
    // Claims four elements but carries two bytes.
    assert!(kernel.decode::<Vec<u32>>(&[0x04, 0xaa, 0xbb]).is_err());
}
