//! Container codecs.
//!
//! Single-dimensional sequences are a varuint length followed by the
//! elements; keyed collections follow with key/value pairs; multi-dimensional
//! arrays carry per-dimension lengths and lower bounds before a row-major
//! element block. Blittable element blocks are raw byte copies.

use crate::{
    blit,
    codec::{
        Codec,
        DecodeCx,
        EncodeCx,
    },
    error::Error,
};
use core::mem::{
    size_of,
    MaybeUninit,
};
use std::collections::{
    BTreeMap,
    BTreeSet,
    HashMap,
    HashSet,
    VecDeque,
};
use tether_wire::{
    Input,
    Output,
    VarintRead,
    VarintWrite,
};

/// Per-element allocation floor used when charging the decode budget, so a
/// hostile length prefix cannot claim billions of zero-cost elements.
fn element_cost<T>() -> usize {
    size_of::<T>().max(1)
}

fn read_seq_len<T, I: Input + ?Sized>(
    cx: &mut DecodeCx<'_>,
    input: &mut I,
) -> Result<usize, Error> {
    let len = input.read_len()?;
    cx.charge(len.saturating_mul(element_cost::<T>()))?;
    Ok(len)
}

fn encode_block<T: Codec, O: Output + ?Sized>(
    cx: &mut EncodeCx<'_>,
    out: &mut O,
    items: &[T],
) -> Result<(), Error> {
    if blit::fast_path::<T>() {
        blit::write_slice(out, items)
    } else {
        for item in items {
            item.encode(cx, out)?;
        }
        Ok(())
    }
}

fn decode_block<T: Codec, I: Input + ?Sized>(
    cx: &mut DecodeCx<'_>,
    input: &mut I,
    len: usize,
) -> Result<Vec<T>, Error> {
    if blit::fast_path::<T>() {
        blit::read_vec(input, len)
    } else {
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(cx, input)?);
        }
        Ok(items)
    }
}

impl<T: Codec> Codec for Vec<T> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        out.write_len(self.len())?;
        encode_block(cx, out, self.as_slice())
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let len = read_seq_len::<T, _>(cx, input)?;
        decode_block(cx, input, len)
    }
}

impl<T: Codec> Codec for VecDeque<T> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        out.write_len(self.len())?;
        for item in self {
            item.encode(cx, out)?;
        }
        Ok(())
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let len = read_seq_len::<T, _>(cx, input)?;
        Ok(decode_block(cx, input, len)?.into())
    }
}

impl<T: Codec, const N: usize> Codec for [T; N] {
    // A fixed array is elements back to back; padding cannot appear between
    // elements, so blittability is exactly the element's.
    const BLITTABLE: bool = T::BLITTABLE;

    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        encode_block(cx, out, self.as_slice())
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let mut uninit = <MaybeUninit<[T; N]>>::uninit();
        let mut ptr = uninit.as_mut_ptr() as *mut T;
        for _ in 0..N {
            let decoded = T::decode(cx, input)?;
            // SAFETY: the pointer walks the N slots of the array exactly
            // once, and uninitialized contents are never read.
            #[allow(unsafe_code)]
            unsafe {
                core::ptr::write(ptr, decoded);
                ptr = ptr.add(1);
            }
        }
        // SAFETY: all N elements were initialized above.
        #[allow(unsafe_code)]
        Ok(unsafe { uninit.assume_init() })
    }
}

impl<T: Codec + Eq + std::hash::Hash> Codec for HashSet<T> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        out.write_len(self.len())?;
        for item in self {
            item.encode(cx, out)?;
        }
        Ok(())
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let len = read_seq_len::<T, _>(cx, input)?;
        let mut set = HashSet::with_capacity(len);
        for _ in 0..len {
            set.insert(T::decode(cx, input)?);
        }
        Ok(set)
    }
}

impl<T: Codec + Ord> Codec for BTreeSet<T> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        out.write_len(self.len())?;
        for item in self {
            item.encode(cx, out)?;
        }
        Ok(())
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let len = read_seq_len::<T, _>(cx, input)?;
        let mut set = BTreeSet::new();
        for _ in 0..len {
            set.insert(T::decode(cx, input)?);
        }
        Ok(set)
    }
}

fn pair_cost<K, V>() -> usize {
    size_of::<K>().saturating_add(size_of::<V>()).max(1)
}

impl<K: Codec + Eq + std::hash::Hash, V: Codec> Codec for HashMap<K, V> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        out.write_len(self.len())?;
        for (key, value) in self {
            key.encode(cx, out)?;
            value.encode(cx, out)?;
        }
        Ok(())
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let len = input.read_len()?;
        cx.charge(len.saturating_mul(pair_cost::<K, V>()))?;
        let mut map = HashMap::with_capacity(len);
        for _ in 0..len {
            let key = K::decode(cx, input)?;
            let value = V::decode(cx, input)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<K: Codec + Ord, V: Codec> Codec for BTreeMap<K, V> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        out.write_len(self.len())?;
        for (key, value) in self {
            key.encode(cx, out)?;
            value.encode(cx, out)?;
        }
        Ok(())
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let len = input.read_len()?;
        cx.charge(len.saturating_mul(pair_cost::<K, V>()))?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let key = K::decode(cx, input)?;
            let value = V::decode(cx, input)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

/// A dense multi-dimensional array with per-dimension lower bounds.
///
/// Elements are stored row-major: the last dimension varies fastest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdArray<T, const R: usize> {
    lens: [usize; R],
    lowers: [usize; R],
    data: Vec<T>,
}

impl<T, const R: usize> MdArray<T, R> {
    /// Build an array from its dimensions and row-major data.
    ///
    /// Returns `None` when the product of the lengths does not match the
    /// element count.
    pub fn new(lens: [usize; R], lowers: [usize; R], data: Vec<T>) -> Option<Self> {
        let expected = lens
            .iter()
            .try_fold(1usize, |acc, len| acc.checked_mul(*len))?;
        (expected == data.len()).then_some(Self { lens, lowers, data })
    }

    /// Per-dimension lengths.
    pub fn lens(&self) -> &[usize; R] {
        &self.lens
    }

    /// Per-dimension lower bounds.
    pub fn lowers(&self) -> &[usize; R] {
        &self.lowers
    }

    /// Row-major elements.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Element at the given absolute indices, honoring lower bounds.
    pub fn get(&self, indices: [usize; R]) -> Option<&T> {
        let mut offset = 0usize;
        for dim in 0..R {
            let relative = indices[dim].checked_sub(self.lowers[dim])?;
            if relative >= self.lens[dim] {
                return None
            }
            offset = offset.checked_mul(self.lens[dim])?.checked_add(relative)?;
        }
        self.data.get(offset)
    }
}

impl<T: Codec, const R: usize> Codec for MdArray<T, R> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        for len in self.lens {
            out.write_len(len)?;
        }
        for lower in self.lowers {
            out.write_len(lower)?;
        }
        encode_block(cx, out, &self.data)
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let mut lens = [0usize; R];
        for len in lens.iter_mut() {
            *len = input.read_len()?;
        }
        let mut lowers = [0usize; R];
        for lower in lowers.iter_mut() {
            *lower = input.read_len()?;
        }
        let total = lens
            .iter()
            .try_fold(1usize, |acc, len| acc.checked_mul(*len))
            .ok_or(tether_wire::Error::LengthOverflow)?;
        cx.charge(total.saturating_mul(element_cost::<T>()))?;
        let data = decode_block(cx, input, total)?;
        Ok(Self { lens, lowers, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        kernel::Tether,
    };

    fn kernel() -> Tether {
        Tether::new(Config::default()).expect("kernel")
    }

    fn roundtrip<T: Codec + PartialEq + core::fmt::Debug>(value: T) {
        let kernel = kernel();
        let bytes = kernel.to_bytes(&value).expect("encode");
        let back: T = kernel.decode(&bytes).expect("decode");
        assert_eq!(back, value);
    }

    #[test]
    fn sequences_roundtrip() {
        roundtrip(vec![1u32, 2, 3]);
        roundtrip(Vec::<String>::new());
        roundtrip(vec![vec![1u8], vec![], vec![2, 3]]);
        roundtrip(VecDeque::from([1i16, -2, 3]));
        roundtrip([5u64, 6, 7]);
        roundtrip(["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn keyed_collections_roundtrip() {
        roundtrip(BTreeMap::from([
            ("a".to_string(), 1u32),
            ("b".to_string(), 2),
        ]));
        roundtrip(HashMap::from([(1u8, "x".to_string()), (9, "y".to_string())]));
        roundtrip(BTreeSet::from([3u16, 1, 2]));
        roundtrip(HashSet::from(["p".to_string(), "q".to_string()]));
    }

    #[test]
    fn vec_wire_shape_is_length_then_elements() {
        let kernel = kernel();
        let bytes = kernel.to_bytes(&vec![0x0102_0304u32, 5]).unwrap();
        assert_eq!(
            bytes,
            [0x02, 0x04, 0x03, 0x02, 0x01, 0x05, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn hostile_length_prefix_hits_the_budget() {
        let kernel = Tether::new(Config::default().with_budget(1024)).unwrap();
        // Claims u64::MAX elements.
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(matches!(
            kernel.decode::<Vec<u64>>(&bytes),
            Err(Error::QuotaExceeded { .. })
        ));
    }

    #[test]
    fn md_arrays_are_row_major_with_lower_bounds() {
        let array = MdArray::<u32, 2>::new([2, 3], [1, 10], vec![1, 2, 3, 4, 5, 6])
            .expect("consistent dims");
        assert_eq!(array.get([1, 10]), Some(&1));
        assert_eq!(array.get([1, 12]), Some(&3));
        assert_eq!(array.get([2, 10]), Some(&4));
        assert_eq!(array.get([0, 10]), None);
        assert_eq!(array.get([1, 13]), None);

        roundtrip(array);
    }

    #[test]
    fn md_array_dimension_mismatch_is_refused() {
        assert!(MdArray::<u8, 2>::new([2, 2], [0, 0], vec![1, 2, 3]).is_none());
    }
}
