//! Raw byte copies of blittable values.
//!
//! A type may be copied byte-for-byte only when its codec declares
//! `BLITTABLE`: an inline aggregate with declared layout, every member
//! itself blittable, and no padding. Callers check the constant; the
//! helpers here only assert it.

#![allow(unsafe_code)]

use crate::{
    codec::Codec,
    error::Error,
};
use core::mem::{
    size_of,
    MaybeUninit,
};
use tether_wire::{
    Input,
    Output,
};

/// Whether the raw-copy fast path applies to `T` on this host.
///
/// The wire is little-endian, so the copy is only byte-identical to the
/// member-wise encoding on little-endian hosts.
pub(crate) fn fast_path<T: Codec>() -> bool {
    T::BLITTABLE && cfg!(target_endian = "little") && size_of::<T>() > 0
}

/// Write the raw bytes of a slice of blittable values.
pub(crate) fn write_slice<T: Codec, O: Output + ?Sized>(
    out: &mut O,
    items: &[T],
) -> Result<(), Error> {
    debug_assert!(fast_path::<T>());
    // Cannot overflow: the slice already fits in memory.
    let byte_len = items.len().saturating_mul(size_of::<T>());
    // SAFETY: `BLITTABLE` guarantees the value representation has no
    // padding, so every byte in the block is initialized.
    let bytes =
        unsafe { core::slice::from_raw_parts(items.as_ptr() as *const u8, byte_len) };
    out.write(bytes)?;
    Ok(())
}

/// Read `len` blittable values as one raw block.
pub(crate) fn read_vec<T: Codec, I: Input + ?Sized>(
    input: &mut I,
    len: usize,
) -> Result<Vec<T>, Error> {
    debug_assert!(fast_path::<T>());
    let byte_len = len
        .checked_mul(size_of::<T>())
        .ok_or(tether_wire::Error::LengthOverflow)?;
    if byte_len > input.remaining() {
        return Err(tether_wire::Error::BufferTooShort.into())
    }
    let mut bytes = vec![0u8; byte_len];
    input.read(&mut bytes)?;

    let mut items: Vec<T> = Vec::with_capacity(len);
    // SAFETY: `BLITTABLE` guarantees any bit pattern is a valid `T`, and the
    // destination has capacity for exactly `byte_len` bytes.
    unsafe {
        core::ptr::copy_nonoverlapping(
            bytes.as_ptr(),
            items.as_mut_ptr() as *mut u8,
            byte_len,
        );
        items.set_len(len);
    }
    Ok(items)
}

/// Read one blittable value as a raw byte copy.
pub(crate) fn read_value<T: Codec, I: Input + ?Sized>(input: &mut I) -> Result<T, Error> {
    debug_assert!(fast_path::<T>());
    let size = size_of::<T>();
    let mut bytes = vec![0u8; size];
    input.read(&mut bytes)?;
    let mut value = MaybeUninit::<T>::uninit();
    // SAFETY: `BLITTABLE` guarantees any bit pattern is a valid `T`.
    unsafe {
        core::ptr::copy_nonoverlapping(
            bytes.as_ptr(),
            value.as_mut_ptr() as *mut u8,
            size,
        );
        Ok(value.assume_init())
    }
}

/// Write one blittable value as a raw byte copy.
pub(crate) fn write_value<T: Codec, O: Output + ?Sized>(
    out: &mut O,
    value: &T,
) -> Result<(), Error> {
    debug_assert!(fast_path::<T>());
    // SAFETY: see `write_slice`.
    let bytes = unsafe {
        core::slice::from_raw_parts(value as *const T as *const u8, size_of::<T>())
    };
    out.write(bytes)?;
    Ok(())
}
