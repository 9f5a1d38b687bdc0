//! Wire-level primitives of the tether serializer.
//!
//! Everything here operates on an opaque byte sink ([`Output`]) or source
//! ([`Input`]): fixed-width little-endian scalars, LEB128 variable-length
//! integers with zigzag layering for signed values, length-prefixed UTF-8
//! strings and raw byte runs. Higher layers compose these primitives; this
//! crate knows nothing about object graphs or type identities.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![deny(unused_crate_dependencies)]
#![deny(
    clippy::arithmetic_side_effects,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::string_slice
)]

#[cfg(feature = "alloc")]
extern crate alloc;

mod io;
mod scalar;
mod varint;

pub use io::{
    Error,
    Input,
    Output,
    SizeCounter,
};
pub use scalar::{
    Decimal128,
    ScalarRead,
    ScalarWrite,
};
pub use varint::{
    zigzag64,
    unzigzag64,
    VarintRead,
    VarintWrite,
    MAX_VARUINT16_BYTES,
    MAX_VARUINT32_BYTES,
    MAX_VARUINT64_BYTES,
};
