//! Derive macros for tether serialization.

#![deny(unused_must_use, unsafe_code, unused_crate_dependencies, missing_docs)]
#![deny(
    clippy::arithmetic_side_effects,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::string_slice
)]

extern crate proc_macro;

mod attribute;
mod codec;
mod describe;

use self::{
    codec::codec_derive,
    describe::describe_derive,
};

synstructure::decl_derive!(
    [Codec, attributes(tether)] =>
    /// Derives the `Codec` trait: members encode back to back in their
    /// stable order, fieldless `#[repr(uN)]` enums go through the
    /// underlying integer, and data-carrying enums through a varuint
    /// discriminant. `#[tether(skip)]` excludes a member.
    codec_derive
);

synstructure::decl_derive!(
    [Describe, attributes(tether)] =>
    /// Derives the `Describe` trait: the runtime descriptor carrying the
    /// type's structural identity, classification and member table.
    describe_derive
);
