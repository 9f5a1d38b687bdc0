//! Type-erased content formatters.
//!
//! The typed [`Codec`] layer is monomorphized and carries no runtime cost,
//! but polymorphic slots and the resolver chain need a uniform object-facing
//! surface. A [`Formatter`] is that surface: it encodes and decodes exactly
//! one dynamic type behind `dyn Any`.

use crate::{
    blit,
    codec::{
        Codec,
        DecodeCx,
        EncodeCx,
    },
    error::Error,
};
use core::{
    any::Any,
    marker::PhantomData,
};
use tether_wire::{
    Input,
    Output,
};

/// Encodes and decodes one dynamic type over an erased value.
pub trait Formatter: Send + Sync {
    /// Encode an erased value. Fails if the value is not of the formatter's
    /// type.
    fn encode_any(
        &self,
        cx: &mut EncodeCx<'_>,
        value: &dyn Any,
        out: &mut dyn Output,
    ) -> Result<(), Error>;

    /// Decode a fresh boxed value.
    fn decode_any(
        &self,
        cx: &mut DecodeCx<'_>,
        input: &mut dyn Input,
    ) -> Result<Box<dyn Any + Send>, Error>;

    /// Decode into an existing value. The target already sits behind a
    /// published slot handle, so cyclic children observe the final object.
    fn decode_any_into(
        &self,
        cx: &mut DecodeCx<'_>,
        target: &mut dyn Any,
        input: &mut dyn Input,
    ) -> Result<(), Error>;
}

fn downcast_failed<T>() -> Error {
    Error::missing_formatter(core::any::type_name::<T>())
}

/// The default formatter of a registered type: a shim over its [`Codec`].
pub struct TypedFormatter<T>(PhantomData<fn() -> T>);

impl<T> Default for TypedFormatter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Codec + Send> Formatter for TypedFormatter<T> {
    fn encode_any(
        &self,
        cx: &mut EncodeCx<'_>,
        value: &dyn Any,
        out: &mut dyn Output,
    ) -> Result<(), Error> {
        let value = value.downcast_ref::<T>().ok_or_else(downcast_failed::<T>)?;
        value.encode(cx, out)
    }

    fn decode_any(
        &self,
        cx: &mut DecodeCx<'_>,
        input: &mut dyn Input,
    ) -> Result<Box<dyn Any + Send>, Error> {
        Ok(Box::new(T::decode(cx, input)?))
    }

    fn decode_any_into(
        &self,
        cx: &mut DecodeCx<'_>,
        target: &mut dyn Any,
        input: &mut dyn Input,
    ) -> Result<(), Error> {
        let target = target.downcast_mut::<T>().ok_or_else(downcast_failed::<T>)?;
        *target = T::decode(cx, input)?;
        Ok(())
    }
}

/// Raw byte-copy formatter for blittable aggregates.
///
/// Produces exactly the bytes the member-wise formatter would, one copy at a
/// time instead of one member at a time.
pub struct BlitFormatter<T>(PhantomData<fn() -> T>);

impl<T> Default for BlitFormatter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T: Codec + Send> Formatter for BlitFormatter<T> {
    fn encode_any(
        &self,
        _cx: &mut EncodeCx<'_>,
        value: &dyn Any,
        out: &mut dyn Output,
    ) -> Result<(), Error> {
        let value = value.downcast_ref::<T>().ok_or_else(downcast_failed::<T>)?;
        blit::write_value(out, value)
    }

    fn decode_any(
        &self,
        cx: &mut DecodeCx<'_>,
        input: &mut dyn Input,
    ) -> Result<Box<dyn Any + Send>, Error> {
        cx.charge(core::mem::size_of::<T>())?;
        Ok(Box::new(blit::read_value::<T, _>(input)?))
    }

    fn decode_any_into(
        &self,
        cx: &mut DecodeCx<'_>,
        target: &mut dyn Any,
        input: &mut dyn Input,
    ) -> Result<(), Error> {
        let target = target.downcast_mut::<T>().ok_or_else(downcast_failed::<T>)?;
        cx.charge(core::mem::size_of::<T>())?;
        *target = blit::read_value::<T, _>(input)?;
        Ok(())
    }
}
