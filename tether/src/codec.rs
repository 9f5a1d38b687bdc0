//! The typed formatter layer.
//!
//! [`Codec`] is implemented by every type the serializer can carry inline:
//! primitives, strings, containers, derived user aggregates, and the shared
//! handles of the reference engine. Encoding always happens inside a kernel
//! context, which carries the per-call session so reference slots can
//! resolve identities.

mod collections;

pub use collections::MdArray;
pub use tether_derive::Codec;
pub use tether_wire::Decimal128;

use crate::{
    error::Error,
    kernel::Tether,
    session::{
        DecodeSession,
        EncodeSession,
    },
};
use std::time::Duration;
use tether_wire::{
    Input,
    Output,
    ScalarRead,
    ScalarWrite,
    VarintRead,
};

/// Context of one top-level encode.
pub struct EncodeCx<'a> {
    pub(crate) kernel: &'a Tether,
    pub(crate) session: &'a mut EncodeSession,
}

impl EncodeCx<'_> {
    /// The kernel driving this encode.
    pub fn kernel(&self) -> &Tether {
        self.kernel
    }
}

/// Context of one top-level decode.
pub struct DecodeCx<'a> {
    pub(crate) kernel: &'a Tether,
    pub(crate) session: &'a mut DecodeSession,
}

impl DecodeCx<'_> {
    /// The kernel driving this decode.
    pub fn kernel(&self) -> &Tether {
        self.kernel
    }

    /// Add to the allocation approximation of this decode.
    pub fn charge(&mut self, bytes: usize) -> Result<(), Error> {
        self.session.charge(bytes)
    }
}

/// Encodes and decodes values of one static type.
pub trait Codec: 'static {
    /// Safe to copy byte-for-byte: inline layout, every member blittable,
    /// no padding, any bit pattern valid.
    const BLITTABLE: bool = false;

    /// Encode `self` into the output buffer.
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error>;

    /// Decode a value from the input buffer.
    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error>
    where
        Self: Sized;
}

/// Adapter giving a sized handle on any output, so generic encode paths can
/// hand their buffer to an erased formatter.
pub(crate) struct DynOut<'a, O: Output + ?Sized>(pub &'a mut O);

impl<O: Output + ?Sized> Output for DynOut<'_, O> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), tether_wire::Error> {
        self.0.write(bytes)
    }

    fn push_byte(&mut self, byte: u8) -> Result<(), tether_wire::Error> {
        self.0.push_byte(byte)
    }
}

/// Adapter giving a sized handle on any input.
pub(crate) struct DynIn<'a, I: Input + ?Sized>(pub &'a mut I);

impl<I: Input + ?Sized> Input for DynIn<'_, I> {
    fn remaining(&self) -> usize {
        self.0.remaining()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), tether_wire::Error> {
        self.0.read(buf)
    }

    fn read_byte(&mut self) -> Result<u8, tether_wire::Error> {
        self.0.read_byte()
    }

    fn skip(&mut self, n: usize) -> Result<(), tether_wire::Error> {
        self.0.skip(n)
    }
}

macro_rules! impl_codec_scalar {
    ($($t:ty, $write:ident, $read:ident, $blit:expr);* $(;)?) => {$(
        impl Codec for $t {
            const BLITTABLE: bool = $blit;

            #[inline(always)]
            fn encode<O: Output + ?Sized>(
                &self,
                _cx: &mut EncodeCx<'_>,
                out: &mut O,
            ) -> Result<(), Error> {
                out.$write(*self)?;
                Ok(())
            }

            fn decode<I: Input + ?Sized>(
                _cx: &mut DecodeCx<'_>,
                input: &mut I,
            ) -> Result<Self, Error> {
                Ok(input.$read()?)
            }
        }
    )*};
}

impl_codec_scalar!(
    u8, write_u8, read_u8, true;
    u16, write_u16, read_u16, true;
    u32, write_u32, read_u32, true;
    u64, write_u64, read_u64, true;
    u128, write_u128, read_u128, true;
    i8, write_i8, read_i8, true;
    i16, write_i16, read_i16, true;
    i32, write_i32, read_i32, true;
    i64, write_i64, read_i64, true;
    i128, write_i128, read_i128, true;
    f32, write_f32, read_f32, true;
    f64, write_f64, read_f64, true;
    // Not every bit pattern is a valid bool or char, so neither may be
    // reconstructed by raw copy.
    bool, write_bool, read_bool, false;
    char, write_char, read_char, false;
    Decimal128, write_decimal, read_decimal, false;
);

impl Codec for String {
    fn encode<O: Output + ?Sized>(
        &self,
        _cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        out.write_str(self)?;
        Ok(())
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        let len = input.read_len()?;
        cx.charge(len)?;
        if len > input.remaining() {
            return Err(tether_wire::Error::BufferTooShort.into())
        }
        let mut bytes = vec![0u8; len];
        input.read(&mut bytes)?;
        Ok(String::from_utf8(bytes).map_err(|_| tether_wire::Error::BadUtf8)?)
    }
}

impl Codec for Duration {
    fn encode<O: Output + ?Sized>(
        &self,
        _cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        out.write_u64(self.as_secs())?;
        out.write_u32(self.subsec_nanos())?;
        Ok(())
    }

    fn decode<I: Input + ?Sized>(
        _cx: &mut DecodeCx<'_>,
        input: &mut I,
    ) -> Result<Self, Error> {
        let secs = input.read_u64()?;
        let nanos = input.read_u32()?;
        // Encoded durations always carry a normalized subsecond part.
        if nanos >= 1_000_000_000 {
            return Err(crate::error::Malformed::OutOfRange {
                value: u64::from(nanos),
            }
            .into())
        }
        Ok(Duration::new(secs, nanos))
    }
}

impl<T: Codec> Codec for Box<T> {
    fn encode<O: Output + ?Sized>(
        &self,
        cx: &mut EncodeCx<'_>,
        out: &mut O,
    ) -> Result<(), Error> {
        (**self).encode(cx, out)
    }

    fn decode<I: Input + ?Sized>(cx: &mut DecodeCx<'_>, input: &mut I) -> Result<Self, Error> {
        cx.charge(core::mem::size_of::<T>())?;
        Ok(Box::new(T::decode(cx, input)?))
    }
}

macro_rules! impl_codec_tuple {
    ($(($($name:ident),+))*) => {$(
        #[allow(non_snake_case)]
        impl<$($name: Codec),+> Codec for ($($name,)+) {
            fn encode<O: Output + ?Sized>(
                &self,
                cx: &mut EncodeCx<'_>,
                out: &mut O,
            ) -> Result<(), Error> {
                let ($($name,)+) = self;
                $($name.encode(cx, out)?;)+
                Ok(())
            }

            fn decode<I: Input + ?Sized>(
                cx: &mut DecodeCx<'_>,
                input: &mut I,
            ) -> Result<Self, Error> {
                Ok(($($name::decode(cx, input)?,)+))
            }
        }
    )*};
}

impl_codec_tuple!((A, B)(A, B, C)(A, B, C, D));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Tether;

    fn kernel() -> Tether {
        Tether::new(crate::config::Config::default()).expect("kernel")
    }

    fn roundtrip<T: Codec + PartialEq + core::fmt::Debug>(value: T) {
        let kernel = kernel();
        let bytes = kernel.to_bytes(&value).expect("encode");
        let back: T = kernel.decode(&bytes).expect("decode");
        assert_eq!(back, value);
    }

    #[test]
    fn scalar_roundtrips() {
        roundtrip(0x0102_0304u32);
        roundtrip(-5i64);
        roundtrip(3.5f64);
        roundtrip(true);
        roundtrip('β');
        roundtrip(String::from("tether"));
        roundtrip(Duration::new(7, 500));
        roundtrip(Decimal128([1, 2, 3, 4]));
        roundtrip(Box::new(17u16));
        roundtrip((1u8, String::from("a"), -2i32));
    }

    #[test]
    fn u32_wire_bytes_are_little_endian() {
        let kernel = kernel();
        let bytes = kernel.to_bytes(&0x0102_0304u32).unwrap();
        assert_eq!(bytes, [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(kernel.decode::<u32>(&bytes).unwrap(), 0x0102_0304);
    }

    #[test]
    fn primitive_blittability() {
        assert!(u64::BLITTABLE);
        assert!(f32::BLITTABLE);
        assert!(!bool::BLITTABLE);
        assert!(!char::BLITTABLE);
        assert!(!String::BLITTABLE);
    }
}
