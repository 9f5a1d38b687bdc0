//! Fixed-width little-endian scalars.

use crate::{
    varint::{
        VarintRead,
        VarintWrite,
    },
    Error,
    Input,
    Output,
};

/// A 128-bit decimal carried as four little-endian `i32` words.
///
/// The words are, in order: low, mid, high, flags. The flag word holds the
/// scale and sign; this crate treats the value as opaque and preserves it
/// bit-exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Decimal128(pub [i32; 4]);

macro_rules! impl_le_scalar {
    ($($write:ident, $read:ident, $t:ty);* $(;)?) => {
        /// Scalar writing over any [`Output`].
        pub trait ScalarWrite: Output {
            $(
                #[doc = concat!("Write a little-endian `", stringify!($t), "`.")]
                fn $write(&mut self, value: $t) -> Result<(), Error> {
                    self.write(&value.to_le_bytes())
                }
            )*

            /// Write a boolean as a single byte.
            fn write_bool(&mut self, value: bool) -> Result<(), Error> {
                self.push_byte(u8::from(value))
            }

            /// Write a UTF-16 code unit.
            fn write_code_unit(&mut self, unit: u16) -> Result<(), Error> {
                self.write_u16(unit)
            }

            /// Write a character as its UTF-32 scalar value.
            fn write_char(&mut self, value: char) -> Result<(), Error> {
                self.write_u32(u32::from(value))
            }

            /// Write a decimal as four little-endian `i32` words.
            fn write_decimal(&mut self, value: Decimal128) -> Result<(), Error> {
                for word in value.0 {
                    self.write_i32(word)?;
                }
                Ok(())
            }

            /// Write a varuint byte-length followed by the UTF-8 bytes.
            fn write_str(&mut self, value: &str) -> Result<(), Error> {
                self.write_len(value.len())?;
                self.write(value.as_bytes())
            }
        }

        impl<O: Output + ?Sized> ScalarWrite for O {}

        /// Scalar reading over any [`Input`].
        pub trait ScalarRead: Input {
            $(
                #[doc = concat!("Read a little-endian `", stringify!($t), "`.")]
                fn $read(&mut self) -> Result<$t, Error> {
                    let mut bytes = [0u8; core::mem::size_of::<$t>()];
                    self.read(&mut bytes)?;
                    Ok(<$t>::from_le_bytes(bytes))
                }
            )*

            /// Read a boolean byte, rejecting anything but 0 and 1.
            fn read_bool(&mut self) -> Result<bool, Error> {
                match self.read_byte()? {
                    0 => Ok(false),
                    1 => Ok(true),
                    other => Err(Error::BadBool(other)),
                }
            }

            /// Read a UTF-16 code unit.
            fn read_code_unit(&mut self) -> Result<u16, Error> {
                self.read_u16()
            }

            /// Read a character from its UTF-32 scalar value.
            fn read_char(&mut self) -> Result<char, Error> {
                let scalar = self.read_u32()?;
                char::from_u32(scalar).ok_or(Error::BadChar(scalar))
            }

            /// Read a decimal as four little-endian `i32` words.
            fn read_decimal(&mut self) -> Result<Decimal128, Error> {
                let mut words = [0i32; 4];
                for word in words.iter_mut() {
                    *word = self.read_i32()?;
                }
                Ok(Decimal128(words))
            }

            /// Read a varuint byte-length followed by the UTF-8 bytes.
            #[cfg(feature = "alloc")]
            fn read_string(&mut self) -> Result<alloc::string::String, Error> {
                let len = self.read_len()?;
                if len > self.remaining() {
                    return Err(Error::BufferTooShort)
                }
                let mut bytes = alloc::vec![0u8; len];
                self.read(&mut bytes)?;
                alloc::string::String::from_utf8(bytes).map_err(|_| Error::BadUtf8)
            }
        }

        impl<I: Input + ?Sized> ScalarRead for I {}
    };
}

impl_le_scalar!(
    write_u8, read_u8, u8;
    write_u16, read_u16, u16;
    write_u32, read_u32, u32;
    write_u64, read_u64, u64;
    write_u128, read_u128, u128;
    write_i8, read_i8, i8;
    write_i16, read_i16, i16;
    write_i32, read_i32, i32;
    write_i64, read_i64, i64;
    write_i128, read_i128, i128;
    write_f32, read_f32, f32;
    write_f64, read_f64, f64;
);

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded<F: FnOnce(&mut Vec<u8>)>(f: F) -> Vec<u8> {
        let mut out = Vec::new();
        f(&mut out);
        out
    }

    #[test]
    fn scalars_are_little_endian() {
        assert_eq!(
            encoded(|o| o.write_u32(0x0102_0304).unwrap()),
            [0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(
            encoded(|o| o.write_u16(0xbeef).unwrap()),
            [0xef, 0xbe]
        );
        assert_eq!(encoded(|o| o.write_i8(-1).unwrap()), [0xff]);

        let mut input: &[u8] = &[0x04, 0x03, 0x02, 0x01];
        assert_eq!(input.read_u32(), Ok(0x0102_0304));
    }

    #[test]
    fn floats_roundtrip_bit_exactly() {
        let bytes = encoded(|o| o.write_f64(core::f64::consts::PI).unwrap());
        let mut input: &[u8] = &bytes;
        assert_eq!(input.read_f64().unwrap().to_bits(), core::f64::consts::PI.to_bits());
    }

    #[test]
    fn bool_decode_is_strict() {
        let mut input: &[u8] = &[0, 1, 2];
        assert_eq!(input.read_bool(), Ok(false));
        assert_eq!(input.read_bool(), Ok(true));
        assert_eq!(input.read_bool(), Err(Error::BadBool(2)));
    }

    #[test]
    fn chars_reject_surrogates() {
        let bytes = encoded(|o| o.write_u32(0xd800).unwrap());
        let mut input: &[u8] = &bytes;
        assert_eq!(input.read_char(), Err(Error::BadChar(0xd800)));
    }

    #[test]
    fn strings_are_length_prefixed_utf8() {
        let bytes = encoded(|o| o.write_str("héllo").unwrap());
        assert_eq!(bytes[0] as usize, "héllo".len());
        let mut input: &[u8] = &bytes;
        assert_eq!(input.read_string().unwrap(), "héllo");
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn string_length_cannot_exceed_input() {
        // Claims 100 bytes of payload but provides none.
        let mut input: &[u8] = &[100];
        assert_eq!(input.read_string(), Err(Error::BufferTooShort));
    }

    #[test]
    fn decimal_words_roundtrip() {
        let value = Decimal128([1, -2, 3, -4]);
        let bytes = encoded(|o| o.write_decimal(value).unwrap());
        assert_eq!(bytes.len(), 16);
        let mut input: &[u8] = &bytes;
        assert_eq!(input.read_decimal(), Ok(value));
    }
}
