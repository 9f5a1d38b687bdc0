//! Byte sinks and sources.

use core::fmt;

/// Error when reading or writing wire data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer is too short for the requested read or write.
    BufferTooShort,
    /// A boolean byte was neither 0 nor 1.
    BadBool(u8),
    /// A varint continuation overran the ceiling for its width.
    VarintTooLong,
    /// A varint value does not fit the requested width.
    VarintOverflow,
    /// A scalar decoded to an invalid character.
    BadChar(u32),
    /// String bytes were not valid UTF-8.
    BadUtf8,
    /// A length prefix does not fit in `usize`.
    LengthOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooShort => write!(f, "buffer too short"),
            Self::BadBool(b) => write!(f, "invalid boolean byte {b:#04x}"),
            Self::VarintTooLong => write!(f, "varint continuation too long"),
            Self::VarintOverflow => write!(f, "varint exceeds target width"),
            Self::BadChar(c) => write!(f, "invalid character scalar {c:#x}"),
            Self::BadUtf8 => write!(f, "string bytes are not valid UTF-8"),
            Self::LengthOverflow => write!(f, "length prefix overflows usize"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Allows writing of wire data.
pub trait Output {
    /// Write bytes to the output buffer.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Write a single byte to the output buffer.
    fn push_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.write(&[byte])
    }
}

/// Allows reading of wire data into a slice.
pub trait Input {
    /// Returns the remaining length of the input data.
    fn remaining(&self) -> usize;

    /// Read the exact number of bytes required to fill the given buffer.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), Error>;

    /// Read a single byte from the input.
    fn read_byte(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8];
        self.read(&mut buf[..])?;
        Ok(buf[0])
    }

    /// Skips the next `n` bytes.
    fn skip(&mut self, n: usize) -> Result<(), Error>;
}

#[cfg(feature = "alloc")]
impl Output for alloc::vec::Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl Output for &mut [u8] {
    fn write(&mut self, from: &[u8]) -> Result<(), Error> {
        if from.len() > self.len() {
            return Err(Error::BufferTooShort)
        }
        let len = from.len();
        let this = core::mem::take(self);
        let (head, tail) = this.split_at_mut(len);
        head.copy_from_slice(from);
        *self = tail;
        Ok(())
    }
}

impl Input for &[u8] {
    fn remaining(&self) -> usize {
        self.len()
    }

    fn read(&mut self, into: &mut [u8]) -> Result<(), Error> {
        if into.len() > self.len() {
            return Err(Error::BufferTooShort)
        }
        let len = into.len();
        into.copy_from_slice(&self[..len]);
        *self = &self[len..];
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), Error> {
        if n > self.len() {
            return Err(Error::BufferTooShort)
        }
        *self = &self[n..];
        Ok(())
    }
}

/// Counts the number of written bytes without storing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeCounter(usize);

impl SizeCounter {
    /// The number of written bytes.
    pub fn size(self) -> usize {
        self.0
    }
}

impl Output for SizeCounter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.0 = self
            .0
            .checked_add(bytes.len())
            .ok_or(Error::BufferTooShort)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_output_fills_and_advances() {
        let mut buf = [0u8; 4];
        let mut out: &mut [u8] = &mut buf;
        out.write(&[1, 2]).expect("fits");
        out.write(&[3]).expect("fits");
        assert!(out.write(&[4, 5]).is_err());
        out.write(&[4]).expect("fits");
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn slice_input_consumes() {
        let data = [1u8, 2, 3];
        let mut input: &[u8] = &data;
        assert_eq!(input.read_byte().unwrap(), 1);
        assert_eq!(input.remaining(), 2);
        input.skip(1).unwrap();
        assert_eq!(input.read_byte().unwrap(), 3);
        assert_eq!(input.read_byte(), Err(Error::BufferTooShort));
    }

    #[test]
    fn size_counter_counts() {
        let mut counter = SizeCounter::default();
        counter.write(&[0; 7]).unwrap();
        counter.push_byte(0).unwrap();
        assert_eq!(counter.size(), 8);
    }
}
