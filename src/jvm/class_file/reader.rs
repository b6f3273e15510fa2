use crate::jvm::Error;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

/// Cursor over the bytes of a class file
///
/// Every read failure is reported as [`Error::Malformed`] along with the offset at which the read
/// was attempted, since running out of input means the class file is truncated.
pub struct ClassReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ClassReader<'a> {
    pub fn new(bytes: &'a [u8]) -> ClassReader<'a> {
        ClassReader {
            cursor: Cursor::new(bytes),
        }
    }

    /// Offset of the next byte to be read
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Number of bytes left
    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    /// Build an error pointing at the current position
    pub fn malformed(&self, message: impl Into<String>) -> Error {
        Error::Malformed {
            offset: self.position(),
            message: message.into(),
        }
    }

    fn truncated(&self, what: &str) -> Error {
        self.malformed(format!("unexpected end of input reading {}", what))
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        self.cursor.read_u8().map_err(|_| self.truncated("u1"))
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| self.truncated("u2"))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| self.truncated("u4"))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        self.cursor
            .read_i32::<BigEndian>()
            .map_err(|_| self.truncated("i4"))
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        self.cursor
            .read_i64::<BigEndian>()
            .map_err(|_| self.truncated("i8"))
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        self.cursor
            .read_f32::<BigEndian>()
            .map_err(|_| self.truncated("f4"))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        self.cursor
            .read_f64::<BigEndian>()
            .map_err(|_| self.truncated("f8"))
    }

    /// Borrow the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < len {
            return Err(self.truncated(&format!("{} bytes", len)));
        }
        let start = self.position();
        let bytes: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&bytes[start..start + len])
    }
}

/// Counterpart of [`super::Serialize`] for reading class file structures back in
pub trait Deserialize: Sized {
    fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error>;
}

impl Deserialize for u16 {
    fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error> {
        reader.read_u16()
    }
}

/// Size in `u16` is the first thing deserialized
impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize(reader: &mut ClassReader<'_>) -> Result<Self, Error> {
        let len = reader.read_u16()?;
        (0..len).map(|_| A::deserialize(reader)).collect()
    }
}
