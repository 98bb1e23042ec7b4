//! Endian-aware byte streams over in-memory buffers

use std::io::{Cursor, Read};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::StructError;

/// Byte order of a structure or a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    /// Most significant byte first (the effect format default)
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

macro_rules! read_endian {
    ($name:ident, $ty:ty, $method:ident) => {
        pub fn $name(&mut self, endian: Endian) -> Result<$ty, StructError> {
            let value = match endian {
                Endian::Big => self.cursor.$method::<BigEndian>()?,
                Endian::Little => self.cursor.$method::<LittleEndian>()?,
            };
            Ok(value)
        }
    };
}

macro_rules! write_endian {
    ($name:ident, $ty:ty, $method:ident) => {
        pub fn $name(&mut self, value: $ty, endian: Endian) -> Result<(), StructError> {
            match endian {
                Endian::Big => self.buffer.$method::<BigEndian>(value)?,
                Endian::Little => self.buffer.$method::<LittleEndian>(value)?,
            }
            Ok(())
        }
    };
}

/// Reads primitive values from a borrowed byte slice
pub struct StreamReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> StreamReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_u8(&mut self) -> Result<u8, StructError> {
        Ok(self.cursor.read_u8()?)
    }

    pub fn read_i8(&mut self) -> Result<i8, StructError> {
        Ok(self.cursor.read_i8()?)
    }

    /// Single byte, any non-zero value is true
    pub fn read_bool(&mut self) -> Result<bool, StructError> {
        Ok(self.cursor.read_u8()? != 0)
    }

    read_endian!(read_u16, u16, read_u16);
    read_endian!(read_i16, i16, read_i16);
    read_endian!(read_u32, u32, read_u32);
    read_endian!(read_i32, i32, read_i32);
    read_endian!(read_u64, u64, read_u64);
    read_endian!(read_i64, i64, read_i64);
    read_endian!(read_f32, f32, read_f32);
    read_endian!(read_f64, f64, read_f64);

    /// Fills `buf` completely or fails with `UnexpectedEof`
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), StructError> {
        self.cursor.read_exact(buf)?;
        Ok(())
    }
}

/// Writes primitive values into an owned, growable buffer
#[derive(Debug, Default)]
pub struct StreamWriter {
    buffer: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), StructError> {
        self.buffer.write_u8(value)?;
        Ok(())
    }

    pub fn write_i8(&mut self, value: i8) -> Result<(), StructError> {
        self.buffer.write_i8(value)?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), StructError> {
        self.write_u8(u8::from(value))
    }

    write_endian!(write_u16, u16, write_u16);
    write_endian!(write_i16, i16, write_i16);
    write_endian!(write_u32, u32, write_u32);
    write_endian!(write_i32, i32, write_i32);
    write_endian!(write_u64, u64, write_u64);
    write_endian!(write_i64, i64, write_i64);
    write_endian!(write_f32, f32, write_f32);
    write_endian!(write_f64, f64, write_f64);

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StructError> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_both_endians() {
        let data = [0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00];
        let mut reader = StreamReader::new(&data);
        assert_eq!(reader.read_i32(Endian::Big).unwrap(), 1);
        assert_eq!(reader.read_i32(Endian::Little).unwrap(), 1);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_read_past_end() {
        let data = [0x3F, 0x80];
        let mut reader = StreamReader::new(&data);
        assert_eq!(
            reader.read_f32(Endian::Big),
            Err(StructError::UnexpectedEof)
        );
    }

    #[test]
    fn test_write_float_layouts() {
        let mut writer = StreamWriter::new();
        writer.write_f32(1.0, Endian::Big).unwrap();
        writer.write_f32(1.0, Endian::Little).unwrap();
        writer.write_bool(true).unwrap();
        assert_eq!(
            writer.as_bytes(),
            &[0x3F, 0x80, 0x00, 0x00, 0x00, 0x00, 0x80, 0x3F, 0x01]
        );
    }

    #[test]
    fn test_remaining_tracks_position() {
        let data = [1u8, 2, 3, 4, 5];
        let mut reader = StreamReader::new(&data);
        reader.read_u16(Endian::Big).unwrap();
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.remaining(), 3);
    }
}
