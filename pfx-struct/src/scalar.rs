//! Fixed-width scalar field types

use crate::error::StructError;
use crate::stream::{Endian, StreamReader, StreamWriter};

/// Width and signedness of a scalar field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
}

impl ScalarType {
    /// Encoded size in bytes
    pub const fn size(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 | ScalarType::Bool => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }
}

/// A value that can be stored directly in a structure field
pub trait Scalar: Copy + Send + Sync + 'static {
    const TYPE: ScalarType;

    fn read(reader: &mut StreamReader<'_>, endian: Endian) -> Result<Self, StructError>;

    fn write(self, writer: &mut StreamWriter, endian: Endian) -> Result<(), StructError>;
}

macro_rules! scalar_impl {
    ($ty:ty, $tag:ident, $read:ident, $write:ident) => {
        impl Scalar for $ty {
            const TYPE: ScalarType = ScalarType::$tag;

            fn read(reader: &mut StreamReader<'_>, endian: Endian) -> Result<Self, StructError> {
                reader.$read(endian)
            }

            fn write(self, writer: &mut StreamWriter, endian: Endian) -> Result<(), StructError> {
                writer.$write(self, endian)
            }
        }
    };
}

scalar_impl!(i16, I16, read_i16, write_i16);
scalar_impl!(u16, U16, read_u16, write_u16);
scalar_impl!(i32, I32, read_i32, write_i32);
scalar_impl!(u32, U32, read_u32, write_u32);
scalar_impl!(i64, I64, read_i64, write_i64);
scalar_impl!(u64, U64, read_u64, write_u64);
scalar_impl!(f32, F32, read_f32, write_f32);
scalar_impl!(f64, F64, read_f64, write_f64);

// Single-byte values ignore the byte order

impl Scalar for u8 {
    const TYPE: ScalarType = ScalarType::U8;

    fn read(reader: &mut StreamReader<'_>, _endian: Endian) -> Result<Self, StructError> {
        reader.read_u8()
    }

    fn write(self, writer: &mut StreamWriter, _endian: Endian) -> Result<(), StructError> {
        writer.write_u8(self)
    }
}

impl Scalar for i8 {
    const TYPE: ScalarType = ScalarType::I8;

    fn read(reader: &mut StreamReader<'_>, _endian: Endian) -> Result<Self, StructError> {
        reader.read_i8()
    }

    fn write(self, writer: &mut StreamWriter, _endian: Endian) -> Result<(), StructError> {
        writer.write_i8(self)
    }
}

impl Scalar for bool {
    const TYPE: ScalarType = ScalarType::Bool;

    fn read(reader: &mut StreamReader<'_>, _endian: Endian) -> Result<Self, StructError> {
        reader.read_bool()
    }

    fn write(self, writer: &mut StreamWriter, _endian: Endian) -> Result<(), StructError> {
        writer.write_bool(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(<u8 as Scalar>::TYPE.size(), 1);
        assert_eq!(<i16 as Scalar>::TYPE.size(), 2);
        assert_eq!(<f32 as Scalar>::TYPE.size(), 4);
        assert_eq!(<u64 as Scalar>::TYPE.size(), 8);
    }

    #[test]
    fn test_signed_byte_round_trip() {
        let mut writer = StreamWriter::new();
        (-1i8).write(&mut writer, Endian::Big).unwrap();
        assert_eq!(writer.as_bytes(), &[0xFF]);
        let data = writer.into_inner();
        let mut reader = StreamReader::new(&data);
        assert_eq!(i8::read(&mut reader, Endian::Little).unwrap(), -1);
    }
}
