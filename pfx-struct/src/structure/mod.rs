//! Declarative structure metadata
//!
//! A [`Structure`] is an ordered list of field descriptors for one record type.
//! Reading walks the fields in declaration order and overwrites the record;
//! writing is the exact inverse. Each descriptor carries a [`FieldKind`] tag
//! describing its layout, an optional byte-order override and an optional
//! presence predicate.
//!
//! # Field kinds
//!
//! - **Scalar**: one fixed-width number or boolean
//! - **Array**: `N` scalars, no length prefix
//! - **List**: a length prefix (8/16/32/64 bits) followed by the elements, or a
//!   fixed element count checked on write
//! - **Nested**: another structured record inlined with its own schema
//! - **Custom**: hand-written read/write hooks (bit-packed flag words,
//!   index-based references)
//! - **Conditional**: any of the above, skipped when a predicate on the record
//!   returns false
//!
//! Structures are built once through [`StructureBuilder`] and kept in a
//! `static LazyLock`, then shared read-only.

mod builder;
#[cfg(test)]
mod tests;

pub use builder::StructureBuilder;

use crate::error::StructError;
use crate::scalar::ScalarType;
use crate::stream::{Endian, StreamReader, StreamWriter};

pub(crate) type ReadFn<T> = Box<
    dyn Fn(&mut T, &mut StreamReader<'_>, Endian) -> Result<(), StructError> + Send + Sync,
>;
pub(crate) type WriteFn<T> =
    Box<dyn Fn(&T, &mut StreamWriter, Endian) -> Result<(), StructError> + Send + Sync>;

/// Custom read hook: receives the record, the stream and the field byte order
pub type ReadHook<T> = fn(&mut T, &mut StreamReader<'_>, Endian) -> Result<(), StructError>;

/// Custom write hook, inverse of [`ReadHook`]
pub type WriteHook<T> = fn(&T, &mut StreamWriter, Endian) -> Result<(), StructError>;

/// Width of a list length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixWidth {
    U8,
    U16,
    U32,
    U64,
}

/// How the element count of a list is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// Count stored before the elements
    Prefix(PrefixWidth),
    /// Count implied by the format; not stored
    Fixed(usize),
}

impl Default for Length {
    fn default() -> Self {
        Length::Prefix(PrefixWidth::U32)
    }
}

/// Element type of a list field
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Scalar(ScalarType),
    Nested(&'static str),
}

/// Layout tag of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Array { element: ScalarType, len: usize },
    List { element: ElementKind, length: Length },
    Nested(&'static str),
    Custom,
    Conditional(Box<FieldKind>),
}

/// One field of a structure
pub struct Field<T> {
    name: &'static str,
    kind: FieldKind,
    endian: Option<Endian>,
    condition: Option<fn(&T) -> bool>,
    read: ReadFn<T>,
    write: WriteFn<T>,
}

impl<T> Field<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Per-field byte order override, if any
    pub fn endian(&self) -> Option<Endian> {
        self.endian
    }

    /// Whether the field is present for this record
    pub fn is_present(&self, value: &T) -> bool {
        self.condition.is_none_or(|condition| condition(value))
    }
}

/// Ordered field list for one record type
pub struct Structure<T> {
    name: &'static str,
    endian: Endian,
    fields: Vec<Field<T>>,
}

impl<T: 'static> Structure<T> {
    /// Start declaring a structure with the given default byte order
    pub fn builder(name: &'static str, endian: Endian) -> StructureBuilder<T> {
        StructureBuilder::new(name, endian)
    }
}

impl<T> Structure<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field<T>> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Read every present field into `value`, in declaration order.
    ///
    /// Any failure aborts the whole record; `value` is left partially written.
    pub fn read(&self, value: &mut T, reader: &mut StreamReader<'_>) -> Result<(), StructError> {
        for field in &self.fields {
            if !field.is_present(value) {
                continue;
            }
            let endian = field.endian.unwrap_or(self.endian);
            (field.read)(value, reader, endian).map_err(|e| StructError::Read {
                structure: self.name,
                field: field.name,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }

    /// Write every present field of `value`, in declaration order
    pub fn write(&self, value: &T, writer: &mut StreamWriter) -> Result<(), StructError> {
        for field in &self.fields {
            if !field.is_present(value) {
                continue;
            }
            let endian = field.endian.unwrap_or(self.endian);
            (field.write)(value, writer, endian).map_err(|e| StructError::Write {
                structure: self.name,
                field: field.name,
                source: Box::new(e),
            })?;
        }
        Ok(())
    }
}

/// A record type with a static structure
pub trait Structured: Sized + 'static {
    fn structure() -> &'static Structure<Self>;

    fn read_from(&mut self, reader: &mut StreamReader<'_>) -> Result<(), StructError> {
        Self::structure().read(self, reader)
    }

    fn write_to(&self, writer: &mut StreamWriter) -> Result<(), StructError> {
        Self::structure().write(self, writer)
    }
}

/// Decode a default-constructed record from `data`.
///
/// Trailing bytes are not an error; the structure decides how much it reads.
pub fn decode<T: Structured + Default>(data: &[u8]) -> Result<T, StructError> {
    let mut value = T::default();
    let mut reader = StreamReader::new(data);
    value.read_from(&mut reader)?;
    Ok(value)
}

/// Encode a record into a fresh buffer
pub fn encode<T: Structured>(value: &T) -> Result<Vec<u8>, StructError> {
    let mut writer = StreamWriter::new();
    value.write_to(&mut writer)?;
    Ok(writer.into_inner())
}
