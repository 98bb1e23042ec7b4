//! Fluent construction of structure metadata

use super::{
    ElementKind, Field, FieldKind, Length, PrefixWidth, ReadFn, ReadHook, Structure, Structured,
    WriteFn, WriteHook,
};
use crate::error::StructError;
use crate::scalar::Scalar;
use crate::stream::{Endian, StreamReader, StreamWriter};

/// Declares the fields of a [`Structure`] in binary order.
///
/// Accessors are plain function pointers, so non-capturing closures work:
///
/// ```ignore
/// Structure::builder("ResourceId", Endian::Big)
///     .scalar("group_id", |s: &ResourceId| &s.group_id, |s| &mut s.group_id)
///     .scalar("instance_id", |s| &s.instance_id, |s| &mut s.instance_id)
///     .build()
/// ```
///
/// [`endian`](Self::endian) and [`when`](Self::when) modify the field added last.
pub struct StructureBuilder<T> {
    name: &'static str,
    endian: Endian,
    fields: Vec<Field<T>>,
}

impl<T: 'static> StructureBuilder<T> {
    pub(crate) fn new(name: &'static str, endian: Endian) -> Self {
        Self {
            name,
            endian,
            fields: Vec::new(),
        }
    }

    fn push(mut self, name: &'static str, kind: FieldKind, read: ReadFn<T>, write: WriteFn<T>) -> Self {
        self.fields.push(Field {
            name,
            kind,
            endian: None,
            condition: None,
            read,
            write,
        });
        self
    }

    /// A single scalar value
    pub fn scalar<V: Scalar>(
        self,
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        self.push(
            name,
            FieldKind::Scalar(V::TYPE),
            Box::new(move |value, reader, endian| {
                *get_mut(value) = V::read(reader, endian)?;
                Ok(())
            }),
            Box::new(move |value, writer, endian| V::write(*get(value), writer, endian)),
        )
    }

    /// `N` scalars stored back to back
    pub fn array<V: Scalar, const N: usize>(
        self,
        name: &'static str,
        get: fn(&T) -> &[V; N],
        get_mut: fn(&mut T) -> &mut [V; N],
    ) -> Self {
        self.push(
            name,
            FieldKind::Array {
                element: V::TYPE,
                len: N,
            },
            Box::new(move |value, reader, endian| {
                for slot in get_mut(value).iter_mut() {
                    *slot = V::read(reader, endian)?;
                }
                Ok(())
            }),
            Box::new(move |value, writer, endian| {
                for item in get(value) {
                    item.write(writer, endian)?;
                }
                Ok(())
            }),
        )
    }

    /// Scalars preceded by an unsigned 32-bit count
    pub fn list<V: Scalar>(
        self,
        name: &'static str,
        get: fn(&T) -> &Vec<V>,
        get_mut: fn(&mut T) -> &mut Vec<V>,
    ) -> Self {
        self.list_with(name, Length::default(), get, get_mut)
    }

    /// Scalars with an explicit length encoding
    pub fn list_with<V: Scalar>(
        self,
        name: &'static str,
        length: Length,
        get: fn(&T) -> &Vec<V>,
        get_mut: fn(&mut T) -> &mut Vec<V>,
    ) -> Self {
        self.push(
            name,
            FieldKind::List {
                element: ElementKind::Scalar(V::TYPE),
                length,
            },
            Box::new(move |value, reader, endian| {
                let count = read_length(reader, name, length, endian)?;
                let items = get_mut(value);
                items.clear();
                items.reserve(count);
                for _ in 0..count {
                    items.push(V::read(reader, endian)?);
                }
                Ok(())
            }),
            Box::new(move |value, writer, endian| {
                let items = get(value);
                write_length(writer, name, length, items.len(), endian)?;
                for item in items {
                    item.write(writer, endian)?;
                }
                Ok(())
            }),
        )
    }

    /// Another structured record, inlined
    pub fn nested<S: Structured>(
        self,
        name: &'static str,
        get: fn(&T) -> &S,
        get_mut: fn(&mut T) -> &mut S,
    ) -> Self {
        self.push(
            name,
            FieldKind::Nested(S::structure().name()),
            Box::new(move |value, reader, _| get_mut(value).read_from(reader)),
            Box::new(move |value, writer, _| get(value).write_to(writer)),
        )
    }

    /// Structured records preceded by an unsigned 32-bit count
    pub fn nested_list<S: Structured + Default>(
        self,
        name: &'static str,
        get: fn(&T) -> &Vec<S>,
        get_mut: fn(&mut T) -> &mut Vec<S>,
    ) -> Self {
        let length = Length::default();
        self.push(
            name,
            FieldKind::List {
                element: ElementKind::Nested(S::structure().name()),
                length,
            },
            Box::new(move |value, reader, endian| {
                let count = read_length(reader, name, length, endian)?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    let mut item = S::default();
                    item.read_from(reader)?;
                    items.push(item);
                }
                *get_mut(value) = items;
                Ok(())
            }),
            Box::new(move |value, writer, endian| {
                let items = get(value);
                write_length(writer, name, length, items.len(), endian)?;
                for item in items {
                    item.write_to(writer)?;
                }
                Ok(())
            }),
        )
    }

    /// Hand-written hooks in place of the generic path
    pub fn custom(self, name: &'static str, read: ReadHook<T>, write: WriteHook<T>) -> Self {
        self.push(
            name,
            FieldKind::Custom,
            Box::new(move |value, reader, endian| read(value, reader, endian)),
            Box::new(move |value, writer, endian| write(value, writer, endian)),
        )
    }

    /// Override the byte order of the last field
    pub fn endian(mut self, endian: Endian) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.endian = Some(endian);
        }
        self
    }

    /// Only read/write the last field when `predicate` holds
    pub fn when(mut self, predicate: fn(&T) -> bool) -> Self {
        if let Some(field) = self.fields.last_mut() {
            field.condition = Some(predicate);
            let kind = std::mem::replace(&mut field.kind, FieldKind::Custom);
            field.kind = FieldKind::Conditional(Box::new(kind));
        }
        self
    }

    pub fn build(self) -> Structure<T> {
        Structure {
            name: self.name,
            endian: self.endian,
            fields: self.fields,
        }
    }
}

fn read_length(
    reader: &mut StreamReader<'_>,
    field: &'static str,
    length: Length,
    endian: Endian,
) -> Result<usize, StructError> {
    let count = match length {
        Length::Fixed(count) => return Ok(count),
        Length::Prefix(PrefixWidth::U8) => u64::from(reader.read_u8()?),
        Length::Prefix(PrefixWidth::U16) => u64::from(reader.read_u16(endian)?),
        Length::Prefix(PrefixWidth::U32) => u64::from(reader.read_u32(endian)?),
        Length::Prefix(PrefixWidth::U64) => reader.read_u64(endian)?,
    };
    // Every element takes at least one byte
    if count > reader.remaining() as u64 {
        return Err(StructError::InvalidLength {
            field,
            length: count,
        });
    }
    Ok(count as usize)
}

fn write_length(
    writer: &mut StreamWriter,
    field: &'static str,
    length: Length,
    len: usize,
    endian: Endian,
) -> Result<(), StructError> {
    let overflow = || StructError::LengthOverflow { field, length: len };
    match length {
        Length::Fixed(expected) => {
            if expected != len {
                return Err(StructError::FixedLength {
                    field,
                    expected,
                    actual: len,
                });
            }
            Ok(())
        }
        Length::Prefix(PrefixWidth::U8) => {
            writer.write_u8(u8::try_from(len).map_err(|_| overflow())?)
        }
        Length::Prefix(PrefixWidth::U16) => {
            writer.write_u16(u16::try_from(len).map_err(|_| overflow())?, endian)
        }
        Length::Prefix(PrefixWidth::U32) => {
            writer.write_u32(u32::try_from(len).map_err(|_| overflow())?, endian)
        }
        Length::Prefix(PrefixWidth::U64) => writer.write_u64(len as u64, endian),
    }
}
