//! Tests for structure metadata

use std::sync::LazyLock;

use super::*;
use crate::scalar::ScalarType;

#[derive(Debug, Clone, Default, PartialEq)]
struct Point {
    x: f32,
    y: f32,
}

static POINT: LazyLock<Structure<Point>> = LazyLock::new(|| {
    Structure::builder("Point", Endian::Little)
        .scalar("x", |s: &Point| &s.x, |s| &mut s.x)
        .scalar("y", |s| &s.y, |s| &mut s.y)
        .build()
});

impl Structured for Point {
    fn structure() -> &'static Structure<Self> {
        &POINT
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Record {
    version: i32,
    flags: u64,
    kind: u8,
    offset: [f32; 2],
    weights: Vec<i16>,
    origin: Point,
    path: Vec<Point>,
    extra: f32,
}

fn read_flags(record: &mut Record, reader: &mut StreamReader<'_>, endian: Endian) -> Result<(), StructError> {
    let high = reader.read_u32(endian)?;
    let low = reader.read_u32(endian)?;
    record.flags = (u64::from(high) << 32) | u64::from(low);
    Ok(())
}

fn write_flags(record: &Record, writer: &mut StreamWriter, endian: Endian) -> Result<(), StructError> {
    writer.write_u32((record.flags >> 32) as u32, endian)?;
    writer.write_u32(record.flags as u32, endian)
}

static RECORD: LazyLock<Structure<Record>> = LazyLock::new(|| {
    Structure::builder("Record", Endian::Big)
        .scalar("version", |s: &Record| &s.version, |s| &mut s.version)
        .custom("flags", read_flags, write_flags)
        .scalar("kind", |s| &s.kind, |s| &mut s.kind)
        .array("offset", |s| &s.offset, |s| &mut s.offset)
        .endian(Endian::Little)
        .list("weights", |s| &s.weights, |s| &mut s.weights)
        .nested("origin", |s| &s.origin, |s| &mut s.origin)
        .nested_list("path", |s| &s.path, |s| &mut s.path)
        .scalar("extra", |s| &s.extra, |s| &mut s.extra)
        .when(|s| s.version > 1)
        .build()
});

impl Structured for Record {
    fn structure() -> &'static Structure<Self> {
        &RECORD
    }
}

fn sample_bytes(version: i32) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&version.to_be_bytes());
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01]);
    bytes.push(5);
    bytes.extend_from_slice(&1.0f32.to_le_bytes());
    bytes.extend_from_slice(&(-2.0f32).to_le_bytes());
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&7i16.to_be_bytes());
    bytes.extend_from_slice(&(-3i16).to_be_bytes());
    bytes.extend_from_slice(&0.5f32.to_le_bytes());
    bytes.extend_from_slice(&0.25f32.to_le_bytes());
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.extend_from_slice(&3.0f32.to_le_bytes());
    bytes.extend_from_slice(&4.0f32.to_le_bytes());
    if version > 1 {
        bytes.extend_from_slice(&9.5f32.to_be_bytes());
    }
    bytes
}

#[test]
fn test_read_all_field_kinds() {
    let record: Record = decode(&sample_bytes(2)).unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.flags, (8u64 << 32) | 1);
    assert_eq!(record.kind, 5);
    assert_eq!(record.offset, [1.0, -2.0]);
    assert_eq!(record.weights, vec![7, -3]);
    assert_eq!(record.origin, Point { x: 0.5, y: 0.25 });
    assert_eq!(record.path, vec![Point { x: 3.0, y: 4.0 }]);
    assert_eq!(record.extra, 9.5);
}

#[test]
fn test_round_trip_is_byte_exact() {
    for version in [1, 2] {
        let bytes = sample_bytes(version);
        let record: Record = decode(&bytes).unwrap();
        assert_eq!(encode(&record).unwrap(), bytes);
    }
}

#[test]
fn test_conditional_field_skipped() {
    let record: Record = decode(&sample_bytes(1)).unwrap();
    assert_eq!(record.extra, 0.0);

    let mut record = record;
    record.extra = 42.0;
    // Not written for version 1
    assert_eq!(encode(&record).unwrap(), sample_bytes(1));
}

#[test]
fn test_list_read_replaces_contents() {
    let mut record = Record {
        weights: vec![1, 2, 3, 4],
        ..Default::default()
    };
    let bytes = sample_bytes(1);
    let mut reader = StreamReader::new(&bytes);
    record.read_from(&mut reader).unwrap();
    assert_eq!(record.weights, vec![7, -3]);
    assert!(reader.is_at_end());
}

#[test]
fn test_short_read_reports_field() {
    let bytes = sample_bytes(2);
    let err = decode::<Record>(&bytes[..bytes.len() - 2]).unwrap_err();
    match &err {
        StructError::Read { structure, field, .. } => {
            assert_eq!(*structure, "Record");
            assert_eq!(*field, "extra");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(err.root_cause(), &StructError::UnexpectedEof);
}

#[test]
fn test_huge_length_prefix_rejected() {
    let mut bytes = sample_bytes(1);
    // weights count starts after version(4) + flags(8) + kind(1) + offset(8)
    bytes[21..25].copy_from_slice(&u32::MAX.to_be_bytes());
    let err = decode::<Record>(&bytes).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        StructError::InvalidLength { field: "weights", .. }
    ));
}

#[derive(Debug, Default)]
struct Fixed {
    values: Vec<u8>,
}

#[test]
fn test_fixed_length_mismatch_on_write() {
    let structure = Structure::builder("Fixed", Endian::Big)
        .list_with(
            "values",
            Length::Fixed(3),
            |s: &Fixed| &s.values,
            |s| &mut s.values,
        )
        .build();

    let mut writer = StreamWriter::new();
    let ok = Fixed { values: vec![1, 2, 3] };
    structure.write(&ok, &mut writer).unwrap();
    assert_eq!(writer.as_bytes(), &[1, 2, 3]);

    let bad = Fixed { values: vec![1] };
    let err = structure.write(&bad, &mut StreamWriter::new()).unwrap_err();
    assert_eq!(
        err.root_cause(),
        &StructError::FixedLength {
            field: "values",
            expected: 3,
            actual: 1
        }
    );
}

#[test]
fn test_short_prefix_overflow() {
    let structure = Structure::builder("Short", Endian::Big)
        .list_with(
            "values",
            Length::Prefix(PrefixWidth::U8),
            |s: &Fixed| &s.values,
            |s| &mut s.values,
        )
        .build();
    let value = Fixed {
        values: vec![0; 300],
    };
    let err = structure.write(&value, &mut StreamWriter::new()).unwrap_err();
    assert!(matches!(
        err.root_cause(),
        StructError::LengthOverflow { length: 300, .. }
    ));
}

#[test]
fn test_field_metadata() {
    let structure = Record::structure();
    assert_eq!(structure.name(), "Record");
    assert_eq!(structure.fields().len(), 8);

    let offset = structure.field("offset").unwrap();
    assert_eq!(offset.endian(), Some(Endian::Little));
    assert_eq!(
        offset.kind(),
        &FieldKind::Array {
            element: ScalarType::F32,
            len: 2
        }
    );

    let extra = structure.field("extra").unwrap();
    assert_eq!(
        extra.kind(),
        &FieldKind::Conditional(Box::new(FieldKind::Scalar(ScalarType::F32)))
    );
    assert!(!extra.is_present(&Record::default()));

    assert_eq!(
        structure.field("path").unwrap().kind(),
        &FieldKind::List {
            element: ElementKind::Nested("Point"),
            length: Length::Prefix(PrefixWidth::U32)
        }
    );
}
