//! Placement of distributed instances

use std::sync::LazyLock;

use glam::{EulerRot, Mat3};
use pfx_argscript::{ArgScriptWriter, Line, StreamState};
use pfx_struct::{Endian, StreamReader, StreamWriter, StructError, Structure, Structured};

use crate::component::flag_scalar;

bitflags::bitflags! {
    /// Which parts of a [`Transform`] were set
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransformFlags: u16 {
        const SCALE = 0x1;
        const ROTATE = 0x2;
        const OFFSET = 0x4;
    }
}

flag_scalar!(TransformFlags, u16);

/// Scale, rotation and offset applied to a placed component.
///
/// The rotation is stored as a row-major 3x3 matrix of little-endian floats
/// after the big-endian flags and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub flags: TransformFlags,
    pub scale: f32,
    pub rotation: Mat3,
    pub offset: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            flags: TransformFlags::empty(),
            scale: 1.0,
            rotation: Mat3::IDENTITY,
            offset: [0.0; 3],
        }
    }
}

fn read_rotation(transform: &mut Transform, reader: &mut StreamReader<'_>, _endian: Endian) -> Result<(), StructError> {
    let mut rows = [0.0; 9];
    for value in &mut rows {
        *value = reader.read_f32(Endian::Little)?;
    }
    transform.rotation = Mat3::from_cols_array(&rows).transpose();
    Ok(())
}

fn write_rotation(transform: &Transform, writer: &mut StreamWriter, _endian: Endian) -> Result<(), StructError> {
    for value in transform.rotation.transpose().to_cols_array() {
        writer.write_f32(value, Endian::Little)?;
    }
    Ok(())
}

static STRUCTURE: LazyLock<Structure<Transform>> = LazyLock::new(|| {
    Structure::builder("Transform", Endian::Big)
        .scalar("flags", |s: &Transform| &s.flags, |s| &mut s.flags)
        .scalar("scale", |s| &s.scale, |s| &mut s.scale)
        .custom("rotation", read_rotation, write_rotation)
        .array("offset", |s| &s.offset, |s| &mut s.offset)
        .endian(Endian::Little)
        .build()
});

impl Structured for Transform {
    fn structure() -> &'static Structure<Self> {
        &STRUCTURE
    }
}

impl Transform {
    /// Rotation as `(x, y, z)` euler angles in degrees, applied Z then Y then X
    pub fn euler_degrees(&self) -> [f32; 3] {
        let (z, y, x) = self.rotation.to_euler(EulerRot::ZYX);
        [x.to_degrees(), y.to_degrees(), z.to_degrees()]
    }

    pub fn set_euler_degrees(&mut self, [x, y, z]: [f32; 3]) {
        self.rotation = Mat3::from_euler(EulerRot::ZYX, z.to_radians(), y.to_radians(), x.to_radians());
        self.flags |= TransformFlags::ROTATE;
    }

    /// Apply the `-offset`, `-scale` and `-rotate*` options of `line`
    pub fn parse(&mut self, state: &mut StreamState, line: &Line) {
        if let Some(args) = line.option_arguments(state, "offset", 1)
            && let Some(offset) = state.parse_vector3(args, 0)
        {
            self.offset = offset;
            self.flags |= TransformFlags::OFFSET;
        }
        if let Some(args) = line.option_arguments(state, "scale", 1)
            && let Some(scale) = state.parse_float(args, 0)
        {
            self.scale = scale;
            self.flags |= TransformFlags::SCALE;
        }

        let mut euler = [0.0; 3];
        let mut rotates = false;
        for (axis, name) in [(2, "rotateZ"), (1, "rotateY"), (0, "rotateX")] {
            if let Some(args) = line.option_arguments(state, name, 1)
                && let Some(angle) = state.parse_float(args, 0)
            {
                euler[axis] = angle;
                rotates = true;
            }
        }
        let mut values = Vec::with_capacity(3);
        if let Some(args) = line.option_arguments(state, "rotateXYZ", 3)
            && state.parse_floats(args, &mut values)
        {
            euler.copy_from_slice(&values);
            rotates = true;
        }
        values.clear();
        if let Some(args) = line.option_arguments(state, "rotateZXY", 3)
            && state.parse_floats(args, &mut values)
        {
            euler = [values[1], values[2], values[0]];
            rotates = true;
        }

        if rotates {
            self.set_euler_degrees(euler);
        }
    }

    /// Write the options for the parts that were set
    pub fn write(&self, writer: &mut ArgScriptWriter) {
        if self.flags.contains(TransformFlags::OFFSET) {
            writer.option("offset").vector(&self.offset);
        }
        if self.flags.contains(TransformFlags::SCALE) {
            writer.option("scale").floats([self.scale]);
        }
        if self.flags.contains(TransformFlags::ROTATE) {
            writer.option("rotateXYZ").floats(self.euler_degrees());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfx_argscript::PositionMap;

    fn parse(text: &str) -> Transform {
        let mut state = StreamState::new();
        let line = Line::parse(text, &PositionMap::new(), 0).unwrap();
        let mut transform = Transform::default();
        transform.parse(&mut state, &line);
        assert!(state.diagnostics().is_empty(), "{:?}", state.diagnostics());
        transform
    }

    fn write(transform: &Transform) -> String {
        let mut writer = ArgScriptWriter::new();
        writer.command("effect");
        transform.write(&mut writer);
        writer.finish()
    }

    fn assert_close(a: [f32; 3], b: [f32; 3]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-3, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_offset_and_scale() {
        let transform = parse("effect -offset (1, 2, 3) -scale 0.5");
        assert_eq!(transform.offset, [1.0, 2.0, 3.0]);
        assert_eq!(transform.scale, 0.5);
        assert_eq!(transform.flags, TransformFlags::OFFSET | TransformFlags::SCALE);
        assert_eq!(write(&transform), "effect -offset (1, 2, 3) -scale 0.5");
    }

    #[test]
    fn test_single_axis_rotation() {
        let transform = parse("effect -rotateZ 90");
        assert!(transform.flags.contains(TransformFlags::ROTATE));
        let x_axis = transform.rotation * glam::Vec3::X;
        assert!((x_axis - glam::Vec3::Y).length() < 1e-5);
        assert_close(transform.euler_degrees(), [0.0, 0.0, 90.0]);
    }

    #[test]
    fn test_rotate_zxy_order() {
        let zxy = parse("effect -rotateZXY 30 10 20");
        let xyz = parse("effect -rotateXYZ 10 20 30");
        assert!(zxy.rotation.abs_diff_eq(xyz.rotation, 1e-6));
    }

    #[test]
    fn test_rotation_survives_rewrite() {
        let transform = parse("effect -rotateXYZ 10 -20 45");
        let reparsed = parse(&write(&transform));
        assert!(reparsed.rotation.abs_diff_eq(transform.rotation, 1e-4));
    }

    #[test]
    fn test_unset_parts_are_not_written() {
        assert_eq!(write(&Transform::default()), "effect");
    }

    #[test]
    fn test_binary_layout() {
        let mut transform = Transform {
            scale: 2.0,
            offset: [1.0, 0.0, 0.0],
            ..Default::default()
        };
        transform.flags = TransformFlags::SCALE | TransformFlags::OFFSET;
        let bytes = pfx_struct::encode(&transform).unwrap();
        assert_eq!(bytes.len(), 2 + 4 + 36 + 12);
        assert_eq!(&bytes[..6], &[0, 5, 0x40, 0, 0, 0]);
        // identity diagonal, little-endian
        assert_eq!(&bytes[6..10], &[0, 0, 0x80, 0x3F]);
        assert_eq!(&bytes[38..42], &[0, 0, 0x80, 0x3F]);
        assert_eq!(&bytes[42..46], &[0, 0, 0x80, 0x3F]);
        assert_eq!(&bytes[46..], &[0; 8]);
        assert_eq!(pfx_struct::decode::<Transform>(&bytes).unwrap(), transform);
    }

    #[test]
    fn test_row_major_storage() {
        let transform = parse("effect -rotateZ 90");
        let bytes = pfx_struct::encode(&transform).unwrap();
        // m[0][1] is -sin(90) for a rotation about Z
        let m01 = f32::from_le_bytes(bytes[10..14].try_into().unwrap());
        assert!((m01 + 1.0).abs() < 1e-6);
    }
}
