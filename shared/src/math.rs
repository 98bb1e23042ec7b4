//! Plain vector type for records that store points
//!
//! Components keep most vectors as `[f32; 3]` arrays. [`Vector3`] exists for
//! the places that need a structured element, such as lists of points.

use std::fmt;
use std::sync::LazyLock;

use pfx_struct::{Endian, Structure, Structured};

use crate::text::vector_to_string;

/// Three little-endian floats
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from(value: [f32; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl From<Vector3> for [f32; 3] {
    fn from(value: Vector3) -> Self {
        value.to_array()
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&vector_to_string(&self.to_array()))
    }
}

static VECTOR3: LazyLock<Structure<Vector3>> = LazyLock::new(|| {
    Structure::builder("Vector3", Endian::Little)
        .scalar("x", |s: &Vector3| &s.x, |s| &mut s.x)
        .scalar("y", |s| &s.y, |s| &mut s.y)
        .scalar("z", |s| &s.z, |s| &mut s.z)
        .build()
});

impl Structured for Vector3 {
    fn structure() -> &'static Structure<Self> {
        &VECTOR3
    }
}
