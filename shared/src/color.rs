//! RGB colors stored as little-endian floats

use std::fmt;
use std::sync::LazyLock;

use pfx_struct::{Endian, Structure, Structured};

use crate::text::float_to_string;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorRgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl ColorRgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Color from 0-255 channel values
    pub fn from_255(r: f32, g: f32, b: f32) -> Self {
        Self::new(r / 255.0, g / 255.0, b / 255.0)
    }

    pub fn is_white(&self) -> bool {
        *self == Self::white()
    }

    pub fn is_black(&self) -> bool {
        *self == Self::black()
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[f32; 3]> for ColorRgb {
    fn from(value: [f32; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl fmt::Display for ColorRgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            float_to_string(self.r),
            float_to_string(self.g),
            float_to_string(self.b)
        )
    }
}

static COLOR_RGB: LazyLock<Structure<ColorRgb>> = LazyLock::new(|| {
    Structure::builder("ColorRgb", Endian::Little)
        .scalar("r", |s: &ColorRgb| &s.r, |s| &mut s.r)
        .scalar("g", |s| &s.g, |s| &mut s.g)
        .scalar("b", |s| &s.b, |s| &mut s.b)
        .build()
});

impl Structured for ColorRgb {
    fn structure() -> &'static Structure<Self> {
        &COLOR_RGB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ColorRgb::white().to_string(), "(1, 1, 1)");
        assert_eq!(ColorRgb::new(0.5, 0.0, 0.25).to_string(), "(0.5, 0, 0.25)");
    }

    #[test]
    fn test_little_endian_layout() {
        let bytes = pfx_struct::encode(&ColorRgb::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(bytes, vec![0, 0, 0x80, 0x3F, 0, 0, 0, 0, 0, 0, 0, 0]);
        let color: ColorRgb = pfx_struct::decode(&bytes).unwrap();
        assert_eq!(color, ColorRgb::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_from_255() {
        assert_eq!(ColorRgb::from_255(255.0, 0.0, 255.0), ColorRgb::new(1.0, 0.0, 1.0));
    }
}
