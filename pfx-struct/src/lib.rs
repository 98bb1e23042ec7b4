//! pfx-struct: declarative binary layouts for PFX effect records
//!
//! Effect components are stored by the game in a fixed, externally dictated
//! binary format: big-endian by default, little-endian for most vector
//! fields, 32-bit count prefixes on variable lists, nested records inlined
//! with no size header. This crate replaces per-record hand-written readers
//! with a field table that is declared once and walked in both directions.
//!
//! # Key Features
//!
//! - **Exact round trips**: `write(read(bytes)) == bytes` for any schema
//! - **Per-field byte order**: each field may override the structure default
//! - **Version gating**: conditional fields keyed on the record's own state
//! - **Hooks**: custom read/write functions for bit-packed or indexed fields
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::LazyLock;
//! use pfx_struct::{Endian, Structure, Structured};
//!
//! #[derive(Default)]
//! struct Light {
//!     kind: u8,
//!     size: Vec<f32>,
//! }
//!
//! static LIGHT: LazyLock<Structure<Light>> = LazyLock::new(|| {
//!     Structure::builder("Light", Endian::Big)
//!         .scalar("kind", |s: &Light| &s.kind, |s| &mut s.kind)
//!         .list("size", |s| &s.size, |s| &mut s.size)
//!         .build()
//! });
//!
//! impl Structured for Light {
//!     fn structure() -> &'static Structure<Self> {
//!         &LIGHT
//!     }
//! }
//!
//! let light: Light = pfx_struct::decode(&bytes)?;
//! ```

mod error;
mod scalar;
mod stream;
mod structure;

pub use error::StructError;
pub use scalar::{Scalar, ScalarType};
pub use stream::{Endian, StreamReader, StreamWriter};
pub use structure::{
    ElementKind, Field, FieldKind, Length, PrefixWidth, ReadHook, Structure, StructureBuilder,
    Structured, WriteHook, decode, encode,
};
