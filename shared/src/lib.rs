//! Shared value types for PFX effect tools.
//!
//! Name hashing, resource identifiers, colors, vectors and the number
//! formatting used when writing scripts.

pub mod hash;

mod color;
mod math;
mod resource;
mod text;

pub use color::ColorRgb;
pub use hash::{HashError, NameRegistry, RegistryError, file_hash, file_name, fnv_hash, hex_to_string};
pub use math::Vector3;
pub use resource::{ResourceId, ResourceIdError};
pub use text::{float_to_string, vector_to_string};
