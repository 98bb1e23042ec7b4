//! Resource identifiers: `(group, instance)` hash pairs

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use pfx_struct::{Endian, Structure, Structured};
use thiserror::Error;

use crate::hash::{HashError, file_hash, file_name};

/// A failed `group!instance` parse, with the byte span of the offending name
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct ResourceIdError {
    pub error: HashError,
    pub span: Range<usize>,
}

/// Identifies an external resource such as a texture, map or material.
///
/// The default `(0xFFFFFFFF, 0xFFFFFFFF)` means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub group_id: u32,
    pub instance_id: u32,
}

impl Default for ResourceId {
    fn default() -> Self {
        Self {
            group_id: u32::MAX,
            instance_id: u32::MAX,
        }
    }
}

impl ResourceId {
    pub const fn new(group_id: u32, instance_id: u32) -> Self {
        Self {
            group_id,
            instance_id,
        }
    }

    /// `(0, 0)`, written as `terrain` in map references
    pub const fn terrain() -> Self {
        Self::new(0, 0)
    }

    pub const fn water() -> Self {
        Self::new(1, 0)
    }

    pub fn is_default(&self) -> bool {
        self.group_id == u32::MAX && self.instance_id == u32::MAX
    }

    pub fn is_zero(&self) -> bool {
        self.group_id == 0 && self.instance_id == 0
    }

    /// Parse `instance` (group 0) or `group!instance`
    pub fn parse(text: &str) -> Result<Self, ResourceIdError> {
        match text.split_once('!') {
            None => {
                let instance_id = file_hash(text).map_err(|error| ResourceIdError {
                    error,
                    span: 0..text.len(),
                })?;
                Ok(Self::new(0, instance_id))
            }
            Some((group, instance)) => {
                let group_id = file_hash(group).map_err(|error| ResourceIdError {
                    error,
                    span: 0..group.len(),
                })?;
                let instance_id = file_hash(instance).map_err(|error| ResourceIdError {
                    error,
                    span: group.len() + 1..text.len(),
                })?;
                Ok(Self::new(group_id, instance_id))
            }
        }
    }

    /// Like [`parse`](Self::parse), but also accepts `terrain` and `water`
    pub fn parse_special(text: &str) -> Result<Self, ResourceIdError> {
        match text {
            "terrain" => Ok(Self::terrain()),
            "water" => Ok(Self::water()),
            _ => Self::parse(text),
        }
    }

    /// The `[group, instance]` names as written in a script
    pub fn words(&self) -> [Option<String>; 2] {
        let group = (self.group_id != 0).then(|| file_name(self.group_id));
        [group, Some(file_name(self.instance_id))]
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::water() {
            return write!(f, "water");
        }
        if self.group_id != 0 {
            write!(f, "{}!", file_name(self.group_id))?;
        }
        write!(f, "{}", file_name(self.instance_id))
    }
}

static RESOURCE_ID: LazyLock<Structure<ResourceId>> = LazyLock::new(|| {
    Structure::builder("ResourceId", Endian::Big)
        .scalar("group_id", |s: &ResourceId| &s.group_id, |s| &mut s.group_id)
        .scalar("instance_id", |s| &s.instance_id, |s| &mut s.instance_id)
        .build()
});

impl Structured for ResourceId {
    fn structure() -> &'static Structure<Self> {
        &RESOURCE_ID
    }
}
