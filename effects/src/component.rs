//! Component plumbing shared by every effect kind
//!
//! A component pairs a binary [`Structure`](pfx_struct::Structure) with a
//! keyword grammar and a default-eliding writer. [`Component`] wraps the
//! concrete kinds so an [`EffectUnit`] can hold them side by side.

use std::fmt;

use pfx_argscript::{ArgScriptBlock, ArgScriptStream, ArgScriptWriter, Line, ParserTable, StreamState};
use pfx_shared::ResourceId;
use pfx_struct::{Endian, StreamReader, StreamWriter, StructError, Structured};
use thiserror::Error;
use tracing::debug;

use crate::context::ParseContext;
use crate::directory::EffectDirectory;
use crate::distribute::DistributeEffect;
use crate::factory::factory_by_keyword;
use crate::light::LightEffect;
use crate::particles::ParticleEffect;
use crate::ribbon::RibbonEffect;
use crate::shake::ShakeEffect;
use crate::unit::EffectUnit;

pub const HYPERLINK_FILE: &str = "file";
pub const HYPERLINK_TEXTURE: &str = "file-texture";
pub const HYPERLINK_MATERIAL: &str = "material";
pub const HYPERLINK_MAP: &str = "map";
pub const HYPERLINK_IMPORT: &str = "import";

/// Index-based reference to another component of a unit.
///
/// Stored in the binary format as a signed 32-bit index, `-1` for none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectRef {
    pub type_code: u16,
    pub index: i32,
}

impl EffectRef {
    pub const fn new(type_code: u16, index: i32) -> Self {
        Self { type_code, index }
    }

    pub fn read(
        reader: &mut StreamReader<'_>,
        endian: Endian,
        type_code: u16,
    ) -> Result<Option<Self>, StructError> {
        let index = reader.read_i32(endian)?;
        Ok((index != -1).then_some(Self::new(type_code, index)))
    }

    pub fn write(reference: Option<Self>, writer: &mut StreamWriter, endian: Endian) -> Result<(), StructError> {
        writer.write_i32(reference.map_or(-1, |reference| reference.index), endian)
    }
}

/// Something a component depends on, for dependency tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsedElement {
    Effect(EffectRef),
    Resource { type_code: u16, id: ResourceId },
}

/// Errors raised when creating, decoding or encoding components
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("Unknown component keyword '{0}'")]
    UnknownKeyword(String),
    #[error("Unknown component type code 0x{0:X}")]
    UnknownType(u16),
    #[error("The '{0}' component has no binary layout")]
    NoSchema(&'static str),
    #[error("Unsupported {keyword} version {version}: supported versions are {min} to {max}")]
    UnsupportedVersion {
        keyword: &'static str,
        version: i32,
        min: i32,
        max: i32,
    },
    #[error("Malformed {keyword} component: {source}")]
    Struct {
        keyword: &'static str,
        #[source]
        source: StructError,
    },
}

/// Handler for one keyword inside a component block
pub type ComponentParser<C> = fn(&mut ParseContext<'_>, &mut C, &Line);

/// A concrete effect component kind
pub trait EffectComponent: Structured + Clone + fmt::Debug + PartialEq + Into<Component> {
    const KEYWORD: &'static str;
    const TYPE_CODE: u16;
    const MIN_VERSION: i32;
    const MAX_VERSION: i32;

    /// A record with built-in defaults, laid out for `version`
    fn with_version(version: i32) -> Self;

    fn version(&self) -> i32;

    /// Keyword handlers for the lines of a block
    fn grammar() -> &'static ParserTable<ComponentParser<Self>>;

    /// Write the block body; the header line and `end` belong to the caller
    fn write_argscript(&self, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory);

    fn used_elements(&self) -> Vec<UsedElement>;
}

/// Implements [`pfx_struct::Scalar`] for a bitflags type so it can be
/// declared as a plain structure field. Unknown bits are retained.
macro_rules! flag_scalar {
    ($flags:ty, $bits:ty) => {
        impl pfx_struct::Scalar for $flags {
            const TYPE: pfx_struct::ScalarType = <$bits as pfx_struct::Scalar>::TYPE;

            fn read(
                reader: &mut pfx_struct::StreamReader<'_>,
                endian: pfx_struct::Endian,
            ) -> Result<Self, pfx_struct::StructError> {
                <$bits as pfx_struct::Scalar>::read(reader, endian).map(Self::from_bits_retain)
            }

            fn write(
                self,
                writer: &mut pfx_struct::StreamWriter,
                endian: pfx_struct::Endian,
            ) -> Result<(), pfx_struct::StructError> {
                pfx_struct::Scalar::write(self.bits(), writer, endian)
            }
        }
    };
}

pub(crate) use flag_scalar;

/// Any effect component
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Particles(Box<ParticleEffect>),
    Shake(Box<ShakeEffect>),
    Light(Box<LightEffect>),
    Distribute(Box<DistributeEffect>),
    Ribbon(Box<RibbonEffect>),
}

macro_rules! with_component {
    ($component:expr, $inner:ident => $body:expr) => {
        match $component {
            Component::Particles($inner) => $body,
            Component::Shake($inner) => $body,
            Component::Light($inner) => $body,
            Component::Distribute($inner) => $body,
            Component::Ribbon($inner) => $body,
        }
    };
}

macro_rules! component_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Component {
            fn from(component: $ty) -> Self {
                Component::$variant(Box::new(component))
            }
        }
    };
}

component_from!(ParticleEffect, Particles);
component_from!(ShakeEffect, Shake);
component_from!(LightEffect, Light);
component_from!(DistributeEffect, Distribute);
component_from!(RibbonEffect, Ribbon);

fn keyword_of<C: EffectComponent>(_: &C) -> &'static str {
    C::KEYWORD
}

fn type_code_of<C: EffectComponent>(_: &C) -> u16 {
    C::TYPE_CODE
}

impl Component {
    /// A default component for `keyword`, at `version` or the newest supported
    /// one
    pub fn new(keyword: &str, version: Option<i32>) -> Result<Self, EffectError> {
        let factory = factory_by_keyword(keyword).ok_or_else(|| EffectError::UnknownKeyword(keyword.to_string()))?;
        factory.create(version.unwrap_or(factory.max_version))
    }

    /// Read a component blob written at `version`
    pub fn decode(keyword: &str, version: i32, data: &[u8]) -> Result<Self, EffectError> {
        let mut component = Self::new(keyword, Some(version))?;
        let mut reader = StreamReader::new(data);
        component.read_from(&mut reader).map_err(|source| EffectError::Struct {
            keyword: component.keyword(),
            source,
        })?;
        debug!(keyword, version, trailing = reader.remaining(), "decoded component");
        Ok(component)
    }

    pub fn encode(&self) -> Result<Vec<u8>, EffectError> {
        let mut writer = StreamWriter::new();
        self.write_to(&mut writer).map_err(|source| EffectError::Struct {
            keyword: self.keyword(),
            source,
        })?;
        Ok(writer.into_inner())
    }

    pub fn keyword(&self) -> &'static str {
        with_component!(self, c => keyword_of(&**c))
    }

    pub fn type_code(&self) -> u16 {
        with_component!(self, c => type_code_of(&**c))
    }

    pub fn version(&self) -> i32 {
        with_component!(self, c => c.version())
    }

    pub fn read_from(&mut self, reader: &mut StreamReader<'_>) -> Result<(), StructError> {
        with_component!(self, c => c.read_from(reader))
    }

    pub fn write_to(&self, writer: &mut StreamWriter) -> Result<(), StructError> {
        with_component!(self, c => c.write_to(writer))
    }

    pub fn used_elements(&self) -> Vec<UsedElement> {
        with_component!(self, c => c.used_elements())
    }

    /// Write `keyword name ... end`
    pub fn write_block(&self, name: &str, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
        writer.command(self.keyword()).arguments([name]);
        writer.start_block();
        with_component!(self, c => c.write_argscript(writer, directory));
        writer.end_block();
        writer.command_end();
    }

    /// The block text of this component, named `name`
    pub fn to_argscript(&self, name: &str, directory: &dyn EffectDirectory) -> String {
        let mut writer = ArgScriptWriter::new();
        self.write_block(name, &mut writer, directory);
        writer.finish()
    }
}

/// The open block of a component being parsed. The component joins the unit
/// when the block ends.
struct ComponentBlock<C> {
    name: Option<String>,
    component: C,
}

impl<C: EffectComponent> ArgScriptBlock<EffectUnit> for ComponentBlock<C> {
    fn parse_line(&mut self, state: &mut StreamState, unit: &mut EffectUnit, line: &Line) -> bool {
        let Some(parser) = C::grammar().get(line.keyword()) else {
            return false;
        };
        let mut cx = ParseContext::new(state, unit);
        parser(&mut cx, &mut self.component, line);
        true
    }

    fn on_block_end(self: Box<Self>, _state: &mut StreamState, unit: &mut EffectUnit) {
        if let Some(name) = self.name {
            unit.add_component(name, self.component.into());
        }
    }
}

/// Stream handler for a component header line, `keyword name`
pub(crate) fn parse_component<C: EffectComponent>(
    stream: &mut ArgScriptStream<EffectUnit>,
    _unit: &mut EffectUnit,
    line: &Line,
) {
    // The block opens even without a name so its `end` still pairs up
    let name = line.arguments(stream, 1).map(|args| args.single().to_string());
    stream.start_block(Box::new(ComponentBlock {
        name,
        component: C::with_version(C::MAX_VERSION),
    }));
}

/// Build a parser table from `(keyword, handler)` pairs
pub(crate) fn grammar<C>(entries: &[(&str, ComponentParser<C>)]) -> ParserTable<ComponentParser<C>> {
    let mut table = ParserTable::new();
    for &(keyword, parser) in entries {
        table.add(keyword, parser);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_ref_sentinel() {
        let mut writer = StreamWriter::new();
        EffectRef::write(None, &mut writer, Endian::Big).unwrap();
        EffectRef::write(Some(EffectRef::new(1, 3)), &mut writer, Endian::Big).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes, [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 3]);

        let mut reader = StreamReader::new(&bytes);
        assert_eq!(EffectRef::read(&mut reader, Endian::Big, 1).unwrap(), None);
        assert_eq!(
            EffectRef::read(&mut reader, Endian::Big, 1).unwrap(),
            Some(EffectRef::new(1, 3))
        );
    }

    #[test]
    fn test_new_component() {
        let component = Component::new("light", None).unwrap();
        assert_eq!(component.keyword(), "light");
        assert_eq!(component.type_code(), LightEffect::TYPE_CODE);
        assert_eq!(component.version(), LightEffect::MAX_VERSION);

        assert!(matches!(
            Component::new("wobble", None),
            Err(EffectError::UnknownKeyword(_))
        ));
        assert!(matches!(
            Component::new("sound", None),
            Err(EffectError::NoSchema("sound"))
        ));
        assert!(matches!(
            Component::new("shake", Some(7)),
            Err(EffectError::UnsupportedVersion { version: 7, .. })
        ));
    }

    #[test]
    fn test_decode_short_blob() {
        let err = Component::decode("shake", 2, &[0, 0, 0]).unwrap_err();
        assert!(matches!(err, EffectError::Struct { keyword: "shake", .. }));
    }

    #[test]
    fn test_encode_decode_every_schema() {
        for keyword in ["particles", "shake", "light", "distribute", "ribbon"] {
            let factory = factory_by_keyword(keyword).unwrap();
            for version in factory.min_version..=factory.max_version {
                let component = factory.create(version).unwrap();
                let bytes = component.encode().unwrap();
                let decoded = Component::decode(keyword, version, &bytes).unwrap();
                assert_eq!(decoded, component, "{keyword} v{version}");
                assert_eq!(decoded.encode().unwrap(), bytes, "{keyword} v{version}");
            }
        }
    }
}
