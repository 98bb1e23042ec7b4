//! Component factory table
//!
//! Maps keywords and type codes to component kinds. Kinds without a schema
//! are still listed so references and `component` lines can name them.

use std::fmt;
use std::sync::LazyLock;

use hashbrown::HashMap;
use pfx_argscript::{ArgScriptStream, StreamParser};

use crate::component::{Component, EffectComponent, EffectError, parse_component};
use crate::distribute::DistributeEffect;
use crate::light::LightEffect;
use crate::particles::ParticleEffect;
use crate::ribbon::RibbonEffect;
use crate::shake::ShakeEffect;
use crate::unit::EffectUnit;

/// Type code of visual effects, which imports also count as
pub const VISUAL_EFFECT: u16 = 0x00;

#[derive(Clone, Copy)]
struct Schema {
    create: fn(i32) -> Component,
    parser: StreamParser<EffectUnit>,
}

pub struct ComponentFactory {
    pub keyword: &'static str,
    pub type_code: u16,
    pub min_version: i32,
    pub max_version: i32,
    schema: Option<Schema>,
}

impl ComponentFactory {
    fn of<C: EffectComponent>() -> Self {
        Self {
            keyword: C::KEYWORD,
            type_code: C::TYPE_CODE,
            min_version: C::MIN_VERSION,
            max_version: C::MAX_VERSION,
            schema: Some(Schema {
                create: create::<C>,
                parser: parse_component::<C>,
            }),
        }
    }

    const fn named(keyword: &'static str, type_code: u16) -> Self {
        Self {
            keyword,
            type_code,
            min_version: 0,
            max_version: 0,
            schema: None,
        }
    }

    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    pub fn supports(&self, version: i32) -> bool {
        (self.min_version..=self.max_version).contains(&version)
    }

    /// A default component laid out for `version`
    pub fn create(&self, version: i32) -> Result<Component, EffectError> {
        let schema = self.schema.ok_or(EffectError::NoSchema(self.keyword))?;
        if !self.supports(version) {
            return Err(EffectError::UnsupportedVersion {
                keyword: self.keyword,
                version,
                min: self.min_version,
                max: self.max_version,
            });
        }
        Ok((schema.create)(version))
    }

    /// Register the block keyword of this kind with a unit stream
    pub(crate) fn register(&self, stream: &mut ArgScriptStream<EffectUnit>) {
        if let Some(schema) = self.schema {
            stream.add_parser(self.keyword, schema.parser);
        }
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("keyword", &self.keyword)
            .field("type_code", &self.type_code)
            .field("versions", &(self.min_version..=self.max_version))
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

fn create<C: EffectComponent>(version: i32) -> Component {
    C::with_version(version).into()
}

struct Registry {
    factories: Vec<ComponentFactory>,
    by_keyword: HashMap<&'static str, usize>,
    by_type: HashMap<u16, usize>,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let factories = vec![
        ComponentFactory::named("effect", VISUAL_EFFECT),
        ComponentFactory::of::<ParticleEffect>(),
        ComponentFactory::named("metaParticles", 0x02),
        ComponentFactory::named("decal", 0x03),
        ComponentFactory::named("sequence", 0x04),
        ComponentFactory::named("sound", 0x05),
        ComponentFactory::of::<ShakeEffect>(),
        ComponentFactory::named("camera", 0x07),
        ComponentFactory::named("model", 0x08),
        ComponentFactory::named("screen", 0x09),
        ComponentFactory::of::<LightEffect>(),
        ComponentFactory::named("game", 0x0B),
        ComponentFactory::named("fastParticles", 0x0C),
        ComponentFactory::of::<DistributeEffect>(),
        ComponentFactory::of::<RibbonEffect>(),
    ];
    let by_keyword = factories
        .iter()
        .enumerate()
        .map(|(i, factory)| (factory.keyword, i))
        .collect();
    let by_type = factories
        .iter()
        .enumerate()
        .map(|(i, factory)| (factory.type_code, i))
        .collect();
    Registry {
        factories,
        by_keyword,
        by_type,
    }
});

/// Every known component kind, in type code order
pub fn factories() -> &'static [ComponentFactory] {
    &REGISTRY.factories
}

pub fn factory_by_keyword(keyword: &str) -> Option<&'static ComponentFactory> {
    let registry = &*REGISTRY;
    registry.by_keyword.get(keyword).map(|&i| &registry.factories[i])
}

pub fn factory_by_type(type_code: u16) -> Option<&'static ComponentFactory> {
    let registry = &*REGISTRY;
    registry.by_type.get(&type_code).map(|&i| &registry.factories[i])
}

/// Keyword of `type_code`, `unknown` if it is not registered
pub fn keyword_of(type_code: u16) -> &'static str {
    factory_by_type(type_code).map_or("unknown", |factory| factory.keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let factory = factory_by_keyword("distribute").unwrap();
        assert_eq!(factory.type_code, 0x0D);
        assert_eq!((factory.min_version, factory.max_version), (3, 4));
        assert!(factory.has_schema());

        let factory = factory_by_type(0x05).unwrap();
        assert_eq!(factory.keyword, "sound");
        assert!(!factory.has_schema());

        assert!(factory_by_keyword("Distribute").is_none());
        assert_eq!(keyword_of(VISUAL_EFFECT), "effect");
        assert_eq!(keyword_of(0x7F), "unknown");
    }

    #[test]
    fn test_table_is_consistent() {
        for factory in factories() {
            assert_eq!(factory_by_keyword(factory.keyword).unwrap().type_code, factory.type_code);
            assert_eq!(factory_by_type(factory.type_code).unwrap().keyword, factory.keyword);
            if factory.has_schema() {
                assert!(factory.min_version <= factory.max_version);
                let component = factory.create(factory.max_version).unwrap();
                assert_eq!(component.type_code(), factory.type_code);
            }
        }
    }

    #[test]
    fn test_version_range() {
        let light = factory_by_keyword("light").unwrap();
        assert!(light.supports(1));
        assert!(light.supports(2));
        assert!(!light.supports(3));
        assert!(light.create(0).is_err());
    }
}
