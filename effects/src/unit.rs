//! A parsed `.pfx` script: named components, imports and exports

use pfx_argscript::{ArgScriptStream, ArgScriptWriter, Diagnostic, Line};
use pfx_shared::ResourceId;
use thiserror::Error;
use tracing::debug;

use crate::component::{Component, EffectRef, UsedElement};
use crate::directory::EffectDirectory;
use crate::factory::{VISUAL_EFFECT, factories, keyword_of};

/// Set on the index of references to imported effects
pub const IMPORT_INDEX_FLAG: i32 = i32::MIN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("There is no effect component called '{0}' in this PFX unit.")]
    NoComponent(String),
    #[error("Effect component '{name}' is not a {keyword} component.")]
    WrongType { name: String, keyword: &'static str },
    #[error("There is no effect called '{0}' in this PFX unit.")]
    NoEffect(String),
    #[error("Only effects can be exported. Components cannot be exported.")]
    NotExportable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// The import being exported
    pub name: String,
    pub export_name: String,
}

/// The components of one script, in definition order.
///
/// Names are unique across components and imports; redefining a name
/// replaces the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectUnit {
    components: Vec<(String, Component)>,
    imports: Vec<String>,
    exports: Vec<Export>,
}

impl EffectUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream with the default parsers, every component block keyword,
    /// `import` and `export`
    pub fn stream() -> ArgScriptStream<EffectUnit> {
        let mut stream = ArgScriptStream::new();
        stream.add_default_parsers();
        for factory in factories() {
            factory.register(&mut stream);
        }
        stream.add_parser("import", parse_import);
        stream.add_parser("export", parse_export);
        stream
    }

    /// Parse a whole script with default stream settings
    pub fn parse(text: &str) -> (Self, Vec<Diagnostic>) {
        let mut stream = Self::stream();
        let mut unit = Self::new();
        stream.process(&mut unit, text);
        let diagnostics = stream.take_diagnostics();
        debug!(
            components = unit.components.len(),
            imports = unit.imports.len(),
            diagnostics = diagnostics.len(),
            "parsed unit"
        );
        (unit, diagnostics)
    }

    pub fn components(&self) -> impl Iterator<Item = (&str, &Component)> {
        self.components
            .iter()
            .map(|(name, component)| (name.as_str(), component))
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, component)| component)
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components
            .iter_mut()
            .find(|(entry, _)| entry == name)
            .map(|(_, component)| component)
    }

    pub fn add_component(&mut self, name: impl Into<String>, component: Component) {
        let name = name.into();
        self.imports.retain(|import| *import != name);
        match self.components.iter_mut().find(|(entry, _)| *entry == name) {
            Some((_, slot)) => *slot = component,
            None => self.components.push((name, component)),
        }
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn add_import(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.components.retain(|(entry, _)| *entry != name);
        if !self.imports.contains(&name) {
            self.imports.push(name);
        }
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    /// Export an import under `export_name`
    pub fn add_export(&mut self, name: &str, export_name: &str) -> Result<(), UnitError> {
        if self.component(name).is_some() {
            return Err(UnitError::NotExportable);
        }
        if !self.imports.iter().any(|import| import == name) {
            return Err(UnitError::NoEffect(name.to_string()));
        }
        self.exports.retain(|export| export.export_name != export_name);
        self.exports.push(Export {
            name: name.to_string(),
            export_name: export_name.to_string(),
        });
        Ok(())
    }

    /// Resolve `name` as a component of `type_code`. Imports count as visual
    /// effects.
    pub fn resolve(&self, name: &str, type_code: u16) -> Result<EffectRef, UnitError> {
        if let Some(position) = self.imports.iter().position(|import| import == name) {
            if type_code != VISUAL_EFFECT {
                return Err(UnitError::WrongType {
                    name: name.to_string(),
                    keyword: keyword_of(type_code),
                });
            }
            return Ok(EffectRef::new(VISUAL_EFFECT, position as i32 | IMPORT_INDEX_FLAG));
        }

        let Some(component) = self.component(name) else {
            return Err(UnitError::NoComponent(name.to_string()));
        };
        if component.type_code() != type_code {
            return Err(UnitError::WrongType {
                name: name.to_string(),
                keyword: keyword_of(type_code),
            });
        }
        let index = self
            .of_type(type_code)
            .position(|(entry, _)| entry == name)
            .unwrap_or_default();
        Ok(EffectRef::new(type_code, index as i32))
    }

    fn of_type(&self, type_code: u16) -> impl Iterator<Item = (&str, &Component)> {
        self.components()
            .filter(move |(_, component)| component.type_code() == type_code)
    }

    /// Everything each component depends on, by component name
    pub fn used_elements(&self) -> Vec<(&str, UsedElement)> {
        self.components()
            .flat_map(|(name, component)| {
                component
                    .used_elements()
                    .into_iter()
                    .map(move |element| (name, element))
            })
            .collect()
    }

    /// Effect references that point at nothing in this unit
    pub fn dangling_references(&self) -> Vec<(&str, EffectRef)> {
        self.used_elements()
            .into_iter()
            .filter_map(|(name, element)| match element {
                UsedElement::Effect(reference)
                    if self.effect(reference.type_code, reference.index).is_none() =>
                {
                    Some((name, reference))
                }
                _ => None,
            })
            .collect()
    }

    /// Imports, then every component, then exports
    pub fn to_argscript(&self) -> String {
        let mut writer = ArgScriptWriter::new();
        for import in &self.imports {
            writer.command("import").arguments([import]);
        }
        for (name, component) in &self.components {
            if !writer.is_empty() {
                writer.blank_line();
            }
            component.write_block(name, &mut writer, self);
        }
        if !self.exports.is_empty() && !writer.is_empty() {
            writer.blank_line();
        }
        for export in &self.exports {
            writer.command("export").arguments([&export.name]);
            if export.export_name != export.name {
                writer.arguments([&export.export_name]);
            }
        }
        writer.finish()
    }
}

impl EffectDirectory for EffectUnit {
    fn index_of(&self, type_code: u16, name: &str) -> Option<i32> {
        self.resolve(name, type_code).ok().map(|reference| reference.index)
    }

    fn effect_name(&self, type_code: u16, index: i32) -> Option<&str> {
        if type_code == VISUAL_EFFECT && index & IMPORT_INDEX_FLAG != 0 {
            let position = usize::try_from(index & !IMPORT_INDEX_FLAG).ok()?;
            return self.imports.get(position).map(String::as_str);
        }
        let position = usize::try_from(index).ok()?;
        self.of_type(type_code).nth(position).map(|(name, _)| name)
    }

    fn resource(&self, _type_code: u16, _id: ResourceId) -> Option<String> {
        None
    }
}

fn parse_import(stream: &mut ArgScriptStream<EffectUnit>, unit: &mut EffectUnit, line: &Line) {
    if let Some(args) = line.arguments(stream, 1) {
        unit.add_import(args.single());
    }
}

fn parse_export(stream: &mut ArgScriptStream<EffectUnit>, unit: &mut EffectUnit, line: &Line) {
    let Some(args) = line.arguments(stream, 1..=2) else {
        return;
    };
    let name = args.get(0);
    let export_name = if args.len() == 2 { args.get(1) } else { name };
    if let Err(error) = unit.add_export(name, export_name) {
        stream.error(args.span(0), error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::EffectComponent;
    use crate::light::LightEffect;
    use crate::shake::ShakeEffect;

    fn sample_unit() -> EffectUnit {
        let mut unit = EffectUnit::new();
        unit.add_import("explosion");
        unit.add_component("rumble", ShakeEffect::default().into());
        unit.add_component("glow", LightEffect::default().into());
        unit.add_component("rumble2", ShakeEffect::default().into());
        unit
    }

    #[test]
    fn test_resolve() {
        let unit = sample_unit();
        assert_eq!(
            unit.resolve("rumble2", ShakeEffect::TYPE_CODE),
            Ok(EffectRef::new(ShakeEffect::TYPE_CODE, 1))
        );
        assert_eq!(
            unit.resolve("explosion", VISUAL_EFFECT),
            Ok(EffectRef::new(VISUAL_EFFECT, IMPORT_INDEX_FLAG))
        );
        assert_eq!(
            unit.resolve("nope", VISUAL_EFFECT).unwrap_err().to_string(),
            "There is no effect component called 'nope' in this PFX unit."
        );
        assert_eq!(
            unit.resolve("glow", ShakeEffect::TYPE_CODE).unwrap_err().to_string(),
            "Effect component 'glow' is not a shake component."
        );
        assert_eq!(
            unit.resolve("explosion", LightEffect::TYPE_CODE).unwrap_err().to_string(),
            "Effect component 'explosion' is not a light component."
        );
    }

    #[test]
    fn test_directory() {
        let unit = sample_unit();
        assert_eq!(unit.effect_name(ShakeEffect::TYPE_CODE, 1), Some("rumble2"));
        assert_eq!(unit.effect_name(VISUAL_EFFECT, IMPORT_INDEX_FLAG), Some("explosion"));
        assert_eq!(unit.effect_name(LightEffect::TYPE_CODE, 1), None);
        assert_eq!(unit.effect_name(LightEffect::TYPE_CODE, -1), None);
        assert_eq!(unit.index_of(LightEffect::TYPE_CODE, "glow"), Some(0));
        assert_eq!(
            unit.effect(ShakeEffect::TYPE_CODE, 0),
            Some(EffectRef::new(ShakeEffect::TYPE_CODE, 0))
        );
    }

    #[test]
    fn test_redefinition_replaces_in_place() {
        let mut unit = sample_unit();
        unit.add_component("rumble", LightEffect::default().into());
        let names: Vec<_> = unit.components().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["rumble", "glow", "rumble2"]);
        assert_eq!(unit.index_of(LightEffect::TYPE_CODE, "glow"), Some(1));

        unit.add_component("explosion", ShakeEffect::default().into());
        assert!(unit.imports().is_empty());
    }

    #[test]
    fn test_exports() {
        let mut unit = sample_unit();
        assert_eq!(unit.add_export("explosion", "boom"), Ok(()));
        assert_eq!(unit.add_export("rumble", "rumble"), Err(UnitError::NotExportable));
        assert_eq!(
            unit.add_export("missing", "missing").unwrap_err().to_string(),
            "There is no effect called 'missing' in this PFX unit."
        );
        assert_eq!(unit.exports().len(), 1);
    }

    #[test]
    fn test_parse_script() {
        let (unit, diagnostics) = EffectUnit::parse(
            "import explosion\n\
             shake rumble\n\tlength 2\nend\n\
             light glow\n\ttype point\nend\n\
             export explosion boom\n\
             export rumble",
        );
        assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");
        assert_eq!(
            diagnostics[0].message,
            "Only effects can be exported. Components cannot be exported."
        );
        assert_eq!(unit.imports(), ["explosion"]);
        assert_eq!(unit.components().count(), 2);
        assert_eq!(unit.exports()[0].export_name, "boom");
    }

    #[test]
    fn test_unknown_lines_in_blocks() {
        let (unit, diagnostics) = EffectUnit::parse("shake rumble\n\twobble 3\n\tlength 1\nend");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Unrecognised command 'wobble'.");
        let Some(Component::Shake(shake)) = unit.component("rumble") else {
            panic!("missing shake");
        };
        assert_eq!(shake.life, 1.0);
    }

    #[test]
    fn test_to_argscript_round_trip() {
        let text = "import explosion\n\n\
                    shake rumble\n\tlength 2\nend\n\n\
                    light glow\n\ttype point\nend\n\n\
                    export explosion boom";
        let (unit, diagnostics) = EffectUnit::parse(text);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let written = unit.to_argscript();
        assert_eq!(written, text);
        let (reparsed, diagnostics) = EffectUnit::parse(&written);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(reparsed, unit);
    }
}
