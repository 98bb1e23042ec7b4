//! Collision surfaces of particles and distributions

use std::sync::LazyLock;

use pfx_argscript::{ArgScriptWriter, Line};
use pfx_shared::{ResourceId, Vector3};
use pfx_struct::{Endian, StreamReader, StreamWriter, StructError, Structure, Structured};

use crate::component::{EffectRef, HYPERLINK_MAP, UsedElement, flag_scalar};
use crate::context::ParseContext;
use crate::directory::{EffectDirectory, MAP_RESOURCE, map_name, reference_name};
use crate::factory::VISUAL_EFFECT;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SurfaceFlags: u32 {
        const BOUNCE = 0x01;
        const PIN = 0x02;
        const PIN_MOVE = 0x04;
        const PIN_EMIT = 0x08;
        const ALIGN = 0x20;
        const SOURCE_SPACE = 0x40;
        const WORLD_SPACE = 0x80;
    }
}

flag_scalar!(SurfaceFlags, u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub flags: SurfaceFlags,
    pub surface_map: ResourceId,
    pub bounce: f32,
    pub slide: f32,
    pub collision_radius: f32,
    pub death_probability: f32,
    pub pin_offset: f32,
    /// Visual effect started on collision
    pub collide_effect: Option<EffectRef>,
    pub death_effect: Option<EffectRef>,
    /// Points spanning the surface plane
    pub points: Vec<Vector3>,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            flags: SurfaceFlags::empty(),
            surface_map: ResourceId::default(),
            bounce: 0.0,
            slide: 0.0,
            collision_radius: 0.0,
            death_probability: 0.0,
            pin_offset: 0.0,
            collide_effect: None,
            death_effect: None,
            points: Vec::new(),
        }
    }
}

fn read_collide_effect(surface: &mut Surface, reader: &mut StreamReader<'_>, endian: Endian) -> Result<(), StructError> {
    surface.collide_effect = EffectRef::read(reader, endian, VISUAL_EFFECT)?;
    Ok(())
}

fn write_collide_effect(surface: &Surface, writer: &mut StreamWriter, endian: Endian) -> Result<(), StructError> {
    EffectRef::write(surface.collide_effect, writer, endian)
}

fn read_death_effect(surface: &mut Surface, reader: &mut StreamReader<'_>, endian: Endian) -> Result<(), StructError> {
    surface.death_effect = EffectRef::read(reader, endian, VISUAL_EFFECT)?;
    Ok(())
}

fn write_death_effect(surface: &Surface, writer: &mut StreamWriter, endian: Endian) -> Result<(), StructError> {
    EffectRef::write(surface.death_effect, writer, endian)
}

static STRUCTURE: LazyLock<Structure<Surface>> = LazyLock::new(|| {
    Structure::builder("Surface", Endian::Big)
        .scalar("flags", |s: &Surface| &s.flags, |s| &mut s.flags)
        .nested("surfaceMapID", |s| &s.surface_map, |s| &mut s.surface_map)
        .scalar("bounce", |s| &s.bounce, |s| &mut s.bounce)
        .scalar("slide", |s| &s.slide, |s| &mut s.slide)
        .scalar("collisionRadius", |s| &s.collision_radius, |s| &mut s.collision_radius)
        .scalar("deathProbability", |s| &s.death_probability, |s| &mut s.death_probability)
        .scalar("pinOffset", |s| &s.pin_offset, |s| &mut s.pin_offset)
        .custom("collideEffect", read_collide_effect, write_collide_effect)
        .custom("deathEffect", read_death_effect, write_death_effect)
        .nested_list("surfacePoints", |s| &s.points, |s| &mut s.points)
        .build()
});

impl Structured for Surface {
    fn structure() -> &'static Structure<Self> {
        &STRUCTURE
    }
}

const FLAG_OPTIONS: [(&str, SurfaceFlags); 2] = [("pin", SurfaceFlags::PIN), ("pinMove", SurfaceFlags::PIN_MOVE)];

impl Surface {
    /// Apply `surface [map] -options...`. Flags accumulate; the owning
    /// component handles its own options such as `-reset`.
    pub fn parse(&mut self, cx: &mut ParseContext<'_>, line: &Line) {
        if let Some(args) = line.arguments(cx, 0..=1)
            && args.len() == 1
            && let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP)
        {
            self.surface_map = id;
        }

        for (name, flag) in FLAG_OPTIONS {
            if line.has_flag(cx, name) {
                self.flags |= flag;
            }
        }
        if line.has_flag(cx, "pinEmit") {
            self.flags |= SurfaceFlags::PIN_EMIT;
            if let Some(args) = line.option_arguments(cx, "surfaceOffset", 1)
                && let Some(value) = cx.parse_float(args, 0)
            {
                self.pin_offset = value;
            }
        }
        if line.has_flag(cx, "align") {
            self.flags |= SurfaceFlags::ALIGN;
        }
        if let Some(args) = line.option_arguments(cx, "bounce", 1) {
            self.flags |= SurfaceFlags::BOUNCE;
            if let Some(value) = cx.parse_float(args, 0) {
                self.bounce = value;
            }
        }
        if let Some(args) = line.option_arguments(cx, "slide", 1)
            && let Some(value) = cx.parse_float(args, 0)
        {
            self.slide = value;
        }
        if let Some(args) = line.option_arguments(cx, "radius", 1)
            && let Some(value) = cx.parse_float(args, 0)
        {
            self.collision_radius = value;
        }
        if let Some(args) = line.option_arguments(cx, "death", 1)
            && let Some(value) = cx.parse_float(args, 0)
        {
            self.death_probability = value;
        }
        if let Some(args) = line.option_arguments(cx, "collideEffect", 1) {
            self.collide_effect = cx.parse_effect(args, 0, VISUAL_EFFECT);
        }
        if let Some(args) = line.option_arguments(cx, "deathEffect", 1) {
            self.death_effect = cx.parse_effect(args, 0, VISUAL_EFFECT);
        }
        if line.has_flag(cx, "sourceSpace") {
            self.flags |= SurfaceFlags::SOURCE_SPACE;
        }
        if line.has_flag(cx, "worldSpace") {
            self.flags |= SurfaceFlags::WORLD_SPACE;
        }
        if let Some(args) = line.option_arguments(cx, "basis", 1..) {
            self.points.clear();
            for index in 0..args.len() {
                let Some(point) = cx.parse_vector3(args, index) else {
                    break;
                };
                self.points.push(point.into());
            }
        }
    }

    /// Write the arguments and options after the `surface` keyword
    pub fn write(&self, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
        if !self.surface_map.is_default() {
            writer.arguments([map_name(directory, self.surface_map)]);
        }
        for (name, flag) in FLAG_OPTIONS {
            writer.flag(name, self.flags.contains(flag));
        }
        if self.flags.contains(SurfaceFlags::PIN_EMIT) {
            writer.option("pinEmit");
            if self.pin_offset != 0.0 {
                writer.option("surfaceOffset").floats([self.pin_offset]);
            }
        }
        writer.flag("align", self.flags.contains(SurfaceFlags::ALIGN));
        writer.flag("sourceSpace", self.flags.contains(SurfaceFlags::SOURCE_SPACE));
        writer.flag("worldSpace", self.flags.contains(SurfaceFlags::WORLD_SPACE));
        if self.flags.contains(SurfaceFlags::BOUNCE) || self.bounce != 0.0 {
            writer.option("bounce").floats([self.bounce]);
        }
        if self.slide != 0.0 {
            writer.option("slide").floats([self.slide]);
        }
        if self.collision_radius != 0.0 {
            writer.option("radius").floats([self.collision_radius]);
        }
        if self.death_probability != 0.0 {
            writer.option("death").floats([self.death_probability]);
        }
        if let Some(effect) = self.collide_effect {
            writer.option("collideEffect").arguments([reference_name(directory, effect)]);
        }
        if let Some(effect) = self.death_effect {
            writer.option("deathEffect").arguments([reference_name(directory, effect)]);
        }
        if !self.points.is_empty() {
            writer.option("basis");
            for point in &self.points {
                writer.vector(&point.to_array());
            }
        }
    }

    pub fn used_elements(&self) -> Vec<UsedElement> {
        let mut used: Vec<UsedElement> = [self.collide_effect, self.death_effect]
            .into_iter()
            .flatten()
            .map(UsedElement::Effect)
            .collect();
        if !self.surface_map.is_default() {
            used.push(UsedElement::Resource {
                type_code: MAP_RESOURCE,
                id: self.surface_map,
            });
        }
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{EffectUnit, IMPORT_INDEX_FLAG};
    use pfx_argscript::{PositionMap, StreamState};

    fn unit_with_import() -> EffectUnit {
        let mut unit = EffectUnit::new();
        unit.add_import("sparks");
        unit
    }

    fn parse(unit: &EffectUnit, text: &str) -> (Surface, StreamState) {
        let mut state = StreamState::new();
        let line = Line::parse(text, &PositionMap::new(), 0).unwrap();
        let mut surface = Surface::default();
        let mut cx = ParseContext::new(&mut state, unit);
        surface.parse(&mut cx, &line);
        (surface, state)
    }

    fn write(unit: &EffectUnit, surface: &Surface) -> String {
        let mut writer = ArgScriptWriter::new();
        writer.command("surface");
        surface.write(&mut writer, unit);
        writer.finish()
    }

    #[test]
    fn test_parse_options() {
        let unit = unit_with_import();
        let (surface, state) = parse(
            &unit,
            "surface terrain -pin -pinEmit -surfaceOffset 2 -bounce 0.5 -radius 1 -collideEffect sparks -basis (0, 0, 0) (1, 0, 0)",
        );
        assert!(state.diagnostics().is_empty(), "{:?}", state.diagnostics());
        assert!(surface.surface_map.is_zero());
        assert_eq!(
            surface.flags,
            SurfaceFlags::PIN | SurfaceFlags::PIN_EMIT | SurfaceFlags::BOUNCE
        );
        assert_eq!(surface.pin_offset, 2.0);
        assert_eq!(surface.bounce, 0.5);
        assert_eq!(surface.collision_radius, 1.0);
        assert_eq!(
            surface.collide_effect,
            Some(EffectRef::new(VISUAL_EFFECT, IMPORT_INDEX_FLAG))
        );
        assert_eq!(surface.points, vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)]);
    }

    #[test]
    fn test_unknown_effect_is_reported() {
        let unit = unit_with_import();
        let (surface, state) = parse(&unit, "surface -collideEffect unknownName");
        assert!(state.has_errors());
        assert_eq!(surface.collide_effect, None);
    }

    #[test]
    fn test_surface_offset_needs_pin_emit() {
        let unit = EffectUnit::new();
        let (surface, _) = parse(&unit, "surface -surfaceOffset 3");
        assert_eq!(surface.pin_offset, 0.0);
    }

    #[test]
    fn test_write() {
        let unit = unit_with_import();
        let (surface, _) = parse(&unit, "surface terrain -bounce 0 -deathEffect sparks -worldSpace");
        assert_eq!(write(&unit, &surface), "surface terrain -worldSpace -bounce 0 -deathEffect sparks");

        let (reparsed, state) = parse(&unit, &write(&unit, &surface));
        assert!(state.diagnostics().is_empty());
        assert_eq!(reparsed, surface);
    }

    #[test]
    fn test_used_elements() {
        let unit = unit_with_import();
        let (surface, _) = parse(&unit, "surface 0x10 -collideEffect sparks");
        assert_eq!(
            surface.used_elements(),
            vec![
                UsedElement::Effect(EffectRef::new(VISUAL_EFFECT, IMPORT_INDEX_FLAG)),
                UsedElement::Resource {
                    type_code: MAP_RESOURCE,
                    id: ResourceId::new(0, 0x10),
                },
            ]
        );
    }

    #[test]
    fn test_binary_layout() {
        let surface = Surface {
            points: vec![Vector3::new(1.0, 0.0, 0.0)],
            ..Default::default()
        };
        let bytes = pfx_struct::encode(&surface).unwrap();
        assert_eq!(bytes.len(), 4 + 8 + 20 + 8 + 4 + 12);
        assert_eq!(&bytes[32..40], &[0xFF; 8]);
        assert_eq!(pfx_struct::decode::<Surface>(&bytes).unwrap(), surface);
    }
}
