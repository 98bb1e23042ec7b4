//! Ribbon trail component

use std::sync::LazyLock;

use pfx_argscript::{ArgScriptWriter, Line, ParserTable, is_default, is_default_color};
use pfx_shared::{ColorRgb, ResourceId};
use pfx_struct::{Endian, Structure, Structured};

use crate::component::{
    ComponentParser, EffectComponent, HYPERLINK_MAP, HYPERLINK_MATERIAL, HYPERLINK_TEXTURE, UsedElement,
    flag_scalar, grammar,
};
use crate::context::ParseContext;
use crate::directory::{EffectDirectory, MAP_RESOURCE, MATERIAL_RESOURCE, map_name};
use crate::texture::{DRAWMODE_NONE, TextureSlot};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RibbonFlags: u32 {
        /// Set by `texture` and `material`
        const TEXTURE = 0x2000;
        const MAP_ADVECT = 0x8000;
        const MAP_FORCE = 0x10000;
        const KILL_OUTSIDE_MAP = 0x20000;
        const ACCEPT_COMPOSITE = 0x400000;
    }
}

flag_scalar!(RibbonFlags, u32);

const NO_SLIP_CURVE: f32 = -999.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RibbonEffect {
    pub flags: RibbonFlags,
    /// Life and the end of the sustain
    pub life: [f32; 2],
    pub offset: Vec<f32>,
    pub width: Vec<f32>,
    pub taper: f32,
    pub fade: f32,
    pub alpha_decay: f32,
    pub color: Vec<ColorRgb>,
    pub alpha: Vec<f32>,
    pub length_color: Vec<ColorRgb>,
    pub length_alpha: Vec<f32>,
    pub edge_color: Vec<ColorRgb>,
    pub edge_alpha: Vec<f32>,
    pub start_edge_alpha: Vec<f32>,
    pub end_edge_alpha: Vec<f32>,
    pub segment_count: i32,
    pub segment_length: f32,
    pub texture: TextureSlot,
    /// `-1` stretches the texture over the whole ribbon
    pub tile_uv: i32,
    pub slip_curve_speed: f32,
    pub slip_uv_speed: f32,
    pub direction_forces: [f32; 3],
    pub wind_strength: f32,
    pub gravity_strength: f32,
    pub map_emit_color: ResourceId,
    pub map_force: ResourceId,
    pub map_repulse_strength: f32,
}

impl Default for RibbonEffect {
    fn default() -> Self {
        Self {
            flags: RibbonFlags::empty(),
            life: [0.0; 2],
            offset: Vec::new(),
            width: Vec::new(),
            taper: 0.0,
            fade: 0.0,
            alpha_decay: 0.0,
            color: vec![ColorRgb::white()],
            alpha: vec![1.0],
            length_color: vec![ColorRgb::white()],
            length_alpha: vec![1.0],
            edge_color: vec![ColorRgb::white()],
            edge_alpha: vec![1.0],
            start_edge_alpha: vec![1.0],
            end_edge_alpha: vec![1.0],
            segment_count: 0,
            segment_length: 0.0,
            texture: TextureSlot::default(),
            tile_uv: -1,
            slip_curve_speed: NO_SLIP_CURVE,
            slip_uv_speed: 0.0,
            direction_forces: [0.0; 3],
            wind_strength: 0.0,
            gravity_strength: 0.0,
            map_emit_color: ResourceId::default(),
            map_force: ResourceId::default(),
            map_repulse_strength: 0.0,
        }
    }
}

static STRUCTURE: LazyLock<Structure<RibbonEffect>> = LazyLock::new(|| {
    Structure::builder("RibbonEffect", Endian::Big)
        .scalar("flags", |s: &RibbonEffect| &s.flags, |s| &mut s.flags)
        .array("lifeTime", |s| &s.life, |s| &mut s.life)
        .endian(Endian::Little)
        .list("offset", |s| &s.offset, |s| &mut s.offset)
        .list("width", |s| &s.width, |s| &mut s.width)
        .scalar("taper", |s| &s.taper, |s| &mut s.taper)
        .scalar("fade", |s| &s.fade, |s| &mut s.fade)
        .scalar("alphaDecay", |s| &s.alpha_decay, |s| &mut s.alpha_decay)
        .nested_list("color", |s| &s.color, |s| &mut s.color)
        .list("alpha", |s| &s.alpha, |s| &mut s.alpha)
        .nested_list("lengthColor", |s| &s.length_color, |s| &mut s.length_color)
        .list("lengthAlpha", |s| &s.length_alpha, |s| &mut s.length_alpha)
        .nested_list("edgeColor", |s| &s.edge_color, |s| &mut s.edge_color)
        .list("edgeAlpha", |s| &s.edge_alpha, |s| &mut s.edge_alpha)
        .list("startEdgeAlpha", |s| &s.start_edge_alpha, |s| &mut s.start_edge_alpha)
        .list("endEdgeAlpha", |s| &s.end_edge_alpha, |s| &mut s.end_edge_alpha)
        .scalar("segmentCount", |s| &s.segment_count, |s| &mut s.segment_count)
        .scalar("segmentLength", |s| &s.segment_length, |s| &mut s.segment_length)
        .nested("texture", |s| &s.texture, |s| &mut s.texture)
        .scalar("tileUV", |s| &s.tile_uv, |s| &mut s.tile_uv)
        .scalar("slipCurveSpeed", |s| &s.slip_curve_speed, |s| &mut s.slip_curve_speed)
        .scalar("slipUVSpeed", |s| &s.slip_uv_speed, |s| &mut s.slip_uv_speed)
        .array("directionForcesSum", |s| &s.direction_forces, |s| &mut s.direction_forces)
        .endian(Endian::Little)
        .scalar("windStrength", |s| &s.wind_strength, |s| &mut s.wind_strength)
        .scalar("gravityStrength", |s| &s.gravity_strength, |s| &mut s.gravity_strength)
        .nested("mapEmitColor", |s| &s.map_emit_color, |s| &mut s.map_emit_color)
        .nested("mapForce", |s| &s.map_force, |s| &mut s.map_force)
        .scalar("mapRepulseStrength", |s| &s.map_repulse_strength, |s| &mut s.map_repulse_strength)
        .build()
});

impl Structured for RibbonEffect {
    fn structure() -> &'static Structure<Self> {
        &STRUCTURE
    }
}

static GRAMMAR: LazyLock<ParserTable<ComponentParser<RibbonEffect>>> = LazyLock::new(|| {
    grammar(&[
        ("color", parse_color),
        ("colour", parse_color),
        ("color255", parse_color255),
        ("colour255", parse_color255),
        ("alpha", parse_alpha),
        ("alpha255", parse_alpha255),
        ("width", parse_width),
        ("offset", parse_offset),
        ("taper", parse_taper),
        ("fade", parse_fade),
        ("sustain", parse_sustain),
        ("life", parse_life),
        ("lengthColor", parse_length_color),
        ("lengthColour", parse_length_color),
        ("lengthColor255", parse_length_color255),
        ("lengthColour255", parse_length_color255),
        ("edgeColor", parse_edge_color),
        ("edgeColour", parse_edge_color),
        ("edgeColor255", parse_edge_color255),
        ("edgeColour255", parse_edge_color255),
        ("lengthAlpha", parse_length_alpha),
        ("lengthAlpha255", parse_length_alpha255),
        ("edgeAlpha", parse_edge_alpha),
        ("edgeAlpha255", parse_edge_alpha255),
        ("alphaDecay", parse_alpha_decay),
        ("startAlpha", parse_start_alpha),
        ("startAlpha255", parse_start_alpha255),
        ("endAlpha", parse_end_alpha),
        ("endAlpha255", parse_end_alpha255),
        ("segments", parse_segments),
        ("segmentLength", parse_segment_length),
        ("tileUV", parse_tile_uv),
        ("slipCurve", parse_slip_curve),
        ("slipUV", parse_slip_uv),
        ("force", parse_force),
        ("material", parse_material),
        ("texture", parse_texture),
        ("mapEmitColor", parse_map_emit_color),
        ("mapAdvect", parse_map_advect),
        ("mapForce", parse_map_force),
        ("flags", parse_flags),
    ])
});

fn read_colors(cx: &mut ParseContext<'_>, line: &Line, list: &mut Vec<ColorRgb>) {
    if let Some(args) = line.arguments(cx, 1..) {
        list.clear();
        cx.parse_color_rgbs(args, list);
    }
}

fn read_color255s(cx: &mut ParseContext<'_>, line: &Line, list: &mut Vec<ColorRgb>) {
    if let Some(args) = line.arguments(cx, 1..) {
        list.clear();
        cx.parse_color_rgb255s(args, list);
    }
}

fn read_floats(cx: &mut ParseContext<'_>, line: &Line, list: &mut Vec<f32>) {
    if let Some(args) = line.arguments(cx, 1..) {
        list.clear();
        cx.parse_floats(args, list);
    }
}

fn read_float255s(cx: &mut ParseContext<'_>, line: &Line, list: &mut Vec<f32>) {
    if let Some(args) = line.arguments(cx, 1..) {
        list.clear();
        cx.parse_float255s(args, list);
    }
}

fn read_float(cx: &mut ParseContext<'_>, line: &Line, value: &mut f32) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(parsed) = cx.parse_float(args, 0)
    {
        *value = parsed;
    }
}

fn read_int(cx: &mut ParseContext<'_>, line: &Line, value: &mut i32) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(parsed) = cx.parse_int(args, 0)
    {
        *value = parsed;
    }
}

fn parse_color(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_colors(cx, line, &mut effect.color);
}

fn parse_color255(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_color255s(cx, line, &mut effect.color);
}

fn parse_alpha(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_floats(cx, line, &mut effect.alpha);
}

fn parse_alpha255(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float255s(cx, line, &mut effect.alpha);
}

fn parse_width(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_floats(cx, line, &mut effect.width);
}

fn parse_offset(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_floats(cx, line, &mut effect.offset);
}

fn parse_taper(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float(cx, line, &mut effect.taper);
}

fn parse_fade(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float(cx, line, &mut effect.fade);
}

/// Sustain is relative to the current life
fn parse_sustain(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.life[1] = effect.life[0] + value;
    }
}

/// `life time [sustainEnd]`
fn parse_life(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    let Some(args) = line.arguments(cx, 1..=2) else {
        return;
    };
    if let Some(value) = cx.parse_float(args, 0) {
        effect.life = [value; 2];
    }
    if args.len() == 2
        && let Some(value) = cx.parse_float(args, 1)
    {
        effect.life[1] = value;
    }
}

fn parse_length_color(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_colors(cx, line, &mut effect.length_color);
}

fn parse_length_color255(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_color255s(cx, line, &mut effect.length_color);
}

fn parse_edge_color(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_colors(cx, line, &mut effect.edge_color);
}

fn parse_edge_color255(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_color255s(cx, line, &mut effect.edge_color);
}

fn parse_length_alpha(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_floats(cx, line, &mut effect.length_alpha);
}

fn parse_length_alpha255(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float255s(cx, line, &mut effect.length_alpha);
}

fn parse_edge_alpha(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_floats(cx, line, &mut effect.edge_alpha);
}

fn parse_edge_alpha255(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float255s(cx, line, &mut effect.edge_alpha);
}

fn parse_alpha_decay(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float(cx, line, &mut effect.alpha_decay);
}

fn parse_start_alpha(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_floats(cx, line, &mut effect.start_edge_alpha);
}

fn parse_start_alpha255(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float255s(cx, line, &mut effect.start_edge_alpha);
}

fn parse_end_alpha(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_floats(cx, line, &mut effect.end_edge_alpha);
}

fn parse_end_alpha255(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float255s(cx, line, &mut effect.end_edge_alpha);
}

fn parse_segments(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_int(cx, line, &mut effect.segment_count);
}

fn parse_segment_length(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float(cx, line, &mut effect.segment_length);
}

fn parse_tile_uv(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_int(cx, line, &mut effect.tile_uv);
}

fn parse_slip_curve(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float(cx, line, &mut effect.slip_curve_speed);
}

fn parse_slip_uv(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    read_float(cx, line, &mut effect.slip_uv_speed);
}

/// Gravity and wind accumulate into one direction; `-reset` clears it first
fn parse_force(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    line.arguments(cx, 0);
    if line.has_flag(cx, "reset") {
        effect.direction_forces = [0.0; 3];
    }
    if let Some(gravity) = cx.option_float(line, "gravity") {
        effect.direction_forces[2] -= gravity;
    }
    if let Some(args) = line.option_arguments(cx, "wind", 1..=2)
        && let Some(wind) = cx.parse_vector3(args, 0)
    {
        let length = wind.iter().map(|v| v * v).sum::<f32>().sqrt();
        let mut scale = if length > 0.0 { 1.0 / length } else { 0.0 };
        if args.len() == 2
            && let Some(strength) = cx.parse_float(args, 1)
        {
            scale *= strength;
        }
        for axis in 0..3 {
            effect.direction_forces[axis] += wind[axis] * scale;
        }
    }
    if let Some(value) = cx.option_float(line, "worldWind") {
        effect.wind_strength = value;
    }
    if let Some(value) = cx.option_float(line, "worldGravity") {
        effect.gravity_strength = value;
    }
}

fn parse_accept_composite(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    effect
        .flags
        .set(RibbonFlags::ACCEPT_COMPOSITE, line.has_flag(cx, "acceptComposite"));
}

fn parse_material(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    effect.texture.draw_mode = DRAWMODE_NONE;
    effect.texture.parse(cx, line, HYPERLINK_MATERIAL);
    effect.flags |= RibbonFlags::TEXTURE;
    parse_accept_composite(cx, effect, line);
}

fn parse_texture(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    if effect.texture.draw_mode == DRAWMODE_NONE {
        effect.texture.draw_mode = 0;
    }
    effect.texture.parse(cx, line, HYPERLINK_TEXTURE);
    effect.flags |= RibbonFlags::TEXTURE;
    parse_accept_composite(cx, effect, line);
}

fn parse_map_emit_color(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP)
    {
        effect.map_emit_color = id;
    }
}

/// `mapAdvect` and `mapForce` share the map; the flag picks how it moves the
/// ribbon
fn parse_map_flow(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line, flag: RibbonFlags) {
    if let Some(args) = line.arguments(cx, 1) {
        if let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP) {
            effect.map_force = id;
        }
        effect.flags |= flag;
    }
    effect.map_repulse_strength = cx.option_float(line, "strength").unwrap_or(1.0);
    if line.has_flag(cx, "killOutsideMap") {
        effect.flags |= RibbonFlags::KILL_OUTSIDE_MAP;
    }
}

fn parse_map_advect(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    parse_map_flow(cx, effect, line, RibbonFlags::MAP_ADVECT);
}

fn parse_map_force(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    parse_map_flow(cx, effect, line, RibbonFlags::MAP_FORCE);
}

/// Replaces every bit, named ones included
fn parse_flags(cx: &mut ParseContext<'_>, effect: &mut RibbonEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_uint(args, 0)
    {
        effect.flags = RibbonFlags::from_bits_retain(value);
    }
}

impl RibbonEffect {
    fn write_force(&self, writer: &mut ArgScriptWriter) {
        let [x, y, z] = self.direction_forces;
        if self.direction_forces == [0.0; 3] && self.wind_strength == 0.0 && self.gravity_strength == 0.0 {
            return;
        }
        writer.command("force");
        if x == 0.0 && y == 0.0 && z != 0.0 {
            writer.option("gravity").floats([-z]);
        } else if self.direction_forces != [0.0; 3] {
            let length = (x * x + y * y + z * z).sqrt();
            writer.option("wind").vector(&[x / length, y / length, z / length]);
            if (length - 1.0).abs() > f32::EPSILON {
                writer.floats([length]);
            }
        }
        if self.wind_strength != 0.0 {
            writer.option("worldWind").floats([self.wind_strength]);
        }
        if self.gravity_strength != 0.0 {
            writer.option("worldGravity").floats([self.gravity_strength]);
        }
    }
}

impl EffectComponent for RibbonEffect {
    const KEYWORD: &'static str = "ribbon";
    const TYPE_CODE: u16 = 0x0E;
    const MIN_VERSION: i32 = 1;
    const MAX_VERSION: i32 = 1;

    fn with_version(_version: i32) -> Self {
        Self::default()
    }

    fn version(&self) -> i32 {
        Self::MAX_VERSION
    }

    fn grammar() -> &'static ParserTable<ComponentParser<Self>> {
        &GRAMMAR
    }

    fn write_argscript(&self, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
        // Written first since `flags` replaces every bit
        if !(self.flags - RibbonFlags::all()).is_empty() {
            writer.command("flags").arguments([format!("0x{:x}", self.flags.bits())]);
        }
        if !is_default_color(&self.color) {
            writer.command("color").colors(self.color.iter().copied());
        }
        if !is_default(&self.alpha) {
            writer.command("alpha").floats(self.alpha.iter().copied());
        }
        if !self.width.is_empty() {
            writer.command("width").floats(self.width.iter().copied());
        }
        if !self.offset.is_empty() {
            writer.command("offset").floats(self.offset.iter().copied());
        }
        if self.taper != 0.0 {
            writer.command("taper").floats([self.taper]);
        }
        if self.fade != 0.0 {
            writer.command("fade").floats([self.fade]);
        }
        if self.life != [0.0; 2] {
            writer.command("life").floats([self.life[0]]);
            if self.life[1] != self.life[0] {
                writer.floats([self.life[1]]);
            }
        }
        if !is_default_color(&self.length_color) {
            writer.command("lengthColor").colors(self.length_color.iter().copied());
        }
        if !is_default_color(&self.edge_color) {
            writer.command("edgeColor").colors(self.edge_color.iter().copied());
        }
        if !is_default(&self.length_alpha) {
            writer.command("lengthAlpha").floats(self.length_alpha.iter().copied());
        }
        if !is_default(&self.edge_alpha) {
            writer.command("edgeAlpha").floats(self.edge_alpha.iter().copied());
        }
        if self.alpha_decay != 0.0 {
            writer.command("alphaDecay").floats([self.alpha_decay]);
        }
        if !is_default(&self.start_edge_alpha) {
            writer.command("startAlpha").floats(self.start_edge_alpha.iter().copied());
        }
        if !is_default(&self.end_edge_alpha) {
            writer.command("endAlpha").floats(self.end_edge_alpha.iter().copied());
        }
        if self.segment_count != 0 {
            writer.command("segments").ints([self.segment_count]);
        }
        if self.segment_length != 0.0 {
            writer.command("segmentLength").floats([self.segment_length]);
        }

        if !self.texture.is_default() {
            let material = self.texture.draw_mode == DRAWMODE_NONE;
            self.texture.write(if material { "material" } else { "texture" }, writer);
            writer.flag("acceptComposite", self.flags.contains(RibbonFlags::ACCEPT_COMPOSITE));
        }
        if self.tile_uv != -1 {
            writer.command("tileUV").ints([self.tile_uv]);
        }
        if self.slip_curve_speed != NO_SLIP_CURVE {
            writer.command("slipCurve").floats([self.slip_curve_speed]);
        }
        if self.slip_uv_speed != 0.0 {
            writer.command("slipUV").floats([self.slip_uv_speed]);
        }
        if !self.map_emit_color.is_default() {
            writer
                .command("mapEmitColor")
                .arguments([map_name(directory, self.map_emit_color)]);
        }
        self.write_force(writer);

        if !self.map_force.is_default() {
            let advect = self.flags.contains(RibbonFlags::MAP_ADVECT);
            writer
                .command(if advect { "mapAdvect" } else { "mapForce" })
                .arguments([map_name(directory, self.map_force)]);
            if self.map_repulse_strength != 1.0 {
                writer.option("strength").floats([self.map_repulse_strength]);
            }
            writer.flag("killOutsideMap", self.flags.contains(RibbonFlags::KILL_OUTSIDE_MAP));
        }
    }

    fn used_elements(&self) -> Vec<UsedElement> {
        let mut used = Vec::new();
        for id in [self.map_emit_color, self.map_force] {
            if !id.is_default() {
                used.push(UsedElement::Resource {
                    type_code: MAP_RESOURCE,
                    id,
                });
            }
        }
        if self.texture.draw_mode == DRAWMODE_NONE && !self.texture.resource.is_default() {
            used.push(UsedElement::Resource {
                type_code: MATERIAL_RESOURCE,
                id: self.texture.resource,
            });
        }
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::unit::EffectUnit;

    fn parse(body: &str) -> RibbonEffect {
        let (unit, diagnostics) = EffectUnit::parse(&format!("ribbon test\n{body}\nend"));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        match unit.component("test") {
            Some(Component::Ribbon(ribbon)) => (**ribbon).clone(),
            other => panic!("expected a ribbon, got {other:?}"),
        }
    }

    fn write(effect: &RibbonEffect) -> String {
        Component::from(effect.clone()).to_argscript("test", &EffectUnit::new())
    }

    fn assert_round_trip(effect: &RibbonEffect) {
        let (unit, diagnostics) = EffectUnit::parse(&write(effect));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(unit.component("test"), Some(&Component::from(effect.clone())));
    }

    #[test]
    fn test_default_writes_empty_block() {
        assert_eq!(write(&RibbonEffect::default()), "ribbon test\nend");
    }

    #[test]
    fn test_life_and_sustain() {
        let ribbon = parse("life 2");
        assert_eq!(ribbon.life, [2.0, 2.0]);

        let ribbon = parse("life 2\nsustain 1.5");
        assert_eq!(ribbon.life, [2.0, 3.5]);
        assert_eq!(write(&ribbon), "ribbon test\n\tlife 2 3.5\nend");

        let ribbon = parse("life 1 4");
        assert_eq!(ribbon.life, [1.0, 4.0]);
    }

    #[test]
    fn test_lists_replace_defaults() {
        let ribbon = parse("alpha 0.5 0\nedgeColor255 (255, 0, 0)\nstartAlpha255 0 255\nwidth 1 2");
        assert_eq!(ribbon.alpha, vec![0.5, 0.0]);
        assert_eq!(ribbon.edge_color, vec![ColorRgb::new(1.0, 0.0, 0.0)]);
        assert_eq!(ribbon.start_edge_alpha, vec![0.0, 1.0]);
        assert_eq!(ribbon.width, vec![1.0, 2.0]);
        assert_eq!(ribbon.color, vec![ColorRgb::white()]);
        assert_round_trip(&ribbon);
    }

    #[test]
    fn test_force() {
        let ribbon = parse("force -gravity 2 -worldWind 0.5");
        assert_eq!(ribbon.direction_forces, [0.0, 0.0, -2.0]);
        assert_eq!(write(&ribbon), "ribbon test\n\tforce -gravity 2 -worldWind 0.5\nend");

        let ribbon = parse("force -wind (0, 3, 0) 2");
        assert_eq!(ribbon.direction_forces, [0.0, 2.0, 0.0]);
        assert_eq!(write(&ribbon), "ribbon test\n\tforce -wind (0, 1, 0) 2\nend");
        assert_round_trip(&ribbon);

        let ribbon = parse("force -gravity 1\nforce -reset -worldGravity 4");
        assert_eq!(ribbon.direction_forces, [0.0; 3]);
        assert_eq!(ribbon.gravity_strength, 4.0);
    }

    #[test]
    fn test_material_and_texture() {
        let ribbon = parse("material 0x10 -texture 0x20 -acceptComposite");
        assert_eq!(ribbon.texture.draw_mode, DRAWMODE_NONE);
        assert_eq!(ribbon.texture.resource2, ResourceId::new(0, 0x20));
        assert!(ribbon.flags.contains(RibbonFlags::TEXTURE | RibbonFlags::ACCEPT_COMPOSITE));
        assert_eq!(
            write(&ribbon),
            "ribbon test\n\tmaterial 0x00000010 -texture 0x00000020 -acceptComposite\nend"
        );
        assert_round_trip(&ribbon);

        let ribbon = parse("material 0x10\ntexture 0x30 -layer 2");
        assert_eq!(ribbon.texture.draw_mode, 0);
        assert!(!ribbon.flags.contains(RibbonFlags::ACCEPT_COMPOSITE));
        assert_eq!(write(&ribbon), "ribbon test\n\ttexture 0x00000030 -layer 2\nend");
    }

    #[test]
    fn test_map_flow() {
        let ribbon = parse("mapForce 0x40 -killOutsideMap");
        assert_eq!(ribbon.map_force, ResourceId::new(0, 0x40));
        assert_eq!(ribbon.map_repulse_strength, 1.0);
        assert!(ribbon.flags.contains(RibbonFlags::MAP_FORCE | RibbonFlags::KILL_OUTSIDE_MAP));
        assert_eq!(write(&ribbon), "ribbon test\n\tmapForce 0x00000040 -killOutsideMap\nend");
        assert_round_trip(&ribbon);

        let ribbon = parse("mapAdvect water -strength 0.5");
        assert_eq!(ribbon.map_force, ResourceId::water());
        assert_eq!(write(&ribbon), "ribbon test\n\tmapAdvect water -strength 0.5\nend");
        assert_round_trip(&ribbon);
    }

    #[test]
    fn test_flags_replace_all_bits() {
        let ribbon = parse("mapForce terrain\nflags 0x3");
        assert_eq!(ribbon.flags.bits(), 0x3);

        let ribbon = parse("flags 0x10001");
        assert_eq!(write(&ribbon), "ribbon test\n\tflags 0x10001\nend");
        assert_round_trip(&ribbon);
    }

    #[test]
    fn test_script_round_trip() {
        let ribbon = parse(
            "color (1, 0, 0) (0, 0, 1)\noffset 0.5\ntaper 0.25\nfade 1\nlife 3\nlengthAlpha 1 0\n\
             alphaDecay 2\nsegments 12\nsegmentLength 0.5\ntileUV 4\nslipCurve 1\nslipUV -0.5\nmapEmitColor 0x7",
        );
        assert_eq!(ribbon.segment_count, 12);
        assert_eq!(ribbon.tile_uv, 4);
        assert_round_trip(&ribbon);
    }

    #[test]
    fn test_used_elements() {
        let ribbon = parse("material 0x10\nmapEmitColor 0x1\nmapForce terrain");
        assert_eq!(
            ribbon.used_elements(),
            vec![
                UsedElement::Resource {
                    type_code: MAP_RESOURCE,
                    id: ResourceId::new(0, 1),
                },
                UsedElement::Resource {
                    type_code: MAP_RESOURCE,
                    id: ResourceId::terrain(),
                },
                UsedElement::Resource {
                    type_code: MATERIAL_RESOURCE,
                    id: ResourceId::new(0, 0x10),
                },
            ]
        );
    }

    #[test]
    fn test_binary_layout() {
        let ribbon = RibbonEffect {
            life: [1.0, 2.0],
            ..Default::default()
        };
        let bytes = pfx_struct::encode(&ribbon).unwrap();
        assert_eq!(&bytes[4..12], &[0, 0, 0x80, 0x3F, 0, 0, 0, 0x40]);
        assert_eq!(pfx_struct::decode::<RibbonEffect>(&bytes).unwrap(), ribbon);

        let mut cleared = RibbonEffect::default();
        cleared.color.clear();
        let bytes = pfx_struct::encode(&cleared).unwrap();
        assert_eq!(pfx_struct::decode::<RibbonEffect>(&bytes).unwrap(), cleared);
    }
}
