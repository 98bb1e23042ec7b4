//! Distribution component
//!
//! Places copies of another component, a model or a texture over a source
//! shape, optionally constrained by surfaces and terrain maps. Every placed
//! copy can vary in size, rotation, color and alpha.

use std::sync::LazyLock;

use pfx_argscript::{ArgScriptEnum, ArgScriptWriter, Line, ParserTable, is_default, is_default_color};
use pfx_shared::{ColorRgb, ResourceId, file_name};
use pfx_struct::{Endian, StreamReader, StreamWriter, StructError, Structure, Structured};

use crate::component::{
    ComponentParser, EffectComponent, EffectRef, HYPERLINK_FILE, HYPERLINK_MAP, HYPERLINK_MATERIAL,
    HYPERLINK_TEXTURE, UsedElement, flag_scalar, grammar,
};
use crate::context::ParseContext;
use crate::directory::{EffectDirectory, MAP_RESOURCE, map_name, reference_name};
use crate::factory::{VISUAL_EFFECT, factory_by_keyword, keyword_of};
use crate::surface::Surface;
use crate::texture::{DRAWMODE_NONE, DrawFlags, TextureSlot};
use crate::transform::Transform;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DistributeFlags: u32 {
        const SUBDIVIDE = 0x1;
        const SURFACE = 0x2;
        const MAP_EMIT_HEIGHT_RANGE = 0x4;
        const MAP_EMIT_SURFACE = 0x8;
        const SIZE = 0x10;
        /// Set by `color`, `alpha` and `mapEmitColor`
        const COLOR = 0x20;
        /// Set by `pitch`, `roll` and `heading`
        const ROTATE = 0x40;
        const TEXTURE = 0x80;
        const MODEL = 0x100;
        const FIT = 0x200;
        const MAP_EMIT_PIN = 0x400;
        const MAP_EMIT_FORCE_STATIC = 0x800;
        const NO_BUDGET = 0x1000;
        const SYNC = 0x2000;
        /// The distributed component is itself a distribution
        const ATTACH = 0x4000;
        const SURFACE_SCALE_OFFSET = 0x8000;
        const ALPHA_FROM_TIME = 0x10000;
        const MESSAGE_KEEP_ALIVE = 0x20000;
    }
}

flag_scalar!(DistributeFlags, u32);

pub const SOURCE: ArgScriptEnum = ArgScriptEnum::new(&[
    ("square", 0),
    ("circle", 1),
    ("ring", 2),
    ("sphereSurface", 3),
    ("cube", 4),
    ("sphere", 5),
    ("sphereCubeSurface", 6),
]);

const ALTITUDE_MIN: f32 = -10000.0;
const ALTITUDE_MAX: f32 = 10000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct DistributeEffect {
    /// Format version; clusters are only stored from version 4
    pub version: i32,
    pub flags: DistributeFlags,
    /// Instance count, or the subdivision level with `subdivide`
    pub density: i32,
    pub component: Option<EffectRef>,
    /// Type byte of records whose component index is -1
    pub unset_component_type: u8,
    pub start: i32,
    pub source_type: i8,
    pub source_scale: f32,
    pub transform: Transform,
    pub size: Vec<f32>,
    pub size_vary: f32,
    pub pitch: Vec<f32>,
    pub roll: Vec<f32>,
    pub yaw: Vec<f32>,
    pub pitch_vary: f32,
    pub roll_vary: f32,
    pub yaw_vary: f32,
    pub pitch_offset: f32,
    pub roll_offset: f32,
    pub yaw_offset: f32,
    pub color: Vec<ColorRgb>,
    pub color_vary: ColorRgb,
    pub alpha: Vec<f32>,
    pub alpha_vary: f32,
    pub surfaces: Vec<Surface>,
    pub emit_map: ResourceId,
    pub color_map: ResourceId,
    pub pin_map: ResourceId,
    pub altitude_range: [f32; 2],
    /// Model, texture or material of `model`, `texture` and `material`
    pub resource: TextureSlot,
    pub override_set: i8,
    pub message_id: u32,
    pub cluster_count: i32,
    pub clusters_start: i32,
    pub clusters_factor: f32,
    /// Cluster sizes relative to the largest
    pub clusters: Vec<f32>,
}

impl Default for DistributeEffect {
    fn default() -> Self {
        Self::with_version(Self::MAX_VERSION)
    }
}

fn read_component(
    effect: &mut DistributeEffect,
    reader: &mut StreamReader<'_>,
    endian: Endian,
) -> Result<(), StructError> {
    let index = reader.read_i32(endian)?;
    let type_code = reader.read_u8()?;
    effect.component = (index != -1).then(|| EffectRef::new(type_code.into(), index));
    effect.unset_component_type = if index == -1 { type_code } else { 0 };
    Ok(())
}

fn write_component(effect: &DistributeEffect, writer: &mut StreamWriter, endian: Endian) -> Result<(), StructError> {
    EffectRef::write(effect.component, writer, endian)?;
    let type_code = effect
        .component
        .map_or(effect.unset_component_type, |reference| reference.type_code as u8);
    writer.write_u8(type_code)
}

fn has_clusters(effect: &DistributeEffect) -> bool {
    effect.version > 3
}

static STRUCTURE: LazyLock<Structure<DistributeEffect>> = LazyLock::new(|| {
    Structure::builder("DistributeEffect", Endian::Big)
        .scalar("flags", |s: &DistributeEffect| &s.flags, |s| &mut s.flags)
        .scalar("density", |s| &s.density, |s| &mut s.density)
        .custom("component", read_component, write_component)
        .scalar("start", |s| &s.start, |s| &mut s.start)
        .scalar("sourceType", |s| &s.source_type, |s| &mut s.source_type)
        .scalar("sourceScale", |s| &s.source_scale, |s| &mut s.source_scale)
        .nested("transform", |s| &s.transform, |s| &mut s.transform)
        .list("size", |s| &s.size, |s| &mut s.size)
        .scalar("sizeVary", |s| &s.size_vary, |s| &mut s.size_vary)
        .list("pitch", |s| &s.pitch, |s| &mut s.pitch)
        .list("roll", |s| &s.roll, |s| &mut s.roll)
        .list("yaw", |s| &s.yaw, |s| &mut s.yaw)
        .scalar("pitchVary", |s| &s.pitch_vary, |s| &mut s.pitch_vary)
        .scalar("rollVary", |s| &s.roll_vary, |s| &mut s.roll_vary)
        .scalar("yawVary", |s| &s.yaw_vary, |s| &mut s.yaw_vary)
        .scalar("pitchOffset", |s| &s.pitch_offset, |s| &mut s.pitch_offset)
        .scalar("rollOffset", |s| &s.roll_offset, |s| &mut s.roll_offset)
        .scalar("yawOffset", |s| &s.yaw_offset, |s| &mut s.yaw_offset)
        .nested_list("color", |s| &s.color, |s| &mut s.color)
        .nested("colorVary", |s| &s.color_vary, |s| &mut s.color_vary)
        .list("alpha", |s| &s.alpha, |s| &mut s.alpha)
        .scalar("alphaVary", |s| &s.alpha_vary, |s| &mut s.alpha_vary)
        .nested_list("surfaces", |s| &s.surfaces, |s| &mut s.surfaces)
        .nested("emitMap", |s| &s.emit_map, |s| &mut s.emit_map)
        .nested("colorMap", |s| &s.color_map, |s| &mut s.color_map)
        .nested("pinMap", |s| &s.pin_map, |s| &mut s.pin_map)
        .array("altitudeRange", |s| &s.altitude_range, |s| &mut s.altitude_range)
        .endian(Endian::Little)
        .nested("resource", |s| &s.resource, |s| &mut s.resource)
        .scalar("overrideSet", |s| &s.override_set, |s| &mut s.override_set)
        .scalar("messageID", |s| &s.message_id, |s| &mut s.message_id)
        .scalar("numClusters", |s| &s.cluster_count, |s| &mut s.cluster_count)
        .when(has_clusters)
        .scalar("clustersStart", |s| &s.clusters_start, |s| &mut s.clusters_start)
        .when(has_clusters)
        .scalar("clustersFactor", |s| &s.clusters_factor, |s| &mut s.clusters_factor)
        .when(has_clusters)
        .list("clusters", |s| &s.clusters, |s| &mut s.clusters)
        .when(has_clusters)
        .build()
});

impl Structured for DistributeEffect {
    fn structure() -> &'static Structure<Self> {
        &STRUCTURE
    }
}

static GRAMMAR: LazyLock<ParserTable<ComponentParser<DistributeEffect>>> = LazyLock::new(|| {
    grammar(&[
        ("color", parse_color),
        ("colour", parse_color),
        ("color255", parse_color255),
        ("colour255", parse_color255),
        ("alpha", parse_alpha),
        ("alpha255", parse_alpha255),
        ("size", parse_size),
        ("pitch", parse_pitch),
        ("roll", parse_roll),
        ("yaw", parse_yaw),
        ("heading", parse_yaw),
        ("rotate", parse_yaw),
        ("density", parse_density),
        ("subdivide", parse_subdivide),
        ("source", parse_source),
        ("effect", parse_effect),
        ("attach", parse_attach),
        ("component", parse_attach),
        ("surface", parse_surface),
        ("mapEmit", parse_map_emit),
        ("mapEmitColor", parse_map_emit_color),
        ("mapPin", parse_map_pin),
        ("model", parse_model),
        ("texture", parse_texture),
        ("material", parse_material),
        ("message", parse_message),
        ("clusters", parse_clusters),
        ("flags", parse_flags),
    ])
});

fn parse_vary(cx: &mut ParseContext<'_>, line: &Line, vary: &mut f32) {
    if let Some(value) = cx.option_float(line, "vary") {
        *vary = value;
    }
}

fn parse_color_vary(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.option_arguments(cx, "vary", 1)
        && let Some(color) = cx.parse_color_rgb(args, 0)
    {
        effect.color_vary = color;
    }
    effect.flags |= DistributeFlags::COLOR;
}

fn parse_color(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.color.clear();
        cx.parse_color_rgbs(args, &mut effect.color);
    }
    parse_color_vary(cx, effect, line);
}

fn parse_color255(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.color.clear();
        cx.parse_color_rgb255s(args, &mut effect.color);
    }
    parse_color_vary(cx, effect, line);
}

fn parse_alpha(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.alpha.clear();
        cx.parse_floats(args, &mut effect.alpha);
    }
    parse_vary(cx, line, &mut effect.alpha_vary);
    effect.flags |= DistributeFlags::COLOR;
}

fn parse_alpha255(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.alpha.clear();
        cx.parse_float255s(args, &mut effect.alpha);
    }
    parse_vary(cx, line, &mut effect.alpha_vary);
    effect.flags |= DistributeFlags::COLOR;
}

fn parse_size(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.size.clear();
        cx.parse_floats(args, &mut effect.size);
    }
    parse_vary(cx, line, &mut effect.size_vary);
    effect.flags |= DistributeFlags::SIZE;
}

/// `pitch`, `roll` and `heading` share one shape: a curve, `-vary` and
/// `-offset`. The curve may be empty.
fn parse_rotation(cx: &mut ParseContext<'_>, line: &Line, curve: &mut Vec<f32>, vary: &mut f32, offset: &mut f32) {
    if let Some(args) = line.arguments(cx, 0..) {
        curve.clear();
        cx.parse_floats(args, curve);
    }
    parse_vary(cx, line, vary);
    if let Some(value) = cx.option_float(line, "offset") {
        *offset = value;
    }
}

fn parse_pitch(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    parse_rotation(cx, line, &mut effect.pitch, &mut effect.pitch_vary, &mut effect.pitch_offset);
    effect.flags |= DistributeFlags::ROTATE;
}

fn parse_roll(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    parse_rotation(cx, line, &mut effect.roll, &mut effect.roll_vary, &mut effect.roll_offset);
    effect.flags |= DistributeFlags::ROTATE;
}

fn parse_yaw(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    parse_rotation(cx, line, &mut effect.yaw, &mut effect.yaw_vary, &mut effect.yaw_offset);
    effect.flags |= DistributeFlags::ROTATE;
}

fn parse_budget(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if line.has_flag(cx, "noBudget") {
        effect.flags |= DistributeFlags::NO_BUDGET;
    }
    if line.has_flag(cx, "sync") {
        effect.flags |= DistributeFlags::SYNC;
    }
}

fn parse_density(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_int(args, 0)
    {
        effect.density = value;
    }
    if let Some(args) = line.option_arguments(cx, "start", 1)
        && let Some(value) = cx.parse_int(args, 0)
    {
        effect.start = value;
    }
    parse_budget(cx, effect, line);
}

fn parse_subdivide(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_int(args, 0)
    {
        effect.density = value;
    }
    if line.has_flag(cx, "fit") || line.has_flag(cx, "fitChildren") {
        effect.flags |= DistributeFlags::FIT;
    }
    parse_budget(cx, effect, line);
    effect.flags |= DistributeFlags::SUBDIVIDE;
}

fn parse_source(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = SOURCE.parse(cx, args, 0)
    {
        effect.source_type = value as i8;
    }
    if let Some(value) = cx.option_float(line, "scale") {
        effect.source_scale = value;
    }
}

/// Switch the placed content to a component reference
fn place_component(effect: &mut DistributeEffect) {
    effect
        .flags
        .remove(DistributeFlags::MODEL | DistributeFlags::TEXTURE | DistributeFlags::ATTACH);
}

/// Switch the placed content to the resource slot
fn place_resource(effect: &mut DistributeEffect, kind: DistributeFlags) {
    effect.component = None;
    effect
        .flags
        .remove(DistributeFlags::MODEL | DistributeFlags::TEXTURE | DistributeFlags::ATTACH);
    effect.flags |= kind;
}

fn parse_effect(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    place_component(effect);
    if let Some(args) = line.arguments(cx, 1) {
        effect.component = cx.parse_effect(args, 0, VISUAL_EFFECT);
    }
    effect.transform.parse(cx, line);
}

/// `attach [keyword] name` and `component [keyword] name`. Without a keyword
/// the name is a visual effect.
fn parse_attach(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    place_component(effect);
    if let Some(args) = line.arguments(cx, 1..=2) {
        if args.len() == 2 {
            let Some(factory) = factory_by_keyword(args.get(0)) else {
                cx.error(
                    args.span(0),
                    "First argument must be component type, such as 'particle', 'sound', etc",
                );
                return;
            };
            effect.component = cx.parse_effect(args, 1, factory.type_code);
            if factory.type_code == DistributeEffect::TYPE_CODE {
                effect.flags |= DistributeFlags::ATTACH;
            }
        } else {
            effect.component = cx.parse_effect(args, 0, VISUAL_EFFECT);
        }
    }
    effect.transform.parse(cx, line);
}

fn parse_surface(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if line.has_flag(cx, "reset") {
        effect.surfaces.clear();
    }
    if line.has_flag(cx, "scaleOffset") {
        effect.flags |= DistributeFlags::SURFACE_SCALE_OFFSET;
    }
    let mut surface = Surface::default();
    surface.parse(cx, line);
    effect.surfaces.push(surface);
    effect.flags |= DistributeFlags::SURFACE;
}

fn parse_map_emit(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP)
    {
        effect.emit_map = id;
    }
    if let Some(height) = cx.option_float(line, "belowHeight") {
        effect.altitude_range[1] = height;
        effect.flags |= DistributeFlags::MAP_EMIT_HEIGHT_RANGE;
    }
    if let Some(height) = cx.option_float(line, "aboveHeight") {
        effect.altitude_range[0] = height;
        effect.flags |= DistributeFlags::MAP_EMIT_HEIGHT_RANGE;
    }
    if let Some(args) = line.option_arguments(cx, "heightRange", 2) {
        if let Some(min) = cx.parse_float(args, 0) {
            effect.altitude_range[0] = min;
        }
        if let Some(max) = cx.parse_float(args, 1) {
            effect.altitude_range[1] = max;
        }
        effect.flags |= DistributeFlags::MAP_EMIT_HEIGHT_RANGE;
    }
    if line.has_flag(cx, "pin") || line.has_flag(cx, "pinToSurface") {
        effect.flags |= DistributeFlags::MAP_EMIT_PIN;
    }
    if line.has_flag(cx, "forceStatic") {
        effect.flags |= DistributeFlags::MAP_EMIT_FORCE_STATIC;
    }
    if line.has_flag(cx, "surface") {
        effect.flags |= DistributeFlags::MAP_EMIT_SURFACE;
    }
}

fn parse_map_emit_color(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP)
    {
        effect.color_map = id;
    }
    effect.flags |= DistributeFlags::COLOR;
}

fn parse_map_pin(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP)
    {
        effect.pin_map = id;
    }
}

/// `-overrideSet` and `-alphaFromTime`, shared by the resource keywords
fn parse_resource_options(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.option_arguments(cx, "overrideSet", 1)
        && let Some(value) = cx.parse_byte(args, 0)
    {
        effect.override_set = value;
    }
    effect
        .flags
        .set(DistributeFlags::ALPHA_FROM_TIME, line.has_flag(cx, "alphaFromTime"));
    effect.transform.parse(cx, line);
}

/// Models cast shadows unless `-noShadow` is given
fn parse_model(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    place_resource(effect, DistributeFlags::MODEL);
    effect.resource.draw_mode = 0;
    if let Some(args) = line.option_arguments(cx, "material", 1)
        && let Some(id) = cx.parse_resource(args, 0, HYPERLINK_MATERIAL)
    {
        effect.resource.resource2 = id;
        effect.resource.draw_mode = DRAWMODE_NONE;
    }
    effect
        .resource
        .parse_with_flags(cx, line, HYPERLINK_FILE, DrawFlags::SHADOW);
    parse_resource_options(cx, effect, line);
}

fn parse_texture(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    place_resource(effect, DistributeFlags::TEXTURE);
    effect.resource.draw_mode = 0;
    effect.resource.parse(cx, line, HYPERLINK_TEXTURE);
    parse_resource_options(cx, effect, line);
}

fn parse_material(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    place_resource(effect, DistributeFlags::TEXTURE);
    effect.resource.draw_mode = DRAWMODE_NONE;
    effect.resource.parse(cx, line, HYPERLINK_MATERIAL);
    parse_resource_options(cx, effect, line);
}

fn parse_message(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(id) = cx.parse_file_id(args, 0)
    {
        effect.message_id = id;
    }
    if line.has_flag(cx, "keepAlive") {
        effect.flags |= DistributeFlags::MESSAGE_KEEP_ALIVE;
    }
    effect.transform.parse(cx, line);
}

/// Scale applied to the largest cluster size for `count` clusters
fn cluster_scale(count: i32) -> f32 {
    let count = f64::from(count);
    let value = (count.sqrt() / count) as f32;
    (value - 3.0) * value * -0.5
}

/// `clusters count size...`. Sizes are stored relative to the largest one,
/// which is folded into the factor.
fn parse_clusters(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 2..) {
        effect.cluster_count = cx.parse_int_range(args, 0, 1, i32::MAX).unwrap_or(0);
        effect.clusters = (1..args.len())
            .map(|index| cx.parse_float(args, index).unwrap_or(0.0))
            .collect();

        let largest = effect.clusters.iter().copied().fold(f32::MIN, f32::max);
        if largest != 0.0 {
            for size in &mut effect.clusters {
                *size /= largest;
            }
        }
        effect.clusters_factor = if effect.cluster_count > 0 {
            largest * cluster_scale(effect.cluster_count)
        } else {
            0.0
        };
    }
    if let Some(args) = line.option_arguments(cx, "start", 1) {
        effect.clusters_start = cx.parse_int(args, 0).unwrap_or(0);
    }
}

/// Sets the unnamed bits; named bits are only changed by their own keywords
fn parse_flags(cx: &mut ParseContext<'_>, effect: &mut DistributeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_uint(args, 0)
    {
        effect.flags |= DistributeFlags::from_bits_retain(value & !DistributeFlags::all().bits());
    }
}

impl DistributeEffect {
    fn write_density(&self, writer: &mut ArgScriptWriter) {
        let no_budget = self.flags.contains(DistributeFlags::NO_BUDGET);
        let sync = self.flags.contains(DistributeFlags::SYNC);
        if self.flags.contains(DistributeFlags::SUBDIVIDE) {
            writer.command("subdivide").ints([self.density]);
            writer.flag("fit", self.flags.contains(DistributeFlags::FIT));
        } else if self.density != 1 || self.start != 0 || no_budget || sync {
            writer.command("density").ints([self.density]);
            if self.start != 0 {
                writer.option("start").ints([self.start]);
            }
        } else {
            return;
        }
        writer.flag("noBudget", no_budget);
        writer.flag("sync", sync);
    }

    fn write_placed(&self, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
        if let Some(reference) = self.component {
            let name = reference_name(directory, reference);
            if self.flags.contains(DistributeFlags::ATTACH) {
                writer.command("attach");
                if reference.type_code != VISUAL_EFFECT {
                    writer.arguments([keyword_of(reference.type_code)]);
                }
                writer.arguments([name]);
            } else if reference.type_code == VISUAL_EFFECT {
                writer.command("effect").arguments([name]);
            } else {
                writer
                    .command("component")
                    .arguments([keyword_of(reference.type_code), name.as_str()]);
            }
        } else if self.flags.contains(DistributeFlags::MODEL) {
            writer.command("model");
            if !self.resource.resource.is_default() {
                writer.arguments([self.resource.resource]);
            }
            if self.resource.draw_mode == DRAWMODE_NONE {
                if !self.resource.resource2.is_default() {
                    writer.option("material").arguments([self.resource.resource2]);
                }
            } else {
                self.resource.write_draw(writer);
            }
            self.resource.write_render(writer, true);
            self.write_resource_options(writer);
        } else if self.flags.contains(DistributeFlags::TEXTURE) {
            let material = self.resource.draw_mode == DRAWMODE_NONE;
            self.resource.write(if material { "material" } else { "texture" }, writer);
            self.write_resource_options(writer);
        } else {
            return;
        }
        self.transform.write(writer);
    }

    fn write_resource_options(&self, writer: &mut ArgScriptWriter) {
        if self.override_set != 0 {
            writer.option("overrideSet").ints([i32::from(self.override_set)]);
        }
        writer.flag("alphaFromTime", self.flags.contains(DistributeFlags::ALPHA_FROM_TIME));
    }

    /// The color, alpha and size lines. A line is also written when only its
    /// flag is left to carry.
    fn write_curves(&self, writer: &mut ArgScriptWriter) {
        let write_alpha = !is_default(&self.alpha) || self.alpha_vary != 0.0;
        let color_flag_only =
            self.flags.contains(DistributeFlags::COLOR) && !write_alpha && self.color_map.is_default();
        if !is_default_color(&self.color) || !self.color_vary.is_black() || color_flag_only {
            writer.command("color").colors(self.color.iter().copied());
            if !self.color_vary.is_black() {
                writer.option("vary").color(self.color_vary);
            }
        }
        if write_alpha {
            writer.command("alpha").floats(self.alpha.iter().copied());
            if self.alpha_vary != 0.0 {
                writer.option("vary").floats([self.alpha_vary]);
            }
        }
        if !is_default(&self.size) || self.size_vary != 0.0 || self.flags.contains(DistributeFlags::SIZE) {
            writer.command("size").floats(self.size.iter().copied());
            if self.size_vary != 0.0 {
                writer.option("vary").floats([self.size_vary]);
            }
        }

        let rotations = [
            ("pitch", &self.pitch, self.pitch_vary, self.pitch_offset),
            ("roll", &self.roll, self.roll_vary, self.roll_offset),
            ("heading", &self.yaw, self.yaw_vary, self.yaw_offset),
        ];
        let mut rotation_written = false;
        for (index, (keyword, curve, vary, offset)) in rotations.into_iter().enumerate() {
            let last = index == 2;
            let flag_only = last && !rotation_written && self.flags.contains(DistributeFlags::ROTATE);
            if curve.is_empty() && vary == 0.0 && offset == 0.0 && !flag_only {
                continue;
            }
            rotation_written = true;
            writer.command(keyword).floats(curve.iter().copied());
            if vary != 0.0 {
                writer.option("vary").floats([vary]);
            }
            if offset != 0.0 {
                writer.option("offset").floats([offset]);
            }
        }
    }

    fn write_maps(&self, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
        if !self.emit_map.is_default() {
            writer.command("mapEmit").arguments([map_name(directory, self.emit_map)]);
            if self.flags.contains(DistributeFlags::MAP_EMIT_HEIGHT_RANGE) {
                let [min, max] = self.altitude_range;
                if min != ALTITUDE_MIN && max != ALTITUDE_MAX {
                    writer.option("heightRange").floats([min, max]);
                } else if max != ALTITUDE_MAX {
                    writer.option("belowHeight").floats([max]);
                } else {
                    writer.option("aboveHeight").floats([min]);
                }
            }
            writer.flag("surface", self.flags.contains(DistributeFlags::MAP_EMIT_SURFACE));
            writer.flag("pinToSurface", self.flags.contains(DistributeFlags::MAP_EMIT_PIN));
            writer.flag("forceStatic", self.flags.contains(DistributeFlags::MAP_EMIT_FORCE_STATIC));
        }
        if !self.color_map.is_default() {
            writer
                .command("mapEmitColor")
                .arguments([map_name(directory, self.color_map)]);
        }
        if !self.pin_map.is_default() {
            writer.command("mapPin").arguments([map_name(directory, self.pin_map)]);
        }
    }

    fn write_clusters(&self, writer: &mut ArgScriptWriter) {
        if self.cluster_count == 0 {
            return;
        }
        writer.command("clusters").ints([self.cluster_count]);
        let factor = self.clusters_factor / cluster_scale(self.cluster_count);
        writer.floats(self.clusters.iter().map(|size| size * factor));
        if self.clusters_start != 0 {
            writer.option("start").ints([self.clusters_start]);
        }
    }
}

impl EffectComponent for DistributeEffect {
    const KEYWORD: &'static str = "distribute";
    const TYPE_CODE: u16 = 0x0D;
    const MIN_VERSION: i32 = 3;
    const MAX_VERSION: i32 = 4;

    fn with_version(version: i32) -> Self {
        Self {
            version,
            flags: DistributeFlags::empty(),
            density: 1,
            component: None,
            unset_component_type: 0,
            start: 0,
            source_type: 0,
            source_scale: 1.0,
            transform: Transform::default(),
            size: vec![1.0],
            size_vary: 0.0,
            pitch: Vec::new(),
            roll: Vec::new(),
            yaw: Vec::new(),
            pitch_vary: 0.0,
            roll_vary: 0.0,
            yaw_vary: 0.0,
            pitch_offset: 0.0,
            roll_offset: 0.0,
            yaw_offset: 0.0,
            color: vec![ColorRgb::white()],
            color_vary: ColorRgb::black(),
            alpha: vec![1.0],
            alpha_vary: 0.0,
            surfaces: Vec::new(),
            emit_map: ResourceId::default(),
            color_map: ResourceId::default(),
            pin_map: ResourceId::default(),
            altitude_range: [ALTITUDE_MIN, ALTITUDE_MAX],
            resource: TextureSlot::default(),
            override_set: 0,
            message_id: 0,
            cluster_count: 0,
            clusters_start: 0,
            clusters_factor: 0.0,
            clusters: Vec::new(),
        }
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn grammar() -> &'static ParserTable<ComponentParser<Self>> {
        &GRAMMAR
    }

    fn write_argscript(&self, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
        self.write_density(writer);
        if self.source_type != 0 || self.source_scale != 1.0 {
            writer.command("source");
            match SOURCE.name_of(self.source_type.into()) {
                Some(name) => writer.arguments([name]),
                None => writer.ints([i32::from(self.source_type)]),
            };
            if self.source_scale != 1.0 {
                writer.option("scale").floats([self.source_scale]);
            }
        }

        for (index, surface) in self.surfaces.iter().enumerate() {
            writer.command("surface");
            surface.write(writer, directory);
            if index == 0 && self.flags.contains(DistributeFlags::SURFACE_SCALE_OFFSET) {
                writer.option("scaleOffset");
            }
        }

        self.write_placed(writer, directory);
        if self.message_id != 0 {
            writer.command("message").arguments([file_name(self.message_id)]);
            writer.flag("keepAlive", self.flags.contains(DistributeFlags::MESSAGE_KEEP_ALIVE));
        }

        self.write_curves(writer);
        self.write_maps(writer, directory);
        self.write_clusters(writer);

        let unnamed = self.flags.bits() & !DistributeFlags::all().bits();
        if unnamed != 0 {
            writer.command("flags").arguments([format!("0x{unnamed:x}")]);
        }
    }

    fn used_elements(&self) -> Vec<UsedElement> {
        let mut used: Vec<UsedElement> = self.component.map(UsedElement::Effect).into_iter().collect();
        used.extend(self.surfaces.iter().flat_map(Surface::used_elements));
        for id in [self.emit_map, self.color_map, self.pin_map] {
            if !id.is_default() {
                used.push(UsedElement::Resource {
                    type_code: MAP_RESOURCE,
                    id,
                });
            }
        }
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::particles::ParticleEffect;
    use crate::transform::TransformFlags;
    use crate::unit::{EffectUnit, IMPORT_INDEX_FLAG};

    const HEADER: &str = "import fx\nparticles sparks\nend\ndistribute cluster\nend\n";

    fn parse_unit(body: &str) -> (EffectUnit, Vec<pfx_argscript::Diagnostic>) {
        EffectUnit::parse(&format!("{HEADER}distribute test\n{body}\nend"))
    }

    fn parse(body: &str) -> DistributeEffect {
        let (unit, diagnostics) = parse_unit(body);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        extract(&unit)
    }

    fn extract(unit: &EffectUnit) -> DistributeEffect {
        match unit.component("test") {
            Some(Component::Distribute(distribute)) => (**distribute).clone(),
            other => panic!("expected a distribution, got {other:?}"),
        }
    }

    fn write(effect: &DistributeEffect) -> String {
        let (unit, _) = parse_unit("");
        Component::from(effect.clone()).to_argscript("test", &unit)
    }

    fn assert_round_trip(effect: &DistributeEffect) {
        let text = write(effect);
        let body = text
            .strip_prefix("distribute test\n")
            .and_then(|rest| rest.strip_suffix("end"))
            .unwrap();
        let (unit, diagnostics) = parse_unit(body.trim_end());
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(extract(&unit), *effect, "{text}");
    }

    #[test]
    fn test_default_writes_empty_block() {
        let (unit, _) = parse_unit("");
        assert_eq!(
            Component::from(DistributeEffect::default()).to_argscript("test", &unit),
            "distribute test\nend"
        );
        assert_eq!(extract(&unit), DistributeEffect::default());
    }

    #[test]
    fn test_density_start() {
        let effect = parse("density 20 -start 5 -noBudget");
        assert_eq!(effect.density, 20);
        assert_eq!(effect.start, 5);
        assert_eq!(effect.source_scale, 1.0);
        assert!(effect.flags.contains(DistributeFlags::NO_BUDGET));
        assert_eq!(write(&effect), "distribute test\n\tdensity 20 -start 5 -noBudget\nend");
        assert_round_trip(&effect);
    }

    #[test]
    fn test_subdivide_and_source() {
        let effect = parse("subdivide 3 -fitChildren -sync\nsource sphereSurface -scale 2");
        assert!(effect.flags.contains(DistributeFlags::SUBDIVIDE | DistributeFlags::FIT | DistributeFlags::SYNC));
        assert_eq!(effect.source_type, 3);
        assert_eq!(effect.source_scale, 2.0);
        assert_eq!(
            write(&effect),
            "distribute test\n\tsubdivide 3 -fit -sync\n\tsource sphereSurface -scale 2\nend"
        );
        assert_round_trip(&effect);
    }

    #[test]
    fn test_effect_reference() {
        let effect = parse("effect fx -offset (0, 0, 1)");
        assert_eq!(effect.component, Some(EffectRef::new(VISUAL_EFFECT, IMPORT_INDEX_FLAG)));
        assert_eq!(effect.transform.flags, TransformFlags::OFFSET);
        assert_eq!(write(&effect), "distribute test\n\teffect fx -offset (0, 0, 1)\nend");
        assert_round_trip(&effect);
    }

    #[test]
    fn test_attach() {
        let effect = parse("attach distribute cluster -scale 0.5");
        assert_eq!(effect.component, Some(EffectRef::new(DistributeEffect::TYPE_CODE, 0)));
        assert!(effect.flags.contains(DistributeFlags::ATTACH));
        assert_eq!(write(&effect), "distribute test\n\tattach distribute cluster -scale 0.5\nend");
        assert_round_trip(&effect);

        let effect = parse("attach particles sparks");
        assert_eq!(effect.component, Some(EffectRef::new(ParticleEffect::TYPE_CODE, 0)));
        assert!(!effect.flags.contains(DistributeFlags::ATTACH));
        assert_eq!(write(&effect), "distribute test\n\tcomponent particles sparks\nend");
        assert_round_trip(&effect);
    }

    #[test]
    fn test_attach_unknown_keyword() {
        let (unit, diagnostics) = parse_unit("attach wobble sparks");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "First argument must be component type, such as 'particle', 'sound', etc"
        );
        assert_eq!(extract(&unit).component, None);
    }

    #[test]
    fn test_unknown_effect_keeps_rest_of_block() {
        let (unit, diagnostics) = parse_unit("effect unknownName\nsize 3\ndensity 7");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "There is no effect component called 'unknownName' in this PFX unit."
        );
        let effect = extract(&unit);
        assert_eq!(effect.component, None);
        assert_eq!(effect.size, vec![3.0]);
        assert_eq!(effect.density, 7);
    }

    #[test]
    fn test_source_accepts_unnamed_value() {
        let effect = parse("source 9");
        assert_eq!(effect.source_type, 9);
        assert_eq!(write(&effect), "distribute test\n\tsource 9\nend");
        assert_round_trip(&effect);
    }

    #[test]
    fn test_component_wrong_type() {
        let (_, diagnostics) = parse_unit("component light sparks");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "Effect component 'sparks' is not a light component."
        );
    }

    #[test]
    fn test_model_replaces_component() {
        let effect = parse("effect fx\nmodel 0x10 -material 0x20 -overrideSet 2 -alphaFromTime -scale 3");
        assert_eq!(effect.component, None);
        assert!(effect.flags.contains(DistributeFlags::MODEL | DistributeFlags::ALPHA_FROM_TIME));
        assert_eq!(effect.resource.draw_mode, DRAWMODE_NONE);
        assert_eq!(effect.resource.resource2, ResourceId::new(0, 0x20));
        assert_eq!(effect.resource.draw_flags, DrawFlags::SHADOW);
        assert_eq!(effect.override_set, 2);
        assert_eq!(
            write(&effect),
            "distribute test\n\tmodel 0x00000010 -material 0x00000020 -overrideSet 2 -alphaFromTime -scale 3\nend"
        );
        assert_round_trip(&effect);
    }

    #[test]
    fn test_texture_and_material() {
        let effect = parse("texture 0x10 -draw additive");
        assert!(effect.flags.contains(DistributeFlags::TEXTURE));
        assert!(!effect.flags.contains(DistributeFlags::MODEL));
        assert_round_trip(&effect);

        let effect = parse("model 0x1\nmaterial 0x30 -texture 0x40");
        assert!(!effect.flags.contains(DistributeFlags::MODEL));
        assert_eq!(effect.resource.draw_mode, DRAWMODE_NONE);
        assert_eq!(
            write(&effect),
            "distribute test\n\tmaterial 0x00000030 -texture 0x00000040\nend"
        );
        assert_round_trip(&effect);
    }

    #[test]
    fn test_curves() {
        let effect = parse("color (1, 0, 0) -vary (0.5, 0.5, 0.5)\nalpha255 0 255 -vary 0.25\nsize 1 2\nheading 0 90 -offset 45");
        assert_eq!(effect.color, vec![ColorRgb::new(1.0, 0.0, 0.0)]);
        assert_eq!(effect.color_vary, ColorRgb::new(0.5, 0.5, 0.5));
        assert_eq!(effect.alpha, vec![0.0, 1.0]);
        assert_eq!(effect.yaw, vec![0.0, 90.0]);
        assert_eq!(effect.yaw_offset, 45.0);
        assert!(effect.flags.contains(DistributeFlags::COLOR | DistributeFlags::SIZE | DistributeFlags::ROTATE));
        assert_round_trip(&effect);
    }

    #[test]
    fn test_flag_only_lines() {
        let effect = parse("size 1\ncolor (1, 1, 1)\nrotate");
        assert!(effect.flags.contains(DistributeFlags::COLOR | DistributeFlags::SIZE | DistributeFlags::ROTATE));
        assert_eq!(
            write(&effect),
            "distribute test\n\tcolor (1, 1, 1)\n\tsize 1\n\theading\nend"
        );
        assert_round_trip(&effect);
    }

    #[test]
    fn test_maps() {
        let effect = parse("mapEmit terrain -belowHeight 20 -pinToSurface\nmapEmitColor 0x5\nmapPin water");
        assert_eq!(effect.emit_map, ResourceId::terrain());
        assert_eq!(effect.altitude_range, [ALTITUDE_MIN, 20.0]);
        assert_eq!(effect.pin_map, ResourceId::water());
        assert_eq!(
            write(&effect),
            "distribute test\n\tmapEmit terrain -belowHeight 20 -pinToSurface\n\tmapEmitColor 0x00000005\n\tmapPin water\nend"
        );
        assert_round_trip(&effect);

        let effect = parse("mapEmit 0x9 -heightRange -5 5 -surface -forceStatic");
        assert_eq!(effect.altitude_range, [-5.0, 5.0]);
        assert_round_trip(&effect);
    }

    #[test]
    fn test_surfaces() {
        let effect = parse("surface 0x1 -scaleOffset\nsurface 0x2\nsurface 0x3 -reset");
        assert_eq!(effect.surfaces.len(), 1);
        assert_eq!(effect.surfaces[0].surface_map, ResourceId::new(0, 3));
        assert!(effect.flags.contains(DistributeFlags::SURFACE | DistributeFlags::SURFACE_SCALE_OFFSET));
        assert_round_trip(&effect);
    }

    #[test]
    fn test_message() {
        let effect = parse("message 0x1234 -keepAlive");
        assert_eq!(effect.message_id, 0x1234);
        assert!(effect.flags.contains(DistributeFlags::MESSAGE_KEEP_ALIVE));
        assert_round_trip(&effect);
    }

    #[test]
    fn test_clusters() {
        let effect = parse("clusters 4 2 1 -start 3");
        assert_eq!(effect.cluster_count, 4);
        assert_eq!(effect.clusters, vec![1.0, 0.5]);
        assert_eq!(effect.clusters_factor, 1.25);
        assert_eq!(effect.clusters_start, 3);
        assert_eq!(write(&effect), "distribute test\n\tclusters 4 2 1 -start 3\nend");

        let effect = parse("clusters 4 2 1\nclusters 4 8");
        assert_eq!(effect.clusters, vec![1.0]);
        assert_eq!(effect.clusters_factor, 5.0);
    }

    #[test]
    fn test_unnamed_flags() {
        let effect = parse("subdivide 2\nflags 0x80001");
        assert_eq!(effect.flags.bits(), 0x80001);
        assert_eq!(write(&effect), "distribute test\n\tsubdivide 2\n\tflags 0x80000\nend");
        assert_round_trip(&effect);
    }

    #[test]
    fn test_used_elements() {
        let effect = parse("effect fx\nsurface 0x4\nmapEmit 0x5");
        assert_eq!(
            effect.used_elements(),
            vec![
                UsedElement::Effect(EffectRef::new(VISUAL_EFFECT, IMPORT_INDEX_FLAG)),
                UsedElement::Resource {
                    type_code: MAP_RESOURCE,
                    id: ResourceId::new(0, 4),
                },
                UsedElement::Resource {
                    type_code: MAP_RESOURCE,
                    id: ResourceId::new(0, 5),
                },
            ]
        );
    }

    #[test]
    fn test_component_binary_sentinel() {
        let mut effect = DistributeEffect::default();
        let bytes = pfx_struct::encode(&effect).unwrap();
        assert_eq!(&bytes[8..13], &[0xFF, 0xFF, 0xFF, 0xFF, 0]);

        effect.component = Some(EffectRef::new(ParticleEffect::TYPE_CODE, 2));
        let bytes = pfx_struct::encode(&effect).unwrap();
        assert_eq!(&bytes[8..13], &[0, 0, 0, 2, 1]);
        assert_eq!(pfx_struct::decode::<DistributeEffect>(&bytes).unwrap(), effect);
    }

    #[test]
    fn test_unset_component_keeps_type_byte() {
        let mut bytes = pfx_struct::encode(&DistributeEffect::default()).unwrap();
        bytes[12] = 7;
        let effect = pfx_struct::decode::<DistributeEffect>(&bytes).unwrap();
        assert_eq!(effect.component, None);
        assert_eq!(effect.unset_component_type, 7);
        assert_eq!(pfx_struct::encode(&effect).unwrap(), bytes);
    }

    #[test]
    fn test_version_gated_clusters() {
        let mut effect = DistributeEffect::with_version(3);
        effect.cluster_count = 2;
        effect.clusters = vec![1.0];
        let v3 = pfx_struct::encode(&effect).unwrap();

        effect.version = 4;
        let v4 = pfx_struct::encode(&effect).unwrap();
        assert_eq!(v4.len(), v3.len() + 16 + 4);

        let mut decoded = DistributeEffect::with_version(3);
        decoded.read_from(&mut StreamReader::new(&v3)).unwrap();
        assert_eq!(decoded.cluster_count, 0);
        assert!(decoded.clusters.is_empty());

        assert_eq!(pfx_struct::decode::<DistributeEffect>(&v4).unwrap(), effect);
    }
}
