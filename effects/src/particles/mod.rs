//! Particle emitter component
//!
//! The largest component: an emitter volume, rate curves, per-particle
//! curves for color, alpha, size and rotation, forces, warps, random walks,
//! collision surfaces and terrain maps, and an optional path.
//!
//! Keyword handlers live in `parser`, the writer in `writer`.

mod parser;
mod records;
mod writer;


use std::sync::LazyLock;

use pfx_argscript::{ArgScriptEnum, ArgScriptWriter, ParserTable};
use pfx_shared::{ColorRgb, ResourceId};
use pfx_struct::{Endian, StreamReader, StreamWriter, StructError, Structure, Structured};

use crate::component::{ComponentParser, EffectComponent, UsedElement};
use crate::directory::{EffectDirectory, MAP_RESOURCE, MATERIAL_RESOURCE};
use crate::surface::Surface;
use crate::texture::{DRAWMODE_NONE, TextureSlot};

pub use records::{ParticleAttractor, ParticlePathPoint, ParticleRandomWalk, ParticleWiggle};

bitflags::bitflags! {
    /// Particle flags, stored as two big-endian words, high word first
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParticleFlags: u64 {
        const INJECT = 1 << 0x00;
        const MAINTAIN = 1 << 0x01;
        const RATE_SUSTAIN = 1 << 0x02;
        const EMIT_BASE = 1 << 0x03;
        const SOURCE_ROUND = 1 << 0x04;
        const MAP_EMIT_PIN_TO_SURFACE = 1 << 0x05;
        const MAP_EMIT_HEIGHT_RANGE = 1 << 0x06;
        const MAP_EMIT_DENSITY = 1 << 0x07;
        const RATE_SIZE_SCALE = 1 << 0x08;
        const RATE_AREA_SCALE = 1 << 0x09;
        const RATE_VOLUME_SCALE = 1 << 0x0A;
        const SOURCE_SCALE_PARTICLES = 1 << 0x0B;
        const SURFACES = 1 << 0x0C;
        const MAP_COLLIDE = 1 << 0x0D;
        const MAP_REPEL = 1 << 0x0E;
        const MAP_ADVECT = 1 << 0x0F;
        const MAP_FORCE = 1 << 0x10;
        const KILL_OUTSIDE_MAP = 1 << 0x11;
        const MAP_COLLIDE_PIN_TO_MAP = 1 << 0x12;
        const RANDOM_WALK = 1 << 0x13;
        const RANDOM_WALK_WAIT = 1 << 0x14;
        const MODEL = 1 << 0x15;
        const TEXTURE_ACCEPT_COMPOSITE = 1 << 0x16;
        const ATTRACTOR = 1 << 0x17;
        const NOT_PRESET_ATTRACTOR = 1 << 0x18;
        const EMIT_SCALE_EXISTING = 1 << 0x19;
        const SOURCE_RESET_INCOMING = 1 << 0x1A;
        const RATE_KILL = 1 << 0x1B;
        const RATE_HOLD = 1 << 0x1C;
        const WARP_SPIRAL = 1 << 0x1D;
        const LOOP_BOX = 1 << 0x1E;
        const PATH = 1 << 0x1F;
        const PROPAGATE_ALWAYS = 1 << 0x20;
        const PROPAGATE_IF_KILLED = 1 << 0x21;
        const FRAMES_RELATIVE_SPEED = 1 << 0x22;
        const COLOR_VARY_RGB = 1 << 0x23;
    }
}

pub const ALIGNMENT: ArgScriptEnum = ArgScriptEnum::new(&[
    ("camera", 0),
    ("ground", 1),
    ("source", 5),
    ("dirX", 2),
    ("dirY", 3),
    ("dirZ", 4),
    ("zPole", 6),
    ("sunPole", 7),
    ("cameraLocation", 8),
]);

pub const PHYSICS: ArgScriptEnum = ArgScriptEnum::new(&[
    ("user1", 3),
    ("user2", 4),
    ("user3", 5),
    ("user4", 6),
    ("normal", 0),
    ("unk1", 1),
    ("unk2", 2),
    ("standard", 1),
    ("path", 2),
])
.with_canonical(&["standard", "path"]);

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleEffect {
    pub flags: ParticleFlags,
    /// Particle life, min and max
    pub life: [f32; 2],
    pub preroll: f32,
    pub emit_delay: [f32; 2],
    pub emit_retrigger: [f32; 2],
    pub emit_direction_min: [f32; 3],
    pub emit_direction_max: [f32; 3],
    pub emit_speed: [f32; 2],
    /// Emitter volume, as a box
    pub emit_volume_min: [f32; 3],
    pub emit_volume_max: [f32; 3],
    /// Ring and torus width, `-1` when the source is not one
    pub torus_width: f32,

    pub rate: Vec<f32>,
    pub rate_loop: f32,
    pub rate_curve_cycles: i16,
    pub rate_speed_scale: f32,

    pub size: Vec<f32>,
    pub size_vary: f32,
    pub aspect_ratio: Vec<f32>,
    pub aspect_ratio_vary: f32,
    pub rotation_vary: f32,
    pub rotation_offset: f32,
    pub rotate: Vec<f32>,
    pub alpha: Vec<f32>,
    pub alpha_vary: f32,
    pub color: Vec<ColorRgb>,
    pub color_vary: ColorRgb,

    pub texture: TextureSlot,
    pub physics_type: u8,
    pub override_set: u8,
    pub tile_count: [u8; 2],
    pub align_mode: u8,
    pub frame_start: u8,
    pub frame_count: i8,
    pub frame_random: i8,
    pub frame_speed: f32,

    pub direction_forces: [f32; 3],
    pub wind_strength: f32,
    pub gravity_strength: f32,
    pub radial_force: f32,
    pub radial_force_location: [f32; 3],
    pub drag: f32,
    pub velocity_stretch: f32,
    pub screw_rate: f32,
    pub wiggles: Vec<ParticleWiggle>,
    pub bloom_alpha_rate: u8,
    pub bloom_alpha_base: u8,
    pub bloom_size_rate: u8,
    pub bloom_size_base: u8,

    pub loop_box_color: Vec<ColorRgb>,
    pub loop_box_alpha: Vec<f32>,
    pub surfaces: Vec<Surface>,

    pub map_bounce: f32,
    pub map_repulse_height: f32,
    pub map_repulse_strength: f32,
    pub map_repulse_scout_distance: f32,
    pub map_repulse_vertical: f32,
    pub map_repulse_kill_height: f32,
    pub probability_death: f32,
    /// Emission heights, min and max
    pub altitude_range: [f32; 2],
    /// Map used by collision, repulsion, advection and forces
    pub map_force: ResourceId,
    pub map_emit: ResourceId,
    pub map_emit_color: ResourceId,

    pub random_walk: ParticleRandomWalk,
    pub attractor_origin: [f32; 3],
    pub attractor: ParticleAttractor,
    pub path_points: Vec<ParticlePathPoint>,
}

impl Default for ParticleEffect {
    fn default() -> Self {
        Self {
            flags: ParticleFlags::empty(),
            life: [0.0; 2],
            preroll: 0.0,
            emit_delay: [-1.0; 2],
            emit_retrigger: [-1.0; 2],
            emit_direction_min: [0.0, 0.0, 1.0],
            emit_direction_max: [0.0, 0.0, 1.0],
            emit_speed: [0.0; 2],
            emit_volume_min: [0.0; 3],
            emit_volume_max: [0.0; 3],
            torus_width: -1.0,
            rate: Vec::new(),
            rate_loop: 0.0,
            rate_curve_cycles: 0,
            rate_speed_scale: 0.0,
            size: vec![1.0],
            size_vary: 0.0,
            aspect_ratio: vec![1.0],
            aspect_ratio_vary: 0.0,
            rotation_vary: 0.0,
            rotation_offset: 0.0,
            rotate: vec![0.0],
            alpha: vec![1.0],
            alpha_vary: 0.0,
            color: vec![ColorRgb::white()],
            color_vary: ColorRgb::black(),
            texture: TextureSlot::default(),
            physics_type: 0,
            override_set: 0,
            tile_count: [1, 1],
            align_mode: 0,
            frame_start: 0,
            frame_count: 0,
            frame_random: 0,
            frame_speed: 0.0,
            direction_forces: [0.0; 3],
            wind_strength: 0.0,
            gravity_strength: 0.0,
            radial_force: 0.0,
            radial_force_location: [0.0; 3],
            drag: 0.0,
            velocity_stretch: 0.0,
            screw_rate: 0.0,
            wiggles: Vec::new(),
            bloom_alpha_rate: 0,
            bloom_alpha_base: 255,
            bloom_size_rate: 0,
            bloom_size_base: 255,
            loop_box_color: Vec::new(),
            loop_box_alpha: Vec::new(),
            surfaces: Vec::new(),
            map_bounce: 1.0,
            map_repulse_height: 0.0,
            map_repulse_strength: 0.0,
            map_repulse_scout_distance: 0.0,
            map_repulse_vertical: 0.0,
            map_repulse_kill_height: -1e9,
            probability_death: 0.0,
            altitude_range: [-10000.0, 10000.0],
            map_force: ResourceId::default(),
            map_emit: ResourceId::default(),
            map_emit_color: ResourceId::default(),
            random_walk: ParticleRandomWalk::default(),
            attractor_origin: [0.0; 3],
            attractor: ParticleAttractor::default(),
            path_points: Vec::new(),
        }
    }
}

fn read_flags(effect: &mut ParticleEffect, reader: &mut StreamReader<'_>, endian: Endian) -> Result<(), StructError> {
    let high = reader.read_u32(endian)?;
    let low = reader.read_u32(endian)?;
    effect.flags = ParticleFlags::from_bits_retain((u64::from(high) << 32) | u64::from(low));
    Ok(())
}

fn write_flags(effect: &ParticleEffect, writer: &mut StreamWriter, endian: Endian) -> Result<(), StructError> {
    let bits = effect.flags.bits();
    writer.write_u32((bits >> 32) as u32, endian)?;
    writer.write_u32(bits as u32, endian)
}

static STRUCTURE: LazyLock<Structure<ParticleEffect>> = LazyLock::new(|| {
    Structure::builder("ParticleEffect", Endian::Big)
        .custom("flags", read_flags, write_flags)
        .array("life", |s: &ParticleEffect| &s.life, |s| &mut s.life)
        .endian(Endian::Little)
        .scalar("prerollTime", |s| &s.preroll, |s| &mut s.preroll)
        .array("emitDelay", |s| &s.emit_delay, |s| &mut s.emit_delay)
        .endian(Endian::Little)
        .array("emitRetrigger", |s| &s.emit_retrigger, |s| &mut s.emit_retrigger)
        .endian(Endian::Little)
        .array("emitDirectionBBMin", |s| &s.emit_direction_min, |s| &mut s.emit_direction_min)
        .endian(Endian::Little)
        .array("emitDirectionBBMax", |s| &s.emit_direction_max, |s| &mut s.emit_direction_max)
        .endian(Endian::Little)
        .array("emitSpeed", |s| &s.emit_speed, |s| &mut s.emit_speed)
        .endian(Endian::Little)
        .array("emitVolumeBBMin", |s| &s.emit_volume_min, |s| &mut s.emit_volume_min)
        .endian(Endian::Little)
        .array("emitVolumeBBMax", |s| &s.emit_volume_max, |s| &mut s.emit_volume_max)
        .endian(Endian::Little)
        .scalar("torusWidth", |s| &s.torus_width, |s| &mut s.torus_width)
        .list("rate", |s| &s.rate, |s| &mut s.rate)
        .scalar("rateLoop", |s| &s.rate_loop, |s| &mut s.rate_loop)
        .scalar("rateCurveCycles", |s| &s.rate_curve_cycles, |s| &mut s.rate_curve_cycles)
        .scalar("rateSpeedScale", |s| &s.rate_speed_scale, |s| &mut s.rate_speed_scale)
        .list("size", |s| &s.size, |s| &mut s.size)
        .scalar("sizeVary", |s| &s.size_vary, |s| &mut s.size_vary)
        .list("aspectRatio", |s| &s.aspect_ratio, |s| &mut s.aspect_ratio)
        .scalar("aspectRatioVary", |s| &s.aspect_ratio_vary, |s| &mut s.aspect_ratio_vary)
        .scalar("rotationVary", |s| &s.rotation_vary, |s| &mut s.rotation_vary)
        .scalar("rotationOffset", |s| &s.rotation_offset, |s| &mut s.rotation_offset)
        .list("rotationCurve", |s| &s.rotate, |s| &mut s.rotate)
        .list("alpha", |s| &s.alpha, |s| &mut s.alpha)
        .scalar("alphaVary", |s| &s.alpha_vary, |s| &mut s.alpha_vary)
        .nested_list("color", |s| &s.color, |s| &mut s.color)
        .nested("colorVary", |s| &s.color_vary, |s| &mut s.color_vary)
        .nested("texture", |s| &s.texture, |s| &mut s.texture)
        .scalar("physicsType", |s| &s.physics_type, |s| &mut s.physics_type)
        .scalar("overrideSet", |s| &s.override_set, |s| &mut s.override_set)
        .array("tileCount", |s| &s.tile_count, |s| &mut s.tile_count)
        .scalar("alignMode", |s| &s.align_mode, |s| &mut s.align_mode)
        .scalar("frameStart", |s| &s.frame_start, |s| &mut s.frame_start)
        .scalar("frameCount", |s| &s.frame_count, |s| &mut s.frame_count)
        .scalar("frameRandom", |s| &s.frame_random, |s| &mut s.frame_random)
        .scalar("frameSpeed", |s| &s.frame_speed, |s| &mut s.frame_speed)
        .array("directionForcesSum", |s| &s.direction_forces, |s| &mut s.direction_forces)
        .endian(Endian::Little)
        .scalar("windStrength", |s| &s.wind_strength, |s| &mut s.wind_strength)
        .scalar("gravityStrength", |s| &s.gravity_strength, |s| &mut s.gravity_strength)
        .scalar("radialForce", |s| &s.radial_force, |s| &mut s.radial_force)
        .array("radialForceLocation", |s| &s.radial_force_location, |s| &mut s.radial_force_location)
        .endian(Endian::Little)
        .scalar("drag", |s| &s.drag, |s| &mut s.drag)
        .scalar("velocityStretch", |s| &s.velocity_stretch, |s| &mut s.velocity_stretch)
        .scalar("screwRate", |s| &s.screw_rate, |s| &mut s.screw_rate)
        .nested_list("wiggles", |s| &s.wiggles, |s| &mut s.wiggles)
        .scalar("bloomAlphaRate", |s| &s.bloom_alpha_rate, |s| &mut s.bloom_alpha_rate)
        .scalar("bloomAlphaBase", |s| &s.bloom_alpha_base, |s| &mut s.bloom_alpha_base)
        .scalar("bloomSizeRate", |s| &s.bloom_size_rate, |s| &mut s.bloom_size_rate)
        .scalar("bloomSizeBase", |s| &s.bloom_size_base, |s| &mut s.bloom_size_base)
        .nested_list("loopBoxColor", |s| &s.loop_box_color, |s| &mut s.loop_box_color)
        .list("loopBoxAlpha", |s| &s.loop_box_alpha, |s| &mut s.loop_box_alpha)
        .nested_list("surfaces", |s| &s.surfaces, |s| &mut s.surfaces)
        .scalar("mapBounce", |s| &s.map_bounce, |s| &mut s.map_bounce)
        .scalar("mapRepulseHeight", |s| &s.map_repulse_height, |s| &mut s.map_repulse_height)
        .scalar("mapRepulseStrength", |s| &s.map_repulse_strength, |s| &mut s.map_repulse_strength)
        .scalar("mapRepulseScoutDistance", |s| &s.map_repulse_scout_distance, |s| {
            &mut s.map_repulse_scout_distance
        })
        .scalar("mapRepulseVertical", |s| &s.map_repulse_vertical, |s| &mut s.map_repulse_vertical)
        .scalar("mapRepulseKillHeight", |s| &s.map_repulse_kill_height, |s| {
            &mut s.map_repulse_kill_height
        })
        .scalar("probabilityDeath", |s| &s.probability_death, |s| &mut s.probability_death)
        .array("altitudeRange", |s| &s.altitude_range, |s| &mut s.altitude_range)
        .endian(Endian::Little)
        .nested("mapForce", |s| &s.map_force, |s| &mut s.map_force)
        .nested("mapEmit", |s| &s.map_emit, |s| &mut s.map_emit)
        .nested("mapEmitColor", |s| &s.map_emit_color, |s| &mut s.map_emit_color)
        .nested("randomWalk", |s| &s.random_walk, |s| &mut s.random_walk)
        .array("attractorOrigin", |s| &s.attractor_origin, |s| &mut s.attractor_origin)
        .endian(Endian::Little)
        .nested("attractor", |s| &s.attractor, |s| &mut s.attractor)
        .nested_list("pathPoints", |s| &s.path_points, |s| &mut s.path_points)
        .build()
});

impl Structured for ParticleEffect {
    fn structure() -> &'static Structure<Self> {
        &STRUCTURE
    }
}

impl ParticleEffect {
    /// Flag bits with no name, as written by the `flags` keyword
    pub fn unnamed_flags(&self) -> u64 {
        self.flags.bits() & !ParticleFlags::all().bits()
    }

    /// True when the texture slot names a material
    pub fn uses_material(&self) -> bool {
        self.texture.draw_mode == DRAWMODE_NONE
    }
}

impl EffectComponent for ParticleEffect {
    const KEYWORD: &'static str = "particles";
    const TYPE_CODE: u16 = 0x01;
    const MIN_VERSION: i32 = 1;
    const MAX_VERSION: i32 = 1;

    fn with_version(_version: i32) -> Self {
        Self::default()
    }

    fn version(&self) -> i32 {
        Self::MAX_VERSION
    }

    fn grammar() -> &'static ParserTable<ComponentParser<Self>> {
        &parser::GRAMMAR
    }

    fn write_argscript(&self, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
        writer::write(self, writer, directory);
    }

    fn used_elements(&self) -> Vec<UsedElement> {
        let mut used: Vec<UsedElement> = self.surfaces.iter().flat_map(Surface::used_elements).collect();
        for id in [self.map_emit_color, self.map_force, self.map_emit] {
            if !id.is_default() {
                used.push(UsedElement::Resource {
                    type_code: MAP_RESOURCE,
                    id,
                });
            }
        }
        if self.uses_material() {
            let material = if self.flags.contains(ParticleFlags::MODEL) {
                self.texture.resource2
            } else {
                self.texture.resource
            };
            if !material.is_default() {
                used.push(UsedElement::Resource {
                    type_code: MATERIAL_RESOURCE,
                    id: material,
                });
            }
        }
        used
    }
}
