use std::f32::consts::TAU;
use std::sync::LazyLock;

use pfx_argscript::{Arguments, Line, ParserTable};
use pfx_shared::ResourceId;

use super::{ALIGNMENT, PHYSICS, ParticleEffect, ParticleFlags, ParticlePathPoint, ParticleWiggle};
use crate::component::{ComponentParser, HYPERLINK_FILE, HYPERLINK_MAP, HYPERLINK_MATERIAL, HYPERLINK_TEXTURE, grammar};
use crate::context::ParseContext;
use crate::surface::Surface;
use crate::texture::{DRAWMODE_NONE, DrawFlags};

/// Directions whose length is this close to 1 are kept as written
const UNIT_TOLERANCE: f32 = 1e-6;

pub(super) static GRAMMAR: LazyLock<ParserTable<ComponentParser<ParticleEffect>>> = LazyLock::new(|| {
    grammar(&[
        ("color", parse_color),
        ("colour", parse_color),
        ("color255", parse_color255),
        ("colour255", parse_color255),
        ("alpha", parse_alpha),
        ("alpha255", parse_alpha255),
        ("size", parse_size),
        ("aspect", parse_aspect),
        ("rotate", parse_rotate),
        ("stretch", parse_stretch),
        ("source", parse_source),
        ("emit", parse_emit),
        ("force", parse_force),
        ("warp", parse_warp),
        ("randomWalk", parse_random_walk),
        ("directedWalk", parse_directed_walk),
        ("life", parse_life),
        ("rate", parse_rate),
        ("inject", parse_inject),
        ("maintain", parse_maintain),
        ("material", parse_material),
        ("texture", parse_texture),
        ("model", parse_model),
        ("frames", parse_frames),
        ("align", parse_align),
        ("loopBoxColor", parse_loop_box_color),
        ("loopBoxColour", parse_loop_box_color),
        ("loopBoxAlpha", parse_loop_box_alpha),
        ("surface", parse_surface),
        ("mapEmit", parse_map_emit),
        ("mapEmitColor", parse_map_emit_color),
        ("mapEmitColour", parse_map_emit_color),
        ("mapCollide", parse_map_collide),
        ("mapRepel", parse_map_repel),
        ("mapAdvect", parse_map_advect),
        ("mapForce", parse_map_force),
        ("physics", parse_physics),
        ("path", parse_path),
        ("flags", parse_flags),
    ])
});

/// Curve arguments; a bare keyword leaves the curve alone
fn curve_arguments<'l>(cx: &mut ParseContext<'_>, line: &'l Line) -> Option<Arguments<'l>> {
    line.arguments(cx, 0..).filter(|args| !args.is_empty())
}

/// `-name value [vary]` as a `[value - vary, value + vary]` range
fn option_range(cx: &mut ParseContext<'_>, line: &Line, name: &str) -> Option<[f32; 2]> {
    let args = line.option_arguments(cx, name, 1..=2)?;
    let value = cx.parse_float(args, 0)?;
    let vary = if args.len() == 2 { cx.parse_float(args, 1).unwrap_or(0.0) } else { 0.0 };
    Some([value - vary, value + vary])
}

fn parse_colors(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line, scale255: bool) {
    if let Some(args) = curve_arguments(cx, line) {
        effect.color.clear();
        if scale255 {
            cx.parse_color_rgb255s(args, &mut effect.color);
        } else {
            cx.parse_color_rgbs(args, &mut effect.color);
        }
    }
    if let Some(args) = line.option_arguments(cx, "vary", 1) {
        let vary = if scale255 { cx.parse_color_rgb255(args, 0) } else { cx.parse_color_rgb(args, 0) };
        if let Some(vary) = vary {
            effect.color_vary = vary;
        }
        effect.flags.remove(ParticleFlags::COLOR_VARY_RGB);
    } else if let Some(args) = line.option_arguments(cx, "varyRGB", 1) {
        let vary = if scale255 { cx.parse_color_rgb255(args, 0) } else { cx.parse_color_rgb(args, 0) };
        if let Some(vary) = vary {
            effect.color_vary = vary;
        }
        effect.flags |= ParticleFlags::COLOR_VARY_RGB;
    }
}

fn parse_color(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    parse_colors(cx, effect, line, false);
}

fn parse_color255(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    parse_colors(cx, effect, line, true);
}

fn parse_alphas(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line, scale255: bool) {
    if let Some(args) = curve_arguments(cx, line) {
        effect.alpha.clear();
        if scale255 {
            cx.parse_float255s(args, &mut effect.alpha);
        } else {
            cx.parse_floats(args, &mut effect.alpha);
        }
    }
    if let Some(vary) = cx.option_float(line, "vary") {
        effect.alpha_vary = if scale255 { vary / 255.0 } else { vary };
    }
}

fn parse_alpha(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    parse_alphas(cx, effect, line, false);
}

fn parse_alpha255(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    parse_alphas(cx, effect, line, true);
}

fn parse_size(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = curve_arguments(cx, line) {
        effect.size.clear();
        cx.parse_floats(args, &mut effect.size);
    }
    if let Some(vary) = cx.option_float(line, "vary") {
        effect.size_vary = vary;
    }
}

fn parse_aspect(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = curve_arguments(cx, line) {
        effect.aspect_ratio.clear();
        cx.parse_floats(args, &mut effect.aspect_ratio);
    }
    if let Some(vary) = cx.option_float(line, "vary") {
        effect.aspect_ratio_vary = vary;
    }
}

fn parse_rotate(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = curve_arguments(cx, line) {
        effect.rotate.clear();
        cx.parse_floats(args, &mut effect.rotate);
    }
    if let Some(vary) = cx.option_float(line, "vary") {
        effect.rotation_vary = vary;
    }
    if let Some(offset) = cx.option_float(line, "offset") {
        effect.rotation_offset = offset;
    }
}

fn parse_stretch(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.velocity_stretch = value;
    }
}

/// Emitter shapes are kept as a box; round shapes set `SOURCE_ROUND`
fn parse_source(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    line.arguments(cx, 0);
    effect.flags.remove(ParticleFlags::SOURCE_ROUND);
    effect.torus_width = -1.0;

    let mut extent = [0.0f32; 3];
    if !line.has_flag(cx, "point") {
        if let Some(size) = cx.option_float(line, "square") {
            extent = [size, size, 0.0];
        } else if let Some(args) = line.option_arguments(cx, "quad", 1)
            && let Some([x, y]) = cx.parse_vector2(args, 0)
        {
            extent = [x, y, 0.0];
        } else if let Some(size) = cx.option_float(line, "cube") {
            extent = [size; 3];
        } else if let Some(args) = line.option_arguments(cx, "box", 1)
            && let Some(size) = cx.parse_vector3(args, 0)
        {
            extent = size;
        } else if let Some(size) = cx.option_float(line, "circle") {
            extent = [size, size, 0.0];
            effect.flags |= ParticleFlags::SOURCE_ROUND;
        } else if let Some(size) = cx.option_float(line, "sphere") {
            extent = [size; 3];
            effect.flags |= ParticleFlags::SOURCE_ROUND;
        } else if let Some(args) = line
            .option_arguments(cx, "ellipse", 1)
            .or_else(|| line.option_arguments(cx, "ellipsoid", 1))
            && let Some(size) = cx.parse_vector3(args, 0)
        {
            extent = size;
            effect.flags |= ParticleFlags::SOURCE_ROUND;
        } else if let Some(args) = line.option_arguments(cx, "ring", 2)
            && let Some(size) = cx.parse_float(args, 0)
            && let Some(width) = cx.parse_float_range(args, 1, 0.0, 1.0)
        {
            extent = [size, size, 0.0];
            effect.torus_width = width;
        } else if let Some(args) = line.option_arguments(cx, "torus", 2)
            && let Some(size) = cx.parse_vector3(args, 0)
            && let Some(width) = cx.parse_float_range(args, 1, 0.0, 1.0)
        {
            extent = size;
            effect.torus_width = width;
        }
    }

    let offset = match line.option_arguments(cx, "offset", 1) {
        Some(args) => cx.parse_vector3(args, 0).unwrap_or([0.0; 3]),
        None => [0.0; 3],
    };
    for axis in 0..3 {
        // 0 - e keeps an unused axis at +0 rather than -0
        effect.emit_volume_min[axis] = (0.0 - extent[axis]) + offset[axis];
        effect.emit_volume_max[axis] = extent[axis] + offset[axis];
    }

    if line.has_flag(cx, "scaleParticles") {
        effect.flags |= ParticleFlags::SOURCE_SCALE_PARTICLES;
    }
    if line.has_flag(cx, "resetIncoming") {
        effect.flags |= ParticleFlags::SOURCE_RESET_INCOMING;
    }
}

fn parse_emit(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    line.arguments(cx, 0);
    if let Some(speed) = option_range(cx, line, "speed") {
        effect.emit_speed = speed;
    }
    if let Some(args) = line.option_arguments(cx, "dir", 1..=2)
        && let Some(direction) = cx.parse_vector3(args, 0)
    {
        let vary = if args.len() == 2 { cx.parse_vector3(args, 1).unwrap_or([0.0; 3]) } else { [0.0; 3] };
        (effect.emit_direction_min, effect.emit_direction_max) = direction_bounds(direction, vary);
    }
    if let Some(args) = line.option_arguments(cx, "dirBounds", 2)
        && let Some(min) = cx.parse_vector3(args, 0)
        && let Some(max) = cx.parse_vector3(args, 1)
    {
        effect.emit_direction_min = min;
        effect.emit_direction_max = max;
    }
    if line.has_flag(cx, "base") {
        effect.flags |= ParticleFlags::EMIT_BASE;
    }
    if line.has_flag(cx, "scaleExisting") {
        effect.flags |= ParticleFlags::EMIT_SCALE_EXISTING;
    }
}

/// Emission direction box around `direction`, normalized unless it is
/// already of unit length
pub(super) fn direction_bounds(direction: [f32; 3], vary: [f32; 3]) -> ([f32; 3], [f32; 3]) {
    let length = direction.iter().map(|v| v * v).sum::<f32>().sqrt();
    let direction = if length > 0.0 && (length - 1.0).abs() > UNIT_TOLERANCE {
        direction.map(|v| v / length)
    } else {
        direction
    };
    (
        std::array::from_fn(|axis| direction[axis] - vary[axis]),
        std::array::from_fn(|axis| direction[axis] + vary[axis]),
    )
}

fn parse_force(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
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
    if let Some(args) = line.option_arguments(cx, "bomb", 1..=2) {
        if let Some(force) = cx.parse_float(args, 0) {
            effect.radial_force = force;
        }
        if args.len() == 2
            && let Some(location) = cx.parse_vector3(args, 1)
        {
            effect.radial_force_location = location;
        }
    }
    if let Some(value) = cx.option_float(line, "drag") {
        effect.drag = value;
    }

    let strengths = if let Some(args) = line.option_arguments(cx, "attractor", 3..) {
        if let Some(origin) = cx.parse_vector3(args, 0) {
            effect.attractor_origin = origin;
        }
        effect.flags |= ParticleFlags::ATTRACTOR | ParticleFlags::NOT_PRESET_ATTRACTOR;
        Some((args, 1))
    } else if let Some(args) = line.option_arguments(cx, "presetAttractor", 2..) {
        effect.flags |= ParticleFlags::ATTRACTOR;
        effect.flags.remove(ParticleFlags::NOT_PRESET_ATTRACTOR);
        Some((args, 0))
    } else {
        None
    };
    if let Some((args, first)) = strengths
        && let Some(range) = cx.parse_float(args, first)
    {
        effect.attractor.range = range;
        effect.attractor.strength.clear();
        for index in first + 1..args.len() {
            let Some(strength) = cx.parse_float(args, index) else {
                break;
            };
            effect.attractor.strength.push(strength);
        }
        if let Some(kill_range) = cx.option_float(line, "killRange") {
            effect.attractor.kill_range = kill_range;
        }
    }
}

/// Alpha and size blooms are stored as bytes: the base scaled to 0..255,
/// the rate to 0..16 in steps of 1/16
fn bloom_bytes(base: f32, rate: f32) -> (u8, u8) {
    let base = (base.max(0.0) * 255.0).min(255.0).round() as u8;
    let rate = ((rate * 0.0625).max(0.0) * 255.0).min(255.0).round() as u8;
    (base, rate)
}

fn parse_warp(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    line.arguments(cx, 0);
    if let Some(rate) = cx.option_float(line, "screw") {
        effect.screw_rate = rate;
        effect.flags.remove(ParticleFlags::WARP_SPIRAL);
    } else if let Some(rate) = cx.option_float(line, "spiral") {
        effect.screw_rate = rate;
        effect.flags |= ParticleFlags::WARP_SPIRAL;
    }

    if let Some(args) = line.option_arguments(cx, "wiggle", 4) {
        let rate = cx.parse_float(args, 0).unwrap_or(0.0);
        let time_rate = cx.parse_float(args, 1).unwrap_or(0.0);
        let scale = cx.parse_float(args, 2).unwrap_or(0.0);
        let ratio = cx.parse_float_range(args, 3, 0.0, 1.0).unwrap_or(0.0);
        let angle = ratio * TAU;
        effect.wiggles.push(ParticleWiggle {
            time_rate,
            rate_direction: [0.0, 0.0, rate],
            wiggle_direction: [angle.cos() * scale, -angle.sin() * scale, 0.0],
        });
    }
    if let Some(args) = line.option_arguments(cx, "wiggleDir", 2..=3) {
        let rate_direction = if args.len() == 3 { cx.parse_vector3(args, 2).unwrap_or([0.0; 3]) } else { [0.0; 3] };
        effect.wiggles.push(ParticleWiggle {
            time_rate: cx.parse_float(args, 0).unwrap_or(0.0),
            rate_direction,
            wiggle_direction: cx.parse_vector3(args, 1).unwrap_or([0.0; 3]),
        });
    }

    if let Some(args) = line.option_arguments(cx, "bloomAlpha", 2)
        && let Some(base) = cx.parse_float_range(args, 0, 0.0, 1.0)
        && let Some(rate) = cx.parse_float_range(args, 1, 0.0, 16.0)
    {
        (effect.bloom_alpha_base, effect.bloom_alpha_rate) = bloom_bytes(base, rate);
    }
    if let Some(args) = line.option_arguments(cx, "bloomSize", 2)
        && let Some(base) = cx.parse_float_range(args, 0, 0.0, 1.0)
        && let Some(rate) = cx.parse_float_range(args, 1, 0.0, 16.0)
    {
        (effect.bloom_size_base, effect.bloom_size_rate) = bloom_bytes(base, rate);
    }
}

fn parse_walk(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line, directed: bool) {
    if directed {
        if let Some(args) = curve_arguments(cx, line) {
            let curve = &mut effect.random_walk.turn_offset_curve;
            curve.clear();
            for index in 0..args.len() {
                let Some(value) = cx.parse_float_range(args, index, -1.0, 1.0) else {
                    break;
                };
                curve.push(value);
            }
        }
    } else {
        line.arguments(cx, 0);
    }
    effect.flags |= ParticleFlags::RANDOM_WALK;

    let walk = &mut effect.random_walk;
    if let Some(time) = option_range(cx, line, "delay") {
        walk.time = time;
    }
    if let Some(strength) = option_range(cx, line, "strength") {
        walk.strength = strength;
    }
    let turn = if directed { "randomTurn" } else { "turn" };
    if let Some(args) = line.option_arguments(cx, turn, 1..=2) {
        if let Some(range) = cx.parse_float(args, 0) {
            walk.turn_range = range;
        }
        if args.len() == 2
            && let Some(offset) = cx.parse_float(args, 1)
        {
            walk.turn_offset = offset;
        }
    }
    if let Some(args) = line.option_arguments(cx, "mix", 1)
        && let Some(mix) = cx.parse_float_range(args, 0, 0.0, 1.0)
    {
        walk.mix = mix;
    }

    walk.loop_type = 2;
    if directed {
        if line.has_flag(cx, "sustain") {
            walk.loop_type = 1;
        } else if line.has_flag(cx, "loop") {
            walk.loop_type = 0;
        }
    }
    if line.has_flag(cx, "wait") {
        effect.flags |= ParticleFlags::RANDOM_WALK_WAIT;
    }
}

fn parse_random_walk(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    parse_walk(cx, effect, line, false);
}

fn parse_directed_walk(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    parse_walk(cx, effect, line, true);
}

fn parse_life(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..=2)
        && let Some(life) = cx.parse_float(args, 0)
    {
        let vary = if args.len() == 2 { cx.parse_float(args, 1).unwrap_or(0.0) } else { 0.0 };
        effect.life = [life - vary, life + vary];
        effect.preroll = cx.option_float(line, "preroll").unwrap_or(life.max(0.5));
    }
    if line.has_flag(cx, "propagateAlways") {
        effect.flags |= ParticleFlags::PROPAGATE_ALWAYS;
    }
    if line.has_flag(cx, "propagateIfKilled") {
        effect.flags |= ParticleFlags::PROPAGATE_IF_KILLED;
    }
}

/// Loop, scaling, delay and trigger options shared by `rate` and `inject`
fn parse_rate_options(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.option_arguments(cx, "loop", 1..=2)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.rate_loop = value;
        effect.rate_curve_cycles = if args.len() == 2 { cx.parse_short(args, 1).unwrap_or(0) } else { 0 };
    } else if let Some(args) = line.option_arguments(cx, "single", 0..=1) {
        effect.rate_loop = if args.len() == 1 { cx.parse_float(args, 0).unwrap_or(0.1) } else { 0.1 };
        effect.rate_curve_cycles = 1;
    } else if let Some(args) = line.option_arguments(cx, "sustain", 1..=2)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.flags |= ParticleFlags::RATE_SUSTAIN;
        effect.rate_loop = value;
        effect.rate_curve_cycles = if args.len() == 2 { cx.parse_short(args, 1).unwrap_or(1) } else { 1 };
    } else if let Some(args) = line.option_arguments(cx, "hold", 1..=2)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.flags |= ParticleFlags::RATE_HOLD;
        effect.rate_loop = value;
        effect.rate_curve_cycles = if args.len() == 2 { cx.parse_short(args, 1).unwrap_or(1) } else { 1 };
    } else if let Some(args) = line.option_arguments(cx, "kill", 0..=1) {
        effect.flags |= ParticleFlags::RATE_KILL | ParticleFlags::PROPAGATE_ALWAYS;
        effect.rate_loop = if args.len() == 1 { cx.parse_float(args, 0).unwrap_or(0.1) } else { 0.1 };
        effect.rate_curve_cycles = 1;
    }

    for (name, flag) in [
        ("sizeScale", ParticleFlags::RATE_SIZE_SCALE),
        ("areaScale", ParticleFlags::RATE_AREA_SCALE),
        ("volumeScale", ParticleFlags::RATE_VOLUME_SCALE),
    ] {
        if line.has_flag(cx, name) {
            effect.flags |= flag;
        }
    }
    if let Some(value) = cx.option_float(line, "speedScale") {
        effect.rate_speed_scale = value;
    }
    parse_delay(cx, effect, line);
    if let Some(args) = line.option_arguments(cx, "trigger", 1..=2)
        && let Some(first) = cx.parse_float(args, 0)
    {
        let second = if args.len() == 2 { cx.parse_float(args, 1).unwrap_or(first) } else { first };
        effect.emit_retrigger = [first, second];
    }
}

fn parse_delay(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.option_arguments(cx, "delay", 1..=2)
        && let Some(first) = cx.parse_float(args, 0)
    {
        let second = if args.len() == 2 { cx.parse_float(args, 1).unwrap_or(first) } else { first };
        effect.emit_delay = [first, second];
    }
}

fn parse_rate(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = curve_arguments(cx, line) {
        effect.rate.clear();
        cx.parse_floats(args, &mut effect.rate);
    }
    effect.flags.remove(ParticleFlags::INJECT | ParticleFlags::MAINTAIN);
    parse_rate_options(cx, effect, line);
}

fn parse_inject(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.rate = vec![value];
    }
    effect.flags |= ParticleFlags::INJECT;
    effect.flags.remove(ParticleFlags::MAINTAIN);
    effect.rate_loop = 0.01;
    effect.rate_curve_cycles = 1;
    parse_rate_options(cx, effect, line);
}

fn parse_maintain(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.rate = vec![value];
    }
    effect.flags |= ParticleFlags::MAINTAIN;
    effect.flags.remove(ParticleFlags::INJECT);
    parse_delay(cx, effect, line);
    if line.has_flag(cx, "hold") {
        effect.flags |= ParticleFlags::RATE_HOLD;
    } else if line.has_flag(cx, "kill") {
        effect.flags |= ParticleFlags::RATE_KILL;
    }
}

fn parse_resource_options(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.option_arguments(cx, "overrideSet", 1)
        && let Some(value) = cx.parse_byte(args, 0)
    {
        effect.override_set = value as u8;
    }
    effect
        .flags
        .set(ParticleFlags::TEXTURE_ACCEPT_COMPOSITE, line.has_flag(cx, "acceptComposite"));
}

/// `-tile x [y]`; tile counts must be powers of two up to 128
fn parse_tile(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    let Some(args) = line.option_arguments(cx, "tile", 1..=2) else {
        return;
    };
    let mut tiles = [1u8; 2];
    for (index, tile) in tiles.iter_mut().enumerate().take(args.len()) {
        let Some(value) = cx.parse_ubyte(args, index) else {
            return;
        };
        if !value.is_power_of_two() {
            cx.error(args.span(index), "Tile counts must be powers of two.");
            return;
        }
        *tile = value;
    }
    if args.len() == 1 {
        tiles[1] = tiles[0];
    }
    effect.tile_count = tiles;
}

fn parse_material(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    effect.texture.draw_mode = DRAWMODE_NONE;
    effect.texture.parse(cx, line, HYPERLINK_MATERIAL);
    effect.flags.remove(ParticleFlags::MODEL);
    parse_resource_options(cx, effect, line);
}

fn parse_texture(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if effect.texture.draw_mode == DRAWMODE_NONE {
        effect.texture.draw_mode = 0;
    }
    effect.texture.parse(cx, line, HYPERLINK_TEXTURE);
    effect.flags.remove(ParticleFlags::MODEL);
    parse_tile(cx, effect, line);
    parse_resource_options(cx, effect, line);
}

/// Models cast shadows unless `-noShadow` is given
fn parse_model(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    effect.texture.draw_mode = 0;
    effect.flags |= ParticleFlags::MODEL;
    if let Some(args) = line.option_arguments(cx, "material", 1)
        && let Some(id) = cx.parse_resource(args, 0, HYPERLINK_MATERIAL)
    {
        effect.texture.resource2 = id;
        effect.texture.draw_mode = DRAWMODE_NONE;
    }
    effect
        .texture
        .parse_with_flags(cx, line, HYPERLINK_FILE, DrawFlags::SHADOW);
    parse_resource_options(cx, effect, line);
}

fn parse_frames(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    line.arguments(cx, 0);
    parse_tile(cx, effect, line);
    if let Some(speed) = cx.option_float(line, "speed") {
        effect.frame_speed = speed;
        effect.flags.remove(ParticleFlags::FRAMES_RELATIVE_SPEED);
    } else if let Some(speed) = cx.option_float(line, "relativeSpeed") {
        effect.frame_speed = speed;
        effect.flags |= ParticleFlags::FRAMES_RELATIVE_SPEED;
    }
    if let Some(args) = line.option_arguments(cx, "count", 1)
        && let Some(value) = cx.parse_byte(args, 0)
    {
        effect.frame_count = value;
    }
    if let Some(args) = line.option_arguments(cx, "start", 1)
        && let Some(value) = cx.parse_ubyte(args, 0)
    {
        effect.frame_start = value;
    }
    if let Some(args) = line.option_arguments(cx, "random", 1)
        && let Some(value) = cx.parse_byte(args, 0)
    {
        effect.frame_random = value;
    }
}

fn parse_align(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = ALIGNMENT.parse(cx, args, 0)
    {
        effect.align_mode = value as u8;
    }
}

fn parse_loop_box_color(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.loop_box_color.clear();
        cx.parse_color_rgbs(args, &mut effect.loop_box_color);
        effect.flags |= ParticleFlags::LOOP_BOX;
    }
}

fn parse_loop_box_alpha(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.loop_box_alpha.clear();
        cx.parse_floats(args, &mut effect.loop_box_alpha);
        effect.flags |= ParticleFlags::LOOP_BOX;
    }
}

fn parse_surface(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if line.has_flag(cx, "reset") {
        effect.surfaces.clear();
    }
    let mut surface = Surface::default();
    surface.parse(cx, line);
    effect.surfaces.push(surface);
    effect.flags |= ParticleFlags::SURFACES;
}

fn parse_map_emit(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP)
    {
        effect.map_emit = id;
    }
    if let Some(value) = cx.option_float(line, "belowHeight") {
        effect.altitude_range[1] = value;
        effect.flags |= ParticleFlags::MAP_EMIT_HEIGHT_RANGE;
    }
    if let Some(value) = cx.option_float(line, "aboveHeight") {
        effect.altitude_range[0] = value;
        effect.flags |= ParticleFlags::MAP_EMIT_HEIGHT_RANGE;
    }
    if let Some(args) = line.option_arguments(cx, "heightRange", 2)
        && let Some(min) = cx.parse_float(args, 0)
        && let Some(max) = cx.parse_float(args, 1)
    {
        effect.altitude_range = [min, max];
        effect.flags |= ParticleFlags::MAP_EMIT_HEIGHT_RANGE;
    }
    if line.has_flag(cx, "pinToSurface") {
        effect.flags |= ParticleFlags::MAP_EMIT_PIN_TO_SURFACE;
    }
    if line.has_flag(cx, "density") {
        effect.flags |= ParticleFlags::MAP_EMIT_DENSITY;
    }
}

fn parse_map_emit_color(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP)
    {
        effect.map_emit_color = id;
    }
}

/// The optional map argument of collision keywords; absent means terrain
fn parse_force_map(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, args: Arguments<'_>, present: bool) {
    if !present {
        effect.map_force = ResourceId::terrain();
    } else if let Some(id) = cx.parse_special_resource(args, 0, HYPERLINK_MAP) {
        effect.map_force = id;
    }
}

fn parse_kill_outside_map(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if line.has_flag(cx, "killOutsideMap") {
        effect.flags |= ParticleFlags::KILL_OUTSIDE_MAP;
    }
}

fn parse_map_collide(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 0..=1) {
        parse_force_map(cx, effect, args, args.len() == 1);
    }
    effect.flags |= ParticleFlags::MAP_COLLIDE;
    if line.has_flag(cx, "pinToMap") {
        effect.flags |= ParticleFlags::MAP_COLLIDE_PIN_TO_MAP;
        effect.map_bounce = 0.0;
    } else if let Some(bounce) = cx.option_float(line, "bounce") {
        effect.map_bounce = bounce;
    }
    parse_kill_outside_map(cx, effect, line);
    if let Some(args) = line.option_arguments(cx, "death", 1)
        && let Some(value) = cx.parse_float_range(args, 0, 0.0, 1.0)
    {
        effect.probability_death = value;
    }
}

fn parse_map_repel(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 2..=3) {
        let with_map = args.len() == 3;
        parse_force_map(cx, effect, args, with_map);
        let first = usize::from(with_map);
        if let Some(height) = cx.parse_float(args, first) {
            effect.map_repulse_height = height;
        }
        if let Some(strength) = cx.parse_float(args, first + 1) {
            effect.map_repulse_strength = strength;
        }
    }
    effect.flags |= ParticleFlags::MAP_COLLIDE | ParticleFlags::MAP_REPEL;
    if let Some(value) = cx.option_float(line, "scout") {
        effect.map_repulse_scout_distance = value;
    }
    if let Some(value) = cx.option_float(line, "vertical") {
        effect.map_repulse_vertical = value;
    }
    if let Some(value) = cx.option_float(line, "killHeight") {
        effect.map_repulse_kill_height = value;
    }
    parse_kill_outside_map(cx, effect, line);
}

fn parse_map_flow(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line, flag: ParticleFlags) {
    if let Some(args) = line.arguments(cx, 1) {
        parse_force_map(cx, effect, args, true);
    }
    effect.flags |= ParticleFlags::MAP_COLLIDE | flag;
    if let Some(strength) = cx.option_float(line, "strength") {
        effect.map_repulse_strength = strength;
    }
    parse_kill_outside_map(cx, effect, line);
}

fn parse_map_advect(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    parse_map_flow(cx, effect, line, ParticleFlags::MAP_ADVECT);
}

fn parse_map_force(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    parse_map_flow(cx, effect, line, ParticleFlags::MAP_FORCE);
}

fn parse_physics(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = PHYSICS.parse(cx, args, 0)
    {
        effect.physics_type = value as u8;
    }
}

fn parse_path(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    line.arguments(cx, 0);
    let mut point = ParticlePathPoint::default();
    point.parse(cx, line, effect.path_points.last());
    effect.path_points.push(point);
    effect.flags |= ParticleFlags::PATH;
}

/// Sets the unnamed bits of the high word; named bits are only changed by
/// their own keywords
fn parse_flags(cx: &mut ParseContext<'_>, effect: &mut ParticleEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_uint(args, 0)
    {
        let named = effect.flags & ParticleFlags::all();
        let unnamed = (u64::from(value) << 32) & !ParticleFlags::all().bits();
        effect.flags = ParticleFlags::from_bits_retain(unnamed) | named;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_bytes() {
        assert_eq!(bloom_bytes(1.0, 16.0), (255, 255));
        assert_eq!(bloom_bytes(0.5, 8.0), (128, 128));
        assert_eq!(bloom_bytes(0.0, 0.0), (0, 0));
    }

    #[test]
    fn test_grammar_keywords() {
        for keyword in ["source", "emit", "rate", "inject", "maintain", "mapRepel", "path", "flags"] {
            assert!(GRAMMAR.contains(keyword), "{keyword}");
        }
        assert!(!GRAMMAR.contains("sustain"));
    }
}
