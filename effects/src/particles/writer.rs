use pfx_argscript::{ArgScriptEnum, ArgScriptWriter, is_default, is_default_color, is_default_with};

use super::parser::direction_bounds;
use super::{ALIGNMENT, PHYSICS, ParticleEffect, ParticleFlags};
use crate::directory::{EffectDirectory, map_name};

const NO_KILL_HEIGHT: f32 = -1e9;
const ALTITUDE_MIN: f32 = -10000.0;
const ALTITUDE_MAX: f32 = 10000.0;

/// Write the block body. Lines whose fields hold their defaults are skipped.
pub(super) fn write(effect: &ParticleEffect, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
    write_curves(effect, writer);
    write_source(effect, writer);
    write_emit(effect, writer);
    write_force(effect, writer);
    write_warp(effect, writer);
    write_walk(effect, writer);
    if effect.velocity_stretch != 0.0 {
        writer.command("stretch").floats([effect.velocity_stretch]);
    }
    write_life(effect, writer);
    write_rate(effect, writer);
    let tile_written = write_resource(effect, writer);
    write_frames(effect, writer, tile_written);
    write_enum(writer, "align", effect.align_mode, &ALIGNMENT);

    if !effect.loop_box_color.is_empty() {
        writer.command("loopBoxColor").colors(effect.loop_box_color.iter().copied());
    }
    if !effect.loop_box_alpha.is_empty() {
        writer.command("loopBoxAlpha").floats(effect.loop_box_alpha.iter().copied());
    }
    for surface in &effect.surfaces {
        writer.command("surface");
        surface.write(writer, directory);
    }

    write_maps(effect, writer, directory);
    write_enum(writer, "physics", effect.physics_type, &PHYSICS);
    for point in &effect.path_points {
        point.write(writer);
    }

    let unnamed = effect.unnamed_flags() >> 32;
    if unnamed != 0 {
        writer.command("flags").arguments([format!("0x{unnamed:x}")]);
    }
}

/// `mid [vary]` from a min/max pair
fn write_range(writer: &mut ArgScriptWriter, range: [f32; 2]) {
    let (mid, vary) = split_range(range);
    writer.floats([mid]);
    if vary != 0.0 {
        writer.floats([vary]);
    }
}

/// Midpoint and half width of a range, nudged by a few ulps when the plain
/// midpoint would not give back `min` and `max` exactly
fn split_range([min, max]: [f32; 2]) -> (f32, f32) {
    const STEPS: [i32; 5] = [0, -1, 1, -2, 2];
    let (low, high) = (f64::from(min), f64::from(max));
    let vary = ((high - low) / 2.0) as f32;
    let mid = ((low + high) / 2.0) as f32;
    if vary == 0.0 {
        return (mid, 0.0);
    }
    for mid_step in STEPS {
        for vary_step in STEPS {
            let (m, v) = (nudge(mid, mid_step), nudge(vary, vary_step));
            if m - v == min && m + v == max {
                return (m, v);
            }
        }
    }
    (mid, vary)
}

/// `value` moved by `steps` representable floats away from or towards zero
fn nudge(value: f32, steps: i32) -> f32 {
    if steps == 0 || value == 0.0 || !value.is_finite() {
        return value;
    }
    let moved = value.to_bits().checked_add_signed(steps).map(f32::from_bits);
    match moved {
        Some(moved) if moved.is_finite() && moved.is_sign_negative() == value.is_sign_negative() => moved,
        _ => value,
    }
}

fn write_enum(writer: &mut ArgScriptWriter, keyword: &str, value: u8, names: &ArgScriptEnum) {
    if value == 0 {
        return;
    }
    writer.command(keyword);
    match names.name_of(value.into()) {
        Some(name) => writer.arguments([name]),
        None => writer.ints([i32::from(value)]),
    };
}

fn write_curves(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    let vary_rgb = effect.flags.contains(ParticleFlags::COLOR_VARY_RGB);
    if !is_default_color(&effect.color) || !effect.color_vary.is_black() || vary_rgb {
        writer.command("color").colors(effect.color.iter().copied());
        if vary_rgb {
            writer.option("varyRGB").color(effect.color_vary);
        } else if !effect.color_vary.is_black() {
            writer.option("vary").color(effect.color_vary);
        }
    }

    for (keyword, curve, vary) in [
        ("alpha", &effect.alpha, effect.alpha_vary),
        ("size", &effect.size, effect.size_vary),
        ("aspect", &effect.aspect_ratio, effect.aspect_ratio_vary),
    ] {
        if !is_default(curve) || vary != 0.0 {
            writer.command(keyword).floats(curve.iter().copied());
            if vary != 0.0 {
                writer.option("vary").floats([vary]);
            }
        }
    }

    if !is_default_with(&effect.rotate, 0.0) || effect.rotation_vary != 0.0 || effect.rotation_offset != 0.0 {
        writer.command("rotate").floats(effect.rotate.iter().copied());
        if effect.rotation_vary != 0.0 {
            writer.option("vary").floats([effect.rotation_vary]);
        }
        if effect.rotation_offset != 0.0 {
            writer.option("offset").floats([effect.rotation_offset]);
        }
    }
}

fn write_source(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    let min = effect.emit_volume_min;
    let max = effect.emit_volume_max;
    let split: [(f32, f32); 3] = std::array::from_fn(|axis| split_range([min[axis], max[axis]]));
    let half = split.map(|(_, half)| half);
    let offset = split.map(|(offset, _)| offset);
    let round = effect.flags.contains(ParticleFlags::SOURCE_ROUND);
    let torus = effect.torus_width != -1.0;
    let scale_particles = effect.flags.contains(ParticleFlags::SOURCE_SCALE_PARTICLES);
    let reset_incoming = effect.flags.contains(ParticleFlags::SOURCE_RESET_INCOMING);

    let empty = half == [0.0; 3];
    if empty && offset == [0.0; 3] && !round && !torus && !scale_particles && !reset_incoming {
        return;
    }

    let [x, y, z] = half;
    writer.command("source");
    if round {
        if z == 0.0 && x == y {
            writer.option("circle").floats([x]);
        } else if x == y && y == z {
            writer.option("sphere").floats([x]);
        } else {
            writer.option("ellipse").vector(&half);
        }
    } else if torus {
        if z == 0.0 && x == y {
            writer.option("ring").floats([x, effect.torus_width]);
        } else {
            writer.option("torus").vector(&half).floats([effect.torus_width]);
        }
    } else if empty {
        writer.option("point");
    } else if z == 0.0 {
        if x == y {
            writer.option("square").floats([x]);
        } else {
            writer.option("quad").vector(&[x, y]);
        }
    } else if x == y && y == z {
        writer.option("cube").floats([x]);
    } else {
        writer.option("box").vector(&half);
    }

    if offset != [0.0; 3] {
        writer.option("offset").vector(&offset);
    }
    writer.flag("scaleParticles", scale_particles);
    writer.flag("resetIncoming", reset_incoming);
}

fn write_emit(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    const DEFAULT_DIRECTION: [f32; 3] = [0.0, 0.0, 1.0];
    let directed = effect.emit_direction_min != DEFAULT_DIRECTION || effect.emit_direction_max != DEFAULT_DIRECTION;
    let base = effect.flags.contains(ParticleFlags::EMIT_BASE);
    let scale_existing = effect.flags.contains(ParticleFlags::EMIT_SCALE_EXISTING);
    if effect.emit_speed == [0.0; 2] && !directed && !base && !scale_existing {
        return;
    }

    writer.command("emit");
    if effect.emit_speed != [0.0; 2] {
        writer.option("speed");
        write_range(writer, effect.emit_speed);
    }
    if directed {
        let min = effect.emit_direction_min;
        let max = effect.emit_direction_max;
        let split: [(f32, f32); 3] = std::array::from_fn(|axis| split_range([min[axis], max[axis]]));
        let direction = split.map(|(direction, _)| direction);
        let vary = split.map(|(_, vary)| vary);
        // -dir normalizes, so boxes it cannot rebuild exactly are written raw
        if direction_bounds(direction, vary) == (min, max) {
            writer.option("dir").vector(&direction);
            if vary != [0.0; 3] {
                writer.vector(&vary);
            }
        } else {
            writer.option("dirBounds").vector(&min).vector(&max);
        }
    }
    writer.flag("base", base);
    writer.flag("scaleExisting", scale_existing);
}

fn write_force(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    let attractor = effect.flags.contains(ParticleFlags::ATTRACTOR);
    let bomb = effect.radial_force != 0.0 || effect.radial_force_location != [0.0; 3];
    if effect.direction_forces == [0.0; 3]
        && effect.wind_strength == 0.0
        && effect.gravity_strength == 0.0
        && effect.drag == 0.0
        && !bomb
        && !attractor
    {
        return;
    }

    writer.command("force");
    let [x, y, z] = effect.direction_forces;
    if x == 0.0 && y == 0.0 && z != 0.0 {
        writer.option("gravity").floats([-z]);
    } else if effect.direction_forces != [0.0; 3] {
        let length = (x * x + y * y + z * z).sqrt();
        writer.option("wind").vector(&[x / length, y / length, z / length]);
        if (length - 1.0).abs() > f32::EPSILON {
            writer.floats([length]);
        }
    }
    if effect.wind_strength != 0.0 {
        writer.option("worldWind").floats([effect.wind_strength]);
    }
    if effect.gravity_strength != 0.0 {
        writer.option("worldGravity").floats([effect.gravity_strength]);
    }
    if bomb {
        writer.option("bomb").floats([effect.radial_force]);
        if effect.radial_force_location != [0.0; 3] {
            writer.vector(&effect.radial_force_location);
        }
    }
    if effect.drag != 0.0 {
        writer.option("drag").floats([effect.drag]);
    }
    if attractor {
        if effect.flags.contains(ParticleFlags::NOT_PRESET_ATTRACTOR) {
            writer.option("attractor").vector(&effect.attractor_origin);
        } else {
            writer.option("presetAttractor");
        }
        writer
            .floats([effect.attractor.range])
            .floats(effect.attractor.strength.iter().copied());
        if effect.attractor.kill_range != 0.0 {
            writer.option("killRange").floats([effect.attractor.kill_range]);
        }
    }
}

/// Inverse of the byte packing done when parsing `-bloomAlpha` and `-bloomSize`
fn bloom_values(base: u8, rate: u8) -> [f32; 2] {
    [f32::from(base) / 255.0, f32::from(rate) / 255.0 / 0.0625]
}

fn write_warp(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    let spiral = effect.flags.contains(ParticleFlags::WARP_SPIRAL);
    let bloom_alpha = effect.bloom_alpha_base != 255 || effect.bloom_alpha_rate != 0;
    let bloom_size = effect.bloom_size_base != 255 || effect.bloom_size_rate != 0;
    if effect.screw_rate != 0.0 || spiral || bloom_alpha || bloom_size {
        writer.command("warp");
        if spiral {
            writer.option("spiral").floats([effect.screw_rate]);
        } else if effect.screw_rate != 0.0 {
            writer.option("screw").floats([effect.screw_rate]);
        }
        if bloom_alpha {
            writer
                .option("bloomAlpha")
                .floats(bloom_values(effect.bloom_alpha_base, effect.bloom_alpha_rate));
        }
        if bloom_size {
            writer
                .option("bloomSize")
                .floats(bloom_values(effect.bloom_size_base, effect.bloom_size_rate));
        }
    }

    for wiggle in &effect.wiggles {
        writer
            .command("warp")
            .option("wiggleDir")
            .floats([wiggle.time_rate])
            .vector(&wiggle.wiggle_direction);
        if wiggle.rate_direction != [0.0; 3] {
            writer.vector(&wiggle.rate_direction);
        }
    }
}

fn write_walk(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    if !effect.flags.contains(ParticleFlags::RANDOM_WALK) {
        return;
    }
    let walk = &effect.random_walk;
    let directed = !walk.turn_offset_curve.is_empty() || walk.loop_type != 2;
    if directed {
        writer
            .command("directedWalk")
            .floats(walk.turn_offset_curve.iter().copied());
    } else {
        writer.command("randomWalk");
    }

    if walk.time != [0.0; 2] {
        writer.option("delay");
        write_range(writer, walk.time);
    }
    if walk.strength != [0.0; 2] {
        writer.option("strength");
        write_range(writer, walk.strength);
    }
    if walk.turn_range != 0.0 || walk.turn_offset != 0.0 {
        writer
            .option(if directed { "randomTurn" } else { "turn" })
            .floats([walk.turn_range]);
        if walk.turn_offset != 0.0 {
            writer.floats([walk.turn_offset]);
        }
    }
    if walk.mix != 0.0 {
        writer.option("mix").floats([walk.mix]);
    }
    if directed {
        writer.flag("sustain", walk.loop_type == 1);
        writer.flag("loop", walk.loop_type == 0);
    }
    writer.flag("wait", effect.flags.contains(ParticleFlags::RANDOM_WALK_WAIT));
}

fn write_life(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    let always = effect.flags.contains(ParticleFlags::PROPAGATE_ALWAYS);
    let if_killed = effect.flags.contains(ParticleFlags::PROPAGATE_IF_KILLED);
    if effect.life == [0.0; 2] && effect.preroll == 0.0 && !always && !if_killed {
        return;
    }

    writer.command("life");
    write_range(writer, effect.life);
    let (mid, _) = split_range(effect.life);
    if effect.preroll != mid.max(0.5) {
        writer.option("preroll").floats([effect.preroll]);
    }
    writer.flag("propagateAlways", always);
    writer.flag("propagateIfKilled", if_killed);
}

const RATE_OPTION_FLAGS: [(&str, ParticleFlags); 3] = [
    ("sizeScale", ParticleFlags::RATE_SIZE_SCALE),
    ("areaScale", ParticleFlags::RATE_AREA_SCALE),
    ("volumeScale", ParticleFlags::RATE_VOLUME_SCALE),
];

fn write_rate(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    let first = effect.rate.first().copied().unwrap_or(0.0);
    if effect.flags.contains(ParticleFlags::MAINTAIN) {
        writer.command("maintain").floats([first]);
        write_delay(writer, "delay", effect.emit_delay);
        if effect.flags.contains(ParticleFlags::RATE_HOLD) {
            writer.option("hold");
        } else if effect.flags.contains(ParticleFlags::RATE_KILL) {
            writer.option("kill");
        }
        return;
    }

    let inject = effect.flags.contains(ParticleFlags::INJECT);
    if inject {
        writer.command("inject").floats([first]);
    } else {
        let loop_flags = ParticleFlags::RATE_SUSTAIN
            | ParticleFlags::RATE_HOLD
            | ParticleFlags::RATE_KILL
            | ParticleFlags::RATE_SIZE_SCALE
            | ParticleFlags::RATE_AREA_SCALE
            | ParticleFlags::RATE_VOLUME_SCALE;
        if effect.rate.is_empty()
            && effect.rate_loop == 0.0
            && effect.rate_curve_cycles == 0
            && effect.rate_speed_scale == 0.0
            && effect.emit_delay == [-1.0; 2]
            && effect.emit_retrigger == [-1.0; 2]
            && !effect.flags.intersects(loop_flags)
        {
            return;
        }
        writer.command("rate").floats(effect.rate.iter().copied());
    }

    for (name, flag) in RATE_OPTION_FLAGS {
        writer.flag(name, effect.flags.contains(flag));
    }

    let cycles = effect.rate_curve_cycles;
    if effect.flags.contains(ParticleFlags::RATE_SUSTAIN) {
        writer.option("sustain").floats([effect.rate_loop]);
        if cycles != 1 {
            writer.ints([i32::from(cycles)]);
        }
    } else if effect.flags.contains(ParticleFlags::RATE_HOLD) {
        writer.option("hold").floats([effect.rate_loop]);
        if cycles != 1 {
            writer.ints([i32::from(cycles)]);
        }
    } else if effect.flags.contains(ParticleFlags::RATE_KILL) {
        writer.option("kill");
        if effect.rate_loop != 0.1 {
            writer.floats([effect.rate_loop]);
        }
    } else if cycles == 1 {
        // inject implies a single 0.01 second burst
        if !(inject && effect.rate_loop == 0.01) {
            writer.option("single");
            if effect.rate_loop != 0.1 {
                writer.floats([effect.rate_loop]);
            }
        }
    } else if inject || effect.rate_loop != 0.0 || cycles != 0 {
        // inject resets the loop to a single burst, so it needs -loop even at zero
        writer.option("loop").floats([effect.rate_loop]);
        if cycles != 0 {
            writer.ints([i32::from(cycles)]);
        }
    }

    if effect.rate_speed_scale != 0.0 {
        writer.option("speedScale").floats([effect.rate_speed_scale]);
    }
    write_delay(writer, "delay", effect.emit_delay);
    write_delay(writer, "trigger", effect.emit_retrigger);
}

fn write_delay(writer: &mut ArgScriptWriter, name: &str, [first, second]: [f32; 2]) {
    if first == -1.0 && second == -1.0 {
        return;
    }
    writer.option(name).floats([first]);
    if second != first {
        writer.floats([second]);
    }
}

fn write_override_set(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    if effect.override_set != 0 {
        writer
            .option("overrideSet")
            .ints([i32::from(effect.override_set as i8)]);
    }
}

fn write_tile(effect: &ParticleEffect, writer: &mut ArgScriptWriter) {
    let [x, y] = effect.tile_count;
    writer.option("tile").ints([i32::from(x)]);
    if y != x {
        writer.ints([i32::from(y)]);
    }
}

/// The `model`, `material` or `texture` line. Returns whether `-tile` was
/// written on it.
fn write_resource(effect: &ParticleEffect, writer: &mut ArgScriptWriter) -> bool {
    let texture = &effect.texture;
    let material = effect.uses_material();
    let accept_composite = effect.flags.contains(ParticleFlags::TEXTURE_ACCEPT_COMPOSITE);
    let mut tile_written = false;

    if effect.flags.contains(ParticleFlags::MODEL) {
        writer.command("model");
        if !texture.resource.is_default() {
            writer.arguments([texture.resource]);
        }
        if material {
            if !texture.resource2.is_default() {
                writer.option("material").arguments([texture.resource2]);
            }
        } else {
            texture.write_draw(writer);
        }
        write_override_set(effect, writer);
        texture.write_render(writer, true);
    } else if !texture.is_default() || effect.override_set != 0 || accept_composite {
        if material {
            texture.write("material", writer);
        } else {
            texture.write("texture", writer);
            if effect.tile_count != [1, 1] {
                write_tile(effect, writer);
                tile_written = true;
            }
        }
        write_override_set(effect, writer);
    } else {
        return false;
    }
    writer.flag("acceptComposite", accept_composite);
    tile_written
}

fn write_frames(effect: &ParticleEffect, writer: &mut ArgScriptWriter, tile_written: bool) {
    let relative = effect.flags.contains(ParticleFlags::FRAMES_RELATIVE_SPEED);
    let tile = !tile_written && effect.tile_count != [1, 1];
    if effect.frame_count == 0
        && effect.frame_speed == 0.0
        && effect.frame_start == 0
        && effect.frame_random == 0
        && !relative
        && !tile
    {
        return;
    }

    writer.command("frames");
    if tile {
        write_tile(effect, writer);
    }
    if relative {
        writer.option("relativeSpeed").floats([effect.frame_speed]);
    } else if effect.frame_speed != 0.0 {
        writer.option("speed").floats([effect.frame_speed]);
    }
    if effect.frame_count != 0 {
        writer.option("count").ints([i32::from(effect.frame_count)]);
    }
    if effect.frame_start != 0 {
        writer.option("start").ints([i32::from(effect.frame_start)]);
    }
    if effect.frame_random != 0 {
        writer.option("random").ints([i32::from(effect.frame_random)]);
    }
}

fn write_maps(effect: &ParticleEffect, writer: &mut ArgScriptWriter, directory: &dyn EffectDirectory) {
    let flags = effect.flags;
    let height_range = flags.contains(ParticleFlags::MAP_EMIT_HEIGHT_RANGE);
    let pin = flags.contains(ParticleFlags::MAP_EMIT_PIN_TO_SURFACE);
    let density = flags.contains(ParticleFlags::MAP_EMIT_DENSITY);
    if !effect.map_emit.is_default() || height_range || pin || density {
        writer
            .command("mapEmit")
            .arguments([map_name(directory, effect.map_emit)]);
        if height_range {
            let [min, max] = effect.altitude_range;
            if min == ALTITUDE_MIN {
                writer.option("belowHeight").floats([max]);
            } else if max == ALTITUDE_MAX {
                writer.option("aboveHeight").floats([min]);
            } else {
                writer.option("heightRange").floats([min, max]);
            }
        }
        writer.flag("pinToSurface", pin);
        writer.flag("density", density);
    }
    if !effect.map_emit_color.is_default() {
        writer
            .command("mapEmitColor")
            .arguments([map_name(directory, effect.map_emit_color)]);
    }

    let kill_outside = flags.contains(ParticleFlags::KILL_OUTSIDE_MAP);
    if flags.contains(ParticleFlags::MAP_COLLIDE) {
        writer.command("mapCollide");
        if !effect.map_force.is_zero() {
            writer.arguments([map_name(directory, effect.map_force)]);
        }
        if flags.contains(ParticleFlags::MAP_COLLIDE_PIN_TO_MAP) {
            writer.option("pinToMap");
        } else if effect.map_bounce != 1.0 {
            writer.option("bounce").floats([effect.map_bounce]);
        }
        writer.flag("killOutsideMap", kill_outside);
        if effect.probability_death != 0.0 {
            writer.option("death").floats([effect.probability_death]);
        }
    }
    if flags.contains(ParticleFlags::MAP_REPEL) {
        writer.command("mapRepel");
        if !effect.map_force.is_zero() {
            writer.arguments([map_name(directory, effect.map_force)]);
        }
        writer.floats([effect.map_repulse_height, effect.map_repulse_strength]);
        if effect.map_repulse_scout_distance != 0.0 {
            writer.option("scout").floats([effect.map_repulse_scout_distance]);
        }
        if effect.map_repulse_vertical != 0.0 {
            writer.option("vertical").floats([effect.map_repulse_vertical]);
        }
        if effect.map_repulse_kill_height != NO_KILL_HEIGHT {
            writer.option("killHeight").floats([effect.map_repulse_kill_height]);
        }
        writer.flag("killOutsideMap", kill_outside);
    }
    for (keyword, flag) in [("mapAdvect", ParticleFlags::MAP_ADVECT), ("mapForce", ParticleFlags::MAP_FORCE)] {
        if flags.contains(flag) {
            writer
                .command(keyword)
                .arguments([map_name(directory, effect.map_force)]);
            if effect.map_repulse_strength != 0.0 {
                writer.option("strength").floats([effect.map_repulse_strength]);
            }
            writer.flag("killOutsideMap", kill_outside);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_values() {
        assert_eq!(bloom_values(255, 255), [1.0, 16.0]);
        assert_eq!(bloom_values(0, 0), [0.0, 0.0]);
    }

    #[test]
    fn test_write_range() {
        let mut writer = ArgScriptWriter::new();
        write_range(&mut writer, [1.0, 3.0]);
        write_range(&mut writer, [2.0, 2.0]);
        assert_eq!(writer.finish(), "2 1 2");
    }

    #[test]
    fn test_split_range_is_exact() {
        for (value, vary) in [(1.0f32, 0.81f32), (0.3, 0.11), (-0.74, 4.56), (123.45, 0.001), (-1.3, 1.4)] {
            let range = [value - vary, value + vary];
            let (mid, half) = split_range(range);
            assert_eq!([mid - half, mid + half], range, "{value} {vary}");
        }
    }

    #[test]
    fn test_nudge() {
        assert_eq!(nudge(1.0, 1), f32::from_bits(1.0f32.to_bits() + 1));
        assert_eq!(nudge(-1.0, -1), f32::from_bits((-1.0f32).to_bits() - 1));
        assert_eq!(nudge(0.0, 2), 0.0);
        assert_eq!(nudge(f32::MAX, 1), f32::MAX);
    }
}
