//! Sub-records owned by a particle effect

use std::sync::LazyLock;

use pfx_argscript::{ArgScriptWriter, Arguments, Line};
use pfx_struct::{Endian, Structure, Structured};

use crate::context::ParseContext;

/// One oscillation added by `warp -wiggle` or `warp -wiggleDir`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParticleWiggle {
    pub time_rate: f32,
    pub rate_direction: [f32; 3],
    pub wiggle_direction: [f32; 3],
}

static WIGGLE: LazyLock<Structure<ParticleWiggle>> = LazyLock::new(|| {
    Structure::builder("ParticleWiggle", Endian::Big)
        .scalar("timeRate", |s: &ParticleWiggle| &s.time_rate, |s| &mut s.time_rate)
        .array("rateDirection", |s| &s.rate_direction, |s| &mut s.rate_direction)
        .endian(Endian::Little)
        .array("wiggleDirection", |s| &s.wiggle_direction, |s| &mut s.wiggle_direction)
        .endian(Endian::Little)
        .build()
});

impl Structured for ParticleWiggle {
    fn structure() -> &'static Structure<Self> {
        &WIGGLE
    }
}

/// Parameters of `randomWalk` and `directedWalk`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParticleRandomWalk {
    /// Delay between turns, min and max
    pub time: [f32; 2],
    pub strength: [f32; 2],
    pub turn_range: f32,
    pub turn_offset: f32,
    pub mix: f32,
    /// Only directed walks have a curve
    pub turn_offset_curve: Vec<f32>,
    /// 0 loops the curve, 1 sustains its end, 2 plays it once
    pub loop_type: u8,
}

static RANDOM_WALK: LazyLock<Structure<ParticleRandomWalk>> = LazyLock::new(|| {
    Structure::builder("ParticleRandomWalk", Endian::Big)
        .array("time", |s: &ParticleRandomWalk| &s.time, |s| &mut s.time)
        .endian(Endian::Little)
        .array("strength", |s| &s.strength, |s| &mut s.strength)
        .endian(Endian::Little)
        .scalar("turnRange", |s| &s.turn_range, |s| &mut s.turn_range)
        .scalar("turnOffset", |s| &s.turn_offset, |s| &mut s.turn_offset)
        .scalar("mix", |s| &s.mix, |s| &mut s.mix)
        .list("turnOffsetCurve", |s| &s.turn_offset_curve, |s| &mut s.turn_offset_curve)
        .scalar("loopType", |s| &s.loop_type, |s| &mut s.loop_type)
        .build()
});

impl Structured for ParticleRandomWalk {
    fn structure() -> &'static Structure<Self> {
        &RANDOM_WALK
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParticleAttractor {
    pub strength: Vec<f32>,
    pub range: f32,
    pub kill_range: f32,
}

static ATTRACTOR: LazyLock<Structure<ParticleAttractor>> = LazyLock::new(|| {
    Structure::builder("ParticleAttractor", Endian::Big)
        .list("attractorStrength", |s: &ParticleAttractor| &s.strength, |s| &mut s.strength)
        .scalar("range", |s| &s.range, |s| &mut s.range)
        .scalar("killRange", |s| &s.kill_range, |s| &mut s.kill_range)
        .build()
});

impl Structured for ParticleAttractor {
    fn structure() -> &'static Structure<Self> {
        &ATTRACTOR
    }
}

/// A point of a particle path; one `path` line each
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParticlePathPoint {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub time: f32,
}

static PATH_POINT: LazyLock<Structure<ParticlePathPoint>> = LazyLock::new(|| {
    Structure::builder("ParticlePathPoint", Endian::Big)
        .array("position", |s: &ParticlePathPoint| &s.position, |s| &mut s.position)
        .endian(Endian::Little)
        .array("velocity", |s| &s.velocity, |s| &mut s.velocity)
        .endian(Endian::Little)
        .scalar("time", |s| &s.time, |s| &mut s.time)
        .build()
});

impl Structured for ParticlePathPoint {
    fn structure() -> &'static Structure<Self> {
        &PATH_POINT
    }
}

impl ParticlePathPoint {
    /// Apply the options of a `path` line. `-deltaPosition` and `-deltaTime`
    /// are relative to `previous`, or to the origin for the first point.
    pub fn parse(&mut self, cx: &mut ParseContext<'_>, line: &Line, previous: Option<&ParticlePathPoint>) {
        if let Some(args) = option_alias(cx, line, "p", "position", 1)
            && let Some(position) = cx.parse_vector3(args, 0)
        {
            self.position = position;
        }
        if let Some(args) = option_alias(cx, line, "v", "velocity", 1)
            && let Some(velocity) = cx.parse_vector3(args, 0)
        {
            self.velocity = velocity;
        }
        if let Some(args) = option_alias(cx, line, "s", "speed", 1)
            && let Some(speed) = cx.parse_float(args, 0)
        {
            self.velocity = [speed; 3];
        }
        if let Some(args) = option_alias(cx, line, "t", "time", 1)
            && let Some(time) = cx.parse_float(args, 0)
        {
            self.time = time;
        }
        if let Some(args) = option_alias(cx, line, "dp", "deltaPosition", 1)
            && let Some(delta) = cx.parse_vector3(args, 0)
        {
            let origin = previous.map_or([0.0; 3], |point| point.position);
            self.position = [origin[0] + delta[0], origin[1] + delta[1], origin[2] + delta[2]];
        }
        if let Some(args) = option_alias(cx, line, "dt", "deltaTime", 1)
            && let Some(delta) = cx.parse_float(args, 0)
        {
            self.time = previous.map_or(0.0, |point| point.time) + delta;
        }
    }

    pub fn write(&self, writer: &mut ArgScriptWriter) {
        writer.command("path").option("p").vector(&self.position);
        let [x, y, z] = self.velocity;
        if x == y && y == z {
            writer.option("s").floats([x]);
        } else {
            writer.option("v").vector(&self.velocity);
        }
        writer.option("t").floats([self.time]);
    }
}

/// Arguments of option `short`, else of `long`
fn option_alias<'l>(
    cx: &mut ParseContext<'_>,
    line: &'l Line,
    short: &str,
    long: &str,
    count: usize,
) -> Option<Arguments<'l>> {
    line.option_arguments(cx, short, count)
        .or_else(|| line.option_arguments(cx, long, count))
}
