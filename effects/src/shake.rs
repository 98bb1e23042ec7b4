//! Camera shake component

use std::sync::LazyLock;

use pfx_argscript::{ArgScriptEnum, ArgScriptWriter, Line, ParserTable};
use pfx_struct::{Endian, Structure, Structured};

use crate::component::{ComponentParser, EffectComponent, UsedElement, flag_scalar, grammar};
use crate::context::ParseContext;
use crate::directory::EffectDirectory;

bitflags::bitflags! {
    /// Shake flags; bits outside the known set are kept as written
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShakeFlags: u32 {
        /// Falloff is measured in 3D rather than on the ground plane
        const FALLOFF_3D = 0x1;
    }
}

flag_scalar!(ShakeFlags, u32);

pub const TABLE: ArgScriptEnum = ArgScriptEnum::new(&[("random", 0), ("sineY", 1)]);

#[derive(Debug, Clone, PartialEq)]
pub struct ShakeEffect {
    pub flags: ShakeFlags,
    pub life: f32,
    pub fade: f32,
    pub strength: Vec<f32>,
    pub frequency: Vec<f32>,
    pub aspect_ratio: f32,
    pub table: i8,
    pub falloff: f32,
}

impl Default for ShakeEffect {
    fn default() -> Self {
        Self {
            flags: ShakeFlags::empty(),
            life: 0.0,
            fade: 1.0,
            strength: Vec::new(),
            frequency: Vec::new(),
            aspect_ratio: 1.0,
            table: 0,
            falloff: 0.0,
        }
    }
}

static STRUCTURE: LazyLock<Structure<ShakeEffect>> = LazyLock::new(|| {
    Structure::builder("ShakeEffect", Endian::Big)
        .scalar("flags", |s: &ShakeEffect| &s.flags, |s| &mut s.flags)
        .scalar("lifeTime", |s| &s.life, |s| &mut s.life)
        .scalar("fadeTime", |s| &s.fade, |s| &mut s.fade)
        .list("strength", |s| &s.strength, |s| &mut s.strength)
        .list("frequency", |s| &s.frequency, |s| &mut s.frequency)
        .scalar("aspectRatio", |s| &s.aspect_ratio, |s| &mut s.aspect_ratio)
        .scalar("baseTableType", |s| &s.table, |s| &mut s.table)
        .scalar("falloff", |s| &s.falloff, |s| &mut s.falloff)
        .build()
});

impl Structured for ShakeEffect {
    fn structure() -> &'static Structure<Self> {
        &STRUCTURE
    }
}

static GRAMMAR: LazyLock<ParserTable<ComponentParser<ShakeEffect>>> = LazyLock::new(|| {
    grammar(&[
        ("flags", parse_flags),
        ("length", parse_length),
        ("amplitude", parse_amplitude),
        ("frequency", parse_frequency),
        ("shakeAspect", parse_aspect),
        ("table", parse_table),
    ])
});

/// Sets the unnamed bits; named bits are only changed by their own options
fn parse_flags(cx: &mut ParseContext<'_>, effect: &mut ShakeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_int(args, 0)
    {
        let known = effect.flags & ShakeFlags::all();
        effect.flags = ShakeFlags::from_bits_retain(value as u32 & !ShakeFlags::all().bits()) | known;
    }
}

fn parse_length(cx: &mut ParseContext<'_>, effect: &mut ShakeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.life = value;
    }
    if let Some(args) = line.option_arguments(cx, "fade", 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.fade = value;
    }
}

fn parse_amplitude(cx: &mut ParseContext<'_>, effect: &mut ShakeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 0..) {
        effect.strength.clear();
        cx.parse_floats(args, &mut effect.strength);
    }
    if let Some(args) = line.option_arguments(cx, "falloff", 1) {
        effect.falloff = cx.parse_float(args, 0).unwrap_or(0.0);
    } else if let Some(args) = line.option_arguments(cx, "falloff3D", 1) {
        effect.falloff = cx.parse_float(args, 0).unwrap_or(0.0);
        effect.flags |= ShakeFlags::FALLOFF_3D;
    }
}

fn parse_frequency(cx: &mut ParseContext<'_>, effect: &mut ShakeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.frequency.clear();
        cx.parse_floats(args, &mut effect.frequency);
    }
}

fn parse_aspect(cx: &mut ParseContext<'_>, effect: &mut ShakeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.aspect_ratio = value;
    }
}

fn parse_table(cx: &mut ParseContext<'_>, effect: &mut ShakeEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = TABLE.parse(cx, args, 0)
    {
        effect.table = value as i8;
    }
}

impl EffectComponent for ShakeEffect {
    const KEYWORD: &'static str = "shake";
    const TYPE_CODE: u16 = 0x06;
    const MIN_VERSION: i32 = 2;
    const MAX_VERSION: i32 = 2;

    fn with_version(_version: i32) -> Self {
        Self::default()
    }

    fn version(&self) -> i32 {
        Self::MAX_VERSION
    }

    fn grammar() -> &'static ParserTable<ComponentParser<Self>> {
        &GRAMMAR
    }

    fn write_argscript(&self, writer: &mut ArgScriptWriter, _directory: &dyn EffectDirectory) {
        if self.life != 0.0 || self.fade != 1.0 {
            writer.command("length").floats([self.life]);
            if self.fade != 1.0 {
                writer.option("fade").floats([self.fade]);
            }
        }

        let falloff_3d = self.flags.contains(ShakeFlags::FALLOFF_3D);
        if !self.strength.is_empty() || self.falloff != 0.0 || falloff_3d {
            writer.command("amplitude").floats(self.strength.iter().copied());
            if self.falloff != 0.0 || falloff_3d {
                writer
                    .option(if falloff_3d { "falloff3D" } else { "falloff" })
                    .floats([self.falloff]);
            }
        }

        if !self.frequency.is_empty() {
            writer.command("frequency").floats(self.frequency.iter().copied());
        }
        if self.aspect_ratio != 1.0 {
            writer.command("shakeAspect").floats([self.aspect_ratio]);
        }
        if self.table != 0 {
            writer.command("table");
            match TABLE.name_of(self.table.into()) {
                Some(name) => writer.arguments([name]),
                None => writer.ints([i32::from(self.table)]),
            };
        }

        let unnamed = self.flags.bits() & !ShakeFlags::all().bits();
        if unnamed != 0 {
            writer.command("flags").arguments([format!("0x{unnamed:x}")]);
        }
    }

    fn used_elements(&self) -> Vec<UsedElement> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::unit::EffectUnit;

    fn parse(body: &str) -> ShakeEffect {
        let (unit, diagnostics) = EffectUnit::parse(&format!("shake test\n{body}\nend"));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        match unit.component("test") {
            Some(Component::Shake(shake)) => (**shake).clone(),
            other => panic!("expected a shake, got {other:?}"),
        }
    }

    fn write(effect: &ShakeEffect) -> String {
        Component::from(effect.clone()).to_argscript("test", &EffectUnit::new())
    }

    #[test]
    fn test_parse() {
        let shake = parse(
            "length 2 -fade 0.5\namplitude 1 0.5 0 -falloff3D 10\nfrequency 4\nshakeAspect 2\ntable sineY",
        );
        assert_eq!(shake.life, 2.0);
        assert_eq!(shake.fade, 0.5);
        assert_eq!(shake.strength, vec![1.0, 0.5, 0.0]);
        assert_eq!(shake.falloff, 10.0);
        assert!(shake.flags.contains(ShakeFlags::FALLOFF_3D));
        assert_eq!(shake.frequency, vec![4.0]);
        assert_eq!(shake.aspect_ratio, 2.0);
        assert_eq!(shake.table, 1);
    }

    #[test]
    fn test_flags_keep_named_bits() {
        let shake = parse("amplitude 1 -falloff3D 2\nflags 0x30");
        assert_eq!(shake.flags.bits(), 0x31);

        let shake = parse("flags 0x31");
        assert_eq!(shake.flags.bits(), 0x30);
    }

    #[test]
    fn test_write() {
        assert_eq!(write(&ShakeEffect::default()), "shake test\nend");

        let shake = parse("length 2 -fade 0.5\namplitude 1 -falloff 3\ntable sineY\nflags 0x10");
        assert_eq!(
            write(&shake),
            "shake test\n\tlength 2 -fade 0.5\n\tamplitude 1 -falloff 3\n\ttable sineY\n\tflags 0x10\nend"
        );
    }

    #[test]
    fn test_script_round_trip() {
        let shake = parse("length 1.5\namplitude -falloff3D 4\nfrequency 1 2 3\nshakeAspect 0.5");
        let (unit, diagnostics) = EffectUnit::parse(&write(&shake));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(unit.component("test"), Some(&Component::from(shake)));
    }

    #[test]
    fn test_table_accepts_unnamed_value() {
        let shake = parse("table 5");
        assert_eq!(shake.table, 5);
        assert_eq!(write(&shake), "shake test\n\ttable 5\nend");
        let (unit, diagnostics) = EffectUnit::parse(&write(&shake));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(unit.component("test"), Some(&Component::from(shake)));
    }

    #[test]
    fn test_binary_layout() {
        let shake = ShakeEffect {
            flags: ShakeFlags::FALLOFF_3D,
            life: 1.0,
            strength: vec![2.0],
            table: 1,
            ..Default::default()
        };
        let bytes = pfx_struct::encode(&shake).unwrap();
        assert_eq!(
            bytes,
            [
                0, 0, 0, 1, // flags
                0x3F, 0x80, 0, 0, // life
                0x3F, 0x80, 0, 0, // fade
                0, 0, 0, 1, 0x40, 0, 0, 0, // strength
                0, 0, 0, 0, // frequency
                0x3F, 0x80, 0, 0, // aspect
                1, // table
                0, 0, 0, 0, // falloff
            ]
        );
        assert_eq!(pfx_struct::decode::<ShakeEffect>(&bytes).unwrap(), shake);
    }
}
