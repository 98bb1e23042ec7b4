//! Dynamic light component

use std::sync::LazyLock;

use pfx_argscript::{ArgScriptEnum, ArgScriptWriter, Line, ParserTable, is_default, is_default_color};
use pfx_shared::ColorRgb;
use pfx_struct::{Endian, Structure, Structured};

use crate::component::{ComponentParser, EffectComponent, UsedElement, flag_scalar, grammar};
use crate::context::ParseContext;
use crate::directory::EffectDirectory;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LightFlags: u32 {
        /// `loop` counts sustain cycles
        const SUSTAIN = 0x8;
    }
}

flag_scalar!(LightFlags, u32);

pub const LIGHT_TYPE: ArgScriptEnum = ArgScriptEnum::new(&[
    ("ambient", 0),
    ("dir", 1),
    ("directional", 1),
    ("point", 2),
    ("spot", 3),
    ("area", 4),
])
.with_canonical(&["directional"]);

#[derive(Debug, Clone, PartialEq)]
pub struct LightEffect {
    /// Format version; not stored in the record itself
    pub version: i32,
    pub flags: LightFlags,
    pub light_type: i8,
    /// Only stored from version 2
    pub life: f32,
    /// Only stored from version 2
    pub loop_count: i16,
    pub color: Vec<ColorRgb>,
    pub strength: Vec<f32>,
    /// Also the spot width
    pub size: Vec<f32>,
    pub spot_width_penumbra: f32,
}

impl Default for LightEffect {
    fn default() -> Self {
        Self::with_version(Self::MAX_VERSION)
    }
}

fn has_life(light: &LightEffect) -> bool {
    light.version > 1
}

static STRUCTURE: LazyLock<Structure<LightEffect>> = LazyLock::new(|| {
    Structure::builder("LightEffect", Endian::Big)
        .scalar("flags", |s: &LightEffect| &s.flags, |s| &mut s.flags)
        .scalar("type", |s| &s.light_type, |s| &mut s.light_type)
        .scalar("life", |s| &s.life, |s| &mut s.life)
        .when(has_life)
        .scalar("loop", |s| &s.loop_count, |s| &mut s.loop_count)
        .when(has_life)
        .nested_list("color", |s| &s.color, |s| &mut s.color)
        .list("strength", |s| &s.strength, |s| &mut s.strength)
        .list("size", |s| &s.size, |s| &mut s.size)
        .scalar("spotWidthPenumbra", |s| &s.spot_width_penumbra, |s| &mut s.spot_width_penumbra)
        .build()
});

impl Structured for LightEffect {
    fn structure() -> &'static Structure<Self> {
        &STRUCTURE
    }
}

static GRAMMAR: LazyLock<ParserTable<ComponentParser<LightEffect>>> = LazyLock::new(|| {
    grammar(&[
        ("type", parse_type),
        ("life", parse_life),
        ("color", parse_color),
        ("colour", parse_color),
        ("color255", parse_color255),
        ("colour255", parse_color255),
        ("strength", parse_strength),
        ("size", parse_size),
        ("spotWidth", parse_spot_width),
        ("flags", parse_flags),
    ])
});

fn parse_type(cx: &mut ParseContext<'_>, effect: &mut LightEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = LIGHT_TYPE.parse(cx, args, 0)
    {
        effect.light_type = value as i8;
    }
}

/// `life time [-single | -loop [n] | -sustain [n]]`
fn parse_life(cx: &mut ParseContext<'_>, effect: &mut LightEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.life = value;
    }
    if line.has_flag(cx, "single") {
        effect.loop_count = 1;
    } else if let Some(args) = line.option_arguments(cx, "loop", 0..=1) {
        effect.loop_count = if args.len() == 1 { cx.parse_short(args, 0).unwrap_or(0) } else { 0 };
    } else if let Some(args) = line.option_arguments(cx, "sustain", 0..=1) {
        effect.loop_count = if args.len() == 1 { cx.parse_short(args, 0).unwrap_or(1) } else { 1 };
        effect.flags |= LightFlags::SUSTAIN;
    }
}

fn parse_color(cx: &mut ParseContext<'_>, effect: &mut LightEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.color.clear();
        cx.parse_color_rgbs(args, &mut effect.color);
    }
}

fn parse_color255(cx: &mut ParseContext<'_>, effect: &mut LightEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.color.clear();
        cx.parse_color_rgb255s(args, &mut effect.color);
    }
}

fn parse_strength(cx: &mut ParseContext<'_>, effect: &mut LightEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.strength.clear();
        cx.parse_floats(args, &mut effect.strength);
    }
}

fn parse_size(cx: &mut ParseContext<'_>, effect: &mut LightEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1..) {
        effect.size.clear();
        cx.parse_floats(args, &mut effect.size);
    }
}

fn parse_spot_width(cx: &mut ParseContext<'_>, effect: &mut LightEffect, line: &Line) {
    parse_size(cx, effect, line);
    if let Some(args) = line.option_arguments(cx, "penumbra", 1)
        && let Some(value) = cx.parse_float(args, 0)
    {
        effect.spot_width_penumbra = value;
    }
}

fn parse_flags(cx: &mut ParseContext<'_>, effect: &mut LightEffect, line: &Line) {
    if let Some(args) = line.arguments(cx, 1)
        && let Some(value) = cx.parse_int(args, 0)
    {
        effect.flags = LightFlags::from_bits_retain(value as u32);
    }
}

impl EffectComponent for LightEffect {
    const KEYWORD: &'static str = "light";
    const TYPE_CODE: u16 = 0x0A;
    const MIN_VERSION: i32 = 1;
    const MAX_VERSION: i32 = 2;

    fn with_version(version: i32) -> Self {
        Self {
            version,
            flags: LightFlags::empty(),
            light_type: 0,
            life: 0.0,
            loop_count: 0,
            color: vec![ColorRgb::white()],
            strength: vec![1.0],
            size: vec![1.0],
            spot_width_penumbra: 0.0,
        }
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn grammar() -> &'static ParserTable<ComponentParser<Self>> {
        &GRAMMAR
    }

    fn write_argscript(&self, writer: &mut ArgScriptWriter, _directory: &dyn EffectDirectory) {
        if self.light_type != 0 {
            writer.command("type");
            match LIGHT_TYPE.name_of(self.light_type.into()) {
                Some(name) => writer.arguments([name]),
                None => writer.ints([i32::from(self.light_type)]),
            };
        }

        let sustain = self.flags.contains(LightFlags::SUSTAIN);
        if self.life != 0.0 || self.loop_count != 0 || sustain {
            writer.command("life").floats([self.life]);
            if sustain {
                writer.option("sustain").ints([i32::from(self.loop_count)]);
            } else if self.loop_count == 1 {
                writer.option("single");
            } else if self.loop_count != 0 {
                writer.option("loop").ints([i32::from(self.loop_count)]);
            }
        }

        if !is_default_color(&self.color) {
            writer.command("color").colors(self.color.iter().copied());
        }
        if !is_default(&self.strength) {
            writer.command("strength").floats(self.strength.iter().copied());
        }

        if self.spot_width_penumbra != 0.0 {
            writer
                .command("spotWidth")
                .floats(self.size.iter().copied())
                .option("penumbra")
                .floats([self.spot_width_penumbra]);
        } else if !is_default(&self.size) {
            writer.command("size").floats(self.size.iter().copied());
        }

        if !self.flags.is_empty() {
            writer.command("flags").arguments([format!("0x{:x}", self.flags.bits())]);
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

    fn parse(body: &str) -> LightEffect {
        let (unit, diagnostics) = EffectUnit::parse(&format!("light test\n{body}\nend"));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        match unit.component("test") {
            Some(Component::Light(light)) => (**light).clone(),
            other => panic!("expected a light, got {other:?}"),
        }
    }

    fn write(effect: &LightEffect) -> String {
        Component::from(effect.clone()).to_argscript("test", &EffectUnit::new())
    }

    #[test]
    fn test_life_options() {
        let light = parse("life 2 -single");
        assert_eq!((light.life, light.loop_count), (2.0, 1));
        assert!(!light.flags.contains(LightFlags::SUSTAIN));

        let light = parse("life 2 -loop 3");
        assert_eq!(light.loop_count, 3);

        let light = parse("life 2 -sustain");
        assert_eq!(light.loop_count, 1);
        assert!(light.flags.contains(LightFlags::SUSTAIN));

        let light = parse("life 2 -sustain 4");
        assert_eq!(light.loop_count, 4);
    }

    #[test]
    fn test_lists_replace_defaults() {
        let light = parse("colour255 (255, 0, 0) (0, 255, 0)\nstrength 2 3\nspotWidth 30 40 -penumbra 0.5");
        assert_eq!(light.color, vec![ColorRgb::new(1.0, 0.0, 0.0), ColorRgb::new(0.0, 1.0, 0.0)]);
        assert_eq!(light.strength, vec![2.0, 3.0]);
        assert_eq!(light.size, vec![30.0, 40.0]);
        assert_eq!(light.spot_width_penumbra, 0.5);
    }

    #[test]
    fn test_write_elides_defaults() {
        assert_eq!(write(&LightEffect::default()), "light test\nend");

        let light = parse("type spot\nlife 1 -sustain 2\ncolor (1, 0.5, 0)\nspotWidth 20 -penumbra 3");
        assert_eq!(
            write(&light),
            "light test\n\ttype spot\n\tlife 1 -sustain 2\n\tcolor (1, 0.5, 0)\n\tspotWidth 20 -penumbra 3\n\tflags 0x8\nend"
        );
    }

    #[test]
    fn test_type_writes_canonical_alias() {
        let light = parse("type dir");
        assert_eq!(light.light_type, 1);
        assert_eq!(write(&light), "light test\n\ttype directional\nend");
    }

    #[test]
    fn test_type_accepts_unnamed_value() {
        let light = parse("type 7");
        assert_eq!(light.light_type, 7);
        assert_eq!(write(&light), "light test\n\ttype 7\nend");
        let (unit, diagnostics) = EffectUnit::parse(&write(&light));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(unit.component("test"), Some(&Component::from(light)));
    }

    #[test]
    fn test_script_round_trip() {
        let light = parse("type directional\nlife 3 -loop 2\nstrength 0.5 1\nsize 4\nflags 0x21");
        let (unit, diagnostics) = EffectUnit::parse(&write(&light));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(unit.component("test"), Some(&Component::from(light)));
    }

    #[test]
    fn test_version_gated_fields() {
        let mut light = LightEffect::with_version(1);
        light.life = 5.0;
        light.loop_count = 2;
        let v1 = pfx_struct::encode(&light).unwrap();

        light.version = 2;
        let v2 = pfx_struct::encode(&light).unwrap();
        assert_eq!(v2.len(), v1.len() + 6);

        let mut decoded = LightEffect::with_version(1);
        decoded.read_from(&mut pfx_struct::StreamReader::new(&v1)).unwrap();
        assert_eq!(decoded.life, 0.0);
        assert_eq!(decoded.color, vec![ColorRgb::white()]);

        let mut decoded = LightEffect::with_version(2);
        decoded.read_from(&mut pfx_struct::StreamReader::new(&v2)).unwrap();
        assert_eq!(decoded, light);
    }

    #[test]
    fn test_binary_lists_replace_defaults() {
        let mut light = LightEffect::default();
        light.color.clear();
        light.strength = vec![1.0, 2.0];
        let bytes = pfx_struct::encode(&light).unwrap();
        let decoded: LightEffect = pfx_struct::decode(&bytes).unwrap();
        assert!(decoded.color.is_empty());
        assert_eq!(decoded.strength, vec![1.0, 2.0]);
    }
}
