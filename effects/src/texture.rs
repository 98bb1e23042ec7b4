//! Texture slot shared by particles and ribbons

use std::sync::LazyLock;

use pfx_argscript::{ArgScriptEnum, ArgScriptWriter, Line};
use pfx_shared::ResourceId;
use pfx_struct::{Endian, Structure, Structured};

use crate::component::{HYPERLINK_MATERIAL, HYPERLINK_TEXTURE, UsedElement, flag_scalar};
use crate::context::ParseContext;
use crate::directory::MATERIAL_RESOURCE;

/// Draw mode of slots that name a material instead
pub const DRAWMODE_NONE: u8 = 0x0F;

pub const DRAW_MODE: ArgScriptEnum = ArgScriptEnum::new(&[
    ("decal", 0x00),
    ("decalInvertDepth", 0x01),
    ("decalIgnoreDepth", 0x02),
    ("depthDecal", 0x03),
    ("decalDepth", 0x03),
    ("additive", 0x04),
    ("additiveInvertDepth", 0x05),
    ("additiveIgnoreDepth", 0x06),
    ("modulate", 0x07),
    ("normalMap", 0x08),
    ("depthNormalMap", 0x09),
    ("normalMapDepth", 0x09),
    ("alphaTestDissolve", 0x0A),
    ("user1", 0x0B),
    ("user2", 0x0C),
    ("user3", 0x0D),
    ("user4", 0x0E),
]);

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DrawFlags: u8 {
        const LIGHT = 0x01;
        const NO_FOG = 0x02;
        const SHADOW = 0x08;
        const NO_CULL = 0x10;
        const USER1 = 0x20;
        const USER2 = 0x40;
        const USER3 = 0x80;
    }
}

flag_scalar!(DrawFlags, u8);

const FLAG_OPTIONS: [(&str, DrawFlags); 7] = [
    ("light", DrawFlags::LIGHT),
    ("noFog", DrawFlags::NO_FOG),
    ("shadow", DrawFlags::SHADOW),
    ("noCull", DrawFlags::NO_CULL),
    ("user1", DrawFlags::USER1),
    ("user2", DrawFlags::USER2),
    ("user3", DrawFlags::USER3),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureSlot {
    pub resource: ResourceId,
    pub format: i8,
    pub draw_mode: u8,
    pub draw_flags: DrawFlags,
    pub buffer: i8,
    pub layer: i16,
    pub sort_offset: f32,
    /// Material of `-draw`, or the texture of material slots
    pub resource2: ResourceId,
}

impl Default for TextureSlot {
    fn default() -> Self {
        Self {
            resource: ResourceId::default(),
            format: 0,
            draw_mode: 0,
            draw_flags: DrawFlags::empty(),
            buffer: 0,
            layer: 0,
            sort_offset: 0.0,
            resource2: ResourceId::default(),
        }
    }
}

static STRUCTURE: LazyLock<Structure<TextureSlot>> = LazyLock::new(|| {
    Structure::builder("TextureSlot", Endian::Big)
        .nested("resource", |s: &TextureSlot| &s.resource, |s| &mut s.resource)
        .scalar("format", |s| &s.format, |s| &mut s.format)
        .scalar("drawMode", |s| &s.draw_mode, |s| &mut s.draw_mode)
        .scalar("drawFlags", |s| &s.draw_flags, |s| &mut s.draw_flags)
        .scalar("buffer", |s| &s.buffer, |s| &mut s.buffer)
        .scalar("layer", |s| &s.layer, |s| &mut s.layer)
        .scalar("sortOffset", |s| &s.sort_offset, |s| &mut s.sort_offset)
        .nested("resource2", |s| &s.resource2, |s| &mut s.resource2)
        .build()
});

impl Structured for TextureSlot {
    fn structure() -> &'static Structure<Self> {
        &STRUCTURE
    }
}

impl TextureSlot {
    /// A slot that names a material rather than a draw mode
    pub fn material() -> Self {
        Self {
            draw_mode: DRAWMODE_NONE,
            ..Self::default()
        }
    }

    /// Apply `keyword [resource] -options...`. The resource argument is
    /// annotated with `kind`.
    ///
    /// Draw flags are rebuilt from the flags present on the line.
    pub fn parse(&mut self, cx: &mut ParseContext<'_>, line: &Line, kind: &'static str) {
        self.parse_with_flags(cx, line, kind, DrawFlags::empty());
    }

    /// Like [`parse`](Self::parse), with draw flags starting from `initial`
    /// instead of empty. `-noShadow` clears an initial shadow.
    pub fn parse_with_flags(&mut self, cx: &mut ParseContext<'_>, line: &Line, kind: &'static str, initial: DrawFlags) {
        if let Some(args) = line.arguments(cx, 0..=1)
            && args.len() == 1
            && let Some(id) = cx.parse_resource(args, 0, kind)
        {
            self.resource = id;
        }

        if self.draw_mode == DRAWMODE_NONE {
            if let Some(args) = line.option_arguments(cx, "texture", 1)
                && let Some(id) = cx.parse_resource(args, 0, HYPERLINK_TEXTURE)
            {
                self.resource2 = id;
            }
        } else if let Some(args) = line.option_arguments(cx, "draw", 1..=2) {
            if let Some(mode) = DRAW_MODE.parse(cx, args, 0) {
                self.draw_mode = mode as u8;
            }
            if args.len() == 2
                && let Some(id) = cx.parse_resource(args, 1, HYPERLINK_MATERIAL)
            {
                self.resource2 = id;
            }
        }

        if let Some(args) = line.option_arguments(cx, "buffer", 1)
            && let Some(value) = cx.parse_byte(args, 0)
        {
            self.buffer = value;
        }
        if let Some(args) = line.option_arguments(cx, "layer", 1)
            && let Some(value) = cx.parse_short(args, 0)
        {
            self.layer = value;
        }
        if let Some(args) = line.option_arguments(cx, "sortOffset", 1)
            && let Some(value) = cx.parse_float(args, 0)
        {
            self.sort_offset = value;
        }

        self.draw_flags = initial;
        for (name, flag) in FLAG_OPTIONS {
            if line.has_flag(cx, name) {
                self.draw_flags |= flag;
            }
        }
        if line.has_flag(cx, "noShadow") {
            self.draw_flags.remove(DrawFlags::SHADOW);
        }

        if let Some(args) = line.option_arguments(cx, "format", 1)
            && let Some(value) = cx.parse_byte(args, 0)
        {
            self.format = value;
        }
    }

    /// Write `keyword [resource] -options...`
    pub fn write(&self, keyword: &str, writer: &mut ArgScriptWriter) {
        writer.command(keyword);
        if !self.resource.is_default() {
            writer.arguments([self.resource]);
        }
        self.write_options(writer);
    }

    /// The options alone, for lines that carry other arguments
    pub fn write_options(&self, writer: &mut ArgScriptWriter) {
        self.write_draw(writer);
        self.write_render(writer, false);
    }

    /// `-texture` of material slots, `-draw` of the others
    pub fn write_draw(&self, writer: &mut ArgScriptWriter) {
        if self.draw_mode == DRAWMODE_NONE {
            if !self.resource2.is_default() {
                writer.option("texture").arguments([self.resource2]);
            }
        } else if self.draw_mode != 0 || !self.resource2.is_default() {
            writer.option("draw");
            match DRAW_MODE.name_of(self.draw_mode.into()) {
                Some(name) => writer.arguments([name]),
                None => writer.ints([i32::from(self.draw_mode)]),
            };
            if !self.resource2.is_default() {
                writer.arguments([self.resource2]);
            }
        }
    }

    /// Buffer, layer, draw flags and format. With `shadow_default` the line
    /// is parsed with the shadow flag preset, so only its absence is written.
    pub fn write_render(&self, writer: &mut ArgScriptWriter, shadow_default: bool) {
        if self.buffer != 0 {
            writer.option("buffer").ints([i32::from(self.buffer)]);
        }
        if self.layer != 0 {
            writer.option("layer").ints([i32::from(self.layer)]);
        }
        if self.sort_offset != 0.0 {
            writer.option("sortOffset").floats([self.sort_offset]);
        }
        for (name, flag) in FLAG_OPTIONS {
            if shadow_default && flag == DrawFlags::SHADOW {
                writer.flag("noShadow", !self.draw_flags.contains(flag));
            } else {
                writer.flag(name, self.draw_flags.contains(flag));
            }
        }
        if self.format != 0 {
            writer.option("format").ints([i32::from(self.format)]);
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Resources this slot names, given the resource type of `resource`
    pub fn used_elements(&self, type_code: u16) -> Vec<UsedElement> {
        let mut used = Vec::new();
        if !self.resource.is_default() {
            used.push(UsedElement::Resource {
                type_code,
                id: self.resource,
            });
        }
        if !self.resource2.is_default() {
            used.push(UsedElement::Resource {
                type_code: MATERIAL_RESOURCE,
                id: self.resource2,
            });
        }
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::HYPERLINK_FILE;
    use crate::unit::EffectUnit;
    use pfx_argscript::{PositionMap, StreamState};

    fn parse(slot: &mut TextureSlot, text: &str) -> StreamState {
        let mut state = StreamState::new();
        let unit = EffectUnit::new();
        let line = Line::parse(text, &PositionMap::new(), 0).unwrap();
        let mut cx = ParseContext::new(&mut state, &unit);
        slot.parse(&mut cx, &line, HYPERLINK_FILE);
        state
    }

    fn write(slot: &TextureSlot) -> String {
        let mut writer = ArgScriptWriter::new();
        slot.write("texture", &mut writer);
        writer.finish()
    }

    #[test]
    fn test_parse_draw_options() {
        let mut slot = TextureSlot::default();
        let state = parse(
            &mut slot,
            "texture 0x10 -draw additive 0x20 -layer -3 -sortOffset 0.5 -light -shadow -noShadow -user3",
        );
        assert!(state.diagnostics().is_empty(), "{:?}", state.diagnostics());
        assert_eq!(slot.resource, ResourceId::new(0, 0x10));
        assert_eq!(slot.draw_mode, 4);
        assert_eq!(slot.resource2, ResourceId::new(0, 0x20));
        assert_eq!(slot.layer, -3);
        assert_eq!(slot.sort_offset, 0.5);
        assert_eq!(slot.draw_flags, DrawFlags::LIGHT | DrawFlags::USER3);
    }

    #[test]
    fn test_flags_reset_per_line() {
        let mut slot = TextureSlot::default();
        parse(&mut slot, "texture -noFog");
        assert_eq!(slot.draw_flags, DrawFlags::NO_FOG);
        parse(&mut slot, "texture -buffer 2");
        assert!(slot.draw_flags.is_empty());
        assert_eq!(slot.buffer, 2);
    }

    #[test]
    fn test_material_slot_takes_texture() {
        let mut slot = TextureSlot::material();
        let state = parse(&mut slot, "material 0x5 -texture 0x6");
        assert!(state.diagnostics().is_empty());
        assert_eq!(slot.resource2, ResourceId::new(0, 6));
        assert_eq!(slot.draw_mode, DRAWMODE_NONE);

        let mut slot = TextureSlot::material();
        parse(&mut slot, "material 0x5 -draw additive");
        assert_eq!(slot.draw_mode, DRAWMODE_NONE);
    }

    #[test]
    fn test_write() {
        assert_eq!(write(&TextureSlot::default()), "texture");

        let mut slot = TextureSlot::default();
        parse(&mut slot, "texture 0x10 -draw decalDepth -buffer 1 -noCull -format -5");
        assert_eq!(write(&slot), "texture 0x00000010 -draw depthDecal -buffer 1 -noCull -format -5");

        let mut reparsed = TextureSlot::default();
        parse(&mut reparsed, &write(&slot));
        assert_eq!(reparsed, slot);
    }

    #[test]
    fn test_draw_accepts_unnamed_value() {
        let mut slot = TextureSlot::default();
        let state = parse(&mut slot, "texture 0x10 -draw 16");
        assert!(state.diagnostics().is_empty(), "{:?}", state.diagnostics());
        assert_eq!(slot.draw_mode, 16);
        assert_eq!(write(&slot), "texture 0x00000010 -draw 16");

        let mut reparsed = TextureSlot::default();
        parse(&mut reparsed, &write(&slot));
        assert_eq!(reparsed, slot);
    }

    #[test]
    fn test_preset_shadow() {
        let mut state = StreamState::new();
        let unit = EffectUnit::new();
        let mut slot = TextureSlot::default();
        let line = Line::parse("model 0x1 -light", &PositionMap::new(), 0).unwrap();
        slot.parse_with_flags(&mut ParseContext::new(&mut state, &unit), &line, HYPERLINK_FILE, DrawFlags::SHADOW);
        assert_eq!(slot.draw_flags, DrawFlags::LIGHT | DrawFlags::SHADOW);

        let mut writer = ArgScriptWriter::new();
        slot.write_render(&mut writer, true);
        assert_eq!(writer.finish(), "-light");

        let line = Line::parse("model 0x1 -noShadow", &PositionMap::new(), 0).unwrap();
        slot.parse_with_flags(&mut ParseContext::new(&mut state, &unit), &line, HYPERLINK_FILE, DrawFlags::SHADOW);
        assert!(slot.draw_flags.is_empty());
        let mut writer = ArgScriptWriter::new();
        slot.write_render(&mut writer, true);
        assert_eq!(writer.finish(), "-noShadow");
    }

    #[test]
    fn test_is_default() {
        let mut slot = TextureSlot::default();
        assert!(slot.is_default());
        slot.sort_offset = 1.0;
        assert!(!slot.is_default());
    }

    #[test]
    fn test_binary_layout() {
        let slot = TextureSlot {
            resource: ResourceId::new(1, 2),
            draw_mode: 4,
            layer: 3,
            ..Default::default()
        };
        let bytes = pfx_struct::encode(&slot).unwrap();
        assert_eq!(bytes.len(), 8 + 4 + 2 + 4 + 8);
        assert_eq!(&bytes[..8], &[0, 0, 0, 1, 0, 0, 0, 2]);
        assert_eq!(&bytes[8..14], &[0, 4, 0, 0, 0, 3]);
        assert_eq!(pfx_struct::decode::<TextureSlot>(&bytes).unwrap(), slot);
    }
}
