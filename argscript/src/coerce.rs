//! Converting claimed arguments into typed values.
//!
//! Every method reports its own diagnostics and returns `None` (or `false`
//! for the list variants) on failure, so handlers can simply skip the field.

use pfx_shared::{ColorRgb, ResourceId, file_hash};

use crate::diagnostic::{HYPERLINK_COLOR, ScriptError};
use crate::lexer::ExprLexer;
use crate::line::Arguments;
use crate::stream::StreamState;

type LexResult<T> = Result<T, ScriptError>;

impl StreamState {
    /// Check that argument `index` exists and is not blank
    fn require(&mut self, args: Arguments<'_>, index: usize, what: &str) -> bool {
        if index >= args.len() {
            self.error(
                args.full_span(),
                format!("Expected {what} at argument position {index}."),
            );
            return false;
        }
        if args.get(index).trim().is_empty() {
            let start = args.span(index).start;
            self.error(start..start + 1, "Empty expression.");
            return false;
        }
        true
    }

    /// Report an error whose span is relative to the text of argument `index`
    fn argument_error(&mut self, args: Arguments<'_>, index: usize, error: ScriptError) {
        let span = args.span(index);
        let content = args.content_start(index);
        let start = (content + error.span.start).clamp(span.start, span.end);
        let end = (content + error.span.end).clamp(start, span.end);
        self.error(start..end, error.message);
    }

    /// Run an expression over the whole of argument `index`; leftover text is
    /// an error
    fn evaluate<R>(
        &mut self,
        args: Arguments<'_>,
        index: usize,
        eval: impl FnOnce(&mut ExprLexer<'_>) -> LexResult<R>,
    ) -> Option<R> {
        let text = args.get(index);
        let result = {
            let mut lexer = ExprLexer::with_context(text, &*self);
            eval(&mut lexer).and_then(|value| {
                let end = lexer.position();
                lexer.skip_whitespace();
                if lexer.available() {
                    Err(ScriptError::new("Garbage at end of expression", end..lexer.len()))
                } else {
                    Ok(value)
                }
            })
        };
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.argument_error(args, index, error);
                None
            }
        }
    }

    // Scalars

    pub fn parse_float(&mut self, args: Arguments<'_>, index: usize) -> Option<f32> {
        if !self.require(args, index, "a float") {
            return None;
        }
        self.evaluate(args, index, |lexer| lexer.parse_float())
            .map(|value| value as f32)
    }

    pub fn parse_float_range(&mut self, args: Arguments<'_>, index: usize, min: f32, max: f32) -> Option<f32> {
        let value = self.parse_float(args, index)?;
        if value < min || value > max {
            self.error(
                args.span(index),
                format!("Real number out of the range ({min:.6}, {max:.6})."),
            );
            return None;
        }
        Some(value)
    }

    /// A 32-bit integer.
    ///
    /// Values up to `0xFFFFFFFF` are accepted and wrap into the negative
    /// range, so hashes and hex masks can be written directly.
    pub fn parse_int(&mut self, args: Arguments<'_>, index: usize) -> Option<i32> {
        if !self.require(args, index, "an int") {
            return None;
        }
        let value = self.evaluate(args, index, |lexer| lexer.parse_integer())?;
        if value > i64::from(u32::MAX) {
            self.error(args.span(index), format!("Maximum integer value is {}.", i32::MAX));
            return None;
        }
        if value < i64::from(i32::MIN) {
            self.error(args.span(index), format!("Minimum integer value is {}.", i32::MIN));
            return None;
        }
        Some(value as i32)
    }

    pub fn parse_int_range(&mut self, args: Arguments<'_>, index: usize, min: i32, max: i32) -> Option<i32> {
        let value = self.parse_int(args, index)?;
        if value < min || value > max {
            self.error(args.span(index), format!("Integer out of the range ({min}, {max})."));
            return None;
        }
        Some(value)
    }

    pub fn parse_uint(&mut self, args: Arguments<'_>, index: usize) -> Option<u32> {
        if !self.require(args, index, "an unsigned int") {
            return None;
        }
        let value = self.evaluate(args, index, |lexer| lexer.parse_integer())?;
        if value > i64::from(u32::MAX) {
            self.error(
                args.span(index),
                format!("Maximum unsigned integer value is {}.", u32::MAX),
            );
            return None;
        }
        if value < 0 {
            self.error(args.span(index), "Minimum integer value is 0.");
            return None;
        }
        Some(value as u32)
    }

    pub fn parse_uint_range(&mut self, args: Arguments<'_>, index: usize, min: u32, max: u32) -> Option<u32> {
        let value = self.parse_uint(args, index)?;
        if value < min || value > max {
            self.error(
                args.span(index),
                format!("Unsigned integer out of the range ({min}, {max})."),
            );
            return None;
        }
        Some(value)
    }

    pub fn parse_short(&mut self, args: Arguments<'_>, index: usize) -> Option<i16> {
        self.parse_int_range(args, index, i16::MIN.into(), i16::MAX.into())
            .map(|value| value as i16)
    }

    pub fn parse_byte(&mut self, args: Arguments<'_>, index: usize) -> Option<i8> {
        self.parse_int_range(args, index, i8::MIN.into(), i8::MAX.into())
            .map(|value| value as i8)
    }

    pub fn parse_ubyte(&mut self, args: Arguments<'_>, index: usize) -> Option<u8> {
        self.parse_int_range(args, index, 0, u8::MAX.into())
            .map(|value| value as u8)
    }

    pub fn parse_boolean(&mut self, args: Arguments<'_>, index: usize) -> Option<bool> {
        if !self.require(args, index, "a boolean") {
            return None;
        }
        self.evaluate(args, index, |lexer| lexer.parse_boolean())
    }

    // Vectors and colors

    fn vector<const N: usize>(
        &mut self,
        args: Arguments<'_>,
        index: usize,
        what: &str,
        separator_message: &str,
    ) -> Option<[f32; N]> {
        if !self.require(args, index, what) {
            return None;
        }
        self.evaluate(args, index, |lexer| {
            let first = lexer.parse_float()? as f32;
            let mut values = [first; N];
            if lexer.optional_expect(b',')? {
                for (i, slot) in values.iter_mut().enumerate().skip(1) {
                    if i > 1 {
                        lexer.expect_with(b',', separator_message)?;
                    }
                    *slot = lexer.parse_float()? as f32;
                }
            }
            Ok(values)
        })
    }

    /// `x, y`, or a single value used for both
    pub fn parse_vector2(&mut self, args: Arguments<'_>, index: usize) -> Option<[f32; 2]> {
        self.vector(args, index, "a Vector2", "Expected ','.")
    }

    pub fn parse_vector3(&mut self, args: Arguments<'_>, index: usize) -> Option<[f32; 3]> {
        self.vector(args, index, "a Vector3", "Expected ',' (three values are required).")
    }

    pub fn parse_vector4(&mut self, args: Arguments<'_>, index: usize) -> Option<[f32; 4]> {
        self.vector(args, index, "a Vector4", "Expected ',' (four values are required).")
    }

    /// `r, g, b` in 0..1; annotates the argument with a color hyperlink
    pub fn parse_color_rgb(&mut self, args: Arguments<'_>, index: usize) -> Option<ColorRgb> {
        let [r, g, b] = self.vector::<3>(
            args,
            index,
            "a ColorRGB",
            "Expected ',' (three values are required).",
        )?;
        let color = ColorRgb::new(r, g, b);
        self.add_hyperlink(HYPERLINK_COLOR, color.to_string(), args.span(index));
        Some(color)
    }

    /// `r, g, b` in 0..255
    pub fn parse_color_rgb255(&mut self, args: Arguments<'_>, index: usize) -> Option<ColorRgb> {
        let [r, g, b] = self.vector::<3>(
            args,
            index,
            "a ColorRGB",
            "Expected ',' (three values are required).",
        )?;
        let color = ColorRgb::from_255(r, g, b);
        self.add_hyperlink(HYPERLINK_COLOR, color.to_string(), args.span(index));
        Some(color)
    }

    /// `r, g, b` or `r, g, b, a`; alpha defaults to opaque
    pub fn parse_color_rgba(&mut self, args: Arguments<'_>, index: usize) -> Option<[f32; 4]> {
        if !self.require(args, index, "a ColorRGBA") {
            return None;
        }
        let message = "Expected ',' (three or four values are required).";
        let color = self.evaluate(args, index, |lexer| {
            let r = lexer.parse_float()? as f32;
            lexer.expect_with(b',', message)?;
            let g = lexer.parse_float()? as f32;
            lexer.expect_with(b',', message)?;
            let b = lexer.parse_float()? as f32;
            let a = if lexer.optional_expect(b',')? {
                lexer.parse_float()? as f32
            } else {
                1.0
            };
            Ok([r, g, b, a])
        })?;
        let [r, g, b, _] = color;
        self.add_hyperlink(
            HYPERLINK_COLOR,
            ColorRgb::new(r, g, b).to_string(),
            args.span(index),
        );
        Some(color)
    }

    pub fn parse_color_rgba255(&mut self, args: Arguments<'_>, index: usize) -> Option<[f32; 4]> {
        self.parse_color_rgba(args, index)
            .map(|color| color.map(|value| value / 255.0))
    }

    // Lists

    /// Parse every argument with `parse`, stopping at the first failure
    fn parse_all<V>(
        &mut self,
        args: Arguments<'_>,
        out: &mut Vec<V>,
        parse: fn(&mut Self, Arguments<'_>, usize) -> Option<V>,
    ) -> bool {
        for index in 0..args.len() {
            match parse(self, args, index) {
                Some(value) => out.push(value),
                None => return false,
            }
        }
        true
    }

    pub fn parse_floats(&mut self, args: Arguments<'_>, out: &mut Vec<f32>) -> bool {
        self.parse_all(args, out, Self::parse_float)
    }

    /// Floats written in 0..255, stored in 0..1
    pub fn parse_float255s(&mut self, args: Arguments<'_>, out: &mut Vec<f32>) -> bool {
        self.parse_all(args, out, |state, args, index| {
            state.parse_float(args, index).map(|value| value / 255.0)
        })
    }

    pub fn parse_ints(&mut self, args: Arguments<'_>, out: &mut Vec<i32>) -> bool {
        self.parse_all(args, out, Self::parse_int)
    }

    pub fn parse_color_rgbs(&mut self, args: Arguments<'_>, out: &mut Vec<ColorRgb>) -> bool {
        self.parse_all(args, out, Self::parse_color_rgb)
    }

    pub fn parse_color_rgb255s(&mut self, args: Arguments<'_>, out: &mut Vec<ColorRgb>) -> bool {
        self.parse_all(args, out, Self::parse_color_rgb255)
    }

    pub fn parse_file_ids(&mut self, args: Arguments<'_>, out: &mut Vec<u32>) -> bool {
        self.parse_all(args, out, Self::parse_file_id)
    }

    // Identifiers

    /// A name, `#hex` or `0xhex`, hashed into a 32-bit id
    pub fn parse_file_id(&mut self, args: Arguments<'_>, index: usize) -> Option<u32> {
        if !self.require(args, index, "a name") {
            return None;
        }
        match file_hash(args.get(index)) {
            Ok(hash) => Some(hash),
            Err(error) => {
                self.error(args.span(index), error.to_string());
                None
            }
        }
    }

    /// `instance` or `group!instance`
    pub fn parse_resource_id(&mut self, args: Arguments<'_>, index: usize) -> Option<ResourceId> {
        if !self.require(args, index, "a resource ID") {
            return None;
        }
        self.resource_id(args, index, ResourceId::parse)
    }

    /// Like [`parse_resource_id`](Self::parse_resource_id), also accepting the
    /// `terrain` and `water` keywords
    pub fn parse_special_resource_id(&mut self, args: Arguments<'_>, index: usize) -> Option<ResourceId> {
        if !self.require(args, index, "a resource ID") {
            return None;
        }
        self.resource_id(args, index, ResourceId::parse_special)
    }

    fn resource_id(
        &mut self,
        args: Arguments<'_>,
        index: usize,
        parse: fn(&str) -> Result<ResourceId, pfx_shared::ResourceIdError>,
    ) -> Option<ResourceId> {
        match parse(args.get(index)) {
            Ok(id) => Some(id),
            Err(error) => {
                let error = ScriptError::new(error.error.to_string(), error.span);
                self.argument_error(args, index, error);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Line;
    use crate::position::PositionMap;

    fn line(text: &str) -> Line {
        Line::parse(text, &PositionMap::new(), 0).unwrap()
    }

    fn messages(state: &StreamState) -> Vec<&str> {
        state.diagnostics().iter().map(|d| d.message.as_str()).collect()
    }

    #[test]
    fn test_float_expressions() {
        let line = line("size (2 * 3) 1.5 abc");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 3).unwrap();
        assert_eq!(state.parse_float(args, 0), Some(6.0));
        assert_eq!(state.parse_float(args, 1), Some(1.5));
        assert_eq!(state.parse_float(args, 2), None);
        assert_eq!(state.parse_float(args, 3), None);
        assert_eq!(
            messages(&state),
            vec![
                "Unknown float function 'abc'.",
                "Expected a float at argument position 3.",
            ]
        );
        assert_eq!(state.diagnostics()[1].span, 5..20);
    }

    #[test]
    fn test_garbage_at_end() {
        let line = line("size 1x");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 1).unwrap();
        assert_eq!(state.parse_float(args, 0), None);
        assert_eq!(messages(&state), vec!["Garbage at end of expression"]);
        assert_eq!(state.diagnostics()[0].span, 6..7);
    }

    #[test]
    fn test_int_limits() {
        let line = line("flags 0xFFFFFFFF -1 0x100000000 300");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 4).unwrap();
        assert_eq!(state.parse_int(args, 0), Some(-1));
        assert_eq!(state.parse_int(args, 1), Some(-1));
        assert_eq!(state.parse_int(args, 2), None);
        assert_eq!(state.parse_uint(args, 1), None);
        assert_eq!(state.parse_ubyte(args, 3), None);
        assert_eq!(state.parse_int_range(args, 3, 0, 300), Some(300));
        assert_eq!(
            messages(&state),
            vec![
                "Maximum integer value is 2147483647.",
                "Minimum integer value is 0.",
                "Integer out of the range (0, 255).",
            ]
        );
    }

    #[test]
    fn test_float_range() {
        let line = line("alpha 1.5");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 1).unwrap();
        assert_eq!(state.parse_float_range(args, 0, 0.0, 1.0), None);
        assert_eq!(messages(&state), vec!["Real number out of the range (0.000000, 1.000000)."]);
    }

    #[test]
    fn test_vectors() {
        let line = line("offset (1, 2, 3) 5 (1, 2) (1 2 3)");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 4).unwrap();
        assert_eq!(state.parse_vector3(args, 0), Some([1.0, 2.0, 3.0]));
        assert_eq!(state.parse_vector3(args, 1), Some([5.0, 5.0, 5.0]));
        assert_eq!(state.parse_vector2(args, 2), Some([1.0, 2.0]));
        assert_eq!(state.parse_vector3(args, 2), None);
        assert_eq!(state.parse_vector3(args, 3), None);
        assert_eq!(
            messages(&state),
            vec!["Expected ',' (three values are required).", "Expected ','."]
        );
        // Error spans point into the unwrapped group
        assert_eq!(state.diagnostics()[1].span, 29..30);
    }

    #[test]
    fn test_colors_add_hyperlinks() {
        let line = line("color (1, 0.5, 0) (255, 0, 0) (0, 0, 1, 0.5)");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 3).unwrap();
        assert_eq!(state.parse_color_rgb(args, 0), Some(ColorRgb::new(1.0, 0.5, 0.0)));
        assert_eq!(state.parse_color_rgb255(args, 1), Some(ColorRgb::new(1.0, 0.0, 0.0)));
        assert_eq!(state.parse_color_rgba(args, 2), Some([0.0, 0.0, 1.0, 0.5]));
        assert_eq!(state.hyperlinks().len(), 3);
        assert_eq!(state.hyperlinks()[0].kind, HYPERLINK_COLOR);
        assert_eq!(state.hyperlinks()[0].span, 6..17);

        state.set_fast_parsing(true);
        state.parse_color_rgb(args, 0);
        assert_eq!(state.hyperlinks().len(), 3);
    }

    #[test]
    fn test_lists_stop_at_first_failure() {
        let line = line("size 1 2 oops 4");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 1..).unwrap();
        let mut values = Vec::new();
        assert!(!state.parse_floats(args, &mut values));
        assert_eq!(values, vec![1.0, 2.0]);
        assert_eq!(state.diagnostics().len(), 1);
    }

    #[test]
    fn test_booleans() {
        let line = line("flag true (1 > 2) \"\"");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 3).unwrap();
        assert_eq!(state.parse_boolean(args, 0), Some(true));
        assert_eq!(state.parse_boolean(args, 1), Some(false));
        assert_eq!(state.parse_boolean(args, 2), None);
        assert_eq!(messages(&state), vec!["Empty expression."]);
    }

    #[test]
    fn test_ids() {
        let line = line("texture fx_smoke #0000ABCD effects!glow unknown~");
        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 4).unwrap();
        assert_eq!(state.parse_file_id(args, 0), Some(pfx_shared::fnv_hash("fx_smoke")));
        assert_eq!(state.parse_file_id(args, 1), Some(0xABCD));
        let id = state.parse_resource_id(args, 2).unwrap();
        assert_eq!(id.instance_id, pfx_shared::fnv_hash("glow"));
        assert!(state.parse_resource_id(args, 3).is_none());
        assert!(state.has_errors());
    }
}
