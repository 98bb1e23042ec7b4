//! Script text builder
//!
//! Components write themselves back to text through [`ArgScriptWriter`]: one
//! [`command`](ArgScriptWriter::command) per line, then its arguments and
//! options. Blocks indent their contents with tabs.

use std::fmt::{self, Display, Write as _};

use pfx_shared::{ColorRgb, float_to_string};

#[derive(Debug)]
pub struct ArgScriptWriter {
    out: String,
    indentation: usize,
    first_argument: bool,
}

impl ArgScriptWriter {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            indentation: 0,
            first_argument: true,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.indentation {
            self.out.push('\t');
        }
    }

    fn separator(&mut self) {
        if !self.first_argument {
            self.out.push(' ');
        }
        self.first_argument = false;
    }

    /// Start a new line with `name`
    pub fn command(&mut self, name: &str) -> &mut Self {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.indent();
        self.out.push_str(name);
        self.first_argument = false;
        self
    }

    /// `end` at the current indentation; call after [`end_block`](Self::end_block)
    pub fn command_end(&mut self) -> &mut Self {
        self.command("end")
    }

    pub fn start_block(&mut self) -> &mut Self {
        self.indentation += 1;
        self
    }

    pub fn end_block(&mut self) -> &mut Self {
        self.indentation = self.indentation.saturating_sub(1);
        self
    }

    pub fn blank_line(&mut self) -> &mut Self {
        self.out.push('\n');
        self.first_argument = true;
        self
    }

    /// Append multi-line text, indenting every line after the first (and the
    /// first too when `new_line`)
    pub fn tabulated_text(&mut self, text: &str, mut new_line: bool) -> &mut Self {
        for line in text.split('\n') {
            if new_line {
                if !self.out.is_empty() {
                    self.out.push('\n');
                }
                self.indent();
            }
            new_line = true;
            self.out.push_str(line);
        }
        self
    }

    pub fn option(&mut self, name: &str) -> &mut Self {
        self.separator();
        self.out.push('-');
        self.out.push_str(name);
        self
    }

    /// Write `-name` only when `value` is set
    pub fn flag(&mut self, name: &str, value: bool) -> &mut Self {
        if value {
            self.option(name);
        }
        self
    }

    pub fn arguments<I>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        for value in values {
            self.separator();
            // Writing into a String cannot fail
            let _ = write!(self.out, "{value}");
        }
        self
    }

    /// A quoted argument
    pub fn literal(&mut self, text: &str) -> &mut Self {
        self.separator();
        self.out.push('"');
        self.out.push_str(text);
        self.out.push('"');
        self
    }

    pub fn parenthesis(&mut self, text: &str) -> &mut Self {
        self.separator();
        self.out.push('(');
        self.out.push_str(text);
        self.out.push(')');
        self
    }

    pub fn floats<I: IntoIterator<Item = f32>>(&mut self, values: I) -> &mut Self {
        for value in values {
            self.separator();
            self.out.push_str(&float_to_string(value));
        }
        self
    }

    pub fn ints<I: IntoIterator<Item = i32>>(&mut self, values: I) -> &mut Self {
        self.arguments(values)
    }

    /// `(x, y, ...)`
    pub fn vector(&mut self, values: &[f32]) -> &mut Self {
        self.separator();
        self.out.push('(');
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.out.push_str(&float_to_string(*value));
        }
        self.out.push(')');
        self
    }

    pub fn vectors<'v, I: IntoIterator<Item = &'v [f32]>>(&mut self, values: I) -> &mut Self {
        for value in values {
            self.vector(value);
        }
        self
    }

    pub fn color(&mut self, color: ColorRgb) -> &mut Self {
        self.vector(&color.to_array())
    }

    pub fn colors<I: IntoIterator<Item = ColorRgb>>(&mut self, colors: I) -> &mut Self {
        for color in colors {
            self.color(color);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Default for ArgScriptWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ArgScriptWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.out)
    }
}

/// True for an empty list or the single value `1`
pub fn is_default(values: &[f32]) -> bool {
    is_default_with(values, 1.0)
}

pub fn is_default_with(values: &[f32], default: f32) -> bool {
    values.is_empty() || (values.len() == 1 && values[0] == default)
}

/// True for an empty list or a single white
pub fn is_default_color(colors: &[ColorRgb]) -> bool {
    colors.is_empty() || (colors.len() == 1 && colors[0].is_white())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_and_blocks() {
        let mut writer = ArgScriptWriter::new();
        writer.command("particles").arguments(["fire"]);
        writer.start_block();
        writer.command("size").floats([1.0, 2.5]).option("vary").floats([0.5]);
        writer.command("color").color(ColorRgb::white()).flag("loop", false);
        writer.command("texture").literal("fx smoke").flag("strict", true);
        writer.end_block();
        writer.command_end();
        assert_eq!(
            writer.finish(),
            "particles fire\n\tsize 1 2.5 -vary 0.5\n\tcolor (1, 1, 1)\n\ttexture \"fx smoke\" -strict\nend"
        );
    }

    #[test]
    fn test_blank_line_and_tabulated_text() {
        let mut writer = ArgScriptWriter::new();
        writer.command("a");
        writer.blank_line();
        writer.start_block();
        writer.tabulated_text("b 1\nc 2", true);
        assert_eq!(writer.to_string(), "a\n\n\tb 1\n\tc 2");
    }

    #[test]
    fn test_defaults() {
        assert!(is_default(&[]));
        assert!(is_default(&[1.0]));
        assert!(!is_default(&[1.0, 1.0]));
        assert!(is_default_with(&[0.0], 0.0));
        assert!(is_default_color(&[ColorRgb::white()]));
        assert!(!is_default_color(&[ColorRgb::black()]));
    }
}
