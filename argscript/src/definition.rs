//! Reusable line templates: `define name(a, b) ... enddef` and
//! `create name(1, 2)`

use crate::diagnostic::ScriptError;
use crate::lexer::ExprLexer;

/// A recorded template. Body lines are kept as written (comments stripped)
/// and reference parameters as `&name` or `&{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub parameters: Vec<String>,
    pub lines: Vec<String>,
    /// Line of the `define` header
    pub line: usize,
}

impl Definition {
    /// Parse the header text after `define`: `name(a, b)` or `name()`
    pub fn parse_header(text: &str, line: usize) -> Result<Self, ScriptError> {
        let mut lexer = ExprLexer::new(text);
        let name = lexer.parse_keyword();
        if name.is_empty() {
            return Err(ScriptError::new("Expected a definition name.", 0..text.len()));
        }
        lexer.expect(b'(')?;

        let mut parameters = Vec::new();
        lexer.skip_whitespace();
        if lexer.peek() == Some(b')') {
            lexer.next_char();
        } else {
            loop {
                let start = lexer.position();
                let parameter = lexer.parse_keyword();
                if parameter.is_empty() {
                    return Err(ScriptError::new("Empty parameter name.", start..lexer.position() + 1));
                }
                parameters.push(parameter);
                lexer.skip_whitespace();
                let at = lexer.position();
                match lexer.next_char() {
                    Some(b')') => break,
                    Some(b',') => {}
                    _ => {
                        return Err(ScriptError::new("Expected ',' after parameter name.", at..at + 1));
                    }
                }
            }
        }

        Ok(Self {
            name,
            parameters,
            lines: Vec::new(),
            line,
        })
    }

    /// Substitute parameter references in one body line
    pub fn expand_line(&self, arguments: &[String], text: &str) -> Result<String, ScriptError> {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'&' {
                i += 1;
                continue;
            }
            out.push_str(&text[copied..i]);
            let marker = i;
            i += 1;
            if i == bytes.len() {
                return Err(ScriptError::new("Missing parameter name after '&'.", marker..i));
            }
            let braces = bytes[i] == b'{';
            if braces {
                i += 1;
                if i == bytes.len() {
                    return Err(ScriptError::new(
                        "Missing parameter name after '{'; the format should be '&{parameterName}'.",
                        marker..i,
                    ));
                }
            }
            let name_start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let name = &text[name_start..i];
            if name.is_empty() {
                return Err(ScriptError::new("Missing parameter name after '&'.", marker..i.max(marker + 1)));
            }
            if name.as_bytes()[0].is_ascii_digit() {
                return Err(ScriptError::new(
                    format!("Invalid parameter name '{name}': parameter names cannot start with a numeric digit."),
                    name_start..i,
                ));
            }
            if braces {
                if bytes.get(i) != Some(&b'}') {
                    return Err(ScriptError::new(
                        format!("Missing closing '}}' after parameter '{name}'."),
                        name_start..i,
                    ));
                }
                i += 1;
            }
            let Some(index) = self.parameters.iter().position(|parameter| parameter == name) else {
                return Err(ScriptError::new(format!("Unknown parameter '{name}'."), marker..i));
            };
            out.push_str(arguments.get(index).map_or("", String::as_str));
            copied = i;
        }
        out.push_str(&text[copied..]);
        Ok(out)
    }
}

/// Parse the argument of `create`: `name(arg, arg)`.
///
/// Arguments are split on commas outside nested parentheses and quotes, so
/// `(1, 0, 0)` is a single argument.
pub fn parse_call(text: &str) -> Result<(String, Vec<String>), ScriptError> {
    let mut lexer = ExprLexer::new(text);
    let name = lexer.parse_keyword();
    if name.is_empty() {
        return Err(ScriptError::new("Expected a definition name.", 0..text.len()));
    }
    lexer.expect(b'(')?;

    let bytes = text.as_bytes();
    let mut arguments = Vec::new();
    let mut start = lexer.position();
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, &c) in bytes.iter().enumerate().skip(start) {
        match c {
            b'"' => quoted = !quoted,
            _ if quoted => {}
            b'(' => depth += 1,
            b')' if depth > 0 => depth -= 1,
            b',' if depth == 0 => {
                arguments.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            b')' => {
                let last = text[start..i].trim();
                if !last.is_empty() || !arguments.is_empty() {
                    arguments.push(last.to_string());
                }
                if !text[i + 1..].trim().is_empty() {
                    return Err(ScriptError::new("Garbage at end of expression", i + 1..text.len()));
                }
                return Ok((name, arguments));
            }
            _ => {}
        }
    }
    Err(ScriptError::new(
        "Missing closing ')' after definition arguments.",
        text.len()..text.len(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header() {
        let definition = Definition::parse_header("burst(count, color)", 4).unwrap();
        assert_eq!(definition.name, "burst");
        assert_eq!(definition.parameters, vec!["count", "color"]);
        assert_eq!(definition.line, 4);

        let definition = Definition::parse_header("empty()", 0).unwrap();
        assert!(definition.parameters.is_empty());
    }

    #[test]
    fn test_header_errors() {
        let err = Definition::parse_header("burst(a b)", 0).unwrap_err();
        assert_eq!(err.message, "Expected ',' after parameter name.");
        let err = Definition::parse_header("burst(a, )", 0).unwrap_err();
        assert_eq!(err.message, "Empty parameter name.");
        let err = Definition::parse_header("burst", 0).unwrap_err();
        assert_eq!(err.message, "Expected '('.");
    }

    #[test]
    fn test_expand_line() {
        let definition = Definition::parse_header("burst(count, tint)", 0).unwrap();
        let arguments = vec!["20".to_string(), "1, 0, 0".to_string()];
        assert_eq!(
            definition.expand_line(&arguments, "rate &count -color (&{tint})").unwrap(),
            "rate 20 -color (1, 0, 0)"
        );
        let err = definition.expand_line(&arguments, "rate &size").unwrap_err();
        assert_eq!(err.message, "Unknown parameter 'size'.");
        assert_eq!(err.span, 5..10);
        let err = definition.expand_line(&arguments, "rate &{count").unwrap_err();
        assert_eq!(err.message, "Missing closing '}' after parameter 'count'.");
    }

    #[test]
    fn test_call() {
        let (name, arguments) = parse_call("burst(20, (1, 0, 0), 2 * 3)").unwrap();
        assert_eq!(name, "burst");
        assert_eq!(arguments, vec!["20", "(1, 0, 0)", "2 * 3"]);

        let (_, arguments) = parse_call("empty()").unwrap();
        assert!(arguments.is_empty());

        let err = parse_call("burst(20").unwrap_err();
        assert_eq!(err.message, "Missing closing ')' after definition arguments.");
    }
}
