//! Whitespace word splitting with quote and parenthesis grouping
//!
//! A word ends at whitespace, except inside `"..."` or `(...)`. Quotes are
//! dropped. A parenthesized group that starts a word is unwrapped, so
//! `(1, 0, 0)` becomes the single word `1, 0, 0`; one that follows letters is
//! kept, so `sin(30)` stays a function call.

use crate::diagnostic::ScriptError;

pub(crate) struct WordSplitter<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> WordSplitter<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::at(text.as_bytes(), 0)
    }

    pub fn at(text: &'a [u8], pos: usize) -> Self {
        Self { text, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    pub fn advance(&mut self) {
        self.pos += 1;
    }

    pub fn skip_whitespace(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Next whitespace-delimited word
    pub fn next_word(&mut self) -> Result<Option<String>, ScriptError> {
        self.read(false)
    }

    /// Like [`next_word`](Self::next_word), but also stops before `)` and `,`
    /// so function parameters can be read one at a time
    pub fn next_parameter(&mut self) -> Result<Option<String>, ScriptError> {
        self.read(true)
    }

    /// A name made of letters, digits, `_`, `-` and `~`
    pub fn next_readable_word(&mut self) -> String {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.text.len() {
            let c = self.text[self.pos];
            if !(c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'~') {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.text[start..self.pos]).into_owned()
    }

    fn read(&mut self, is_parameter: bool) -> Result<Option<String>, ScriptError> {
        self.skip_whitespace();
        if self.pos >= self.text.len() {
            return Ok(None);
        }
        let keep_parenthesis = self.text[self.pos].is_ascii_alphabetic();
        let mut out = Vec::new();
        while self.pos < self.text.len() && !self.text[self.pos].is_ascii_whitespace() {
            if !self.basic(&mut out, keep_parenthesis, is_parameter)? {
                break;
            }
        }
        Ok(Some(String::from_utf8_lossy(&out).into_owned()))
    }

    /// Consume one unit; returns false when the word has ended
    fn basic(
        &mut self,
        out: &mut Vec<u8>,
        keep_parenthesis: bool,
        is_parameter: bool,
    ) -> Result<bool, ScriptError> {
        match self.text[self.pos] {
            b'"' => {
                self.pos += 1;
                self.quoted(out)?;
            }
            b'(' => {
                self.pos += 1;
                if keep_parenthesis {
                    out.push(b'(');
                }
                self.parenthesis(out)?;
                if keep_parenthesis {
                    out.push(b')');
                }
                return Ok(false);
            }
            b')' | b',' if is_parameter => return Ok(false),
            c => {
                out.push(c);
                self.pos += 1;
            }
        }
        Ok(true)
    }

    fn parenthesis(&mut self, out: &mut Vec<u8>) -> Result<(), ScriptError> {
        let start = self.pos;
        while self.pos < self.text.len() {
            if self.text[self.pos] == b')' {
                self.pos += 1;
                return Ok(());
            }
            // Nested groups keep their parentheses
            self.basic(out, true, false)?;
        }
        Err(ScriptError::new("Missing end ) parenthesis.", start..self.pos))
    }

    fn quoted(&mut self, out: &mut Vec<u8>) -> Result<(), ScriptError> {
        let start = self.pos;
        while self.pos < self.text.len() {
            let c = self.text[self.pos];
            self.pos += 1;
            if c == b'"' {
                return Ok(());
            }
            out.push(c);
        }
        Err(ScriptError::new("Missing end \" quote.", start..self.pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        let mut splitter = WordSplitter::new(text);
        let mut out = Vec::new();
        while let Some(word) = splitter.next_word().unwrap() {
            out.push(word);
        }
        out
    }

    #[test]
    fn test_plain_words() {
        assert_eq!(words("  size 1 2\t3 "), vec!["size", "1", "2", "3"]);
    }

    #[test]
    fn test_vector_group_is_unwrapped() {
        assert_eq!(words("source (1, 0, 0) -x"), vec!["source", "1, 0, 0", "-x"]);
    }

    #[test]
    fn test_function_call_keeps_parenthesis() {
        assert_eq!(words("sin(3 + 4) 2"), vec!["sin(3 + 4)", "2"]);
        assert_eq!(words("(1, (2 + 3), 4)"), vec!["1, (2 + 3), 4"]);
    }

    #[test]
    fn test_quotes_are_dropped() {
        assert_eq!(words("eval \"size 1 2\""), vec!["eval", "size 1 2"]);
    }

    #[test]
    fn test_unclosed_groups() {
        let err = WordSplitter::new("(1, 2").next_word().unwrap_err();
        assert_eq!(err.message, "Missing end ) parenthesis.");
        assert_eq!(err.span, 1..5);

        let err = WordSplitter::new("\"open").next_word().unwrap_err();
        assert_eq!(err.message, "Missing end \" quote.");
        assert_eq!(err.span, 1..5);
    }

    #[test]
    fn test_parameters_stop_at_separators() {
        let mut splitter = WordSplitter::new("alpha, beta)");
        assert_eq!(splitter.next_parameter().unwrap().as_deref(), Some("alpha"));
        assert_eq!(splitter.position(), 5);
    }

    #[test]
    fn test_readable_word() {
        let mut splitter = WordSplitter::new("  effects_tex~) tail");
        assert_eq!(splitter.next_readable_word(), "effects_tex~");
    }
}
