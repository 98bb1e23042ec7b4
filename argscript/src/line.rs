//! A single logical script line: keyword, arguments, options and flags
//!
//! ```text
//! rate 10 20 30 -loop 5 2 -sustain
//! ^^^^ ^^^^^^^^ ^^^^^^^^^ ^^^^^^^^
//! keyword  args   option    flag
//! ```
//!
//! An option starts with `-` followed by a letter; everything up to the next
//! option belongs to it. `-5` is a negative number, not an option. Handlers
//! claim arguments through [`Line::arguments`], [`Line::option_arguments`] and
//! [`Line::has_flag`]; each option can be claimed once, and options nobody
//! claimed are reported after the handler returns.

use std::cell::Cell;
use std::ops::{Range, RangeFrom, RangeInclusive};

use smallvec::SmallVec;

use crate::diagnostic::ScriptError;
use crate::position::PositionMap;
use crate::stream::StreamState;
use crate::words::WordSplitter;

/// One word of a line, with its span in the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub text: String,
    pub span: Range<usize>,
    /// Original position of the first character of `text` (past an opening
    /// quote or parenthesis)
    pub(crate) content: usize,
}

#[derive(Debug)]
struct LineOption {
    name: String,
    index: usize,
    count: usize,
    used: Cell<bool>,
}

/// Accepted number of arguments.
///
/// Built from `n`, `min..=max` or `min..`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgCount {
    pub min: usize,
    pub max: usize,
}

impl From<usize> for ArgCount {
    fn from(count: usize) -> Self {
        Self {
            min: count,
            max: count,
        }
    }
}

impl From<RangeInclusive<usize>> for ArgCount {
    fn from(range: RangeInclusive<usize>) -> Self {
        Self {
            min: *range.start(),
            max: *range.end(),
        }
    }
}

impl From<RangeFrom<usize>> for ArgCount {
    fn from(range: RangeFrom<usize>) -> Self {
        Self {
            min: range.start,
            max: usize::MAX,
        }
    }
}

#[derive(Debug)]
pub struct Line {
    number: usize,
    splits: Vec<Split>,
    argument_count: usize,
    options: SmallVec<[LineOption; 4]>,
}

impl Line {
    /// Split `text` into words.
    ///
    /// `positions` maps offsets in `text` back to the line as written; error
    /// spans are already mapped.
    pub fn parse(text: &str, positions: &PositionMap, number: usize) -> Result<Self, ScriptError> {
        let bytes = text.as_bytes();
        let map = |range: Range<usize>| positions.original(range.start)..positions.original(range.end);

        let mut splitter = WordSplitter::new(text);
        let mut splits: Vec<Split> = Vec::new();
        let mut options: SmallVec<[LineOption; 4]> = SmallVec::new();
        let mut open_option: Option<(String, usize)> = None;
        let mut argument_count = None;

        loop {
            splitter.skip_whitespace();
            let start = splitter.position();
            if start >= bytes.len() {
                break;
            }

            if bytes[start] == b'-' {
                match bytes.get(start + 1) {
                    None => {
                        return Err(ScriptError::new(
                            "Expected a number or a name after - sign.",
                            map(start..start + 1),
                        ));
                    }
                    Some(c) if c.is_ascii_whitespace() => {
                        return Err(ScriptError::new(
                            "Expected a number or a name after - sign.",
                            map(start..start + 1),
                        ));
                    }
                    Some(c) if c.is_ascii_alphabetic() => {
                        match open_option.take() {
                            None => argument_count = Some(splits.len().saturating_sub(1)),
                            Some((name, index)) => options.push(LineOption {
                                name,
                                index,
                                count: splits.len() - index - 1,
                                used: Cell::new(false),
                            }),
                        }
                        let mut end = start + 1;
                        while end < bytes.len()
                            && (bytes[end] == b'_' || bytes[end].is_ascii_alphanumeric())
                        {
                            end += 1;
                        }
                        let name = String::from_utf8_lossy(&bytes[start + 1..end]).into_owned();
                        open_option = Some((name.clone(), splits.len()));
                        splits.push(Split {
                            text: format!("-{name}"),
                            span: map(start..end),
                            content: positions.original(start),
                        });
                        splitter = WordSplitter::at(bytes, end);
                        continue;
                    }
                    Some(_) => {}
                }
            }

            let word = splitter
                .next_word()
                .map_err(|error| ScriptError::new(error.message, map(error.span)))?
                .unwrap_or_default();
            let end = splitter.position();
            let content = if matches!(bytes[start], b'(' | b'"') {
                start + 1
            } else {
                start
            };
            splits.push(Split {
                text: word,
                span: map(start..end),
                content: positions.original(content),
            });
        }

        if let Some((name, index)) = open_option {
            options.push(LineOption {
                name,
                index,
                count: splits.len() - index - 1,
                used: Cell::new(false),
            });
        }

        Ok(Self {
            number,
            argument_count: argument_count.unwrap_or(splits.len().saturating_sub(1)),
            splits,
            options,
        })
    }

    /// Zero-based line number in the script
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    /// The first word, as written
    pub fn keyword(&self) -> &str {
        self.splits.first().map_or("", |split| split.text.as_str())
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    /// Positional arguments before the first option
    pub fn argument_count(&self) -> usize {
        self.argument_count
    }

    /// Span from the keyword to the last word
    pub fn span(&self) -> Range<usize> {
        match (self.splits.first(), self.splits.last()) {
            (Some(first), Some(last)) => first.span.start..last.span.end,
            _ => 0..0,
        }
    }

    pub fn keyword_span(&self) -> Range<usize> {
        self.splits.first().map_or(0..0, |split| split.span.clone())
    }

    /// Span of positional argument `index`, or the line span if absent
    pub fn argument_span(&self, index: usize) -> Range<usize> {
        if index < self.argument_count {
            self.splits[index + 1].span.clone()
        } else {
            self.span()
        }
    }

    /// Keyword plus positional arguments, stopping before the options
    fn span_until_options(&self) -> Range<usize> {
        let start = self.keyword_span().start;
        let end = self
            .splits
            .get(self.argument_count)
            .map_or(start, |split| split.span.end);
        start..end
    }

    fn find_option(&self, name: &str) -> Option<&LineOption> {
        self.options.iter().find(|option| option.name == name)
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.find_option(name).is_some()
    }

    /// Span of an option and its arguments
    pub fn option_span(&self, name: &str) -> Option<Range<usize>> {
        self.find_option(name).map(|option| {
            let start = self.splits[option.index].span.start;
            let end = self.splits[option.index + option.count].span.end;
            start..end
        })
    }

    /// Claim the positional arguments, checking their count.
    ///
    /// A count outside `count` records an error and returns `None`.
    pub fn arguments(&self, state: &mut StreamState, count: impl Into<ArgCount>) -> Option<Arguments<'_>> {
        let ArgCount { min, max } = count.into();
        if self.argument_count < min {
            state.error(
                self.span_until_options(),
                format!("Expecting at least {min} arguments for command {}", self.keyword()),
            );
            return None;
        }
        if self.argument_count > max {
            state.error(
                self.span_until_options(),
                format!("Expecting at most {max} arguments for command {}", self.keyword()),
            );
            return None;
        }
        Some(Arguments {
            line: self,
            owner: 0,
            start: 1,
            len: self.argument_count,
        })
    }

    /// Claim the arguments of option `name`.
    ///
    /// Returns `None` when the option is absent (no error) or its argument
    /// count is outside `count` (an error). The option is marked used either
    /// way.
    pub fn option_arguments(
        &self,
        state: &mut StreamState,
        name: &str,
        count: impl Into<ArgCount>,
    ) -> Option<Arguments<'_>> {
        let ArgCount { min, max } = count.into();
        let option = self
            .options
            .iter()
            .find(|option| !option.used.get() && option.name == name)?;
        option.used.set(true);
        let span = self.splits[option.index].span.clone();
        if option.count < min {
            state.error(span, format!("Expecting at least {min} arguments for option {name}"));
            return None;
        }
        if option.count > max {
            state.error(span, format!("Expecting at most {max} arguments for option {name}"));
            return None;
        }
        Some(Arguments {
            line: self,
            owner: option.index,
            start: option.index + 1,
            len: option.count,
        })
    }

    /// Claim a flag: an option without arguments
    pub fn has_flag(&self, state: &mut StreamState, name: &str) -> bool {
        let Some(option) = self
            .options
            .iter()
            .find(|option| !option.used.get() && option.name == name)
        else {
            return false;
        };
        if option.count != 0 {
            state.error(
                self.splits[option.index].span.clone(),
                format!("Not expecting any arguments for flag option {name}"),
            );
            return false;
        }
        option.used.set(true);
        true
    }

    /// Spans of options no handler claimed
    pub fn unused_options(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.options
            .iter()
            .filter(|option| !option.used.get())
            .map(|option| self.splits[option.index].span.clone())
    }
}

/// A claimed run of words: the positional arguments of a line or the
/// arguments of one option
#[derive(Debug, Clone, Copy)]
pub struct Arguments<'a> {
    line: &'a Line,
    owner: usize,
    start: usize,
    len: usize,
}

impl<'a> Arguments<'a> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Word `index`; empty if out of range
    pub fn get(&self, index: usize) -> &'a str {
        if index < self.len {
            &self.line.splits[self.start + index].text
        } else {
            ""
        }
    }

    /// The first word
    pub fn single(&self) -> &'a str {
        self.get(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + 'a {
        let line = self.line;
        (self.start..self.start + self.len).map(move |index| line.splits[index].text.as_str())
    }

    /// Span of word `index`; the whole run if out of range
    pub fn span(&self, index: usize) -> Range<usize> {
        if index < self.len {
            self.line.splits[self.start + index].span.clone()
        } else {
            self.full_span()
        }
    }

    /// Original position of the first content character of word `index`
    pub(crate) fn content_start(&self, index: usize) -> usize {
        if index < self.len {
            self.line.splits[self.start + index].content
        } else {
            self.full_span().start
        }
    }

    /// From the first to the last word, or the owning keyword/option if empty
    pub fn full_span(&self) -> Range<usize> {
        if self.len == 0 {
            return self.line.splits[self.owner].span.clone();
        }
        let first = &self.line.splits[self.start];
        let last = &self.line.splits[self.start + self.len - 1];
        first.span.start..last.span.end
    }

    pub fn line(&self) -> &'a Line {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> Line {
        Line::parse(text, &PositionMap::new(), 0).unwrap()
    }

    #[test]
    fn test_keyword_arguments_and_options() {
        let line = line("rate 10 20 30 -loop 5 2 -sustain");
        assert_eq!(line.keyword(), "rate");
        assert_eq!(line.argument_count(), 3);
        assert!(line.has_option("loop"));
        assert!(line.has_option("sustain"));
        assert!(!line.has_option("hold"));

        let mut state = StreamState::new();
        let args = line.arguments(&mut state, 1..).unwrap();
        assert_eq!(args.iter().collect::<Vec<_>>(), vec!["10", "20", "30"]);
        let loop_args = line.option_arguments(&mut state, "loop", 1..=2).unwrap();
        assert_eq!(loop_args.get(0), "5");
        assert_eq!(loop_args.get(1), "2");
        assert!(line.has_flag(&mut state, "sustain"));
        assert!(state.diagnostics().is_empty());
        assert_eq!(line.unused_options().count(), 0);
    }

    #[test]
    fn test_negative_numbers_are_arguments() {
        let line = line("offset -5 -0.5 -x");
        assert_eq!(line.argument_count(), 2);
        assert_eq!(line.splits()[1].text, "-5");
        assert!(line.has_option("x"));
    }

    #[test]
    fn test_spans() {
        let line = line("size (1, 2) -vary 3");
        assert_eq!(line.keyword_span(), 0..4);
        assert_eq!(line.splits()[1].span, 5..11);
        assert_eq!(line.splits()[1].text, "1, 2");
        assert_eq!(line.splits()[1].content, 6);
        assert_eq!(line.option_span("vary"), Some(12..19));
        assert_eq!(line.span(), 0..19);
    }

    #[test]
    fn test_argument_count_errors() {
        let line = line("life 1 2 3 -x");
        let mut state = StreamState::new();
        assert!(line.arguments(&mut state, 1..=2).is_none());
        assert!(line.arguments(&mut state, 4).is_none());
        let messages: Vec<_> = state.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Expecting at most 2 arguments for command life",
                "Expecting at least 4 arguments for command life",
            ]
        );
        assert_eq!(state.diagnostics()[0].span, 0..10);
    }

    #[test]
    fn test_option_claimed_once() {
        let line = line("size 1 -vary 2 -vary");
        let mut state = StreamState::new();
        assert!(line.option_arguments(&mut state, "vary", 1).is_some());
        // The second -vary has no arguments and is still unclaimed
        assert!(line.has_flag(&mut state, "vary"));
        assert!(!line.has_flag(&mut state, "vary"));
    }

    #[test]
    fn test_flag_with_arguments_is_an_error() {
        let line = line("size 1 -loop 3");
        let mut state = StreamState::new();
        assert!(!line.has_flag(&mut state, "loop"));
        assert_eq!(
            state.diagnostics()[0].message,
            "Not expecting any arguments for flag option loop"
        );
        assert_eq!(line.unused_options().collect::<Vec<_>>(), vec![7..12]);
    }

    #[test]
    fn test_bad_option_sign() {
        let err = Line::parse("size 1 - 2", &PositionMap::new(), 0).unwrap_err();
        assert_eq!(err.message, "Expected a number or a name after - sign.");
        assert_eq!(err.span, 7..8);
    }

    #[test]
    fn test_mapped_positions() {
        // "size $s" where $s expanded to "10"
        let mut positions = PositionMap::new();
        positions.add(5, 5);
        positions.add(7, 7);
        let line = Line::parse("size 10 \"open", &positions, 3).unwrap_err();
        assert_eq!(line.message, "Missing end \" quote.");
        assert_eq!(line.span, 9..13);
    }
}
