//! Name tables for integer-valued script keywords

use crate::line::Arguments;
use crate::stream::StreamState;

/// A fixed mapping between script names and integer values.
///
/// Several names may share a value; [`name_of`](Self::name_of) returns the
/// one marked canonical with [`with_canonical`](Self::with_canonical), or
/// else the first. Values without a name are written and read as integer
/// literals.
#[derive(Debug, Clone, Copy)]
pub struct ArgScriptEnum {
    entries: &'static [(&'static str, i32)],
    canonical: &'static [&'static str],
}

impl ArgScriptEnum {
    pub const fn new(entries: &'static [(&'static str, i32)]) -> Self {
        Self { entries, canonical: &[] }
    }

    /// Names written in preference to others sharing their value
    pub const fn with_canonical(self, canonical: &'static [&'static str]) -> Self {
        Self { canonical, ..self }
    }

    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(entry, _)| *entry == name)
            .map(|&(_, value)| value)
    }

    pub fn name_of(&self, value: i32) -> Option<&'static str> {
        self.canonical
            .iter()
            .copied()
            .find(|name| self.value_of(name) == Some(value))
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|&&(_, entry)| entry == value)
                    .map(|&(name, _)| name)
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.entries.iter().map(|&(name, _)| name)
    }

    /// Look up argument `index` by name or as an integer literal, reporting
    /// anything else
    pub fn parse(&self, state: &mut StreamState, args: Arguments<'_>, index: usize) -> Option<i32> {
        let word = args.get(index);
        let value = self.value_of(word).or_else(|| parse_literal(word));
        if value.is_none() {
            state.error(args.span(index), "Unknown enum value.");
        }
        value
    }
}

/// Decimal or `0x` hexadecimal integer, optionally negative
fn parse_literal(word: &str) -> Option<i32> {
    let (negative, digits) = match word.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, word),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None if digits.bytes().all(|b| b.is_ascii_digit()) => digits.parse::<i64>().ok()?,
        None => return None,
    };
    i32::try_from(if negative { -magnitude } else { magnitude }).ok()
}
