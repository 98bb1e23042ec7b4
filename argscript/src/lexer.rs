//! Expression lexer for numeric and boolean arguments
//!
//! Every numeric argument in a script is an expression, not just a literal:
//! `size (2 * pi) / 3` or `if varExists(mode) and minVersion() >= 2` are both
//! valid. The grammar, from loosest to tightest binding:
//!
//! - boolean: `or`, `and`, `not`, then comparisons (`> < == = !=`) between
//!   integer expressions, `true`/`on`/`false`/`off` and boolean functions
//! - numeric: `+ -`, then `* / %`, then right-associative `^`, then unary
//!   signs, then literals, parenthesized expressions, constants and functions
//!
//! Integer literals are decimal (up to 32 bits) or `0x` hexadecimal. Integer
//! arithmetic wraps, as the scripts were written against 64-bit wrapping math.

use std::f64::consts::{E, PI};
use std::ops::Range;

use pfx_shared::file_hash;

use crate::diagnostic::ScriptError;
use crate::words::WordSplitter;

type Result<T> = std::result::Result<T, ScriptError>;

/// Stream state visible to expression functions
pub trait ExprContext {
    fn variable_exists(&self, name: &str) -> bool;
    fn definition_exists(&self, name: &str) -> bool;
    fn command_exists(&self, keyword: &str) -> bool;
    fn min_version(&self) -> i32;
    fn max_version(&self) -> i32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    VarExists,
    DefExists,
    CommandExists,
    Eq,
    Match,
    MinVersion,
    MaxVersion,
    Hash,
}

impl Function {
    fn lookup(name: &str, has_context: bool) -> Option<Self> {
        let function = match name {
            "eq" => Function::Eq,
            "match" => Function::Match,
            "hash" => Function::Hash,
            "varExists" => Function::VarExists,
            "defExists" => Function::DefExists,
            "commandExists" => Function::CommandExists,
            "minVersion" => Function::MinVersion,
            "maxVersion" => Function::MaxVersion,
            _ => return None,
        };
        match function {
            Function::Eq | Function::Match | Function::Hash => Some(function),
            _ if has_context => Some(function),
            _ => None,
        }
    }

    fn is_boolean(self) -> bool {
        matches!(
            self,
            Function::VarExists
                | Function::DefExists
                | Function::CommandExists
                | Function::Eq
                | Function::Match
        )
    }
}

pub struct ExprLexer<'a> {
    text: &'a [u8],
    pos: usize,
    keyword_start: usize,
    context: Option<&'a dyn ExprContext>,
}

impl<'a> ExprLexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text: text.as_bytes(),
            pos: 0,
            keyword_start: 0,
            context: None,
        }
    }

    /// A lexer whose stream-aware functions (`varExists`, `minVersion`, ...)
    /// query `context`
    pub fn with_context(text: &'a str, context: &'a dyn ExprContext) -> Self {
        Self {
            context: Some(context),
            ..Self::new(text)
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether unread characters remain
    pub fn available(&self) -> bool {
        self.pos < self.text.len()
    }

    pub fn skip_whitespace(&mut self) {
        while self.pos < self.text.len() && self.text[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    pub fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    pub fn next_char(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    pub fn expect(&mut self, c: u8) -> Result<()> {
        self.expect_with(c, &format!("Expected '{}'.", c as char))
    }

    pub fn expect_with(&mut self, c: u8, message: &str) -> Result<()> {
        self.skip_whitespace();
        if self.peek() != Some(c) {
            return Err(ScriptError::new(message, self.pos..self.pos + 1));
        }
        self.pos += 1;
        Ok(())
    }

    /// `Ok(false)` at the end of the text, an error on any other character
    pub fn optional_expect(&mut self, c: u8) -> Result<bool> {
        self.skip_whitespace();
        match self.peek() {
            None => Ok(false),
            Some(found) if found == c => {
                self.pos += 1;
                Ok(true)
            }
            Some(_) => Err(ScriptError::new(
                format!("Expected '{}'.", c as char),
                self.pos..self.pos + 1,
            )),
        }
    }

    /// An identifier made of letters, digits and `_`
    pub fn parse_keyword(&mut self) -> String {
        self.skip_whitespace();
        self.read_identifier()
    }

    fn read_identifier(&mut self) -> String {
        self.keyword_start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == b'_') {
                break;
            }
            self.pos += 1;
        }
        self.slice(self.keyword_start..self.pos)
    }

    fn read_letters(&mut self) -> String {
        self.keyword_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        self.slice(self.keyword_start..self.pos)
    }

    fn slice(&self, range: Range<usize>) -> String {
        String::from_utf8_lossy(&self.text[range]).into_owned()
    }

    fn keyword_span(&self) -> Range<usize> {
        self.keyword_start..self.pos
    }

    // -- Floats --

    pub fn parse_float(&mut self) -> Result<f64> {
        self.skip_whitespace();
        let mut number = self.float_multiplication()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    number += self.float_multiplication()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    number -= self.float_multiplication()?;
                }
                _ => return Ok(number),
            }
        }
    }

    fn float_parenthesis(&mut self) -> Result<f64> {
        self.skip_whitespace();
        if self.peek() != Some(b'(') {
            return Err(ScriptError::new(
                "Expected '(' in real expression.",
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        let result = self.parse_float()?;
        self.skip_whitespace();
        if self.peek() != Some(b')') {
            return Err(ScriptError::new(
                "Expected ')' in real expression.",
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        Ok(result)
    }

    fn float_pair(&mut self, function: &str) -> Result<(f64, f64)> {
        self.skip_whitespace();
        if self.peek() != Some(b'(') {
            return Err(ScriptError::new(
                format!("Expected '(' in parameters of function '{function}'."),
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        let first = self.parse_float()?;
        self.skip_whitespace();
        if self.peek() != Some(b',') {
            return Err(ScriptError::new(
                format!(
                    "Expected ',' in parameters of function '{function}' (2 parameters are required)."
                ),
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        let second = self.parse_float()?;
        self.skip_whitespace();
        if self.peek() != Some(b')') {
            return Err(ScriptError::new(
                format!("Expected ')' in parameters of function '{function}'."),
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        Ok((first, second))
    }

    fn float_multiplication(&mut self) -> Result<f64> {
        self.skip_whitespace();
        let mut number = self.float_power()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'%') => {
                    self.pos += 1;
                    number %= self.float_power()?;
                }
                Some(b'*') => {
                    self.pos += 1;
                    number *= self.float_power()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    number /= self.float_power()?;
                }
                _ => return Ok(number),
            }
        }
    }

    fn float_power(&mut self) -> Result<f64> {
        self.skip_whitespace();
        let base = self.float_sign()?;
        self.skip_whitespace();
        if self.peek() == Some(b'^') {
            self.pos += 1;
            return Ok(base.powf(self.float_power()?));
        }
        Ok(base)
    }

    fn float_sign(&mut self) -> Result<f64> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(ScriptError::new(
                        "Expected a number.",
                        self.pos.saturating_sub(1)..self.pos,
                    ));
                }
                Some(b'+') => self.pos += 1,
                Some(b'-') => {
                    self.pos += 1;
                    return Ok(-self.float_sign()?);
                }
                Some(_) => return self.float_number(),
            }
        }
    }

    fn float_number(&mut self) -> Result<f64> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Err(ScriptError::new(
                "Missing number after operation.",
                self.pos.saturating_sub(1)..self.pos,
            ));
        };

        if c.is_ascii_digit() || c == b'.' {
            self.keyword_start = self.pos;
            while let Some(c) = self.peek() {
                // `e-6` and `E+5` belong to the literal
                let exponent_sign = (c == b'-' || c == b'+')
                    && self.pos > self.keyword_start
                    && matches!(self.text[self.pos - 1], b'e' | b'E');
                if !(c.is_ascii_digit() || c == b'e' || c == b'E' || c == b'.' || exponent_sign) {
                    break;
                }
                self.pos += 1;
            }
            return self
                .slice(self.keyword_span())
                .parse::<f32>()
                .map(f64::from)
                .map_err(|_| ScriptError::new("Invalid number format.", self.keyword_span()));
        }

        if c == b'(' {
            return self.float_parenthesis();
        }
        if !c.is_ascii_alphabetic() {
            return Err(ScriptError::new(
                "Bad real number: expecting a real number, an expression in parenthesis, or a function.",
                self.pos..self.pos + 1,
            ));
        }

        let name = self.read_identifier();
        let value = match name.as_str() {
            "pi" => PI,
            "e" => E,
            "NaN" => f64::NAN,
            "sqrt" => self.float_parenthesis()?.sqrt(),
            "exp" => self.float_parenthesis()?.exp(),
            "log" => self.float_parenthesis()?.ln(),
            "abs" => self.float_parenthesis()?.abs(),
            "sin" => self.float_parenthesis()?.sin(),
            "cos" => self.float_parenthesis()?.cos(),
            "tan" => self.float_parenthesis()?.tan(),
            "asin" => self.float_parenthesis()?.asin(),
            "acos" => self.float_parenthesis()?.acos(),
            "atan" => self.float_parenthesis()?.atan(),
            "sind" => self.float_parenthesis()?.to_radians().sin(),
            "cosd" => self.float_parenthesis()?.to_radians().cos(),
            "tand" => self.float_parenthesis()?.to_radians().tan(),
            "dasin" => self.float_parenthesis()?.asin().to_degrees(),
            "dacos" => self.float_parenthesis()?.acos().to_degrees(),
            "datan" => self.float_parenthesis()?.atan().to_degrees(),
            "floor" => self.float_parenthesis()?.floor(),
            "ceil" => self.float_parenthesis()?.ceil(),
            "round" => round_half_up(self.float_parenthesis()?),
            "sqr" => {
                let number = self.float_parenthesis()?;
                number * number
            }
            "pow" => {
                let (base, exponent) = self.float_pair("pow")?;
                base.powf(exponent)
            }
            "atan2" => {
                let (y, x) = self.float_pair("atan2")?;
                y.atan2(x)
            }
            "datan2" => {
                let (y, x) = self.float_pair("datan2")?;
                y.atan2(x).to_degrees()
            }
            _ => match Function::lookup(&name, self.context.is_some()) {
                Some(function) if function.is_boolean() => {
                    return Err(ScriptError::new(
                        format!("'{name}' is a boolean function"),
                        self.keyword_span(),
                    ));
                }
                Some(function) => self.call(function)? as f64,
                None => {
                    return Err(ScriptError::new(
                        format!("Unknown float function '{name}'."),
                        self.keyword_span(),
                    ));
                }
            },
        };
        Ok(value)
    }

    // -- Integers --

    pub fn parse_integer(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let mut number = self.int_multiplication()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    number = number.wrapping_add(self.int_multiplication()?);
                }
                Some(b'-') => {
                    self.pos += 1;
                    number = number.wrapping_sub(self.int_multiplication()?);
                }
                _ => return Ok(number),
            }
        }
    }

    fn int_parenthesis(&mut self) -> Result<i64> {
        self.skip_whitespace();
        if self.peek() != Some(b'(') {
            return Err(ScriptError::new(
                "Expected '(' in integer expression.",
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        let result = self.parse_integer()?;
        self.skip_whitespace();
        if self.peek() != Some(b')') {
            return Err(ScriptError::new(
                "Expected ')' in integer expression.",
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        Ok(result)
    }

    fn int_multiplication(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let mut number = self.int_power()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some(op @ (b'%' | b'*' | b'/')) => op,
                _ => return Ok(number),
            };
            let op_pos = self.pos;
            self.pos += 1;
            let rhs = self.int_power()?;
            number = match op {
                b'*' => number.wrapping_mul(rhs),
                _ if rhs == 0 => {
                    return Err(ScriptError::new("Division by zero.", op_pos..self.pos));
                }
                b'/' => number.wrapping_div(rhs),
                _ => number.wrapping_rem(rhs),
            };
        }
    }

    fn int_power(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let base = self.int_sign()?;
        self.skip_whitespace();
        if self.peek() == Some(b'^') {
            self.pos += 1;
            let exponent = self.int_power()?;
            return Ok((base as f64).powf(exponent as f64) as i64);
        }
        Ok(base)
    }

    fn int_sign(&mut self) -> Result<i64> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'+') => self.pos += 1,
                Some(b'-') => {
                    self.pos += 1;
                    return Ok(self.int_sign()?.wrapping_neg());
                }
                _ => return self.int_number(),
            }
        }
    }

    fn int_number(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let Some(c) = self.peek() else {
            return Err(ScriptError::new(
                "Missing number after operation.",
                self.pos.saturating_sub(1)..self.pos,
            ));
        };

        if c.is_ascii_digit() {
            self.keyword_start = self.pos;
            if c == b'0' && self.text.get(self.pos + 1) == Some(&b'x') {
                if self.pos + 2 == self.text.len() {
                    return Err(ScriptError::new(
                        "Bad number format: expecting a hexadecimal number after '0x'.",
                        self.pos..self.pos + 2,
                    ));
                }
                self.pos += 2;
                let digits_start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    self.pos += 1;
                }
                return u64::from_str_radix(&self.slice(digits_start..self.pos), 16)
                    .map(|value| value as i64)
                    .map_err(|_| ScriptError::new("Invalid number format.", self.keyword_span()));
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            return self
                .slice(self.keyword_span())
                .parse::<u32>()
                .map(i64::from)
                .map_err(|_| ScriptError::new("Invalid number format.", self.keyword_span()));
        }

        if c == b'(' {
            return self.int_parenthesis();
        }
        if !c.is_ascii_alphabetic() {
            return Err(ScriptError::new(
                "Bad integer number: expecting an integer number, an expression in parenthesis, or a function.",
                self.pos..self.pos + 1,
            ));
        }

        let name = self.read_identifier();
        match name.as_str() {
            "abs" => Ok(self.int_parenthesis()?.wrapping_abs()),
            "floor" => Ok(self.float_parenthesis()?.floor() as i64),
            "ceil" => Ok(self.float_parenthesis()?.ceil() as i64),
            "round" => Ok(round_half_up(self.float_parenthesis()?) as i64),
            "sqr" => {
                let number = self.int_parenthesis()?;
                Ok(number.wrapping_mul(number))
            }
            "true" | "on" => Ok(1),
            "false" | "off" => Ok(0),
            _ => match Function::lookup(&name, self.context.is_some()) {
                Some(function) => self.call(function),
                None => Err(ScriptError::new(
                    format!("Unknown integer function '{name}'."),
                    self.keyword_span(),
                )),
            },
        }
    }

    // -- Booleans --

    pub fn parse_boolean(&mut self) -> Result<bool> {
        Ok(self.bool_or()? != 0)
    }

    fn bool_or(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let mut left = self.bool_and()?;
        loop {
            self.skip_whitespace();
            let start = self.pos;
            if self.read_letters() != "or" {
                self.pos = start;
                return Ok(left);
            }
            // Evaluate the right side first so it is always parsed
            let right = self.bool_and()?;
            left = i64::from(right != 0 || left != 0);
        }
    }

    fn bool_and(&mut self) -> Result<i64> {
        let mut left = self.bool_not()?;
        loop {
            self.skip_whitespace();
            let start = self.pos;
            if self.read_letters() != "and" {
                self.pos = start;
                return Ok(left);
            }
            let right = self.bool_not()?;
            left = i64::from(right != 0 && left != 0);
        }
    }

    fn bool_not(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let start = self.pos;
        if self.read_letters() == "not" {
            return Ok(i64::from(self.bool_not()? == 0));
        }
        self.pos = start;
        self.bool_comparison()
    }

    fn bool_comparison(&mut self) -> Result<i64> {
        let mut left = self.bool_keyword()?;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    return Ok(i64::from(left > self.bool_comparison()?));
                }
                Some(b'<') => {
                    self.pos += 1;
                    return Ok(i64::from(left < self.bool_comparison()?));
                }
                Some(b'=') => {
                    self.pos += 1;
                    if self.peek() == Some(b'=') {
                        self.pos += 1;
                    }
                    left = i64::from(left == self.bool_comparison()?);
                }
                Some(b'!') => {
                    self.pos += 1;
                    if self.peek() != Some(b'=') {
                        let found = self.peek().map(char::from).unwrap_or(' ');
                        return Err(ScriptError::new(
                            format!("Invalid operator !{found}'. Did you mean != or 'not'?"),
                            self.pos - 1..self.pos + 1,
                        ));
                    }
                    self.pos += 1;
                    left = i64::from(left != self.bool_comparison()?);
                }
                _ => return Ok(left),
            }
        }
    }

    fn bool_parenthesis(&mut self) -> Result<i64> {
        self.skip_whitespace();
        if self.peek() != Some(b'(') {
            return Err(ScriptError::new(
                "Expected '(' in boolean expression.",
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        let result = self.bool_or()?;
        self.skip_whitespace();
        if self.peek() != Some(b')') {
            return Err(ScriptError::new(
                "Expected ')' in boolean expression.",
                self.pos..self.pos + 1,
            ));
        }
        self.pos += 1;
        Ok(result)
    }

    fn bool_keyword(&mut self) -> Result<i64> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'(') => return self.bool_parenthesis(),
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return self.parse_integer(),
        }
        let start = self.pos;
        let name = self.read_identifier();
        match name.as_str() {
            "true" | "on" => Ok(1),
            "false" | "off" => Ok(0),
            _ => match Function::lookup(&name, self.context.is_some()) {
                Some(function) => self.call(function),
                None => {
                    self.pos = start;
                    self.parse_integer()
                }
            },
        }
    }

    // -- Functions --

    fn call(&mut self, function: Function) -> Result<i64> {
        match function {
            Function::VarExists | Function::DefExists | Function::CommandExists => {
                self.expect(b'(')?;
                let word = self.parameter()?;
                self.expect(b')')?;
                let exists = self.context.is_some_and(|context| match function {
                    Function::VarExists => context.variable_exists(&word),
                    Function::DefExists => context.definition_exists(&word),
                    _ => context.command_exists(&word),
                });
                Ok(i64::from(exists))
            }
            Function::Eq | Function::Match => {
                let name = if function == Function::Eq { "eq" } else { "match" };
                self.expect(b'(')?;
                let first = self.parameter()?;
                self.skip_whitespace();
                self.expect_with(
                    b',',
                    &format!("The function '{name}' requires two parameters."),
                )?;
                let second = self.parameter()?;
                self.expect(b')')?;
                let result = if function == Function::Eq {
                    first == second
                } else {
                    wildcard_match(&first, &second)
                };
                Ok(i64::from(result))
            }
            Function::MinVersion | Function::MaxVersion => {
                self.expect(b'(')?;
                self.expect(b')')?;
                let version = self.context.map_or(0, |context| {
                    if function == Function::MinVersion {
                        context.min_version()
                    } else {
                        context.max_version()
                    }
                });
                Ok(i64::from(version))
            }
            Function::Hash => {
                self.expect(b'(')?;
                let mut splitter = WordSplitter::at(self.text, self.pos);
                let start = self.pos;
                let name = splitter.next_readable_word();
                self.pos = splitter.position();
                let hash = file_hash(&name)
                    .map_err(|error| ScriptError::new(error.to_string(), start..self.pos))?;
                self.expect(b')')?;
                Ok(i64::from(hash))
            }
        }
    }

    fn parameter(&mut self) -> Result<String> {
        let mut splitter = WordSplitter::at(self.text, self.pos);
        let word = splitter.next_parameter()?.unwrap_or_default();
        self.pos = splitter.position();
        Ok(word)
    }
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// `*` matches any run of characters, `?` exactly one
pub fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
