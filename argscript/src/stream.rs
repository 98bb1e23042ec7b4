//! The line-oriented script engine
//!
//! [`ArgScriptStream`] feeds each line through comment stripping, define
//! recording, `if` evaluation and variable replacement, then dispatches it to
//! the innermost open block that accepts it or to the parser registered for
//! its keyword. [`StreamState`] is the part handlers mutate: diagnostics,
//! variables, definitions and version limits.

use std::ops::{Deref, DerefMut, Range};
use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};

use crate::definition::Definition;
use crate::diagnostic::{Diagnostic, Hyperlink, ScriptError, Severity};
use crate::lexer::{ExprContext, ExprLexer};
use crate::line::Line;
use crate::position::PositionMap;

/// Keyword to handler lookup, case-insensitive
#[derive(Debug, Clone)]
pub struct ParserTable<P> {
    entries: HashMap<String, P>,
}

impl<P> Default for ParserTable<P> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<P: Copy> ParserTable<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, keyword: &str, parser: P) {
        self.entries.insert(keyword.to_ascii_lowercase(), parser);
    }

    pub fn get(&self, keyword: &str) -> Option<P> {
        self.entries.get(&keyword.to_ascii_lowercase()).copied()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.entries.contains_key(&keyword.to_ascii_lowercase())
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Everything a line handler may read or change besides the data being
/// built
#[derive(Debug)]
pub struct StreamState {
    diagnostics: Vec<Diagnostic>,
    hyperlinks: Vec<Hyperlink>,
    pub(crate) line_number: usize,
    fast_parsing: bool,
    pub(crate) include_depth: usize,
    variables: HashMap<String, String>,
    scopes: Vec<String>,
    definitions: HashMap<String, Definition>,
    pub(crate) commands: HashSet<String>,
    version: i32,
    min_version: i32,
    max_version: i32,
    folder: Option<PathBuf>,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            diagnostics: Vec::new(),
            hyperlinks: Vec::new(),
            line_number: 0,
            fast_parsing: false,
            include_depth: 0,
            variables: HashMap::new(),
            scopes: Vec::new(),
            definitions: HashMap::new(),
            commands: HashSet::new(),
            version: 0,
            min_version: 0,
            max_version: i32::MAX,
            folder: None,
        }
    }
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    fn report(&mut self, severity: Severity, span: Range<usize>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
            line: self.line_number,
            span,
        });
    }

    pub fn error(&mut self, span: Range<usize>, message: impl Into<String>) {
        self.report(Severity::Error, span, message);
    }

    pub fn warning(&mut self, span: Range<usize>, message: impl Into<String>) {
        self.report(Severity::Warning, span, message);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub(crate) fn diagnostics_len(&self) -> usize {
        self.diagnostics.len()
    }

    pub(crate) fn split_diagnostics(&mut self, at: usize) -> Vec<Diagnostic> {
        self.diagnostics.split_off(at)
    }

    /// Hyperlinks are only kept for the top-level file, and never when fast
    /// parsing
    pub fn collects_hyperlinks(&self) -> bool {
        !self.fast_parsing && self.include_depth == 0
    }

    pub fn add_hyperlink(&mut self, kind: &'static str, target: impl Into<String>, span: Range<usize>) {
        if self.collects_hyperlinks() {
            self.hyperlinks.push(Hyperlink {
                kind,
                target: target.into(),
                line: self.line_number,
                span,
            });
        }
    }

    pub fn hyperlinks(&self) -> &[Hyperlink] {
        &self.hyperlinks
    }

    /// Zero-based number of the line being processed
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn fast_parsing(&self) -> bool {
        self.fast_parsing
    }

    /// Skip editor-only work such as hyperlinks and unused option warnings
    pub fn set_fast_parsing(&mut self, fast_parsing: bool) {
        self.fast_parsing = fast_parsing;
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    pub fn version_range(&self) -> (i32, i32) {
        (self.min_version, self.max_version)
    }

    pub fn set_version_range(&mut self, min: i32, max: i32) {
        self.min_version = min;
        self.max_version = max;
    }

    /// Base folder for relative `include` paths
    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    pub fn set_folder(&mut self, folder: Option<PathBuf>) {
        self.folder = folder;
    }

    pub(crate) fn reset_for_process(&mut self) {
        self.diagnostics.clear();
        self.hyperlinks.clear();
        self.line_number = 0;
        self.include_depth = 0;
    }

    // Variables

    fn scoped_name(&self, name: &str) -> String {
        let mut key = String::new();
        for scope in &self.scopes {
            key.push_str(scope);
            key.push(':');
        }
        key.push_str(name);
        key
    }

    /// Set a variable in the current scope
    pub fn set_variable(&mut self, name: &str, value: impl Into<String>) {
        let key = self.scoped_name(name);
        self.variables.insert(key, value.into());
    }

    /// Look up a variable from the innermost scope outwards.
    ///
    /// A leading `:` names the global variable directly.
    pub fn variable(&self, name: &str) -> Option<&str> {
        if let Some(global) = name.strip_prefix(':') {
            return self.variables.get(global).map(String::as_str);
        }
        for depth in (1..=self.scopes.len()).rev() {
            let mut key = self.scopes[..depth].join(":");
            key.push(':');
            key.push_str(name);
            if let Some(value) = self.variables.get(&key) {
                return Some(value);
            }
        }
        self.variables.get(name).map(String::as_str)
    }

    pub fn start_scope(&mut self, name: &str) {
        self.scopes.push(name.to_string());
    }

    pub fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Drop every variable declared in the named scope
    pub fn purge_scope(&mut self, name: &str) {
        let prefix = format!("{name}:");
        self.variables.retain(|key, _| !key.starts_with(&prefix));
    }

    // Definitions

    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    pub fn add_definition(&mut self, definition: Definition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn remove_definition(&mut self, name: &str) -> Option<Definition> {
        self.definitions.remove(name)
    }

    /// Expand `$name` and `${name}` references.
    ///
    /// Errors are reported and yield `None`. The returned map translates
    /// offsets in the expanded text back to `text`.
    pub(crate) fn replace_variables(&mut self, text: &str) -> Option<(String, PositionMap)> {
        if !text.contains('$') {
            return Some((text.to_string(), PositionMap::new()));
        }
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut positions = PositionMap::new();
        let mut copied = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'$' {
                i += 1;
                continue;
            }
            out.push_str(&text[copied..i]);
            positions.add(out.len(), i);
            let dollar = i;
            i += 1;
            if i == bytes.len() {
                self.error(dollar..i, "Missing variable name after '$'.");
                return None;
            }
            let braces = bytes[i] == b'{';
            if braces {
                i += 1;
                if i == bytes.len() {
                    self.error(
                        dollar..i,
                        "Missing variable name after '{'; the format should be '${variableName}'.",
                    );
                    return None;
                }
            }
            let name_start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b':') {
                i += 1;
            }
            let name = &text[name_start..i];
            if name.is_empty() {
                self.error(dollar..i.max(dollar + 1), "Missing variable name after '$'.");
                return None;
            }
            if name.as_bytes()[0].is_ascii_digit() {
                self.error(
                    name_start..i,
                    format!("Invalid variable name '{name}': variable names cannot start with a numeric digit."),
                );
                return None;
            }
            if braces {
                if bytes.get(i) != Some(&b'}') {
                    self.error(name_start..i, format!("Missing closing '}}' after variable '{name}'."));
                    return None;
                }
                i += 1;
            }
            let Some(value) = self.variable(name) else {
                self.error(dollar..i, format!("Unknown variable '{name}'."));
                return None;
            };
            out.push_str(value);
            positions.add(out.len(), i);
            copied = i;
        }
        out.push_str(&text[copied..]);
        Some((out, positions))
    }
}

impl ExprContext for StreamState {
    fn variable_exists(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    fn definition_exists(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    fn command_exists(&self, keyword: &str) -> bool {
        self.commands.contains(&keyword.to_ascii_lowercase())
    }

    fn min_version(&self) -> i32 {
        self.min_version
    }

    fn max_version(&self) -> i32 {
        self.max_version
    }
}

/// Handler for a top-level keyword
pub type StreamParser<T> = fn(&mut ArgScriptStream<T>, &mut T, &Line);

/// An open block (`particles name ... end`).
///
/// Blocks see lines before the stream's own parsers; the innermost block is
/// asked first.
pub trait ArgScriptBlock<T> {
    /// Handle `line`; returning false passes it on to the enclosing blocks
    /// and then the stream
    fn parse_line(&mut self, state: &mut StreamState, data: &mut T, line: &Line) -> bool;

    /// Called by `end`
    fn on_block_end(self: Box<Self>, state: &mut StreamState, data: &mut T) {
        let _ = (state, data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Branch {
    /// Lines are being processed
    Taking,
    /// No branch taken yet; a later `elseif`/`else` may take one
    Pending,
    /// A branch was already taken
    Done,
    /// Nested inside a branch that is not taken
    Skipped,
}

pub struct ArgScriptStream<T> {
    state: StreamState,
    parsers: ParserTable<StreamParser<T>>,
    blocks: Vec<Box<dyn ArgScriptBlock<T>>>,
    pub(crate) conditions: Vec<Branch>,
    /// `Some(None)` records a definition whose header was invalid
    pub(crate) recording: Option<Option<Definition>>,
    block_comment_start: Option<usize>,
}

impl<T> Default for ArgScriptStream<T> {
    fn default() -> Self {
        Self {
            state: StreamState::new(),
            parsers: ParserTable::new(),
            blocks: Vec::new(),
            conditions: Vec::new(),
            recording: None,
            block_comment_start: None,
        }
    }
}

impl<T> Deref for ArgScriptStream<T> {
    type Target = StreamState;

    fn deref(&self) -> &StreamState {
        &self.state
    }
}

impl<T> DerefMut for ArgScriptStream<T> {
    fn deref_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }
}

impl<T> ArgScriptStream<T> {
    /// A stream with no keywords registered
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }

    pub fn add_parser(&mut self, keyword: &str, parser: StreamParser<T>) {
        self.parsers.add(keyword, parser);
        self.state.commands.insert(keyword.to_ascii_lowercase());
    }

    pub fn has_parser(&self, keyword: &str) -> bool {
        self.parsers.contains(keyword)
    }

    pub fn start_block(&mut self, block: Box<dyn ArgScriptBlock<T>>) {
        self.blocks.push(block);
    }

    /// Close the innermost block; false if none is open
    pub fn end_block(&mut self, data: &mut T) -> bool {
        match self.blocks.pop() {
            Some(block) => {
                block.on_block_end(&mut self.state, data);
                true
            }
            None => false,
        }
    }

    pub fn inside_block(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Process a whole script.
    ///
    /// Diagnostics, hyperlinks and open blocks from a previous run are
    /// discarded; variables and definitions persist.
    pub fn process(&mut self, data: &mut T, text: &str) {
        self.state.reset_for_process();
        self.blocks.clear();
        self.conditions.clear();
        self.recording = None;
        self.block_comment_start = None;

        let lines: Vec<&str> = text.lines().collect();
        for (number, line) in lines.iter().enumerate() {
            self.state.line_number = number;
            self.process_line(data, line);
        }

        if let Some(start) = self.block_comment_start.take() {
            let end = lines.get(start).map_or(0, |line| line.len());
            self.state.line_number = start;
            self.state.error(0..end, "Block comment not closed. Close the comment with #>");
        }
    }

    /// Process the lines of an included file or definition, attributing any
    /// diagnostics to the current line
    pub(crate) fn process_nested(&mut self, data: &mut T, lines: &[String]) {
        let line_number = self.state.line_number;
        for line in lines {
            self.process_line(data, line);
            self.state.line_number = line_number;
        }
    }

    /// Run `process` with hyperlinks disabled and collect the errors it
    /// reports instead of leaving them in the stream.
    ///
    /// Warnings raised inside are dropped.
    pub fn protected<R>(&mut self, process: impl FnOnce(&mut Self) -> R) -> (R, Vec<Diagnostic>) {
        let start = self.state.diagnostics_len();
        let comment = self.block_comment_start.take();
        self.state.include_depth += 1;
        let result = process(self);
        self.state.include_depth -= 1;
        self.block_comment_start = comment;
        let errors = self
            .state
            .split_diagnostics(start)
            .into_iter()
            .filter(Diagnostic::is_error)
            .collect();
        (result, errors)
    }

    pub fn process_line(&mut self, data: &mut T, raw: &str) {
        let Some(text) = self.strip_comments(raw) else {
            return;
        };
        if text.trim().is_empty() {
            return;
        }
        if self.record_definition(&text) {
            return;
        }
        if self.conditional_line(&text) {
            return;
        }
        let Some(line) = self.to_line(&text) else {
            return;
        };
        if line.is_empty() {
            return;
        }

        let handled = self
            .blocks
            .iter_mut()
            .rev()
            .any(|block| block.parse_line(&mut self.state, data, &line));
        if handled {
            self.finish_line(&line);
            return;
        }

        match self.parsers.get(line.keyword()) {
            Some(parser) => {
                parser(self, data, &line);
                self.finish_line(&line);
            }
            None => {
                let message = format!("Unrecognised command '{}'.", line.keyword());
                self.state.error(line.keyword_span(), message);
            }
        }
    }

    /// Parse `text` into a [`Line`] after variable replacement, reporting
    /// failures
    fn to_line(&mut self, text: &str) -> Option<Line> {
        let (processed, positions) = self.state.replace_variables(text)?;
        match Line::parse(&processed, &positions, self.state.line_number) {
            Ok(line) => Some(line),
            Err(error) => {
                self.state.error(error.span, error.message);
                None
            }
        }
    }

    fn finish_line(&mut self, line: &Line) {
        if self.state.collects_hyperlinks() {
            let unused: Vec<_> = line.unused_options().collect();
            for span in unused {
                self.state.warning(span, "Unused option.");
            }
        }
    }

    /// Blank out `#` line comments and `#< ... #>` block comments, keeping
    /// every other byte in place
    fn strip_comments(&mut self, raw: &str) -> Option<String> {
        let bytes = raw.as_bytes();
        let mut out = bytes.to_vec();
        let mut i = 0;
        while i < bytes.len() {
            if self.block_comment_start.is_some() {
                let end = bytes[i..].windows(2).position(|pair| pair == b"#>");
                match end {
                    Some(offset) => {
                        let end = i + offset + 2;
                        out[i..end].fill(b' ');
                        i = end;
                        self.block_comment_start = None;
                    }
                    None => {
                        out[i..].fill(b' ');
                        break;
                    }
                }
                continue;
            }
            if bytes[i] == b'#' {
                match bytes.get(i + 1) {
                    Some(b'<') => {
                        self.block_comment_start = Some(self.state.line_number);
                        out[i..i + 2].fill(b' ');
                        i += 2;
                        continue;
                    }
                    Some(b'>') => {
                        self.state.error(i..i + 2, "Missing start of block comment (#<).");
                        return None;
                    }
                    _ => {
                        out[i..].fill(b' ');
                        break;
                    }
                }
            }
            i += 1;
        }
        Some(String::from_utf8_lossy(&out).into_owned())
    }

    /// Append the line to the definition being recorded, if any
    fn record_definition(&mut self, text: &str) -> bool {
        if self.recording.is_none() {
            return false;
        }
        if first_word(text) == "enddef" {
            if let Some(definition) = self.recording.take().flatten() {
                self.state.add_definition(definition);
            }
        } else if let Some(Some(definition)) = &mut self.recording {
            definition.lines.push(text.to_string());
        }
        true
    }

    /// Track `if`, `else`, `elseif` and `endif`; true if the line must not
    /// be processed further
    fn conditional_line(&mut self, text: &str) -> bool {
        let word = first_word(text);
        let top = self.conditions.last().copied();
        let taking = top.is_none_or(|branch| branch == Branch::Taking);
        match (word, top) {
            ("if", _) => {
                let branch = if !taking {
                    Branch::Skipped
                } else if self.evaluate_condition(text) {
                    Branch::Taking
                } else {
                    Branch::Pending
                };
                self.conditions.push(branch);
                true
            }
            ("else" | "elseif" | "endif", None) => {
                let start = text.len() - text.trim_start().len();
                self.state.error(
                    start..start + word.len(),
                    format!("'{word}' without a matching 'if'."),
                );
                true
            }
            ("endif", Some(_)) => {
                self.conditions.pop();
                true
            }
            ("else", Some(branch)) => {
                let next = match branch {
                    Branch::Taking => Branch::Done,
                    Branch::Pending => Branch::Taking,
                    other => other,
                };
                self.set_top(next);
                true
            }
            ("elseif", Some(branch)) => {
                let next = match branch {
                    Branch::Taking => Branch::Done,
                    Branch::Pending if self.evaluate_condition(text) => Branch::Taking,
                    other => other,
                };
                self.set_top(next);
                true
            }
            _ => !taking,
        }
    }

    fn set_top(&mut self, branch: Branch) {
        if let Some(top) = self.conditions.last_mut() {
            *top = branch;
        }
    }

    /// Evaluate the boolean expression following the keyword of an `if` or
    /// `elseif` line
    fn evaluate_condition(&mut self, text: &str) -> bool {
        let Some((processed, positions)) = self.state.replace_variables(text) else {
            return false;
        };
        let keyword_start = processed.len() - processed.trim_start().len();
        let keyword_end = processed[keyword_start..]
            .find(|c: char| c.is_ascii_whitespace())
            .map_or(processed.len(), |offset| keyword_start + offset);
        let expression = &processed[keyword_end..];
        let map = |range: Range<usize>| {
            positions.original(keyword_end + range.start)..positions.original(keyword_end + range.end)
        };

        if expression.trim().is_empty() {
            let span = positions.original(keyword_start)..positions.original(keyword_end);
            let message = format!("Expecting a condition for command {}", &processed[keyword_start..keyword_end]);
            self.state.error(span, message);
            return false;
        }

        let result = {
            let mut lexer = ExprLexer::with_context(expression, &self.state);
            lexer.parse_boolean().and_then(|value| {
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
            Ok(value) => value,
            Err(error) => {
                self.state.error(map(error.span), error.message);
                false
            }
        }
    }
}

fn first_word(text: &str) -> &str {
    text.split_ascii_whitespace().next().unwrap_or("")
}
