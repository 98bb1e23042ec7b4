//! Built-in keywords available in every script
//!
//! | keyword | effect |
//! |---------|--------|
//! | `set name value` | string variable |
//! | `sete name value "a b c"` | variable restricted to listed values |
//! | `setb`, `seti`, `setf`, `setc`, `setv2`..`setv4` | typed variable, evaluated once |
//! | `namespace name ... end` | scope for variables set inside |
//! | `purge name` | drop the variables of a scope |
//! | `define name(a, b) ... enddef` | record a template |
//! | `create name(1, 2)` | replay a template |
//! | `undefine name` | forget a template |
//! | `arrayCreate name count` | replay a template for `0..count` |
//! | `include path`, `sinclude path` | process another file |
//! | `eval "line"` | process a line given as text |
//! | `version n` | declare the script version |
//! | `end` | close the innermost block |
//!
//! `if`, `elseif`, `else` and `endif` are handled by the stream itself.

use std::fs;
use std::path::{Path, PathBuf};

use pfx_shared::{float_to_string, vector_to_string};
use tracing::debug;

use crate::definition::{Definition, parse_call};
use crate::line::Line;
use crate::stream::{ArgScriptBlock, ArgScriptStream, StreamState};
use crate::words::WordSplitter;

/// Pops its scope on `end`; passes every line through
struct NamespaceBlock {
    scoped: bool,
}

impl<T> ArgScriptBlock<T> for NamespaceBlock {
    fn parse_line(&mut self, _state: &mut StreamState, _data: &mut T, _line: &Line) -> bool {
        false
    }

    fn on_block_end(self: Box<Self>, state: &mut StreamState, _data: &mut T) {
        if self.scoped {
            state.end_scope();
        }
    }
}

impl<T> ArgScriptStream<T> {
    pub fn add_default_parsers(&mut self) {
        self.add_parser("set", parse_set);
        self.add_parser("sete", parse_set_enum);
        self.add_parser("setb", parse_set_boolean);
        self.add_parser("seti", parse_set_int);
        self.add_parser("setf", parse_set_float);
        self.add_parser("setc", parse_set_color);
        self.add_parser("setv2", parse_set_vector::<T, 2>);
        self.add_parser("setv3", parse_set_vector::<T, 3>);
        self.add_parser("setv4", parse_set_vector::<T, 4>);
        self.add_parser("namespace", parse_namespace);
        self.add_parser("purge", parse_purge);
        self.add_parser("define", parse_define);
        self.add_parser("undefine", parse_undefine);
        self.add_parser("create", parse_create);
        self.add_parser("arrayCreate", parse_array_create);
        self.add_parser("include", parse_include);
        self.add_parser("sinclude", parse_silent_include);
        self.add_parser("eval", parse_eval);
        self.add_parser("version", parse_version);
        self.add_parser("end", parse_end);
        for keyword in ["if", "elseif", "else", "endif", "enddef"] {
            self.state_mut().commands.insert(keyword.to_string());
        }
    }

    /// Replay a definition with the given arguments.
    ///
    /// Errors inside the body are collapsed into one error on the current
    /// line.
    pub fn create_instance(&mut self, data: &mut T, line: &Line, name: &str, arguments: &[String]) {
        let Some(definition) = self.definition(name).cloned() else {
            self.warning(line.span(), format!("Unknown definition '{name}'."));
            return;
        };
        if definition.parameters.len() != arguments.len() {
            self.error(
                line.span(),
                format!(
                    "Definition '{name}' requires {} arguments, {} have been given.",
                    definition.parameters.len(),
                    arguments.len()
                ),
            );
            return;
        }

        debug!(definition = name, arguments = arguments.len(), "creating definition instance");
        let (_, errors) = self.protected(|stream| {
            for text in &definition.lines {
                match definition.expand_line(arguments, text) {
                    Ok(expanded) => stream.process_nested(data, &[expanded]),
                    Err(error) => stream.error(error.span, error.message),
                }
            }
        });
        if let Some(first) = errors.first() {
            self.error(line.span(), format!("Error on definition: {}", first.message));
        }
    }

    fn resolve_include(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match self.folder() {
            Some(folder) if !path.is_absolute() => folder.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn parse_set<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    if let Some(args) = line.arguments(stream, 2) {
        stream.set_variable(args.get(0), args.get(1));
    }
}

fn parse_set_enum<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 3) else {
        return;
    };
    let value = args.get(1);
    let mut splitter = WordSplitter::new(args.get(2));
    let mut found = false;
    while let Ok(Some(word)) = splitter.next_word() {
        if word == value {
            found = true;
            break;
        }
    }
    if found {
        stream.set_variable(args.get(0), value);
    } else {
        stream.error(args.span(1), "Unknown enum value.");
    }
}

fn parse_set_boolean<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 2) else {
        return;
    };
    if let Some(value) = stream.parse_boolean(args, 1) {
        stream.set_variable(args.get(0), if value { "true" } else { "false" });
    }
}

fn parse_set_int<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 2) else {
        return;
    };
    if let Some(value) = stream.parse_int(args, 1) {
        stream.set_variable(args.get(0), value.to_string());
    }
}

fn parse_set_float<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 2) else {
        return;
    };
    if let Some(value) = stream.parse_float(args, 1) {
        stream.set_variable(args.get(0), float_to_string(value));
    }
}

fn parse_set_color<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 2) else {
        return;
    };
    if let Some(color) = stream.parse_color_rgba(args, 1) {
        stream.set_variable(args.get(0), vector_to_string(&color));
    }
}

fn parse_set_vector<T, const N: usize>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 2) else {
        return;
    };
    let value = match N {
        2 => stream.parse_vector2(args, 1).map(|v| v.to_vec()),
        3 => stream.parse_vector3(args, 1).map(|v| v.to_vec()),
        _ => stream.parse_vector4(args, 1).map(|v| v.to_vec()),
    };
    if let Some(value) = value {
        stream.set_variable(args.get(0), vector_to_string(&value));
    }
}

fn parse_namespace<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let scoped = match line.arguments(stream, 1) {
        Some(args) => {
            stream.start_scope(args.single());
            true
        }
        None => false,
    };
    stream.start_block(Box::new(NamespaceBlock { scoped }));
}

fn parse_purge<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    if let Some(args) = line.arguments(stream, 1) {
        stream.purge_scope(args.single());
    }
}

fn parse_define<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    // The body is recorded until `enddef` even when the header is invalid
    let header = line.arguments(stream, 1).and_then(|args| {
        let start = args.span(0).start;
        match Definition::parse_header(args.single(), stream.line_number()) {
            Ok(definition) if stream.definition(&definition.name).is_some() => {
                let end = start + definition.name.len();
                stream.error(start..end, format!("'{}' already defined.", definition.name));
                None
            }
            Ok(definition) => Some(definition),
            Err(error) => {
                stream.error(start + error.span.start..start + error.span.end, error.message);
                None
            }
        }
    });
    stream.recording = Some(header);
}

fn parse_undefine<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 1) else {
        return;
    };
    if stream.remove_definition(args.single()).is_none() {
        let message = format!("Definition '{}' does not exist.", args.single());
        stream.error(args.span(0), message);
    }
}

fn parse_create<T>(stream: &mut ArgScriptStream<T>, data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 1) else {
        return;
    };
    match parse_call(args.single()) {
        Ok((name, arguments)) => stream.create_instance(data, line, &name, &arguments),
        Err(error) => {
            let start = args.span(0).start;
            stream.error(start + error.span.start..start + error.span.end, error.message);
        }
    }
}

/// `arrayCreate name count` replays `name(i, count)` for every `i` in
/// `0..count`
fn parse_array_create<T>(stream: &mut ArgScriptStream<T>, data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 2) else {
        return;
    };
    let Some(count) = stream.parse_int(args, 1) else {
        return;
    };
    let name = args.get(0);
    for index in 0..count.max(0) {
        stream.create_instance(data, line, name, &[index.to_string(), count.to_string()]);
    }
}

fn parse_include<T>(stream: &mut ArgScriptStream<T>, data: &mut T, line: &Line) {
    include(stream, data, line, false);
}

fn parse_silent_include<T>(stream: &mut ArgScriptStream<T>, data: &mut T, line: &Line) {
    include(stream, data, line, true);
}

fn include<T>(stream: &mut ArgScriptStream<T>, data: &mut T, line: &Line, silent: bool) {
    let Some(args) = line.arguments(stream, 1) else {
        return;
    };
    let path = stream.resolve_include(args.single());
    if !path.is_file() {
        let message = "The specified file does not exist.";
        if silent {
            stream.warning(args.span(0), message);
        } else {
            stream.error(args.span(0), message);
        }
        return;
    }
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            stream.error(args.span(0), format!("Error reading file: {e}"));
            return;
        }
    };

    debug!(path = %path.display(), "including script");
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let (_, errors) = stream.protected(|stream| stream.process_nested(data, &lines));
    if let Some(first) = errors.first() {
        stream.error(line.span(), format!("Cannot include file: {}", first.message));
    }
}

fn parse_eval<T>(stream: &mut ArgScriptStream<T>, data: &mut T, line: &Line) {
    if let Some(args) = line.arguments(stream, 1) {
        let text = args.single().to_string();
        stream.process_line(data, &text);
    }
}

fn parse_version<T>(stream: &mut ArgScriptStream<T>, _data: &mut T, line: &Line) {
    let Some(args) = line.arguments(stream, 1) else {
        return;
    };
    let Some(version) = stream.parse_int(args, 0) else {
        return;
    };
    let (min, max) = stream.version_range();
    if version < min {
        stream.error(
            args.span(0),
            format!("Script version no longer supported: have {version}, need at least {min}."),
        );
    } else if version > max {
        stream.error(
            args.span(0),
            format!("Script version more recent than code: have {version}, can only handle up to {max}."),
        );
    }
    stream.set_version(version);
}

fn parse_end<T>(stream: &mut ArgScriptStream<T>, data: &mut T, line: &Line) {
    line.arguments(stream, 0);
    if !stream.end_block(data) {
        stream.error(line.keyword_span(), "Not inside a block.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorded {
        sizes: Vec<f32>,
    }

    fn size_parser(stream: &mut ArgScriptStream<Recorded>, data: &mut Recorded, line: &Line) {
        if let Some(args) = line.arguments(stream, 1)
            && let Some(value) = stream.parse_float(args, 0)
        {
            data.sizes.push(value);
        }
    }

    fn run(text: &str) -> (ArgScriptStream<Recorded>, Recorded) {
        let mut stream = ArgScriptStream::new();
        stream.add_default_parsers();
        stream.add_parser("size", size_parser);
        let mut data = Recorded::default();
        stream.process(&mut data, text);
        (stream, data)
    }

    fn messages(stream: &ArgScriptStream<Recorded>) -> Vec<String> {
        stream.diagnostics().iter().map(|d| d.message.clone()).collect()
    }

    #[test]
    fn test_typed_setters() {
        let (stream, _) = run(
            "setb b (1 > 0)\nseti i 0x10\nsetf f 1/4\nsetc c (1, 0, 0)\nsetv2 v 3\nsetv3 w (1, 2, 3)",
        );
        assert!(stream.diagnostics().is_empty(), "{:?}", stream.diagnostics());
        assert_eq!(stream.variable("b"), Some("true"));
        assert_eq!(stream.variable("i"), Some("16"));
        assert_eq!(stream.variable("f"), Some("0.25"));
        assert_eq!(stream.variable("c"), Some("(1, 0, 0, 1)"));
        assert_eq!(stream.variable("v"), Some("(3, 3)"));
        assert_eq!(stream.variable("w"), Some("(1, 2, 3)"));
    }

    #[test]
    fn test_set_enum() {
        let (stream, _) = run("sete mode fast \"slow fast\"\nsete other medium \"slow fast\"");
        assert_eq!(stream.variable("mode"), Some("fast"));
        assert_eq!(stream.variable("other"), None);
        assert_eq!(messages(&stream), vec!["Unknown enum value."]);
    }

    #[test]
    fn test_namespace_scopes_variables() {
        let script = "\
set a 1
namespace fx
    set a 2
    size $a
end
size $a
size $fx:a";
        let (stream, data) = run(script);
        assert!(stream.diagnostics().is_empty(), "{:?}", stream.diagnostics());
        assert_eq!(data.sizes, vec![2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_end_outside_block() {
        let (stream, _) = run("end");
        assert_eq!(messages(&stream), vec!["Not inside a block."]);
    }

    #[test]
    fn test_define_and_create() {
        let script = "\
define pair(a, b)
    size &a
    size &{b}
enddef
create pair(1, (2 * 3))
arrayCreate pair 0
undefine pair
undefine pair";
        let (stream, data) = run(script);
        assert_eq!(data.sizes, vec![1.0, 6.0]);
        assert_eq!(messages(&stream), vec!["Definition 'pair' does not exist."]);
    }

    #[test]
    fn test_array_create() {
        let script = "\
define item(i, n)
    size (&i / &n)
enddef
arrayCreate item 4";
        let (stream, data) = run(script);
        assert!(stream.diagnostics().is_empty(), "{:?}", stream.diagnostics());
        assert_eq!(data.sizes, vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn test_definition_errors() {
        let script = "\
define one(x)
    size &x
    size &y
enddef
define one(z)
enddef
create one(1)
create one(1, 2)
create missing()";
        let (stream, data) = run(script);
        assert_eq!(data.sizes, vec![1.0]);
        assert_eq!(
            messages(&stream),
            vec![
                "'one' already defined.",
                "Error on definition: Unknown parameter 'y'.",
                "Definition 'one' requires 1 arguments, 2 have been given.",
                "Unknown definition 'missing'.",
            ]
        );
        assert_eq!(stream.diagnostics()[1].line, 6);
        assert!(!stream.diagnostics()[3].is_error());
    }

    #[test]
    fn test_invalid_header_still_records_body() {
        let (stream, data) = run("define bad(a b)\n    size 1\nenddef\nsize 2");
        assert_eq!(data.sizes, vec![2.0]);
        assert_eq!(messages(&stream), vec!["Expected ',' after parameter name."]);
    }

    #[test]
    fn test_eval() {
        let (stream, data) = run("set s 7\neval \"size $s\"");
        assert!(stream.diagnostics().is_empty());
        assert_eq!(data.sizes, vec![7.0]);
    }

    #[test]
    fn test_version_limits() {
        let mut stream: ArgScriptStream<Recorded> = ArgScriptStream::new();
        stream.add_default_parsers();
        stream.set_version_range(1, 3);
        let mut data = Recorded::default();
        stream.process(&mut data, "version 2");
        assert!(stream.diagnostics().is_empty());
        assert_eq!(stream.version(), 2);

        stream.process(&mut data, "version 5");
        assert_eq!(stream.diagnostics()[0].message, "Script version more recent than code: have 5, can only handle up to 3.");
    }

    #[test]
    fn test_condition_functions_see_stream_state() {
        let script = "\
define burst()
enddef
if defExists(burst) and commandExists(size) and not varExists(nothing)
    size 1
endif
if commandExists(wobble)
    size 2
endif";
        let (stream, data) = run(script);
        assert!(stream.diagnostics().is_empty(), "{:?}", stream.diagnostics());
        assert_eq!(data.sizes, vec![1.0]);
    }
}
