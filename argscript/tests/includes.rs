//! Include handling against real files

use std::fs;

use pfx_argscript::{ArgScriptStream, Line};
use tempfile::TempDir;

#[derive(Default)]
struct Sizes(Vec<f32>);

fn size(stream: &mut ArgScriptStream<Sizes>, data: &mut Sizes, line: &Line) {
    if let Some(args) = line.arguments(stream, 1)
        && let Some(value) = stream.parse_float(args, 0)
    {
        data.0.push(value);
    }
}

fn stream_in(dir: &TempDir) -> ArgScriptStream<Sizes> {
    let mut stream = ArgScriptStream::new();
    stream.add_default_parsers();
    stream.add_parser("size", size);
    stream.set_folder(Some(dir.path().to_path_buf()));
    stream
}

#[test]
fn test_include_relative_to_folder() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("common.pfx"), "set base 3\nsize $base\n").unwrap();

    let mut stream = stream_in(&dir);
    let mut sizes = Sizes::default();
    stream.process(&mut sizes, "include common.pfx\nsize ($base * 2)");
    assert!(stream.diagnostics().is_empty(), "{:?}", stream.diagnostics());
    assert_eq!(sizes.0, vec![3.0, 6.0]);
}

#[test]
fn test_missing_files() {
    let dir = TempDir::new().unwrap();
    let mut stream = stream_in(&dir);
    let mut sizes = Sizes::default();
    stream.process(&mut sizes, "include nope.pfx\nsinclude nope.pfx");

    let diagnostics = stream.diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].message, "The specified file does not exist.");
    assert!(diagnostics[0].is_error());
    assert_eq!(diagnostics[0].span, 8..16);
    assert!(!diagnostics[1].is_error());
}

#[test]
fn test_errors_inside_include_are_collapsed() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("broken.pfx"), "size 1\nwobble\nsize -x\n").unwrap();

    let mut stream = stream_in(&dir);
    let mut sizes = Sizes::default();
    stream.process(&mut sizes, "size 0\ninclude broken.pfx");

    assert_eq!(sizes.0, vec![0.0, 1.0]);
    let diagnostics = stream.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message,
        "Cannot include file: Unrecognised command 'wobble'."
    );
    assert_eq!(diagnostics[0].line, 1);
    // Hyperlinks and unused option warnings are not produced for included text
    assert!(stream.hyperlinks().is_empty());
}

#[test]
fn test_definitions_in_included_files() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("defs.pfx"),
        "define twice(v)\n    size &v\n    size &v\nenddef\n",
    )
    .unwrap();

    let mut stream = stream_in(&dir);
    let mut sizes = Sizes::default();
    stream.process(&mut sizes, "include defs.pfx\ncreate twice(5)");
    assert!(stream.diagnostics().is_empty(), "{:?}", stream.diagnostics());
    assert_eq!(sizes.0, vec![5.0, 5.0]);
}
