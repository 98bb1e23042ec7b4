//! ArgScript: the line-oriented text format of PFX effect scripts.
//!
//! A script is a sequence of lines, each a keyword followed by arguments and
//! `-options`. Blocks open with a keyword and close with `end`.
//!
//! # Key Features
//!
//! - **Expressions everywhere**: numeric arguments accept `+ - * / % ^`,
//!   constants and functions; `if` conditions accept boolean logic
//! - **Variables and scopes**: `set`, typed setters, `namespace` blocks
//! - **Templates**: `define ... enddef`, `create`, `arrayCreate`
//! - **Includes**: `include`/`sinclude`, relative to the script folder
//! - **Diagnostics**: errors and warnings carry a line and a byte span of the
//!   original text, even after variable replacement
//!
//! # Usage
//!
//! ```
//! use pfx_argscript::{ArgScriptStream, Line};
//!
//! #[derive(Default)]
//! struct Sizes(Vec<f32>);
//!
//! fn size(stream: &mut ArgScriptStream<Sizes>, data: &mut Sizes, line: &Line) {
//!     if let Some(args) = line.arguments(stream, 1..) {
//!         stream.parse_floats(args, &mut data.0);
//!     }
//! }
//!
//! let mut stream = ArgScriptStream::new();
//! stream.add_default_parsers();
//! stream.add_parser("size", size);
//!
//! let mut sizes = Sizes::default();
//! stream.process(&mut sizes, "set big 4\nsize 1 $big (2 * 3)");
//! assert!(stream.diagnostics().is_empty());
//! assert_eq!(sizes.0, vec![1.0, 4.0, 6.0]);
//! ```

mod coerce;
mod defaults;
mod definition;
mod diagnostic;
mod enums;
mod lexer;
mod line;
mod position;
mod stream;
mod words;
mod writer;

pub use definition::Definition;
pub use diagnostic::{Diagnostic, HYPERLINK_COLOR, Hyperlink, ScriptError, Severity};
pub use enums::ArgScriptEnum;
pub use lexer::{ExprContext, ExprLexer, wildcard_match};
pub use line::{ArgCount, Arguments, Line, Split};
pub use position::PositionMap;
pub use stream::{ArgScriptBlock, ArgScriptStream, ParserTable, StreamParser, StreamState};
pub use writer::{ArgScriptWriter, is_default, is_default_color, is_default_with};
