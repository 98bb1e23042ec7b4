//! Diagnostics and hyperlinks collected while parsing a script

use std::fmt;
use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A problem found in a script.
///
/// `line` is zero-based. `span` is a byte range within that line of the
/// original text, so an editor can highlight the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub span: Range<usize>,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.line + 1,
            self.span.start + 1,
            self.severity,
            self.message
        )
    }
}

/// Hyperlink kind for color literals
pub const HYPERLINK_COLOR: &str = "COLOR";

/// Editor navigation annotation attached to a token.
///
/// Carries no meaning for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    pub kind: &'static str,
    pub target: String,
    pub line: usize,
    pub span: Range<usize>,
}

/// A syntax or evaluation failure inside a single line or expression.
///
/// The span is relative to the text that was being lexed; callers shift it
/// into line coordinates before turning it into a [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
    pub span: Range<usize>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_one_based() {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            message: "Unused option.".to_string(),
            line: 0,
            span: 4..9,
        };
        assert_eq!(diagnostic.to_string(), "1:5: warning: Unused option.");
        assert!(!diagnostic.is_error());
    }
}
