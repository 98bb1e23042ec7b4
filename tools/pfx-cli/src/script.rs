//! Loading scripts from disk and reporting their diagnostics

use std::path::Path;

use anyhow::{Context, Result};
use pfx_argscript::Diagnostic;
use pfx_effects::{EffectUnit, PfxConfig};
use tracing::info;

/// Parse the script at `path` with the configured stream settings
pub fn load(path: &Path, config: &PfxConfig) -> Result<(EffectUnit, Vec<Diagnostic>)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    Ok(parse(&text, path, config))
}

pub fn parse(text: &str, path: &Path, config: &PfxConfig) -> (EffectUnit, Vec<Diagnostic>) {
    let mut stream = EffectUnit::stream();
    config.configure(&mut stream, Some(path));

    let mut unit = EffectUnit::new();
    stream.process(&mut unit, text);
    let diagnostics = stream.take_diagnostics();
    info!(
        script = %path.display(),
        components = unit.components().count(),
        diagnostics = diagnostics.len(),
        "parsed script"
    );
    (unit, diagnostics)
}

/// `file:line:col: severity: message`, one-based
pub fn format_diagnostic(path: &Path, diagnostic: &Diagnostic) -> String {
    format!("{}:{}", path.display(), diagnostic)
}

/// Print every diagnostic to stderr, returning the number of errors
pub fn report(path: &Path, diagnostics: &[Diagnostic]) -> usize {
    for diagnostic in diagnostics {
        eprintln!("{}", format_diagnostic(path, diagnostic));
    }
    diagnostics.iter().filter(|d| d.is_error()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfx_argscript::Severity;
    use tempfile::tempdir;

    #[test]
    fn test_format_diagnostic() {
        let diagnostic = Diagnostic {
            severity: Severity::Error,
            message: "Unrecognised command 'lenght'.".to_string(),
            line: 1,
            span: 1..7,
        };
        assert_eq!(
            format_diagnostic(Path::new("fx/rumble.pfx"), &diagnostic),
            "fx/rumble.pfx:2:2: error: Unrecognised command 'lenght'."
        );
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rumble.pfx");
        std::fs::write(&path, "shake rumble\n\tlength 2\nend\n").unwrap();

        let (unit, diagnostics) = load(&path, &PfxConfig::default()).unwrap();
        assert!(diagnostics.is_empty());
        assert!(unit.component("rumble").is_some());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = load(&dir.path().join("missing.pfx"), &PfxConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_report_counts_errors() {
        let (_, diagnostics) = parse(
            "shake rumble\n\tbogus 1\nend\n",
            Path::new("rumble.pfx"),
            &PfxConfig::default(),
        );
        assert_eq!(report(Path::new("rumble.pfx"), &diagnostics), 1);
    }
}
