//! Fmt command - parse a script and write it back in canonical form

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use pfx_effects::PfxConfig;

use crate::script;

/// Arguments for the fmt command
#[derive(Args)]
pub struct FmtArgs {
    /// Script to format
    pub script: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the fmt command
///
/// Scripts with errors are left untouched, since writing them back would
/// silently drop the lines that failed.
pub fn execute(args: FmtArgs, config: &PfxConfig) -> Result<()> {
    let (unit, diagnostics) = script::load(&args.script, config)?;
    let errors = script::report(&args.script, &diagnostics);
    if errors > 0 {
        bail!("{} has {} error(s), not formatting", args.script.display(), errors);
    }

    let mut text = unit.to_argscript();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }

    match &args.output {
        Some(path) => {
            std::fs::write(path, &text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Formatted {} -> {}", args.script.display(), path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fmt_writes_canonical_script() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("rumble.pfx");
        let output = dir.path().join("out.pfx");
        std::fs::write(&input, "shake   rumble\n  length 2 # seconds\nend").unwrap();

        execute(
            FmtArgs {
                script: input,
                output: Some(output.clone()),
            },
            &PfxConfig::default(),
        )
        .unwrap();

        let written = std::fs::read_to_string(output).unwrap();
        assert_eq!(written, "shake rumble\n\tlength 2\nend\n");
    }

    #[test]
    fn test_fmt_refuses_errors() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("broken.pfx");
        let output = dir.path().join("out.pfx");
        std::fs::write(&input, "shake rumble\n\tlength\nend\n").unwrap();

        let result = execute(
            FmtArgs {
                script: input,
                output: Some(output.clone()),
            },
            &PfxConfig::default(),
        );
        assert!(result.is_err());
        assert!(!output.exists());
    }
}
