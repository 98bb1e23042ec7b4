//! Check command - parse a script and report its diagnostics

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use pfx_effects::PfxConfig;
use pfx_effects::factory::keyword_of;

use crate::script;

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Script to check
    pub script: PathBuf,
}

/// Execute the check command
///
/// Fails when the script has at least one error; warnings only print.
pub fn execute(args: CheckArgs, config: &PfxConfig) -> Result<()> {
    let (unit, diagnostics) = script::load(&args.script, config)?;
    let errors = script::report(&args.script, &diagnostics);

    for (name, reference) in unit.dangling_references() {
        eprintln!(
            "{}: warning: '{}' refers to a missing {} (index {})",
            args.script.display(),
            name,
            keyword_of(reference.type_code),
            reference.index
        );
    }

    if errors > 0 {
        bail!("{} has {} error(s)", args.script.display(), errors);
    }
    println!(
        "{}: {} component(s), {} warning(s)",
        args.script.display(),
        unit.components().count(),
        diagnostics.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn check(text: &str) -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("effect.pfx");
        std::fs::write(&path, text).unwrap();
        execute(CheckArgs { script: path }, &PfxConfig::default())
    }

    #[test]
    fn test_check_clean_script() {
        assert!(check("shake rumble\n\tlength 2\nend\n").is_ok());
    }

    #[test]
    fn test_check_fails_on_error() {
        let error = check("shake rumble\n\tlength\nend\n").unwrap_err();
        assert!(error.to_string().contains("1 error(s)"));
    }
}
