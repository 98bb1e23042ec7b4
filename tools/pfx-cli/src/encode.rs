//! Encode command - write every component of a script as a binary blob

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use pfx_effects::{EffectUnit, PfxConfig};
use tracing::debug;

use crate::script;

/// Arguments for the encode command
#[derive(Args)]
pub struct EncodeArgs {
    /// Script to encode
    pub script: PathBuf,

    /// Directory the blobs are written to (created if missing)
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Execute the encode command
pub fn execute(args: EncodeArgs, config: &PfxConfig) -> Result<()> {
    let (unit, diagnostics) = script::load(&args.script, config)?;
    let errors = script::report(&args.script, &diagnostics);
    if errors > 0 {
        bail!("{} has {} error(s), not encoding", args.script.display(), errors);
    }

    let written = write_blobs(&unit, &args.output)?;
    println!("Wrote {} component(s) to {}", written.len(), args.output.display());
    Ok(())
}

/// `<name>.<keyword>.bin` for each component, returning the written paths
pub fn write_blobs(unit: &EffectUnit, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for (name, component) in unit.components() {
        let bytes = component
            .encode()
            .with_context(|| format!("Failed to encode component '{}'", name))?;
        let path = dir.join(format!("{}.{}.bin", name, component.keyword()));
        std::fs::write(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(
            name,
            keyword = component.keyword(),
            version = component.version(),
            size = bytes.len(),
            "encoded component"
        );
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfx_effects::Component;
    use tempfile::tempdir;

    #[test]
    fn test_write_blobs_names_files() {
        let (unit, diagnostics) =
            EffectUnit::parse("shake rumble\n\tlength 2\nend\nlight glow\n\tstrength 3\nend\n");
        assert!(diagnostics.is_empty());

        let dir = tempdir().unwrap();
        let written = write_blobs(&unit, dir.path()).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("rumble.shake.bin"), dir.path().join("glow.light.bin")]
        );
    }

    #[test]
    fn test_write_blobs_decodes_back() {
        let (unit, _) = EffectUnit::parse("shake rumble\n\tlength 2\nend\n");
        let dir = tempdir().unwrap();
        write_blobs(&unit, dir.path()).unwrap();

        let rumble = unit.component("rumble").unwrap();
        let bytes = std::fs::read(dir.path().join("rumble.shake.bin")).unwrap();
        let decoded = Component::decode("shake", rumble.version(), &bytes).unwrap();
        assert_eq!(&decoded, rumble);
    }
}
