//! Decode command - read a component blob and print its script

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use pfx_effects::{Component, EffectUnit, factory_by_keyword};

/// Arguments for the decode command
#[derive(Args)]
pub struct DecodeArgs {
    /// Component blob to read
    pub blob: PathBuf,

    /// Component keyword, such as `particles` or `shake`
    #[arg(short, long)]
    pub keyword: String,

    /// Version the blob was written at (defaults to the newest supported)
    #[arg(long)]
    pub version: Option<i32>,

    /// Block name in the printed script (defaults to the file stem)
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Execute the decode command
pub fn execute(args: DecodeArgs) -> Result<()> {
    let data = std::fs::read(&args.blob).with_context(|| format!("Failed to read {}", args.blob.display()))?;
    let name = args.name.clone().unwrap_or_else(|| block_name(&args.blob));
    print!("{}", decode(&args.keyword, args.version, &name, &data)?);
    Ok(())
}

/// Script text for one component blob
pub fn decode(keyword: &str, version: Option<i32>, name: &str, data: &[u8]) -> Result<String> {
    let factory = factory_by_keyword(keyword).ok_or_else(|| anyhow!("Unknown component keyword '{}'", keyword))?;
    if !factory.has_schema() {
        bail!("Component '{}' has no binary schema", keyword);
    }
    let version = version.unwrap_or(factory.max_version);
    if !factory.supports(version) {
        bail!(
            "Unsupported {} version {} (supported: {}..={})",
            keyword,
            version,
            factory.min_version,
            factory.max_version
        );
    }

    let component = Component::decode(keyword, version, data)?;
    let mut text = component.to_argscript(name, &EffectUnit::new());
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// `sparks.particles.bin` becomes `sparks`
fn block_name(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("effect")
        .to_string()
}
