//! Configuration management (pfx.toml)
//!
//! Handles loading, saving, and providing defaults for tool settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use std::path::{Path, PathBuf};

use pfx_argscript::StreamState;
use pfx_shared::RegistryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const CONFIG_FILE: &str = "pfx.toml";

/// Tool configuration.
///
/// Serialized to/from TOML; every section may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PfxConfig {
    /// Name registry settings
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Script parsing settings
    #[serde(default)]
    pub parsing: ParsingConfig,
}

/// Name registry files loaded at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// Registry text files, in load order (default: none)
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Script parsing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParsingConfig {
    /// Skip hyperlink collection and unused option warnings (default: false)
    #[serde(default)]
    pub fast_parsing: bool,
    /// Folder that `include` paths are resolved against (default: the
    /// script's own folder)
    #[serde(default)]
    pub include_folder: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write config: {0}")]
    Write(#[from] std::io::Error),
}

impl PfxConfig {
    /// Read an explicit config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load every configured registry file into the process-wide file
    /// registry, returning the number of names added
    pub fn load_registries(&self) -> Result<usize, RegistryError> {
        let mut total = 0;
        for path in &self.registry.files {
            let count = pfx_shared::hash::load_registry_file(path)?;
            debug!(path = %path.display(), count, "loaded registry file");
            total += count;
        }
        if total > 0 {
            info!(files = self.registry.files.len(), names = total, "name registries loaded");
        }
        Ok(total)
    }

    /// Apply the parsing settings to a stream about to process `script`
    pub fn configure(&self, state: &mut StreamState, script: Option<&Path>) {
        state.set_fast_parsing(self.parsing.fast_parsing);
        let folder = self
            .parsing
            .include_folder
            .clone()
            .or_else(|| script.and_then(Path::parent).map(Path::to_path_buf));
        state.set_folder(folder);
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\SporeModder\PFX\config`
/// On macOS: `~/Library/Application Support/io.sporemodder.PFX`
/// On Linux: `~/.config/pfx`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "SporeModder", "PFX").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from disk.
///
/// Reads `pfx.toml` from the platform's configuration directory.
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> PfxConfig {
    config_dir()
        .and_then(|dir| std::fs::read_to_string(dir.join(CONFIG_FILE)).ok())
        .and_then(|content| toml::from_str(&content).ok())
        .unwrap_or_default()
}

/// Saves the configuration to disk.
///
/// Writes `pfx.toml` to the platform's configuration directory.
/// Creates the directory if it doesn't exist.
pub fn save(config: &PfxConfig) -> Result<(), ConfigError> {
    if let Some(dir) = config_dir() {
        save_to(config, &dir.join(CONFIG_FILE))?;
    }
    Ok(())
}

/// Saves the configuration to an explicit path, creating parent folders
pub fn save_to(config: &PfxConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =============================================================
    // Default value tests
    // =============================================================

    #[test]
    fn test_config_default() {
        let config = PfxConfig::default();
        assert!(config.registry.files.is_empty());
        assert!(!config.parsing.fast_parsing);
        assert!(config.parsing.include_folder.is_none());
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: PfxConfig = toml::from_str("").unwrap();
        assert_eq!(config, PfxConfig::default());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml_str = r#"
[parsing]
fast_parsing = true
"#;
        let config: PfxConfig = toml::from_str(toml_str).unwrap();
        assert!(config.parsing.fast_parsing);
        assert!(config.parsing.include_folder.is_none());
        assert!(config.registry.files.is_empty());
    }

    // =============================================================
    // File round trips
    // =============================================================

    #[test]
    fn test_save_and_load_from() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = PfxConfig {
            registry: RegistryConfig {
                files: vec![PathBuf::from("reg_file.txt")],
            },
            parsing: ParsingConfig {
                fast_parsing: true,
                include_folder: Some(PathBuf::from("includes")),
            },
        };
        save_to(&config, &path).unwrap();
        assert_eq!(PfxConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            PfxConfig::load_from(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[parsing\nfast_parsing = 1").unwrap();
        assert!(matches!(
            PfxConfig::load_from(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_configure_stream() {
        let config = PfxConfig::default();
        let mut state = StreamState::new();
        config.configure(&mut state, Some(Path::new("effects/fire.pfx")));
        assert_eq!(state.folder(), Some(Path::new("effects")));
        assert!(!state.fast_parsing());

        let config = PfxConfig {
            parsing: ParsingConfig {
                fast_parsing: true,
                include_folder: Some(PathBuf::from("shared")),
            },
            ..Default::default()
        };
        config.configure(&mut state, Some(Path::new("effects/fire.pfx")));
        assert_eq!(state.folder(), Some(Path::new("shared")));
        assert!(state.fast_parsing());
    }
}
