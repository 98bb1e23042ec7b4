//! Name hashing and name registries
//!
//! Resources are addressed by 32-bit FNV-1 hashes of their lowercase names.
//! Two process-wide registries map hashes back to names:
//!
//! - the **file registry**, loaded from registry text files at start-up
//! - the **project registry**, filled with every name hashed while parsing
//!
//! Names ending in `~` are never hashed: they must already be registered.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, PoisonError, RwLock};

use hashbrown::HashMap;
use thiserror::Error;
use tracing::debug;

/// FNV-1 offset basis
pub const FNV_OFFSET: u32 = 0x811C_9DC5;

/// FNV-1 prime
pub const FNV_PRIME: u32 = 0x0100_0193;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("Unable to find {0} hash.  It does not exist in the reg_file registry.")]
    UnregisteredName(String),
    #[error("Invalid hexadecimal number '{0}'.")]
    InvalidHex(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read registry file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid hash '{text}' on registry line {line}")]
    InvalidHash { line: usize, text: String },
}

/// FNV-1 hash of the lowercased name, over its UTF-16 code units
pub fn fnv_hash(name: &str) -> u32 {
    name.to_lowercase()
        .encode_utf16()
        .fold(FNV_OFFSET, |hash, unit| {
            hash.wrapping_mul(FNV_PRIME) ^ u32::from(unit)
        })
}

/// `0x` followed by eight lowercase hex digits
pub fn hex_to_string(value: u32) -> String {
    format!("0x{:08x}", value)
}

/// `0x` followed by eight uppercase hex digits
pub fn hex_to_string_upper(value: u32) -> String {
    format!("0x{:08X}", value)
}

/// Parse the digits after a `0x` or `#` prefix as an unsigned 32-bit number
pub fn parse_hex(digits: &str) -> Result<u32, HashError> {
    u32::from_str_radix(digits, 16).map_err(|_| HashError::InvalidHex(digits.to_string()))
}

/// Bidirectional name/hash table
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    hashes: HashMap<String, u32>,
    names: HashMap<u32, String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn add(&mut self, name: &str, hash: u32) {
        if name.ends_with('~') {
            self.hashes.insert(name.to_lowercase(), hash);
        }
        self.hashes.insert(name.to_string(), hash);
        self.names.insert(hash, name.to_string());
    }

    pub fn hash_of(&self, name: &str) -> Option<u32> {
        self.hashes
            .get(name)
            .or_else(|| self.hashes.get(&name.to_lowercase()))
            .copied()
    }

    pub fn name_of(&self, hash: u32) -> Option<&str> {
        self.names.get(&hash).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
        self.names.clear();
    }

    /// Add entries from registry text.
    ///
    /// One entry per line: `name` (hash computed) or `name<TAB>0xHASH`.
    /// `//` starts a comment and lines starting with `#` are skipped.
    pub fn read_str(&mut self, text: &str) -> Result<usize, RegistryError> {
        let mut count = 0;
        for (index, line) in text.lines().enumerate() {
            let entry = line.split("//").next().unwrap_or_default().trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            let mut parts = entry.split('\t');
            let name = parts.next().unwrap_or_default().trim();
            match parts.next().map(str::trim) {
                None => {
                    self.names.insert(fnv_hash(name), name.to_string());
                }
                Some(hash_text) => {
                    let hash = parse_registry_hash(hash_text).ok_or_else(|| {
                        RegistryError::InvalidHash {
                            line: index + 1,
                            text: hash_text.to_string(),
                        }
                    })?;
                    self.add(name, hash);
                }
            }
            count += 1;
        }
        Ok(count)
    }

    pub fn read_file(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.read_str(&text)
    }

    /// Registry text, sorted by name; hashes are only written when they
    /// differ from the name's own hash
    pub fn to_text(&self) -> String {
        let mut entries: Vec<(&u32, &String)> = self.names.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1));

        let mut text = String::new();
        for (hash, name) in entries {
            if fnv_hash(name) == *hash {
                text.push_str(name);
            } else {
                text.push_str(&format!("{}\t{}", name, hex_to_string(*hash)));
            }
            text.push('\n');
        }
        text
    }
}

fn parse_registry_hash(text: &str) -> Option<u32> {
    if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("#")) {
        u32::from_str_radix(digits, 16).ok()
    } else {
        text.parse::<i64>().ok().map(|value| value as u32)
    }
}

static FILE_REGISTRY: LazyLock<RwLock<NameRegistry>> =
    LazyLock::new(|| RwLock::new(NameRegistry::new()));

static PROJECT_REGISTRY: LazyLock<RwLock<NameRegistry>> =
    LazyLock::new(|| RwLock::new(NameRegistry::new()));

/// Load a registry file into the process-wide file registry
pub fn load_registry_file(path: &Path) -> Result<usize, RegistryError> {
    let mut registry = NameRegistry::new();
    let count = registry.read_file(path)?;
    let mut files = FILE_REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    for (hash, name) in registry.names {
        files.add(&name, hash);
    }
    debug!("Loaded {} names from {}", count, path.display());
    Ok(count)
}

/// Register a single name in the file registry
pub fn register_name(name: &str, hash: u32) {
    FILE_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .add(name, hash);
}

/// Forget every name learned while parsing
pub fn clear_project_names() {
    PROJECT_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

/// Snapshot of the names learned while parsing
pub fn project_names() -> NameRegistry {
    PROJECT_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn registered_hash(name: &str) -> Option<u32> {
    let files = FILE_REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(hash) = files.hash_of(name) {
        return Some(hash);
    }
    drop(files);
    PROJECT_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .hash_of(name)
}

/// Hash of a resource name.
///
/// `#hex` and `0xhex` are literal hashes. Names ending in `~` must be
/// registered. Anything else is FNV-hashed and remembered in the project
/// registry so it can be written back by name.
pub fn file_hash(name: &str) -> Result<u32, HashError> {
    if let Some(digits) = name.strip_prefix('#') {
        return parse_hex(digits);
    }
    if let Some(digits) = name.strip_prefix("0x") {
        return parse_hex(digits);
    }
    if let Some(hash) = registered_hash(name) {
        return Ok(hash);
    }
    if name.ends_with('~') {
        return Err(HashError::UnregisteredName(name.to_string()));
    }
    let hash = fnv_hash(name);
    PROJECT_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .add(name, hash);
    Ok(hash)
}

/// Name of a resource hash, or its `0x%08X` form when unknown
pub fn file_name(hash: u32) -> String {
    if let Some(name) = FILE_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .name_of(hash)
    {
        return name.to_string();
    }
    if let Some(name) = PROJECT_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .name_of(hash)
    {
        return name.to_string();
    }
    hex_to_string_upper(hash)
}
