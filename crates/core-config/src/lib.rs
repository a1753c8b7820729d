//! Configuration loading and cache-key derivation.
//!
//! `spoolswap.toml` is parsed with per-field defaults and unknown-field
//! tolerance so the file can grow without breaking older binaries. A read
//! or parse failure falls back to the built-in defaults rather than
//! aborting startup; the fallback is logged under `target: "config"`.
//!
//! Cache keys follow the persisted-state layout
//! `{file_hash}-{algorithm_version}-{cfg_hash}-{opt_algorithm}` where
//! `cfg_hash` is a deterministic hash over the key-sorted effective
//! configuration, so equal configurations hash equally regardless of how
//! they were assembled.

use anyhow::Result;
use core_model::{ParserAlgorithm, SystemConfiguration, SystemKind};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Version stamp of the parsing pipeline; bumping it invalidates cached
/// analyses whose semantics changed.
pub const ALGORITHM_VERSION: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct SystemSection {
    #[serde(default = "SystemSection::default_slots_per_unit")]
    pub slots_per_unit: u32,
    #[serde(default = "SystemSection::default_unit_count")]
    pub unit_count: u32,
    #[serde(default = "SystemSection::default_kind")]
    pub kind: String,
}

impl SystemSection {
    const fn default_slots_per_unit() -> u32 {
        4
    }
    const fn default_unit_count() -> u32 {
        1
    }
    fn default_kind() -> String {
        "magazine".to_string()
    }
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            slots_per_unit: Self::default_slots_per_unit(),
            unit_count: Self::default_unit_count(),
            kind: Self::default_kind(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParserSection {
    #[serde(default)]
    pub algorithm: ParserAlgorithm,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerSection {
    #[serde(default = "OptimizerSection::default_algorithm")]
    pub algorithm: String,
    #[serde(default = "OptimizerSection::default_seconds_per_swap")]
    pub seconds_per_swap: u64,
}

impl OptimizerSection {
    fn default_algorithm() -> String {
        "greedy".to_string()
    }
    const fn default_seconds_per_swap() -> u64 {
        120
    }
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            algorithm: Self::default_algorithm(),
            seconds_per_swap: Self::default_seconds_per_swap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineSection {
    #[serde(default = "TimelineSection::default_max_history")]
    pub max_history: usize,
    #[serde(default = "TimelineSection::default_save_debounce_ms")]
    pub save_debounce_ms: u64,
}

impl TimelineSection {
    const fn default_max_history() -> usize {
        50
    }
    const fn default_save_debounce_ms() -> u64 {
        500
    }
}

impl Default for TimelineSection {
    fn default() -> Self {
        Self {
            max_history: Self::default_max_history(),
            save_debounce_ms: Self::default_save_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub system: SystemSection,
    #[serde(default)]
    pub parser: ParserSection,
    #[serde(default)]
    pub optimizer: OptimizerSection,
    #[serde(default)]
    pub timeline: TimelineSection,
}

/// Effective configuration handed to the rest of the workspace.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Original file string, when one was read.
    pub raw: Option<String>,
    pub file: ConfigFile,
}

impl Config {
    /// Resolve the `[system]` section into the model type. An unrecognized
    /// `kind` falls back to `magazine` with a warning.
    pub fn system_configuration(&self) -> SystemConfiguration {
        let kind = match self.file.system.kind.to_ascii_lowercase().as_str() {
            "magazine" => SystemKind::Magazine,
            "toolhead" => SystemKind::Toolhead,
            other => {
                warn!(target: "config", kind = other, "unknown_system_kind");
                SystemKind::Magazine
            }
        };
        SystemConfiguration {
            kind,
            unit_count: self.file.system.unit_count,
            slots_per_unit: match kind {
                SystemKind::Magazine => self.file.system.slots_per_unit,
                SystemKind::Toolhead => 1,
            },
        }
    }

    /// Deterministic digest over the key-sorted effective configuration.
    pub fn cfg_hash(&self) -> u64 {
        let sys = self.system_configuration();
        // Key order is fixed here; adding a knob means appending a pair.
        let pairs: [(&str, String); 7] = [
            ("optimizer.algorithm", self.file.optimizer.algorithm.clone()),
            (
                "optimizer.seconds_per_swap",
                self.file.optimizer.seconds_per_swap.to_string(),
            ),
            (
                "parser.algorithm",
                self.file.parser.algorithm.as_str().to_string(),
            ),
            ("system.kind", format!("{:?}", sys.kind)),
            ("system.slots_per_unit", sys.slots_per_unit.to_string()),
            ("system.unit_count", sys.unit_count.to_string()),
            (
                "timeline.max_history",
                self.file.timeline.max_history.to_string(),
            ),
        ];
        let mut hasher = DefaultHasher::new();
        for (key, value) in &pairs {
            hasher.write(key.as_bytes());
            hasher.write(b"=");
            hasher.write(value.as_bytes());
            hasher.write(b";");
        }
        hasher.finish()
    }

    /// Cache key for a persisted analysis of one file under this
    /// configuration.
    pub fn cache_key(&self, file_hash: u64) -> String {
        format!(
            "{file_hash:016x}-{ALGORITHM_VERSION}-{:016x}-{}",
            self.cfg_hash(),
            self.file.optimizer.algorithm
        )
    }

    /// Convenience over [`cache_key`](Self::cache_key) hashing the file
    /// content directly.
    pub fn cache_key_for(&self, bytes: &[u8]) -> String {
        self.cache_key(hash_bytes(bytes))
    }
}

/// Content digest used as the file component of cache keys.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

/// Best-effort config path: working directory first, then the platform
/// config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("spoolswap.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("spoolswap").join("spoolswap.toml");
    }
    PathBuf::from("spoolswap.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config {
                    raw: Some(content),
                    file,
                })
            }
            Err(e) => {
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}
