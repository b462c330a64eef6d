//! Module range configuration for the file ID allocator.
//!
//! Ranges are an ordered list of records. Order matters twice: the first
//! module whose path rule matches a file claims it, and the generated header
//! lists modules in configuration order.

use std::collections::HashSet;
use std::path::Path;

use lazy_static::lazy_static;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::header_codec::MAX_IDENTITY;
use crate::source_scanner::ScanSettings;

/// Name of the implicit bucket for files that match no module rule.
pub const OTHER_MODULE: &str = "other";

lazy_static! {
    /// Configuration used when no config file is given or it cannot be used.
    static ref DEFAULT_CONFIG: AllocatorConfig = AllocatorConfig {
        extensions: vec!["c".to_string()],
        exclude_dirs: ["build", ".git", "tools", "bin", "obj"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        log_macros: [
            "TEST_LOG_ERR_MSG",
            "TEST_LOG_WRN_MSG",
            "TEST_LOG_INF_MSG",
            "TEST_LOG_DBG_MSG",
            "LOG_ERR",
            "LOG_WRN",
            "LOG_INF",
            "LOG_DBG",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        modules: vec![
            ModuleRange::new("brom", 1, 50, "BROM initialization"),
            ModuleRange::new("drivers", 51, 150, "Driver layer"),
            ModuleRange::new("app", 151, 250, "Application layer"),
            ModuleRange::new("test", 251, 300, "Test code"),
            ModuleRange::new("demo", 301, 350, "Demo code"),
        ],
    };
}

/// A contiguous span of IDs reserved for one subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRange {
    pub name: String,
    pub start: u16,
    /// Inclusive.
    pub end: u16,
    #[serde(default)]
    pub description: String,
    /// Directory names that place a file in this module. Empty means `[name]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

impl ModuleRange {
    pub fn new(name: &str, start: u16, end: u16, description: &str) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
            description: description.to_string(),
            paths: Vec::new(),
        }
    }

    /// Number of IDs in the range.
    pub fn capacity(&self) -> usize {
        usize::from(self.end.saturating_sub(self.start)) + 1
    }

    pub fn contains(&self, id: u16) -> bool {
        (self.start..=self.end).contains(&id)
    }

    pub fn overlaps(&self, other: &ModuleRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Directory segment names that classify a file into this module.
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        let own = if self.paths.is_empty() { Some(self.name.as_str()) } else { None };
        own.into_iter().chain(self.paths.iter().map(String::as_str))
    }
}

/// Everything the allocator needs: scanner settings plus module ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// File extensions (without the dot) considered by the scanner.
    pub extensions: Vec<String>,
    /// Directory names skipped wherever they appear in a path.
    pub exclude_dirs: Vec<String>,
    /// Macro names whose invocation marks a file as a log site.
    pub log_macros: Vec<String>,
    pub modules: Vec<ModuleRange>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        DEFAULT_CONFIG.clone()
    }
}

impl AllocatorConfig {
    /// Builds a config with default scanner settings and the given ranges.
    pub fn with_modules(modules: Vec<ModuleRange>) -> Self {
        Self {
            modules,
            ..Self::default()
        }
    }

    /// Checks names, bounds and pairwise disjointness of the module ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for module in &self.modules {
            if module.name.is_empty() {
                return Err(ConfigError::Invalid("module with empty name".to_string()));
            }
            if !names.insert(module.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "module '{}' is defined more than once",
                    module.name
                )));
            }
            if module.start > module.end {
                return Err(ConfigError::Invalid(format!(
                    "module '{}' has start {} greater than end {}",
                    module.name, module.start, module.end
                )));
            }
            if module.end > MAX_IDENTITY {
                return Err(ConfigError::Invalid(format!(
                    "module '{}' ends at {}, beyond the largest identity {}",
                    module.name, module.end, MAX_IDENTITY
                )));
            }
        }

        for (i, first) in self.modules.iter().enumerate() {
            if let Some(second) = self.modules[i + 1..].iter().find(|m| first.overlaps(m)) {
                return Err(ConfigError::Overlap {
                    first: first.name.clone(),
                    second: second.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Looks up a module by name.
    pub fn module(&self, name: &str) -> Option<&ModuleRange> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Returns the module whose range contains `id`.
    pub fn module_for_id(&self, id: u16) -> Option<&ModuleRange> {
        self.modules.iter().find(|m| m.contains(id))
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            extensions: self.extensions.clone(),
            exclude_dirs: self.exclude_dirs.clone(),
            log_macros: self.log_macros.clone(),
        }
    }

    /// Hash of the parts of the configuration that influence ID assignment.
    ///
    /// Stored alongside cached assignments so that editing a range
    /// invalidates the cache even when the file list is unchanged.
    pub fn fingerprint(&self) -> String {
        let mut key = String::new();
        for module in &self.modules {
            key.push_str(&format!("{}:{}-{}", module.name, module.start, module.end));
            for segment in module.path_segments() {
                key.push(',');
                key.push_str(segment);
            }
            key.push('\n');
        }
        format!("{:032x}", xxhash_rust::xxh3::xxh3_128(key.as_bytes()))
    }
}

/// Parses and validates a configuration from TOML text.
pub fn load_config_from_str(content: &str) -> Result<AllocatorConfig, ConfigError> {
    let config: AllocatorConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Reads, parses and validates a configuration file.
pub fn load_config(path: &Path) -> Result<AllocatorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&content)
}

/// Loads `path`, falling back to the built-in defaults on any problem.
///
/// A missing file is expected and only noted at info level; a file that
/// exists but cannot be used is reported as a warning.
pub fn load_or_default(path: Option<&Path>) -> AllocatorConfig {
    let Some(path) = path else {
        info!("No config file given, using default module ranges");
        return AllocatorConfig::default();
    };
    if !path.exists() {
        info!("Config file not found: {}, using default module ranges", path.display());
        return AllocatorConfig::default();
    }
    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; using default module ranges", e);
            AllocatorConfig::default()
        }
    }
}
