//! difflog configuration loading from `.difflog.toml`.
//!
//! The file lives in the repository root and is optional. A file that cannot
//! be read or parsed is reported as a warning and the defaults apply.
//!
//! # Example Configuration
//!
//! ```toml
//! [extract]
//! packages = ["src/mypkg"]
//! exclude = ["tests/", "examples/"]
//!
//! [output]
//! format = "markdown"
//! color = false
//! ```

use std::path::{Path, PathBuf};

use difflog_core::scanner::DEFAULT_EXCLUDES;
use difflog_core::{ExtractOptions, ScanOptions};
use serde::Deserialize;

pub const CONFIG_FILE: &str = ".difflog.toml";

/// Root configuration structure loaded from `.difflog.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct DifflogConfig {
    /// What counts as the package under comparison.
    #[serde(default)]
    pub extract: ExtractSettings,

    /// Output formatting preferences.
    #[serde(default)]
    pub output: OutputSettings,
}

/// Source discovery settings.
#[derive(Debug, Deserialize, Default)]
pub struct ExtractSettings {
    /// Package directories, relative to the compared tree's root.
    ///
    /// Empty means every package found under the root (or under `src/`).
    #[serde(default)]
    pub packages: Vec<PathBuf>,

    /// Extra glob patterns to skip, added to the built-in excludes.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Output formatting preferences.
///
/// Command-line flags (`--format`, `--no-color`) override these settings.
#[derive(Debug, Deserialize, Default)]
pub struct OutputSettings {
    /// Valid values: `text`, `json`, `markdown`
    #[serde(default)]
    pub format: Option<String>,

    /// Defaults to `true` when stdout is a TTY.
    #[serde(default)]
    pub color: Option<bool>,
}

impl DifflogConfig {
    /// Load configuration from `.difflog.toml` in the given directory.
    ///
    /// Missing files yield defaults; unreadable or invalid ones are logged.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", CONFIG_FILE, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", CONFIG_FILE, e);
                }
            }
        }
        Self::default()
    }

    /// Exclude patterns for discovery, built-in defaults first.
    pub fn exclude_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        for pattern in &self.extract.exclude {
            if !patterns.contains(pattern) {
                patterns.push(pattern.clone());
            }
        }
        patterns
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            scan: ScanOptions {
                packages: self.extract.packages.clone(),
                exclude: self.exclude_patterns(),
            },
            ..ExtractOptions::default()
        }
    }

    /// Get the default output format, if configured.
    pub fn default_format(&self) -> Option<&str> {
        self.output.format.as_deref()
    }

    /// Returns the configured value, or `None` to use auto-detection.
    pub fn use_color(&self) -> Option<bool> {
        self.output.color
    }
}
