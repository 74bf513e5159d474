//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EMLKIT_CONFIG` (environment variable)
//! 2. `~/.config/emlkit/config.toml` (Linux/macOS)
//!    `%APPDATA%\emlkit\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Batch import settings.
    pub import: ImportConfig,
    /// PDF merge settings.
    pub merge: MergeConfig,
    /// Print command settings.
    pub print: PrintConfig,
    /// Export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Batch import settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Keep only PDF attachments on imported messages.
    pub pdf_only: bool,
    /// Seconds allowed for opening one `.msg` container.
    pub legacy_timeout_secs: u64,
}

/// PDF merge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// File name prefix for merged documents (`<prefix>_<millis>.pdf`).
    pub file_prefix: String,
}

/// Print command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    /// Program that receives the spooled PDF path as its last argument.
    pub command: String,
    /// Extra arguments placed before the file path.
    pub args: Vec<String>,
    /// Ceiling in seconds after which printing is considered done.
    pub timeout_secs: u64,
}

/// Export defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output directory.
    pub default_output_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            pdf_only: false,
            legacy_timeout_secs: 10,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            file_prefix: "merged_pdfs".to_string(),
        }
    }
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            command: "lp".to_string(),
            args: Vec::new(),
            timeout_secs: 10,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EMLKIT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("emlkit").join("config.toml"))
}

/// Return the cache directory used for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emlkit")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("emlkit.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert!(!cfg.import.pdf_only);
        assert_eq!(cfg.import.legacy_timeout_secs, 10);
        assert_eq!(cfg.merge.file_prefix, "merged_pdfs");
        assert_eq!(cfg.print.command, "lp");
        assert_eq!(cfg.print.timeout_secs, 10);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.print.args = vec!["-d".into(), "office".into()];
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.print.args, cfg.print.args);
        assert_eq!(parsed.merge.file_prefix, cfg.merge.file_prefix);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[import]
pdf_only = true

[merge]
file_prefix = "bundle"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(cfg.import.pdf_only);
        assert_eq!(cfg.merge.file_prefix, "bundle");
        assert_eq!(cfg.import.legacy_timeout_secs, 10);
        assert_eq!(cfg.print.command, "lp");
    }

    #[test]
    fn test_save_then_load_through_env_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        std::env::set_var("EMLKIT_CONFIG", &path);

        let mut cfg = Config::default();
        cfg.print.command = "lpr".into();
        cfg.import.legacy_timeout_secs = 3;
        save_config(&cfg).unwrap();
        let loaded = load_config();
        std::env::remove_var("EMLKIT_CONFIG");

        assert!(path.is_file());
        assert_eq!(loaded.print.command, "lpr");
        assert_eq!(loaded.import.legacy_timeout_secs, 3);
    }

    #[test]
    fn test_log_file_under_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/emlkit-test"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/tmp/emlkit-test/emlkit.log"));
    }
}
