//! Configuration: defaults < config file < environment < CLI flags.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

/// Command-line interface of the daemon.
#[derive(Debug, Parser)]
#[command(
    name = "secretsd",
    version,
    about = "freedesktop.org Secret Service backed by a password store"
)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Prefix for entries in the password store
    #[arg(short, long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Password-store executable to drive
    #[arg(long, value_name = "BIN")]
    pub store_bin: Option<String>,

    /// Replace an existing Secret Service provider
    #[arg(short, long)]
    pub replace: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Enable verbose (info) logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Password-store executable.
    pub store_bin: String,
    /// Prefix under which entries live in the store.
    pub prefix: String,
    /// Collection created for the `default` alias on first run.
    pub default_collection: String,
    /// Log filter directive when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log destination; stderr when unset.
    pub log_file: Option<PathBuf>,
    /// Request "replace existing" when acquiring the bus name.
    pub replace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_bin: "gopass".to_string(),
            prefix: "secret-service".to_string(),
            default_collection: "default".to_string(),
            log_level: "info".to_string(),
            log_file: None,
            replace: false,
        }
    }
}

/// The optional config file; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    store_bin: Option<String>,
    prefix: Option<String>,
    default_collection: Option<String>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    replace: Option<bool>,
}

impl Config {
    /// Resolve the effective configuration for this invocation.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Config::default();

        let path = cli
            .config
            .clone()
            .or_else(|| std::env::var_os("SECRETSD_CONFIG").map(PathBuf::from))
            .or_else(|| {
                std::env::var_os("HOME")
                    .map(|home| PathBuf::from(home).join(".config/secretsd/config.toml"))
            });
        if let Some(path) = path {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    let file: FileConfig = toml::from_str(&text)
                        .with_context(|| format!("parsing {}", path.display()))?;
                    config.merge(file);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("reading {}", path.display()));
                }
            }
        }

        config.apply_env();

        if let Some(prefix) = &cli.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(bin) = &cli.store_bin {
            config.store_bin = bin.clone();
        }
        if cli.replace {
            config.replace = true;
        }
        if cli.debug {
            config.log_level = "debug".to_string();
        } else if cli.verbose {
            config.log_level = "info".to_string();
        }

        Ok(config)
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(v) = file.store_bin {
            self.store_bin = v;
        }
        if let Some(v) = file.prefix {
            self.prefix = v;
        }
        if let Some(v) = file.default_collection {
            self.default_collection = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.log_file {
            self.log_file = Some(v);
        }
        if let Some(v) = file.replace {
            self.replace = v;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SECRETSD_STORE_BIN") {
            self.store_bin = v;
        }
        if let Ok(v) = std::env::var("SECRETSD_PREFIX") {
            self.prefix = v;
        }
        if let Ok(v) = std::env::var("SECRETSD_DEFAULT_COLLECTION") {
            self.default_collection = v;
        }
        if let Ok(v) = std::env::var("SECRETSD_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("SECRETSD_LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("SECRETSD_REPLACE") {
            if v == "1" || v == "true" {
                self.replace = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original_layout() {
        let config = Config::default();
        assert_eq!(config.store_bin, "gopass");
        assert_eq!(config.prefix, "secret-service");
        assert_eq!(config.default_collection, "default");
        assert!(!config.replace);
    }

    #[test]
    fn file_values_override_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            prefix = "secrets"
            default_collection = "login"
            replace = true
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        config.merge(file);
        assert_eq!(config.prefix, "secrets");
        assert_eq!(config.default_collection, "login");
        assert!(config.replace);
        // Unset keys keep their defaults.
        assert_eq!(config.store_bin, "gopass");
    }

    #[test]
    fn unknown_file_keys_are_rejected_gracefully() {
        // toml deserialization ignores unknown keys by default; a config
        // written for a newer version still loads.
        let file: Result<FileConfig, _> = toml::from_str("future_knob = 1\n");
        assert!(file.is_ok());
    }
}
