//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first existing file wins:
//! 1. An explicit path (the `--config` flag)
//! 2. `$REVSYNC_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/revsync/config.toml`
//! 4. `~/.revsync/config.toml`
//!
//! An explicit path that does not exist is an error; missing files at the
//! other locations are skipped and defaults are used.
//!
//! # Example
//!
//! ```no_run
//! use revsync::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("repositories under {}", config.base_path().display());
//! println!("atomic batches: {}", config.atomic());
//! ```

pub mod schema;

pub use schema::{ApplyConfig, DEFAULT_SOFT_NAMESPACE};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("config file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Values read from the config file (all unset if none was found)
    pub file: ApplyConfig,
    /// Path the file was loaded from
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Build a config from already-parsed values.
    pub fn from_file(file: ApplyConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Self {
            file,
            loaded_from: None,
        })
    }

    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation, or if `explicit` names a missing file.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(explicit, |key| std::env::var(key).ok(), dirs::home_dir())
    }

    /// Load configuration with an injected environment and home directory.
    fn load_with(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let Some(path) = Self::locate(explicit, env, home)? else {
            return Ok(Self::default());
        };

        let file = Self::read_config(&path)?;
        file.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");

        Ok(Self {
            file,
            loaded_from: Some(path),
        })
    }

    /// Find the config file to load, if any.
    fn locate(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Option<PathBuf>, ConfigError> {
        // 1. Explicit path must exist
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Ok(Some(path.to_path_buf()));
        }

        // 2. Check $REVSYNC_CONFIG
        if let Some(path) = env("REVSYNC_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        // 3. Check $XDG_CONFIG_HOME/revsync/config.toml
        if let Some(xdg_home) = env("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("revsync/config.toml");
            if path.exists() {
                return Ok(Some(path));
            }
        }

        // 4. Check ~/.revsync/config.toml
        if let Some(home) = home {
            let path = home.join(".revsync/config.toml");
            if path.exists() {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<ApplyConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Directory holding the replicated repositories.
    ///
    /// Defaults to the current directory.
    pub fn base_path(&self) -> PathBuf {
        self.file
            .base_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Whether batches are committed all-or-nothing.
    ///
    /// Defaults to `true`.
    pub fn atomic(&self) -> bool {
        self.file.atomic.unwrap_or(true)
    }

    /// Whether non-fast-forward commit updates are forced.
    ///
    /// Defaults to `false`.
    pub fn allow_non_fast_forward(&self) -> bool {
        self.file.allow_non_fast_forward.unwrap_or(false)
    }

    /// Ref prefixes whose plain rejections are expected.
    ///
    /// Defaults to `refs/draft-comments/`.
    pub fn soft_namespaces(&self) -> Vec<String> {
        self.file
            .soft_namespaces
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_SOFT_NAMESPACE.to_string()])
    }

    /// Every setting with defaults filled in, for display.
    pub fn effective(&self) -> ApplyConfig {
        ApplyConfig {
            base_path: Some(self.base_path()),
            atomic: Some(self.atomic()),
            allow_non_fast_forward: Some(self.allow_non_fast_forward()),
            soft_namespaces: Some(self.soft_namespaces()),
        }
    }

    /// Get the path to the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(vars: &[(&str, &Path)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.display().to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn load_empty_defaults() {
        let config = Config::load_with(None, no_env, None).unwrap();

        assert!(config.loaded_from().is_none());
        assert_eq!(config.base_path(), PathBuf::from("."));
        assert!(config.atomic());
        assert!(!config.allow_non_fast_forward());
        assert_eq!(config.soft_namespaces(), vec!["refs/draft-comments/"]);
    }

    #[test]
    fn load_from_env() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "atomic = false\n").unwrap();

        let config =
            Config::load_with(None, env_of(&[("REVSYNC_CONFIG", config_path.as_path())]), None).unwrap();

        assert!(!config.atomic());
        assert_eq!(config.loaded_from(), Some(config_path.as_path()));
    }

    #[test]
    fn load_from_xdg() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("revsync");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "allow_non_fast_forward = true\n").unwrap();

        let config =
            Config::load_with(None, env_of(&[("XDG_CONFIG_HOME", temp.path())]), None).unwrap();

        assert!(config.allow_non_fast_forward());
    }

    #[test]
    fn load_from_home() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".revsync");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "base_path = \"/srv/git\"\n").unwrap();

        let config = Config::load_with(None, no_env, Some(temp.path().to_path_buf())).unwrap();

        assert_eq!(config.base_path(), PathBuf::from("/srv/git"));
    }

    #[test]
    fn explicit_path_wins() {
        let temp = TempDir::new().unwrap();
        let explicit = temp.path().join("explicit.toml");
        let from_env = temp.path().join("env.toml");
        fs::write(&explicit, "atomic = false\n").unwrap();
        fs::write(&from_env, "atomic = true\n").unwrap();

        let config = Config::load_with(
            Some(&explicit),
            env_of(&[("REVSYNC_CONFIG", from_env.as_path())]),
            None,
        )
        .unwrap();

        assert!(!config.atomic());
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");

        let result = Config::load_with(Some(&missing), no_env, None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn missing_env_path_falls_through() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");

        let config =
            Config::load_with(None, env_of(&[("REVSYNC_CONFIG", missing.as_path())]), None).unwrap();
        assert!(config.loaded_from().is_none());
    }

    #[test]
    fn parse_error_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        fs::write(&path, "atomic = \"yes please\"\n").unwrap();

        let err = Config::load_with(Some(&path), no_env, None).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn invalid_namespace_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "soft_namespaces = [\"draft\"]\n").unwrap();

        let result = Config::load_with(Some(&path), no_env, None);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn effective_fills_defaults() {
        let config = Config::from_file(ApplyConfig {
            atomic: Some(false),
            ..Default::default()
        })
        .unwrap();

        let effective = config.effective();
        assert_eq!(effective.atomic, Some(false));
        assert_eq!(effective.allow_non_fast_forward, Some(false));
        assert_eq!(
            effective.soft_namespaces,
            Some(vec![DEFAULT_SOFT_NAMESPACE.to_string()])
        );
    }
}
