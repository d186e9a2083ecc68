//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., soft namespaces must be ref prefixes).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Ref namespace whose plain rejections are expected by default.
pub const DEFAULT_SOFT_NAMESPACE: &str = "refs/draft-comments/";

/// Apply engine configuration file.
///
/// Every field is optional; unset fields fall back to defaults through the
/// accessors on [`super::Config`].
///
/// # Example
///
/// ```toml
/// base_path = "/var/lib/revsync/git"
/// atomic = true
/// allow_non_fast_forward = false
/// soft_namespaces = ["refs/draft-comments/", "refs/sequences/"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ApplyConfig {
    /// Directory holding the replicated repositories
    pub base_path: Option<PathBuf>,

    /// Request all-or-nothing batch commits
    pub atomic: Option<bool>,

    /// Force commit updates that are not fast-forwards
    pub allow_non_fast_forward: Option<bool>,

    /// Ref prefixes whose plain rejections are logged at info level
    pub soft_namespaces: Option<Vec<String>>,
}

impl ApplyConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.base_path {
            if base.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "base_path cannot be empty".to_string(),
                ));
            }
        }

        if let Some(namespaces) = &self.soft_namespaces {
            for ns in namespaces {
                if !ns.starts_with("refs/") || !ns.ends_with('/') {
                    return Err(ConfigError::InvalidValue(format!(
                        "soft namespace '{}' must start with 'refs/' and end with '/'",
                        ns
                    )));
                }
            }
        }

        Ok(())
    }
}
