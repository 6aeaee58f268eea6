//! Configuration
//!
//! Layered settings for a migration run. Sources, lowest precedence first: built-in defaults,
//! an optional config file, `CSI_MIGRATE__*` environment variables, then command-line flags.

mod facade;
pub mod merge {
    pub mod service;
}
pub mod sources {
    pub mod environment;
}

pub use facade::ConfigLoader;

use crate::error::MigrateError;
use crate::logging::LoggingConfig;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for one migration or rollback run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigratorConfig {
    /// Kubeconfig file; None means `$HOME/.kube/config`
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to connect with (required)
    #[serde(default)]
    pub context: Option<String>,

    /// Address of the patched API server; `host` becomes `https://host:443` (required)
    #[serde(default)]
    pub patched_api: Option<String>,

    /// Deadline for the whole run (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Volumes requested per list call
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Backup file written by migration and read by rollback (required)
    #[serde(default)]
    pub backup_file: Option<PathBuf>,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_page_size() -> u32 {
    25
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            patched_api: None,
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            backup_file: None,
            dry_run: false,
            retry: RetryPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MigratorConfig {
    /// Reject settings a run cannot start with. Nothing touches the cluster before this passes.
    pub fn validate(&self, rollback: bool) -> Result<(), MigrateError> {
        if self.backup_file.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
            let message = if rollback {
                "backup file must be specified with -f for rollback mode"
            } else {
                "backup file must be specified with -f for migration"
            };
            return Err(MigrateError::ConfigError(message.to_string()));
        }
        if self.context.as_deref().map_or(true, str::is_empty) {
            return Err(MigrateError::ConfigError(
                "missing required context".to_string(),
            ));
        }
        if self.patched_api.as_deref().map_or(true, str::is_empty) {
            return Err(MigrateError::ConfigError(
                "missing required patched API address".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(MigrateError::ConfigError(
                "page_size must be greater than zero".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(MigrateError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        self.retry.validate().map_err(MigrateError::ConfigError)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Kubeconfig path, defaulting to `$HOME/.kube/config`.
    pub fn kubeconfig_path(&self) -> Result<PathBuf, MigrateError> {
        if let Some(path) = &self.kubeconfig {
            return Ok(path.clone());
        }
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".kube").join("config"))
            .ok_or_else(|| {
                MigrateError::ConfigError(
                    "Could not determine home directory for kubeconfig".to_string(),
                )
            })
    }
}
