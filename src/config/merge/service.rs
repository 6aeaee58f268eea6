//! MergeService: orchestrates sources and deserializes to MigratorConfig.

use crate::config::sources::environment;
use crate::config::MigratorConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File};
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Builder seeded with every field's default, so partial sources deserialize.
    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let defaults = Config::try_from(&MigratorConfig::default())?;
        Ok(Config::builder().add_source(defaults))
    }

    /// Load config from an optional file with environment overlay.
    /// Precedence: defaults (lowest) -> file -> environment (highest).
    pub fn load(path: Option<&Path>) -> Result<MigratorConfig, ConfigError> {
        let mut builder = Self::builder_with_defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let builder = environment::add_to_builder(builder)?;

        builder.build()?.try_deserialize()
    }
}
