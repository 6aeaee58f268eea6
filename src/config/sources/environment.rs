//! Environment variable source: CSI_MIGRATE__* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const ENV_PREFIX: &str = "CSI_MIGRATE";

/// Add environment variable overlay to builder.
///
/// `CSI_MIGRATE__PAGE_SIZE=50` sets `page_size`; `CSI_MIGRATE__RETRY__STEPS=8` sets `retry.steps`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    ))
}
