//! Logging System
//!
//! Structured logging through `tracing`. Level, format and destination resolve from, highest
//! first: `--log-*` flags, the `CSI_MIGRATE_LOG*` environment variables, then `LoggingConfig`.

use crate::error::MigrateError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "CSI_MIGRATE_LOG";
const ENV_FORMAT: &str = "CSI_MIGRATE_LOG_FORMAT";
const ENV_OUTPUT: &str = "CSI_MIGRATE_LOG_OUTPUT";
const ENV_FILE: &str = "CSI_MIGRATE_LOG_FILE";
const ENV_MODULES: &str = "CSI_MIGRATE_LOG_MODULES";

/// Resolve the log file path with precedence: CLI, `CSI_MIGRATE_LOG_FILE`, config file, default.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, MigrateError> {
    if let Some(p) = cli_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    if let Ok(env_path) = std::env::var(ENV_FILE) {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    default_log_file_path()
}

fn default_log_file_path() -> Result<PathBuf, MigrateError> {
    let project_dirs =
        directories::ProjectDirs::from("", "", "csi-migrate").ok_or_else(|| {
            MigrateError::ConfigError(
                "Could not determine platform state directory for log file".to_string(),
            )
        })?;
    // macOS and Windows have no state directory; fall back to the data directory there.
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir());
    Ok(dir.join("csi-migrate.log"))
}

/// Values given as `--log-*` flags. Each one set here beats its environment variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogOverrides {
    pub level: Option<String>,
    pub format: Option<String>,
    pub output: Option<String>,
    pub file: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr, both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means use the state directory
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format, terminal destinations only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Initialize the global subscriber.
///
/// `overrides` win over environment variables, which win over `config`.
pub fn init_logging(config: &LoggingConfig, overrides: &LogOverrides) -> Result<(), MigrateError> {
    if !config.enabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = build_env_filter(config, overrides.level.as_deref())?;
    let format = determine_format(config, overrides.format.as_deref())?;
    let output = determine_output(config, overrides.output.as_deref())?;
    let writer = output.make_writer(config, overrides.file.clone())?;
    let subscriber = Registry::default().with(filter);

    if format == "json" {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(config.color && !output.file)
                    .with_writer(writer),
            )
            .init();
    }

    Ok(())
}

/// Pick the highest-precedence value: flag, then environment, then config.
fn layered(flag: Option<&str>, env: Option<String>, config: &str) -> String {
    flag.map(str::to_string)
        .or(env)
        .unwrap_or_else(|| config.to_string())
}

/// Build environment filter from flag, environment variables or config
fn build_env_filter(config: &LoggingConfig, flag: Option<&str>) -> Result<EnvFilter, MigrateError> {
    if flag.is_none() {
        if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
            return Ok(filter);
        }
    }
    let level = flag.unwrap_or(&config.level);

    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level))
        .collect();
    if let Ok(modules) = std::env::var(ENV_MODULES) {
        directives.extend(modules.split(',').filter_map(|spec| {
            let (module, level) = spec.split_once('=')?;
            Some(format!("{}={}", module.trim(), level.trim()))
        }));
    }

    let mut filter = EnvFilter::new(level);
    for directive in directives {
        filter = filter.add_directive(directive.parse().map_err(|e| {
            MigrateError::ConfigError(format!("Invalid log directive {}: {}", directive, e))
        })?);
    }
    Ok(filter)
}

/// Determine output format from flag, environment or config
fn determine_format(config: &LoggingConfig, flag: Option<&str>) -> Result<String, MigrateError> {
    let env = std::env::var(ENV_FORMAT)
        .ok()
        .filter(|format| format == "json" || format == "text");
    let format = layered(flag, env, &config.format);
    match format.as_str() {
        "json" | "text" => Ok(format),
        other => Err(MigrateError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

/// Output destinations
#[derive(Debug, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl OutputDestinations {
    fn make_writer(
        &self,
        config: &LoggingConfig,
        flag_file: Option<PathBuf>,
    ) -> Result<BoxMakeWriter, MigrateError> {
        let terminal = match (self.stdout, self.stderr) {
            (true, true) => Some(BoxMakeWriter::new(std::io::stdout.and(std::io::stderr))),
            (true, false) => Some(BoxMakeWriter::new(std::io::stdout)),
            (false, true) => Some(BoxMakeWriter::new(std::io::stderr)),
            (false, false) => None,
        };
        if !self.file {
            return Ok(terminal.unwrap_or_else(|| BoxMakeWriter::new(std::io::stderr)));
        }

        let file = Mutex::new(open_log_file(config, flag_file)?);
        Ok(match terminal {
            Some(terminal) => BoxMakeWriter::new(file.and(terminal)),
            None => BoxMakeWriter::new(file),
        })
    }
}

fn open_log_file(
    config: &LoggingConfig,
    flag_file: Option<PathBuf>,
) -> Result<std::fs::File, MigrateError> {
    let path = resolve_log_file_path(flag_file, config.file.clone())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MigrateError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            MigrateError::ConfigError(format!("Failed to open log file {:?}: {}", path, e))
        })
}

/// Determine output destinations from flag, environment or config
fn determine_output(
    config: &LoggingConfig,
    flag: Option<&str>,
) -> Result<OutputDestinations, MigrateError> {
    let output = layered(flag, std::env::var(ENV_OUTPUT).ok(), &config.output);
    parse_output_destinations(&output)
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, MigrateError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        "both" => (true, true, false),
        _ => {
            return Err(MigrateError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                output
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}
