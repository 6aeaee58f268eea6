//! CLI Tooling
//!
//! Command-line surface for migration and rollback runs. Flags override the layered
//! configuration; the run itself happens under one deadline covering every cluster call.

use crate::config::{ConfigLoader, MigratorConfig};
use crate::error::{MigrateError, StoreError};
use crate::logging::LogOverrides;
use crate::migration::{
    ClaimSelector, MigrationEngine, MigrationOptions, MigrationReport, Selection,
};
use crate::rollback::{RollbackEngine, RollbackReport};
use crate::store::connect::connect;
use crate::store::{DeadlineStore, KubeVolumeStore, VolumeStore};
use crate::translation::{InTreeTranslator, Translator};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

/// Migrate in-tree PersistentVolumes to CSI in place, or roll a migration back
#[derive(Parser, Debug)]
#[command(name = "csi-migrate")]
#[command(about = "Migrate in-tree PersistentVolumes to CSI, with backup and rollback")]
pub struct Cli {
    /// Kubeconfig file (default: $HOME/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Name of the kube context to use to migrate
    #[arg(long)]
    pub context: Option<String>,

    /// Address of the patched API server
    #[arg(long)]
    pub patched_api: Option<String>,

    /// Transform and back up volumes without updating them
    #[arg(long)]
    pub dry_run: bool,

    /// Deadline for the whole run: seconds, or a number suffixed with s, m or h
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<u64>,

    /// Only migrate volumes claimed from this namespace
    #[arg(long)]
    pub namespace: Option<String>,

    /// Only migrate this PersistentVolume
    #[arg(long)]
    pub pv: Option<String>,

    /// Only migrate the volume backing this claim ([namespace/]name)
    #[arg(long)]
    pub pvc: Option<ClaimSelector>,

    /// Restore the volumes recorded in the backup file
    #[arg(long)]
    pub rollback: bool,

    /// File where migrated volumes are backed up, read back on rollback
    #[arg(short = 'f', long)]
    pub backup_file: Option<PathBuf>,

    /// Volumes requested per list call
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Configuration file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Report format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

/// Parse `300`, `300s`, `5m` or `1h` into seconds.
fn parse_timeout(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((index, _)) => value.split_at(index),
        None => (value, ""),
    };
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid timeout {:?}", value))?;
    let scale = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Err(format!("invalid timeout unit in {:?} (use s, m or h)", value)),
    };
    amount
        .checked_mul(scale)
        .ok_or_else(|| format!("timeout {:?} is too large", value))
}

impl Cli {
    /// Apply command-line flags on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut MigratorConfig) {
        if let Some(kubeconfig) = &self.kubeconfig {
            config.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(context) = &self.context {
            config.context = Some(context.clone());
        }
        if let Some(patched_api) = &self.patched_api {
            config.patched_api = Some(patched_api.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(backup_file) = &self.backup_file {
            config.backup_file = Some(backup_file.clone());
        }
        config.dry_run |= self.dry_run;
    }

    /// Logging flags, applied above the `CSI_MIGRATE_LOG*` environment variables.
    pub fn log_overrides(&self) -> LogOverrides {
        LogOverrides {
            level: self.log_level.clone(),
            format: self.log_format.clone(),
            output: self.log_output.clone(),
            file: self.log_file.clone(),
        }
    }

    pub fn selection(&self) -> Selection {
        Selection {
            volume: self.pv.clone(),
            claim: self.pvc.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// Outcome of a run, rendered as the command's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReport {
    Migration(MigrationReport),
    Rollback(RollbackReport),
}

impl RunReport {
    pub fn render(&self, format: &str, dry_run: bool) -> Result<String, MigrateError> {
        if format == "json" {
            let value = match self {
                RunReport::Migration(report) => json!({
                    "mode": "migrate",
                    "dry_run": dry_run,
                    "processed": report.processed,
                    "migrated": report.migrated,
                    "skipped": report.skipped,
                    "failed": report.failed,
                }),
                RunReport::Rollback(report) => json!({
                    "mode": "rollback",
                    "dry_run": dry_run,
                    "processed": report.processed,
                    "restored": report.restored,
                    "failed": report.failed,
                }),
            };
            return serde_json::to_string_pretty(&value)
                .map_err(|e| MigrateError::ConfigError(format!("Failed to render report: {}", e)));
        }

        use comfy_table::Table;
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        let (title, rows) = match self {
            RunReport::Migration(report) => (
                "Migration",
                vec![
                    ("Processed", report.processed),
                    ("Migrated", report.migrated),
                    ("Skipped", report.skipped),
                    ("Failed", report.failed),
                ],
            ),
            RunReport::Rollback(report) => (
                "Rollback",
                vec![
                    ("Processed", report.processed),
                    ("Restored", report.restored),
                    ("Failed", report.failed),
                ],
            ),
        };
        let title = if dry_run {
            format!("{} (dry run)", title)
        } else {
            title.to_string()
        };
        table.set_header(vec![title, "Volumes".to_string()]);
        for (label, count) in rows {
            table.add_row(vec![label.to_string(), count.to_string()]);
        }
        Ok(table.to_string())
    }
}

/// Resolved settings for one invocation.
pub struct CliContext {
    config: MigratorConfig,
    selection: Selection,
    rollback: bool,
    format: String,
}

impl CliContext {
    /// Load configuration and apply the command-line overrides.
    pub fn new(cli: &Cli) -> Result<Self, MigrateError> {
        let loaded = match &cli.config {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        };
        let mut config = loaded.map_err(|e| MigrateError::ConfigError(e.to_string()))?;
        cli.apply_overrides(&mut config);

        Ok(Self {
            config,
            selection: cli.selection(),
            rollback: cli.rollback,
            format: cli.format.clone(),
        })
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Validate, connect, run the selected engine and render its report.
    pub fn execute(&self) -> Result<String, MigrateError> {
        self.config.validate(self.rollback)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| MigrateError::ConfigError(format!("Failed to create runtime: {}", e)))?;
        let report = runtime.block_on(self.run())?;
        report.render(&self.format, self.config.dry_run)
    }

    async fn run(&self) -> Result<RunReport, MigrateError> {
        let deadline = Instant::now() + self.config.timeout();
        let kubeconfig = self.config.kubeconfig_path()?;
        let context = self.config.context.as_deref().unwrap_or_default();
        let endpoint = self.config.patched_api.as_deref().unwrap_or_default();

        let client = tokio::time::timeout_at(deadline, connect(&kubeconfig, context, endpoint))
            .await
            .map_err(|_| StoreError::Timeout {
                operation: "connect",
            })??;
        let store = Arc::new(DeadlineStore::new(KubeVolumeStore::new(client), deadline));

        self.run_with(store, Arc::new(InTreeTranslator::new())).await
    }

    /// Run the selected engine against an already connected store.
    pub async fn run_with(
        &self,
        store: Arc<dyn VolumeStore>,
        translator: Arc<dyn Translator>,
    ) -> Result<RunReport, MigrateError> {
        let backup_file = self.config.backup_file.clone().ok_or_else(|| {
            MigrateError::ConfigError("backup file must be specified with -f".to_string())
        })?;

        if self.rollback {
            info!(file = %backup_file.display(), dry_run = self.config.dry_run, "Rolling back migration");
            let report = RollbackEngine::new(store)
                .with_retry(self.config.retry.clone())
                .rollback(&backup_file, self.config.dry_run)
                .await?;
            return Ok(RunReport::Rollback(report));
        }

        info!(file = %backup_file.display(), dry_run = self.config.dry_run, "Migrating volumes");
        let options = MigrationOptions {
            dry_run: self.config.dry_run,
            backup_file: Some(backup_file),
        };
        let report = MigrationEngine::new(store, translator)
            .with_retry(self.config.retry.clone())
            .with_page_size(self.config.page_size)
            .migrate_all(&self.selection, &options)
            .await?;
        Ok(RunReport::Migration(report))
    }
}
