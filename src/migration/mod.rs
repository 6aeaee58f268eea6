//! Migration engine
//!
//! Walks every volume in listing order, one at a time, and rewrites eligible in-tree volumes
//! to their CSI-backed form. Each rewrite runs under a conflict-retry loop that re-fetches the
//! volume before transforming it, so the latest version is always the one persisted. The
//! pre-image of every migrated volume is appended to the backup file after it succeeds.

mod selection;
mod transform;

pub use selection::{ClaimSelector, Selection};
pub use transform::{
    apply_azure_attributes, drop_region_affinity, eligible_driver, hand_over_annotations,
    mark_migrated, provisioner_identity, stamp_provisioner_identity, translate_volume,
    TransformContext,
};

use crate::backup::BackupWriter;
use crate::error::MigrateError;
use crate::node_identity::NodeIdentityCache;
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::store::VolumeStore;
use crate::translation::Translator;
use crate::types::{is_driver_backed, volume_name, VolumeRecord};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Default number of volumes requested per list call.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Transform and record volumes without persisting them
    pub dry_run: bool,
    /// Where pre-migration snapshots are written; required
    pub backup_file: Option<PathBuf>,
}

/// Aggregate counts for one migration run.
///
/// Every listed volume is `processed`; it then lands in exactly one of the other buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub processed: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of one fetch-transform-persist cycle.
enum Outcome {
    Migrated { original: VolumeRecord },
    NotEligible,
    AlreadyMigrated,
}

pub struct MigrationEngine {
    store: Arc<dyn VolumeStore>,
    translator: Arc<dyn Translator>,
    node_ids: NodeIdentityCache,
    retry: RetryPolicy,
    page_size: u32,
}

impl MigrationEngine {
    pub fn new(store: Arc<dyn VolumeStore>, translator: Arc<dyn Translator>) -> Self {
        Self {
            store,
            translator,
            node_ids: NodeIdentityCache::new(),
            retry: RetryPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Migrate every selected volume.
    ///
    /// Fails only when the backup file cannot be prepared or written, a list call fails, or the
    /// run's deadline expires. Per-volume failures are logged and counted in `failed`.
    pub async fn migrate_all(
        &self,
        selection: &Selection,
        options: &MigrationOptions,
    ) -> Result<MigrationReport, MigrateError> {
        let backup_path = options.backup_file.as_deref().ok_or_else(|| {
            MigrateError::ConfigError("a backup file is required for migration".to_string())
        })?;
        let (mut backup, _) = BackupWriter::create(backup_path)?;

        let mut report = MigrationReport::default();
        let mut continue_token = None;
        loop {
            let page = self
                .store
                .list_volumes(self.page_size, continue_token.take())
                .await?;

            for volume in page.items {
                report.processed += 1;
                let name = volume_name(&volume).to_string();
                let span = info_span!("volume", name = %name);

                if let Some(reason) = selection.rejection(&volume) {
                    span.in_scope(|| debug!(reason, "Skipping volume"));
                    report.skipped += 1;
                    continue;
                }
                if is_driver_backed(&volume) {
                    span.in_scope(|| info!("Volume is already CSI-backed"));
                    report.skipped += 1;
                    continue;
                }
                if eligible_driver(self.translator.as_ref(), &volume).is_none() {
                    span.in_scope(|| info!("No CSI driver recognized for volume"));
                    report.skipped += 1;
                    continue;
                }

                match self
                    .migrate_volume(&name, options.dry_run)
                    .instrument(span.clone())
                    .await
                {
                    Ok(Outcome::Migrated { original }) => {
                        backup.append(&original)?;
                        report.migrated += 1;
                    }
                    Ok(Outcome::AlreadyMigrated) => {
                        span.in_scope(|| info!("Volume became CSI-backed before it was migrated"));
                        report.skipped += 1;
                    }
                    Ok(Outcome::NotEligible) => {
                        span.in_scope(|| info!("No CSI driver recognized for volume"));
                        report.skipped += 1;
                    }
                    Err(err) if err.is_timeout() => {
                        warn!(
                            processed = report.processed,
                            migrated = report.migrated,
                            failed = report.failed,
                            "Migration deadline exceeded"
                        );
                        return Err(err);
                    }
                    Err(err) => {
                        span.in_scope(|| error!(error = %err, "Failed to migrate volume"));
                        report.failed += 1;
                    }
                }
            }

            match page.continue_token {
                Some(token) => continue_token = Some(token),
                None => break,
            }
        }

        info!(
            processed = report.processed,
            migrated = report.migrated,
            skipped = report.skipped,
            failed = report.failed,
            backup = %backup.path().display(),
            dry_run = options.dry_run,
            "Migration finished"
        );
        Ok(report)
    }

    async fn migrate_volume(&self, name: &str, dry_run: bool) -> Result<Outcome, MigrateError> {
        retry_on_conflict(&self.retry, move || self.attempt(name, dry_run)).await
    }

    async fn attempt(&self, name: &str, dry_run: bool) -> Result<Outcome, MigrateError> {
        let current = self.store.get_volume(name).await?;
        if is_driver_backed(&current) {
            return Ok(Outcome::AlreadyMigrated);
        }

        info!("Translating volume");
        let ctx = TransformContext {
            translator: self.translator.as_ref(),
            store: self.store.as_ref(),
            node_ids: &self.node_ids,
            now_millis: chrono::Utc::now().timestamp_millis(),
        };
        let Some(migrated) = translate_volume(current.clone(), &ctx).await? else {
            return Ok(Outcome::NotEligible);
        };

        if dry_run {
            debug!(
                volume = %serde_json::to_string(&migrated).unwrap_or_default(),
                "Dry run, not updating volume"
            );
        } else {
            self.store.update_volume(&migrated).await?;
            info!("Volume migrated");
        }
        Ok(Outcome::Migrated { original: current })
    }
}
