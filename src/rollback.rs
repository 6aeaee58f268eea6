//! Rollback engine
//!
//! Replays a backup file against the store, restoring every volume to its pre-migration
//! snapshot. Snapshots are applied in file order; a volume recorded twice ends up in the state
//! of its last snapshot.

use crate::backup::read_all;
use crate::error::MigrateError;
use crate::retry::{retry_on_conflict, RetryPolicy};
use crate::store::VolumeStore;
use crate::types::{volume_name, VolumeRecord};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Aggregate counts for one rollback run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub processed: usize,
    pub restored: usize,
    pub failed: usize,
}

enum Restore {
    Updated,
    DryRun,
}

pub struct RollbackEngine {
    store: Arc<dyn VolumeStore>,
    retry: RetryPolicy,
}

impl RollbackEngine {
    pub fn new(store: Arc<dyn VolumeStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Restore every snapshot in `backup_file`.
    ///
    /// Per-snapshot failures are logged and counted. A malformed entry ends the stream and is
    /// returned as an error once the snapshots before it have been applied.
    pub async fn rollback(
        &self,
        backup_file: &Path,
        dry_run: bool,
    ) -> Result<RollbackReport, MigrateError> {
        let snapshots = read_all(backup_file)?;
        let mut report = RollbackReport::default();

        for snapshot in snapshots {
            let snapshot = match snapshot {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(
                        processed = report.processed,
                        restored = report.restored,
                        failed = report.failed,
                        error = %err,
                        "Backup file is corrupt, stopping rollback"
                    );
                    return Err(err.into());
                }
            };

            report.processed += 1;
            let name = volume_name(&snapshot).to_string();
            let span = info_span!("volume", name = %name);
            match self.restore(snapshot, dry_run).instrument(span.clone()).await {
                Ok(Restore::Updated) => report.restored += 1,
                Ok(Restore::DryRun) => {}
                Err(err) if err.is_timeout() => {
                    warn!(
                        processed = report.processed,
                        restored = report.restored,
                        failed = report.failed,
                        "Rollback deadline exceeded"
                    );
                    return Err(err);
                }
                Err(err) => {
                    span.in_scope(|| error!(error = %err, "Failed to restore volume"));
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            restored = report.restored,
            failed = report.failed,
            dry_run,
            "Rollback finished"
        );
        Ok(report)
    }

    async fn restore(
        &self,
        mut snapshot: VolumeRecord,
        dry_run: bool,
    ) -> Result<Restore, MigrateError> {
        // The recorded version is stale by now.
        snapshot.metadata.resource_version = None;

        if dry_run {
            debug!(
                volume = %serde_json::to_string(&snapshot).unwrap_or_default(),
                "Dry run, not restoring volume"
            );
            return Ok(Restore::DryRun);
        }

        let snapshot = &snapshot;
        retry_on_conflict(&self.retry, move || async move {
            self.store
                .update_volume(snapshot)
                .await
                .map_err(MigrateError::from)
        })
        .await?;
        info!("Volume restored");
        Ok(Restore::Updated)
    }
}
