use super::support::{self, azure_volume, csi_volume, ebs_volume, storage_class};
use csi_migrate::backup::read_all;
use csi_migrate::error::MigrateError;
use csi_migrate::migration::{MigrationEngine, MigrationOptions, MigrationReport, Selection};
use csi_migrate::retry::RetryPolicy;
use csi_migrate::store::{DeadlineStore, InMemoryVolumeStore};
use csi_migrate::types::{
    annotation, volume_name, VolumeRecord, ANN_MIGRATED_TO, ANN_PROVISIONED_BY,
    AZURE_REQUESTED_SIZE_KEY, AZURE_SKU_NAME_KEY, PROVISIONER_ID_KEY,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn engine(store: &Arc<InMemoryVolumeStore>) -> MigrationEngine {
    MigrationEngine::new(store.clone(), support::translator())
        .with_retry(RetryPolicy::immediate(5))
}

fn options(path: PathBuf, dry_run: bool) -> MigrationOptions {
    MigrationOptions {
        dry_run,
        backup_file: Some(path),
    }
}

fn backed_up(path: &Path) -> Vec<VolumeRecord> {
    read_all(path).unwrap().map(|entry| entry.unwrap()).collect()
}

#[tokio::test]
async fn dry_run_backs_up_without_updating() {
    let store = support::store();
    store.insert_volume(ebs_volume("pv-1"));
    let original = store.volume("pv-1").unwrap();
    let temp = TempDir::new().unwrap();
    let backup = temp.path().join("backup.json");

    let report = engine(&store)
        .migrate_all(&Selection::default(), &options(backup.clone(), true))
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.migrated, 1);
    assert_eq!(store.calls().update, 0);
    assert_eq!(store.volume("pv-1").unwrap(), original);
    assert_eq!(backed_up(&backup), vec![original]);
}

#[tokio::test]
async fn migrated_volume_is_rewritten_for_the_driver() {
    let store = support::store();
    store.insert_volume(ebs_volume("pv-1"));
    let temp = TempDir::new().unwrap();

    engine(&store)
        .migrate_all(
            &Selection::default(),
            &options(temp.path().join("backup.json"), false),
        )
        .await
        .unwrap();

    let migrated = store.volume("pv-1").unwrap();
    let spec = migrated.spec.as_ref().unwrap();
    assert!(spec.aws_elastic_block_store.is_none());
    let csi = spec.csi.as_ref().unwrap();
    assert_eq!(csi.driver, support::EBS_DRIVER);
    let identity = &csi.volume_attributes.as_ref().unwrap()[PROVISIONER_ID_KEY];
    assert!(identity.ends_with("-0000-ebs.csi.aws.com"), "{}", identity);

    assert_eq!(
        migrated.metadata.labels.as_ref().unwrap().len(),
        1,
        "prior labels must be replaced"
    );
    assert_eq!(migrated.metadata.labels.as_ref().unwrap()["csimigrated"], "true");
    assert_eq!(annotation(&migrated, ANN_PROVISIONED_BY), Some(support::EBS_DRIVER));

    let selector = spec.node_affinity.as_ref().unwrap().required.as_ref().unwrap();
    let keys: Vec<&str> = selector.node_selector_terms[0]
        .match_expressions
        .iter()
        .flatten()
        .map(|expression| expression.key.as_str())
        .collect();
    assert_eq!(keys, vec!["topology.kubernetes.io/zone"]);
}

#[tokio::test]
async fn driver_backed_volumes_are_never_selected() {
    let store = support::store();
    store.insert_volume(csi_volume("pv-csi"));
    let temp = TempDir::new().unwrap();
    let backup = temp.path().join("backup.json");

    let report = engine(&store)
        .migrate_all(&Selection::default(), &options(backup.clone(), false))
        .await
        .unwrap();

    assert_eq!(report.migrated, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.calls().get, 0);
    assert!(backed_up(&backup).is_empty());
}

#[tokio::test]
async fn unrecognized_provisioner_is_skipped_without_error() {
    let store = support::store();
    let mut volume = ebs_volume("pv-nfs");
    volume
        .metadata
        .annotations
        .as_mut()
        .unwrap()
        .insert(ANN_PROVISIONED_BY.to_string(), "example.com/nfs".to_string());
    store.insert_volume(volume);
    let temp = TempDir::new().unwrap();

    let report = engine(&store)
        .migrate_all(
            &Selection::default(),
            &options(temp.path().join("backup.json"), false),
        )
        .await
        .unwrap();

    assert_eq!(
        report,
        MigrationReport {
            processed: 1,
            migrated: 0,
            skipped: 1,
            failed: 0
        }
    );
    assert_eq!(store.calls().update, 0);
}

#[tokio::test]
async fn migrated_to_annotation_wins_over_provisioned_by() {
    let store = support::store();
    let mut volume = ebs_volume("pv-handed-over");
    let annotations = volume.metadata.annotations.as_mut().unwrap();
    annotations.insert(
        ANN_PROVISIONED_BY.to_string(),
        "example.com/unknown".to_string(),
    );
    annotations.insert(ANN_MIGRATED_TO.to_string(), support::EBS_DRIVER.to_string());
    store.insert_volume(volume);
    let temp = TempDir::new().unwrap();

    let report = engine(&store)
        .migrate_all(
            &Selection::default(),
            &options(temp.path().join("backup.json"), false),
        )
        .await
        .unwrap();

    assert_eq!(
        report,
        MigrationReport {
            processed: 1,
            migrated: 1,
            skipped: 0,
            failed: 0
        }
    );
    let migrated = store.volume("pv-handed-over").unwrap();
    assert_eq!(annotation(&migrated, ANN_PROVISIONED_BY), Some(support::EBS_DRIVER));
    assert_eq!(annotation(&migrated, ANN_MIGRATED_TO), None);
    assert_eq!(
        migrated.spec.as_ref().unwrap().csi.as_ref().unwrap().driver,
        support::EBS_DRIVER
    );
}

#[tokio::test]
async fn second_run_migrates_nothing() {
    let store = support::store();
    store.insert_volume(ebs_volume("pv-1"));
    store.insert_volume(ebs_volume("pv-2"));
    let temp = TempDir::new().unwrap();
    let backup = temp.path().join("backup.json");

    let first = engine(&store)
        .migrate_all(&Selection::default(), &options(backup.clone(), false))
        .await
        .unwrap();
    let second = engine(&store)
        .migrate_all(&Selection::default(), &options(backup.clone(), false))
        .await
        .unwrap();

    assert_eq!(first.migrated, 2);
    assert_eq!(second.processed, 2);
    assert_eq!(second.migrated, 0);
    assert!(backed_up(&backup).is_empty());

    let rotated: Vec<_> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path != &backup)
        .collect();
    assert_eq!(rotated.len(), 1);
    assert_eq!(backed_up(&rotated[0]).len(), 2);
}

#[tokio::test]
async fn exhausted_conflicts_fail_only_that_volume() {
    let store = support::store();
    store.insert_volume(ebs_volume("pv-1"));
    store.insert_volume(ebs_volume("pv-2"));
    store.inject_conflicts("pv-1", usize::MAX);
    let temp = TempDir::new().unwrap();
    let backup = temp.path().join("backup.json");

    let report = engine(&store)
        .migrate_all(&Selection::default(), &options(backup.clone(), false))
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.failed, 1);
    // Five attempts at pv-1, one at pv-2.
    assert_eq!(store.calls().update, 6);
    assert!(store.volume("pv-1").unwrap().spec.unwrap().csi.is_none());

    let names: Vec<String> = backed_up(&backup)
        .iter()
        .map(|volume| volume_name(volume).to_string())
        .collect();
    assert_eq!(names, vec!["pv-2"]);
}

#[tokio::test]
async fn transient_conflict_is_retried_with_fresh_copy() {
    let store = support::store();
    store.insert_volume(ebs_volume("pv-1"));
    store.inject_conflicts("pv-1", 2);
    let temp = TempDir::new().unwrap();

    let report = engine(&store)
        .migrate_all(
            &Selection::default(),
            &options(temp.path().join("backup.json"), false),
        )
        .await
        .unwrap();

    assert_eq!(report.migrated, 1);
    assert_eq!(store.calls().update, 3);
    assert_eq!(store.calls().get, 3);
}

#[tokio::test]
async fn other_update_errors_are_not_retried() {
    let store = support::store();
    store.insert_volume(ebs_volume("pv-1"));
    store.inject_update_failure("pv-1", "admission webhook denied the request");
    let temp = TempDir::new().unwrap();

    let report = engine(&store)
        .migrate_all(
            &Selection::default(),
            &options(temp.path().join("backup.json"), false),
        )
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(store.calls().update, 1);
}

#[tokio::test]
async fn azure_volume_without_sku_fails_and_is_not_backed_up() {
    let store = support::store();
    store.insert_storage_class(storage_class("managed", &[("kind", "Managed")]));
    store.insert_volume(azure_volume("pv-az", "managed"));
    let temp = TempDir::new().unwrap();
    let backup = temp.path().join("backup.json");

    let report = engine(&store)
        .migrate_all(&Selection::default(), &options(backup.clone(), false))
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.migrated, 0);
    assert_eq!(store.calls().update, 0);
    assert!(backed_up(&backup).is_empty());
}

#[tokio::test]
async fn azure_volume_gets_driver_attributes() {
    let store = support::store();
    store.insert_storage_class(storage_class("premium", &[("skuName", "Premium_LRS")]));
    store.insert_volume(azure_volume("pv-az", "premium"));
    let temp = TempDir::new().unwrap();

    let report = engine(&store)
        .migrate_all(
            &Selection::default(),
            &options(temp.path().join("backup.json"), false),
        )
        .await
        .unwrap();
    assert_eq!(report.migrated, 1);

    let migrated = store.volume("pv-az").unwrap();
    let attributes = migrated
        .spec
        .unwrap()
        .csi
        .unwrap()
        .volume_attributes
        .unwrap();
    assert_eq!(attributes[AZURE_SKU_NAME_KEY], "Premium_LRS");
    assert_eq!(attributes[AZURE_REQUESTED_SIZE_KEY], "32");
    assert_eq!(attributes["csi.storage.k8s.io/pv/name"], "pv-az");
    assert_eq!(attributes["csi.storage.k8s.io/pvc/name"], "pv-az-claim");
    assert_eq!(attributes["csi.storage.k8s.io/pvc/namespace"], "apps");
}

#[tokio::test]
async fn unregistered_driver_fails_the_volume() {
    let store = Arc::new(InMemoryVolumeStore::new());
    store.insert_volume(ebs_volume("pv-1"));
    let temp = TempDir::new().unwrap();

    let report = engine(&store)
        .migrate_all(
            &Selection::default(),
            &options(temp.path().join("backup.json"), false),
        )
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(store.calls().update, 0);
}

#[tokio::test]
async fn namespace_filter_skips_unclaimed_and_foreign_volumes() {
    let store = support::store();
    store.insert_volume(ebs_volume("pv-1"));
    let mut foreign = ebs_volume("pv-2");
    foreign.spec.as_mut().unwrap().claim_ref.as_mut().unwrap().namespace =
        Some("ops".to_string());
    store.insert_volume(foreign);
    let mut unclaimed = ebs_volume("pv-3");
    unclaimed.spec.as_mut().unwrap().claim_ref = None;
    store.insert_volume(unclaimed);
    let temp = TempDir::new().unwrap();

    let selection = Selection {
        namespace: Some("apps".to_string()),
        ..Default::default()
    };
    let report = engine(&store)
        .migrate_all(&selection, &options(temp.path().join("backup.json"), false))
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped, 2);
}

#[tokio::test]
async fn expired_deadline_aborts_the_run() {
    let store = InMemoryVolumeStore::new();
    store.insert_volume(ebs_volume("pv-1"));
    let bounded = Arc::new(DeadlineStore::new(store, tokio::time::Instant::now()));
    let temp = TempDir::new().unwrap();

    let err = MigrationEngine::new(bounded, support::translator())
        .migrate_all(
            &Selection::default(),
            &options(temp.path().join("backup.json"), false),
        )
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "{}", err);
    assert!(!matches!(err, MigrateError::ConfigError(_)));
}
