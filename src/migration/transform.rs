//! Per-volume transformation from an in-tree source to a CSI-backed record.

use crate::error::MigrateError;
use crate::node_identity::NodeIdentityCache;
use crate::quantity;
use crate::store::VolumeStore;
use crate::translation::Translator;
use crate::types::{
    annotation, volume_name, VolumeRecord, ANN_MIGRATED_TO, ANN_PROVISIONED_BY,
    AZURE_DISK_DRIVER, AZURE_PVC_NAMESPACE_KEY, AZURE_PVC_NAME_KEY, AZURE_PV_NAME_KEY,
    AZURE_REQUESTED_SIZE_KEY, AZURE_SKU_NAME_KEY, MIGRATED_LABEL, PROVISIONER_ID_KEY,
    PROVISIONER_ID_SENTINEL, REGION_TOPOLOGY_KEY,
};
use k8s_openapi::api::core::v1::{CSIPersistentVolumeSource, PersistentVolumeSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Collaborators the transformation consults.
pub struct TransformContext<'a> {
    pub translator: &'a dyn Translator,
    pub store: &'a dyn VolumeStore,
    pub node_ids: &'a NodeIdentityCache,
    /// Wall clock used for the provisioner identity (unix milliseconds)
    pub now_millis: i64,
}

/// The driver name that makes the volume eligible, `migrated-to` first.
pub fn eligible_driver<'v>(translator: &dyn Translator, volume: &'v VolumeRecord) -> Option<&'v str> {
    [ANN_MIGRATED_TO, ANN_PROVISIONED_BY]
        .into_iter()
        .filter_map(|key| annotation(volume, key))
        .find(|name| translator.is_recognized_driver_name(name))
}

/// Transform a legacy-backed volume into its CSI-backed form.
///
/// Returns `Ok(None)` when neither annotation names a recognized driver.
pub async fn translate_volume(
    volume: VolumeRecord,
    ctx: &TransformContext<'_>,
) -> Result<Option<VolumeRecord>, MigrateError> {
    if eligible_driver(ctx.translator, &volume).is_none() {
        return Ok(None);
    }

    let mut volume = ctx.translator.to_driver_source(volume)?;
    let name = volume_name(&volume).to_string();
    let driver = driver_source(&mut volume)?.driver.clone();

    let node_id = ctx.node_ids.resolve(ctx.store, &driver).await?;
    let csi = driver_source(&mut volume)?;
    csi.volume_handle = ctx
        .translator
        .repair_handle(&driver, &csi.volume_handle, &node_id)?;

    stamp_provisioner_identity(csi, ctx.now_millis);
    mark_migrated(&mut volume.metadata);
    if let Some(spec) = volume.spec.as_mut() {
        drop_region_affinity(spec);
    }
    hand_over_annotations(&mut volume.metadata, &driver);

    if driver == AZURE_DISK_DRIVER {
        let storage_class = volume
            .spec
            .as_ref()
            .and_then(|spec| spec.storage_class_name.clone())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MigrateError::InvalidVolume {
                name: name.clone(),
                reason: "volume has no storage class".to_string(),
            })?;
        let class = ctx.store.get_storage_class(&storage_class).await?;
        let sku = class
            .parameters
            .as_ref()
            .and_then(|parameters| parameters.get(AZURE_SKU_NAME_KEY))
            .cloned()
            .ok_or_else(|| MigrateError::MissingParameter {
                storage_class: storage_class.clone(),
                parameter: AZURE_SKU_NAME_KEY.to_string(),
            })?;
        apply_azure_attributes(&mut volume, &sku)?;
    }

    Ok(Some(volume))
}

fn driver_source(volume: &mut VolumeRecord) -> Result<&mut CSIPersistentVolumeSource, MigrateError> {
    let name = volume_name(volume).to_string();
    volume
        .spec
        .as_mut()
        .and_then(|spec| spec.csi.as_mut())
        .ok_or(MigrateError::InvalidVolume {
            name,
            reason: "translation produced no CSI source".to_string(),
        })
}

/// Provisioner identity value: `<unix-millis>-0000-<driver>`.
pub fn provisioner_identity(now_millis: i64, driver: &str) -> String {
    format!("{}-{}-{}", now_millis, PROVISIONER_ID_SENTINEL, driver)
}

pub fn stamp_provisioner_identity(csi: &mut CSIPersistentVolumeSource, now_millis: i64) {
    let identity = provisioner_identity(now_millis, &csi.driver);
    csi.volume_attributes
        .get_or_insert_with(BTreeMap::new)
        .insert(PROVISIONER_ID_KEY.to_string(), identity);
}

/// Replace all labels with the single migration label.
pub fn mark_migrated(metadata: &mut ObjectMeta) {
    metadata.labels = Some(BTreeMap::from([(
        MIGRATED_LABEL.to_string(),
        "true".to_string(),
    )]));
}

/// Drop region match expressions from the first node selector term only.
pub fn drop_region_affinity(spec: &mut PersistentVolumeSpec) {
    let first_term = spec
        .node_affinity
        .as_mut()
        .and_then(|affinity| affinity.required.as_mut())
        .and_then(|selector| selector.node_selector_terms.first_mut());
    if let Some(term) = first_term {
        if let Some(expressions) = term.match_expressions.as_mut() {
            expressions.retain(|expression| expression.key != REGION_TOPOLOGY_KEY);
        }
    }
}

/// Hand the volume's lifecycle to the driver.
pub fn hand_over_annotations(metadata: &mut ObjectMeta, driver: &str) {
    let annotations = metadata.annotations.get_or_insert_with(BTreeMap::new);
    annotations.remove(ANN_MIGRATED_TO);
    annotations.insert(ANN_PROVISIONED_BY.to_string(), driver.to_string());
}

/// Attributes the Azure disk driver expects on volumes it provisioned itself.
pub fn apply_azure_attributes(volume: &mut VolumeRecord, sku: &str) -> Result<(), MigrateError> {
    let name = volume_name(volume).to_string();
    let spec = volume.spec.as_mut().ok_or_else(|| MigrateError::InvalidVolume {
        name: name.clone(),
        reason: "volume has no spec".to_string(),
    })?;

    let claim = spec
        .claim_ref
        .as_ref()
        .ok_or_else(|| MigrateError::InvalidVolume {
            name: name.clone(),
            reason: "volume has no claim reference".to_string(),
        })?;
    let claim_name = claim.name.clone().unwrap_or_default();
    let claim_namespace = claim.namespace.clone().unwrap_or_default();

    let storage = spec
        .capacity
        .as_ref()
        .and_then(|capacity| capacity.get("storage"))
        .ok_or_else(|| MigrateError::InvalidVolume {
            name: name.clone(),
            reason: "volume has no storage capacity".to_string(),
        })?;
    let size_gib = quantity::to_whole_gib(&storage.0)?;

    let csi = spec.csi.as_mut().ok_or_else(|| MigrateError::InvalidVolume {
        name: name.clone(),
        reason: "volume has no CSI source".to_string(),
    })?;
    let attributes = csi.volume_attributes.get_or_insert_with(BTreeMap::new);
    attributes.insert(AZURE_PV_NAME_KEY.to_string(), name);
    attributes.insert(AZURE_PVC_NAME_KEY.to_string(), claim_name);
    attributes.insert(AZURE_PVC_NAMESPACE_KEY.to_string(), claim_namespace);
    attributes.insert(AZURE_REQUESTED_SIZE_KEY.to_string(), size_gib.to_string());
    attributes.insert(AZURE_SKU_NAME_KEY.to_string(), sku.to_string());
    Ok(())
}
