//! Core types and well-known keys shared by the engines.

use k8s_openapi::api::core::v1::PersistentVolume;

/// A volume record as stored in the cluster and in backup files.
pub type VolumeRecord = PersistentVolume;

/// Name of the plugin or driver that provisioned the volume.
pub const ANN_PROVISIONED_BY: &str = "pv.kubernetes.io/provisioned-by";

/// Set on volumes that the control plane hands over to a CSI driver.
pub const ANN_MIGRATED_TO: &str = "pv.kubernetes.io/migrated-to";

/// Volume attribute carrying the provisioner-of-record identity.
pub const PROVISIONER_ID_KEY: &str = "storage.kubernetes.io/csiProvisionerIdentity";

/// Sentinel segment identifying this tool as the provisioner.
pub const PROVISIONER_ID_SENTINEL: &str = "0000";

/// Label stamped on every migrated volume.
pub const MIGRATED_LABEL: &str = "csimigrated";

pub const REGION_TOPOLOGY_KEY: &str = "topology.kubernetes.io/region";
pub const ZONE_TOPOLOGY_KEY: &str = "topology.kubernetes.io/zone";
pub const LEGACY_ZONE_TOPOLOGY_KEY: &str = "failure-domain.beta.kubernetes.io/zone";

pub const AZURE_DISK_DRIVER: &str = "disk.csi.azure.com";
pub const AZURE_PV_NAME_KEY: &str = "csi.storage.k8s.io/pv/name";
pub const AZURE_PVC_NAME_KEY: &str = "csi.storage.k8s.io/pvc/name";
pub const AZURE_PVC_NAMESPACE_KEY: &str = "csi.storage.k8s.io/pvc/namespace";
pub const AZURE_REQUESTED_SIZE_KEY: &str = "requestedsizegib";
pub const AZURE_SKU_NAME_KEY: &str = "skuName";

/// Name of a record, or the empty string for an unnamed one.
pub fn volume_name(volume: &VolumeRecord) -> &str {
    volume.metadata.name.as_deref().unwrap_or_default()
}

/// True when the record already carries a driver (CSI) source.
pub fn is_driver_backed(volume: &VolumeRecord) -> bool {
    volume
        .spec
        .as_ref()
        .map(|spec| spec.csi.is_some())
        .unwrap_or(false)
}

/// Annotation value, if present.
pub fn annotation<'a>(volume: &'a VolumeRecord, key: &str) -> Option<&'a str> {
    volume
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
}
