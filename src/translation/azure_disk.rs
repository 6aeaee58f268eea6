//! Azure Disk: `kubernetes.io/azure-disk` -> `disk.csi.azure.com`.

use super::builtin::InTreePlugin;
use crate::error::TranslationError;
use crate::types::{VolumeRecord, AZURE_DISK_DRIVER};
use k8s_openapi::api::core::v1::{CSIPersistentVolumeSource, PersistentVolumeSpec};
use std::collections::BTreeMap;

const IN_TREE_NAME: &str = "kubernetes.io/azure-disk";
const CACHING_MODE_KEY: &str = "cachingMode";
const FS_TYPE_KEY: &str = "fsType";
const KIND_KEY: &str = "kind";

pub(crate) struct AzureDisk;

impl InTreePlugin for AzureDisk {
    fn in_tree_name(&self) -> &'static str {
        IN_TREE_NAME
    }

    fn driver_name(&self) -> &'static str {
        AZURE_DISK_DRIVER
    }

    fn can_translate(&self, spec: &PersistentVolumeSpec) -> bool {
        spec.azure_disk.is_some()
    }

    fn translate(
        &self,
        volume: &mut VolumeRecord,
    ) -> Result<CSIPersistentVolumeSource, TranslationError> {
        let source = volume
            .spec
            .as_mut()
            .and_then(|spec| spec.azure_disk.take())
            .ok_or_else(|| {
                TranslationError::UnsupportedSource(
                    volume.metadata.name.clone().unwrap_or_default(),
                )
            })?;

        if source.disk_uri.trim().is_empty() {
            return Err(TranslationError::InvalidHandle {
                handle: source.disk_name,
                reason: "azure disk has no disk URI".to_string(),
            });
        }

        let mut attributes = BTreeMap::new();
        if let Some(caching_mode) = &source.caching_mode {
            attributes.insert(CACHING_MODE_KEY.to_string(), caching_mode.clone());
        }
        if let Some(fs_type) = &source.fs_type {
            attributes.insert(FS_TYPE_KEY.to_string(), fs_type.clone());
        }
        if let Some(kind) = &source.kind {
            attributes.insert(KIND_KEY.to_string(), kind.clone());
        }

        Ok(CSIPersistentVolumeSource {
            driver: AZURE_DISK_DRIVER.to_string(),
            volume_handle: source.disk_uri,
            fs_type: source.fs_type,
            read_only: source.read_only,
            volume_attributes: Some(attributes),
            ..Default::default()
        })
    }
}
