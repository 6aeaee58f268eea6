//! GCE PD: `kubernetes.io/gce-pd` -> `pd.csi.storage.gke.io`.
//!
//! Handles are `projects/<project>/zones/<zone>/disks/<name>` (or `regions/<region>` for
//! regional disks). The in-tree source carries no project, so translation writes
//! `UNSPECIFIED` and [`GcePd::repair_handle`] fills it from the node id.

use super::builtin::{volume_zone, InTreePlugin, ZONE_SEPARATOR};
use crate::error::TranslationError;
use crate::types::VolumeRecord;
use k8s_openapi::api::core::v1::{CSIPersistentVolumeSource, PersistentVolumeSpec};
use std::collections::BTreeMap;

const IN_TREE_NAME: &str = "kubernetes.io/gce-pd";
const DRIVER_NAME: &str = "pd.csi.storage.gke.io";
const UNSPECIFIED: &str = "UNSPECIFIED";
const PARTITION_KEY: &str = "partition";

pub(crate) struct GcePd;

/// Region of a zone name: `us-central1-a` -> `us-central1`.
fn zone_to_region(zone: &str) -> Option<&str> {
    let (region, suffix) = zone.rsplit_once('-')?;
    if region.is_empty() || suffix.is_empty() {
        None
    } else {
        Some(region)
    }
}

fn volume_handle(zone_value: Option<&str>, pd_name: &str) -> Result<String, TranslationError> {
    let zones: Vec<&str> = zone_value
        .map(|value| {
            value
                .split(ZONE_SEPARATOR)
                .filter(|zone| !zone.is_empty())
                .collect()
        })
        .unwrap_or_default();

    match zones.as_slice() {
        [] => Ok(format!(
            "projects/{}/zones/{}/disks/{}",
            UNSPECIFIED, UNSPECIFIED, pd_name
        )),
        [zone] => Ok(format!(
            "projects/{}/zones/{}/disks/{}",
            UNSPECIFIED, zone, pd_name
        )),
        [first, second] => {
            let region = zone_to_region(first).ok_or_else(|| TranslationError::InvalidHandle {
                handle: pd_name.to_string(),
                reason: format!("cannot derive region from zone {}", first),
            })?;
            if zone_to_region(second) != Some(region) {
                return Err(TranslationError::InvalidHandle {
                    handle: pd_name.to_string(),
                    reason: format!("zones {} and {} are in different regions", first, second),
                });
            }
            Ok(format!(
                "projects/{}/regions/{}/disks/{}",
                UNSPECIFIED, region, pd_name
            ))
        }
        _ => Err(TranslationError::InvalidHandle {
            handle: pd_name.to_string(),
            reason: format!("expected at most two zones, got {}", zones.len()),
        }),
    }
}

/// Parse `projects/<project>/zones/<zone>/instances/<name>` into (project, zone).
fn parse_node_id(node_id: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = node_id.split('/').collect();
    match parts.as_slice() {
        ["projects", project, "zones", zone, "instances", name]
            if !project.is_empty() && !zone.is_empty() && !name.is_empty() =>
        {
            Some((*project, *zone))
        }
        _ => None,
    }
}

impl InTreePlugin for GcePd {
    fn in_tree_name(&self) -> &'static str {
        IN_TREE_NAME
    }

    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn can_translate(&self, spec: &PersistentVolumeSpec) -> bool {
        spec.gce_persistent_disk.is_some()
    }

    fn translate(
        &self,
        volume: &mut VolumeRecord,
    ) -> Result<CSIPersistentVolumeSource, TranslationError> {
        let zone = volume_zone(volume);
        let source = volume
            .spec
            .as_mut()
            .and_then(|spec| spec.gce_persistent_disk.take())
            .ok_or_else(|| {
                TranslationError::UnsupportedSource(
                    volume.metadata.name.clone().unwrap_or_default(),
                )
            })?;

        let mut attributes = BTreeMap::new();
        if let Some(partition) = source.partition.filter(|p| *p != 0) {
            attributes.insert(PARTITION_KEY.to_string(), partition.to_string());
        }

        Ok(CSIPersistentVolumeSource {
            driver: DRIVER_NAME.to_string(),
            volume_handle: volume_handle(zone.as_deref(), &source.pd_name)?,
            fs_type: source.fs_type,
            read_only: source.read_only,
            volume_attributes: Some(attributes),
            ..Default::default()
        })
    }

    fn repair_handle(&self, handle: &str, node_id: &str) -> Result<String, TranslationError> {
        let (project, node_zone) =
            parse_node_id(node_id).ok_or_else(|| TranslationError::InvalidNodeId {
                driver: DRIVER_NAME.to_string(),
                node_id: node_id.to_string(),
            })?;

        let mut parts: Vec<&str> = handle.split('/').collect();
        if parts.len() != 6 || parts[0] != "projects" || parts[4] != "disks" {
            return Err(TranslationError::InvalidHandle {
                handle: handle.to_string(),
                reason: "expected projects/<project>/<zones|regions>/<location>/disks/<name>"
                    .to_string(),
            });
        }
        if parts[1] == UNSPECIFIED {
            parts[1] = project;
        }
        if parts[2] == "zones" && parts[3] == UNSPECIFIED {
            parts[3] = node_zone;
        }
        Ok(parts.join("/"))
    }
}
