//! AWS EBS: `kubernetes.io/aws-ebs` -> `ebs.csi.aws.com`.

use super::builtin::InTreePlugin;
use crate::error::TranslationError;
use crate::types::VolumeRecord;
use k8s_openapi::api::core::v1::{CSIPersistentVolumeSource, PersistentVolumeSpec};
use std::collections::BTreeMap;

const IN_TREE_NAME: &str = "kubernetes.io/aws-ebs";
const DRIVER_NAME: &str = "ebs.csi.aws.com";
const PARTITION_KEY: &str = "partition";

pub(crate) struct AwsEbs;

/// Strip the `aws://<zone>/` prefix the in-tree plugin accepts.
fn ebs_volume_id(volume_id: &str) -> Result<String, TranslationError> {
    let bare = match volume_id.strip_prefix("aws://") {
        Some(rest) => rest.rsplit('/').next().unwrap_or_default(),
        None => volume_id,
    };
    if !bare.starts_with("vol-") || bare.contains('/') {
        return Err(TranslationError::InvalidHandle {
            handle: volume_id.to_string(),
            reason: "expected an EBS volume id of the form vol-*".to_string(),
        });
    }
    Ok(bare.to_string())
}

impl InTreePlugin for AwsEbs {
    fn in_tree_name(&self) -> &'static str {
        IN_TREE_NAME
    }

    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn can_translate(&self, spec: &PersistentVolumeSpec) -> bool {
        spec.aws_elastic_block_store.is_some()
    }

    fn translate(
        &self,
        volume: &mut VolumeRecord,
    ) -> Result<CSIPersistentVolumeSource, TranslationError> {
        let source = volume
            .spec
            .as_mut()
            .and_then(|spec| spec.aws_elastic_block_store.take())
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
            volume_handle: ebs_volume_id(&source.volume_id)?,
            fs_type: source.fs_type,
            read_only: source.read_only,
            volume_attributes: Some(attributes),
            ..Default::default()
        })
    }
}
