//! Shared fixtures: a stub translator and volume builders.

use csi_migrate::error::TranslationError;
use csi_migrate::store::InMemoryVolumeStore;
use csi_migrate::translation::Translator;
use csi_migrate::types::{VolumeRecord, ANN_PROVISIONED_BY};
use k8s_openapi::api::core::v1::{
    AWSElasticBlockStoreVolumeSource, AzureDiskVolumeSource, CSIPersistentVolumeSource,
    NodeSelector, NodeSelectorRequirement, NodeSelectorTerm, ObjectReference,
    PersistentVolumeSpec, VolumeNodeAffinity,
};
use k8s_openapi::api::storage::v1::{CSINode, CSINodeDriver, CSINodeSpec, StorageClass};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const EBS_IN_TREE: &str = "kubernetes.io/aws-ebs";
pub const EBS_DRIVER: &str = "ebs.csi.aws.com";
pub const AZURE_IN_TREE: &str = "kubernetes.io/azure-disk";
pub const AZURE_DRIVER: &str = "disk.csi.azure.com";

/// Moves the legacy source into a CSI source verbatim; handles are never repaired.
pub struct StubTranslator;

impl Translator for StubTranslator {
    fn is_recognized_driver_name(&self, name: &str) -> bool {
        matches!(name, EBS_IN_TREE | EBS_DRIVER | AZURE_IN_TREE | AZURE_DRIVER)
    }

    fn to_driver_source(&self, mut volume: VolumeRecord) -> Result<VolumeRecord, TranslationError> {
        let name = volume.metadata.name.clone().unwrap_or_default();
        let spec = volume
            .spec
            .as_mut()
            .ok_or_else(|| TranslationError::UnsupportedSource(name.clone()))?;
        let csi = if let Some(ebs) = spec.aws_elastic_block_store.take() {
            CSIPersistentVolumeSource {
                driver: EBS_DRIVER.to_string(),
                volume_handle: ebs.volume_id,
                fs_type: ebs.fs_type,
                ..Default::default()
            }
        } else if let Some(azure) = spec.azure_disk.take() {
            CSIPersistentVolumeSource {
                driver: AZURE_DRIVER.to_string(),
                volume_handle: azure.disk_uri,
                fs_type: azure.fs_type,
                ..Default::default()
            }
        } else {
            return Err(TranslationError::UnsupportedSource(name));
        };
        spec.csi = Some(csi);
        Ok(volume)
    }

    fn repair_handle(
        &self,
        _driver: &str,
        handle: &str,
        _node_id: &str,
    ) -> Result<String, TranslationError> {
        Ok(handle.to_string())
    }
}

pub fn translator() -> Arc<dyn Translator> {
    Arc::new(StubTranslator)
}

fn metadata(name: &str, provisioner: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        annotations: Some(BTreeMap::from([(
            ANN_PROVISIONED_BY.to_string(),
            provisioner.to_string(),
        )])),
        labels: Some(BTreeMap::from([("app".to_string(), "db".to_string())])),
        ..Default::default()
    }
}

fn affinity() -> VolumeNodeAffinity {
    VolumeNodeAffinity {
        required: Some(NodeSelector {
            node_selector_terms: vec![NodeSelectorTerm {
                match_expressions: Some(vec![
                    NodeSelectorRequirement {
                        key: "topology.kubernetes.io/zone".to_string(),
                        operator: "In".to_string(),
                        values: Some(vec!["us-east-1a".to_string()]),
                    },
                    NodeSelectorRequirement {
                        key: "topology.kubernetes.io/region".to_string(),
                        operator: "In".to_string(),
                        values: Some(vec!["us-east-1".to_string()]),
                    },
                ]),
                match_fields: None,
            }],
        }),
    }
}

fn capacity(size: &str) -> Option<BTreeMap<String, Quantity>> {
    Some(BTreeMap::from([(
        "storage".to_string(),
        Quantity(size.to_string()),
    )]))
}

fn claim(namespace: &str, name: &str) -> Option<ObjectReference> {
    Some(ObjectReference {
        namespace: Some(namespace.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    })
}

pub fn ebs_volume(name: &str) -> VolumeRecord {
    VolumeRecord {
        metadata: metadata(name, EBS_IN_TREE),
        spec: Some(PersistentVolumeSpec {
            aws_elastic_block_store: Some(AWSElasticBlockStoreVolumeSource {
                volume_id: format!("vol-{}", name),
                fs_type: Some("ext4".to_string()),
                ..Default::default()
            }),
            capacity: capacity("10Gi"),
            claim_ref: claim("apps", &format!("{}-claim", name)),
            node_affinity: Some(affinity()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn azure_volume(name: &str, storage_class: &str) -> VolumeRecord {
    VolumeRecord {
        metadata: metadata(name, AZURE_IN_TREE),
        spec: Some(PersistentVolumeSpec {
            azure_disk: Some(AzureDiskVolumeSource {
                disk_name: name.to_string(),
                disk_uri: format!("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/disks/{}", name),
                ..Default::default()
            }),
            capacity: capacity("32Gi"),
            claim_ref: claim("apps", &format!("{}-claim", name)),
            storage_class_name: Some(storage_class.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn csi_volume(name: &str) -> VolumeRecord {
    VolumeRecord {
        metadata: metadata(name, EBS_DRIVER),
        spec: Some(PersistentVolumeSpec {
            csi: Some(CSIPersistentVolumeSource {
                driver: EBS_DRIVER.to_string(),
                volume_handle: format!("vol-{}", name),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn storage_class(name: &str, parameters: &[(&str, &str)]) -> StorageClass {
    StorageClass {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        provisioner: AZURE_IN_TREE.to_string(),
        parameters: Some(
            parameters
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

/// Store with one node registering both drivers.
pub fn store() -> Arc<InMemoryVolumeStore> {
    let store = Arc::new(InMemoryVolumeStore::new());
    store.insert_node_registration(CSINode {
        metadata: ObjectMeta {
            name: Some("node-a".to_string()),
            ..Default::default()
        },
        spec: CSINodeSpec {
            drivers: [(EBS_DRIVER, "i-0123"), (AZURE_DRIVER, "aks-node-0")]
                .into_iter()
                .map(|(driver, node_id)| CSINodeDriver {
                    name: driver.to_string(),
                    node_id: node_id.to_string(),
                    ..Default::default()
                })
                .collect(),
        },
    });
    store
}
