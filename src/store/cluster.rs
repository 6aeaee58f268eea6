//! `VolumeStore` backed by the Kubernetes API.

use super::{VolumePage, VolumeStore};
use crate::error::StoreError;
use crate::types::{volume_name, VolumeRecord};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolume;
use k8s_openapi::api::storage::v1::{CSINode, StorageClass};
use kube::api::{ListParams, PostParams};
use kube::{Api, Client};
use tracing::debug;

pub struct KubeVolumeStore {
    volumes: Api<PersistentVolume>,
    storage_classes: Api<StorageClass>,
    csi_nodes: Api<CSINode>,
}

impl KubeVolumeStore {
    pub fn new(client: Client) -> Self {
        Self {
            volumes: Api::all(client.clone()),
            storage_classes: Api::all(client.clone()),
            csi_nodes: Api::all(client),
        }
    }
}

/// Map a client error onto the store contract.
fn map_error(
    err: kube::Error,
    operation: &'static str,
    kind: &'static str,
    name: &str,
) -> StoreError {
    match err {
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict {
            kind,
            name: name.to_string(),
            message: response.message,
        },
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound {
            kind,
            name: name.to_string(),
        },
        other => StoreError::Api {
            operation,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl VolumeStore for KubeVolumeStore {
    async fn list_volumes(
        &self,
        limit: u32,
        continue_token: Option<String>,
    ) -> Result<VolumePage, StoreError> {
        let mut params = ListParams::default().limit(limit);
        if let Some(token) = continue_token.as_deref() {
            params = params.continue_token(token);
        }
        let list = self
            .volumes
            .list(&params)
            .await
            .map_err(|e| map_error(e, "list_volumes", "PersistentVolume", ""))?;
        debug!(count = list.items.len(), "listed volume page");
        Ok(VolumePage {
            items: list.items,
            continue_token: list.metadata.continue_.filter(|token| !token.is_empty()),
        })
    }

    async fn get_volume(&self, name: &str) -> Result<VolumeRecord, StoreError> {
        self.volumes
            .get(name)
            .await
            .map_err(|e| map_error(e, "get_volume", "PersistentVolume", name))
    }

    async fn update_volume(&self, volume: &VolumeRecord) -> Result<VolumeRecord, StoreError> {
        let name = volume_name(volume);
        self.volumes
            .replace(name, &PostParams::default(), volume)
            .await
            .map_err(|e| map_error(e, "update_volume", "PersistentVolume", name))
    }

    async fn get_storage_class(&self, name: &str) -> Result<StorageClass, StoreError> {
        self.storage_classes
            .get(name)
            .await
            .map_err(|e| map_error(e, "get_storage_class", "StorageClass", name))
    }

    async fn list_node_registrations(&self, limit: u32) -> Result<Vec<CSINode>, StoreError> {
        let list = self
            .csi_nodes
            .list(&ListParams::default().limit(limit))
            .await
            .map_err(|e| map_error(e, "list_node_registrations", "CSINode", ""))?;
        Ok(list.items)
    }
}
