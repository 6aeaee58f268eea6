//! In-process `VolumeStore` honoring the same contract as the cluster.
//!
//! Listing is ordered by name and paged with an opaque continuation token. Updates check the
//! resource version and bump it on success. Conflicts and failures can be injected per volume.

use super::{VolumePage, VolumeStore};
use crate::error::StoreError;
use crate::types::{volume_name, VolumeRecord};
use async_trait::async_trait;
use k8s_openapi::api::storage::v1::{CSINode, StorageClass};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

const PV_KIND: &str = "PersistentVolume";

#[derive(Default)]
struct State {
    volumes: BTreeMap<String, VolumeRecord>,
    storage_classes: HashMap<String, StorageClass>,
    csi_nodes: Vec<CSINode>,
    next_version: u64,
    /// Remaining forced conflicts per volume name
    forced_conflicts: HashMap<String, usize>,
    forced_failures: HashMap<String, String>,
    calls: CallCounts,
}

/// Number of calls per store operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub update: usize,
    pub storage_class: usize,
    pub node_registrations: usize,
}

#[derive(Default)]
pub struct InMemoryVolumeStore {
    state: Mutex<State>,
}

impl InMemoryVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a volume, assigning a fresh resource version.
    pub fn insert_volume(&self, mut volume: VolumeRecord) {
        let mut state = self.state.lock();
        state.next_version += 1;
        volume.metadata.resource_version = Some(state.next_version.to_string());
        state
            .volumes
            .insert(volume_name(&volume).to_string(), volume);
    }

    pub fn insert_storage_class(&self, storage_class: StorageClass) {
        let name = storage_class.metadata.name.clone().unwrap_or_default();
        self.state.lock().storage_classes.insert(name, storage_class);
    }

    pub fn insert_node_registration(&self, node: CSINode) {
        self.state.lock().csi_nodes.push(node);
    }

    /// Current stored copy of a volume.
    pub fn volume(&self, name: &str) -> Option<VolumeRecord> {
        self.state.lock().volumes.get(name).cloned()
    }

    /// Make the next `count` updates of `name` fail with a conflict.
    pub fn inject_conflicts(&self, name: &str, count: usize) {
        self.state
            .lock()
            .forced_conflicts
            .insert(name.to_string(), count);
    }

    /// Make every update of `name` fail with a non-conflict API error.
    pub fn inject_update_failure(&self, name: &str, message: &str) {
        self.state
            .lock()
            .forced_failures
            .insert(name.to_string(), message.to_string());
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }
}

#[async_trait]
impl VolumeStore for InMemoryVolumeStore {
    async fn list_volumes(
        &self,
        limit: u32,
        continue_token: Option<String>,
    ) -> Result<VolumePage, StoreError> {
        let mut state = self.state.lock();
        state.calls.list += 1;

        let lower = match &continue_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Unbounded,
        };
        let limit = if limit == 0 { usize::MAX } else { limit as usize };
        let mut remaining = state.volumes.range((lower, Bound::Unbounded));
        let items: Vec<VolumeRecord> = remaining
            .by_ref()
            .take(limit)
            .map(|(_, volume)| volume.clone())
            .collect();
        let continue_token = match remaining.next() {
            Some(_) => items.last().map(|volume| volume_name(volume).to_string()),
            None => None,
        };

        Ok(VolumePage {
            items,
            continue_token,
        })
    }

    async fn get_volume(&self, name: &str) -> Result<VolumeRecord, StoreError> {
        let mut state = self.state.lock();
        state.calls.get += 1;
        state
            .volumes
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: PV_KIND,
                name: name.to_string(),
            })
    }

    async fn update_volume(&self, volume: &VolumeRecord) -> Result<VolumeRecord, StoreError> {
        let mut state = self.state.lock();
        state.calls.update += 1;
        let name = volume_name(volume).to_string();

        if let Some(remaining) = state.forced_conflicts.get_mut(&name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Conflict {
                    kind: PV_KIND,
                    name,
                    message: "the object has been modified".to_string(),
                });
            }
        }
        if let Some(message) = state.forced_failures.get(&name) {
            return Err(StoreError::Api {
                operation: "update_volume",
                message: message.clone(),
            });
        }

        let stored_version = match state.volumes.get(&name) {
            Some(stored) => stored.metadata.resource_version.clone(),
            None => {
                return Err(StoreError::NotFound {
                    kind: PV_KIND,
                    name,
                })
            }
        };
        let requested_version = volume
            .metadata
            .resource_version
            .as_deref()
            .filter(|version| !version.is_empty());
        if let Some(requested) = requested_version {
            if Some(requested) != stored_version.as_deref() {
                return Err(StoreError::Conflict {
                    kind: PV_KIND,
                    name,
                    message: format!(
                        "resource version {} is stale (current {})",
                        requested,
                        stored_version.unwrap_or_default()
                    ),
                });
            }
        }

        state.next_version += 1;
        let mut updated = volume.clone();
        updated.metadata.resource_version = Some(state.next_version.to_string());
        state.volumes.insert(name, updated.clone());
        Ok(updated)
    }

    async fn get_storage_class(&self, name: &str) -> Result<StorageClass, StoreError> {
        let mut state = self.state.lock();
        state.calls.storage_class += 1;
        state
            .storage_classes
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: "StorageClass",
                name: name.to_string(),
            })
    }

    async fn list_node_registrations(&self, limit: u32) -> Result<Vec<CSINode>, StoreError> {
        let mut state = self.state.lock();
        state.calls.node_registrations += 1;
        let limit = if limit == 0 { usize::MAX } else { limit as usize };
        Ok(state.csi_nodes.iter().take(limit).cloned().collect())
    }
}
