//! Volume Store Gateway
//!
//! Listing, fetching and updating PersistentVolumes plus the read-only lookups the
//! transformation needs (storage classes, per-node driver registrations).

pub mod cluster;
pub mod connect;
pub mod deadline;
pub mod memory;

use crate::error::StoreError;
use crate::types::VolumeRecord;
use async_trait::async_trait;
use k8s_openapi::api::storage::v1::{CSINode, StorageClass};

pub use self::cluster::KubeVolumeStore;
pub use self::deadline::DeadlineStore;
pub use self::memory::InMemoryVolumeStore;

/// One page of a volume listing.
#[derive(Debug, Clone, Default)]
pub struct VolumePage {
    pub items: Vec<VolumeRecord>,
    /// Opaque token for the next page; `None` when the listing is exhausted.
    pub continue_token: Option<String>,
}

/// Volume store interface
///
/// `update_volume` must fail with [`StoreError::Conflict`] when the record's resource
/// version is stale. An empty resource version is an unconditional update.
#[async_trait]
pub trait VolumeStore: Send + Sync {
    async fn list_volumes(
        &self,
        limit: u32,
        continue_token: Option<String>,
    ) -> Result<VolumePage, StoreError>;

    async fn get_volume(&self, name: &str) -> Result<VolumeRecord, StoreError>;

    async fn update_volume(&self, volume: &VolumeRecord) -> Result<VolumeRecord, StoreError>;

    async fn get_storage_class(&self, name: &str) -> Result<StorageClass, StoreError>;

    async fn list_node_registrations(&self, limit: u32) -> Result<Vec<CSINode>, StoreError>;
}
