//! Run-wide deadline for outbound store calls.

use super::{VolumePage, VolumeStore};
use crate::error::StoreError;
use crate::types::VolumeRecord;
use async_trait::async_trait;
use k8s_openapi::api::storage::v1::{CSINode, StorageClass};
use std::future::Future;
use tokio::time::Instant;

/// Wraps a store so every call is bounded by the same deadline.
///
/// Once the deadline passes, every call fails with [`StoreError::Timeout`].
pub struct DeadlineStore<S> {
    inner: S,
    deadline: Instant,
}

impl<S: VolumeStore> DeadlineStore<S> {
    pub fn new(inner: S, deadline: Instant) -> Self {
        Self { inner, deadline }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        if Instant::now() >= self.deadline {
            return Err(StoreError::Timeout { operation });
        }
        match tokio::time::timeout_at(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout { operation }),
        }
    }
}

#[async_trait]
impl<S: VolumeStore> VolumeStore for DeadlineStore<S> {
    async fn list_volumes(
        &self,
        limit: u32,
        continue_token: Option<String>,
    ) -> Result<VolumePage, StoreError> {
        self.bounded("list_volumes", self.inner.list_volumes(limit, continue_token))
            .await
    }

    async fn get_volume(&self, name: &str) -> Result<VolumeRecord, StoreError> {
        self.bounded("get_volume", self.inner.get_volume(name)).await
    }

    async fn update_volume(&self, volume: &VolumeRecord) -> Result<VolumeRecord, StoreError> {
        self.bounded("update_volume", self.inner.update_volume(volume))
            .await
    }

    async fn get_storage_class(&self, name: &str) -> Result<StorageClass, StoreError> {
        self.bounded("get_storage_class", self.inner.get_storage_class(name))
            .await
    }

    async fn list_node_registrations(&self, limit: u32) -> Result<Vec<CSINode>, StoreError> {
        self.bounded(
            "list_node_registrations",
            self.inner.list_node_registrations(limit),
        )
        .await
    }
}
