//! Node-identity cache
//!
//! Memoizes the node id a CSI driver reports for the cluster's nodes. Only the first listed
//! node is consulted: a driver's node identity is treated as uniform across nodes for the
//! duration of a run. Entries are never invalidated, so a cache must not outlive its run.

use crate::error::NodeIdentityError;
use crate::store::VolumeStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct NodeIdentityCache {
    entries: Mutex<HashMap<String, String>>,
}

impl NodeIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node id registered for `driver`, looked up on first use.
    pub async fn resolve(
        &self,
        store: &dyn VolumeStore,
        driver: &str,
    ) -> Result<String, NodeIdentityError> {
        if let Some(node_id) = self.entries.lock().get(driver) {
            return Ok(node_id.clone());
        }

        let nodes = store.list_node_registrations(1).await?;
        let node = nodes.first().ok_or(NodeIdentityError::NoNodes)?;
        let registration = node
            .spec
            .drivers
            .iter()
            .find(|registration| registration.name == driver)
            .ok_or_else(|| NodeIdentityError::DriverNotRegistered {
                node: node.metadata.name.clone().unwrap_or_default(),
                driver: driver.to_string(),
            })?;

        debug!(driver, node_id = %registration.node_id, "cached node id");
        self.entries
            .lock()
            .insert(driver.to_string(), registration.node_id.clone());
        Ok(registration.node_id.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
