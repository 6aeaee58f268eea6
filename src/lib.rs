//! csi-migrate: in-place migration of in-tree PersistentVolumes to CSI
//!
//! Rewrites legacy volume sources to their CSI driver form one volume at a time, records every
//! pre-migration snapshot in a backup file, and replays that file to roll a migration back.

pub mod backup;
pub mod config;
pub mod error;
pub mod logging;
pub mod migration;
pub mod node_identity;
pub mod quantity;
pub mod retry;
pub mod rollback;
pub mod store;
pub mod tooling;
pub mod translation;
pub mod types;
