//! Error types for the migration tool.
//!
//! Each layer owns a narrow error enum; `MigrateError` is the umbrella the engines return.

use thiserror::Error;

/// Errors surfaced by a [`crate::store::VolumeStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object's resource version is stale.
    #[error("conflict on {kind} {name}: {message}")]
    Conflict {
        kind: &'static str,
        name: String,
        message: String,
    },

    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    /// The run deadline expired before the call completed.
    #[error("operation deadline exceeded during {operation}")]
    Timeout { operation: &'static str },

    #[error("api error during {operation}: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
}

/// Errors from the legacy-to-driver translation rules.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("no translation rule for volume {0}")]
    UnsupportedSource(String),

    #[error("volume {0} already has a CSI source")]
    AlreadyTranslated(String),

    #[error("invalid volume handle {handle:?}: {reason}")]
    InvalidHandle { handle: String, reason: String },

    #[error("invalid node id {node_id:?} for driver {driver}")]
    InvalidNodeId { driver: String, node_id: String },
}

/// Errors from the backup record file.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup file I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode volume {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed backup entry #{index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors resolving a driver's node identity.
#[derive(Debug, Error)]
pub enum NodeIdentityError {
    #[error("could not get a node: no CSINode objects found")]
    NoNodes,

    #[error("node {node} does not register driver {driver}")]
    DriverNotRegistered { node: String, driver: String },

    #[error("could not list node registrations: {0}")]
    Store(#[from] StoreError),
}

/// Errors parsing a resource quantity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("invalid quantity {0:?}")]
    Invalid(String),

    #[error("quantity {0:?} is not a whole number of bytes")]
    Fractional(String),

    #[error("quantity {0:?} overflows a 64-bit integer")]
    Overflow(String),
}

/// Umbrella error for migration and rollback runs.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Invalid or missing configuration; raised before any cluster interaction.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Could not establish the cluster connection.
    #[error("connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("translation failed: {0}")]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("could not get node id: {0}")]
    NodeIdentity(#[from] NodeIdentityError),

    #[error("could not convert storage size: {0}")]
    Quantity(#[from] QuantityError),

    /// The record lacks a field the transformation needs.
    #[error("volume {name}: {reason}")]
    InvalidVolume { name: String, reason: String },

    #[error("could not find {parameter} in storage class {storage_class}")]
    MissingParameter {
        storage_class: String,
        parameter: String,
    },
}

impl MigrateError {
    /// True when the error is an optimistic-concurrency conflict worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, MigrateError::Store(StoreError::Conflict { .. }))
    }

    /// True when the run deadline expired; such errors abort the whole run.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            MigrateError::Store(StoreError::Timeout { .. })
                | MigrateError::NodeIdentity(NodeIdentityError::Store(StoreError::Timeout { .. }))
        )
    }
}
