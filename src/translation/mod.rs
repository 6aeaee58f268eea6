//! Translation Service
//!
//! Converts in-tree volume sources to their CSI driver encoding. The engines only see the
//! [`Translator`] trait; [`InTreeTranslator`] carries the built-in rule table.

mod aws_ebs;
mod azure_disk;
mod builtin;
mod gce_pd;

use crate::error::TranslationError;
use crate::types::VolumeRecord;

pub use builtin::InTreeTranslator;

/// Legacy-to-driver translation capability.
pub trait Translator: Send + Sync {
    /// True when `name` is an in-tree plugin or CSI driver covered by the rule table.
    fn is_recognized_driver_name(&self, name: &str) -> bool;

    /// Replace the in-tree source of `volume` with the equivalent CSI source.
    fn to_driver_source(&self, volume: VolumeRecord) -> Result<VolumeRecord, TranslationError>;

    /// Fix up a translated volume handle using the node identity reported for `driver`.
    fn repair_handle(
        &self,
        driver: &str,
        handle: &str,
        node_id: &str,
    ) -> Result<String, TranslationError>;
}
