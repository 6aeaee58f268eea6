//! Record selection filters.

use crate::error::MigrateError;
use crate::types::{volume_name, VolumeRecord};
use std::fmt;
use std::str::FromStr;

/// A claim to migrate, optionally namespace-qualified (`namespace/name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSelector {
    pub namespace: Option<String>,
    pub name: String,
}

impl FromStr for ClaimSelector {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (namespace, name) = match s.split_once('/') {
            Some((namespace, name)) => (Some(namespace.to_string()), name),
            None => (None, s),
        };
        if name.is_empty() || name.contains('/') || namespace.as_deref() == Some("") {
            return Err(MigrateError::ConfigError(format!(
                "invalid claim selector {:?}: expected <name> or <namespace>/<name>",
                s
            )));
        }
        Ok(Self {
            namespace,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ClaimSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Which volumes a run considers. Empty selection means every volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub volume: Option<String>,
    pub claim: Option<ClaimSelector>,
    pub namespace: Option<String>,
}

impl Selection {
    /// Reason the volume is filtered out, checked volume, then claim, then namespace.
    ///
    /// A volume without a claim reference never matches a claim or namespace filter.
    pub fn rejection(&self, volume: &VolumeRecord) -> Option<&'static str> {
        if let Some(wanted) = &self.volume {
            if volume_name(volume) != wanted {
                return Some("volume is not the one specified");
            }
        }

        let claim_ref = volume.spec.as_ref().and_then(|spec| spec.claim_ref.as_ref());
        let claim_name = claim_ref.and_then(|claim| claim.name.as_deref());
        let claim_namespace = claim_ref.and_then(|claim| claim.namespace.as_deref());

        if let Some(wanted) = &self.claim {
            if claim_name != Some(wanted.name.as_str()) {
                return Some("volume's claim is not the one specified");
            }
            if let Some(namespace) = &wanted.namespace {
                if claim_namespace != Some(namespace.as_str()) {
                    return Some("volume's claim is not the one specified");
                }
            }
        }

        if let Some(namespace) = &self.namespace {
            if claim_namespace != Some(namespace.as_str()) {
                return Some("volume's claim is not in the specified namespace");
            }
        }

        None
    }
}
