//! Built-in rule table for the in-tree plugins this tool knows how to migrate.

use super::aws_ebs::AwsEbs;
use super::azure_disk::AzureDisk;
use super::gce_pd::GcePd;
use super::Translator;
use crate::error::TranslationError;
use crate::types::{
    volume_name, VolumeRecord, LEGACY_ZONE_TOPOLOGY_KEY, REGION_TOPOLOGY_KEY, ZONE_TOPOLOGY_KEY,
};
use k8s_openapi::api::core::v1::{CSIPersistentVolumeSource, PersistentVolumeSpec};

const LEGACY_REGION_TOPOLOGY_KEY: &str = "failure-domain.beta.kubernetes.io/region";

/// One in-tree plugin and its CSI counterpart.
pub(crate) trait InTreePlugin: Send + Sync {
    fn in_tree_name(&self) -> &'static str;

    fn driver_name(&self) -> &'static str;

    fn can_translate(&self, spec: &PersistentVolumeSpec) -> bool;

    /// Build the CSI source and clear the in-tree one.
    fn translate(
        &self,
        volume: &mut VolumeRecord,
    ) -> Result<CSIPersistentVolumeSource, TranslationError>;

    fn repair_handle(&self, handle: &str, _node_id: &str) -> Result<String, TranslationError> {
        Ok(handle.to_string())
    }
}

pub struct InTreeTranslator {
    plugins: Vec<Box<dyn InTreePlugin>>,
}

impl Default for InTreeTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl InTreeTranslator {
    pub fn new() -> Self {
        Self {
            plugins: vec![Box::new(AwsEbs), Box::new(GcePd), Box::new(AzureDisk)],
        }
    }

    fn plugin_by_name(&self, name: &str) -> Option<&dyn InTreePlugin> {
        self.plugins
            .iter()
            .map(|plugin| plugin.as_ref())
            .find(|plugin| plugin.in_tree_name() == name || plugin.driver_name() == name)
    }
}

impl Translator for InTreeTranslator {
    fn is_recognized_driver_name(&self, name: &str) -> bool {
        !name.is_empty() && self.plugin_by_name(name).is_some()
    }

    fn to_driver_source(
        &self,
        mut volume: VolumeRecord,
    ) -> Result<VolumeRecord, TranslationError> {
        let name = volume_name(&volume).to_string();
        let spec = volume
            .spec
            .as_ref()
            .ok_or_else(|| TranslationError::UnsupportedSource(name.clone()))?;
        if spec.csi.is_some() {
            return Err(TranslationError::AlreadyTranslated(name));
        }

        let plugin = self
            .plugins
            .iter()
            .find(|plugin| plugin.can_translate(spec))
            .ok_or_else(|| TranslationError::UnsupportedSource(name.clone()))?;

        let csi = plugin.translate(&mut volume)?;
        if let Some(spec) = volume.spec.as_mut() {
            translate_topology_keys(spec);
            spec.csi = Some(csi);
        }
        Ok(volume)
    }

    fn repair_handle(
        &self,
        driver: &str,
        handle: &str,
        node_id: &str,
    ) -> Result<String, TranslationError> {
        match self.plugin_by_name(driver) {
            Some(plugin) => plugin.repair_handle(handle, node_id),
            None => Ok(handle.to_string()),
        }
    }
}

/// Rewrite deprecated beta topology keys in the node affinity to their GA names.
fn translate_topology_keys(spec: &mut PersistentVolumeSpec) {
    let terms = spec
        .node_affinity
        .as_mut()
        .and_then(|affinity| affinity.required.as_mut())
        .map(|selector| selector.node_selector_terms.iter_mut());
    let Some(terms) = terms else {
        return;
    };
    for term in terms {
        for expression in term.match_expressions.iter_mut().flatten() {
            if expression.key == LEGACY_ZONE_TOPOLOGY_KEY {
                expression.key = ZONE_TOPOLOGY_KEY.to_string();
            } else if expression.key == LEGACY_REGION_TOPOLOGY_KEY {
                expression.key = REGION_TOPOLOGY_KEY.to_string();
            }
        }
    }
}

/// Zone label value of a volume, from its labels or the first node affinity term.
pub(crate) fn volume_zone(volume: &VolumeRecord) -> Option<String> {
    let from_labels = volume.metadata.labels.as_ref().and_then(|labels| {
        labels
            .get(ZONE_TOPOLOGY_KEY)
            .or_else(|| labels.get(LEGACY_ZONE_TOPOLOGY_KEY))
            .cloned()
    });
    if from_labels.is_some() {
        return from_labels;
    }

    let term = volume
        .spec
        .as_ref()?
        .node_affinity
        .as_ref()?
        .required
        .as_ref()?
        .node_selector_terms
        .first()?;
    term.match_expressions
        .iter()
        .flatten()
        .filter(|expression| {
            expression.key == ZONE_TOPOLOGY_KEY || expression.key == LEGACY_ZONE_TOPOLOGY_KEY
        })
        .find_map(|expression| {
            let values = expression.values.as_ref()?;
            if values.is_empty() {
                None
            } else {
                Some(values.join(ZONE_SEPARATOR))
            }
        })
}

/// Separator between zones of a multi-zone label value.
pub(crate) const ZONE_SEPARATOR: &str = "__";
