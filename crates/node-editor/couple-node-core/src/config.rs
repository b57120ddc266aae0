//! Configuration for the couple region extension.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reconcile::ReconcileSettings;
use crate::types::COUPLE_REGION;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config json parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Names the extension matches on and the names it gives to what it creates.
///
/// Every field has a default, so a partial JSON object is enough to override
/// a single setting. The reference input count stays fixed in
/// [`REFERENCE_INPUT_COUNT`](crate::reconcile::REFERENCE_INPUT_COUNT).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Identifier the extension registers under.
    pub name: String,
    /// Node categories are matched by prefix (`loaders/...` still matches).
    pub category_prefix: String,
    /// Node type names that get the mask selector behavior.
    pub node_names: Vec<String>,
    pub count_widget: String,
    pub socket_type: String,
    pub socket_prefix: String,
    pub button_label: String,
    /// Substring of a node type name that reserves one leading input.
    pub selective_marker: String,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            name: "loaders.jsnodes".to_string(),
            category_prefix: "loaders".to_string(),
            node_names: vec!["ComfyCoupleMask".to_string()],
            count_widget: "inputcount".to_string(),
            socket_type: COUPLE_REGION.to_string(),
            socket_prefix: "region".to_string(),
            button_label: "Update inputs".to_string(),
            selective_marker: "selective".to_string(),
        }
    }
}

impl ExtensionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: ExtensionConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_names.is_empty() {
            return Err(ConfigError::Invalid("node_names is empty".into()));
        }
        for (field, value) in [
            ("count_widget", &self.count_widget),
            ("socket_type", &self.socket_type),
            ("socket_prefix", &self.socket_prefix),
            ("selective_marker", &self.selective_marker),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Invalid(format!("{field} is empty")));
            }
        }
        Ok(())
    }

    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            count_widget: self.count_widget.clone(),
            socket_prefix: self.socket_prefix.clone(),
            socket_type: self.socket_type.clone(),
        }
    }
}
