use std::fmt::Debug;

use crate::config::ExtensionConfig;
use crate::host::NodeInputs;
use crate::reconcile::{self, ReconcileError, ReconcileOutcome, ReconcileSettings};
use crate::types::{ButtonAction, Node, Widget};

/// Per-type behavior a host attaches to node types it hands to the registry.
pub trait NodeBehavior: Debug + Send + Sync {
    /// Called once for every freshly instantiated node of the bound type.
    fn on_create(&self, node: &mut Node);

    /// Bring the node's dynamic inputs in line with its widgets.
    fn reconcile(&self, node: &mut dyn NodeInputs) -> Result<ReconcileOutcome, ReconcileError>;

    /// Dispatch a button activation.
    fn on_action(
        &self,
        node: &mut dyn NodeInputs,
        action: ButtonAction,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match action {
            ButtonAction::Reconcile => self.reconcile(node),
        }
    }
}

/// Behavior of the couple mask selector: an "Update inputs" button that
/// resizes the `region_<k>` sockets to the `inputcount` widget.
#[derive(Debug, Clone)]
pub struct MaskSelector {
    settings: ReconcileSettings,
    button_label: String,
    selective_marker: String,
}

impl Default for MaskSelector {
    fn default() -> Self {
        MaskSelector::from_config(&ExtensionConfig::default())
    }
}

impl MaskSelector {
    pub fn from_config(cfg: &ExtensionConfig) -> Self {
        MaskSelector {
            settings: cfg.reconcile_settings(),
            button_label: cfg.button_label.clone(),
            selective_marker: cfg.selective_marker.clone(),
        }
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Leading sockets reserved for a node type: one for selective variants.
    pub fn offset_for(&self, type_name: &str) -> usize {
        usize::from(type_name.contains(self.selective_marker.as_str()))
    }
}

impl NodeBehavior for MaskSelector {
    fn on_create(&self, node: &mut Node) {
        node.socket_type = Some(self.settings.socket_type.clone());
        node.inputs_offset = self.offset_for(&node.type_name);
        node.widgets
            .push(Widget::button(self.button_label.clone(), ButtonAction::Reconcile));
    }

    fn reconcile(&self, node: &mut dyn NodeInputs) -> Result<ReconcileOutcome, ReconcileError> {
        reconcile::reconcile(node, &self.settings)
    }
}
