//! In-memory editor host.
//!
//! [`NodeEditor`] plays the part of the visual editor: it keeps the node type
//! definitions, instantiates nodes, owns the link table and routes button
//! activations to the behavior bound to each node type.

use std::sync::Arc;

use hashbrown::HashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::behavior::NodeBehavior;
use crate::host::NodeInputs;
use crate::reconcile::{ReconcileError, ReconcileOutcome};
use crate::registry::{BehaviorRegistry, Extension};
use crate::schema::NodeDef;
use crate::types::{InputSocket, LinkId, Node, NodeId, OutputSocket, Widget, ANY_TYPE};

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {node} has no widget `{name}`")]
    UnknownWidget { node: NodeId, name: String },
    #[error("widget `{name}` rejected value {value}")]
    RejectedValue { name: String, value: String },
    #[error("node {node} has no {side} slot {slot}")]
    SlotOutOfRange {
        node: NodeId,
        side: &'static str,
        slot: usize,
    },
    #[error("cannot connect {from} output to {to} input")]
    TypeMismatch { from: String, to: String },
    #[error("widget `{0}` has no action")]
    NoAction(String),
    #[error("node type `{0}` has no behavior")]
    NoBehavior(String),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("graph json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A connection from an output slot to an input slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub origin_node: NodeId,
    pub origin_slot: usize,
    pub target_node: NodeId,
    pub target_slot: usize,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: HashMap<NodeId, Node>,
    #[serde(default)]
    pub links: HashMap<LinkId, Link>,
    #[serde(default)]
    pub last_node_id: NodeId,
    #[serde(default)]
    pub last_link_id: LinkId,
}

impl Graph {
    /// Mutable access to one node together with the link table it feeds.
    pub fn handle(&mut self, id: NodeId) -> Option<NodeHandle<'_>> {
        let node = self.nodes.get_mut(&id)?;
        Some(NodeHandle {
            node,
            links: &mut self.links,
        })
    }
}

/// A node inside a [`Graph`]; removing a socket also drops its link and
/// re-targets the links of the sockets that move down.
#[derive(Debug)]
pub struct NodeHandle<'a> {
    node: &'a mut Node,
    links: &'a mut HashMap<LinkId, Link>,
}

impl NodeInputs for NodeHandle<'_> {
    fn offset(&self) -> usize {
        self.node.inputs_offset
    }

    fn input_len(&self) -> usize {
        self.node.inputs.len()
    }

    fn socket_type(&self) -> Option<&str> {
        self.node.socket_type.as_deref()
    }

    fn find_widget(&self, name: &str) -> Option<&Widget> {
        self.node.find_widget(name)
    }

    fn add_input(&mut self, name: String, ty: &str) {
        self.node.inputs.push(InputSocket::new(name, ty));
    }

    fn remove_input(&mut self, index: usize) -> Option<InputSocket> {
        if index >= self.node.inputs.len() {
            return None;
        }
        let socket = self.node.inputs.remove(index);
        if let Some(id) = socket.link {
            self.links.remove(&id);
        }
        for moved in &self.node.inputs[index..] {
            if let Some(link) = moved.link.and_then(|id| self.links.get_mut(&id)) {
                link.target_slot -= 1;
            }
        }
        Some(socket)
    }
}

#[derive(Debug, Default)]
pub struct NodeEditor {
    pub graph: Graph,
    registry: BehaviorRegistry,
    defs: HashMap<String, NodeDef>,
    behaviors: HashMap<String, Arc<dyn NodeBehavior>>,
}

impl NodeEditor {
    pub fn new(registry: BehaviorRegistry) -> Self {
        NodeEditor {
            registry,
            ..Default::default()
        }
    }

    pub fn with_extension(extension: &Extension) -> Self {
        let mut registry = BehaviorRegistry::new();
        registry.install(extension);
        Self::new(registry)
    }

    /// Register a node type, binding its behavior if the registry claims it.
    /// Returns whether a behavior was bound.
    pub fn register_node_def(&mut self, def: NodeDef) -> bool {
        let behavior = self.registry.resolve(&def);
        let claimed = behavior.is_some();
        match behavior {
            Some(b) => {
                debug!("bound behavior to node type {}", def.name);
                self.behaviors.insert(def.name.clone(), b);
            }
            None => {
                self.behaviors.remove(&def.name);
            }
        }
        self.defs.insert(def.name.clone(), def);
        claimed
    }

    pub fn register_node_defs(&mut self, defs: impl IntoIterator<Item = NodeDef>) -> usize {
        defs.into_iter()
            .map(|d| self.register_node_def(d))
            .filter(|claimed| *claimed)
            .count()
    }

    pub fn node_def(&self, name: &str) -> Option<&NodeDef> {
        self.defs.get(name)
    }

    pub fn behavior_for(&self, type_name: &str) -> Option<&Arc<dyn NodeBehavior>> {
        self.behaviors.get(type_name)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.nodes.get(&id)
    }

    /// Instantiate a node of a registered type and run its creation hook.
    pub fn create_node(&mut self, type_name: &str) -> Result<NodeId, EditorError> {
        let def = self
            .defs
            .get(type_name)
            .ok_or_else(|| EditorError::UnknownNodeType(type_name.to_string()))?;
        self.graph.last_node_id += 1;
        let id = self.graph.last_node_id;

        let mut node = Node::new(id, def.name.clone());
        node.inputs = def
            .inputs
            .iter()
            .map(|i| InputSocket::new(i.name.clone(), i.ty.clone()))
            .collect();
        node.outputs = def
            .outputs
            .iter()
            .map(|o| OutputSocket::new(o.name.clone(), o.ty.clone()))
            .collect();
        node.widgets = def.widgets.clone();
        if let Some(behavior) = self.behaviors.get(type_name) {
            behavior.on_create(&mut node);
        }
        self.graph.nodes.insert(id, node);
        Ok(id)
    }

    /// Connect an output to an input, replacing whatever fed that input.
    pub fn connect(
        &mut self,
        origin: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, EditorError> {
        let from_ty = self
            .graph
            .nodes
            .get(&origin)
            .ok_or(EditorError::UnknownNode(origin))?
            .outputs
            .get(origin_slot)
            .ok_or(EditorError::SlotOutOfRange {
                node: origin,
                side: "output",
                slot: origin_slot,
            })?
            .ty
            .clone();
        let target_node = self
            .graph
            .nodes
            .get_mut(&target)
            .ok_or(EditorError::UnknownNode(target))?;
        let socket = target_node
            .inputs
            .get_mut(target_slot)
            .ok_or(EditorError::SlotOutOfRange {
                node: target,
                side: "input",
                slot: target_slot,
            })?;
        if from_ty != socket.ty && from_ty != ANY_TYPE && socket.ty != ANY_TYPE {
            return Err(EditorError::TypeMismatch {
                from: from_ty,
                to: socket.ty.clone(),
            });
        }

        self.graph.last_link_id += 1;
        let id = self.graph.last_link_id;
        if let Some(old) = socket.link.replace(id) {
            self.graph.links.remove(&old);
        }
        self.graph.links.insert(
            id,
            Link {
                id,
                origin_node: origin,
                origin_slot,
                target_node: target,
                target_slot,
                ty: from_ty,
            },
        );
        Ok(id)
    }

    pub fn disconnect_input(&mut self, node: NodeId, slot: usize) -> Result<Option<Link>, EditorError> {
        let socket = self
            .graph
            .nodes
            .get_mut(&node)
            .ok_or(EditorError::UnknownNode(node))?
            .inputs
            .get_mut(slot)
            .ok_or(EditorError::SlotOutOfRange {
                node,
                side: "input",
                slot,
            })?;
        Ok(socket.link.take().and_then(|id| self.graph.links.remove(&id)))
    }

    pub fn set_widget_value(
        &mut self,
        node: NodeId,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<(), EditorError> {
        let widget = self
            .graph
            .nodes
            .get_mut(&node)
            .ok_or(EditorError::UnknownNode(node))?
            .find_widget_mut(name)
            .ok_or_else(|| EditorError::UnknownWidget {
                node,
                name: name.to_string(),
            })?;
        if widget.assign(value) {
            Ok(())
        } else {
            Err(EditorError::RejectedValue {
                name: name.to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Run the action of a button widget, as a click in the UI would.
    pub fn activate_widget(&mut self, node: NodeId, name: &str) -> Result<ReconcileOutcome, EditorError> {
        let n = self.node(node).ok_or(EditorError::UnknownNode(node))?;
        let action = n
            .find_widget(name)
            .ok_or_else(|| EditorError::UnknownWidget {
                node,
                name: name.to_string(),
            })?
            .action()
            .ok_or_else(|| EditorError::NoAction(name.to_string()))?;
        let behavior = self.bound_behavior(&n.type_name)?;
        let mut handle = self.graph.handle(node).ok_or(EditorError::UnknownNode(node))?;
        behavior.on_action(&mut handle, action).map_err(|e| {
            warn!("node {node}: `{name}` failed: {e}");
            EditorError::from(e)
        })
    }

    /// Reconcile a node directly, bypassing its button.
    pub fn reconcile(&mut self, node: NodeId) -> Result<ReconcileOutcome, EditorError> {
        let n = self.node(node).ok_or(EditorError::UnknownNode(node))?;
        let behavior = self.bound_behavior(&n.type_name)?;
        let mut handle = self.graph.handle(node).ok_or(EditorError::UnknownNode(node))?;
        behavior.reconcile(&mut handle).map_err(|e| {
            warn!("node {node}: reconcile failed: {e}");
            EditorError::from(e)
        })
    }

    fn bound_behavior(&self, type_name: &str) -> Result<Arc<dyn NodeBehavior>, EditorError> {
        self.behaviors
            .get(type_name)
            .cloned()
            .ok_or_else(|| EditorError::NoBehavior(type_name.to_string()))
    }

    /// Remove a node and every link touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, EditorError> {
        let node = self
            .graph
            .nodes
            .remove(&id)
            .ok_or(EditorError::UnknownNode(id))?;
        let dropped: Vec<Link> = self
            .graph
            .links
            .values()
            .filter(|l| l.origin_node == id || l.target_node == id)
            .cloned()
            .collect();
        for link in dropped {
            self.graph.links.remove(&link.id);
            if link.origin_node == id {
                if let Some(target) = self.graph.nodes.get_mut(&link.target_node) {
                    if let Some(socket) = target.inputs.get_mut(link.target_slot) {
                        socket.link = None;
                    }
                }
            }
        }
        Ok(node)
    }

    pub fn snapshot_json(&self) -> Result<String, EditorError> {
        Ok(serde_json::to_string(&self.graph)?)
    }

    /// Replace the graph with a snapshot. Registered types and bindings stay.
    pub fn load_snapshot_json(&mut self, json: &str) -> Result<(), EditorError> {
        self.graph = serde_json::from_str(json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtensionConfig;
    use crate::schema::catalog;
    use serde_json::json;

    fn editor() -> NodeEditor {
        let mut ed = NodeEditor::with_extension(&Extension::couple(&ExtensionConfig::default()));
        assert_eq!(ed.register_node_defs(catalog()), 1);
        ed
    }

    #[test]
    fn it_should_run_the_creation_hook_for_claimed_types_only() {
        let mut ed = editor();
        let mask = ed.create_node("ComfyCoupleMask").unwrap();
        let region = ed.create_node("ComfyCoupleRegion").unwrap();

        let mask = ed.node(mask).unwrap();
        assert!(mask.find_widget("Update inputs").is_some());
        assert_eq!(mask.socket_type.as_deref(), Some("COUPLE_REGION"));

        let region = ed.node(region).unwrap();
        assert!(region.find_widget("Update inputs").is_none());
        assert!(region.socket_type.is_none());
    }

    #[test]
    fn a_fresh_mask_selector_is_already_reconciled() {
        let mut ed = editor();
        let id = ed.create_node("ComfyCoupleMask").unwrap();
        let out = ed.activate_widget(id, "Update inputs").unwrap();
        assert_eq!(out, ReconcileOutcome::Unchanged);
        assert_eq!(ed.node(id).unwrap().input_names(), vec!["region_1", "region_2"]);
    }

    #[test]
    fn it_should_keep_links_on_retained_sockets_and_drop_the_rest() {
        let mut ed = editor();
        let mask = ed.create_node("ComfyCoupleMask").unwrap();
        ed.set_widget_value(mask, "inputcount", &json!(2)).unwrap();
        assert_eq!(ed.activate_widget(mask, "Update inputs").unwrap(), ReconcileOutcome::Added(2));

        let mut links = Vec::new();
        for slot in 0..4 {
            let region = ed.create_node("ComfyCoupleRegion").unwrap();
            links.push(ed.connect(region, 0, mask, slot).unwrap());
        }

        ed.set_widget_value(mask, "inputcount", &json!(1)).unwrap();
        assert_eq!(ed.activate_widget(mask, "Update inputs").unwrap(), ReconcileOutcome::Removed(1));

        let node = ed.node(mask).unwrap();
        assert_eq!(node.input_names(), vec!["region_1", "region_2", "region_3"]);
        for (slot, id) in links.iter().take(3).enumerate() {
            assert_eq!(node.inputs[slot].link, Some(*id));
            assert_eq!(ed.graph.links[id].target_slot, slot);
        }
        assert!(!ed.graph.links.contains_key(&links[3]));
    }

    #[test]
    fn it_should_leave_the_node_unchanged_when_the_count_widget_is_gone() {
        let mut ed = editor();
        let mask = ed.create_node("ComfyCoupleMask").unwrap();
        ed.graph
            .nodes
            .get_mut(&mask)
            .unwrap()
            .widgets
            .retain(|w| w.name != "inputcount");
        let before = ed.node(mask).unwrap().clone();

        let err = ed.activate_widget(mask, "Update inputs").unwrap_err();
        assert!(matches!(
            err,
            EditorError::Reconcile(ReconcileError::MissingControl(_))
        ));
        assert_eq!(ed.node(mask).unwrap(), &before);
    }

    #[test]
    fn it_should_reject_mismatched_connections() {
        let mut ed = editor();
        let mask = ed.create_node("ComfyCoupleMask").unwrap();
        let couple = ed.create_node("Comfy Couple").unwrap();
        let err = ed.connect(couple, 0, mask, 0).unwrap_err();
        assert!(matches!(err, EditorError::TypeMismatch { .. }));
        assert!(ed.graph.links.is_empty());
    }

    #[test]
    fn connecting_an_occupied_input_replaces_the_link() {
        let mut ed = editor();
        let mask = ed.create_node("ComfyCoupleMask").unwrap();
        let a = ed.create_node("ComfyCoupleRegion").unwrap();
        let b = ed.create_node("ComfyCoupleRegion").unwrap();
        let first = ed.connect(a, 0, mask, 0).unwrap();
        let second = ed.connect(b, 0, mask, 0).unwrap();
        assert!(!ed.graph.links.contains_key(&first));
        assert_eq!(ed.graph.links.len(), 1);
        assert_eq!(ed.graph.links[&second].origin_node, b);
        assert_eq!(ed.node(mask).unwrap().inputs[0].link, Some(second));

        let dropped = ed.disconnect_input(mask, 0).unwrap();
        assert_eq!(dropped.map(|l| l.id), Some(second));
        assert!(ed.graph.links.is_empty());
    }

    #[test]
    fn removing_a_node_clears_links_on_its_neighbours() {
        let mut ed = editor();
        let mask = ed.create_node("ComfyCoupleMask").unwrap();
        let region = ed.create_node("ComfyCoupleRegion").unwrap();
        ed.connect(region, 0, mask, 1).unwrap();
        ed.remove_node(region).unwrap();
        assert!(ed.graph.links.is_empty());
        assert_eq!(ed.node(mask).unwrap().inputs[1].link, None);
    }

    #[test]
    fn buttons_without_behavior_are_reported() {
        let mut ed = editor();
        let region = ed.create_node("ComfyCoupleRegion").unwrap();
        let err = ed.reconcile(region).unwrap_err();
        assert!(matches!(err, EditorError::NoBehavior(_)));
        let err = ed.activate_widget(region, "Update inputs").unwrap_err();
        assert!(matches!(err, EditorError::UnknownWidget { .. }));
    }

    #[test]
    fn snapshots_restore_the_graph() {
        let mut ed = editor();
        let mask = ed.create_node("ComfyCoupleMask").unwrap();
        let region = ed.create_node("ComfyCoupleRegion").unwrap();
        ed.connect(region, 0, mask, 0).unwrap();
        let json = ed.snapshot_json().unwrap();

        let mut other = editor();
        other.load_snapshot_json(&json).unwrap();
        assert_eq!(other.node(mask), ed.node(mask));
        assert_eq!(other.graph.links, ed.graph.links);
        other.set_widget_value(mask, "inputcount", &json!(1)).unwrap();
        assert_eq!(other.reconcile(mask).unwrap(), ReconcileOutcome::Added(1));
    }

    #[test]
    fn it_should_reject_an_out_of_range_count_from_a_snapshot() {
        let mut ed = editor();
        let mask = ed.create_node("ComfyCoupleMask").unwrap();
        let mut graph: serde_json::Value = serde_json::from_str(&ed.snapshot_json().unwrap()).unwrap();
        let widgets = graph["nodes"][mask.to_string()]["widgets"]
            .as_array_mut()
            .unwrap();
        let count = widgets
            .iter_mut()
            .find(|w| w["name"] == "inputcount")
            .unwrap();
        count["value"] = json!(200_000);

        ed.load_snapshot_json(&graph.to_string()).unwrap();
        let before = ed.node(mask).unwrap().clone();
        let err = ed.reconcile(mask).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Reconcile(ReconcileError::InvalidCount { .. })
        ));
        assert_eq!(ed.node(mask).unwrap(), &before);
        assert_eq!(before.input_names(), vec!["region_1", "region_2"]);
    }
}
