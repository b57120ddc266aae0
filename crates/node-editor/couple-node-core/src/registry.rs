//! Explicit binding of node types to behaviors.
//!
//! Hosts look a node type up here when it is registered instead of patching
//! the type itself. A binding matches when the node name is equal and the
//! node category starts with the binding's category prefix.

use std::sync::Arc;

use hashbrown::HashMap;
use log::debug;

use crate::behavior::{MaskSelector, NodeBehavior};
use crate::config::ExtensionConfig;
use crate::schema::NodeDef;

#[derive(Debug, Clone)]
pub struct BehaviorBinding {
    pub category_prefix: String,
    pub node_name: String,
    pub behavior: Arc<dyn NodeBehavior>,
}

/// A named bundle of bindings, installed into a registry in one go.
#[derive(Debug, Clone)]
pub struct Extension {
    pub name: String,
    pub bindings: Vec<BehaviorBinding>,
}

impl Extension {
    /// The region-coupling extension: one [`MaskSelector`] shared by every
    /// configured node name.
    pub fn couple(cfg: &ExtensionConfig) -> Self {
        let behavior: Arc<dyn NodeBehavior> = Arc::new(MaskSelector::from_config(cfg));
        let bindings = cfg
            .node_names
            .iter()
            .map(|name| BehaviorBinding {
                category_prefix: cfg.category_prefix.clone(),
                node_name: name.clone(),
                behavior: Arc::clone(&behavior),
            })
            .collect();
        Extension {
            name: cfg.name.clone(),
            bindings,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct BehaviorRegistry {
    by_name: HashMap<String, Vec<(String, Arc<dyn NodeBehavior>)>>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `behavior` to `(category_prefix, node_name)`, returning the
    /// behavior previously bound to the same key.
    pub fn register(
        &mut self,
        category_prefix: impl Into<String>,
        node_name: impl Into<String>,
        behavior: Arc<dyn NodeBehavior>,
    ) -> Option<Arc<dyn NodeBehavior>> {
        let prefix = category_prefix.into();
        let entries = self.by_name.entry(node_name.into()).or_default();
        match entries.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, slot)) => Some(std::mem::replace(slot, behavior)),
            None => {
                entries.push((prefix, behavior));
                None
            }
        }
    }

    pub fn install(&mut self, extension: &Extension) {
        for b in &extension.bindings {
            debug!(
                "{}: binding {} under {}",
                extension.name, b.node_name, b.category_prefix
            );
            self.register(
                b.category_prefix.clone(),
                b.node_name.clone(),
                Arc::clone(&b.behavior),
            );
        }
    }

    /// Behavior for a node type, if any. The longest matching category
    /// prefix wins when several bindings share a name.
    pub fn resolve(&self, def: &NodeDef) -> Option<Arc<dyn NodeBehavior>> {
        self.resolve_key(&def.category, &def.name)
    }

    pub fn resolve_key(&self, category: &str, node_name: &str) -> Option<Arc<dyn NodeBehavior>> {
        self.by_name
            .get(node_name)?
            .iter()
            .filter(|(prefix, _)| category.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, b)| Arc::clone(b))
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
