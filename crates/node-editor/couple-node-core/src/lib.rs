//! couple-node-core: dynamic region inputs for the couple mask selector node.
//!
//! The crate models the small slice of a node editor that the region-coupling
//! extension touches: nodes with ordered input sockets and widgets, a registry
//! that binds node types to a [`NodeBehavior`], and the reconciler that grows or
//! shrinks a node's trailing `region_<k>` sockets to match its `inputcount`
//! widget. [`NodeEditor`] is an in-memory host that wires these together.

pub mod behavior;
pub mod config;
pub mod editor;
pub mod host;
pub mod reconcile;
pub mod registry;
pub mod schema;
pub mod types;

pub use behavior::{MaskSelector, NodeBehavior};
pub use config::{ConfigError, ExtensionConfig};
pub use editor::{EditorError, Graph, Link, NodeEditor, NodeHandle};
pub use host::NodeInputs;
pub use reconcile::{
    reconcile, ReconcileError, ReconcileOutcome, ReconcilePlan, ReconcileSettings,
    REFERENCE_INPUT_COUNT,
};
pub use registry::{BehaviorBinding, BehaviorRegistry, Extension};
pub use schema::{catalog, InputDef, NodeDef, OutputDef};
pub use types::*;
