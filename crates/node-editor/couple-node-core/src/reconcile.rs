//! Reconcile a node's trailing region sockets with its count widget.
//!
//! A node's inputs split into `offset` static sockets followed by the dynamic
//! region sockets. The count widget holds the number of regions beyond the
//! [`REFERENCE_INPUT_COUNT`] reference regions every mask selector carries, so
//! the target dynamic count is `inputcount + REFERENCE_INPUT_COUNT`.
//!
//! Reconciliation is split in two steps: [`plan`] reads the node and decides
//! what to do without touching it, [`ReconcilePlan::apply`] performs the
//! mutations. Every error surfaces from the first step, so a rejected call
//! always leaves the node exactly as it was.

use log::{debug, trace, warn};
use thiserror::Error;

use crate::host::NodeInputs;
use crate::types::COUPLE_REGION;

/// Reference regions folded into every count; not configurable.
pub const REFERENCE_INPUT_COUNT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("count widget `{0}` is missing")]
    MissingControl(String),
    #[error("widget `{0}` does not hold a number")]
    NotANumber(String),
    #[error("widget `{name}` holds {value}, expected a non-negative integer within the widget range")]
    InvalidCount { name: String, value: String },
    #[error("node has {len} inputs but {offset} leading inputs are reserved")]
    StaticInputsMissing { offset: usize, len: usize },
}

/// Names and tags used when reconciling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSettings {
    pub count_widget: String,
    pub socket_prefix: String,
    pub socket_type: String,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        ReconcileSettings {
            count_widget: "inputcount".to_string(),
            socket_prefix: "region".to_string(),
            socket_type: COUPLE_REGION.to_string(),
        }
    }
}

impl ReconcileSettings {
    /// Name of the dynamic socket at 1-based dynamic position `k`.
    pub fn socket_name(&self, k: usize) -> String {
        format!("{}_{}", self.socket_prefix, k)
    }
}

/// What a reconciliation will do (or did) to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    Unchanged,
    /// Socket indices to remove, highest first.
    Shrink { remove: Vec<usize> },
    /// Names of the sockets to append, in order.
    Grow { add: Vec<String> },
}

/// Observable result of a finished reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    Removed(usize),
    Added(usize),
}

/// Read the count widget and return the target number of dynamic sockets.
pub fn desired_inputs<N>(node: &N, count_widget: &str) -> Result<usize, ReconcileError>
where
    N: NodeInputs + ?Sized,
{
    let widget = node
        .find_widget(count_widget)
        .ok_or_else(|| ReconcileError::MissingControl(count_widget.to_string()))?;
    let value = widget
        .as_number()
        .ok_or_else(|| ReconcileError::NotANumber(count_widget.to_string()))?;
    let in_range = widget.number_options().map_or(true, |o| o.contains(value));
    if !value.is_finite()
        || value < 0.0
        || value.fract() != 0.0
        || value > u32::MAX as f64
        || !in_range
    {
        return Err(ReconcileError::InvalidCount {
            name: count_widget.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value as usize + REFERENCE_INPUT_COUNT)
}

/// Work out the add/remove steps that bring `node` to its target count.
pub fn plan<N>(node: &N, settings: &ReconcileSettings) -> Result<ReconcilePlan, ReconcileError>
where
    N: NodeInputs + ?Sized,
{
    let desired = desired_inputs(node, &settings.count_widget)?;
    let offset = node.offset();
    let len = node.input_len();
    if len < offset {
        return Err(ReconcileError::StaticInputsMissing { offset, len });
    }
    let current = len - offset;

    if desired == current {
        return Ok(ReconcilePlan::Unchanged);
    }
    if desired < current {
        // Descending so each removal leaves the lower targets in place.
        let remove = (offset + desired..len).rev().collect();
        return Ok(ReconcilePlan::Shrink { remove });
    }
    let add = (current + 1..=desired)
        .map(|k| settings.socket_name(k))
        .collect();
    Ok(ReconcilePlan::Grow { add })
}

impl ReconcilePlan {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, ReconcilePlan::Unchanged)
    }

    /// Apply the plan through the host primitives.
    pub fn apply<N>(self, node: &mut N, socket_type: &str) -> ReconcileOutcome
    where
        N: NodeInputs + ?Sized,
    {
        match self {
            ReconcilePlan::Unchanged => ReconcileOutcome::Unchanged,
            ReconcilePlan::Shrink { remove } => {
                let mut removed = 0;
                for index in remove {
                    match node.remove_input(index) {
                        Some(socket) => {
                            trace!("removed input {index} ({})", socket.name);
                            removed += 1;
                        }
                        None => warn!("input {index} vanished before removal"),
                    }
                }
                ReconcileOutcome::Removed(removed)
            }
            ReconcilePlan::Grow { add } => {
                let added = add.len();
                for name in add {
                    trace!("adding input {name}");
                    node.add_input(name, socket_type);
                }
                ReconcileOutcome::Added(added)
            }
        }
    }
}

/// Grow or shrink the dynamic sockets of `node` to match its count widget.
///
/// New sockets take the node's own type tag, or `settings.socket_type` when
/// the node carries none. Calling this again without changing the widget is a no-op.
pub fn reconcile<N>(
    node: &mut N,
    settings: &ReconcileSettings,
) -> Result<ReconcileOutcome, ReconcileError>
where
    N: NodeInputs + ?Sized,
{
    let plan = plan(node, settings).inspect_err(|e| warn!("reconcile rejected: {e}"))?;
    if !plan.is_unchanged() {
        debug!("reconcile plan {plan:?}");
    }
    let socket_type = node
        .socket_type()
        .unwrap_or(&settings.socket_type)
        .to_string();
    Ok(plan.apply(node, &socket_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InputSocket, Node, NumberOptions, Widget, WidgetKind};

    fn count_widget(value: f64) -> Widget {
        Widget::number("inputcount", value, NumberOptions::default())
    }

    fn node_with(offset: usize, dynamic: usize, count: Option<f64>) -> Node {
        let mut node = Node::new(1, "ComfyCoupleMask");
        node.inputs_offset = offset;
        for i in 0..offset {
            node.inputs.push(InputSocket::new(format!("static_{i}"), "MODEL"));
        }
        for k in 1..=dynamic {
            node.inputs.push(InputSocket::new(format!("region_{k}"), COUPLE_REGION));
        }
        if let Some(v) = count {
            node.widgets.push(count_widget(v));
        }
        node
    }

    fn dynamic_len(node: &Node) -> usize {
        node.inputs.len() - node.inputs_offset
    }

    /// Wraps a node and records every primitive call made against it.
    struct Recording {
        node: Node,
        removed: Vec<usize>,
        added: Vec<String>,
    }

    impl NodeInputs for Recording {
        fn offset(&self) -> usize {
            self.node.offset()
        }
        fn input_len(&self) -> usize {
            self.node.input_len()
        }
        fn socket_type(&self) -> Option<&str> {
            self.node.socket_type()
        }
        fn find_widget(&self, name: &str) -> Option<&Widget> {
            self.node.find_widget(name)
        }
        fn add_input(&mut self, name: String, ty: &str) {
            self.added.push(name.clone());
            self.node.add_input(name, ty);
        }
        fn remove_input(&mut self, index: usize) -> Option<InputSocket> {
            self.removed.push(index);
            self.node.remove_input(index)
        }
    }

    fn recording(node: Node) -> Recording {
        Recording {
            node,
            removed: Vec::new(),
            added: Vec::new(),
        }
    }

    #[test]
    fn it_should_grow_an_empty_node_to_three_regions() {
        let mut node = node_with(0, 0, Some(1.0));
        let out = reconcile(&mut node, &ReconcileSettings::default()).unwrap();
        assert_eq!(out, ReconcileOutcome::Added(3));
        assert_eq!(node.input_names(), vec!["region_1", "region_2", "region_3"]);
        assert!(node
            .inputs
            .iter()
            .all(|s| s.ty == COUPLE_REGION && s.link.is_none()));
    }

    #[test]
    fn it_should_remove_from_the_tail_highest_index_first() {
        let mut rec = recording(node_with(0, 5, Some(1.0)));
        let out = reconcile(&mut rec, &ReconcileSettings::default()).unwrap();
        assert_eq!(out, ReconcileOutcome::Removed(2));
        assert_eq!(rec.removed, vec![4, 3]);
        assert_eq!(rec.node.input_names(), vec!["region_1", "region_2", "region_3"]);
    }

    #[test]
    fn it_should_leave_a_matching_selective_node_alone() {
        let before = node_with(1, 2, Some(0.0));
        let mut rec = recording(before.clone());
        let out = reconcile(&mut rec, &ReconcileSettings::default()).unwrap();
        assert_eq!(out, ReconcileOutcome::Unchanged);
        assert!(rec.removed.is_empty() && rec.added.is_empty());
        assert_eq!(rec.node, before);
    }

    #[test]
    fn it_should_fail_without_touching_a_node_missing_its_count_widget() {
        let before = node_with(0, 4, None);
        let mut node = before.clone();
        let err = reconcile(&mut node, &ReconcileSettings::default()).unwrap_err();
        assert_eq!(err, ReconcileError::MissingControl("inputcount".into()));
        assert_eq!(node, before);
    }

    #[test]
    fn it_should_be_idempotent() {
        for v in [0.0, 1.0, 4.0] {
            for start in [0, 2, 7] {
                let mut rec = recording(node_with(0, start, Some(v)));
                reconcile(&mut rec, &ReconcileSettings::default()).unwrap();
                let after_first = rec.node.clone();
                rec.removed.clear();
                rec.added.clear();
                let out = reconcile(&mut rec, &ReconcileSettings::default()).unwrap();
                assert_eq!(out, ReconcileOutcome::Unchanged);
                assert!(rec.removed.is_empty() && rec.added.is_empty());
                assert_eq!(rec.node, after_first);
            }
        }
    }

    #[test]
    fn it_should_hit_the_exact_count_and_keep_static_inputs() {
        for offset in [0, 1] {
            let mut node = node_with(offset, 3, Some(0.0));
            for v in [0usize, 5, 2, 9, 0, 1] {
                node.widgets[0] = count_widget(v as f64);
                reconcile(&mut node, &ReconcileSettings::default()).unwrap();
                assert_eq!(dynamic_len(&node), v + REFERENCE_INPUT_COUNT);
                if offset == 1 {
                    assert_eq!(node.inputs[0], InputSocket::new("static_0", "MODEL"));
                }
            }
        }
    }

    #[test]
    fn it_should_number_new_sockets_by_dynamic_position() {
        let mut node = node_with(1, 2, Some(3.0));
        reconcile(&mut node, &ReconcileSettings::default()).unwrap();
        assert_eq!(
            node.input_names(),
            vec!["static_0", "region_1", "region_2", "region_3", "region_4", "region_5"]
        );
    }

    #[test]
    fn it_should_reject_counts_outside_the_integer_domain() {
        for bad in [-1.0, 1.5, f64::NAN, f64::INFINITY] {
            let before = node_with(0, 2, Some(bad));
            let mut node = before.clone();
            let err = reconcile(&mut node, &ReconcileSettings::default()).unwrap_err();
            assert!(matches!(err, ReconcileError::InvalidCount { .. }), "{bad}: {err:?}");
            assert_eq!(node.inputs, before.inputs);
            assert_eq!(node.inputs_offset, before.inputs_offset);
        }
    }

    #[test]
    fn it_should_reject_counts_beyond_the_widget_range() {
        let mut node = node_with(0, 2, None);
        // Written straight into the kind so the widget's own clamping is bypassed,
        // the way a hand-edited snapshot would arrive.
        node.widgets.push(Widget {
            name: "inputcount".into(),
            kind: WidgetKind::Number {
                value: 200_000.0,
                options: NumberOptions::int_range(0.0, 1000.0),
            },
        });
        let before = node.clone();
        let err = reconcile(&mut node, &ReconcileSettings::default()).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InvalidCount {
                name: "inputcount".into(),
                value: "200000".into(),
            }
        );
        assert_eq!(node, before);

        node.widgets[0] = Widget::number("inputcount", 1000.0, NumberOptions::int_range(0.0, 1000.0));
        let out = reconcile(&mut node, &ReconcileSettings::default()).unwrap();
        assert_eq!(out, ReconcileOutcome::Added(1000));
    }

    #[test]
    fn it_should_type_new_sockets_with_the_node_tag() {
        let mut node = node_with(0, 0, Some(0.0));
        node.socket_type = Some("MASK_REGION".into());
        reconcile(&mut node, &ReconcileSettings::default()).unwrap();
        assert_eq!(node.inputs.len(), 2);
        assert!(node.inputs.iter().all(|s| s.ty == "MASK_REGION"));

        let mut untagged = node_with(0, 0, Some(0.0));
        let settings = ReconcileSettings {
            socket_type: "FALLBACK".into(),
            ..ReconcileSettings::default()
        };
        reconcile(&mut untagged, &settings).unwrap();
        assert!(untagged.inputs.iter().all(|s| s.ty == "FALLBACK"));
    }

    #[test]
    fn it_should_reject_a_node_missing_its_static_inputs() {
        let mut node = node_with(0, 0, Some(0.0));
        node.inputs_offset = 1;
        let err = reconcile(&mut node, &ReconcileSettings::default()).unwrap_err();
        assert_eq!(err, ReconcileError::StaticInputsMissing { offset: 1, len: 0 });
        assert!(node.inputs.is_empty());
    }

    #[test]
    fn it_should_reject_a_count_widget_that_is_not_numeric() {
        let mut node = node_with(0, 2, None);
        node.widgets.push(Widget::combo("inputcount", &["two"]));
        let err = reconcile(&mut node, &ReconcileSettings::default()).unwrap_err();
        assert_eq!(err, ReconcileError::NotANumber("inputcount".into()));
    }

    #[test]
    fn plan_lists_removals_in_descending_order() {
        let node = node_with(1, 6, Some(0.0));
        let plan = plan(&node, &ReconcileSettings::default()).unwrap();
        assert_eq!(plan, ReconcilePlan::Shrink { remove: vec![6, 5, 4, 3] });
    }
}
