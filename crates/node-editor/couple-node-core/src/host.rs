//! Mutation primitives a host exposes for one node.

use crate::types::{InputSocket, Node, Widget};

/// Socket and widget access on a single live node.
///
/// The reconciler only ever talks to a node through this trait, so a host can
/// back it with whatever bookkeeping it needs (link tables, undo history, UI
/// invalidation). Both mutators are expected to be synchronous and to leave the
/// socket indices contiguous.
pub trait NodeInputs {
    /// Number of leading sockets that must never be added or removed.
    fn offset(&self) -> usize;

    fn input_len(&self) -> usize;

    /// Type tag the node's creation hook assigned to dynamic sockets.
    fn socket_type(&self) -> Option<&str>;

    fn find_widget(&self, name: &str) -> Option<&Widget>;

    /// Append an unconnected socket at the end of the sequence.
    fn add_input(&mut self, name: String, ty: &str);

    /// Delete the socket at `index`, detaching whatever connection it carried.
    fn remove_input(&mut self, index: usize) -> Option<InputSocket>;
}

/// A bare node has no link table; removing a socket just forgets its link id.
impl NodeInputs for Node {
    fn offset(&self) -> usize {
        self.inputs_offset
    }

    fn input_len(&self) -> usize {
        self.inputs.len()
    }

    fn socket_type(&self) -> Option<&str> {
        self.socket_type.as_deref()
    }

    fn find_widget(&self, name: &str) -> Option<&Widget> {
        Node::find_widget(self, name)
    }

    fn add_input(&mut self, name: String, ty: &str) {
        self.inputs.push(InputSocket::new(name, ty));
    }

    fn remove_input(&mut self, index: usize) -> Option<InputSocket> {
        if index < self.inputs.len() {
            Some(self.inputs.remove(index))
        } else {
            None
        }
    }
}
