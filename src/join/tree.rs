//! # Result Tree
//!
//! Records the nesting of registrations. Every `register` call adds a child to
//! the node of the scope it was called on, so a continuation registered from
//! inside another continuation's callback becomes that continuation's child.
//! Flattening walks the tree in post-order, which makes the output order a
//! function of registration structure only, never of completion timing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node in a [`ResultTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    /// Continuation not invoked yet
    Pending,
    /// Settled without a value: failed, dropped after the first error, or the
    /// callback produced nothing
    Vacant,
    /// Settled with a value
    HasResult(T),
}

impl<T> Slot<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn has_result(&self) -> bool {
        matches!(self, Self::HasResult(_))
    }
}

impl<T> From<Option<T>> for Slot<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::HasResult(value),
            None => Self::Vacant,
        }
    }
}

#[derive(Debug)]
struct Node<T> {
    children: Vec<NodeId>,
    slot: Slot<T>,
}

/// Arena of registration nodes rooted at [`NodeId::ROOT`]
#[derive(Debug)]
pub struct ResultTree<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Default for ResultTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultTree<T> {
    /// Tree holding only the root. The root never stores a value.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                children: Vec::new(),
                slot: Slot::Vacant,
            }],
        }
    }

    /// Append a pending child under `parent`, after its existing children
    pub fn add_child(&mut self, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            children: Vec::new(),
            slot: Slot::Pending,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn settle(&mut self, node: NodeId, slot: Slot<T>) {
        self.nodes[node.0].slot = slot;
    }

    pub fn slot(&self, node: NodeId) -> &Slot<T> {
        &self.nodes[node.0].slot
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Number of registered nodes, root excluded
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored values in post-order: each node's children in registration
    /// order, then the node itself. Nodes without a value are skipped.
    pub fn flatten(mut self) -> Vec<T> {
        let mut results = Vec::new();
        // (node, index of the next child to visit)
        let mut stack = vec![(NodeId::ROOT, 0usize)];

        while let Some((node, next_child)) = stack.pop() {
            if let Some(&child) = self.nodes[node.0].children.get(next_child) {
                stack.push((node, next_child + 1));
                stack.push((child, 0));
                continue;
            }

            let slot = std::mem::replace(&mut self.nodes[node.0].slot, Slot::Vacant);
            if let Slot::HasResult(value) = slot {
                results.push(value);
            }
        }

        results
    }
}
