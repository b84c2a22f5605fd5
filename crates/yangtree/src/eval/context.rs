use crate::node::{DataTree, NodeData, NodeId};
use serde_json::Value;
use yangtree_path::{parse_path, ExprContext, ExprError};

/// A data node as the context of a predicate or constraint expression.
pub(crate) struct NodeContext<'a> {
    tree: &'a DataTree,
    node: NodeId,
    position: usize,
    last: usize,
}

impl<'a> NodeContext<'a> {
    pub fn new(tree: &'a DataTree, node: NodeId, position: usize, last: usize) -> Self {
        Self {
            tree,
            node,
            position,
            last,
        }
    }

    /// Node-set values: one entry per leaf, one per leaf-list value, `null`
    /// for a branch or an unset leaf.
    fn node_values(&self, node: NodeId) -> Vec<Value> {
        match self.tree.data(node) {
            NodeData::Leaf { value } => vec![value.clone().unwrap_or(Value::Null)],
            NodeData::LeafList { values } => values.clone(),
            NodeData::Branch { .. } => vec![Value::Null],
        }
    }
}

impl ExprContext for NodeContext<'_> {
    fn select(&self, path: &str) -> Result<Vec<Value>, ExprError> {
        let steps = parse_path(path).map_err(|e| ExprError::Context(e.to_string()))?;
        let mut nodes = Vec::new();
        self.tree
            .collect(self.node, &steps, true, &mut nodes)
            .map_err(|e| ExprError::Context(e.to_string()))?;
        Ok(nodes.into_iter().flat_map(|n| self.node_values(n)).collect())
    }

    fn current(&self) -> Vec<Value> {
        self.node_values(self.node)
    }

    fn position(&self) -> usize {
        self.position
    }

    fn last(&self) -> usize {
        self.last
    }
}
