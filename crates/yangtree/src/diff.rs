//! Structural diff and merge of data trees.
//!
//! Siblings are matched by identity. Duplicatable siblings share one
//! identity, so they are matched as a multiset: the n-th entry on one side
//! pairs with the n-th entry of the same identity on the other.

use crate::error::{Error, Result};
use crate::node::{DataTree, NodeData, NodeId};
use crate::value::values_equal;
use indexmap::IndexMap;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// One side of a comparison: a tree and a node in it.
pub type TreeNode<'a> = (&'a DataTree, NodeId);

/// Differences from an old subtree `a` to a new subtree `b`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// Topmost nodes of `b` with no counterpart in `a`.
    pub created: Vec<NodeId>,
    /// Leaves and leaf-list nodes present on both sides with different
    /// values, as `(a, b)` pairs.
    pub replaced: Vec<(NodeId, NodeId)>,
    /// Topmost nodes of `a` with no counterpart in `b`.
    pub deleted: Vec<NodeId>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.replaced.is_empty() && self.deleted.is_empty()
    }
}

// ── Public API ────────────────────────────────────────────────────────────

/// Compare two subtrees, possibly of different trees.
pub fn diff(a: TreeNode<'_>, b: TreeNode<'_>) -> TreeDiff {
    let mut out = TreeDiff::default();
    diff_at(a, b, &mut out);
    out
}

/// Nodes of `b` absent from `a`.
pub fn diff_created(a: TreeNode<'_>, b: TreeNode<'_>) -> Vec<NodeId> {
    diff(a, b).created
}

/// Nodes of `b` that are new or carry a different value than in `a`.
pub fn diff_updated(a: TreeNode<'_>, b: TreeNode<'_>) -> Vec<NodeId> {
    let TreeDiff {
        mut created,
        replaced,
        ..
    } = diff(a, b);
    created.extend(replaced.into_iter().map(|(_, new)| new));
    created
}

/// Nodes of `a` absent from `b`.
pub fn diff_deleted(a: TreeNode<'_>, b: TreeNode<'_>) -> Vec<NodeId> {
    diff(a, b).deleted
}

// ── Core recursive differ ─────────────────────────────────────────────────

fn diff_at((ta, a): TreeNode<'_>, (tb, b): TreeNode<'_>, out: &mut TreeDiff) {
    match (ta.data(a), tb.data(b)) {
        (NodeData::Branch { children: old, .. }, NodeData::Branch { children: new, .. }) => {
            let mut pending: IndexMap<String, VecDeque<NodeId>> = IndexMap::new();
            for &child in old {
                pending.entry(ta.identity(child)).or_default().push_back(child);
            }
            for &child in new {
                let matched = pending
                    .get_mut(&tb.identity(child))
                    .and_then(|queue| queue.pop_front());
                match matched {
                    Some(counterpart) => diff_at((ta, counterpart), (tb, child), out),
                    None => out.created.push(child),
                }
            }
            out.deleted.extend(pending.into_values().flatten());
        }
        (NodeData::Leaf { value: x }, NodeData::Leaf { value: y }) => {
            let same = match (x, y) {
                (Some(x), Some(y)) => values_equal(x, y),
                (None, None) => true,
                _ => false,
            };
            if !same {
                out.replaced.push((a, b));
            }
        }
        (NodeData::LeafList { values: x }, NodeData::LeafList { values: y }) => {
            let same = x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y));
            if !same {
                out.replaced.push((a, b));
            }
        }
        _ => out.replaced.push((a, b)),
    }
}

// ── Merge ─────────────────────────────────────────────────────────────────

impl DataTree {
    /// Fold `src` into `dest`. Branch children are matched by identity and
    /// merged recursively; unmatched ones are copied in. Duplicatable
    /// children are always copied and appended. Leaf and leaf-list values
    /// are overwritten from `src`. Merging a node into itself does nothing.
    ///
    /// On failure `dest` is restored to its state before the call.
    pub fn merge(&mut self, dest: NodeId, src: NodeId) -> Result<()> {
        if dest == src {
            return Ok(());
        }
        self.check_mergeable(dest, src)?;
        let backup = self.clone_subtree(dest);
        match self.merge_into(dest, src) {
            Ok(()) => {
                self.release(backup);
                Ok(())
            }
            Err(err) => {
                debug!(dest = %self.path(dest), error = %err, "merge failed, restoring");
                self.recover(dest, backup)?;
                Err(err)
            }
        }
    }

    fn check_mergeable(&self, dest: NodeId, src: NodeId) -> Result<()> {
        if self.schema_id(dest) != self.schema_id(src) {
            return Err(Error::OperationNotSupported(format!(
                "cannot merge {} into {}",
                self.schema_of(src).name(),
                self.path(dest)
            )));
        }
        Ok(())
    }

    fn merge_into(&mut self, dest: NodeId, src: NodeId) -> Result<()> {
        self.check_mergeable(dest, src)?;
        trace!(dest = %self.path(dest), src = %self.path(src), "merge");

        match self.data(src).clone() {
            NodeData::Leaf { value } => self.store_leaf(dest, value),
            NodeData::LeafList { values } => {
                self.set_json(dest, &serde_json::Value::Array(values))
            }
            NodeData::Branch { children, .. } => {
                for child in children {
                    let schema = self.schema_id(child);
                    if !self.schema_of(child).is_duplicatable() {
                        let identity = self.identity(child);
                        if let Some(existing) = self.search(dest, schema, &identity, false).first().copied() {
                            self.merge_into(existing, child)?;
                            continue;
                        }
                    }
                    let copy = self.clone_subtree(child);
                    if let Err(err) = self.insert(dest, copy, None, false) {
                        self.release(copy);
                        return Err(err);
                    }
                }
                Ok(())
            }
        }
    }

    /// Merge a subtree of another tree built on the same schema into `dest`.
    pub fn merge_tree(&mut self, dest: NodeId, other: &DataTree, src: NodeId) -> Result<()> {
        let imported = self.import(other, src)?;
        let outcome = self.merge(dest, imported);
        self.release(imported);
        outcome
    }
}
