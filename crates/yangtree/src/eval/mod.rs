//! Path evaluation.
//!
//! [`DataTree::find`] walks parsed path steps against the tree. Each named
//! step resolves its predicates, looks up candidates through the ordered
//! child index and then applies any residual filters in order. Inside a
//! descendant expansion (`...`, `//`) steps that cannot apply to a visited
//! node yield nothing instead of failing.

mod context;
mod edit;

pub(crate) use context::NodeContext;
pub use edit::EditEvent;

use crate::error::{Error, Result};
use crate::node::{DataTree, NodeId};
use crate::predicate::resolve;
use crate::value::values_equal;
use std::collections::HashSet;
use tracing::trace;
use yangtree_path::{parse_path, PathStep, Predicate, StepKind};

impl DataTree {
    /// All nodes addressed by `path`. Relative paths start at `at`; a
    /// leading `/` starts at the root of `at`'s tree. Each node appears
    /// once, in first-visit order.
    pub fn find(&self, at: NodeId, path: &str) -> Result<Vec<NodeId>> {
        let steps = parse_path(path)?;
        let mut found = Vec::new();
        self.collect(at, &steps, false, &mut found)?;
        let mut seen = HashSet::new();
        found.retain(|id| seen.insert(*id));
        Ok(found)
    }

    /// First node addressed by `path`, if any.
    pub fn find_one(&self, at: NodeId, path: &str) -> Result<Option<NodeId>> {
        Ok(self.find(at, path)?.into_iter().next())
    }

    pub(crate) fn collect(
        &self,
        node: NodeId,
        steps: &[PathStep],
        lenient: bool,
        out: &mut Vec<NodeId>,
    ) -> Result<()> {
        let Some((step, rest)) = steps.split_first() else {
            out.push(node);
            return Ok(());
        };
        trace!(node = %self.identity(node), step = %step.name, "find step");

        match step.kind {
            StepKind::SelfNode => self.collect(node, rest, lenient, out),
            StepKind::Parent => match self.parent(node) {
                Some(parent) => self.collect(parent, rest, lenient, out),
                None if lenient => Ok(()),
                None => Err(Error::InvalidPath(format!(
                    "'..' above {}",
                    self.path(node)
                ))),
            },
            StepKind::FromRoot => self.collect(self.root_of(node), rest, lenient, out),
            StepKind::AllChildren => {
                if !self.data(node).is_branch() {
                    return self.not_a_branch(node, lenient);
                }
                for &child in self.children(node) {
                    self.collect(child, rest, lenient, out)?;
                }
                Ok(())
            }
            StepKind::AllDescendants => {
                self.collect(node, rest, true, out)?;
                for &child in self.children(node) {
                    self.collect(child, steps, true, out)?;
                }
                Ok(())
            }
            StepKind::Child => {
                let Some(candidates) = self.step_candidates(node, step, lenient)? else {
                    return Ok(());
                };
                for candidate in candidates {
                    if let Some(raw) = &step.value {
                        if !self.value_matches(candidate, raw) {
                            continue;
                        }
                    }
                    self.collect(candidate, rest, lenient, out)?;
                }
                Ok(())
            }
        }
    }

    fn not_a_branch(&self, node: NodeId, lenient: bool) -> Result<()> {
        if lenient {
            Ok(())
        } else {
            Err(Error::OperationNotSupported(format!(
                "{} has no children",
                self.path(node)
            )))
        }
    }

    /// Children of `node` selected by one named step, or `None` when the
    /// step does not apply and `lenient` is set.
    fn step_candidates(
        &self,
        node: NodeId,
        step: &PathStep,
        lenient: bool,
    ) -> Result<Option<Vec<NodeId>>> {
        if !self.data(node).is_branch() {
            return self.not_a_branch(node, lenient).map(|_| None);
        }
        let Some(schema_id) = self.schema().child(self.schema_id(node), &step.name) else {
            if lenient {
                return Ok(None);
            }
            return Err(Error::SchemaNotFound(format!(
                "{} under {}",
                step.name,
                self.path(node)
            )));
        };
        let sn = self.schema().node(schema_id);
        let resolved = resolve(
            self.schema(),
            sn,
            &step.predicates,
            self.options().single_leaf_list,
        )?;
        let candidates = self.search(node, schema_id, &resolved.key, resolved.prefix);
        Ok(Some(self.apply_filters(candidates, &resolved.filters)?))
    }

    /// Narrow a candidate set by residual predicates, one after another.
    pub(crate) fn apply_filters(
        &self,
        mut candidates: Vec<NodeId>,
        filters: &[Predicate],
    ) -> Result<Vec<NodeId>> {
        for filter in filters {
            candidates = match filter {
                Predicate::Position(n) => candidates.get(n - 1).copied().into_iter().collect(),
                Predicate::Last => candidates.last().copied().into_iter().collect(),
                Predicate::KeyValue { name, value } => candidates
                    .into_iter()
                    .filter(|c| self.key_value_matches(*c, name, value))
                    .collect(),
                Predicate::Expr(expr) => {
                    let last = candidates.len();
                    let mut kept = Vec::with_capacity(last);
                    for (i, candidate) in candidates.into_iter().enumerate() {
                        let ctx = NodeContext::new(self, candidate, i + 1, last);
                        if expr.test(&ctx)? {
                            kept.push(candidate);
                        }
                    }
                    kept
                }
            };
        }
        Ok(candidates)
    }

    /// Whether `node` has a value equal to `raw` read with its own type.
    fn value_matches(&self, node: NodeId, raw: &str) -> bool {
        let sn = self.schema_of(node);
        match sn.leaf_type().parse(raw) {
            Ok(wanted) => self.values(node).iter().any(|v| values_equal(v, &wanted)),
            Err(_) => false,
        }
    }

    fn key_value_matches(&self, node: NodeId, name: &str, raw: &str) -> bool {
        if name == "." {
            return raw == "*" || self.value_matches(node, raw);
        }
        let Some(child_schema) = self.schema().child(self.schema_id(node), name) else {
            return false;
        };
        if !self.data(node).is_branch() {
            return false;
        }
        self.instances(node, child_schema)
            .into_iter()
            .any(|leaf| raw == "*" || self.value_matches(leaf, raw))
    }
}
