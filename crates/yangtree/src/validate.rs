//! Constraint checks over a subtree.

use crate::error::{Error, Result};
use crate::eval::NodeContext;
use crate::node::{DataTree, NodeId};
use crate::schema::Constraint;
use tracing::debug;

impl DataTree {
    /// Check a subtree: list keys and mandatory children are present, and
    /// every `when` and `must` constraint of a present node holds. Reports
    /// the first violation found in document order.
    pub fn validate(&self, node: NodeId) -> Result<()> {
        self.validate_node(node).inspect_err(|err| {
            debug!(node = %self.path(node), error = %err, "validation failed");
        })
    }

    fn validate_node(&self, node: NodeId) -> Result<()> {
        let sn = self.schema_of(node);
        if let Some(when) = sn.when() {
            if !self.holds(node, when)? {
                return Err(Error::ValidationFailed(format!(
                    "{}: when '{}' is false",
                    self.path(node),
                    when.text
                )));
            }
        }
        if self.data(node).is_branch() {
            self.check_children(node)?;
        }
        for must in sn.must() {
            if !self.holds(node, must)? {
                return Err(Error::ValidationFailed(format!(
                    "{}: must '{}' is false",
                    self.path(node),
                    must.text
                )));
            }
        }
        for &child in self.children(node) {
            self.validate_node(child)?;
        }
        Ok(())
    }

    fn check_children(&self, node: NodeId) -> Result<()> {
        let sn = self.schema_of(node);
        for key in sn.key_fields() {
            let present = self
                .child_by_name(node, key)
                .is_some_and(|leaf| self.value(leaf).is_some());
            if !present {
                return Err(Error::ValidationFailed(format!(
                    "{}: missing key {key}",
                    self.path(node)
                )));
            }
        }
        for &child in sn.children() {
            let child_sn = self.schema().node(child);
            if child_sn.is_mandatory() && self.instances(node, child).is_empty() {
                return Err(Error::ValidationFailed(format!(
                    "{}: missing mandatory {}",
                    self.path(node),
                    child_sn.name()
                )));
            }
        }
        Ok(())
    }

    fn holds(&self, node: NodeId, constraint: &Constraint) -> Result<bool> {
        let ctx = NodeContext::new(self, node, 1, 1);
        Ok(constraint.expr.test(&ctx)?)
    }
}
