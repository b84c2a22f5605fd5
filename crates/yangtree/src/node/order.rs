//! Identity strings and ordered child placement.
//!
//! Children of a branch are sorted by identity: the schema name, followed by
//! `[key=value]` groups for keyed list entries or `[.=value]` for leaf-list
//! instances. Every identity of one schema therefore shares a prefix, which
//! keeps each schema's instances in one contiguous run. Runs of
//! ordered-by-user or duplicatable schemas keep caller order internally.

use super::{DataTree, NodeData, NodeId};
use crate::error::{Error, Result};
use crate::options::InsertOption;
use crate::schema::{SchemaId, SchemaKind, SchemaNode};
use crate::value::canonical;
use std::ops::Range;
use std::sync::Arc;
use tracing::trace;
use yangtree_path::escape;

/// Identity prefix shared by every instance of `schema`.
fn base_identity(schema: &SchemaNode, single_leaf_list: bool) -> String {
    let bracketed = match schema.kind() {
        SchemaKind::List => !schema.key_fields().is_empty(),
        SchemaKind::LeafList => !single_leaf_list,
        _ => false,
    };
    if bracketed {
        format!("{}[", schema.name())
    } else {
        schema.name().to_string()
    }
}

pub(crate) fn key_group(name: &str, canonical_value: &str) -> String {
    format!("[{name}={}]", escape(canonical_value))
}

impl DataTree {
    /// Identity string of a node among its siblings.
    pub fn identity(&self, id: NodeId) -> String {
        match &self.slot(id).data {
            NodeData::Branch {
                id_cache: Some(cached),
                ..
            } => cached.clone(),
            _ => self.compute_identity(id),
        }
    }

    fn compute_identity(&self, id: NodeId) -> String {
        let sn = self.schema_of(id);
        match &self.slot(id).data {
            NodeData::Branch { .. } if !sn.key_fields().is_empty() => {
                let mut identity = sn.name().to_string();
                for key in sn.key_fields() {
                    let value = self
                        .child_by_name(id, key)
                        .and_then(|leaf| self.value(leaf))
                        .map(canonical)
                        .unwrap_or_default();
                    identity.push_str(&key_group(key, &value));
                }
                identity
            }
            NodeData::Leaf { value } if sn.kind() == SchemaKind::LeafList => {
                let value = value.as_ref().map(canonical).unwrap_or_default();
                format!("{}{}", sn.name(), key_group(".", &value))
            }
            _ => sn.name().to_string(),
        }
    }

    /// First child of a non-list schema, found by name.
    pub(crate) fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let children = self.children(parent);
        let at = self.lower_bound(parent, name);
        children
            .get(at)
            .copied()
            .filter(|c| self.schema_of(*c).name() == name)
    }

    pub(crate) fn fill_cache(&mut self, id: NodeId) {
        let keyed = !self.schema_of(id).key_fields().is_empty();
        if !keyed || !self.data(id).is_branch() {
            return;
        }
        let identity = self.compute_identity(id);
        if let NodeData::Branch { id_cache, .. } = &mut self.slot_mut(id).data {
            *id_cache = Some(identity);
        }
    }

    fn clear_cache(&mut self, id: NodeId) {
        if let NodeData::Branch { id_cache, .. } = &mut self.slot_mut(id).data {
            *id_cache = None;
        }
    }

    /// First child index whose identity is not less than `key`.
    pub(crate) fn lower_bound(&self, parent: NodeId, key: &str) -> usize {
        self.children(parent)
            .partition_point(|c| self.identity(*c).as_str() < key)
    }

    /// Index range of the contiguous run of `schema` children.
    pub(crate) fn schema_range(&self, parent: NodeId, schema: SchemaId) -> Range<usize> {
        let sn = self.schema.node(schema);
        let base = base_identity(sn, self.options.single_leaf_list);
        let start = self.lower_bound(parent, &base);
        let len = self.children(parent)[start..].partition_point(|c| self.schema_id(*c) == schema);
        start..start + len
    }

    /// Children of `schema` whose identity equals `key`, or starts with it
    /// when `prefix` is set.
    pub(crate) fn search(&self, parent: NodeId, schema: SchemaId, key: &str, prefix: bool) -> Vec<NodeId> {
        let children = self.children(parent);
        let sn = self.schema.node(schema);
        let matches = |c: &NodeId| {
            let identity = self.identity(*c);
            if prefix {
                identity.starts_with(key)
            } else {
                identity == key
            }
        };

        if sn.keeps_insert_order() {
            let range = self.schema_range(parent, schema);
            return children[range].iter().copied().filter(matches).collect();
        }
        let start = self.lower_bound(parent, key);
        children[start..]
            .iter()
            .copied()
            .take_while(|c| self.schema_id(*c) == schema && matches(c))
            .collect()
    }

    fn ancestors_or_self(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |n| self.parent(*n))
    }

    /// All children of one schema, in order.
    pub(crate) fn instances(&self, parent: NodeId, schema: SchemaId) -> Vec<NodeId> {
        let range = self.schema_range(parent, schema);
        self.children(parent)[range].to_vec()
    }

    /// Attach `child` under `parent` at its ordered position, detaching it
    /// from any previous parent first.
    ///
    /// An existing sibling with the same identity is replaced and returned
    /// detached, unless `create_only` is set, in which case the call fails
    /// with `DataExists`. `insert` positions the child among ordered-by-user
    /// or duplicatable siblings and is ignored for system-ordered ones.
    pub fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        insert: Option<&InsertOption>,
        create_only: bool,
    ) -> Result<Option<NodeId>> {
        let child_schema = self.schema_id(child);
        let schema = Arc::clone(&self.schema);
        let sn = schema.node(child_schema);
        let parent_sn = self.schema_of(parent);
        if !self.data(parent).is_branch() {
            return Err(Error::OperationNotSupported(format!(
                "cannot insert into {}",
                parent_sn.name()
            )));
        }
        if sn.parent() != Some(self.schema_id(parent)) {
            return Err(Error::SchemaNotFound(format!(
                "{} is not a child of {}",
                sn.name(),
                parent_sn.name()
            )));
        }
        if self.ancestors_or_self(parent).any(|a| a == child) {
            return Err(Error::OperationNotSupported(format!(
                "cannot insert {} below itself",
                sn.name()
            )));
        }
        let keeps_order = sn.keeps_insert_order();
        let duplicatable = sn.is_duplicatable();
        let is_key = sn.is_key();

        self.detach(child);
        let identity = self.compute_identity(child);
        let children = self.children(parent);

        let (mut position, existing) = if keeps_order {
            let range = self.schema_range(parent, child_schema);
            let existing = if duplicatable {
                None
            } else {
                children[range.clone()]
                    .iter()
                    .position(|c| self.identity(*c) == identity)
                    .map(|at| range.start + at)
            };
            let position = match insert {
                None => existing.unwrap_or(range.end),
                Some(InsertOption::Last) => range.end,
                Some(InsertOption::First) => range.start,
                Some(InsertOption::Before(anchor) | InsertOption::After(anchor)) => {
                    if duplicatable {
                        return Err(Error::OperationNotSupported(format!(
                            "insert before/after on duplicatable {}",
                            sn.name()
                        )));
                    }
                    let anchor_id = crate::predicate::anchor_identity(&schema, sn, anchor)?;
                    let at = children[range.clone()]
                        .iter()
                        .position(|c| self.identity(*c) == anchor_id)
                        .ok_or_else(|| Error::DataMissing(anchor_id.clone()))?;
                    match insert {
                        Some(InsertOption::After(_)) => range.start + at + 1,
                        _ => range.start + at,
                    }
                }
            };
            (position, existing)
        } else {
            let position = self.lower_bound(parent, &identity);
            let existing = children
                .get(position)
                .filter(|c| self.identity(**c) == identity)
                .map(|_| position);
            (position, existing)
        };

        let mut replaced = None;
        if let Some(index) = existing {
            if create_only {
                return Err(Error::DataExists(identity));
            }
            let old = children[index];
            self.detach(old);
            if position > index {
                position -= 1;
            }
            replaced = Some(old);
        }

        if let NodeData::Branch { children, .. } = &mut self.slot_mut(parent).data {
            children.insert(position, child);
        }
        self.slot_mut(child).parent = Some(parent);
        self.fill_cache(child);
        trace!(parent = %self.identity(parent), child = %identity, position, "inserted");

        if is_key && self.is_attached(parent) {
            self.reindex(parent)?;
        }
        Ok(replaced)
    }

    /// Re-position an attached node after its identity changed.
    pub(crate) fn reindex(&mut self, id: NodeId) -> Result<()> {
        self.clear_cache(id);
        let Some(parent) = self.parent(id) else {
            return Ok(());
        };
        let sn = self.schema_of(id);
        if sn.keeps_insert_order() {
            if !sn.is_duplicatable() {
                let identity = self.compute_identity(id);
                let schema = self.schema_id(id);
                let clash = self
                    .instances(parent, schema)
                    .into_iter()
                    .any(|c| c != id && self.identity(c) == identity);
                if clash {
                    return Err(Error::DataExists(identity));
                }
            }
            self.fill_cache(id);
            return Ok(());
        }

        let Some((parent, index)) = self.detach(id) else {
            return Ok(());
        };
        match self.insert(parent, id, None, true) {
            Ok(_) => Ok(()),
            Err(err) => {
                self.attach_at(parent, index, id);
                Err(err)
            }
        }
    }
}
