//! Arena-backed data tree.
//!
//! All nodes of a tree live in one `Vec` owned by [`DataTree`]; a [`NodeId`]
//! is an index into it. Ownership runs parent to child through each branch's
//! `children` list, and the `parent` link is a plain id used for upward
//! traversal only.
//!
//! Detached subtrees (from [`DataTree::remove`] or returned by delete edits)
//! stay allocated until [`DataTree::release`]. Using an id after it was
//! released is an API misuse and panics.

mod order;
pub(crate) use order::key_group;

use crate::error::{Error, Result};
use crate::options::{InsertOption, TreeOptions};
use crate::schema::{Schema, SchemaId, SchemaKind, SchemaNode};
use crate::value::values_equal;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Payload of a data node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    /// Container, list entry or anydata. Children are kept in identity order.
    Branch {
        children: Vec<NodeId>,
        /// Identity of an attached keyed list entry.
        id_cache: Option<String>,
    },
    /// Leaf, or one instance of a leaf-list.
    Leaf { value: Option<Value> },
    /// Whole leaf-list in one node (`TreeOptions::single_leaf_list`).
    LeafList { values: Vec<Value> },
}

impl NodeData {
    pub fn is_branch(&self) -> bool {
        matches!(self, NodeData::Branch { .. })
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Branch,
    Leaf,
    LeafList,
}

#[derive(Debug, Clone)]
struct Slot {
    schema: SchemaId,
    parent: Option<NodeId>,
    data: NodeData,
}

/// Pre-order copy of a subtree, parents referenced by position.
struct Extracted {
    schema: SchemaId,
    parent: Option<usize>,
    data: NodeData,
}

#[derive(Debug, Clone)]
pub struct DataTree {
    schema: Arc<Schema>,
    options: TreeOptions,
    slots: Vec<Option<Slot>>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl DataTree {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_options(schema, TreeOptions::default())
    }

    pub fn with_options(schema: Arc<Schema>, options: TreeOptions) -> Self {
        let mut tree = Self {
            schema,
            options,
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.new_root();
        tree
    }

    /// A fresh, empty root branch. The tree's own root is created by
    /// [`DataTree::new`]; extra roots are detached and must be released.
    pub fn new_root(&mut self) -> NodeId {
        let root = self.schema.root();
        self.new_node(root)
    }

    /// Create a detached node for `schema`, seeding default-valued leaves
    /// when `seed_defaults` is on.
    pub fn new_node(&mut self, schema: SchemaId) -> NodeId {
        let kind = self.schema.node(schema).kind();
        let data = match kind {
            SchemaKind::Leaf => NodeData::Leaf { value: None },
            SchemaKind::LeafList if self.options.single_leaf_list => {
                NodeData::LeafList { values: Vec::new() }
            }
            SchemaKind::LeafList => NodeData::Leaf { value: None },
            SchemaKind::Container | SchemaKind::List | SchemaKind::AnyData => NodeData::Branch {
                children: Vec::new(),
                id_cache: None,
            },
        };
        let id = self.alloc(Slot {
            schema,
            parent: None,
            data,
        });
        if self.options.seed_defaults && self.data(id).is_branch() {
            self.seed_defaults(id);
        }
        id
    }

    fn seed_defaults(&mut self, id: NodeId) {
        let schema = Arc::clone(&self.schema);
        for &child in schema.node(self.schema_id(id)).children() {
            let sn = schema.node(child);
            if sn.kind() != SchemaKind::Leaf || sn.is_key() {
                continue;
            }
            let Some(value) = sn.default().and_then(|d| sn.leaf_type().parse(d).ok()) else {
                continue;
            };
            let leaf = self.alloc(Slot {
                schema: child,
                parent: None,
                data: NodeData::Leaf { value: Some(value) },
            });
            if self.insert(id, leaf, None, true).is_err() {
                self.release(leaf);
            }
        }
    }

    fn alloc(&mut self, slot: Slot) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                NodeId((self.slots.len() - 1) as u32)
            }
        }
    }

    fn slot(&self, id: NodeId) -> &Slot {
        match &self.slots[id.index()] {
            Some(slot) => slot,
            None => panic!("{id:?} was released"),
        }
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        match &mut self.slots[id.index()] {
            Some(slot) => slot,
            None => panic!("{id:?} was released"),
        }
    }

    fn shape(&self, id: NodeId) -> Shape {
        match self.slot(id).data {
            NodeData::Branch { .. } => Shape::Branch,
            NodeData::Leaf { .. } => Shape::Leaf,
            NodeData::LeafList { .. } => Shape::LeafList,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn shared_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of allocated nodes, attached or not.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` refers to a live (unreleased) node.
    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    pub fn schema_id(&self, id: NodeId) -> SchemaId {
        self.slot(id).schema
    }

    pub fn schema_of(&self, id: NodeId) -> &SchemaNode {
        self.schema.node(self.slot(id).schema)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.slot(id).data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).parent
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.parent(id).is_some()
    }

    /// Children of a branch; empty for leaves.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.slot(id).data {
            NodeData::Branch { children, .. } => children,
            _ => &[],
        }
    }

    /// Value of a leaf.
    pub fn value(&self, id: NodeId) -> Option<&Value> {
        match &self.slot(id).data {
            NodeData::Leaf { value } => value.as_ref(),
            _ => None,
        }
    }

    /// Values of a leaf-list node, or the single value of a leaf.
    pub fn values(&self, id: NodeId) -> &[Value] {
        match &self.slot(id).data {
            NodeData::LeafList { values } => values,
            NodeData::Leaf { value: Some(value) } => std::slice::from_ref(value),
            _ => &[],
        }
    }

    /// Topmost ancestor (the node itself when detached).
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Slash-joined identity chain from the root, e.g. `/L[id=5]/name`.
    /// The schema root itself is not part of the chain.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = id;
        loop {
            match self.parent(current) {
                Some(parent) => {
                    parts.push(self.identity(current));
                    current = parent;
                }
                None => {
                    if self.schema_id(current) != self.schema.root() {
                        parts.push(self.identity(current));
                    }
                    break;
                }
            }
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Set a value from its string form. Leaves parse it with their type,
    /// leaf-list nodes add it, branches decode it as JSON text.
    pub fn set_value(&mut self, id: NodeId, raw: &str) -> Result<()> {
        let sn = self.schema_of(id);
        match self.shape(id) {
            Shape::Leaf => {
                let value = sn.leaf_type().parse(raw)?;
                self.store_leaf(id, Some(value))
            }
            Shape::LeafList => {
                let value = sn.leaf_type().parse(raw)?;
                self.add_leaf_list_value(id, value, None, false)
            }
            Shape::Branch => {
                let json: Value = serde_json::from_str(raw)
                    .map_err(|e| Error::InvalidValue(format!("{}: {e}", sn.name())))?;
                crate::codec::decode_into(self, id, &json, &mut Vec::new())
            }
        }
    }

    /// Set a value from decoded JSON. `null` unsets a leaf; an array
    /// replaces the values of a leaf-list node.
    pub fn set_json(&mut self, id: NodeId, json: &Value) -> Result<()> {
        let sn = self.schema_of(id);
        match self.shape(id) {
            Shape::Leaf => {
                let value = match json {
                    Value::Null => None,
                    other => Some(sn.leaf_type().from_json(other)?),
                };
                self.store_leaf(id, value)
            }
            Shape::LeafList => match json {
                Value::Array(items) => {
                    let leaf_type = sn.leaf_type().clone();
                    let values = items
                        .iter()
                        .map(|item| leaf_type.from_json(item))
                        .collect::<Result<Vec<_>>>()?;
                    self.set_leaf_list_values(id, values)
                }
                Value::Null => self.set_leaf_list_values(id, Vec::new()),
                other => {
                    let value = sn.leaf_type().from_json(other)?;
                    self.add_leaf_list_value(id, value, None, false)
                }
            },
            Shape::Branch => crate::codec::decode_into(self, id, json, &mut Vec::new()),
        }
    }

    /// Store a leaf value. Setting an already-valued key leaf of an attached
    /// entry is a no-op; identity changes re-index the affected entry.
    pub(crate) fn store_leaf(&mut self, id: NodeId, value: Option<Value>) -> Result<()> {
        let sn = self.schema_of(id);
        let is_key = sn.is_key();
        let is_instance = sn.kind() == SchemaKind::LeafList;
        let name = sn.name().to_string();
        let attached = self.is_attached(id);
        if is_key && attached && self.value(id).is_some() {
            return Ok(());
        }

        let old = match &mut self.slot_mut(id).data {
            NodeData::Leaf { value: slot } => std::mem::replace(slot, value),
            _ => return Err(Error::OperationNotSupported(format!("{name} is not a leaf"))),
        };
        if !attached {
            return Ok(());
        }
        let entry = match (is_key, is_instance) {
            (true, _) => self.parent(id),
            (_, true) => Some(id),
            _ => None,
        };
        if let Some(entry) = entry {
            if let Err(err) = self.reindex(entry) {
                if let NodeData::Leaf { value } = &mut self.slot_mut(id).data {
                    *value = old;
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn set_leaf_list_values(&mut self, id: NodeId, values: Vec<Value>) -> Result<()> {
        if let NodeData::LeafList { values: slot } = &mut self.slot_mut(id).data {
            slot.clear();
        }
        for value in values {
            self.add_leaf_list_value(id, value, None, false)?;
        }
        Ok(())
    }

    /// Add one value to a leaf-list node. System-ordered config values are
    /// kept sorted and unique; user-ordered ones honor `insert`; state
    /// values append and may repeat.
    pub fn add_leaf_list_value(
        &mut self,
        id: NodeId,
        value: Value,
        insert: Option<&InsertOption>,
        create_only: bool,
    ) -> Result<()> {
        let sn = self.schema_of(id);
        let duplicatable = sn.is_duplicatable();
        let user_ordered = sn.is_ordered_by_user();
        let leaf_type = sn.leaf_type().clone();
        let name = sn.name().to_string();

        let NodeData::LeafList { values } = &self.slot(id).data else {
            return Err(Error::OperationNotSupported(format!("{name} is not a leaf-list")));
        };
        if !duplicatable && values.iter().any(|v| values_equal(v, &value)) {
            if create_only {
                return Err(Error::DataExists(format!("{name}[.={}]", crate::value::canonical(&value))));
            }
            return Ok(());
        }

        let position = if user_ordered || duplicatable {
            match insert {
                None | Some(InsertOption::Last) => values.len(),
                Some(InsertOption::First) => 0,
                Some(InsertOption::Before(anchor) | InsertOption::After(anchor)) => {
                    if duplicatable {
                        return Err(Error::OperationNotSupported(format!(
                            "insert before/after on duplicatable {name}"
                        )));
                    }
                    let raw = anchor
                        .strip_prefix("[.=")
                        .and_then(|a| a.strip_suffix(']'))
                        .unwrap_or(anchor);
                    let anchor_value = leaf_type.parse(&yangtree_path::unescape(raw))?;
                    let at = values
                        .iter()
                        .position(|v| values_equal(v, &anchor_value))
                        .ok_or_else(|| Error::DataMissing(format!("{name}[.={raw}]")))?;
                    if matches!(insert, Some(InsertOption::After(_))) {
                        at + 1
                    } else {
                        at
                    }
                }
            }
        } else {
            let key = crate::value::canonical(&value);
            values.partition_point(|v| crate::value::canonical(v) < key)
        };

        if let NodeData::LeafList { values } = &mut self.slot_mut(id).data {
            values.insert(position, value);
        }
        Ok(())
    }

    /// Remove one value from a leaf-list node; returns whether it was there.
    pub fn remove_leaf_list_value(&mut self, id: NodeId, value: &Value) -> bool {
        match &mut self.slot_mut(id).data {
            NodeData::LeafList { values } => match values.iter().position(|v| values_equal(v, value)) {
                Some(at) => {
                    values.remove(at);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Detach a node from its parent. Removing a detached node is a no-op.
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// Detach and report the former parent and index.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.slot(id).parent?;
        let index = self.children(parent).iter().position(|c| *c == id)?;
        if let NodeData::Branch { children, .. } = &mut self.slot_mut(parent).data {
            children.remove(index);
        }
        let slot = self.slot_mut(id);
        slot.parent = None;
        if let NodeData::Branch { id_cache, .. } = &mut slot.data {
            *id_cache = None;
        }
        Some((parent, index))
    }

    /// Re-attach at a known index, bypassing ordering. Used to undo a detach.
    pub(crate) fn attach_at(&mut self, parent: NodeId, index: usize, id: NodeId) {
        if let NodeData::Branch { children, .. } = &mut self.slot_mut(parent).data {
            let index = index.min(children.len());
            children.insert(index, id);
        }
        self.slot_mut(id).parent = Some(parent);
        self.fill_cache(id);
    }

    /// Free a subtree. An attached node is detached first.
    pub fn release(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(slot) = self.slots[current.index()].take() {
                if let NodeData::Branch { children, .. } = slot.data {
                    stack.extend(children);
                }
                self.free.push(current);
            }
        }
    }

    /// Deep copy of a subtree within this tree, detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let nodes = self.extract(id);
        self.implant(nodes)
    }

    /// Deep copy of a subtree of another tree built on the same schema.
    pub fn import(&mut self, other: &DataTree, id: NodeId) -> Result<NodeId> {
        if !Arc::ptr_eq(&self.schema, &other.schema) {
            return Err(Error::OperationNotSupported(
                "cannot import from a tree with a different schema".into(),
            ));
        }
        if self.options.single_leaf_list != other.options.single_leaf_list {
            return Err(Error::OperationNotSupported(
                "cannot import between leaf-list storage modes".into(),
            ));
        }
        let nodes = other.extract(id);
        Ok(self.implant(nodes))
    }

    fn extract(&self, id: NodeId) -> Vec<Extracted> {
        fn walk(tree: &DataTree, id: NodeId, parent: Option<usize>, out: &mut Vec<Extracted>) {
            let slot = tree.slot(id);
            let index = out.len();
            let data = match &slot.data {
                NodeData::Branch { id_cache, .. } => NodeData::Branch {
                    children: Vec::new(),
                    id_cache: parent.and(id_cache.clone()),
                },
                other => other.clone(),
            };
            out.push(Extracted {
                schema: slot.schema,
                parent,
                data,
            });
            for &child in tree.children(id) {
                walk(tree, child, Some(index), out);
            }
        }
        let mut out = Vec::new();
        walk(self, id, None, &mut out);
        out
    }

    fn implant(&mut self, nodes: Vec<Extracted>) -> NodeId {
        let mut ids: Vec<NodeId> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let parent = node.parent.map(|p| ids[p]);
            let id = self.alloc(Slot {
                schema: node.schema,
                parent,
                data: node.data,
            });
            if let Some(parent) = parent {
                if let NodeData::Branch { children, .. } = &mut self.slot_mut(parent).data {
                    children.push(id);
                }
            }
            ids.push(id);
        }
        ids[0]
    }

    /// Swap a snapshot taken with [`DataTree::clone_subtree`] back into
    /// `target`. The current content of `target` is freed and `backup` is
    /// consumed.
    pub fn recover(&mut self, target: NodeId, backup: NodeId) -> Result<()> {
        if self.schema_id(target) != self.schema_id(backup) {
            return Err(Error::InvalidValue(format!(
                "snapshot of {} cannot restore {}",
                self.schema_of(backup).name(),
                self.schema_of(target).name()
            )));
        }
        self.detach(backup);
        let restored = match self.slots[backup.index()].take() {
            Some(slot) => slot.data,
            None => panic!("{backup:?} was released"),
        };
        self.free.push(backup);

        let current = std::mem::replace(&mut self.slot_mut(target).data, restored);
        if let NodeData::Branch { children, .. } = current {
            for child in children {
                self.slot_mut(child).parent = None;
                self.release(child);
            }
        }
        let children = self.children(target).to_vec();
        for child in children {
            self.slot_mut(child).parent = Some(target);
        }
        if let NodeData::Branch { id_cache, .. } = &mut self.slot_mut(target).data {
            *id_cache = None;
        }
        self.reindex(target)
    }

    /// Structural equality of two subtrees, possibly from different trees.
    /// Child order is significant and numbers compare by magnitude.
    pub fn equal(&self, a: NodeId, other: &DataTree, b: NodeId) -> bool {
        let (sa, sb) = (self.schema_of(a), other.schema_of(b));
        if sa.name() != sb.name() || sa.kind() != sb.kind() {
            return false;
        }
        match (self.data(a), other.data(b)) {
            (NodeData::Leaf { value: x }, NodeData::Leaf { value: y }) => match (x, y) {
                (Some(x), Some(y)) => values_equal(x, y),
                (None, None) => true,
                _ => false,
            },
            (NodeData::LeafList { values: x }, NodeData::LeafList { values: y }) => {
                x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
            }
            (NodeData::Branch { children: x, .. }, NodeData::Branch { children: y, .. }) => {
                x.len() == y.len() && x.iter().zip(y).all(|(x, y)| self.equal(*x, other, *y))
            }
            _ => false,
        }
    }
}
