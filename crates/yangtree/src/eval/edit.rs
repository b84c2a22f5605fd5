//! Edit engine: merge, create, replace, delete and remove along a path.
//!
//! Every mutation is recorded in an undo journal. A failing step rolls the
//! journal back to the mark taken before it, so a multi-step creation that
//! fails halfway leaves nothing behind. When a path fans out over several
//! nodes each one is its own unit: siblings completed before a failure stay
//! applied.

use crate::codec;
use crate::error::{Error, Result};
use crate::node::{key_group, DataTree, NodeData, NodeId};
use crate::options::{EditOp, EditOptions, InsertOption};
use crate::predicate::{resolve, Resolved};
use crate::schema::{SchemaId, SchemaKind};
use crate::value::{canonical, values_equal};
use serde_json::Value;
use tracing::{debug, trace};
use yangtree_path::{parse_path, path_to_string, step_to_string, PathStep, Predicate, StepKind};

/// Notification passed to an edit callback after each mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct EditEvent {
    pub op: EditOp,
    /// Path of the affected node.
    pub path: String,
    /// Detached snapshot taken before an update, or the deleted node.
    pub old: Option<NodeId>,
    /// The live node after the change.
    pub new: Option<NodeId>,
}

type Callback<'a> = &'a mut dyn FnMut(&DataTree, &EditEvent) -> Result<()>;

enum Undo {
    /// Attached by this edit; released on rollback.
    Created(NodeId),
    /// Deleted by this edit and handed to the caller.
    Detached {
        parent: NodeId,
        index: usize,
        id: NodeId,
    },
    /// Replaced by this edit; released once the edit completes.
    Discarded {
        parent: NodeId,
        index: usize,
        id: NodeId,
    },
    Snapshot { target: NodeId, backup: NodeId },
}

#[derive(Clone, Copy)]
struct Mark {
    journal: usize,
    results: usize,
}

struct Edit<'a> {
    op: EditOp,
    insert: Option<InsertOption>,
    value: Option<String>,
    snapshots: bool,
    origin: NodeId,
    journal: Vec<Undo>,
    results: Vec<NodeId>,
    garbage: Vec<NodeId>,
    callback: Option<Callback<'a>>,
}

impl DataTree {
    /// Apply one edit at `path` relative to `at`.
    ///
    /// `value` is a raw string: leaves parse it with their type, branches and
    /// list or leaf-list groups decode it as JSON text. A trailing `=value`
    /// on the path is used when `value` is `None`. Returns the merged or
    /// created nodes, or for deletes the detached nodes, which the caller
    /// may [`release`](DataTree::release).
    pub fn edit(
        &mut self,
        at: NodeId,
        path: &str,
        value: Option<&str>,
        options: &EditOptions,
    ) -> Result<Vec<NodeId>> {
        self.run_edit(at, path, value, options, None)
    }

    /// Like [`DataTree::edit`], calling `callback` after every mutation. An
    /// error from the callback rolls the mutation back and is returned.
    pub fn edit_with_callback<F>(
        &mut self,
        at: NodeId,
        path: &str,
        value: Option<&str>,
        options: &EditOptions,
        mut callback: F,
    ) -> Result<Vec<NodeId>>
    where
        F: FnMut(&DataTree, &EditEvent) -> Result<()>,
    {
        let callback: Callback<'_> = &mut callback;
        self.run_edit(at, path, value, options, Some(callback))
    }

    /// Merge `value` at `path`, creating missing nodes.
    pub fn set(&mut self, at: NodeId, path: &str, value: &str) -> Result<Vec<NodeId>> {
        self.edit(at, path, Some(value), &EditOptions::new(EditOp::Merge))
    }

    pub fn create(&mut self, at: NodeId, path: &str, value: Option<&str>) -> Result<Vec<NodeId>> {
        self.edit(at, path, value, &EditOptions::new(EditOp::Create))
    }

    pub fn replace(&mut self, at: NodeId, path: &str, value: Option<&str>) -> Result<Vec<NodeId>> {
        self.edit(at, path, value, &EditOptions::new(EditOp::Replace))
    }

    /// Delete the addressed nodes; fails with `DataMissing` if there are none.
    pub fn delete(&mut self, at: NodeId, path: &str) -> Result<Vec<NodeId>> {
        self.edit(at, path, None, &EditOptions::new(EditOp::Delete))
    }

    /// Delete the addressed nodes if present.
    pub fn remove_path(&mut self, at: NodeId, path: &str) -> Result<Vec<NodeId>> {
        self.edit(at, path, None, &EditOptions::new(EditOp::Remove))
    }

    fn run_edit(
        &mut self,
        at: NodeId,
        path: &str,
        value: Option<&str>,
        options: &EditOptions,
        callback: Option<Callback<'_>>,
    ) -> Result<Vec<NodeId>> {
        let mut steps = parse_path(path)?;
        let value = value
            .map(str::to_string)
            .or_else(|| steps.last_mut().and_then(|s| s.value.take()));
        debug!(op = %options.operation, path, "edit");

        let mut edit = Edit {
            op: options.operation,
            insert: options.insert.clone(),
            value,
            snapshots: options.recover_on_failure || callback.is_some(),
            origin: self.root_of(at),
            journal: Vec::new(),
            results: Vec::new(),
            garbage: Vec::new(),
            callback,
        };
        let start = edit.mark();
        let outcome = edit.apply(self, at, &steps, false);
        match outcome {
            Ok(()) => edit.commit(start),
            Err(ref err) => {
                debug!(op = %options.operation, path, error = %err, "edit failed, rolling back");
                edit.rollback(self, start);
            }
        }
        for id in edit.garbage.drain(..) {
            self.release(id);
        }
        outcome.map(|_| edit.results)
    }
}

impl Edit<'_> {
    fn mark(&self) -> Mark {
        Mark {
            journal: self.journal.len(),
            results: self.results.len(),
        }
    }

    fn commit(&mut self, mark: Mark) {
        for undo in self.journal.drain(mark.journal..) {
            match undo {
                Undo::Snapshot { backup, .. } => self.garbage.push(backup),
                Undo::Discarded { id, .. } => self.garbage.push(id),
                Undo::Created(_) | Undo::Detached { .. } => {}
            }
        }
    }

    fn rollback(&mut self, tree: &mut DataTree, mark: Mark) {
        while self.journal.len() > mark.journal {
            let Some(undo) = self.journal.pop() else { break };
            match undo {
                Undo::Created(id) => {
                    if tree.contains(id) {
                        tree.release(id)
                    }
                }
                Undo::Detached { parent, index, id } | Undo::Discarded { parent, index, id } => {
                    tree.attach_at(parent, index, id)
                }
                Undo::Snapshot { target, backup } => {
                    if let Err(err) = tree.recover(target, backup) {
                        debug!(error = %err, "snapshot recovery failed");
                    }
                }
            }
        }
        self.results.truncate(mark.results);
    }

    /// Run `f` as one unit: roll back what it did if it fails.
    fn unit<F>(&mut self, tree: &mut DataTree, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self, &mut DataTree) -> Result<()>,
    {
        let mark = self.mark();
        match f(self, tree) {
            Ok(()) => {
                self.commit(mark);
                Ok(())
            }
            Err(err) => {
                self.rollback(tree, mark);
                Err(err)
            }
        }
    }

    fn notify(&mut self, tree: &DataTree, node: NodeId, old: Option<NodeId>, new: Option<NodeId>) -> Result<()> {
        if self.callback.is_none() {
            return Ok(());
        }
        let path = tree.path(node);
        self.emit(tree, path, old, new)
    }

    fn emit(&mut self, tree: &DataTree, path: String, old: Option<NodeId>, new: Option<NodeId>) -> Result<()> {
        let Some(callback) = self.callback.as_deref_mut() else {
            return Ok(());
        };
        let event = EditEvent {
            op: self.op,
            path,
            old,
            new,
        };
        callback(tree, &event).map_err(|err| {
            debug!(path = %event.path, error = %err, "edit callback failed");
            err
        })
    }

    fn missing(&self, what: String, lenient: bool) -> Result<()> {
        if self.op == EditOp::Delete && !lenient {
            Err(Error::DataMissing(what))
        } else {
            Ok(())
        }
    }

    fn apply(&mut self, tree: &mut DataTree, node: NodeId, steps: &[PathStep], lenient: bool) -> Result<()> {
        let Some((step, rest)) = steps.split_first() else {
            return self.terminal(tree, node);
        };
        trace!(node = %tree.identity(node), step = %step.name, "edit step");

        match step.kind {
            StepKind::SelfNode => self.apply(tree, node, rest, lenient),
            StepKind::Parent => match tree.parent(node) {
                Some(parent) => self.apply(tree, parent, rest, lenient),
                None if lenient => Ok(()),
                None => Err(Error::InvalidPath(format!("'..' above {}", tree.path(node)))),
            },
            StepKind::FromRoot => {
                let root = tree.root_of(node);
                self.apply(tree, root, rest, lenient)
            }
            StepKind::AllChildren => {
                if !tree.data(node).is_branch() {
                    return if lenient {
                        Ok(())
                    } else {
                        Err(Error::OperationNotSupported(format!("{} has no children", tree.path(node))))
                    };
                }
                let children = tree.children(node).to_vec();
                self.fan_out(tree, &children, rest, lenient)
            }
            StepKind::AllDescendants => {
                let mut targets = Vec::new();
                tree.collect(node, &steps[..1], true, &mut targets)?;
                let before = self.results.len();
                self.fan_out(tree, &targets, rest, true)?;
                if self.results.len() == before && !lenient {
                    let what = format!("{}/{}", tree.path(node), path_to_string(steps));
                    return self.missing(what, false);
                }
                Ok(())
            }
            StepKind::Child => self.child_step(tree, node, step, rest, lenient),
        }
    }

    /// Apply the remaining steps to each target as a separate unit.
    fn fan_out(&mut self, tree: &mut DataTree, targets: &[NodeId], rest: &[PathStep], lenient: bool) -> Result<()> {
        for &target in targets {
            if tree.root_of(target) != self.origin {
                continue;
            }
            self.unit(tree, |edit, tree| edit.apply(tree, target, rest, lenient))?;
        }
        Ok(())
    }

    fn child_step(
        &mut self,
        tree: &mut DataTree,
        node: NodeId,
        step: &PathStep,
        rest: &[PathStep],
        lenient: bool,
    ) -> Result<()> {
        if !tree.data(node).is_branch() {
            return if lenient {
                Ok(())
            } else {
                Err(Error::OperationNotSupported(format!(
                    "{} cannot have children",
                    tree.path(node)
                )))
            };
        }
        let schema = tree.shared_schema();
        let Some(sid) = schema.child(tree.schema_id(node), &step.name) else {
            if lenient {
                return Ok(());
            }
            return Err(Error::SchemaNotFound(format!("{} under {}", step.name, tree.path(node))));
        };
        let sn = schema.node(sid);
        let single = tree.options().single_leaf_list;
        let mut resolved = resolve(&schema, sn, &step.predicates, single)?;

        if sn.kind() == SchemaKind::LeafList && single && rest.is_empty() {
            return self.leaf_list_node_step(tree, node, sid, &resolved, lenient);
        }
        if rest.is_empty() && sn.kind() == SchemaKind::LeafList && resolved.prefix && !self.op.is_delete() {
            if let Some(raw) = self.value.as_deref().filter(|v| !is_json_array(v)) {
                let value = canonical(&sn.leaf_type().parse(raw)?);
                resolved.key = format!("{}{}", sn.name(), key_group(".", &value));
                resolved.prefix = false;
                resolved.assign.push((".".to_string(), raw.to_string()));
            }
        }

        let candidates = tree.search(node, sid, &resolved.key, resolved.prefix);
        let candidates = tree.apply_filters(candidates, &resolved.filters)?;
        let what = |tree: &DataTree| format!("{}/{}", tree.path(node), step_to_string(step));

        if !rest.is_empty() {
            if !candidates.is_empty() {
                return self.fan_out(tree, &candidates, rest, lenient);
            }
            if self.op.is_delete() || lenient {
                return self.missing(what(tree), lenient);
            }
            return self.unit(tree, |edit, tree| {
                let created = edit.create_child(tree, node, sid, &resolved, None)?;
                edit.apply(tree, created, rest, false)
            });
        }

        let what = what(tree);
        self.terminal_step(tree, node, sid, &resolved, candidates, lenient, what)
    }

    /// Last named step: apply the operation to the matched children of
    /// `parent`, creating them where the operation calls for it.
    #[allow(clippy::too_many_arguments)]
    fn terminal_step(
        &mut self,
        tree: &mut DataTree,
        parent: NodeId,
        sid: SchemaId,
        resolved: &Resolved,
        candidates: Vec<NodeId>,
        lenient: bool,
        what: String,
    ) -> Result<()> {
        let schema = tree.shared_schema();
        let sn = schema.node(sid);
        let fresh_instance = sn.is_duplicatable() && resolved.filters.is_empty();
        let group = sn.is_list_like() && !resolved.is_unique(sn) && self.group_value(sn.kind()).is_some();

        match self.op {
            EditOp::Delete | EditOp::Remove => {
                if candidates.is_empty() {
                    return self.missing(what, lenient);
                }
                for candidate in candidates {
                    self.unit(tree, |edit, tree| edit.delete_node(tree, candidate))?;
                }
                Ok(())
            }
            _ if lenient && candidates.is_empty() => Ok(()),
            EditOp::Create if group => self.unit(tree, |edit, tree| {
                for candidate in &candidates {
                    edit.discard(tree, *candidate)?;
                }
                edit.insert_group(tree, parent, sid, false)
            }),
            EditOp::Create => {
                if let Some(existing) = candidates.first().filter(|_| !fresh_instance) {
                    return Err(Error::DataExists(tree.path(*existing)));
                }
                self.unit(tree, |edit, tree| edit.create_terminal(tree, parent, sid, resolved, None))
            }
            EditOp::Replace => self.unit(tree, |edit, tree| {
                let mut slot = None;
                for candidate in &candidates {
                    let index = edit.discard(tree, *candidate)?;
                    slot.get_or_insert(index);
                }
                if group {
                    edit.insert_group(tree, parent, sid, false)
                } else {
                    edit.create_terminal(tree, parent, sid, resolved, slot)
                }
            }),
            EditOp::Merge if group => self.unit(tree, |edit, tree| edit.insert_group(tree, parent, sid, true)),
            EditOp::Merge if candidates.is_empty() || fresh_instance => {
                self.unit(tree, |edit, tree| edit.create_terminal(tree, parent, sid, resolved, None))
            }
            EditOp::Merge => {
                for candidate in candidates {
                    self.unit(tree, |edit, tree| edit.update(tree, candidate))?;
                }
                Ok(())
            }
        }
    }

    /// Terminal state reached through `.`, `..`, `/` or `*`.
    fn terminal(&mut self, tree: &mut DataTree, node: NodeId) -> Result<()> {
        match self.op {
            EditOp::Delete | EditOp::Remove => self.delete_node(tree, node),
            EditOp::Create => Err(Error::DataExists(tree.path(node))),
            EditOp::Merge => self.update(tree, node),
            EditOp::Replace => {
                let old = self.snapshot(tree, node);
                for child in tree.children(node).to_vec() {
                    self.discard(tree, child)?;
                }
                if let NodeData::LeafList { .. } = tree.data(node) {
                    tree.set_json(node, &Value::Null)?;
                }
                if let Some(raw) = self.value.clone() {
                    self.write_value(tree, node, &raw, false)?;
                }
                self.results.push(node);
                self.notify(tree, node, old, Some(node))
            }
        }
    }

    fn snapshot(&mut self, tree: &mut DataTree, node: NodeId) -> Option<NodeId> {
        if !self.snapshots {
            return None;
        }
        let backup = tree.clone_subtree(node);
        self.journal.push(Undo::Snapshot { target: node, backup });
        Some(backup)
    }

    fn update(&mut self, tree: &mut DataTree, node: NodeId) -> Result<()> {
        let old = self.snapshot(tree, node);
        if let Some(raw) = self.value.clone() {
            self.write_value(tree, node, &raw, false)?;
        }
        self.results.push(node);
        self.notify(tree, node, old, Some(node))
    }

    fn delete_node(&mut self, tree: &mut DataTree, node: NodeId) -> Result<()> {
        let path = tree.path(node);
        let Some((parent, index)) = tree.detach(node) else {
            return Err(Error::OperationNotSupported(format!("cannot delete {path}")));
        };
        self.journal.push(Undo::Detached { parent, index, id: node });
        self.results.push(node);
        self.emit(tree, path, Some(node), None)
    }

    /// Detach a node being replaced; it is released when the edit ends.
    fn discard(&mut self, tree: &mut DataTree, node: NodeId) -> Result<usize> {
        let Some((parent, index)) = tree.detach(node) else {
            return Err(Error::OperationNotSupported(format!("cannot replace {}", tree.path(node))));
        };
        self.journal.push(Undo::Discarded { parent, index, id: node });
        Ok(index)
    }

    /// New child of `parent` carrying the step's `name=value` predicates,
    /// attached and journaled.
    fn create_child(
        &mut self,
        tree: &mut DataTree,
        parent: NodeId,
        sid: SchemaId,
        resolved: &Resolved,
        insert: Option<&InsertOption>,
    ) -> Result<NodeId> {
        let sn = tree.schema().node(sid);
        if resolved.prefix {
            let needs = match sn.kind() {
                SchemaKind::List => "a predicate for every key",
                _ => "a value",
            };
            return Err(Error::InvalidPath(format!("{} needs {needs} to be created", sn.name())));
        }
        if resolved
            .filters
            .iter()
            .any(|f| !matches!(f, Predicate::KeyValue { .. }))
        {
            return Err(Error::DataMissing(format!("no {} matches the predicates", sn.name())));
        }

        let node = tree.new_node(sid);
        let attached = populate(tree, node, &resolved.assign)
            .and_then(|_| tree.insert(parent, node, insert, true));
        if let Err(err) = attached {
            tree.release(node);
            return Err(err);
        }
        self.journal.push(Undo::Created(node));
        Ok(node)
    }

    /// Create the terminal node. `slot` is the index of the sibling it
    /// replaces; without an insert directive an ordered-by-user entry takes
    /// that place.
    fn create_terminal(
        &mut self,
        tree: &mut DataTree,
        parent: NodeId,
        sid: SchemaId,
        resolved: &Resolved,
        slot: Option<usize>,
    ) -> Result<()> {
        let insert = self.insert.clone();
        let node = self.create_child(tree, parent, sid, resolved, insert.as_ref())?;
        if let Some(index) = slot.filter(|_| insert.is_none() && tree.schema_of(node).keeps_insert_order()) {
            tree.detach(node);
            tree.attach_at(parent, index, node);
        }
        if let Some(raw) = self.value.clone() {
            self.write_value(tree, node, &raw, self.op == EditOp::Create)?;
        }
        self.results.push(node);
        self.notify(tree, node, None, Some(node))
    }

    /// Items of a bulk value for a list or leaf-list group: a JSON array, or
    /// a single object for a list.
    fn group_value(&self, kind: SchemaKind) -> Option<Vec<Value>> {
        let raw = self.value.as_deref()?;
        if !is_json_array(raw) && !(kind == SchemaKind::List && raw.trim_start().starts_with('{')) {
            return None;
        }
        match serde_json::from_str::<Value>(raw).ok()? {
            Value::Array(items) => Some(items),
            object @ Value::Object(_) => Some(vec![object]),
            _ => None,
        }
    }

    /// Build one entry per bulk item. With `merge`, items whose identity
    /// already exists are merged into the existing entry instead.
    fn insert_group(&mut self, tree: &mut DataTree, parent: NodeId, sid: SchemaId, merge: bool) -> Result<()> {
        let kind = tree.schema().node(sid).kind();
        let duplicatable = tree.schema().node(sid).is_duplicatable();
        let items = self
            .group_value(kind)
            .ok_or_else(|| Error::InvalidValue(format!("expected a JSON array for {}", tree.schema().node(sid).name())))?;

        for item in items {
            let node = tree.new_node(sid);
            if let Err(err) = build_entry(tree, node, &item) {
                tree.release(node);
                return Err(err);
            }
            if merge && !duplicatable {
                let identity = tree.identity(node);
                if let Some(existing) = tree.search(parent, sid, &identity, false).first().copied() {
                    tree.release(node);
                    let old = self.snapshot(tree, existing);
                    self.write_json(tree, existing, &item)?;
                    self.results.push(existing);
                    self.notify(tree, existing, old, Some(existing))?;
                    continue;
                }
            }
            let insert = self.insert.clone();
            if let Err(err) = tree.insert(parent, node, insert.as_ref(), true) {
                tree.release(node);
                return Err(err);
            }
            self.journal.push(Undo::Created(node));
            self.results.push(node);
            self.notify(tree, node, None, Some(node))?;
        }
        Ok(())
    }

    /// Write a raw value into a node: leaves parse it with their type,
    /// leaf-list nodes and branches take JSON text.
    fn write_value(&mut self, tree: &mut DataTree, node: NodeId, raw: &str, create_only: bool) -> Result<()> {
        match tree.data(node) {
            NodeData::Leaf { .. } => tree.set_value(node, raw),
            NodeData::LeafList { .. } => {
                let leaf_type = tree.schema_of(node).leaf_type().clone();
                let values = if is_json_array(raw) {
                    let json: Value = serde_json::from_str(raw).map_err(|e| Error::InvalidValue(e.to_string()))?;
                    match json {
                        Value::Array(items) => items
                            .iter()
                            .map(|item| leaf_type.from_json(item))
                            .collect::<Result<Vec<_>>>()?,
                        _ => Vec::new(),
                    }
                } else {
                    vec![leaf_type.parse(raw)?]
                };
                let insert = self.insert.clone();
                for value in values {
                    tree.add_leaf_list_value(node, value, insert.as_ref(), create_only)?;
                }
                Ok(())
            }
            NodeData::Branch { .. } => {
                let json: Value = serde_json::from_str(raw)
                    .map_err(|e| Error::InvalidValue(format!("{}: {e}", tree.path(node))))?;
                self.write_json(tree, node, &json)
            }
        }
    }

    /// Merge one decoded bulk item into an existing entry.
    fn write_json(&mut self, tree: &mut DataTree, node: NodeId, item: &Value) -> Result<()> {
        if !tree.data(node).is_branch() {
            return tree.set_json(node, item);
        }
        let mut created = Vec::new();
        let merged = codec::decode_into(tree, node, item, &mut created);
        self.journal.extend(created.into_iter().map(Undo::Created));
        merged
    }

    /// A leaf-list stored as one node: value predicates and values address
    /// entries of the node rather than sibling nodes.
    fn leaf_list_node_step(
        &mut self,
        tree: &mut DataTree,
        parent: NodeId,
        sid: SchemaId,
        resolved: &Resolved,
        lenient: bool,
    ) -> Result<()> {
        let existing = tree.search(parent, sid, &resolved.key, false).first().copied();
        let dot = resolved
            .assign
            .iter()
            .find(|(name, _)| name == ".")
            .map(|(_, value)| value.clone());
        let leaf_type = tree.schema().node(sid).leaf_type().clone();
        let name = tree.schema().node(sid).name().to_string();

        match self.op {
            EditOp::Delete | EditOp::Remove => {
                let Some(node) = existing else {
                    return self.missing(name, lenient);
                };
                let Some(raw) = dot else {
                    return self.unit(tree, |edit, tree| edit.delete_node(tree, node));
                };
                let value = leaf_type.parse(&raw)?;
                if !tree.values(node).iter().any(|v| values_equal(v, &value)) {
                    return self.missing(format!("{name}[.={raw}]"), lenient);
                }
                self.unit(tree, |edit, tree| {
                    let backup = tree.clone_subtree(node);
                    edit.journal.push(Undo::Snapshot { target: node, backup });
                    tree.remove_leaf_list_value(node, &value);
                    edit.results.push(node);
                    edit.notify(tree, node, Some(backup), Some(node))
                })
            }
            _ if lenient => Ok(()),
            EditOp::Replace => self.unit(tree, |edit, tree| {
                if let Some(node) = existing {
                    edit.discard(tree, node)?;
                }
                edit.create_terminal(tree, parent, sid, resolved, None)
            }),
            EditOp::Create | EditOp::Merge => {
                let Some(node) = existing else {
                    return self.unit(tree, |edit, tree| edit.create_terminal(tree, parent, sid, resolved, None));
                };
                let create_only = self.op == EditOp::Create;
                if create_only && dot.is_none() && self.value.is_none() {
                    return Err(Error::DataExists(tree.path(node)));
                }
                self.unit(tree, |edit, tree| {
                    let old = edit.snapshot(tree, node);
                    if let Some(raw) = &dot {
                        let insert = edit.insert.clone();
                        tree.add_leaf_list_value(node, leaf_type.parse(raw)?, insert.as_ref(), create_only)?;
                    }
                    if let Some(raw) = edit.value.clone() {
                        edit.write_value(tree, node, &raw, create_only)?;
                    }
                    edit.results.push(node);
                    edit.notify(tree, node, old, Some(node))
                })
            }
        }
    }
}

/// Fill a detached list entry or leaf-list instance from one bulk item.
fn build_entry(tree: &mut DataTree, node: NodeId, item: &Value) -> Result<()> {
    if tree.data(node).is_branch() {
        codec::decode_into(tree, node, item, &mut Vec::new())
    } else {
        tree.set_json(node, item)
    }
}

fn is_json_array(raw: &str) -> bool {
    raw.trim_start().starts_with('[')
}

/// Apply `name=value` predicates to a detached node before it is attached.
fn populate(tree: &mut DataTree, node: NodeId, assign: &[(String, String)]) -> Result<()> {
    for (name, raw) in assign {
        if name == "." {
            tree.set_value(node, raw)?;
            continue;
        }
        let Some(child_schema) = tree.schema().child(tree.schema_id(node), name) else {
            return Err(Error::SchemaNotFound(format!(
                "{name} under {}",
                tree.schema_of(node).name()
            )));
        };
        if tree.schema().node(child_schema).kind() != SchemaKind::Leaf {
            continue;
        }
        let leaf = tree.new_node(child_schema);
        tree.set_value(leaf, raw)?;
        if let Err(err) = tree.insert(node, leaf, None, false) {
            tree.release(leaf);
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::options::{EditOp, EditOptions, InsertOption};
    use crate::schema::{Schema, SchemaDef};
    use crate::value::LeafType;
    use crate::{DataTree, ErrorKind};
    use serde_json::json;
    use std::sync::Arc;

    fn tree() -> DataTree {
        let schema = Schema::compile(
            SchemaDef::container("root")
                .child(
                    SchemaDef::list("L", &["id"])
                        .child(SchemaDef::leaf("id", LeafType::Uint32))
                        .child(SchemaDef::leaf("name", LeafType::String))
                        .child(SchemaDef::container("c").child(SchemaDef::leaf("n", LeafType::Uint8))),
                )
                .child(SchemaDef::leaf_list("tags", LeafType::String).user_ordered())
                .child(SchemaDef::list("log", &[]).child(SchemaDef::leaf("msg", LeafType::String))),
        )
        .unwrap();
        DataTree::new(Arc::new(schema))
    }

    fn count(tree: &DataTree, path: &str) -> usize {
        tree.find(tree.root(), path).unwrap().len()
    }

    #[test]
    fn test_trailing_value_shorthand() {
        let mut tree = tree();
        let root = tree.root();
        tree.edit(root, "L[id=1]/name=alice", None, &EditOptions::default())
            .unwrap();
        let name = tree.find_one(root, "L[id=1]/name").unwrap().unwrap();
        assert_eq!(tree.value(name), Some(&json!("alice")));
    }

    #[test]
    fn test_failed_value_rolls_back_creation() {
        let mut tree = tree();
        let root = tree.root();
        let live = tree.len();
        let err = tree.set(root, "L[id=1]/c/n", "300").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(count(&tree, "L"), 0);
        assert_eq!(tree.len(), live);
    }

    #[test]
    fn test_leaf_list_values_and_insert() {
        let mut tree = tree();
        let root = tree.root();
        for tag in ["a", "b", "c"] {
            tree.set(root, "tags", tag).unwrap();
        }
        let opts = EditOptions::new(EditOp::Merge).with_insert(InsertOption::Before("b".into()));
        tree.edit(root, "tags", Some("d"), &opts).unwrap();
        let values: Vec<_> = tree
            .find(root, "tags")
            .unwrap()
            .into_iter()
            .filter_map(|n| tree.value(n).cloned())
            .collect();
        assert_eq!(values, [json!("a"), json!("d"), json!("b"), json!("c")]);

        tree.delete(root, "tags[.=d]").unwrap();
        assert_eq!(count(&tree, "tags"), 3);
    }

    #[test]
    fn test_group_replace_and_merge() {
        let mut tree = tree();
        let root = tree.root();
        tree.set(root, "L", r#"[{"id": 1, "name": "a"}, {"id": 2}]"#).unwrap();
        assert_eq!(count(&tree, "L"), 2);

        tree.set(root, "L", r#"[{"id": 2, "name": "b"}, {"id": 3}]"#).unwrap();
        assert_eq!(count(&tree, "L"), 3);
        assert_eq!(count(&tree, "L[id=2]/name"), 1);

        tree.replace(root, "L", Some(r#"[{"id": 9}]"#)).unwrap();
        assert_eq!(count(&tree, "L"), 1);
        assert_eq!(count(&tree, "L[id=9]"), 1);
    }

    #[test]
    fn test_duplicatable_appends() {
        let mut tree = tree();
        let root = tree.root();
        tree.set(root, "log", r#"{"msg": "x"}"#).unwrap();
        tree.set(root, "log", r#"{"msg": "x"}"#).unwrap();
        assert_eq!(count(&tree, "log"), 2);
        tree.set(root, "log[2]/msg", "y").unwrap();
        assert_eq!(count(&tree, "log[msg='y']"), 1);
        tree.remove_path(root, "log").unwrap();
        assert_eq!(count(&tree, "log"), 0);
    }

    #[test]
    fn test_callback_events_and_veto() {
        let mut tree = tree();
        let root = tree.root();
        let mut seen = Vec::new();
        tree.edit_with_callback(root, "L[id=1]/name", Some("a"), &EditOptions::default(), |t, ev| {
            seen.push((ev.op, ev.path.clone(), ev.old.map(|o| t.contains(o))));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, [(EditOp::Merge, "/L[id=1]/name".to_string(), None)]);

        let err = tree
            .edit_with_callback(root, "L[id=1]/name", Some("b"), &EditOptions::default(), |_, _| {
                Err(crate::Error::ValidationFailed("vetoed".into()))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        let name = tree.find_one(root, "L[id=1]/name").unwrap().unwrap();
        assert_eq!(tree.value(name), Some(&json!("a")));
    }

    #[test]
    fn test_fan_out_keeps_completed_siblings() {
        let mut tree = tree();
        let root = tree.root();
        tree.set(root, "L", r#"[{"id": 1}, {"id": 2}, {"id": 3}]"#).unwrap();
        tree.set(root, "L[id=3]/c/n", "5").unwrap();
        let err = tree.create(root, "L/c", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataExists);
        assert_eq!(count(&tree, "L[id=1]/c"), 1);
        assert_eq!(count(&tree, "L[id=2]/c"), 1);
        assert_eq!(count(&tree, "L/c/n"), 1);
    }

    #[test]
    fn test_create_needs_keys_and_delete_needs_data() {
        let mut tree = tree();
        let root = tree.root();
        assert_eq!(
            tree.set(root, "L/name", "x").unwrap_err().kind(),
            ErrorKind::InvalidPath
        );
        assert_eq!(tree.delete(root, "L[id=4]").unwrap_err().kind(), ErrorKind::DataMissing);
        assert!(tree.remove_path(root, "L[id=4]").unwrap().is_empty());
        tree.create(root, "L[id=4]", None).unwrap();
        assert_eq!(
            tree.create(root, "L[id=4]", None).unwrap_err().kind(),
            ErrorKind::DataExists
        );
        let deleted = tree.delete(root, "L[id=4]").unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(!tree.is_attached(deleted[0]));
        tree.release(deleted[0]);
    }
}
