//! JSON and YAML encoding of data trees.
//!
//! The encoding follows RFC 7951 loosely: branches are objects, lists and
//! leaf-lists are arrays, an `empty` leaf is `[null]` and an unset leaf is
//! `null`. A member name is qualified as `module:name` where its module
//! differs from the enclosing one. YAML goes through the same
//! [`serde_json::Value`] model.

use crate::error::{Error, Result};
use crate::node::{key_group, DataTree, NodeData, NodeId};
use crate::options::TreeOptions;
use crate::schema::{Schema, SchemaId, SchemaKind};
use crate::value::canonical;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

impl DataTree {
    /// Encode a subtree. A branch becomes an object; a leaf or leaf-list node
    /// becomes its value.
    pub fn to_json(&self, node: NodeId) -> Value {
        match self.data(node) {
            NodeData::Branch { .. } => self.branch_to_json(node),
            NodeData::Leaf { value } => leaf_json(self, node, value.as_ref()),
            NodeData::LeafList { values } => {
                let leaf_type = self.schema_of(node).leaf_type();
                Value::Array(values.iter().map(|v| leaf_type.to_json(v)).collect())
            }
        }
    }

    fn branch_to_json(&self, node: NodeId) -> Value {
        let schema = self.schema();
        let enclosing = effective_module(schema, self.schema_id(node));
        let mut object = Map::new();
        let children = self.children(node);
        let mut start = 0;
        while start < children.len() {
            let sid = self.schema_id(children[start]);
            let len = children[start..]
                .iter()
                .take_while(|c| self.schema_id(**c) == sid)
                .count();
            let run = &children[start..start + len];
            start += len;

            let sn = schema.node(sid);
            let name = match effective_module(schema, sid) {
                Some(module) if Some(module) != enclosing => format!("{module}:{}", sn.name()),
                _ => sn.name().to_string(),
            };
            let value = match sn.kind() {
                SchemaKind::LeafList if self.options().single_leaf_list => self.to_json(run[0]),
                SchemaKind::List | SchemaKind::LeafList => {
                    Value::Array(run.iter().map(|c| self.to_json(*c)).collect())
                }
                _ => self.to_json(run[0]),
            };
            object.insert(name, value);
        }
        Value::Object(object)
    }

    /// Merge a decoded JSON object into an existing branch. Nodes created
    /// before a failure are removed again; updated leaves keep their new
    /// values.
    pub fn decode_json(&mut self, node: NodeId, json: &Value) -> Result<()> {
        let mut created = Vec::new();
        let outcome = decode_into(self, node, json, &mut created);
        if let Err(err) = &outcome {
            debug!(node = %self.path(node), error = %err, "decode failed, removing created nodes");
            for id in created.into_iter().rev() {
                if self.contains(id) {
                    self.release(id);
                }
            }
        }
        outcome
    }

    /// Build a new tree from a JSON document.
    pub fn from_json(schema: Arc<Schema>, options: TreeOptions, json: &Value) -> Result<DataTree> {
        let mut tree = DataTree::with_options(schema, options);
        let root = tree.root();
        decode_into(&mut tree, root, json, &mut Vec::new())?;
        Ok(tree)
    }

    pub fn to_yaml(&self, node: NodeId) -> Result<String> {
        serde_yaml::to_string(&self.to_json(node)).map_err(|e| Error::InvalidValue(e.to_string()))
    }

    pub fn from_yaml(schema: Arc<Schema>, options: TreeOptions, text: &str) -> Result<DataTree> {
        let json: Value = serde_yaml::from_str(text).map_err(|e| Error::InvalidValue(e.to_string()))?;
        Self::from_json(schema, options, &json)
    }
}

fn leaf_json(tree: &DataTree, node: NodeId, value: Option<&Value>) -> Value {
    match value {
        Some(value) => tree.schema_of(node).leaf_type().to_json(value),
        None => Value::Null,
    }
}

/// Module of a schema node, inherited from the nearest ancestor declaring one.
fn effective_module(schema: &Schema, mut sid: SchemaId) -> Option<&str> {
    loop {
        let sn = schema.node(sid);
        if let Some(module) = sn.module() {
            return Some(module);
        }
        sid = sn.parent()?;
    }
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

/// Decode `json` into `branch` with merge semantics. Every node attached
/// directly under an existing node is pushed to `created`.
pub(crate) fn decode_into(
    tree: &mut DataTree,
    branch: NodeId,
    json: &Value,
    created: &mut Vec<NodeId>,
) -> Result<()> {
    let object = match json {
        Value::Object(object) => object,
        Value::Null => return Ok(()),
        other => {
            return Err(Error::InvalidValue(format!(
                "{} expects an object, got {other}",
                tree.path(branch)
            )))
        }
    };
    let schema = tree.shared_schema();
    for (member, value) in object {
        let Some(sid) = schema.child(tree.schema_id(branch), member) else {
            return Err(Error::SchemaNotFound(format!("{member} under {}", tree.path(branch))));
        };
        let sn = schema.node(sid);
        match sn.kind() {
            SchemaKind::Container | SchemaKind::AnyData | SchemaKind::Leaf => {
                match tree.search(branch, sid, sn.name(), false).first().copied() {
                    Some(existing) if sn.kind() == SchemaKind::Leaf => tree.set_json(existing, value)?,
                    Some(existing) => decode_into(tree, existing, value, created)?,
                    None => {
                        let node = tree.new_node(sid);
                        fill(tree, node, value)?;
                        attach(tree, branch, node, created)?;
                    }
                }
            }
            SchemaKind::List => {
                let entries = match value {
                    Value::Array(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                for entry in entries {
                    let identity = entry_identity(&schema, sid, entry)?;
                    let existing = match &identity {
                        Some(identity) => tree.search(branch, sid, identity, false).first().copied(),
                        None => None,
                    };
                    match existing {
                        Some(existing) => decode_into(tree, existing, entry, created)?,
                        None => {
                            let node = tree.new_node(sid);
                            fill(tree, node, entry)?;
                            attach(tree, branch, node, created)?;
                        }
                    }
                }
            }
            SchemaKind::LeafList if tree.options().single_leaf_list => {
                match tree.search(branch, sid, sn.name(), false).first().copied() {
                    Some(existing) => add_values(tree, existing, value)?,
                    None => {
                        let node = tree.new_node(sid);
                        fill(tree, node, value)?;
                        attach(tree, branch, node, created)?;
                    }
                }
            }
            SchemaKind::LeafList => {
                let items = match value {
                    Value::Array(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                for item in items {
                    let typed = sn.leaf_type().from_json(item)?;
                    if !sn.is_duplicatable() {
                        let identity = format!("{}{}", sn.name(), key_group(".", &canonical(&typed)));
                        if !tree.search(branch, sid, &identity, false).is_empty() {
                            continue;
                        }
                    }
                    let node = tree.new_node(sid);
                    fill(tree, node, item)?;
                    attach(tree, branch, node, created)?;
                }
            }
        }
    }
    Ok(())
}

/// Populate a detached node, releasing it on failure.
fn fill(tree: &mut DataTree, node: NodeId, value: &Value) -> Result<()> {
    let outcome = if tree.data(node).is_branch() {
        decode_into(tree, node, value, &mut Vec::new())
    } else {
        tree.set_json(node, value)
    };
    if outcome.is_err() {
        tree.release(node);
    }
    outcome
}

fn attach(tree: &mut DataTree, parent: NodeId, node: NodeId, created: &mut Vec<NodeId>) -> Result<()> {
    match tree.insert(parent, node, None, true) {
        Ok(_) => {
            created.push(node);
            Ok(())
        }
        Err(err) => {
            tree.release(node);
            Err(err)
        }
    }
}

fn add_values(tree: &mut DataTree, node: NodeId, value: &Value) -> Result<()> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        single => std::slice::from_ref(single),
    };
    let leaf_type = tree.schema_of(node).leaf_type().clone();
    for item in items {
        let typed = leaf_type.from_json(item)?;
        tree.add_leaf_list_value(node, typed, None, false)?;
    }
    Ok(())
}

/// Identity a decoded list entry will have, or `None` for unkeyed lists.
fn entry_identity(schema: &Schema, sid: SchemaId, entry: &Value) -> Result<Option<String>> {
    let sn = schema.node(sid);
    if sn.key_fields().is_empty() {
        return Ok(None);
    }
    let Value::Object(object) = entry else {
        return Err(Error::InvalidValue(format!("{} entry must be an object", sn.name())));
    };
    let mut identity = sn.name().to_string();
    for key in sn.key_fields() {
        let Some((_, raw)) = object.iter().find(|(member, _)| local(member) == key) else {
            return Err(Error::InvalidValue(format!("{} entry without key {key}", sn.name())));
        };
        let leaf = schema
            .child(sid, key)
            .ok_or_else(|| Error::SchemaNotFound(format!("{}/{key}", sn.name())))?;
        let value = schema.node(leaf).leaf_type().from_json(raw)?;
        identity.push_str(&key_group(key, &canonical(&value)));
    }
    Ok(Some(identity))
}
