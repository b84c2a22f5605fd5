//! Compiled schema consumed by the data tree.
//!
//! Schema nodes live in a flat arena indexed by [`SchemaId`]; parent and
//! child links are ids. A schema is read-only once compiled and may be shared
//! by many trees.

mod builder;
pub use builder::SchemaDef;

use crate::value::LeafType;
use serde::{Deserialize, Serialize};
use yangtree_path::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaKind {
    #[default]
    Container,
    List,
    Leaf,
    LeafList,
    /// Open container; children are declared like a container's.
    AnyData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(pub(crate) u32);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A compiled `must`/`when` constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub text: String,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub(crate) id: SchemaId,
    pub(crate) name: String,
    pub(crate) module: Option<String>,
    pub(crate) kind: SchemaKind,
    pub(crate) keys: Vec<String>,
    pub(crate) ordered_by_user: bool,
    pub(crate) config: bool,
    pub(crate) is_key: bool,
    pub(crate) default: Option<String>,
    pub(crate) leaf_type: LeafType,
    pub(crate) mandatory: bool,
    pub(crate) must: Vec<Constraint>,
    pub(crate) when: Option<Constraint>,
    pub(crate) parent: Option<SchemaId>,
    /// Sorted by name.
    pub(crate) children: Vec<SchemaId>,
}

impl SchemaNode {
    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// `module:name` when a module is set, else the bare name.
    pub fn qualified_name(&self) -> String {
        match &self.module {
            Some(module) => format!("{module}:{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn key_fields(&self) -> &[String] {
        &self.keys
    }

    pub fn is_ordered_by_user(&self) -> bool {
        self.ordered_by_user
    }

    pub fn is_config(&self) -> bool {
        self.config
    }

    /// Whether this leaf is a key of its parent list.
    pub fn is_key(&self) -> bool {
        self.is_key
    }

    /// Unkeyed lists and read-only leaf-lists may repeat the same identity.
    pub fn is_duplicatable(&self) -> bool {
        match self.kind {
            SchemaKind::List => self.keys.is_empty(),
            SchemaKind::LeafList => !self.config,
            _ => false,
        }
    }

    /// Siblings of this schema keep caller order instead of identity order.
    pub fn keeps_insert_order(&self) -> bool {
        self.ordered_by_user || self.is_duplicatable()
    }

    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn leaf_type(&self) -> &LeafType {
        &self.leaf_type
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn must(&self) -> &[Constraint] {
        &self.must
    }

    pub fn when(&self) -> Option<&Constraint> {
        self.when.as_ref()
    }

    pub fn parent(&self) -> Option<SchemaId> {
        self.parent
    }

    pub fn children(&self) -> &[SchemaId] {
        &self.children
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self.kind,
            SchemaKind::Container | SchemaKind::List | SchemaKind::AnyData
        )
    }

    pub fn is_list_like(&self) -> bool {
        matches!(self.kind, SchemaKind::List | SchemaKind::LeafList)
    }
}

/// A compiled schema tree.
#[derive(Debug, Clone)]
pub struct Schema {
    nodes: Vec<SchemaNode>,
}

impl Schema {
    /// Compile a definition tree; its top node becomes the schema root.
    pub fn compile(def: SchemaDef) -> crate::Result<Schema> {
        let mut nodes = Vec::new();
        builder::flatten(&def, None, true, &mut nodes)?;
        Ok(Schema { nodes })
    }

    pub fn root(&self) -> SchemaId {
        SchemaId(0)
    }

    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child schema by name. Accepts `module:name`; the module must match
    /// when the child declares one.
    pub fn child(&self, parent: SchemaId, name: &str) -> Option<SchemaId> {
        let (module, local) = match name.rsplit_once(':') {
            Some((module, local)) => (Some(module), local),
            None => (None, name),
        };
        let children = &self.node(parent).children;
        let idx = children
            .binary_search_by(|c| self.node(*c).name.as_str().cmp(local))
            .ok()?;
        let child = children[idx];
        match (module, self.node(child).module.as_deref()) {
            (Some(wanted), Some(actual)) if wanted != actual => None,
            _ => Some(child),
        }
    }

    /// Resolve a slash-separated schema path (`/a/b`) from the root.
    pub fn find(&self, path: &str) -> Option<SchemaId> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self.root(), |id, name| self.child(id, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::compile(
            SchemaDef::container("root")
                .child(
                    SchemaDef::list("L", &["id"])
                        .with_module("m")
                        .child(SchemaDef::leaf("id", LeafType::Uint32))
                        .child(SchemaDef::leaf("name", LeafType::String)),
                )
                .child(SchemaDef::list("log", &[]).child(SchemaDef::leaf("msg", LeafType::String)))
                .child(SchemaDef::leaf_list("tags", LeafType::String).read_only()),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let schema = schema();
        let list = schema.find("/L").unwrap();
        assert_eq!(schema.child(schema.root(), "m:L"), Some(list));
        assert_eq!(schema.child(schema.root(), "x:L"), None);
        let id = schema.child(list, "id").unwrap();
        assert!(schema.node(id).is_key());
        assert_eq!(schema.node(id).parent(), Some(list));
        assert!(schema.find("/L/missing").is_none());
    }

    #[test]
    fn test_duplicatable() {
        let schema = schema();
        assert!(!schema.node(schema.find("/L").unwrap()).is_duplicatable());
        assert!(schema.node(schema.find("/log").unwrap()).is_duplicatable());
        assert!(schema.node(schema.find("/tags").unwrap()).is_duplicatable());
    }
}
