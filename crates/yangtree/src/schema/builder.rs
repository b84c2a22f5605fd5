use super::{Constraint, SchemaId, SchemaKind, SchemaNode};
use crate::error::{Error, Result};
use crate::value::LeafType;
use serde::{Deserialize, Serialize};
use yangtree_path::Expr;

/// Declarative schema definition.
///
/// Build one in code with the constructor and `with_*` methods, or
/// deserialize it from JSON/YAML:
///
/// ```
/// use yangtree::{Schema, SchemaDef};
///
/// let def: SchemaDef = serde_json::from_str(r#"{
///     "name": "root",
///     "children": [
///         {"name": "L", "kind": "list", "keys": ["id"], "children": [
///             {"name": "id", "kind": "leaf", "type": "uint32"},
///             {"name": "name", "kind": "leaf"}
///         ]}
///     ]
/// }"#).unwrap();
/// let schema = Schema::compile(def).unwrap();
/// assert!(schema.find("/L/name").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchemaDef {
    pub name: String,
    pub module: Option<String>,
    pub kind: SchemaKind,
    pub keys: Vec<String>,
    pub ordered_by_user: bool,
    pub config: bool,
    pub default: Option<String>,
    #[serde(rename = "type")]
    pub leaf_type: LeafType,
    pub mandatory: bool,
    pub must: Vec<String>,
    pub when: Option<String>,
    pub children: Vec<SchemaDef>,
}

impl Default for SchemaDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            module: None,
            kind: SchemaKind::Container,
            keys: Vec::new(),
            ordered_by_user: false,
            config: true,
            default: None,
            leaf_type: LeafType::String,
            mandatory: false,
            must: Vec::new(),
            when: None,
            children: Vec::new(),
        }
    }
}

impl SchemaDef {
    fn named(name: &str, kind: SchemaKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            ..Self::default()
        }
    }

    pub fn container(name: &str) -> Self {
        Self::named(name, SchemaKind::Container)
    }

    pub fn anydata(name: &str) -> Self {
        Self::named(name, SchemaKind::AnyData)
    }

    /// A list; an empty key set makes it duplicatable.
    pub fn list(name: &str, keys: &[&str]) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::named(name, SchemaKind::List)
        }
    }

    pub fn leaf(name: &str, leaf_type: LeafType) -> Self {
        Self {
            leaf_type,
            ..Self::named(name, SchemaKind::Leaf)
        }
    }

    pub fn leaf_list(name: &str, leaf_type: LeafType) -> Self {
        Self {
            leaf_type,
            ..Self::named(name, SchemaKind::LeafList)
        }
    }

    pub fn child(mut self, child: SchemaDef) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }

    pub fn user_ordered(mut self) -> Self {
        self.ordered_by_user = true;
        self
    }

    /// Mark as state data (`config false`); inherited by descendants.
    pub fn read_only(mut self) -> Self {
        self.config = false;
        self
    }

    pub fn with_default(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_must(mut self, expr: &str) -> Self {
        self.must.push(expr.to_string());
        self
    }

    pub fn with_when(mut self, expr: &str) -> Self {
        self.when = Some(expr.to_string());
        self
    }
}

fn constraint(owner: &str, text: &str) -> Result<Constraint> {
    let expr = Expr::parse(text)
        .map_err(|e| Error::InvalidValue(format!("{owner}: constraint '{text}': {e}")))?;
    Ok(Constraint {
        text: text.to_string(),
        expr,
    })
}

/// Depth-first flattening into the arena; returns the id of `def`.
pub(super) fn flatten(
    def: &SchemaDef,
    parent: Option<SchemaId>,
    inherited_config: bool,
    nodes: &mut Vec<SchemaNode>,
) -> Result<SchemaId> {
    let owner = def.name.as_str();
    let leafy = matches!(def.kind, SchemaKind::Leaf | SchemaKind::LeafList);

    if leafy && !def.children.is_empty() {
        return Err(Error::InvalidValue(format!("{owner}: leaf nodes cannot have children")));
    }
    if !def.keys.is_empty() && def.kind != SchemaKind::List {
        return Err(Error::InvalidValue(format!("{owner}: only lists have keys")));
    }
    if def.ordered_by_user && !matches!(def.kind, SchemaKind::List | SchemaKind::LeafList) {
        return Err(Error::InvalidValue(format!(
            "{owner}: ordered-by user applies to lists and leaf-lists"
        )));
    }
    if let Some(default) = &def.default {
        if leafy {
            def.leaf_type
                .parse(default)
                .map_err(|e| Error::InvalidValue(format!("{owner}: default: {e}")))?;
        }
    }

    let id = SchemaId(nodes.len() as u32);
    let must = def
        .must
        .iter()
        .map(|text| constraint(owner, text))
        .collect::<Result<Vec<_>>>()?;
    let when = def.when.as_deref().map(|text| constraint(owner, text)).transpose()?;
    let config = inherited_config && def.config;

    nodes.push(SchemaNode {
        id,
        name: def.name.clone(),
        module: def.module.clone(),
        kind: def.kind,
        keys: def.keys.clone(),
        ordered_by_user: def.ordered_by_user,
        config,
        is_key: false,
        default: def.default.clone(),
        leaf_type: def.leaf_type.clone(),
        mandatory: def.mandatory,
        must,
        when,
        parent,
        children: Vec::new(),
    });

    let mut children = Vec::with_capacity(def.children.len());
    for child in &def.children {
        children.push(flatten(child, Some(id), config, nodes)?);
    }
    children.sort_by(|a, b| nodes[a.index()].name.cmp(&nodes[b.index()].name));
    if let Some(pair) = children
        .windows(2)
        .find(|w| nodes[w[0].index()].name == nodes[w[1].index()].name)
    {
        return Err(Error::InvalidValue(format!(
            "{owner}: duplicate child '{}'",
            nodes[pair[0].index()].name
        )));
    }

    for key in &def.keys {
        let found = children
            .iter()
            .find(|c| nodes[c.index()].name == *key)
            .copied();
        match found {
            Some(child) if nodes[child.index()].kind == SchemaKind::Leaf => {
                nodes[child.index()].is_key = true;
            }
            _ => {
                return Err(Error::InvalidValue(format!(
                    "{owner}: key '{key}' is not a leaf child"
                )))
            }
        }
    }

    nodes[id.index()].children = children;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::ErrorKind;

    fn compile_err(def: SchemaDef) -> ErrorKind {
        Schema::compile(def).unwrap_err().kind()
    }

    #[test]
    fn test_rejects_malformed() {
        let bad_key = SchemaDef::container("r").child(SchemaDef::list("L", &["id"]));
        assert_eq!(compile_err(bad_key), ErrorKind::InvalidValue);

        let leaf_child = SchemaDef::container("r").child(
            SchemaDef::leaf("x", LeafType::String).child(SchemaDef::container("y")),
        );
        assert_eq!(compile_err(leaf_child), ErrorKind::InvalidValue);

        let dup = SchemaDef::container("r")
            .child(SchemaDef::container("a"))
            .child(SchemaDef::leaf("a", LeafType::String));
        assert_eq!(compile_err(dup), ErrorKind::InvalidValue);

        let bad_default = SchemaDef::container("r")
            .child(SchemaDef::leaf("n", LeafType::Uint8).with_default("300"));
        assert_eq!(compile_err(bad_default), ErrorKind::InvalidValue);

        let bad_must = SchemaDef::container("r").with_must("a <");
        assert_eq!(compile_err(bad_must), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_config_inherited() {
        let schema = Schema::compile(
            SchemaDef::container("r").child(
                SchemaDef::container("state")
                    .read_only()
                    .child(SchemaDef::leaf_list("seen", LeafType::String)),
            ),
        )
        .unwrap();
        let seen = schema.node(schema.find("/state/seen").unwrap());
        assert!(!seen.is_config());
        assert!(seen.is_duplicatable());
    }

    #[test]
    fn test_deserialize_yaml() {
        let def: SchemaDef = serde_yaml::from_str(
            "name: root\nchildren:\n  - name: mtu\n    kind: leaf\n    type: uint16\n    default: \"1500\"\n",
        )
        .unwrap();
        let schema = Schema::compile(def).unwrap();
        let mtu = schema.node(schema.find("/mtu").unwrap());
        assert_eq!(mtu.leaf_type(), &LeafType::Uint16);
        assert_eq!(mtu.default(), Some("1500"));
    }
}
