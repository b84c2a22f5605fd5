//! Predicate resolution for one path step.
//!
//! Key-value predicates covering a list's keys in order become an exact
//! identity, looked up by binary search. Leading keys only (or a `*` value)
//! give an identity prefix. Everything else stays as a residual filter,
//! applied in source order to the candidates the lookup returns.

use crate::error::{Error, Result};
use crate::node::key_group;
use crate::schema::{Schema, SchemaKind, SchemaNode};
use crate::value::canonical;
use yangtree_path::{classify_predicate, parse_path, Predicate};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Resolved {
    /// Exact identity, or identity prefix when `prefix` is set.
    pub key: String,
    pub prefix: bool,
    pub filters: Vec<Predicate>,
    /// Literal `name=value` pairs, applied to a node created for the step.
    pub assign: Vec<(String, String)>,
}

impl Resolved {
    /// Whether the step addresses at most one node by identity alone.
    pub fn is_unique(&self, schema: &SchemaNode) -> bool {
        !self.prefix && self.filters.is_empty() && !schema.is_duplicatable()
    }
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

/// Canonical form of `raw` read as the type of key `key` (`.` for the
/// leaf-list value itself).
fn canonical_key(schema: &Schema, sn: &SchemaNode, key: &str, raw: &str) -> Result<String> {
    let leaf_type = if key == "." {
        sn.leaf_type()
    } else {
        let id = schema
            .child(sn.id(), key)
            .ok_or_else(|| Error::SchemaNotFound(format!("{}/{key}", sn.name())))?;
        schema.node(id).leaf_type()
    };
    Ok(canonical(&leaf_type.parse(raw)?))
}

pub(crate) fn resolve(
    schema: &Schema,
    sn: &SchemaNode,
    predicates: &[String],
    single_leaf_list: bool,
) -> Result<Resolved> {
    let mut classified = predicates
        .iter()
        .map(|raw| classify_predicate(raw).map(Some))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let assign = classified
        .iter()
        .flatten()
        .filter_map(|p| match p {
            Predicate::KeyValue { name, value } if value != "*" => {
                Some((local(name).to_string(), value.clone()))
            }
            _ => None,
        })
        .collect();

    let mut take = |field: &str| -> Option<String> {
        let at = classified.iter().position(|p| {
            matches!(p, Some(Predicate::KeyValue { name, .. }) if local(name) == field)
        })?;
        match classified[at].take() {
            Some(Predicate::KeyValue { value, .. }) => Some(value),
            _ => None,
        }
    };

    let mut key = sn.name().to_string();
    let mut prefix = false;
    match sn.kind() {
        SchemaKind::List if !sn.key_fields().is_empty() => {
            for field in sn.key_fields() {
                if prefix {
                    break;
                }
                match take(field) {
                    Some(value) if value != "*" => {
                        key.push_str(&key_group(field, &canonical_key(schema, sn, field, &value)?));
                    }
                    _ => prefix = true,
                }
            }
        }
        SchemaKind::LeafList if !single_leaf_list => match take(".") {
            Some(value) if value != "*" => {
                key.push_str(&key_group(".", &canonical_key(schema, sn, ".", &value)?));
            }
            _ => prefix = true,
        },
        _ => {}
    }
    if prefix && !key.contains('[') {
        key.push('[');
    }

    Ok(Resolved {
        key,
        prefix,
        filters: classified.into_iter().flatten().collect(),
        assign,
    })
}

/// Identity of the sibling an insert directive points at: a bare key value
/// (`b`) for single-key lists and leaf-lists, or a predicate (`[id=b]`).
pub(crate) fn anchor_identity(schema: &Schema, sn: &SchemaNode, anchor: &str) -> Result<String> {
    if anchor.starts_with('[') {
        let steps = parse_path(&format!("{}{anchor}", sn.name()))?;
        let predicates = steps.first().map(|s| s.predicates.clone()).unwrap_or_default();
        let resolved = resolve(schema, sn, &predicates, false)?;
        if resolved.prefix || !resolved.filters.is_empty() {
            return Err(Error::InvalidValue(format!(
                "insert anchor {anchor} does not name one {}",
                sn.name()
            )));
        }
        return Ok(resolved.key);
    }
    match sn.kind() {
        SchemaKind::List if sn.key_fields().len() == 1 => {
            let field = &sn.key_fields()[0];
            Ok(format!(
                "{}{}",
                sn.name(),
                key_group(field, &canonical_key(schema, sn, field, anchor)?)
            ))
        }
        SchemaKind::LeafList => Ok(format!(
            "{}{}",
            sn.name(),
            key_group(".", &canonical_key(schema, sn, ".", anchor)?)
        )),
        _ => Err(Error::InvalidValue(format!(
            "insert anchor for {} must be a predicate",
            sn.name()
        ))),
    }
}
