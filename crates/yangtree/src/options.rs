//! Per-tree and per-call configuration.
//!
//! Behavior toggles are plain values passed to the tree or to each edit, so
//! two trees (or two calls) never share hidden state.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Edit operation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOp {
    /// Create if absent, else update in place.
    #[default]
    Merge,
    /// Fail with `DataExists` if a unique target exists.
    Create,
    /// Delete existing matches, then insert fresh.
    Replace,
    /// Fail with `DataMissing` if the target is absent.
    Delete,
    /// Delete; an absent target is not an error.
    Remove,
}

impl EditOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditOp::Merge => "merge",
            EditOp::Create => "create",
            EditOp::Replace => "replace",
            EditOp::Delete => "delete",
            EditOp::Remove => "remove",
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, EditOp::Delete | EditOp::Remove)
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(EditOp::Merge),
            "create" => Ok(EditOp::Create),
            "replace" => Ok(EditOp::Replace),
            "delete" => Ok(EditOp::Delete),
            "remove" => Ok(EditOp::Remove),
            other => Err(Error::InvalidValue(format!("unknown edit operation: {other}"))),
        }
    }
}

/// Placement of a new node among user-ordered or duplicatable siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InsertOption {
    First,
    Last,
    /// Before the sibling addressed by the key (`b` or `[id=b]`).
    Before(String),
    After(String),
}

impl fmt::Display for InsertOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertOption::First => f.write_str("first"),
            InsertOption::Last => f.write_str("last"),
            InsertOption::Before(key) => write!(f, "before:{key}"),
            InsertOption::After(key) => write!(f, "after:{key}"),
        }
    }
}

impl FromStr for InsertOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => return Ok(InsertOption::First),
            "last" => return Ok(InsertOption::Last),
            _ => {}
        }
        if let Some(key) = s.strip_prefix("before:") {
            return Ok(InsertOption::Before(key.to_string()));
        }
        if let Some(key) = s.strip_prefix("after:") {
            return Ok(InsertOption::After(key.to_string()));
        }
        Err(Error::InvalidValue(format!("unknown insert option: {s}")))
    }
}

impl TryFrom<String> for InsertOption {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InsertOption> for String {
    fn from(value: InsertOption) -> Self {
        value.to_string()
    }
}

/// Options for a single edit call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EditOptions {
    pub operation: EditOp,
    pub insert: Option<InsertOption>,
    /// Snapshot targets before in-place updates and restore them on failure.
    pub recover_on_failure: bool,
}

impl EditOptions {
    pub fn new(operation: EditOp) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }

    pub fn with_insert(mut self, insert: InsertOption) -> Self {
        self.insert = Some(insert);
        self
    }

    pub fn with_recovery(mut self) -> Self {
        self.recover_on_failure = true;
        self
    }
}

/// Options fixed for the lifetime of a [`DataTree`](crate::DataTree).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TreeOptions {
    /// Store each leaf-list as one multi-valued node instead of one leaf
    /// instance per value.
    pub single_leaf_list: bool,
    /// Seed default-valued leaves when a branch is created.
    pub seed_defaults: bool,
}
