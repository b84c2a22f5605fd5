//! In-memory YANG data tree.
//!
//! A [`DataTree`] holds schema-typed configuration and state data. Nodes are
//! addressed with XPath-like paths (see [`yangtree_path`]) and edited with
//! merge, create, replace, delete and remove semantics. Siblings are kept in
//! identity order so keyed lookups are binary searches; ordered-by-user and
//! duplicatable siblings keep the order they were inserted in.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use yangtree::{DataTree, LeafType, Schema, SchemaDef};
//!
//! let schema = Schema::compile(
//!     SchemaDef::container("root").child(
//!         SchemaDef::list("interface", &["name"])
//!             .child(SchemaDef::leaf("name", LeafType::String))
//!             .child(SchemaDef::leaf("mtu", LeafType::Uint16)),
//!     ),
//! )?;
//! let mut tree = DataTree::new(Arc::new(schema));
//! let root = tree.root();
//!
//! tree.set(root, "interface[name=eth0]/mtu", "1500")?;
//! let mtu = tree.find(root, "interface[name=eth0]/mtu")?;
//! assert_eq!(tree.path(mtu[0]), "/interface[name=eth0]/mtu");
//! assert_eq!(
//!     tree.to_json(root),
//!     serde_json::json!({"interface": [{"name": "eth0", "mtu": 1500}]})
//! );
//! # Ok::<(), yangtree::Error>(())
//! ```

mod error;
pub use error::{Error, ErrorKind, Result};

mod options;
pub use options::{EditOp, EditOptions, InsertOption, TreeOptions};

mod value;
pub use value::{canonical, values_equal, LeafType};

mod schema;
pub use schema::{Constraint, Schema, SchemaDef, SchemaId, SchemaKind, SchemaNode};

mod node;
pub use node::{DataTree, NodeData, NodeId};

mod predicate;

mod eval;
pub use eval::EditEvent;

mod codec;

mod diff;
pub use diff::{diff, diff_created, diff_deleted, diff_updated, TreeDiff, TreeNode};

mod validate;
