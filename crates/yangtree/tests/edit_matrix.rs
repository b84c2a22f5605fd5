use serde_json::json;
use std::sync::Arc;
use yangtree::{
    diff_updated, DataTree, EditOp, EditOptions, Error, ErrorKind, InsertOption, LeafType, Schema,
    SchemaDef, TreeOptions,
};

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::compile(
            SchemaDef::container("root")
                .child(
                    SchemaDef::container("a").child(
                        SchemaDef::container("b")
                            .child(SchemaDef::leaf("c", LeafType::Uint8))
                            .child(SchemaDef::leaf("d", LeafType::String)),
                    ),
                )
                .child(
                    SchemaDef::list("L", &["id"])
                        .child(SchemaDef::leaf("id", LeafType::Uint32))
                        .child(SchemaDef::leaf("name", LeafType::String))
                        .child(SchemaDef::leaf("x", LeafType::Int32)),
                )
                .child(SchemaDef::leaf_list("tags", LeafType::String))
                .child(SchemaDef::leaf("flag", LeafType::Empty)),
        )
        .unwrap(),
    )
}

fn populated() -> DataTree {
    DataTree::from_json(
        schema(),
        TreeOptions::default(),
        &json!({"L": [
            {"id": 1, "name": "one", "x": 1},
            {"id": 2, "name": "two", "x": 2},
            {"id": 3, "name": "three", "x": 3}
        ]}),
    )
    .unwrap()
}

fn leaf(tree: &DataTree, path: &str) -> Option<serde_json::Value> {
    tree.find_one(tree.root(), path)
        .unwrap()
        .and_then(|n| tree.value(n).cloned())
}

#[test]
fn create_on_existing_entry_fails_unchanged() {
    let mut tree = populated();
    let root = tree.root();
    let before = tree.to_json(root);

    let err = tree.create(root, "L[id=2]", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataExists);
    let err = tree.create(root, "L[id=2]/name", Some("other")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataExists);
    assert_eq!(tree.to_json(root), before);

    tree.create(root, "L[id=4]/name", Some("four")).unwrap();
    assert_eq!(leaf(&tree, "L[id=4]/name"), Some(json!("four")));
}

#[test]
fn delete_missing_and_remove_missing() {
    let mut tree = populated();
    let root = tree.root();
    let before = tree.to_json(root);

    let err = tree.delete(root, "L[id=9]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataMissing);
    let err = tree.delete(root, "L[id=9]/name").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataMissing);
    assert!(tree.remove_path(root, "L[id=9]").unwrap().is_empty());
    assert!(tree.remove_path(root, "L[id=1]/nothing").is_err());
    assert_eq!(tree.to_json(root), before);

    let gone = tree.delete(root, "L[id=2]/name").unwrap();
    assert_eq!(gone.len(), 1);
    assert_eq!(tree.identity(gone[0]), "name");
    assert_eq!(leaf(&tree, "L[id=2]/name"), None);
}

#[test]
fn failed_multi_step_create_leaves_nothing() {
    let mut tree = DataTree::new(schema());
    let root = tree.root();
    tree.create(root, "a", None).unwrap();
    let live = tree.len();

    let err = tree.set(root, "a/b/c", "300").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert!(tree.find(root, "a/b").unwrap().is_empty());
    assert_eq!(tree.len(), live);

    let err = tree.set(root, "L[id=7]/x", "nan").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert!(tree.find(root, "L").unwrap().is_empty());
    assert_eq!(tree.len(), live);
}

#[test]
fn path_and_schema_errors() {
    let mut tree = populated();
    let root = tree.root();
    let cases = [
        ("L[id=1", ErrorKind::InvalidPath),
        ("nope", ErrorKind::SchemaNotFound),
        ("L[id=1]/name/x", ErrorKind::OperationNotSupported),
        ("L[id=abc]", ErrorKind::InvalidValue),
        ("..", ErrorKind::InvalidPath),
    ];
    for (path, kind) in cases {
        let err = tree.set(root, path, "1").unwrap_err();
        assert_eq!(err.kind(), kind, "{path}");
    }
    let err = tree.delete(root, ".").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OperationNotSupported);
}

#[test]
fn replace_and_merge_values() {
    let mut tree = populated();
    let root = tree.root();

    tree.replace(root, "L[id=1]", Some(r#"{"x": 10}"#)).unwrap();
    assert_eq!(leaf(&tree, "L[id=1]/x"), Some(json!(10)));
    assert_eq!(leaf(&tree, "L[id=1]/name"), None);
    assert_eq!(leaf(&tree, "L[id=1]/id"), Some(json!(1)));

    tree.set(root, "L[id=2]", r#"{"x": 20}"#).unwrap();
    assert_eq!(leaf(&tree, "L[id=2]/x"), Some(json!(20)));
    assert_eq!(leaf(&tree, "L[id=2]/name"), Some(json!("two")));

    tree.set(root, "flag", "").unwrap();
    assert_eq!(tree.to_json(root)["flag"], json!([null]));

    tree.set(root, "L[name='three']/x", "-3").unwrap();
    assert_eq!(leaf(&tree, "L[id=3]/x"), Some(json!(-3)));
}

#[test]
fn group_edits_on_lists_and_leaf_lists() {
    let mut tree = populated();
    let root = tree.root();

    tree.set(root, "L", r#"[{"id": 3, "x": 33}, {"id": 4, "x": 4}]"#).unwrap();
    assert_eq!(tree.find(root, "L").unwrap().len(), 4);
    assert_eq!(leaf(&tree, "L[id=3]/x"), Some(json!(33)));
    assert_eq!(leaf(&tree, "L[id=3]/name"), Some(json!("three")));

    let err = tree.create(root, "L", Some(r#"[{"id": 5}, {"id": 5}]"#)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataExists);
    assert_eq!(tree.find(root, "L").unwrap().len(), 4);

    tree.replace(root, "L", Some(r#"[{"id": 8}]"#)).unwrap();
    assert_eq!(tree.to_json(root)["L"], json!([{"id": 8}]));

    tree.set(root, "tags", r#"["b", "a"]"#).unwrap();
    tree.set(root, "tags", r#"["c", "a"]"#).unwrap();
    assert_eq!(tree.to_json(root)["tags"], json!(["a", "b", "c"]));
    tree.replace(root, "tags", Some(r#"["z"]"#)).unwrap();
    assert_eq!(tree.to_json(root)["tags"], json!(["z"]));
    let deleted = tree.delete(root, "tags").unwrap();
    assert_eq!(deleted.len(), 1);
    assert!(tree.find(root, "tags").unwrap().is_empty());
}

#[test]
fn callback_sees_each_mutation() {
    let mut tree = populated();
    let root = tree.root();
    let mut events = Vec::new();
    tree.edit_with_callback(
        root,
        "L/x",
        Some("0"),
        &EditOptions::new(EditOp::Merge),
        |t, ev| {
            let old = ev.old.and_then(|o| t.value(o).cloned());
            events.push((ev.path.clone(), old));
            Ok(())
        },
    )
    .unwrap();
    assert_eq!(
        events,
        [
            ("/L[id=1]/x".to_string(), Some(json!(1))),
            ("/L[id=2]/x".to_string(), Some(json!(2))),
            ("/L[id=3]/x".to_string(), Some(json!(3))),
        ]
    );

    let mut deleted = Vec::new();
    tree.edit_with_callback(root, "L[id=1]", None, &EditOptions::new(EditOp::Delete), |_, ev| {
        deleted.push((ev.path.clone(), ev.new));
        Ok(())
    })
    .unwrap();
    assert_eq!(deleted, [("/L[id=1]".to_string(), None)]);
}

#[test]
fn callback_failure_rolls_back_the_failing_unit() {
    let mut tree = populated();
    let root = tree.root();
    let err = tree
        .edit_with_callback(root, "L/x", Some("9"), &EditOptions::default(), |_, ev| {
            if ev.path.contains("id=2") {
                Err(Error::ValidationFailed("x is frozen".into()))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(leaf(&tree, "L[id=1]/x"), Some(json!(9)));
    assert_eq!(leaf(&tree, "L[id=2]/x"), Some(json!(2)));
    assert_eq!(leaf(&tree, "L[id=3]/x"), Some(json!(3)));

    let live = tree.len();
    let err = tree
        .edit_with_callback(root, "L[id=3]", None, &EditOptions::new(EditOp::Delete), |_, _| {
            Err(Error::ValidationFailed("keep".into()))
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(leaf(&tree, "L[id=3]/name"), Some(json!("three")));
    assert_eq!(tree.len(), live);
}

#[test]
fn recovery_restores_branch_updates() {
    let mut tree = populated();
    let root = tree.root();
    let before = tree.to_json(root);
    let opts = EditOptions::new(EditOp::Merge).with_recovery();
    let err = tree
        .edit(root, "L[id=1]", Some(r#"{"name": "uno", "x": "bad"}"#), &opts)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
    assert_eq!(tree.to_json(root), before);
    assert_eq!(tree.len(), populated().len());
}

#[test]
fn single_leaf_list_mode() {
    let options = TreeOptions {
        single_leaf_list: true,
        ..TreeOptions::default()
    };
    let mut tree = DataTree::with_options(schema(), options);
    let root = tree.root();
    tree.set(root, "tags", "y").unwrap();
    tree.set(root, "tags", "x").unwrap();
    let node = tree.find_one(root, "tags").unwrap().unwrap();
    assert_eq!(tree.children(root), [node]);
    assert!(tree.values(node).contains(&json!("x")));
    assert!(tree.values(node).contains(&json!("y")));

    assert_eq!(tree.find(root, "tags[.=x]").unwrap(), [node]);
    assert!(tree.find(root, "tags[.=q]").unwrap().is_empty());

    let err = tree.create(root, "tags[.=y]", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataExists);

    tree.delete(root, "tags[.=x]").unwrap();
    assert!(!tree.values(node).contains(&json!("x")));
    let err = tree.delete(root, "tags[.=x]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataMissing);

    tree.delete(root, "tags").unwrap();
    assert!(tree.children(root).is_empty());
}

#[test]
fn replace_keeps_user_ordered_position() {
    let schema = Arc::new(
        Schema::compile(
            SchemaDef::container("root").child(
                SchemaDef::list("U", &["name"])
                    .user_ordered()
                    .child(SchemaDef::leaf("name", LeafType::String))
                    .child(SchemaDef::leaf("v", LeafType::String)),
            ),
        )
        .unwrap(),
    );
    let mut tree = DataTree::from_json(
        schema,
        TreeOptions::default(),
        &json!({"U": [{"name": "a"}, {"name": "b", "v": "old"}, {"name": "c"}]}),
    )
    .unwrap();
    let root = tree.root();
    let names = |tree: &DataTree| {
        tree.find(tree.root(), "U/name")
            .unwrap()
            .into_iter()
            .filter_map(|n| tree.value(n).cloned())
            .collect::<Vec<_>>()
    };

    tree.replace(root, "U[name=b]", Some(r#"{"v": "new"}"#)).unwrap();
    assert_eq!(names(&tree), [json!("a"), json!("b"), json!("c")]);
    assert_eq!(leaf(&tree, "U[name=b]/v"), Some(json!("new")));

    let first = EditOptions::new(EditOp::Replace).with_insert(InsertOption::First);
    tree.edit(root, "U[name=c]", None, &first).unwrap();
    assert_eq!(names(&tree), [json!("c"), json!("a"), json!("b")]);
}

#[test]
fn delete_through_descendants() {
    let mut tree = populated();
    let root = tree.root();
    let before = tree.to_json(root);

    let err = tree.delete(root, "//flag").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataMissing);
    let err = tree.delete(root, "//nothing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataMissing);
    assert!(tree.remove_path(root, "//flag").unwrap().is_empty());
    assert_eq!(tree.to_json(root), before);

    let gone = tree.delete(root, "//x").unwrap();
    assert_eq!(gone.len(), 3);
    assert!(tree.find(root, "L/x").unwrap().is_empty());
    assert_eq!(tree.find(root, "L").unwrap().len(), 3);
}

#[test]
fn wide_integers_stay_distinct() {
    let schema = Arc::new(
        Schema::compile(
            SchemaDef::container("root")
                .child(SchemaDef::leaf_list("ids", LeafType::Uint64))
                .child(SchemaDef::leaf("big", LeafType::Int64)),
        )
        .unwrap(),
    );
    let options = TreeOptions {
        single_leaf_list: true,
        ..TreeOptions::default()
    };
    let mut tree = DataTree::with_options(Arc::clone(&schema), options);
    let root = tree.root();
    tree.set(root, "ids", "9007199254740992").unwrap();
    tree.set(root, "ids", "9007199254740993").unwrap();
    let node = tree.find_one(root, "ids").unwrap().unwrap();
    assert_eq!(tree.values(node).len(), 2);
    tree.delete(root, "ids[.=9007199254740992]").unwrap();
    assert_eq!(tree.values(node), [json!(9007199254740993u64)]);

    let mut old = DataTree::new(schema);
    let old_root = old.root();
    old.set(old_root, "big", "9007199254740992").unwrap();
    let mut new = old.clone();
    new.set(old_root, "big", "9007199254740993").unwrap();
    assert_eq!(diff_updated((&old, old_root), (&new, old_root)).len(), 1);
    assert!(!new.equal(old_root, &old, old_root));
}
