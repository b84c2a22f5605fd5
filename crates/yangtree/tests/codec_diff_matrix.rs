use serde_json::json;
use std::sync::Arc;
use yangtree::{diff, diff_deleted, diff_updated, DataTree, ErrorKind, Schema, SchemaDef, TreeOptions};

const SCHEMA: &str = r#"
name: root
children:
  - name: system
    module: sys
    children:
      - name: hostname
        kind: leaf
        mandatory: true
      - name: domain
        kind: leaf-list
        ordered-by-user: true
      - name: clock
        children:
          - name: tz
            kind: leaf
            type: !enumeration [utc, cet]
  - name: interface
    kind: list
    keys: [name]
    must: ["mtu >= 68"]
    children:
      - name: name
        kind: leaf
      - name: mtu
        kind: leaf
        type: uint16
        default: "1500"
      - name: speed
        kind: leaf
        type: !decimal64 1
        when: "../name != 'lo'"
  - name: event
    kind: list
    config: false
    children:
      - name: msg
        kind: leaf
"#;

fn schema() -> Arc<Schema> {
    let def: SchemaDef = serde_yaml::from_str(SCHEMA).unwrap();
    Arc::new(Schema::compile(def).unwrap())
}

fn document() -> serde_json::Value {
    json!({
        "sys:system": {
            "hostname": "edge",
            "domain": ["b.example", "a.example"],
            "clock": {"tz": "utc"}
        },
        "interface": [
            {"name": "eth1", "mtu": 9000, "speed": 2.5},
            {"name": "eth0", "mtu": 1500}
        ],
        "event": [{"msg": "up"}, {"msg": "up"}]
    })
}

#[test]
fn json_round_trip() {
    let schema = schema();
    let tree = DataTree::from_json(Arc::clone(&schema), TreeOptions::default(), &document()).unwrap();
    let encoded = tree.to_json(tree.root());
    assert_eq!(encoded["sys:system"]["domain"], json!(["b.example", "a.example"]));
    assert_eq!(encoded["interface"][0]["name"], json!("eth0"));
    assert_eq!(encoded["event"], json!([{"msg": "up"}, {"msg": "up"}]));

    let back = DataTree::from_json(schema, TreeOptions::default(), &encoded).unwrap();
    assert!(back.equal(back.root(), &tree, tree.root()));
    assert_eq!(back.to_json(back.root()), encoded);
}

#[test]
fn yaml_round_trip() {
    let schema = schema();
    let tree = DataTree::from_json(Arc::clone(&schema), TreeOptions::default(), &document()).unwrap();
    let text = tree.to_yaml(tree.root()).unwrap();
    assert!(text.contains("sys:system"));
    let back = DataTree::from_yaml(schema, TreeOptions::default(), &text).unwrap();
    assert!(back.equal(back.root(), &tree, tree.root()));

    let err = DataTree::from_yaml(back.shared_schema(), TreeOptions::default(), "bogus: 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaNotFound);
}

#[test]
fn merge_is_idempotent() {
    let mut doc = document();
    doc.as_object_mut().unwrap().remove("event");
    let mut tree = DataTree::from_json(schema(), TreeOptions::default(), &doc).unwrap();
    let root = tree.root();
    let snapshot = tree.clone();

    tree.merge(root, root).unwrap();
    tree.merge_tree(root, &snapshot, snapshot.root()).unwrap();
    tree.merge_tree(root, &snapshot, snapshot.root()).unwrap();
    assert!(tree.equal(root, &snapshot, snapshot.root()));
    assert_eq!(tree.len(), snapshot.len());

    // duplicatable entries are appended on every merge
    let events = DataTree::from_json(tree.shared_schema(), TreeOptions::default(), &document()).unwrap();
    tree.merge_tree(root, &events, events.root()).unwrap();
    tree.merge_tree(root, &events, events.root()).unwrap();
    assert_eq!(tree.find(root, "event").unwrap().len(), 4);
}

#[test]
fn merge_folds_other_tree() {
    let schema = schema();
    let mut tree = DataTree::from_json(Arc::clone(&schema), TreeOptions::default(), &document()).unwrap();
    let update = DataTree::from_json(
        schema,
        TreeOptions::default(),
        &json!({
            "system": {"hostname": "core", "domain": ["c.example"]},
            "interface": [{"name": "eth0", "mtu": 1400}, {"name": "lo", "mtu": 65535}],
            "event": [{"msg": "down"}]
        }),
    )
    .unwrap();
    let root = tree.root();
    tree.merge_tree(root, &update, update.root()).unwrap();

    let encoded = tree.to_json(root);
    assert_eq!(encoded["sys:system"]["hostname"], json!("core"));
    assert_eq!(
        encoded["sys:system"]["domain"],
        json!(["b.example", "a.example", "c.example"])
    );
    assert_eq!(encoded["interface"][0], json!({"name": "eth0", "mtu": 1400}));
    assert_eq!(encoded["interface"][2]["name"], json!("lo"));
    assert_eq!(encoded["event"].as_array().map(Vec::len), Some(3));
}

#[test]
fn diff_between_versions() {
    let schema = schema();
    let old = DataTree::from_json(Arc::clone(&schema), TreeOptions::default(), &document()).unwrap();
    let mut new = old.clone();
    let root = new.root();
    new.set(root, "interface[name=eth0]/mtu", "1400").unwrap();
    new.set(root, "interface[name=eth2]/mtu", "1500").unwrap();
    for id in new.delete(root, "system/clock").unwrap() {
        new.release(id);
    }
    new.set(root, "system/domain", "c.example").unwrap();

    let d = diff((&old, old.root()), (&new, root));
    let paths = |t: &DataTree, ids: &[yangtree::NodeId]| {
        ids.iter().map(|id| t.path(*id)).collect::<Vec<_>>()
    };
    assert_eq!(
        paths(&new, &d.created),
        ["/interface[name=eth2]", "/system/domain[.=c.example]"]
    );
    assert_eq!(paths(&old, &d.deleted), ["/system/clock"]);
    assert_eq!(d.replaced.len(), 1);
    assert_eq!(new.path(d.replaced[0].1), "/interface[name=eth0]/mtu");

    assert_eq!(diff_updated((&old, old.root()), (&new, root)).len(), 3);
    assert_eq!(diff_deleted((&new, root), (&old, old.root())).len(), 2);
    assert!(diff((&old, old.root()), (&old, old.root())).is_empty());
}

#[test]
fn validation_reports_constraints() {
    let mut tree = DataTree::from_json(schema(), TreeOptions::default(), &document()).unwrap();
    let root = tree.root();
    tree.validate(root).unwrap();

    tree.set(root, "interface[name=lo]", r#"{"mtu": 1500, "speed": 1.0}"#).unwrap();
    let err = tree.validate(root).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(err.to_string().contains("/interface[name=lo]/speed"));
    for id in tree.delete(root, "interface[name=lo]").unwrap() {
        tree.release(id);
    }

    tree.set(root, "interface[name=eth0]/mtu", "10").unwrap();
    assert!(tree.validate(root).unwrap_err().to_string().contains("must"));
    tree.set(root, "interface[name=eth0]/mtu", "68").unwrap();

    for id in tree.delete(root, "system/hostname").unwrap() {
        tree.release(id);
    }
    let err = tree.validate(root).unwrap_err();
    assert!(err.to_string().contains("hostname"));
}
