use yangtree_path::{parse_path, path_to_string, ParseError, PathStep, StepKind};

fn kinds(path: &str) -> Vec<StepKind> {
    parse_path(path)
        .unwrap_or_else(|e| panic!("parse failed for '{path}': {e}"))
        .into_iter()
        .map(|s| s.kind)
        .collect()
}

#[test]
fn parser_selector_kind_matrix() {
    use StepKind::*;
    assert_eq!(kinds("a/b"), vec![Child, Child]);
    assert_eq!(kinds("/a/b"), vec![FromRoot, Child, Child]);
    assert_eq!(kinds("."), vec![SelfNode]);
    assert_eq!(kinds("../a"), vec![Parent, Child]);
    assert_eq!(kinds("*"), vec![AllChildren]);
    assert_eq!(kinds("..."), vec![AllDescendants]);
    assert_eq!(kinds("//a"), vec![AllDescendants, Child]);
    assert_eq!(kinds("a//b"), vec![Child, AllDescendants, Child]);
    assert_eq!(kinds("a/.../b/*"), vec![Child, AllDescendants, Child, AllChildren]);
    assert_eq!(kinds("/"), vec![FromRoot]);
    assert_eq!(kinds(""), Vec::<StepKind>::new());
}

#[test]
fn parser_predicate_capture_matrix() {
    let steps = parse_path("L[id=5][name='x']/leaf").unwrap();
    assert_eq!(
        steps[0],
        PathStep::child("L")
            .with_predicate("id=5")
            .with_predicate("name='x'")
    );

    let steps = parse_path("a[b[c=1]/d='[x]']").unwrap();
    assert_eq!(steps[0].predicates, vec!["b[c=1]/d='[x]'".to_string()]);

    let steps = parse_path("mod:a/mod:b[k=v]").unwrap();
    assert_eq!(steps[1].name, "mod:b");
    assert_eq!(steps[1].local_name(), "b");
}

#[test]
fn parser_trailing_value_matrix() {
    let steps = parse_path("a/b=hello/world[1]").unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].name, "b");
    assert_eq!(steps[1].value.as_deref(), Some("hello/world[1]"));

    let steps = parse_path("L[id=1]=x").unwrap();
    assert_eq!(steps[0].predicates, vec!["id=1".to_string()]);
    assert_eq!(steps[0].value.as_deref(), Some("x"));

    let steps = parse_path("a/b=").unwrap();
    assert_eq!(steps[1].value.as_deref(), Some(""));
}

#[test]
fn parser_error_matrix() {
    assert_eq!(parse_path("[a]"), Err(ParseError::LeadingBracket('[')));
    assert_eq!(parse_path("]a"), Err(ParseError::LeadingBracket(']')));
    assert!(matches!(parse_path("a[b"), Err(ParseError::UnbalancedBracket(_))));
    assert!(matches!(parse_path("a[b[c]"), Err(ParseError::UnbalancedBracket(_))));
    assert!(matches!(parse_path("a/b]"), Err(ParseError::UnbalancedBracket(_))));
    assert!(matches!(parse_path("a/[x=1]"), Err(ParseError::EmptyStep(_))));
    // Escaped brackets do not count.
    assert!(parse_path(r"a[x=\[]").is_ok());
}

#[test]
fn parser_text_round_trip_matrix() {
    for text in ["/a/b", "a[x=1]/b[y=2][3]", "../a/*", "/a/.../b=7"] {
        let steps = parse_path(text).unwrap();
        assert_eq!(path_to_string(&steps), text);
    }
}
