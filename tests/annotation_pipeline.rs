mod common;

use common::{node, pipeline};
use pretty_assertions::assert_eq;
use serde_json::json;
use uast_transformer::errors::ErrorKind;
use uast_transformer::node::{KEY_TOKEN, KEY_TYPE};
use uast_transformer::role::role_list;
use uast_transformer::transform::ast::annotate;
use uast_transformer::transform::{run_pipeline, Fields, Mapping, Op, RolesDedup, Step, Transformer};
use uast_transformer::Node;

fn foo_rule() -> Mapping {
    annotate(
        "Foo",
        Fields::new().field("Name", Op::var("name")),
        Fields::new().field(KEY_TOKEN, Op::var("name")),
        &role_list(["Identifier"]),
    )
    .unwrap()
}

#[test]
fn annotated_node_gets_token_and_role() {
    let stages = pipeline(vec![foo_rule()]);
    let out = run_pipeline(&stages, &node(json!({"ast_type": "Foo", "Name": "x"}))).unwrap();
    assert_eq!(
        out,
        node(json!({"@type": "Foo", "@token": "x", "@role": ["Identifier"]}))
    );
}

#[test]
fn missing_required_field_leaves_node_alone() {
    let stages = pipeline(vec![foo_rule()]);
    let out = run_pipeline(&stages, &node(json!({"ast_type": "Foo"}))).unwrap();
    assert_eq!(out, node(json!({"@type": "Foo"})));
}

#[test]
fn roles_added_twice_appear_once() {
    let again = annotate("Foo", Fields::new(), Fields::new(), &role_list(["Identifier"])).unwrap();
    let stages = pipeline(vec![foo_rule(), again]);
    let out = run_pipeline(&stages, &node(json!({"ast_type": "Foo", "Name": "x"}))).unwrap();
    assert_eq!(out.roles(), vec!["Identifier"]);
}

#[test]
fn dedup_preserves_first_occurrence_everywhere() {
    let input = node(json!({
        "@role": ["B", "A", "B"],
        "children": [
            {"@role": ["C", "C", "A", "C"]},
            {"@role": ["D"]}
        ]
    }));
    let out = RolesDedup.transform(&input).unwrap();
    assert_eq!(
        out,
        node(json!({
            "@role": ["B", "A"],
            "children": [
                {"@role": ["C", "A"]},
                {"@role": ["D"]}
            ]
        }))
    );
}

#[test]
fn value_leaves_are_untouched() {
    let stages = pipeline(vec![foo_rule()]);
    let input = node(json!([1, 2.5, "Foo", null, true]));
    assert_eq!(run_pipeline(&stages, &input).unwrap(), input);
}

#[test]
fn short_mapping_fails_and_keeps_input() {
    let input = node(json!({"@type": "Foo"}));
    let before = input.clone();
    let m = Mapping::new("short", vec![Step::new("only", Op::Any)]);
    let err = m.run(&input).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::FewSteps { steps: 1 }));
    assert_eq!(input, before);
}

#[test]
fn first_error_aborts_the_pipeline() {
    // the rule forgets the Name field: strict objects refuse to drop it
    let strict = Mapping::map(
        "strict",
        Op::typed_obj("Foo", Fields::new()),
        Op::typed_obj("Bar", Fields::new()),
    );
    let stages = pipeline(vec![strict]);
    let input = node(json!({"ast_type": "Foo", "Name": "x"}));
    let err = run_pipeline(&stages, &input).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnusedField { key } if key == "Name"));
    assert_eq!(
        err.to_string(),
        r#"stage 1 (strict): mapping "strict": check: field was not used: Name"#
    );
}

#[test]
fn nested_nodes_are_annotated_bottom_up() {
    let stages = pipeline(vec![foo_rule()]);
    let input = node(json!({
        "ast_type": "Block",
        "items": [
            {"ast_type": "Foo", "Name": "a"},
            {"ast_type": "Foo", "Name": "b"}
        ]
    }));
    let out = run_pipeline(&stages, &input).unwrap();
    let items = out.get("items").and_then(Node::as_list).unwrap();
    let tokens: Vec<_> = items.iter().filter_map(Node::token).collect();
    assert_eq!(tokens, vec!["a", "b"]);
    assert_eq!(out.ast_type(), Some("Block"));
    assert_eq!(out.get(KEY_TYPE), Some(&Node::from("Block")));
}

#[test]
fn rule_for_another_type_never_fails() {
    let repeated = annotate(
        "Foo",
        Fields::new().field("l", Op::var("x")).field("r", Op::var("x")),
        Fields::new().field("l", Op::var("x")),
        &role_list(["Identifier"]),
    )
    .unwrap();
    let nested = annotate(
        "Foo",
        Fields::new().field("body", Op::obj(Fields::new().field("a", Op::var("a")))),
        Fields::new().field("body", Op::obj(Fields::new().field("a", Op::var("a")))),
        &role_list(["Block"]),
    )
    .unwrap();
    let stages = pipeline(vec![repeated, nested]);

    let input = node(json!({"ast_type": "Bar", "l": 1, "r": 2}));
    let out = run_pipeline(&stages, &input).unwrap();
    assert_eq!(out, node(json!({"@type": "Bar", "l": 1, "r": 2})));

    let input = node(json!({"ast_type": "Bar", "body": {"a": 1, "b": 2}}));
    let out = run_pipeline(&stages, &input).unwrap();
    assert_eq!(out, node(json!({"@type": "Bar", "body": {"a": 1, "b": 2}})));
}
