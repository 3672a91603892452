//! Add-only checks over a schema that imports a shared `common.proto`

use std::collections::BTreeMap;

use registry_compat::diagnostics::Severity;
use registry_compat::{
    AddOnlySchemaChecker, CollectingDiagnostics, CompatError, ParsedSchema, SchemaFormat,
    SchemaReference,
};

const COMMON: &str = include_str!("fixtures/common.proto");
const COMMON_V2: &str = include_str!("fixtures/common_v2.proto");
const SAMPLE: &str = include_str!("fixtures/d2d_nonlocal_sample.proto");

fn with_common(text: &str, common: &str, version: i32) -> ParsedSchema {
    let references = vec![SchemaReference::new("common.proto", "common", 1)];
    let mut bodies = BTreeMap::new();
    bodies.insert("common.proto".to_string(), common.to_string());
    ParsedSchema::parse(SchemaFormat::Protobuf, text, references, bodies, Some(version)).unwrap()
}

fn add_only(previous: &str, current: &str) -> Vec<String> {
    AddOnlySchemaChecker::new()
        .check_compatibility(
            &with_common(previous, COMMON, 1),
            &with_common(current, COMMON, 2),
            &CollectingDiagnostics::new(),
        )
        .unwrap()
}

#[test]
fn test_sample_is_sequential() {
    let violations = AddOnlySchemaChecker::new()
        .sequential_schema_in_order_check(&with_common(SAMPLE, COMMON, 1), &CollectingDiagnostics::new())
        .unwrap();
    assert!(violations.is_empty(), "{:?}", violations);
}

#[test]
fn test_identical_versions_are_accepted() {
    assert!(add_only(SAMPLE, SAMPLE).is_empty());
}

#[test]
fn test_appended_scalars_are_accepted() {
    assert!(add_only(SAMPLE, include_str!("fixtures/add_scalar.proto")).is_empty());
}

#[test]
fn test_appended_maps_are_accepted() {
    assert!(add_only(SAMPLE, include_str!("fixtures/add_map.proto")).is_empty());
}

#[test]
fn test_appended_message_fields_are_accepted() {
    assert!(add_only(SAMPLE, include_str!("fixtures/add_msg.proto")).is_empty());
}

#[test]
fn test_appended_mixed_fields_are_accepted() {
    assert!(add_only(SAMPLE, include_str!("fixtures/add_mixed.proto")).is_empty());
}

#[test]
fn test_insert_in_middle_is_rejected() {
    let violations = add_only(SAMPLE, include_str!("fixtures/insert_in_middle.proto"));
    assert!(!violations.is_empty());
    assert!(violations.iter().all(|v| v.starts_with("Found incompatible change: ")));
    assert!(violations.iter().any(|v| v.contains("#/D2dNonlocalSample/8")));
}

#[test]
fn test_non_sequential_tags_are_rejected() {
    let violations = add_only(SAMPLE, include_str!("fixtures/add_non_sequential.proto"));
    assert_eq!(violations.len(), 6, "{:?}", violations);
    assert_eq!(
        violations[0],
        "Schema is not in sequential increasing order, field: added_external_msg (tag 20, expected 17) \
         in message: com.newsbreak.schema.D2dNonlocalSample"
    );
    assert!(violations[5].contains("field: added_poi_map (tag 100, expected 22)"));
}

#[test]
fn test_additions_to_a_referenced_schema_are_accepted() {
    let previous = with_common(SAMPLE, COMMON, 1);
    let current = with_common(SAMPLE, COMMON_V2, 2);
    let violations = AddOnlySchemaChecker::new()
        .check_compatibility(&previous, &current, &CollectingDiagnostics::new())
        .unwrap();
    assert!(violations.is_empty(), "{:?}", violations);
}

#[test]
fn test_gap_behind_a_map_value_is_found() {
    let schema = with_common(include_str!("fixtures/deep_map_gap.proto"), COMMON, 2);
    let diagnostics = CollectingDiagnostics::new();
    let violations = AddOnlySchemaChecker::new()
        .sequential_schema_in_order_check(&schema, &diagnostics)
        .unwrap();
    assert_eq!(
        violations,
        vec!["Schema is not in sequential increasing order, field: source (tag 3, expected 2) \
              in message: com.newsbreak.schema.ScoreDetail"
            .to_string()]
    );
    assert_eq!(diagnostics.at_least(Severity::Warn).len(), 1);

    let violations = add_only(SAMPLE, include_str!("fixtures/deep_map_gap.proto"));
    assert_eq!(violations.len(), 1);
}

#[test]
fn test_second_top_level_message() {
    let schema = with_common(include_str!("fixtures/two_messages.proto"), COMMON, 2);

    let lenient = AddOnlySchemaChecker::new()
        .sequential_schema_in_order_check(&schema, &CollectingDiagnostics::new())
        .unwrap();
    assert!(lenient.is_empty());

    let strict = AddOnlySchemaChecker::new()
        .with_single_root_message(true)
        .sequential_schema_in_order_check(&schema, &CollectingDiagnostics::new())
        .unwrap();
    assert_eq!(strict, vec!["Schema must declare exactly one top-level message, found 2".to_string()]);
}

#[test]
fn test_repeated_checks_give_the_same_answer() {
    let previous = with_common(SAMPLE, COMMON, 1);
    let current = with_common(include_str!("fixtures/add_non_sequential.proto"), COMMON, 2);
    let checker = AddOnlySchemaChecker::new();
    let first = checker
        .check_compatibility(&previous, &current, &CollectingDiagnostics::new())
        .unwrap();
    let second = checker
        .check_compatibility(&previous, &current, &CollectingDiagnostics::new())
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_missing_reference_body_fails_to_parse() {
    let references = vec![SchemaReference::new("common.proto", "common", 1)];
    let err = ParsedSchema::parse(SchemaFormat::Protobuf, SAMPLE, references, BTreeMap::new(), Some(1))
        .unwrap_err();
    assert!(matches!(err, CompatError::MissingReference { .. }));
}

#[test]
fn test_unresolvable_import_fails_to_parse() {
    let err = ParsedSchema::parse(SchemaFormat::Protobuf, SAMPLE, Vec::new(), BTreeMap::new(), Some(1))
        .unwrap_err();
    assert!(
        matches!(err, CompatError::Parse { ref message, .. } if message.contains("common.proto")),
        "{}",
        err
    );
}
