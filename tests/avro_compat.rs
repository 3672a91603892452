//! Avro resolution and add-only checks over record fixtures

use std::collections::BTreeMap;

use registry_compat::avro::{self, AvroSchema};
use registry_compat::{CollectingDiagnostics, ParsedSchema, SchemaFormat, SchemaReference};

const V1: &str = include_str!("fixtures/user_v1.avsc");
const V2_OPTIONAL: &str = include_str!("fixtures/user_v2_optional.avsc");
const V2_REQUIRED: &str = include_str!("fixtures/user_v2_required.avsc");
const V2_SWAPPED: &str = include_str!("fixtures/user_v2_swapped.avsc");

fn avro(text: &str) -> ParsedSchema {
    ParsedSchema::parse(SchemaFormat::Avro, text, Vec::new(), BTreeMap::new(), None).unwrap()
}

fn add_only(candidate: &str, previous: &str) -> Vec<String> {
    avro::is_add_only_compatible(&avro(candidate), &avro(previous), &CollectingDiagnostics::new())
}

fn backward(candidate: &str, previous: &str) -> bool {
    avro::is_backward_compatible(&avro(candidate), &avro(previous), &CollectingDiagnostics::new())
}

#[test]
fn test_appending_optional_fields() {
    assert!(add_only(V2_OPTIONAL, V1).is_empty());
    assert!(backward(V2_OPTIONAL, V1));
    assert!(avro::is_fully_compatible(&avro(V2_OPTIONAL), &avro(V1), &CollectingDiagnostics::new()));
}

#[test]
fn test_appending_required_field() {
    assert_eq!(
        add_only(V2_REQUIRED, V1),
        vec!["Added field email must be an optional union with null first".to_string()]
    );
    assert!(!backward(V2_REQUIRED, V1));
    assert!(avro::is_forward_compatible(&avro(V2_REQUIRED), &avro(V1), &CollectingDiagnostics::new()));
}

#[test]
fn test_swapping_fields() {
    let violations = add_only(V2_SWAPPED, V1);
    assert_eq!(violations.len(), 2, "{:?}", violations);
    assert!(violations[0].starts_with("Field name changed to required type"));
    // resolution matches fields by name, so order does not matter
    assert!(backward(V2_SWAPPED, V1));
}

#[test]
fn test_removing_fields_is_not_add_only() {
    let violations = add_only(V1, V2_OPTIONAL);
    assert_eq!(
        violations,
        vec!["Field count of com.example.users.User decreased from 4 to 3".to_string()]
    );
}

#[test]
fn test_incompatibilities_name_the_field() {
    let found = avro::incompatibilities(
        &AvroSchema::parse(V2_REQUIRED).unwrap(),
        &AvroSchema::parse(V1).unwrap(),
        &CollectingDiagnostics::new(),
    );
    assert_eq!(found.len(), 1);
    assert!(found[0].to_string().contains("email"), "{}", found[0]);
}

#[test]
fn test_named_type_from_reference() {
    let references = vec![SchemaReference::new("com.example.common.Address", "address", 1)];
    let mut bodies = BTreeMap::new();
    bodies.insert(
        "com.example.common.Address".to_string(),
        include_str!("fixtures/address.avsc").to_string(),
    );
    let order = ParsedSchema::parse(
        SchemaFormat::Avro,
        include_str!("fixtures/order_with_reference.avsc"),
        references,
        bodies,
        Some(1),
    )
    .unwrap();

    assert_eq!(order.name().as_deref(), Some("com.example.orders.Order"));
    assert_eq!(order.references().len(), 1);
    assert!(avro::is_backward_compatible(&order, &order, &CollectingDiagnostics::new()));
    assert!(avro::is_add_only_compatible(&order, &order, &CollectingDiagnostics::new()).is_empty());
}
