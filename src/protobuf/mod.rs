//! Protobuf support: descriptors from `protobuf-parse`, type resolution, diff
//! and the add-only checker

pub mod add_only;
pub mod context;
pub mod diff;
pub mod schema;
pub mod types;

pub use add_only::{AddOnlySchemaChecker, ADD_ONLY_CHANGES};
pub use context::{TypeClass, TypeContext};
pub use diff::{compare, Difference, DifferenceType};
pub use schema::ProtobufSchema;

/// Differences an old reader tolerates
pub const BACKWARD_COMPATIBLE_CHANGES: &[DifferenceType] = &[
    DifferenceType::PackageChanged,
    DifferenceType::MessageAdded,
    DifferenceType::EnumAdded,
    DifferenceType::EnumRemoved,
    DifferenceType::EnumConstAdded,
    DifferenceType::EnumConstChanged,
    DifferenceType::EnumConstRemoved,
    DifferenceType::FieldAdded,
    DifferenceType::FieldRemoved,
    DifferenceType::FieldNameChanged,
    DifferenceType::FieldNumericLabelChanged,
    DifferenceType::FieldStringOrBytesLabelChanged,
    DifferenceType::OneofAdded,
    DifferenceType::OneofRemoved,
    DifferenceType::OneofFieldAdded,
];

/// Differences from `previous` to `candidate` that break backward
/// compatibility
pub fn incompatible_changes(candidate: &ProtobufSchema, previous: &ProtobufSchema) -> Vec<Difference> {
    compare(previous, candidate)
        .into_iter()
        .filter(|d| !BACKWARD_COMPATIBLE_CHANGES.contains(&d.difference_type))
        .collect()
}

pub fn is_backward_compatible(candidate: &ProtobufSchema, previous: &ProtobufSchema) -> bool {
    incompatible_changes(candidate, previous).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backward_allows_adds_and_renames_but_not_kind_changes() {
        let previous = ProtobufSchema::parse("syntax = \"proto3\"; message A { int32 a = 1; }").unwrap();
        let renamed = ProtobufSchema::parse("syntax = \"proto3\"; message A { int64 b = 1; string c = 2; }").unwrap();
        let retyped = ProtobufSchema::parse("syntax = \"proto3\"; message A { string a = 1; }").unwrap();
        assert!(is_backward_compatible(&renamed, &previous));
        assert!(!is_backward_compatible(&retyped, &previous));
    }
}
