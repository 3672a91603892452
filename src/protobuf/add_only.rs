//! Add-only policy for Protobuf schemas
//!
//! Offline tables built from these schemas can only append columns, so a new
//! version may only add messages, enums, enum constants and fields, and every
//! message reachable from the root must number its fields `1, 2, 3, ...` in
//! declaration order. Members of a `oneof` hold no column position of their
//! own and are not followed.

use protobuf::descriptor::{DescriptorProto, FieldDescriptorProto};

use super::context::{TypeClass, TypeContext};
use super::diff::{compare, DifferenceType};
use super::schema::ProtobufSchema;
use crate::diagnostics::Diagnostics;
use crate::error::{CompatError, Result};
use crate::schema::ParsedSchema;

const SOURCE: &str = "protobuf.add_only";

/// Differences the add-only policy accepts
pub const ADD_ONLY_CHANGES: &[DifferenceType] = &[
    DifferenceType::MessageAdded,
    DifferenceType::EnumAdded,
    DifferenceType::EnumConstAdded,
    DifferenceType::FieldAdded,
];

#[derive(Debug, Clone, Default)]
pub struct AddOnlySchemaChecker {
    require_single_root_message: bool,
}

impl AddOnlySchemaChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report schemas that declare zero or several top-level messages
    pub fn with_single_root_message(mut self, required: bool) -> Self {
        self.require_single_root_message = required;
        self
    }

    /// Violations of the add-only policy going from `previous` to `current`;
    /// an empty list means the change is accepted
    pub fn check_compatibility(
        &self,
        previous: &ParsedSchema,
        current: &ParsedSchema,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<String>> {
        let (previous, current) = match (previous, current) {
            (ParsedSchema::Protobuf(p), ParsedSchema::Protobuf(c)) => (p, c),
            _ => {
                return Ok(vec![format!(
                    "Schema format changed from {} to {}",
                    previous.format(),
                    current.format()
                )])
            }
        };

        diagnostics.info(SOURCE, "starting basic field change checks".to_string());
        let incompatible: Vec<String> = compare(previous, current)
            .into_iter()
            .filter(|d| !ADD_ONLY_CHANGES.contains(&d.difference_type))
            .map(|d| {
                let message = format!("Found incompatible change: {}", d);
                diagnostics.warn(SOURCE, message.clone());
                message
            })
            .collect();
        if !incompatible.is_empty() {
            return Ok(incompatible);
        }

        diagnostics.info(SOURCE, "basic checks passed, checking field order".to_string());
        let mut violations = self.check_sequence(current, diagnostics)?;
        violations.extend(self.check_sequence(previous, diagnostics)?);
        Ok(violations)
    }

    /// Walk the root message and everything reachable from it, reporting each
    /// field whose tag differs from its 1-based declaration position
    pub fn sequential_schema_in_order_check(
        &self,
        schema: &ParsedSchema,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<String>> {
        match schema {
            ParsedSchema::Protobuf(proto) => self.check_sequence(proto, diagnostics),
            other => Ok(vec![format!(
                "Sequence check requires a PROTOBUF schema, got {}",
                other.format()
            )]),
        }
    }

    fn check_sequence(&self, schema: &ProtobufSchema, diagnostics: &dyn Diagnostics) -> Result<Vec<String>> {
        let file = schema.file();
        let mut violations = Vec::new();

        if self.require_single_root_message {
            let count = file.message_type.len();
            if count != 1 {
                let message = format!(
                    "Schema must declare exactly one top-level message, found {}",
                    count
                );
                diagnostics.warn(SOURCE, message.clone());
                violations.push(message);
                if count == 0 {
                    return Ok(violations);
                }
            }
        }

        let root = file.message_type.first().ok_or_else(|| match file.enum_type.first() {
            Some(element) => CompatError::NoRootMessage(format!("first type '{}' is not a message", element.name())),
            None => CompatError::NoRootMessage("schema declares no types".to_string()),
        })?;
        let root_name = match file.package() {
            "" => root.name().to_string(),
            package => format!("{}.{}", package, root.name()),
        };

        let ctx = TypeContext::build(schema);
        diagnostics.debug(SOURCE, format!("sequence check from {} over {} types", root_name, ctx.len()));

        let mut walk = SequenceWalk { ctx: &ctx, diagnostics, path: Vec::new(), violations };
        walk.message(&root_name)?;
        Ok(walk.violations)
    }
}

struct SequenceWalk<'c, 'a> {
    ctx: &'c TypeContext<'a>,
    diagnostics: &'c dyn Diagnostics,
    /// Messages on the current path, root first
    path: Vec<String>,
    violations: Vec<String>,
}

/// Fields that take a column position: everything outside a real oneof.
/// Synthetic oneofs of proto3 `optional` fields do not count as oneofs.
fn positional_fields(message: &DescriptorProto) -> impl Iterator<Item = &FieldDescriptorProto> {
    message
        .field
        .iter()
        .filter(|f| !f.has_oneof_index() || f.proto3_optional())
}

impl<'c, 'a> SequenceWalk<'c, 'a> {
    fn message(&mut self, full_name: &str) -> Result<()> {
        if self.path.iter().any(|p| p == full_name) {
            let mut path = self.path.clone();
            path.push(full_name.to_string());
            return Err(CompatError::CyclicType { path });
        }
        let ctx = self.ctx;
        let message = match ctx.get(full_name).and_then(|info| info.as_message()) {
            Some(message) => message,
            None => {
                return Err(CompatError::UnresolvedType {
                    name: full_name.to_string(),
                    scope: self.path.last().cloned().unwrap_or_default(),
                    suggestion: None,
                })
            }
        };

        self.path.push(full_name.to_string());
        for (index, field) in positional_fields(message).enumerate() {
            let expected = index as i32 + 1;
            if field.number() != expected {
                let violation = format!(
                    "Schema is not in sequential increasing order, field: {} (tag {}, expected {}) in message: {}",
                    field.name(),
                    field.number(),
                    expected,
                    full_name
                );
                self.diagnostics.warn(SOURCE, violation.clone());
                self.violations.push(violation);
            }
            self.field(field, full_name)?;
        }
        self.path.pop();
        Ok(())
    }

    fn field(&mut self, field: &'a FieldDescriptorProto, scope: &str) -> Result<()> {
        match self.ctx.classify(field, scope)? {
            TypeClass::Scalar => Ok(()),
            TypeClass::Message(name) => self.message(&name),
            TypeClass::Map { value } => self.field(value, scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;

    fn proto(text: &str) -> ParsedSchema {
        ParsedSchema::Protobuf(ProtobufSchema::parse(text).unwrap())
    }

    fn sequence(text: &str) -> Vec<String> {
        AddOnlySchemaChecker::new()
            .sequential_schema_in_order_check(&proto(text), &CollectingDiagnostics::new())
            .unwrap()
    }

    #[test]
    fn test_contiguous_tags_pass() {
        assert!(sequence("syntax = \"proto3\"; message A { int32 a = 1; string b = 2; bool c = 3; }").is_empty());
    }

    #[test]
    fn test_gap_is_reported_with_field_and_message() {
        let violations = sequence("syntax = \"proto3\"; message A { int32 a = 1; int32 b = 3; }");
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("field: b (tag 3, expected 2)"));
        assert!(violations[0].contains("in message: A"));
    }

    #[test]
    fn test_oneof_members_hold_no_position() {
        let text = "syntax = \"proto3\"; message A { int32 a = 1; oneof o { int32 b = 2; } int32 c = 3; }";
        assert_eq!(
            sequence(text),
            vec!["Schema is not in sequential increasing order, field: c (tag 3, expected 2) in message: A"]
        );
        let text = "syntax = \"proto3\"; message A { int32 a = 1; oneof o { string b = 5; } int32 c = 2; }";
        assert!(sequence(text).is_empty());
    }

    #[test]
    fn test_oneof_member_types_are_not_followed() {
        let text = r#"
            syntax = "proto3";
            message A { int32 a = 1; oneof o { Gap g = 2; } }
            message Gap { int32 x = 1; int32 y = 9; }
        "#;
        assert!(sequence(text).is_empty());
    }

    #[test]
    fn test_proto3_optional_fields_keep_their_position() {
        let text = "syntax = \"proto3\"; message A { int32 a = 1; optional int32 b = 2; int32 c = 3; }";
        assert!(sequence(text).is_empty());
    }

    #[test]
    fn test_map_values_are_followed_and_enums_stop() {
        let text = r#"
            syntax = "proto3";
            message Root { map<string, Leaf> leaves = 1; Kind kind = 2; }
            message Leaf { int32 a = 1; int32 b = 5; }
            enum Kind { A = 0; B = 7; }
        "#;
        let violations = sequence(text);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("in message: Leaf"));
    }

    #[test]
    fn test_cycle_is_an_error() {
        let schema = proto("syntax = \"proto3\"; message A { B b = 1; } message B { A a = 1; }");
        let err = AddOnlySchemaChecker::new()
            .sequential_schema_in_order_check(&schema, &CollectingDiagnostics::new())
            .unwrap_err();
        assert!(matches!(err, CompatError::CyclicType { ref path } if path.len() == 3));
    }

    #[test]
    fn test_enum_only_schema_has_no_root() {
        let schema = proto("syntax = \"proto3\"; enum Kind { A = 0; }");
        let err = AddOnlySchemaChecker::new()
            .sequential_schema_in_order_check(&schema, &CollectingDiagnostics::new())
            .unwrap_err();
        assert!(matches!(err, CompatError::NoRootMessage(ref m) if m.contains("Kind")));
    }

    #[test]
    fn test_disallowed_difference_stops_before_sequence_check() {
        let previous = proto("syntax = \"proto3\"; message A { int32 a = 1; int32 b = 3; }");
        let current = proto("syntax = \"proto3\"; message A { int32 a = 1; }");
        let sink = CollectingDiagnostics::new();
        let violations = AddOnlySchemaChecker::new()
            .check_compatibility(&previous, &current, &sink)
            .unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("Found incompatible change: FIELD_REMOVED"));
    }

    #[test]
    fn test_single_root_enforcement() {
        let text = "syntax = \"proto3\"; message A { int32 a = 1; } message B { int32 b = 1; }";
        let sink = CollectingDiagnostics::new();
        assert!(AddOnlySchemaChecker::new()
            .sequential_schema_in_order_check(&proto(text), &sink)
            .unwrap()
            .is_empty());
        let violations = AddOnlySchemaChecker::new()
            .with_single_root_message(true)
            .sequential_schema_in_order_check(&proto(text), &sink)
            .unwrap();
        assert_eq!(violations, vec!["Schema must declare exactly one top-level message, found 2"]);
    }

    #[test]
    fn test_format_mismatch_is_a_violation() {
        let avro = ParsedSchema::parse(
            crate::schema::SchemaFormat::Avro,
            r#"{"type": "record", "name": "A", "fields": []}"#,
            Vec::new(),
            Default::default(),
            None,
        )
        .unwrap();
        let violations = AddOnlySchemaChecker::new()
            .check_compatibility(&avro, &proto("syntax = \"proto3\"; message A {}"), &CollectingDiagnostics::new())
            .unwrap();
        assert_eq!(violations.len(), 1);
    }
}
