//! Parsed Protobuf schema with its resolved dependencies

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};
use std::sync::OnceLock;

use protobuf::descriptor::FileDescriptorProto;

use crate::error::{CompatError, Result};
use crate::schema::SchemaReference;

const ROOT_FILE: &str = "schema.proto";

/// A `.proto` schema plus the descriptors of every file it imports
#[derive(Debug)]
pub struct ProtobufSchema {
    file: FileDescriptorProto,
    references: Vec<SchemaReference>,
    /// Reference name -> raw text, as supplied by the registry
    resolved_references: BTreeMap<String, String>,
    /// Import path -> typechecked descriptor, for every file the root reaches
    dependencies: BTreeMap<String, FileDescriptorProto>,
    version: Option<i32>,
    canonical: OnceLock<String>,
}

impl ProtobufSchema {
    /// Parse a schema without references
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with_references(text, Vec::new(), BTreeMap::new(), None)
    }

    /// Parse a schema together with the raw text of everything it references
    ///
    /// Every entry of `references` must have a body in `resolved_references`.
    /// Bodies are keyed by the path the schema imports them under.
    pub fn parse_with_references(
        text: &str,
        references: Vec<SchemaReference>,
        resolved_references: BTreeMap<String, String>,
        version: Option<i32>,
    ) -> Result<Self> {
        for reference in &references {
            if !resolved_references.contains_key(&reference.name) {
                return Err(CompatError::MissingReference {
                    name: reference.name.clone(),
                    subject: reference.subject.clone(),
                    version: reference.version,
                });
            }
        }

        let (file, dependencies) = typecheck(text, &resolved_references)?;

        Ok(Self {
            file,
            references,
            resolved_references,
            dependencies,
            version,
            canonical: OnceLock::new(),
        })
    }

    /// Descriptor of the root file
    pub fn file(&self) -> &FileDescriptorProto {
        &self.file
    }

    /// Descriptors of imported files keyed by import path
    pub fn dependencies(&self) -> &BTreeMap<String, FileDescriptorProto> {
        &self.dependencies
    }

    pub fn references(&self) -> &[SchemaReference] {
        &self.references
    }

    pub fn resolved_references(&self) -> &BTreeMap<String, String> {
        &self.resolved_references
    }

    pub fn version(&self) -> Option<i32> {
        self.version
    }

    /// Name of the first top-level message, or of the first enum when the
    /// file declares no messages
    pub fn name(&self) -> Option<&str> {
        self.file
            .message_type
            .first()
            .map(|m| m.name())
            .or_else(|| self.file.enum_type.first().map(|e| e.name()))
    }

    /// Text-format rendering of the root descriptor, computed on first use
    pub fn canonical_string(&self) -> &str {
        self.canonical
            .get_or_init(|| protobuf::text_format::print_to_string(&self.file))
    }
}

fn parse_error(message: impl Into<String>) -> CompatError {
    CompatError::Parse {
        format: "PROTOBUF".to_string(),
        message: message.into(),
    }
}

/// Reference names become files under the import root, so they must stay
/// inside it
fn check_import_path(name: &str) -> Result<()> {
    let path = Path::new(name);
    let inside = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if inside {
        Ok(())
    } else {
        Err(parse_error(format!("reference name '{}' is not a relative import path", name)))
    }
}

/// Lay the root text and every reference body out as an import tree and run
/// the pure-Rust parser and typechecker over it
fn typecheck(
    text: &str,
    resolved_references: &BTreeMap<String, String>,
) -> Result<(FileDescriptorProto, BTreeMap<String, FileDescriptorProto>)> {
    let dir = tempfile::tempdir()?;

    for (name, body) in resolved_references {
        check_import_path(name)?;
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, body)?;
    }

    let mut root = ROOT_FILE.to_string();
    while resolved_references.contains_key(&root) {
        root.insert(0, '_');
    }
    let root_path = dir.path().join(&root);
    fs::write(&root_path, text)?;

    let parsed = protobuf_parse::Parser::new()
        .pure()
        .include(dir.path())
        .input(&root_path)
        .parse_and_typecheck()
        .map_err(|e| {
            let prefix = format!("{}/", dir.path().display());
            parse_error(format!("{:#}", e).replace(&prefix, ""))
        })?;

    let mut file = None;
    let mut dependencies = BTreeMap::new();
    for descriptor in parsed.file_descriptors {
        if descriptor.name() == root {
            file = Some(descriptor);
        } else {
            dependencies.insert(descriptor.name().to_string(), descriptor);
        }
    }
    let file = file.ok_or_else(|| parse_error("parser returned no descriptor for the schema"))?;
    Ok((file, dependencies))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMON: &str = "syntax = \"proto3\"; package c; message Doc { string id = 1; }";

    #[test]
    fn test_missing_reference_body_is_rejected() {
        let references = vec![SchemaReference::new("common.proto", "common", 1)];
        let err = ProtobufSchema::parse_with_references(
            "syntax = \"proto3\"; message A { int32 a = 1; }",
            references,
            BTreeMap::new(),
            Some(2),
        )
        .unwrap_err();
        assert!(matches!(err, CompatError::MissingReference { .. }));
    }

    #[test]
    fn test_canonical_string_ignores_formatting() {
        let a = ProtobufSchema::parse("syntax = \"proto3\";\nmessage A {\n  int32 a = 1; // c\n}\n").unwrap();
        let b = ProtobufSchema::parse("syntax=\"proto3\"; message A{int32 a=1;}").unwrap();
        assert_eq!(a.canonical_string(), b.canonical_string());
        assert_eq!(a.name(), Some("A"));
    }

    #[test]
    fn test_imports_resolve_from_reference_bodies() {
        let mut bodies = BTreeMap::new();
        bodies.insert("shared/common.proto".to_string(), COMMON.to_string());
        let schema = ProtobufSchema::parse_with_references(
            "syntax = \"proto3\"; import \"shared/common.proto\"; message A { c.Doc doc = 1; }",
            vec![SchemaReference::new("shared/common.proto", "common", 1)],
            bodies,
            Some(1),
        )
        .unwrap();
        assert!(schema.dependencies().contains_key("shared/common.proto"));
        assert_eq!(schema.file().message_type[0].field[0].type_name(), ".c.Doc");
    }

    #[test]
    fn test_root_name_does_not_clash_with_a_reference() {
        let mut bodies = BTreeMap::new();
        bodies.insert("schema.proto".to_string(), COMMON.to_string());
        let schema = ProtobufSchema::parse_with_references(
            "syntax = \"proto3\"; import \"schema.proto\"; message A { c.Doc doc = 1; }",
            Vec::new(),
            bodies,
            None,
        )
        .unwrap();
        assert_eq!(schema.name(), Some("A"));
        assert_eq!(schema.dependencies().len(), 1);
    }

    #[test]
    fn test_syntax_errors_and_missing_imports_fail_to_parse() {
        let err = ProtobufSchema::parse("syntax = \"proto3\"; message A { int32 a = ; }").unwrap_err();
        assert!(matches!(err, CompatError::Parse { .. }));

        let err = ProtobufSchema::parse("syntax = \"proto3\"; import \"gone.proto\"; message A {}")
            .unwrap_err();
        assert!(matches!(err, CompatError::Parse { ref message, .. } if message.contains("gone.proto")));
    }

    #[test]
    fn test_reference_names_must_stay_inside_the_import_root() {
        let mut bodies = BTreeMap::new();
        bodies.insert("../escape.proto".to_string(), COMMON.to_string());
        let err = ProtobufSchema::parse_with_references("syntax = \"proto3\";", Vec::new(), bodies, None)
            .unwrap_err();
        assert!(matches!(err, CompatError::Parse { .. }));
    }
}
