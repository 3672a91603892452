//! Type resolution context
//!
//! Index of every message and enum visible to a schema (its own file plus all
//! imported descriptors), keyed by fully-qualified name without the leading
//! dot. Built fresh for each check; nothing here is cached between calls.

use std::collections::HashMap;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use protobuf::descriptor::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};

use super::schema::ProtobufSchema;
use super::types::FieldType;
use crate::error::{CompatError, Result};

/// Where a type was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOrigin<'a> {
    Local,
    /// Declared in the imported file with this path
    Dependency(&'a str),
}

#[derive(Debug, Clone, Copy)]
pub enum Definition<'a> {
    Message(&'a DescriptorProto),
    Enum(&'a EnumDescriptorProto),
}

#[derive(Debug, Clone)]
pub struct TypeInfo<'a> {
    pub full_name: String,
    pub definition: Definition<'a>,
    pub origin: TypeOrigin<'a>,
}

impl<'a> TypeInfo<'a> {
    pub fn as_message(&self) -> Option<&'a DescriptorProto> {
        match self.definition {
            Definition::Message(m) => Some(m),
            Definition::Enum(_) => None,
        }
    }

    pub fn as_enum(&self) -> Option<&'a EnumDescriptorProto> {
        match self.definition {
            Definition::Enum(e) => Some(e),
            Definition::Message(_) => None,
        }
    }

    /// Synthesized `XxxEntry` message behind a `map<K, V>` field
    pub fn is_map_entry(&self) -> bool {
        self.as_message().map_or(false, |m| m.options.map_entry())
    }
}

/// How the add-only sequence walk treats a field type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeClass<'t> {
    /// Scalar keyword or enum; the walk stops here
    Scalar,
    /// `map<K, V>`; only the value field is followed
    Map { value: &'t FieldDescriptorProto },
    /// Resolved message, by full name
    Message(String),
}

pub struct TypeContext<'a> {
    types: HashMap<String, TypeInfo<'a>>,
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

impl<'a> TypeContext<'a> {
    /// Index a schema and every dependency body it carries
    pub fn build(schema: &'a ProtobufSchema) -> Self {
        let mut context = Self { types: HashMap::new() };
        for (path, file) in schema.dependencies() {
            context.collect_file(file, TypeOrigin::Dependency(path.as_str()));
        }
        // local declarations win over same-named dependency types
        context.collect_file(schema.file(), TypeOrigin::Local);
        context
    }

    fn collect_file(&mut self, file: &'a FileDescriptorProto, origin: TypeOrigin<'a>) {
        let package = file.package();
        for message in &file.message_type {
            self.collect_message(message, package, origin);
        }
        for element in &file.enum_type {
            self.collect_enum(element, package, origin);
        }
    }

    fn collect_message(&mut self, message: &'a DescriptorProto, prefix: &str, origin: TypeOrigin<'a>) {
        let full_name = qualify(prefix, message.name());
        for nested in &message.nested_type {
            self.collect_message(nested, &full_name, origin);
        }
        for element in &message.enum_type {
            self.collect_enum(element, &full_name, origin);
        }
        self.types.insert(
            full_name.clone(),
            TypeInfo { full_name, definition: Definition::Message(message), origin },
        );
    }

    fn collect_enum(&mut self, element: &'a EnumDescriptorProto, prefix: &str, origin: TypeOrigin<'a>) {
        let full_name = qualify(prefix, element.name());
        self.types.insert(
            full_name.clone(),
            TypeInfo { full_name, definition: Definition::Enum(element), origin },
        );
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Exact lookup by full name (leading dot optional)
    pub fn get(&self, full_name: &str) -> Option<&TypeInfo<'a>> {
        self.types.get(full_name.strip_prefix('.').unwrap_or(full_name))
    }

    /// Resolve a type reference the way protoc does: a leading dot means
    /// fully-qualified, otherwise search from the innermost enclosing scope
    /// outwards. `scope` is the full name of the referencing message.
    pub fn lookup(&self, name: &str, scope: &str) -> Option<&TypeInfo<'a>> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self.types.get(absolute);
        }
        let parts: Vec<&str> = if scope.is_empty() { Vec::new() } else { scope.split('.').collect() };
        (0..=parts.len())
            .rev()
            .find_map(|i| self.types.get(&qualify(&parts[..i].join("."), name)))
    }

    /// Like [`lookup`](Self::lookup) but unresolvable names are an error
    pub fn resolve(&self, name: &str, scope: &str) -> Result<&TypeInfo<'a>> {
        self.lookup(name, scope).ok_or_else(|| CompatError::UnresolvedType {
            name: name.to_string(),
            scope: scope.to_string(),
            suggestion: self.suggest(name),
        })
    }

    /// Full name used when comparing two schemas: resolved if possible,
    /// otherwise the text as written without a leading dot
    pub fn full_name_or_text(&self, name: &str, scope: &str) -> String {
        match self.lookup(name, scope) {
            Some(info) => info.full_name.clone(),
            None => name.strip_prefix('.').unwrap_or(name).to_string(),
        }
    }

    /// Classify a field for the sequence walk; `scope` is the full name of
    /// the message declaring it
    pub fn classify(&self, field: &'a FieldDescriptorProto, scope: &str) -> Result<TypeClass<'a>> {
        match field.type_() {
            FieldType::TYPE_MESSAGE | FieldType::TYPE_GROUP => {
                let info = self.resolve(field.type_name(), scope)?;
                match info.definition {
                    Definition::Enum(_) => Ok(TypeClass::Scalar),
                    Definition::Message(entry) if info.is_map_entry() => Ok(entry
                        .field
                        .iter()
                        .find(|f| f.number() == 2)
                        .map_or(TypeClass::Scalar, |value| TypeClass::Map { value })),
                    Definition::Message(_) => Ok(TypeClass::Message(info.full_name.clone())),
                }
            }
            FieldType::TYPE_ENUM => {
                self.resolve(field.type_name(), scope)?;
                Ok(TypeClass::Scalar)
            }
            _ => Ok(TypeClass::Scalar),
        }
    }

    /// Closest known full name, for error messages
    fn suggest(&self, name: &str) -> Option<String> {
        let short = name.rsplit('.').next().unwrap_or(name);
        let matcher = SkimMatcherV2::default();
        self.types
            .keys()
            .filter_map(|candidate| {
                matcher.fuzzy_match(candidate, short).map(|score| (score, candidate))
            })
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
            .map(|(_, candidate)| candidate.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaReference;
    use std::collections::BTreeMap;

    const COMMON: &str = r#"
        syntax = "proto3";
        package com.example.common;
        message Doc { string id = 1; }
        enum Color { RED = 0; }
    "#;

    const MAIN: &str = r#"
        syntax = "proto3";
        package com.example.app;
        import "common.proto";
        message Outer {
          message Inner { int32 x = 1; }
          Inner inner = 1;
          .com.example.common.Doc doc = 2;
          com.example.common.Color color = 3;
          map<string, Inner> by_name = 4;
          int64 id = 5;
        }
    "#;

    fn schema() -> ProtobufSchema {
        let mut resolved = BTreeMap::new();
        resolved.insert("common.proto".to_string(), COMMON.to_string());
        ProtobufSchema::parse_with_references(
            MAIN,
            vec![SchemaReference::new("common.proto", "common", 1)],
            resolved,
            Some(1),
        )
        .unwrap()
    }

    fn field<'a>(ctx: &TypeContext<'a>, message: &str, name: &str) -> &'a FieldDescriptorProto {
        let message = ctx.get(message).unwrap().as_message().unwrap();
        message.field.iter().find(|f| f.name() == name).unwrap()
    }

    #[test]
    fn test_indexes_local_nested_and_dependency_types() {
        let schema = schema();
        let ctx = TypeContext::build(&schema);
        // Outer, Inner, the ByNameEntry map entry, Doc, Color
        assert_eq!(ctx.len(), 5);
        assert_eq!(ctx.get("com.example.app.Outer.Inner").unwrap().origin, TypeOrigin::Local);
        assert!(ctx.get("com.example.app.Outer.ByNameEntry").unwrap().is_map_entry());
        assert_eq!(
            ctx.get(".com.example.common.Doc").unwrap().origin,
            TypeOrigin::Dependency("common.proto")
        );
    }

    #[test]
    fn test_relative_names_resolve_from_innermost_scope() {
        let schema = schema();
        let ctx = TypeContext::build(&schema);
        let inner = ctx.resolve("Inner", "com.example.app.Outer").unwrap();
        assert_eq!(inner.full_name, "com.example.app.Outer.Inner");
        let color = ctx.resolve("common.Color", "com.example.app.Outer").unwrap();
        assert!(color.as_enum().is_some());
    }

    #[test]
    fn test_classification() {
        let schema = schema();
        let ctx = TypeContext::build(&schema);
        let scope = "com.example.app.Outer";
        assert_eq!(ctx.classify(field(&ctx, scope, "id"), scope).unwrap(), TypeClass::Scalar);
        assert_eq!(ctx.classify(field(&ctx, scope, "color"), scope).unwrap(), TypeClass::Scalar);
        assert_eq!(
            ctx.classify(field(&ctx, scope, "doc"), scope).unwrap(),
            TypeClass::Message("com.example.common.Doc".to_string())
        );
        match ctx.classify(field(&ctx, scope, "by_name"), scope).unwrap() {
            TypeClass::Map { value } => assert_eq!(value.type_name(), ".com.example.app.Outer.Inner"),
            other => panic!("expected a map, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_name_is_an_error() {
        let schema = schema();
        let ctx = TypeContext::build(&schema);
        let err = ctx.resolve("Missing", "com.example.app.Outer").unwrap_err();
        assert!(matches!(err, CompatError::UnresolvedType { ref name, .. } if name == "Missing"));
    }

    #[test]
    fn test_suggestion_for_a_misspelled_name() {
        let schema = schema();
        let ctx = TypeContext::build(&schema);
        let err = ctx.resolve("Iner", "com.example.app.Outer").unwrap_err();
        assert!(matches!(err, CompatError::UnresolvedType { suggestion: Some(_), .. }));
    }
}
