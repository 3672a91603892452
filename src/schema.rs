//! Schema value model
//!
//! [`ParsedSchema`] is what the registry hands to the checkers: a parsed
//! schema tree, the references it declares and the raw bodies of those
//! references. It is immutable once built.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::avro::AvroSchema;
use crate::checksum::Checksum;
use crate::error::{CompatError, Result};
use crate::protobuf::ProtobufSchema;

/// Schema language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaFormat {
    Avro,
    Protobuf,
}

impl SchemaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaFormat::Avro => "AVRO",
            SchemaFormat::Protobuf => "PROTOBUF",
        }
    }

    /// Guess the format from a file extension
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "avsc" | "avro" | "json" => Some(SchemaFormat::Avro),
            "proto" => Some(SchemaFormat::Protobuf),
            _ => None,
        }
    }
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaFormat {
    type Err = CompatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "AVRO" => Ok(SchemaFormat::Avro),
            "PROTOBUF" | "PROTO" => Ok(SchemaFormat::Protobuf),
            _ => Err(CompatError::InvalidFormat(s.to_string())),
        }
    }
}

/// Pointer from one schema to another registered schema version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaReference {
    /// Name the referencing schema uses (an import path for Protobuf, a
    /// type name for Avro)
    pub name: String,
    pub subject: String,
    pub version: i32,
}

impl SchemaReference {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, version: i32) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            version,
        }
    }
}

/// A parsed schema of either supported format
#[derive(Debug)]
pub enum ParsedSchema {
    Avro(AvroSchema),
    Protobuf(ProtobufSchema),
}

impl ParsedSchema {
    /// Parse `text` as `format`, together with the raw bodies of the schemas
    /// it references (keyed by reference name)
    pub fn parse(
        format: SchemaFormat,
        text: &str,
        references: Vec<SchemaReference>,
        resolved_references: BTreeMap<String, String>,
        version: Option<i32>,
    ) -> Result<Self> {
        Ok(match format {
            SchemaFormat::Avro => ParsedSchema::Avro(AvroSchema::parse_with_references(
                text,
                references,
                resolved_references,
                version,
            )?),
            SchemaFormat::Protobuf => ParsedSchema::Protobuf(ProtobufSchema::parse_with_references(
                text,
                references,
                resolved_references,
                version,
            )?),
        })
    }

    pub fn format(&self) -> SchemaFormat {
        match self {
            ParsedSchema::Avro(_) => SchemaFormat::Avro,
            ParsedSchema::Protobuf(_) => SchemaFormat::Protobuf,
        }
    }

    /// Name of the root type, if it has one
    pub fn name(&self) -> Option<String> {
        match self {
            ParsedSchema::Avro(schema) => schema.name(),
            ParsedSchema::Protobuf(schema) => schema.name().map(str::to_string),
        }
    }

    /// Normalized text; two schemas that differ only in formatting share it
    pub fn canonical_string(&self) -> &str {
        match self {
            ParsedSchema::Avro(schema) => schema.canonical_string(),
            ParsedSchema::Protobuf(schema) => schema.canonical_string(),
        }
    }

    /// SHA-256 of the canonical string
    pub fn fingerprint(&self) -> Checksum {
        Checksum::of_canonical(self.canonical_string())
    }

    pub fn version(&self) -> Option<i32> {
        match self {
            ParsedSchema::Avro(schema) => schema.version(),
            ParsedSchema::Protobuf(schema) => schema.version(),
        }
    }

    pub fn references(&self) -> &[SchemaReference] {
        match self {
            ParsedSchema::Avro(schema) => schema.references(),
            ParsedSchema::Protobuf(schema) => schema.references(),
        }
    }

    pub fn resolved_references(&self) -> &BTreeMap<String, String> {
        match self {
            ParsedSchema::Avro(schema) => schema.resolved_references(),
            ParsedSchema::Protobuf(schema) => schema.resolved_references(),
        }
    }
}

impl fmt::Display for ParsedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("avro".parse::<SchemaFormat>().unwrap(), SchemaFormat::Avro);
        assert_eq!("PROTOBUF".parse::<SchemaFormat>().unwrap(), SchemaFormat::Protobuf);
        assert!("JSON".parse::<SchemaFormat>().is_err());
        assert_eq!(serde_json::to_string(&SchemaFormat::Protobuf).unwrap(), "\"PROTOBUF\"");
    }

    #[test]
    fn test_fingerprint_ignores_whitespace() {
        let a = ParsedSchema::parse(
            SchemaFormat::Protobuf,
            "syntax = \"proto3\";\n\nmessage A {\n  int32 a = 1;\n}\n",
            Vec::new(),
            BTreeMap::new(),
            Some(1),
        )
        .unwrap();
        let b = ParsedSchema::parse(
            SchemaFormat::Protobuf,
            "syntax = \"proto3\"; message A { int32 a = 1; }",
            Vec::new(),
            BTreeMap::new(),
            Some(2),
        )
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.format(), SchemaFormat::Protobuf);
        assert_eq!(b.version(), Some(2));
    }

    #[test]
    fn test_avro_value_model() {
        let schema = ParsedSchema::parse(
            SchemaFormat::Avro,
            r#"{"type":"record","name":"A","namespace":"x","fields":[]}"#,
            Vec::new(),
            BTreeMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(schema.name().as_deref(), Some("x.A"));
        assert!(schema.references().is_empty());
    }
}
