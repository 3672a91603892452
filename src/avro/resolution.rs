//! Avro reader/writer schema resolution
//!
//! Decides whether data written with one schema can be read with another,
//! following the resolution rules of the Avro specification:
//! - primitives match exactly, except for the promotions int -> long, float,
//!   double; long -> float, double; float -> double; string <-> bytes
//! - records, enums and fixed match by unqualified name
//! - reader record fields missing from the writer need a default
//! - writer enum symbols must exist in the reader unless it declares a default
//! - fixed sizes must be equal
//! - arrays and maps resolve their items and values
//! - every writer union branch must be readable; a non-union writer must
//!   match at least one reader branch
//! - logical types resolve as their underlying type

use std::collections::{HashMap, HashSet};
use std::fmt;

use apache_avro::schema::{EnumSchema, FixedSchema, RecordSchema};
use apache_avro::Schema;

use super::schema::{AvroSchema, Names};
use crate::diagnostics::Diagnostics;
use crate::schema::ParsedSchema;

const SOURCE: &str = "avro.resolution";

/// One reason the reader cannot read the writer's data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incompatibility {
    /// Where it was found, e.g. `field 'address'.field 'city'`
    pub path: String,
    pub reason: String,
}

impl fmt::Display for Incompatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "at {}: {}", self.path, self.reason)
        }
    }
}

/// Internal fault while walking the schemas, as opposed to an incompatibility
#[derive(Debug)]
struct Fault(String);

/// Base type of a logical type
fn logical_base(schema: &Schema) -> Option<Schema> {
    match schema {
        Schema::Decimal(decimal) => Some((*decimal.inner).clone()),
        Schema::Uuid => Some(Schema::String),
        Schema::Date | Schema::TimeMillis => Some(Schema::Int),
        Schema::TimeMicros
        | Schema::TimestampMillis
        | Schema::TimestampMicros
        | Schema::LocalTimestampMillis
        | Schema::LocalTimestampMicros => Some(Schema::Long),
        _ => None,
    }
}

fn type_name(schema: &Schema) -> String {
    match schema {
        Schema::Null => "null".to_string(),
        Schema::Boolean => "boolean".to_string(),
        Schema::Int => "int".to_string(),
        Schema::Long => "long".to_string(),
        Schema::Float => "float".to_string(),
        Schema::Double => "double".to_string(),
        Schema::Bytes => "bytes".to_string(),
        Schema::String => "string".to_string(),
        Schema::Array(_) => "array".to_string(),
        Schema::Map(_) => "map".to_string(),
        Schema::Union(_) => "union".to_string(),
        Schema::Record(r) => format!("record {}", r.name.fullname(None)),
        Schema::Enum(e) => format!("enum {}", e.name.fullname(None)),
        Schema::Fixed(f) => format!("fixed {}", f.name.fullname(None)),
        Schema::Ref { name } => name.fullname(None),
        other => format!("{:?}", other),
    }
}

fn child(path: &str, segment: String) -> String {
    if path.is_empty() {
        segment
    } else {
        format!("{}.{}", path, segment)
    }
}

struct Resolver<'a> {
    writer_names: &'a Names,
    reader_names: &'a Names,
    /// Named pairs already being resolved; a repeat is assumed readable
    in_progress: HashSet<(String, String)>,
}

impl<'a> Resolver<'a> {
    fn check(
        &mut self,
        writer: &Schema,
        reader: &Schema,
        path: &str,
    ) -> Result<Vec<Incompatibility>, Fault> {
        let writer = self
            .writer_names
            .resolve(writer)
            .ok_or_else(|| Fault(format!("unknown writer type {}", type_name(writer))))?;
        let reader = self
            .reader_names
            .resolve(reader)
            .ok_or_else(|| Fault(format!("unknown reader type {}", type_name(reader))))?;
        let (writer_base, reader_base) = (logical_base(writer), logical_base(reader));
        let writer = writer_base.as_ref().unwrap_or(writer);
        let reader = reader_base.as_ref().unwrap_or(reader);

        if let Schema::Union(union) = writer {
            let mut found = Vec::new();
            for (index, variant) in union.variants().iter().enumerate() {
                if !self.check(variant, reader, path)?.is_empty() {
                    found.push(Incompatibility {
                        path: path.to_string(),
                        reason: format!(
                            "writer union branch {} ({}) is not readable",
                            index,
                            type_name(variant)
                        ),
                    });
                }
            }
            return Ok(found);
        }

        if let Schema::Union(union) = reader {
            for variant in union.variants() {
                if self.check(writer, variant, path)?.is_empty() {
                    return Ok(Vec::new());
                }
            }
            return Ok(vec![Incompatibility {
                path: path.to_string(),
                reason: format!("no reader union branch can read writer {}", type_name(writer)),
            }]);
        }

        let compatible = Ok(Vec::new());
        match (writer, reader) {
            (Schema::Null, Schema::Null)
            | (Schema::Boolean, Schema::Boolean)
            | (Schema::Int, Schema::Int)
            | (Schema::Long, Schema::Long)
            | (Schema::Float, Schema::Float)
            | (Schema::Double, Schema::Double)
            | (Schema::Bytes, Schema::Bytes)
            | (Schema::String, Schema::String) => compatible,

            (Schema::Int, Schema::Long | Schema::Float | Schema::Double)
            | (Schema::Long, Schema::Float | Schema::Double)
            | (Schema::Float, Schema::Double)
            | (Schema::String, Schema::Bytes)
            | (Schema::Bytes, Schema::String) => compatible,

            (Schema::Array(w), Schema::Array(r)) => self.check(w, r, &child(path, "items".to_string())),
            (Schema::Map(w), Schema::Map(r)) => self.check(w, r, &child(path, "values".to_string())),

            (Schema::Record(w), Schema::Record(r)) => self.records(w, r, path),
            (Schema::Enum(w), Schema::Enum(r)) => Ok(enums(w, r, path)),
            (Schema::Fixed(w), Schema::Fixed(r)) => Ok(fixed(w, r, path)),

            _ => Ok(vec![Incompatibility {
                path: path.to_string(),
                reason: format!(
                    "type mismatch: writer has '{}', reader expects '{}'",
                    type_name(writer),
                    type_name(reader)
                ),
            }]),
        }
    }

    fn records(
        &mut self,
        writer: &RecordSchema,
        reader: &RecordSchema,
        path: &str,
    ) -> Result<Vec<Incompatibility>, Fault> {
        if writer.name.name != reader.name.name {
            return Ok(vec![name_mismatch(&writer.name.name, &reader.name.name, path)]);
        }
        let key = (writer.name.fullname(None), reader.name.fullname(None));
        if !self.in_progress.insert(key.clone()) {
            return Ok(Vec::new());
        }

        let writer_fields: HashMap<&str, &Schema> =
            writer.fields.iter().map(|f| (f.name.as_str(), &f.schema)).collect();
        let mut found = Vec::new();
        for field in &reader.fields {
            let field_path = child(path, format!("field '{}'", field.name));
            match writer_fields.get(field.name.as_str()) {
                Some(writer_schema) => found.extend(self.check(writer_schema, &field.schema, &field_path)?),
                None if field.default.is_none() => found.push(Incompatibility {
                    path: field_path,
                    reason: format!(
                        "reader has field '{}' not present in writer schema and no default value",
                        field.name
                    ),
                }),
                None => {}
            }
        }

        self.in_progress.remove(&key);
        Ok(found)
    }
}

fn name_mismatch(writer: &str, reader: &str, path: &str) -> Incompatibility {
    Incompatibility {
        path: path.to_string(),
        reason: format!("name mismatch: writer has '{}', reader expects '{}'", writer, reader),
    }
}

fn enums(writer: &EnumSchema, reader: &EnumSchema, path: &str) -> Vec<Incompatibility> {
    if writer.name.name != reader.name.name {
        return vec![name_mismatch(&writer.name.name, &reader.name.name, path)];
    }
    if reader.default.is_some() {
        return Vec::new();
    }
    let symbols: HashSet<&str> = reader.symbols.iter().map(String::as_str).collect();
    writer
        .symbols
        .iter()
        .filter(|s| !symbols.contains(s.as_str()))
        .map(|s| Incompatibility {
            path: path.to_string(),
            reason: format!("enum symbol '{}' in writer not found in reader and no default", s),
        })
        .collect()
}

fn fixed(writer: &FixedSchema, reader: &FixedSchema, path: &str) -> Vec<Incompatibility> {
    if writer.name.name != reader.name.name {
        return vec![name_mismatch(&writer.name.name, &reader.name.name, path)];
    }
    if writer.size != reader.size {
        return vec![Incompatibility {
            path: path.to_string(),
            reason: format!(
                "fixed size mismatch: writer has {} bytes, reader expects {} bytes",
                writer.size, reader.size
            ),
        }];
    }
    Vec::new()
}

/// Reasons `reader` cannot read data written with `writer`; empty when it can
pub fn incompatibilities(
    reader: &AvroSchema,
    writer: &AvroSchema,
    diagnostics: &dyn Diagnostics,
) -> Vec<Incompatibility> {
    let mut resolver = Resolver {
        writer_names: writer.names(),
        reader_names: reader.names(),
        in_progress: HashSet::new(),
    };
    match resolver.check(writer.schema(), reader.schema(), "") {
        Ok(found) => found,
        Err(Fault(message)) => {
            diagnostics.error(SOURCE, format!("Unexpected error during compatibility check: {}", message));
            vec![Incompatibility {
                path: String::new(),
                reason: format!("unexpected error during compatibility check: {}", message),
            }]
        }
    }
}

fn avro_pair<'s>(candidate: &'s ParsedSchema, previous: &'s ParsedSchema) -> Option<(&'s AvroSchema, &'s AvroSchema)> {
    match (candidate, previous) {
        (ParsedSchema::Avro(c), ParsedSchema::Avro(p)) => Some((c, p)),
        _ => None,
    }
}

/// The candidate can read everything written with `previous`
pub fn is_backward_compatible(
    candidate: &ParsedSchema,
    previous: &ParsedSchema,
    diagnostics: &dyn Diagnostics,
) -> bool {
    match avro_pair(candidate, previous) {
        Some((candidate, previous)) => incompatibilities(candidate, previous, diagnostics).is_empty(),
        None => {
            diagnostics.info(
                SOURCE,
                format!("schema format changed from {} to {}", previous.format(), candidate.format()),
            );
            false
        }
    }
}

/// `previous` can read everything written with the candidate
pub fn is_forward_compatible(
    candidate: &ParsedSchema,
    previous: &ParsedSchema,
    diagnostics: &dyn Diagnostics,
) -> bool {
    is_backward_compatible(previous, candidate, diagnostics)
}

pub fn is_fully_compatible(
    candidate: &ParsedSchema,
    previous: &ParsedSchema,
    diagnostics: &dyn Diagnostics,
) -> bool {
    is_backward_compatible(candidate, previous, diagnostics)
        && is_forward_compatible(candidate, previous, diagnostics)
}
