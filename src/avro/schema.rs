//! Parsed Avro schema with its named-type index

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use apache_avro::Schema;

use crate::error::{CompatError, Result};
use crate::schema::SchemaReference;

/// Every named type (record, enum, fixed) reachable from a schema and its
/// references, keyed by full name
#[derive(Debug, Default, Clone)]
pub struct Names {
    by_fullname: HashMap<String, Schema>,
}

impl Names {
    fn collect(&mut self, schema: &Schema) {
        match schema {
            Schema::Record(record) => {
                self.by_fullname.insert(record.name.fullname(None), schema.clone());
                for field in &record.fields {
                    self.collect(&field.schema);
                }
            }
            Schema::Enum(e) => {
                self.by_fullname.insert(e.name.fullname(None), schema.clone());
            }
            Schema::Fixed(f) => {
                self.by_fullname.insert(f.name.fullname(None), schema.clone());
            }
            Schema::Array(items) => self.collect(items),
            Schema::Map(values) => self.collect(values),
            Schema::Union(union) => {
                for variant in union.variants() {
                    self.collect(variant);
                }
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.by_fullname.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fullname.is_empty()
    }

    pub fn get(&self, fullname: &str) -> Option<&Schema> {
        self.by_fullname.get(fullname)
    }

    /// Follow a `Schema::Ref` to its definition; other schemas come back as is.
    /// `None` means the reference names a type this index has never seen.
    pub fn resolve<'s>(&'s self, schema: &'s Schema) -> Option<&'s Schema> {
        match schema {
            Schema::Ref { name } => self.by_fullname.get(&name.fullname(None)),
            other => Some(other),
        }
    }
}

/// An Avro schema plus the schemas it references
#[derive(Debug)]
pub struct AvroSchema {
    schema: Schema,
    names: Names,
    references: Vec<SchemaReference>,
    resolved_references: BTreeMap<String, String>,
    version: Option<i32>,
    canonical: OnceLock<String>,
}

impl AvroSchema {
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with_references(text, Vec::new(), BTreeMap::new(), None)
    }

    /// Parse `text` after the bodies of everything it references, so that
    /// named types defined in a reference resolve inside the root schema
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

        let mut inputs: Vec<&str> = resolved_references.values().map(String::as_str).collect();
        inputs.push(text);
        let mut parsed = Schema::parse_list(&inputs)?;

        let mut names = Names::default();
        for schema in &parsed {
            names.collect(schema);
        }
        let schema = parsed.pop().ok_or_else(|| CompatError::Parse {
            format: "AVRO".to_string(),
            message: "no schema produced".to_string(),
        })?;

        Ok(Self {
            schema,
            names,
            references,
            resolved_references,
            version,
            canonical: OnceLock::new(),
        })
    }

    /// Root schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn names(&self) -> &Names {
        &self.names
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

    /// Full name of the root when it is a named type
    pub fn name(&self) -> Option<String> {
        match &self.schema {
            Schema::Record(r) => Some(r.name.fullname(None)),
            Schema::Enum(e) => Some(e.name.fullname(None)),
            Schema::Fixed(f) => Some(f.name.fullname(None)),
            _ => None,
        }
    }

    /// Parsing Canonical Form of the root, computed on first use
    pub fn canonical_string(&self) -> &str {
        self.canonical.get_or_init(|| self.schema.canonical_form())
    }
}
