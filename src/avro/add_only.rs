//! Add-only policy for Avro records
//!
//! A new version keeps every existing top-level field at its position.
//! Changed fields must be nested records or arrays that are themselves
//! add-only, or optional unions (`["null", T]` with a `null` default) over
//! such a type. Appended fields must be optional unions.

use std::collections::HashSet;

use apache_avro::schema::{RecordField, RecordSchema};
use apache_avro::Schema;
use serde_json::Value;

use super::schema::{AvroSchema, Names};
use crate::diagnostics::Diagnostics;
use crate::schema::ParsedSchema;

const SOURCE: &str = "avro.add_only";

/// Violations of the add-only policy for `candidate` replacing `previous`;
/// empty means compatible
pub fn is_add_only_compatible(
    candidate: &ParsedSchema,
    previous: &ParsedSchema,
    diagnostics: &dyn Diagnostics,
) -> Vec<String> {
    match (candidate, previous) {
        (ParsedSchema::Avro(candidate), ParsedSchema::Avro(previous)) => {
            add_only_violations(candidate, previous, diagnostics)
        }
        _ => vec![format!(
            "Schema format changed from {} to {}",
            previous.format(),
            candidate.format()
        )],
    }
}

pub fn add_only_violations(
    candidate: &AvroSchema,
    previous: &AvroSchema,
    diagnostics: &dyn Diagnostics,
) -> Vec<String> {
    let mut walk = AddOnlyWalk {
        new_names: candidate.names(),
        old_names: previous.names(),
        diagnostics,
        visited: HashSet::new(),
        violations: Vec::new(),
    };
    if let Err(fault) = walk.records(candidate.schema(), previous.schema(), "") {
        diagnostics.error(SOURCE, format!("Unexpected error during add-only check: {}", fault));
        return vec![format!("Unexpected error during add-only check: {}", fault)];
    }
    walk.violations
}

fn is_null_default(field: &RecordField) -> bool {
    matches!(field.default, Some(Value::Null))
}

fn field_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

struct AddOnlyWalk<'a> {
    new_names: &'a Names,
    old_names: &'a Names,
    diagnostics: &'a dyn Diagnostics,
    /// Record pairs already compared, by full name
    visited: HashSet<(String, String)>,
    violations: Vec<String>,
}

impl<'a> AddOnlyWalk<'a> {
    fn violation(&mut self, message: String) {
        self.diagnostics.info(SOURCE, message.clone());
        self.violations.push(message);
    }

    fn resolve_new<'s>(&'s self, schema: &'s Schema) -> Result<&'s Schema, String> {
        self.new_names
            .resolve(schema)
            .ok_or_else(|| format!("unknown type {:?} in new schema", schema))
    }

    fn resolve_old<'s>(&'s self, schema: &'s Schema) -> Result<&'s Schema, String> {
        self.old_names
            .resolve(schema)
            .ok_or_else(|| format!("unknown type {:?} in previous schema", schema))
    }

    fn records(&mut self, new: &Schema, old: &Schema, path: &str) -> Result<(), String> {
        let pair = match (self.resolve_new(new)?, self.resolve_old(old)?) {
            (Schema::Record(n), Schema::Record(o)) => Some((n.clone(), o.clone())),
            _ => None,
        };
        let Some((new_record, old_record)) = pair else {
            let at = if path.is_empty() { "top level" } else { path };
            self.violation(format!("Schema at {} is not a record on both sides", at));
            return Ok(());
        };
        let key = (new_record.name.fullname(None), old_record.name.fullname(None));
        if !self.visited.insert(key) {
            return Ok(());
        }
        self.record_fields(&new_record, &old_record, path)
    }

    fn record_fields(&mut self, new: &RecordSchema, old: &RecordSchema, path: &str) -> Result<(), String> {
        if new.fields.len() < old.fields.len() {
            self.violation(format!(
                "Field count of {} decreased from {} to {}",
                new.name.fullname(None),
                old.fields.len(),
                new.fields.len()
            ));
            return Ok(());
        }

        for (old_field, new_field) in old.fields.iter().zip(&new.fields) {
            if old_field.name == new_field.name
                && old_field.default == new_field.default
                && old_field.schema == new_field.schema
            {
                continue;
            }
            let at = field_path(path, &new_field.name);
            self.diagnostics.debug(
                SOURCE,
                format!("field {} differs from previous field '{}'", at, old_field.name),
            );

            let new_schema = self.resolve_new(&new_field.schema)?.clone();
            match &new_schema {
                Schema::Record(_) | Schema::Array(_) | Schema::Map(_) => {
                    self.nested(&new_schema, &old_field.schema, &at)?
                }
                Schema::Union(union) => {
                    if !matches!(union.variants().first(), Some(Schema::Null)) {
                        self.violation(format!("Field {} must be an optional union with null first", at));
                        continue;
                    }
                    if !is_null_default(new_field) {
                        self.violation(format!("Field {} must default to null", at));
                        continue;
                    }
                    let Some(branch) = union.variants().get(1) else {
                        self.violation(format!("Field {} has no non-null union branch", at));
                        continue;
                    };
                    let old_schema = self.resolve_old(&old_field.schema)?.clone();
                    let old_branch = match &old_schema {
                        Schema::Union(old_union) => old_union.variants().get(1).cloned(),
                        _ => {
                            self.violation(format!(
                                "Field {} changed from a non-union type to an optional union",
                                at
                            ));
                            continue;
                        }
                    };
                    match old_branch {
                        Some(old_branch) => {
                            let branch = self.resolve_new(branch)?.clone();
                            self.nested(&branch, &old_branch, &at)?
                        }
                        None => self.violation(format!("Field {} changed from a single-branch union", at)),
                    }
                }
                other => self.violation(format!(
                    "Field {} changed to required type {}",
                    at,
                    other.canonical_form()
                )),
            }
        }

        for new_field in &new.fields[old.fields.len()..] {
            let at = field_path(path, &new_field.name);
            let optional = match self.resolve_new(&new_field.schema)? {
                Schema::Union(union) => matches!(union.variants().first(), Some(Schema::Null)),
                _ => false,
            };
            if !optional {
                self.violation(format!("Added field {} must be an optional union with null first", at));
            } else if !is_null_default(new_field) {
                self.violation(format!("Added field {} must default to null", at));
            }
        }
        Ok(())
    }

    /// Changed field whose new type is a record, array or map
    fn nested(&mut self, new: &Schema, old: &Schema, path: &str) -> Result<(), String> {
        match new {
            Schema::Record(_) => self.records(new, old, path),
            Schema::Array(new_items) => match self.resolve_old(old)?.clone() {
                Schema::Array(old_items) => self.records(new_items, &old_items, &format!("{}[]", path)),
                _ => {
                    self.violation(format!("Field {} changed to an array", path));
                    Ok(())
                }
            },
            Schema::Map(_) => {
                self.violation(format!("Field {} is a map; map changes are not add-only", path));
                Ok(())
            }
            other => {
                self.violation(format!(
                    "Field {} changed to non-nestable type {}",
                    path,
                    other.canonical_form()
                ));
                Ok(())
            }
        }
    }
}
