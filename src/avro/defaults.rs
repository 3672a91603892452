//! Record field default validation
//!
//! A default must be a JSON value of the field's type; for unions it must
//! match the first branch. Enabled through `avro.validate_defaults`.

use apache_avro::Schema;
use serde_json::Value;

use super::schema::{AvroSchema, Names};

fn matches_type(value: &Value, schema: &Schema, names: &Names, depth: usize) -> bool {
    if depth > 64 {
        return true;
    }
    let Some(schema) = names.resolve(schema) else {
        return false;
    };
    match schema {
        Schema::Null => value.is_null(),
        Schema::Boolean => value.is_boolean(),
        Schema::Int | Schema::Date | Schema::TimeMillis => {
            value.as_i64().map_or(false, |v| i32::try_from(v).is_ok())
        }
        Schema::Long
        | Schema::TimeMicros
        | Schema::TimestampMillis
        | Schema::TimestampMicros
        | Schema::LocalTimestampMillis
        | Schema::LocalTimestampMicros => value.is_i64(),
        Schema::Float | Schema::Double => value.is_number(),
        Schema::String | Schema::Bytes | Schema::Uuid | Schema::Fixed(_) | Schema::Decimal(_) => {
            value.is_string()
        }
        Schema::Enum(e) => value.as_str().map_or(false, |s| e.symbols.iter().any(|sym| sym == s)),
        Schema::Array(items) => value
            .as_array()
            .map_or(false, |a| a.iter().all(|v| matches_type(v, items, names, depth + 1))),
        Schema::Map(values) => value
            .as_object()
            .map_or(false, |m| m.values().all(|v| matches_type(v, values, names, depth + 1))),
        Schema::Union(union) => union
            .variants()
            .first()
            .map_or(false, |first| matches_type(value, first, names, depth + 1)),
        Schema::Record(record) => value.as_object().map_or(false, |object| {
            record.fields.iter().all(|field| match object.get(&field.name) {
                Some(v) => matches_type(v, &field.schema, names, depth + 1),
                None => field.default.is_some(),
            })
        }),
        _ => true,
    }
}

fn collect(schema: &Schema, names: &Names, path: &str, out: &mut Vec<String>, depth: usize) {
    if depth > 64 {
        return;
    }
    match schema {
        Schema::Record(record) => {
            for field in &record.fields {
                let at = if path.is_empty() {
                    field.name.clone()
                } else {
                    format!("{}.{}", path, field.name)
                };
                if let Some(default) = &field.default {
                    if !matches_type(default, &field.schema, names, 0) {
                        out.push(format!("Default value {} of field {} does not match its type", default, at));
                    }
                }
                collect(&field.schema, names, &at, out, depth + 1);
            }
        }
        Schema::Array(items) => collect(items, names, path, out, depth + 1),
        Schema::Map(values) => collect(values, names, path, out, depth + 1),
        Schema::Union(union) => {
            for variant in union.variants() {
                collect(variant, names, path, out, depth + 1);
            }
        }
        _ => {}
    }
}

/// Field defaults in `schema` that do not match their declared type
pub fn default_violations(schema: &AvroSchema) -> Vec<String> {
    let mut out = Vec::new();
    collect(schema.schema(), schema.names(), "", &mut out, 0);
    out
}
