//! Protobuf schema diff
//!
//! Classified structural differences between two `.proto` schemas. Messages
//! and enums are matched by package-relative name, fields by tag, enum
//! constants by number and oneofs by name. Consumers filter the result by
//! [`DifferenceType`]; the order only groups entries by declaration.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use protobuf::descriptor::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use serde::{Deserialize, Serialize};

use super::context::{Definition, TypeContext, TypeOrigin};
use super::schema::ProtobufSchema;
use super::types::{label_keyword, FieldLabel, FieldType, ScalarType, WireGroup};

/// Kind of structural change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifferenceType {
    PackageChanged,
    SyntaxVersionChanged,
    MessageAdded,
    MessageRemoved,
    EnumAdded,
    EnumRemoved,
    EnumConstAdded,
    EnumConstRemoved,
    EnumConstChanged,
    FieldAdded,
    FieldRemoved,
    FieldNameChanged,
    FieldKindChanged,
    FieldScalarKindChanged,
    FieldNamedTypeChanged,
    FieldNumericLabelChanged,
    FieldStringOrBytesLabelChanged,
    FieldLabelChanged,
    RequiredFieldAdded,
    RequiredFieldRemoved,
    OneofAdded,
    OneofRemoved,
    OneofFieldAdded,
    OneofFieldRemoved,
    MultipleFieldsMovedToOneof,
    FieldMovedToExistingOneof,
}

impl DifferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifferenceType::PackageChanged => "PACKAGE_CHANGED",
            DifferenceType::SyntaxVersionChanged => "SYNTAX_VERSION_CHANGED",
            DifferenceType::MessageAdded => "MESSAGE_ADDED",
            DifferenceType::MessageRemoved => "MESSAGE_REMOVED",
            DifferenceType::EnumAdded => "ENUM_ADDED",
            DifferenceType::EnumRemoved => "ENUM_REMOVED",
            DifferenceType::EnumConstAdded => "ENUM_CONST_ADDED",
            DifferenceType::EnumConstRemoved => "ENUM_CONST_REMOVED",
            DifferenceType::EnumConstChanged => "ENUM_CONST_CHANGED",
            DifferenceType::FieldAdded => "FIELD_ADDED",
            DifferenceType::FieldRemoved => "FIELD_REMOVED",
            DifferenceType::FieldNameChanged => "FIELD_NAME_CHANGED",
            DifferenceType::FieldKindChanged => "FIELD_KIND_CHANGED",
            DifferenceType::FieldScalarKindChanged => "FIELD_SCALAR_KIND_CHANGED",
            DifferenceType::FieldNamedTypeChanged => "FIELD_NAMED_TYPE_CHANGED",
            DifferenceType::FieldNumericLabelChanged => "FIELD_NUMERIC_LABEL_CHANGED",
            DifferenceType::FieldStringOrBytesLabelChanged => "FIELD_STRING_OR_BYTES_LABEL_CHANGED",
            DifferenceType::FieldLabelChanged => "FIELD_LABEL_CHANGED",
            DifferenceType::RequiredFieldAdded => "REQUIRED_FIELD_ADDED",
            DifferenceType::RequiredFieldRemoved => "REQUIRED_FIELD_REMOVED",
            DifferenceType::OneofAdded => "ONEOF_ADDED",
            DifferenceType::OneofRemoved => "ONEOF_REMOVED",
            DifferenceType::OneofFieldAdded => "ONEOF_FIELD_ADDED",
            DifferenceType::OneofFieldRemoved => "ONEOF_FIELD_REMOVED",
            DifferenceType::MultipleFieldsMovedToOneof => "MULTIPLE_FIELDS_MOVED_TO_ONEOF",
            DifferenceType::FieldMovedToExistingOneof => "FIELD_MOVED_TO_EXISTING_ONEOF",
        }
    }
}

impl fmt::Display for DifferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified change between two schemas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    #[serde(rename = "type")]
    pub difference_type: DifferenceType,
    /// `#/Message`, `#/Message/<tag>` or `#/Enum/<number>`
    pub location: String,
    pub description: String,
}

impl Difference {
    fn new(difference_type: DifferenceType, location: String, description: String) -> Self {
        Self { difference_type, location, description }
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.difference_type, self.location, self.description)
    }
}

/// One side of the comparison
struct Side<'a> {
    ctx: TypeContext<'a>,
    package: &'a str,
}

impl<'a> Side<'a> {
    fn new(schema: &'a ProtobufSchema) -> Self {
        Self {
            ctx: TypeContext::build(schema),
            package: schema.file().package(),
        }
    }

    fn scope(&self, relative: &str) -> String {
        if self.package.is_empty() {
            relative.to_string()
        } else {
            format!("{}.{}", self.package, relative)
        }
    }

    /// Key and value fields when `field` is a `map<K, V>`
    fn map_fields(&self, field: &FieldDescriptorProto) -> Option<(&'a FieldDescriptorProto, &'a FieldDescriptorProto)> {
        if field.type_() != FieldType::TYPE_MESSAGE {
            return None;
        }
        let info = self.ctx.get(field.type_name())?;
        if !info.is_map_entry() {
            return None;
        }
        let entry = info.as_message()?;
        let key = entry.field.iter().find(|f| f.number() == 1)?;
        let value = entry.field.iter().find(|f| f.number() == 2)?;
        Some((key, value))
    }

    /// Resolved type name, with this file's package stripped from local types
    /// so that a package rename alone does not show up on every field
    fn comparable_name(&self, name: &str, scope: &str) -> (String, Option<bool>) {
        match self.ctx.lookup(name, scope) {
            Some(info) => {
                let is_enum = matches!(info.definition, Definition::Enum(_));
                let full = info.full_name.as_str();
                let relative = match info.origin {
                    TypeOrigin::Local if !self.package.is_empty() => full
                        .strip_prefix(self.package)
                        .and_then(|rest| rest.strip_prefix('.'))
                        .unwrap_or(full),
                    _ => full,
                };
                (relative.to_string(), Some(is_enum))
            }
            None => (self.ctx.full_name_or_text(name, scope), None),
        }
    }

    fn type_text(&self, field: &FieldDescriptorProto) -> String {
        if let Some(scalar) = ScalarType::from_type(field.type_()) {
            return scalar.keyword().to_string();
        }
        match self.map_fields(field) {
            Some((key, value)) => format!("map<{}, {}>", self.type_text(key), self.type_text(value)),
            None => field.type_name().trim_start_matches('.').to_string(),
        }
    }

    /// `repeated string tags = 3`
    fn describe(&self, field: &FieldDescriptorProto) -> String {
        let label = match field.label() {
            FieldLabel::LABEL_REPEATED if self.map_fields(field).is_some() => "",
            FieldLabel::LABEL_REPEATED | FieldLabel::LABEL_REQUIRED => label_keyword(field.label()),
            FieldLabel::LABEL_OPTIONAL if field.proto3_optional() => "optional",
            FieldLabel::LABEL_OPTIONAL => "",
        };
        let text = format!("{} {} = {}", self.type_text(field), field.name(), field.number());
        if label.is_empty() {
            text
        } else {
            format!("{} {}", label, text)
        }
    }
}

/// Syntax as written; files without a `syntax` statement are proto2
fn syntax_of(file: &FileDescriptorProto) -> &str {
    match file.syntax() {
        "" => "proto2",
        syntax => syntax,
    }
}

/// Index of the real (non-synthetic) oneof holding `field`
fn oneof_index(field: &FieldDescriptorProto) -> Option<i32> {
    if field.has_oneof_index() && !field.proto3_optional() {
        Some(field.oneof_index())
    } else {
        None
    }
}

fn field_by_number(message: &DescriptorProto, number: i32) -> Option<&FieldDescriptorProto> {
    message.field.iter().find(|f| f.number() == number)
}

/// Real oneofs declared on `message`, by name
fn oneof_names(message: &DescriptorProto) -> Vec<&str> {
    let mut names: Vec<&str> = message
        .field
        .iter()
        .filter_map(oneof_index)
        .filter_map(|i| message.oneof_decl.get(i as usize).map(|o| o.name()))
        .collect();
    names.dedup();
    names
}

fn oneof_name(message: &DescriptorProto, field: &FieldDescriptorProto) -> Option<String> {
    oneof_index(field)
        .and_then(|i| message.oneof_decl.get(i as usize))
        .map(|o| o.name().to_string())
}

struct Differ<'a> {
    previous: Side<'a>,
    current: Side<'a>,
    differences: Vec<Difference>,
}

/// Compute the differences going from `previous` to `current`
pub fn compare(previous: &ProtobufSchema, current: &ProtobufSchema) -> Vec<Difference> {
    let mut differ = Differ {
        previous: Side::new(previous),
        current: Side::new(current),
        differences: Vec::new(),
    };

    let (prev_file, cur_file) = (previous.file(), current.file());
    if syntax_of(prev_file) != syntax_of(cur_file) {
        differ.push(
            DifferenceType::SyntaxVersionChanged,
            "#/".to_string(),
            format!("syntax changed from {} to {}", syntax_of(prev_file), syntax_of(cur_file)),
        );
    }
    if prev_file.package() != cur_file.package() {
        differ.push(
            DifferenceType::PackageChanged,
            "#/".to_string(),
            format!("package changed from '{}' to '{}'", prev_file.package(), cur_file.package()),
        );
    }

    differ.compare_types(
        (&prev_file.message_type[..], &prev_file.enum_type[..]),
        (&cur_file.message_type[..], &cur_file.enum_type[..]),
        "",
    );
    differ.differences
}

fn relative_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

/// Messages as declared; map entries are compared through their fields
fn declared_messages(list: &[DescriptorProto]) -> Vec<&DescriptorProto> {
    list.iter().filter(|m| !m.options.map_entry()).collect()
}

type Declared<'d> = (&'d [DescriptorProto], &'d [EnumDescriptorProto]);

impl<'a> Differ<'a> {
    fn push(&mut self, difference_type: DifferenceType, location: String, description: String) {
        self.differences.push(Difference::new(difference_type, location, description));
    }

    fn compare_types(&mut self, previous: Declared<'_>, current: Declared<'_>, prefix: &str) {
        let (prev_messages, cur_messages) = (declared_messages(previous.0), declared_messages(current.0));
        let cur_by_name: HashMap<&str, &DescriptorProto> =
            cur_messages.iter().map(|m| (m.name(), *m)).collect();
        let cur_enums: HashMap<&str, &EnumDescriptorProto> =
            current.1.iter().map(|e| (e.name(), e)).collect();

        for prev in &prev_messages {
            let name = relative_name(prefix, prev.name());
            match cur_by_name.get(prev.name()) {
                Some(cur) => self.compare_message(prev, cur, &name),
                None => self.push(
                    DifferenceType::MessageRemoved,
                    format!("#/{}", name),
                    format!("message {} removed", name),
                ),
            }
        }
        for prev in previous.1 {
            let name = relative_name(prefix, prev.name());
            match cur_enums.get(prev.name()) {
                Some(cur) => self.compare_enum(prev, cur, &name),
                None => self.push(
                    DifferenceType::EnumRemoved,
                    format!("#/{}", name),
                    format!("enum {} removed", name),
                ),
            }
        }

        let prev_names: HashSet<&str> = prev_messages.iter().map(|m| m.name()).collect();
        for cur in &cur_messages {
            if !prev_names.contains(cur.name()) {
                let name = relative_name(prefix, cur.name());
                self.push(DifferenceType::MessageAdded, format!("#/{}", name), format!("message {} added", name));
            }
        }
        let prev_enums: HashSet<&str> = previous.1.iter().map(|e| e.name()).collect();
        for cur in current.1 {
            if !prev_enums.contains(cur.name()) {
                let name = relative_name(prefix, cur.name());
                self.push(DifferenceType::EnumAdded, format!("#/{}", name), format!("enum {} added", name));
            }
        }
    }

    fn compare_enum(&mut self, previous: &EnumDescriptorProto, current: &EnumDescriptorProto, name: &str) {
        let by_number = |element: &EnumDescriptorProto, number: i32| {
            element.value.iter().find(|v| v.number() == number).map(|v| v.name().to_string())
        };
        for constant in &previous.value {
            let location = format!("#/{}/{}", name, constant.number());
            match by_number(current, constant.number()) {
                None => self.push(
                    DifferenceType::EnumConstRemoved,
                    location,
                    format!("enum constant {} = {} removed", constant.name(), constant.number()),
                ),
                Some(cur) if cur != constant.name() => self.push(
                    DifferenceType::EnumConstChanged,
                    location,
                    format!("enum constant {} renamed to {}", constant.name(), cur),
                ),
                Some(_) => {}
            }
        }
        for constant in &current.value {
            if by_number(previous, constant.number()).is_none() {
                self.push(
                    DifferenceType::EnumConstAdded,
                    format!("#/{}/{}", name, constant.number()),
                    format!("enum constant {} = {} added", constant.name(), constant.number()),
                );
            }
        }
    }

    fn compare_message(&mut self, previous: &DescriptorProto, current: &DescriptorProto, name: &str) {
        let prev_scope = self.previous.scope(name);
        let cur_scope = self.current.scope(name);

        for field in &previous.field {
            let location = format!("#/{}/{}", name, field.number());
            match field_by_number(current, field.number()) {
                Some(cur) => self.compare_field(field, cur, &location, &prev_scope, &cur_scope),
                None => {
                    let difference_type = if oneof_index(field).is_some() {
                        DifferenceType::OneofFieldRemoved
                    } else if field.label() == FieldLabel::LABEL_REQUIRED {
                        DifferenceType::RequiredFieldRemoved
                    } else {
                        DifferenceType::FieldRemoved
                    };
                    let description = format!("field {} removed", self.previous.describe(field));
                    self.push(difference_type, location, description);
                }
            }
        }

        for field in &current.field {
            if field_by_number(previous, field.number()).is_some() {
                continue;
            }
            let difference_type = if oneof_index(field).is_some() {
                DifferenceType::OneofFieldAdded
            } else if field.label() == FieldLabel::LABEL_REQUIRED {
                DifferenceType::RequiredFieldAdded
            } else {
                DifferenceType::FieldAdded
            };
            let description = format!("field {} added", self.current.describe(field));
            self.push(difference_type, format!("#/{}/{}", name, field.number()), description);
        }

        self.compare_oneofs(previous, current, name);
        self.compare_types(
            (&previous.nested_type[..], &previous.enum_type[..]),
            (&current.nested_type[..], &current.enum_type[..]),
            name,
        );
    }

    fn compare_oneofs(&mut self, previous: &DescriptorProto, current: &DescriptorProto, name: &str) {
        let prev_names = oneof_names(previous);
        let cur_names = oneof_names(current);

        for oneof in &prev_names {
            if !cur_names.contains(oneof) {
                self.push(
                    DifferenceType::OneofRemoved,
                    format!("#/{}/{}", name, oneof),
                    format!("oneof {} removed", oneof),
                );
            }
        }
        for oneof in &cur_names {
            if !prev_names.contains(oneof) {
                self.push(
                    DifferenceType::OneofAdded,
                    format!("#/{}/{}", name, oneof),
                    format!("oneof {} added", oneof),
                );
            }
        }

        // fields that were plain members before and sit in a oneof now
        let mut moved: BTreeMap<String, Vec<i32>> = BTreeMap::new();
        for field in &current.field {
            let Some(oneof) = oneof_name(current, field) else { continue };
            let was_plain = field_by_number(previous, field.number())
                .map_or(false, |prev| oneof_index(prev).is_none());
            if was_plain {
                moved.entry(oneof).or_default().push(field.number());
            }
        }

        for (oneof, tags) in moved {
            if prev_names.contains(&oneof.as_str()) {
                for tag in tags {
                    self.push(
                        DifferenceType::FieldMovedToExistingOneof,
                        format!("#/{}/{}", name, tag),
                        format!("field {} moved into existing oneof {}", tag, oneof),
                    );
                }
            } else if tags.len() > 1 {
                self.push(
                    DifferenceType::MultipleFieldsMovedToOneof,
                    format!("#/{}/{}", name, oneof),
                    format!("fields {:?} moved into new oneof {}", tags, oneof),
                );
            }
        }
    }

    fn compare_field(
        &mut self,
        previous: &FieldDescriptorProto,
        current: &FieldDescriptorProto,
        location: &str,
        prev_scope: &str,
        cur_scope: &str,
    ) {
        if previous.name() != current.name() {
            self.push(
                DifferenceType::FieldNameChanged,
                location.to_string(),
                format!("field {} renamed to {}", previous.name(), current.name()),
            );
        }

        if previous.label() != current.label() {
            self.push(
                DifferenceType::FieldLabelChanged,
                location.to_string(),
                format!(
                    "field {} label changed from '{}' to '{}'",
                    current.name(),
                    label_keyword(previous.label()),
                    label_keyword(current.label())
                ),
            );
        }

        if let Some((difference_type, detail)) = self.compare_field_types(previous, current, prev_scope, cur_scope) {
            self.push(
                difference_type,
                location.to_string(),
                format!("field {}: {}", current.name(), detail),
            );
        }
    }

    fn compare_field_types(
        &self,
        previous: &FieldDescriptorProto,
        current: &FieldDescriptorProto,
        prev_scope: &str,
        cur_scope: &str,
    ) -> Option<(DifferenceType, String)> {
        let scalars = (ScalarType::from_type(previous.type_()), ScalarType::from_type(current.type_()));
        let maps = (self.previous.map_fields(previous), self.current.map_fields(current));
        match (scalars, maps) {
            ((Some(p), Some(c)), _) => compare_scalars(p, c),
            (_, (Some((pk, pv)), Some((ck, cv)))) => {
                if let Some((t, detail)) = self.compare_field_types(pk, ck, prev_scope, cur_scope) {
                    return Some((t, format!("map key {}", detail)));
                }
                self.compare_field_types(pv, cv, prev_scope, cur_scope)
                    .map(|(t, detail)| (t, format!("map value {}", detail)))
            }
            ((None, None), (None, None)) => {
                let (p_name, p_enum) = self.previous.comparable_name(previous.type_name(), prev_scope);
                let (c_name, c_enum) = self.current.comparable_name(current.type_name(), cur_scope);
                match (p_enum, c_enum) {
                    (Some(pe), Some(ce)) if pe != ce => Some((
                        DifferenceType::FieldKindChanged,
                        format!("type {} changed kind to {}", p_name, c_name),
                    )),
                    _ if p_name != c_name => Some((
                        DifferenceType::FieldNamedTypeChanged,
                        format!("type changed from {} to {}", p_name, c_name),
                    )),
                    _ => None,
                }
            }
            _ => Some((
                DifferenceType::FieldKindChanged,
                format!(
                    "type changed from {} to {}",
                    self.previous.type_text(previous),
                    self.current.type_text(current)
                ),
            )),
        }
    }
}

fn compare_scalars(previous: ScalarType, current: ScalarType) -> Option<(DifferenceType, String)> {
    if previous == current {
        return None;
    }
    let detail = format!("type changed from {} to {}", previous.keyword(), current.keyword());
    let difference_type = if previous.wire_group() != current.wire_group() {
        DifferenceType::FieldScalarKindChanged
    } else if previous.wire_group() == WireGroup::LengthDelimited {
        DifferenceType::FieldStringOrBytesLabelChanged
    } else {
        DifferenceType::FieldNumericLabelChanged
    };
    Some((difference_type, detail))
}
