//! Scalar field types and their wire groups

pub use protobuf::descriptor::field_descriptor_proto::{Label as FieldLabel, Type as FieldType};

/// Protobuf scalar value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

/// Groups of scalars that share a wire encoding and can be swapped without
/// breaking old readers (values may still be truncated)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireGroup {
    Varint,
    ZigZag,
    Fixed32,
    Fixed64,
    LengthDelimited,
    Float,
    Double,
}

impl ScalarType {
    /// Scalar behind a descriptor field type; `None` for messages, groups
    /// and enums
    pub fn from_type(field_type: FieldType) -> Option<Self> {
        Some(match field_type {
            FieldType::TYPE_DOUBLE => ScalarType::Double,
            FieldType::TYPE_FLOAT => ScalarType::Float,
            FieldType::TYPE_INT32 => ScalarType::Int32,
            FieldType::TYPE_INT64 => ScalarType::Int64,
            FieldType::TYPE_UINT32 => ScalarType::Uint32,
            FieldType::TYPE_UINT64 => ScalarType::Uint64,
            FieldType::TYPE_SINT32 => ScalarType::Sint32,
            FieldType::TYPE_SINT64 => ScalarType::Sint64,
            FieldType::TYPE_FIXED32 => ScalarType::Fixed32,
            FieldType::TYPE_FIXED64 => ScalarType::Fixed64,
            FieldType::TYPE_SFIXED32 => ScalarType::Sfixed32,
            FieldType::TYPE_SFIXED64 => ScalarType::Sfixed64,
            FieldType::TYPE_BOOL => ScalarType::Bool,
            FieldType::TYPE_STRING => ScalarType::String,
            FieldType::TYPE_BYTES => ScalarType::Bytes,
            FieldType::TYPE_MESSAGE | FieldType::TYPE_GROUP | FieldType::TYPE_ENUM => return None,
        })
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    pub fn wire_group(&self) -> WireGroup {
        match self {
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Bool => WireGroup::Varint,
            ScalarType::Sint32 | ScalarType::Sint64 => WireGroup::ZigZag,
            ScalarType::Fixed32 | ScalarType::Sfixed32 => WireGroup::Fixed32,
            ScalarType::Fixed64 | ScalarType::Sfixed64 => WireGroup::Fixed64,
            ScalarType::String | ScalarType::Bytes => WireGroup::LengthDelimited,
            ScalarType::Float => WireGroup::Float,
            ScalarType::Double => WireGroup::Double,
        }
    }
}

pub fn label_keyword(label: FieldLabel) -> &'static str {
    match label {
        FieldLabel::LABEL_OPTIONAL => "optional",
        FieldLabel::LABEL_REQUIRED => "required",
        FieldLabel::LABEL_REPEATED => "repeated",
    }
}
