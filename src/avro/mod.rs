//! Avro support: parsing, reader/writer resolution and the add-only policy

pub mod add_only;
pub mod defaults;
pub mod resolution;
pub mod schema;

pub use add_only::is_add_only_compatible;
pub use defaults::default_violations;
pub use resolution::{
    incompatibilities, is_backward_compatible, is_forward_compatible, is_fully_compatible,
    Incompatibility,
};
pub use schema::{AvroSchema, Names};
