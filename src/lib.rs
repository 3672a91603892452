//! Registry Compatibility Core
//!
//! Decides whether a newly proposed schema may replace the versions already
//! registered under a subject, for Avro and Protobuf schemas.
//!
//! ## Features
//!
//! - **Avro resolution**: reader/writer backward, forward and full checks
//! - **Protobuf diff**: classified structural differences between two `.proto` files
//! - **Add-only policy**: strict end-append evolution for offline table generators,
//!   including the sequential field tag check for Protobuf
//! - **References**: schemas that import other registered schemas, resolved per check
//! - **Fingerprints**: SHA256 over canonical schema text
//!
//! ## Usage
//!
//! ```text
//! let previous = ParsedSchema::parse(SchemaFormat::Protobuf, &v1, refs.clone(), bodies.clone(), Some(1))?;
//! let candidate = ParsedSchema::parse(SchemaFormat::Protobuf, &v2, refs, bodies, None)?;
//! let result = CompatibilityChecker::new().check(CompatibilityLevel::AddOnly, &candidate, &[previous])?;
//! ```

pub mod avro;
pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod protobuf;
pub mod references;
pub mod schema;

pub use checksum::Checksum;
pub use compatibility::{CompatibilityChecker, CompatibilityLevel, CompatibilityResult};
pub use config::CheckerConfig;
pub use diagnostics::{CollectingDiagnostics, Diagnostics, TracingDiagnostics};
pub use error::{CompatError, Result};
pub use crate::protobuf::{AddOnlySchemaChecker, Difference, DifferenceType};
pub use references::{ReferenceGraph, SchemaKey};
pub use schema::{ParsedSchema, SchemaFormat, SchemaReference};
