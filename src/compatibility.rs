//! Compatibility policies
//!
//! Maps a subject's declared [`CompatibilityLevel`] onto the format-specific
//! checks and runs them against one or all previous versions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::avro;
use crate::config::CheckerConfig;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::error::{CompatError, Result};
use crate::protobuf::{self, AddOnlySchemaChecker};
use crate::schema::ParsedSchema;

const SOURCE: &str = "compatibility";

/// Compatibility policy of a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    /// No checking
    None,
    /// New schema can read data written with the latest version
    #[default]
    Backward,
    /// Latest version can read data written with the new schema
    Forward,
    /// Both backward and forward against the latest version
    Full,
    BackwardTransitive,
    ForwardTransitive,
    FullTransitive,
    /// Fields may only be appended, see [`AddOnlySchemaChecker`]
    #[serde(rename = "ADDONLY")]
    AddOnly,
}

impl CompatibilityLevel {
    pub const ALL: [CompatibilityLevel; 8] = [
        CompatibilityLevel::None,
        CompatibilityLevel::Backward,
        CompatibilityLevel::Forward,
        CompatibilityLevel::Full,
        CompatibilityLevel::BackwardTransitive,
        CompatibilityLevel::ForwardTransitive,
        CompatibilityLevel::FullTransitive,
        CompatibilityLevel::AddOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityLevel::None => "NONE",
            CompatibilityLevel::Backward => "BACKWARD",
            CompatibilityLevel::Forward => "FORWARD",
            CompatibilityLevel::Full => "FULL",
            CompatibilityLevel::BackwardTransitive => "BACKWARD_TRANSITIVE",
            CompatibilityLevel::ForwardTransitive => "FORWARD_TRANSITIVE",
            CompatibilityLevel::FullTransitive => "FULL_TRANSITIVE",
            CompatibilityLevel::AddOnly => "ADDONLY",
        }
    }

    /// Checked against every previous version rather than just the latest
    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::FullTransitive
        )
    }

    fn checks_backward(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Backward
                | CompatibilityLevel::BackwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }

    fn checks_forward(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::Forward
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::Full
                | CompatibilityLevel::FullTransitive
        )
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompatibilityLevel {
    type Err = CompatError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        if wanted == "ADD_ONLY" {
            return Ok(CompatibilityLevel::AddOnly);
        }
        CompatibilityLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| CompatError::UnknownLevel(s.to_string()))
    }
}

/// Outcome of checking a candidate under a level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub level: CompatibilityLevel,
    pub is_compatible: bool,
    /// One entry per problem found; empty when compatible
    pub messages: Vec<String>,
    /// Registry versions the candidate was checked against
    pub checked_versions: Vec<i32>,
}

impl CompatibilityResult {
    pub fn compatible(level: CompatibilityLevel) -> Self {
        Self {
            level,
            is_compatible: true,
            messages: Vec::new(),
            checked_versions: Vec::new(),
        }
    }

    pub fn from_messages(level: CompatibilityLevel, messages: Vec<String>) -> Self {
        Self {
            level,
            is_compatible: messages.is_empty(),
            messages,
            checked_versions: Vec::new(),
        }
    }

    /// One-line summary for logs and CLI output
    pub fn summary(&self) -> String {
        if self.is_compatible {
            format!("compatible under {}", self.level)
        } else {
            format!("{} problem(s) under {}", self.messages.len(), self.level)
        }
    }
}

/// Runs the checks a [`CompatibilityLevel`] selects
#[derive(Debug, Clone, Default)]
pub struct CompatibilityChecker {
    add_only: AddOnlySchemaChecker,
    validate_avro_defaults: bool,
}

impl CompatibilityChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CheckerConfig) -> Self {
        Self {
            add_only: AddOnlySchemaChecker::new()
                .with_single_root_message(config.protobuf.require_single_root_message),
            validate_avro_defaults: config.avro.validate_defaults,
        }
    }

    /// Check `candidate` against `previous_versions` (oldest first), logging
    /// through `tracing`
    pub fn check(
        &self,
        level: CompatibilityLevel,
        candidate: &ParsedSchema,
        previous_versions: &[ParsedSchema],
    ) -> Result<CompatibilityResult> {
        self.check_with(level, candidate, previous_versions, &TracingDiagnostics)
    }

    pub fn check_with(
        &self,
        level: CompatibilityLevel,
        candidate: &ParsedSchema,
        previous_versions: &[ParsedSchema],
        diagnostics: &dyn Diagnostics,
    ) -> Result<CompatibilityResult> {
        if level == CompatibilityLevel::None {
            return Ok(CompatibilityResult::compatible(level));
        }

        let mut messages = Vec::new();
        if self.validate_avro_defaults {
            if let ParsedSchema::Avro(schema) = candidate {
                messages.extend(avro::default_violations(schema));
            }
        }

        // a first version has nothing to diff against but must still be
        // sequentially numbered
        if level == CompatibilityLevel::AddOnly && previous_versions.is_empty() {
            if let ParsedSchema::Protobuf(_) = candidate {
                messages.extend(self.add_only.sequential_schema_in_order_check(candidate, diagnostics)?);
            }
        }

        let targets = if level.is_transitive() {
            previous_versions
        } else {
            &previous_versions[previous_versions.len().saturating_sub(1)..]
        };

        let mut checked_versions = Vec::new();
        for previous in targets {
            let found = self.check_pair(level, candidate, previous, diagnostics)?;
            match previous.version() {
                Some(version) => {
                    checked_versions.push(version);
                    if level.is_transitive() {
                        messages.extend(found.into_iter().map(|m| format!("version {}: {}", version, m)));
                    } else {
                        messages.extend(found);
                    }
                }
                None => messages.extend(found),
            }
        }

        let mut result = CompatibilityResult::from_messages(level, messages);
        result.checked_versions = checked_versions;
        diagnostics.info(SOURCE, result.summary());
        Ok(result)
    }

    fn check_pair(
        &self,
        level: CompatibilityLevel,
        candidate: &ParsedSchema,
        previous: &ParsedSchema,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<String>> {
        if candidate.format() != previous.format() {
            return Ok(vec![format!(
                "Schema format changed from {} to {}",
                previous.format(),
                candidate.format()
            )]);
        }

        if level == CompatibilityLevel::AddOnly {
            return match candidate {
                ParsedSchema::Avro(_) => Ok(avro::is_add_only_compatible(candidate, previous, diagnostics)),
                ParsedSchema::Protobuf(_) => self.add_only.check_compatibility(previous, candidate, diagnostics),
            };
        }

        let mut messages = Vec::new();
        if level.checks_backward() {
            messages.extend(reader_problems(candidate, previous, diagnostics));
        }
        if level.checks_forward() {
            messages.extend(reader_problems(previous, candidate, diagnostics));
        }
        Ok(messages)
    }
}

/// Why `reader` cannot consume data produced with `writer`
fn reader_problems(reader: &ParsedSchema, writer: &ParsedSchema, diagnostics: &dyn Diagnostics) -> Vec<String> {
    match (reader, writer) {
        (ParsedSchema::Avro(r), ParsedSchema::Avro(w)) => avro::incompatibilities(r, w, diagnostics)
            .into_iter()
            .map(|i| i.to_string())
            .collect(),
        (ParsedSchema::Protobuf(r), ParsedSchema::Protobuf(w)) => protobuf::incompatible_changes(r, w)
            .into_iter()
            .map(|d| d.to_string())
            .collect(),
        _ => vec![format!("Schema format changed from {} to {}", writer.format(), reader.format())],
    }
}
