//! Error types for the compatibility core

use thiserror::Error;

/// Result type for compatibility operations
pub type Result<T> = std::result::Result<T, CompatError>;

/// Compatibility core errors
///
/// Policy violations are never errors; they come back as `false` or as a
/// non-empty list of violation messages. These variants cover malformed input
/// and the conditions that abort a check outright.
#[derive(Error, Debug)]
pub enum CompatError {
    #[error("Invalid schema format: {0}")]
    InvalidFormat(String),

    #[error("Failed to parse {format} schema: {message}")]
    Parse { format: String, message: String },

    #[error("Missing resolved body for reference '{name}' ({subject} v{version})")]
    MissingReference {
        name: String,
        subject: String,
        version: i32,
    },

    #[error("Unresolved type '{name}' referenced from '{scope}'{}", suggestion_suffix(.suggestion))]
    UnresolvedType {
        name: String,
        scope: String,
        suggestion: Option<String>,
    },

    #[error("Cyclic type reference: {}", .path.join(" -> "))]
    CyclicType { path: Vec<String> },

    #[error("Schema has no top-level message: {0}")]
    NoRootMessage(String),

    #[error("Unknown compatibility level: {0}")]
    UnknownLevel(String),

    #[error("Reference cycle between registered schemas involving {0}")]
    ReferenceCycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_type_message_includes_suggestion() {
        let err = CompatError::UnresolvedType {
            name: "HistoryDco".to_string(),
            scope: "com.example.Sample".to_string(),
            suggestion: Some("com.example.HistoryDoc".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("HistoryDco"));
        assert!(msg.contains("did you mean 'com.example.HistoryDoc'"));
    }

    #[test]
    fn test_cyclic_type_message_lists_path() {
        let err = CompatError::CyclicType {
            path: vec!["a.Node".to_string(), "a.Child".to_string(), "a.Node".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic type reference: a.Node -> a.Child -> a.Node");
    }
}
