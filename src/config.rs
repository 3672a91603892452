//! Checker configuration
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (compat.toml)
//! - Environment variables (COMPAT__*)
//!
//! ## Example config file (compat.toml):
//! ```toml
//! default_level = "BACKWARD"
//!
//! [protobuf]
//! require_single_root_message = true
//!
//! [avro]
//! validate_defaults = true
//!
//! [report]
//! output_format = "compact"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compatibility::CompatibilityLevel;
use crate::error::Result;

/// Main configuration for the compatibility checker
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckerConfig {
    /// Level used when the caller does not name one
    #[serde(default)]
    pub default_level: CompatibilityLevel,

    #[serde(default)]
    pub protobuf: ProtobufConfig,

    #[serde(default)]
    pub avro: AvroConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Protobuf checker settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProtobufConfig {
    /// Report schemas that do not declare exactly one top-level message
    /// when running the add-only sequence check
    #[serde(default)]
    pub require_single_root_message: bool,
}

/// Avro checker settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AvroConfig {
    /// Reject candidates whose field defaults do not match the field type
    #[serde(default)]
    pub validate_defaults: bool,
}

/// Report settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format (pretty or compact)
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,
}

/// Output format for JSON reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_format: default_output_format(),
        }
    }
}

impl CheckerConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["compat.toml", ".compat.toml", "config/compat.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "registry", "compat") {
            let xdg_config = dirs.config_dir().join("compat.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // COMPAT__PROTOBUF__REQUIRE_SINGLE_ROOT_MESSAGE=true
        builder = builder.add_source(
            Environment::with_prefix("COMPAT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
