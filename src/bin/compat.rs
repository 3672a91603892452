//! Schema Compatibility CLI
//!
//! Checks a candidate schema against previous versions, runs the Protobuf
//! sequence check and prints Protobuf diffs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use registry_compat::config::OutputFormat;
use registry_compat::protobuf;
use registry_compat::{
    AddOnlySchemaChecker, CheckerConfig, CompatibilityChecker, CompatibilityLevel, ParsedSchema,
    SchemaFormat, SchemaReference, TracingDiagnostics,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-compat")]
#[command(about = "Check Avro and Protobuf schema compatibility")]
struct Cli {
    /// Config file (defaults to compat.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Schema format; guessed from the file extension when omitted
    #[arg(short, long)]
    format: Option<SchemaFormat>,

    /// Referenced schema as NAME=PATH; may be repeated
    #[arg(short, long = "reference", value_name = "NAME=PATH")]
    references: Vec<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a candidate against previous versions (oldest first)
    Check {
        /// Compatibility level (defaults to the configured level)
        #[arg(short, long)]
        level: Option<CompatibilityLevel>,
        /// Proposed schema
        candidate: PathBuf,
        /// Previously registered versions, oldest first
        #[arg(required = true)]
        previous: Vec<PathBuf>,
    },

    /// Check that every message reachable from the root numbers its fields 1..N
    Sequence {
        schema: PathBuf,
    },

    /// List the differences between two Protobuf schemas
    Diff {
        previous: PathBuf,
        current: PathBuf,
    },

    /// Print the fingerprint of a schema's canonical form
    Fingerprint {
        schema: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Inputs shared by every subcommand
struct Loader {
    format: Option<SchemaFormat>,
    references: Vec<SchemaReference>,
    bodies: BTreeMap<String, String>,
}

impl Loader {
    fn new(format: Option<SchemaFormat>, entries: &[String]) -> anyhow::Result<Self> {
        let mut references = Vec::new();
        let mut bodies = BTreeMap::new();
        for entry in entries {
            let (name, path) = entry
                .split_once('=')
                .with_context(|| format!("reference '{}' is not NAME=PATH", entry))?;
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read reference {}", path))?;
            let subject = Path::new(path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(name)
                .to_string();
            references.push(SchemaReference::new(name, subject, 1));
            bodies.insert(name.to_string(), body);
        }
        Ok(Self { format, references, bodies })
    }

    fn format_of(&self, path: &Path) -> anyhow::Result<SchemaFormat> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(SchemaFormat::from_extension)
            .with_context(|| format!("cannot tell the format of {}; pass --format", path.display()))
    }

    fn load(&self, path: &Path, version: Option<i32>) -> anyhow::Result<ParsedSchema> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let schema = ParsedSchema::parse(
            self.format_of(path)?,
            &text,
            self.references.clone(),
            self.bodies.clone(),
            version,
        )
        .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(schema)
    }
}

fn print_json<T: serde::Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let text = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Compact => serde_json::to_string(value)?,
    };
    println!("{}", text);
    Ok(())
}

/// Returns whether the checked schemas passed
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = CheckerConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    let loader = Loader::new(cli.format, &cli.references)?;
    let output = config.report.output_format;

    match cli.command {
        Commands::Check { level, candidate, previous } => {
            let level = level.unwrap_or(config.default_level);
            let history = previous
                .iter()
                .enumerate()
                .map(|(i, path)| loader.load(path, Some(i as i32 + 1)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let candidate = loader.load(&candidate, None)?;

            let result = CompatibilityChecker::from_config(&config).check(level, &candidate, &history)?;
            if cli.json {
                print_json(&result, output)?;
            } else if result.is_compatible {
                println!("✅ {}", result.summary());
            } else {
                println!("❌ {}", result.summary());
                for message in &result.messages {
                    println!("   └─ {}", message);
                }
            }
            Ok(result.is_compatible)
        }

        Commands::Sequence { schema } => {
            let schema = loader.load(&schema, None)?;
            if schema.format() != SchemaFormat::Protobuf {
                bail!("the sequence check only applies to PROTOBUF schemas");
            }
            let violations = AddOnlySchemaChecker::new()
                .with_single_root_message(config.protobuf.require_single_root_message)
                .sequential_schema_in_order_check(&schema, &TracingDiagnostics)?;
            if cli.json {
                print_json(&violations, output)?;
            } else if violations.is_empty() {
                println!("✅ fields are in sequential order");
            } else {
                for violation in &violations {
                    println!("❌ {}", violation);
                }
            }
            Ok(violations.is_empty())
        }

        Commands::Diff { previous, current } => {
            let (previous, current) = match (loader.load(&previous, None)?, loader.load(&current, None)?) {
                (ParsedSchema::Protobuf(p), ParsedSchema::Protobuf(c)) => (p, c),
                _ => bail!("diff only applies to PROTOBUF schemas"),
            };
            let differences = protobuf::compare(&previous, &current);
            if cli.json {
                print_json(&differences, output)?;
            } else {
                for difference in &differences {
                    println!("{}", difference);
                }
            }
            Ok(protobuf::is_backward_compatible(&current, &previous))
        }

        Commands::Fingerprint { schema } => {
            let schema = loader.load(&schema, None)?;
            println!("{}  {}", schema.fingerprint(), schema.format());
            Ok(true)
        }
    }
}
