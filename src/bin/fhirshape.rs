//! Command-line front end for closed-shape FHIR validation.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use octofhir_fhirshape::{
    ResourceKind, Schema, SchemaCache, ShapeError, ShapeOptions, ValidationConfig,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fhirshape")]
#[command(about = "Validate FHIR R4 resources against closed shapes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate JSON resource files
    Validate {
        /// Files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Validate against this kind instead of dispatching on resourceType
        #[arg(short, long)]
        kind: Option<String>,

        /// Reject any contained resource (requires --kind)
        #[arg(long, requires = "kind")]
        forbid_contained: bool,

        /// Configuration file (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Reject objects holding more than one member of a value[x] group
        #[arg(long)]
        strict_choices: bool,

        /// Print failures as OperationOutcome JSON
        #[arg(long)]
        json: bool,
    },
    /// List resource kinds
    Kinds {
        /// Only kinds with a shape definition
        #[arg(long)]
        supported: bool,
    },
    /// Print the field table of a resource shape
    Describe {
        /// Resource kind, e.g. Patient
        kind: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns `Ok(false)` when at least one document failed validation
fn run(command: Commands) -> Result<bool> {
    match command {
        Commands::Validate {
            files,
            kind,
            forbid_contained,
            config,
            strict_choices,
            json,
        } => {
            let mut config = match config {
                Some(path) => ValidationConfig::load_from_file(&path)?,
                None => ValidationConfig::default(),
            };
            if strict_choices {
                config = config.with_choice_exclusivity(true);
            }
            let cache = SchemaCache::with_config(config)?;
            let schema = match kind {
                Some(name) => {
                    let kind = parse_kind(&name)?;
                    let options = if forbid_contained {
                        ShapeOptions::forbid_contained()
                    } else {
                        ShapeOptions::default()
                    };
                    cache.resource(kind, options)?
                }
                None => cache.any_resource()?,
            };
            info!("Validating {} file(s) against {}", files.len(), schema.name());

            let mut all_valid = true;
            for file in &files {
                all_valid &= validate_file(&schema, file, json)?;
            }
            debug!("Cache after validation: {:?}", cache.stats());
            Ok(all_valid)
        }
        Commands::Kinds { supported } => {
            for kind in ResourceKind::ALL {
                if supported && !kind.is_supported() {
                    continue;
                }
                println!("{kind}");
            }
            Ok(true)
        }
        Commands::Describe { kind } => {
            let kind = parse_kind(&kind)?;
            let schema = SchemaCache::new().resource(kind, ShapeOptions::default())?;
            describe(&schema)?;
            Ok(true)
        }
    }
}

fn parse_kind(name: &str) -> Result<ResourceKind> {
    Ok(name.parse::<ResourceKind>()?)
}

fn validate_file(schema: &Schema, file: &Path, json: bool) -> Result<bool> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    match schema.validate(&value) {
        Ok(validated) => {
            if !json {
                let kind = validated
                    .kind()
                    .map(|kind| kind.to_string())
                    .unwrap_or_else(|| schema.name());
                println!("{}: valid {}", file.display(), kind);
            }
            Ok(true)
        }
        Err(err) => {
            report_failure(file, &err, json)?;
            Ok(false)
        }
    }
}

fn report_failure(file: &Path, err: &ShapeError, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&err.to_operation_outcome())?);
        return Ok(());
    }

    println!("{}: {}", file.display(), err);
    for issue in err.issues() {
        println!("  {issue}");
    }
    Ok(())
}

fn describe(schema: &Schema) -> Result<()> {
    let Some(summary) = schema.describe() else {
        bail!("{} is not an object shape", schema.name());
    };

    println!("{}", summary.name);
    let width = summary
        .fields
        .iter()
        .map(|field| field.name.len())
        .max()
        .unwrap_or(0);
    for field in &summary.fields {
        let shadow = if field.shadow { " (+_)" } else { "" };
        println!(
            "  {:<width$}  {:<5} {}{}",
            field.name, field.cardinality, field.kind, shadow
        );
    }
    for group in &summary.groups {
        let required = if group.required { "1..1" } else { "0..1" };
        println!(
            "  {:<width$}  {:<5} one of {}",
            group.label(),
            required,
            group.members.join(", ")
        );
    }
    Ok(())
}
