//! # silarpc CLI Entry Point
//!
//! Command-line tools for working with feature-definition documents.
//!
//! ## Usage
//!
//! ```bash
//! # Validate a feature definition
//! silarpc validate TemperatureController.sila.xml
//!
//! # List every resolved node of a feature
//! silarpc describe TemperatureController.sila.xml
//! ```
//!
//! `validate` exits non-zero on any construction error, including cyclic
//! data type definitions (the error names every unresolved definition).

use anyhow::{Context, Result};
use argh::FromArgs;
use silarpc_framework::Feature;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main CLI structure parsed from command-line arguments.
#[derive(FromArgs)]
/// silarpc - feature definition tools
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Validate(ValidateArgs),
    Describe(DescribeArgs),
}

/// Validate a feature-definition document.
///
/// Parses and fully resolves the document; prints the feature's fully
/// qualified identifier on success.
#[derive(FromArgs)]
#[argh(subcommand, name = "validate")]
struct ValidateArgs {
    /// path to the feature-definition document
    #[argh(positional)]
    path: PathBuf,
}

/// List every resolved node of a feature, grouped by kind.
#[derive(FromArgs)]
#[argh(subcommand, name = "describe")]
struct DescribeArgs {
    /// path to the feature-definition document
    #[argh(positional)]
    path: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli: Cli = argh::from_env();
    match cli.command {
        Commands::Validate(args) => validate(&args.path),
        Commands::Describe(args) => describe(&args.path),
    }
}

fn load_feature(path: &PathBuf) -> Result<Feature> {
    let definition = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Feature::new(&definition).with_context(|| format!("invalid feature definition {}", path.display()))
}

fn validate(path: &PathBuf) -> Result<()> {
    let feature = load_feature(path)?;
    println!("{}", feature.fully_qualified_identifier());
    Ok(())
}

fn describe(path: &PathBuf) -> Result<()> {
    let feature = load_feature(path)?;

    let mut by_kind: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (identifier, node) in feature.children() {
        by_kind
            .entry(node.kind())
            .or_default()
            .push(identifier.to_string());
    }

    println!("{} ({})", feature.fully_qualified_identifier(), feature.display_name());
    for (kind, mut identifiers) in by_kind {
        if kind == "Feature" {
            continue;
        }
        identifiers.sort();
        println!("\n{kind}:");
        for identifier in identifiers {
            println!("  {identifier}");
        }
    }
    Ok(())
}
