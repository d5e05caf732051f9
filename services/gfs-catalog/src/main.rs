//! GFS forecast catalog CLI.
//!
//! Lists catalog entries, shows resolved partition URLs and schemas, and
//! reads partitions or whole datasets, printing JSON to stdout.

mod summary;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gfs_source::{Catalog, GfsForecastSource};
use serde::Serialize;
use serde_yaml::Value;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use summary::DatasetSummary;

#[derive(Parser, Debug)]
#[command(name = "gfs-catalog")]
#[command(about = "Browse and read GFS forecast partitions from the NCAR RDA archive")]
struct Cli {
    /// Catalog file
    #[arg(long, env = "GFS_CATALOG", default_value = "config/gfs_catalog.yaml")]
    catalog: PathBuf,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List catalog sources
    List,
    /// Show a source's parameters and resolved metadata
    Describe(SourceArgs),
    /// Print partition URLs
    Urls(SourceArgs),
    /// Probe the first partition and print the schema
    Schema(SourceArgs),
    /// Read one partition or the whole dataset
    Read {
        #[command(flatten)]
        source: SourceArgs,

        /// Read only this partition index
        #[arg(long)]
        partition: Option<usize>,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Catalog source name
    name: String,

    /// Forecast cycle (ISO-8601, "today" or "latest")
    #[arg(long)]
    cycle: Option<String>,

    /// Maximum lead time in hours
    #[arg(long)]
    max_lead_time: Option<String>,

    /// Extra source argument, KEY=VALUE (VALUE is parsed as YAML)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

impl SourceArgs {
    fn overrides(&self) -> Result<BTreeMap<String, Value>> {
        let mut overrides = BTreeMap::new();
        for pair in &self.set {
            let (key, value) = parse_override(pair)?;
            overrides.insert(key, value);
        }
        if let Some(cycle) = &self.cycle {
            overrides.insert("cycle".to_string(), Value::String(cycle.clone()));
        }
        if let Some(max_lead_time) = &self.max_lead_time {
            overrides.insert("max_lead_time".to_string(), parse_value(max_lead_time));
        }
        Ok(overrides)
    }

    fn open(&self, catalog: &Catalog) -> Result<GfsForecastSource> {
        let overrides = self.overrides()?;
        catalog
            .open(&self.name, &overrides)
            .with_context(|| format!("Failed to open source {}", self.name))
    }
}

/// Split `KEY=VALUE`, parsing the value as YAML so numbers, lists and
/// mappings keep their types.
fn parse_override(pair: &str) -> Result<(String, Value)> {
    let Some((key, value)) = pair.split_once('=') else {
        bail!("invalid --set '{}': expected KEY=VALUE", pair);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid --set '{}': empty key", pair);
    }
    Ok((key.to_string(), parse_value(value)))
}

fn parse_value(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[derive(Serialize)]
struct SourceListing<'a> {
    name: &'a str,
    description: &'a str,
    driver: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays parseable JSON
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs)?;

    let catalog = Catalog::load(&cli.catalog)
        .with_context(|| format!("Failed to load catalog {}", cli.catalog.display()))?;

    match cli.command {
        Command::List => {
            let listing: Vec<SourceListing> = catalog
                .sources
                .iter()
                .map(|(name, entry)| SourceListing {
                    name,
                    description: &entry.description,
                    driver: &entry.driver,
                })
                .collect();
            print_json(&listing)?;
        }
        Command::Describe(args) => {
            let entry = catalog.entry(&args.name)?;
            let source = args.open(&catalog)?;
            print_json(&serde_json::json!({
                "name": args.name,
                "parameters": entry.parameter_specs(),
                "metadata": source.metadata(),
            }))?;
        }
        Command::Urls(args) => {
            let source = args.open(&catalog)?;
            print_json(&source.partitions())?;
        }
        Command::Schema(args) => {
            let source = args.open(&catalog)?;
            let schema = source
                .discover_schema()
                .await
                .with_context(|| format!("Schema discovery failed for {}", args.name))?;
            print_json(schema)?;
        }
        Command::Read { source: args, partition } => {
            let source = args.open(&catalog)?;
            let dataset = match partition {
                Some(index) => {
                    info!(source = %args.name, index, "Reading partition");
                    source.read_partition(index).await?
                }
                None => {
                    info!(
                        source = %args.name,
                        partitions = source.npartitions(),
                        "Reading dataset"
                    );
                    source.read().await?
                }
            };
            print_json(&DatasetSummary::from_dataset(&dataset))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_override_keeps_yaml_types() {
        let (key, value) = parse_override("max_concurrent_reads=8").unwrap();
        assert_eq!(key, "max_concurrent_reads");
        assert_eq!(value.as_u64(), Some(8));

        let (_, value) = parse_override("filter_by_keys={typeOfLevel: surface}").unwrap();
        assert!(value.is_mapping());

        let (_, value) = parse_override("base_url=https://example.test/thredds").unwrap();
        assert_eq!(value.as_str(), Some("https://example.test/thredds"));

        assert!(parse_override("no-equals").is_err());
        assert!(parse_override("=5").is_err());
    }

    #[test]
    fn test_cli_flags_override_set() {
        let args = SourceArgs {
            name: "gfs_forecast".into(),
            cycle: Some("2024-01-15T18:00:00".into()),
            max_lead_time: Some("48".into()),
            set: vec!["cycle=latest".into(), "access_method=ncss".into()],
        };
        let overrides = args.overrides().unwrap();
        assert_eq!(overrides["cycle"].as_str(), Some("2024-01-15T18:00:00"));
        assert_eq!(overrides["max_lead_time"].as_u64(), Some(48));
        assert_eq!(overrides["access_method"].as_str(), Some("ncss"));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "gfs-catalog",
            "read",
            "gfs_surface_winds",
            "--cycle",
            "latest",
            "--partition",
            "2",
            "--set",
            "max_concurrent_reads=2",
        ])
        .unwrap();
        match cli.command {
            Command::Read { source, partition } => {
                assert_eq!(source.name, "gfs_surface_winds");
                assert_eq!(partition, Some(2));
                assert_eq!(source.set.len(), 1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
