//! CLI for the fragstore hourly time-series store.
//!
//! Provides commands for inspecting month stores and reading or writing
//! individual fragments.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use fragstore::{Dataset, Dtype, Fragment, Month};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// fragstore: sharded, month-fragmented hourly time-series storage CLI.
#[derive(Parser)]
#[command(name = "fragstore", version, about)]
struct Cli {
    /// Log store activity to stderr (debug level).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Display a month's metadata and per-shard row counts.
    Info {
        #[command(flatten)]
        target: MonthTarget,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// List the months present under a dataset root.
    Tags {
        /// Dataset root directory.
        root: PathBuf,
    },

    /// Print one fragment.
    Fetch {
        #[command(flatten)]
        target: MonthTarget,

        /// Series namespace.
        namespace: String,

        /// Series name.
        name: String,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Set elements of a fragment, creating it if needed.
    Put {
        #[command(flatten)]
        target: MonthTarget,

        /// Element type used when the fragment does not exist yet.
        #[arg(long, default_value = "f")]
        dtype: Dtype,

        /// Series namespace.
        namespace: String,

        /// Series name.
        name: String,

        /// Assignments of the form `index=value` (e.g., "0=11" "2=22.5").
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(usize, f64)>,
    },

    /// Print every fragment stored for a month.
    Dump {
        #[command(flatten)]
        target: MonthTarget,
    },
}

/// Arguments locating one month of a dataset.
#[derive(Args)]
struct MonthTarget {
    /// Dataset root directory.
    root: PathBuf,

    /// Month to open (e.g., "2015-01").
    #[arg(long)]
    month: Month,

    /// Shard count the dataset was created with.
    #[arg(long)]
    hashmod: u32,
}

impl MonthTarget {
    fn dataset(&self) -> fragstore::Result<Dataset> {
        Dataset::new(&self.root, self.hashmod)
    }
}

/// Output format for fragment and metadata output.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable text.
    Text,
    /// JSON object.
    Json,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "fragstore=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Info { target, format } => cmd_info(&target, &format),
        Commands::Tags { root } => cmd_tags(&root),
        Commands::Fetch {
            target,
            namespace,
            name,
            format,
        } => cmd_fetch(&target, &namespace, &name, &format),
        Commands::Put {
            target,
            dtype,
            namespace,
            name,
            assignments,
        } => cmd_put(&target, dtype, &namespace, &name, &assignments),
        Commands::Dump { target } => cmd_dump(&target),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Parses an `index=value` assignment.
fn parse_assignment(s: &str) -> Result<(usize, f64), String> {
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected index=value, got '{s}'"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid index '{index}': {e}"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value '{value}': {e}"))?;
    Ok((index, value))
}

/// Implements `fragstore info <root> --month <month> --hashmod <n>`.
fn cmd_info(target: &MonthTarget, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = target.dataset()?;
    let mut group = dataset.open_month(target.month, false)?;

    let mut counts = Vec::with_capacity(dataset.hashmod() as usize);
    for shard in 0..dataset.hashmod() {
        counts.push(group.fetch_all(shard)?.len());
    }
    let entries = group.metadata().to_entries();
    let path = group.path().to_path_buf();
    group.close()?;

    match format {
        OutputFormat::Text => {
            println!("Group: {}", path.display());
            println!("Month: {}", target.month);
            println!();
            println!("Metadata:");
            for (key, value) in &entries {
                println!("  {key}: {value}");
            }
            println!();
            println!("Shards: {}", counts.len());
            for (shard, count) in counts.iter().enumerate() {
                println!("  data{shard}: {count} fragments");
            }
            println!("Total: {} fragments", counts.iter().sum::<usize>());
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": path.display().to_string(),
                "month": target.month.to_string(),
                "metadata": entries,
                "shards": counts,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `fragstore tags <root>`.
fn cmd_tags(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    // Tag listing only looks at file names, so the shard count is irrelevant.
    let dataset = Dataset::new(root, 1)?;
    let tags = dataset.fragment_tags()?;
    if tags.is_empty() {
        println!("No fragment groups found in '{}'", root.display());
    }
    for tag in tags {
        println!("{tag}");
    }
    Ok(())
}

/// Implements `fragstore fetch <root> --month <month> --hashmod <n> <namespace> <name>`.
fn cmd_fetch(
    target: &MonthTarget,
    namespace: &str,
    name: &str,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = target.dataset()?;
    let mut group = dataset.open_month(target.month, false)?;

    {
        let fragment = group.fetch(namespace, name)?;
        match format {
            OutputFormat::Text => println!("{fragment}"),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&fragment_json(&fragment))?);
            }
        }
    }

    group.close()?;
    Ok(())
}

/// Implements `fragstore put <root> --month <month> --hashmod <n> <namespace> <name> <index=value>...`.
fn cmd_put(
    target: &MonthTarget,
    dtype: Dtype,
    namespace: &str,
    name: &str,
    assignments: &[(usize, f64)],
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = target.dataset()?;
    let mut group = dataset.open_month(target.month, true)?;

    group.begin()?;
    let saved = {
        let mut fragment = group.fetch_or_create_with_dtype(namespace, name, dtype)?;
        for &(index, value) in assignments {
            fragment.set(index, value)?;
        }
        fragment.save()?;
        debug!(namespace, name, count = assignments.len(), "applied assignments");
        fragment.to_string()
    };
    group.commit()?;
    group.close()?;

    println!("{saved}");
    Ok(())
}

/// Implements `fragstore dump <root> --month <month> --hashmod <n>`.
fn cmd_dump(target: &MonthTarget) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = target.dataset()?;
    for line in dataset.dump(target.month)? {
        println!("{line}");
    }
    Ok(())
}

/// Builds the JSON form of a fragment, listing only non-zero elements.
fn fragment_json(fragment: &Fragment<'_>) -> serde_json::Value {
    let values: Vec<serde_json::Value> = fragment
        .data()
        .nonzero()
        .into_iter()
        .map(|(index, value)| serde_json::json!([index, value]))
        .collect();
    serde_json::json!({
        "namespace": fragment.namespace(),
        "name": fragment.name(),
        "source": fragment.source().code().to_string(),
        "dtype": fragment.dtype().tag(),
        "length": fragment.len(),
        "total": fragment.total(),
        "nonzero": values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn target(root: &Path) -> MonthTarget {
        MonthTarget {
            root: root.to_path_buf(),
            month: Month::new(2015, 1).unwrap(),
            hashmod: 4,
        }
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("0=11").unwrap(), (0, 11.0));
        assert_eq!(parse_assignment(" 2 = 22.5 ").unwrap(), (2, 22.5));
        assert!(parse_assignment("11").is_err());
        assert!(parse_assignment("x=1").is_err());
        assert!(parse_assignment("1=y").is_err());
        assert!(parse_assignment("-1=2").is_err());
    }

    #[test]
    fn test_cli_parses_put() {
        let cli = Cli::try_parse_from([
            "fragstore", "put", "/tmp/ds", "--month", "2015-01", "--hashmod", "4", "aboth",
            "abov11", "0=11", "2=22",
        ])
        .unwrap();
        match cli.command {
            Commands::Put {
                target,
                dtype,
                namespace,
                name,
                assignments,
            } => {
                assert_eq!(target.month, Month::new(2015, 1).unwrap());
                assert_eq!(target.hashmod, 4);
                assert_eq!(dtype, Dtype::F32);
                assert_eq!(namespace, "aboth");
                assert_eq!(name, "abov11");
                assert_eq!(assignments, vec![(0, 11.0), (2, 22.0)]);
            }
            _ => panic!("expected put"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_month() {
        assert!(
            Cli::try_parse_from(["fragstore", "dump", "/tmp/ds", "--month", "2015-01-02", "--hashmod", "4"])
                .is_err()
        );
    }

    #[test]
    fn test_put_then_fetch() {
        let dir = tempdir().unwrap();
        let target = target(dir.path());

        cmd_put(&target, Dtype::F32, "aboth", "abov11", &[(0, 11.0), (2, 22.0)]).unwrap();
        cmd_put(&target, Dtype::F64, "aboth", "abov11", &[(3, 1.0)]).unwrap();

        let dataset = target.dataset().unwrap();
        let mut group = dataset.open_month(target.month, false).unwrap();
        {
            let fragment = group.fetch("aboth", "abov11").unwrap();
            assert_eq!(fragment.dtype(), Dtype::F32);
            assert_eq!(fragment.total(), 34.0);

            let json = fragment_json(&fragment);
            assert_eq!(json["total"], 34.0);
            assert_eq!(json["source"], "U");
            assert_eq!(json["nonzero"][1][0], 2);
        }
        group.close().unwrap();

        cmd_fetch(&target, "aboth", "abov11", &OutputFormat::Text).unwrap();
        cmd_info(&target, &OutputFormat::Json).unwrap();
        cmd_dump(&target).unwrap();
        cmd_tags(dir.path()).unwrap();
    }

    #[test]
    fn test_fetch_missing_fails() {
        let dir = tempdir().unwrap();
        let target = target(dir.path());
        assert!(cmd_fetch(&target, "aboth", "abov11", &OutputFormat::Text).is_err());

        cmd_put(&target, Dtype::F32, "aboth", "abov11", &[(0, 1.0)]).unwrap();
        assert!(cmd_fetch(&target, "aboth", "nonexistent", &OutputFormat::Text).is_err());
    }

    #[test]
    fn test_put_out_of_range_index_fails() {
        let dir = tempdir().unwrap();
        let target = target(dir.path());
        assert!(cmd_put(&target, Dtype::F32, "ns", "x", &[(744, 1.0)]).is_err());
    }
}
