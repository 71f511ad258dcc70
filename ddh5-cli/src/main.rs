//! CLI for inspecting ddh5 measurement data containers.
//!
//! Provides commands for listing container structure and dumping stored
//! record collections.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use ddh5::{ReadOptions, all_datadicts_from_ddh5, datadict_from_ddh5, resolve_path};

/// ddh5 — Measurement data container inspection CLI.
#[derive(Parser)]
#[command(name = "ddh5", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Display container structure: groups, datasets, shapes, and metadata.
    Info {
        /// Path to the container file (`.ddh5` suffix optional).
        file: PathBuf,
    },

    /// Dump the rows of one group as a table.
    Dump {
        /// Path to the container file (`.ddh5` suffix optional).
        file: PathBuf,

        /// Group to dump.
        #[arg(long, default_value = "data")]
        group: String,

        /// First row to dump (inclusive).
        #[arg(long, default_value = "0")]
        start: usize,

        /// Last row to dump (exclusive); defaults to the end.
        #[arg(long)]
        stop: Option<usize>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },
}

/// Output format for dumped rows.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON object keyed by field name.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Info { file } => cmd_info(&file),
        Commands::Dump {
            file,
            group,
            start,
            stop,
            format,
        } => cmd_dump(&file, &group, start, stop, &format),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `ddh5 info <file>`.
fn cmd_info(file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_path(file);
    if !path.exists() {
        return Err(format!("No container found at '{}'", path.display()).into());
    }

    let size = std::fs::metadata(&path)?.len();
    println!("Container: {}", path.display());
    println!("Size: {} ({size} bytes)", format_bytes(size));
    println!();

    let opts = ReadOptions {
        structure_only: true,
        ..ReadOptions::default()
    };
    let all = all_datadicts_from_ddh5(&path, &opts)?;

    println!("Groups: {}", all.len());
    for (group, dd) in &all {
        println!();
        println!("  Group \"{group}\": {} fields", dd.num_fields());

        for (name, field) in dd.data_items() {
            let shape = dd
                .field_meta_items(name)
                .find(|(k, _)| *k == "__shape__")
                .map_or_else(|| "?".to_string(), |(_, v)| v.to_string());
            let unit = field.unit.as_deref().unwrap_or("-");
            let axes = if field.axes.is_empty() {
                "independent".to_string()
            } else {
                format!("axes: {}", field.axes.join(", "))
            };
            println!("    - {name}: shape={shape}, unit={unit}, {axes}");
        }

        for (key, value) in dd.meta_items() {
            println!("    [{key}] = {value}");
        }
    }

    Ok(())
}

/// Implements `ddh5 dump <file>`.
fn cmd_dump(
    file: &PathBuf,
    group: &str,
    start: usize,
    stop: Option<usize>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let opts = ReadOptions {
        start_row: start,
        stop_row: stop,
        ..ReadOptions::default()
    };
    let dd = datadict_from_ddh5(file, group, &opts)?;

    let names: Vec<&str> = dd.field_names().collect();

    match format {
        OutputFormat::Csv => {
            println!("# group={group}, rows={}", dd.nrows());
            println!("{}", names.join(","));
            for row in 0..dd.nrows() {
                let cells: Vec<String> = names
                    .iter()
                    .filter_map(|name| dd.field(name))
                    .map(|field| {
                        let row_size = field.row_size();
                        let samples = &field.values()[row * row_size..(row + 1) * row_size];
                        if row_size == 1 {
                            format!("{}", samples[0])
                        } else {
                            // Vector-valued rows render as a quoted list.
                            let rendered: Vec<String> =
                                samples.iter().map(|v| format!("{v}")).collect();
                            format!("\"[{}]\"", rendered.join(", "))
                        }
                    })
                    .collect();
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Json => {
            let mut fields = serde_json::Map::new();
            for (name, field) in dd.data_items() {
                fields.insert(
                    name.to_string(),
                    serde_json::json!({
                        "unit": field.unit,
                        "axes": field.axes,
                        "shape": field.shape(),
                        "values": field.values(),
                    }),
                );
            }

            let output = serde_json::json!({
                "group": group,
                "rows": dd.nrows(),
                "fields": fields,
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Formats a byte count as a human-readable string.
#[allow(clippy::cast_precision_loss)] // Byte counts are display-only
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
