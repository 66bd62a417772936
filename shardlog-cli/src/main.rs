//! CLI for the shardlog partitioned log engine.
//!
//! Runs the storage and ingest servers, inspects partition files on disk,
//! queries a running ingest node, and generates synthetic load.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shardlog::entry::unix_millis;
use shardlog::ingest::DEFAULT_NODE_ID;
use shardlog::log_store::DEFAULT_BASE_DIR;
use shardlog::transport::{IngestResponse, serve_ingest, serve_storage};
use shardlog::{
    EnrichedEntry, IncomingEntry, IngestService, PARTITION_COUNT, Partitioner, RoutingTable,
    StorageClient, StorageService,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// shardlog: partitioned append-only log ingestion and storage.
#[derive(Parser)]
#[command(name = "shardlog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Serve the storage tier.
    Storage {
        /// Port to listen on.
        #[arg(long, env = "PORT", default_value_t = 8081)]
        port: u16,

        /// Directory holding the partition log files.
        #[arg(long, env = "SHARDLOG_DATA_DIR", default_value = DEFAULT_BASE_DIR)]
        data_dir: PathBuf,
    },

    /// Serve the ingest tier.
    Ingest {
        /// Port to listen on.
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Identifier stamped on every entry this node ingests.
        #[arg(long, env = "SHARDLOG_NODE_ID", default_value = DEFAULT_NODE_ID)]
        node_id: String,

        /// Partition routes, e.g. "0=http://localhost:8081,*=http://localhost:8082".
        /// Defaults to partitions 0-1 on :8081 and 2-3 on :8082.
        #[arg(long, env = "SHARDLOG_ROUTES", conflicts_with = "storage")]
        routes: Option<RoutingTable>,

        /// Send every partition to this single storage node.
        #[arg(long)]
        storage: Option<String>,

        /// Number of partitions entries are spread across.
        #[arg(long, default_value_t = PARTITION_COUNT)]
        partitions: u32,
    },

    /// Show per-partition file sizes and record counts.
    Inspect {
        /// Directory holding the partition log files.
        data_dir: PathBuf,
    },

    /// Print the most recent entries of one partition file.
    Tail {
        /// Directory holding the partition log files.
        data_dir: PathBuf,

        /// Partition to read.
        #[arg(allow_negative_numbers = true)]
        partition: i64,

        /// Maximum number of entries to print.
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        limit: i64,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Query a running ingest node for a service's recent entries.
    Query {
        /// Service name whose partition is read.
        service: String,

        /// Base URL of the ingest node.
        #[arg(long, default_value = "http://localhost:8080")]
        url: String,

        /// Maximum number of entries to return.
        #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
        limit: i64,
    },

    /// Send batches of synthetic entries to an ingest node.
    Loadgen {
        /// Ingest endpoint to post batches to.
        #[arg(long, default_value = "http://localhost:8080/v1/logs")]
        url: String,

        /// Entries per request.
        #[arg(long, default_value_t = 10)]
        batch: usize,

        /// Total entries to send.
        #[arg(long, default_value_t = 100)]
        total: usize,

        /// Pause between requests in milliseconds.
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
    },
}

/// Output format for tail results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One human-readable line per entry.
    Text,
    /// JSON array of enriched entries.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Storage { port, data_dir } => cmd_storage(port, data_dir),
        Commands::Ingest {
            port,
            node_id,
            routes,
            storage,
            partitions,
        } => {
            let routes = match storage {
                Some(address) => single_node_routes(&address, partitions),
                None => routes.unwrap_or_default(),
            };
            cmd_ingest(port, &node_id, routes, partitions)
        }
        Commands::Inspect { data_dir } => cmd_inspect(&data_dir),
        Commands::Tail {
            data_dir,
            partition,
            limit,
            format,
        } => cmd_tail(&data_dir, partition, limit, &format),
        Commands::Query {
            service,
            url,
            limit,
        } => cmd_query(&url, &service, limit),
        Commands::Loadgen {
            url,
            batch,
            total,
            delay_ms,
        } => cmd_loadgen(&url, batch, total, Duration::from_millis(delay_ms)),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `shardlog storage`.
fn cmd_storage(port: u16, data_dir: PathBuf) -> CliResult {
    let service = StorageService::open(&data_dir);
    tracing::info!(data_dir = %data_dir.display(), "opening partition store");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        serve_storage(listener, service).await
    })?;
    Ok(())
}

/// Implements `shardlog ingest`.
fn cmd_ingest(port: u16, node_id: &str, routes: RoutingTable, partitions: u32) -> CliResult {
    let partitioner = Partitioner::new(partitions)?;
    for partition in 0..partitioner.count() {
        tracing::info!(partition, address = routes.resolve(partition), "route");
    }

    let client = StorageClient::new(routes)?;
    let service = IngestService::new(Arc::new(client))
        .with_node_id(node_id)
        .with_partitioner(partitioner);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
        serve_ingest(listener, service).await
    })?;
    Ok(())
}

/// Routes partitions `0..partitions` and the default to one storage node.
fn single_node_routes(address: &str, partitions: u32) -> RoutingTable {
    RoutingTable::new(address).with_all(partitions, address)
}

/// Implements `shardlog inspect <data_dir>`.
fn cmd_inspect(data_dir: &Path) -> CliResult {
    let service = StorageService::open(data_dir);
    let partitions = service.log_store().partitions()?;
    if partitions.is_empty() {
        return Err(format!("No partition files found in '{}'", data_dir.display()).into());
    }

    println!("Data dir: {}", data_dir.display());
    println!();

    let mut total_bytes = 0;
    let mut total_records = 0;
    for partition in partitions {
        let path = service.log_store().partition_path(partition);
        let size = std::fs::metadata(&path)?.len();
        let tail = service.read_tail(i64::from(partition), 1)?;

        println!("  Partition {partition}: {}", path.display());
        println!("    Size: {} ({size} bytes)", format_bytes(size));
        println!("    Records: {}", tail.total);
        if tail.skipped > 0 {
            println!("    Skipped (unparsable): {}", tail.skipped);
        }

        total_bytes += size;
        total_records += tail.total;
    }

    println!();
    println!("Total: {total_records} records, {}", format_bytes(total_bytes));
    Ok(())
}

/// Implements `shardlog tail <data_dir> <partition>`.
fn cmd_tail(data_dir: &Path, partition: i64, limit: i64, format: &OutputFormat) -> CliResult {
    let service = StorageService::open(data_dir);
    let tail = service.read_tail(partition, limit)?;

    match format {
        OutputFormat::Text => {
            for entry in &tail.entries {
                println!("{}", format_entry(entry));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&tail.entries)?);
        }
    }

    if tail.skipped > 0 {
        eprintln!("warning: skipped {} unparsable records", tail.skipped);
    }
    Ok(())
}

/// Implements `shardlog query <service>`.
fn cmd_query(url: &str, service: &str, limit: i64) -> CliResult {
    let limit = limit.to_string();
    let endpoint = reqwest::Url::parse_with_params(
        &format!("{}/v1/query", url.trim_end_matches('/')),
        &[("service", service), ("limit", limit.as_str())],
    )?;

    let response = reqwest::blocking::get(endpoint)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(format!("ingest node answered {status}: {}", body.trim()).into());
    }

    let entries: Vec<EnrichedEntry> = response.json()?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

/// Implements `shardlog loadgen`.
#[allow(clippy::cast_precision_loss)] // Throughput stats are display-only
fn cmd_loadgen(url: &str, batch: usize, total: usize, delay: Duration) -> CliResult {
    if batch == 0 {
        return Err("--batch must be at least 1".into());
    }

    let client = reqwest::blocking::Client::new();
    let mut rng = StdRng::from_entropy();
    let mut timestamp = u64::try_from(unix_millis()).unwrap_or_default();

    println!("Sending {total} entries to {url} in batches of {batch}");

    let start = Instant::now();
    let mut sent = 0;
    let mut accepted = 0;
    let mut failed_requests = 0;

    while sent < total {
        let size = batch.min(total - sent);
        let entries = generate_batch(&mut rng, size, &mut timestamp);
        sent += size;

        match client.post(url).json(&entries).send() {
            Ok(response) if response.status().is_success() => {
                let ack: IngestResponse = response.json()?;
                accepted += ack.received;
            }
            Ok(response) => {
                failed_requests += 1;
                let status = response.status();
                let body = response.text().unwrap_or_default();
                tracing::warn!(%status, body = body.trim(), "batch rejected");
            }
            Err(e) => {
                failed_requests += 1;
                tracing::warn!(error = %e, "batch request failed");
            }
        }

        if sent < total && !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("Results:");
    println!("  Sent: {sent}");
    println!("  Accepted: {accepted}");
    println!("  Failed requests: {failed_requests}");
    println!("  Elapsed: {elapsed:.3?}");
    println!(
        "  Throughput: {:.0} entries/sec",
        accepted as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    Ok(())
}

/// Sample services and the messages they emit.
const SAMPLE_SERVICES: &[(&str, &[&str])] = &[
    (
        "focus_allocator",
        &[
            "allocated focus block",
            "released focus block",
            "focus window extended",
            "allocation conflict resolved",
        ],
    ),
    (
        "event_creator",
        &[
            "event created",
            "event updated",
            "recurring series expanded",
            "event deleted",
        ],
    ),
    (
        "auth_service",
        &[
            "login succeeded",
            "login failed",
            "token refreshed",
            "session expired",
        ],
    ),
    (
        "notification_service",
        &[
            "email queued",
            "push notification sent",
            "delivery retried",
            "webhook delivered",
        ],
    ),
];

/// Severity levels, weighted towards INFO.
const SAMPLE_LEVELS: &[&str] = &["DEBUG", "INFO", "INFO", "INFO", "WARN", "ERROR"];

const SAMPLE_REGIONS: &[&str] = &["us-east-1", "us-west-2", "eu-west-1"];

/// Builds `size` random entries, advancing `timestamp` 50-500 ms per entry.
fn generate_batch<R: Rng>(rng: &mut R, size: usize, timestamp: &mut u64) -> Vec<IncomingEntry> {
    (0..size)
        .map(|_| {
            *timestamp += rng.gen_range(50..=500);

            let (service, messages) = SAMPLE_SERVICES[rng.gen_range(0..SAMPLE_SERVICES.len())];
            let message = messages.choose(rng).copied().unwrap_or("heartbeat");
            let level = SAMPLE_LEVELS.choose(rng).copied().unwrap_or("INFO");

            let mut entry = IncomingEntry::new(*timestamp, service, message).with_level(level);
            if rng.gen_bool(0.3) {
                let region = SAMPLE_REGIONS.choose(rng).copied().unwrap_or("us-east-1");
                entry = entry
                    .with_label("region", region)
                    .with_label("instance", format!("i-{:04x}", rng.gen_range(0..0x1_0000u32)));
            }
            entry
        })
        .collect()
}

/// Formats an entry as a single log line.
fn format_entry(entry: &EnrichedEntry) -> String {
    let level = entry.entry.level.as_deref().unwrap_or("-");
    let mut line = format!(
        "{} [{level}] {}: {}",
        entry.entry.timestamp,
        entry.service(),
        entry.message()
    );
    if let Some(labels) = &entry.entry.labels {
        let pairs: Vec<_> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
        line.push_str(&format!(" {{{}}}", pairs.join(", ")));
    }
    line.push_str(&format!(
        " (from {} via {} at {})",
        entry.client_ip, entry.ingested_node_id, entry.received_at
    ));
    line
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
