//! Logstore CLI
//!
//! Command-line client for a running Logstore server:
//! - Ingest log entries from a file or stdin
//! - Query a time range
//! - Check status
//! - Print a default config file

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use logstore::api::dto::IngestResponse;
use logstore::config::generate_default_config;
use logstore::LogEntry;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "logstore-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the Logstore log storage service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Output format (table, json, csv)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest entries from a JSON array or JSON lines file ("-" for stdin)
    Ingest {
        /// Input file
        input: PathBuf,
        /// Batch ID for idempotent retries (suffixed per chunk)
        #[arg(short, long)]
        batch_id: Option<String>,
        /// Entries per request
        #[arg(long, default_value = "1000")]
        chunk_size: usize,
    },

    /// Query entries in a time range
    Query {
        /// Range start (inclusive)
        #[arg(long, requires = "end", conflicts_with = "last")]
        start: Option<i64>,
        /// Range end (inclusive)
        #[arg(long, requires = "start")]
        end: Option<i64>,
        /// Relative range ending now (e.g., 15m, 2h, 7d)
        #[arg(short, long)]
        last: Option<String>,
        /// Use milliseconds instead of seconds for --last
        #[arg(long)]
        millis: bool,
        /// Substring filter
        #[arg(short, long, default_value = "")]
        text: String,
    },

    /// Show server health
    Health,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Ingest {
            input,
            batch_id,
            chunk_size,
        } => {
            let content = read_input(&input)?;
            let entries = parse_entries(&content)?;
            if entries.is_empty() {
                println!("Nothing to ingest");
                return Ok(());
            }

            let chunks: Vec<&[serde_json::Value]> = entries.chunks(chunk_size.max(1)).collect();
            let mut stored = 0;
            let mut failed = 0;
            let mut retryable = false;

            for (n, chunk) in chunks.iter().enumerate() {
                let mut request = client
                    .post(format!("{}/ingest", cli.api_url))
                    .json(chunk);
                if let Some(id) = &batch_id {
                    let chunk_id = if chunks.len() == 1 {
                        id.clone()
                    } else {
                        format!("{}-{}", id, n)
                    };
                    request = request.query(&[("batch_id", chunk_id)]);
                }

                let response = request.send().await?;
                let status = response.status();
                let text = response.text().await.unwrap_or_default();

                match serde_json::from_str::<IngestResponse>(&text) {
                    Ok(report) => {
                        stored += report.accepted;
                        failed += report.rejected;
                        retryable |= status == reqwest::StatusCode::SERVICE_UNAVAILABLE;
                        for result in report.results.iter().filter(|r| r.status != "stored") {
                            eprintln!(
                                "  entry {}: {}",
                                result.index + n * chunk_size.max(1),
                                result.error.as_deref().unwrap_or("failed")
                            );
                        }
                        if cli.format == "json" {
                            println!("{}", serde_json::to_string_pretty(&report)?);
                        }
                    }
                    Err(_) => {
                        eprintln!("Failed ({}): {}", status, text);
                        std::process::exit(1);
                    }
                }
            }

            println!("Stored {} entries, {} failed", stored, failed);
            if failed > 0 {
                if retryable && batch_id.is_some() {
                    eprintln!("Storage failures are retryable: re-run with the same --batch-id");
                }
                std::process::exit(1);
            }
        }

        Commands::Query {
            start,
            end,
            last,
            millis,
            text,
        } => {
            let (start, end) = match (start, end, last) {
                (Some(start), Some(end), _) => (start, end),
                (_, _, Some(last)) => {
                    let duration = parse_duration(&last)?;
                    let now = Utc::now();
                    let from = now - duration;
                    if millis {
                        (from.timestamp_millis(), now.timestamp_millis())
                    } else {
                        (from.timestamp(), now.timestamp())
                    }
                }
                _ => {
                    eprintln!("Specify --start and --end, or --last");
                    std::process::exit(1);
                }
            };

            let response = client
                .get(format!("{}/query", cli.api_url))
                .query(&[
                    ("start", start.to_string()),
                    ("end", end.to_string()),
                    ("text", text),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                eprintln!("Query failed ({}): {}", status, text);
                std::process::exit(1);
            }

            let skipped = response
                .headers()
                .get("x-logstore-skipped")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let entries: Vec<LogEntry> = response.json().await?;

            match cli.format.as_str() {
                "json" => {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
                "csv" => {
                    print_csv(&entries)?;
                }
                _ => {
                    print_table(&entries, millis);
                }
            }

            if let Some(skipped) = skipped {
                eprintln!("({} stored entries could not be read)", skipped);
            }
        }

        Commands::Health => {
            let response = client.get(format!("{}/health", cli.api_url)).send().await;

            match response {
                Ok(resp) => {
                    let code = resp.status();
                    let health: serde_json::Value = resp.json().await.unwrap_or_default();
                    if cli.format == "json" {
                        println!("{}", serde_json::to_string_pretty(&health)?);
                    } else {
                        println!("Logstore v{}", env!("CARGO_PKG_VERSION"));
                        println!();
                        println!("Status:  {}", health["status"].as_str().unwrap_or("unknown"));
                        println!("Backend: {}", health["backend"].as_str().unwrap_or("-"));
                        println!("Storage: {}", health["storage"].as_str().unwrap_or("-"));

                        let index = &health["index"];
                        if index.is_object() {
                            println!();
                            println!("Index:");
                            println!("  Cache enabled: {}", index["cache_enabled"]);
                            println!("  Single writer: {}", index["single_writer"]);
                            println!("  Cached keys: {}", index["cached_keys"]);
                            println!("  Window start: {}", index["window_start"]);
                        }

                        if let Some(uptime) = health["uptime_seconds"].as_u64() {
                            println!();
                            println!("Uptime: {}", format_duration(uptime));
                        }
                    }
                    if !code.is_success() {
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Cannot connect to Logstore API at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the Logstore server is running:");
                    eprintln!("  cargo run --bin logstore");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn read_input(input: &PathBuf) -> Result<String, Box<dyn std::error::Error>> {
    if input.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}

/// Accepts a JSON array or one JSON object per line
fn parse_entries(content: &str) -> Result<Vec<serde_json::Value>, Box<dyn std::error::Error>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| Box::<dyn std::error::Error>::from(format!("line {}: {}", n + 1, e)))
        })
        .collect()
}

fn parse_duration(s: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let s = s.trim().to_lowercase();

    if let Some(seconds) = s.strip_suffix('s') {
        Ok(Duration::seconds(seconds.parse()?))
    } else if let Some(minutes) = s.strip_suffix('m') {
        Ok(Duration::minutes(minutes.parse()?))
    } else if let Some(hours) = s.strip_suffix('h') {
        Ok(Duration::hours(hours.parse()?))
    } else if let Some(days) = s.strip_suffix('d') {
        Ok(Duration::days(days.parse()?))
    } else if let Some(weeks) = s.strip_suffix('w') {
        Ok(Duration::weeks(weeks.parse()?))
    } else {
        Err(format!("Invalid duration format: {}. Use: 30s, 15m, 2h, 7d, 4w", s).into())
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}

fn print_table(entries: &[LogEntry], millis: bool) {
    if entries.is_empty() {
        println!("No entries for the selected time range");
        return;
    }

    println!("{:<20} {:<20} {}", "Time", "UTC", "Log");
    println!("{}", "-".repeat(80));

    for entry in entries {
        let utc = if millis {
            chrono::DateTime::from_timestamp_millis(entry.time)
        } else {
            chrono::DateTime::from_timestamp(entry.time, 0)
        }
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

        println!("{:<20} {:<20} {}", entry.time, utc, entry.message);
    }
}

fn print_csv(entries: &[LogEntry]) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    writer.write_record(["time", "log"])?;
    for entry in entries {
        writer.write_record([entry.time.to_string(), entry.message.clone()])?;
    }
    writer.flush()?;
    Ok(())
}
