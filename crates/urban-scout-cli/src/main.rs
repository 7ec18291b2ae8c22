use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use urban_scout::config::default_data_dir;
use urban_scout::dashboard::{
    display_issue_type, export_filename, scan_report, write_csv, DashboardStats, ScanMarker,
};
use urban_scout::logging::{self, LogFormat};
use urban_scout::{load_config_or_default, Persistence, ScanOrchestrator, ScoutConfig};

#[derive(Parser)]
#[command(name = "urban-scout")]
#[command(about = "Scan street-level imagery for public infrastructure issues")]
struct Cli {
    /// Path to the JSON config file (default: ~/.urban-scout/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a single location
    Scan {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Retries after a failed attempt (default from config)
        #[arg(long)]
        retries: Option<u32>,
    },
    /// Scan every `lat,lon` row of a CSV file (header optional)
    Batch {
        #[arg(value_name = "CSV")]
        file: PathBuf,
    },
    /// List stored scans, newest first
    List,
    /// Show one scan with its report
    Show { id: i64 },
    /// Regenerate the AI report of a stored scan
    Regenerate { id: i64 },
    /// Delete a scan and its images
    Delete { id: i64 },
    /// Export all scans as CSV
    Export {
        #[arg(value_name = "CSV")]
        file: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    let config_path = cli
        .config
        .unwrap_or_else(|| default_data_dir().join("config.json"));
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    match cli.command {
        Command::Scan { lat, lon, retries } => {
            let orchestrator = orchestrator(&config)?;
            let retries = retries.unwrap_or(config.scan.max_retries);
            Ok(exit_code(orchestrator.scan_with_retry(lat, lon, retries)))
        }
        Command::Batch { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let locations = parse_locations(&text)?;
            let summary = orchestrator(&config)?.scan_multiple(&locations);
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(exit_code(summary.failed == 0))
        }
        Command::List => {
            let scans = open_persistence(&config)?.list();
            let stats = DashboardStats::from_scans(&scans);
            println!(
                "{} scans, {} issues, {} high severity",
                stats.total_scans, stats.total_issues, stats.high_severity
            );
            for scan in &scans {
                let marker = ScanMarker::from_scan(scan);
                println!(
                    "#{:<5} {:>11.6} {:>12.6}  {}  [{}] {}",
                    scan.id,
                    scan.latitude,
                    scan.longitude,
                    scan.created_at.format("%Y-%m-%d %H:%M"),
                    marker.color.as_str(),
                    marker.tooltip
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { id } => {
            let Some(scan) = open_persistence(&config)?.get_by_id(id) else {
                bail!("scan {} not found", id);
            };
            let report = scan_report(&scan);
            println!("Scan {} at {}", scan.id, scan.coordinates());
            println!("Created:   {}", scan.created_at.to_rfc3339());
            println!("Image:     {}", scan.image_url.as_deref().unwrap_or("-"));
            println!("Annotated: {}", scan.annotated_image_url.as_deref().unwrap_or("-"));
            println!("Detections: {}", scan.detection_results.len());
            for detection in &scan.detection_results {
                println!("  {} {:.2}", detection.label, detection.score);
            }
            println!("\nSummary: {}", report.summary);
            for issue in &report.issues {
                println!(
                    "  [{}] {}: {}",
                    issue.severity.raw(),
                    display_issue_type(&issue.issue_type),
                    issue.description
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Regenerate { id } => Ok(exit_code(orchestrator(&config)?.regenerate_report(id))),
        Command::Delete { id } => Ok(exit_code(open_persistence(&config)?.delete(id))),
        Command::Export { file } => {
            let path = file.unwrap_or_else(|| PathBuf::from(export_filename()));
            let scans = open_persistence(&config)?.list();
            let out = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_csv(std::io::BufWriter::new(out), &scans)?;
            println!("Exported {} scans to {}", scans.len(), path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn orchestrator(config: &ScoutConfig) -> anyhow::Result<ScanOrchestrator> {
    ScanOrchestrator::from_config(config).context("building scan orchestrator")
}

fn open_persistence(config: &ScoutConfig) -> anyhow::Result<Persistence> {
    Persistence::open(&config.storage).context("opening scan storage")
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Parses `lat,lon` rows. A first row that is not numeric is a header;
/// blank lines and `#` comments are skipped.
fn parse_locations(text: &str) -> anyhow::Result<Vec<(f64, f64)>> {
    let mut locations = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split(',').map(str::trim);
        let parsed = match (fields.next(), fields.next()) {
            (Some(lat), Some(lon)) => lat.parse::<f64>().ok().zip(lon.parse::<f64>().ok()),
            _ => None,
        };
        match parsed {
            Some(location) => locations.push(location),
            None if index == 0 => continue,
            None => bail!("line {}: expected `lat,lon`, got '{}'", index + 1, line),
        }
    }
    Ok(locations)
}
