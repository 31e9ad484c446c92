//! `fieldsense` – command line entry point of the vision pipeline.
//!
//! - `fieldsense replay <recording.jsonl>` feeds a recorded detection stream
//!   through the pipeline and prints every fused frame as a JSON line.
//! - `fieldsense config` prints the effective configuration as TOML, or
//!   writes it with `--write`.
//!
//! Ctrl-C stops a running replay after the current record.

mod config;
mod replay;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use fieldsense_runtime::{LogFormat, TelemetryOptions, VisionFilter, init_tracing_with};
use tracing::{info, warn};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "fieldsense")]
#[command(about = "Multi-camera robot and ball state estimation")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $FIELDSENSE_CONFIG or
    /// ~/.fieldsense/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines, overriding $FIELDSENSE_LOG_FORMAT.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines recording through the pipeline.
    Replay {
        /// Recording to replay.
        recording: PathBuf,

        /// Only print the summary, not the frames.
        #[arg(long)]
        quiet: bool,
    },

    /// Print the effective configuration.
    Config {
        /// Write the effective configuration to the config path.
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let mut telemetry = TelemetryOptions::from_env("fieldsense");
    if cli.log_json {
        telemetry.format = LogFormat::Json;
    }
    let _guard = init_tracing_with(&telemetry);
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let path = config::config_path(cli.config.as_deref());
    let config = config::load(&path)?;

    match cli.command {
        Commands::Config { write } => {
            if write {
                config::save_to(&config, &path)?;
                info!(path = %path.display(), "configuration written");
            } else {
                print!("{}", config::to_toml(&config)?);
            }
        }
        Commands::Replay { recording, quiet } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
                warn!(error = %e, "failed to install Ctrl-C handler");
            }

            // Replays are deterministic: publish once per accepted frame.
            let filter = VisionFilter::new(fieldsense_runtime::VisionFilterConfig {
                use_threads: false,
                ..config
            })?;
            let input = BufReader::new(File::open(&recording)?);
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let summary = replay::run(&filter, input, &mut out, quiet, &shutdown)?;
            info!(
                records = summary.records,
                skipped = summary.skipped_lines,
                frames = summary.frames,
                kicks = summary.kicks,
                "replay finished"
            );
        }
    }
    Ok(())
}
