//! # Media Shrinker - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Composizione della configurazione: default < file JSON < flag CLI
//! - Avvio dell'orchestratore e del display su task separati
//! - Cancellazione con Escape o Ctrl+C: uccide i processi figli ed esce con 130
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-shrinker --src ~/Camera --dst ~/Camera/smaller --sort size --order descending --clean
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use console::Term;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use media_shrinker::display::{render, JsonDisplay, TerminalDisplay};
use media_shrinker::json_output::JsonMessage;
use media_shrinker::terminal::{escape_pressed, EscapeListener};
use media_shrinker::{ChannelSink, Config, MediaOptimizer, ProcessRegistry, SortKey, SortOrder};

/// Exit status after a user cancellation
const CANCELLED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[command(name = "media-shrinker")]
#[command(about = "Shrink a folder of photos and videos into a smaller copy, resuming where the last run stopped")]
struct Args {
    /// Directory with the original media files
    #[arg(long)]
    src: Option<PathBuf>,

    /// Directory for the shrunk files
    #[arg(long)]
    dst: Option<PathBuf>,

    /// Scratch directory for files being converted
    #[arg(long)]
    tmp: Option<PathBuf>,

    /// Delete source files once their shrunk copy exists
    #[arg(long)]
    clean: bool,

    /// Only report the current status, convert nothing
    #[arg(short, long)]
    report_only: bool,

    /// Processing order key
    #[arg(long, value_enum)]
    sort: Option<SortKey>,

    /// Processing order direction
    #[arg(long, value_enum)]
    order: Option<SortOrder>,

    /// Ignore files smaller than this many bytes
    #[arg(long)]
    min_size: Option<u64>,

    /// Video CRF value (0-51, lower = better quality)
    #[arg(short, long)]
    crf: Option<u8>,

    /// JPEG quality (1-100)
    #[arg(short = 'q', long)]
    jpeg_quality: Option<u8>,

    /// Give up on a single ffprobe/ffmpeg call after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// ffmpeg program to run
    #[arg(long)]
    ffmpeg: Option<String>,

    /// ffprobe program to run
    #[arg(long)]
    ffprobe: Option<String>,

    /// Output progress and status as JSON lines
    #[arg(long)]
    json: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let config = build_config(&args).await?;

    if let Some(path) = &args.save_config {
        config.save_to_file(path).await?;
        info!("Saved configuration to {}", path.display());
    }

    let registry = ProcessRegistry::new();
    let (sink, rx) = ChannelSink::new();
    let optimizer = MediaOptimizer::new(config.clone(), Arc::new(sink), registry.clone())?;

    let display = if config.json_output {
        tokio::spawn(render(JsonDisplay::new(&config), rx))
    } else {
        tokio::spawn(render(TerminalDisplay::new(), rx))
    };

    let mut run = tokio::spawn(async move { optimizer.run().await });
    let (escape, pressed) = EscapeListener::spawn(!config.json_output);

    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        _ = tokio::signal::ctrl_c() => cancel(&registry, &escape, "Ctrl+C"),
        _ = escape_pressed(pressed) => cancel(&registry, &escape, "Escape"),
    };
    escape.shutdown();
    let outcome = outcome.context("Orchestrator task failed")?;

    // The orchestrator dropped its sink, so the display drains and stops
    let _ = display.await;

    match outcome {
        Ok(report) => {
            info!(
                "Finished: {} shrunk, {} deleted",
                report.stats.count, report.stats.deleted_count
            );
            Ok(())
        }
        Err(e) => {
            if config.json_output {
                JsonMessage::error(e.to_string()).emit();
            }
            Err(e.into())
        }
    }
}

/// `RUST_LOG` wins; otherwise warn, info with -v, debug with -vv
fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Defaults, then the config file, then command line flags
async fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow::anyhow!("Config file does not exist: {}", path.display()));
            }
            Config::from_file(path).await?
        }
        None => match Config::default_path() {
            Some(path) => Config::from_file(&path)
                .await
                .with_context(|| format!("Invalid config file {}", path.display()))?,
            None => Config::default(),
        },
    };

    if let Some(src) = &args.src {
        config.src_dir = src.clone();
    }
    if let Some(dst) = &args.dst {
        config.dst_dir = dst.clone();
    }
    if let Some(tmp) = &args.tmp {
        config.tmp_dir = tmp.clone();
    }
    config.clean_source |= args.clean;
    config.report_only |= args.report_only;
    config.json_output |= args.json;
    if let Some(sort) = args.sort {
        config.sort_key = sort;
    }
    if let Some(order) = args.order {
        config.sort_order = order;
    }
    if let Some(min_size) = args.min_size {
        config.min_file_size = min_size;
    }
    if let Some(crf) = args.crf {
        config.video_crf = crf;
    }
    if let Some(quality) = args.jpeg_quality {
        config.jpeg_quality = quality;
    }
    if let Some(timeout) = args.timeout {
        config.video_timeout_secs = Some(timeout);
    }
    if let Some(ffmpeg) = &args.ffmpeg {
        config.ffmpeg_path = ffmpeg.clone();
    }
    if let Some(ffprobe) = &args.ffprobe {
        config.ffprobe_path = ffprobe.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Kill every child of the run and leave. `exit` skips destructors, so the
/// terminal settings are restored here.
fn cancel(registry: &ProcessRegistry, escape: &EscapeListener, trigger: &str) -> ! {
    let killed = registry.kill_all();
    warn!("{} pressed, killed {} running processes", trigger, killed);
    escape.shutdown();
    let _ = Term::stderr().show_cursor();
    std::process::exit(CANCELLED_EXIT_CODE)
}
