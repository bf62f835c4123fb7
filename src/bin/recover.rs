//! brt-recover Binary
//!
//! Replays the log in LOG_DIR against the tree files in the current directory.

use std::path::PathBuf;
use std::process::ExitCode;

use brtrecover::{Recovery, RecoveryConfig, RecoveryError};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// Crash recovery for BRT tree files
#[derive(Parser, Debug)]
#[command(name = "brt-recover")]
#[command(about = "Replay write-ahead log segments against the tree files in the current directory")]
#[command(version)]
struct Args {
    /// Directory holding the log segments
    log_dir: PathBuf,

    /// Page cache size in MB
    #[arg(short = 'c', long, default_value = "64")]
    cache_mb: usize,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,brtrecover=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("brt-recover v{}", brtrecover::VERSION);

    let cache_size = match cache_size_bytes(args.cache_mb) {
        Ok(size) => size,
        Err(e) => return fail(e),
    };

    let config = RecoveryConfig::builder()
        .data_dir(".")
        .log_dir(&args.log_dir)
        .cache_size(cache_size)
        .build();

    match Recovery::run(&config) {
        Ok(result) => {
            tracing::info!(
                "Recovery complete: {} records from {} segments",
                result.records_replayed,
                result.segments_replayed
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn cache_size_bytes(cache_mb: usize) -> brtrecover::Result<usize> {
    cache_mb
        .checked_mul(1024 * 1024)
        .ok_or_else(|| RecoveryError::Config(format!("--cache-mb {} is too large", cache_mb)))
}

fn fail(e: RecoveryError) -> ExitCode {
    tracing::error!("Recovery failed: {}", e);
    let code = e.exit_code().clamp(1, 255) as u8;
    ExitCode::from(code)
}
