use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use filedrop_services::{CleanupService, LocalStorage, Storage};

use filedrop_cli::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "filedrop-cleanup")]
#[command(about = "Delete expired files from a local filedrop store")]
struct Args {
    /// Directory holding file contents
    #[arg(long, default_value = "files")]
    files_path: String,

    /// Directory holding metadata records
    #[arg(long, default_value = "meta")]
    meta_path: String,

    /// Do not log each deleted file
    #[arg(long)]
    no_logs: bool,

    /// Keep running and sweep every N minutes (0 = sweep once and exit)
    #[arg(long, default_value = "0")]
    every_minutes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let storage: Arc<dyn Storage> =
        Arc::new(LocalStorage::new(&args.files_path, &args.meta_path).await?);

    if args.every_minutes == 0 {
        let service = CleanupService::new(storage, Duration::ZERO, args.no_logs);
        let report = service.run_once().await?;
        tracing::info!(
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            "Cleanup finished"
        );
        if report.failed > 0 {
            anyhow::bail!("{} file(s) could not be cleaned up", report.failed);
        }
        return Ok(());
    }

    let every = Duration::from_secs(args.every_minutes.saturating_mul(60));
    let handle = Arc::new(CleanupService::new(storage, every, args.no_logs)).start();
    tracing::info!(every_minutes = args.every_minutes, "Periodic cleanup started");

    tokio::signal::ctrl_c().await?;
    handle.abort();
    tracing::info!("Cleanup stopped");
    Ok(())
}
