use clap::Parser;
use maidlink::application::marketplace::Marketplace;
use maidlink::config::{Cli, Report};
use maidlink::domain::ports::EventEmitterRef;
use maidlink::infrastructure::notify::TracingEmitter;
use maidlink::interfaces::csv::command_reader::CommandReader;
use maidlink::interfaces::csv::report_writer::ReportWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "storage-rocksdb")]
fn open_persistent(db_path: &Path, emitter: EventEmitterRef) -> Result<Marketplace> {
    use maidlink::infrastructure::rocksdb::RocksDBStore;

    let store = RocksDBStore::open(db_path).into_diagnostic()?;
    Ok(Marketplace::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store),
        emitter,
    ))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent(_db_path: &Path, emitter: EventEmitterRef) -> Result<Marketplace> {
    eprintln!(
        "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
    );
    Ok(Marketplace::in_memory(emitter))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config().into_diagnostic()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).into_diagnostic()?)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let emitter: EventEmitterRef = Arc::new(TracingEmitter);
    let market = match &config.db_path {
        Some(db_path) => open_persistent(db_path, emitter)?,
        None => Marketplace::in_memory(emitter),
    };

    // Replay the command log; a failed command is reported and skipped.
    let file = File::open(&config.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for (line, command) in reader.commands() {
        let at = line.map(|n| format!(" on line {n}")).unwrap_or_default();
        match command {
            Ok(command) => {
                if let Err(e) = market.process(command).await {
                    eprintln!("Error processing command{}: {}", at, e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command{}: {}", at, e);
            }
        }
    }

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    match config.report {
        Report::Orders => writer
            .write_orders(&market.orders().await.into_diagnostic()?)
            .into_diagnostic()?,
        Report::Reputation => writer
            .write_reputations(&market.reputations().await.into_diagnostic()?)
            .into_diagnostic()?,
    }

    Ok(())
}
