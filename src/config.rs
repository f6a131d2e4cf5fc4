use crate::error::{EngineError, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which report the binary prints once the command log is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Report {
    /// Final state of every order.
    Orders,
    /// Rating count and average per rated user.
    Reputation,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input command log (CSV)
    pub input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "MAIDLINK_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Report written to stdout after processing.
    #[arg(long, value_enum, env = "MAIDLINK_REPORT", default_value_t = Report::Orders)]
    pub report: Report,

    /// Log filter directive, e.g. `info` or `maidlink=debug`.
    #[arg(long, env = "MAIDLINK_LOG", default_value = "warn")]
    pub log_level: String,
}

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub input: PathBuf,
    pub db_path: Option<PathBuf>,
    pub report: Report,
    pub log_filter: String,
}

impl Cli {
    pub fn config(&self) -> Result<AppConfig> {
        let log_filter = self.log_level.trim();
        if log_filter.is_empty() {
            return Err(EngineError::Validation(
                "Log level must not be empty".to_string(),
            ));
        }
        Ok(AppConfig {
            input: self.input.clone(),
            db_path: self.db_path.clone(),
            report: self.report,
            log_filter: log_filter.to_string(),
        })
    }
}
