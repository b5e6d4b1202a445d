use crate::models::{Dataset, JobRecord, QuoteRecord};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{
    env,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{error, warn};

pub fn resolve_quotes_path() -> PathBuf {
    env::var("PULSE_QUOTES_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/quotes.json"))
}

pub fn resolve_jobs_path() -> PathBuf {
    env::var("PULSE_JOBS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/jobs.json"))
}

/// Load both row files. Missing or unreadable files degrade to empty sets so
/// the service still answers with a (zeroed) report.
pub async fn load_dataset(quotes_path: &Path, jobs_path: &Path) -> Dataset {
    Dataset {
        quotes: load_rows::<QuoteRecord>(quotes_path, "quote").await,
        jobs: load_rows::<JobRecord>(jobs_path, "job").await,
    }
}

async fn load_rows<T: DeserializeOwned>(path: &Path, what: &str) -> Vec<T> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("{what} file {} not found, starting empty", path.display());
            return Vec::new();
        }
        Err(err) => {
            error!("failed to read {what} file: {err}");
            return Vec::new();
        }
    };

    let rows = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Array(rows)) => rows,
        Ok(_) => {
            error!("{what} file {} is not a JSON array", path.display());
            return Vec::new();
        }
        Err(err) => {
            error!("failed to parse {what} file: {err}");
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        match serde_json::from_value::<T>(row) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("skipped {skipped} malformed {what} rows in {}", path.display());
    }
    records
}
