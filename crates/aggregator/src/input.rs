//! Entitlement source input: a JSON array of records.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{AggregatorError, Result};

/// Parse records from a JSON array.
pub fn parse_records<R: DeserializeOwned>(json: &str) -> Result<Vec<R>> {
    serde_json::from_str(json).map_err(|e| AggregatorError::Json {
        path: "<input>".to_string(),
        message: e.to_string(),
    })
}

/// Load records from a JSON file.
pub fn load_records<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>> {
    let json = std::fs::read_to_string(path).map_err(|e| AggregatorError::io(path, e))?;
    let records: Vec<R> = serde_json::from_str(&json).map_err(|e| AggregatorError::json(path, e))?;
    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
