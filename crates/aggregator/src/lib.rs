//! Dropcraft Aggregator
//!
//! The off-chain batch job. Loads an entitlement snapshot, builds the
//! distribution tree and exports the artifacts claimants and the ledger
//! operator need: the full tree, the bare root, and one proof file per
//! identity.

pub mod artifacts;
pub mod export;
pub mod input;

pub use artifacts::{ProofFile, TreeFile, TreeLeaf};
pub use export::{load_proof, load_tree, read_root, ExportLayout, ExportSummary, Exporter};
pub use input::{load_records, parse_records};

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use dropcraft_core::ParseHexError;
use dropcraft_prover::{Distribution, DistributionBuilder, LeafRecord, ProverError};

/// Load → build → export, under one builder configuration.
pub struct BatchJob {
    builder: DistributionBuilder,
    exporter: Exporter,
}

impl BatchJob {
    pub fn new(builder: DistributionBuilder, exporter: Exporter) -> Self {
        Self { builder, exporter }
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// Build a distribution from `input` and write its artifacts.
    pub fn run<R>(&self, input: &Path) -> Result<(Distribution<R>, ExportSummary)>
    where
        R: LeafRecord + Serialize + DeserializeOwned,
    {
        let records: Vec<R> = load_records(input)?;
        let record_count = records.len();

        let distribution = self.builder.build(records)?;
        let summary = self.exporter.export(&distribution, unix_now())?;

        info!(
            "Batch complete: {} input records -> {} leaves, root {}",
            record_count,
            distribution.len(),
            hex::encode(&distribution.root()[..8]),
        );
        Ok((distribution, summary))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Aggregator errors
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {message}")]
    Json { path: String, message: String },

    #[error("Invalid root: {0}")]
    InvalidHex(#[from] ParseHexError),

    #[error("Build failed: {0}")]
    Build(#[from] ProverError),
}

impl AggregatorError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        AggregatorError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, e: serde_json::Error) -> Self {
        AggregatorError::Json {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
