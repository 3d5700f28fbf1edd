//! Writes a distribution to disk and reads the artifacts back.
//!
//! Layout under the output directory (names configurable):
//!
//! ```text
//! <out>/tree.json
//! <out>/root.txt
//! <out>/proofs/<identity-hex>.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use dropcraft_core::{parse_hex32, Digest, Identity};
use dropcraft_prover::{Distribution, LeafRecord};

use crate::artifacts::{ProofFile, TreeFile};
use crate::{AggregatorError, Result};

/// File and directory names inside the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    pub tree_file: String,
    pub root_file: String,
    pub proofs_dir: String,
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self {
            tree_file: "tree.json".to_string(),
            root_file: "root.txt".to_string(),
            proofs_dir: "proofs".to_string(),
        }
    }
}

/// What an export wrote.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub root: Digest,
    pub total_amount: u64,
    pub tree_path: PathBuf,
    pub root_path: PathBuf,
    pub proofs_written: usize,
}

pub struct Exporter {
    out_dir: PathBuf,
    layout: ExportLayout,
}

impl Exporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self::with_layout(out_dir, ExportLayout::default())
    }

    pub fn with_layout(out_dir: impl Into<PathBuf>, layout: ExportLayout) -> Self {
        Self {
            out_dir: out_dir.into(),
            layout,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn tree_path(&self) -> PathBuf {
        self.out_dir.join(&self.layout.tree_file)
    }

    pub fn root_path(&self) -> PathBuf {
        self.out_dir.join(&self.layout.root_file)
    }

    pub fn proof_path(&self, identity: &Identity) -> PathBuf {
        self.out_dir
            .join(&self.layout.proofs_dir)
            .join(format!("{}.json", hex::encode(identity)))
    }

    /// Write the tree file, the root file and one proof file per identity.
    pub fn export<R>(&self, distribution: &Distribution<R>, generated_at: u64) -> Result<ExportSummary>
    where
        R: LeafRecord + Serialize,
    {
        let proofs_dir = self.out_dir.join(&self.layout.proofs_dir);
        fs::create_dir_all(&proofs_dir).map_err(|e| AggregatorError::io(&proofs_dir, e))?;

        let tree = TreeFile::from_distribution(distribution, generated_at);

        let tree_path = self.tree_path();
        write_json(&tree_path, &tree)?;

        let root_path = self.root_path();
        let root_line = format!("{}\n", hex::encode(tree.root));
        fs::write(&root_path, root_line).map_err(|e| AggregatorError::io(&root_path, e))?;

        let mut proofs_written = 0;
        for leaf in &tree.leaves {
            let identity = leaf.record.identity();
            let proof = ProofFile {
                record: leaf.record.clone(),
                proof: leaf.proof.clone(),
                root: tree.root,
            };
            write_json(&self.proof_path(identity), &proof)?;
            proofs_written += 1;
        }

        info!(
            "Exported distribution {} ({} leaves, total {}) to {}",
            hex::encode(&tree.root[..8]),
            tree.total_leaves,
            tree.total_amount,
            self.out_dir.display(),
        );

        Ok(ExportSummary {
            root: tree.root,
            total_amount: tree.total_amount,
            tree_path,
            root_path,
            proofs_written,
        })
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AggregatorError::json(path, e))?;
    fs::write(path, json).map_err(|e| AggregatorError::io(path, e))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).map_err(|e| AggregatorError::io(path, e))?;
    serde_json::from_str(&json).map_err(|e| AggregatorError::json(path, e))
}

/// Load a tree file.
pub fn load_tree<R: DeserializeOwned>(path: &Path) -> Result<TreeFile<R>> {
    read_json(path)
}

/// Load a single identity's proof file.
pub fn load_proof<R: DeserializeOwned>(path: &Path) -> Result<ProofFile<R>> {
    read_json(path)
}

/// Read a root file (hex, surrounding whitespace ignored).
pub fn read_root(path: &Path) -> Result<Digest> {
    let text = fs::read_to_string(path).map_err(|e| AggregatorError::io(path, e))?;
    Ok(parse_hex32(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropcraft_core::Entitlement;
    use dropcraft_prover::DistributionBuilder;
    use tempfile::TempDir;

    fn distribution() -> Distribution<Entitlement> {
        DistributionBuilder::new()
            .build(vec![
                Entitlement::new([0xA1; 32], 100),
                Entitlement::new([0xB2; 32], 200),
                Entitlement::new([0xC3; 32], 150),
                Entitlement::new([0xD4; 32], 50),
            ])
            .unwrap()
    }

    #[test]
    fn test_export_writes_all_artifacts() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let dist = distribution();

        let summary = exporter.export(&dist, 1_700_000_000).unwrap();
        assert_eq!(summary.root, dist.root());
        assert_eq!(summary.total_amount, 500);
        assert_eq!(summary.proofs_written, 4);

        let root_text = fs::read_to_string(dir.path().join("root.txt")).unwrap();
        assert_eq!(root_text, format!("{}\n", hex::encode(dist.root())));

        let proof_count = fs::read_dir(dir.path().join("proofs")).unwrap().count();
        assert_eq!(proof_count, 4);
    }

    #[test]
    fn test_artifacts_load_back() {
        let dir = TempDir::new().unwrap();
        let exporter = Exporter::new(dir.path());
        let dist = distribution();
        exporter.export(&dist, 1_700_000_000).unwrap();

        let tree: TreeFile<Entitlement> = load_tree(&exporter.tree_path()).unwrap();
        assert_eq!(tree.root, dist.root());
        assert_eq!(tree.total_leaves, 4);
        assert!(tree.is_consistent());

        assert_eq!(read_root(&exporter.root_path()).unwrap(), dist.root());

        let proof: ProofFile<Entitlement> = load_proof(&exporter.proof_path(&[0xB2; 32])).unwrap();
        assert_eq!(proof.record.amount, 200);
        assert_eq!(proof.proof, dist.proof_for(&[0xB2; 32]).unwrap().siblings);
        assert!(proof.verify_against(&dist.root()));
    }

    #[test]
    fn test_custom_layout() {
        let dir = TempDir::new().unwrap();
        let layout = ExportLayout {
            tree_file: "distribution.json".to_string(),
            root_file: "ROOT".to_string(),
            proofs_dir: "claims".to_string(),
        };
        let exporter = Exporter::with_layout(dir.path().join("nested"), layout);
        exporter.export(&distribution(), 0).unwrap();

        assert!(dir.path().join("nested/distribution.json").exists());
        assert!(dir.path().join("nested/ROOT").exists());
        assert!(dir
            .path()
            .join("nested/claims")
            .join(format!("{}.json", hex::encode([0xD4; 32])))
            .exists());
    }

    #[test]
    fn test_read_root_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("root.txt");
        fs::write(&path, "not-a-root\n").unwrap();
        assert!(matches!(read_root(&path), Err(AggregatorError::InvalidHex(_))));
    }
}
