//! Dropcraft CLI
//!
//! Operator tool for the off-chain side of a distribution: build the tree
//! from an entitlement snapshot, hand out proofs, and check them offline.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use dropcraft_aggregator::{
    load_proof, load_tree, read_root, AggregatorError, BatchJob, ExportLayout, Exporter,
    ProofFile, TreeFile,
};
use dropcraft_core::{parse_hex32, Digest, Entitlement, Identity, Registration};
use dropcraft_logging::{init, LogLevel};
use dropcraft_prover::{DistributionBuilder, DuplicatePolicy, LeafRecord};
use dropcraft_settings::{expand_path, DropcraftConfig, Settings};

/// Dropcraft - Merkle-proof entitlement distributions
#[derive(Parser)]
#[command(name = "dropcraft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a distribution from an input file and export its artifacts
    Build {
        /// JSON array of `{identity, amount}` (or `{identity, label, score}`)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (overrides the configured one)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Keep the last record for a repeated identity instead of failing
        #[arg(long)]
        last_wins: bool,

        /// Input holds registration records
        #[arg(long)]
        registration: bool,
    },

    /// Print one identity's proof file from a tree file
    Proof {
        #[arg(short, long)]
        tree: PathBuf,

        /// Identity as hex
        #[arg(long)]
        identity: String,
    },

    /// Verify a proof file offline
    Verify {
        #[arg(short, long)]
        proof: PathBuf,

        /// Expected root as hex (defaults to the root in the proof file)
        #[arg(long, conflicts_with = "root_file")]
        root: Option<String>,

        /// File holding the expected root
        #[arg(long)]
        root_file: Option<PathBuf>,
    },

    /// Show a tree file's root, size and depth
    Inspect {
        #[arg(short, long)]
        tree: PathBuf,
    },
}

/// A tree file of either record kind
enum AnyTree {
    Entitlements(TreeFile<Entitlement>),
    Registrations(TreeFile<Registration>),
}

/// A proof file of either record kind
#[derive(Serialize)]
#[serde(untagged)]
enum AnyProof {
    Entitlement(ProofFile<Entitlement>),
    Registration(ProofFile<Registration>),
}

impl AnyProof {
    fn identity(&self) -> &Identity {
        match self {
            Self::Entitlement(p) => p.identity(),
            Self::Registration(p) => p.identity(),
        }
    }

    fn root(&self) -> Digest {
        match self {
            Self::Entitlement(p) => p.root,
            Self::Registration(p) => p.root,
        }
    }

    fn verify_against(&self, root: &Digest) -> bool {
        match self {
            Self::Entitlement(p) => p.verify_against(root),
            Self::Registration(p) => p.verify_against(root),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init(LogLevel::from_verbosity(cli.verbose));

    let settings: Settings<DropcraftConfig> = Settings::load_or_default(cli.config.as_deref())
        .context("Failed to load settings")?;
    debug!("Using settings at {}", settings.path().display());

    match cli.command {
        Commands::Build {
            input,
            out,
            last_wins,
            registration,
        } => build(&settings.config, &input, out, last_wins, registration),
        Commands::Proof { tree, identity } => proof(&tree, &identity),
        Commands::Verify {
            proof,
            root,
            root_file,
        } => verify(&proof, root, root_file),
        Commands::Inspect { tree } => inspect(&tree),
    }
}

fn build(
    config: &DropcraftConfig,
    input: &Path,
    out: Option<PathBuf>,
    last_wins: bool,
    registration: bool,
) -> Result<()> {
    let out_dir = out
        .map(|p| expand_path(&p))
        .unwrap_or_else(|| config.resolved_output_dir());
    let policy = if last_wins {
        DuplicatePolicy::LastWins
    } else {
        config.duplicate_policy
    };
    let layout = ExportLayout {
        tree_file: config.tree_file.clone(),
        root_file: config.root_file.clone(),
        proofs_dir: config.proofs_dir.clone(),
    };

    let job = BatchJob::new(
        DistributionBuilder::with_policy(policy),
        Exporter::with_layout(out_dir, layout),
    );
    let input = expand_path(input);
    info!("Building distribution from {} ({:?} duplicates)", input.display(), policy);

    let summary = if registration {
        job.run::<Registration>(&input).map(|(_, s)| s)
    } else {
        job.run::<Entitlement>(&input).map(|(_, s)| s)
    }
    .with_context(|| format!("Failed to build distribution from {}", input.display()))?;

    println!("Root:         {}", hex::encode(summary.root));
    println!("Total amount: {}", summary.total_amount);
    println!("Proof files:  {}", summary.proofs_written);
    println!("Tree file:    {}", summary.tree_path.display());
    println!("Root file:    {}", summary.root_path.display());
    Ok(())
}

fn proof(tree: &Path, identity: &str) -> Result<()> {
    let identity = parse_hex32(identity).context("Invalid identity")?;
    let proof = match load_any_tree(tree)? {
        AnyTree::Entitlements(t) => t.proof_file(&identity).map(AnyProof::Entitlement),
        AnyTree::Registrations(t) => t.proof_file(&identity).map(AnyProof::Registration),
    };
    let Some(proof) = proof else {
        bail!("Identity {} is not in {}", hex::encode(identity), tree.display());
    };

    println!("{}", serde_json::to_string_pretty(&proof)?);
    Ok(())
}

fn verify(path: &Path, root: Option<String>, root_file: Option<PathBuf>) -> Result<()> {
    let path = expand_path(path);
    let proof: AnyProof = load_proof_any(&path)?;

    let expected = match (root, root_file) {
        (Some(hex_root), _) => parse_hex32(&hex_root).context("Invalid root")?,
        (None, Some(file)) => read_root(&expand_path(&file))
            .with_context(|| format!("Failed to read root from {}", file.display()))?,
        (None, None) => proof.root(),
    };

    let identity = hex::encode(proof.identity());
    if proof.verify_against(&expected) {
        println!("VALID   {} under root {}", identity, hex::encode(expected));
        Ok(())
    } else {
        bail!("INVALID {} under root {}", identity, hex::encode(expected))
    }
}

fn inspect(tree: &Path) -> Result<()> {
    match load_any_tree(tree)? {
        AnyTree::Entitlements(t) => print_tree("entitlement", &t),
        AnyTree::Registrations(t) => print_tree("registration", &t),
    }
}

fn print_tree<R: LeafRecord>(kind: &str, tree: &TreeFile<R>) -> Result<()> {
    println!("Kind:         {}", kind);
    println!("Root:         {}", hex::encode(tree.root));
    println!("Leaves:       {}", tree.total_leaves);
    println!("Total amount: {}", tree.total_amount);
    println!("Depth:        {}", tree.depth());
    println!("Generated at: {}", tree.generated_at);

    if let Some(bad) = tree.first_invalid() {
        bail!("Leaf for {} does not verify against the root", hex::encode(bad));
    }
    if !tree.is_consistent() {
        bail!("Header does not match the leaves");
    }
    println!("Consistent:   yes");
    Ok(())
}

/// Load a tree file of either kind. If neither parses, both reasons are
/// reported.
fn load_any_tree(path: &Path) -> Result<AnyTree> {
    let path = expand_path(path);
    let as_entitlements = match load_tree::<Entitlement>(&path) {
        Ok(tree) => return Ok(AnyTree::Entitlements(tree)),
        Err(e) => e,
    };
    match load_tree::<Registration>(&path) {
        Ok(tree) => Ok(AnyTree::Registrations(tree)),
        Err(as_registrations) => Err(neither("tree", &path, as_entitlements, as_registrations)),
    }
}

fn load_proof_any(path: &Path) -> Result<AnyProof> {
    let as_entitlement = match load_proof::<Entitlement>(path) {
        Ok(proof) => return Ok(AnyProof::Entitlement(proof)),
        Err(e) => e,
    };
    match load_proof::<Registration>(path) {
        Ok(proof) => Ok(AnyProof::Registration(proof)),
        Err(as_registration) => Err(neither("proof", path, as_entitlement, as_registration)),
    }
}

fn neither(
    kind: &str,
    path: &Path,
    as_entitlement: AggregatorError,
    as_registration: AggregatorError,
) -> anyhow::Error {
    // Unreadable file: both attempts failed the same way
    if matches!(as_entitlement, AggregatorError::Io { .. }) {
        return anyhow::Error::new(as_entitlement)
            .context(format!("Failed to load {} file {}", kind, path.display()));
    }
    anyhow!(
        "Failed to load {} file {}: not an entitlement file ({}) nor a registration file ({})",
        kind,
        path.display(),
        as_entitlement,
        as_registration,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn exported(dir: &Path) -> (Exporter, PathBuf) {
        let dist = DistributionBuilder::new()
            .build(vec![
                Entitlement::new([0xA1; 32], 100),
                Entitlement::new([0xB2; 32], 200),
            ])
            .unwrap();
        let exporter = Exporter::new(dir.join("out"));
        let summary = exporter.export(&dist, 0).unwrap();
        (exporter, summary.tree_path)
    }

    /// Replace the first leaf's amount with a string.
    fn corrupt_amount(path: &Path, pointer: &str) {
        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        *json.pointer_mut(pointer).unwrap() = serde_json::json!("lots");
        fs::write(path, json.to_string()).unwrap();
    }

    #[test]
    fn test_load_any_tree_detects_kind() {
        let dir = TempDir::new().unwrap();
        let (_, tree_path) = exported(dir.path());
        assert!(matches!(
            load_any_tree(&tree_path).unwrap(),
            AnyTree::Entitlements(_)
        ));
    }

    #[test]
    fn test_corrupt_tree_reports_both_parse_errors() {
        let dir = TempDir::new().unwrap();
        let (_, tree_path) = exported(dir.path());
        corrupt_amount(&tree_path, "/leaves/0/amount");

        let message = format!("{:#}", load_any_tree(&tree_path).err().unwrap());
        assert!(message.contains("not an entitlement file"), "{}", message);
        assert!(message.contains("invalid type"), "{}", message);
        assert!(message.contains("missing field `label`"), "{}", message);
    }

    #[test]
    fn test_corrupt_proof_reports_both_parse_errors() {
        let dir = TempDir::new().unwrap();
        let (exporter, _) = exported(dir.path());
        let proof_path = exporter.proof_path(&[0xA1; 32]);
        assert!(matches!(
            load_proof_any(&proof_path).unwrap(),
            AnyProof::Entitlement(_)
        ));

        corrupt_amount(&proof_path, "/amount");
        let message = format!("{:#}", load_proof_any(&proof_path).err().unwrap());
        assert!(message.contains("invalid type"), "{}", message);
        assert!(message.contains("missing field `label`"), "{}", message);
    }

    #[test]
    fn test_missing_file_reports_io_once() {
        let dir = TempDir::new().unwrap();
        let message = format!("{:#}", load_any_tree(&dir.path().join("nope.json")).err().unwrap());
        assert!(message.starts_with("Failed to load tree file"), "{}", message);
        assert!(!message.contains("registration"), "{}", message);
    }
}
