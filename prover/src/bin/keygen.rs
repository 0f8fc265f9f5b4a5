//! Key Generation CLI for the VTE circuits
//!
//! Generates Groth16 proving and verifying keys and prints the identifiers a
//! verifier pins: circuit id and blake3 hash of the compressed verifying key.
//!
//! Usage:
//!   cargo run --package vte-prover --bin keygen -- --kind all --out-dir ./keys
//!   cargo run --package vte-prover --bin keygen -- --kind decryption --feasibility
//!
//! Keys must be regenerated whenever a circuit changes; the circuit id
//! version must be bumped with it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use vte_config::VteConfig;
use vte_prover::decryption::DecryptionCircuit;
use vte_prover::discrete_log::DiscreteLogCircuit;
use vte_prover::feasibility::{self, FeasibilityReport};
use vte_prover::{CircuitKind, CommitmentCircuit, KeyStore};

struct Args {
    kinds: Vec<CircuitKind>,
    out_dir: PathBuf,
    seed: Option<u64>,
    feasibility: bool,
    force: bool,
}

fn parse_args() -> Result<Option<Args>> {
    let args: Vec<String> = std::env::args().collect();

    let mut parsed = Args {
        kinds: CircuitKind::ALL.to_vec(),
        out_dir: PathBuf::from("./keys"),
        seed: None,
        feasibility: false,
        force: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--kind" | "-k" => {
                i += 1;
                let value = args.get(i).context("--kind needs a value")?;
                parsed.kinds = match value.as_str() {
                    "all" => CircuitKind::ALL.to_vec(),
                    other => vec![other.parse().map_err(anyhow::Error::msg)?],
                };
            }
            "--out-dir" | "-o" => {
                i += 1;
                parsed.out_dir = PathBuf::from(args.get(i).context("--out-dir needs a value")?);
            }
            "--seed" => {
                i += 1;
                let value = args.get(i).context("--seed needs a value")?;
                parsed.seed = Some(value.parse().context("--seed must be an integer")?);
            }
            "--feasibility" => parsed.feasibility = true,
            "--force" | "-f" => parsed.force = true,
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            other => {
                print_help();
                bail!("unknown argument: {other}");
            }
        }
        i += 1;
    }
    Ok(Some(parsed))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };
    let config = VteConfig::load().context("Failed to load configuration")?;
    let seed = args.seed.or(config.prover.setup_seed);

    println!("VTE Key Generation");
    println!("==================");
    println!();

    if args.feasibility {
        let budget = Duration::from_secs(config.prover.feasibility_budget_secs);
        for kind in &args.kinds {
            let report = feasibility_report(*kind, config.prover.ns_per_constraint, budget)?;
            println!("  {report}");
        }
        return Ok(());
    }

    if seed.is_some() {
        println!("WARNING: deterministic setup seed in use. Do not ship these keys.");
        println!();
    }

    let store = match seed {
        Some(seed) => KeyStore::with_seed(seed),
        None => KeyStore::new(),
    };
    fs::create_dir_all(&args.out_dir).context("Failed to create output directory")?;

    for kind in &args.kinds {
        generate(&store, *kind, &args.out_dir, args.force)?;
    }

    println!("Key generation complete!");
    println!();
    println!("Pin these in vte.toml under [keys.<circuit>] or via environment:");
    println!("  export VTE_COMMITMENT_VK=<path>  VTE_COMMITMENT_VK_HASH=<hash>");
    println!("  export VTE_DLOG_VK=<path>        VTE_DLOG_VK_HASH=<hash>");
    println!("  export VTE_DECRYPTION_VK=<path>  VTE_DECRYPTION_VK_HASH=<hash>");
    Ok(())
}

fn feasibility_report(
    kind: CircuitKind,
    ns_per_constraint: u64,
    budget: Duration,
) -> Result<FeasibilityReport> {
    println!("Measuring {kind} circuit...");
    let shape = match kind {
        CircuitKind::Commitment => feasibility::measure(kind, CommitmentCircuit::dummy()),
        CircuitKind::DiscreteLog => feasibility::measure(kind, DiscreteLogCircuit::dummy()),
        CircuitKind::Decryption => feasibility::measure(kind, DecryptionCircuit::blank()),
    }
    .with_context(|| format!("Failed to synthesize {kind} circuit"))?;
    Ok(feasibility::assess(shape, ns_per_constraint, budget))
}

fn generate(store: &KeyStore, kind: CircuitKind, out_dir: &Path, force: bool) -> Result<()> {
    let pk_path = out_dir.join(format!("{}.pk", kind.name()));
    let vk_path = out_dir.join(format!("{}.vk", kind.name()));

    // Check if keys already exist
    if !force && pk_path.exists() && vk_path.exists() {
        println!("Keys for {kind} already exist at:");
        println!("  Proving key:   {}", pk_path.display());
        println!("  Verifying key: {}", vk_path.display());
        println!("  Use --force to regenerate.");
        println!();
        return Ok(());
    }

    println!("[{kind}] {}", kind.circuit_id());
    println!("  Public inputs: {}", kind.num_public_inputs());
    println!("  Performing Groth16 circuit-specific setup...");
    if kind == CircuitKind::Decryption {
        println!("  This circuit contains a pairing; expect a long run.");
    }

    let start = std::time::Instant::now();
    store
        .setup(kind)
        .with_context(|| format!("Failed to perform {kind} setup"))?;
    println!("  Setup complete in {:?}", start.elapsed());

    let pk_bytes = store
        .export_proving_key(kind)
        .context("Failed to serialize proving key")?;
    fs::write(&pk_path, &pk_bytes).context("Failed to write proving key")?;
    println!(
        "  Proving key:   {} ({:.2} MB)",
        pk_path.display(),
        pk_bytes.len() as f64 / 1024.0 / 1024.0
    );

    let vk_bytes = store
        .export_verifying_key(kind)
        .context("Failed to serialize verifying key")?;
    fs::write(&vk_path, &vk_bytes).context("Failed to write verifying key")?;
    println!("  Verifying key: {} ({} bytes)", vk_path.display(), vk_bytes.len());

    let vk_hash = store
        .vk_hash(kind)
        .context("Failed to hash verifying key")?;
    println!("  Verification key hash (blake3):");
    println!("    {}", hex::encode(vk_hash));
    println!();
    Ok(())
}

fn print_help() {
    println!("VTE Key Generation Tool");
    println!();
    println!("USAGE:");
    println!("    keygen [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -k, --kind <KIND>       commitment | discrete-log | decryption | all [default: all]");
    println!("    -o, --out-dir <DIR>     Output directory [default: ./keys]");
    println!("        --seed <N>          Deterministic setup randomness (development only)");
    println!("        --feasibility       Measure circuits and print the proving estimate");
    println!("    -f, --force             Overwrite existing keys");
    println!("    -h, --help              Print help information");
}
