//! VTE Configuration
//!
//! Shared configuration crate for the prover and the package layer.
//!
//! Handles loading configuration from:
//! 1. VTE_CONFIG env var (explicit path)
//! 2. ./vte.toml (current directory)
//! 3. ~/.vte/vte.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<VteConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "vte.toml";
const CONFIG_DIR_NAME: &str = ".vte";

// ============================================================================
// Default Constants
// ============================================================================

/// Genesis of the public quicknet beacon; only used for round <-> time math.
const DEFAULT_GENESIS_TIME: u64 = 1_692_803_367;
const DEFAULT_PERIOD_SECS: u64 = 3;

const DEFAULT_COMMITMENT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DECRYPTION_TIMEOUT_SECS: u64 = 720;
const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NS_PER_CONSTRAINT: u64 = 30_000;
const DEFAULT_FEASIBILITY_BUDGET_SECS: u64 = 600;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VteConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub keys: KeysConfig,
}

/// Timelock network parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hex chain identity the verifier accepts. `None` accepts the identity
    /// reported by the configured timelock service.
    #[serde(default)]
    pub chain_identity: Option<String>,
    #[serde(default = "default_genesis_time")]
    pub genesis_time: u64,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
    /// Deadline for a single encrypt/decrypt call
    #[serde(default = "default_network_timeout")]
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_identity: None,
            genesis_time: DEFAULT_GENESIS_TIME,
            period_secs: DEFAULT_PERIOD_SECS,
            timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
        }
    }
}

fn default_genesis_time() -> u64 {
    DEFAULT_GENESIS_TIME
}
fn default_period_secs() -> u64 {
    DEFAULT_PERIOD_SECS
}
fn default_network_timeout() -> u64 {
    DEFAULT_NETWORK_TIMEOUT_SECS
}

/// Whether the pairing-heavy decryption proof is generated
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecryptionProofMode {
    /// Never generate it; the package records `absent`
    Off,
    /// Ask the feasibility gate, tolerate a timeout
    #[default]
    Auto,
    /// Always generate it; a timeout fails the build
    Required,
}

/// How the published point is bound to the secret
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DlogSchemeToml {
    #[default]
    Schnorr,
    Groth16,
}

/// Proving configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProverConfig {
    #[serde(default = "default_commitment_timeout")]
    pub commitment_timeout_secs: u64,
    #[serde(default = "default_decryption_timeout")]
    pub decryption_timeout_secs: u64,
    #[serde(default)]
    pub decryption_proof: DecryptionProofMode,
    #[serde(default)]
    pub discrete_log_scheme: DlogSchemeToml,
    /// Calibrated proving cost used by the feasibility gate
    #[serde(default = "default_ns_per_constraint")]
    pub ns_per_constraint: u64,
    #[serde(default = "default_feasibility_budget")]
    pub feasibility_budget_secs: u64,
    /// Deterministic setup randomness. Never set this in production.
    #[serde(default)]
    pub setup_seed: Option<u64>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            commitment_timeout_secs: DEFAULT_COMMITMENT_TIMEOUT_SECS,
            decryption_timeout_secs: DEFAULT_DECRYPTION_TIMEOUT_SECS,
            decryption_proof: DecryptionProofMode::Auto,
            discrete_log_scheme: DlogSchemeToml::Schnorr,
            ns_per_constraint: DEFAULT_NS_PER_CONSTRAINT,
            feasibility_budget_secs: DEFAULT_FEASIBILITY_BUDGET_SECS,
            setup_seed: None,
        }
    }
}

fn default_commitment_timeout() -> u64 {
    DEFAULT_COMMITMENT_TIMEOUT_SECS
}
fn default_decryption_timeout() -> u64 {
    DEFAULT_DECRYPTION_TIMEOUT_SECS
}
fn default_ns_per_constraint() -> u64 {
    DEFAULT_NS_PER_CONSTRAINT
}
fn default_feasibility_budget() -> u64 {
    DEFAULT_FEASIBILITY_BUDGET_SECS
}

/// Key material locations for one circuit
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitKeyPaths {
    #[serde(default)]
    pub proving_key: Option<String>,
    #[serde(default)]
    pub verifying_key: Option<String>,
    /// Expected blake3 hash (hex) of the compressed verifying key
    #[serde(default)]
    pub vk_hash: Option<String>,
}

/// Key material for every circuit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default)]
    pub commitment: CircuitKeyPaths,
    #[serde(default)]
    pub discrete_log: CircuitKeyPaths,
    #[serde(default)]
    pub decryption: CircuitKeyPaths,
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

fn set_option_string(value: Option<String>, field: &mut Option<String>) {
    if let Some(v) = value {
        *field = Some(v);
    }
}

fn set_parse<T: std::str::FromStr>(value: Option<String>, field: &mut T) {
    if let Some(v) = value {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        }
    }
}

fn set_parse_option<T: std::str::FromStr>(value: Option<String>, field: &mut Option<T>) {
    if let Some(v) = value {
        if let Ok(parsed) = v.parse() {
            *field = Some(parsed);
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl VteConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("VTE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        dirs::home_dir()
            .map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .filter(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply `VTE_*` overrides from any key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Network
        set_option_string(lookup("VTE_CHAIN_IDENTITY"), &mut self.network.chain_identity);
        set_parse(lookup("VTE_GENESIS_TIME"), &mut self.network.genesis_time);
        set_parse(lookup("VTE_PERIOD_SECS"), &mut self.network.period_secs);
        set_parse(lookup("VTE_NETWORK_TIMEOUT_SECS"), &mut self.network.timeout_secs);

        // Prover
        set_parse(
            lookup("VTE_COMMITMENT_TIMEOUT_SECS"),
            &mut self.prover.commitment_timeout_secs,
        );
        set_parse(
            lookup("VTE_DECRYPTION_TIMEOUT_SECS"),
            &mut self.prover.decryption_timeout_secs,
        );
        if let Some(v) = lookup("VTE_DECRYPTION_PROOF") {
            self.prover.decryption_proof = match v.to_ascii_lowercase().as_str() {
                "off" => DecryptionProofMode::Off,
                "required" => DecryptionProofMode::Required,
                _ => DecryptionProofMode::Auto,
            };
        }
        if let Some(v) = lookup("VTE_DLOG_SCHEME") {
            self.prover.discrete_log_scheme = match v.to_ascii_lowercase().as_str() {
                "groth16" => DlogSchemeToml::Groth16,
                _ => DlogSchemeToml::Schnorr,
            };
        }
        set_parse(
            lookup("VTE_NS_PER_CONSTRAINT"),
            &mut self.prover.ns_per_constraint,
        );
        set_parse(
            lookup("VTE_FEASIBILITY_BUDGET_SECS"),
            &mut self.prover.feasibility_budget_secs,
        );
        set_parse_option(lookup("VTE_SETUP_SEED"), &mut self.prover.setup_seed);

        // Keys
        for (prefix, paths) in [
            ("VTE_COMMITMENT", &mut self.keys.commitment),
            ("VTE_DLOG", &mut self.keys.discrete_log),
            ("VTE_DECRYPTION", &mut self.keys.decryption),
        ] {
            set_option_string(lookup(&format!("{prefix}_PK")), &mut paths.proving_key);
            set_option_string(lookup(&format!("{prefix}_VK")), &mut paths.verifying_key);
            set_option_string(lookup(&format!("{prefix}_VK_HASH")), &mut paths.vk_hash);
        }
    }

    /// Reject values that would make the protocol misbehave later
    pub fn validate(&self) -> Result<()> {
        if self.network.period_secs == 0 {
            bail!("network.period_secs must be positive");
        }
        if self.prover.commitment_timeout_secs == 0 || self.prover.decryption_timeout_secs == 0 {
            bail!("prover timeouts must be positive");
        }
        self.chain_identity_bytes()?;
        for paths in [&self.keys.commitment, &self.keys.discrete_log, &self.keys.decryption] {
            if let Some(hash) = &paths.vk_hash {
                decode_32(hash).context("keys.*.vk_hash")?;
            }
        }
        Ok(())
    }

    /// The configured chain identity, decoded
    pub fn chain_identity_bytes(&self) -> Result<Option<[u8; 32]>> {
        self.network
            .chain_identity
            .as_deref()
            .map(|h| decode_32(h).context("network.chain_identity"))
            .transpose()
    }

    pub fn commitment_timeout(&self) -> Duration {
        Duration::from_secs(self.prover.commitment_timeout_secs)
    }

    pub fn decryption_timeout(&self) -> Duration {
        Duration::from_secs(self.prover.decryption_timeout_secs)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.keys.commitment = CircuitKeyPaths {
            proving_key: Some("./keys/commitment.pk".into()),
            verifying_key: Some("./keys/commitment.vk".into()),
            vk_hash: None,
        };
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static VteConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: VteConfig) -> Result<(), VteConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

fn decode_32(value: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(value.trim_start_matches("0x")).context("invalid hex")?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("expected 32 bytes, got {}", b.len()))
}
