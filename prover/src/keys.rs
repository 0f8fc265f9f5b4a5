//! Groth16 key lifecycle.
//!
//! A [`KeyStore`] holds one [`CircuitSlot`] per circuit. Each slot has two
//! one-shot cells:
//!
//! - the (proving key, verifying key) pair from setup or a key file, used to
//!   prove;
//! - the embedded verifying key, fixed at build or deploy time and the only
//!   key ever used to verify.
//!
//! Setup is expensive and runs at most once per slot; concurrent callers
//! block on the same initialization.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use ark_bn254::Bn254;
use ark_bw6_761::BW6_761;
use ark_ec::pairing::Pairing;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, SynthesisError};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use ark_std::rand::{SeedableRng, rngs::OsRng, rngs::StdRng};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::commitment::CommitmentCircuit;
use crate::constants::{COMMITMENT_CIRCUIT_ID, DECRYPTION_CIRCUIT_ID, DISCRETE_LOG_CIRCUIT_ID};
use crate::decryption::{self, DecryptionCircuit};
use crate::discrete_log::DiscreteLogCircuit;
use crate::error::{ProverError, Result};

// ============================================================================
// Circuit Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitKind {
    Commitment,
    DiscreteLog,
    Decryption,
}

impl CircuitKind {
    pub const ALL: [CircuitKind; 3] = [
        CircuitKind::Commitment,
        CircuitKind::DiscreteLog,
        CircuitKind::Decryption,
    ];

    pub fn circuit_id(&self) -> &'static str {
        match self {
            CircuitKind::Commitment => COMMITMENT_CIRCUIT_ID,
            CircuitKind::DiscreteLog => DISCRETE_LOG_CIRCUIT_ID,
            CircuitKind::Decryption => DECRYPTION_CIRCUIT_ID,
        }
    }

    /// Public inputs, excluding the constant one
    pub fn num_public_inputs(&self) -> usize {
        match self {
            CircuitKind::Commitment => 3,
            CircuitKind::DiscreteLog => 7,
            CircuitKind::Decryption => decryption::NUM_PUBLIC_INPUTS,
        }
    }

    /// Short name used for key file names
    pub fn name(&self) -> &'static str {
        match self {
            CircuitKind::Commitment => "commitment",
            CircuitKind::DiscreteLog => "discrete-log",
            CircuitKind::Decryption => "decryption",
        }
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CircuitKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CircuitKind::ALL
            .into_iter()
            .find(|k| k.name() == s || k.circuit_id() == s)
            .ok_or_else(|| format!("unknown circuit '{s}'"))
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// blake3 of the compressed verifying key
pub fn compute_vk_hash<E: Pairing>(vk: &VerifyingKey<E>) -> Result<[u8; 32]> {
    Ok(*blake3::hash(&serialize(vk, "verifying key")?).as_bytes())
}

fn serialize<T: CanonicalSerialize>(value: &T, what: &'static str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(value.compressed_size());
    value
        .serialize_compressed(&mut bytes)
        .map_err(|e| ProverError::format(what, e))?;
    Ok(bytes)
}

// ============================================================================
// Circuit Slot
// ============================================================================

struct EmbeddedKey<E: Pairing> {
    pvk: PreparedVerifyingKey<E>,
    hash: [u8; 32],
}

pub struct CircuitSlot<E: Pairing> {
    kind: CircuitKind,
    keys: OnceCell<(ProvingKey<E>, VerifyingKey<E>)>,
    embedded: OnceCell<EmbeddedKey<E>>,
}

impl<E: Pairing> CircuitSlot<E> {
    pub fn new(kind: CircuitKind) -> Self {
        Self {
            kind,
            keys: OnceCell::new(),
            embedded: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> CircuitKind {
        self.kind
    }

    fn setup_error(&self, reason: impl fmt::Display) -> ProverError {
        ProverError::Setup {
            kind: self.kind,
            reason: reason.to_string(),
        }
    }

    /// Whether a proving key is installed
    pub fn is_ready(&self) -> bool {
        self.keys.get().is_some()
    }

    pub fn has_embedded(&self) -> bool {
        self.embedded.get().is_some()
    }

    pub fn embedded_hash(&self) -> Option<[u8; 32]> {
        self.embedded.get().map(|e| e.hash)
    }

    fn check_against_embedded(&self, vk: &VerifyingKey<E>) -> Result<()> {
        if let Some(embedded) = self.embedded.get() {
            let hash = compute_vk_hash(vk)?;
            if hash != embedded.hash {
                return Err(self.setup_error(format!(
                    "proving key belongs to vk {}, embedded vk is {}",
                    hex::encode(hash),
                    hex::encode(embedded.hash)
                )));
            }
        }
        Ok(())
    }

    /// Run circuit-specific setup once. Later calls return the cached keys.
    pub fn setup<C>(&self, circuit: C, seed: Option<u64>) -> Result<&VerifyingKey<E>>
    where
        C: ConstraintSynthesizer<E::ScalarField>,
    {
        let (_, vk) = self.keys.get_or_try_init(|| {
            let start = Instant::now();
            tracing::info!(circuit = %self.kind, "running Groth16 setup");
            let result = match seed {
                Some(seed) => {
                    tracing::warn!(
                        circuit = %self.kind,
                        seed,
                        "deterministic setup seed in use; keys are not secure"
                    );
                    Groth16::<E>::circuit_specific_setup(circuit, &mut StdRng::seed_from_u64(seed))
                }
                None => Groth16::<E>::circuit_specific_setup(circuit, &mut OsRng),
            };
            let keys = result.map_err(|e| self.setup_error(e))?;
            // Never cache keys the embedded verifier would reject
            self.check_against_embedded(&keys.1)?;
            tracing::info!(
                circuit = %self.kind,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "setup complete"
            );
            Ok::<_, ProverError>(keys)
        })?;
        self.check_against_embedded(vk)?;
        Ok(vk)
    }

    /// Install a proving key produced by `keygen`
    pub fn load_proving_key(&self, bytes: &[u8]) -> Result<()> {
        let pk = ProvingKey::<E>::deserialize_compressed(bytes)
            .map_err(|e| self.setup_error(format!("proving key: {e}")))?;
        let vk = pk.vk.clone();
        self.check_against_embedded(&vk)?;
        self.keys
            .set((pk, vk))
            .map_err(|_| self.setup_error("proving key already installed"))
    }

    /// Install the verification key shipped with the binary.
    ///
    /// The key is re-serialized and hashed; a supplied `expected` hash must
    /// match. Returns the hash.
    pub fn load_embedded(&self, bytes: &[u8], expected: Option<[u8; 32]>) -> Result<[u8; 32]> {
        let vk = VerifyingKey::<E>::deserialize_compressed(bytes)
            .map_err(|e| self.setup_error(format!("embedded verifying key: {e}")))?;
        let hash = compute_vk_hash(&vk)?;
        if let Some(expected) = expected {
            if expected != hash {
                return Err(self.setup_error(format!(
                    "embedded verifying key hash {} does not match expected {}",
                    hex::encode(hash),
                    hex::encode(expected)
                )));
            }
        }
        if let Some((_, local)) = self.keys.get() {
            if compute_vk_hash(local)? != hash {
                return Err(self.setup_error("embedded key does not match installed proving key"));
            }
        }
        let embedded = EmbeddedKey {
            pvk: ark_groth16::prepare_verifying_key(&vk),
            hash,
        };
        if self.embedded.set(embedded).is_err() && self.embedded_hash() != Some(hash) {
            return Err(self.setup_error("a different embedded key is already installed"));
        }
        tracing::info!(circuit = %self.kind, vk_hash = %hex::encode(hash), "embedded key loaded");
        Ok(hash)
    }

    /// Embed the verifying key from local setup; for tests and single-party deployments
    pub fn embed_local(&self) -> Result<[u8; 32]> {
        let bytes = self.export_verifying_key()?;
        self.load_embedded(&bytes, None)
    }

    /// The hash verification runs against, falling back to the local key
    pub fn vk_hash(&self) -> Result<[u8; 32]> {
        if let Some(hash) = self.embedded_hash() {
            return Ok(hash);
        }
        let (_, vk) = self.keys.get().ok_or_else(|| self.setup_error("no keys loaded"))?;
        compute_vk_hash(vk)
    }

    pub fn export_verifying_key(&self) -> Result<Vec<u8>> {
        let (_, vk) = self.keys.get().ok_or_else(|| self.setup_error("no keys loaded"))?;
        serialize(vk, "verifying key")
    }

    pub fn export_proving_key(&self) -> Result<Vec<u8>> {
        let (pk, _) = self.keys.get().ok_or_else(|| self.setup_error("no keys loaded"))?;
        serialize(pk, "proving key")
    }

    /// Check satisfaction, then prove. Returns the compressed proof.
    pub fn prove<C>(&self, circuit: C) -> Result<Vec<u8>>
    where
        C: ConstraintSynthesizer<E::ScalarField> + Clone,
    {
        let (pk, vk) = self
            .keys
            .get()
            .ok_or_else(|| self.setup_error("proving key not loaded"))?;
        self.check_against_embedded(vk)?;

        let cs = ConstraintSystem::<E::ScalarField>::new_ref();
        circuit.clone().generate_constraints(cs.clone()).map_err(|e| match e {
            SynthesisError::AssignmentMissing => {
                ProverError::Witness(format!("{} witness is incomplete", self.kind))
            }
            other => ProverError::Compilation {
                kind: self.kind,
                reason: other.to_string(),
            },
        })?;
        let unsatisfied = cs.which_is_unsatisfied().map_err(|e| ProverError::Compilation {
            kind: self.kind,
            reason: e.to_string(),
        })?;
        if let Some(constraint) = unsatisfied {
            tracing::debug!(circuit = %self.kind, %constraint, "witness rejected");
            return Err(ProverError::ConstraintViolation {
                kind: self.kind,
                constraint,
            });
        }
        drop(cs);

        let start = Instant::now();
        let proof = Groth16::<E>::prove(pk, circuit, &mut OsRng).map_err(|e| {
            ProverError::Compilation {
                kind: self.kind,
                reason: e.to_string(),
            }
        })?;
        tracing::info!(
            circuit = %self.kind,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "generated Groth16 proof"
        );
        serialize(&proof, "proof")
    }

    /// Verify against the embedded key only.
    ///
    /// Identity checks come first and cost no pairings. `Ok(false)` means a
    /// well-formed proof that does not verify for these inputs.
    pub fn verify(
        &self,
        circuit_id: &str,
        vk_hash: &[u8; 32],
        public_inputs: &[E::ScalarField],
        proof_bytes: &[u8],
    ) -> Result<bool> {
        if circuit_id != self.kind.circuit_id() {
            return Err(ProverError::CircuitIdMismatch {
                expected: self.kind.circuit_id().to_string(),
                got: circuit_id.to_string(),
            });
        }
        let embedded = self
            .embedded
            .get()
            .ok_or_else(|| self.setup_error("no embedded verifying key"))?;
        if vk_hash != &embedded.hash {
            return Err(ProverError::CircuitIdMismatch {
                expected: hex::encode(embedded.hash),
                got: hex::encode(vk_hash),
            });
        }
        if public_inputs.len() != self.kind.num_public_inputs() {
            return Err(ProverError::format(
                "public inputs",
                format!(
                    "{} expects {} inputs, got {}",
                    self.kind,
                    self.kind.num_public_inputs(),
                    public_inputs.len()
                ),
            ));
        }
        let proof = Proof::<E>::deserialize_compressed(proof_bytes)
            .map_err(|e| ProverError::format("proof", e))?;
        let valid = Groth16::<E>::verify_proof(&embedded.pvk, &proof, public_inputs)
            .map_err(|e| ProverError::format("proof", e))?;
        tracing::debug!(circuit = %self.kind, valid, "verified proof");
        Ok(valid)
    }
}

// ============================================================================
// Key Store
// ============================================================================

/// Keys for every circuit, constructed once per process and shared by reference
pub struct KeyStore {
    commitment: CircuitSlot<Bn254>,
    discrete_log: CircuitSlot<Bn254>,
    decryption: CircuitSlot<BW6_761>,
    setup_seed: Option<u64>,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore {
    pub fn new() -> Self {
        Self {
            commitment: CircuitSlot::new(CircuitKind::Commitment),
            discrete_log: CircuitSlot::new(CircuitKind::DiscreteLog),
            decryption: CircuitSlot::new(CircuitKind::Decryption),
            setup_seed: None,
        }
    }

    /// Deterministic setup randomness; test and development only
    pub fn with_seed(seed: u64) -> Self {
        Self {
            setup_seed: Some(seed),
            ..Self::new()
        }
    }

    /// Load every key file named in the configuration
    pub fn from_config(config: &vte_config::KeysConfig, seed: Option<u64>) -> Result<Self> {
        let store = match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        };
        let entries = [
            (CircuitKind::Commitment, &config.commitment),
            (CircuitKind::DiscreteLog, &config.discrete_log),
            (CircuitKind::Decryption, &config.decryption),
        ];
        for (kind, paths) in entries {
            let setup_error = |reason: String| ProverError::Setup { kind, reason };
            if let Some(path) = &paths.verifying_key {
                let bytes = std::fs::read(path)
                    .map_err(|e| setup_error(format!("read {path}: {e}")))?;
                let expected = paths
                    .vk_hash
                    .as_deref()
                    .map(|h| decode_hash(h).map_err(setup_error))
                    .transpose()?;
                store.load_embedded(kind, &bytes, expected)?;
            }
            if let Some(path) = &paths.proving_key {
                let bytes = std::fs::read(path)
                    .map_err(|e| setup_error(format!("read {path}: {e}")))?;
                store.load_proving_key(kind, &bytes)?;
            }
        }
        Ok(store)
    }

    pub fn commitment(&self) -> &CircuitSlot<Bn254> {
        &self.commitment
    }

    pub fn discrete_log(&self) -> &CircuitSlot<Bn254> {
        &self.discrete_log
    }

    pub fn decryption(&self) -> &CircuitSlot<BW6_761> {
        &self.decryption
    }

    /// Run (or reuse) setup for one circuit
    pub fn setup(&self, kind: CircuitKind) -> Result<()> {
        match kind {
            CircuitKind::Commitment => {
                self.commitment
                    .setup(CommitmentCircuit::dummy(), self.setup_seed)?;
            }
            CircuitKind::DiscreteLog => {
                self.discrete_log
                    .setup(DiscreteLogCircuit::dummy(), self.setup_seed)?;
            }
            CircuitKind::Decryption => {
                self.decryption
                    .setup(DecryptionCircuit::dummy(), self.setup_seed)?;
            }
        }
        Ok(())
    }

    pub fn is_ready(&self, kind: CircuitKind) -> bool {
        match kind {
            CircuitKind::Commitment => self.commitment.is_ready(),
            CircuitKind::DiscreteLog => self.discrete_log.is_ready(),
            CircuitKind::Decryption => self.decryption.is_ready(),
        }
    }

    pub fn has_embedded(&self, kind: CircuitKind) -> bool {
        match kind {
            CircuitKind::Commitment => self.commitment.has_embedded(),
            CircuitKind::DiscreteLog => self.discrete_log.has_embedded(),
            CircuitKind::Decryption => self.decryption.has_embedded(),
        }
    }

    pub fn load_proving_key(&self, kind: CircuitKind, bytes: &[u8]) -> Result<()> {
        match kind {
            CircuitKind::Commitment => self.commitment.load_proving_key(bytes),
            CircuitKind::DiscreteLog => self.discrete_log.load_proving_key(bytes),
            CircuitKind::Decryption => self.decryption.load_proving_key(bytes),
        }
    }

    pub fn load_embedded(
        &self,
        kind: CircuitKind,
        bytes: &[u8],
        expected: Option<[u8; 32]>,
    ) -> Result<[u8; 32]> {
        match kind {
            CircuitKind::Commitment => self.commitment.load_embedded(bytes, expected),
            CircuitKind::DiscreteLog => self.discrete_log.load_embedded(bytes, expected),
            CircuitKind::Decryption => self.decryption.load_embedded(bytes, expected),
        }
    }

    pub fn embed_local(&self, kind: CircuitKind) -> Result<[u8; 32]> {
        match kind {
            CircuitKind::Commitment => self.commitment.embed_local(),
            CircuitKind::DiscreteLog => self.discrete_log.embed_local(),
            CircuitKind::Decryption => self.decryption.embed_local(),
        }
    }

    pub fn vk_hash(&self, kind: CircuitKind) -> Result<[u8; 32]> {
        match kind {
            CircuitKind::Commitment => self.commitment.vk_hash(),
            CircuitKind::DiscreteLog => self.discrete_log.vk_hash(),
            CircuitKind::Decryption => self.decryption.vk_hash(),
        }
    }

    pub fn export_verifying_key(&self, kind: CircuitKind) -> Result<Vec<u8>> {
        match kind {
            CircuitKind::Commitment => self.commitment.export_verifying_key(),
            CircuitKind::DiscreteLog => self.discrete_log.export_verifying_key(),
            CircuitKind::Decryption => self.decryption.export_verifying_key(),
        }
    }

    pub fn export_proving_key(&self, kind: CircuitKind) -> Result<Vec<u8>> {
        match kind {
            CircuitKind::Commitment => self.commitment.export_proving_key(),
            CircuitKind::DiscreteLog => self.discrete_log.export_proving_key(),
            CircuitKind::Decryption => self.decryption.export_proving_key(),
        }
    }
}

fn decode_hash(value: &str) -> std::result::Result<[u8; 32], String> {
    let bytes = hex::decode(value.trim_start_matches("0x")).map_err(|e| format!("vk_hash: {e}"))?;
    bytes
        .try_into()
        .map_err(|_| "vk_hash must be 32 bytes".to_string())
}
