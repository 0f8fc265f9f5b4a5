//! Package Builder
//!
//! ```text
//! secret ──► timelock encrypt ──► digest ──► ctx_hash ──► C, R2
//!                                                          │
//!                         ┌────────────────────────────────┴───────────┐
//!                         ▼                                            ▼
//!              commitment proof + dlog binding             decryption proof
//!              (blocking pool, commitment timeout)         (blocking pool, decryption timeout)
//!                         └──────────────── try_join! ─────────────────┘
//! ```
//!
//! The two proving tasks run concurrently with independent deadlines. The
//! first failure wins and the sibling future is dropped; a proving thread
//! already running on the blocking pool finishes and its result is discarded.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use vte_config::{DecryptionProofMode, DlogSchemeToml, VteConfig};
use vte_prover::constants::{COMMITMENT_CIRCUIT_ID, DECRYPTION_CIRCUIT_ID, DISCRETE_LOG_CIRCUIT_ID};
use vte_prover::feasibility::{self, CircuitShape};
use vte_prover::{
    CircuitKind, CommitmentCircuit, DecryptionCircuit, DiscreteLogCircuit, KeyStore,
    ProvingStrategy, codec, compute_commitment, point_from_secret,
};

use crate::capsule::{IBE_CAPSULE_FORMAT_ID, IbeCapsuleCodec};
use crate::context::{CONTEXT_FIELDS, CONTEXT_SCHEMA, ciphertext_digest, compute_context_hash};
use crate::error::{Result, VteError};
use crate::package::{
    COMMITMENT_PROOF_SYSTEM, CommitmentProof, ContextInfo, DecryptionProof, DecryptionStatus,
    DiscreteLogBinding, GROTH16_DLOG_BOUND_FIELDS, GROTH16_DLOG_SCHEME, PACKAGE_VERSION,
    ProofsInfo, PublicInfo, TlockInfo, VtePackage,
};
use crate::schnorr;
use crate::task::run_blocking;
use crate::timelock::{NetworkInfo, SealedPayload, TimelockService};

const DEFAULT_CALL_DEADLINE: Duration = Duration::from_secs(30);

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlogScheme {
    /// Fiat-Shamir Schnorr on secp256k1
    SchnorrFsV1,
    /// Groth16 proof of the discrete-log circuit
    Groth16DlogV1,
}

impl From<DlogSchemeToml> for DlogScheme {
    fn from(value: DlogSchemeToml) -> Self {
        match value {
            DlogSchemeToml::Schnorr => DlogScheme::SchnorrFsV1,
            DlogSchemeToml::Groth16 => DlogScheme::Groth16DlogV1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuilderOptions {
    pub commitment_timeout: Duration,
    pub decryption_timeout: Duration,
    pub decryption_proof: DecryptionProofMode,
    pub discrete_log_scheme: DlogScheme,
    pub ns_per_constraint: u64,
    pub feasibility_budget: Duration,
}

impl BuilderOptions {
    pub fn from_config(config: &VteConfig) -> Self {
        Self {
            commitment_timeout: config.commitment_timeout(),
            decryption_timeout: config.decryption_timeout(),
            decryption_proof: config.prover.decryption_proof,
            discrete_log_scheme: config.prover.discrete_log_scheme.into(),
            ns_per_constraint: config.prover.ns_per_constraint,
            feasibility_budget: Duration::from_secs(config.prover.feasibility_budget_secs),
        }
    }
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self::from_config(&VteConfig::default())
    }
}

// ============================================================================
// Request
// ============================================================================

pub struct BuildRequest {
    pub secret: [u8; 32],
    pub round: u64,
    pub session_id: Option<String>,
    pub aux: Vec<u8>,
    /// Deadline for the timelock encrypt call
    pub deadline: Duration,
}

impl BuildRequest {
    pub fn new(secret: [u8; 32], round: u64) -> Self {
        Self {
            secret,
            round,
            session_id: None,
            aux: Vec::new(),
            deadline: DEFAULT_CALL_DEADLINE,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_aux(mut self, aux: impl Into<Vec<u8>>) -> Self {
        self.aux = aux.into();
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct PackageBuilder {
    timelock: Arc<dyn TimelockService>,
    keys: Arc<KeyStore>,
    options: BuilderOptions,
    decryption_shape: Arc<OnceCell<CircuitShape>>,
}

impl PackageBuilder {
    pub fn new(
        timelock: Arc<dyn TimelockService>,
        keys: Arc<KeyStore>,
        options: BuilderOptions,
    ) -> Self {
        Self {
            timelock,
            keys,
            options,
            decryption_shape: Arc::new(OnceCell::new()),
        }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Seed the feasibility gate with a measured shape instead of
    /// synthesizing the decryption circuit on first use.
    ///
    /// The shape is fixed once known; a later shape is logged and ignored.
    pub fn with_decryption_shape(self, shape: CircuitShape) -> Self {
        if let Err(rejected) = self.decryption_shape.set(shape) {
            tracing::warn!(
                kept = ?self.decryption_shape.get(),
                ?rejected,
                "decryption shape already known, ignoring new one"
            );
        }
        self
    }

    pub async fn build(&self, request: BuildRequest) -> Result<VtePackage> {
        let BuildRequest {
            secret,
            round,
            session_id,
            aux,
            deadline,
        } = request;

        // Range check before anything leaves the process
        codec::secp_scalar_from_bytes(&secret)?;
        if round == 0 {
            return Err(VteError::Network("round 0 is never released".into()));
        }

        let network = self.timelock.network();
        let chain = network.chain_identity;
        tracing::info!(round, chain = %hex::encode(chain), "building package");

        let timelock = self.timelock.clone();
        let sealed = run_blocking("timelock encrypt", deadline, move || {
            timelock.encrypt(&chain, round, &secret)
        })
        .await?;

        let digest = ciphertext_digest(&sealed.ciphertext);
        let session_bytes = session_id.as_deref().unwrap_or_default().as_bytes();
        let ctx_hash = compute_context_hash(&chain, round, &digest, session_bytes, &aux)?;

        let commitment = codec::bn254_to_bytes(&compute_commitment(&secret, &ctx_hash));
        let point_value = codec::secp_compress(&point_from_secret(&secret)?)?.to_vec();

        let binding = self.prove_binding(secret, ctx_hash, commitment, point_value.clone(), digest);
        let decryption = self.prove_decryption(&network, round, &sealed, secret, ctx_hash);
        let ((commitment_proof, discrete_log), decryption) = tokio::try_join!(binding, decryption)?;

        tracing::info!(
            round,
            commitment = %hex::encode(commitment),
            decryption = ?decryption.status,
            "package built"
        );

        Ok(VtePackage {
            version: PACKAGE_VERSION.to_string(),
            tlock: TlockInfo {
                chain_identity: chain,
                round,
                ciphertext_format_id: network.ciphertext_format_id.clone(),
                ciphertext_bytes: sealed.ciphertext,
                ciphertext_digest: digest,
            },
            context: ContextInfo {
                schema: CONTEXT_SCHEMA.to_string(),
                fields: CONTEXT_FIELDS.iter().map(|f| f.to_string()).collect(),
                session_id,
                aux_hex: (!aux.is_empty()).then(|| hex::encode(&aux)),
                ctx_hash,
            },
            public: PublicInfo {
                point_value,
                commitment,
            },
            proofs: ProofsInfo {
                commitment: Some(commitment_proof),
                discrete_log: Some(discrete_log),
                decryption,
            },
        })
    }

    /// Commitment proof plus the discrete-log binding, on one blocking task
    async fn prove_binding(
        &self,
        secret: [u8; 32],
        ctx_hash: [u8; 32],
        commitment: [u8; 32],
        point_value: Vec<u8>,
        digest: [u8; 32],
    ) -> Result<(CommitmentProof, DiscreteLogBinding)> {
        let keys = self.keys.clone();
        let scheme = self.options.discrete_log_scheme;

        run_blocking("commitment proof", self.options.commitment_timeout, move || {
            keys.setup(CircuitKind::Commitment)?;
            let circuit = CommitmentCircuit::new(secret, ctx_hash);
            let public_inputs = circuit
                .public_inputs()
                .ok_or_else(|| VteError::Witness("commitment circuit is unassigned".into()))?
                .iter()
                .map(|input| hex::encode(codec::bn254_to_bytes(input)))
                .collect();
            let proof_bytes = keys.commitment().prove(circuit)?;
            let commitment_proof = CommitmentProof {
                system: COMMITMENT_PROOF_SYSTEM.to_string(),
                circuit_id: COMMITMENT_CIRCUIT_ID.to_string(),
                vk_hash: keys.vk_hash(CircuitKind::Commitment)?,
                public_inputs,
                proof_bytes,
            };

            let binding = match scheme {
                DlogScheme::SchnorrFsV1 => {
                    let message =
                        schnorr::binding_message(&point_value, &commitment, &ctx_hash, &digest);
                    DiscreteLogBinding {
                        scheme: schnorr::SCHNORR_SCHEME.to_string(),
                        bound_fields: schnorr::BOUND_FIELDS.iter().map(|f| f.to_string()).collect(),
                        signature_bytes: schnorr::sign(&secret, &message)?.to_vec(),
                        circuit_id: None,
                        vk_hash: None,
                    }
                }
                DlogScheme::Groth16DlogV1 => {
                    keys.setup(CircuitKind::DiscreteLog)?;
                    let proof = keys
                        .discrete_log()
                        .prove(DiscreteLogCircuit::new(secret, ctx_hash)?)?;
                    DiscreteLogBinding {
                        scheme: GROTH16_DLOG_SCHEME.to_string(),
                        bound_fields: GROTH16_DLOG_BOUND_FIELDS
                            .iter()
                            .map(|f| f.to_string())
                            .collect(),
                        signature_bytes: proof,
                        circuit_id: Some(DISCRETE_LOG_CIRCUIT_ID.to_string()),
                        vk_hash: Some(hex::encode(keys.vk_hash(CircuitKind::DiscreteLog)?)),
                    }
                }
            };
            Ok((commitment_proof, binding))
        })
        .await
    }

    async fn prove_decryption(
        &self,
        network: &NetworkInfo,
        round: u64,
        sealed: &SealedPayload,
        secret: [u8; 32],
        ctx_hash: [u8; 32],
    ) -> Result<DecryptionProof> {
        let mode = self.options.decryption_proof;
        if mode == DecryptionProofMode::Off {
            return Ok(DecryptionProof::with_status(DecryptionStatus::Absent));
        }

        let opening = match sealed.opening {
            Some(opening) if network.ciphertext_format_id == IBE_CAPSULE_FORMAT_ID => opening,
            _ if mode == DecryptionProofMode::Required => {
                return Err(VteError::Witness(
                    "timelock service did not expose an IBE opening".into(),
                ));
            }
            _ => {
                tracing::info!(round, "no IBE opening from timelock service, skipping decryption proof");
                return Ok(DecryptionProof::with_status(DecryptionStatus::Absent));
            }
        };
        let ciphertext = IbeCapsuleCodec::decode(&sealed.ciphertext)?;
        let network_key = network.network_key()?;

        let keys = self.keys.clone();
        let shape = self.decryption_shape.clone();
        let ns_per_constraint = self.options.ns_per_constraint;
        let budget = self.options.feasibility_budget;

        let result = run_blocking("decryption proof", self.options.decryption_timeout, move || {
            if mode == DecryptionProofMode::Auto {
                let shape = shape.get_or_try_init(|| {
                    feasibility::measure(CircuitKind::Decryption, DecryptionCircuit::blank())
                })?;
                let report = feasibility::assess(*shape, ns_per_constraint, budget);
                tracing::info!(%report, "decryption proof feasibility");
                if report.strategy == ProvingStrategy::Deferred {
                    return Ok(DecryptionProof::with_status(DecryptionStatus::Deferred));
                }
            }
            keys.setup(CircuitKind::Decryption)?;
            let circuit =
                DecryptionCircuit::new(network_key, round, ciphertext, opening, secret, ctx_hash)?;
            let proof = keys.decryption().prove(circuit)?;
            Ok(DecryptionProof::proved(
                DECRYPTION_CIRCUIT_ID,
                &keys.vk_hash(CircuitKind::Decryption)?,
                &proof,
            ))
        })
        .await;

        match result {
            Err(error @ VteError::Timeout { .. }) if mode == DecryptionProofMode::Auto => {
                tracing::warn!(round, %error, "decryption proof abandoned");
                Ok(DecryptionProof::with_status(DecryptionStatus::TimedOut))
            }
            other => other,
        }
    }
}
