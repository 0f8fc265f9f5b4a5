//! Package Verifier
//!
//! Fail-fast, in this order:
//!
//! | Step | Check |
//! |---|---|
//! | `Version` | `version == "vte-tlock/0.3"` |
//! | `Network` | chain identity is the configured chain |
//! | `Round` | non-zero, and the expected round when one is set |
//! | `Format` | format id is known and the capsule parses |
//! | `ContextHash` | canonical field list, recomputed ctx_hash matches |
//! | `CiphertextDigest` | `SHA256(ciphertext_bytes) == ciphertext_digest` |
//! | `CommitmentProof` | ids match, public inputs recomputed, Groth16 verifies |
//! | `DiscreteLogBinding` | Schnorr or Groth16 binding of `R2` verifies |
//! | `DecryptionProof` | verifies when `proved`; other statuses are reported |
//!
//! Proofs are only ever checked against the embedded verifying keys in the
//! [`KeyStore`]; nothing in the package selects a key.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use vte_config::VteConfig;
use vte_prover::constants::COMMITMENT_CIRCUIT_ID;
use vte_prover::{
    ErrorKind, IbeCiphertext, KeyStore, codec, commitment_public_inputs, decryption_public_inputs,
    discrete_log_public_inputs,
};

use crate::capsule::{CapsuleCodec, IbeCapsuleCodec};
use crate::context::{
    CONTEXT_SCHEMA, ciphertext_digest, compute_context_hash, is_canonical_field_list,
};
use crate::error::{Result, VteError};
use crate::package::{
    COMMITMENT_PROOF_SYSTEM, DecryptionStatus, GROTH16_DLOG_BOUND_FIELDS, GROTH16_DLOG_SCHEME,
    PACKAGE_VERSION, VtePackage, decode_vk_hash,
};
use crate::schnorr;
use crate::timelock::NetworkInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStep {
    Version,
    Network,
    Round,
    Format,
    ContextHash,
    CiphertextDigest,
    CommitmentProof,
    DiscreteLogBinding,
    DecryptionProof,
}

impl fmt::Display for VerifyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Error)]
#[error("package rejected at {step}: {error}")]
pub struct Rejection {
    pub step: VerifyStep,
    #[source]
    pub error: VteError,
}

impl Rejection {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

trait AtStep<T> {
    fn at(self, step: VerifyStep) -> std::result::Result<T, Rejection>;
}

impl<T> AtStep<T> for Result<T> {
    fn at(self, step: VerifyStep) -> std::result::Result<T, Rejection> {
        self.map_err(|error| Rejection { step, error })
    }
}

/// A package that passed every step
#[derive(Debug)]
pub struct Verified<'a> {
    package: &'a VtePackage,
    decryption: DecryptionStatus,
}

impl<'a> Verified<'a> {
    pub fn package(&self) -> &'a VtePackage {
        self.package
    }

    pub fn decryption_status(&self) -> DecryptionStatus {
        self.decryption
    }

    /// Whether decryption correctness was proven, not just deferred to expiry
    pub fn decryption_checked(&self) -> bool {
        self.decryption == DecryptionStatus::Proved
    }
}

pub struct PackageVerifier {
    keys: Arc<KeyStore>,
    network: NetworkInfo,
    expected_round: Option<u64>,
    expected_session_id: Option<String>,
    codecs: Vec<Arc<dyn CapsuleCodec>>,
}

impl PackageVerifier {
    pub fn new(keys: Arc<KeyStore>, network: NetworkInfo) -> Self {
        Self {
            keys,
            network,
            expected_round: None,
            expected_session_id: None,
            codecs: vec![Arc::new(IbeCapsuleCodec)],
        }
    }

    /// Refuses a network whose chain differs from a configured one
    pub fn from_config(keys: Arc<KeyStore>, network: NetworkInfo, config: &VteConfig) -> Result<Self> {
        let configured = config
            .chain_identity_bytes()
            .map_err(|e| VteError::Config(format!("{e:#}")))?;
        if let Some(chain) = configured {
            if chain != network.chain_identity {
                return Err(VteError::Config(format!(
                    "configured chain {} but network reports {}",
                    hex::encode(chain),
                    hex::encode(network.chain_identity)
                )));
            }
        }
        Ok(Self::new(keys, network))
    }

    pub fn expect_round(mut self, round: u64) -> Self {
        self.expected_round = Some(round);
        self
    }

    pub fn expect_session(mut self, session_id: impl Into<String>) -> Self {
        self.expected_session_id = Some(session_id.into());
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn CapsuleCodec>) -> Self {
        self.codecs.push(codec);
        self
    }

    pub fn verify<'a>(
        &self,
        package: &'a VtePackage,
    ) -> std::result::Result<Verified<'a>, Rejection> {
        let result = self.run_steps(package);
        match &result {
            Ok(verified) => tracing::info!(
                round = package.tlock.round,
                decryption = ?verified.decryption,
                "package verified"
            ),
            Err(rejection) => tracing::warn!(
                round = package.tlock.round,
                step = %rejection.step,
                kind = %rejection.kind(),
                error = %rejection.error,
                "package rejected"
            ),
        }
        result
    }

    fn run_steps<'a>(
        &self,
        package: &'a VtePackage,
    ) -> std::result::Result<Verified<'a>, Rejection> {
        self.check_version(package).at(VerifyStep::Version)?;
        self.check_network(package).at(VerifyStep::Network)?;
        self.check_round(package).at(VerifyStep::Round)?;
        self.check_format(package).at(VerifyStep::Format)?;
        self.check_context(package).at(VerifyStep::ContextHash)?;
        check_digest(package).at(VerifyStep::CiphertextDigest)?;
        self.check_commitment_proof(package)
            .at(VerifyStep::CommitmentProof)?;
        self.check_discrete_log(package)
            .at(VerifyStep::DiscreteLogBinding)?;
        let decryption = self
            .check_decryption(package)
            .at(VerifyStep::DecryptionProof)?;
        Ok(Verified {
            package,
            decryption,
        })
    }

    // ========================================================================
    // Structural steps
    // ========================================================================

    fn check_version(&self, package: &VtePackage) -> Result<()> {
        if package.version != PACKAGE_VERSION {
            return Err(VteError::malformed(
                "version",
                format!("expected {PACKAGE_VERSION}, got {}", package.version),
            ));
        }
        Ok(())
    }

    fn check_network(&self, package: &VtePackage) -> Result<()> {
        if package.tlock.chain_identity != self.network.chain_identity {
            return Err(VteError::Network(format!(
                "package chain {} is not {}",
                hex::encode(package.tlock.chain_identity),
                hex::encode(self.network.chain_identity)
            )));
        }
        Ok(())
    }

    fn check_round(&self, package: &VtePackage) -> Result<()> {
        let round = package.tlock.round;
        if round == 0 {
            return Err(VteError::Network("round 0 is never released".into()));
        }
        match self.expected_round {
            Some(expected) if expected != round => Err(VteError::Network(format!(
                "round {round}, expected {expected}"
            ))),
            _ => Ok(()),
        }
    }

    fn codec_for(&self, format_id: &str) -> Result<&Arc<dyn CapsuleCodec>> {
        self.codecs
            .iter()
            .find(|c| c.format_id() == format_id)
            .ok_or_else(|| VteError::FormatMismatch {
                expected: self
                    .codecs
                    .iter()
                    .map(|c| c.format_id())
                    .collect::<Vec<_>>()
                    .join("|"),
                got: format_id.to_string(),
            })
    }

    fn check_format(&self, package: &VtePackage) -> Result<()> {
        let format_id = package.tlock.ciphertext_format_id.as_str();
        self.codec_for(format_id)?
            .parse(&package.tlock.ciphertext_bytes, format_id)?;
        Ok(())
    }

    /// The IBE ciphertext behind a capsule, parsed by the codec registered
    /// for its format
    fn bound_ciphertext(&self, format_id: &str, ciphertext: &[u8]) -> Result<IbeCiphertext> {
        self.codec_for(format_id)?
            .parse(ciphertext, format_id)?
            .ibe_ciphertext()
    }

    fn check_context(&self, package: &VtePackage) -> Result<()> {
        let context = &package.context;
        if context.schema != CONTEXT_SCHEMA {
            return Err(VteError::malformed(
                "context schema",
                format!("expected {CONTEXT_SCHEMA}, got {}", context.schema),
            ));
        }
        if !is_canonical_field_list(&context.fields) {
            return Err(VteError::BindingMismatch {
                field: "context.fields",
            });
        }
        if let Some(expected) = &self.expected_session_id {
            if context.session_id.as_deref() != Some(expected.as_str()) {
                return Err(VteError::BindingMismatch { field: "session_id" });
            }
        }
        let recomputed = compute_context_hash(
            &package.tlock.chain_identity,
            package.tlock.round,
            &package.tlock.ciphertext_digest,
            context.session_bytes(),
            &context.aux()?,
        )?;
        if recomputed != context.ctx_hash {
            return Err(VteError::BindingMismatch { field: "ctx_hash" });
        }
        Ok(())
    }

    // ========================================================================
    // Proof steps
    // ========================================================================

    fn check_commitment_proof(&self, package: &VtePackage) -> Result<()> {
        let proof = package
            .proofs
            .commitment
            .as_ref()
            .ok_or(VteError::Missing("commitment proof"))?;
        if proof.system != COMMITMENT_PROOF_SYSTEM {
            return Err(VteError::malformed(
                "proof system",
                format!("expected {COMMITMENT_PROOF_SYSTEM}, got {}", proof.system),
            ));
        }
        if proof.circuit_id != COMMITMENT_CIRCUIT_ID {
            return Err(vte_prover::ProverError::CircuitIdMismatch {
                expected: COMMITMENT_CIRCUIT_ID.to_string(),
                got: proof.circuit_id.clone(),
            }
            .into());
        }

        let commitment = codec::bn254_from_bytes(&package.public.commitment)?;
        let recomputed = commitment_public_inputs(&package.context.ctx_hash, &commitment);
        let listed = proof
            .public_inputs
            .iter()
            .map(|input| -> Result<_> {
                let bytes: [u8; 32] = hex::decode(input)
                    .map_err(|e| VteError::malformed("public input", e))?
                    .try_into()
                    .map_err(|_| VteError::malformed("public input", "expected 32 bytes"))?;
                Ok(codec::bn254_from_bytes(&bytes)?)
            })
            .collect::<Result<Vec<_>>>()?;
        if listed != recomputed {
            return Err(VteError::BindingMismatch {
                field: "proofs.commitment.public_inputs",
            });
        }

        let valid = self.keys.commitment().verify(
            &proof.circuit_id,
            &proof.vk_hash,
            &recomputed,
            &proof.proof_bytes,
        )?;
        if !valid {
            return Err(VteError::BindingMismatch {
                field: "proofs.commitment",
            });
        }
        Ok(())
    }

    fn check_discrete_log(&self, package: &VtePackage) -> Result<()> {
        let binding = package
            .proofs
            .discrete_log
            .as_ref()
            .ok_or(VteError::Missing("discrete-log binding"))?;

        match binding.scheme.as_str() {
            schnorr::SCHNORR_SCHEME => {
                if binding.bound_fields != schnorr::BOUND_FIELDS {
                    return Err(VteError::BindingMismatch {
                        field: "proofs.discrete_log.bound_fields",
                    });
                }
                let message = schnorr::binding_message(
                    &package.public.point_value,
                    &package.public.commitment,
                    &package.context.ctx_hash,
                    &package.tlock.ciphertext_digest,
                );
                schnorr::verify(
                    &package.public.point_value,
                    &message,
                    &binding.signature_bytes,
                )
            }
            GROTH16_DLOG_SCHEME => {
                if binding.bound_fields != GROTH16_DLOG_BOUND_FIELDS {
                    return Err(VteError::BindingMismatch {
                        field: "proofs.discrete_log.bound_fields",
                    });
                }
                let circuit_id = binding
                    .circuit_id
                    .as_deref()
                    .ok_or(VteError::Missing("discrete-log circuit id"))?;
                let vk_hash = decode_vk_hash(binding.vk_hash.as_deref(), "discrete-log vk hash")?;
                let point = codec::secp_decompress(&package.public.point_value)?;
                let commitment = codec::bn254_from_bytes(&package.public.commitment)?;
                let inputs =
                    discrete_log_public_inputs(&package.context.ctx_hash, &commitment, &point);
                let valid = self.keys.discrete_log().verify(
                    circuit_id,
                    &vk_hash,
                    &inputs,
                    &binding.signature_bytes,
                )?;
                if !valid {
                    return Err(VteError::BindingMismatch {
                        field: "proofs.discrete_log",
                    });
                }
                Ok(())
            }
            other => Err(VteError::malformed(
                "discrete-log scheme",
                format!("unknown scheme '{other}'"),
            )),
        }
    }

    fn check_decryption(&self, package: &VtePackage) -> Result<DecryptionStatus> {
        let proof = &package.proofs.decryption;
        if proof.status != DecryptionStatus::Proved {
            tracing::debug!(status = ?proof.status, "decryption correctness left to expiry");
            return Ok(proof.status);
        }

        let circuit_id = proof
            .circuit_id
            .as_deref()
            .ok_or(VteError::Missing("decryption circuit id"))?;
        let vk_hash = decode_vk_hash(proof.vk_hash.as_deref(), "decryption vk hash")?;
        let proof_bytes = hex::decode(
            proof
                .proof_bytes
                .as_deref()
                .ok_or(VteError::Missing("decryption proof"))?,
        )
        .map_err(|e| VteError::malformed("decryption proof", e))?;

        let ciphertext = self.bound_ciphertext(
            &package.tlock.ciphertext_format_id,
            &package.tlock.ciphertext_bytes,
        )?;
        let commitment = codec::bn254_from_bytes(&package.public.commitment)?;
        let inputs = decryption_public_inputs(
            &self.network.network_key()?,
            package.tlock.round,
            &ciphertext,
            &commitment,
            &package.context.ctx_hash,
        )?;
        let valid = self
            .keys
            .decryption()
            .verify(circuit_id, &vk_hash, &inputs, &proof_bytes)?;
        if !valid {
            return Err(VteError::BindingMismatch {
                field: "proofs.decryption",
            });
        }
        Ok(DecryptionStatus::Proved)
    }
}

fn check_digest(package: &VtePackage) -> Result<()> {
    if ciphertext_digest(&package.tlock.ciphertext_bytes) != package.tlock.ciphertext_digest {
        return Err(VteError::BindingMismatch {
            field: "ciphertext_digest",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule::{Capsule, IBE_CAPSULE_FORMAT_ID};
    use crate::timelock::{LocalBeacon, TimelockService};
    use vte_prover::constants::{G1_COMPRESSED_LEN, IBE_BLOCK_LEN};

    const RAW_FORMAT_ID: &str = "vte_ibe_bls12377_raw";

    /// `U || V || W` with no version byte
    struct RawIbeCodec;

    impl CapsuleCodec for RawIbeCodec {
        fn format_id(&self) -> &'static str {
            RAW_FORMAT_ID
        }

        fn parse(&self, ciphertext: &[u8], format_id: &str) -> Result<Capsule> {
            if format_id != RAW_FORMAT_ID {
                return Err(VteError::FormatMismatch {
                    expected: RAW_FORMAT_ID.to_string(),
                    got: format_id.to_string(),
                });
            }
            if ciphertext.len() != G1_COMPRESSED_LEN + 2 * IBE_BLOCK_LEN {
                return Err(VteError::malformed("raw capsule", "bad length"));
            }
            let (u, rest) = ciphertext.split_at(G1_COMPRESSED_LEN);
            let (v, w) = rest.split_at(IBE_BLOCK_LEN);
            Ok(Capsule {
                ephemeral_key: u.to_vec(),
                mask: v.to_vec(),
                tag: w.to_vec(),
                body: Vec::new(),
            })
        }
    }

    #[test]
    fn decryption_binding_uses_registered_codec() {
        let beacon = LocalBeacon::from_seed(b"codecs", 0, 3).unwrap();
        let chain = beacon.network().chain_identity;
        let sealed = beacon.encrypt(&chain, 2, &[7u8; 32]).unwrap();
        let native = IbeCapsuleCodec::decode(&sealed.ciphertext).unwrap();
        let raw = native.to_bytes().unwrap();

        let verifier = PackageVerifier::new(Arc::new(KeyStore::new()), beacon.network());
        let err = verifier.bound_ciphertext(RAW_FORMAT_ID, &raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);

        let verifier = verifier.with_codec(Arc::new(RawIbeCodec));
        assert_eq!(verifier.bound_ciphertext(RAW_FORMAT_ID, &raw).unwrap(), native);
        assert_eq!(
            verifier
                .bound_ciphertext(IBE_CAPSULE_FORMAT_ID, &sealed.ciphertext)
                .unwrap(),
            native
        );

        // Raw bytes under the versioned format id do not parse
        let err = verifier.bound_ciphertext(IBE_CAPSULE_FORMAT_ID, &raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProofFormat);
    }
}
