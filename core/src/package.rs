//! Package schema (`vte-tlock/0.3`).
//!
//! A package is the JSON document handed to a verifier. Byte fields are
//! lowercase hex. Field names are part of the wire format.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VteError};

pub const PACKAGE_VERSION: &str = "vte-tlock/0.3";
pub const COMMITMENT_PROOF_SYSTEM: &str = "groth16_bn254";
pub const GROTH16_DLOG_SCHEME: &str = "groth16_dlog_v1";

/// Fields the discrete-log circuit's public inputs cover
pub const GROTH16_DLOG_BOUND_FIELDS: [&str; 3] = ["point_value", "commitment", "ctx_hash"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtePackage {
    pub version: String,
    pub tlock: TlockInfo,
    pub context: ContextInfo,
    pub public: PublicInfo,
    pub proofs: ProofsInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlockInfo {
    #[serde(with = "hex::serde")]
    pub chain_identity: [u8; 32],
    pub round: u64,
    pub ciphertext_format_id: String,
    #[serde(with = "hex::serde")]
    pub ciphertext_bytes: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub ciphertext_digest: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInfo {
    pub schema: String,
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_hex: Option<String>,
    #[serde(with = "hex::serde")]
    pub ctx_hash: [u8; 32],
}

impl ContextInfo {
    pub fn session_bytes(&self) -> &[u8] {
        self.session_id.as_deref().unwrap_or_default().as_bytes()
    }

    pub fn aux(&self) -> Result<Vec<u8>> {
        match &self.aux_hex {
            Some(aux) => hex::decode(aux).map_err(|e| VteError::malformed("aux_hex", e)),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInfo {
    /// SEC1 compressed `R2`
    #[serde(with = "hex::serde")]
    pub point_value: Vec<u8>,
    /// Big-endian BN254 scalar
    #[serde(with = "hex::serde")]
    pub commitment: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofsInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<CommitmentProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discrete_log: Option<DiscreteLogBinding>,
    #[serde(default)]
    pub decryption: DecryptionProof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentProof {
    pub system: String,
    pub circuit_id: String,
    #[serde(with = "hex::serde")]
    pub vk_hash: [u8; 32],
    /// `[ctx_hi, ctx_lo, C]`, each 32-byte big-endian hex
    pub public_inputs: Vec<String>,
    #[serde(with = "hex::serde")]
    pub proof_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteLogBinding {
    pub scheme: String,
    pub bound_fields: Vec<String>,
    /// Schnorr signature, or the Groth16 proof for `groth16_dlog_v1`
    #[serde(with = "hex::serde")]
    pub signature_bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vk_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecryptionStatus {
    #[default]
    Absent,
    Proved,
    TimedOut,
    Deferred,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    pub status: DecryptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vk_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_bytes: Option<String>,
}

impl DecryptionProof {
    pub fn with_status(status: DecryptionStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn proved(circuit_id: &str, vk_hash: &[u8; 32], proof: &[u8]) -> Self {
        Self {
            status: DecryptionStatus::Proved,
            circuit_id: Some(circuit_id.to_string()),
            vk_hash: Some(hex::encode(vk_hash)),
            proof_bytes: Some(hex::encode(proof)),
        }
    }
}

impl VtePackage {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| VteError::malformed("package", e))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VteError::malformed("package", e))
    }

    /// Commitment proof and discrete-log binding are both present
    pub fn proofs_attached(&self) -> bool {
        self.proofs.commitment.is_some() && self.proofs.discrete_log.is_some()
    }
}

/// Decode a hex vk hash carried as an optional string field
pub(crate) fn decode_vk_hash(value: Option<&str>, what: &'static str) -> Result<[u8; 32]> {
    let value = value.ok_or(VteError::Missing(what))?;
    let bytes = hex::decode(value).map_err(|e| VteError::malformed(what, e))?;
    bytes
        .try_into()
        .map_err(|_| VteError::malformed(what, "expected 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VtePackage {
        VtePackage {
            version: PACKAGE_VERSION.to_string(),
            tlock: TlockInfo {
                chain_identity: [1u8; 32],
                round: 9,
                ciphertext_format_id: "vte_ibe_bls12377_v1".into(),
                ciphertext_bytes: vec![0xab; 4],
                ciphertext_digest: [2u8; 32],
            },
            context: ContextInfo {
                schema: "ctx_v3".into(),
                fields: vec!["chain_identity".into()],
                session_id: Some("s-1".into()),
                aux_hex: None,
                ctx_hash: [3u8; 32],
            },
            public: PublicInfo {
                point_value: vec![2u8; 33],
                commitment: [4u8; 32],
            },
            proofs: ProofsInfo::default(),
        }
    }

    #[test]
    fn json_shape() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], "vte-tlock/0.3");
        assert_eq!(value["tlock"]["ciphertext_bytes"], "abababab");
        assert_eq!(value["tlock"]["round"], 9);
        assert_eq!(value["context"]["session_id"], "s-1");
        assert!(value["context"].get("aux_hex").is_none());
        assert_eq!(value["proofs"]["decryption"]["status"], "absent");
        assert!(value["proofs"].get("commitment").is_none());

        assert_eq!(VtePackage::from_json(&json).unwrap(), sample());
    }

    #[test]
    fn statuses_are_snake_case() {
        let proof = DecryptionProof::with_status(DecryptionStatus::TimedOut);
        let json = serde_json::to_string(&proof).unwrap();
        assert_eq!(json, r#"{"status":"timed_out"}"#);
    }

    #[test]
    fn malformed_json_is_proof_format() {
        let err = VtePackage::from_json(r#"{"version": 3}"#).unwrap_err();
        assert_eq!(err.kind(), vte_prover::ErrorKind::ProofFormat);

        // ctx_hash of the wrong width never parses
        let json = sample().to_json().unwrap().replace(&"03".repeat(32), "0303");
        assert!(VtePackage::from_json(&json).is_err());
    }

    #[test]
    fn aux_decoding() {
        let mut pkg = sample();
        assert!(pkg.context.aux().unwrap().is_empty());
        pkg.context.aux_hex = Some("beef".into());
        assert_eq!(pkg.context.aux().unwrap(), vec![0xbe, 0xef]);
        pkg.context.aux_hex = Some("zz".into());
        assert!(pkg.context.aux().is_err());
    }
}
