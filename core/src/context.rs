//! Context Binder
//!
//! The context hash ties a commitment to one ciphertext on one chain and
//! round. Preimage layout:
//!
//! ```text
//! "VTE_CTX_V3"
//! || chain_identity            32 bytes
//! || round                     u64 big-endian
//! || ciphertext_digest         32 bytes, SHA256 of the capsule
//! || len(session_id) u32 BE || session_id
//! || len(aux)        u32 BE || aux
//! ```
//!
//! Field order and the length prefixes are part of the wire format.

use sha2::{Digest, Sha256};

use crate::error::{Result, VteError};

pub const CONTEXT_DOMAIN: &[u8] = b"VTE_CTX_V3";
pub const CONTEXT_SCHEMA: &str = "ctx_v3";

/// Field names in hashing order, as listed in a package
pub const CONTEXT_FIELDS: [&str; 5] = [
    "chain_identity",
    "round",
    "ciphertext_digest",
    "session_id",
    "aux",
];

pub fn ciphertext_digest(ciphertext: &[u8]) -> [u8; 32] {
    Sha256::digest(ciphertext).into()
}

fn length_prefix(field: &'static str, value: &[u8]) -> Result<[u8; 4]> {
    u32::try_from(value.len())
        .map(u32::to_be_bytes)
        .map_err(|_| VteError::Witness(format!("{field} longer than u32::MAX bytes")))
}

pub fn compute_context_hash(
    chain_identity: &[u8; 32],
    round: u64,
    ciphertext_digest: &[u8; 32],
    session_id: &[u8],
    aux: &[u8],
) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(CONTEXT_DOMAIN);
    hasher.update(chain_identity);
    hasher.update(round.to_be_bytes());
    hasher.update(ciphertext_digest);
    hasher.update(length_prefix("session_id", session_id)?);
    hasher.update(session_id);
    hasher.update(length_prefix("aux", aux)?);
    hasher.update(aux);
    Ok(hasher.finalize().into())
}

/// Whether a declared field list is the canonical one
pub fn is_canonical_field_list(fields: &[String]) -> bool {
    fields.len() == CONTEXT_FIELDS.len()
        && fields.iter().zip(CONTEXT_FIELDS).all(|(a, b)| a == b)
}
