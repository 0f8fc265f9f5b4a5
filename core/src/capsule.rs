//! Capsule Codec
//!
//! A capsule is the opaque ciphertext returned by the timelock service. The
//! verifier only needs the fields a decryption proof binds to, so codecs
//! expose them through [`Capsule`].
//!
//! The native format, `vte_ibe_bls12377_v1`, is
//! `version (0x01) || U (48) || V (32) || W (32)`.

use vte_prover::IbeCiphertext;
use vte_prover::constants::{G1_COMPRESSED_LEN, IBE_BLOCK_LEN};

use crate::error::{Result, VteError};

pub const IBE_CAPSULE_FORMAT_ID: &str = "vte_ibe_bls12377_v1";
const IBE_CAPSULE_VERSION: u8 = 0x01;

/// Parsed binding fields of a capsule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capsule {
    pub ephemeral_key: Vec<u8>,
    pub mask: Vec<u8>,
    pub tag: Vec<u8>,
    /// Symmetric payload, empty when the message fits in the header
    pub body: Vec<u8>,
}

impl Capsule {
    /// The IBE ciphertext a decryption proof binds to.
    ///
    /// Only header-only capsules carry one: a 48-byte compressed `U` and
    /// 32-byte `V` and `W`.
    pub fn ibe_ciphertext(&self) -> Result<IbeCiphertext> {
        if !self.body.is_empty() {
            return Err(VteError::malformed(
                "capsule",
                "symmetric body cannot be bound by the decryption proof",
            ));
        }
        let block = |bytes: &[u8], what: &'static str| -> Result<[u8; IBE_BLOCK_LEN]> {
            bytes.try_into().map_err(|_| {
                VteError::malformed(what, format!("expected {IBE_BLOCK_LEN} bytes, got {}", bytes.len()))
            })
        };
        Ok(IbeCiphertext {
            u: vte_prover::codec::g1_from_bytes(&self.ephemeral_key)?,
            v: block(&self.mask, "capsule mask")?,
            w: block(&self.tag, "capsule tag")?,
        })
    }
}

pub trait CapsuleCodec: Send + Sync {
    fn format_id(&self) -> &'static str;

    /// Parse a capsule, failing with `FormatMismatch` for another format
    fn parse(&self, ciphertext: &[u8], format_id: &str) -> Result<Capsule>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IbeCapsuleCodec;

impl IbeCapsuleCodec {
    pub const LEN: usize = 1 + vte_prover::ibe::CIPHERTEXT_LEN;

    pub fn encode(ciphertext: &IbeCiphertext) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::LEN);
        out.push(IBE_CAPSULE_VERSION);
        out.extend(ciphertext.to_bytes()?);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<IbeCiphertext> {
        match bytes.split_first() {
            Some((&IBE_CAPSULE_VERSION, rest)) => Ok(IbeCiphertext::from_bytes(rest)?),
            Some((version, _)) => Err(VteError::malformed(
                "capsule",
                format!("unknown version {version:#04x}"),
            )),
            None => Err(VteError::malformed("capsule", "empty")),
        }
    }
}

impl CapsuleCodec for IbeCapsuleCodec {
    fn format_id(&self) -> &'static str {
        IBE_CAPSULE_FORMAT_ID
    }

    fn parse(&self, ciphertext: &[u8], format_id: &str) -> Result<Capsule> {
        if format_id != IBE_CAPSULE_FORMAT_ID {
            return Err(VteError::FormatMismatch {
                expected: IBE_CAPSULE_FORMAT_ID.to_string(),
                got: format_id.to_string(),
            });
        }
        // Validates the point as well as the lengths
        Self::decode(ciphertext)?;
        let (u, rest) = ciphertext[1..].split_at(G1_COMPRESSED_LEN);
        let (v, w) = rest.split_at(IBE_BLOCK_LEN);
        Ok(Capsule {
            ephemeral_key: u.to_vec(),
            mask: v.to_vec(),
            tag: w.to_vec(),
            body: Vec::new(),
        })
    }
}
