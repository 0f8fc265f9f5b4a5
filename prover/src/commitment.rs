//! Commitment Circuit
//!
//! Proves knowledge of a 32-byte secret `r2` such that
//! `C = Poseidon(DST_hi, DST_lo, r2_hi, r2_lo, ctx_hi, ctx_lo)` over BN254 Fr.
//!
//! Public Inputs (3 field elements, order matters for verifier):
//! 1. ctx_hi - high 128 bits of the context hash
//! 2. ctx_lo - low 128 bits of the context hash
//! 3. C      - the commitment
//!
//! Private Witness:
//! - r2 as 32 bytes, reduced to its limbs in-circuit

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::constraints::CryptographicSpongeVar;
use ark_crypto_primitives::sponge::poseidon::{PoseidonConfig, constraints::PoseidonSpongeVar};
use ark_r1cs_std::{fields::fp::FpVar, prelude::*, uint8::UInt8};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::circuit::bits::limbs_from_be_bytes;
use crate::circuit::poseidon::{hash_native, poseidon_config};
use crate::codec::{self, limbs_to_field};
use crate::constants::COMMITMENT_DST;

/// DST zero-padded to 32 bytes
pub fn dst_bytes() -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..COMMITMENT_DST.len()].copy_from_slice(COMMITMENT_DST);
    out
}

/// Native commitment over the limb pairs
pub fn compute_commitment(r2: &[u8; 32], ctx_hash: &[u8; 32]) -> Fr {
    compute_commitment_with(&poseidon_config(), r2, ctx_hash)
}

pub fn compute_commitment_with(
    config: &PoseidonConfig<Fr>,
    r2: &[u8; 32],
    ctx_hash: &[u8; 32],
) -> Fr {
    let (dst_hi, dst_lo) = limbs_to_field::<Fr>(&dst_bytes());
    let (r2_hi, r2_lo) = limbs_to_field::<Fr>(r2);
    let (ctx_hi, ctx_lo) = limbs_to_field::<Fr>(ctx_hash);
    hash_native(config, &[dst_hi, dst_lo, r2_hi, r2_lo, ctx_hi, ctx_lo])
}

/// `[ctx_hi, ctx_lo, C]`
pub fn commitment_public_inputs(ctx_hash: &[u8; 32], commitment: &Fr) -> Vec<Fr> {
    let (ctx_hi, ctx_lo) = limbs_to_field::<Fr>(ctx_hash);
    vec![ctx_hi, ctx_lo, *commitment]
}

/// Allocate `[ctx_hi, ctx_lo, C]` as public inputs
pub(crate) fn alloc_commitment_inputs(
    cs: ConstraintSystemRef<Fr>,
    ctx_hash: Option<[u8; 32]>,
    commitment: Option<Fr>,
) -> Result<(FpVar<Fr>, FpVar<Fr>, FpVar<Fr>), SynthesisError> {
    let limbs = ctx_hash.map(|c| limbs_to_field::<Fr>(&c));
    let ctx_hi = FpVar::new_input(cs.clone(), || {
        limbs.map(|l| l.0).ok_or(SynthesisError::AssignmentMissing)
    })?;
    let ctx_lo = FpVar::new_input(cs.clone(), || {
        limbs.map(|l| l.1).ok_or(SynthesisError::AssignmentMissing)
    })?;
    let c = FpVar::new_input(cs, || commitment.ok_or(SynthesisError::AssignmentMissing))?;
    Ok((ctx_hi, ctx_lo, c))
}

/// `C == Poseidon(DST, r2 limbs, ctx limbs)` over native BN254 variables
pub(crate) fn enforce_commitment(
    cs: ConstraintSystemRef<Fr>,
    config: &PoseidonConfig<Fr>,
    r2_bytes: &[UInt8<Fr>],
    ctx_hi: &FpVar<Fr>,
    ctx_lo: &FpVar<Fr>,
    commitment: &FpVar<Fr>,
) -> Result<(), SynthesisError> {
    let (dst_hi, dst_lo) = limbs_to_field::<Fr>(&dst_bytes());
    let dst_hi = FpVar::new_constant(cs.clone(), dst_hi)?;
    let dst_lo = FpVar::new_constant(cs.clone(), dst_lo)?;
    let (r2_hi, r2_lo) = limbs_from_be_bytes(r2_bytes)?;

    let mut sponge = PoseidonSpongeVar::new(cs, config);
    let inputs = vec![dst_hi, dst_lo, r2_hi, r2_lo, ctx_hi.clone(), ctx_lo.clone()];
    sponge.absorb(&inputs)?;
    let mut out = sponge.squeeze_field_elements(1)?;
    out.remove(0).enforce_equal(commitment)
}

#[derive(Clone)]
pub struct CommitmentCircuit {
    // === Public Inputs (3 field elements) ===
    pub ctx_hash: Option<[u8; 32]>,
    pub commitment: Option<Fr>,

    // === Private Witness ===
    pub r2: Option<[u8; 32]>,

    pub poseidon_config: PoseidonConfig<Fr>,
}

impl CommitmentCircuit {
    /// Circuit for a concrete secret; the commitment is derived natively
    pub fn new(r2: [u8; 32], ctx_hash: [u8; 32]) -> Self {
        let poseidon_config = poseidon_config();
        let commitment = compute_commitment_with(&poseidon_config, &r2, &ctx_hash);
        Self {
            ctx_hash: Some(ctx_hash),
            commitment: Some(commitment),
            r2: Some(r2),
            poseidon_config,
        }
    }

    /// Create a dummy circuit for key generation
    pub fn dummy() -> Self {
        let mut r2 = [0u8; 32];
        r2[31] = 1;
        Self::new(r2, [0u8; 32])
    }

    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        Some(commitment_public_inputs(
            self.ctx_hash.as_ref()?,
            self.commitment.as_ref()?,
        ))
    }

    /// Commitment as published in a package
    pub fn commitment_bytes(&self) -> Option<[u8; 32]> {
        self.commitment.as_ref().map(codec::bn254_to_bytes)
    }
}

impl ConstraintSynthesizer<Fr> for CommitmentCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // =====================================================================
        // Allocate Public Inputs (ORDER MATTERS - must match verifier)
        // =====================================================================
        let (ctx_hi, ctx_lo, commitment) =
            alloc_commitment_inputs(cs.clone(), self.ctx_hash, self.commitment)?;

        // =====================================================================
        // Witness
        // =====================================================================
        let r2 = self.r2.map(|b| b.map(Some)).unwrap_or([None; 32]);
        let r2_bytes = UInt8::new_witness_vec(cs.clone(), &r2)?;

        enforce_commitment(
            cs,
            &self.poseidon_config,
            &r2_bytes,
            &ctx_hi,
            &ctx_lo,
            &commitment,
        )
    }
}
