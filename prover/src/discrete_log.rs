//! Discrete-Log Circuit
//!
//! Proves that the secret behind a commitment is also the discrete log of a
//! published secp256k1 point: `C = Poseidon(DST, r2, ctx)` and `R2 = r2 * G`
//! with `1 <= r2 <= n - 1`.
//!
//! Public Inputs (7 field elements, order matters for verifier):
//! 1. ctx_hi, ctx_lo  - context hash limbs
//! 2. C               - the commitment
//! 3. R2x_hi, R2x_lo  - affine x of R2
//! 4. R2y_hi, R2y_lo  - affine y of R2

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_r1cs_std::{fields::fp::FpVar, prelude::*, uint8::UInt8};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_secp256k1::Affine as SecpAffine;

use crate::circuit::bits::be_bytes_to_le_bits;
use crate::circuit::poseidon::poseidon_config;
use crate::circuit::secp::{
    enforce_affine_limbs, enforce_scalar_range, fixed_base_mul, fixed_base_mul_native,
};
use crate::codec::{self, secp_coordinate_limbs};
use crate::commitment::{
    alloc_commitment_inputs, commitment_public_inputs, compute_commitment_with, enforce_commitment,
};
use crate::error::ProverError;

/// `R2 = r2 * G`, after the native range check
pub fn point_from_secret(r2: &[u8; 32]) -> Result<SecpAffine, ProverError> {
    let scalar = codec::secp_scalar_from_bytes(r2)?;
    Ok(fixed_base_mul_native(&scalar))
}

/// `[ctx_hi, ctx_lo, C, R2x_hi, R2x_lo, R2y_hi, R2y_lo]`
pub fn discrete_log_public_inputs(
    ctx_hash: &[u8; 32],
    commitment: &Fr,
    point: &SecpAffine,
) -> Vec<Fr> {
    let mut inputs = commitment_public_inputs(ctx_hash, commitment);
    inputs.extend(secp_coordinate_limbs(point).into_iter().map(Fr::from));
    inputs
}

#[derive(Clone)]
pub struct DiscreteLogCircuit {
    // === Public Inputs (7 field elements) ===
    pub ctx_hash: Option<[u8; 32]>,
    pub commitment: Option<Fr>,
    pub point: Option<SecpAffine>,

    // === Private Witness ===
    pub r2: Option<[u8; 32]>,

    pub poseidon_config: PoseidonConfig<Fr>,
}

impl DiscreteLogCircuit {
    pub fn new(r2: [u8; 32], ctx_hash: [u8; 32]) -> Result<Self, ProverError> {
        let point = point_from_secret(&r2)?;
        let poseidon_config = poseidon_config();
        let commitment = compute_commitment_with(&poseidon_config, &r2, &ctx_hash);
        Ok(Self {
            ctx_hash: Some(ctx_hash),
            commitment: Some(commitment),
            point: Some(point),
            r2: Some(r2),
            poseidon_config,
        })
    }

    /// Create a dummy circuit for key generation
    pub fn dummy() -> Self {
        let mut r2 = [0u8; 32];
        r2[31] = 1;
        let poseidon_config = poseidon_config();
        let commitment = compute_commitment_with(&poseidon_config, &r2, &[0u8; 32]);
        Self {
            ctx_hash: Some([0u8; 32]),
            commitment: Some(commitment),
            point: Some(fixed_base_mul_native(&ark_secp256k1::Fr::from(1u64))),
            r2: Some(r2),
            poseidon_config,
        }
    }

    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        Some(discrete_log_public_inputs(
            self.ctx_hash.as_ref()?,
            self.commitment.as_ref()?,
            self.point.as_ref()?,
        ))
    }
}

impl ConstraintSynthesizer<Fr> for DiscreteLogCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // =====================================================================
        // Allocate Public Inputs (ORDER MATTERS - must match verifier)
        // =====================================================================
        let (ctx_hi, ctx_lo, commitment) =
            alloc_commitment_inputs(cs.clone(), self.ctx_hash, self.commitment)?;

        let limbs = self.point.map(|p| secp_coordinate_limbs(&p));
        let mut point_limbs = Vec::with_capacity(4);
        for i in 0..4 {
            point_limbs.push(FpVar::new_input(cs.clone(), || {
                limbs
                    .map(|l| Fr::from(l[i]))
                    .ok_or(SynthesisError::AssignmentMissing)
            })?);
        }
        let point_limbs: [FpVar<Fr>; 4] = point_limbs
            .try_into()
            .map_err(|_| SynthesisError::Unsatisfiable)?;

        // =====================================================================
        // Witness
        // =====================================================================
        let r2 = self.r2.map(|b| b.map(Some)).unwrap_or([None; 32]);
        let r2_bytes = UInt8::new_witness_vec(cs.clone(), &r2)?;

        // 1. Commitment on the same bytes
        enforce_commitment(
            cs.clone(),
            &self.poseidon_config,
            &r2_bytes,
            &ctx_hi,
            &ctx_lo,
            &commitment,
        )?;

        // 2. 1 <= r2 <= n - 1
        let scalar_bits = be_bytes_to_le_bits(&r2_bytes)?;
        enforce_scalar_range(&scalar_bits)?;

        // 3. R2 == r2 * G
        let product = fixed_base_mul(&scalar_bits)?;
        enforce_affine_limbs(cs, &product, self.point, &point_limbs)
    }
}
