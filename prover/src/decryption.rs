//! Decryption-Correctness Circuit (Groth16 over BW6-761)
//!
//! Proves that a BLS12-377 IBE ciphertext decrypts to the secret behind a
//! BN254 commitment. BW6-761's scalar field is the BLS12-377 base field, so
//! the pairing runs natively; the BN254 Poseidon commitment is emulated.
//!
//! Public Inputs (17 field elements, order matters for verifier):
//! 1. Q_id    - round identity on G2 (6)
//! 2. PK      - network key on G1 (3)
//! 3. U       - ciphertext ephemeral point on G1 (3)
//! 4. V       - masked sigma, 32 bytes packed (1)
//! 5. W       - masked secret, 32 bytes packed (1)
//! 6. C       - BN254 commitment, lifted (1)
//! 7. ctx_hi, ctx_lo (2)
//!
//! Private Witness:
//! - r2 (32 bytes), sigma (32 bytes), the rejection-sampling counter

use std::cmp::Ordering;

use ark_bls12_377::{
    Fq, Fr as BlsFr, G1Affine, G1Projective, G2Affine,
    constraints::{G1Var, G2Var, PairingVar as BlsPairingVar},
};
use ark_bn254::Fr as Bn254Fr;
use ark_crypto_primitives::crh::sha256::constraints::Sha256Gadget;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_ec::{CurveGroup, PrimeGroup};
use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::{
    convert::ToConstraintFieldGadget,
    fields::{emulated_fp::EmulatedFpVar, fp::FpVar},
    prelude::*,
    uint8::UInt8,
};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use crate::circuit::bits::{be_bytes_to_le_bits, emulated_from_bits, fp_to_be_bytes, xor_bytes};
use crate::circuit::poseidon::{hash_var, poseidon_config};
use crate::codec::{self, GT_COEFF_LEN};
use crate::commitment::{compute_commitment_with, dst_bytes};
use crate::constants::{H3_MAX_ATTEMPTS, IBE_BLOCK_LEN, IBE_H2_TAG, IBE_H3_TAG, IBE_H4_TAG};
use crate::error::ProverError;
use crate::ibe::{self, IbeCiphertext, IbeOpening};

type CommitVar = EmulatedFpVar<Bn254Fr, Fq>;

/// Public input count, excluding the constant one
pub const NUM_PUBLIC_INPUTS: usize = 17;

/// Lift a BN254 scalar into the BLS12-377 base field
pub fn lift_commitment(commitment: &Bn254Fr) -> Fq {
    Fq::from_le_bytes_mod_order(&commitment.into_bigint().to_bytes_le())
}

/// Public inputs for a round, resolving `Q_id` from the round number
pub fn decryption_public_inputs(
    network_key: &G1Affine,
    round: u64,
    ciphertext: &IbeCiphertext,
    commitment: &Bn254Fr,
    ctx_hash: &[u8; 32],
) -> Result<Vec<Fq>, ProverError> {
    let q_id = ibe::round_identity(round)?;
    decryption_public_inputs_with(&q_id, network_key, ciphertext, commitment, ctx_hash)
}

pub fn decryption_public_inputs_with(
    q_id: &G2Affine,
    network_key: &G1Affine,
    ciphertext: &IbeCiphertext,
    commitment: &Bn254Fr,
    ctx_hash: &[u8; 32],
) -> Result<Vec<Fq>, ProverError> {
    let mut inputs = Vec::with_capacity(NUM_PUBLIC_INPUTS);
    inputs.extend(codec::g2_public_inputs(q_id));
    inputs.extend(codec::g1_public_inputs(network_key));
    inputs.extend(codec::g1_public_inputs(&ciphertext.u));
    inputs.extend(codec::bytes_public_inputs(&ciphertext.v)?);
    inputs.extend(codec::bytes_public_inputs(&ciphertext.w)?);
    inputs.push(lift_commitment(commitment));
    let (ctx_hi, ctx_lo) = codec::limbs_to_field::<Fq>(ctx_hash);
    inputs.push(ctx_hi);
    inputs.push(ctx_lo);
    Ok(inputs)
}

#[derive(Clone)]
pub struct DecryptionCircuit {
    // === Public Inputs ===
    pub round_identity: Option<G2Affine>,
    pub network_key: Option<G1Affine>,
    pub ciphertext: Option<IbeCiphertext>,
    pub commitment: Option<Bn254Fr>,
    pub ctx_hash: Option<[u8; 32]>,

    // === Private Witness ===
    pub r2: Option<[u8; 32]>,
    pub opening: Option<IbeOpening>,

    pub poseidon_config: PoseidonConfig<Bn254Fr>,
}

impl DecryptionCircuit {
    pub fn new(
        network_key: G1Affine,
        round: u64,
        ciphertext: IbeCiphertext,
        opening: IbeOpening,
        r2: [u8; 32],
        ctx_hash: [u8; 32],
    ) -> Result<Self, ProverError> {
        if !(1..=H3_MAX_ATTEMPTS).contains(&opening.counter) {
            return Err(ProverError::Witness(format!(
                "rejection-sampling counter {} outside 1..={H3_MAX_ATTEMPTS}",
                opening.counter
            )));
        }
        let poseidon_config = poseidon_config();
        let commitment = compute_commitment_with(&poseidon_config, &r2, &ctx_hash);
        Ok(Self {
            round_identity: Some(ibe::round_identity(round)?),
            network_key: Some(network_key),
            ciphertext: Some(ciphertext),
            commitment: Some(commitment),
            ctx_hash: Some(ctx_hash),
            r2: Some(r2),
            opening: Some(opening),
            poseidon_config,
        })
    }

    /// Circuit with no assignment; enough for setup and shape measurement
    pub fn blank() -> Self {
        Self {
            round_identity: None,
            network_key: None,
            ciphertext: None,
            commitment: None,
            ctx_hash: None,
            r2: None,
            opening: None,
            poseidon_config: poseidon_config(),
        }
    }

    /// Create a dummy circuit for key generation
    ///
    /// Network key `1 * G1`, round 1, secret `1`. Sigma is searched
    /// deterministically until rejection sampling accepts.
    pub fn dummy() -> Self {
        let mut r2 = [0u8; 32];
        r2[31] = 1;
        let network_key = G1Projective::generator().into_affine();
        let Ok(q_id) = ibe::round_identity(1) else {
            return Self::blank();
        };
        let sealed = (0u16..=u16::MAX).find_map(|seed| {
            let mut sigma = [0u8; IBE_BLOCK_LEN];
            sigma[..2].copy_from_slice(&seed.to_be_bytes());
            ibe::encrypt_with_sigma(&network_key, &q_id, &r2, sigma)
        });
        let Some((ciphertext, opening)) = sealed else {
            return Self::blank();
        };
        let poseidon_config = poseidon_config();
        let commitment = compute_commitment_with(&poseidon_config, &r2, &[0u8; 32]);
        Self {
            round_identity: Some(q_id),
            network_key: Some(network_key),
            ciphertext: Some(ciphertext),
            commitment: Some(commitment),
            ctx_hash: Some([0u8; 32]),
            r2: Some(r2),
            opening: Some(opening),
            poseidon_config,
        }
    }

    pub fn public_inputs(&self) -> Option<Vec<Fq>> {
        decryption_public_inputs_with(
            self.round_identity.as_ref()?,
            self.network_key.as_ref()?,
            self.ciphertext.as_ref()?,
            self.commitment.as_ref()?,
            self.ctx_hash.as_ref()?,
        )
        .ok()
    }
}

fn tagged_sha256(tag: &[u8], parts: &[&[UInt8<Fq>]]) -> Result<Vec<UInt8<Fq>>, SynthesisError> {
    let mut input = UInt8::constant_vec(tag);
    for part in parts {
        input.extend_from_slice(part);
    }
    Ok(Sha256Gadget::digest(&input)?.0)
}

/// Rejection sampling over the eight candidates of `h3`.
///
/// Returns the LE bits of the first candidate below the BLS12-377 group
/// order and enforces that its index equals `counter`.
fn select_scalar(
    h3: &[UInt8<Fq>],
    counter: &UInt8<Fq>,
) -> Result<Vec<Boolean<Fq>>, SynthesisError> {
    let order = FpVar::constant(Fq::from_le_bytes_mod_order(&BlsFr::MODULUS.to_bytes_le()));
    let scalar_bits = BlsFr::MODULUS_BIT_SIZE as usize;

    let mut candidates = Vec::with_capacity(H3_MAX_ATTEMPTS as usize);
    let mut chosen = Vec::with_capacity(H3_MAX_ATTEMPTS as usize);
    let mut none_before = Boolean::TRUE;

    for attempt in 1..=H3_MAX_ATTEMPTS {
        let mut input = UInt8::constant_vec(&(attempt as u16).to_le_bytes());
        input.extend_from_slice(h3);
        let mut digest = Sha256Gadget::digest(&input)?.0;

        // d[0] &= 0x1f
        let mut top = digest[0].to_bits_le()?;
        for bit in top.iter_mut().skip(5) {
            *bit = Boolean::FALSE;
        }
        digest[0] = UInt8::from_bits_le(&top);

        let bits = be_bytes_to_le_bits(&digest)?;
        let value = Boolean::le_bits_to_fp(&bits)?;
        let accepted = value.is_cmp_unchecked(&order, Ordering::Less, false)?;

        let is_chosen = &accepted & &none_before;
        is_chosen.enforce_equal(&counter.is_eq(&UInt8::constant(attempt))?)?;
        none_before = &none_before & !&accepted;

        candidates.push(bits[..scalar_bits].to_vec());
        chosen.push(is_chosen);
    }
    Boolean::kary_or(&chosen)?.enforce_equal(&Boolean::TRUE)?;

    let mut r_bits = Vec::with_capacity(scalar_bits);
    for i in 0..scalar_bits {
        let picks = candidates
            .iter()
            .zip(&chosen)
            .map(|(bits, sel)| &bits[i] & sel)
            .collect::<Vec<_>>();
        r_bits.push(Boolean::kary_or(&picks)?);
    }
    Ok(r_bits)
}

impl ConstraintSynthesizer<Fq> for DecryptionCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fq>) -> Result<(), SynthesisError> {
        // =====================================================================
        // Allocate Public Inputs (ORDER MATTERS - must match verifier)
        // =====================================================================
        let q_id = G2Var::new_input(cs.clone(), || {
            self.round_identity.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let network_key = G1Var::new_input(cs.clone(), || {
            self.network_key.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let u = G1Var::new_input(cs.clone(), || {
            self.ciphertext
                .as_ref()
                .map(|ct| ct.u)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        let (v_bytes, w_bytes) = match &self.ciphertext {
            Some(ct) => (ct.v, ct.w),
            None => ([0u8; IBE_BLOCK_LEN], [0u8; IBE_BLOCK_LEN]),
        };
        let v = UInt8::new_input_vec(cs.clone(), &v_bytes)?;
        let w = UInt8::new_input_vec(cs.clone(), &w_bytes)?;
        let commitment = FpVar::new_input(cs.clone(), || {
            self.commitment
                .as_ref()
                .map(lift_commitment)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        let limbs = self.ctx_hash.map(|c| codec::limbs_to_field::<Fq>(&c));
        let ctx_hi = FpVar::new_input(cs.clone(), || {
            limbs.map(|l| l.0).ok_or(SynthesisError::AssignmentMissing)
        })?;
        let ctx_lo = FpVar::new_input(cs.clone(), || {
            limbs.map(|l| l.1).ok_or(SynthesisError::AssignmentMissing)
        })?;

        // =====================================================================
        // Witness
        // =====================================================================
        let r2 = self.r2.map(|b| b.map(Some)).unwrap_or([None; 32]);
        let r2 = UInt8::new_witness_vec(cs.clone(), &r2)?;
        let sigma = self
            .opening
            .map(|o| o.sigma.map(Some))
            .unwrap_or([None; IBE_BLOCK_LEN]);
        let sigma = UInt8::new_witness_vec(cs.clone(), &sigma)?;
        let counter = UInt8::new_witness(cs.clone(), || {
            self.opening
                .map(|o| o.counter)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;

        // =====================================================================
        // 1. Commitment, emulated over BN254
        // =====================================================================
        let r2_bits = be_bytes_to_le_bits(&r2)?;
        let r2_lo = emulated_from_bits::<Bn254Fr, Fq>(&r2_bits[..128])?;
        let r2_hi = emulated_from_bits::<Bn254Fr, Fq>(&r2_bits[128..])?;
        let (ctx_hi_bits, _) = ctx_hi.to_bits_le_with_top_bits_zero(128)?;
        let (ctx_lo_bits, _) = ctx_lo.to_bits_le_with_top_bits_zero(128)?;
        let ctx_hi_var = emulated_from_bits::<Bn254Fr, Fq>(&ctx_hi_bits)?;
        let ctx_lo_var = emulated_from_bits::<Bn254Fr, Fq>(&ctx_lo_bits)?;
        let (dst_hi, dst_lo) = codec::limbs_to_field::<Bn254Fr>(&dst_bytes());

        let c = hash_var(
            &self.poseidon_config,
            &[
                CommitVar::constant(dst_hi),
                CommitVar::constant(dst_lo),
                r2_hi,
                r2_lo,
                ctx_hi_var,
                ctx_lo_var,
            ],
        )?;
        let c_bits = c.to_bits_le()?;
        Boolean::le_bits_to_fp(&c_bits[..Bn254Fr::MODULUS_BIT_SIZE as usize])?
            .enforce_equal(&commitment)?;

        // =====================================================================
        // 2. W == r2 ^ H4(sigma)
        // =====================================================================
        let h4 = tagged_sha256(IBE_H4_TAG, &[&sigma[..]])?;
        xor_bytes(&r2, &h4)?.enforce_equal(&w)?;

        // =====================================================================
        // 3. r from H3(sigma || r2) by rejection sampling
        // =====================================================================
        let h3 = tagged_sha256(IBE_H3_TAG, &[&sigma[..], &r2[..]])?;
        let r_bits = select_scalar(&h3, &counter)?;

        // =====================================================================
        // 4. U == r * G1
        // =====================================================================
        let generator = G1Var::constant(G1Projective::generator());
        generator.scalar_mul_le(r_bits.iter())?.enforce_equal(&u)?;

        // =====================================================================
        // 5. sigma == V ^ H2(e(r * PK, Q_id))
        // =====================================================================
        let shared = network_key.scalar_mul_le(r_bits.iter())?;
        let gt = BlsPairingVar::pairing(
            BlsPairingVar::prepare_g1(&shared)?,
            BlsPairingVar::prepare_g2(&q_id)?,
        )?;
        let mut gt_bytes = Vec::with_capacity(codec::GT_BYTES_LEN);
        for coeff in gt.to_constraint_field()? {
            gt_bytes.extend(fp_to_be_bytes(&coeff, GT_COEFF_LEN)?);
        }
        let h2 = tagged_sha256(IBE_H2_TAG, &[&gt_bytes[..]])?;
        xor_bytes(&v, &h2)?.enforce_equal(&sigma)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_377::{Bls12_377, constraints::Fq12Var};
    use ark_ec::pairing::Pairing;
    use ark_relations::r1cs::ConstraintSystem;
    use ark_std::{UniformRand, rand::SeedableRng, rand::rngs::StdRng};

    struct Fixture {
        pk: G1Affine,
        ct: IbeCiphertext,
        opening: IbeOpening,
        r2: [u8; 32],
        ctx: [u8; 32],
    }

    fn fixture(seed: u64) -> Fixture {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = BlsFr::rand(&mut rng);
        let pk = (G1Projective::generator() * s).into_affine();
        let mut r2 = [0u8; 32];
        for (i, b) in r2.iter_mut().enumerate() {
            *b = 1 + i as u8;
        }
        let (ct, opening) = ibe::encrypt(&pk, 3, &r2, &mut rng).unwrap();
        Fixture {
            pk,
            ct,
            opening,
            r2,
            ctx: [0xabu8; 32],
        }
    }

    #[test]
    fn public_input_layout() {
        let f = fixture(1);
        let inputs =
            decryption_public_inputs(&f.pk, 3, &f.ct, &Bn254Fr::from(5u64), &f.ctx).unwrap();
        assert_eq!(inputs.len(), NUM_PUBLIC_INPUTS);
        // G2 z = (1, 0), G1 z = 1
        assert_eq!(inputs[4], Fq::from(1u64));
        assert_eq!(inputs[5], Fq::from(0u64));
        assert_eq!(inputs[8], Fq::from(1u64));
        assert_eq!(inputs[11], Fq::from(1u64));
        assert_eq!(inputs[14], Fq::from(5u64));
    }

    #[test]
    fn counter_out_of_range_rejected() {
        let f = fixture(2);
        let opening = IbeOpening {
            sigma: f.opening.sigma,
            counter: 9,
        };
        let err = DecryptionCircuit::new(f.pk, 3, f.ct, opening, f.r2, f.ctx).err();
        assert!(matches!(err, Some(ProverError::Witness(_))));
    }

    #[test]
    fn blank_circuit_has_no_public_inputs() {
        assert!(DecryptionCircuit::blank().public_inputs().is_none());
        assert!(DecryptionCircuit::dummy().public_inputs().is_some());
    }

    fn witness_bytes(cs: &ConstraintSystemRef<Fq>, bytes: &[u8]) -> Vec<UInt8<Fq>> {
        UInt8::new_witness_vec(cs.clone(), bytes).unwrap()
    }

    fn byte_values(bytes: &[UInt8<Fq>]) -> Vec<u8> {
        bytes.iter().map(|b| b.value().unwrap()).collect()
    }

    /// First sigma (by a two-byte seed) whose rejection sampling stops at a counter `accept` likes
    fn sigma_where(r2: &[u8; 32], accept: impl Fn(u8) -> bool) -> ([u8; IBE_BLOCK_LEN], BlsFr, u8) {
        (0u16..=u16::MAX)
            .find_map(|seed| {
                let mut sigma = [0u8; IBE_BLOCK_LEN];
                sigma[..2].copy_from_slice(&seed.to_be_bytes());
                let (r, counter) = ibe::derive_r(&sigma, r2)?;
                accept(counter).then_some((sigma, r, counter))
            })
            .unwrap()
    }

    fn scalar_from_bits(bits: &[Boolean<Fq>]) -> BlsFr {
        let bits = bits.iter().map(|b| b.value().unwrap()).collect::<Vec<_>>();
        BlsFr::from_bigint(<BlsFr as PrimeField>::BigInt::from_bits_le(&bits)).unwrap()
    }

    #[test]
    fn tagged_h3_matches_native() {
        let f = fixture(6);
        let cs = ConstraintSystem::<Fq>::new_ref();
        let sigma = witness_bytes(&cs, &f.opening.sigma);
        let r2 = witness_bytes(&cs, &f.r2);

        let h3 = tagged_sha256(IBE_H3_TAG, &[&sigma[..], &r2[..]]).unwrap();
        let expected = ibe::h3(&f.opening.sigma, &f.r2);
        assert_eq!(byte_values(&h3), expected);

        // Every candidate the gadget could pick is the native one
        for counter in 1..=H3_MAX_ATTEMPTS {
            let mut input = UInt8::constant_vec(&(counter as u16).to_le_bytes());
            input.extend_from_slice(&h3);
            let mut digest = byte_values(&Sha256Gadget::digest(&input).unwrap().0);
            digest[0] &= 0x1f;
            assert_eq!(digest, ibe::h3_candidate(counter, &expected));
        }
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn select_scalar_follows_rejection_sampling() {
        let r2 = [0x42u8; 32];
        let modulus = BlsFr::MODULUS.to_bytes_be();
        let first = sigma_where(&r2, |c| c == 1);
        let later = sigma_where(&r2, |c| c > 1);

        for (sigma, r, counter) in [first, later] {
            if counter > 1 {
                let h3 = ibe::h3(&sigma, &r2);
                assert!(ibe::h3_candidate(1, &h3).as_slice() >= modulus.as_slice());
            }
            let cs = ConstraintSystem::<Fq>::new_ref();
            let h3 = UInt8::new_witness_vec(cs.clone(), &ibe::h3(&sigma, &r2)).unwrap();
            let counter = UInt8::new_witness(cs.clone(), || Ok(counter)).unwrap();

            let r_bits = select_scalar(&h3, &counter).unwrap();
            assert_eq!(r_bits.len(), BlsFr::MODULUS_BIT_SIZE as usize);
            assert_eq!(scalar_from_bits(&r_bits), r);
            assert!(cs.is_satisfied().unwrap());
        }
    }

    #[test]
    fn select_scalar_rejects_other_counter() {
        let r2 = [0x42u8; 32];
        let (sigma, _, counter) = sigma_where(&r2, |c| c > 1);
        for claimed in [1, counter + 1] {
            let cs = ConstraintSystem::<Fq>::new_ref();
            let h3 = UInt8::new_witness_vec(cs.clone(), &ibe::h3(&sigma, &r2)).unwrap();
            let claimed = UInt8::new_witness(cs.clone(), || Ok(claimed)).unwrap();
            select_scalar(&h3, &claimed).unwrap();
            assert!(!cs.is_satisfied().unwrap());
        }
    }

    #[test]
    fn derived_scalar_reproduces_u() {
        let f = fixture(7);
        let (r, _) = ibe::derive_r(&f.opening.sigma, &f.r2).unwrap();
        let cs = ConstraintSystem::<Fq>::new_ref();
        let h3 = UInt8::new_witness_vec(cs.clone(), &ibe::h3(&f.opening.sigma, &f.r2)).unwrap();
        let counter = UInt8::new_witness(cs.clone(), || Ok(f.opening.counter)).unwrap();
        let u = G1Var::new_input(cs.clone(), || Ok(f.ct.u)).unwrap();

        let r_bits = select_scalar(&h3, &counter).unwrap();
        assert_eq!(scalar_from_bits(&r_bits), r);
        let generator = G1Var::constant(G1Projective::generator());
        let derived = generator.scalar_mul_le(r_bits.iter()).unwrap();
        assert_eq!(derived.value().unwrap().into_affine(), f.ct.u);
        derived.enforce_equal(&u).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn masked_secret_matches_h4() {
        let f = fixture(8);
        for (r2, holds) in [(f.r2, true), ([0u8; 32], false)] {
            let cs = ConstraintSystem::<Fq>::new_ref();
            let sigma = witness_bytes(&cs, &f.opening.sigma);
            let r2 = witness_bytes(&cs, &r2);
            let w = UInt8::new_input_vec(cs.clone(), &f.ct.w).unwrap();

            let h4 = tagged_sha256(IBE_H4_TAG, &[&sigma[..]]).unwrap();
            assert_eq!(byte_values(&h4), ibe::h4(&f.opening.sigma));
            xor_bytes(&r2, &h4).unwrap().enforce_equal(&w).unwrap();
            assert_eq!(cs.is_satisfied().unwrap(), holds);
        }
    }

    #[test]
    fn h2_of_pairing_bytes_unmasks_sigma() {
        let f = fixture(9);
        let (r, _) = ibe::derive_r(&f.opening.sigma, &f.r2).unwrap();
        let shared = (f.pk * r).into_affine();
        let gt = Bls12_377::pairing(shared, ibe::round_identity(3).unwrap()).0;

        let cs = ConstraintSystem::<Fq>::new_ref();
        let gt_var = Fq12Var::new_witness(cs.clone(), || Ok(gt)).unwrap();
        let v = UInt8::new_input_vec(cs.clone(), &f.ct.v).unwrap();
        let sigma = witness_bytes(&cs, &f.opening.sigma);

        let mut gt_bytes = Vec::with_capacity(codec::GT_BYTES_LEN);
        for coeff in gt_var.to_constraint_field().unwrap() {
            gt_bytes.extend(fp_to_be_bytes(&coeff, GT_COEFF_LEN).unwrap());
        }
        assert_eq!(byte_values(&gt_bytes), codec::gt_to_bytes(&gt));

        let h2 = tagged_sha256(IBE_H2_TAG, &[&gt_bytes[..]]).unwrap();
        assert_eq!(byte_values(&h2), ibe::h2(&gt));
        xor_bytes(&v, &h2).unwrap().enforce_equal(&sigma).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    #[ignore = "pairing circuit synthesis takes minutes"]
    fn honest_witness_satisfies() {
        let f = fixture(3);
        let circuit = DecryptionCircuit::new(f.pk, 3, f.ct, f.opening, f.r2, f.ctx).unwrap();
        let expected = circuit.public_inputs().unwrap();

        let cs = ConstraintSystem::<Fq>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        println!("Number of constraints: {}", cs.num_constraints());

        // 17 public inputs + 1 (arkworks adds a constant "1" as first input)
        assert_eq!(cs.num_instance_variables(), NUM_PUBLIC_INPUTS + 1);
        assert_eq!(&cs.borrow().unwrap().instance_assignment[1..], expected.as_slice());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    #[ignore = "pairing circuit synthesis takes minutes"]
    fn wrong_secret_unsatisfied() {
        let f = fixture(4);
        let mut circuit = DecryptionCircuit::new(f.pk, 3, f.ct, f.opening, f.r2, f.ctx).unwrap();
        let mut r2 = f.r2;
        r2[0] ^= 0x80;
        circuit.r2 = Some(r2);

        let cs = ConstraintSystem::<Fq>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    #[ignore = "pairing circuit synthesis takes minutes"]
    fn wrong_counter_unsatisfied() {
        let f = fixture(5);
        let mut circuit = DecryptionCircuit::new(f.pk, 3, f.ct, f.opening, f.r2, f.ctx).unwrap();
        let mut opening = f.opening;
        opening.counter = if opening.counter == 1 { 2 } else { 1 };
        circuit.opening = Some(opening);

        let cs = ConstraintSystem::<Fq>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }
}
