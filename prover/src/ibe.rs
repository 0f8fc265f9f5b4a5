//! Identity-based timelock encryption over BLS12-377.
//!
//! The network holds `s` with `PK = s * G1`. Round `n` is released by
//! publishing `sig = s * H(n)` on G2. A 32-byte message is sealed as
//!
//! ```text
//! U = r * G1
//! V = sigma ^ SHA256("IBE-H2" || gt_bytes(e(r * PK, H(n))))
//! W = M     ^ SHA256("IBE-H4" || sigma)
//! ```
//!
//! where `r` comes from rejection sampling over `SHA256("IBE-H3" || sigma || M)`.
//! The decryption circuit re-derives every step, so this module is the
//! reference for its witness.

use ark_bls12_377::{Bls12_377, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{
    AffineRepr, CurveGroup, PrimeGroup,
    hashing::{HashToCurve, curve_maps::wb::WBMap, map_to_curve_hasher::MapToCurveBasedHasher},
    pairing::Pairing,
};
use ark_ff::{BigInteger, PrimeField, field_hashers::DefaultFieldHasher};
use ark_std::rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::codec::{self, gt_to_bytes};
use crate::constants::{
    G1_COMPRESSED_LEN, H3_MAX_ATTEMPTS, IBE_BLOCK_LEN, IBE_H2_TAG, IBE_H3_TAG, IBE_H4_TAG,
    ROUND_IDENTITY_DOMAIN,
};
use crate::error::{ProverError, Result};

type RoundHasher = MapToCurveBasedHasher<
    G2Projective,
    DefaultFieldHasher<Sha256, 128>,
    WBMap<ark_bls12_377::g2::Config>,
>;

/// Serialized ciphertext length: `U || V || W`
pub const CIPHERTEXT_LEN: usize = G1_COMPRESSED_LEN + 2 * IBE_BLOCK_LEN;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IbeCiphertext {
    pub u: G1Affine,
    pub v: [u8; IBE_BLOCK_LEN],
    pub w: [u8; IBE_BLOCK_LEN],
}

impl IbeCiphertext {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = codec::g1_to_bytes(&self.u)?;
        out.extend_from_slice(&self.v);
        out.extend_from_slice(&self.w);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CIPHERTEXT_LEN {
            return Err(ProverError::format(
                "ciphertext",
                format!("expected {CIPHERTEXT_LEN} bytes, got {}", bytes.len()),
            ));
        }
        let (u, rest) = bytes.split_at(G1_COMPRESSED_LEN);
        let (v, w) = rest.split_at(IBE_BLOCK_LEN);
        Ok(Self {
            u: codec::g1_from_bytes(u)?,
            v: v.try_into().map_err(|_| ProverError::format("ciphertext", "bad V"))?,
            w: w.try_into().map_err(|_| ProverError::format("ciphertext", "bad W"))?,
        })
    }
}

/// The encryptor's randomness, which is also the decryption-proof witness
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IbeOpening {
    pub sigma: [u8; IBE_BLOCK_LEN],
    /// Rejection-sampling counter that produced `r`, in `1..=8`
    pub counter: u8,
}

/// `Q_id = H_G2(round as u64 big-endian)`
pub fn round_identity(round: u64) -> Result<G2Affine> {
    let hasher = RoundHasher::new(ROUND_IDENTITY_DOMAIN).map_err(|e| ProverError::Setup {
        kind: crate::keys::CircuitKind::Decryption,
        reason: format!("round hasher: {e}"),
    })?;
    hasher
        .hash(&round.to_be_bytes())
        .map_err(|e| ProverError::Witness(format!("hash to G2 failed: {e}")))
}

pub fn h3(sigma: &[u8; IBE_BLOCK_LEN], msg: &[u8; IBE_BLOCK_LEN]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(IBE_H3_TAG);
    hasher.update(sigma);
    hasher.update(msg);
    hasher.finalize().into()
}

/// Candidate for `counter`, top three bits cleared
pub fn h3_candidate(counter: u8, h3: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((counter as u16).to_le_bytes());
    hasher.update(h3);
    let mut digest: [u8; 32] = hasher.finalize().into();
    digest[0] &= 0x1f;
    digest
}

fn modulus_be() -> Vec<u8> {
    Fr::MODULUS.to_bytes_be()
}

/// First accepted candidate as `(r, counter)`, or `None` if all eight fail
pub fn derive_r(sigma: &[u8; IBE_BLOCK_LEN], msg: &[u8; IBE_BLOCK_LEN]) -> Option<(Fr, u8)> {
    let h3 = h3(sigma, msg);
    let modulus = modulus_be();
    (1..=H3_MAX_ATTEMPTS).find_map(|counter| {
        let d = h3_candidate(counter, &h3);
        (d.as_slice() < modulus.as_slice()).then(|| (Fr::from_be_bytes_mod_order(&d), counter))
    })
}

pub fn h2(gt: &<Bls12_377 as Pairing>::TargetField) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(IBE_H2_TAG);
    hasher.update(gt_to_bytes(gt));
    hasher.finalize().into()
}

pub fn h4(sigma: &[u8; IBE_BLOCK_LEN]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(IBE_H4_TAG);
    hasher.update(sigma);
    hasher.finalize().into()
}

fn xor(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b)) {
        *o = x ^ y;
    }
    out
}

/// Seal with a fixed sigma; `None` when rejection sampling exhausts
pub fn encrypt_with_sigma(
    pk: &G1Affine,
    q_id: &G2Affine,
    msg: &[u8; IBE_BLOCK_LEN],
    sigma: [u8; IBE_BLOCK_LEN],
) -> Option<(IbeCiphertext, IbeOpening)> {
    let (r, counter) = derive_r(&sigma, msg)?;
    let u = (G1Projective::generator() * r).into_affine();
    let shared = (*pk * r).into_affine();
    let gt = Bls12_377::pairing(shared, *q_id);
    let v = xor(&sigma, &h2(&gt.0));
    let w = xor(msg, &h4(&sigma));
    Some((IbeCiphertext { u, v, w }, IbeOpening { sigma, counter }))
}

pub fn encrypt<R: RngCore + CryptoRng>(
    pk: &G1Affine,
    round: u64,
    msg: &[u8; IBE_BLOCK_LEN],
    rng: &mut R,
) -> Result<(IbeCiphertext, IbeOpening)> {
    if pk.is_zero() {
        return Err(ProverError::format("network key", "point at infinity"));
    }
    let q_id = round_identity(round)?;
    loop {
        let mut sigma = [0u8; IBE_BLOCK_LEN];
        rng.fill_bytes(&mut sigma);
        if let Some(sealed) = encrypt_with_sigma(pk, &q_id, msg, sigma) {
            return Ok(sealed);
        }
        tracing::debug!("rejection sampling exhausted, resampling sigma");
    }
}

/// Open a ciphertext with the round signature
pub fn decrypt(ct: &IbeCiphertext, sig: &G2Affine) -> Result<[u8; IBE_BLOCK_LEN]> {
    let gt = Bls12_377::pairing(ct.u, *sig);
    let sigma = xor(&ct.v, &h2(&gt.0));
    let msg = xor(&ct.w, &h4(&sigma));

    let (r, _) = derive_r(&sigma, &msg).ok_or(ProverError::BindingMismatch {
        field: "ciphertext",
    })?;
    if (G1Projective::generator() * r).into_affine() != ct.u {
        return Err(ProverError::BindingMismatch { field: "ciphertext" });
    }
    Ok(msg)
}

/// `sig = s * Q_id`
pub fn sign_round(secret: &Fr, round: u64) -> Result<G2Affine> {
    Ok((round_identity(round)? * *secret).into_affine())
}

/// `e(G1, sig) == e(PK, Q_id)`
pub fn verify_round_signature(pk: &G1Affine, round: u64, sig: &G2Affine) -> Result<bool> {
    let q_id = round_identity(round)?;
    Ok(Bls12_377::pairing(G1Affine::generator(), *sig) == Bls12_377::pairing(*pk, q_id))
}
