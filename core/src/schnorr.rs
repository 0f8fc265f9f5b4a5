//! Fiat-Shamir Schnorr proof of knowledge of `r2` for `R2 = r2 * G`.
//!
//! ```text
//! k = SHA256("VTE_SCHNORR_NONCE_V1" || r2 || msg || aux32) mod n
//! R = k * G
//! e = SHA256("VTE_SCHNORR_FS_V1" || R || R2 || msg) mod n
//! s = k + e * r2
//! signature = R (SEC1 compressed, 33) || s (32, big-endian)
//! ```
//!
//! `msg` is the concatenation of the bound fields, so the proof cannot be
//! lifted onto another commitment, context or ciphertext.

use k256::{
    AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar, U256,
    elliptic_curve::{
        PrimeField,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
    },
};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::error::{Result, VteError};

pub const SCHNORR_SCHEME: &str = "schnorr_fs_v1";
pub const SIGNATURE_LEN: usize = 65;

const NONCE_TAG: &[u8] = b"VTE_SCHNORR_NONCE_V1";
const CHALLENGE_TAG: &[u8] = b"VTE_SCHNORR_FS_V1";

/// Package fields the signed message is built from, in order
pub const BOUND_FIELDS: [&str; 4] = ["point_value", "commitment", "ctx_hash", "ciphertext_digest"];

pub fn binding_message(
    point: &[u8],
    commitment: &[u8],
    ctx_hash: &[u8],
    ciphertext_digest: &[u8],
) -> Vec<u8> {
    [point, commitment, ctx_hash, ciphertext_digest].concat()
}

fn reduce(digest: &[u8]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&FieldBytes::clone_from_slice(digest))
}

fn compress(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

fn decompress(bytes: &[u8], what: &'static str) -> Result<ProjectivePoint> {
    if bytes.len() != 33 {
        return Err(VteError::malformed(
            what,
            format!("expected 33 bytes, got {}", bytes.len()),
        ));
    }
    let encoded = EncodedPoint::from_bytes(bytes).map_err(|e| VteError::malformed(what, e))?;
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .map(ProjectivePoint::from)
        .ok_or_else(|| VteError::malformed(what, "not on secp256k1"))
}

fn challenge(nonce_point: &[u8], point: &[u8], message: &[u8]) -> Scalar {
    let digest = Sha256::new()
        .chain_update(CHALLENGE_TAG)
        .chain_update(nonce_point)
        .chain_update(point)
        .chain_update(message)
        .finalize();
    reduce(&digest)
}

/// Sign with fresh hedging randomness from the OS
pub fn sign(secret: &[u8; 32], message: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    let mut aux = [0u8; 32];
    OsRng.fill_bytes(&mut aux);
    sign_with_aux(secret, message, &aux)
}

pub fn sign_with_aux(
    secret: &[u8; 32],
    message: &[u8],
    aux: &[u8; 32],
) -> Result<[u8; SIGNATURE_LEN]> {
    let x = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(secret)))
        .filter(|x| *x != Scalar::ZERO)
        .ok_or_else(|| VteError::Witness("secret scalar must satisfy 1 <= r2 < n".into()))?;
    let point = compress(&(ProjectivePoint::GENERATOR * x));

    let nonce_digest = Sha256::new()
        .chain_update(NONCE_TAG)
        .chain_update(secret)
        .chain_update(message)
        .chain_update(aux)
        .finalize();
    let k = reduce(&nonce_digest);
    if k == Scalar::ZERO {
        return Err(VteError::Witness("degenerate Schnorr nonce".into()));
    }
    let nonce_point = compress(&(ProjectivePoint::GENERATOR * k));

    let e = challenge(&nonce_point, &point, message);
    let s = k + e * x;

    let mut signature = [0u8; SIGNATURE_LEN];
    signature[..33].copy_from_slice(&nonce_point);
    signature[33..].copy_from_slice(&s.to_bytes());
    Ok(signature)
}

/// Check `s * G == R + e * R2`
pub fn verify(point: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    if signature.len() != SIGNATURE_LEN {
        return Err(VteError::malformed(
            "signature_bytes",
            format!("expected {SIGNATURE_LEN} bytes, got {}", signature.len()),
        ));
    }
    let public = decompress(point, "point_value")?;
    let (nonce_bytes, s_bytes) = signature.split_at(33);
    let nonce_point = decompress(nonce_bytes, "signature_bytes")?;
    let s = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(s_bytes)))
        .ok_or_else(|| VteError::malformed("signature_bytes", "s is not reduced"))?;

    let e = challenge(nonce_bytes, point, message);
    if ProjectivePoint::GENERATOR * s != nonce_point + public * e {
        return Err(VteError::BindingMismatch {
            field: "signature_bytes",
        });
    }
    Ok(())
}
