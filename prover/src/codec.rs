//! Byte, limb and point encodings shared by the circuits and their callers.
//!
//! Conventions:
//! - A 32-byte value is read big-endian and split into a high and a low
//!   16-byte limb, each itself big-endian.
//! - Bit vectors are LSB-first, matching `ToBitsGadget::to_bits_le`. A
//!   big-endian byte string becomes LE bits by walking the bytes in reverse
//!   and emitting each byte LSB-first.
//! - Group coordinates are exported as 32-byte big-endian strings.
//! - GT elements are the 12 BLS12-377 base-field coefficients in tower order
//!   (c0.c0.c0, c0.c0.c1, ..., c1.c2.c1), 48 bytes big-endian each.

use ark_bls12_377::{Fq, Fq12, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{AdditiveGroup, BigInteger, Field, PrimeField, ToConstraintField, Zero};
use ark_secp256k1::{Affine as SecpAffine, Fq as SecpFq, Fr as SecpFr};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use k256::{
    EncodedPoint, FieldBytes,
    elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint},
};

use crate::error::{ProverError, Result};

/// Bytes of one serialized GT coefficient
pub const GT_COEFF_LEN: usize = 48;
/// Bytes of a serialized GT element
pub const GT_BYTES_LEN: usize = 12 * GT_COEFF_LEN;
/// SEC1 compressed secp256k1 point
pub const SEC1_COMPRESSED_LEN: usize = 33;

// ============================================================================
// Limbs
// ============================================================================

/// Split a big-endian 32-byte value into `(hi, lo)`
pub fn split_limbs(bytes: &[u8; 32]) -> (u128, u128) {
    let mut hi = [0u8; 16];
    let mut lo = [0u8; 16];
    hi.copy_from_slice(&bytes[..16]);
    lo.copy_from_slice(&bytes[16..]);
    (u128::from_be_bytes(hi), u128::from_be_bytes(lo))
}

pub fn join_limbs(hi: u128, lo: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..16].copy_from_slice(&hi.to_be_bytes());
    out[16..].copy_from_slice(&lo.to_be_bytes());
    out
}

/// The `(hi, lo)` limbs of a 32-byte value as field elements
pub fn limbs_to_field<F: PrimeField>(bytes: &[u8; 32]) -> (F, F) {
    let (hi, lo) = split_limbs(bytes);
    (F::from(hi), F::from(lo))
}

// ============================================================================
// Bits
// ============================================================================

pub fn be_bytes_to_le_bits(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .rev()
        .flat_map(|byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
        .collect()
}

/// Inverse of [`be_bytes_to_le_bits`]. A trailing partial byte is zero-padded.
pub fn le_bits_to_be_bytes(bits: &[bool]) -> Vec<u8> {
    let mut bytes: Vec<u8> = bits
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << i))
        })
        .collect();
    bytes.reverse();
    bytes
}

// ============================================================================
// Field elements
// ============================================================================

/// Canonical big-endian encoding, as wide as the modulus
pub fn field_to_be_bytes<F: PrimeField>(value: &F) -> Vec<u8> {
    value.into_bigint().to_bytes_be()
}

pub fn bn254_to_bytes(value: &ark_bn254::Fr) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&field_to_be_bytes(value));
    out
}

/// Decode a big-endian BN254 scalar, rejecting non-canonical encodings
pub fn bn254_from_bytes(bytes: &[u8; 32]) -> Result<ark_bn254::Fr> {
    let value = ark_bn254::Fr::from_be_bytes_mod_order(bytes);
    if &bn254_to_bytes(&value) != bytes {
        return Err(ProverError::format(
            "commitment",
            "value is not a canonical BN254 scalar",
        ));
    }
    Ok(value)
}

// ============================================================================
// secp256k1
// ============================================================================

/// Decode a secret scalar, enforcing `1 <= r2 <= n - 1`
pub fn secp_scalar_from_bytes(bytes: &[u8; 32]) -> Result<SecpFr> {
    let value = SecpFr::from_be_bytes_mod_order(bytes);
    if value.is_zero() || field_to_be_bytes(&value) != bytes.as_slice() {
        return Err(ProverError::Witness(
            "secret scalar must satisfy 1 <= r2 < n".into(),
        ));
    }
    Ok(value)
}

fn coordinate_bytes(value: &SecpFq) -> FieldBytes {
    let be = field_to_be_bytes(value);
    let mut out = FieldBytes::default();
    let offset = out.len() - be.len();
    out[offset..].copy_from_slice(&be);
    out
}

pub fn secp_compress(point: &SecpAffine) -> Result<[u8; SEC1_COMPRESSED_LEN]> {
    if point.is_zero() {
        return Err(ProverError::format("point", "point at infinity"));
    }
    let encoded = EncodedPoint::from_affine_coordinates(
        &coordinate_bytes(&point.x),
        &coordinate_bytes(&point.y),
        true,
    );
    encoded
        .as_bytes()
        .try_into()
        .map_err(|_| ProverError::format("point", "unexpected SEC1 length"))
}

pub fn secp_decompress(bytes: &[u8]) -> Result<SecpAffine> {
    if bytes.len() != SEC1_COMPRESSED_LEN {
        return Err(ProverError::format(
            "point",
            format!("expected {SEC1_COMPRESSED_LEN} bytes, got {}", bytes.len()),
        ));
    }
    let encoded = EncodedPoint::from_bytes(bytes).map_err(|e| ProverError::format("point", e))?;
    let point = Option::<k256::AffinePoint>::from(k256::AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| ProverError::format("point", "not on secp256k1"))?;
    let uncompressed = point.to_encoded_point(false);
    let (Some(x), Some(y)) = (uncompressed.x(), uncompressed.y()) else {
        return Err(ProverError::format("point", "point at infinity"));
    };
    let point = SecpAffine::new_unchecked(
        SecpFq::from_be_bytes_mod_order(x),
        SecpFq::from_be_bytes_mod_order(y),
    );
    if !point.is_on_curve() {
        return Err(ProverError::format("point", "not on secp256k1"));
    }
    Ok(point)
}

/// `[x_hi, x_lo, y_hi, y_lo]` of an affine point
pub fn secp_coordinate_limbs(point: &SecpAffine) -> [u128; 4] {
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&coordinate_bytes(&point.x));
    y.copy_from_slice(&coordinate_bytes(&point.y));
    let (x_hi, x_lo) = split_limbs(&x);
    let (y_hi, y_lo) = split_limbs(&y);
    [x_hi, x_lo, y_hi, y_lo]
}

// ============================================================================
// BLS12-377
// ============================================================================

pub fn gt_to_bytes(gt: &Fq12) -> Vec<u8> {
    let mut out = Vec::with_capacity(GT_BYTES_LEN);
    for coeff in gt.to_base_prime_field_elements() {
        out.extend_from_slice(&field_to_be_bytes(&coeff));
    }
    out
}

pub fn g1_to_bytes(point: &G1Affine) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    point
        .serialize_compressed(&mut out)
        .map_err(|e| ProverError::format("G1 point", e))?;
    Ok(out)
}

/// Decode a compressed G1 point, with on-curve and subgroup checks
pub fn g1_from_bytes(bytes: &[u8]) -> Result<G1Affine> {
    let point =
        G1Affine::deserialize_compressed(bytes).map_err(|e| ProverError::format("G1 point", e))?;
    if point.is_zero() {
        return Err(ProverError::format("G1 point", "point at infinity"));
    }
    Ok(point)
}

/// Public-input encoding of an allocated G1 input: `[x, y, 1]`
pub fn g1_public_inputs(point: &G1Affine) -> Vec<Fq> {
    match point.xy() {
        Some((x, y)) => vec![x, y, Fq::ONE],
        None => vec![Fq::ZERO, Fq::ONE, Fq::ZERO],
    }
}

/// Public-input encoding of an allocated G2 input: `[x.c0, x.c1, y.c0, y.c1, 1, 0]`
pub fn g2_public_inputs(point: &G2Affine) -> Vec<Fq> {
    match point.xy() {
        Some((x, y)) => vec![x.c0, x.c1, y.c0, y.c1, Fq::ONE, Fq::ZERO],
        None => vec![Fq::ZERO, Fq::ZERO, Fq::ONE, Fq::ZERO, Fq::ZERO, Fq::ZERO],
    }
}

/// Public-input encoding of bytes allocated with `UInt8::new_input_vec`
pub fn bytes_public_inputs(bytes: &[u8]) -> Result<Vec<Fq>> {
    bytes
        .to_field_elements()
        .ok_or_else(|| ProverError::format("public input", "bytes do not pack into Fq"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::{CurveGroup, PrimeGroup};
    use ark_secp256k1::Projective as SecpProj;
    use ark_std::rand::{RngCore, SeedableRng, rngs::StdRng};

    #[test]
    fn limbs_round_trip_edges() {
        for value in [[0u8; 32], [0xff; 32]] {
            let (hi, lo) = split_limbs(&value);
            assert_eq!(join_limbs(hi, lo), value);
        }

        let mut ascending = [0u8; 32];
        for (i, b) in ascending.iter_mut().enumerate() {
            *b = i as u8 + 1;
        }
        let (hi, lo) = split_limbs(&ascending);
        assert_eq!(hi, u128::from_be_bytes(ascending[..16].try_into().unwrap()));
        assert_eq!(lo, 0x1112131415161718191a1b1c1d1e1f20);
        assert_eq!(join_limbs(hi, lo), ascending);
    }

    #[test]
    fn limbs_round_trip_seeded() {
        let mut rng = StdRng::seed_from_u64(0x1dbe);
        for _ in 0..1000 {
            let mut value = [0u8; 32];
            rng.fill_bytes(&mut value);
            let (hi, lo) = split_limbs(&value);
            assert_eq!(hi.to_be_bytes(), value[..16]);
            assert_eq!(lo.to_be_bytes(), value[16..]);
            assert_eq!(join_limbs(hi, lo), value);

            let (hi_f, lo_f) = limbs_to_field::<ark_bn254::Fr>(&value);
            assert_eq!((hi_f, lo_f), (ark_bn254::Fr::from(hi), ark_bn254::Fr::from(lo)));
        }
    }

    #[test]
    fn bit_order_is_lsb_first() {
        let bits = be_bytes_to_le_bits(&[0x80, 0x01]);
        assert!(bits[0]);
        assert!(!bits[1]);
        assert!(bits[15]);
        assert_eq!(le_bits_to_be_bytes(&bits), vec![0x80, 0x01]);
    }

    #[test]
    fn limbs_match_field_bits() {
        let mut value = [0u8; 32];
        value[0] = 0xaa;
        value[31] = 0x01;
        let (hi, lo): (ark_bn254::Fr, ark_bn254::Fr) = limbs_to_field(&value);
        assert_eq!(hi, ark_bn254::Fr::from(0xaau128 << 120));
        assert_eq!(lo, ark_bn254::Fr::from(1u64));
    }

    #[test]
    fn secp_scalar_range() {
        assert!(secp_scalar_from_bytes(&[0u8; 32]).is_err());

        let mut one = [0u8; 32];
        one[31] = 1;
        assert_eq!(secp_scalar_from_bytes(&one).unwrap(), SecpFr::ONE);

        let n: [u8; 32] = SecpFr::MODULUS.to_bytes_be().try_into().unwrap();
        assert!(secp_scalar_from_bytes(&n).is_err());

        let n_minus_one: [u8; 32] = field_to_be_bytes(&-SecpFr::ONE).try_into().unwrap();
        assert!(secp_scalar_from_bytes(&n_minus_one).is_ok());
    }

    #[test]
    fn secp_compress_round_trip() {
        let point = (SecpProj::generator() * SecpFr::from(12345u64)).into_affine();
        let bytes = secp_compress(&point).unwrap();
        assert_eq!(bytes.len(), SEC1_COMPRESSED_LEN);
        assert_eq!(secp_decompress(&bytes).unwrap(), point);

        let generator = secp_compress(&SecpAffine::generator()).unwrap();
        assert_eq!(
            hex::encode(generator),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn secp_decompress_rejects_garbage() {
        assert!(secp_decompress(&[0x02; 32]).is_err());
        let mut bad = [0u8; 33];
        bad[0] = 0x05;
        assert!(secp_decompress(&bad).is_err());
    }

    #[test]
    fn gt_serialization_is_fixed_width() {
        let gt = Fq12::ONE;
        let bytes = gt_to_bytes(&gt);
        assert_eq!(bytes.len(), GT_BYTES_LEN);
        // c0.c0.c0 == 1, everything else zero
        assert_eq!(bytes[GT_COEFF_LEN - 1], 1);
        assert!(bytes[GT_COEFF_LEN..].iter().all(|b| *b == 0));
    }

    #[test]
    fn bn254_rejects_non_canonical() {
        assert!(bn254_from_bytes(&[0xff; 32]).is_err());
        let value = ark_bn254::Fr::from(42u64);
        assert_eq!(bn254_from_bytes(&bn254_to_bytes(&value)).unwrap(), value);
    }

    #[test]
    fn packed_bytes_fit_one_element() {
        let inputs = bytes_public_inputs(&[7u8; 32]).unwrap();
        assert_eq!(inputs.len(), 1);
    }
}
