//! secp256k1 fixed-base scalar multiplication over an emulated base field.
//!
//! The scalar is consumed in unsigned 4-bit windows. Window `w` selects
//! `j * 16^w * G` from a constant table through a multiplexer tree and adds
//! it to a Jacobian accumulator with complete mixed addition. The result is
//! tied to a public affine point split into 128-bit limbs.

use ark_ec::{AdditiveGroup, AffineRepr, CurveGroup, PrimeGroup};
use ark_ff::{Field, PrimeField};
use ark_r1cs_std::{
    fields::{emulated_fp::EmulatedFpVar, fp::FpVar},
    prelude::*,
};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
use ark_secp256k1::{Affine as SecpAffine, Fq as SecpFq, Fr as SecpFr, Projective as SecpProj};
use once_cell::sync::Lazy;

use crate::circuit::bits::limb_from_bits;
use crate::constants::SECP_WINDOW_BITS;

const NUM_WINDOWS: usize = 256 / SECP_WINDOW_BITS;
const TABLE_LEN: usize = 1 << SECP_WINDOW_BITS;

/// `FIXED_BASE_TABLE[w][j] = j * 16^w * G`; entry 0 is a placeholder.
static FIXED_BASE_TABLE: Lazy<Vec<[SecpAffine; TABLE_LEN]>> = Lazy::new(|| {
    let mut table = Vec::with_capacity(NUM_WINDOWS);
    let mut base = SecpProj::generator();
    for _ in 0..NUM_WINDOWS {
        let mut row = [SecpAffine::identity(); TABLE_LEN];
        let mut accum = SecpProj::default();
        for entry in row.iter_mut().skip(1) {
            accum += base;
            *entry = accum.into_affine();
        }
        table.push(row);
        for _ in 0..SECP_WINDOW_BITS {
            base.double_in_place();
        }
    }
    table
});

pub type SecpBaseVar<CF> = EmulatedFpVar<SecpFq, CF>;

#[derive(Clone)]
pub struct SecpJacVar<CF: PrimeField> {
    pub x: SecpBaseVar<CF>,
    pub y: SecpBaseVar<CF>,
    pub z: SecpBaseVar<CF>,
}

#[derive(Clone)]
struct SecpAffineVar<CF: PrimeField> {
    x: SecpBaseVar<CF>,
    y: SecpBaseVar<CF>,
}

impl<CF: PrimeField> SecpJacVar<CF> {
    fn infinity() -> Self {
        Self {
            x: SecpBaseVar::zero(),
            y: SecpBaseVar::one(),
            z: SecpBaseVar::zero(),
        }
    }

    // dbl-2009-l, a = 0. Infinity maps to infinity since z3 = 2yz.
    fn double(&self) -> Result<Self, SynthesisError> {
        let xx = self.x.square()?;
        let yy = self.y.square()?;
        let yyyy = yy.square()?;

        let s = ((&self.x + &yy).square()? - &xx - &yyyy).double()?;
        let m = xx.double()? + &xx;
        let x = m.square()? - &s.double()?;
        let eight_yyyy = yyyy.double()?.double()?.double()?;
        let y = m * (s - &x) - eight_yyyy;
        let z = (&self.y * &self.z).double()?;
        Ok(Self { x, y, z })
    }

    /// madd-2007-bl, completed for an infinite accumulator, `P == Q` and `P == -Q`
    fn add_mixed(&self, other: &SecpAffineVar<CF>) -> Result<Self, SynthesisError> {
        let (x1, y1, z1) = (&self.x, &self.y, &self.z);
        let (x2, y2) = (&other.x, &other.y);

        let z1z1 = z1.square()?;
        let u2 = x2 * &z1z1;
        let s2 = y2 * z1 * &z1z1;

        let h = u2 - x1;
        let hh = h.square()?;
        let i = hh.double()?.double()?;
        let j = &h * &i;
        let r = (s2 - y1).double()?;
        let v = x1 * &i;

        let x3 = r.square()? - &j - v.double()?;
        let y3 = r.clone() * (v - &x3) - (y1 * &j).double()?;
        let z3 = (z1 + &h).square()? - z1z1 - hh;
        let sum = Self {
            x: x3,
            y: y3,
            z: z3,
        };

        let z1_is_zero = z1.is_zero()?;
        let h_is_zero = h.is_zero()?;
        let r_is_zero = r.is_zero()?;
        let same_point = Boolean::kary_and(&[h_is_zero.clone(), r_is_zero.clone()])?;
        let opposite = Boolean::kary_and(&[h_is_zero, !r_is_zero])?;

        let doubled = self.double()?;
        let sum_or_inf = Self::conditional_select(&opposite, &Self::infinity(), &sum)?;
        let sum_or_double = Self::conditional_select(&same_point, &doubled, &sum_or_inf)?;

        let q = Self {
            x: other.x.clone(),
            y: other.y.clone(),
            z: SecpBaseVar::one(),
        };
        Self::conditional_select(&z1_is_zero, &q, &sum_or_double)
    }

    fn conditional_select(
        cond: &Boolean<CF>,
        when_true: &Self,
        when_false: &Self,
    ) -> Result<Self, SynthesisError> {
        Ok(Self {
            x: SecpBaseVar::conditionally_select(cond, &when_true.x, &when_false.x)?,
            y: SecpBaseVar::conditionally_select(cond, &when_true.y, &when_false.y)?,
            z: SecpBaseVar::conditionally_select(cond, &when_true.z, &when_false.z)?,
        })
    }
}

fn mux_tree<CF: PrimeField>(
    bits: &[Boolean<CF>],
    mut values: Vec<SecpBaseVar<CF>>,
) -> Result<SecpBaseVar<CF>, SynthesisError> {
    for bit in bits {
        let mut next = Vec::with_capacity(values.len().div_ceil(2));
        for chunk in values.chunks(2) {
            let when_false = &chunk[0];
            let when_true = chunk.get(1).unwrap_or(when_false);
            next.push(SecpBaseVar::conditionally_select(bit, when_true, when_false)?);
        }
        values = next;
    }
    values.pop().ok_or(SynthesisError::Unsatisfiable)
}

fn select_window<CF: PrimeField>(
    bits: &[Boolean<CF>],
    row: &[SecpAffine; TABLE_LEN],
) -> Result<SecpAffineVar<CF>, SynthesisError> {
    let (xs, ys): (Vec<_>, Vec<_>) = row
        .iter()
        .map(|p| match p.xy() {
            Some((x, y)) => (SecpBaseVar::constant(x), SecpBaseVar::constant(y)),
            None => (SecpBaseVar::zero(), SecpBaseVar::one()),
        })
        .unzip();
    Ok(SecpAffineVar {
        x: mux_tree(bits, xs)?,
        y: mux_tree(bits, ys)?,
    })
}

/// `scalar * G` for a 256-bit LE scalar, in Jacobian coordinates
pub fn fixed_base_mul<CF: PrimeField>(
    scalar_bits: &[Boolean<CF>],
) -> Result<SecpJacVar<CF>, SynthesisError> {
    if scalar_bits.len() != 256 {
        return Err(SynthesisError::Unsatisfiable);
    }
    let mut acc = SecpJacVar::infinity();
    for (window, bits) in scalar_bits.chunks(SECP_WINDOW_BITS).enumerate() {
        let q = select_window(bits, &FIXED_BASE_TABLE[window])?;
        let should_add = Boolean::kary_or(bits)?;
        let added = acc.add_mixed(&q)?;
        acc = SecpJacVar::conditional_select(&should_add, &added, &acc)?;
    }
    Ok(acc)
}

/// Enforce `1 <= scalar <= n - 1` on a 256-bit LE scalar
pub fn enforce_scalar_range<CF: PrimeField>(
    scalar_bits: &[Boolean<CF>],
) -> Result<(), SynthesisError> {
    Boolean::kary_or(scalar_bits)?.enforce_equal(&Boolean::TRUE)?;
    let n_minus_one = (-SecpFr::ONE).into_bigint();
    Boolean::enforce_smaller_or_equal_than_le(scalar_bits, n_minus_one)?;
    Ok(())
}

/// Tie a Jacobian point to public `[x_hi, x_lo, y_hi, y_lo]` limbs.
///
/// The affine coordinates are witnessed from `hint` and checked against the
/// accumulator with `x * z^2 == X`, `y * z^3 == Y`, `z != 0`.
pub fn enforce_affine_limbs<CF: PrimeField>(
    cs: ConstraintSystemRef<CF>,
    point: &SecpJacVar<CF>,
    hint: Option<SecpAffine>,
    limbs: &[FpVar<CF>; 4],
) -> Result<(), SynthesisError> {
    let coords = hint.and_then(|p| p.xy());
    let tx = SecpBaseVar::new_witness(cs.clone(), || {
        coords.map(|(x, _)| x).ok_or(SynthesisError::AssignmentMissing)
    })?;
    let ty = SecpBaseVar::new_witness(cs, || {
        coords.map(|(_, y)| y).ok_or(SynthesisError::AssignmentMissing)
    })?;

    point.z.enforce_not_equal(&SecpBaseVar::zero())?;
    let z2 = point.z.square()?;
    let z3 = &z2 * &point.z;
    (&tx * &z2).enforce_equal(&point.x)?;
    (&ty * &z3).enforce_equal(&point.y)?;

    for (coord, pair) in [tx, ty].iter().zip(limbs.chunks(2)) {
        let bits = coord.to_bits_le()?;
        limb_from_bits(&bits[128..256])?.enforce_equal(&pair[0])?;
        limb_from_bits(&bits[..128])?.enforce_equal(&pair[1])?;
    }
    Ok(())
}

/// Host mirror of the windowed table walk
pub fn fixed_base_mul_native(scalar: &SecpFr) -> SecpAffine {
    let bits = crate::codec::be_bytes_to_le_bits(&crate::codec::field_to_be_bytes(scalar));
    let mut acc = SecpProj::default();
    for (window, chunk) in bits.chunks(SECP_WINDOW_BITS).enumerate() {
        let j = chunk
            .iter()
            .enumerate()
            .fold(0usize, |acc, (i, &b)| acc | ((b as usize) << i));
        if j != 0 {
            acc += FIXED_BASE_TABLE[window][j];
        }
    }
    acc.into_affine()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::bits::be_bytes_to_le_bits;
    use crate::codec;
    use ark_bn254::Fr;
    use ark_ff::BigInteger;
    use ark_r1cs_std::uint8::UInt8;
    use ark_relations::r1cs::ConstraintSystem;

    fn scalar_bytes(value: u64) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&value.to_be_bytes());
        out
    }

    fn synthesize(bytes: &[u8; 32], public: SecpAffine, hint: Option<SecpAffine>) -> bool {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let vars = UInt8::new_witness_vec(cs.clone(), bytes).unwrap();
        let bits = be_bytes_to_le_bits(&vars).unwrap();
        enforce_scalar_range(&bits).unwrap();
        let acc = fixed_base_mul(&bits).unwrap();
        let limbs = codec::secp_coordinate_limbs(&public);
        let limb_vars = limbs.map(|l| FpVar::new_input(cs.clone(), || Ok(Fr::from(l))).unwrap());
        enforce_affine_limbs(cs.clone(), &acc, hint, &limb_vars).unwrap();
        println!("secp fixed-base constraints: {}", cs.num_constraints());
        cs.is_satisfied().unwrap()
    }

    #[test]
    fn host_table_matches_scalar_mul() {
        for value in [1u64, 2, 15, 16, 0xdead_beef] {
            let scalar = SecpFr::from(value);
            let expected = (SecpProj::generator() * scalar).into_affine();
            assert_eq!(fixed_base_mul_native(&scalar), expected);
        }
        let large = -SecpFr::from(3u64);
        assert_eq!(
            fixed_base_mul_native(&large),
            (SecpProj::generator() * large).into_affine()
        );
    }

    #[test]
    fn one_yields_generator() {
        let g = SecpAffine::generator();
        assert!(synthesize(&scalar_bytes(1), g, Some(g)));
    }

    #[test]
    fn matches_host_for_dense_scalar() {
        let bytes = [0x3cu8; 32];
        let scalar = codec::secp_scalar_from_bytes(&bytes).unwrap();
        let point = (SecpProj::generator() * scalar).into_affine();
        assert!(synthesize(&bytes, point, Some(point)));
    }

    #[test]
    fn wrong_public_point_is_unsatisfied() {
        let two_g = (SecpProj::generator() * SecpFr::from(2u64)).into_affine();
        assert!(!synthesize(&scalar_bytes(1), two_g, Some(two_g)));
    }

    #[test]
    fn group_order_is_rejected() {
        let n: [u8; 32] = SecpFr::MODULUS.to_bytes_be().try_into().unwrap();
        let g = SecpAffine::generator();
        assert!(!synthesize(&n, g, Some(g)));
    }

    #[test]
    fn zero_is_rejected() {
        let g = SecpAffine::generator();
        assert!(!synthesize(&[0u8; 32], g, Some(g)));
    }
}
