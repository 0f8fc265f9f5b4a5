//! In-circuit mirrors of the byte and limb conventions in [`crate::codec`].

use ark_ff::PrimeField;
use ark_r1cs_std::{
    fields::{emulated_fp::EmulatedFpVar, fp::FpVar},
    prelude::*,
    uint8::UInt8,
};
use ark_relations::r1cs::SynthesisError;

/// Big-endian bytes to LSB-first bits
pub fn be_bytes_to_le_bits<F: PrimeField>(
    bytes: &[UInt8<F>],
) -> Result<Vec<Boolean<F>>, SynthesisError> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes.iter().rev() {
        bits.extend(byte.to_bits_le()?);
    }
    Ok(bits)
}

/// Pack up to 128 LE bits into one field element
pub fn limb_from_bits<F: PrimeField>(bits: &[Boolean<F>]) -> Result<FpVar<F>, SynthesisError> {
    debug_assert!(bits.len() <= 128);
    Boolean::le_bits_to_fp(bits)
}

/// `(hi, lo)` limbs of a 32-byte big-endian value
pub fn limbs_from_be_bytes<F: PrimeField>(
    bytes: &[UInt8<F>],
) -> Result<(FpVar<F>, FpVar<F>), SynthesisError> {
    debug_assert_eq!(bytes.len(), 32);
    let bits = be_bytes_to_le_bits(bytes)?;
    let lo = limb_from_bits(&bits[..128])?;
    let hi = limb_from_bits(&bits[128..256])?;
    Ok((hi, lo))
}

/// Build an emulated element whose canonical bits start with `bits`
/// and are zero above them.
pub fn emulated_from_bits<T: PrimeField, F: PrimeField>(
    bits: &[Boolean<F>],
) -> Result<EmulatedFpVar<T, F>, SynthesisError> {
    let value = bits
        .iter()
        .map(|b| b.value())
        .collect::<Result<Vec<bool>, _>>()
        .map(|bits| T::from_le_bytes_mod_order(&le_bits_to_le_bytes(&bits)));

    if bits.is_constant() {
        return Ok(EmulatedFpVar::constant(value?));
    }

    let var = EmulatedFpVar::<T, F>::new_witness(bits.cs(), || value)?;
    let var_bits = var.to_bits_le()?;
    if var_bits.len() < bits.len() {
        return Err(SynthesisError::Unsatisfiable);
    }
    for (i, bit) in var_bits.iter().enumerate() {
        match bits.get(i) {
            Some(expected) => bit.enforce_equal(expected)?,
            None => bit.enforce_equal(&Boolean::FALSE)?,
        }
    }
    Ok(var)
}

/// Canonical big-endian bytes of a field element, left-padded to `width`
pub fn fp_to_be_bytes<F: PrimeField>(
    value: &FpVar<F>,
    width: usize,
) -> Result<Vec<UInt8<F>>, SynthesisError> {
    let mut bits = value.to_bits_le()?;
    if bits.len() > width * 8 {
        return Err(SynthesisError::Unsatisfiable);
    }
    bits.resize(width * 8, Boolean::FALSE);
    let mut bytes: Vec<UInt8<F>> = bits.chunks(8).map(UInt8::from_bits_le).collect();
    bytes.reverse();
    Ok(bytes)
}

pub fn xor_bytes<F: PrimeField>(
    a: &[UInt8<F>],
    b: &[UInt8<F>],
) -> Result<Vec<UInt8<F>>, SynthesisError> {
    if a.len() != b.len() {
        return Err(SynthesisError::Unsatisfiable);
    }
    Ok(a.iter().zip(b).map(|(x, y)| x ^ y).collect())
}

fn le_bits_to_le_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << i))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use ark_bn254::Fr;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn bit_order_matches_native() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let bytes = [0x80u8, 0x01, 0xfe];
        let vars = UInt8::new_witness_vec(cs.clone(), &bytes).unwrap();
        let bits = be_bytes_to_le_bits(&vars).unwrap();
        let values: Vec<bool> = bits.iter().map(|b| b.value().unwrap()).collect();
        assert_eq!(values, codec::be_bytes_to_le_bits(&bytes));
    }

    #[test]
    fn limbs_match_native() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let mut value = [0u8; 32];
        for (i, b) in value.iter_mut().enumerate() {
            *b = 100 + i as u8;
        }
        let vars = UInt8::new_witness_vec(cs.clone(), &value).unwrap();
        let (hi, lo) = limbs_from_be_bytes(&vars).unwrap();
        let (native_hi, native_lo): (Fr, Fr) = codec::limbs_to_field(&value);
        assert_eq!(hi.value().unwrap(), native_hi);
        assert_eq!(lo.value().unwrap(), native_lo);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn emulated_limb_round_trip() {
        type Target = ark_bn254::Fr;
        type Base = ark_bw6_761::Fr;

        let cs = ConstraintSystem::<Base>::new_ref();
        let value = [0x5au8; 32];
        let vars = UInt8::new_witness_vec(cs.clone(), &value).unwrap();
        let bits = be_bytes_to_le_bits(&vars).unwrap();
        let hi = emulated_from_bits::<Target, Base>(&bits[128..]).unwrap();
        let (native_hi, _): (Target, Target) = codec::limbs_to_field(&value);
        assert_eq!(hi.value().unwrap(), native_hi);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn fp_bytes_are_padded_big_endian() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let var = FpVar::new_witness(cs.clone(), || Ok(Fr::from(0x0102u64))).unwrap();
        let bytes = fp_to_be_bytes(&var, 32).unwrap();
        let values: Vec<u8> = bytes.iter().map(|b| b.value().unwrap()).collect();
        assert_eq!(values.len(), 32);
        assert_eq!(&values[30..], &[0x01, 0x02]);
        assert!(values[..30].iter().all(|b| *b == 0));
        assert!(cs.is_satisfied().unwrap());
    }
}
