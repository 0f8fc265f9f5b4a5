use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};
use ark_ff::PrimeField;
use ark_r1cs_std::fields::FieldVar;
use ark_relations::r1cs::SynthesisError;

use crate::constants::{
    POSEIDON_ALPHA, POSEIDON_CAPACITY, POSEIDON_FULL_ROUNDS, POSEIDON_PARTIAL_ROUNDS,
    POSEIDON_RATE,
};

/// Poseidon configuration for commitments
///
/// Field: BN254 Fr (254 bits)
/// Rate: 2
/// Capacity: 1
/// Security: 128 bits
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    // number of matrices to skip (0 = use first)
    let skip_matrices: u64 = 0;

    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        Fr::MODULUS_BIT_SIZE as u64,
        POSEIDON_RATE,
        POSEIDON_FULL_ROUNDS as u64,
        POSEIDON_PARTIAL_ROUNDS as u64,
        skip_matrices,
    );

    PoseidonConfig::new(
        POSEIDON_FULL_ROUNDS,
        POSEIDON_PARTIAL_ROUNDS,
        POSEIDON_ALPHA,
        mds,
        ark,
        POSEIDON_RATE,
        POSEIDON_CAPACITY,
    )
}

/// Native sponge hash: absorb every input, squeeze one element
pub fn hash_native(config: &PoseidonConfig<Fr>, inputs: &[Fr]) -> Fr {
    let mut sponge = PoseidonSponge::new(config);
    sponge.absorb(&inputs.to_vec());
    sponge.squeeze_field_elements::<Fr>(1)[0]
}

/// Sponge hash over any field gadget.
///
/// Same duplex schedule as `PoseidonSponge`: inputs are added into the rate
/// portion, the state is permuted whenever the rate fills up, and the squeeze
/// permutes once more and reads `state[capacity]`. Used where BN254 has to be
/// emulated inside another field.
pub fn hash_var<F, CF, V>(config: &PoseidonConfig<F>, inputs: &[V]) -> Result<V, SynthesisError>
where
    F: PrimeField,
    CF: PrimeField,
    V: FieldVar<F, CF>,
{
    let width = config.rate + config.capacity;
    let mut state = vec![V::zero(); width];
    let mut absorb_index = 0;

    for input in inputs {
        if absorb_index == config.rate {
            permute(config, &mut state)?;
            absorb_index = 0;
        }
        state[config.capacity + absorb_index] += input;
        absorb_index += 1;
    }

    permute(config, &mut state)?;
    Ok(state[config.capacity].clone())
}

fn permute<F, CF, V>(config: &PoseidonConfig<F>, state: &mut [V]) -> Result<(), SynthesisError>
where
    F: PrimeField,
    CF: PrimeField,
    V: FieldVar<F, CF>,
{
    let half_full = config.full_rounds / 2;
    let total = config.full_rounds + config.partial_rounds;

    for round in 0..total {
        for (elem, c) in state.iter_mut().zip(&config.ark[round]) {
            *elem += *c;
        }

        let full = round < half_full || round >= half_full + config.partial_rounds;
        if full {
            for elem in state.iter_mut() {
                *elem = elem.pow_by_constant([config.alpha])?;
            }
        } else {
            state[0] = state[0].pow_by_constant([config.alpha])?;
        }

        let mut mixed = Vec::with_capacity(state.len());
        for row in &config.mds {
            let mut acc = V::zero();
            for (elem, m) in state.iter().zip(row) {
                acc += elem.clone() * *m;
            }
            mixed.push(acc);
        }
        state.clone_from_slice(&mixed);
    }
    Ok(())
}
