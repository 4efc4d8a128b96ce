//! In-circuit circom Poseidon over BN254.
//!
//! Uses the same round constants and MDS matrix as the native hasher in
//! [`crate::utils::poseidon_hash`], so both produce identical outputs.

use crate::utils::poseidon_parameters;
use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

fn sbox(x: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    let x2 = x.square()?;
    let x4 = x2.square()?;
    Ok(x4 * x)
}

/// Poseidon of arity 2 or 3.
///
/// The permutation state starts as `[0, inputs..]`; the output is the first
/// state element after all rounds.
pub fn poseidon(inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let width = inputs.len() + 1;
    let params = poseidon_parameters(width).ok_or(SynthesisError::Unsatisfiable)?;
    let half_full = params.full_rounds / 2;
    let total_rounds = params.full_rounds + params.partial_rounds;

    let mut state = Vec::with_capacity(width);
    state.push(FpVar::zero());
    state.extend(inputs.iter().cloned());

    for round in 0..total_rounds {
        for (i, element) in state.iter_mut().enumerate() {
            *element += FpVar::constant(params.ark[round * width + i]);
        }

        let full = round < half_full || round >= half_full + params.partial_rounds;
        if full {
            for element in state.iter_mut() {
                *element = sbox(element)?;
            }
        } else {
            state[0] = sbox(&state[0])?;
        }

        state = params
            .mds
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&state)
                    .fold(FpVar::zero(), |acc, (m, s)| acc + s * *m)
            })
            .collect();
    }

    Ok(state.swap_remove(0))
}

#[inline]
pub fn poseidon2(left: &FpVar<Fr>, right: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    poseidon(&[left.clone(), right.clone()])
}

#[inline]
pub fn poseidon3(
    a: &FpVar<Fr>,
    b: &FpVar<Fr>,
    c: &FpVar<Fr>,
) -> Result<FpVar<Fr>, SynthesisError> {
    poseidon(&[a.clone(), b.clone(), c.clone()])
}
