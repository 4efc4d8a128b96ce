use super::poseidon::{poseidon2, poseidon3};
use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

/// `h0 = x0, hi = Poseidon2(h(i-1), xi)`; the empty chain is the constant 0.
pub fn hash_chain(inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let Some((first, rest)) = inputs.split_first() else {
        return Ok(FpVar::zero());
    };
    rest.iter()
        .try_fold(first.clone(), |acc, x| poseidon2(&acc, x))
}

/// `h0 = Poseidon2(a0, b0), hi = Poseidon3(h(i-1), ai, bi)`.
pub fn two_stream_hash_chain(
    first: &[FpVar<Fr>],
    second: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    if first.len() != second.len() {
        return Err(SynthesisError::Unsatisfiable);
    }
    if first.is_empty() {
        return Ok(FpVar::zero());
    }

    let mut acc = poseidon2(&first[0], &second[0])?;
    for (a, b) in first.iter().zip(second).skip(1) {
        acc = poseidon3(&acc, a, b)?;
    }
    Ok(acc)
}
