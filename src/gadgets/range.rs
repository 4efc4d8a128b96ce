//! Bit decomposition and range assertions.

use crate::utils::pow2;
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

/// Widest decomposition that cannot wrap around the BN254 modulus.
pub const MAX_RANGE_BITS: usize = 252;

/// Decompose `x` into exactly `n` little-endian bits.
///
/// The recomposition is constrained to equal `x`, so this also proves
/// `x < 2^n`.
pub fn to_bits_le(x: &FpVar<Fr>, n: usize) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    if n > MAX_RANGE_BITS {
        return Err(SynthesisError::Unsatisfiable);
    }

    if let FpVar::Constant(value) = x {
        let repr = value.into_bigint();
        if (n..Fr::MODULUS_BIT_SIZE as usize).any(|i| repr.get_bit(i)) {
            return Err(SynthesisError::Unsatisfiable);
        }
        return Ok((0..n).map(|i| Boolean::constant(repr.get_bit(i))).collect());
    }

    let cs = x.cs();
    let bits = (0..n)
        .map(|i| {
            Boolean::new_witness(cs.clone(), || {
                x.value().map(|value| value.into_bigint().get_bit(i))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Boolean::le_bits_to_fp_var(&bits)?.enforce_equal(x)?;
    Ok(bits)
}

/// Enforce `a < b` for `a, b < 2^n` by decomposing `a + 2^n - b` into `n` bits.
///
/// The difference fits in `n` bits exactly when `a < b`; `a == b` leaves
/// `2^n`, which does not.
pub fn assert_is_less(a: &FpVar<Fr>, b: &FpVar<Fr>, n: usize) -> Result<(), SynthesisError> {
    let shifted = a + FpVar::constant(pow2(n)) - b;
    to_bits_le(&shifted, n)?;
    Ok(())
}
