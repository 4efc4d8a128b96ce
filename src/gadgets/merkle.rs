//! Merkle path and indexed-leaf gadgets.

use super::poseidon::{poseidon2, poseidon3};
use super::range::assert_is_less;
use crate::ADDRESS_RANGE_BITS;
use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

/// Recompute the root from `leaf` along `path_bits` (leaf level first).
///
/// A set bit means the running node is the right child at that level.
pub fn merkle_root(
    leaf: &FpVar<Fr>,
    path_bits: &[Boolean<Fr>],
    siblings: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    if path_bits.len() != siblings.len() {
        return Err(SynthesisError::Unsatisfiable);
    }

    let mut acc = leaf.clone();
    for (bit, sibling) in path_bits.iter().zip(siblings) {
        let left = bit.select(sibling, &acc)?;
        let right = bit.select(&acc, sibling)?;
        acc = poseidon2(&left, &right)?;
    }
    Ok(acc)
}

/// Check `old_leaf` against `old_root`, then return the root with `new_leaf`
/// in its place over the same path.
pub fn merkle_root_update(
    old_root: &FpVar<Fr>,
    old_leaf: &FpVar<Fr>,
    new_leaf: &FpVar<Fr>,
    path_bits: &[Boolean<Fr>],
    siblings: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    merkle_root(old_leaf, path_bits, siblings)?.enforce_equal(old_root)?;
    merkle_root(new_leaf, path_bits, siblings)
}

/// Gap leaf of the v2 indexed tree: asserts `lower < value < upper` and
/// returns `Poseidon2(lower, upper)`.
pub fn leaf_hash(
    lower: &FpVar<Fr>,
    upper: &FpVar<Fr>,
    value: &FpVar<Fr>,
) -> Result<FpVar<Fr>, SynthesisError> {
    assert_is_less(lower, value, ADDRESS_RANGE_BITS)?;
    assert_is_less(value, upper, ADDRESS_RANGE_BITS)?;
    poseidon2(lower, upper)
}

/// v1 gap leaf, which also commits to the successor index:
/// `Poseidon3(lower, next_index, upper)`.
pub fn legacy_leaf_hash(
    lower: &FpVar<Fr>,
    next_index: &FpVar<Fr>,
    upper: &FpVar<Fr>,
    value: &FpVar<Fr>,
) -> Result<FpVar<Fr>, SynthesisError> {
    assert_is_less(lower, value, ADDRESS_RANGE_BITS)?;
    assert_is_less(value, upper, ADDRESS_RANGE_BITS)?;
    poseidon3(lower, next_index, upper)
}
