//! R1CS gadgets shared by every circuit.
//!
//! Each gadget has a native twin in [`crate::utils`] or [`crate::merkle`];
//! witnesses and public inputs are computed with the native side.

mod hash_chain;
mod merkle;
mod poseidon;
mod range;

pub use hash_chain::{hash_chain, two_stream_hash_chain};
pub use merkle::{leaf_hash, legacy_leaf_hash, merkle_root, merkle_root_update};
pub use poseidon::{poseidon, poseidon2, poseidon3};
pub use range::{assert_is_less, to_bits_le, MAX_RANGE_BITS};

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

/// Allocate a private field element.
#[inline]
pub(crate) fn witness(cs: &ConstraintSystemRef<Fr>, value: Fr) -> Result<FpVar<Fr>, SynthesisError> {
    FpVar::new_witness(cs.clone(), || Ok(value))
}

/// Allocate a public input.
#[inline]
pub(crate) fn public(cs: &ConstraintSystemRef<Fr>, value: Fr) -> Result<FpVar<Fr>, SynthesisError> {
    FpVar::new_input(cs.clone(), || Ok(value))
}

pub(crate) fn witnesses(
    cs: &ConstraintSystemRef<Fr>,
    values: &[Fr],
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    values.iter().map(|v| witness(cs, *v)).collect()
}

pub(crate) fn publics(
    cs: &ConstraintSystemRef<Fr>,
    values: &[Fr],
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    values.iter().map(|v| public(cs, *v)).collect()
}
