//! Insert a batch of values into an indexed Merkle tree.

use super::{ensure_index_fits, ensure_shape, path_bits, ProofCircuit};
use crate::error::{ensure_len, ensure_proof_lengths, Result};
use crate::gadgets::{self, hash_chain, leaf_hash, merkle_root_update, poseidon2, to_bits_le};
use crate::types::BatchAddressAppendParameters;
use ark_bn254::Fr;
use ark_ff::Zero;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Public input: `hash_chain([old_root, new_root, hashchain_hash, start_index])`.
///
/// Per slot `i`, against the running root:
/// 1. the low element leaf `Poseidon2(low, low_next)` (with
///    `low < new < low_next`) becomes `Poseidon2(low, new)`;
/// 2. the empty leaf at `start_index + i` becomes `Poseidon2(new, low_next)`.
///
/// `low_element_next_indices` are carried for the request format only; v2
/// leaves do not commit to them.
#[derive(Debug, Clone)]
pub struct BatchAddressAppendCircuit {
    pub height: usize,
    pub public_input_hash: Fr,
    pub old_root: Fr,
    pub new_root: Fr,
    pub hashchain_hash: Fr,
    pub start_index: u64,
    pub low_element_values: Vec<Fr>,
    pub low_element_next_values: Vec<Fr>,
    pub low_element_indices: Vec<u64>,
    pub low_element_next_indices: Vec<u64>,
    pub low_element_proofs: Vec<Vec<Fr>>,
    pub new_element_values: Vec<Fr>,
    pub new_element_proofs: Vec<Vec<Fr>>,
}

impl BatchAddressAppendCircuit {
    pub fn blank(height: usize, batch_size: usize) -> Self {
        BatchAddressAppendCircuit {
            height,
            public_input_hash: Fr::zero(),
            old_root: Fr::zero(),
            new_root: Fr::zero(),
            hashchain_hash: Fr::zero(),
            start_index: 0,
            low_element_values: vec![Fr::zero(); batch_size],
            low_element_next_values: vec![Fr::zero(); batch_size],
            low_element_indices: vec![0; batch_size],
            low_element_next_indices: vec![0; batch_size],
            low_element_proofs: vec![vec![Fr::zero(); height]; batch_size],
            new_element_values: vec![Fr::zero(); batch_size],
            new_element_proofs: vec![vec![Fr::zero(); height]; batch_size],
        }
    }

    pub fn from_parameters(
        params: &BatchAddressAppendParameters,
        height: usize,
        batch_size: usize,
    ) -> Result<Self> {
        ensure_shape("address-append", height, batch_size)?;
        ensure_len("lowElementValues", params.low_element_values.len(), batch_size)?;
        ensure_len(
            "lowElementNextValues",
            params.low_element_next_values.len(),
            batch_size,
        )?;
        ensure_len("lowElementIndices", params.low_element_indices.len(), batch_size)?;
        ensure_len(
            "lowElementNextIndices",
            params.low_element_next_indices.len(),
            batch_size,
        )?;
        ensure_len("lowElementProofs", params.low_element_proofs.len(), batch_size)?;
        ensure_len("newElementValues", params.new_element_values.len(), batch_size)?;
        ensure_len("newElementProofs", params.new_element_proofs.len(), batch_size)?;
        ensure_proof_lengths("lowElementProofs", &params.low_element_proofs, height)?;
        ensure_proof_lengths("newElementProofs", &params.new_element_proofs, height)?;
        for index in &params.low_element_indices {
            ensure_index_fits("address-append lowElementIndices", *index, height)?;
        }
        let last_index = params.start_index.saturating_add(batch_size as u64 - 1);
        ensure_index_fits("address-append startIndex + batchSize - 1", last_index, height)?;

        Ok(BatchAddressAppendCircuit {
            height,
            public_input_hash: params.public_input_hash,
            old_root: params.old_root,
            new_root: params.new_root,
            hashchain_hash: params.hashchain_hash,
            start_index: params.start_index,
            low_element_values: params.low_element_values.clone(),
            low_element_next_values: params.low_element_next_values.clone(),
            low_element_indices: params.low_element_indices.clone(),
            low_element_next_indices: params.low_element_next_indices.clone(),
            low_element_proofs: params.low_element_proofs.clone(),
            new_element_values: params.new_element_values.clone(),
            new_element_proofs: params.new_element_proofs.clone(),
        })
    }
}

impl ConstraintSynthesizer<Fr> for BatchAddressAppendCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let public_input_hash = gadgets::public(&cs, self.public_input_hash)?;
        let old_root = gadgets::witness(&cs, self.old_root)?;
        let new_root = gadgets::witness(&cs, self.new_root)?;
        let hashchain_hash = gadgets::witness(&cs, self.hashchain_hash)?;
        let start_index = gadgets::witness(&cs, Fr::from(self.start_index))?;

        let new_values = gadgets::witnesses(&cs, &self.new_element_values)?;
        let empty_leaf = FpVar::zero();

        let mut root = old_root.clone();
        for (i, new_value) in new_values.iter().enumerate() {
            let low_value = gadgets::witness(&cs, self.low_element_values[i])?;
            let low_next_value = gadgets::witness(&cs, self.low_element_next_values[i])?;
            let (_, low_bits) = path_bits(&cs, self.low_element_indices[i], self.height)?;
            let low_siblings = gadgets::witnesses(&cs, &self.low_element_proofs[i])?;

            let old_low_leaf = leaf_hash(&low_value, &low_next_value, new_value)?;
            let new_low_leaf = poseidon2(&low_value, new_value)?;
            root = merkle_root_update(&root, &old_low_leaf, &new_low_leaf, &low_bits, &low_siblings)?;

            let index = &start_index + FpVar::constant(Fr::from(i as u64));
            let bits = to_bits_le(&index, self.height)?;
            let siblings = gadgets::witnesses(&cs, &self.new_element_proofs[i])?;
            let new_leaf = poseidon2(new_value, &low_next_value)?;
            root = merkle_root_update(&root, &empty_leaf, &new_leaf, &bits, &siblings)?;
        }

        root.enforce_equal(&new_root)?;
        hash_chain(&new_values)?.enforce_equal(&hashchain_hash)?;
        hash_chain(&[old_root, new_root, hashchain_hash, start_index])?
            .enforce_equal(&public_input_hash)
    }
}

impl ProofCircuit for BatchAddressAppendCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}
