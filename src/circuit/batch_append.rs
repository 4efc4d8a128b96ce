//! Append a batch of leaves at consecutive indices.

use super::{ensure_index_fits, ensure_shape, ProofCircuit};
use crate::error::{ensure_len, ensure_proof_lengths, Result};
use crate::gadgets::{self, hash_chain, merkle_root_update};
use crate::types::BatchAppendParameters;
use ark_bn254::Fr;
use ark_ff::Zero;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Public input: `hash_chain([old_root, new_root, leaves_hashchain_hash, start_index])`.
///
/// Slot `i` lives at `start_index + i`. A slot whose current leaf is zero
/// receives the new leaf; a slot that already holds a value (it was nullified
/// before being appended) keeps it. The leaves hash chain is always over the
/// submitted leaves.
#[derive(Debug, Clone)]
pub struct BatchAppendCircuit {
    pub height: usize,
    pub public_input_hash: Fr,
    pub old_root: Fr,
    pub new_root: Fr,
    pub leaves_hashchain_hash: Fr,
    pub start_index: u64,
    pub old_leaves: Vec<Fr>,
    pub leaves: Vec<Fr>,
    pub merkle_proofs: Vec<Vec<Fr>>,
}

impl BatchAppendCircuit {
    pub fn blank(height: usize, batch_size: usize) -> Self {
        BatchAppendCircuit {
            height,
            public_input_hash: Fr::zero(),
            old_root: Fr::zero(),
            new_root: Fr::zero(),
            leaves_hashchain_hash: Fr::zero(),
            start_index: 0,
            old_leaves: vec![Fr::zero(); batch_size],
            leaves: vec![Fr::zero(); batch_size],
            merkle_proofs: vec![vec![Fr::zero(); height]; batch_size],
        }
    }

    pub fn from_parameters(
        params: &BatchAppendParameters,
        height: usize,
        batch_size: usize,
    ) -> Result<Self> {
        ensure_shape("append", height, batch_size)?;
        ensure_len("leaves", params.leaves.len(), batch_size)?;
        ensure_len("oldLeaves", params.old_leaves.len(), batch_size)?;
        ensure_len("merkleProofs", params.merkle_proofs.len(), batch_size)?;
        ensure_proof_lengths("merkleProofs", &params.merkle_proofs, height)?;
        let last_index = params.start_index.saturating_add(batch_size as u64 - 1);
        ensure_index_fits("append startIndex + batchSize - 1", last_index, height)?;

        Ok(BatchAppendCircuit {
            height,
            public_input_hash: params.public_input_hash,
            old_root: params.old_root,
            new_root: params.new_root,
            leaves_hashchain_hash: params.leaves_hashchain_hash,
            start_index: params.start_index,
            old_leaves: params.old_leaves.clone(),
            leaves: params.leaves.clone(),
            merkle_proofs: params.merkle_proofs.clone(),
        })
    }
}

impl ConstraintSynthesizer<Fr> for BatchAppendCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let public_input_hash = gadgets::public(&cs, self.public_input_hash)?;
        let old_root = gadgets::witness(&cs, self.old_root)?;
        let new_root = gadgets::witness(&cs, self.new_root)?;
        let leaves_hashchain_hash = gadgets::witness(&cs, self.leaves_hashchain_hash)?;
        let start_index = gadgets::witness(&cs, Fr::from(self.start_index))?;

        hash_chain(&[
            old_root.clone(),
            new_root.clone(),
            leaves_hashchain_hash.clone(),
            start_index.clone(),
        ])?
        .enforce_equal(&public_input_hash)?;

        let leaves = gadgets::witnesses(&cs, &self.leaves)?;
        let old_leaves = gadgets::witnesses(&cs, &self.old_leaves)?;
        hash_chain(&leaves)?.enforce_equal(&leaves_hashchain_hash)?;

        let mut root = old_root;
        for (i, proof) in self.merkle_proofs.iter().enumerate() {
            let index = &start_index + FpVar::constant(Fr::from(i as u64));
            let bits = gadgets::to_bits_le(&index, self.height)?;
            let siblings = gadgets::witnesses(&cs, proof)?;

            let slot_is_empty = old_leaves[i].is_eq(&FpVar::zero())?;
            let slot_leaf = slot_is_empty.select(&leaves[i], &old_leaves[i])?;
            root = merkle_root_update(&root, &old_leaves[i], &slot_leaf, &bits, &siblings)?;
        }

        root.enforce_equal(&new_root)
    }
}

impl ProofCircuit for BatchAppendCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}

