//! Nullify a batch of leaves in place.

use super::{ensure_index_fits, ensure_shape, path_bits, ProofCircuit};
use crate::error::{ensure_len, ensure_proof_lengths, Result};
use crate::gadgets::{self, hash_chain, merkle_root_update, poseidon3};
use crate::types::BatchUpdateParameters;
use ark_bn254::Fr;
use ark_ff::Zero;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Public input: `hash_chain([old_root, new_root, leaves_hashchain_hash])`.
///
/// Each slot replaces `old_leaf` at `path_index` with the nullifier
/// `Poseidon3(leaf, path_index, tx_hash)`. The leaves hash chain is over the
/// nullifiers. `old_leaf` may be zero: a leaf can be nullified before the
/// append that inserts it has been proven.
#[derive(Debug, Clone)]
pub struct BatchUpdateCircuit {
    pub height: usize,
    pub public_input_hash: Fr,
    pub old_root: Fr,
    pub new_root: Fr,
    pub leaves_hashchain_hash: Fr,
    pub tx_hashes: Vec<Fr>,
    pub leaves: Vec<Fr>,
    pub old_leaves: Vec<Fr>,
    pub path_indices: Vec<u64>,
    pub merkle_proofs: Vec<Vec<Fr>>,
}

impl BatchUpdateCircuit {
    pub fn blank(height: usize, batch_size: usize) -> Self {
        BatchUpdateCircuit {
            height,
            public_input_hash: Fr::zero(),
            old_root: Fr::zero(),
            new_root: Fr::zero(),
            leaves_hashchain_hash: Fr::zero(),
            tx_hashes: vec![Fr::zero(); batch_size],
            leaves: vec![Fr::zero(); batch_size],
            old_leaves: vec![Fr::zero(); batch_size],
            path_indices: vec![0; batch_size],
            merkle_proofs: vec![vec![Fr::zero(); height]; batch_size],
        }
    }

    pub fn from_parameters(
        params: &BatchUpdateParameters,
        height: usize,
        batch_size: usize,
    ) -> Result<Self> {
        ensure_shape("update", height, batch_size)?;
        ensure_len("txHashes", params.tx_hashes.len(), batch_size)?;
        ensure_len("leaves", params.leaves.len(), batch_size)?;
        ensure_len("oldLeaves", params.old_leaves.len(), batch_size)?;
        ensure_len("pathIndices", params.path_indices.len(), batch_size)?;
        ensure_len("merkleProofs", params.merkle_proofs.len(), batch_size)?;
        ensure_proof_lengths("merkleProofs", &params.merkle_proofs, height)?;
        for index in &params.path_indices {
            ensure_index_fits("update pathIndices", *index, height)?;
        }

        Ok(BatchUpdateCircuit {
            height,
            public_input_hash: params.public_input_hash,
            old_root: params.old_root,
            new_root: params.new_root,
            leaves_hashchain_hash: params.leaves_hashchain_hash,
            tx_hashes: params.tx_hashes.clone(),
            leaves: params.leaves.clone(),
            old_leaves: params.old_leaves.clone(),
            path_indices: params.path_indices.clone(),
            merkle_proofs: params.merkle_proofs.clone(),
        })
    }
}

impl ConstraintSynthesizer<Fr> for BatchUpdateCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let public_input_hash = gadgets::public(&cs, self.public_input_hash)?;
        let old_root = gadgets::witness(&cs, self.old_root)?;
        let new_root = gadgets::witness(&cs, self.new_root)?;
        let leaves_hashchain_hash = gadgets::witness(&cs, self.leaves_hashchain_hash)?;

        hash_chain(&[old_root.clone(), new_root.clone(), leaves_hashchain_hash.clone()])?
            .enforce_equal(&public_input_hash)?;

        let mut root = old_root;
        let mut nullifiers = Vec::with_capacity(self.leaves.len());
        for i in 0..self.leaves.len() {
            let leaf = gadgets::witness(&cs, self.leaves[i])?;
            let old_leaf = gadgets::witness(&cs, self.old_leaves[i])?;
            let tx_hash = gadgets::witness(&cs, self.tx_hashes[i])?;
            let (path_index, bits) = path_bits(&cs, self.path_indices[i], self.height)?;
            let siblings = gadgets::witnesses(&cs, &self.merkle_proofs[i])?;

            let nullifier = poseidon3(&leaf, &path_index, &tx_hash)?;
            root = merkle_root_update(&root, &old_leaf, &nullifier, &bits, &siblings)?;
            nullifiers.push(nullifier);
        }

        hash_chain(&nullifiers)?.enforce_equal(&leaves_hashchain_hash)?;
        root.enforce_equal(&new_root)
    }
}

impl ProofCircuit for BatchUpdateCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}
