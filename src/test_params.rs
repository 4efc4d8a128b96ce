//! Valid proving parameters built from real trees.
//!
//! Used by the tests, the benchmarks and anyone who needs a request that a
//! freshly set up system will accept. Every builder mutates actual
//! [`MerkleTree`]s or [`IndexedMerkleTree`]s, so roots, paths and hash chains
//! are mutually consistent.

use crate::circuit::{BatchCircuitType, CircuitType, ProverVersion};
use crate::error::{ProverError, Result};
use crate::indexed::{highest_address_plus_one, IndexedMerkleTree};
use crate::merkle::MerkleTree;
use crate::system::SystemShape;
use crate::types::{
    BatchAddressAppendParameters, BatchAppendParameters, BatchUpdateParameters,
    CombinedParameters, InclusionInputs, InclusionParameters, NonInclusionInputs,
    NonInclusionParameters, ProofRequest,
};
use crate::utils::{hash_chain, poseidon2, poseidon3};
use ark_bn254::Fr;
use ark_ff::Zero;

/// Deterministic, non-trivial leaf value.
#[must_use]
pub fn sample_leaf(i: u64) -> Fr {
    poseidon2(Fr::from(0x5eed_u64), Fr::from(i))
}

/// Deterministic address well inside the 248-bit range.
#[must_use]
pub fn sample_address(i: u64) -> Fr {
    Fr::from(1_000 + 100 * i)
}

fn ensure_capacity(tree: &MerkleTree, needed: u64) -> Result<()> {
    if needed > tree.capacity() {
        return Err(ProverError::Tree(format!(
            "tree of height {} cannot hold {needed} leaves",
            tree.depth()
        )));
    }
    Ok(())
}

fn to_u32(what: &str, n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| ProverError::shape(format!("{what} {n} is too large")))
}

/// Proves the first `count` leaves of a tree holding a few more.
pub fn inclusion_parameters(
    version: ProverVersion,
    height: usize,
    count: usize,
) -> Result<InclusionParameters> {
    let mut tree = MerkleTree::new(height);
    let filled = (count as u64 + 2).min(tree.capacity());
    ensure_capacity(&tree, count as u64)?;
    for i in 0..filled {
        tree.checked_update(i, sample_leaf(i))?;
    }

    let input_compressed_accounts = (0..count as u64)
        .map(|i| InclusionInputs {
            root: tree.root(),
            path_index: i,
            path_elements: tree.proof(i),
            leaf: tree.leaf(i),
        })
        .collect();

    Ok(InclusionParameters {
        state_tree_height: Some(to_u32("tree height", height)?),
        version: Some(version),
        public_input_hash: None,
        input_compressed_accounts,
    })
}

/// Proves `count` absent addresses, each in a different gap of a tree
/// holding a few inserted addresses.
pub fn non_inclusion_parameters(
    version: ProverVersion,
    height: usize,
    count: usize,
) -> Result<NonInclusionParameters> {
    let mut tree = IndexedMerkleTree::new(height, version)?;
    let inserted = (count as u64).min(tree.merkle_tree().capacity().saturating_sub(1));
    for i in 0..inserted {
        tree.append(sample_address(i))?;
    }

    let new_addresses = (0..count as u64)
        .map(|i| {
            let value = sample_address(i) + Fr::from(50u64);
            let witness = tree.non_inclusion_proof(&value)?;
            Ok(NonInclusionInputs {
                root: witness.root,
                value,
                path_index: witness.low_element.index,
                path_elements: witness.siblings,
                leaf_lower_range_value: witness.low_element.value,
                leaf_higher_range_value: witness.low_element.next_value,
                next_index: witness.low_element.next_index,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NonInclusionParameters {
        address_tree_height: Some(to_u32("tree height", height)?),
        version: Some(version),
        public_input_hash: None,
        new_addresses,
    })
}

pub fn combined_parameters(
    version: ProverVersion,
    inclusion_height: usize,
    inclusion_count: usize,
    non_inclusion_height: usize,
    non_inclusion_count: usize,
) -> Result<CombinedParameters> {
    let inclusion = inclusion_parameters(version, inclusion_height, inclusion_count)?;
    let non_inclusion = non_inclusion_parameters(version, non_inclusion_height, non_inclusion_count)?;
    Ok(CombinedParameters {
        state_tree_height: inclusion.state_tree_height,
        address_tree_height: non_inclusion.address_tree_height,
        version: Some(version),
        public_input_hash: None,
        input_compressed_accounts: inclusion.input_compressed_accounts,
        new_addresses: non_inclusion.new_addresses,
    })
}

/// Appends `leaves` at `start_index..` of `tree`, recording the batch.
///
/// Slots that already hold a value keep it.
pub fn batch_append_from_tree(
    tree: &mut MerkleTree,
    start_index: u64,
    leaves: &[Fr],
) -> Result<BatchAppendParameters> {
    ensure_capacity(tree, start_index + leaves.len() as u64)?;
    let old_root = tree.root();

    let mut old_leaves = Vec::with_capacity(leaves.len());
    let mut merkle_proofs = Vec::with_capacity(leaves.len());
    for (i, leaf) in leaves.iter().enumerate() {
        let index = start_index + i as u64;
        let old_leaf = tree.leaf(index);
        let slot_leaf = if old_leaf.is_zero() { *leaf } else { old_leaf };
        merkle_proofs.push(tree.checked_update(index, slot_leaf)?);
        old_leaves.push(old_leaf);
    }

    let mut params = BatchAppendParameters {
        height: to_u32("tree height", tree.depth())?,
        batch_size: to_u32("batch size", leaves.len())?,
        start_index,
        old_root,
        new_root: tree.root(),
        leaves_hashchain_hash: hash_chain(leaves),
        public_input_hash: Fr::zero(),
        old_leaves,
        leaves: leaves.to_vec(),
        merkle_proofs,
    };
    params.public_input_hash = params.compute_public_input_hash();
    Ok(params)
}

/// Appends a fresh batch after two existing leaves.
pub fn batch_append_parameters(height: usize, batch_size: usize) -> Result<BatchAppendParameters> {
    let mut tree = MerkleTree::with_leaves(height, &[sample_leaf(100), sample_leaf(101)])?;
    let leaves: Vec<Fr> = (0..batch_size as u64).map(sample_leaf).collect();
    batch_append_from_tree(&mut tree, 2, &leaves)
}

/// Nullifies `leaves[i]` at `path_indices[i]` with `tx_hashes[i]`.
///
/// `old_leaves` are read from the tree, so a slot that has not been appended
/// yet is nullified from zero.
pub fn batch_update_from_tree(
    tree: &mut MerkleTree,
    leaves: &[Fr],
    path_indices: &[u64],
    tx_hashes: &[Fr],
) -> Result<BatchUpdateParameters> {
    if leaves.len() != path_indices.len() || leaves.len() != tx_hashes.len() {
        return Err(ProverError::shape(
            "leaves, path indices and tx hashes must have the same length",
        ));
    }
    let old_root = tree.root();

    let mut old_leaves = Vec::with_capacity(leaves.len());
    let mut merkle_proofs = Vec::with_capacity(leaves.len());
    for ((leaf, index), tx_hash) in leaves.iter().zip(path_indices).zip(tx_hashes) {
        old_leaves.push(tree.leaf(*index));
        let nullifier = poseidon3(*leaf, Fr::from(*index), *tx_hash);
        merkle_proofs.push(tree.checked_update(*index, nullifier)?);
    }

    let mut params = BatchUpdateParameters {
        height: to_u32("tree height", tree.depth())?,
        batch_size: to_u32("batch size", leaves.len())?,
        old_root,
        new_root: tree.root(),
        leaves_hashchain_hash: Fr::zero(),
        public_input_hash: Fr::zero(),
        tx_hashes: tx_hashes.to_vec(),
        leaves: leaves.to_vec(),
        old_leaves,
        path_indices: path_indices.to_vec(),
        merkle_proofs,
    };
    params.leaves_hashchain_hash = hash_chain(&params.nullifiers());
    params.public_input_hash = params.compute_public_input_hash();
    Ok(params)
}

/// Nullifies the first `batch_size` leaves of a full-enough tree.
pub fn batch_update_parameters(height: usize, batch_size: usize) -> Result<BatchUpdateParameters> {
    let leaves: Vec<Fr> = (0..batch_size as u64).map(sample_leaf).collect();
    let mut tree = MerkleTree::new(height);
    ensure_capacity(&tree, batch_size as u64)?;
    for (i, leaf) in leaves.iter().enumerate() {
        tree.checked_update(i as u64, *leaf)?;
    }

    let path_indices: Vec<u64> = (0..batch_size as u64).collect();
    let tx_hashes: Vec<Fr> = (0..batch_size as u64)
        .map(|i| poseidon2(Fr::from(0x7a_u64), Fr::from(i)))
        .collect();
    batch_update_from_tree(&mut tree, &leaves, &path_indices, &tx_hashes)
}

/// Inserts `values` into `tree` one by one, recording the batch.
pub fn batch_address_append_from_tree(
    tree: &mut IndexedMerkleTree,
    values: &[Fr],
) -> Result<BatchAddressAppendParameters> {
    let start_index = tree.next_index();
    let old_root = tree.root();

    let mut params = BatchAddressAppendParameters {
        tree_height: to_u32("tree height", tree.height())?,
        batch_size: to_u32("batch size", values.len())?,
        start_index,
        old_root,
        new_root: old_root,
        hashchain_hash: hash_chain(values),
        public_input_hash: Fr::zero(),
        low_element_values: Vec::with_capacity(values.len()),
        low_element_next_values: Vec::with_capacity(values.len()),
        low_element_indices: Vec::with_capacity(values.len()),
        low_element_next_indices: Vec::with_capacity(values.len()),
        low_element_proofs: Vec::with_capacity(values.len()),
        new_element_values: values.to_vec(),
        new_element_proofs: Vec::with_capacity(values.len()),
    };

    for value in values {
        let witness = tree.append(*value)?;
        params.low_element_values.push(witness.low_element.value);
        params.low_element_next_values.push(witness.low_element.next_value);
        params.low_element_indices.push(witness.low_element.index);
        params.low_element_next_indices.push(witness.low_element.next_index);
        params.low_element_proofs.push(witness.low_proof);
        params.new_element_proofs.push(witness.new_proof);
    }

    params.new_root = tree.root();
    params.public_input_hash = params.compute_public_input_hash();
    Ok(params)
}

pub fn batch_address_append_parameters(
    height: usize,
    batch_size: usize,
) -> Result<BatchAddressAppendParameters> {
    let mut tree = IndexedMerkleTree::new(height, ProverVersion::V2)?;
    let values: Vec<Fr> = (0..batch_size as u64).map(sample_address).collect();
    batch_address_append_from_tree(&mut tree, &values)
}

/// Height 4, batch 1: element 0 (`0 -> 2^248 - 1`) is the only element, but
/// the batch starts at index 2 and inserts `0x1e`.
///
/// Index 1 stays empty, as it does when earlier insertions are queued but
/// not yet proven.
pub fn address_append_gap_scenario() -> Result<BatchAddressAppendParameters> {
    let height = 4;
    let start_index = 2;
    let new_value = Fr::from(0x1e_u64);
    let high = highest_address_plus_one();

    let mut tree = MerkleTree::new(height);
    tree.checked_update(0, poseidon2(Fr::zero(), high))?;
    let old_root = tree.root();

    let low_proof = tree.checked_update(0, poseidon2(Fr::zero(), new_value))?;
    let new_proof = tree.checked_update(start_index, poseidon2(new_value, high))?;

    let mut params = BatchAddressAppendParameters {
        tree_height: height as u32,
        batch_size: 1,
        start_index,
        old_root,
        new_root: tree.root(),
        hashchain_hash: hash_chain(&[new_value]),
        public_input_hash: Fr::zero(),
        low_element_values: vec![Fr::zero()],
        low_element_next_values: vec![high],
        low_element_indices: vec![0],
        low_element_next_indices: vec![0],
        low_element_proofs: vec![low_proof],
        new_element_values: vec![new_value],
        new_element_proofs: vec![new_proof],
    };
    params.public_input_hash = params.compute_public_input_hash();
    Ok(params)
}

/// A valid request for `shape`.
pub fn request_for_shape(shape: &SystemShape) -> Result<ProofRequest> {
    shape.validate()?;
    let request = match shape {
        SystemShape::Merkle(s) => {
            let ih = s.inclusion_tree_height as usize;
            let ic = s.inclusion_account_count as usize;
            let nh = s.non_inclusion_tree_height as usize;
            let nc = s.non_inclusion_account_count as usize;
            match s.circuit_type()? {
                CircuitType::Inclusion => {
                    ProofRequest::Inclusion(inclusion_parameters(s.version, ih, ic)?)
                }
                CircuitType::NonInclusion => {
                    ProofRequest::NonInclusion(non_inclusion_parameters(s.version, nh, nc)?)
                }
                _ => ProofRequest::Combined(combined_parameters(s.version, ih, ic, nh, nc)?),
            }
        }
        SystemShape::Batch(s) => {
            let height = s.tree_height as usize;
            let size = s.batch_size as usize;
            match s.circuit_type {
                BatchCircuitType::Append => {
                    ProofRequest::BatchAppend(batch_append_parameters(height, size)?)
                }
                BatchCircuitType::Update => {
                    ProofRequest::BatchUpdate(batch_update_parameters(height, size)?)
                }
                BatchCircuitType::AddressAppend => ProofRequest::BatchAddressAppend(
                    batch_address_append_parameters(height, size)?,
                ),
            }
        }
    };
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusion_paths_match_root() {
        let params = inclusion_parameters(ProverVersion::V2, 5, 3).unwrap();
        for account in &params.input_compressed_accounts {
            assert_eq!(
                MerkleTree::compute_root(account.leaf, account.path_index, &account.path_elements),
                account.root
            );
        }
    }

    #[test]
    fn test_non_inclusion_low_elements_bracket_values() {
        let params = non_inclusion_parameters(ProverVersion::V1, 4, 2).unwrap();
        for address in &params.new_addresses {
            assert!(address.leaf_lower_range_value < address.value);
            assert!(address.value < address.leaf_higher_range_value);
        }
    }

    #[test]
    fn test_batch_append_hashes() {
        let params = batch_append_parameters(4, 2).unwrap();
        assert_eq!(params.start_index, 2);
        assert_eq!(params.leaves_hashchain_hash, hash_chain(&params.leaves));
        assert_eq!(params.public_input_hash, params.compute_public_input_hash());
        assert_ne!(params.old_root, params.new_root);
    }

    #[test]
    fn test_batch_update_chain_is_over_nullifiers() {
        let params = batch_update_parameters(4, 3).unwrap();
        assert_eq!(
            params.leaves_hashchain_hash,
            hash_chain(&params.nullifiers())
        );
        assert_eq!(params.old_leaves, params.leaves);
    }

    #[test]
    fn test_address_append_from_tree_starts_at_next_index() {
        let mut tree = IndexedMerkleTree::new(4, ProverVersion::V2).unwrap();
        tree.append(Fr::from(5u64)).unwrap();

        let params = batch_address_append_from_tree(&mut tree, &[Fr::from(3u64), Fr::from(9u64)])
            .unwrap();
        assert_eq!(params.start_index, 2);
        assert_eq!(params.low_element_indices, vec![0, 1]);
        assert_eq!(params.new_root, tree.root());
    }

    #[test]
    fn test_capacity_is_checked() {
        assert!(matches!(
            inclusion_parameters(ProverVersion::V2, 1, 3),
            Err(ProverError::Tree(_))
        ));
    }
}
