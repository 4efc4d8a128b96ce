//! Indexed Merkle tree: a sorted linked list of values committed in a Merkle tree.
//!
//! Each leaf commits to an element and the value of its successor, so the
//! absence of `v` is proven by exhibiting the *low element* `e` with
//! `e.value < v < e.next_value`.

use crate::circuit::ProverVersion;
use crate::error::{ProverError, Result};
use crate::merkle::MerkleTree;
use crate::utils::{field_to_hex, poseidon2, poseidon3, pow2};
use crate::ADDRESS_RANGE_BITS;
use ark_bn254::Fr;
use ark_ff::Zero;
use log::debug;
use std::collections::BTreeMap;

/// Value the greatest element points at: `2^248 - 1`.
#[must_use]
pub fn highest_address_plus_one() -> Fr {
    pow2(ADDRESS_RANGE_BITS) - Fr::from(1u64)
}

/// One element of the linked list, stored at leaf `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedElement {
    pub index: u64,
    pub value: Fr,
    pub next_value: Fr,
    pub next_index: u64,
}

impl IndexedElement {
    /// Leaf committed for this element.
    ///
    /// v2 commits `Poseidon2(value, next_value)`; v1 additionally binds the
    /// successor's index: `Poseidon3(value, next_index, next_value)`.
    #[must_use]
    pub fn leaf_hash(&self, version: ProverVersion) -> Fr {
        match version {
            ProverVersion::V1 => {
                poseidon3(self.value, Fr::from(self.next_index), self.next_value)
            }
            ProverVersion::V2 => poseidon2(self.value, self.next_value),
        }
    }
}

/// Everything a non-inclusion circuit slot needs for one value.
#[derive(Debug, Clone)]
pub struct NonInclusionWitness {
    pub root: Fr,
    pub value: Fr,
    pub low_element: IndexedElement,
    pub siblings: Vec<Fr>,
}

/// Result of inserting a value.
///
/// `low_proof` authenticates the low element's leaf against `old_root`;
/// `new_proof` authenticates the empty leaf at `new_element.index` against the
/// intermediate root produced by the low-element update.
#[derive(Debug, Clone)]
pub struct AppendWitness {
    pub old_root: Fr,
    pub new_root: Fr,
    pub low_element: IndexedElement,
    pub low_proof: Vec<Fr>,
    pub new_element: IndexedElement,
    pub new_proof: Vec<Fr>,
}

#[derive(Debug, Clone)]
pub struct IndexedMerkleTree {
    version: ProverVersion,
    tree: MerkleTree,
    elements: Vec<IndexedElement>,
    by_value: BTreeMap<Fr, usize>,
}

impl IndexedMerkleTree {
    /// A tree holding only element 0: value 0 pointing at the sentinel.
    pub fn new(height: usize, version: ProverVersion) -> Result<Self> {
        if height == 0 {
            return Err(ProverError::Tree(
                "indexed tree needs at least one level".to_string(),
            ));
        }

        let first = IndexedElement {
            index: 0,
            value: Fr::zero(),
            next_value: highest_address_plus_one(),
            next_index: 0,
        };
        let mut tree = MerkleTree::new(height);
        tree.update(0, first.leaf_hash(version));

        let mut by_value = BTreeMap::new();
        by_value.insert(first.value, 0);

        Ok(IndexedMerkleTree {
            version,
            tree,
            elements: vec![first],
            by_value,
        })
    }

    #[must_use]
    pub fn version(&self) -> ProverVersion {
        self.version
    }

    #[must_use]
    pub fn root(&self) -> Fr {
        self.tree.root()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.tree.depth()
    }

    #[must_use]
    pub fn merkle_tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Elements in insertion order; `elements()[i].index == i`.
    #[must_use]
    pub fn elements(&self) -> &[IndexedElement] {
        &self.elements
    }

    /// Leaf index the next inserted element will occupy.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.elements.len() as u64
    }

    #[must_use]
    pub fn contains(&self, value: &Fr) -> bool {
        self.by_value.contains_key(value)
    }

    /// The element `e` with `e.value < value < e.next_value`.
    pub fn find_low_element(&self, value: &Fr) -> Result<IndexedElement> {
        if self.contains(value) {
            return Err(ProverError::Tree(format!(
                "value {} is already in the tree",
                field_to_hex(value)
            )));
        }
        if *value >= highest_address_plus_one() {
            return Err(ProverError::Tree(format!(
                "value {} is not below the {}-bit address range",
                field_to_hex(value),
                ADDRESS_RANGE_BITS
            )));
        }

        let (_, position) = self
            .by_value
            .range(..*value)
            .next_back()
            .ok_or_else(|| ProverError::Tree("indexed tree has no low element".to_string()))?;
        Ok(self.elements[*position])
    }

    /// Low element plus its Merkle path, proving `value` is absent.
    pub fn non_inclusion_proof(&self, value: &Fr) -> Result<NonInclusionWitness> {
        let low_element = self.find_low_element(value)?;
        Ok(NonInclusionWitness {
            root: self.tree.root(),
            value: *value,
            low_element,
            siblings: self.tree.proof(low_element.index),
        })
    }

    /// Insert `value` at leaf [`IndexedMerkleTree::next_index`].
    ///
    /// Updates the low element to point at the new one, then writes the new
    /// element's leaf.
    pub fn append(&mut self, value: Fr) -> Result<AppendWitness> {
        let new_index = self.next_index();
        if new_index >= self.tree.capacity() {
            return Err(ProverError::Tree(format!(
                "indexed tree of height {} is full",
                self.tree.depth()
            )));
        }

        let low_element = self.find_low_element(&value)?;
        let old_root = self.tree.root();

        let new_element = IndexedElement {
            index: new_index,
            value,
            next_value: low_element.next_value,
            next_index: low_element.next_index,
        };
        let updated_low = IndexedElement {
            next_value: value,
            next_index: new_index,
            ..low_element
        };

        let low_proof = self
            .tree
            .update(low_element.index, updated_low.leaf_hash(self.version));
        let new_proof = self
            .tree
            .update(new_index, new_element.leaf_hash(self.version));

        self.elements[low_element.index as usize] = updated_low;
        self.elements.push(new_element);
        self.by_value.insert(value, new_index as usize);

        debug!(
            "indexed tree: inserted {} at {} (low element {})",
            field_to_hex(&value),
            new_index,
            low_element.index
        );

        Ok(AppendWitness {
            old_root,
            new_root: self.tree.root(),
            low_element,
            low_proof,
            new_element,
            new_proof,
        })
    }
}
