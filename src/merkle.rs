//! Persistent sparse Merkle tree over Poseidon(2).
//!
//! Untouched subtrees are represented by a single [`MerkleNode::Empty`] whose
//! value is the precomputed zero hash for its height. Updates copy the path
//! from the leaf to the root and share every other node with the previous
//! version, so cloning a tree is an O(1) snapshot.

use crate::error::{ProverError, Result};
use crate::utils::{field_to_hex, poseidon2};
use ark_bn254::Fr;
use ark_ff::Zero;
use std::fmt;
use std::sync::Arc;

/// A node of the tree. `depth` is the height above the leaf level.
#[derive(Debug, Clone)]
pub enum MerkleNode {
    /// Subtree where every leaf is zero; its value is `zero_hashes[depth]`.
    Empty {
        depth: usize,
        zero_hashes: Arc<[Fr]>,
    },
    /// A stored leaf at depth 0.
    Leaf(Fr),
    /// `value = Poseidon2(left.value, right.value)`.
    Branch {
        depth: usize,
        value: Fr,
        left: Arc<MerkleNode>,
        right: Arc<MerkleNode>,
    },
}

impl MerkleNode {
    #[inline]
    #[must_use]
    pub fn value(&self) -> Fr {
        match self {
            MerkleNode::Empty { depth, zero_hashes } => zero_hashes[*depth],
            MerkleNode::Leaf(value) => *value,
            MerkleNode::Branch { value, .. } => *value,
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            MerkleNode::Empty { depth, .. } | MerkleNode::Branch { depth, .. } => *depth,
            MerkleNode::Leaf(_) => 0,
        }
    }

    /// Children of an inner node, materializing empty ones on demand.
    ///
    /// Must not be called on a depth-0 node.
    fn children(&self) -> (Arc<MerkleNode>, Arc<MerkleNode>) {
        match self {
            MerkleNode::Empty { depth, zero_hashes } => {
                let child = Arc::new(MerkleNode::Empty {
                    depth: depth - 1,
                    zero_hashes: Arc::clone(zero_hashes),
                });
                (Arc::clone(&child), child)
            }
            MerkleNode::Branch { left, right, .. } => (Arc::clone(left), Arc::clone(right)),
            MerkleNode::Leaf(_) => unreachable!("leaf nodes have no children"),
        }
    }
}

/// A fixed-depth sparse Merkle tree with `2^depth` leaves, all initially zero.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    depth: usize,
    zero_hashes: Arc<[Fr]>,
    root: Arc<MerkleNode>,
}

/// `zero[0] = 0`, `zero[i] = Poseidon2(zero[i-1], zero[i-1])`, for `i <= depth`.
#[must_use]
pub fn zero_hashes(depth: usize) -> Vec<Fr> {
    let mut hashes = Vec::with_capacity(depth + 1);
    hashes.push(Fr::zero());
    for i in 1..=depth {
        let below = hashes[i - 1];
        hashes.push(poseidon2(below, below));
    }
    hashes
}

impl MerkleTree {
    /// Create an empty tree of the given depth.
    ///
    /// # Arguments
    /// * `depth` - Number of levels above the leaves (at most 64)
    pub fn new(depth: usize) -> Self {
        let zero_hashes: Arc<[Fr]> = zero_hashes(depth).into();
        let root = Arc::new(MerkleNode::Empty {
            depth,
            zero_hashes: Arc::clone(&zero_hashes),
        });
        MerkleTree {
            depth,
            zero_hashes,
            root,
        }
    }

    /// Build a tree with `leaves` stored at indices `0..leaves.len()`.
    pub fn with_leaves(depth: usize, leaves: &[Fr]) -> Result<Self> {
        let mut tree = Self::new(depth);
        for (index, leaf) in leaves.iter().enumerate() {
            tree.checked_update(index as u64, *leaf)?;
        }
        Ok(tree)
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> Fr {
        self.root.value()
    }

    /// Zero hash at `level` (0 = empty leaf).
    #[must_use]
    pub fn zero_hash(&self, level: usize) -> Fr {
        self.zero_hashes[level]
    }

    /// Number of addressable leaves, saturating at `u64::MAX` for depth 64.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        if self.depth >= 64 {
            u64::MAX
        } else {
            1u64 << self.depth
        }
    }

    /// Set the leaf at `index` and return the sibling path, leaf level first.
    ///
    /// Only the low `depth` bits of `index` are used.
    pub fn update(&mut self, index: u64, leaf: Fr) -> Vec<Fr> {
        let mut siblings = Vec::with_capacity(self.depth);
        let new_root = update_node(&self.root, self.depth, index, leaf, &mut siblings);
        self.root = new_root;
        siblings.reverse();
        siblings
    }

    /// Like [`MerkleTree::update`] but rejects indices outside the tree.
    pub fn checked_update(&mut self, index: u64, leaf: Fr) -> Result<Vec<Fr>> {
        self.check_index(index)?;
        Ok(self.update(index, leaf))
    }

    /// Current value of the leaf at `index`.
    #[must_use]
    pub fn leaf(&self, index: u64) -> Fr {
        let mut node = Arc::clone(&self.root);
        for level in (0..self.depth).rev() {
            if let MerkleNode::Empty { .. } = node.as_ref() {
                return Fr::zero();
            }
            let (left, right) = node.children();
            node = if bit(index, level) { right } else { left };
        }
        node.value()
    }

    /// Sibling path of the leaf at `index`, leaf level first.
    #[must_use]
    pub fn proof(&self, index: u64) -> Vec<Fr> {
        let mut siblings = Vec::with_capacity(self.depth);
        let mut node = Arc::clone(&self.root);
        for level in (0..self.depth).rev() {
            let (left, right) = node.children();
            if bit(index, level) {
                siblings.push(left.value());
                node = right;
            } else {
                siblings.push(right.value());
                node = left;
            }
        }
        siblings.reverse();
        siblings
    }

    /// Fold `leaf` up through `proof`, the native twin of the in-circuit root gadget.
    #[must_use]
    pub fn compute_root(leaf: Fr, index: u64, proof: &[Fr]) -> Fr {
        proof
            .iter()
            .enumerate()
            .fold(leaf, |acc, (level, sibling)| {
                if bit(index, level) {
                    poseidon2(*sibling, acc)
                } else {
                    poseidon2(acc, *sibling)
                }
            })
    }

    fn check_index(&self, index: u64) -> Result<()> {
        if self.depth < 64 && index >= (1u64 << self.depth) {
            return Err(ProverError::shape(format!(
                "leaf index {index} does not fit in a tree of depth {}",
                self.depth
            )));
        }
        Ok(())
    }
}

#[inline]
fn bit(index: u64, level: usize) -> bool {
    level < 64 && (index >> level) & 1 == 1
}

fn update_node(
    node: &Arc<MerkleNode>,
    depth: usize,
    index: u64,
    leaf: Fr,
    siblings: &mut Vec<Fr>,
) -> Arc<MerkleNode> {
    if depth == 0 {
        return Arc::new(MerkleNode::Leaf(leaf));
    }

    let (left, right) = node.children();
    let (left, right) = if bit(index, depth - 1) {
        siblings.push(left.value());
        let right = update_node(&right, depth - 1, index, leaf, siblings);
        (left, right)
    } else {
        siblings.push(right.value());
        let left = update_node(&left, depth - 1, index, leaf, siblings);
        (left, right)
    };

    Arc::new(MerkleNode::Branch {
        depth,
        value: poseidon2(left.value(), right.value()),
        left,
        right,
    })
}

impl fmt::Display for MerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerkleTree:\n  Depth: {}\n  Root: {}",
            self.depth,
            field_to_hex(&self.root())
        )
    }
}
