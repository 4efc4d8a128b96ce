//! Groth16 prover for compressed-state Merkle trees
//!
//! This library proves statements about Poseidon Merkle trees over BN254 and
//! produces Groth16 proofs small enough for on-chain verification.
//!
//! # Components
//!
//! - [`MerkleTree`]: sparse, persistent Poseidon Merkle tree
//! - [`IndexedMerkleTree`]: sorted linked list of values for non-membership
//! - [`gadgets`]: Poseidon, range, Merkle path and hash-chain constraints
//! - [`circuit`]: inclusion, non-inclusion and combined circuits (v1 and v2
//!   layouts) and the batch append, update and address-append circuits
//! - [`ProvingSystem`]: setup, prove and verify for one circuit shape
//! - [`key_file`]: binary key file format
//! - [`KeyManager`]: single-flight cache of proving systems
//!
//! # Example
//!
//! ```no_run
//! use zkp_compressed_state::{test_params, MerkleShape, ProverVersion, ProvingSystem, SystemShape};
//!
//! let shape = SystemShape::Merkle(MerkleShape::inclusion(ProverVersion::V2, 32, 1));
//! let system = ProvingSystem::setup(&shape).unwrap();
//! let request = test_params::request_for_shape(&shape).unwrap();
//! let proof = system.prove(&request).unwrap();
//! assert!(system.verify(&request.public_inputs().unwrap(), &proof).unwrap());
//! ```

pub mod circuit;
pub mod config;
pub mod error;
pub mod gadgets;
pub mod indexed;
pub mod key_file;
pub mod keys;
pub mod merkle;
pub mod system;
pub mod test_params;
pub mod types;
pub mod utils;


pub use circuit::{BatchCircuitType, CircuitType, ProofCircuit, ProverVersion};
pub use config::Config;
pub use error::{ProverError, Result};
pub use indexed::{IndexedElement, IndexedMerkleTree};
pub use key_file::KeyFileKind;
pub use keys::{KeyFetcher, KeyManager, RunMode};
pub use merkle::MerkleTree;
pub use system::{BatchShape, MerkleShape, Proof, ProvingSystem, SystemShape};
pub use types::{ProofJson, ProofRequest};
pub use utils::{field_from_hex, field_to_hex, poseidon_hash};

/// Values in an indexed tree, and the gaps around them, are range-checked to
/// this many bits. The greatest element points at `2^248 - 1`.
pub const ADDRESS_RANGE_BITS: usize = 248;

/// Height of the legacy state and address trees. Requests at this height
/// without an explicit version use the v1 layout.
pub const LEGACY_STATE_TREE_HEIGHT: usize = 26;

/// Height of the batched state trees.
pub const STATE_TREE_HEIGHT: usize = 32;

/// Height of the batched address trees.
pub const ADDRESS_TREE_HEIGHT: usize = 40;
