//! Circuit family: inclusion, non-inclusion and combined proofs in two layouts,
//! plus the three batched tree mutations.
//!
//! # Layouts
//!
//! - [`v1`]: every root, leaf and value is its own public input. Indexed
//!   leaves commit to `(value, next_index, next_value)`.
//! - [`v2`]: a single public input, a Poseidon hash chain over the per-slot
//!   values. Indexed leaves commit to `(value, next_value)`.
//!
//! The batch circuits only exist in the v2 layout.
//!
//! Every circuit has a `blank` constructor (zero witness, used for key
//! generation) and a `from_parameters` constructor that validates the request
//! against the shape before any constraint is generated.

pub mod batch_address_append;
pub mod batch_append;
pub mod batch_update;
pub mod v1;
pub mod v2;

pub use batch_address_append::BatchAddressAppendCircuit;
pub use batch_append::BatchAppendCircuit;
pub use batch_update::BatchUpdateCircuit;

use crate::error::{ensure_len, ensure_proof_lengths, ProverError, Result};
use crate::gadgets::{self, legacy_leaf_hash, leaf_hash, merkle_root, to_bits_le};
use crate::types::{InclusionInputs, NonInclusionInputs};
use crate::LEGACY_STATE_TREE_HEIGHT;
use ark_bn254::Fr;
use ark_ff::Zero;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public-input layout of the Merkle circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProverVersion {
    /// Direct public inputs.
    V1,
    /// Hash-chain compressed public input.
    V2,
}

impl ProverVersion {
    /// Version implied by a tree height when the request does not name one.
    #[must_use]
    pub fn for_height(height: usize) -> Self {
        if height == LEGACY_STATE_TREE_HEIGHT {
            ProverVersion::V1
        } else {
            ProverVersion::V2
        }
    }
}

impl TryFrom<u8> for ProverVersion {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(ProverVersion::V1),
            2 => Ok(ProverVersion::V2),
            other => Err(format!("unknown prover version {other}")),
        }
    }
}

impl From<ProverVersion> for u8 {
    fn from(version: ProverVersion) -> Self {
        match version {
            ProverVersion::V1 => 1,
            ProverVersion::V2 => 2,
        }
    }
}

impl fmt::Display for ProverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", u8::from(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CircuitType {
    #[serde(rename = "inclusion")]
    Inclusion,
    #[serde(rename = "non-inclusion")]
    NonInclusion,
    #[serde(rename = "combined")]
    Combined,
    #[serde(rename = "append")]
    BatchAppend,
    #[serde(rename = "update")]
    BatchUpdate,
    #[serde(rename = "address-append")]
    BatchAddressAppend,
}

impl CircuitType {
    /// Name used in requests and key file names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitType::Inclusion => "inclusion",
            CircuitType::NonInclusion => "non-inclusion",
            CircuitType::Combined => "combined",
            CircuitType::BatchAppend => "append",
            CircuitType::BatchUpdate => "update",
            CircuitType::BatchAddressAppend => "address-append",
        }
    }

    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(
            self,
            CircuitType::BatchAppend | CircuitType::BatchUpdate | CircuitType::BatchAddressAppend
        )
    }
}

impl fmt::Display for CircuitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CircuitType {
    type Err = ProverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inclusion" => Ok(CircuitType::Inclusion),
            "non-inclusion" => Ok(CircuitType::NonInclusion),
            "combined" => Ok(CircuitType::Combined),
            "append" => Ok(CircuitType::BatchAppend),
            "update" => Ok(CircuitType::BatchUpdate),
            "address-append" => Ok(CircuitType::BatchAddressAppend),
            other => Err(ProverError::shape(format!("unknown circuit type '{other}'"))),
        }
    }
}

/// The batched mutations; always v2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BatchCircuitType {
    #[serde(rename = "append")]
    Append,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "address-append")]
    AddressAppend,
}

impl From<BatchCircuitType> for CircuitType {
    fn from(kind: BatchCircuitType) -> Self {
        match kind {
            BatchCircuitType::Append => CircuitType::BatchAppend,
            BatchCircuitType::Update => CircuitType::BatchUpdate,
            BatchCircuitType::AddressAppend => CircuitType::BatchAddressAppend,
        }
    }
}

impl fmt::Display for BatchCircuitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(CircuitType::from(*self).as_str())
    }
}

/// A circuit that can be set up, proven and verified.
pub trait ProofCircuit: ConstraintSynthesizer<Fr> + Clone {
    /// Public inputs in allocation order, as the verifier must supply them.
    fn public_inputs(&self) -> Vec<Fr>;
}

/// Rejects zero heights and zero counts.
pub(crate) fn ensure_shape(what: &str, height: usize, count: usize) -> Result<()> {
    if height == 0 {
        return Err(ProverError::shape(format!("{what}: tree height must be non-zero")));
    }
    if count == 0 {
        return Err(ProverError::shape(format!("{what}: count must be non-zero")));
    }
    Ok(())
}

pub(crate) fn ensure_index_fits(what: &str, index: u64, height: usize) -> Result<()> {
    if height < 64 && index >> height != 0 {
        return Err(ProverError::shape(format!(
            "{what}: index {index} does not fit in {height} bits"
        )));
    }
    Ok(())
}

/// Allocates `index` and returns its `height` path bits.
pub(crate) fn path_bits(
    cs: &ConstraintSystemRef<Fr>,
    index: u64,
    height: usize,
) -> std::result::Result<(FpVar<Fr>, Vec<Boolean<Fr>>), SynthesisError> {
    let index = gadgets::witness(cs, Fr::from(index))?;
    let bits = to_bits_le(&index, height)?;
    Ok((index, bits))
}

/// Per-account witness of the inclusion circuits.
#[derive(Debug, Clone)]
pub struct InclusionAccounts {
    pub height: usize,
    pub roots: Vec<Fr>,
    pub leaves: Vec<Fr>,
    pub path_indices: Vec<u64>,
    pub path_elements: Vec<Vec<Fr>>,
}

impl InclusionAccounts {
    pub fn blank(height: usize, count: usize) -> Self {
        InclusionAccounts {
            height,
            roots: vec![Fr::zero(); count],
            leaves: vec![Fr::zero(); count],
            path_indices: vec![0; count],
            path_elements: vec![vec![Fr::zero(); height]; count],
        }
    }

    pub fn from_inputs(inputs: &[InclusionInputs], height: usize, count: usize) -> Result<Self> {
        ensure_shape("inclusion", height, count)?;
        ensure_len("inputCompressedAccounts", inputs.len(), count)?;
        let path_elements: Vec<Vec<Fr>> =
            inputs.iter().map(|i| i.path_elements.clone()).collect();
        ensure_proof_lengths("pathElements", &path_elements, height)?;
        for input in inputs {
            ensure_index_fits("inclusion pathIndex", input.path_index, height)?;
        }

        Ok(InclusionAccounts {
            height,
            roots: inputs.iter().map(|i| i.root).collect(),
            leaves: inputs.iter().map(|i| i.leaf).collect(),
            path_indices: inputs.iter().map(|i| i.path_index).collect(),
            path_elements,
        })
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.roots.len()
    }

    /// `merkle_root(leaf_i, bits(path_index_i), siblings_i) == root_i` for each account.
    pub(crate) fn constrain(
        &self,
        cs: &ConstraintSystemRef<Fr>,
        roots: &[FpVar<Fr>],
        leaves: &[FpVar<Fr>],
    ) -> std::result::Result<(), SynthesisError> {
        for i in 0..self.count() {
            let (_, bits) = path_bits(cs, self.path_indices[i], self.height)?;
            let siblings = gadgets::witnesses(cs, &self.path_elements[i])?;
            merkle_root(&leaves[i], &bits, &siblings)?.enforce_equal(&roots[i])?;
        }
        Ok(())
    }
}

/// Per-address witness of the non-inclusion circuits.
#[derive(Debug, Clone)]
pub struct NonInclusionAccounts {
    pub height: usize,
    pub roots: Vec<Fr>,
    pub values: Vec<Fr>,
    pub lower_values: Vec<Fr>,
    pub upper_values: Vec<Fr>,
    pub next_indices: Vec<u64>,
    pub path_indices: Vec<u64>,
    pub path_elements: Vec<Vec<Fr>>,
}

impl NonInclusionAccounts {
    pub fn blank(height: usize, count: usize) -> Self {
        NonInclusionAccounts {
            height,
            roots: vec![Fr::zero(); count],
            values: vec![Fr::zero(); count],
            lower_values: vec![Fr::zero(); count],
            upper_values: vec![Fr::zero(); count],
            next_indices: vec![0; count],
            path_indices: vec![0; count],
            path_elements: vec![vec![Fr::zero(); height]; count],
        }
    }

    pub fn from_inputs(inputs: &[NonInclusionInputs], height: usize, count: usize) -> Result<Self> {
        ensure_shape("non-inclusion", height, count)?;
        ensure_len("newAddresses", inputs.len(), count)?;
        let path_elements: Vec<Vec<Fr>> =
            inputs.iter().map(|i| i.path_elements.clone()).collect();
        ensure_proof_lengths("pathElements", &path_elements, height)?;
        for input in inputs {
            ensure_index_fits("non-inclusion pathIndex", input.path_index, height)?;
        }

        Ok(NonInclusionAccounts {
            height,
            roots: inputs.iter().map(|i| i.root).collect(),
            values: inputs.iter().map(|i| i.value).collect(),
            lower_values: inputs.iter().map(|i| i.leaf_lower_range_value).collect(),
            upper_values: inputs.iter().map(|i| i.leaf_higher_range_value).collect(),
            next_indices: inputs.iter().map(|i| i.next_index).collect(),
            path_indices: inputs.iter().map(|i| i.path_index).collect(),
            path_elements,
        })
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.roots.len()
    }

    /// Range-checks each value against its gap leaf and authenticates the
    /// leaf under the matching root.
    pub(crate) fn constrain(
        &self,
        cs: &ConstraintSystemRef<Fr>,
        version: ProverVersion,
        roots: &[FpVar<Fr>],
        values: &[FpVar<Fr>],
    ) -> std::result::Result<(), SynthesisError> {
        for i in 0..self.count() {
            let lower = gadgets::witness(cs, self.lower_values[i])?;
            let upper = gadgets::witness(cs, self.upper_values[i])?;
            let leaf = match version {
                ProverVersion::V1 => {
                    let next_index = gadgets::witness(cs, Fr::from(self.next_indices[i]))?;
                    legacy_leaf_hash(&lower, &next_index, &upper, &values[i])?
                }
                ProverVersion::V2 => leaf_hash(&lower, &upper, &values[i])?,
            };

            let (_, bits) = path_bits(cs, self.path_indices[i], self.height)?;
            let siblings = gadgets::witnesses(cs, &self.path_elements[i])?;
            merkle_root(&leaf, &bits, &siblings)?.enforce_equal(&roots[i])?;
        }
        Ok(())
    }
}
