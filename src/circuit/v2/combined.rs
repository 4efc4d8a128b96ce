use crate::circuit::{InclusionAccounts, NonInclusionAccounts, ProofCircuit, ProverVersion};
use crate::error::Result;
use crate::gadgets::{self, poseidon2, two_stream_hash_chain};
use crate::types::CombinedParameters;
use ark_bn254::Fr;
use ark_ff::Zero;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Combined proof whose public input is
/// `Poseidon2(inclusion_chain, non_inclusion_chain)`.
#[derive(Debug, Clone)]
pub struct CombinedCircuit {
    pub public_input_hash: Fr,
    pub inclusion: InclusionAccounts,
    pub non_inclusion: NonInclusionAccounts,
}

impl CombinedCircuit {
    pub fn blank(
        inclusion_height: usize,
        inclusion_count: usize,
        non_inclusion_height: usize,
        non_inclusion_count: usize,
    ) -> Self {
        CombinedCircuit {
            public_input_hash: Fr::zero(),
            inclusion: InclusionAccounts::blank(inclusion_height, inclusion_count),
            non_inclusion: NonInclusionAccounts::blank(non_inclusion_height, non_inclusion_count),
        }
    }

    pub fn from_parameters(
        params: &CombinedParameters,
        inclusion_height: usize,
        inclusion_count: usize,
        non_inclusion_height: usize,
        non_inclusion_count: usize,
    ) -> Result<Self> {
        let inclusion = InclusionAccounts::from_inputs(
            &params.input_compressed_accounts,
            inclusion_height,
            inclusion_count,
        )?;
        let non_inclusion = NonInclusionAccounts::from_inputs(
            &params.new_addresses,
            non_inclusion_height,
            non_inclusion_count,
        )?;
        Ok(CombinedCircuit {
            public_input_hash: params.resolved_public_input_hash()?,
            inclusion,
            non_inclusion,
        })
    }
}

impl ConstraintSynthesizer<Fr> for CombinedCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let public_input_hash = gadgets::public(&cs, self.public_input_hash)?;

        let inclusion_roots = gadgets::witnesses(&cs, &self.inclusion.roots)?;
        let leaves = gadgets::witnesses(&cs, &self.inclusion.leaves)?;
        self.inclusion.constrain(&cs, &inclusion_roots, &leaves)?;

        let non_inclusion_roots = gadgets::witnesses(&cs, &self.non_inclusion.roots)?;
        let values = gadgets::witnesses(&cs, &self.non_inclusion.values)?;
        self.non_inclusion
            .constrain(&cs, ProverVersion::V2, &non_inclusion_roots, &values)?;

        let inclusion_chain = two_stream_hash_chain(&inclusion_roots, &leaves)?;
        let non_inclusion_chain = two_stream_hash_chain(&non_inclusion_roots, &values)?;
        poseidon2(&inclusion_chain, &non_inclusion_chain)?.enforce_equal(&public_input_hash)
    }
}

impl ProofCircuit for CombinedCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}
