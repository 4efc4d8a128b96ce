use crate::circuit::{NonInclusionAccounts, ProofCircuit, ProverVersion};
use crate::error::Result;
use crate::gadgets::{self, two_stream_hash_chain};
use crate::types::NonInclusionParameters;
use ark_bn254::Fr;
use ark_ff::Zero;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Non-inclusion with one public input, `two_stream_hash_chain(roots, values)`.
///
/// Gap leaves are `Poseidon2(lower, upper)`.
#[derive(Debug, Clone)]
pub struct NonInclusionCircuit {
    pub public_input_hash: Fr,
    pub accounts: NonInclusionAccounts,
}

impl NonInclusionCircuit {
    pub fn blank(height: usize, count: usize) -> Self {
        NonInclusionCircuit {
            public_input_hash: Fr::zero(),
            accounts: NonInclusionAccounts::blank(height, count),
        }
    }

    pub fn from_parameters(
        params: &NonInclusionParameters,
        height: usize,
        count: usize,
    ) -> Result<Self> {
        let accounts = NonInclusionAccounts::from_inputs(&params.new_addresses, height, count)?;
        Ok(NonInclusionCircuit {
            public_input_hash: params.resolved_public_input_hash()?,
            accounts,
        })
    }
}

impl ConstraintSynthesizer<Fr> for NonInclusionCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let public_input_hash = gadgets::public(&cs, self.public_input_hash)?;
        let roots = gadgets::witnesses(&cs, &self.accounts.roots)?;
        let values = gadgets::witnesses(&cs, &self.accounts.values)?;

        self.accounts
            .constrain(&cs, ProverVersion::V2, &roots, &values)?;
        two_stream_hash_chain(&roots, &values)?.enforce_equal(&public_input_hash)
    }
}

impl ProofCircuit for NonInclusionCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}
