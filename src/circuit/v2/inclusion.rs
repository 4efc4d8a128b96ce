use crate::circuit::{InclusionAccounts, ProofCircuit};
use crate::error::Result;
use crate::gadgets::{self, two_stream_hash_chain};
use crate::types::InclusionParameters;
use ark_bn254::Fr;
use ark_ff::Zero;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Inclusion with one public input, `two_stream_hash_chain(roots, leaves)`.
#[derive(Debug, Clone)]
pub struct InclusionCircuit {
    pub public_input_hash: Fr,
    pub accounts: InclusionAccounts,
}

impl InclusionCircuit {
    pub fn blank(height: usize, count: usize) -> Self {
        InclusionCircuit {
            public_input_hash: Fr::zero(),
            accounts: InclusionAccounts::blank(height, count),
        }
    }

    pub fn from_parameters(
        params: &InclusionParameters,
        height: usize,
        count: usize,
    ) -> Result<Self> {
        let accounts =
            InclusionAccounts::from_inputs(&params.input_compressed_accounts, height, count)?;
        Ok(InclusionCircuit {
            public_input_hash: params.resolved_public_input_hash()?,
            accounts,
        })
    }
}

impl ConstraintSynthesizer<Fr> for InclusionCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let public_input_hash = gadgets::public(&cs, self.public_input_hash)?;
        let roots = gadgets::witnesses(&cs, &self.accounts.roots)?;
        let leaves = gadgets::witnesses(&cs, &self.accounts.leaves)?;

        self.accounts.constrain(&cs, &roots, &leaves)?;
        two_stream_hash_chain(&roots, &leaves)?.enforce_equal(&public_input_hash)
    }
}

impl ProofCircuit for InclusionCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}
