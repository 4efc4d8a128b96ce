use crate::circuit::{NonInclusionAccounts, ProofCircuit, ProverVersion};
use crate::error::Result;
use crate::gadgets;
use crate::types::NonInclusionParameters;
use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Proves each value falls strictly inside a gap leaf of its indexed tree.
///
/// Public inputs: `roots[n]` followed by `values[n]`. Gap leaves are
/// `Poseidon3(lower, next_index, upper)`.
#[derive(Debug, Clone)]
pub struct NonInclusionCircuit {
    pub accounts: NonInclusionAccounts,
}

impl NonInclusionCircuit {
    pub fn blank(height: usize, count: usize) -> Self {
        NonInclusionCircuit {
            accounts: NonInclusionAccounts::blank(height, count),
        }
    }

    pub fn from_parameters(
        params: &NonInclusionParameters,
        height: usize,
        count: usize,
    ) -> Result<Self> {
        Ok(NonInclusionCircuit {
            accounts: NonInclusionAccounts::from_inputs(&params.new_addresses, height, count)?,
        })
    }
}

impl ConstraintSynthesizer<Fr> for NonInclusionCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let roots = gadgets::publics(&cs, &self.accounts.roots)?;
        let values = gadgets::publics(&cs, &self.accounts.values)?;
        self.accounts
            .constrain(&cs, ProverVersion::V1, &roots, &values)
    }
}

impl ProofCircuit for NonInclusionCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        [self.accounts.roots.clone(), self.accounts.values.clone()].concat()
    }
}
