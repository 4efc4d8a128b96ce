use crate::circuit::{InclusionAccounts, ProofCircuit};
use crate::error::Result;
use crate::gadgets;
use crate::types::InclusionParameters;
use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Proves each leaf is stored under its root.
///
/// Public inputs: `roots[n]` followed by `leaves[n]`.
#[derive(Debug, Clone)]
pub struct InclusionCircuit {
    pub accounts: InclusionAccounts,
}

impl InclusionCircuit {
    pub fn blank(height: usize, count: usize) -> Self {
        InclusionCircuit {
            accounts: InclusionAccounts::blank(height, count),
        }
    }

    pub fn from_parameters(
        params: &InclusionParameters,
        height: usize,
        count: usize,
    ) -> Result<Self> {
        Ok(InclusionCircuit {
            accounts: InclusionAccounts::from_inputs(
                &params.input_compressed_accounts,
                height,
                count,
            )?,
        })
    }
}

impl ConstraintSynthesizer<Fr> for InclusionCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let roots = gadgets::publics(&cs, &self.accounts.roots)?;
        let leaves = gadgets::publics(&cs, &self.accounts.leaves)?;
        self.accounts.constrain(&cs, &roots, &leaves)
    }
}

impl ProofCircuit for InclusionCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        [self.accounts.roots.clone(), self.accounts.leaves.clone()].concat()
    }
}
