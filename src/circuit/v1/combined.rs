use crate::circuit::{InclusionAccounts, NonInclusionAccounts, ProofCircuit, ProverVersion};
use crate::error::Result;
use crate::gadgets;
use crate::types::CombinedParameters;
use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

/// Inclusion and non-inclusion in one proof; the two sets are independent.
///
/// Public inputs: inclusion roots, inclusion leaves, non-inclusion roots,
/// non-inclusion values.
#[derive(Debug, Clone)]
pub struct CombinedCircuit {
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
        Ok(CombinedCircuit {
            inclusion: InclusionAccounts::from_inputs(
                &params.input_compressed_accounts,
                inclusion_height,
                inclusion_count,
            )?,
            non_inclusion: NonInclusionAccounts::from_inputs(
                &params.new_addresses,
                non_inclusion_height,
                non_inclusion_count,
            )?,
        })
    }
}

impl ConstraintSynthesizer<Fr> for CombinedCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let inclusion_roots = gadgets::publics(&cs, &self.inclusion.roots)?;
        let leaves = gadgets::publics(&cs, &self.inclusion.leaves)?;
        let non_inclusion_roots = gadgets::publics(&cs, &self.non_inclusion.roots)?;
        let values = gadgets::publics(&cs, &self.non_inclusion.values)?;

        self.inclusion.constrain(&cs, &inclusion_roots, &leaves)?;
        self.non_inclusion
            .constrain(&cs, ProverVersion::V1, &non_inclusion_roots, &values)
    }
}

impl ProofCircuit for CombinedCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        [
            self.inclusion.roots.clone(),
            self.inclusion.leaves.clone(),
            self.non_inclusion.roots.clone(),
            self.non_inclusion.values.clone(),
        ]
        .concat()
    }
}
