//! Error taxonomy for witness construction, proving and key handling.

use ark_relations::r1cs::SynthesisError;
use ark_serialize::SerializationError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors returned across the proving boundary.
///
/// Validation failures (`ShapeMismatch`, `Witness`) are raised before any
/// constraint-system work starts. `ConstraintUnsatisfied` carries
/// no detail about which constraint failed.
#[derive(Debug, Error)]
pub enum ProverError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid witness: {0}")]
    Witness(String),

    #[error("witness does not satisfy the circuit constraints")]
    ConstraintUnsatisfied,

    #[error("setup failed: {0}")]
    Setup(String),

    #[error("proving failed: {0}")]
    Proving(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("failed to load key file {}: {reason}", path.display())]
    KeyLoad { path: PathBuf, reason: String },

    #[error("invalid tree operation: {0}")]
    Tree(String),
}

impl ProverError {
    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        ProverError::ShapeMismatch(msg.into())
    }

    pub(crate) fn key_load(path: &Path, reason: impl ToString) -> Self {
        ProverError::KeyLoad {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// `true` for errors caused by the caller's input rather than the backend.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ProverError::ShapeMismatch(_)
                | ProverError::Witness(_)
                | ProverError::ConstraintUnsatisfied
        )
    }
}

impl From<SynthesisError> for ProverError {
    fn from(err: SynthesisError) -> Self {
        ProverError::Proving(err.to_string())
    }
}

impl From<SerializationError> for ProverError {
    fn from(err: SerializationError) -> Self {
        ProverError::Verification(err.to_string())
    }
}

pub type Result<T, E = ProverError> = std::result::Result<T, E>;

/// Checks that a per-slot vector has the length the shape requires.
pub(crate) fn ensure_len(name: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(ProverError::shape(format!(
            "{name}: expected {expected} elements, got {actual}"
        )));
    }
    Ok(())
}

/// Checks every inner vector (Merkle proof) against the tree height.
pub(crate) fn ensure_proof_lengths<T>(name: &str, proofs: &[Vec<T>], height: usize) -> Result<()> {
    for (i, proof) in proofs.iter().enumerate() {
        if proof.len() != height {
            return Err(ProverError::shape(format!(
                "{name}[{i}]: expected {height} siblings, got {}",
                proof.len()
            )));
        }
    }
    Ok(())
}
