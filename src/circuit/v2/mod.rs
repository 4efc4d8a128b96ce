//! Compressed layout: a single public input hash per proof.

mod combined;
mod inclusion;
mod non_inclusion;

pub use combined::CombinedCircuit;
pub use inclusion::InclusionCircuit;
pub use non_inclusion::NonInclusionCircuit;
