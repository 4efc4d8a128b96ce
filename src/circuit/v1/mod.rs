//! Legacy layout: roots, leaves and values are public inputs directly.

mod combined;
mod inclusion;
mod non_inclusion;

pub use combined::CombinedCircuit;
pub use inclusion::InclusionCircuit;
pub use non_inclusion::NonInclusionCircuit;
