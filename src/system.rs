//! Proving-system lifecycle: shapes, Groth16 setup, proving and verification.
//!
//! A proving system is created once per shape, either by [`ProvingSystem::setup`]
//! or by reading a key file, and is immutable afterwards. Provers share it
//! through an `Arc`.

use crate::circuit::{
    v1, v2, BatchAddressAppendCircuit, BatchAppendCircuit, BatchCircuitType, BatchUpdateCircuit,
    CircuitType, ProofCircuit, ProverVersion,
};
use crate::error::{ProverError, Result};
use crate::types::{ProofJson, ProofRequest};
use crate::utils::{field_to_hex, prime_field_from_hex, prime_field_to_hex};
use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::Zero;
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, ProvingKey, VerifyingKey};
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, OptimizationGoal, SynthesisError,
    SynthesisMode,
};
use ark_snark::SNARK;
use log::{debug, info};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Shape of an inclusion, non-inclusion or combined system.
///
/// The circuit type follows from which account counts are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MerkleShape {
    pub version: ProverVersion,
    pub inclusion_tree_height: u32,
    pub inclusion_account_count: u32,
    pub non_inclusion_tree_height: u32,
    pub non_inclusion_account_count: u32,
}

impl MerkleShape {
    #[must_use]
    pub fn inclusion(version: ProverVersion, height: u32, count: u32) -> Self {
        MerkleShape {
            version,
            inclusion_tree_height: height,
            inclusion_account_count: count,
            non_inclusion_tree_height: 0,
            non_inclusion_account_count: 0,
        }
    }

    #[must_use]
    pub fn non_inclusion(version: ProverVersion, height: u32, count: u32) -> Self {
        MerkleShape {
            version,
            inclusion_tree_height: 0,
            inclusion_account_count: 0,
            non_inclusion_tree_height: height,
            non_inclusion_account_count: count,
        }
    }

    #[must_use]
    pub fn combined(
        version: ProverVersion,
        inclusion_height: u32,
        inclusion_count: u32,
        non_inclusion_height: u32,
        non_inclusion_count: u32,
    ) -> Self {
        MerkleShape {
            version,
            inclusion_tree_height: inclusion_height,
            inclusion_account_count: inclusion_count,
            non_inclusion_tree_height: non_inclusion_height,
            non_inclusion_account_count: non_inclusion_count,
        }
    }

    pub fn circuit_type(&self) -> Result<CircuitType> {
        match (
            self.inclusion_account_count > 0,
            self.non_inclusion_account_count > 0,
        ) {
            (true, false) => Ok(CircuitType::Inclusion),
            (false, true) => Ok(CircuitType::NonInclusion),
            (true, true) => Ok(CircuitType::Combined),
            (false, false) => Err(ProverError::shape(
                "merkle shape has no inclusion or non-inclusion accounts",
            )),
        }
    }

    /// Number of public inputs the verifying key must accept.
    #[must_use]
    pub fn public_input_count(&self) -> usize {
        match self.version {
            ProverVersion::V1 => {
                2 * (self.inclusion_account_count as usize
                    + self.non_inclusion_account_count as usize)
            }
            ProverVersion::V2 => 1,
        }
    }

    pub fn file_name(&self) -> Result<String> {
        let prefix = match self.version {
            ProverVersion::V1 => "v1_",
            ProverVersion::V2 => "",
        };
        let name = match self.circuit_type()? {
            CircuitType::Inclusion => format!(
                "inclusion_{}_{}",
                self.inclusion_tree_height, self.inclusion_account_count
            ),
            CircuitType::NonInclusion => format!(
                "non-inclusion_{}_{}",
                self.non_inclusion_tree_height, self.non_inclusion_account_count
            ),
            _ => format!(
                "combined_{}_{}_{}_{}",
                self.inclusion_tree_height,
                self.inclusion_account_count,
                self.non_inclusion_tree_height,
                self.non_inclusion_account_count
            ),
        };
        Ok(format!("{prefix}{name}.key"))
    }
}

/// Shape of a batch system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchShape {
    pub circuit_type: BatchCircuitType,
    pub tree_height: u32,
    pub batch_size: u32,
}

impl BatchShape {
    #[must_use]
    pub fn new(circuit_type: BatchCircuitType, tree_height: u32, batch_size: u32) -> Self {
        BatchShape {
            circuit_type,
            tree_height,
            batch_size,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.key",
            self.circuit_type, self.tree_height, self.batch_size
        )
    }
}

/// Cache key of the key manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SystemShape {
    Merkle(MerkleShape),
    Batch(BatchShape),
}

impl SystemShape {
    /// Shape required to prove `request`.
    pub fn for_request(request: &ProofRequest) -> Result<Self> {
        let to_u32 = |what: &str, n: usize| {
            u32::try_from(n).map_err(|_| ProverError::shape(format!("{what} {n} is too large")))
        };

        let shape = match request {
            ProofRequest::Inclusion(p) => SystemShape::Merkle(MerkleShape::inclusion(
                p.version(),
                to_u32("tree height", p.height())?,
                to_u32("account count", p.count())?,
            )),
            ProofRequest::NonInclusion(p) => SystemShape::Merkle(MerkleShape::non_inclusion(
                p.version(),
                to_u32("tree height", p.height())?,
                to_u32("account count", p.count())?,
            )),
            ProofRequest::Combined(p) => SystemShape::Merkle(MerkleShape::combined(
                p.version(),
                to_u32("tree height", p.inclusion().height())?,
                to_u32("account count", p.input_compressed_accounts.len())?,
                to_u32("tree height", p.non_inclusion().height())?,
                to_u32("account count", p.new_addresses.len())?,
            )),
            ProofRequest::BatchAppend(p) => SystemShape::Batch(BatchShape::new(
                BatchCircuitType::Append,
                p.height,
                p.batch_size,
            )),
            ProofRequest::BatchUpdate(p) => SystemShape::Batch(BatchShape::new(
                BatchCircuitType::Update,
                p.height,
                p.batch_size,
            )),
            ProofRequest::BatchAddressAppend(p) => SystemShape::Batch(BatchShape::new(
                BatchCircuitType::AddressAppend,
                p.tree_height,
                p.batch_size,
            )),
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Rejects zero heights and counts.
    pub fn validate(&self) -> Result<()> {
        match self {
            SystemShape::Merkle(shape) => {
                let circuit_type = shape.circuit_type()?;
                if shape.inclusion_account_count > 0 && shape.inclusion_tree_height == 0 {
                    return Err(ProverError::shape(format!(
                        "{circuit_type}: inclusion tree height must be non-zero"
                    )));
                }
                if shape.non_inclusion_account_count > 0 && shape.non_inclusion_tree_height == 0 {
                    return Err(ProverError::shape(format!(
                        "{circuit_type}: non-inclusion tree height must be non-zero"
                    )));
                }
                Ok(())
            }
            SystemShape::Batch(shape) => {
                if shape.tree_height == 0 || shape.batch_size == 0 {
                    return Err(ProverError::shape(format!(
                        "{}: tree height and batch size must be non-zero",
                        shape.circuit_type
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn circuit_type(&self) -> Result<CircuitType> {
        match self {
            SystemShape::Merkle(shape) => shape.circuit_type(),
            SystemShape::Batch(shape) => Ok(shape.circuit_type.into()),
        }
    }

    #[must_use]
    pub fn public_input_count(&self) -> usize {
        match self {
            SystemShape::Merkle(shape) => shape.public_input_count(),
            SystemShape::Batch(_) => 1,
        }
    }

    pub fn file_name(&self) -> Result<String> {
        match self {
            SystemShape::Merkle(shape) => shape.file_name(),
            SystemShape::Batch(shape) => Ok(shape.file_name()),
        }
    }
}

impl From<MerkleShape> for SystemShape {
    fn from(shape: MerkleShape) -> Self {
        SystemShape::Merkle(shape)
    }
}

impl From<BatchShape> for SystemShape {
    fn from(shape: BatchShape) -> Self {
        SystemShape::Batch(shape)
    }
}

impl fmt::Display for SystemShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemShape::Merkle(s) => write!(
                f,
                "{} inclusion({}x{}) non-inclusion({}x{})",
                s.version,
                s.inclusion_tree_height,
                s.inclusion_account_count,
                s.non_inclusion_tree_height,
                s.non_inclusion_account_count
            ),
            SystemShape::Batch(s) => write!(
                f,
                "{} height {} batch {}",
                s.circuit_type, s.tree_height, s.batch_size
            ),
        }
    }
}

/// Layout of the compiled constraint system, recorded at setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConstraintSystemInfo {
    pub num_constraints: u64,
    pub num_instance_variables: u64,
    pub num_witness_variables: u64,
}

impl ConstraintSystemInfo {
    fn of(cs: &ConstraintSystemRef<Fr>) -> Self {
        ConstraintSystemInfo {
            num_constraints: cs.num_constraints() as u64,
            num_instance_variables: cs.num_instance_variables() as u64,
            num_witness_variables: cs.num_witness_variables() as u64,
        }
    }
}

/// Groth16 key material shared by both system kinds.
#[derive(Clone)]
pub struct KeyPair {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
    pub prepared_verifying_key: PreparedVerifyingKey<Bn254>,
    pub constraint_system: ConstraintSystemInfo,
}

impl KeyPair {
    pub fn new(
        proving_key: ProvingKey<Bn254>,
        verifying_key: VerifyingKey<Bn254>,
        constraint_system: ConstraintSystemInfo,
    ) -> Self {
        let prepared_verifying_key = prepare_verifying_key(&verifying_key);
        KeyPair {
            proving_key,
            verifying_key,
            prepared_verifying_key,
            constraint_system,
        }
    }

    /// Public inputs accepted by the verifying key.
    #[must_use]
    pub fn public_input_count(&self) -> usize {
        self.verifying_key.gamma_abc_g1.len().saturating_sub(1)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_inputs", &self.public_input_count())
            .field("constraint_system", &self.constraint_system)
            .finish_non_exhaustive()
    }
}

/// Inclusion / non-inclusion / combined system.
#[derive(Debug, Clone)]
pub struct MerkleProofSystem {
    pub shape: MerkleShape,
    pub keys: KeyPair,
}

/// Batch append / update / address-append system.
#[derive(Debug, Clone)]
pub struct BatchProofSystem {
    pub shape: BatchShape,
    pub keys: KeyPair,
}

#[derive(Debug, Clone)]
pub enum ProvingSystem {
    Merkle(MerkleProofSystem),
    Batch(BatchProofSystem),
}

/// Every concrete circuit, so setup and proving can dispatch on the shape.
#[derive(Clone)]
enum AnyCircuit {
    InclusionV1(v1::InclusionCircuit),
    NonInclusionV1(v1::NonInclusionCircuit),
    CombinedV1(v1::CombinedCircuit),
    InclusionV2(v2::InclusionCircuit),
    NonInclusionV2(v2::NonInclusionCircuit),
    CombinedV2(v2::CombinedCircuit),
    BatchAppend(BatchAppendCircuit),
    BatchUpdate(BatchUpdateCircuit),
    BatchAddressAppend(BatchAddressAppendCircuit),
}

impl AnyCircuit {
    fn blank(shape: &SystemShape) -> Result<Self> {
        shape.validate()?;
        let circuit = match shape {
            SystemShape::Merkle(s) => {
                let ih = s.inclusion_tree_height as usize;
                let ic = s.inclusion_account_count as usize;
                let nh = s.non_inclusion_tree_height as usize;
                let nc = s.non_inclusion_account_count as usize;
                match (s.version, s.circuit_type()?) {
                    (ProverVersion::V1, CircuitType::Inclusion) => {
                        AnyCircuit::InclusionV1(v1::InclusionCircuit::blank(ih, ic))
                    }
                    (ProverVersion::V1, CircuitType::NonInclusion) => {
                        AnyCircuit::NonInclusionV1(v1::NonInclusionCircuit::blank(nh, nc))
                    }
                    (ProverVersion::V1, _) => {
                        AnyCircuit::CombinedV1(v1::CombinedCircuit::blank(ih, ic, nh, nc))
                    }
                    (ProverVersion::V2, CircuitType::Inclusion) => {
                        AnyCircuit::InclusionV2(v2::InclusionCircuit::blank(ih, ic))
                    }
                    (ProverVersion::V2, CircuitType::NonInclusion) => {
                        AnyCircuit::NonInclusionV2(v2::NonInclusionCircuit::blank(nh, nc))
                    }
                    (ProverVersion::V2, _) => {
                        AnyCircuit::CombinedV2(v2::CombinedCircuit::blank(ih, ic, nh, nc))
                    }
                }
            }
            SystemShape::Batch(s) => {
                let height = s.tree_height as usize;
                let size = s.batch_size as usize;
                match s.circuit_type {
                    BatchCircuitType::Append => {
                        AnyCircuit::BatchAppend(BatchAppendCircuit::blank(height, size))
                    }
                    BatchCircuitType::Update => {
                        AnyCircuit::BatchUpdate(BatchUpdateCircuit::blank(height, size))
                    }
                    BatchCircuitType::AddressAppend => AnyCircuit::BatchAddressAppend(
                        BatchAddressAppendCircuit::blank(height, size),
                    ),
                }
            }
        };
        Ok(circuit)
    }

    fn from_request(shape: &SystemShape, request: &ProofRequest) -> Result<Self> {
        let mismatch = || {
            ProverError::shape(format!(
                "{} request cannot be proven by a {} system",
                request.circuit_type(),
                shape
            ))
        };

        match (shape, request) {
            (SystemShape::Merkle(s), ProofRequest::Inclusion(p))
                if s.circuit_type()? == CircuitType::Inclusion =>
            {
                let (h, n) = (s.inclusion_tree_height as usize, s.inclusion_account_count as usize);
                Ok(match s.version {
                    ProverVersion::V1 => {
                        AnyCircuit::InclusionV1(v1::InclusionCircuit::from_parameters(p, h, n)?)
                    }
                    ProverVersion::V2 => {
                        AnyCircuit::InclusionV2(v2::InclusionCircuit::from_parameters(p, h, n)?)
                    }
                })
            }
            (SystemShape::Merkle(s), ProofRequest::NonInclusion(p))
                if s.circuit_type()? == CircuitType::NonInclusion =>
            {
                let (h, n) = (
                    s.non_inclusion_tree_height as usize,
                    s.non_inclusion_account_count as usize,
                );
                Ok(match s.version {
                    ProverVersion::V1 => AnyCircuit::NonInclusionV1(
                        v1::NonInclusionCircuit::from_parameters(p, h, n)?,
                    ),
                    ProverVersion::V2 => AnyCircuit::NonInclusionV2(
                        v2::NonInclusionCircuit::from_parameters(p, h, n)?,
                    ),
                })
            }
            (SystemShape::Merkle(s), ProofRequest::Combined(p))
                if s.circuit_type()? == CircuitType::Combined =>
            {
                let ih = s.inclusion_tree_height as usize;
                let ic = s.inclusion_account_count as usize;
                let nh = s.non_inclusion_tree_height as usize;
                let nc = s.non_inclusion_account_count as usize;
                Ok(match s.version {
                    ProverVersion::V1 => AnyCircuit::CombinedV1(
                        v1::CombinedCircuit::from_parameters(p, ih, ic, nh, nc)?,
                    ),
                    ProverVersion::V2 => AnyCircuit::CombinedV2(
                        v2::CombinedCircuit::from_parameters(p, ih, ic, nh, nc)?,
                    ),
                })
            }
            (SystemShape::Batch(s), ProofRequest::BatchAppend(p))
                if s.circuit_type == BatchCircuitType::Append =>
            {
                Ok(AnyCircuit::BatchAppend(BatchAppendCircuit::from_parameters(
                    p,
                    s.tree_height as usize,
                    s.batch_size as usize,
                )?))
            }
            (SystemShape::Batch(s), ProofRequest::BatchUpdate(p))
                if s.circuit_type == BatchCircuitType::Update =>
            {
                Ok(AnyCircuit::BatchUpdate(BatchUpdateCircuit::from_parameters(
                    p,
                    s.tree_height as usize,
                    s.batch_size as usize,
                )?))
            }
            (SystemShape::Batch(s), ProofRequest::BatchAddressAppend(p))
                if s.circuit_type == BatchCircuitType::AddressAppend =>
            {
                Ok(AnyCircuit::BatchAddressAppend(
                    BatchAddressAppendCircuit::from_parameters(
                        p,
                        s.tree_height as usize,
                        s.batch_size as usize,
                    )?,
                ))
            }
            _ => Err(mismatch()),
        }
    }
}

impl ConstraintSynthesizer<Fr> for AnyCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> std::result::Result<(), SynthesisError> {
        match self {
            AnyCircuit::InclusionV1(c) => c.generate_constraints(cs),
            AnyCircuit::NonInclusionV1(c) => c.generate_constraints(cs),
            AnyCircuit::CombinedV1(c) => c.generate_constraints(cs),
            AnyCircuit::InclusionV2(c) => c.generate_constraints(cs),
            AnyCircuit::NonInclusionV2(c) => c.generate_constraints(cs),
            AnyCircuit::CombinedV2(c) => c.generate_constraints(cs),
            AnyCircuit::BatchAppend(c) => c.generate_constraints(cs),
            AnyCircuit::BatchUpdate(c) => c.generate_constraints(cs),
            AnyCircuit::BatchAddressAppend(c) => c.generate_constraints(cs),
        }
    }
}

impl ProofCircuit for AnyCircuit {
    fn public_inputs(&self) -> Vec<Fr> {
        match self {
            AnyCircuit::InclusionV1(c) => c.public_inputs(),
            AnyCircuit::NonInclusionV1(c) => c.public_inputs(),
            AnyCircuit::CombinedV1(c) => c.public_inputs(),
            AnyCircuit::InclusionV2(c) => c.public_inputs(),
            AnyCircuit::NonInclusionV2(c) => c.public_inputs(),
            AnyCircuit::CombinedV2(c) => c.public_inputs(),
            AnyCircuit::BatchAppend(c) => c.public_inputs(),
            AnyCircuit::BatchUpdate(c) => c.public_inputs(),
            AnyCircuit::BatchAddressAppend(c) => c.public_inputs(),
        }
    }
}

/// Synthesizes `circuit` in setup mode and returns its layout.
pub fn constraint_layout<C: ConstraintSynthesizer<Fr>>(circuit: C) -> Result<ConstraintSystemInfo> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    cs.set_mode(SynthesisMode::Setup);
    circuit
        .generate_constraints(cs.clone())
        .map_err(|e| ProverError::Setup(e.to_string()))?;
    cs.finalize();
    Ok(ConstraintSystemInfo::of(&cs))
}

/// Run circuit-specific Groth16 setup for `circuit`.
pub fn setup_circuit<C: ProofCircuit>(circuit: C) -> Result<KeyPair> {
    let layout = constraint_layout(circuit.clone())?;
    let (proving_key, verifying_key) = Groth16::<Bn254>::circuit_specific_setup(circuit, &mut OsRng)
        .map_err(|e| ProverError::Setup(e.to_string()))?;
    Ok(KeyPair::new(proving_key, verifying_key, layout))
}

/// Check the witness, then produce a Groth16 proof.
///
/// Which constraint failed is only logged at debug level; callers get an
/// opaque [`ProverError::ConstraintUnsatisfied`].
pub fn prove_circuit<C: ProofCircuit>(keys: &KeyPair, circuit: C) -> Result<Proof> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    match circuit.clone().generate_constraints(cs.clone()) {
        Ok(()) => {}
        Err(SynthesisError::Unsatisfiable) => return Err(ProverError::ConstraintUnsatisfied),
        Err(e) => return Err(ProverError::Proving(e.to_string())),
    }

    if !cs.is_satisfied()? {
        if log::log_enabled!(log::Level::Debug) {
            let failing = cs.which_is_unsatisfied()?.unwrap_or_default();
            debug!("witness does not satisfy constraint '{failing}'");
        }
        return Err(ProverError::ConstraintUnsatisfied);
    }

    let inner = Groth16::<Bn254>::prove(&keys.proving_key, circuit, &mut OsRng)
        .map_err(|e| ProverError::Proving(e.to_string()))?;
    Ok(Proof { inner })
}

/// Groth16 verification against a prepared key.
///
/// A public-input count that does not match the key is a `ShapeMismatch`,
/// any other failure is `Ok(false)`.
pub fn verify_with_keys(keys: &KeyPair, public_inputs: &[Fr], proof: &Proof) -> Result<bool> {
    let expected = keys.public_input_count();
    if public_inputs.len() != expected {
        return Err(ProverError::shape(format!(
            "expected {expected} public inputs, got {}",
            public_inputs.len()
        )));
    }
    debug!(
        "verifying proof against public inputs [{}]",
        public_inputs
            .iter()
            .map(field_to_hex)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Groth16::<Bn254>::verify_proof(&keys.prepared_verifying_key, &proof.inner, public_inputs)
        .map_err(|e| ProverError::Verification(e.to_string()))
}

impl ProvingSystem {
    /// Compile the blank circuit for `shape` and generate fresh keys.
    pub fn setup(shape: &SystemShape) -> Result<Self> {
        info!("Running setup for {shape}");
        let started = Instant::now();

        let keys = setup_circuit(AnyCircuit::blank(shape)?)?;
        info!(
            "Setup for {shape} done in {:.2?}: {} constraints, {} public inputs",
            started.elapsed(),
            keys.constraint_system.num_constraints,
            keys.public_input_count()
        );
        Ok(Self::from_parts(*shape, keys))
    }

    pub fn from_parts(shape: SystemShape, keys: KeyPair) -> Self {
        match shape {
            SystemShape::Merkle(shape) => ProvingSystem::Merkle(MerkleProofSystem { shape, keys }),
            SystemShape::Batch(shape) => ProvingSystem::Batch(BatchProofSystem { shape, keys }),
        }
    }

    #[must_use]
    pub fn shape(&self) -> SystemShape {
        match self {
            ProvingSystem::Merkle(system) => SystemShape::Merkle(system.shape),
            ProvingSystem::Batch(system) => SystemShape::Batch(system.shape),
        }
    }

    #[must_use]
    pub fn keys(&self) -> &KeyPair {
        match self {
            ProvingSystem::Merkle(system) => &system.keys,
            ProvingSystem::Batch(system) => &system.keys,
        }
    }

    /// Validate `request` against this system's shape, build the witness and prove.
    pub fn prove(&self, request: &ProofRequest) -> Result<Proof> {
        let shape = self.shape();
        let circuit = AnyCircuit::from_request(&shape, request)?;
        debug!(
            "proving {} for {shape} with {} public inputs",
            request.circuit_type(),
            circuit.public_inputs().len()
        );
        prove_circuit(self.keys(), circuit)
    }

    pub fn verify(&self, public_inputs: &[Fr], proof: &Proof) -> Result<bool> {
        verify_with_keys(self.keys(), public_inputs, proof)
    }

    /// Compare the recorded layout with one re-derived from the shape.
    pub fn verify_layout(&self) -> Result<()> {
        let shape = self.shape();
        let expected = constraint_layout(AnyCircuit::blank(&shape)?)?;
        let recorded = self.keys().constraint_system;
        if expected != recorded {
            return Err(ProverError::Setup(format!(
                "constraint layout of {shape} is {expected:?}, key records {recorded:?}"
            )));
        }
        Ok(())
    }
}

/// A Groth16 proof over BN254.
#[derive(Debug, Clone, PartialEq)]
pub struct Proof {
    pub inner: ark_groth16::Proof<Bn254>,
}

fn g1_to_json(point: &G1Affine) -> [String; 2] {
    let (x, y) = point.xy().map_or((Fq::zero(), Fq::zero()), |(x, y)| (*x, *y));
    [prime_field_to_hex(&x), prime_field_to_hex(&y)]
}

fn g2_to_json(point: &G2Affine) -> [[String; 2]; 2] {
    let (x, y) = point.xy().map_or((Fq2::zero(), Fq2::zero()), |(x, y)| (*x, *y));
    [
        [prime_field_to_hex(&x.c1), prime_field_to_hex(&x.c0)],
        [prime_field_to_hex(&y.c1), prime_field_to_hex(&y.c0)],
    ]
}

fn fq_from_json(s: &str) -> Result<Fq> {
    prime_field_from_hex(s).map_err(|e| ProverError::Verification(e.to_string()))
}

fn g1_from_json(coords: &[String; 2]) -> Result<G1Affine> {
    let x = fq_from_json(&coords[0])?;
    let y = fq_from_json(&coords[1])?;
    if x.is_zero() && y.is_zero() {
        return Ok(G1Affine::zero());
    }
    let point = G1Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ProverError::Verification(
            "G1 point is not on the curve".to_string(),
        ));
    }
    Ok(point)
}

fn g2_from_json(coords: &[[String; 2]; 2]) -> Result<G2Affine> {
    let x = Fq2::new(fq_from_json(&coords[0][1])?, fq_from_json(&coords[0][0])?);
    let y = Fq2::new(fq_from_json(&coords[1][1])?, fq_from_json(&coords[1][0])?);
    if x.is_zero() && y.is_zero() {
        return Ok(G2Affine::zero());
    }
    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ProverError::Verification(
            "G2 point is not in the prime-order subgroup".to_string(),
        ));
    }
    Ok(point)
}

impl Proof {
    #[must_use]
    pub fn to_json(&self) -> ProofJson {
        ProofJson {
            ar: g1_to_json(&self.inner.a),
            bs: g2_to_json(&self.inner.b),
            krs: g1_to_json(&self.inner.c),
        }
    }

    pub fn from_json(json: &ProofJson) -> Result<Self> {
        Ok(Proof {
            inner: ark_groth16::Proof {
                a: g1_from_json(&json.ar)?,
                b: g2_from_json(&json.bs)?,
                c: g1_from_json(&json.krs)?,
            },
        })
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.to_json())
            .map_err(|e| ProverError::Proving(format!("failed to encode proof: {e}")))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let parsed: ProofJson = serde_json::from_str(json)
            .map_err(|e| ProverError::Verification(format!("invalid proof JSON: {e}")))?;
        Self::from_json(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merkle_shape_circuit_type() {
        let inclusion = MerkleShape::inclusion(ProverVersion::V2, 32, 2);
        assert_eq!(inclusion.circuit_type().unwrap(), CircuitType::Inclusion);

        let combined = MerkleShape::combined(ProverVersion::V1, 26, 1, 26, 2);
        assert_eq!(combined.circuit_type().unwrap(), CircuitType::Combined);
        assert_eq!(combined.public_input_count(), 6);

        let empty = MerkleShape::combined(ProverVersion::V2, 0, 0, 0, 0);
        assert!(matches!(
            empty.circuit_type(),
            Err(ProverError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            MerkleShape::inclusion(ProverVersion::V2, 32, 4).file_name().unwrap(),
            "inclusion_32_4.key"
        );
        assert_eq!(
            MerkleShape::non_inclusion(ProverVersion::V1, 26, 2)
                .file_name()
                .unwrap(),
            "v1_non-inclusion_26_2.key"
        );
        assert_eq!(
            MerkleShape::combined(ProverVersion::V2, 32, 1, 40, 2)
                .file_name()
                .unwrap(),
            "combined_32_1_40_2.key"
        );
        assert_eq!(
            BatchShape::new(BatchCircuitType::AddressAppend, 40, 10).file_name(),
            "address-append_40_10.key"
        );
    }

    #[test]
    fn test_shape_validation() {
        let zero_height = SystemShape::Merkle(MerkleShape::inclusion(ProverVersion::V2, 0, 1));
        assert!(zero_height.validate().is_err());

        let zero_batch = SystemShape::Batch(BatchShape::new(BatchCircuitType::Update, 4, 0));
        assert!(zero_batch.validate().is_err());
    }

    #[test]
    fn test_proof_json_identity_points() {
        let proof = Proof {
            inner: ark_groth16::Proof {
                a: G1Affine::zero(),
                b: G2Affine::zero(),
                c: G1Affine::zero(),
            },
        };
        let json = proof.to_json();
        assert_eq!(json.ar[0], format!("0x{}", "0".repeat(64)));
        assert_eq!(Proof::from_json(&json).unwrap(), proof);
    }

    #[test]
    fn test_proof_json_generator_round_trip() {
        let proof = Proof {
            inner: ark_groth16::Proof {
                a: G1Affine::generator(),
                b: G2Affine::generator(),
                c: G1Affine::generator(),
            },
        };
        let encoded = proof.to_json_string().unwrap();
        assert_eq!(Proof::from_json_str(&encoded).unwrap(), proof);
    }

    #[test]
    fn test_proof_json_rejects_off_curve_point() {
        let mut json = Proof {
            inner: ark_groth16::Proof {
                a: G1Affine::generator(),
                b: G2Affine::generator(),
                c: G1Affine::generator(),
            },
        }
        .to_json();
        json.ar[1] = "0x3".to_string();
        assert!(matches!(
            Proof::from_json(&json),
            Err(ProverError::Verification(_))
        ));
    }
}
