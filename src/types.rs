//! Request parameter and proof types, with their JSON encoding.
//!
//! Field elements travel as `0x`-prefixed big-endian hex strings. Inputs may
//! be shorter than 64 digits; outputs are always canonical.

use crate::circuit::{CircuitType, ProverVersion};
use crate::error::{ProverError, Result};
use crate::utils::{hash_chain, poseidon2, poseidon3, two_stream_hash_chain};
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

/// `#[serde(with = "hex_field")]` for a single field element.
pub mod hex_field {
    use crate::utils::{field_from_hex, field_to_hex};
    use ark_bn254::Fr;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Fr, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&field_to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fr, D::Error> {
        let s = String::deserialize(deserializer)?;
        field_from_hex(&s).map_err(D::Error::custom)
    }
}

/// `#[serde(with = "hex_field_opt")]` for an optional field element.
pub mod hex_field_opt {
    use crate::utils::{field_from_hex, field_to_hex};
    use ark_bn254::Fr;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Fr>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&field_to_hex(v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Fr>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| field_from_hex(&s).map_err(D::Error::custom))
            .transpose()
    }
}

/// `#[serde(with = "hex_field_vec")]` for a list of field elements.
pub mod hex_field_vec {
    use crate::utils::{field_from_hex, field_to_hex};
    use ark_bn254::Fr;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[Fr], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(field_to_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Fr>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| field_from_hex(s).map_err(D::Error::custom))
            .collect()
    }
}

/// `#[serde(with = "hex_field_vec_vec")]` for per-slot Merkle proofs.
pub mod hex_field_vec_vec {
    use crate::utils::{field_from_hex, field_to_hex};
    use ark_bn254::Fr;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[Vec<Fr>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            values
                .iter()
                .map(|proof| proof.iter().map(field_to_hex).collect::<Vec<_>>()),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<Fr>>, D::Error> {
        Vec::<Vec<String>>::deserialize(deserializer)?
            .iter()
            .map(|proof| {
                proof
                    .iter()
                    .map(|s| field_from_hex(s).map_err(D::Error::custom))
                    .collect()
            })
            .collect()
    }
}

/// One account of an inclusion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionInputs {
    #[serde(with = "hex_field")]
    pub root: Fr,
    pub path_index: u64,
    #[serde(with = "hex_field_vec")]
    pub path_elements: Vec<Fr>,
    #[serde(with = "hex_field")]
    pub leaf: Fr,
}

/// One address of a non-inclusion request, with its low element.
///
/// `next_index` is only committed by v1 leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonInclusionInputs {
    #[serde(with = "hex_field")]
    pub root: Fr,
    #[serde(with = "hex_field")]
    pub value: Fr,
    pub path_index: u64,
    #[serde(with = "hex_field_vec")]
    pub path_elements: Vec<Fr>,
    #[serde(with = "hex_field")]
    pub leaf_lower_range_value: Fr,
    #[serde(with = "hex_field")]
    pub leaf_higher_range_value: Fr,
    #[serde(default)]
    pub next_index: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_tree_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ProverVersion>,
    #[serde(
        default,
        with = "hex_field_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_input_hash: Option<Fr>,
    #[serde(alias = "input-compressed-accounts")]
    pub input_compressed_accounts: Vec<InclusionInputs>,
}

impl InclusionParameters {
    /// Declared height, or the proof length of the first account.
    #[must_use]
    pub fn height(&self) -> usize {
        self.state_tree_height.map(|h| h as usize).unwrap_or_else(|| {
            self.input_compressed_accounts
                .first()
                .map_or(0, |a| a.path_elements.len())
        })
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.input_compressed_accounts.len()
    }

    #[must_use]
    pub fn version(&self) -> ProverVersion {
        self.version
            .unwrap_or_else(|| ProverVersion::for_height(self.height()))
    }

    #[must_use]
    pub fn roots(&self) -> Vec<Fr> {
        self.input_compressed_accounts.iter().map(|a| a.root).collect()
    }

    #[must_use]
    pub fn leaves(&self) -> Vec<Fr> {
        self.input_compressed_accounts.iter().map(|a| a.leaf).collect()
    }

    /// `two_stream_hash_chain(roots, leaves)`.
    pub fn chain_hash(&self) -> Result<Fr> {
        two_stream_hash_chain(&self.roots(), &self.leaves())
    }

    /// Supplied hash, or the chain hash computed from the accounts.
    pub fn resolved_public_input_hash(&self) -> Result<Fr> {
        match self.public_input_hash {
            Some(hash) => Ok(hash),
            None => self.chain_hash(),
        }
    }

    pub fn public_inputs(&self) -> Result<Vec<Fr>> {
        match self.version() {
            ProverVersion::V1 => Ok([self.roots(), self.leaves()].concat()),
            ProverVersion::V2 => Ok(vec![self.resolved_public_input_hash()?]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonInclusionParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_tree_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ProverVersion>,
    #[serde(
        default,
        with = "hex_field_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_input_hash: Option<Fr>,
    #[serde(alias = "new-addresses")]
    pub new_addresses: Vec<NonInclusionInputs>,
}

impl NonInclusionParameters {
    #[must_use]
    pub fn height(&self) -> usize {
        self.address_tree_height.map(|h| h as usize).unwrap_or_else(|| {
            self.new_addresses
                .first()
                .map_or(0, |a| a.path_elements.len())
        })
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.new_addresses.len()
    }

    #[must_use]
    pub fn version(&self) -> ProverVersion {
        self.version
            .unwrap_or_else(|| ProverVersion::for_height(self.height()))
    }

    #[must_use]
    pub fn roots(&self) -> Vec<Fr> {
        self.new_addresses.iter().map(|a| a.root).collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Fr> {
        self.new_addresses.iter().map(|a| a.value).collect()
    }

    /// `two_stream_hash_chain(roots, values)`.
    pub fn chain_hash(&self) -> Result<Fr> {
        two_stream_hash_chain(&self.roots(), &self.values())
    }

    pub fn resolved_public_input_hash(&self) -> Result<Fr> {
        match self.public_input_hash {
            Some(hash) => Ok(hash),
            None => self.chain_hash(),
        }
    }

    pub fn public_inputs(&self) -> Result<Vec<Fr>> {
        match self.version() {
            ProverVersion::V1 => Ok([self.roots(), self.values()].concat()),
            ProverVersion::V2 => Ok(vec![self.resolved_public_input_hash()?]),
        }
    }
}

/// Inclusion and non-inclusion accounts in one flat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_tree_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_tree_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ProverVersion>,
    #[serde(
        default,
        with = "hex_field_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub public_input_hash: Option<Fr>,
    #[serde(alias = "input-compressed-accounts")]
    pub input_compressed_accounts: Vec<InclusionInputs>,
    #[serde(alias = "new-addresses")]
    pub new_addresses: Vec<NonInclusionInputs>,
}

impl CombinedParameters {
    /// The inclusion half as a standalone request.
    #[must_use]
    pub fn inclusion(&self) -> InclusionParameters {
        InclusionParameters {
            state_tree_height: self.state_tree_height,
            version: self.version,
            public_input_hash: None,
            input_compressed_accounts: self.input_compressed_accounts.clone(),
        }
    }

    /// The non-inclusion half as a standalone request.
    #[must_use]
    pub fn non_inclusion(&self) -> NonInclusionParameters {
        NonInclusionParameters {
            address_tree_height: self.address_tree_height,
            version: self.version,
            public_input_hash: None,
            new_addresses: self.new_addresses.clone(),
        }
    }

    /// Explicit version, else the one implied by the state tree height.
    #[must_use]
    pub fn version(&self) -> ProverVersion {
        self.version
            .unwrap_or_else(|| ProverVersion::for_height(self.inclusion().height()))
    }

    /// `Poseidon2(inclusion_chain, non_inclusion_chain)`.
    pub fn resolved_public_input_hash(&self) -> Result<Fr> {
        match self.public_input_hash {
            Some(hash) => Ok(hash),
            None => Ok(poseidon2(
                self.inclusion().chain_hash()?,
                self.non_inclusion().chain_hash()?,
            )),
        }
    }

    pub fn public_inputs(&self) -> Result<Vec<Fr>> {
        match self.version() {
            ProverVersion::V1 => {
                let inclusion = self.inclusion();
                let non_inclusion = self.non_inclusion();
                Ok([
                    inclusion.roots(),
                    inclusion.leaves(),
                    non_inclusion.roots(),
                    non_inclusion.values(),
                ]
                .concat())
            }
            ProverVersion::V2 => Ok(vec![self.resolved_public_input_hash()?]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAppendParameters {
    pub height: u32,
    pub batch_size: u32,
    pub start_index: u64,
    #[serde(with = "hex_field")]
    pub old_root: Fr,
    #[serde(with = "hex_field")]
    pub new_root: Fr,
    #[serde(with = "hex_field")]
    pub leaves_hashchain_hash: Fr,
    #[serde(with = "hex_field")]
    pub public_input_hash: Fr,
    #[serde(with = "hex_field_vec")]
    pub old_leaves: Vec<Fr>,
    #[serde(with = "hex_field_vec")]
    pub leaves: Vec<Fr>,
    #[serde(with = "hex_field_vec_vec")]
    pub merkle_proofs: Vec<Vec<Fr>>,
}

impl BatchAppendParameters {
    /// `hash_chain([old_root, new_root, leaves_hashchain_hash, start_index])`.
    #[must_use]
    pub fn compute_public_input_hash(&self) -> Fr {
        hash_chain(&[
            self.old_root,
            self.new_root,
            self.leaves_hashchain_hash,
            Fr::from(self.start_index),
        ])
    }

    #[must_use]
    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateParameters {
    pub height: u32,
    pub batch_size: u32,
    #[serde(with = "hex_field")]
    pub old_root: Fr,
    #[serde(with = "hex_field")]
    pub new_root: Fr,
    #[serde(with = "hex_field")]
    pub leaves_hashchain_hash: Fr,
    #[serde(with = "hex_field")]
    pub public_input_hash: Fr,
    #[serde(with = "hex_field_vec")]
    pub tx_hashes: Vec<Fr>,
    #[serde(with = "hex_field_vec")]
    pub leaves: Vec<Fr>,
    #[serde(with = "hex_field_vec")]
    pub old_leaves: Vec<Fr>,
    pub path_indices: Vec<u64>,
    #[serde(with = "hex_field_vec_vec")]
    pub merkle_proofs: Vec<Vec<Fr>>,
}

impl BatchUpdateParameters {
    /// `Poseidon3(leaf, path_index, tx_hash)` for every slot.
    #[must_use]
    pub fn nullifiers(&self) -> Vec<Fr> {
        self.leaves
            .iter()
            .zip(&self.path_indices)
            .zip(&self.tx_hashes)
            .map(|((leaf, index), tx)| poseidon3(*leaf, Fr::from(*index), *tx))
            .collect()
    }

    /// `hash_chain([old_root, new_root, leaves_hashchain_hash])`.
    #[must_use]
    pub fn compute_public_input_hash(&self) -> Fr {
        hash_chain(&[self.old_root, self.new_root, self.leaves_hashchain_hash])
    }

    #[must_use]
    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAddressAppendParameters {
    pub tree_height: u32,
    pub batch_size: u32,
    pub start_index: u64,
    #[serde(with = "hex_field")]
    pub old_root: Fr,
    #[serde(with = "hex_field")]
    pub new_root: Fr,
    #[serde(with = "hex_field")]
    pub hashchain_hash: Fr,
    #[serde(with = "hex_field")]
    pub public_input_hash: Fr,
    #[serde(with = "hex_field_vec")]
    pub low_element_values: Vec<Fr>,
    #[serde(with = "hex_field_vec")]
    pub low_element_next_values: Vec<Fr>,
    pub low_element_indices: Vec<u64>,
    pub low_element_next_indices: Vec<u64>,
    #[serde(with = "hex_field_vec_vec")]
    pub low_element_proofs: Vec<Vec<Fr>>,
    #[serde(with = "hex_field_vec")]
    pub new_element_values: Vec<Fr>,
    #[serde(with = "hex_field_vec_vec")]
    pub new_element_proofs: Vec<Vec<Fr>>,
}

impl BatchAddressAppendParameters {
    /// `hash_chain([old_root, new_root, hashchain_hash, start_index])`.
    #[must_use]
    pub fn compute_public_input_hash(&self) -> Fr {
        hash_chain(&[
            self.old_root,
            self.new_root,
            self.hashchain_hash,
            Fr::from(self.start_index),
        ])
    }

    #[must_use]
    pub fn public_inputs(&self) -> Vec<Fr> {
        vec![self.public_input_hash]
    }
}

/// A proving request as received by the service, tagged by `circuitType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "circuitType")]
pub enum ProofRequest {
    #[serde(rename = "inclusion")]
    Inclusion(InclusionParameters),
    #[serde(rename = "non-inclusion")]
    NonInclusion(NonInclusionParameters),
    #[serde(rename = "combined")]
    Combined(CombinedParameters),
    #[serde(rename = "append")]
    BatchAppend(BatchAppendParameters),
    #[serde(rename = "update")]
    BatchUpdate(BatchUpdateParameters),
    #[serde(rename = "address-append")]
    BatchAddressAppend(BatchAddressAppendParameters),
}

impl ProofRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ProverError::Witness(format!("invalid proof request: {e}")))
    }

    #[must_use]
    pub fn circuit_type(&self) -> CircuitType {
        match self {
            ProofRequest::Inclusion(_) => CircuitType::Inclusion,
            ProofRequest::NonInclusion(_) => CircuitType::NonInclusion,
            ProofRequest::Combined(_) => CircuitType::Combined,
            ProofRequest::BatchAppend(_) => CircuitType::BatchAppend,
            ProofRequest::BatchUpdate(_) => CircuitType::BatchUpdate,
            ProofRequest::BatchAddressAppend(_) => CircuitType::BatchAddressAppend,
        }
    }

    /// Public inputs the verifier needs for a proof of this request.
    pub fn public_inputs(&self) -> Result<Vec<Fr>> {
        match self {
            ProofRequest::Inclusion(p) => p.public_inputs(),
            ProofRequest::NonInclusion(p) => p.public_inputs(),
            ProofRequest::Combined(p) => p.public_inputs(),
            ProofRequest::BatchAppend(p) => Ok(p.public_inputs()),
            ProofRequest::BatchUpdate(p) => Ok(p.public_inputs()),
            ProofRequest::BatchAddressAppend(p) => Ok(p.public_inputs()),
        }
    }
}

/// Groth16 proof as exchanged with on-chain verifiers.
///
/// `bs` lists each G2 coordinate as `[c1, c0]`. Every coordinate is a
/// 32-byte big-endian hex string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofJson {
    pub ar: [String; 2],
    pub bs: [[String; 2]; 2],
    pub krs: [String; 2],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::field_to_hex;

    const INCLUSION_JSON: &str = r#"{
        "circuitType": "inclusion",
        "stateTreeHeight": 26,
        "inputCompressedAccounts": [{
            "root": "0x1ebf5c4eb04bf878b46937be63d12308bb14841813441f041812ea54ecb7b2d5",
            "pathIndex": 0,
            "pathElements": ["0x0", "0x1"],
            "leaf": "0x29176100eaa962bdc1fe6c654d6a3c130e96a4d1168b33848b897dc502820133"
        }]
    }"#;

    #[test]
    fn test_parse_inclusion_request() {
        let request = ProofRequest::from_json(INCLUSION_JSON).unwrap();
        assert_eq!(request.circuit_type(), CircuitType::Inclusion);

        let ProofRequest::Inclusion(params) = request else {
            panic!("expected an inclusion request");
        };
        assert_eq!(params.height(), 26);
        assert_eq!(params.version(), ProverVersion::V1);
        assert_eq!(params.input_compressed_accounts[0].path_elements[1], Fr::from(1u64));
        assert_eq!(params.public_inputs().unwrap().len(), 2);
    }

    #[test]
    fn test_version_inference() {
        let mut params = InclusionParameters {
            state_tree_height: Some(32),
            version: None,
            public_input_hash: None,
            input_compressed_accounts: vec![],
        };
        assert_eq!(params.version(), ProverVersion::V2);

        params.state_tree_height = Some(26);
        params.version = Some(ProverVersion::V2);
        assert_eq!(params.version(), ProverVersion::V2);
    }

    #[test]
    fn test_version_serializes_as_number() {
        let json = serde_json::to_string(&ProverVersion::V1).unwrap();
        assert_eq!(json, "1");
        assert!(serde_json::from_str::<ProverVersion>("3").is_err());
    }

    #[test]
    fn test_rejects_non_canonical_field() {
        let json = INCLUSION_JSON.replace(
            "0x1ebf5c4eb04bf878b46937be63d12308bb14841813441f041812ea54ecb7b2d5",
            "0x30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001",
        );
        assert!(matches!(
            ProofRequest::from_json(&json),
            Err(ProverError::Witness(_))
        ));
    }

    #[test]
    fn test_batch_update_request_round_trip() {
        let params = BatchUpdateParameters {
            height: 4,
            batch_size: 1,
            old_root: Fr::from(1u64),
            new_root: Fr::from(2u64),
            leaves_hashchain_hash: Fr::from(3u64),
            public_input_hash: Fr::from(4u64),
            tx_hashes: vec![Fr::from(5u64)],
            leaves: vec![Fr::from(6u64)],
            old_leaves: vec![Fr::from(6u64)],
            path_indices: vec![3],
            merkle_proofs: vec![vec![Fr::from(0u64); 4]],
        };
        let request = ProofRequest::BatchUpdate(params.clone());
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"circuitType\":\"update\""));
        assert!(json.contains("\"leavesHashchainHash\""));
        assert!(json.contains(&field_to_hex(&Fr::from(5u64))));
        assert_eq!(ProofRequest::from_json(&json).unwrap(), request);
    }

    #[test]
    fn test_combined_public_inputs_v1_order() {
        let combined = CombinedParameters {
            state_tree_height: Some(26),
            address_tree_height: Some(26),
            version: None,
            public_input_hash: None,
            input_compressed_accounts: vec![InclusionInputs {
                root: Fr::from(1u64),
                path_index: 0,
                path_elements: vec![],
                leaf: Fr::from(2u64),
            }],
            new_addresses: vec![NonInclusionInputs {
                root: Fr::from(3u64),
                value: Fr::from(4u64),
                path_index: 0,
                path_elements: vec![],
                leaf_lower_range_value: Fr::from(0u64),
                leaf_higher_range_value: Fr::from(9u64),
                next_index: 0,
            }],
        };

        let expected: Vec<Fr> = (1..=4u64).map(Fr::from).collect();
        assert_eq!(combined.public_inputs().unwrap(), expected);
    }

    #[test]
    fn test_parse_flat_combined_request() {
        let json = r#"{
            "circuitType": "combined",
            "stateTreeHeight": 26,
            "addressTreeHeight": 26,
            "input-compressed-accounts": [{
                "root": "0x1ebf5c4eb04bf878b46937be63d12308bb14841813441f041812ea54ecb7b2d5",
                "pathIndex": 0,
                "pathElements": ["0x0", "0x2098f5fb9e239eab3ceac3f27b81e481dc3124d55ffed523a839ee8446b64864"],
                "leaf": "0x29176100eaa962bdc1fe6c654d6a3c130e96a4d1168b33848b897dc502820133"
            }],
            "newAddresses": [{
                "root": "0xbfe2d9e57ace69971b010340a2eb1d9f1c9b078c7b9b3c90063b83617a84ef9",
                "value": "0x202",
                "pathIndex": 17,
                "pathElements": ["0x0", "0x1"],
                "leafLowerRangeValue": "0x201",
                "leafHigherRangeValue": "0x203",
                "nextIndex": 46336290
            }]
        }"#;

        let ProofRequest::Combined(params) = ProofRequest::from_json(json).unwrap() else {
            panic!("expected a combined request");
        };
        assert_eq!(params.version(), ProverVersion::V1);
        assert_eq!(params.inclusion().count(), 1);
        assert_eq!(params.non_inclusion().height(), 26);
        assert_eq!(params.new_addresses[0].value, Fr::from(0x202u64));
        assert_eq!(params.new_addresses[0].next_index, 46336290);
        assert_eq!(params.public_inputs().unwrap().len(), 4);

        let json = serde_json::to_string(&ProofRequest::Combined(params.clone())).unwrap();
        assert!(json.contains("\"inputCompressedAccounts\""));
        assert!(!json.contains("\"inclusion\""));
        assert_eq!(
            ProofRequest::from_json(&json).unwrap(),
            ProofRequest::Combined(params)
        );
    }
}
