//! Field-element encoding helpers and the native Poseidon primitives.
//!
//! Everything in this module runs outside the circuit. The gadgets in
//! [`crate::gadgets`] are checked against these functions.

use crate::error::{ProverError, Result};
use ark_bn254::Fr;
use ark_ff::{BigInteger, Field, PrimeField, Zero};
use light_poseidon::parameters::bn254_x5::get_poseidon_parameters;
use light_poseidon::PoseidonParameters;
use std::sync::OnceLock;

/// Byte length of a canonical field element.
pub const FIELD_BYTES: usize = 32;

/// Hex digits of a canonical field element (without prefix).
pub const FIELD_HEX_LEN: usize = FIELD_BYTES * 2;

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Big-endian, zero-padded 32-byte encoding of any 256-bit prime field element.
#[inline]
#[must_use]
pub fn prime_field_to_bytes<F: PrimeField>(field: &F) -> [u8; FIELD_BYTES] {
    let repr = field.into_bigint().to_bytes_be();
    let mut bytes = [0u8; FIELD_BYTES];
    bytes[FIELD_BYTES - repr.len()..].copy_from_slice(&repr);
    bytes
}

/// Decodes a big-endian 32-byte value, rejecting values not below the modulus.
pub fn prime_field_from_bytes<F: PrimeField>(bytes: &[u8; FIELD_BYTES]) -> Result<F> {
    let value = F::from_be_bytes_mod_order(bytes);
    if prime_field_to_bytes(&value) != *bytes {
        return Err(ProverError::Witness(format!(
            "0x{} is not a canonical field element",
            hex::encode(bytes)
        )));
    }
    Ok(value)
}

/// Parses a `0x`-prefixed hex element of at most 64 digits.
///
/// Short and odd-length inputs (`"0x0"`, `"0x1e"`) are accepted.
pub fn prime_field_from_hex<F: PrimeField>(input: &str) -> Result<F> {
    let stripped = strip_hex_prefix(input);
    if stripped.is_empty() {
        return Err(ProverError::Witness(format!(
            "invalid field element '{input}': empty hex string"
        )));
    }
    if stripped.len() > FIELD_HEX_LEN {
        return Err(ProverError::Witness(format!(
            "invalid field element '{input}': more than {FIELD_HEX_LEN} hex digits"
        )));
    }
    if !is_valid_hex_string(stripped) {
        return Err(ProverError::Witness(format!(
            "invalid field element '{input}': contains non-hex characters"
        )));
    }

    let padded = format!("{stripped:0>width$}", width = FIELD_HEX_LEN);
    let decoded = hex::decode(padded)
        .map_err(|e| ProverError::Witness(format!("invalid field element '{input}': {e}")))?;
    let mut bytes = [0u8; FIELD_BYTES];
    bytes.copy_from_slice(&decoded);
    prime_field_from_bytes(&bytes)
}

/// Canonical `0x` + 64 hex digit encoding.
#[must_use]
pub fn prime_field_to_hex<F: PrimeField>(field: &F) -> String {
    format!("0x{}", hex::encode(prime_field_to_bytes(field)))
}

#[inline]
#[must_use]
pub fn field_to_bytes(field: &Fr) -> [u8; FIELD_BYTES] {
    prime_field_to_bytes(field)
}

pub fn field_from_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Fr> {
    prime_field_from_bytes(bytes)
}

/// [`prime_field_from_hex`] for the BN254 scalar field.
pub fn field_from_hex(input: &str) -> Result<Fr> {
    prime_field_from_hex(input)
}

#[must_use]
pub fn field_to_hex(field: &Fr) -> String {
    prime_field_to_hex(field)
}

static WIDTH_3: OnceLock<Option<PoseidonParameters<Fr>>> = OnceLock::new();
static WIDTH_4: OnceLock<Option<PoseidonParameters<Fr>>> = OnceLock::new();

/// Circom parameters for state width 3 or 4, parsed once per process.
///
/// Shared by the native hash and [`crate::gadgets::poseidon`].
pub fn poseidon_parameters(width: usize) -> Option<&'static PoseidonParameters<Fr>> {
    let cell = match width {
        3 => &WIDTH_3,
        4 => &WIDTH_4,
        _ => return None,
    };
    cell.get_or_init(|| get_poseidon_parameters::<Fr>(width as u8).ok())
        .as_ref()
}

#[inline]
fn sbox(x: Fr) -> Fr {
    x.square().square() * x
}

/// Poseidon over BN254 with circom parameters, arity `inputs.len()` (2 or 3).
///
/// The state starts as `[0, inputs..]`; the output is the first state element
/// after all rounds.
pub fn poseidon_hash(inputs: &[Fr]) -> Result<Fr> {
    let width = inputs.len() + 1;
    let params = poseidon_parameters(width).ok_or_else(|| {
        ProverError::Witness(format!("poseidon({}): unsupported arity", inputs.len()))
    })?;
    let half_full = params.full_rounds / 2;

    let mut state = Vec::with_capacity(width);
    state.push(Fr::zero());
    state.extend_from_slice(inputs);

    for round in 0..params.full_rounds + params.partial_rounds {
        for (i, element) in state.iter_mut().enumerate() {
            *element += params.ark[round * width + i];
        }

        if round < half_full || round >= half_full + params.partial_rounds {
            for element in state.iter_mut() {
                *element = sbox(*element);
            }
        } else {
            state[0] = sbox(state[0]);
        }

        state = params
            .mds
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&state)
                    .fold(Fr::zero(), |acc, (m, s)| acc + *m * s)
            })
            .collect();
    }

    Ok(state[0])
}

/// `Poseidon2(left, right)`: tree nodes, v2 indexed leaves, hash chains.
#[inline]
#[must_use]
pub fn poseidon2(left: Fr, right: Fr) -> Fr {
    poseidon_hash(&[left, right]).expect("poseidon arity 2 is always available")
}

/// `Poseidon3(a, b, c)`: nullifiers, v1 indexed leaves, two-stream chains.
#[inline]
#[must_use]
pub fn poseidon3(a: Fr, b: Fr, c: Fr) -> Fr {
    poseidon_hash(&[a, b, c]).expect("poseidon arity 3 is always available")
}

/// `h0 = x0, hi = Poseidon2(h(i-1), xi)`; zero for an empty input.
#[must_use]
pub fn hash_chain(inputs: &[Fr]) -> Fr {
    let Some((first, rest)) = inputs.split_first() else {
        return Fr::zero();
    };
    rest.iter().fold(*first, |acc, x| poseidon2(acc, *x))
}

/// `h0 = Poseidon2(a0, b0), hi = Poseidon3(h(i-1), ai, bi)`.
///
/// Both streams must have the same length; an empty pair hashes to zero.
pub fn two_stream_hash_chain(first: &[Fr], second: &[Fr]) -> Result<Fr> {
    if first.len() != second.len() {
        return Err(ProverError::shape(format!(
            "hash chain streams differ in length: {} vs {}",
            first.len(),
            second.len()
        )));
    }
    if first.is_empty() {
        return Ok(Fr::zero());
    }
    let mut acc = poseidon2(first[0], second[0]);
    for (a, b) in first.iter().zip(second).skip(1) {
        acc = poseidon3(acc, *a, *b);
    }
    Ok(acc)
}

/// `2^bits` as a field element.
#[must_use]
pub fn pow2(bits: usize) -> Fr {
    let mut value = Fr::from(1u64);
    let two = Fr::from(2u64);
    for _ in 0..bits {
        value *= two;
    }
    value
}
