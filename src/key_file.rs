//! Binary key file format.
//!
//! ```text
//! [shape: u32 BE × 4 (merkle) or × 2 (batch)]
//! [proving key, uncompressed canonical encoding]
//! [verifying key, uncompressed canonical encoding]
//! [num_constraints, num_instance_variables, num_witness_variables: u64 BE]
//! ```
//!
//! The trailer holds the counts of the synthesized constraint system, not the
//! constraint matrices. Groth16 proving in arkworks re-synthesizes the circuit
//! from the witness, so the matrices are never read back; the counts let a
//! loader compare the file with a fresh synthesis of the same shape
//! ([`ProvingSystem::verify_layout`]).
//!
//! The file does not record its own kind. Readers are told the kind
//! explicitly; [`KeyFileKind::from_path`] recovers it from a file name for
//! callers that only have a path.

use crate::circuit::{BatchCircuitType, ProverVersion};
use crate::error::{ProverError, Result};
use crate::system::{
    BatchShape, ConstraintSystemInfo, KeyPair, MerkleShape, ProvingSystem, SystemShape,
};
use ark_bn254::Bn254;
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use log::info;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// How to interpret the shape header of a key file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFileKind {
    Merkle(ProverVersion),
    Batch(BatchCircuitType),
}

impl KeyFileKind {
    /// Kind implied by a file name.
    ///
    /// `address-append` is tested before `append`, which it contains.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if name.contains("address-append") {
            KeyFileKind::Batch(BatchCircuitType::AddressAppend)
        } else if name.contains("append") {
            KeyFileKind::Batch(BatchCircuitType::Append)
        } else if name.contains("update") {
            KeyFileKind::Batch(BatchCircuitType::Update)
        } else if name.starts_with("v1_") {
            KeyFileKind::Merkle(ProverVersion::V1)
        } else {
            KeyFileKind::Merkle(ProverVersion::V2)
        }
    }

    #[must_use]
    pub fn for_shape(shape: &SystemShape) -> Self {
        match shape {
            SystemShape::Merkle(s) => KeyFileKind::Merkle(s.version),
            SystemShape::Batch(s) => KeyFileKind::Batch(s.circuit_type),
        }
    }
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> std::io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

fn write_u64<W: Write>(writer: &mut W, value: u64) -> std::io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

fn read_u32<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

/// Serializes `system` in key file layout. Returns the number of bytes written.
pub fn write_system<W: Write>(system: &ProvingSystem, writer: &mut W) -> Result<u64> {
    let io_err = |e: std::io::Error| ProverError::Setup(format!("failed to write key file: {e}"));
    let ser_err =
        |e: ark_serialize::SerializationError| ProverError::Setup(format!("failed to encode key: {e}"));

    let mut written = 0u64;
    match system.shape() {
        SystemShape::Merkle(shape) => {
            for field in [
                shape.inclusion_tree_height,
                shape.inclusion_account_count,
                shape.non_inclusion_tree_height,
                shape.non_inclusion_account_count,
            ] {
                write_u32(writer, field).map_err(io_err)?;
            }
            written += 16;
        }
        SystemShape::Batch(shape) => {
            write_u32(writer, shape.tree_height).map_err(io_err)?;
            write_u32(writer, shape.batch_size).map_err(io_err)?;
            written += 8;
        }
    }

    let keys = system.keys();
    keys.proving_key
        .serialize_uncompressed(&mut *writer)
        .map_err(ser_err)?;
    written += keys.proving_key.uncompressed_size() as u64;
    keys.verifying_key
        .serialize_uncompressed(&mut *writer)
        .map_err(ser_err)?;
    written += keys.verifying_key.uncompressed_size() as u64;

    let cs = keys.constraint_system;
    for field in [
        cs.num_constraints,
        cs.num_instance_variables,
        cs.num_witness_variables,
    ] {
        write_u64(writer, field).map_err(io_err)?;
    }
    written += 24;

    Ok(written)
}

/// Reads a system of the given `kind`. `path` is only used in error messages.
pub fn read_system<R: Read>(reader: &mut R, kind: KeyFileKind, path: &Path) -> Result<ProvingSystem> {
    let io_err = |e: std::io::Error| ProverError::key_load(path, e);

    let shape = match kind {
        KeyFileKind::Merkle(version) => SystemShape::Merkle(MerkleShape {
            version,
            inclusion_tree_height: read_u32(reader).map_err(io_err)?,
            inclusion_account_count: read_u32(reader).map_err(io_err)?,
            non_inclusion_tree_height: read_u32(reader).map_err(io_err)?,
            non_inclusion_account_count: read_u32(reader).map_err(io_err)?,
        }),
        KeyFileKind::Batch(circuit_type) => SystemShape::Batch(BatchShape {
            circuit_type,
            tree_height: read_u32(reader).map_err(io_err)?,
            batch_size: read_u32(reader).map_err(io_err)?,
        }),
    };
    shape
        .validate()
        .map_err(|e| ProverError::key_load(path, format!("invalid shape header: {e}")))?;

    // The proving key is large and comes from a trusted key directory, so its
    // points are not subgroup-checked.
    let proving_key = ProvingKey::<Bn254>::deserialize_uncompressed_unchecked(&mut *reader)
        .map_err(|e| ProverError::key_load(path, format!("invalid proving key: {e}")))?;
    let verifying_key = VerifyingKey::<Bn254>::deserialize_uncompressed(&mut *reader)
        .map_err(|e| ProverError::key_load(path, format!("invalid verifying key: {e}")))?;

    let constraint_system = ConstraintSystemInfo {
        num_constraints: read_u64(reader).map_err(io_err)?,
        num_instance_variables: read_u64(reader).map_err(io_err)?,
        num_witness_variables: read_u64(reader).map_err(io_err)?,
    };

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing).map_err(io_err)? != 0 {
        return Err(ProverError::key_load(path, "trailing bytes after key data"));
    }

    let keys = KeyPair::new(proving_key, verifying_key, constraint_system);
    let expected = shape.public_input_count();
    if keys.public_input_count() != expected {
        return Err(ProverError::key_load(
            path,
            format!(
                "verifying key accepts {} public inputs, {shape} needs {expected}",
                keys.public_input_count()
            ),
        ));
    }

    Ok(ProvingSystem::from_parts(shape, keys))
}

/// Reads a key file of a known kind.
pub fn read_system_from_file(path: &Path, kind: KeyFileKind) -> Result<ProvingSystem> {
    let file = File::open(path).map_err(|e| ProverError::key_load(path, e))?;
    let mut reader = BufReader::new(file);
    let system = read_system(&mut reader, kind, path)?;
    info!("Loaded {} from {}", system.shape(), path.display());
    Ok(system)
}

/// Reads a key file, inferring its kind from the file name.
pub fn read_system_from_path(path: &Path) -> Result<ProvingSystem> {
    read_system_from_file(path, KeyFileKind::from_path(path))
}

/// Writes `system` to `path`, creating parent directories. Returns bytes written.
///
/// The file is written next to its destination and renamed into place so
/// that concurrent readers never see a partial key.
pub fn write_system_to_file(system: &ProvingSystem, path: &Path) -> Result<u64> {
    let io_err = |e: std::io::Error| {
        ProverError::Setup(format!("failed to write {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let staging = path.with_extension("key.tmp");
    let written = {
        let file = File::create(&staging).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let written = write_system(system, &mut writer)?;
        writer.flush().map_err(io_err)?;
        written
    };
    fs::rename(&staging, path).map_err(io_err)?;

    info!(
        "Wrote {} to {} ({written} bytes)",
        system.shape(),
        path.display()
    );
    Ok(written)
}

/// Writes only the verifying key, uncompressed.
pub fn export_verifying_key(system: &ProvingSystem, path: &Path) -> Result<u64> {
    let io_err = |e: std::io::Error| {
        ProverError::Setup(format!("failed to write {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    let vk = &system.keys().verifying_key;
    vk.serialize_uncompressed(&mut writer)
        .map_err(|e| ProverError::Setup(format!("failed to encode verifying key: {e}")))?;
    writer.flush().map_err(io_err)?;

    let written = vk.uncompressed_size() as u64;
    info!(
        "Exported verifying key of {} to {} ({written} bytes)",
        system.shape(),
        path.display()
    );
    Ok(written)
}
