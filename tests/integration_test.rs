use ark_bn254::Fr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use zkp_compressed_state::circuit::{BatchCircuitType, ProverVersion};
use zkp_compressed_state::key_file::{
    export_verifying_key, read_system_from_file, read_system_from_path, write_system_to_file,
    KeyFileKind,
};
use zkp_compressed_state::keys::{KeyManagerOptions, LocalKeyFetcher};
use zkp_compressed_state::test_params;
use zkp_compressed_state::types::ProofRequest;
use zkp_compressed_state::{
    BatchShape, KeyFetcher, KeyManager, MerkleShape, Proof, ProverError, ProvingSystem,
    SystemShape,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn inclusion_shape() -> SystemShape {
    MerkleShape::inclusion(ProverVersion::V2, 4, 1).into()
}

/// Counts calls and delegates to the local fetcher.
#[derive(Default)]
struct CountingFetcher {
    ensures: AtomicUsize,
    refetches: AtomicUsize,
    delay: Option<Duration>,
}

impl KeyFetcher for CountingFetcher {
    fn ensure(&self, path: &Path) -> zkp_compressed_state::Result<()> {
        self.ensures.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        LocalKeyFetcher.ensure(path)
    }

    fn refetch(&self, path: &Path) -> zkp_compressed_state::Result<()> {
        self.refetches.fetch_add(1, Ordering::SeqCst);
        LocalKeyFetcher.refetch(path)
    }
}

/// Restores a known good key file on refetch.
struct RestoringFetcher {
    good_copy: PathBuf,
    refetches: AtomicUsize,
}

impl KeyFetcher for RestoringFetcher {
    fn ensure(&self, path: &Path) -> zkp_compressed_state::Result<()> {
        LocalKeyFetcher.ensure(path)
    }

    fn refetch(&self, path: &Path) -> zkp_compressed_state::Result<()> {
        self.refetches.fetch_add(1, Ordering::SeqCst);
        fs::copy(&self.good_copy, path).map_err(|e| ProverError::KeyLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

struct PanickingFetcher;

impl KeyFetcher for PanickingFetcher {
    fn ensure(&self, _path: &Path) -> zkp_compressed_state::Result<()> {
        panic!("fetcher exploded");
    }

    fn refetch(&self, _path: &Path) -> zkp_compressed_state::Result<()> {
        Ok(())
    }
}

#[test]
fn test_prove_and_verify_every_circuit() {
    init_logging();
    let shapes: Vec<SystemShape> = vec![
        MerkleShape::inclusion(ProverVersion::V1, 4, 1).into(),
        MerkleShape::inclusion(ProverVersion::V2, 4, 2).into(),
        MerkleShape::non_inclusion(ProverVersion::V1, 4, 1).into(),
        MerkleShape::non_inclusion(ProverVersion::V2, 4, 1).into(),
        MerkleShape::combined(ProverVersion::V1, 4, 1, 4, 1).into(),
        MerkleShape::combined(ProverVersion::V2, 4, 1, 4, 1).into(),
        BatchShape::new(BatchCircuitType::Append, 4, 2).into(),
        BatchShape::new(BatchCircuitType::Update, 4, 2).into(),
        BatchShape::new(BatchCircuitType::AddressAppend, 4, 1).into(),
    ];

    for shape in shapes {
        let system = ProvingSystem::setup(&shape).unwrap();
        let request = test_params::request_for_shape(&shape).unwrap();
        let public_inputs = request.public_inputs().unwrap();
        assert_eq!(public_inputs.len(), shape.public_input_count(), "{shape}");

        let proof = system.prove(&request).unwrap();
        assert!(system.verify(&public_inputs, &proof).unwrap(), "{shape}");

        let mut wrong = public_inputs.clone();
        wrong[0] += Fr::from(1u64);
        assert!(!system.verify(&wrong, &proof).unwrap(), "{shape}");

        let mut too_many = public_inputs;
        too_many.push(Fr::from(1u64));
        assert!(matches!(
            system.verify(&too_many, &proof),
            Err(ProverError::ShapeMismatch(_))
        ));
    }
}

#[test]
fn test_prove_rejects_request_for_other_shape() {
    let system = ProvingSystem::setup(&inclusion_shape()).unwrap();

    let two_accounts =
        test_params::request_for_shape(&MerkleShape::inclusion(ProverVersion::V2, 4, 2).into())
            .unwrap();
    assert!(matches!(
        system.prove(&two_accounts),
        Err(ProverError::ShapeMismatch(_))
    ));

    let batch = test_params::request_for_shape(
        &BatchShape::new(BatchCircuitType::Update, 4, 1).into(),
    )
    .unwrap();
    assert!(matches!(
        system.prove(&batch),
        Err(ProverError::ShapeMismatch(_))
    ));
}

#[test]
fn test_prove_rejects_unsatisfied_witness() {
    let shape = inclusion_shape();
    let system = ProvingSystem::setup(&shape).unwrap();

    let ProofRequest::Inclusion(mut params) = test_params::request_for_shape(&shape).unwrap()
    else {
        panic!("expected an inclusion request");
    };
    params.input_compressed_accounts[0].leaf += Fr::from(1u64);

    let err = system.prove(&ProofRequest::Inclusion(params)).unwrap_err();
    assert!(matches!(err, ProverError::ConstraintUnsatisfied));
    assert!(err.is_input_error());
}

#[test]
fn test_proof_json_round_trip() {
    let shape: SystemShape = BatchShape::new(BatchCircuitType::Update, 4, 1).into();
    let system = ProvingSystem::setup(&shape).unwrap();
    let request = test_params::request_for_shape(&shape).unwrap();
    let proof = system.prove(&request).unwrap();

    let json = proof.to_json_string().unwrap();
    assert!(json.contains("\"ar\""));
    let decoded = Proof::from_json_str(&json).unwrap();
    assert_eq!(decoded, proof);
    assert!(system
        .verify(&request.public_inputs().unwrap(), &decoded)
        .unwrap());
}

#[test]
fn test_key_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let shape: SystemShape = BatchShape::new(BatchCircuitType::Append, 4, 1).into();
    let system = ProvingSystem::setup(&shape).unwrap();

    let path = dir.path().join(shape.file_name().unwrap());
    assert_eq!(path.file_name().unwrap(), "append_4_1.key");
    let written = write_system_to_file(&system, &path).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), written);

    // Only the three constraint counts follow the keys.
    let bytes = fs::read(&path).unwrap();
    let trailer: Vec<u64> = bytes[bytes.len() - 24..]
        .chunks(8)
        .map(|c| u64::from_be_bytes(c.try_into().unwrap()))
        .collect();
    let cs = system.keys().constraint_system;
    assert_eq!(
        trailer,
        vec![
            cs.num_constraints,
            cs.num_instance_variables,
            cs.num_witness_variables
        ]
    );
    assert!(cs.num_constraints > 0);

    let loaded = read_system_from_path(&path).unwrap();
    assert_eq!(loaded.shape(), shape);
    assert_eq!(
        loaded.keys().constraint_system,
        system.keys().constraint_system
    );
    loaded.verify_layout().unwrap();

    let request = test_params::request_for_shape(&shape).unwrap();
    let inputs = request.public_inputs().unwrap();
    let proof = loaded.prove(&request).unwrap();
    assert!(system.verify(&inputs, &proof).unwrap());
    let proof = system.prove(&request).unwrap();
    assert!(loaded.verify(&inputs, &proof).unwrap());

    let vk_path = dir.path().join("append_4_1.vk");
    let vk_bytes = export_verifying_key(&system, &vk_path).unwrap();
    assert!(vk_bytes > 0 && vk_bytes < written);
}

#[test]
fn test_key_file_merkle_header_and_version() {
    let dir = TempDir::new().unwrap();
    let shape: SystemShape = MerkleShape::inclusion(ProverVersion::V1, 4, 1).into();
    let system = ProvingSystem::setup(&shape).unwrap();
    let path = dir.path().join(shape.file_name().unwrap());
    write_system_to_file(&system, &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..16], &[0, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0]);

    let loaded = read_system_from_path(&path).unwrap();
    assert_eq!(loaded.shape(), shape);

    // A v1 key carries two public inputs; read as v2 it must be rejected.
    let as_v2 = read_system_from_file(&path, KeyFileKind::Merkle(ProverVersion::V2));
    assert!(matches!(as_v2, Err(ProverError::KeyLoad { .. })));
}

#[test]
fn test_corrupted_key_file() {
    let dir = TempDir::new().unwrap();
    let shape = inclusion_shape();
    let system = ProvingSystem::setup(&shape).unwrap();
    let path = dir.path().join(shape.file_name().unwrap());
    write_system_to_file(&system, &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(
        read_system_from_path(&path),
        Err(ProverError::KeyLoad { .. })
    ));

    let mut extended = bytes.clone();
    extended.push(0);
    fs::write(&path, &extended).unwrap();
    assert!(matches!(
        read_system_from_path(&path),
        Err(ProverError::KeyLoad { .. })
    ));
}

#[test]
fn test_key_manager_single_flight() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(CountingFetcher {
        delay: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    let manager = Arc::new(
        KeyManager::new(dir.path())
            .with_fetcher(fetcher.clone())
            .with_options(KeyManagerOptions {
                setup_on_miss: true,
                ..Default::default()
            }),
    );
    let shape = inclusion_shape();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.get(&shape).unwrap()
            })
        })
        .collect();
    let systems: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(systems.iter().all(|s| Arc::ptr_eq(s, &systems[0])));
    assert_eq!(fetcher.ensures.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.refetches.load(Ordering::SeqCst), 0);
    assert_eq!(manager.cached_shapes(), vec![shape]);
    // Nothing is written without `persist_setup`.
    assert!(!dir.path().join("inclusion_4_1.key").exists());
}

#[test]
fn test_key_manager_persists_and_reloads() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let shape: SystemShape = MerkleShape::non_inclusion(ProverVersion::V2, 4, 1).into();

    let first = KeyManager::new(dir.path()).with_options(KeyManagerOptions {
        setup_on_miss: true,
        persist_setup: true,
        verify_layout: false,
    });
    let request = test_params::request_for_shape(&shape).unwrap();
    let proof = first.prove(&request).unwrap();
    assert!(dir.path().join("non-inclusion_4_1.key").exists());

    let second = KeyManager::new(dir.path()).with_options(KeyManagerOptions {
        verify_layout: true,
        ..Default::default()
    });
    assert!(second
        .verify(&shape, &request.public_inputs().unwrap(), &proof)
        .unwrap());
}

#[test]
fn test_key_manager_refetches_once() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let shape: SystemShape = BatchShape::new(BatchCircuitType::Update, 4, 1).into();
    let system = ProvingSystem::setup(&shape).unwrap();

    let good_copy = dir.path().join("backup.bin");
    write_system_to_file(&system, &good_copy).unwrap();
    let path = dir.path().join("update_4_1.key");
    fs::write(&path, b"corrupted").unwrap();

    let fetcher = Arc::new(RestoringFetcher {
        good_copy,
        refetches: AtomicUsize::new(0),
    });
    let manager = KeyManager::new(dir.path()).with_fetcher(fetcher.clone());

    let loaded = manager.get(&shape).unwrap();
    assert_eq!(loaded.shape(), shape);
    assert_eq!(fetcher.refetches.load(Ordering::SeqCst), 1);

    // Cached now: no further fetches.
    manager.get(&shape).unwrap();
    assert_eq!(fetcher.refetches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_key_manager_failure_reaches_every_waiter() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(CountingFetcher {
        delay: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    let manager = Arc::new(KeyManager::new(dir.path()).with_fetcher(fetcher.clone()));
    let shape = inclusion_shape();

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.get(&shape)
            })
        })
        .collect();

    for handle in handles {
        assert!(matches!(
            handle.join().unwrap(),
            Err(ProverError::KeyLoad { .. })
        ));
    }
    assert!(!manager.is_cached(&shape));
    assert!(fetcher.refetches.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_key_manager_catches_loader_panic() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let manager = KeyManager::new(dir.path()).with_fetcher(Arc::new(PanickingFetcher));
    let shape = inclusion_shape();

    for _ in 0..2 {
        match manager.get(&shape) {
            Err(ProverError::KeyLoad { reason, .. }) => assert!(reason.contains("fetcher exploded")),
            other => panic!("expected KeyLoad, got {other:?}"),
        }
    }
}

#[test]
fn test_key_manager_preload() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let manager = KeyManager::new(dir.path()).with_options(KeyManagerOptions {
        setup_on_miss: true,
        ..Default::default()
    });
    let shapes: Vec<SystemShape> = vec![
        inclusion_shape(),
        MerkleShape::inclusion(ProverVersion::V1, 4, 1).into(),
        inclusion_shape(),
    ];

    manager.preload(&shapes).unwrap();
    assert_eq!(manager.cached_shapes().len(), 2);
}
