//! Process-wide cache of proving systems.
//!
//! [`KeyManager::get`] loads each shape at most once, however many threads ask
//! for it concurrently. The first caller becomes the loader and every other
//! caller for the same shape blocks on a one-shot signal until the loader
//! finishes, then shares its outcome. Different shapes load in parallel.

use crate::circuit::{BatchCircuitType, CircuitType, ProverVersion};
use crate::config::{Config, ProvingConfig};
use crate::error::{ProverError, Result};
use crate::key_file::{read_system_from_file, write_system_to_file, KeyFileKind};
use crate::system::{BatchShape, MerkleShape, Proof, ProvingSystem, SystemShape};
use crate::types::ProofRequest;
use crate::{ADDRESS_TREE_HEIGHT, LEGACY_STATE_TREE_HEIGHT, STATE_TREE_HEIGHT};
use ark_bn254::Fr;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError, RwLock};
use std::thread;
use std::time::Instant;

const RPC_INCLUSION_COUNTS: [u32; 5] = [1, 2, 3, 4, 8];
const RPC_LEGACY_NON_INCLUSION_COUNTS: [u32; 2] = [1, 2];
const RPC_NON_INCLUSION_COUNTS: [u32; 5] = [1, 2, 3, 4, 8];
const RPC_COMBINED_COUNTS: [u32; 4] = [1, 2, 3, 4];
const FORESTER_BATCH_SIZE: u32 = 500;
const FORESTER_ADDRESS_BATCH_SIZE: u32 = 250;
const FORESTER_TEST_BATCH_SIZE: u32 = 10;

/// Which set of keys a deployment serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Inclusion, non-inclusion and combined proofs for clients.
    Rpc,
    /// Production-size batch circuits.
    Forester,
    /// Batch circuits at test batch sizes.
    ForesterTest,
    Full,
    FullTest,
}

impl RunMode {
    /// Every shape the mode serves.
    #[must_use]
    pub fn shapes(&self) -> Vec<SystemShape> {
        match self {
            RunMode::Rpc => rpc_shapes(),
            RunMode::Forester => forester_shapes(FORESTER_BATCH_SIZE, FORESTER_ADDRESS_BATCH_SIZE),
            RunMode::ForesterTest => {
                forester_shapes(FORESTER_TEST_BATCH_SIZE, FORESTER_TEST_BATCH_SIZE)
            }
            RunMode::Full => [RunMode::Rpc.shapes(), RunMode::Forester.shapes()].concat(),
            RunMode::FullTest => [RunMode::Rpc.shapes(), RunMode::ForesterTest.shapes()].concat(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Rpc => "rpc",
            RunMode::Forester => "forester",
            RunMode::ForesterTest => "forester-test",
            RunMode::Full => "full",
            RunMode::FullTest => "full-test",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ProverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rpc" => Ok(RunMode::Rpc),
            "forester" => Ok(RunMode::Forester),
            "forester-test" => Ok(RunMode::ForesterTest),
            "full" => Ok(RunMode::Full),
            "full-test" => Ok(RunMode::FullTest),
            other => Err(ProverError::shape(format!("invalid run mode '{other}'"))),
        }
    }
}

fn rpc_shapes() -> Vec<SystemShape> {
    let mut shapes = Vec::new();
    for circuit in [
        CircuitType::Inclusion,
        CircuitType::NonInclusion,
        CircuitType::Combined,
    ] {
        shapes.extend(shapes_for_circuit(circuit));
    }
    shapes
}

fn forester_shapes(batch_size: u32, address_batch_size: u32) -> Vec<SystemShape> {
    vec![
        BatchShape::new(BatchCircuitType::Append, STATE_TREE_HEIGHT as u32, batch_size).into(),
        BatchShape::new(BatchCircuitType::Update, STATE_TREE_HEIGHT as u32, batch_size).into(),
        BatchShape::new(
            BatchCircuitType::AddressAppend,
            ADDRESS_TREE_HEIGHT as u32,
            address_batch_size,
        )
        .into(),
    ]
}

/// Shapes served for one circuit type, in both layouts where both exist.
#[must_use]
pub fn shapes_for_circuit(circuit: CircuitType) -> Vec<SystemShape> {
    let legacy = LEGACY_STATE_TREE_HEIGHT as u32;
    let state = STATE_TREE_HEIGHT as u32;
    let address = ADDRESS_TREE_HEIGHT as u32;

    match circuit {
        CircuitType::Inclusion => RPC_INCLUSION_COUNTS
            .iter()
            .flat_map(|&n| {
                [
                    SystemShape::from(MerkleShape::inclusion(ProverVersion::V1, legacy, n)),
                    SystemShape::from(MerkleShape::inclusion(ProverVersion::V2, state, n)),
                ]
            })
            .collect(),
        CircuitType::NonInclusion => RPC_LEGACY_NON_INCLUSION_COUNTS
            .iter()
            .map(|&n| SystemShape::from(MerkleShape::non_inclusion(ProverVersion::V1, legacy, n)))
            .chain(
                RPC_NON_INCLUSION_COUNTS
                    .iter()
                    .map(|&n| MerkleShape::non_inclusion(ProverVersion::V2, address, n).into()),
            )
            .collect(),
        CircuitType::Combined => {
            let mut shapes: Vec<SystemShape> = Vec::new();
            for &i in &RPC_COMBINED_COUNTS {
                for &n in &RPC_LEGACY_NON_INCLUSION_COUNTS {
                    shapes.push(
                        MerkleShape::combined(ProverVersion::V1, legacy, i, legacy, n).into(),
                    );
                }
                for &n in &RPC_COMBINED_COUNTS {
                    shapes.push(
                        MerkleShape::combined(ProverVersion::V2, state, i, address, n).into(),
                    );
                }
            }
            shapes
        }
        CircuitType::BatchAppend => {
            vec![BatchShape::new(BatchCircuitType::Append, state, FORESTER_BATCH_SIZE).into()]
        }
        CircuitType::BatchUpdate => {
            vec![BatchShape::new(BatchCircuitType::Update, state, FORESTER_BATCH_SIZE).into()]
        }
        CircuitType::BatchAddressAppend => vec![BatchShape::new(
            BatchCircuitType::AddressAppend,
            address,
            FORESTER_ADDRESS_BATCH_SIZE,
        )
        .into()],
    }
}

/// Makes key files available on disk.
///
/// `ensure` is called before every read. `refetch` is called at most once per
/// load, after a read or integrity failure, and should replace the file.
pub trait KeyFetcher: Send + Sync {
    fn ensure(&self, path: &Path) -> Result<()>;

    fn refetch(&self, path: &Path) -> Result<()>;
}

/// Serves keys that are already on local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalKeyFetcher;

impl KeyFetcher for LocalKeyFetcher {
    fn ensure(&self, path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(ProverError::key_load(path, "key file not found"))
        }
    }

    fn refetch(&self, path: &Path) -> Result<()> {
        // Nothing to download from; the retry sees whatever is on disk now.
        self.ensure(path)
    }
}

/// Verifies key files against a `sha256sum`-style table before use.
///
/// The table is read the first time it is needed and kept for the lifetime
/// of the fetcher.
pub struct ChecksumKeyFetcher {
    inner: Arc<dyn KeyFetcher>,
    checksum_file: PathBuf,
    table: OnceLock<std::result::Result<HashMap<String, String>, String>>,
}

impl ChecksumKeyFetcher {
    pub fn new(inner: Arc<dyn KeyFetcher>, checksum_file: impl Into<PathBuf>) -> Self {
        ChecksumKeyFetcher {
            inner,
            checksum_file: checksum_file.into(),
            table: OnceLock::new(),
        }
    }

    fn table(&self) -> Result<&HashMap<String, String>> {
        self.table
            .get_or_init(|| {
                let table = parse_checksum_file(&self.checksum_file);
                if let Ok(entries) = &table {
                    debug!(
                        "Loaded {} checksums from {}",
                        entries.len(),
                        self.checksum_file.display()
                    );
                }
                table
            })
            .as_ref()
            .map_err(|reason| ProverError::key_load(&self.checksum_file, reason))
    }

    fn check(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let expected = self
            .table()?
            .get(&name)
            .ok_or_else(|| ProverError::key_load(path, "no checksum recorded"))?;

        let actual = sha256_file(path)?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(ProverError::key_load(
                path,
                format!("checksum mismatch: expected {expected}, got {actual}"),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ChecksumKeyFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumKeyFetcher")
            .field("checksum_file", &self.checksum_file)
            .finish_non_exhaustive()
    }
}

impl KeyFetcher for ChecksumKeyFetcher {
    fn ensure(&self, path: &Path) -> Result<()> {
        self.inner.ensure(path)?;
        self.check(path)
    }

    fn refetch(&self, path: &Path) -> Result<()> {
        self.inner.refetch(path)?;
        self.check(path)
    }
}

/// Parses `<hex digest> <file name>` lines; blank lines and `#` comments are skipped.
fn parse_checksum_file(path: &Path) -> std::result::Result<HashMap<String, String>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut table = HashMap::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| e.to_string())?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(digest), Some(name)) => {
                let name = name.trim_start_matches('*');
                let name = Path::new(name)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| name.to_string());
                table.insert(name, digest.to_ascii_lowercase());
            }
            _ => return Err(format!("malformed checksum line {}", number + 1)),
        }
    }
    Ok(table)
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| ProverError::key_load(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| ProverError::key_load(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// What to do beyond reading existing key files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyManagerOptions {
    pub setup_on_miss: bool,
    pub persist_setup: bool,
    pub verify_layout: bool,
}

type LoadOutcome = std::result::Result<Arc<ProvingSystem>, String>;

/// One-shot completion signal for an in-flight load.
#[derive(Default)]
struct LoadSignal {
    outcome: Mutex<Option<LoadOutcome>>,
    ready: Condvar,
}

impl LoadSignal {
    fn complete(&self, outcome: LoadOutcome) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(outcome);
        self.ready.notify_all();
    }

    fn wait(&self) -> LoadOutcome {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Default)]
struct CacheState {
    systems: HashMap<SystemShape, Arc<ProvingSystem>>,
    loading: HashMap<SystemShape, Arc<LoadSignal>>,
}

/// Loads, caches and serves proving systems by shape.
pub struct KeyManager {
    keys_dir: PathBuf,
    fetcher: Arc<dyn KeyFetcher>,
    options: KeyManagerOptions,
    limits: ProvingConfig,
    state: RwLock<CacheState>,
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("KeyManager")
            .field("keys_dir", &self.keys_dir)
            .field("options", &self.options)
            .field("cached", &state.systems.len())
            .field("loading", &state.loading.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl KeyManager {
    /// Manager over `keys_dir` with a [`LocalKeyFetcher`] and default limits.
    pub fn new(keys_dir: impl Into<PathBuf>) -> Self {
        KeyManager {
            keys_dir: keys_dir.into(),
            fetcher: Arc::new(LocalKeyFetcher),
            options: KeyManagerOptions::default(),
            limits: ProvingConfig::default(),
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let keys = &config.keys;
        let local: Arc<dyn KeyFetcher> = Arc::new(LocalKeyFetcher);
        let fetcher: Arc<dyn KeyFetcher> = match &keys.checksum_file {
            Some(checksum_file) => Arc::new(ChecksumKeyFetcher::new(local, checksum_file)),
            None => local,
        };

        KeyManager::new(&keys.keys_dir)
            .with_fetcher(fetcher)
            .with_options(KeyManagerOptions {
                setup_on_miss: keys.setup_on_miss,
                persist_setup: keys.persist_setup,
                verify_layout: keys.verify_layout,
            })
            .with_limits(config.proving.clone())
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn KeyFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: KeyManagerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ProvingConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    /// Key file path for `shape`.
    pub fn key_path(&self, shape: &SystemShape) -> Result<PathBuf> {
        Ok(self.keys_dir.join(shape.file_name()?))
    }

    #[must_use]
    pub fn is_cached(&self, shape: &SystemShape) -> bool {
        self.read_state().systems.contains_key(shape)
    }

    #[must_use]
    pub fn cached_shapes(&self) -> Vec<SystemShape> {
        let mut shapes: Vec<_> = self.read_state().systems.keys().copied().collect();
        shapes.sort();
        shapes
    }

    /// Adds an already built system, replacing any cached one of the same shape.
    pub fn insert(&self, system: ProvingSystem) -> Arc<ProvingSystem> {
        let system = Arc::new(system);
        self.write_state()
            .systems
            .insert(system.shape(), Arc::clone(&system));
        system
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects shapes beyond the configured limits.
    pub fn check_limits(&self, shape: &SystemShape) -> Result<()> {
        shape.validate()?;
        let limits = &self.limits;
        let (heights, counts, max_count, what) = match shape {
            SystemShape::Merkle(s) => (
                vec![s.inclusion_tree_height, s.non_inclusion_tree_height],
                vec![s.inclusion_account_count, s.non_inclusion_account_count],
                limits.max_account_count,
                "account count",
            ),
            SystemShape::Batch(s) => (
                vec![s.tree_height],
                vec![s.batch_size],
                limits.max_batch_size,
                "batch size",
            ),
        };
        if let Some(height) = heights.iter().find(|&&h| h > limits.max_tree_height) {
            return Err(ProverError::shape(format!(
                "{shape}: tree height {height} exceeds the limit of {}",
                limits.max_tree_height
            )));
        }
        if let Some(count) = counts.iter().find(|&&c| c > max_count) {
            return Err(ProverError::shape(format!(
                "{shape}: {what} {count} exceeds the limit of {max_count}"
            )));
        }
        Ok(())
    }

    /// Returns the system for `shape`, loading it if needed.
    pub fn get(&self, shape: &SystemShape) -> Result<Arc<ProvingSystem>> {
        self.check_limits(shape)?;

        if let Some(system) = self.read_state().systems.get(shape) {
            return Ok(Arc::clone(system));
        }

        let (signal, is_loader) = {
            let mut state = self.write_state();
            if let Some(system) = state.systems.get(shape) {
                return Ok(Arc::clone(system));
            }
            match state.loading.get(shape) {
                Some(signal) => (Arc::clone(signal), false),
                None => {
                    let signal = Arc::new(LoadSignal::default());
                    state.loading.insert(*shape, Arc::clone(&signal));
                    (signal, true)
                }
            }
        };

        if !is_loader {
            debug!("Waiting for in-flight load of {shape}");
            return signal.wait().map_err(|reason| ProverError::KeyLoad {
                path: self.key_path(shape).unwrap_or_else(|_| self.keys_dir.clone()),
                reason,
            });
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.load(shape)))
            .unwrap_or_else(|payload| {
                Err(ProverError::KeyLoad {
                    path: self.key_path(shape).unwrap_or_else(|_| self.keys_dir.clone()),
                    reason: format!("loader panicked: {}", panic_message(payload.as_ref())),
                })
            })
            .map(Arc::new);

        {
            let mut state = self.write_state();
            state.loading.remove(shape);
            if let Ok(system) = &outcome {
                state.systems.insert(*shape, Arc::clone(system));
            }
        }

        match &outcome {
            Ok(system) => signal.complete(Ok(Arc::clone(system))),
            Err(e) => {
                error!("Failed to load {shape}: {e}");
                signal.complete(Err(e.to_string()));
            }
        }
        outcome
    }

    fn load(&self, shape: &SystemShape) -> Result<ProvingSystem> {
        let path = self.key_path(shape)?;
        let kind = KeyFileKind::for_shape(shape);
        let started = Instant::now();

        let first = self
            .fetcher
            .ensure(&path)
            .and_then(|()| self.read_checked(&path, kind, shape));
        let system = match first {
            Ok(system) => system,
            Err(_) if self.options.setup_on_miss && !path.exists() => {
                return self.setup_missing(shape, &path);
            }
            Err(e) => {
                warn!("Reading {} failed ({e}), refetching", path.display());
                self.fetcher.refetch(&path)?;
                self.read_checked(&path, kind, shape)?
            }
        };

        info!(
            "Loaded {shape} in {:.2?} ({} constraints)",
            started.elapsed(),
            system.keys().constraint_system.num_constraints
        );
        Ok(system)
    }

    fn read_checked(
        &self,
        path: &Path,
        kind: KeyFileKind,
        shape: &SystemShape,
    ) -> Result<ProvingSystem> {
        let system = read_system_from_file(path, kind)?;
        if system.shape() != *shape {
            return Err(ProverError::key_load(
                path,
                format!("file holds {}, expected {shape}", system.shape()),
            ));
        }
        if self.options.verify_layout {
            system
                .verify_layout()
                .map_err(|e| ProverError::key_load(path, e))?;
        }
        Ok(system)
    }

    fn setup_missing(&self, shape: &SystemShape, path: &Path) -> Result<ProvingSystem> {
        warn!("No key file for {shape}, running setup");
        let system = ProvingSystem::setup(shape)?;
        if self.options.persist_setup {
            write_system_to_file(&system, path)?;
        }
        Ok(system)
    }

    /// Loads every shape in `shapes`, one thread per distinct shape.
    pub fn preload(&self, shapes: &[SystemShape]) -> Result<()> {
        let mut unique = shapes.to_vec();
        unique.sort();
        unique.dedup();
        info!("Preloading {} proving systems", unique.len());

        let results: Vec<Result<()>> = thread::scope(|scope| {
            let handles: Vec<_> = unique
                .iter()
                .map(|shape| scope.spawn(move || self.get(shape).map(|_| ())))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|payload| {
                        Err(ProverError::Setup(format!(
                            "preload thread panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                    })
                })
                .collect()
        });

        results.into_iter().collect()
    }

    pub fn preload_run_mode(&self, mode: RunMode) -> Result<()> {
        info!("Preloading keys for run mode {mode}");
        self.preload(&mode.shapes())
    }

    /// Shapes named by the configuration's run mode and circuit list.
    #[must_use]
    pub fn configured_shapes(config: &Config) -> Vec<SystemShape> {
        let mut shapes = config
            .keys
            .run_mode
            .map(|mode| mode.shapes())
            .unwrap_or_default();
        for circuit in &config.keys.circuits {
            shapes.extend(shapes_for_circuit(*circuit));
        }
        shapes
    }

    /// Resolves the request's shape and proves it.
    pub fn prove(&self, request: &ProofRequest) -> Result<Proof> {
        let shape = SystemShape::for_request(request)?;
        self.get(&shape)?.prove(request)
    }

    pub fn verify(&self, shape: &SystemShape, public_inputs: &[Fr], proof: &Proof) -> Result<bool> {
        self.get(shape)?.verify(public_inputs, proof)
    }
}
