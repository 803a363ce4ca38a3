//! Circuit artifact loading and caching.
//!
//! [`CircuitLoader`] resolves the three circuit artifacts (witness program,
//! proving key, verification key) at most once per process. Concurrent
//! callers share one in-flight load; a persistent [`ArtifactStore`] is
//! consulted before the network on every cold start.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use zkclob_core::config::CircuitsConfig;
use zkclob_core::types::CircuitArtifacts;
use zkclob_core::{Error, Result};

fn artifact_error(artifact: &str, message: impl ToString) -> Error {
    Error::ArtifactLoad {
        artifact: artifact.to_string(),
        message: message.to_string(),
    }
}

/// Where artifacts are fetched from when no stored copy exists.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>>;
}

/// Fetches artifacts relative to a base URL.
pub struct HttpArtifactSource {
    base_url: Url,
    http_client: reqwest::Client,
}

impl HttpArtifactSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Config {
            message: format!("invalid circuits base URL {}: {}", base_url, e),
        })?;
        let http_client = reqwest::Client::builder()
            .connect_timeout(StdDuration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn url_for(&self, name: &str) -> Result<Url> {
        self.base_url
            .join(name)
            .map_err(|e| artifact_error(name, format!("invalid artifact URL: {}", e)))
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.url_for(name)?;
        debug!(url = %url, "Fetching circuit artifact");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| artifact_error(name, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(artifact_error(name, format!("HTTP {}", status)));
        }

        let bytes = response.bytes().await.map_err(|e| artifact_error(name, e))?;
        Ok(bytes.to_vec())
    }
}

/// A persisted artifact and when it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub data: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

/// Persistent artifact cache keyed by artifact file name.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<StoredArtifact>>;
    async fn put(&self, name: &str, data: &[u8]) -> Result<()>;
    /// Purge every stored artifact.
    async fn clear(&self) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryArtifactStore {
    entries: RwLock<HashMap<String, StoredArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn get(&self, name: &str) -> Result<Option<StoredArtifact>> {
        Ok(self.entries.read().await.get(name).cloned())
    }

    async fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        self.entries.write().await.insert(
            name.to_string(),
            StoredArtifact {
                data: data.to_vec(),
                stored_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// One file per artifact inside a dedicated directory.
pub struct DiskArtifactStore {
    dir: PathBuf,
}

impl DiskArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        match Path::new(name).file_name() {
            Some(file) if file == name => Ok(self.dir.join(file)),
            _ => Err(artifact_error(name, "artifact name must be a plain file name")),
        }
    }
}

#[async_trait]
impl ArtifactStore for DiskArtifactStore {
    async fn get(&self, name: &str) -> Result<Option<StoredArtifact>> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read(&path).await?;
        let stored_at = tokio::fs::metadata(&path)
            .await?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Some(StoredArtifact { data, stored_at }))
    }

    async fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        // Write-then-rename so a crash never leaves a truncated artifact.
        let partial = self.dir.join(format!(".{}.partial", name));
        tokio::fs::write(&partial, data).await?;
        tokio::fs::rename(&partial, &path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

/// File names of the three artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub wasm: String,
    pub zkey: String,
    pub verification_key: String,
}

impl From<&CircuitsConfig> for ArtifactNames {
    fn from(config: &CircuitsConfig) -> Self {
        Self {
            wasm: config.wasm_file.clone(),
            zkey: config.zkey_file.clone(),
            verification_key: config.vkey_file.clone(),
        }
    }
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self::from(&CircuitsConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Error,
}

/// Cloneable load failure, shared by every caller of one in-flight load.
#[derive(Debug, Clone)]
struct LoadFailure {
    artifact: String,
    message: String,
}

impl LoadFailure {
    fn new(artifact: &str, error: Error) -> Self {
        match error {
            Error::ArtifactLoad { artifact, message } => Self { artifact, message },
            other => Self {
                artifact: artifact.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<LoadFailure> for Error {
    fn from(failure: LoadFailure) -> Self {
        Error::ArtifactLoad {
            artifact: failure.artifact,
            message: failure.message,
        }
    }
}

type LoadResult = std::result::Result<Arc<CircuitArtifacts>, LoadFailure>;
type InFlight = Shared<BoxFuture<'static, LoadResult>>;

struct LoaderInner {
    source: Arc<dyn ArtifactSource>,
    store: Arc<dyn ArtifactStore>,
    names: ArtifactNames,
}

impl LoaderInner {
    async fn load(&self) -> LoadResult {
        if let Some(artifacts) = self.load_from_store().await {
            info!(
                wasm_bytes = artifacts.wasm.len(),
                zkey_bytes = artifacts.zkey.len(),
                "Using stored circuit artifacts"
            );
            return Ok(Arc::new(artifacts));
        }

        info!("Fetching circuit artifacts");
        let names = &self.names;
        let (wasm, zkey, vkey) = tokio::try_join!(
            self.fetch(&names.wasm),
            self.fetch(&names.zkey),
            self.fetch(&names.verification_key),
        )?;

        let verification_key = serde_json::from_slice(&vkey)
            .map_err(|e| LoadFailure::new(&names.verification_key, e.into()))?;

        for (name, data) in [(&names.wasm, &wasm), (&names.zkey, &zkey), (&names.verification_key, &vkey)] {
            if let Err(e) = self.store.put(name, data).await {
                warn!(artifact = %name, error = %e, "Failed to store circuit artifact");
            }
        }

        info!(
            wasm_bytes = wasm.len(),
            zkey_bytes = zkey.len(),
            "Circuit artifacts loaded"
        );

        Ok(Arc::new(CircuitArtifacts {
            wasm,
            zkey,
            verification_key,
        }))
    }

    async fn fetch(&self, name: &str) -> std::result::Result<Vec<u8>, LoadFailure> {
        self.source
            .fetch(name)
            .await
            .map_err(|e| LoadFailure::new(name, e))
    }

    /// A complete stored set, or `None` when anything is missing or unreadable.
    async fn load_from_store(&self) -> Option<CircuitArtifacts> {
        let names = &self.names;
        let (wasm, zkey, vkey) = match tokio::try_join!(
            self.store.get(&names.wasm),
            self.store.get(&names.zkey),
            self.store.get(&names.verification_key),
        ) {
            Ok((Some(wasm), Some(zkey), Some(vkey))) => (wasm, zkey, vkey),
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read artifact store");
                return None;
            }
        };

        match serde_json::from_slice(&vkey.data) {
            Ok(verification_key) => Some(CircuitArtifacts {
                wasm: wasm.data,
                zkey: zkey.data,
                verification_key,
            }),
            Err(e) => {
                warn!(error = %e, "Stored verification key is corrupt");
                None
            }
        }
    }
}

struct LoaderState {
    status: LoadStatus,
    artifacts: Option<Arc<CircuitArtifacts>>,
    in_flight: Option<InFlight>,
}

/// Process-wide artifact loader with request coalescing.
pub struct CircuitLoader {
    inner: Arc<LoaderInner>,
    state: Mutex<LoaderState>,
}

impl CircuitLoader {
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        store: Arc<dyn ArtifactStore>,
        names: ArtifactNames,
    ) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                source,
                store,
                names,
            }),
            state: Mutex::new(LoaderState {
                status: LoadStatus::Idle,
                artifacts: None,
                in_flight: None,
            }),
        }
    }

    /// HTTP source plus a disk store when `cache_dir` is set, memory otherwise.
    pub fn from_config(config: &CircuitsConfig) -> Result<Self> {
        let source = Arc::new(HttpArtifactSource::new(&config.base_url)?);
        let store: Arc<dyn ArtifactStore> = match &config.cache_dir {
            Some(dir) => Arc::new(DiskArtifactStore::new(dir)),
            None => Arc::new(MemoryArtifactStore::new()),
        };
        Ok(Self::new(source, store, ArtifactNames::from(config)))
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve the artifacts, joining any load already in flight.
    pub async fn load_artifacts(&self) -> Result<Arc<CircuitArtifacts>> {
        let in_flight = {
            let mut state = self.lock();
            if let Some(artifacts) = &state.artifacts {
                return Ok(Arc::clone(artifacts));
            }
            match &state.in_flight {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let in_flight = async move { inner.load().await }.boxed().shared();
                    state.in_flight = Some(in_flight.clone());
                    state.status = LoadStatus::Loading;
                    in_flight
                }
            }
        };

        let result = in_flight.clone().await;

        {
            let mut state = self.lock();
            let current = state
                .in_flight
                .as_ref()
                .is_some_and(|flight| flight.ptr_eq(&in_flight));
            if current {
                state.in_flight = None;
                match &result {
                    Ok(artifacts) => {
                        state.artifacts = Some(Arc::clone(artifacts));
                        state.status = LoadStatus::Loaded;
                    }
                    Err(failure) => {
                        warn!(artifact = %failure.artifact, error = %failure.message, "Circuit artifact load failed");
                        state.status = LoadStatus::Error;
                    }
                }
            }
        }

        result.map_err(Error::from)
    }

    pub fn status(&self) -> LoadStatus {
        self.lock().status
    }

    pub fn is_loaded(&self) -> bool {
        let state = self.lock();
        state.status == LoadStatus::Loaded && state.artifacts.is_some()
    }

    /// Drop in-memory artifacts, abandon any in-flight load and purge the
    /// persistent store.
    pub async fn clear_cache(&self) -> Result<()> {
        {
            let mut state = self.lock();
            state.artifacts = None;
            state.in_flight = None;
            state.status = LoadStatus::Idle;
        }
        self.inner.store.clear().await?;
        info!("Circuit artifact cache cleared");
        Ok(())
    }
}
