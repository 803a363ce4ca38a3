//! Public trading key info cache.
//!
//! Only [`TradingKeyInfo`] (public key, derivation time, version) is ever
//! stored; private key material never reaches this module. Entries are keyed
//! by lowercase wallet address, one per address, replaced wholesale.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zkclob_core::config::KeysConfig;
use zkclob_core::types::TradingKeyInfo;
use zkclob_core::Result;

const CACHE_KEY_PREFIX: &str = "zkclob_trading_key_";

/// Storage key for an address: `zkclob_trading_key_<lowercase address>`.
pub fn cache_key(address: &str) -> String {
    format!("{}{}", CACHE_KEY_PREFIX, address.to_lowercase())
}

/// Backing store for the cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum KeyInfoCacheProvider {
    /// Process lifetime only.
    #[default]
    Memory,
    /// JSON object of `cache_key -> TradingKeyInfo`.
    File { path: PathBuf },
}

pub struct KeyInfoCache {
    provider: KeyInfoCacheProvider,
    cache: Arc<RwLock<HashMap<String, TradingKeyInfo>>>,
    /// Serializes read-modify-write cycles on the backing file.
    file_lock: Mutex<()>,
}

impl KeyInfoCache {
    pub fn new(provider: KeyInfoCacheProvider) -> Self {
        Self {
            provider,
            cache: Arc::new(RwLock::new(HashMap::new())),
            file_lock: Mutex::new(()),
        }
    }

    pub fn memory() -> Self {
        Self::new(KeyInfoCacheProvider::Memory)
    }

    pub fn from_config(config: &KeysConfig) -> Self {
        match &config.cache_path {
            Some(path) => Self::new(KeyInfoCacheProvider::File { path: path.clone() }),
            None => Self::memory(),
        }
    }

    pub fn provider(&self) -> &KeyInfoCacheProvider {
        &self.provider
    }

    /// Cached info for `address`, whether or not it is still valid.
    ///
    /// Unreadable or malformed persisted entries read as absent.
    pub async fn get(&self, address: &str) -> Option<TradingKeyInfo> {
        let key = cache_key(address);

        {
            let cache = self.cache.read().await;
            if let Some(info) = cache.get(&key) {
                return Some(info.clone());
            }
        }

        let KeyInfoCacheProvider::File { path } = &self.provider else {
            return None;
        };

        let info = match load_file(path).await {
            Ok(mut entries) => entries.remove(&key),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable key info cache");
                None
            }
        }?;

        let mut cache = self.cache.write().await;
        cache.insert(key, info.clone());
        Some(info)
    }

    /// Store `info` under its wallet address, replacing any previous entry.
    pub async fn put(&self, info: &TradingKeyInfo) -> Result<()> {
        let key = cache_key(&info.wallet_address);

        if let KeyInfoCacheProvider::File { path } = &self.provider {
            let _guard = self.file_lock.lock().await;
            let mut entries = load_file(path).await.unwrap_or_default();
            entries.insert(key.clone(), info.clone());
            store_file(path, &entries).await?;
        }

        let mut cache = self.cache.write().await;
        cache.insert(key, info.clone());

        debug!(address = %info.wallet_address, "Cached trading key info");
        Ok(())
    }

    /// Drop the entry for `address` from memory and persistent storage.
    pub async fn remove(&self, address: &str) -> Result<bool> {
        let key = cache_key(address);

        let mut removed = {
            let mut cache = self.cache.write().await;
            cache.remove(&key).is_some()
        };

        if let KeyInfoCacheProvider::File { path } = &self.provider {
            let _guard = self.file_lock.lock().await;
            if path.exists() {
                let mut entries = load_file(path).await.unwrap_or_default();
                removed |= entries.remove(&key).is_some();
                store_file(path, &entries).await?;
            }
        }

        if removed {
            info!(address = %address.to_lowercase(), "Trading key info removed");
        }
        Ok(removed)
    }

    /// Forget in-memory entries; persisted entries are reloaded on demand.
    pub async fn clear_memory(&self) {
        self.cache.write().await.clear();
    }
}

async fn load_file(path: &Path) -> Result<HashMap<String, TradingKeyInfo>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

async fn store_file(path: &Path, entries: &HashMap<String, TradingKeyInfo>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let content = serde_json::to_string_pretty(entries)?;
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, content).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}
