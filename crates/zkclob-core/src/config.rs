//! Configuration management for the zkCLOB client.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub circuits: CircuitsConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub pairs: PairRegistry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CircuitsConfig {
    /// Directory URL the artifacts are served from. Must end with `/`.
    pub base_url: String,
    pub wasm_file: String,
    pub zkey_file: String,
    pub vkey_file: String,
    /// Persistent artifact cache. `None` keeps artifacts in memory only.
    pub cache_dir: Option<PathBuf>,
}

impl Default for CircuitsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/circuits/".to_string(),
            wasm_file: "client.wasm".to_string(),
            zkey_file: "client.zkey".to_string(),
            vkey_file: "verification_key.json".to_string(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KeysConfig {
    /// JSON file holding cached public key info. `None` keeps it in memory.
    pub cache_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProverConfig {
    /// Run proving on a background worker, falling back to in-process proving.
    pub use_worker: bool,
    pub snarkjs_bin: String,
    /// Scratch directory for witness and proof files.
    pub work_dir: Option<PathBuf>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            use_worker: true,
            snarkjs_bin: "snarkjs".to_string(),
            work_dir: None,
        }
    }
}

/// Maps trading pair symbols to the numeric ids the sequencer expects.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct PairRegistry(HashMap<String, u64>);

impl Default for PairRegistry {
    fn default() -> Self {
        Self(HashMap::from([("HYPE-USDC".to_string(), 1)]))
    }
}

impl PairRegistry {
    pub fn insert(&mut self, symbol: impl Into<String>, id: u64) {
        self.0.insert(symbol.into(), id);
    }

    /// Numeric id for a pair symbol.
    pub fn pair_id(&self, symbol: &str) -> Result<u64> {
        self.0.get(symbol).copied().ok_or_else(|| Error::InvalidOrder {
            message: format!("unknown trading pair {}", symbol),
        })
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let timeout_secs = match env::var("ZKCLOB_BACKEND_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| Error::Config {
                message: format!("ZKCLOB_BACKEND_TIMEOUT_SECS is not a number: {}", raw),
            })?,
            Err(_) => defaults.backend.timeout_secs,
        };

        Ok(Self {
            backend: BackendConfig {
                url: env::var("ZKCLOB_BACKEND_URL").unwrap_or(defaults.backend.url),
                timeout_secs,
            },
            circuits: CircuitsConfig {
                base_url: env::var("ZKCLOB_CIRCUITS_URL").unwrap_or(defaults.circuits.base_url),
                cache_dir: env::var("ZKCLOB_ARTIFACT_CACHE_DIR").ok().map(PathBuf::from),
                ..defaults.circuits
            },
            keys: KeysConfig {
                cache_path: env::var("ZKCLOB_KEY_CACHE_PATH").ok().map(PathBuf::from),
            },
            prover: ProverConfig {
                use_worker: env::var("ZKCLOB_USE_WORKER")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.prover.use_worker),
                snarkjs_bin: env::var("ZKCLOB_SNARKJS_BIN").unwrap_or(defaults.prover.snarkjs_bin),
                work_dir: env::var("ZKCLOB_PROVER_WORK_DIR").ok().map(PathBuf::from),
            },
            pairs: defaults.pairs,
        })
    }

    /// Load a config file, with `ZKCLOB__SECTION__KEY` environment overrides.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("ZKCLOB").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        if !config.circuits.base_url.ends_with('/') {
            return Err(Error::Config {
                message: format!(
                    "circuits.base_url must end with '/': {}",
                    config.circuits.base_url
                ),
            });
        }
        Ok(config)
    }

    /// Load configuration for testing (with defaults).
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            prover: ProverConfig {
                use_worker: false,
                ..ProverConfig::default()
            },
            ..Self::default()
        }
    }
}
