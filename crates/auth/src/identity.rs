//! Identity (KYC) verification registry.
//!
//! Holds the locally known verification outcome per wallet; order
//! submission refuses to start for wallets not marked verified.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;

#[derive(Debug, Default)]
pub struct IdentityRegistry {
    verified: DashMap<String, DateTime<Utc>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_verified(&self, address: &str) {
        let address = address.to_lowercase();
        info!(address = %address, "Identity verified");
        self.verified.insert(address, Utc::now());
    }

    pub fn is_verified(&self, address: &str) -> bool {
        self.verified.contains_key(&address.to_lowercase())
    }

    /// When `address` was marked verified.
    pub fn verified_at(&self, address: &str) -> Option<DateTime<Utc>> {
        self.verified.get(&address.to_lowercase()).map(|entry| *entry)
    }

    /// Forget the verification for `address`.
    pub fn reset(&self, address: &str) {
        self.verified.remove(&address.to_lowercase());
    }

    pub fn reset_all(&self) {
        self.verified.clear();
    }
}
