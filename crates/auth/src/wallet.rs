//! Wallet access for trading key derivation.
//!
//! The wallet only ever signs the fixed derivation message; its signature is
//! the entropy the trading key is stretched from.

use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use async_trait::async_trait;
use std::str::FromStr;
use zkclob_core::{Error, Result};

/// A connected wallet able to produce personal-sign signatures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Connected account, `None` while disconnected.
    fn address(&self) -> Option<Address>;

    /// EIP-191 personal sign over `message`, returning the 65-byte signature.
    ///
    /// A rejected or failed prompt is a [`Error::KeyDerivation`].
    async fn sign_message(&self, message: &str) -> Result<Vec<u8>>;
}

/// A local wallet backed by a raw secp256k1 key.
#[derive(Clone)]
pub struct TradingWallet {
    signer: PrivateKeySigner,
    address: Address,
}

impl TradingWallet {
    /// Load wallet from the `WALLET_PRIVATE_KEY` environment variable.
    ///
    /// The private key should be a 64-character hex string, optionally
    /// prefixed with "0x".
    pub fn from_env() -> anyhow::Result<Self> {
        let private_key = std::env::var("WALLET_PRIVATE_KEY")
            .context("WALLET_PRIVATE_KEY environment variable not set")?;

        Self::from_private_key(&private_key)
    }

    /// Create a wallet from a hex-encoded private key.
    pub fn from_private_key(key: &str) -> anyhow::Result<Self> {
        let key_clean = key.trim().trim_start_matches("0x");

        let signer = PrivateKeySigner::from_str(key_clean)
            .context("Invalid private key format - expected 64 hex characters")?;
        let address = signer.address();

        Ok(Self { signer, address })
    }

    /// Lowercase `0x` address, the form key info is cached under.
    pub fn address_lower(&self) -> String {
        format!("{:#x}", self.address)
    }
}

#[async_trait]
impl WalletSigner for TradingWallet {
    fn address(&self) -> Option<Address> {
        Some(self.address)
    }

    async fn sign_message(&self, message: &str) -> Result<Vec<u8>> {
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| Error::KeyDerivation {
                message: format!("wallet signature unavailable: {}", e),
            })?;
        Ok(signature.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for TradingWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingWallet")
            .field("address", &self.address_lower())
            .finish()
    }
}
