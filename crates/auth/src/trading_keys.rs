//! Trading key management.
//!
//! The private key is re-derived from a wallet signature for every use and
//! scrubbed before the call returns; only the public [`TradingKeyInfo`] is
//! cached.

use chrono::Utc;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroize;
use zkclob_core::curve::Point;
use zkclob_core::signing::{eddsa, encode_bytes, EdDSASignature, EncodedSignature, PrivateKeyBytes};
use zkclob_core::types::{OrderParams, TradingKeyInfo, KEY_VERSION};
use zkclob_core::{Error, Result};

use crate::derivation::derive_from_wallet;
use crate::key_cache::KeyInfoCache;
use crate::wallet::WalletSigner;

/// Zeroes the borrowed key buffer when dropped, on every exit path.
struct ScrubGuard<'a>(&'a mut PrivateKeyBytes);

impl Deref for ScrubGuard<'_> {
    type Target = PrivateKeyBytes;

    fn deref(&self) -> &PrivateKeyBytes {
        self.0
    }
}

impl DerefMut for ScrubGuard<'_> {
    fn deref_mut(&mut self) -> &mut PrivateKeyBytes {
        self.0
    }
}

impl Drop for ScrubGuard<'_> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Lowercase `0x` address of the connected wallet.
pub fn wallet_address(wallet: &dyn WalletSigner) -> Result<String> {
    wallet
        .address()
        .map(|address| format!("{:#x}", address))
        .ok_or_else(|| Error::KeyDerivation {
            message: "no wallet address available".to_string(),
        })
}

pub struct TradingKeyManager {
    cache: Arc<KeyInfoCache>,
}

impl TradingKeyManager {
    pub fn new(cache: Arc<KeyInfoCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<KeyInfoCache> {
        &self.cache
    }

    /// Cached key info for the wallet, deriving and caching it when absent
    /// or stale.
    pub async fn get_trading_key_info(&self, wallet: &dyn WalletSigner) -> Result<TradingKeyInfo> {
        let address = wallet_address(wallet)?;

        if let Some(cached) = self.cache.get(&address).await {
            if cached.is_valid() {
                debug!(address = %address, "Using cached trading key info");
                return Ok(cached);
            }
            debug!(address = %address, key_version = cached.key_version, "Cached trading key info is stale");
        }

        let key_info = self.derive_key_info(wallet, &address).await?;

        if let Err(e) = self.cache.put(&key_info).await {
            warn!(address = %address, error = %e, "Failed to cache trading key info");
        }

        info!(address = %address, "Derived trading key");
        Ok(key_info)
    }

    async fn derive_key_info(&self, wallet: &dyn WalletSigner, address: &str) -> Result<TradingKeyInfo> {
        let mut scratch = [0u8; 32];
        let key = ScrubGuard(&mut scratch);
        self.public_key_into(wallet, key).await.map(|public_key| TradingKeyInfo {
            public_key: public_key.to_decimal_strings(),
            derived_at: Utc::now(),
            wallet_address: address.to_string(),
            key_version: KEY_VERSION,
        })
    }

    async fn public_key_into(&self, wallet: &dyn WalletSigner, mut key: ScrubGuard<'_>) -> Result<Point> {
        derive_from_wallet(wallet, &mut key).await?;
        Ok(eddsa::public_key(&key))
    }

    /// Sign the encoded order message with a freshly derived key.
    pub async fn sign_order_message(
        &self,
        wallet: &dyn WalletSigner,
        params: &OrderParams,
    ) -> Result<EdDSASignature> {
        let mut scratch = [0u8; 32];
        self.sign_with_scratch(wallet, params, &mut scratch).await
    }

    /// Signing body; the key lives only in `scratch`, which is zeroed before
    /// this returns.
    async fn sign_with_scratch(
        &self,
        wallet: &dyn WalletSigner,
        params: &OrderParams,
        scratch: &mut PrivateKeyBytes,
    ) -> Result<EdDSASignature> {
        let mut key = ScrubGuard(scratch);

        let message = encode_bytes(params)?;

        derive_from_wallet(wallet, &mut key).await.map_err(|e| Error::Signing {
            message: format!("order signing failed: {}", e),
        })?;

        let signature = eddsa::sign(&key, &message).map_err(|e| match e {
            Error::Signing { .. } => e,
            other => Error::Signing {
                message: format!("order signing failed: {}", other),
            },
        })?;

        if !eddsa::verify(&eddsa::public_key(&key), &signature, &message) {
            return Err(Error::Signing {
                message: "signature failed self-verification".to_string(),
            });
        }

        debug!(nonce = %params.nonce, "Order message signed");
        Ok(signature)
    }

    /// Whether valid key info is cached for `address`.
    pub async fn has_trading_keys(&self, address: &str) -> bool {
        self.cache
            .get(address)
            .await
            .is_some_and(|info| info.is_valid())
    }

    pub async fn clear_trading_keys(&self, address: &str) -> Result<()> {
        self.cache.remove(address).await.map(|_| ())
    }

    /// Invalidate the cached key info and derive it again.
    pub async fn force_key_refresh(&self, wallet: &dyn WalletSigner) -> Result<TradingKeyInfo> {
        let address = wallet_address(wallet)?;
        self.clear_trading_keys(&address).await?;
        self.get_trading_key_info(wallet).await
    }

    pub fn current_key_version() -> u32 {
        KEY_VERSION
    }

    /// Verify a transported signature over `message` against decimal
    /// public key coordinates. Malformed inputs verify as `false`.
    pub fn verify_signature(public_key: &[String; 2], signature: &EncodedSignature, message: &[u8]) -> bool {
        let Ok(public_key) = Point::from_decimal_strings(public_key) else {
            return false;
        };
        let Ok(signature) = EdDSASignature::decode(signature) else {
            return false;
        };
        eddsa::verify(&public_key, &signature, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{MockWalletSigner, TradingWallet};
    use alloy_primitives::{Address, U256};
    use chrono::Duration;
    use zkclob_core::signing::pair_id_hash;

    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    fn manager() -> TradingKeyManager {
        TradingKeyManager::new(Arc::new(KeyInfoCache::memory()))
    }

    fn wallet() -> TradingWallet {
        TradingWallet::from_private_key(TEST_PRIVATE_KEY).unwrap()
    }

    fn params() -> OrderParams {
        OrderParams::new(
            pair_id_hash("HYPE-USDC"),
            1,
            U256::ZERO,
            U256::from(50_000_000u64),
            U256::from(5_870_000u64),
            U256::from(4242u64),
        )
    }

    fn counting_wallet(expected_calls: usize) -> MockWalletSigner {
        let mut wallet = MockWalletSigner::new();
        wallet
            .expect_address()
            .returning(|| Some(Address::repeat_byte(0xab)));
        wallet
            .expect_sign_message()
            .times(expected_calls)
            .returning(|_| Ok(vec![0x11; 65]));
        wallet
    }

    #[tokio::test]
    async fn test_key_info_is_cached_by_lowercase_address() {
        let manager = manager();
        let wallet = counting_wallet(1);

        let first = manager.get_trading_key_info(&wallet).await.unwrap();
        let second = manager.get_trading_key_info(&wallet).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.wallet_address, format!("{:#x}", Address::repeat_byte(0xab)));
        assert_eq!(first.key_version, TradingKeyManager::current_key_version());
        assert!(manager.has_trading_keys(&first.wallet_address.to_uppercase()).await);
    }

    #[tokio::test]
    async fn test_stale_info_is_rederived() {
        let manager = manager();
        let wallet = counting_wallet(2);

        let mut info = manager.get_trading_key_info(&wallet).await.unwrap();
        info.derived_at = Utc::now() - Duration::hours(25);
        manager.cache().put(&info).await.unwrap();
        assert!(!manager.has_trading_keys(&info.wallet_address).await);

        let fresh = manager.get_trading_key_info(&wallet).await.unwrap();
        assert_eq!(fresh.public_key, info.public_key);
        assert!(fresh.is_valid());
    }

    #[tokio::test]
    async fn test_clear_and_force_refresh() {
        let manager = manager();
        let wallet = counting_wallet(2);

        let info = manager.get_trading_key_info(&wallet).await.unwrap();
        manager.clear_trading_keys(&info.wallet_address).await.unwrap();
        assert!(!manager.has_trading_keys(&info.wallet_address).await);

        let refreshed = manager.force_key_refresh(&wallet).await.unwrap();
        assert_eq!(refreshed.public_key, info.public_key);
        assert!(manager.has_trading_keys(&info.wallet_address).await);
    }

    #[tokio::test]
    async fn test_disconnected_wallet() {
        let mut wallet = MockWalletSigner::new();
        wallet.expect_address().returning(|| None);
        wallet.expect_sign_message().times(0);

        assert!(matches!(
            manager().get_trading_key_info(&wallet).await,
            Err(Error::KeyDerivation { .. })
        ));
    }

    #[tokio::test]
    async fn test_signature_verifies_against_cached_public_key() {
        let manager = manager();
        let wallet = wallet();

        let info = manager.get_trading_key_info(&wallet).await.unwrap();
        assert_eq!(info.wallet_address, TEST_ADDRESS);

        let params = params();
        let signature = manager.sign_order_message(&wallet, &params).await.unwrap();
        let message = encode_bytes(&params).unwrap();

        assert!(TradingKeyManager::verify_signature(&info.public_key, &signature.encode(), &message));
        assert!(!TradingKeyManager::verify_signature(&info.public_key, &signature.encode(), &[0u8; 60]));
    }

    #[tokio::test]
    async fn test_signing_twice_is_deterministic() {
        let manager = manager();
        let wallet = counting_wallet(2);

        let first = manager.sign_order_message(&wallet, &params()).await.unwrap();
        let second = manager.sign_order_message(&wallet, &params()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_scratch_key_is_zeroed_after_success() {
        let manager = manager();
        let wallet = counting_wallet(1);

        let mut scratch = [0u8; 32];
        manager.sign_with_scratch(&wallet, &params(), &mut scratch).await.unwrap();
        assert_eq!(scratch, [0u8; 32]);
    }

    #[tokio::test]
    async fn test_scratch_key_is_zeroed_after_failure() {
        let manager = manager();

        // Wallet rejects after the scratch buffer already holds stale bytes.
        let mut wallet = MockWalletSigner::new();
        wallet.expect_sign_message().returning(|_| {
            Err(Error::KeyDerivation {
                message: "user rejected".to_string(),
            })
        });
        let mut scratch = [0x5au8; 32];
        let err = manager
            .sign_with_scratch(&wallet, &params(), &mut scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Signing { .. }));
        assert_eq!(scratch, [0u8; 32]);

        // Out-of-range order rejected before any wallet prompt.
        let mut no_prompt = MockWalletSigner::new();
        no_prompt.expect_sign_message().times(0);
        let mut bad = params();
        bad.time_bucket = U256::from(u64::from(u32::MAX) + 1);
        let mut scratch = [0x5au8; 32];
        let err = manager
            .sign_with_scratch(&no_prompt, &bad, &mut scratch)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Range { field: "time_bucket", .. }));
        assert_eq!(scratch, [0u8; 32]);
    }

    #[test]
    fn test_verify_signature_rejects_malformed_inputs() {
        let garbage = EncodedSignature {
            r8: ["1".to_string(), "2".to_string()],
            s: "3".to_string(),
        };
        let key = ["0".to_string(), "1".to_string()];
        assert!(!TradingKeyManager::verify_signature(&key, &garbage, b"message"));
        assert!(!TradingKeyManager::verify_signature(
            &["x".to_string(), "y".to_string()],
            &garbage,
            b"message"
        ));
    }
}
