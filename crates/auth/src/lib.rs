//! Authentication and Trading Keys
//!
//! Wallet access, trading key derivation and order signing, the public key
//! info cache, and the identity (KYC) registry.

pub mod derivation;
pub mod identity;
pub mod key_cache;
pub mod trading_keys;
pub mod wallet;

pub use derivation::{derive_private_key, DERIVATION_MESSAGE, DERIVATION_ROUNDS};
pub use identity::IdentityRegistry;
pub use key_cache::{cache_key, KeyInfoCache, KeyInfoCacheProvider};
pub use trading_keys::TradingKeyManager;
pub use wallet::{TradingWallet, WalletSigner};
