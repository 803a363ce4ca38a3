//! Trading key derivation from a wallet signature.
//!
//! ```text
//! entropy = "0x" ‖ hex(wallet signature)
//! h_0     = hex(sha256(entropy ‖ MESSAGE ‖ "0"))
//! h_i     = hex(sha256(h_{i-1} ‖ MESSAGE ‖ decimal(i)))     i < 10_000
//! key     = bytes(h_9999)
//! ```
//!
//! Every intermediate buffer is zeroized on drop. The derived key is
//! written into a caller-owned buffer, the caller is responsible for
//! scrubbing it.

use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;
use zkclob_core::signing::PrivateKeyBytes;
use zkclob_core::{Error, Result};

use crate::wallet::WalletSigner;

/// Domain separation string; also the message the wallet signs.
pub const DERIVATION_MESSAGE: &str = "zkCLOB Trading Key Derivation v1 - DETERMINISTIC";
pub const DERIVATION_ROUNDS: u32 = 10_000;

/// Stretch `wallet_signature` into trading key bytes.
pub fn derive_private_key(wallet_signature: &[u8], out: &mut PrivateKeyBytes) -> Result<()> {
    if wallet_signature.is_empty() {
        return Err(Error::KeyDerivation {
            message: "empty wallet signature".to_string(),
        });
    }

    let mut entropy = Zeroizing::new(vec![0u8; 2 + wallet_signature.len() * 2]);
    entropy[..2].copy_from_slice(b"0x");
    hex::encode_to_slice(wallet_signature, &mut entropy[2..])
        .expect("entropy buffer sized for hex signature");

    let mut digest = Zeroizing::new([0u8; 32]);
    let mut digest_hex = Zeroizing::new([0u8; 64]);

    for round in 0..DERIVATION_ROUNDS {
        let mut hasher = Sha256::new();
        if round == 0 {
            hasher.update(&entropy[..]);
        } else {
            hasher.update(&digest_hex[..]);
        }
        hasher.update(DERIVATION_MESSAGE.as_bytes());
        hasher.update(round.to_string().as_bytes());
        digest.copy_from_slice(&hasher.finalize());
        hex::encode_to_slice(&digest[..], &mut digest_hex[..])
            .expect("64-byte buffer holds a hex sha256 digest");
    }

    out.copy_from_slice(&digest[..]);
    Ok(())
}

/// Prompt the wallet for the derivation signature and stretch it into `out`.
pub async fn derive_from_wallet(wallet: &dyn WalletSigner, out: &mut PrivateKeyBytes) -> Result<()> {
    debug!(rounds = DERIVATION_ROUNDS, "Requesting wallet signature for key derivation");

    let signature = Zeroizing::new(wallet.sign_message(DERIVATION_MESSAGE).await.map_err(|e| {
        match e {
            Error::KeyDerivation { .. } => e,
            other => Error::KeyDerivation {
                message: format!("wallet signature unavailable: {}", other),
            },
        }
    })?);

    derive_private_key(&signature, out)
}
