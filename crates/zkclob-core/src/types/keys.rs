//! Public trading key metadata.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Version of the key derivation scheme. Bumping it invalidates every cached key.
pub const KEY_VERSION: u32 = 1;

/// How long cached key info is trusted before re-derivation.
pub const KEY_INFO_MAX_AGE_HOURS: i64 = 24;

/// Public half of a derived trading key.
///
/// Never holds private material; safe to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingKeyInfo {
    /// BabyJubjub public key coordinates as decimal strings.
    pub public_key: [String; 2],
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub derived_at: DateTime<Utc>,
    /// Lowercase `0x` address of the wallet the key was derived from.
    pub wallet_address: String,
    pub key_version: u32,
}

impl TradingKeyInfo {
    /// Valid when younger than 24 hours and derived with the current scheme.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.derived_at);
        age < Duration::hours(KEY_INFO_MAX_AGE_HOURS) && self.key_version == KEY_VERSION
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(derived_at: DateTime<Utc>, key_version: u32) -> TradingKeyInfo {
        TradingKeyInfo {
            public_key: ["1".to_string(), "2".to_string()],
            derived_at,
            wallet_address: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
            key_version,
        }
    }

    #[test]
    fn test_fresh_current_version_is_valid() {
        let now = Utc::now();
        assert!(info(now - Duration::hours(1), KEY_VERSION).is_valid_at(now));
    }

    #[test]
    fn test_previous_version_is_invalid() {
        let now = Utc::now();
        assert!(!info(now, KEY_VERSION - 1).is_valid_at(now));
    }

    #[test]
    fn test_expired_after_24_hours() {
        let now = Utc::now();
        assert!(!info(now - Duration::hours(24), KEY_VERSION).is_valid_at(now));
        assert!(!info(now - Duration::hours(25), KEY_VERSION).is_valid_at(now));
    }

    #[test]
    fn test_json_layout() {
        let derived_at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let json = serde_json::to_value(info(derived_at, KEY_VERSION)).unwrap();
        assert_eq!(json["derivedAt"], 1_700_000_000_000i64);
        assert_eq!(json["keyVersion"], 1);
        assert_eq!(json["publicKey"][0], "1");
        assert!(json.get("walletAddress").is_some());
    }
}
