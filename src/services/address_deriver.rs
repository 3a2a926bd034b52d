//! # Address Deriver Service
//!
//! Derives the receive address for a crypto-denominated card from the
//! owning user's id and the card currency. Derivation is pure and
//! deterministic: the same `(user_id, currency)` pair always yields the
//! same address, and no I/O happens here. Persisting the result onto
//! the card is the caller's job, done exactly once per card.
//!
//! ## Derivation
//!
//! ```text
//! digest  = SHA-256(salt || "card-addr-v1" || currency || user_id_be)
//! payload = digest[..20]
//!
//! BTC: Base58Check(version 0x00, payload)      e.g. 1BoatSLRHt...
//! ETH: EIP-55 checksummed hex of payload       e.g. 0x52908400...
//! ```
//!
//! The salt is a process-wide secret from configuration, initialized
//! once at startup and read-only thereafter. Deriving from a keyed
//! hash keeps addresses unguessable from user ids and makes collisions
//! between distinct users cryptographically negligible.

use sha2::{Digest, Sha256};
use sha3::Keccak256;

use crate::db::models::CurrencyKind;
use crate::error::CoreError;

/// Domain tag mixed into every digest, versioned so a future scheme
/// change cannot collide with addresses derived under this one.
const DERIVATION_TAG: &[u8] = b"card-addr-v1";

/// Version byte for BTC legacy P2PKH addresses.
const BTC_MAINNET_VERSION: u8 = 0x00;

/// Derives receive addresses for crypto cards.
///
/// ## Usage
///
/// ```rust,ignore
/// let deriver = AddressDeriver::new(config.address_derivation_secret.clone());
/// let address = deriver.derive(42, CurrencyKind::Btc)?;
/// ```
#[derive(Clone)]
pub struct AddressDeriver {
    /// Process-wide secret salt.
    salt: Vec<u8>,
}

impl AddressDeriver {
    /// Create a deriver with the given secret salt.
    pub fn new(salt: Vec<u8>) -> Self {
        Self { salt }
    }

    /// Derive the receive address for `(user_id, currency)`.
    ///
    /// ## Arguments
    ///
    /// * `user_id` - The owning user's account id, must be positive
    /// * `currency` - Target network; only crypto kinds are derivable
    ///
    /// ## Returns
    ///
    /// * `Ok(String)` - A structurally valid address for the network
    /// * `Err(CoreError::InvalidInput)` - Non-positive user id
    /// * `Err(CoreError::AddressDerivation)` - Fiat currency
    pub fn derive(&self, user_id: i64, currency: CurrencyKind) -> Result<String, CoreError> {
        if user_id <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "user_id must be positive, got {}",
                user_id
            )));
        }
        if !currency.is_crypto() {
            return Err(CoreError::AddressDerivation(currency));
        }

        let payload = self.payload(user_id, currency);

        let address = match currency {
            CurrencyKind::Btc => btc_base58check(&payload),
            CurrencyKind::Eth => eth_checksummed(&payload),
            _ => unreachable!("is_crypto() admitted a fiat kind"),
        };

        Ok(address)
    }

    /// The 20-byte address payload for `(user_id, currency)`.
    fn payload(&self, user_id: i64, currency: CurrencyKind) -> [u8; 20] {
        let mut hasher = Sha256::new();
        hasher.update(&self.salt);
        hasher.update(DERIVATION_TAG);
        hasher.update(currency.as_str().as_bytes());
        hasher.update(user_id.to_be_bytes());
        let digest = hasher.finalize();

        let mut payload = [0u8; 20];
        payload.copy_from_slice(&digest[..20]);
        payload
    }
}

/// Encode a 20-byte payload as a BTC legacy Base58Check address.
///
/// The check variant appends the first four bytes of a double SHA-256
/// over version + payload, so any truncation or typo is detectable.
fn btc_base58check(payload: &[u8; 20]) -> String {
    bs58::encode(payload)
        .with_check_version(BTC_MAINNET_VERSION)
        .into_string()
}

/// Encode a 20-byte payload as an EIP-55 checksummed `0x…` address.
///
/// Each hex letter is uppercased when the corresponding nibble of
/// `keccak256(lowercase_hex)` is >= 8.
fn eth_checksummed(payload: &[u8; 20]) -> String {
    let lower = hex::encode(payload);

    let mut hasher = Keccak256::new();
    hasher.update(lower.as_bytes());
    let hash = hasher.finalize();

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(b"0123456789abcdef0123456789abcdef".to_vec())
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let d = deriver();
        for currency in [CurrencyKind::Btc, CurrencyKind::Eth] {
            let first = d.derive(42, currency).unwrap();
            let second = d.derive(42, currency).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_distinct_users_get_distinct_addresses() {
        let d = deriver();
        for currency in [CurrencyKind::Btc, CurrencyKind::Eth] {
            let mut seen = HashSet::new();
            for user_id in 1..=10_000i64 {
                let address = d.derive(user_id, currency).unwrap();
                assert!(
                    seen.insert(address),
                    "collision for user {} on {}",
                    user_id,
                    currency
                );
            }
        }
    }

    #[test]
    fn test_currencies_do_not_share_addresses() {
        let d = deriver();
        let btc = d.derive(7, CurrencyKind::Btc).unwrap();
        let eth = d.derive(7, CurrencyKind::Eth).unwrap();
        assert_ne!(btc, eth);
    }

    #[test]
    fn test_btc_address_is_valid_base58check() {
        let d = deriver();
        let address = d.derive(1, CurrencyKind::Btc).unwrap();

        // Version 0x00 addresses render with a leading '1'
        assert!(address.starts_with('1'), "got {}", address);

        // Round-trips through checked decode with the right version
        let decoded = bs58::decode(&address)
            .with_check(Some(BTC_MAINNET_VERSION))
            .into_vec()
            .expect("checksum must verify");
        // version byte + 20-byte payload
        assert_eq!(decoded.len(), 21);
    }

    #[test]
    fn test_eth_address_passes_its_own_checksum() {
        let d = deriver();
        let address = d.derive(1, CurrencyKind::Eth).unwrap();

        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 42);

        // Re-checksumming the lowercase form reproduces the address
        let raw = hex::decode(address[2..].to_lowercase()).unwrap();
        let mut payload = [0u8; 20];
        payload.copy_from_slice(&raw);
        assert_eq!(eth_checksummed(&payload), address);
    }

    #[test]
    fn test_invalid_user_ids_are_rejected() {
        let d = deriver();
        assert!(matches!(
            d.derive(0, CurrencyKind::Btc),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(matches!(
            d.derive(-5, CurrencyKind::Eth),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_fiat_kinds_are_not_derivable() {
        let d = deriver();
        assert!(matches!(
            d.derive(1, CurrencyKind::Usd),
            Err(CoreError::AddressDerivation(CurrencyKind::Usd))
        ));
    }

    #[test]
    fn test_salt_changes_the_address_space() {
        let a = AddressDeriver::new(b"salt-a-0123456789abcdef".to_vec());
        let b = AddressDeriver::new(b"salt-b-0123456789abcdef".to_vec());
        assert_ne!(
            a.derive(1, CurrencyKind::Btc).unwrap(),
            b.derive(1, CurrencyKind::Btc).unwrap()
        );
    }
}
