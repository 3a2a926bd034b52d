//! # Utilities Module
//!
//! This module contains helper functions and utilities used
//! across the backend service.

use crate::db::models::CurrencyKind;

/// Check whether a string is shaped like a BTC legacy address.
///
/// Verifies the Base58Check checksum and the version byte, so a typo
/// anywhere in the string is rejected.
pub fn is_valid_btc_address(address: &str) -> bool {
    match bs58::decode(address).with_check(Some(0x00)).into_vec() {
        // version byte + 20-byte payload
        Ok(decoded) => decoded.len() == 21,
        Err(_) => false,
    }
}

/// Check whether a string is shaped like an ETH address.
///
/// Accepts any casing; checksum casing is produced on our side, not
/// required on input.
pub fn is_valid_eth_address(address: &str) -> bool {
    let Some(body) = address.strip_prefix("0x") else {
        return false;
    };
    body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit())
}

/// Check whether a destination address is plausible for a currency.
///
/// Fiat kinds have no on-chain address shape; they only accept the
/// internal `card:<uuid>` form, which the caller resolves separately.
pub fn is_plausible_address(address: &str, currency: CurrencyKind) -> bool {
    match currency {
        CurrencyKind::Btc => is_valid_btc_address(address),
        CurrencyKind::Eth => is_valid_eth_address(address),
        CurrencyKind::Usd | CurrencyKind::Eur => false,
    }
}

/// Truncate a string to a maximum length.
///
/// Useful for logging long addresses.
#[allow(dead_code)]
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let half = (max_len - 3) / 2;
        format!("{}...{}", &s[..half], &s[s.len() - half..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_btc_address() {
        // Genesis block coinbase address
        assert!(is_valid_btc_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"));

        // Corrupted final character breaks the checksum
        assert!(!is_valid_btc_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb"));
        assert!(!is_valid_btc_address(""));
        assert!(!is_valid_btc_address("not-base58-0OIl"));
    }

    #[test]
    fn test_validate_eth_address() {
        assert!(is_valid_eth_address(
            "0x52908400098527886E0F7030069857D2E4169EE7"
        ));
        assert!(is_valid_eth_address(
            "0x52908400098527886e0f7030069857d2e4169ee7"
        ));

        assert!(!is_valid_eth_address("52908400098527886E0F7030069857D2E4169EE7"));
        assert!(!is_valid_eth_address("0x123"));
        assert!(!is_valid_eth_address("0xzz908400098527886E0F7030069857D2E4169EE7"));
    }

    #[test]
    fn test_fiat_has_no_address_shape() {
        assert!(!is_plausible_address("anything", CurrencyKind::Usd));
        assert!(!is_plausible_address(
            "0x52908400098527886E0F7030069857D2E4169EE7",
            CurrencyKind::Eur
        ));
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_string("abcdefghijklmnop", 10), "abc...nop");
    }
}
