//! Canonical byte encodings shared by the signer and any verifier on the
//! other side of the wire.
//!
//! Careful: everything in here must stay byte-for-byte stable. Consumers
//! recompute these encodings independently to verify signatures.

use alloy::primitives::{keccak256, B256};

/// Prefix used by `personal_sign` (EIP-191 version 0x45).
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// The canonical attestation message: `"{symbol}:{price}:{timestamp}"`.
pub fn canonical_message(symbol: &str, price: u64, timestamp: u64) -> String {
    format!("{}:{}:{}", symbol, price, timestamp)
}

/// Frames a message the way wallets do for `personal_sign`.
pub fn personal_message(message: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 20 + message.len());
    framed.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    framed.extend_from_slice(message.len().to_string().as_bytes());
    framed.extend_from_slice(message);
    framed
}

/// Digest that is actually signed for an attestation.
pub fn personal_message_digest(message: &[u8]) -> B256 {
    keccak256(personal_message(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::eip191_hash_message;

    #[test]
    fn test_canonical_message_format() {
        assert_eq!(
            canonical_message("BTCUSD", 65000, 1700000000),
            "BTCUSD:65000:1700000000"
        );
        assert_eq!(canonical_message("ETHUSD", 0, 0), "ETHUSD:0:0");
    }

    #[test]
    fn test_personal_message_framing() {
        let framed = personal_message(b"hello");
        assert_eq!(framed, b"\x19Ethereum Signed Message:\n5hello".to_vec());
    }

    #[test]
    fn test_digest_matches_wallet_hashing() {
        let message = canonical_message("BTCUSD", 65000, 1700000000);
        assert_eq!(
            personal_message_digest(message.as_bytes()),
            eip191_hash_message(message.as_bytes())
        );
    }
}
