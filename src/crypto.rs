use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Address, Bytes, Signature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use crate::encoding;
use crate::error::SigningError;

/// Signature, signer and digest produced for one attestation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedFragment {
    /// 65 bytes, `r || s || v` with `v` in {27, 28}.
    pub signature: Bytes,
    pub signer_address: String,
    pub message_digest: B256,
}

/// The node's secp256k1 identity. Loaded once, never written anywhere.
pub struct KeySigner {
    inner: PrivateKeySigner,
}

impl std::fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySigner")
            .field("address", &self.address_checksummed())
            .finish_non_exhaustive()
    }
}

impl KeySigner {
    /// Load from optional key material; `None` or blank is `MissingKey`.
    pub fn from_optional_hex(key: Option<&str>) -> Result<Self, SigningError> {
        match key.map(str::trim) {
            Some(k) if !k.is_empty() => Self::from_hex(k),
            _ => Err(SigningError::MissingKey),
        }
    }

    /// Parse a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(key: &str) -> Result<Self, SigningError> {
        let stripped = key.trim().strip_prefix("0x").unwrap_or(key.trim());
        let bytes = hex::decode(stripped)
            .map_err(|e| SigningError::InvalidKey(format!("not hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(SigningError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let inner = PrivateKeySigner::from_slice(&bytes)
            .map_err(|_| SigningError::InvalidKey("not a valid secp256k1 scalar".to_string()))?;
        Ok(Self { inner })
    }

    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// EIP-55 mixed-case address, e.g. `0x5aAeb6...`.
    pub fn address_checksummed(&self) -> String {
        self.address().to_checksum(None)
    }

    /// Recoverable, low-S signature over a 32-byte digest.
    pub fn sign_prehash(&self, digest: &B256) -> Result<Signature, SigningError> {
        self.inner
            .sign_hash_sync(digest)
            .map_err(|e| SigningError::Signature(e.to_string()))
    }

    /// Signs `symbol:price:timestamp` as a personal message.
    pub fn sign(&self, symbol: &str, price: u64, timestamp: u64) -> Result<SignedFragment, SigningError> {
        let message = encoding::canonical_message(symbol, price, timestamp);
        let digest = encoding::personal_message_digest(message.as_bytes());
        let signature = self.sign_prehash(&digest)?;

        Ok(SignedFragment {
            signature: Bytes::from(signature.as_bytes().to_vec()),
            signer_address: self.address_checksummed(),
            message_digest: digest,
        })
    }

    /// Signs a legacy transaction and returns the raw bytes for
    /// `eth_sendRawTransaction`. `tx.chain_id` selects EIP-155 replay protection.
    pub fn sign_transaction(&self, tx: TxLegacy) -> Result<Vec<u8>, SigningError> {
        let signature = self.sign_prehash(&tx.signature_hash())?;
        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
        Ok(envelope.encoded_2718())
    }
}

/// Recovers the signer address from a 65-byte `r || s || v` signature.
pub fn recover_address(digest: &B256, signature: &[u8]) -> Option<Address> {
    let raw: &[u8; 65] = signature.try_into().ok()?;
    let signature = Signature::from_raw_array(raw).ok()?;
    signature.recover_address_from_prehash(digest).ok()
}

/// Verify an attestation signature the way a consumer would: rebuild the
/// canonical message, recover the signer and compare addresses.
pub fn verify_attestation(
    symbol: &str,
    price: u64,
    timestamp: u64,
    signature: &[u8],
    signer_address: &str,
) -> bool {
    let Ok(expected) = signer_address.trim().parse::<Address>() else {
        return false;
    };
    let message = encoding::canonical_message(symbol, price, timestamp);
    let digest = encoding::personal_message_digest(message.as_bytes());
    recover_address(&digest, signature) == Some(expected)
}
