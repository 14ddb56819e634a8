//! Signed price attestations
//!
//! An attestation binds `(symbol, price, timestamp)` to the node's address via
//! a personal-message signature over `"{symbol}:{price}:{timestamp}"`. Anyone
//! holding the JSON frame can re-derive the message and recover the signer.

use alloy::primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::types::current_unix_timestamp;
use crate::crypto::{self, KeySigner};
use crate::encoding;
use crate::error::SigningError;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Attestation {
    pub symbol: String,
    pub price: u64,
    /// Unix seconds
    pub timestamp: u64,
    /// `0x`-prefixed hex on the wire
    pub signature: Bytes,
    #[serde(rename = "address")]
    pub signer_address: String,
    #[serde(rename = "message_hash")]
    pub message_digest: B256,
}

impl Attestation {
    /// The exact string that was signed.
    pub fn canonical_message(&self) -> String {
        encoding::canonical_message(&self.symbol, self.price, self.timestamp)
    }

    /// Checks the signature against the embedded signer address.
    pub fn verify(&self) -> bool {
        crypto::verify_attestation(
            &self.symbol,
            self.price,
            self.timestamp,
            &self.signature,
            &self.signer_address,
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Packages quotes into signed attestations.
///
/// Timestamps issued by one builder never go backwards, even if the wall
/// clock does.
pub struct AttestationBuilder {
    signer: Arc<KeySigner>,
    last_timestamp: Option<u64>,
}

impl AttestationBuilder {
    pub fn new(signer: Arc<KeySigner>) -> Self {
        Self {
            signer,
            last_timestamp: None,
        }
    }

    pub fn signer(&self) -> &KeySigner {
        &self.signer
    }

    /// Stamps with the current wall-clock time.
    pub fn build(&mut self, symbol: &str, price: u64) -> Result<Attestation, SigningError> {
        self.build_at(symbol, price, current_unix_timestamp())
    }

    pub fn build_at(&mut self, symbol: &str, price: u64, timestamp: u64) -> Result<Attestation, SigningError> {
        let timestamp = match self.last_timestamp {
            Some(last) if timestamp < last => last,
            _ => timestamp,
        };

        let fragment = self.signer.sign(symbol, price, timestamp)?;
        self.last_timestamp = Some(timestamp);

        Ok(Attestation {
            symbol: symbol.to_string(),
            price,
            timestamp,
            signature: fragment.signature,
            signer_address: fragment.signer_address,
            message_digest: fragment.message_digest,
        })
    }
}
