// JSON-RPC client for the chain node
use alloy::primitives::{Address, Bytes, U256};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::LedgerError;

/// Receipt fields the node cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub success: bool,
}

pub struct RpcClient {
    url: String,
    client: Client,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            url,
            client,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LedgerError::Transport(format!("HTTP {}", response.status())));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        if let Some(error) = json.get("error") {
            return Err(LedgerError::Rpc(
                error["message"].as_str().unwrap_or("Unknown error").to_string(),
            ));
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Decode("Missing result field".to_string()))
    }

    fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, LedgerError> {
        value
            .as_str()
            .ok_or_else(|| LedgerError::Decode(format!("{} is not a string: {}", what, value)))
    }

    /// Parses a `0x`-prefixed JSON-RPC quantity that must fit in a `u64`.
    fn quantity_u64(value: &Value, what: &str) -> Result<u64, LedgerError> {
        let raw = Self::as_str(value, what)?;
        if !raw.starts_with("0x") || raw.len() < 3 {
            return Err(LedgerError::Decode(format!("{} '{}' is not a hex quantity", what, raw)));
        }
        let quantity: U256 = raw
            .parse()
            .map_err(|e| LedgerError::Decode(format!("invalid {} '{}': {}", what, raw, e)))?;
        u64::try_from(quantity).map_err(|_| LedgerError::Decode(format!("{} {} overflows u64", what, raw)))
    }

    /// `eth_call` against `latest`, returning raw return data.
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Bytes, LedgerError> {
        let result = self
            .send_request(
                "eth_call",
                json!([
                    { "to": hex_data(to.as_slice()), "data": hex_data(data) },
                    "latest"
                ]),
            )
            .await?;
        let raw = Self::as_str(&result, "eth_call result")?;
        raw.parse::<Bytes>()
            .map_err(|e| LedgerError::Decode(format!("invalid return data '{}': {}", raw, e)))
    }

    pub async fn get_transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        let result = self
            .send_request(
                "eth_getTransactionCount",
                json!([hex_data(address.as_slice()), "pending"]),
            )
            .await?;
        Self::quantity_u64(&result, "nonce")
    }

    pub async fn chain_id(&self) -> Result<u64, LedgerError> {
        let result = self.send_request("eth_chainId", json!([])).await?;
        Self::quantity_u64(&result, "chain id")
    }

    /// Returns the transaction hash reported by the node.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, LedgerError> {
        let result = self
            .send_request("eth_sendRawTransaction", json!([hex_data(raw)]))
            .await?;
        Ok(Self::as_str(&result, "tx hash")?.to_string())
    }

    /// `Ok(None)` while the transaction is still pending.
    pub async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, LedgerError> {
        let result = self
            .send_request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        let block_number = match result.get("blockNumber") {
            Some(n) if !n.is_null() => Self::quantity_u64(n, "block number")?,
            // Some nodes return a receipt stub before inclusion
            _ => return Ok(None),
        };
        let status = result
            .get("status")
            .ok_or_else(|| LedgerError::Decode("receipt without status".to_string()))?;
        let success = Self::quantity_u64(status, "status")? == 1;

        Ok(Some(TxReceipt {
            tx_hash: tx_hash.to_string(),
            block_number,
            success,
        }))
    }
}

fn hex_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
