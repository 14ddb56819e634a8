//! NodeManager contract access: registration status, stake lookup and the
//! payable `registerOracle()` transaction.

use alloy::consensus::TxLegacy;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::rpc_client::RpcClient;
use crate::crypto::KeySigner;
use crate::error::{LedgerError, RegistrationFailed};

/// Used when `MINIMUM_STAKE()` cannot be read: 0.01 ether in wei.
pub const FALLBACK_MINIMUM_STAKE_WEI: u128 = 10_000_000_000_000_000;

sol! {
    /// The slice of NodeManager the oracle talks to.
    interface INodeManager {
        function registeredOracles(address oracle) external view returns (bool);
        function MINIMUM_STAKE() external view returns (uint256);
        function registerOracle() external payable;
    }
}

/// Result of a registration read. `Unknown` means the call itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Registered,
    NotRegistered,
    Unknown,
}

/// A confirmed registration transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub tx_hash: String,
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    pub gas_limit: u64,
    pub gas_price_wei: u128,
}

impl Default for GasParams {
    fn default() -> Self {
        Self {
            gas_limit: 300_000,
            gas_price_wei: 20_000_000_000, // 20 gwei
        }
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn registration_status(&self, identity: Address) -> RegistrationStatus;

    /// Soft-fail read: anything but a confirmed `true` is `false`.
    async fn is_registered(&self, identity: Address) -> bool {
        self.registration_status(identity).await == RegistrationStatus::Registered
    }

    /// Falls back to [`FALLBACK_MINIMUM_STAKE_WEI`] on error.
    async fn minimum_stake(&self) -> u128;

    /// Submits `registerOracle()` with `value = stake` and waits for inclusion.
    async fn register(&self, signer: &KeySigner, stake: u128) -> Result<TxResult, RegistrationFailed>;
}

pub struct EthLedgerClient {
    rpc: RpcClient,
    contract: Address,
    gas: GasParams,
    confirmation_timeout: Duration,
    receipt_poll_interval: Duration,
}

impl EthLedgerClient {
    pub fn new(
        rpc: RpcClient,
        contract: Address,
        gas: GasParams,
        confirmation_timeout: Duration,
        receipt_poll_interval: Duration,
    ) -> Self {
        Self {
            rpc,
            contract,
            gas,
            confirmation_timeout,
            receipt_poll_interval,
        }
    }

    async fn read_registered(&self, identity: Address) -> Result<bool, LedgerError> {
        let call = INodeManager::registeredOraclesCall { oracle: identity };
        let ret = self.rpc.eth_call(self.contract, &call.abi_encode()).await?;
        INodeManager::registeredOraclesCall::abi_decode_returns(&ret)
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn read_minimum_stake(&self) -> Result<u128, LedgerError> {
        let call = INodeManager::MINIMUM_STAKECall {};
        let ret = self.rpc.eth_call(self.contract, &call.abi_encode()).await?;
        let stake = INodeManager::MINIMUM_STAKECall::abi_decode_returns(&ret)
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        u128::try_from(stake).map_err(|_| LedgerError::Decode(format!("stake {} does not fit in u128", stake)))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxResult, RegistrationFailed> {
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;
        loop {
            match self.rpc.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    return Ok(TxResult {
                        tx_hash: receipt.tx_hash,
                        block_number: receipt.block_number,
                    });
                }
                Ok(Some(_)) => return Err(RegistrationFailed::Reverted(tx_hash.to_string())),
                Ok(None) => debug!("Receipt for {} not available yet", tx_hash),
                Err(e) => debug!("Receipt lookup for {} failed, retrying: {}", tx_hash, e),
            }

            if tokio::time::Instant::now() + self.receipt_poll_interval > deadline {
                return Err(RegistrationFailed::ConfirmationTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_secs: self.confirmation_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}

#[async_trait]
impl LedgerClient for EthLedgerClient {
    async fn registration_status(&self, identity: Address) -> RegistrationStatus {
        match self.read_registered(identity).await {
            Ok(true) => RegistrationStatus::Registered,
            Ok(false) => RegistrationStatus::NotRegistered,
            Err(e) => {
                error!("Checking registration: {}", e);
                RegistrationStatus::Unknown
            }
        }
    }

    async fn minimum_stake(&self) -> u128 {
        match self.read_minimum_stake().await {
            Ok(stake) => stake,
            Err(e) => {
                warn!(
                    "Getting minimum stake failed ({}), using fallback {} wei",
                    e, FALLBACK_MINIMUM_STAKE_WEI
                );
                FALLBACK_MINIMUM_STAKE_WEI
            }
        }
    }

    async fn register(&self, signer: &KeySigner, stake: u128) -> Result<TxResult, RegistrationFailed> {
        let nonce = self
            .rpc
            .get_transaction_count(signer.address())
            .await
            .map_err(RegistrationFailed::Nonce)?;
        let chain_id = self.rpc.chain_id().await.map_err(RegistrationFailed::ChainId)?;

        let tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price: self.gas.gas_price_wei,
            gas_limit: self.gas.gas_limit,
            to: TxKind::Call(self.contract),
            value: U256::from(stake),
            input: Bytes::from(INodeManager::registerOracleCall {}.abi_encode()),
        };
        let raw = signer.sign_transaction(tx).map_err(RegistrationFailed::Signing)?;

        let tx_hash = self
            .rpc
            .send_raw_transaction(&raw)
            .await
            .map_err(RegistrationFailed::Submission)?;
        info!(
            "📨 Registration submitted to {}. TX: {} (stake {} wei, nonce {})",
            self.contract.to_checksum(None),
            tx_hash,
            stake,
            nonce
        );

        let result = self.wait_for_receipt(&tx_hash).await?;
        info!("✅ Registration confirmed in block {}", result.block_number);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn ledger(server: &MockServer, timeout: Duration) -> EthLedgerClient {
        EthLedgerClient::new(
            RpcClient::new(server.uri(), Duration::from_secs(5)).unwrap(),
            Address::repeat_byte(0x42),
            GasParams::default(),
            timeout,
            Duration::from_millis(20),
        )
    }

    fn word(value: u128) -> String {
        format!("0x{}", hex::encode(U256::from(value).to_be_bytes::<32>()))
    }

    async fn mock_result(server: &MockServer, rpc_method: &str, result: serde_json::Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": result
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_registration_status_reads_contract() {
        let server = MockServer::start().await;
        let identity = Address::repeat_byte(0x11);
        let selector = INodeManager::registeredOraclesCall::SELECTOR;
        assert_eq!(selector[..], keccak256("registeredOracles(address)")[..4]);
        // Selector, then the left-padded address
        let expected_data = format!("0x{}{}{}", hex::encode(selector), "00".repeat(12), "11".repeat(20));
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "eth_call",
                "params": [{ "data": expected_data }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": word(1)
            })))
            .mount(&server)
            .await;

        let ledger = ledger(&server, Duration::from_secs(1));
        assert_eq!(ledger.registration_status(identity).await, RegistrationStatus::Registered);
        assert!(ledger.is_registered(identity).await);
    }

    #[tokio::test]
    async fn test_registration_read_failure_is_unknown_and_soft_false() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ledger = ledger(&server, Duration::from_secs(1));
        assert_eq!(ledger.registration_status(Address::ZERO).await, RegistrationStatus::Unknown);
        assert!(!ledger.is_registered(Address::ZERO).await);
    }

    #[tokio::test]
    async fn test_minimum_stake_and_fallback() {
        let server = MockServer::start().await;
        mock_result(&server, "eth_call", json!(word(10_000))).await;
        assert_eq!(ledger(&server, Duration::from_secs(1)).minimum_stake().await, 10_000);

        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "error": { "message": "boom" }
            })))
            .mount(&broken)
            .await;
        assert_eq!(
            ledger(&broken, Duration::from_secs(1)).minimum_stake().await,
            FALLBACK_MINIMUM_STAKE_WEI
        );
    }

    #[tokio::test]
    async fn test_register_submits_and_waits_for_receipt() {
        let server = MockServer::start().await;
        mock_result(&server, "eth_getTransactionCount", json!("0x3")).await;
        mock_result(&server, "eth_chainId", json!("0x539")).await;
        mock_result(&server, "eth_sendRawTransaction", json!("0xfeed")).await;
        mock_result(
            &server,
            "eth_getTransactionReceipt",
            json!({ "blockNumber": "0x64", "status": "0x1" }),
        )
        .await;

        let signer = KeySigner::from_hex(DEV_KEY).unwrap();
        let result = ledger(&server, Duration::from_secs(2))
            .register(&signer, 10_000)
            .await
            .unwrap();
        assert_eq!(result, TxResult { tx_hash: "0xfeed".to_string(), block_number: 100 });

        let requests = server.received_requests().await.unwrap();
        let raw_tx = requests
            .iter()
            .filter_map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).ok())
            .find(|body| body["method"] == "eth_sendRawTransaction")
            .expect("raw transaction submitted");
        let raw = raw_tx["params"][0].as_str().unwrap();
        // registerOracle() selector is carried as call data
        let selector_hex = hex::encode(INodeManager::registerOracleCall::SELECTOR);
        assert!(raw.contains(&selector_hex));
    }

    #[tokio::test]
    async fn test_stake_too_large_falls_back() {
        let server = MockServer::start().await;
        mock_result(&server, "eth_call", json!(format!("0x01{}", "00".repeat(31)))).await;
        assert_eq!(
            ledger(&server, Duration::from_secs(1)).minimum_stake().await,
            FALLBACK_MINIMUM_STAKE_WEI
        );
    }

    #[tokio::test]
    async fn test_register_reverted() {
        let server = MockServer::start().await;
        mock_result(&server, "eth_getTransactionCount", json!("0x0")).await;
        mock_result(&server, "eth_chainId", json!("0x1")).await;
        mock_result(&server, "eth_sendRawTransaction", json!("0xdead")).await;
        mock_result(
            &server,
            "eth_getTransactionReceipt",
            json!({ "blockNumber": "0x1", "status": "0x0" }),
        )
        .await;

        let signer = KeySigner::from_hex(DEV_KEY).unwrap();
        let err = ledger(&server, Duration::from_secs(2))
            .register(&signer, 1)
            .await
            .unwrap_err();
        assert_eq!(err, RegistrationFailed::Reverted("0xdead".to_string()));
    }

    #[tokio::test]
    async fn test_register_times_out_without_receipt() {
        let server = MockServer::start().await;
        mock_result(&server, "eth_getTransactionCount", json!("0x0")).await;
        mock_result(&server, "eth_chainId", json!("0x1")).await;
        mock_result(&server, "eth_sendRawTransaction", json!("0xbeef")).await;
        mock_result(&server, "eth_getTransactionReceipt", json!(null)).await;

        let signer = KeySigner::from_hex(DEV_KEY).unwrap();
        let err = ledger(&server, Duration::from_millis(100))
            .register(&signer, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationFailed::ConfirmationTimeout { ref tx_hash, .. } if tx_hash == "0xbeef"));
    }

    #[tokio::test]
    async fn test_register_nonce_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let signer = KeySigner::from_hex(DEV_KEY).unwrap();
        let err = ledger(&server, Duration::from_secs(1))
            .register(&signer, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationFailed::Nonce(_)));
    }
}
