// Clients for the node's external collaborators
pub mod rpc_client;
pub mod ledger;
pub mod price_fetcher;
pub mod publisher;

pub use ledger::{EthLedgerClient, GasParams, LedgerClient, RegistrationStatus, TxResult};
pub use price_fetcher::{HttpQuoteFetcher, QuoteFetcher, QuoteSource};
pub use publisher::{PublishChannel, WsPublishChannel};
pub use rpc_client::RpcClient;
