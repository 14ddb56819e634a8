use thiserror::Error;

/// Key material problems. Always fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Private key not found")]
    MissingKey,
    #[error("Invalid private key: {0}")]
    InvalidKey(String),
    #[error("Signing failed: {0}")]
    Signature(String),
}

/// Per-tick quote errors. The tick is skipped, the loop keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Quote field '{0}' missing from response")]
    MissingField(String),
    #[error("Quote transport error: {0}")]
    Transport(String),
    #[error("Quote request timed out")]
    Timeout,
    #[error("Quote response not decodable: {0}")]
    Decode(String),
    #[error("Quote value invalid: {0}")]
    InvalidValue(String),
}

/// Errors from a single JSON-RPC call against the ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("RPC request failed: {0}")]
    Transport(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Failed to parse response: {0}")]
    Decode(String),
}

/// Registration transaction failures, tagged by the step that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationFailed {
    #[error("nonce lookup failed: {0}")]
    Nonce(LedgerError),
    #[error("chain id lookup failed: {0}")]
    ChainId(LedgerError),
    #[error("transaction signing failed: {0}")]
    Signing(SigningError),
    #[error("submission failed: {0}")]
    Submission(LedgerError),
    #[error("no receipt for {tx_hash} after {waited_secs}s")]
    ConfirmationTimeout { tx_hash: String, waited_secs: u64 },
    #[error("transaction {0} reverted")]
    Reverted(String),
    #[error("registration status could not be read and policy is abort")]
    StatusUnknown,
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("Send failed: {0}")]
    Send(String),
    #[error("Channel not connected")]
    NotConnected,
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("PRIVATE_KEY is not set")]
    MissingPrivateKey,
    #[error("Error reading config {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("Error parsing config: {0}")]
    Parse(String),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Fatal node errors. The variant names the lifecycle phase that failed.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("[config] {0}")]
    Config(#[from] ConfigError),
    #[error("[signing] {0}")]
    Signing(#[from] SigningError),
    #[error("[registration] {0}")]
    Registration(#[from] RegistrationFailed),
    #[error("[connection] {0}")]
    Connection(#[from] ChannelError),
}

impl NodeError {
    pub fn phase(&self) -> &'static str {
        match self {
            NodeError::Config(_) => "config",
            NodeError::Signing(_) => "signing",
            NodeError::Registration(_) => "registration",
            NodeError::Connection(_) => "connection",
        }
    }
}
