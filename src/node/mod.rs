//! Oracle node lifecycle
//!
//! `Uninitialized -> CheckingRegistration -> [Registering] -> Connecting ->
//! Streaming -> Terminated`. Streaming loops over [`OracleNode::tick`] (fetch
//! a quote, sign it, publish it) and sleeps for the interval after each one.
//! A failed fetch skips the tick; a failed publish gets one reconnect before
//! it is fatal.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{LedgerClient, PublishChannel, QuoteFetcher, RegistrationStatus};
use crate::config::UnknownRegistrationPolicy;
use crate::crypto::KeySigner;
use crate::error::{ChannelError, FetchError, NodeError, RegistrationFailed};
use crate::oracle::{Attestation, AttestationBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Uninitialized,
    CheckingRegistration,
    Registering,
    Connecting,
    Streaming,
    Terminated(Termination),
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Uninitialized => write!(f, "uninitialized"),
            NodeState::CheckingRegistration => write!(f, "checking-registration"),
            NodeState::Registering => write!(f, "registering"),
            NodeState::Connecting => write!(f, "connecting"),
            NodeState::Streaming => write!(f, "streaming"),
            NodeState::Terminated(Termination::Success) => write!(f, "terminated(success)"),
            NodeState::Terminated(Termination::Error) => write!(f, "terminated(error)"),
        }
    }
}

/// What happened during one streaming tick.
#[derive(Debug)]
pub enum TickOutcome {
    Published(Attestation),
    Skipped(FetchError),
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub published: u64,
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct NodeSettings {
    pub interval: Duration,
    pub on_unknown_registration: UnknownRegistrationPolicy,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            on_unknown_registration: UnknownRegistrationPolicy::default(),
        }
    }
}

pub struct OracleNode<L, Q, P> {
    signer: Arc<KeySigner>,
    ledger: L,
    fetcher: Q,
    channel: P,
    builder: AttestationBuilder,
    settings: NodeSettings,
    state: NodeState,
    summary: RunSummary,
}

impl<L, Q, P> OracleNode<L, Q, P>
where
    L: LedgerClient,
    Q: QuoteFetcher,
    P: PublishChannel,
{
    pub fn new(signer: Arc<KeySigner>, ledger: L, fetcher: Q, channel: P, settings: NodeSettings) -> Self {
        Self {
            builder: AttestationBuilder::new(signer.clone()),
            signer,
            ledger,
            fetcher,
            channel,
            settings,
            state: NodeState::Uninitialized,
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn channel(&self) -> &P {
        &self.channel
    }

    fn transition(&mut self, next: NodeState) {
        debug!("Node state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Drives the whole lifecycle until cancellation or a fatal error.
    /// The publish channel is closed on every exit path.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<RunSummary, NodeError> {
        info!("🔐 Wallet: {}", self.signer.address_checksummed());

        let result = self.run_inner(&cancel).await;
        self.channel.close().await;

        match &result {
            Ok(summary) => {
                self.transition(NodeState::Terminated(Termination::Success));
                info!(
                    "🛑 Oracle node stopped: {} ticks, {} published, {} skipped",
                    summary.ticks, summary.published, summary.skipped
                );
            }
            Err(e) => {
                self.transition(NodeState::Terminated(Termination::Error));
                error!("❌ Oracle node terminated in {} phase: {}", e.phase(), e);
            }
        }
        result
    }

    async fn run_inner(&mut self, cancel: &CancellationToken) -> Result<RunSummary, NodeError> {
        self.transition(NodeState::CheckingRegistration);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if self.state == NodeState::Registering {
                    warn!("⚠️ Cancelled while registering; a submitted transaction may still confirm");
                }
                return Ok(self.summary);
            }
            r = self.ensure_registered() => r?,
        }

        self.transition(NodeState::Connecting);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(self.summary),
            r = self.channel.connect() => r?,
        }

        self.transition(NodeState::Streaming);
        info!("🔄 Starting oracle node...");
        self.stream(cancel).await?;
        Ok(self.summary)
    }

    async fn ensure_registered(&mut self) -> Result<(), RegistrationFailed> {
        let address = self.signer.address();
        match self.ledger.registration_status(address).await {
            RegistrationStatus::Registered => {
                info!("✅ Oracle already registered.");
                return Ok(());
            }
            RegistrationStatus::NotRegistered => {
                info!("🛠 Oracle not registered. Registering...");
            }
            RegistrationStatus::Unknown => match self.settings.on_unknown_registration {
                UnknownRegistrationPolicy::Register => {
                    warn!("⚠️ Registration status unknown, registering anyway (possible duplicate registration)");
                }
                UnknownRegistrationPolicy::Abort => {
                    return Err(RegistrationFailed::StatusUnknown);
                }
            },
        }

        self.transition(NodeState::Registering);
        let stake = self.ledger.minimum_stake().await;
        let tx = self.ledger.register(&self.signer, stake).await?;
        info!("✅ Registered as oracle. TX: {} (block {})", tx.tx_hash, tx.block_number);
        Ok(())
    }

    async fn stream(&mut self, cancel: &CancellationToken) -> Result<(), NodeError> {
        loop {
            if let TickOutcome::Cancelled = self.tick(cancel).await? {
                return Ok(());
            }

            // The full interval elapses after each tick, however long it took
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = time::sleep(self.settings.interval) => {}
            }
        }
    }

    /// One fetch → sign → publish step. Only channel and signing failures are
    /// errors; a failed fetch is reported as [`TickOutcome::Skipped`].
    pub async fn tick(&mut self, cancel: &CancellationToken) -> Result<TickOutcome, NodeError> {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TickOutcome::Cancelled),
            r = self.fetcher.fetch() => r,
        };
        self.summary.ticks += 1;

        let quote = match fetched {
            Ok(q) => q,
            Err(e) => {
                self.summary.skipped += 1;
                warn!("Skipping send due to fetch error: {}", e);
                return Ok(TickOutcome::Skipped(e));
            }
        };

        let attestation = self.builder.build(&quote.symbol, quote.value)?;
        let payload = attestation
            .to_json()
            .map_err(|e| ChannelError::Serialization(e.to_string()))?;
        if !self.publish(&payload, cancel).await? {
            return Ok(TickOutcome::Cancelled);
        }
        self.summary.published += 1;

        info!(
            "📤 Sent {} = {} @ {} (signed by {})",
            attestation.symbol, attestation.price, attestation.timestamp, attestation.signer_address
        );
        Ok(TickOutcome::Published(attestation))
    }

    /// Send, and on failure reconnect once and resend.
    /// Returns `false` if cancelled while reconnecting; a send itself is
    /// never interrupted.
    async fn publish(&mut self, payload: &str, cancel: &CancellationToken) -> Result<bool, ChannelError> {
        let first = match self.channel.send(payload).await {
            Ok(()) => return Ok(true),
            Err(e) => e,
        };
        warn!(
            "⚠️ Send failed ({}), reconnecting to {}",
            first,
            self.channel.endpoint()
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            r = self.channel.connect() => r?,
        }
        self.channel.send(payload).await?;
        Ok(true)
    }
}
