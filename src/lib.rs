pub mod client;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod node;
pub mod oracle;

pub use node::{NodeSettings, NodeState, OracleNode, RunSummary};
