//! Network node collaborator
//!
//! The node answers nonce queries and accepts signed transactions. Any
//! implementation (RPC client, in-memory double) can be injected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::StacksTransaction;

/// Errors reported by a node client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Node unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Transaction rejected: {0}")]
    Rejected(String),
    #[error("Nonce space exhausted for {0}")]
    NonceExhausted(String),
}

/// Result of handing a transaction to the node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    pub txid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BroadcastReceipt {
    pub fn accepted(txid: impl Into<String>) -> Self {
        Self {
            txid: txid.into(),
            error: None,
            reason: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.error.is_none()
    }
}

/// Capability interface of a network node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Current on-chain nonce of `address`
    async fn get_nonce(&self, address: &str) -> Result<u64, NodeError>;

    /// Submit a signed transaction
    async fn broadcast(&self, tx: &StacksTransaction) -> Result<BroadcastReceipt, NodeError>;
}

/// A node that is never reachable
///
/// Used when working offline: every build must then carry an explicit nonce.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNode;

#[async_trait]
impl NodeClient for OfflineNode {
    async fn get_nonce(&self, address: &str) -> Result<u64, NodeError> {
        Err(NodeError::Unavailable(format!(
            "offline, cannot look up nonce for {}",
            address
        )))
    }

    async fn broadcast(&self, _tx: &StacksTransaction) -> Result<BroadcastReceipt, NodeError> {
        Err(NodeError::Unavailable("offline, cannot broadcast".to_string()))
    }
}
