//! Per-sender nonce cache
//!
//! The first request for an address asks the node; every later request for
//! the same address returns the previous value plus one. Building several
//! transfers from one sender in a session therefore never reuses a nonce.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;

use crate::network::{NodeClient, NodeError};

/// Session-scoped nonce cache, shared by reference between concurrent builds
#[derive(Default)]
pub struct NonceCache {
    entries: Mutex<HashMap<String, Arc<Mutex<Option<u64>>>>>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, address: &str) -> Arc<Mutex<Option<u64>>> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Next nonce for `address`
    ///
    /// Callers for the same address are serialized, including across the
    /// node query; other addresses are not blocked.
    pub async fn get_nonce(&self, address: &str, node: &dyn NodeClient) -> Result<u64, NodeError> {
        let entry = self.entry(address).await;
        let mut last = entry.lock().await;

        let nonce = match *last {
            Some(previous) => previous
                .checked_add(1)
                .ok_or_else(|| NodeError::NonceExhausted(address.to_string()))?,
            None => {
                let fetched = node.get_nonce(address).await?;
                debug!("Fetched nonce {} for {}", fetched, address);
                fetched
            }
        };
        *last = Some(nonce);
        Ok(nonce)
    }

    /// Last nonce handed out for `address`
    pub async fn peek(&self, address: &str) -> Option<u64> {
        let entry = self.entries.lock().await.get(address).cloned()?;
        let last = *entry.lock().await;
        last
    }

    /// Forget every address
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryNode;
    use futures::future::join_all;

    const ADDR: &str = "SM2R12RQCV9SCAZPM37VSCVP4X3EQK1Y70KCV7EDE";
    const OTHER: &str = "SM1SM5Z83TXDKYZPR971EVXZ03NJXH61W6S9SGRE4";

    #[tokio::test]
    async fn test_sequential_nonces() {
        let node = MemoryNode::new().with_nonce(ADDR, 41);
        let cache = NonceCache::new();

        assert_eq!(cache.get_nonce(ADDR, &node).await.unwrap(), 41);
        assert_eq!(cache.get_nonce(ADDR, &node).await.unwrap(), 42);
        assert_eq!(cache.peek(ADDR).await, Some(42));
        assert_eq!(node.nonce_queries(), 1);
    }

    #[tokio::test]
    async fn test_clear_refetches() {
        let node = MemoryNode::new().with_nonce(ADDR, 5);
        let cache = NonceCache::new();

        cache.get_nonce(ADDR, &node).await.unwrap();
        cache.get_nonce(ADDR, &node).await.unwrap();
        cache.clear().await;
        assert_eq!(cache.peek(ADDR).await, None);
        assert_eq!(cache.get_nonce(ADDR, &node).await.unwrap(), 5);
        assert_eq!(node.nonce_queries(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_same_address_never_collide() {
        let node = MemoryNode::new().with_nonce(ADDR, 100).with_nonce(OTHER, 7);
        let cache = NonceCache::new();

        let mut requests = Vec::new();
        for i in 0..10 {
            let address = if i % 2 == 0 { ADDR } else { OTHER };
            requests.push(cache.get_nonce(address, &node));
        }
        let results: Vec<u64> = join_all(requests)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let mut ours: Vec<u64> = results.iter().step_by(2).copied().collect();
        ours.sort();
        assert_eq!(ours, vec![100, 101, 102, 103, 104]);

        let mut theirs: Vec<u64> = results.iter().skip(1).step_by(2).copied().collect();
        theirs.sort();
        assert_eq!(theirs, vec![7, 8, 9, 10, 11]);
        assert_eq!(node.nonce_queries(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_nonce_is_an_error() {
        let node = MemoryNode::new().with_nonce(ADDR, u64::MAX);
        let cache = NonceCache::new();

        assert_eq!(cache.get_nonce(ADDR, &node).await.unwrap(), u64::MAX);
        assert!(matches!(
            cache.get_nonce(ADDR, &node).await,
            Err(NodeError::NonceExhausted(address)) if address == ADDR
        ));
        assert_eq!(cache.peek(ADDR).await, Some(u64::MAX));
    }

    #[tokio::test]
    async fn test_node_failure_leaves_entry_empty() {
        let node = MemoryNode::new();
        let cache = NonceCache::new();

        assert!(cache.get_nonce(ADDR, &node).await.is_err());
        assert_eq!(cache.peek(ADDR).await, None);
    }
}
