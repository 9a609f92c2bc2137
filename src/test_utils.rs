//! Shared fixtures and test doubles

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{
    txid_hex, MultisigHashMode, MultisigSpendingCondition, PrincipalData, SpendingCondition,
    StacksTransaction, TransactionBuilder,
};
use crate::crypto::PublicKey;
use crate::network::{BroadcastReceipt, Network, NodeClient, NodeError};

pub const SAMPLE_KEYS_HEX: [&str; 3] = [
    "02b30fafab3a12372c5d150d567034f37d60a91168009a779498168b0e9d8ec7f2",
    "03ce61f1d155738a5e434fc8a61c3e104f891d1ec71576e8ad85abb68b34670d35",
    "03ef2340518b5867b23598a9cf74611f8b98064f7d55cdb8c107c67b5efcbc5c77",
];

/// 2-of-3 address over `SAMPLE_KEYS_HEX` in the listed (sorted) order
pub const SAMPLE_ADDRESS: &str = "SM2R12RQCV9SCAZPM37VSCVP4X3EQK1Y70KCV7EDE";

pub const SAMPLE_RECIPIENT: &str = "ST2ZRX0K27GW0SP3GJCEMHD95TQGJMKB7G9Y0X1MH";

/// 2-of-3 sequential transfer on mainnet, signed by the middle key only
pub const SAMPLE_PARTIAL_TX_BASE64: &str = "AAAAAAEEAYPnJCUxoDXGkpmxQDbD2sc51L8zAAAAAAAAAAAAAAAAAAAD6AAAAAMAAplOpWodomg8Rj+JbRLuCjwzlyg2qODW7kMGYMayKklrAgF8BkTyU8YMrmGEMvZc2pIl1qLR2eCCxTDt/LKjZDplUjnPIgiVbvVmmxI9sB6uNCzttk16eZYfTNZEOLe1jdMfAAPEYWY3OqVnUPNjUnLxZ4gzriFjMgucnhRkh9GY0Upb4QACAwIAAAAAAAUUg+ckJTGgNcaSmbFANsPaxznUvzMAAAAAAAGGoAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Signer keys of `SAMPLE_PARTIAL_TX_BASE64` in slot order
pub const SAMPLE_PARTIAL_KEYS_HEX: [&str; 3] = [
    "02994ea56a1da2683c463f896d12ee0a3c33972836a8e0d6ee430660c6b22a496b",
    "0386c9d0ff45514104ce84d301b90911de76f750184ca1fc2f0b5303e83db9640c",
    "03c46166373aa56750f3635272f1678833ae2163320b9c9e146487d198d14a5be1",
];

pub fn sample_keys() -> Vec<PublicKey> {
    parse_keys(&SAMPLE_KEYS_HEX)
}

pub fn sample_partial_keys() -> Vec<PublicKey> {
    parse_keys(&SAMPLE_PARTIAL_KEYS_HEX)
}

fn parse_keys(hex_keys: &[&str]) -> Vec<PublicKey> {
    hex_keys
        .iter()
        .map(|k| PublicKey::from_hex(k).unwrap())
        .collect()
}

pub fn sample_recipient() -> PrincipalData {
    SAMPLE_RECIPIENT.parse().unwrap()
}

/// Unsigned 2-of-3 order-independent transfer from `SAMPLE_ADDRESS`
pub fn sample_unsigned_tx() -> StacksTransaction {
    let condition = MultisigSpendingCondition::new(
        MultisigHashMode::P2SHNonSequential,
        &sample_keys(),
        2,
        7,
        300,
    )
    .unwrap();
    TransactionBuilder::new(Network::Mainnet)
        .recipient(sample_recipient())
        .amount(1000)
        .build(SpendingCondition::Multisig(condition))
        .unwrap()
}

/// In-memory node: fixed account nonces, records broadcasts
#[derive(Default)]
pub struct MemoryNode {
    nonces: HashMap<String, u64>,
    queries: AtomicUsize,
    broadcasts: Mutex<Vec<String>>,
}

impl MemoryNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nonce(mut self, address: &str, nonce: u64) -> Self {
        self.nonces.insert(address.to_string(), nonce);
        self
    }

    /// Number of `get_nonce` calls served so far
    pub fn nonce_queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl NodeClient for MemoryNode {
    async fn get_nonce(&self, address: &str) -> Result<u64, NodeError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        // yield so concurrent callers interleave
        tokio::task::yield_now().await;
        self.nonces
            .get(address)
            .copied()
            .ok_or_else(|| NodeError::UnknownAccount(address.to_string()))
    }

    async fn broadcast(&self, tx: &StacksTransaction) -> Result<BroadcastReceipt, NodeError> {
        let txid = txid_hex(tx).map_err(|e| NodeError::Rejected(e.to_string()))?;
        self.broadcasts.lock().unwrap().push(txid.clone());
        Ok(BroadcastReceipt::accepted(txid))
    }
}
