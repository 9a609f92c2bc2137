//! Network selection
//!
//! Mainnet and testnet differ in the transaction version byte, the chain id
//! and the address version bytes. The node collaborator lives in [`node`].

pub mod node;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::{
    C32_ADDRESS_VERSION_MAINNET_MULTISIG, C32_ADDRESS_VERSION_MAINNET_SINGLESIG,
    C32_ADDRESS_VERSION_TESTNET_MULTISIG, C32_ADDRESS_VERSION_TESTNET_SINGLESIG,
};
use crate::core::StacksTransaction;

pub use node::{BroadcastReceipt, NodeClient, NodeError, OfflineNode};

/// Transaction version byte on mainnet
pub const TRANSACTION_VERSION_MAINNET: u8 = 0x00;
/// Transaction version byte on testnet
pub const TRANSACTION_VERSION_TESTNET: u8 = 0x80;
/// Chain id on mainnet
pub const CHAIN_ID_MAINNET: u32 = 0x0000_0001;
/// Chain id on testnet
pub const CHAIN_ID_TESTNET: u32 = 0x8000_0000;

/// The two supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    pub fn transaction_version(&self) -> u8 {
        match self {
            Network::Mainnet => TRANSACTION_VERSION_MAINNET,
            Network::Testnet => TRANSACTION_VERSION_TESTNET,
        }
    }

    pub fn chain_id(&self) -> u32 {
        match self {
            Network::Mainnet => CHAIN_ID_MAINNET,
            Network::Testnet => CHAIN_ID_TESTNET,
        }
    }

    pub fn singlesig_address_version(&self) -> u8 {
        match self {
            Network::Mainnet => C32_ADDRESS_VERSION_MAINNET_SINGLESIG,
            Network::Testnet => C32_ADDRESS_VERSION_TESTNET_SINGLESIG,
        }
    }

    pub fn multisig_address_version(&self) -> u8 {
        match self {
            Network::Mainnet => C32_ADDRESS_VERSION_MAINNET_MULTISIG,
            Network::Testnet => C32_ADDRESS_VERSION_TESTNET_MULTISIG,
        }
    }

    /// Network of a transaction version byte; anything other than mainnet's is testnet
    pub fn from_transaction_version(version: u8) -> Self {
        if version == TRANSACTION_VERSION_MAINNET {
            Network::Mainnet
        } else {
            Network::Testnet
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_network_name(s).ok_or_else(|| format!("unknown network '{}'", s))
    }
}

/// Lenient network selector used for batch input and CLI flags
///
/// Matches case-insensitively by substring, so `"Mainnet"`, `"stacks-mainnet"`
/// and `"MAINNET "` all select mainnet. Anything else is `None`.
pub fn parse_network_name(input: &str) -> Option<Network> {
    let lowered = input.to_lowercase();
    if lowered.contains("mainnet") {
        Some(Network::Mainnet)
    } else if lowered.contains("testnet") {
        Some(Network::Testnet)
    } else {
        None
    }
}

/// Network a transaction was built for
pub fn network_from_tx(tx: &StacksTransaction) -> Network {
    Network::from_transaction_version(tx.version)
}
