//! stx-multisig: M-of-N multisig token transfers for Stacks in Rust
//!
//! This crate provides:
//! - Multisig redeem scripts and C32 / legacy address derivation
//! - Key order recovery from a known multisig address
//! - Unsigned transfer construction with a per-session nonce cache
//! - Signature collection through a signing device, in either slot mode
//! - The Stacks wire codec for token transfers
//!
//! # Example
//!
//! ```rust
//! use stx_multisig::core::make_multisig_address;
//! use stx_multisig::crypto::PublicKey;
//!
//! let keys: Vec<PublicKey> = [
//!     "02b30fafab3a12372c5d150d567034f37d60a91168009a779498168b0e9d8ec7f2",
//!     "03ce61f1d155738a5e434fc8a61c3e104f891d1ec71576e8ad85abb68b34670d35",
//!     "03ef2340518b5867b23598a9cf74611f8b98064f7d55cdb8c107c67b5efcbc5c77",
//! ]
//! .iter()
//! .map(|k| k.parse().unwrap())
//! .collect();
//!
//! let address = make_multisig_address(&keys, 2).unwrap();
//! assert_eq!(address, "SM2R12RQCV9SCAZPM37VSCVP4X3EQK1Y70KCV7EDE");
//! ```

pub mod address;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod device;
pub mod input;
pub mod multisig;
pub mod network;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types
pub use address::StacksAddress;
pub use config::SessionConfig;
pub use core::{make_multisig_address, tx_decode, tx_encode, StacksTransaction};
pub use crypto::{KeyPair, PublicKey};
pub use device::{SigningDevice, SoftwareDevice};
pub use multisig::{
    auth_field_info, match_address, sign_with_chaining, sign_with_known_slot, signers_after,
    MultisigError, NonceCache, TransferBuilder, TransferInput,
};
pub use network::{Network, NodeClient};
