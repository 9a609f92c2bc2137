//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256, SHA-512/256 and hash160 digests
//! - Compressed public keys and recoverable signatures (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{checksum, double_sha256, hash160, sha256, sha512_256};
pub use keys::{
    KeyError, KeyPair, MessageSignature, PublicKey, MESSAGE_SIGNATURE_ENCODED_SIZE,
    PUBLIC_KEY_ENCODED_SIZE,
};
