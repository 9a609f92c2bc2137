//! In-memory signing device over secp256k1 keys
//!
//! Computes the same signature hashes a hardware wallet does when handed a
//! serialized transaction:
//! - no trailing data: sign the presign hash of the initial sighash
//! - `prev_sighash || encoding || prev_signature` appended: first complete the
//!   previous signer's postsign hash, then sign the presign hash over it
//!
//! Messages that are not transactions are signed as SHA-512/256 of the bytes.

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;

use super::{multisig_standard_path, DeviceError, SigHash, SignResponse, SigningDevice};
use crate::core::codec::deserialize_prefix;
use crate::core::{
    initial_sighash, presign_sighash, TransactionAuth, AUTH_TYPE_SPONSORED, AUTH_TYPE_STANDARD,
};
use crate::crypto::{sha512_256, KeyPair, PublicKey, MESSAGE_SIGNATURE_ENCODED_SIZE};

/// Length of the chain data appended for a sequential signer
const CHAIN_DATA_LENGTH: usize = 32 + 1 + MESSAGE_SIGNATURE_ENCODED_SIZE;

/// Status word reported when the message cannot be signed
const STATUS_DATA_INVALID: u16 = 0x6984;
/// Status word reported when signing is refused
const STATUS_REJECTED: u16 = 0x6985;

/// A signing device backed by key pairs held in memory
#[derive(Clone, Default)]
pub struct SoftwareDevice {
    keys: HashMap<String, KeyPair>,
    rejecting: bool,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device holding `pairs[i]` at the `i`-th standard multisig path
    pub fn with_multisig_keys(pairs: Vec<KeyPair>) -> Self {
        let mut device = Self::new();
        for (index, pair) in pairs.into_iter().enumerate() {
            device.insert(multisig_standard_path(index as u32), pair);
        }
        device
    }

    pub fn insert(&mut self, path: impl Into<String>, pair: KeyPair) {
        self.keys.insert(path.into(), pair);
    }

    /// Make every subsequent `sign` call report a rejection
    pub fn rejecting(mut self) -> Self {
        self.rejecting = true;
        self
    }

    fn key_pair(&self, path: &str) -> Result<&KeyPair, DeviceError> {
        self.keys
            .get(path)
            .ok_or_else(|| DeviceError::UnknownPath(path.to_string()))
    }
}

/// The hash the device commits to for `message`
fn signing_hash(message: &[u8]) -> Result<[u8; 32], String> {
    let (tx, used) = match deserialize_prefix(message) {
        Ok(parsed) => parsed,
        Err(_) => return Ok(sha512_256(message)),
    };

    let chain_data = &message[used..];
    let cur_sighash = match chain_data.len() {
        0 => initial_sighash(&tx).map_err(|e| e.to_string())?,
        // postsign of the previous signer: sha512_256(presign || encoding || signature)
        CHAIN_DATA_LENGTH => sha512_256(chain_data),
        other => return Err(format!("unexpected {} bytes after transaction", other)),
    };

    let auth_type = match tx.auth {
        TransactionAuth::Standard(_) => AUTH_TYPE_STANDARD,
        TransactionAuth::Sponsored(_, _) => AUTH_TYPE_SPONSORED,
    };
    let origin = tx.auth.origin();
    Ok(presign_sighash(
        &cur_sighash,
        auth_type,
        origin.fee(),
        origin.nonce(),
    ))
}

#[async_trait]
impl SigningDevice for SoftwareDevice {
    async fn derive_public_key(&self, path: &str) -> Result<PublicKey, DeviceError> {
        Ok(self.key_pair(path)?.public_key())
    }

    async fn sign(&self, path: &str, message: &[u8]) -> Result<SignResponse, DeviceError> {
        let pair = self.key_pair(path)?;
        if self.rejecting {
            return Ok(SignResponse::failure(STATUS_REJECTED, "signing rejected"));
        }

        let digest = match signing_hash(message) {
            Ok(digest) => digest,
            Err(reason) => return Ok(SignResponse::failure(STATUS_DATA_INVALID, reason)),
        };
        let signature = pair
            .sign_recoverable(&digest)
            .map_err(|e| DeviceError::Transport(e.to_string()))?;

        debug!("Software device signed {} bytes with {}", message.len(), path);
        Ok(SignResponse::success(signature, SigHash(digest)))
    }
}
