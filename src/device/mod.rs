//! Signing device collaborator
//!
//! Private keys never leave the device. The engine only ever asks it for the
//! public key at a derivation path and for a signature over a message.

pub mod software;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{MessageSignature, PublicKey};
use crate::multisig::{MultisigConfig, MultisigError, MultisigWallet};

pub use software::SoftwareDevice;

/// Account-level path for single-signature Stacks keys
pub const XPUB_PATH: &str = "m/44'/5757'/0'";

/// Account-level path for keys used in multisig redeem scripts
pub const BTC_MULTISIG_SCRIPT_PATH: &str = "m/5757'/0'/0";

/// Path of the `index`-th single-signature key
pub fn singlesig_standard_path(index: u32) -> String {
    format!("{}/0/{}", XPUB_PATH, index)
}

/// Path of the `index`-th multisig key
pub fn multisig_standard_path(index: u32) -> String {
    format!("{}/0/{}", BTC_MULTISIG_SCRIPT_PATH, index)
}

/// Errors talking to a device
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("No key at derivation path {0}")]
    UnknownPath(String),
    #[error("Device transport failed: {0}")]
    Transport(String),
}

/// A 32-byte signature hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SigHash(pub [u8; 32]);

impl SigHash {
    pub fn from_hex(s: &str) -> Result<Self, String> {
        let bytes = hex::decode(s.trim()).map_err(|e| e.to_string())?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| format!("expected 32 bytes, got {}", bytes.len()))?;
        Ok(Self(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for SigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigHash({})", self.to_hex())
    }
}

impl FromStr for SigHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for SigHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<SigHash> for String {
    fn from(hash: SigHash) -> Self {
        hash.to_hex()
    }
}

/// Outcome reported by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Success,
    Error { code: u16, message: String },
}

/// A signing response
///
/// `post_sign_hash` is the chain state a following sequential signer must
/// be given together with this signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignResponse {
    pub status: DeviceStatus,
    pub signature: MessageSignature,
    pub post_sign_hash: SigHash,
}

impl SignResponse {
    pub fn success(signature: MessageSignature, post_sign_hash: SigHash) -> Self {
        Self {
            status: DeviceStatus::Success,
            signature,
            post_sign_hash,
        }
    }

    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: DeviceStatus::Error {
                code,
                message: message.into(),
            },
            signature: MessageSignature::empty(),
            post_sign_hash: SigHash([0u8; 32]),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeviceStatus::Success
    }
}

/// Capability interface of a signing device
#[async_trait]
pub trait SigningDevice: Send + Sync {
    /// Compressed public key at `path`
    async fn derive_public_key(&self, path: &str) -> Result<PublicKey, DeviceError>;

    /// Sign `message` with the key at `path`
    ///
    /// For chained signing the previous signer's chain state and signature
    /// are appended to the serialized transaction.
    async fn sign(&self, path: &str, message: &[u8]) -> Result<SignResponse, DeviceError>;
}

/// A multisig address generated from device keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedMultisig {
    pub address: String,
    pub public_keys: Vec<PublicKey>,
    pub paths: Vec<String>,
    pub signatures_required: usize,
}

/// Derive `signers` keys at the standard multisig paths and build a
/// `required`-of-`signers` address over them in sorted key order
///
/// Paths are reordered together with their keys, so `paths[i]` is always
/// the path of `public_keys[i]`.
pub async fn generate_multisig_address(
    device: &dyn SigningDevice,
    signers: u32,
    required: usize,
) -> Result<GeneratedMultisig, MultisigError> {
    let mut key_paths = Vec::with_capacity(signers as usize);
    for index in 0..signers {
        let path = multisig_standard_path(index);
        let key = device.derive_public_key(&path).await?;
        key_paths.push((key, path));
    }
    key_paths.sort_by(|a, b| a.0.cmp(&b.0));

    let (public_keys, paths): (Vec<PublicKey>, Vec<String>) = key_paths.into_iter().unzip();
    let wallet = MultisigWallet::new(MultisigConfig::new(required, public_keys)?)?;

    info!(
        "Generated {} multisig address {}",
        wallet.description(),
        wallet.address
    );

    Ok(GeneratedMultisig {
        address: wallet.address,
        public_keys: wallet.config.signers,
        paths,
        signatures_required: required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::make_multisig_address;
    use crate::crypto::KeyPair;

    #[test]
    fn test_standard_paths() {
        assert_eq!(singlesig_standard_path(3), "m/44'/5757'/0'/0/3");
        assert_eq!(multisig_standard_path(0), "m/5757'/0'/0/0/0");
    }

    #[test]
    fn test_sighash_hex() {
        let hash = SigHash([0xab; 32]);
        let parsed: SigHash = hash.to_hex().parse().unwrap();
        assert_eq!(parsed, hash);
        assert!(SigHash::from_hex("abcd").is_err());
        assert_eq!(
            serde_json::to_string(&hash).unwrap(),
            format!("\"{}\"", "ab".repeat(32))
        );
    }

    #[test]
    fn test_failure_response() {
        let response = SignResponse::failure(0x6985, "rejected by user");
        assert!(!response.is_success());
        assert_eq!(response.signature, MessageSignature::empty());
    }

    #[tokio::test]
    async fn test_generate_multisig_address_sorts_keys_with_paths() {
        let pairs: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();
        let device = SoftwareDevice::with_multisig_keys(pairs.clone());

        let generated = generate_multisig_address(&device, 3, 2).await.unwrap();

        let mut expected_keys: Vec<PublicKey> = pairs.iter().map(|p| p.public_key()).collect();
        expected_keys.sort();
        assert_eq!(generated.public_keys, expected_keys);
        assert_eq!(
            generated.address,
            make_multisig_address(&expected_keys, 2).unwrap()
        );
        for (key, path) in generated.public_keys.iter().zip(&generated.paths) {
            assert_eq!(&device.derive_public_key(path).await.unwrap(), key);
        }
    }

    #[tokio::test]
    async fn test_generate_multisig_address_bad_threshold() {
        let pairs: Vec<KeyPair> = (0..2).map(|_| KeyPair::generate()).collect();
        let device = SoftwareDevice::with_multisig_keys(pairs);
        assert!(matches!(
            generate_multisig_address(&device, 2, 3).await,
            Err(MultisigError::InvalidThreshold { .. })
        ));
        assert!(matches!(
            generate_multisig_address(&device, 3, 2).await,
            Err(MultisigError::Device(_))
        ));

        let pair = KeyPair::generate();
        let device = SoftwareDevice::with_multisig_keys(vec![pair.clone(), pair]);
        assert!(matches!(
            generate_multisig_address(&device, 2, 1).await,
            Err(MultisigError::InvalidField { .. })
        ));
    }
}
