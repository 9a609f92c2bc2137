//! ECDSA key management
//!
//! Compressed secp256k1 public keys as they appear in multisig
//! authorization slots, the 65-byte recoverable signatures that replace
//! them once signed, and an in-process key pair used by software signers.

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, Secp256k1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a compressed public key
pub const PUBLIC_KEY_ENCODED_SIZE: usize = 33;

/// Length of a recoverable signature: recovery id, r, s
pub const MESSAGE_SIGNATURE_ENCODED_SIZE: usize = 65;

/// Errors that can occur during key operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key '{0}': {1}")]
    InvalidPublicKey(String, String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A compressed secp256k1 public key
///
/// Ordering is byte-wise, which matches ascending order of the lowercase
/// hex representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_ENCODED_SIZE]);

impl PublicKey {
    /// Parse and validate a compressed public key
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PUBLIC_KEY_ENCODED_SIZE {
            return Err(KeyError::InvalidPublicKey(
                hex::encode(bytes),
                format!(
                    "expected {} bytes, got {}",
                    PUBLIC_KEY_ENCODED_SIZE,
                    bytes.len()
                ),
            ));
        }
        secp256k1::PublicKey::from_slice(bytes).map_err(|e| {
            KeyError::InvalidPublicKey(hex::encode(bytes), e.to_string())
        })?;

        let mut buf = [0u8; PUBLIC_KEY_ENCODED_SIZE];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Parse a public key from hex string
    pub fn from_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|e| {
            KeyError::InvalidPublicKey(hex_key.to_string(), e.to_string())
        })?;
        Self::from_slice(&bytes)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_ENCODED_SIZE] {
        &self.0
    }

    /// Get the public key as a lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<&secp256k1::PublicKey> for PublicKey {
    fn from(key: &secp256k1::PublicKey) -> Self {
        Self(key.serialize())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A recoverable ECDSA signature in (recovery id, r, s) order
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageSignature([u8; MESSAGE_SIGNATURE_ENCODED_SIZE]);

impl MessageSignature {
    /// All-zero placeholder used when clearing a condition for hashing
    pub fn empty() -> Self {
        Self([0u8; MESSAGE_SIGNATURE_ENCODED_SIZE])
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != MESSAGE_SIGNATURE_ENCODED_SIZE {
            return Err(KeyError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                MESSAGE_SIGNATURE_ENCODED_SIZE,
                bytes.len()
            )));
        }
        let mut buf = [0u8; MESSAGE_SIGNATURE_ENCODED_SIZE];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    pub fn from_hex(hex_sig: &str) -> Result<Self, KeyError> {
        let bytes =
            hex::decode(hex_sig.trim()).map_err(|e| KeyError::InvalidSignature(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MESSAGE_SIGNATURE_ENCODED_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Recover the public key that produced this signature over a 32-byte digest
    pub fn recover(&self, digest: &[u8]) -> Result<PublicKey, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(digest)?;
        let recovery_id = RecoveryId::from_i32(i32::from(self.0[0]))?;
        let sig = RecoverableSignature::from_compact(&self.0[1..], recovery_id)?;
        let key = secp.recover_ecdsa(&message, &sig)?;
        Ok(PublicKey::from(&key))
    }
}

impl fmt::Debug for MessageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageSignature({})", self.to_hex())
    }
}

impl Serialize for MessageSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for MessageSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: secp256k1::PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    ///
    /// Accepts the 33-byte Stacks form with a trailing `01` compression flag.
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::InvalidPrivateKey)?;
        let raw = match bytes.len() {
            32 => &bytes[..],
            33 if bytes[32] == 0x01 => &bytes[..32],
            _ => return Err(KeyError::InvalidPrivateKey),
        };
        let secret_key = SecretKey::from_slice(raw).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the compressed public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(&self.public_key)
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        self.public_key().to_hex()
    }

    /// Sign a 32-byte digest, producing a recoverable signature
    pub fn sign_recoverable(&self, digest: &[u8]) -> Result<MessageSignature, KeyError> {
        let secp = Secp256k1::new();
        let message = Message::from_digest_slice(digest)?;
        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(&message, &self.secret_key)
            .serialize_compact();

        let mut buf = [0u8; MESSAGE_SIGNATURE_ENCODED_SIZE];
        buf[0] = recovery_id.to_i32() as u8;
        buf[1..].copy_from_slice(&compact);
        Ok(MessageSignature(buf))
    }
}
