//! Multi-signature accounts
//!
//! An M-of-N account is a threshold plus an ordered key list. Its address
//! depends on the key order, so an account described by an unordered key set
//! has to be matched against its known address to recover the order.

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::core::{make_multisig_address, CodecError, ScriptError};
use crate::crypto::{KeyError, PublicKey};
use crate::device::DeviceError;
use crate::network::NodeError;

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Invalid threshold: {threshold} signatures required of {keys} keys")]
    InvalidThreshold { threshold: usize, keys: usize },
    #[error("Script derivation failed: {0}")]
    ScriptDerivation(String),
    #[error("Public keys did not match expected address. Expected {expected}, but pubkeys correspond to {sorted} (sorted) or {given} (as given)")]
    AddressMismatch {
        expected: String,
        sorted: String,
        given: String,
    },
    #[error("Public key {key} not found in auth fields: [{slots}]")]
    SignerNotFound { key: PublicKey, slots: String },
    #[error("Transaction authorization is not multisig")]
    NotMultisig,
    #[error("Signing mode mismatch: {0}")]
    SigningModeMismatch(String),
    #[error("Signing chain broken at slot {index}: {reason}")]
    ChainBroken { index: usize, reason: String },
    #[error("Device error: {0}")]
    Device(String),
    #[error("Transaction input validation failed: record {index}, field '{field}': {reason}")]
    Validation {
        index: usize,
        field: String,
        reason: String,
    },
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    #[error("Record {index}: {source}")]
    Record {
        index: usize,
        source: Box<MultisigError>,
    },
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Crypto error: {0}")]
    Key(#[from] KeyError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ScriptError> for MultisigError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::InvalidThreshold { threshold, keys } => {
                MultisigError::InvalidThreshold { threshold, keys }
            }
            other => MultisigError::ScriptDerivation(other.to_string()),
        }
    }
}

impl From<DeviceError> for MultisigError {
    fn from(err: DeviceError) -> Self {
        MultisigError::Device(err.to_string())
    }
}

impl MultisigError {
    pub(crate) fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        MultisigError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Recover the key order that reproduces `address`
///
/// Exactly two candidates are tried, in this order: keys sorted ascending
/// by their bytes, then keys as given. The first match wins.
pub fn match_address(
    keys: &[PublicKey],
    threshold: usize,
    address: &str,
) -> Result<Vec<PublicKey>, MultisigError> {
    let mut sorted = keys.to_vec();
    sorted.sort();
    let sorted_address = make_multisig_address(&sorted, threshold)?;
    if sorted_address == address {
        return Ok(sorted);
    }

    let given_address = make_multisig_address(keys, threshold)?;
    if given_address == address {
        return Ok(keys.to_vec());
    }

    debug!(
        "No key order matches {}: sorted {}, given {}",
        address, sorted_address, given_address
    );
    Err(MultisigError::AddressMismatch {
        expected: address.to_string(),
        sorted: sorted_address,
        given: given_address,
    })
}

/// Configuration for a multisig account
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MultisigConfig {
    /// Minimum signatures required (M in M-of-N)
    pub threshold: usize,
    /// Signer keys in script order
    pub signers: Vec<PublicKey>,
}

impl MultisigConfig {
    /// Create a new multisig configuration
    ///
    /// # Errors
    /// Returns error if the threshold is outside `1..=signers.len()` or a
    /// key appears twice (slot lookup by key would be ambiguous).
    pub fn new(threshold: usize, signers: Vec<PublicKey>) -> Result<Self, MultisigError> {
        if threshold == 0 || threshold > signers.len() {
            return Err(MultisigError::InvalidThreshold {
                threshold,
                keys: signers.len(),
            });
        }

        let mut sorted_signers = signers.clone();
        sorted_signers.sort();
        if let Some(pair) = sorted_signers.windows(2).find(|w| w[0] == w[1]) {
            return Err(MultisigError::invalid_field(
                "publicKeys",
                format!("duplicate key {}", pair[0]),
            ));
        }

        Ok(Self { threshold, signers })
    }

    /// Same keys in ascending order, the convention for new accounts
    pub fn sorted(mut self) -> Self {
        self.signers.sort();
        self
    }

    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.signers.len())
    }
}

/// A multisig account with its derived address
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MultisigWallet {
    /// Chain-native address (`SM…`)
    pub address: String,
    /// Legacy P2SH form of the same script hash (`3…`)
    pub legacy_address: String,
    pub config: MultisigConfig,
}

impl MultisigWallet {
    pub fn new(config: MultisigConfig) -> Result<Self, MultisigError> {
        let address = make_multisig_address(&config.signers, config.threshold)?;
        let legacy_address =
            crate::core::make_multisig_address_legacy(&config.signers, config.threshold)?;
        Ok(Self {
            address,
            legacy_address,
            config,
        })
    }

    /// Account whose key order is recovered from a known address
    pub fn from_address(
        keys: &[PublicKey],
        threshold: usize,
        address: &str,
    ) -> Result<Self, MultisigError> {
        let ordered = match_address(keys, threshold, address)?;
        Self::new(MultisigConfig::new(threshold, ordered)?)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_signer(&self, key: &PublicKey) -> bool {
        self.config.signers.contains(key)
    }

    pub fn description(&self) -> String {
        self.config.description()
    }
}
