//! Multisig redeem scripts and the addresses derived from them
//!
//! A multisig account is identified by the hash of a Bitcoin-style
//! `OP_m <key_1> .. <key_n> OP_n OP_CHECKMULTISIG` redeem script. The script
//! hash is wrapped as a P2SH legacy address and re-encoded as a C32 address.
//! Key order is significant: two orderings of the same keys generally give
//! two different addresses.

use log::debug;
use thiserror::Error;

use crate::address::legacy::{b58check_encode, BITCOIN_VERSION_MAINNET_P2SH};
use crate::address::{b58_to_c32, AddressError};
use crate::crypto::{hash160, PublicKey, PUBLIC_KEY_ENCODED_SIZE};
use crate::network::Network;

// =============================================================================
// Script Constants
// =============================================================================

/// `OP_1`; `OP_m` is `OP_1 + m - 1`
pub const OP_1: u8 = 0x51;
/// `OP_CHECKMULTISIG`
pub const OP_CHECKMULTISIG: u8 = 0xae;
/// Small-integer opcodes only reach 16
pub const MAX_MULTISIG_KEYS: usize = 16;

// =============================================================================
// Script Errors
// =============================================================================

/// Script construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Invalid threshold: {threshold} of {keys} keys")]
    InvalidThreshold { threshold: usize, keys: usize },
    #[error("Too many keys for a multisig script: {0} (max 16)")]
    TooManyKeys(usize),
    #[error("Address derivation failed: {0}")]
    Address(#[from] AddressError),
}

// =============================================================================
// Redeem Script
// =============================================================================

/// The byte encoding of an M-of-N check-multisig script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemScript(Vec<u8>);

impl RedeemScript {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// hash160 of the script, the payload of the P2SH address
    pub fn script_hash(&self) -> [u8; 20] {
        hash160(&self.0)
    }
}

fn small_int_opcode(value: usize) -> u8 {
    // callers guarantee 1 <= value <= 16
    OP_1 + (value as u8) - 1
}

/// Build the redeem script for `keys` (in the given order) and `threshold`
pub fn build_redeem_script(
    keys: &[PublicKey],
    threshold: usize,
) -> Result<RedeemScript, ScriptError> {
    if threshold < 1 || threshold > keys.len() {
        return Err(ScriptError::InvalidThreshold {
            threshold,
            keys: keys.len(),
        });
    }
    if keys.len() > MAX_MULTISIG_KEYS {
        return Err(ScriptError::TooManyKeys(keys.len()));
    }

    let mut script = Vec::with_capacity(3 + keys.len() * (PUBLIC_KEY_ENCODED_SIZE + 1));
    script.push(small_int_opcode(threshold));
    for key in keys {
        script.push(PUBLIC_KEY_ENCODED_SIZE as u8);
        script.extend_from_slice(key.as_bytes());
    }
    script.push(small_int_opcode(keys.len()));
    script.push(OP_CHECKMULTISIG);

    Ok(RedeemScript(script))
}

/// Legacy P2SH address (`3…`) of a redeem script
pub fn legacy_address(script: &RedeemScript) -> String {
    b58check_encode(BITCOIN_VERSION_MAINNET_P2SH, &script.script_hash())
}

/// Chain-native (`SM…`) address of a redeem script
pub fn derive_address(script: &RedeemScript) -> Result<String, ScriptError> {
    Ok(b58_to_c32(&legacy_address(script))?)
}

/// Chain-native address of a redeem script for a specific network (`SM…` / `SN…`)
pub fn derive_address_on(script: &RedeemScript, network: Network) -> Result<String, ScriptError> {
    let address = crate::address::StacksAddress::new(
        network.multisig_address_version(),
        script.script_hash(),
    )?;
    Ok(address.to_string())
}

/// `derive_address(build_redeem_script(keys, threshold))`
pub fn make_multisig_address(keys: &[PublicKey], threshold: usize) -> Result<String, ScriptError> {
    let script = build_redeem_script(keys, threshold)?;
    let address = derive_address(&script)?;
    debug!(
        "Derived {}-of-{} multisig address {}",
        threshold,
        keys.len(),
        address
    );
    Ok(address)
}

/// Legacy form of `make_multisig_address`
pub fn make_multisig_address_legacy(
    keys: &[PublicKey],
    threshold: usize,
) -> Result<String, ScriptError> {
    Ok(legacy_address(&build_redeem_script(keys, threshold)?))
}
