//! Legacy (Bitcoin-style) base58check addresses
//!
//! Multisig accounts are defined by a P2SH script hash, so their address is
//! first produced in base58check form and then re-encoded as a Stacks address.

use super::{
    AddressError, StacksAddress, C32_ADDRESS_VERSION_MAINNET_MULTISIG,
    C32_ADDRESS_VERSION_MAINNET_SINGLESIG, C32_ADDRESS_VERSION_TESTNET_MULTISIG,
    C32_ADDRESS_VERSION_TESTNET_SINGLESIG,
};
use crate::crypto::checksum;

/// Bitcoin mainnet P2PKH version byte (addresses starting with '1')
pub const BITCOIN_VERSION_MAINNET_P2PKH: u8 = 0;
/// Bitcoin mainnet P2SH version byte (addresses starting with '3')
pub const BITCOIN_VERSION_MAINNET_P2SH: u8 = 5;
/// Bitcoin testnet P2PKH version byte
pub const BITCOIN_VERSION_TESTNET_P2PKH: u8 = 111;
/// Bitcoin testnet P2SH version byte
pub const BITCOIN_VERSION_TESTNET_P2SH: u8 = 196;

/// Map a legacy version byte to its Stacks counterpart
pub fn legacy_to_c32_version(version: u8) -> u8 {
    match version {
        BITCOIN_VERSION_MAINNET_P2PKH => C32_ADDRESS_VERSION_MAINNET_SINGLESIG,
        BITCOIN_VERSION_MAINNET_P2SH => C32_ADDRESS_VERSION_MAINNET_MULTISIG,
        BITCOIN_VERSION_TESTNET_P2PKH => C32_ADDRESS_VERSION_TESTNET_SINGLESIG,
        BITCOIN_VERSION_TESTNET_P2SH => C32_ADDRESS_VERSION_TESTNET_MULTISIG,
        other => other,
    }
}

/// Map a Stacks version byte to its legacy counterpart
pub fn c32_to_legacy_version(version: u8) -> u8 {
    match version {
        C32_ADDRESS_VERSION_MAINNET_SINGLESIG => BITCOIN_VERSION_MAINNET_P2PKH,
        C32_ADDRESS_VERSION_MAINNET_MULTISIG => BITCOIN_VERSION_MAINNET_P2SH,
        C32_ADDRESS_VERSION_TESTNET_SINGLESIG => BITCOIN_VERSION_TESTNET_P2PKH,
        C32_ADDRESS_VERSION_TESTNET_MULTISIG => BITCOIN_VERSION_TESTNET_P2SH,
        other => other,
    }
}

/// Base58Check(version || hash160 || checksum)
pub fn b58check_encode(version: u8, hash: &[u8; 20]) -> String {
    let mut address_bytes = Vec::with_capacity(25);
    address_bytes.push(version);
    address_bytes.extend_from_slice(hash);

    let check = checksum(&address_bytes);
    address_bytes.extend_from_slice(&check);

    bs58::encode(address_bytes).into_string()
}

/// Decode a base58check address into its version byte and hash160
pub fn b58check_decode(address: &str) -> Result<(u8, [u8; 20]), AddressError> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;

    if bytes.len() != 25 {
        return Err(AddressError::InvalidLength(bytes.len()));
    }

    let (payload, expected) = bytes.split_at(21);
    if &checksum(payload)[..] != expected {
        return Err(AddressError::InvalidChecksum);
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    Ok((payload[0], hash))
}

/// Convert a legacy base58check address into a Stacks (C32) address
pub fn b58_to_c32(address: &str) -> Result<String, AddressError> {
    let (version, hash) = b58check_decode(address)?;
    let stacks = StacksAddress::new(legacy_to_c32_version(version), hash)?;
    Ok(stacks.to_string())
}

/// Convert a Stacks (C32) address into a legacy base58check address
pub fn c32_to_b58(address: &str) -> Result<String, AddressError> {
    let stacks: StacksAddress = address.parse()?;
    Ok(b58check_encode(
        c32_to_legacy_version(stacks.version),
        &stacks.bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = "3HjygLSaPnmV5KZoptFNpQgmm6adRDUoHd";
    const STACKS: &str = "SM2R12RQCV9SCAZPM37VSCVP4X3EQK1Y70KCV7EDE";

    #[test]
    fn test_p2sh_address_format() {
        let hash: [u8; 20] = hex::decode("b01162ecda72c57ed419f7966ec4e8dd7987c704")
            .unwrap()
            .try_into()
            .unwrap();
        let address = b58check_encode(BITCOIN_VERSION_MAINNET_P2SH, &hash);
        // P2SH addresses start with 3
        assert!(address.starts_with('3'));
        assert_eq!(address, LEGACY);

        let (version, decoded) = b58check_decode(&address).unwrap();
        assert_eq!(version, BITCOIN_VERSION_MAINNET_P2SH);
        assert_eq!(decoded, hash);
    }

    #[test]
    fn test_conversion_both_ways() {
        assert_eq!(b58_to_c32(LEGACY).unwrap(), STACKS);
        assert_eq!(c32_to_b58(STACKS).unwrap(), LEGACY);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut tampered = LEGACY.to_string();
        tampered.pop();
        tampered.push('e');
        assert!(b58check_decode(&tampered).is_err());
        assert!(b58check_decode("0OIl").is_err());
    }

    #[test]
    fn test_version_mapping() {
        for v in [0u8, 5, 111, 196] {
            assert_eq!(c32_to_legacy_version(legacy_to_c32_version(v)), v);
        }
    }
}
