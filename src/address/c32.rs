//! Crockford base32 ("c32") encoding with c32check checksums
//!
//! Stacks addresses are `S` followed by the c32check encoding of an
//! address version and a hash160.

use super::AddressError;
use crate::crypto::checksum;

/// The c32 alphabet (Crockford base32, no I, L, O, U)
pub const C32_CHARACTERS: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

fn c32_digit(c: u8) -> Result<u8, AddressError> {
    let normalized = match c.to_ascii_uppercase() {
        b'O' => b'0',
        b'L' | b'I' => b'1',
        other => other,
    };
    C32_CHARACTERS
        .iter()
        .position(|x| *x == normalized)
        .map(|p| p as u8)
        .ok_or(AddressError::InvalidCharacter(c as char))
}

/// Encode bytes as c32, preserving leading zero bytes as `0` digits
pub fn c32_encode(input: &[u8]) -> String {
    let mut result = Vec::with_capacity(input.len() * 8 / 5 + 1);
    let mut carry: u8 = 0;
    let mut carry_bits: u8 = 0;

    for current in input.iter().rev() {
        let low_bits_to_take = 5 - carry_bits;
        let low_bits = current & ((1u8 << low_bits_to_take) - 1);
        let c32_value = (low_bits << carry_bits) + carry;
        result.push(C32_CHARACTERS[c32_value as usize]);

        carry_bits = (8 + carry_bits) - 5;
        carry = current >> (8 - carry_bits);

        if carry_bits >= 5 {
            let c32_value = carry & 0x1f;
            result.push(C32_CHARACTERS[c32_value as usize]);
            carry_bits -= 5;
            carry >>= 5;
        }
    }

    if carry_bits > 0 {
        result.push(C32_CHARACTERS[carry as usize]);
    }

    // strip zero digits produced by the bit packing
    while result.last() == Some(&C32_CHARACTERS[0]) {
        result.pop();
    }

    // one zero digit per leading zero byte
    for current in input.iter() {
        if *current != 0 {
            break;
        }
        result.push(C32_CHARACTERS[0]);
    }

    result.reverse();
    result.into_iter().map(char::from).collect()
}

/// Decode a c32 string back into bytes
pub fn c32_decode(input: &str) -> Result<Vec<u8>, AddressError> {
    if !input.is_ascii() {
        return Err(AddressError::InvalidCharacter(
            input.chars().find(|c| !c.is_ascii()).unwrap_or('?'),
        ));
    }

    let digits = input
        .bytes()
        .rev()
        .map(c32_digit)
        .collect::<Result<Vec<u8>, _>>()?;

    let mut result = Vec::with_capacity(input.len() * 5 / 8 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u16 = 0;

    for digit in &digits {
        carry += u16::from(*digit) << carry_bits;
        carry_bits += 5;
        if carry_bits >= 8 {
            result.push((carry & 0xff) as u8);
            carry_bits -= 8;
            carry >>= 8;
        }
    }

    if carry_bits > 0 {
        result.push(carry as u8);
    }

    while result.last() == Some(&0) {
        result.pop();
    }

    for digit in digits.iter().rev() {
        if *digit != 0 {
            break;
        }
        result.push(0);
    }

    result.reverse();
    Ok(result)
}

/// c32check: version character followed by c32(data || checksum)
pub fn c32check_encode(version: u8, data: &[u8]) -> Result<String, AddressError> {
    if version >= 32 {
        return Err(AddressError::InvalidVersion(version));
    }

    let mut check_input = Vec::with_capacity(data.len() + 1);
    check_input.push(version);
    check_input.extend_from_slice(data);

    let mut encoding_data = data.to_vec();
    encoding_data.extend_from_slice(&checksum(&check_input));

    let mut encoded = String::with_capacity(encoding_data.len() * 2);
    encoded.push(C32_CHARACTERS[version as usize] as char);
    encoded.push_str(&c32_encode(&encoding_data));
    Ok(encoded)
}

/// Decode a c32check string into its version and payload, verifying the checksum
pub fn c32check_decode(input: &str) -> Result<(u8, Vec<u8>), AddressError> {
    if input.len() < 2 || !input.is_ascii() {
        return Err(AddressError::InvalidLength(input.len()));
    }

    let (version_char, data_str) = input.split_at(1);
    let version = c32_digit(version_char.as_bytes()[0])?;
    let data_with_checksum = c32_decode(data_str)?;
    if data_with_checksum.len() < 4 {
        return Err(AddressError::InvalidLength(data_with_checksum.len()));
    }

    let (data, expected) = data_with_checksum.split_at(data_with_checksum.len() - 4);

    let mut check_input = Vec::with_capacity(data.len() + 1);
    check_input.push(version);
    check_input.extend_from_slice(data);
    if &checksum(&check_input)[..] != expected {
        return Err(AddressError::InvalidChecksum);
    }

    Ok((version, data.to_vec()))
}
