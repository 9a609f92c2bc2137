//! Stacks wire format for token-transfer transactions
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! version u8 | chain_id u32 | auth | anchor_mode u8 | post_condition_mode u8
//! | post_conditions u32 (always 0) | payload
//! ```
//!
//! Also provides base64 transport encoding, the transaction id and the
//! signature hashes a signer commits to.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use thiserror::Error;

use crate::address::{AddressError, StacksAddress};
use crate::core::transaction::{
    AnchorMode, AuthField, MultisigHashMode, MultisigSpendingCondition, PostConditionMode,
    PrincipalData, PubKeyEncoding, SinglesigHashMode, SinglesigSpendingCondition,
    SpendingCondition, StacksTransaction, TokenTransferMemo, TransactionAuth, TransactionPayload,
    MAX_CONTRACT_NAME_LENGTH, TOKEN_TRANSFER_MEMO_LENGTH,
};
use crate::crypto::{
    sha512_256, KeyError, MessageSignature, PublicKey, MESSAGE_SIGNATURE_ENCODED_SIZE,
    PUBLIC_KEY_ENCODED_SIZE,
};

// =============================================================================
// Wire Constants
// =============================================================================

pub const AUTH_TYPE_STANDARD: u8 = 0x04;
pub const AUTH_TYPE_SPONSORED: u8 = 0x05;

const FIELD_PUBKEY_COMPRESSED: u8 = 0x00;
const FIELD_PUBKEY_UNCOMPRESSED: u8 = 0x01;
const FIELD_SIGNATURE_COMPRESSED: u8 = 0x02;
const FIELD_SIGNATURE_UNCOMPRESSED: u8 = 0x03;

const PAYLOAD_TOKEN_TRANSFER: u8 = 0x00;
const PRINCIPAL_STANDARD: u8 = 0x05;
const PRINCIPAL_CONTRACT: u8 = 0x06;

/// Errors from encoding or decoding transactions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("Invalid {field} byte: 0x{value:02x}")]
    InvalidByte { field: &'static str, value: u8 },
    #[error("Unsupported transaction feature: {0}")]
    Unsupported(String),
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
    #[error("Invalid contract name: {0}")]
    InvalidContractName(String),
    #[error("Invalid base64: {0}")]
    Base64(String),
    #[error("Amount {0} does not fit the 64-bit wire field")]
    AmountOverflow(u128),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Address error: {0}")]
    Address(#[from] AddressError),
}

// =============================================================================
// Serialization
// =============================================================================

/// Serialize a transaction to its wire bytes
///
/// Fails only when the transfer amount exceeds the 64-bit wire field.
pub fn serialize(tx: &StacksTransaction) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(256);
    out.push(tx.version);
    out.extend_from_slice(&tx.chain_id.to_be_bytes());
    write_auth(&mut out, &tx.auth);
    out.push(tx.anchor_mode as u8);
    out.push(tx.post_condition_mode as u8);
    out.extend_from_slice(&0u32.to_be_bytes());
    write_payload(&mut out, &tx.payload)?;
    Ok(out)
}

fn write_auth(out: &mut Vec<u8>, auth: &TransactionAuth) {
    match auth {
        TransactionAuth::Standard(origin) => {
            out.push(AUTH_TYPE_STANDARD);
            write_condition(out, origin);
        }
        TransactionAuth::Sponsored(origin, sponsor) => {
            out.push(AUTH_TYPE_SPONSORED);
            write_condition(out, origin);
            write_condition(out, sponsor);
        }
    }
}

fn write_condition(out: &mut Vec<u8>, condition: &SpendingCondition) {
    match condition {
        SpendingCondition::Singlesig(c) => {
            out.push(c.hash_mode as u8);
            out.extend_from_slice(&c.signer);
            out.extend_from_slice(&c.nonce.to_be_bytes());
            out.extend_from_slice(&c.fee.to_be_bytes());
            out.push(c.key_encoding as u8);
            out.extend_from_slice(c.signature.as_bytes());
        }
        SpendingCondition::Multisig(c) => {
            out.push(c.hash_mode as u8);
            out.extend_from_slice(&c.signer);
            out.extend_from_slice(&c.nonce.to_be_bytes());
            out.extend_from_slice(&c.fee.to_be_bytes());
            out.extend_from_slice(&(c.fields.len() as u32).to_be_bytes());
            for field in &c.fields {
                write_auth_field(out, field);
            }
            out.extend_from_slice(&c.signatures_required.to_be_bytes());
        }
    }
}

fn write_auth_field(out: &mut Vec<u8>, field: &AuthField) {
    match field {
        AuthField::PublicKey { key } => {
            out.push(FIELD_PUBKEY_COMPRESSED);
            out.extend_from_slice(key.as_bytes());
        }
        AuthField::Signature {
            encoding,
            signature,
        } => {
            out.push(match encoding {
                PubKeyEncoding::Compressed => FIELD_SIGNATURE_COMPRESSED,
                PubKeyEncoding::Uncompressed => FIELD_SIGNATURE_UNCOMPRESSED,
            });
            out.extend_from_slice(signature.as_bytes());
        }
    }
}

fn write_payload(out: &mut Vec<u8>, payload: &TransactionPayload) -> Result<(), CodecError> {
    match payload {
        TransactionPayload::TokenTransfer {
            recipient,
            amount,
            memo,
        } => {
            let amount = u64::try_from(*amount).map_err(|_| CodecError::AmountOverflow(*amount))?;
            out.push(PAYLOAD_TOKEN_TRANSFER);
            write_principal(out, recipient);
            out.extend_from_slice(&amount.to_be_bytes());
            out.extend_from_slice(&memo.0);
        }
    }
    Ok(())
}

fn write_principal(out: &mut Vec<u8>, principal: &PrincipalData) {
    match principal {
        PrincipalData::Standard(address) => {
            out.push(PRINCIPAL_STANDARD);
            out.push(address.version);
            out.extend_from_slice(&address.bytes);
        }
        PrincipalData::Contract(address, name) => {
            out.push(PRINCIPAL_CONTRACT);
            out.push(address.version);
            out.extend_from_slice(&address.bytes);
            // names are capped at 128 bytes when parsed
            out.push(name.len() as u8);
            out.extend_from_slice(name.as_bytes());
        }
    }
}

// =============================================================================
// Deserialization
// =============================================================================

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], CodecError> {
        if self.bytes.len() - self.pos < len {
            return Err(CodecError::UnexpectedEof(what));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N, what)?);
        Ok(buf)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.array(what)?))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.array(what)?))
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.array(what)?))
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

/// Deserialize a complete transaction; trailing bytes are an error
pub fn deserialize(bytes: &[u8]) -> Result<StacksTransaction, CodecError> {
    let (tx, consumed) = deserialize_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes(bytes.len() - consumed));
    }
    Ok(tx)
}

/// Deserialize a transaction from the front of `bytes`
///
/// Returns the transaction and the number of bytes it occupied, so callers
/// can read data appended after it.
pub fn deserialize_prefix(bytes: &[u8]) -> Result<(StacksTransaction, usize), CodecError> {
    let mut r = Reader::new(bytes);

    let version = r.u8("version")?;
    let chain_id = r.u32("chain id")?;
    let auth = read_auth(&mut r)?;

    let anchor_byte = r.u8("anchor mode")?;
    let anchor_mode = AnchorMode::from_byte(anchor_byte).ok_or(CodecError::InvalidByte {
        field: "anchor mode",
        value: anchor_byte,
    })?;

    let mode_byte = r.u8("post-condition mode")?;
    let post_condition_mode =
        PostConditionMode::from_byte(mode_byte).ok_or(CodecError::InvalidByte {
            field: "post-condition mode",
            value: mode_byte,
        })?;

    let post_conditions = r.u32("post-condition count")?;
    if post_conditions != 0 {
        return Err(CodecError::Unsupported(format!(
            "{} post conditions",
            post_conditions
        )));
    }

    let payload = read_payload(&mut r)?;

    let tx = StacksTransaction {
        version,
        chain_id,
        auth,
        anchor_mode,
        post_condition_mode,
        payload,
    };
    Ok((tx, r.pos))
}

fn read_auth(r: &mut Reader<'_>) -> Result<TransactionAuth, CodecError> {
    match r.u8("auth type")? {
        AUTH_TYPE_STANDARD => Ok(TransactionAuth::Standard(read_condition(r)?)),
        AUTH_TYPE_SPONSORED => {
            let origin = read_condition(r)?;
            let sponsor = read_condition(r)?;
            Ok(TransactionAuth::Sponsored(origin, sponsor))
        }
        value => Err(CodecError::InvalidByte {
            field: "auth type",
            value,
        }),
    }
}

fn read_condition(r: &mut Reader<'_>) -> Result<SpendingCondition, CodecError> {
    let hash_byte = r.u8("hash mode")?;

    if let Some(hash_mode) = SinglesigHashMode::from_byte(hash_byte) {
        let signer = r.array::<20>("signer")?;
        let nonce = r.u64("nonce")?;
        let fee = r.u64("fee")?;
        let encoding_byte = r.u8("key encoding")?;
        let key_encoding =
            PubKeyEncoding::from_byte(encoding_byte).ok_or(CodecError::InvalidByte {
                field: "key encoding",
                value: encoding_byte,
            })?;
        let signature = MessageSignature::from_slice(
            r.take(MESSAGE_SIGNATURE_ENCODED_SIZE, "signature")?,
        )?;
        return Ok(SpendingCondition::Singlesig(SinglesigSpendingCondition {
            hash_mode,
            signer,
            nonce,
            fee,
            key_encoding,
            signature,
        }));
    }

    let hash_mode = MultisigHashMode::from_byte(hash_byte).ok_or(CodecError::InvalidByte {
        field: "hash mode",
        value: hash_byte,
    })?;
    let signer = r.array::<20>("signer")?;
    let nonce = r.u64("nonce")?;
    let fee = r.u64("fee")?;

    let count = r.u32("auth field count")? as usize;
    // every field is at least 34 bytes, so a count beyond that is garbage
    if count > r.remaining() / (PUBLIC_KEY_ENCODED_SIZE + 1) {
        return Err(CodecError::UnexpectedEof("auth fields"));
    }
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        fields.push(read_auth_field(r)?);
    }
    let signatures_required = r.u16("signatures required")?;

    Ok(SpendingCondition::Multisig(MultisigSpendingCondition {
        hash_mode,
        signer,
        nonce,
        fee,
        fields,
        signatures_required,
    }))
}

fn read_auth_field(r: &mut Reader<'_>) -> Result<AuthField, CodecError> {
    match r.u8("auth field id")? {
        FIELD_PUBKEY_COMPRESSED => {
            let key = PublicKey::from_slice(r.take(PUBLIC_KEY_ENCODED_SIZE, "public key")?)?;
            Ok(AuthField::PublicKey { key })
        }
        FIELD_PUBKEY_UNCOMPRESSED => Err(CodecError::Unsupported(
            "uncompressed public key auth field".to_string(),
        )),
        id @ (FIELD_SIGNATURE_COMPRESSED | FIELD_SIGNATURE_UNCOMPRESSED) => {
            let encoding = if id == FIELD_SIGNATURE_COMPRESSED {
                PubKeyEncoding::Compressed
            } else {
                PubKeyEncoding::Uncompressed
            };
            let signature = MessageSignature::from_slice(
                r.take(MESSAGE_SIGNATURE_ENCODED_SIZE, "signature")?,
            )?;
            Ok(AuthField::Signature {
                encoding,
                signature,
            })
        }
        value => Err(CodecError::InvalidByte {
            field: "auth field id",
            value,
        }),
    }
}

fn read_payload(r: &mut Reader<'_>) -> Result<TransactionPayload, CodecError> {
    match r.u8("payload type")? {
        PAYLOAD_TOKEN_TRANSFER => {
            let recipient = read_principal(r)?;
            let amount = u128::from(r.u64("amount")?);
            let memo = TokenTransferMemo(r.array::<TOKEN_TRANSFER_MEMO_LENGTH>("memo")?);
            Ok(TransactionPayload::TokenTransfer {
                recipient,
                amount,
                memo,
            })
        }
        other => Err(CodecError::Unsupported(format!(
            "payload type 0x{:02x}",
            other
        ))),
    }
}

fn read_principal(r: &mut Reader<'_>) -> Result<PrincipalData, CodecError> {
    let kind = r.u8("principal type")?;
    let version = r.u8("principal version")?;
    let bytes = r.array::<20>("principal hash")?;
    let address = StacksAddress::new(version, bytes)?;

    match kind {
        PRINCIPAL_STANDARD => Ok(PrincipalData::Standard(address)),
        PRINCIPAL_CONTRACT => {
            let len = r.u8("contract name length")? as usize;
            let raw = r.take(len, "contract name")?;
            let name = std::str::from_utf8(raw)
                .ok()
                .filter(|n| !n.is_empty() && n.len() <= MAX_CONTRACT_NAME_LENGTH && n.is_ascii())
                .ok_or_else(|| CodecError::InvalidContractName(hex::encode(raw)))?;
            Ok(PrincipalData::Contract(address, name.to_string()))
        }
        value => Err(CodecError::InvalidByte {
            field: "principal type",
            value,
        }),
    }
}

// =============================================================================
// Transport Encoding
// =============================================================================

/// Base64 of the wire bytes
pub fn tx_encode(tx: &StacksTransaction) -> Result<String, CodecError> {
    Ok(BASE64.encode(serialize(tx)?))
}

/// Inverse of [`tx_encode`]
pub fn tx_decode(encoded: &str) -> Result<StacksTransaction, CodecError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| CodecError::Base64(e.to_string()))?;
    deserialize(&bytes)
}

/// Transaction id: SHA-512/256 of the wire bytes
pub fn txid(tx: &StacksTransaction) -> Result<[u8; 32], CodecError> {
    Ok(sha512_256(&serialize(tx)?))
}

pub fn txid_hex(tx: &StacksTransaction) -> Result<String, CodecError> {
    Ok(hex::encode(txid(tx)?))
}

// =============================================================================
// Signature Hashes
// =============================================================================

fn clear_condition(condition: &mut SpendingCondition) {
    match condition {
        SpendingCondition::Singlesig(c) => {
            c.nonce = 0;
            c.fee = 0;
            c.key_encoding = PubKeyEncoding::Compressed;
            c.signature = MessageSignature::empty();
        }
        SpendingCondition::Multisig(c) => {
            c.nonce = 0;
            c.fee = 0;
            c.fields.clear();
        }
    }
}

/// Hash every signer starts from: the txid with nonce, fee and slots cleared
pub fn initial_sighash(tx: &StacksTransaction) -> Result<[u8; 32], CodecError> {
    let mut cleared = tx.clone();
    match &mut cleared.auth {
        TransactionAuth::Standard(origin) => clear_condition(origin),
        TransactionAuth::Sponsored(origin, sponsor) => {
            clear_condition(origin);
            clear_condition(sponsor);
        }
    }
    txid(&cleared)
}

/// Hash a signer signs: commits to the auth type, fee and nonce
pub fn presign_sighash(cur_sighash: &[u8; 32], auth_type: u8, fee: u64, nonce: u64) -> [u8; 32] {
    let mut data = Vec::with_capacity(32 + 1 + 8 + 8);
    data.extend_from_slice(cur_sighash);
    data.push(auth_type);
    data.extend_from_slice(&fee.to_be_bytes());
    data.extend_from_slice(&nonce.to_be_bytes());
    sha512_256(&data)
}

/// Hash after a signature has been applied
pub fn postsign_sighash(
    presign: &[u8; 32],
    encoding: PubKeyEncoding,
    signature: &MessageSignature,
) -> [u8; 32] {
    let mut data = Vec::with_capacity(32 + 1 + MESSAGE_SIGNATURE_ENCODED_SIZE);
    data.extend_from_slice(presign);
    data.push(encoding as u8);
    data.extend_from_slice(signature.as_bytes());
    sha512_256(&data)
}
