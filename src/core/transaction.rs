//! Stacks transactions (token-transfer subset)
//!
//! The model covers what a multisig transfer needs:
//! - Standard and sponsored authorization
//! - Single-signature and multi-signature spending conditions
//! - Ordered authorization slots (public key or signature)
//! - STX token-transfer payloads to standard or contract principals
//!
//! The slot order of a multisig condition is fixed when the transaction is
//! built. The slot index is the only link between a signer and its signature,
//! so slots are replaced in place and never reordered.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::address::{AddressError, StacksAddress};
use crate::core::script::{build_redeem_script, ScriptError};
use crate::crypto::{MessageSignature, PublicKey};
use crate::network::Network;

// =============================================================================
// Constants
// =============================================================================

/// Token-transfer memo length on the wire
pub const TOKEN_TRANSFER_MEMO_LENGTH: usize = 34;

/// Longest contract name a principal may carry
pub const MAX_CONTRACT_NAME_LENGTH: usize = 128;

/// Micro-STX per STX
pub const MICROSTX_PER_STX: u128 = 1_000_000;

// =============================================================================
// Modes
// =============================================================================

/// Where the transaction may be mined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum AnchorMode {
    OnChainOnly = 0x01,
    OffChainOnly = 0x02,
    Any = 0x03,
}

impl AnchorMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(AnchorMode::OnChainOnly),
            0x02 => Some(AnchorMode::OffChainOnly),
            0x03 => Some(AnchorMode::Any),
            _ => None,
        }
    }
}

/// Whether asset movements not covered by post conditions are allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum PostConditionMode {
    Allow = 0x01,
    Deny = 0x02,
}

impl PostConditionMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(PostConditionMode::Allow),
            0x02 => Some(PostConditionMode::Deny),
            _ => None,
        }
    }
}

/// Hash mode of a single-signature spending condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum SinglesigHashMode {
    P2PKH = 0x00,
    P2WPKH = 0x02,
}

impl SinglesigHashMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(SinglesigHashMode::P2PKH),
            0x02 => Some(SinglesigHashMode::P2WPKH),
            _ => None,
        }
    }
}

/// Hash mode of a multi-signature spending condition
///
/// Sequential modes chain every signature into the message signed by the
/// next slot. Non-sequential modes sign the same message in every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum MultisigHashMode {
    P2SH = 0x01,
    P2WSH = 0x03,
    P2SHNonSequential = 0x05,
    P2WSHNonSequential = 0x07,
}

impl MultisigHashMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(MultisigHashMode::P2SH),
            0x03 => Some(MultisigHashMode::P2WSH),
            0x05 => Some(MultisigHashMode::P2SHNonSequential),
            0x07 => Some(MultisigHashMode::P2WSHNonSequential),
            _ => None,
        }
    }

    pub fn is_sequential(&self) -> bool {
        matches!(self, MultisigHashMode::P2SH | MultisigHashMode::P2WSH)
    }
}

/// Encoding of the public key a signature recovers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum PubKeyEncoding {
    Compressed = 0x00,
    Uncompressed = 0x01,
}

impl PubKeyEncoding {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(PubKeyEncoding::Compressed),
            0x01 => Some(PubKeyEncoding::Uncompressed),
            _ => None,
        }
    }
}

// =============================================================================
// Authorization
// =============================================================================

/// One authorization slot: a signer's public key until it signs, then its signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthField {
    PublicKey {
        key: PublicKey,
    },
    Signature {
        encoding: PubKeyEncoding,
        signature: MessageSignature,
    },
}

impl AuthField {
    pub fn public_key(key: PublicKey) -> Self {
        AuthField::PublicKey { key }
    }

    pub fn compressed_signature(signature: MessageSignature) -> Self {
        AuthField::Signature {
            encoding: PubKeyEncoding::Compressed,
            signature,
        }
    }

    pub fn is_signature(&self) -> bool {
        matches!(self, AuthField::Signature { .. })
    }

    /// The slot's key while it is still unsigned
    pub fn as_public_key(&self) -> Option<&PublicKey> {
        match self {
            AuthField::PublicKey { key } => Some(key),
            AuthField::Signature { .. } => None,
        }
    }

    pub fn as_signature(&self) -> Option<&MessageSignature> {
        match self {
            AuthField::Signature { signature, .. } => Some(signature),
            AuthField::PublicKey { .. } => None,
        }
    }
}

/// Multi-signature spending condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultisigSpendingCondition {
    pub hash_mode: MultisigHashMode,
    #[serde(serialize_with = "serialize_hash160")]
    pub signer: [u8; 20],
    pub nonce: u64,
    pub fee: u64,
    pub fields: Vec<AuthField>,
    pub signatures_required: u16,
}

impl MultisigSpendingCondition {
    /// Unsigned P2SH condition with one public-key slot per key, in the given order
    pub fn new(
        hash_mode: MultisigHashMode,
        keys: &[PublicKey],
        signatures_required: usize,
        nonce: u64,
        fee: u64,
    ) -> Result<Self, ScriptError> {
        let script = build_redeem_script(keys, signatures_required)?;
        Ok(Self {
            hash_mode,
            signer: script.script_hash(),
            nonce,
            fee,
            fields: keys.iter().copied().map(AuthField::public_key).collect(),
            // build_redeem_script caps the threshold at 16
            signatures_required: signatures_required as u16,
        })
    }

    pub fn signature_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_signature()).count()
    }

    /// Slot index holding `key` as an unsigned public key
    pub fn slot_of(&self, key: &PublicKey) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.as_public_key() == Some(key))
    }
}

/// Single-signature spending condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinglesigSpendingCondition {
    pub hash_mode: SinglesigHashMode,
    #[serde(serialize_with = "serialize_hash160")]
    pub signer: [u8; 20],
    pub nonce: u64,
    pub fee: u64,
    pub key_encoding: PubKeyEncoding,
    pub signature: MessageSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpendingCondition {
    Singlesig(SinglesigSpendingCondition),
    Multisig(MultisigSpendingCondition),
}

impl SpendingCondition {
    pub fn nonce(&self) -> u64 {
        match self {
            SpendingCondition::Singlesig(c) => c.nonce,
            SpendingCondition::Multisig(c) => c.nonce,
        }
    }

    pub fn fee(&self) -> u64 {
        match self {
            SpendingCondition::Singlesig(c) => c.fee,
            SpendingCondition::Multisig(c) => c.fee,
        }
    }

    pub fn signer(&self) -> &[u8; 20] {
        match self {
            SpendingCondition::Singlesig(c) => &c.signer,
            SpendingCondition::Multisig(c) => &c.signer,
        }
    }
}

/// Transaction authorization: the origin pays, unless a sponsor does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionAuth {
    Standard(SpendingCondition),
    Sponsored(SpendingCondition, SpendingCondition),
}

impl TransactionAuth {
    pub fn origin(&self) -> &SpendingCondition {
        match self {
            TransactionAuth::Standard(origin) | TransactionAuth::Sponsored(origin, _) => origin,
        }
    }

    pub fn origin_mut(&mut self) -> &mut SpendingCondition {
        match self {
            TransactionAuth::Standard(origin) | TransactionAuth::Sponsored(origin, _) => origin,
        }
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Recipient of a token transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalData {
    Standard(StacksAddress),
    Contract(StacksAddress, String),
}

impl fmt::Display for PrincipalData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalData::Standard(address) => write!(f, "{}", address),
            PrincipalData::Contract(address, name) => write!(f, "{}.{}", address, name),
        }
    }
}

impl FromStr for PrincipalData {
    type Err = AddressError;

    /// `SP…` for a standard principal, `SP….contract-name` for a contract
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((address, name)) => {
                if name.is_empty() || name.len() > MAX_CONTRACT_NAME_LENGTH {
                    return Err(AddressError::InvalidLength(name.len()));
                }
                if !name.is_ascii() {
                    return Err(AddressError::InvalidContractName(name.to_string()));
                }
                Ok(PrincipalData::Contract(address.parse()?, name.to_string()))
            }
            None => Ok(PrincipalData::Standard(s.parse()?)),
        }
    }
}

impl Serialize for PrincipalData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fixed-width, zero-padded transfer memo
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenTransferMemo(pub [u8; TOKEN_TRANSFER_MEMO_LENGTH]);

impl TokenTransferMemo {
    pub fn empty() -> Self {
        Self([0u8; TOKEN_TRANSFER_MEMO_LENGTH])
    }

    /// Memo from text; `None` if longer than the memo field
    pub fn from_text(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        if bytes.len() > TOKEN_TRANSFER_MEMO_LENGTH {
            return None;
        }
        let mut memo = [0u8; TOKEN_TRANSFER_MEMO_LENGTH];
        memo[..bytes.len()].copy_from_slice(bytes);
        Some(Self(memo))
    }

    /// Memo text with trailing padding removed
    pub fn text(&self) -> String {
        let end = self
            .0
            .iter()
            .rposition(|b| *b != 0)
            .map(|p| p + 1)
            .unwrap_or(0);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl Default for TokenTransferMemo {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for TokenTransferMemo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenTransferMemo({:?})", self.text())
    }
}

impl Serialize for TokenTransferMemo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPayload {
    TokenTransfer {
        recipient: PrincipalData,
        /// micro-STX; held wide so exact sums survive, the wire form is u64
        amount: u128,
        memo: TokenTransferMemo,
    },
}

// =============================================================================
// Transaction
// =============================================================================

/// A Stacks transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StacksTransaction {
    pub version: u8,
    pub chain_id: u32,
    pub auth: TransactionAuth,
    pub anchor_mode: AnchorMode,
    pub post_condition_mode: PostConditionMode,
    pub payload: TransactionPayload,
}

impl StacksTransaction {
    pub fn network(&self) -> Network {
        Network::from_transaction_version(self.version)
    }

    /// The origin's multisig condition, if the origin is a multisig account
    pub fn multisig_condition(&self) -> Option<&MultisigSpendingCondition> {
        match self.auth.origin() {
            SpendingCondition::Multisig(condition) => Some(condition),
            SpendingCondition::Singlesig(_) => None,
        }
    }

    pub fn multisig_condition_mut(&mut self) -> Option<&mut MultisigSpendingCondition> {
        match self.auth.origin_mut() {
            SpendingCondition::Multisig(condition) => Some(condition),
            SpendingCondition::Singlesig(_) => None,
        }
    }

    /// Sender address derived from the origin condition
    pub fn origin_address(&self) -> Result<StacksAddress, AddressError> {
        let network = self.network();
        let version = match self.auth.origin() {
            SpendingCondition::Multisig(_) => network.multisig_address_version(),
            SpendingCondition::Singlesig(_) => network.singlesig_address_version(),
        };
        StacksAddress::new(version, *self.auth.origin().signer())
    }
}

/// Builder for token-transfer transactions
pub struct TransactionBuilder {
    network: Network,
    recipient: Option<PrincipalData>,
    amount: u128,
    memo: TokenTransferMemo,
    anchor_mode: AnchorMode,
    post_condition_mode: PostConditionMode,
}

impl TransactionBuilder {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            recipient: None,
            amount: 0,
            memo: TokenTransferMemo::empty(),
            anchor_mode: AnchorMode::Any,
            post_condition_mode: PostConditionMode::Deny,
        }
    }

    pub fn recipient(mut self, recipient: PrincipalData) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn amount(mut self, amount: u128) -> Self {
        self.amount = amount;
        self
    }

    pub fn memo(mut self, memo: TokenTransferMemo) -> Self {
        self.memo = memo;
        self
    }

    /// Build with `condition` as the standard origin authorization
    ///
    /// Returns `None` when no recipient was set.
    pub fn build(self, condition: SpendingCondition) -> Option<StacksTransaction> {
        let recipient = self.recipient?;
        Some(StacksTransaction {
            version: self.network.transaction_version(),
            chain_id: self.network.chain_id(),
            auth: TransactionAuth::Standard(condition),
            anchor_mode: self.anchor_mode,
            post_condition_mode: self.post_condition_mode,
            payload: TransactionPayload::TokenTransfer {
                recipient,
                amount: self.amount,
                memo: self.memo,
            },
        })
    }
}

fn serialize_hash160<S: Serializer>(hash: &[u8; 20], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_keys, sample_recipient, SAMPLE_ADDRESS};

    fn sample_condition() -> MultisigSpendingCondition {
        MultisigSpendingCondition::new(
            MultisigHashMode::P2SHNonSequential,
            &sample_keys(),
            2,
            7,
            300,
        )
        .unwrap()
    }

    #[test]
    fn test_condition_slots_follow_key_order() {
        let keys = sample_keys();
        let condition = sample_condition();

        assert_eq!(condition.fields.len(), 3);
        assert_eq!(condition.signatures_required, 2);
        assert_eq!(condition.signature_count(), 0);
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(condition.fields[i].as_public_key(), Some(key));
            assert_eq!(condition.slot_of(key), Some(i));
        }
        assert_eq!(
            hex::encode(condition.signer),
            "b01162ecda72c57ed419f7966ec4e8dd7987c704"
        );
    }

    #[test]
    fn test_origin_address_matches_script_address() {
        let tx = TransactionBuilder::new(Network::Mainnet)
            .recipient(sample_recipient())
            .amount(1000)
            .build(SpendingCondition::Multisig(sample_condition()))
            .unwrap();

        assert_eq!(tx.origin_address().unwrap().to_string(), SAMPLE_ADDRESS);
        assert_eq!(tx.network(), Network::Mainnet);
        assert_eq!(tx.anchor_mode, AnchorMode::Any);
        assert_eq!(tx.post_condition_mode, PostConditionMode::Deny);
        assert!(tx.multisig_condition().is_some());
    }

    #[test]
    fn test_builder_requires_recipient() {
        let tx = TransactionBuilder::new(Network::Testnet)
            .amount(1)
            .build(SpendingCondition::Multisig(sample_condition()));
        assert!(tx.is_none());
    }

    #[test]
    fn test_hash_mode_sequencing() {
        assert!(MultisigHashMode::P2SH.is_sequential());
        assert!(MultisigHashMode::P2WSH.is_sequential());
        assert!(!MultisigHashMode::P2SHNonSequential.is_sequential());
        assert_eq!(
            MultisigHashMode::from_byte(0x07),
            Some(MultisigHashMode::P2WSHNonSequential)
        );
        assert_eq!(MultisigHashMode::from_byte(0x00), None);
    }

    #[test]
    fn test_principal_parsing() {
        let standard: PrincipalData = "SP2P5AC6RZ0NJWXRE15RSCDSA3T3A2R4QCRW3T5RX".parse().unwrap();
        assert!(matches!(standard, PrincipalData::Standard(_)));

        let contract: PrincipalData = "SP2P5AC6RZ0NJWXRE15RSCDSA3T3A2R4QCRW3T5RX.vault"
            .parse()
            .unwrap();
        assert_eq!(
            contract.to_string(),
            "SP2P5AC6RZ0NJWXRE15RSCDSA3T3A2R4QCRW3T5RX.vault"
        );
        assert!("SP2P5AC6RZ0NJWXRE15RSCDSA3T3A2R4QCRW3T5RX."
            .parse::<PrincipalData>()
            .is_err());
    }

    #[test]
    fn test_contract_name_must_be_ascii() {
        let parsed = "SP2P5AC6RZ0NJWXRE15RSCDSA3T3A2R4QCRW3T5RX.caf\u{e9}".parse::<PrincipalData>();
        assert!(matches!(parsed, Err(AddressError::InvalidContractName(_))));

        // every name the parser accepts must survive the wire round trip
        let contract: PrincipalData = "SP2P5AC6RZ0NJWXRE15RSCDSA3T3A2R4QCRW3T5RX.vault-v2"
            .parse()
            .unwrap();
        let tx = TransactionBuilder::new(Network::Mainnet)
            .recipient(contract.clone())
            .amount(1)
            .build(SpendingCondition::Multisig(sample_condition()))
            .unwrap();
        let decoded = crate::core::tx_decode(&crate::core::tx_encode(&tx).unwrap()).unwrap();
        match decoded.payload {
            TransactionPayload::TokenTransfer { recipient, .. } => assert_eq!(recipient, contract),
        }
    }

    #[test]
    fn test_memo_bounds() {
        let memo = TokenTransferMemo::from_text("invoice 42").unwrap();
        assert_eq!(memo.text(), "invoice 42");
        assert_eq!(memo.0[10], 0);
        assert!(TokenTransferMemo::from_text(&"x".repeat(34)).is_some());
        assert!(TokenTransferMemo::from_text(&"x".repeat(35)).is_none());
        assert_eq!(TokenTransferMemo::empty().text(), "");
    }

    #[test]
    fn test_auth_field_accessors() {
        let key = sample_keys()[0];
        let field = AuthField::public_key(key);
        assert!(!field.is_signature());
        assert_eq!(field.as_public_key(), Some(&key));
        assert!(field.as_signature().is_none());
    }
}
