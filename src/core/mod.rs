//! Core transaction components
//!
//! This module contains the building blocks the multisig engine works on:
//! - Redeem scripts and multisig address derivation
//! - The transaction model (authorization slots, payloads)
//! - The wire codec, transaction ids and signature hashes

pub mod codec;
pub mod script;
pub mod transaction;

pub use codec::{
    deserialize, initial_sighash, postsign_sighash, presign_sighash, serialize, tx_decode,
    tx_encode, txid, txid_hex, CodecError, AUTH_TYPE_SPONSORED, AUTH_TYPE_STANDARD,
};
pub use script::{
    build_redeem_script, derive_address, derive_address_on, legacy_address,
    make_multisig_address, make_multisig_address_legacy, RedeemScript, ScriptError,
    MAX_MULTISIG_KEYS,
};
pub use transaction::{
    AnchorMode, AuthField, MultisigHashMode, MultisigSpendingCondition, PostConditionMode,
    PrincipalData, PubKeyEncoding, SinglesigHashMode, SinglesigSpendingCondition,
    SpendingCondition, StacksTransaction, TokenTransferMemo, TransactionAuth, TransactionBuilder,
    TransactionPayload, MICROSTX_PER_STX, TOKEN_TRANSFER_MEMO_LENGTH,
};
