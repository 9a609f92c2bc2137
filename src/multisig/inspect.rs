//! Read-only views of a multisig authorization

use serde::Serialize;

use crate::core::{AuthField, StacksTransaction};
use crate::crypto::PublicKey;
use crate::multisig::wallet::MultisigError;

/// Signing progress of a multisig transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFieldInfo {
    pub field_count: usize,
    /// Keys of the slots still waiting for a signature, in slot order
    pub unsigned_slot_keys: Vec<PublicKey>,
    pub signature_count: usize,
    pub signatures_required: usize,
}

impl AuthFieldInfo {
    pub fn is_complete(&self) -> bool {
        self.signature_count >= self.signatures_required
    }

    /// Signatures still missing
    pub fn remaining(&self) -> usize {
        self.signatures_required.saturating_sub(self.signature_count)
    }
}

pub fn auth_field_info(tx: &StacksTransaction) -> Result<AuthFieldInfo, MultisigError> {
    let condition = tx.multisig_condition().ok_or(MultisigError::NotMultisig)?;
    Ok(AuthFieldInfo {
        field_count: condition.fields.len(),
        unsigned_slot_keys: condition
            .fields
            .iter()
            .filter_map(|f| f.as_public_key().copied())
            .collect(),
        signature_count: condition.signature_count(),
        signatures_required: condition.signatures_required as usize,
    })
}

/// Indices of signed slots after the unsigned slot of `key`
///
/// `None` when `key` has no unsigned slot, either because it already signed
/// or because it is not a signer at all.
pub fn signers_after(key: &PublicKey, fields: &[AuthField]) -> Option<Vec<usize>> {
    let slot = fields.iter().position(|f| f.as_public_key() == Some(key))?;
    Some(
        fields
            .iter()
            .enumerate()
            .skip(slot + 1)
            .filter(|(_, f)| f.is_signature())
            .map(|(i, _)| i)
            .collect(),
    )
}

/// Whether the transaction carries enough signatures to be broadcast
pub fn is_fully_authorized(tx: &StacksTransaction) -> bool {
    auth_field_info(tx).map_or(false, |info| info.is_complete())
}
