//! Signature collection through a signing device
//!
//! Two modes, never mixed on one transaction:
//! - known slot: order-independent conditions; every signer signs the same
//!   presign hash and its slot is found by public key
//! - chaining: sequential conditions; each signer continues the sighash
//!   chain left by the previous signature

use log::{info, warn};
use serde::Serialize;

use crate::core::{serialize, AuthField, PubKeyEncoding, StacksTransaction};
use crate::crypto::PublicKey;
use crate::device::{DeviceStatus, SigHash, SignResponse, SigningDevice};
use crate::multisig::wallet::MultisigError;

/// Result of one chained signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainedSignature {
    /// Slot list with the signer's slot replaced by its signature
    pub fields: Vec<AuthField>,
    pub index: usize,
    /// Chain state to hand to the next signer
    pub next_sighash: SigHash,
}

/// Render slot contents for error messages
pub(crate) fn describe_slots(fields: &[AuthField]) -> String {
    fields
        .iter()
        .map(|field| match field {
            AuthField::PublicKey { key } => key.to_hex(),
            AuthField::Signature { .. } => "<signature>".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn find_slot(fields: &[AuthField], key: &PublicKey) -> Result<usize, MultisigError> {
    fields
        .iter()
        .position(|f| f.as_public_key() == Some(key))
        .ok_or_else(|| MultisigError::SignerNotFound {
            key: *key,
            slots: describe_slots(fields),
        })
}

fn check_response(path: &str, response: &SignResponse) -> Result<(), MultisigError> {
    match &response.status {
        DeviceStatus::Success => Ok(()),
        DeviceStatus::Error { code, message } => {
            warn!("Device refused to sign with {}: 0x{:04x}", path, code);
            Err(MultisigError::Device(format!(
                "status 0x{:04x}: {}",
                code, message
            )))
        }
    }
}

/// Sign an order-independent multisig transaction in place
///
/// Returns the index of the slot that now holds the signature.
pub async fn sign_with_known_slot(
    device: &dyn SigningDevice,
    path: &str,
    tx: &mut StacksTransaction,
) -> Result<usize, MultisigError> {
    let key = device.derive_public_key(path).await?;

    let condition = tx.multisig_condition().ok_or(MultisigError::NotMultisig)?;
    if condition.hash_mode.is_sequential() {
        return Err(MultisigError::SigningModeMismatch(format!(
            "{:?} requires chained signing",
            condition.hash_mode
        )));
    }
    let index = find_slot(&condition.fields, &key)?;

    let message = serialize(tx)?;
    let response = device.sign(path, &message).await?;
    check_response(path, &response)?;

    let condition = tx
        .multisig_condition_mut()
        .ok_or(MultisigError::NotMultisig)?;
    condition.fields[index] = AuthField::compressed_signature(response.signature);

    info!(
        "Signed slot {} with {} ({} of {} signatures)",
        index,
        key,
        condition.signature_count(),
        condition.signatures_required
    );
    Ok(index)
}

/// Sign the next slot of a sequential multisig transaction
///
/// `unsigned_tx` is the serialization of the transaction before any
/// signature. `prev_sighash` is the chain state returned with the previous
/// signature; it must be absent for the first signer and present for
/// every later one.
pub async fn sign_with_chaining(
    device: &dyn SigningDevice,
    path: &str,
    fields: &[AuthField],
    unsigned_tx: &[u8],
    prev_sighash: Option<&SigHash>,
) -> Result<ChainedSignature, MultisigError> {
    let key = device.derive_public_key(path).await?;
    let index = find_slot(fields, &key)?;

    let mut message = unsigned_tx.to_vec();
    match prev_sighash {
        Some(prev) => {
            let previous = index
                .checked_sub(1)
                .and_then(|i| fields[i].as_signature())
                .ok_or_else(|| MultisigError::ChainBroken {
                    index,
                    reason: "previous slot holds no signature".to_string(),
                })?;
            message.extend_from_slice(&prev.0);
            message.push(PubKeyEncoding::Compressed as u8);
            message.extend_from_slice(previous.as_bytes());
        }
        None => {
            if let Some(signed) = fields[..index].iter().position(|f| f.is_signature()) {
                return Err(MultisigError::ChainBroken {
                    index,
                    reason: format!("slot {} is signed but no previous sighash was given", signed),
                });
            }
        }
    }

    let response = device.sign(path, &message).await?;
    check_response(path, &response)?;

    let mut updated = fields.to_vec();
    updated[index] = AuthField::compressed_signature(response.signature);

    info!("Chained signature in slot {} with {}", index, key);
    Ok(ChainedSignature {
        fields: updated,
        index,
        next_sighash: response.post_sign_hash,
    })
}
