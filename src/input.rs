//! Batch input files
//!
//! Transfer records, key-to-path maps and lists of encoded transactions are
//! all JSON. Records are type-checked field by field before they are
//! deserialized, so a bad batch reports which record and which field failed.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::{tx_decode, StacksTransaction};
use crate::crypto::PublicKey;
use crate::multisig::{MultisigError, TransferInput};

const OPTIONAL_STRING_FIELDS: [&str; 7] = [
    "amount",
    "amount_stx",
    "fee",
    "nonce",
    "sender",
    "memo",
    "network",
];

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn validation(index: usize, field: &str, reason: impl Into<String>) -> MultisigError {
    MultisigError::Validation {
        index,
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn present<'a>(record: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|v| !v.is_null())
}

fn has_text(record: &Map<String, Value>, field: &str) -> bool {
    present(record, field)
        .and_then(Value::as_str)
        .map_or(false, |v| !v.trim().is_empty())
}

fn validate_record(index: usize, record: &Map<String, Value>) -> Result<(), MultisigError> {
    match record.get("recipient") {
        Some(Value::String(_)) => {}
        other => {
            return Err(validation(
                index,
                "recipient",
                format!("expected string, found {}", other.map_or("nothing", json_type)),
            ))
        }
    }

    for field in OPTIONAL_STRING_FIELDS {
        if let Some(value) = present(record, field) {
            if !value.is_string() {
                return Err(validation(
                    index,
                    field,
                    format!("expected string, found {}", json_type(value)),
                ));
            }
        }
    }

    if !has_text(record, "amount") && !has_text(record, "amount_stx") {
        return Err(validation(
            index,
            "amount",
            "'amount' and/or 'amount_stx' must be defined",
        ));
    }

    match record.get("publicKeys") {
        Some(Value::Array(keys)) => {
            if let Some(bad) = keys.iter().find(|k| !k.is_string()) {
                return Err(validation(
                    index,
                    "publicKeys",
                    format!("contains invalid element: {}", bad),
                ));
            }
        }
        other => {
            return Err(validation(
                index,
                "publicKeys",
                format!("expected array, found {}", other.map_or("nothing", json_type)),
            ))
        }
    }

    match record.get("numSignatures") {
        Some(Value::Number(n)) if n.as_u64().map_or(false, |n| n > 0) => {}
        Some(other) => {
            return Err(validation(
                index,
                "numSignatures",
                format!("expected positive integer, found {}", other),
            ))
        }
        None => return Err(validation(index, "numSignatures", "missing")),
    }

    Ok(())
}

/// Check every record of a parsed JSON batch and convert it
pub fn validate_transfer_inputs(data: &Value) -> Result<Vec<TransferInput>, MultisigError> {
    let records = data
        .as_array()
        .ok_or_else(|| MultisigError::invalid_field("input", "data is not an array"))?;

    records
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let record = element.as_object().ok_or_else(|| {
                validation(
                    index,
                    "element",
                    format!("element is of type '{}'", json_type(element)),
                )
            })?;
            validate_record(index, record)?;
            TransferInput::deserialize(element)
                .map_err(|e| validation(index, "element", e.to_string()))
        })
        .collect()
}

/// Parse a JSON array of transfer records
pub fn transfer_inputs_from_text(text: &str) -> Result<Vec<TransferInput>, MultisigError> {
    let data: Value = serde_json::from_str(text)
        .map_err(|e| MultisigError::invalid_field("input", e.to_string()))?;
    validate_transfer_inputs(&data)
}

pub fn transfer_inputs_from_file(path: &Path) -> Result<Vec<TransferInput>, MultisigError> {
    transfer_inputs_from_text(&fs::read_to_string(path)?)
}

/// Derivation path of each signer key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPathMap {
    paths: HashMap<PublicKey, String>,
}

#[derive(Deserialize)]
struct KeyPathEntry {
    key: String,
    path: String,
}

impl KeyPathMap {
    /// Parse `[{"key": "02…", "path": "m/…"}, …]`
    pub fn from_text(text: &str) -> Result<Self, MultisigError> {
        let entries: Vec<KeyPathEntry> = serde_json::from_str(text)
            .map_err(|e| MultisigError::invalid_field("keyPaths", e.to_string()))?;

        let mut paths = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let key = PublicKey::from_hex(&entry.key)
                .map_err(|e| validation(index, "key", e.to_string()))?;
            paths.insert(key, entry.path);
        }
        Ok(Self { paths })
    }

    pub fn from_file(path: &Path) -> Result<Self, MultisigError> {
        Self::from_text(&fs::read_to_string(path)?)
    }

    pub fn get(&self, key: &PublicKey) -> Option<&str> {
        self.paths.get(key).map(String::as_str)
    }

    /// Lookup by hex key; malformed keys are simply absent
    pub fn get_hex(&self, key: &str) -> Option<&str> {
        PublicKey::from_hex(key).ok().and_then(|k| self.get(&k))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Parse a JSON array of base64 transactions
pub fn encoded_txs_from_text(text: &str) -> Result<Vec<String>, MultisigError> {
    let data: Value = serde_json::from_str(text)
        .map_err(|e| MultisigError::invalid_field("transactions", e.to_string()))?;
    let items = data.as_array().ok_or_else(|| {
        MultisigError::invalid_field("transactions", "expected array of base64-encoded strings")
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                validation(
                    index,
                    "transaction",
                    format!("found '{}', expected base64 string", json_type(item)),
                )
            })
        })
        .collect()
}

pub fn encoded_txs_from_file(path: &Path) -> Result<Vec<String>, MultisigError> {
    encoded_txs_from_text(&fs::read_to_string(path)?)
}

/// Decode every entry, reporting the first bad index
pub fn decode_txs(encoded: &[String]) -> Result<Vec<StacksTransaction>, MultisigError> {
    encoded
        .iter()
        .enumerate()
        .map(|(index, tx)| {
            tx_decode(tx).map_err(|e| MultisigError::Record {
                index,
                source: Box::new(e.into()),
            })
        })
        .collect()
}
