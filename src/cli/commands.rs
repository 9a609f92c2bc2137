//! CLI commands for the multisig tool
//!
//! Implements all command handlers for the CLI interface. Nothing here talks
//! to a device or a node; transfers are built offline and printed as base64.

use std::path::Path;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::core::{
    build_redeem_script, derive_address_on, legacy_address, tx_decode, tx_encode, txid_hex,
    StacksTransaction,
};
use crate::crypto::PublicKey;
use crate::device::{multisig_standard_path, singlesig_standard_path};
use crate::input::{decode_txs, encoded_txs_from_file, transfer_inputs_from_file};
use crate::multisig::{
    auth_field_info, is_fully_authorized, signers_after, MultisigConfig, MultisigError,
    MultisigWallet, NonceCache, TransferBuilder,
};
use crate::network::{network_from_tx, Network, OfflineNode};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn parse_keys(keys: &[String]) -> CliResult<Vec<PublicKey>> {
    keys.iter()
        .flat_map(|k| k.split(','))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| PublicKey::from_hex(k).map_err(Into::into))
        .collect()
}

fn multisig_tx(encoded: &str) -> CliResult<StacksTransaction> {
    let tx = tx_decode(encoded.trim())?;
    if tx.multisig_condition().is_none() {
        return Err(MultisigError::NotMultisig.into());
    }
    Ok(tx)
}

/// Derive the multisig address of keys in the given order
pub fn cmd_address(keys: &[String], threshold: usize, network: Network, sort: bool) -> CliResult<()> {
    let mut config = MultisigConfig::new(threshold, parse_keys(keys)?)?;
    if sort {
        config = config.sorted();
    }
    let script = build_redeem_script(&config.signers, config.threshold)?;
    let address = derive_address_on(&script, network)?;

    println!("🔐 {} multisig ({})", config.description(), network);
    println!("   ├─ Address: {}", address);
    println!("   ├─ Legacy:  {}", legacy_address(&script));
    println!("   └─ Script:  {}", script.to_hex());
    for (i, key) in config.signers.iter().enumerate() {
        println!("      [{}] {}", i, key);
    }
    Ok(())
}

/// Recover the key order of a known address
pub fn cmd_check_address(keys: &[String], threshold: usize, address: &str) -> CliResult<()> {
    let keys = parse_keys(keys)?;
    let wallet = MultisigWallet::from_address(&keys, threshold, address.trim())?;

    println!("✅ Keys match {} ({})", wallet.address(), wallet.description());
    println!("   Legacy: {}", wallet.legacy_address);
    for (i, key) in wallet.config.signers.iter().enumerate() {
        println!("   [{}] {}", i, key);
    }
    Ok(())
}

/// Build unsigned transfers from a JSON batch file and print them as base64
pub async fn cmd_create(input: &Path, config: SessionConfig) -> CliResult<()> {
    let inputs = transfer_inputs_from_file(input)?;
    let builder = TransferBuilder::new(Arc::new(OfflineNode), Arc::new(NonceCache::new()), config);
    let txs = builder.build_transfers(&inputs).await?;

    let encoded = txs.iter().map(tx_encode).collect::<Result<Vec<_>, _>>()?;
    println!("{}", serde_json::to_string_pretty(&encoded)?);
    Ok(())
}

/// Print a decoded transaction (or every transaction in a JSON list file)
pub fn cmd_decode(tx: Option<&str>, file: Option<&Path>) -> CliResult<()> {
    let txs = match (tx, file) {
        (Some(encoded), _) => vec![tx_decode(encoded.trim())?],
        (None, Some(path)) => decode_txs(&encoded_txs_from_file(path)?)?,
        (None, None) => return Err("either --tx or --file is required".into()),
    };

    for tx in &txs {
        println!("📦 Transaction {}", txid_hex(tx)?);
        println!("   Network: {}", network_from_tx(tx));
        println!("{}", serde_json::to_string_pretty(tx)?);
    }
    Ok(())
}

/// Show signing progress of a multisig transaction
pub fn cmd_info(tx: &str) -> CliResult<()> {
    let tx = multisig_tx(tx)?;
    let info = auth_field_info(&tx)?;

    println!("{}", serde_json::to_string_pretty(&info)?);
    if is_fully_authorized(&tx) {
        println!("✅ Ready to broadcast");
    } else {
        println!("⏳ {} more signature(s) needed", info.remaining());
    }
    Ok(())
}

/// List signed slots after a signer's slot
pub fn cmd_signers_after(tx: &str, key: &str) -> CliResult<()> {
    let tx = multisig_tx(tx)?;
    let key = PublicKey::from_hex(key.trim())?;
    let fields = tx
        .multisig_condition()
        .map(|c| c.fields.as_slice())
        .unwrap_or_default();

    match signers_after(&key, fields) {
        Some(indices) => println!("{}", serde_json::to_string(&indices)?),
        None => println!("⚠️  {} has no unsigned slot", key),
    }
    Ok(())
}

/// Print the standard derivation paths
pub fn cmd_paths(count: u32) -> CliResult<()> {
    println!("🧭 Derivation paths");
    for i in 0..count {
        println!(
            "   [{}] single-sig {}   multisig {}",
            i,
            singlesig_standard_path(i),
            multisig_standard_path(i)
        );
    }
    Ok(())
}
