//! Unsigned multisig transfer construction
//!
//! Turns batch records into unsigned token transfers whose authorization
//! holds one public-key slot per signer. Records are built concurrently;
//! nonces come from the record itself or from the session's nonce cache.

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::core::{
    build_redeem_script, derive_address_on, MultisigHashMode, MultisigSpendingCondition,
    PrincipalData, SpendingCondition, StacksTransaction, TokenTransferMemo, TransactionBuilder,
    MICROSTX_PER_STX, TOKEN_TRANSFER_MEMO_LENGTH,
};
use crate::crypto::PublicKey;
use crate::multisig::nonce::NonceCache;
use crate::multisig::wallet::{MultisigConfig, MultisigError, MultisigWallet};
use crate::network::{parse_network_name, Network, NodeClient};

/// One token transfer request
///
/// Numeric values are decimal strings so they survive JSON without loss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInput {
    pub recipient: String,
    /// Amount in micro-STX
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Amount in whole STX, added to `amount`
    #[serde(
        rename = "amount_stx",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub amount_stx: Option<String>,
    pub public_keys: Vec<String>,
    pub num_signatures: usize,
    /// Expected multisig address; the key order is recovered from it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// Optional text field; blank counts as absent
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl TransferInput {
    /// `amount + amount_stx * 1_000_000`, in micro-STX
    pub fn total_amount(&self) -> Result<u128, MultisigError> {
        let (amount, amount_stx) = (given(&self.amount), given(&self.amount_stx));
        if amount.is_none() && amount_stx.is_none() {
            return Err(MultisigError::invalid_field(
                "amount",
                "either amount or amount_stx is required",
            ));
        }

        let micro = match amount {
            Some(value) => parse_decimal("amount", value)?,
            None => 0,
        };
        let whole = match amount_stx {
            Some(value) => parse_decimal("amount_stx", value)?
                .checked_mul(MICROSTX_PER_STX)
                .ok_or_else(|| MultisigError::invalid_field("amount_stx", "amount overflows"))?,
            None => 0,
        };

        micro
            .checked_add(whole)
            .ok_or_else(|| MultisigError::invalid_field("amount", "amount overflows"))
    }

    pub fn parsed_public_keys(&self) -> Result<Vec<PublicKey>, MultisigError> {
        self.public_keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                PublicKey::from_hex(key)
                    .map_err(|e| MultisigError::invalid_field("publicKeys", format!("key {}: {}", i, e)))
            })
            .collect()
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<u128, MultisigError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MultisigError::invalid_field(
            field,
            format!("'{}' is not a non-negative integer", value),
        ));
    }
    value
        .parse::<u128>()
        .map_err(|e| MultisigError::invalid_field(field, e.to_string()))
}

fn parse_u64(field: &str, value: &str) -> Result<u64, MultisigError> {
    let parsed = parse_decimal(field, value)?;
    u64::try_from(parsed)
        .map_err(|_| MultisigError::invalid_field(field, format!("{} exceeds 64 bits", parsed)))
}

/// Builds unsigned multisig transfers for one session
pub struct TransferBuilder {
    node: Arc<dyn NodeClient>,
    nonces: Arc<NonceCache>,
    config: SessionConfig,
}

impl TransferBuilder {
    pub fn new(node: Arc<dyn NodeClient>, nonces: Arc<NonceCache>, config: SessionConfig) -> Self {
        Self {
            node,
            nonces,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn nonce_cache(&self) -> &NonceCache {
        &self.nonces
    }

    fn network_for(&self, input: &TransferInput) -> Network {
        input
            .network
            .as_deref()
            .and_then(parse_network_name)
            .unwrap_or(self.config.default_network)
    }

    /// Build one unsigned transfer
    ///
    /// All record fields are validated before the node is consulted, so an
    /// invalid record never consumes a nonce. Blank optional fields count as
    /// absent.
    ///
    /// Without an explicit nonce, the cache (and the node behind it) is asked
    /// for the multisig address on the record's own network: `SN…` for a
    /// testnet record, `SM…` for mainnet. This differs from
    /// [`make_multisig_address`](crate::core::make_multisig_address), which
    /// always yields the mainnet form.
    pub async fn build_transfer(
        &self,
        input: &TransferInput,
    ) -> Result<StacksTransaction, MultisigError> {
        let threshold = input.num_signatures;
        let keys = input.parsed_public_keys()?;
        let amount = input.total_amount()?;

        let recipient: PrincipalData = input
            .recipient
            .parse()
            .map_err(|e| MultisigError::invalid_field("recipient", format!("{}", e)))?;

        let memo = match &input.memo {
            Some(text) => TokenTransferMemo::from_text(text).ok_or_else(|| {
                MultisigError::invalid_field(
                    "memo",
                    format!("longer than {} bytes", TOKEN_TRANSFER_MEMO_LENGTH),
                )
            })?,
            None => TokenTransferMemo::empty(),
        };

        let fee = match given(&input.fee) {
            Some(fee) => parse_u64("fee", fee)?,
            None => self.config.default_fee,
        };
        let explicit_nonce = given(&input.nonce)
            .map(|nonce| parse_u64("nonce", nonce))
            .transpose()?;

        let account = match given(&input.sender) {
            Some(sender) => MultisigWallet::from_address(&keys, threshold, sender)?.config,
            None => MultisigConfig::new(threshold, keys)?,
        };
        let ordered = &account.signers;

        let network = self.network_for(input);
        let script = build_redeem_script(ordered, threshold)?;
        let address = derive_address_on(&script, network)?;

        let nonce = match explicit_nonce {
            Some(nonce) => nonce,
            None => {
                let nonce = self.nonces.get_nonce(&address, self.node.as_ref()).await?;
                debug!("Using cached nonce {} for {}", nonce, address);
                nonce
            }
        };

        let condition = MultisigSpendingCondition::new(
            MultisigHashMode::P2SHNonSequential,
            ordered,
            threshold,
            nonce,
            fee,
        )?;

        let tx = TransactionBuilder::new(network)
            .recipient(recipient)
            .amount(amount)
            .memo(memo)
            .build(SpendingCondition::Multisig(condition))
            .ok_or_else(|| MultisigError::invalid_field("recipient", "missing"))?;

        info!(
            "Built {} transfer of {} uSTX from {} (nonce {}, fee {})",
            account.description(),
            amount,
            address,
            nonce,
            fee
        );
        Ok(tx)
    }

    /// Build every record concurrently
    ///
    /// All builds run to completion. On failure the lowest failing record
    /// index is reported with its cause.
    pub async fn build_transfers(
        &self,
        inputs: &[TransferInput],
    ) -> Result<Vec<StacksTransaction>, MultisigError> {
        let results = join_all(inputs.iter().map(|input| self.build_transfer(input))).await;

        let mut transactions = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(tx) => transactions.push(tx),
                Err(source) => {
                    return Err(MultisigError::Record {
                        index,
                        source: Box::new(source),
                    })
                }
            }
        }
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{make_multisig_address, TransactionPayload};
    use crate::network::NodeError;
    use crate::test_utils::{
        sample_keys, MemoryNode, SAMPLE_ADDRESS, SAMPLE_KEYS_HEX, SAMPLE_RECIPIENT,
    };

    fn keys_hex(order: [usize; 3]) -> Vec<String> {
        order.iter().map(|&i| SAMPLE_KEYS_HEX[i].to_string()).collect()
    }

    fn sample_input() -> TransferInput {
        TransferInput {
            recipient: SAMPLE_RECIPIENT.to_string(),
            amount: Some("10000".to_string()),
            public_keys: keys_hex([0, 1, 2]),
            num_signatures: 3,
            fee: Some("300".to_string()),
            nonce: Some("4".to_string()),
            network: Some("mainnet".to_string()),
            ..Default::default()
        }
    }

    fn builder_with(node: MemoryNode, config: SessionConfig) -> TransferBuilder {
        TransferBuilder::new(Arc::new(node), Arc::new(NonceCache::new()), config)
    }

    fn builder() -> TransferBuilder {
        builder_with(MemoryNode::new(), SessionConfig::default())
    }

    fn amount_of(tx: &StacksTransaction) -> u128 {
        match &tx.payload {
            TransactionPayload::TokenTransfer { amount, .. } => *amount,
        }
    }

    #[tokio::test]
    async fn test_build_from_valid_input() {
        let tx = builder().build_transfer(&sample_input()).await.unwrap();
        let condition = tx.multisig_condition().unwrap();

        assert_eq!(condition.hash_mode, MultisigHashMode::P2SHNonSequential);
        assert_eq!(condition.fee, 300);
        assert_eq!(condition.nonce, 4);
        assert_eq!(condition.signatures_required, 3);
        assert_eq!(condition.signature_count(), 0);
        let slots: Vec<PublicKey> = condition
            .fields
            .iter()
            .filter_map(|f| f.as_public_key().copied())
            .collect();
        assert_eq!(slots, sample_keys());
        assert_eq!(amount_of(&tx), 10_000);
        assert_eq!(tx.network(), Network::Mainnet);
        match &tx.payload {
            TransactionPayload::TokenTransfer { recipient, .. } => {
                assert_eq!(recipient.to_string(), SAMPLE_RECIPIENT)
            }
        }
    }

    #[tokio::test]
    async fn test_sender_mismatch() {
        let input = TransferInput {
            sender: Some(SAMPLE_RECIPIENT.to_string()),
            ..sample_input()
        };
        match builder().build_transfer(&input).await {
            Err(MultisigError::AddressMismatch { expected, .. }) => {
                assert_eq!(expected, SAMPLE_RECIPIENT)
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sender_recovers_key_order() {
        let input = TransferInput {
            public_keys: keys_hex([2, 0, 1]),
            num_signatures: 2,
            sender: Some(SAMPLE_ADDRESS.to_string()),
            ..sample_input()
        };
        let tx = builder().build_transfer(&input).await.unwrap();
        let condition = tx.multisig_condition().unwrap();
        for (field, key) in condition.fields.iter().zip(sample_keys()) {
            assert_eq!(field.as_public_key(), Some(&key));
        }
        assert_eq!(tx.origin_address().unwrap().to_string(), SAMPLE_ADDRESS);
    }

    #[tokio::test]
    async fn test_nonce_from_cache() {
        let node = MemoryNode::new().with_nonce(SAMPLE_ADDRESS, 10);
        let builder = builder_with(node, SessionConfig::default());
        let input = TransferInput {
            num_signatures: 2,
            nonce: None,
            ..sample_input()
        };

        let first = builder.build_transfer(&input).await.unwrap();
        let second = builder.build_transfer(&input).await.unwrap();
        assert_eq!(first.auth.origin().nonce(), 10);
        assert_eq!(second.auth.origin().nonce(), 11);
        assert_eq!(builder.nonce_cache().peek(SAMPLE_ADDRESS).await, Some(11));
    }

    #[tokio::test]
    async fn test_unknown_account_without_nonce() {
        let input = TransferInput {
            nonce: None,
            ..sample_input()
        };
        assert!(matches!(
            builder().build_transfer(&input).await,
            Err(MultisigError::Node(_))
        ));
    }

    #[tokio::test]
    async fn test_defaults_from_config() {
        let config = SessionConfig::default()
            .with_network(Network::Testnet)
            .with_fee(180);
        let builder = builder_with(MemoryNode::new(), config);

        let input = TransferInput {
            fee: None,
            network: None,
            ..sample_input()
        };
        let tx = builder.build_transfer(&input).await.unwrap();
        assert_eq!(tx.auth.origin().fee(), 180);
        assert_eq!(tx.network(), Network::Testnet);

        let input = TransferInput {
            network: Some("Stacks MAINNET".to_string()),
            ..sample_input()
        };
        let tx = builder.build_transfer(&input).await.unwrap();
        assert_eq!(tx.network(), Network::Mainnet);

        let input = TransferInput {
            network: Some("regtest".to_string()),
            ..sample_input()
        };
        let tx = builder.build_transfer(&input).await.unwrap();
        assert_eq!(tx.network(), Network::Testnet);
    }

    #[tokio::test]
    async fn test_blank_fields_count_as_absent() {
        let address = make_multisig_address(&sample_keys(), 2).unwrap();
        let node = MemoryNode::new().with_nonce(&address, 9);
        let config = SessionConfig::default().with_fee(250);
        let builder = builder_with(node, config);

        let input = TransferInput {
            amount: Some("".to_string()),
            amount_stx: Some("5".to_string()),
            num_signatures: 2,
            fee: Some("".to_string()),
            nonce: Some(" ".to_string()),
            sender: Some("".to_string()),
            ..sample_input()
        };
        let tx = builder.build_transfer(&input).await.unwrap();

        assert_eq!(amount_of(&tx), 5_000_000);
        assert_eq!(tx.auth.origin().fee(), 250);
        assert_eq!(tx.auth.origin().nonce(), 9);
        assert_eq!(tx.origin_address().unwrap().to_string(), address);
    }

    #[tokio::test]
    async fn test_testnet_record_queries_testnet_address() {
        let script = build_redeem_script(&sample_keys(), 2).unwrap();
        let testnet = derive_address_on(&script, Network::Testnet).unwrap();
        assert!(testnet.starts_with("SN"));

        let node = MemoryNode::new().with_nonce(SAMPLE_ADDRESS, 1);
        let builder = builder_with(node, SessionConfig::default());
        let input = TransferInput {
            num_signatures: 2,
            nonce: None,
            network: Some("testnet".to_string()),
            ..sample_input()
        };
        match builder.build_transfer(&input).await {
            Err(MultisigError::Node(NodeError::UnknownAccount(queried))) => {
                assert_eq!(queried, testnet)
            }
            other => panic!("expected unknown testnet account, got {:?}", other),
        }
    }

    #[test]
    fn test_total_amount() {
        let with = |amount: Option<&str>, stx: Option<&str>| TransferInput {
            amount: amount.map(str::to_string),
            amount_stx: stx.map(str::to_string),
            ..sample_input()
        };

        assert_eq!(
            with(Some("100000000000000000000"), Some("100000000000000"))
                .total_amount()
                .unwrap(),
            200_000_000_000_000_000_000
        );
        assert_eq!(
            with(Some("1000000"), Some("1")).total_amount().unwrap(),
            2_000_000
        );
        assert_eq!(with(None, Some("1")).total_amount().unwrap(), 1_000_000);
        assert!(with(None, None).total_amount().is_err());
        assert!(with(Some(""), Some(" ")).total_amount().is_err());
        assert_eq!(with(Some(""), Some("2")).total_amount().unwrap(), 2_000_000);
        assert!(with(Some("-5"), None).total_amount().is_err());
        assert!(with(Some("1.5"), None).total_amount().is_err());
        assert!(with(None, Some(&u128::MAX.to_string())).total_amount().is_err());
    }

    #[tokio::test]
    async fn test_invalid_fields() {
        let cases = [
            (
                TransferInput {
                    public_keys: vec!["02abcd".to_string()],
                    ..sample_input()
                },
                "publicKeys",
            ),
            (
                TransferInput {
                    memo: Some("m".repeat(35)),
                    ..sample_input()
                },
                "memo",
            ),
            (
                TransferInput {
                    recipient: "not-an-address".to_string(),
                    ..sample_input()
                },
                "recipient",
            ),
            (
                TransferInput {
                    fee: Some("abc".to_string()),
                    ..sample_input()
                },
                "fee",
            ),
            (
                TransferInput {
                    public_keys: keys_hex([0, 1, 1]),
                    num_signatures: 2,
                    ..sample_input()
                },
                "publicKeys",
            ),
        ];
        for (input, expected) in cases {
            match builder().build_transfer(&input).await {
                Err(MultisigError::InvalidField { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected invalid {}, got {:?}", expected, other),
            }
        }

        let input = TransferInput {
            num_signatures: 4,
            ..sample_input()
        };
        assert!(matches!(
            builder().build_transfer(&input).await,
            Err(MultisigError::InvalidThreshold {
                threshold: 4,
                keys: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_memo_and_large_amount() {
        let input = TransferInput {
            amount: Some("100000000000000000000".to_string()),
            amount_stx: Some("100000000000000".to_string()),
            memo: Some("payroll".to_string()),
            ..sample_input()
        };
        let tx = builder().build_transfer(&input).await.unwrap();
        assert_eq!(amount_of(&tx), 200_000_000_000_000_000_000);
        match &tx.payload {
            TransactionPayload::TokenTransfer { memo, .. } => assert_eq!(memo.text(), "payroll"),
        }
    }

    #[tokio::test]
    async fn test_batch_in_order() {
        let address = make_multisig_address(&sample_keys(), 2).unwrap();
        let node = MemoryNode::new().with_nonce(&address, 3);
        let builder = builder_with(node, SessionConfig::default());

        let inputs: Vec<TransferInput> = (0..4)
            .map(|i| TransferInput {
                amount: Some((1000 + i).to_string()),
                num_signatures: 2,
                nonce: None,
                ..sample_input()
            })
            .collect();
        let txs = builder.build_transfers(&inputs).await.unwrap();

        assert_eq!(txs.len(), 4);
        for (i, tx) in txs.iter().enumerate() {
            assert_eq!(amount_of(tx), 1000 + i as u128);
        }
        let mut nonces: Vec<u64> = txs.iter().map(|tx| tx.auth.origin().nonce()).collect();
        nonces.sort();
        assert_eq!(nonces, vec![3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_batch_reports_lowest_failing_record() {
        let bad = TransferInput {
            amount: None,
            ..sample_input()
        };
        let inputs = vec![sample_input(), bad.clone(), bad];

        match builder().build_transfers(&inputs).await {
            Err(MultisigError::Record { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(*source, MultisigError::InvalidField { .. }));
            }
            other => panic!("expected record error, got {:?}", other),
        }
    }

    #[test]
    fn test_input_from_json() {
        let json = r#"{
            "recipient": "ST2ZRX0K27GW0SP3GJCEMHD95TQGJMKB7G9Y0X1MH",
            "amount_stx": "5",
            "publicKeys": ["02b30fafab3a12372c5d150d567034f37d60a91168009a779498168b0e9d8ec7f2"],
            "numSignatures": 1,
            "nonce": "0"
        }"#;
        let input: TransferInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.amount_stx.as_deref(), Some("5"));
        assert_eq!(input.num_signatures, 1);
        assert_eq!(input.total_amount().unwrap(), 5_000_000);
        assert!(input.sender.is_none());
    }
}
