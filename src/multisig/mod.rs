//! Multi-signature transfer engine
//!
//! M-of-N accounts whose transfers are built unsigned, then passed between
//! signers until M slots hold signatures.
//!
//! # Example
//!
//! ```ignore
//! use stx_multisig::multisig::{sign_with_known_slot, TransferBuilder, TransferInput};
//!
//! // Build a 2-of-3 transfer
//! let builder = TransferBuilder::new(node, Arc::new(NonceCache::new()), config);
//! let mut tx = builder.build_transfer(&input).await?;
//!
//! // Collect signatures, any order
//! sign_with_known_slot(&device_a, &path_a, &mut tx).await?;
//! sign_with_known_slot(&device_b, &path_b, &mut tx).await?;
//!
//! // Transaction is now ready to broadcast
//! assert!(is_fully_authorized(&tx));
//! ```

pub mod builder;
pub mod inspect;
pub mod nonce;
pub mod signer;
pub mod wallet;

pub use builder::{TransferBuilder, TransferInput};
pub use inspect::{auth_field_info, is_fully_authorized, signers_after, AuthFieldInfo};
pub use nonce::NonceCache;
pub use signer::{sign_with_chaining, sign_with_known_slot, ChainedSignature};
pub use wallet::{match_address, MultisigConfig, MultisigError, MultisigWallet};
