// Minimal UTXO ledger: content-addressed blocks, proof-of-work mining,
// ECDSA-signed transactions, and a persistent UTXO index.

pub mod cli;
pub mod consensus;
pub mod core;
pub mod error;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use crate::core::{
    Block, Hash256, Serializable, Transaction, TxInput, TxOutput, TxOutputs, BLOCK_REWARD,
};
pub use cli::{Cli, CliHandler};
pub use consensus::{ProofOfWork, DIFFICULTY};
pub use error::{ChainError, Result};
pub use storage::{Blockchain, UtxoIndex};
pub use wallet::{TransactionBuilder, Wallet, Wallets};
