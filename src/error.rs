// Error taxonomy for the ledger core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("store error: {0}")]
    Store(String),

    #[error("store is locked by another process")]
    StoreLocked,

    #[error("no existing blockchain found")]
    NoChain,

    #[error("blockchain already exists")]
    ChainExists,

    #[error("block not found")]
    BlockNotFound,

    #[error("transaction not found")]
    TxNotFound,

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("not enough funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    #[error("invalid address: {0}")]
    BadAddress(String),

    #[error("bad encoding: {0}")]
    BadEncoding(String),

    #[error("signing failed: {0}")]
    Sign(String),

    #[error("verification failed: {0}")]
    Verify(String),

    #[error("wallet not found for address {0}")]
    WalletNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<sled::Error> for ChainError {
    fn from(err: sled::Error) -> Self {
        ChainError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
