// Base58 codec over the canonical Bitcoin alphabet

use crate::error::{ChainError, Result};

pub fn base58_encode(input: &[u8]) -> String {
    bs58::encode(input).into_string()
}

pub fn base58_decode(input: &str) -> Result<Vec<u8>> {
    bs58::decode(input)
        .into_vec()
        .map_err(|e| ChainError::BadEncoding(format!("base58: {}", e)))
}
