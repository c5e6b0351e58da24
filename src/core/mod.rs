// Core ledger data structures

mod base58;
mod block;
mod hash;
mod merkle;
mod serialize;
mod transaction;
mod types;

pub use base58::{base58_decode, base58_encode};
pub use block::Block;
pub use hash::{dsha256, hash160, sha256};
pub use merkle::merkle_root;
pub use serialize::{
    i64_be, read_array, read_var_bytes, read_varint, write_var_bytes, write_varint, Serializable,
};
pub use transaction::{Transaction, TxInput, TxOutput, TxOutputs, BLOCK_REWARD};
pub use types::Hash256;
