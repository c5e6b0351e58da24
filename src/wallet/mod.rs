// Wallets, addresses and spend construction

mod keys;
mod store;
mod tx_builder;

pub use keys::{
    checksum, pubkey_hash_from_address, validate_address, Wallet, CHECKSUM_LEN, VERSION_BYTE,
};
pub use store::Wallets;
pub use tx_builder::TransactionBuilder;
