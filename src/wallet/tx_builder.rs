// Spend construction against the UTXO index

use crate::core::{Transaction, TxInput, TxOutput};
use crate::error::{ChainError, Result};
use crate::storage::UtxoIndex;
use crate::wallet::keys::{validate_address, Wallet};

/// Builds signed transactions from a wallet's unspent outputs
pub struct TransactionBuilder<'a> {
    utxo: &'a UtxoIndex<'a>,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(utxo: &'a UtxoIndex<'a>) -> Self {
        Self { utxo }
    }

    /// Build and sign a transfer of `amount` to `to`, paying change back to
    /// the sender when the collected inputs exceed the amount.
    pub fn build(&self, wallet: &Wallet, to: &str, amount: u64) -> Result<Transaction> {
        if !validate_address(to) {
            return Err(ChainError::BadAddress(to.to_string()));
        }

        let pubkey_hash = wallet.pubkey_hash();
        let (accumulated, spendable) = self.utxo.find_spendable(&pubkey_hash, amount)?;

        if accumulated < amount {
            return Err(ChainError::InsufficientFunds {
                have: accumulated,
                need: amount,
            });
        }

        let mut inputs = Vec::new();
        for (tx_id, out_indices) in &spendable {
            for &out_idx in out_indices {
                inputs.push(TxInput::new(*tx_id, out_idx, wallet.public_key_raw()));
            }
        }

        let mut outputs = vec![TxOutput::to_address(amount, to)?];
        if accumulated > amount {
            outputs.push(TxOutput::to_address(accumulated - amount, &wallet.address())?);
        }

        let mut tx = Transaction::new(inputs, outputs);
        self.utxo.chain().sign_transaction(&mut tx, wallet)?;
        Ok(tx)
    }
}
