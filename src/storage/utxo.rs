// Derived index of unspent transaction outputs

use crate::core::{Block, Hash256, Serializable, TxOutput, TxOutputs};
use crate::error::{ChainError, Result};
use crate::storage::Blockchain;
use std::collections::HashMap;

/// Key prefix separating UTXO entries from blocks in the shared store
const UTXO_PREFIX: &[u8] = b"utxo-";
/// Upper bound on keys deleted per batch during a reindex
const DELETE_BATCH: usize = 100_000;

/// Index of unspent outputs, keyed by "utxo-" || tx id, living in the same
/// store as the chain it is derived from
pub struct UtxoIndex<'a> {
    chain: &'a Blockchain,
}

impl<'a> UtxoIndex<'a> {
    pub fn new(chain: &'a Blockchain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Blockchain {
        self.chain
    }

    fn entry_key(tx_id: &Hash256) -> Vec<u8> {
        let mut key = Vec::with_capacity(UTXO_PREFIX.len() + 32);
        key.extend_from_slice(UTXO_PREFIX);
        key.extend_from_slice(tx_id.as_bytes());
        key
    }

    /// Rebuild the whole index from the chain: drop every entry under the
    /// prefix, then persist the freshly computed unspent set.
    pub fn reindex(&self) -> Result<()> {
        self.delete_by_prefix(UTXO_PREFIX)?;

        let utxo = self.chain.find_utxo()?;
        let db = self.chain.db();
        for (tx_id, outputs) in utxo {
            db.insert(Self::entry_key(&tx_id), outputs.serialize())?;
        }
        db.flush()?;

        log::info!("utxo index rebuilt: {} transactions", self.count_transactions()?);
        Ok(())
    }

    /// Fold a freshly stored block into the index: spent outputs leave their
    /// entries (empty entries are deleted), new outputs are appended under
    /// their transaction's id.
    pub fn update(&self, block: &Block) -> Result<()> {
        let db = self.chain.db();

        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let key = Self::entry_key(&input.prev_tx_id);
                    let data = db.get(&key)?.ok_or_else(|| {
                        ChainError::Store(format!(
                            "utxo entry missing for {}",
                            input.prev_tx_id
                        ))
                    })?;
                    let stored = TxOutputs::deserialize(&data)?;

                    let remaining = TxOutputs {
                        outputs: stored
                            .outputs
                            .into_iter()
                            .enumerate()
                            .filter(|(idx, _)| *idx as i32 != input.prev_out)
                            .map(|(_, output)| output)
                            .collect(),
                    };

                    if remaining.outputs.is_empty() {
                        db.remove(&key)?;
                    } else {
                        db.insert(key, remaining.serialize())?;
                    }
                }
            }

            let fresh = TxOutputs {
                outputs: tx.outputs.clone(),
            };
            db.insert(Self::entry_key(&tx.id), fresh.serialize())?;
        }

        db.flush()?;
        Ok(())
    }

    /// Collect outputs owned by `pubkey_hash` until `amount` is reached.
    ///
    /// Scanning halts as soon as the accumulated value covers the amount,
    /// which can leave later outputs of the current entry unvisited. Callers
    /// must re-check `accumulated >= amount`.
    pub fn find_spendable(
        &self,
        pubkey_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, HashMap<Hash256, Vec<i32>>)> {
        let mut unspent: HashMap<Hash256, Vec<i32>> = HashMap::new();
        let mut accumulated = 0u64;

        for item in self.chain.db().scan_prefix(UTXO_PREFIX) {
            let (key, value) = item?;
            let tx_id = Hash256::from_slice(&key[UTXO_PREFIX.len()..])?;
            let outputs = TxOutputs::deserialize(&value)?;

            for (idx, output) in outputs.outputs.iter().enumerate() {
                if output.is_locked_with(pubkey_hash) && accumulated < amount {
                    accumulated += output.value;
                    unspent.entry(tx_id).or_default().push(idx as i32);
                }
            }
        }

        Ok((accumulated, unspent))
    }

    /// Every unspent output owned by `pubkey_hash`
    pub fn find_address_balance(&self, pubkey_hash: &[u8]) -> Result<Vec<TxOutput>> {
        let mut outputs = Vec::new();

        for item in self.chain.db().scan_prefix(UTXO_PREFIX) {
            let (_, value) = item?;
            let stored = TxOutputs::deserialize(&value)?;
            for output in stored.outputs {
                if output.is_locked_with(pubkey_hash) {
                    outputs.push(output);
                }
            }
        }

        Ok(outputs)
    }

    /// Number of transactions with at least one unspent output
    pub fn count_transactions(&self) -> Result<usize> {
        let mut counter = 0;
        for item in self.chain.db().scan_prefix(UTXO_PREFIX) {
            item?;
            counter += 1;
        }
        Ok(counter)
    }

    fn delete_by_prefix(&self, prefix: &[u8]) -> Result<()> {
        let db = self.chain.db();

        let mut keys = Vec::new();
        for item in db.scan_prefix(prefix) {
            let (key, _) = item?;
            keys.push(key);
        }

        for chunk in keys.chunks(DELETE_BATCH) {
            let mut batch = sled::Batch::default();
            for key in chunk {
                batch.remove(key);
            }
            db.apply_batch(batch)?;
        }

        Ok(())
    }
}
