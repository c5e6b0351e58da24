// Persistent block index and chain operations

use crate::core::{Block, Hash256, Serializable, Transaction, TxOutputs};
use crate::error::{ChainError, Result};
use crate::storage::{db_exists, db_path, open_db};
use crate::wallet::Wallet;
use std::collections::{HashMap, HashSet};

/// Key holding the hash of the current chain tip
const TIP_KEY: &[u8] = b"lh";
/// Coinbase tag of the genesis transaction
const GENESIS_TAG: &str = "First Transaction from Genesis";

/// Handle over the block store. One handle owns the store and is its sole
/// writer; iteration follows the prev-hash linkage on demand.
pub struct Blockchain {
    tip: Hash256,
    db: sled::Db,
}

impl Blockchain {
    /// Create a fresh chain for a node: genesis coinbase paid to `address`.
    /// Fails with `ChainExists` if the node already has a store.
    pub fn init_chain(address: &str, node_id: &str) -> Result<Self> {
        let path = db_path(node_id);
        if db_exists(&path) {
            return Err(ChainError::ChainExists);
        }

        let db = open_db(&path)?;
        let coinbase = Transaction::coinbase(address, GENESIS_TAG)?;
        Self::bootstrap(db, coinbase)
    }

    /// Reopen the chain of an existing node, loading the tip from "lh".
    /// Fails with `NoChain` if the node has no store yet.
    pub fn continue_chain(node_id: &str) -> Result<Self> {
        let path = db_path(node_id);
        if !db_exists(&path) {
            return Err(ChainError::NoChain);
        }

        let db = open_db(&path)?;
        let tip_bytes = db
            .get(TIP_KEY)?
            .ok_or_else(|| ChainError::Store("tip pointer missing".to_string()))?;
        let tip = Hash256::from_slice(&tip_bytes)?;

        Ok(Self { tip, db })
    }

    /// In-memory chain for tests
    pub fn memory(address: &str) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let coinbase = Transaction::coinbase(address, GENESIS_TAG)?;
        Self::bootstrap(db, coinbase)
    }

    fn bootstrap(db: sled::Db, coinbase: Transaction) -> Result<Self> {
        let genesis = Block::genesis(coinbase);
        db.insert(genesis.hash.as_bytes(), genesis.serialize())?;
        db.insert(TIP_KEY, genesis.hash.as_bytes().as_slice())?;
        db.flush()?;
        log::info!("genesis block created: {}", genesis.hash);

        Ok(Self {
            tip: genesis.hash,
            db,
        })
    }

    /// Verify the given transactions, mine a block on top of the tip,
    /// persist it, and advance "lh".
    ///
    /// Any failed verification or a duplicate spend of the same output
    /// within the candidate list aborts the whole operation.
    pub fn mine_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        let mut referenced: HashSet<(Hash256, i32)> = HashSet::new();
        for tx in &transactions {
            if !self.verify_transaction(tx)? {
                return Err(ChainError::InvalidTransaction(tx.id.to_hex()));
            }
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    if !referenced.insert((input.prev_tx_id, input.prev_out)) {
                        return Err(ChainError::InvalidTransaction(format!(
                            "{} double-spends {}:{}",
                            tx.id, input.prev_tx_id, input.prev_out
                        )));
                    }
                }
            }
        }

        let last = self.get_block(&self.tip)?;
        let block = Block::create(transactions, self.tip, last.height + 1);

        self.db.insert(block.hash.as_bytes(), block.serialize())?;
        self.db.insert(TIP_KEY, block.hash.as_bytes().as_slice())?;
        self.db.flush()?;
        self.tip = block.hash;

        log::info!("mined block {} at height {}", block.hash, block.height);
        Ok(block)
    }

    /// Store a block received from elsewhere. Re-adding a known block is a
    /// no-op; the tip only advances for a strictly greater height.
    pub fn add_block(&mut self, block: &Block) -> Result<()> {
        if self.db.contains_key(block.hash.as_bytes())? {
            return Ok(());
        }

        self.db.insert(block.hash.as_bytes(), block.serialize())?;

        let best = self.get_block(&self.tip)?;
        if block.height > best.height {
            self.db.insert(TIP_KEY, block.hash.as_bytes().as_slice())?;
            self.tip = block.hash;
        }
        self.db.flush()?;

        Ok(())
    }

    pub fn get_block(&self, hash: &Hash256) -> Result<Block> {
        let data = self
            .db
            .get(hash.as_bytes())?
            .ok_or(ChainError::BlockNotFound)?;
        Block::deserialize(&data)
    }

    pub fn get_best_height(&self) -> Result<u32> {
        Ok(self.get_block(&self.tip)?.height)
    }

    /// Hashes of every block, tip to genesis
    pub fn get_block_hashes(&self) -> Result<Vec<Hash256>> {
        let mut hashes = Vec::new();
        for block in self.iter() {
            hashes.push(block?.hash);
        }
        Ok(hashes)
    }

    /// Walk the chain until the transaction with this id shows up
    pub fn find_transaction(&self, id: &Hash256) -> Result<Transaction> {
        for block in self.iter() {
            let block = block?;
            for tx in block.transactions {
                if tx.id == *id {
                    return Ok(tx);
                }
            }
        }
        Err(ChainError::TxNotFound)
    }

    /// Assemble the referenced transactions and sign every input
    pub fn sign_transaction(&self, tx: &mut Transaction, wallet: &Wallet) -> Result<()> {
        let prev_txs = self.referenced_transactions(tx)?;
        tx.sign(wallet.signing_key(), &prev_txs)
    }

    /// Assemble the referenced transactions and verify every input
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        let prev_txs = self.referenced_transactions(tx)?;
        tx.verify(&prev_txs)
    }

    fn referenced_transactions(&self, tx: &Transaction) -> Result<HashMap<Hash256, Transaction>> {
        let mut prev_txs = HashMap::new();
        for input in &tx.inputs {
            let prev = self.find_transaction(&input.prev_tx_id)?;
            prev_txs.insert(prev.id, prev);
        }
        Ok(prev_txs)
    }

    /// Whole-chain unspent output computation.
    ///
    /// Blocks are walked tip to genesis and transactions within a block
    /// newest first, so every spend is recorded before the output it
    /// consumes is considered.
    pub fn find_utxo(&self) -> Result<HashMap<Hash256, TxOutputs>> {
        let mut utxo: HashMap<Hash256, TxOutputs> = HashMap::new();
        let mut spent: HashMap<Hash256, Vec<i32>> = HashMap::new();

        for block in self.iter() {
            let block = block?;
            for tx in block.transactions.iter().rev() {
                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        spent
                            .entry(input.prev_tx_id)
                            .or_default()
                            .push(input.prev_out);
                    }
                }

                for (idx, output) in tx.outputs.iter().enumerate() {
                    let consumed = spent
                        .get(&tx.id)
                        .is_some_and(|outs| outs.contains(&(idx as i32)));
                    if !consumed {
                        utxo.entry(tx.id).or_default().outputs.push(output.clone());
                    }
                }
            }
        }

        Ok(utxo)
    }

    /// Blocks from the tip back to genesis
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            current: self.tip,
            db: &self.db,
        }
    }

    pub(crate) fn db(&self) -> &sled::Db {
        &self.db
    }
}

/// Pull-on-demand block iterator driven by the prev-hash linkage
pub struct Iter<'a> {
    current: Hash256,
    db: &'a sled::Db,
}

impl Iterator for Iter<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_zero() {
            return None;
        }

        let data = match self.db.get(self.current.as_bytes()) {
            Ok(Some(data)) => data,
            Ok(None) => return Some(Err(ChainError::BlockNotFound)),
            Err(err) => return Some(Err(err.into())),
        };

        match Block::deserialize(&data) {
            Ok(block) => {
                self.current = block.prev_block_hash;
                Some(Ok(block))
            }
            Err(err) => Some(Err(err)),
        }
    }
}
