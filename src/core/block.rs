// Block structure and construction

use crate::consensus::ProofOfWork;
use crate::core::merkle::merkle_root;
use crate::core::serialize::{read_array, write_varint, Serializable};
use crate::core::{Hash256, Transaction};
use crate::error::Result;
use std::io::{Cursor, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Block - binds an ordered transaction list to the chain via proof of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Unix timestamp (seconds) at construction
    pub timestamp: i64,
    /// Hash found by the nonce search
    pub hash: Hash256,
    /// Merkle root over the serialized transactions
    pub merkle_root: Hash256,
    /// Hash of the predecessor (zero for genesis)
    pub prev_block_hash: Hash256,
    /// Nonce satisfying the proof-of-work target
    pub nonce: i64,
    pub transactions: Vec<Transaction>,
    /// Chain height (genesis = 0)
    pub height: u32,
}

impl Block {
    /// Construct and mine a block at the given height.
    ///
    /// The Merkle root is fixed before the nonce search starts and must not
    /// change during it.
    pub fn create(
        transactions: Vec<Transaction>,
        prev_block_hash: Hash256,
        height: u32,
    ) -> Block {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64);

        let mut block = Block {
            timestamp,
            hash: Hash256::zero(),
            merkle_root: Hash256::zero(),
            prev_block_hash,
            nonce: 0,
            transactions,
            height,
        };
        block.merkle_root = merkle_root(&block.transactions);

        let (nonce, hash) = ProofOfWork::new(&block).run();
        block.nonce = nonce;
        block.hash = hash;
        block
    }

    /// The genesis block: height 0, no predecessor, a single coinbase
    pub fn genesis(coinbase: Transaction) -> Block {
        Self::create(vec![coinbase], Hash256::zero(), 0)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_block_hash.is_zero()
    }
}

impl Serializable for Block {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.write_all(&self.timestamp.to_le_bytes()).unwrap();
        buf.write_all(self.hash.as_bytes()).unwrap();
        buf.write_all(self.merkle_root.as_bytes()).unwrap();
        buf.write_all(self.prev_block_hash.as_bytes()).unwrap();
        buf.write_all(&self.nonce.to_le_bytes()).unwrap();
        buf.write_all(&self.height.to_le_bytes()).unwrap();

        write_varint(&mut buf, self.transactions.len() as u64).unwrap();
        for tx in &self.transactions {
            buf.write_all(&tx.serialize()).unwrap();
        }

        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let timestamp = i64::from_le_bytes(read_array(&mut cursor)?);
        let hash = Hash256::new(read_array(&mut cursor)?);
        let merkle_root = Hash256::new(read_array(&mut cursor)?);
        let prev_block_hash = Hash256::new(read_array(&mut cursor)?);
        let nonce = i64::from_le_bytes(read_array(&mut cursor)?);
        let height = u32::from_le_bytes(read_array(&mut cursor)?);

        let tx_count = crate::core::serialize::read_varint(&mut cursor)? as usize;
        let mut transactions = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            transactions.push(Transaction::from_reader(&mut cursor)?);
        }

        Ok(Self {
            timestamp,
            hash,
            merkle_root,
            prev_block_hash,
            nonce,
            transactions,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::merkle::merkle_root;
    use crate::wallet::Wallet;

    fn coinbase(tag: &str) -> Transaction {
        let wallet = Wallet::new();
        Transaction::coinbase(&wallet.address(), tag).unwrap()
    }

    #[test]
    fn test_genesis_block() {
        let block = Block::genesis(coinbase("genesis"));

        assert!(block.is_genesis());
        assert_eq!(block.height, 0);
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_coinbase());
    }

    #[test]
    fn test_create_links_and_commits() {
        let genesis = Block::genesis(coinbase("genesis"));
        let next = Block::create(vec![coinbase("next")], genesis.hash, 1);

        assert_eq!(next.prev_block_hash, genesis.hash);
        assert_eq!(next.height, 1);
        assert_eq!(next.merkle_root, merkle_root(&next.transactions));
        assert!(ProofOfWork::new(&next).validate());
    }

    #[test]
    fn test_serialization_round_trip() {
        let block = Block::create(vec![coinbase("a"), coinbase("b"), coinbase("c")], Hash256::new([9; 32]), 3);

        let decoded = Block::deserialize(&block.serialize()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_deserialize_rejects_truncated_data() {
        let block = Block::genesis(coinbase("genesis"));
        let mut data = block.serialize();
        data.truncate(data.len() / 2);

        assert!(Block::deserialize(&data).is_err());
    }
}
