// Proof of Work nonce search and validation

use crate::core::{i64_be, sha256, Block, Hash256};

/// Number of leading zero bits a block hash must carry
pub const DIFFICULTY: u32 = 12;

/// Proof of Work engine bound to one candidate block
pub struct ProofOfWork<'a> {
    block: &'a Block,
    /// 1 << (256 - DIFFICULTY) as a big-endian byte array
    target: [u8; 32],
}

impl<'a> ProofOfWork<'a> {
    pub fn new(block: &'a Block) -> Self {
        Self {
            block,
            target: target_bytes(DIFFICULTY),
        }
    }

    /// Header pre-image for a nonce:
    /// prev_block_hash || merkle_root || i64_be(nonce) || i64_be(difficulty)
    fn init_data(&self, nonce: i64) -> Vec<u8> {
        let mut data = Vec::with_capacity(32 + 32 + 8 + 8);
        data.extend_from_slice(self.block.prev_block_hash.as_bytes());
        data.extend_from_slice(self.block.merkle_root.as_bytes());
        data.extend_from_slice(&i64_be(nonce));
        data.extend_from_slice(&i64_be(DIFFICULTY as i64));
        data
    }

    fn meets_target(&self, hash: &Hash256) -> bool {
        // Big-endian byte arrays compare like 256-bit integers
        hash.as_bytes()[..] < self.target[..]
    }

    /// Search nonces from zero until the hash falls under the target.
    /// Returns the winning nonce and its hash.
    pub fn run(&self) -> (i64, Hash256) {
        let mut nonce: i64 = 0;
        let mut hash = sha256(&self.init_data(nonce));

        while nonce < i64::MAX {
            if self.meets_target(&hash) {
                break;
            }
            nonce += 1;
            hash = sha256(&self.init_data(nonce));

            if nonce % 100_000 == 0 {
                log::debug!("mining attempt {} at height {}", nonce, self.block.height);
            }
        }

        (nonce, hash)
    }

    /// Recompute the hash for the stored nonce and check it against the target
    pub fn validate(&self) -> bool {
        let hash = sha256(&self.init_data(self.block.nonce));
        self.meets_target(&hash)
    }
}

fn target_bytes(difficulty: u32) -> [u8; 32] {
    let mut target = [0u8; 32];
    let bit = 256 - difficulty;
    target[31 - (bit / 8) as usize] = 1 << (bit % 8);
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{merkle_root, Transaction};
    use crate::wallet::Wallet;

    fn candidate() -> Block {
        let wallet = Wallet::new();
        let coinbase = Transaction::coinbase(&wallet.address(), "pow candidate").unwrap();
        let mut block = Block {
            timestamp: 1_700_000_000,
            hash: Hash256::zero(),
            merkle_root: Hash256::zero(),
            prev_block_hash: Hash256::new([5; 32]),
            nonce: 0,
            transactions: vec![coinbase],
            height: 1,
        };
        block.merkle_root = merkle_root(&block.transactions);
        block
    }

    #[test]
    fn test_target_bytes() {
        // 1 << 244: bit 4 of the second most significant byte
        let target = target_bytes(12);
        assert_eq!(target[0], 0);
        assert_eq!(target[1], 0x10);
        assert!(target[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_meets_target_boundaries() {
        let block = candidate();
        let pow = ProofOfWork::new(&block);

        assert!(pow.meets_target(&Hash256::zero()));
        assert!(!pow.meets_target(&Hash256::new([0xff; 32])));

        // Exactly the target does not satisfy the strict inequality
        let at_target = Hash256::new(target_bytes(DIFFICULTY));
        assert!(!pow.meets_target(&at_target));
    }

    #[test]
    fn test_run_finds_valid_nonce() {
        let mut block = candidate();

        let (nonce, hash) = ProofOfWork::new(&block).run();
        block.nonce = nonce;
        block.hash = hash;

        let pow = ProofOfWork::new(&block);
        assert!(pow.meets_target(&hash));
        assert!(pow.validate());
        assert_eq!(hash, sha256(&pow.init_data(nonce)));
    }

    #[test]
    fn test_tampered_nonce_fails_validation() {
        let mut block = candidate();
        let (nonce, hash) = ProofOfWork::new(&block).run();
        block.nonce = nonce;
        block.hash = hash;

        block.nonce = nonce.wrapping_add(1);
        // A neighbouring nonce is overwhelmingly unlikely to also satisfy
        // a 12-bit target
        assert!(!ProofOfWork::new(&block).validate());
    }

    #[test]
    fn test_preimage_layout() {
        let block = candidate();
        let pow = ProofOfWork::new(&block);

        let data = pow.init_data(7);
        assert_eq!(data.len(), 80);
        assert_eq!(&data[..32], block.prev_block_hash.as_bytes());
        assert_eq!(&data[32..64], block.merkle_root.as_bytes());
        assert_eq!(&data[64..72], &i64_be(7));
        assert_eq!(&data[72..80], &i64_be(DIFFICULTY as i64));
    }
}
