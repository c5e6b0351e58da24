// Merkle tree commitment over serialized transactions

use crate::core::hash::sha256;
use crate::core::serialize::Serializable;
use crate::core::{Hash256, Transaction};

/// Compute the Merkle root for the transactions of a block.
///
/// Leaves are SHA256 of each serialized transaction; inner nodes hash the
/// concatenation of their children. A level with an odd node count duplicates
/// its last node. The tree is built bottom-up as flat levels.
///
/// Valid blocks always carry at least a coinbase; the zero hash stands in for
/// the (never persisted) empty case.
pub fn merkle_root(transactions: &[Transaction]) -> Hash256 {
    if transactions.is_empty() {
        return Hash256::zero();
    }

    let mut level: Vec<Hash256> = transactions
        .iter()
        .map(|tx| sha256(&tx.serialize()))
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };

            let mut combined = Vec::with_capacity(64);
            combined.extend_from_slice(left.as_bytes());
            combined.extend_from_slice(right.as_bytes());
            next.push(sha256(&combined));
        }
        level = next;
    }

    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn tagged_tx(tag: &str) -> Transaction {
        let wallet = Wallet::new();
        Transaction::coinbase(&wallet.address(), tag).unwrap()
    }

    #[test]
    fn test_single_tx_root_is_leaf_hash() {
        let tx = tagged_tx("only");
        assert_eq!(merkle_root(&[tx.clone()]), sha256(&tx.serialize()));
    }

    #[test]
    fn test_two_tx_root() {
        let a = tagged_tx("a");
        let b = tagged_tx("b");

        let mut combined = Vec::new();
        combined.extend_from_slice(sha256(&a.serialize()).as_bytes());
        combined.extend_from_slice(sha256(&b.serialize()).as_bytes());

        assert_eq!(merkle_root(&[a, b]), sha256(&combined));
    }

    #[test]
    fn test_odd_count_duplicates_last() {
        let a = tagged_tx("a");
        let b = tagged_tx("b");
        let c = tagged_tx("c");

        // [a b c] hashes like [a b c c]
        let with_dup = merkle_root(&[a.clone(), b.clone(), c.clone()]);

        let la = sha256(&a.serialize());
        let lb = sha256(&b.serialize());
        let lc = sha256(&c.serialize());

        let pair = |l: Hash256, r: Hash256| {
            let mut buf = Vec::new();
            buf.extend_from_slice(l.as_bytes());
            buf.extend_from_slice(r.as_bytes());
            sha256(&buf)
        };
        let expected = pair(pair(la, lb), pair(lc, lc));

        assert_eq!(with_dup, expected);
    }

    #[test]
    fn test_root_changes_with_content() {
        let a = tagged_tx("a");
        let b = tagged_tx("b");
        let c = tagged_tx("c");

        assert_ne!(
            merkle_root(&[a.clone(), b.clone()]),
            merkle_root(&[a.clone(), c])
        );
        assert_ne!(merkle_root(&[a.clone(), b.clone()]), merkle_root(&[b, a]));
    }
}
