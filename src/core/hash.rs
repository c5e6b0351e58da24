// Hashing utilities

use crate::core::Hash256;
use sha2::{Digest, Sha256};

/// Single SHA256 hash
pub fn sha256(data: &[u8]) -> Hash256 {
    let digest = Sha256::digest(data);
    Hash256::from_slice(&digest).expect("SHA256 always returns 32 bytes")
}

/// Double SHA256, used for address checksums
pub fn dsha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash256::from_slice(&second).expect("SHA256 always returns 32 bytes")
}

/// RIPEMD160(SHA256(data)) - used for address generation
pub fn hash160(data: &[u8]) -> [u8; 20] {
    use ripemd::{Digest as RipemdDigest, Ripemd160};
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut result = [0u8; 20];
    result.copy_from_slice(&ripemd);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_answer() {
        // SHA256 of the empty string
        assert_eq!(
            sha256(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_deterministic() {
        let data = b"hello world";
        assert_eq!(sha256(data), sha256(data));
        assert_ne!(sha256(data), sha256(b"hello worlc"));
    }

    #[test]
    fn test_dsha256_is_double_hash() {
        let data = b"checksum input";
        let expected = sha256(sha256(data).as_bytes());
        assert_eq!(dsha256(data), expected);
    }

    #[test]
    fn test_hash160() {
        let hash = hash160(b"test data");
        assert_eq!(hash.len(), 20);
        assert_eq!(hash, hash160(b"test data"));
    }
}
