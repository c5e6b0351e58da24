// Key pairs and Base58Check addresses

use crate::core::{base58_decode, base58_encode, dsha256, hash160};
use crate::error::{ChainError, Result};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;

/// Address version byte
pub const VERSION_BYTE: u8 = 0x00;
/// Checksum suffix length
pub const CHECKSUM_LEN: usize = 4;

/// A single ECDSA key pair over NIST P-256
#[derive(Clone)]
pub struct Wallet {
    secret: SigningKey,
}

impl Wallet {
    /// Generate a fresh key pair from OS entropy
    pub fn new() -> Self {
        Self {
            secret: SigningKey::random(&mut OsRng),
        }
    }

    /// Rebuild a wallet from a stored 32-byte scalar
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SigningKey::from_slice(bytes)
            .map_err(|e| ChainError::BadEncoding(format!("invalid private scalar: {}", e)))?;
        Ok(Self { secret })
    }

    /// The 32-byte private scalar
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes().into()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.secret
    }

    /// Raw public key: X and Y coordinates, each 32 bytes, concatenated
    pub fn public_key_raw(&self) -> Vec<u8> {
        let point = self.secret.verifying_key().to_encoded_point(false);
        let mut raw = Vec::with_capacity(64);
        raw.extend_from_slice(point.x().expect("public point is never the identity").as_slice());
        raw.extend_from_slice(point.y().expect("public point is never the identity").as_slice());
        raw
    }

    /// RIPEMD160(SHA256(raw public key))
    pub fn pubkey_hash(&self) -> Vec<u8> {
        hash160(&self.public_key_raw()).to_vec()
    }

    /// Base58Check address: version || pubkey_hash || checksum4
    pub fn address(&self) -> String {
        let mut payload = vec![VERSION_BYTE];
        payload.extend_from_slice(&self.pubkey_hash());
        let check = checksum(&payload);
        payload.extend_from_slice(&check);
        base58_encode(&payload)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// First four bytes of SHA256(SHA256(payload))
pub fn checksum(payload: &[u8]) -> Vec<u8> {
    dsha256(payload).as_bytes()[..CHECKSUM_LEN].to_vec()
}

/// Check that an address decodes and its checksum matches
pub fn validate_address(address: &str) -> bool {
    let Ok(decoded) = base58_decode(address) else {
        return false;
    };
    if decoded.len() <= CHECKSUM_LEN + 1 {
        return false;
    }

    let (payload, actual) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
    checksum(payload) == actual
}

/// Extract the pubkey hash from an address, rejecting anything malformed
pub fn pubkey_hash_from_address(address: &str) -> Result<Vec<u8>> {
    if !validate_address(address) {
        return Err(ChainError::BadAddress(address.to_string()));
    }
    let decoded = base58_decode(address)?;
    Ok(decoded[1..decoded.len() - CHECKSUM_LEN].to_vec())
}
