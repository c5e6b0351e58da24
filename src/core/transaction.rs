// Transaction data structures, signing and verification

use crate::core::hash::sha256;
use crate::core::serialize::{read_array, read_var_bytes, write_var_bytes, write_varint, Serializable};
use crate::core::Hash256;
use crate::error::{ChainError, Result};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::generic_array::GenericArray;
use p256::EncodedPoint;
use rand::RngCore;
use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read, Write};

/// Reward minted by every coinbase transaction
pub const BLOCK_REWARD: u64 = 20;

/// Transaction input - references a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Id of the referenced transaction (zero for coinbase)
    pub prev_tx_id: Hash256,
    /// Index of the output in the referenced transaction (-1 for coinbase)
    pub prev_out: i32,
    /// ECDSA signature, r and s each 32 bytes left-padded
    pub signature: Vec<u8>,
    /// Raw public key of the spender; mining tag bytes for coinbase
    pub pubkey: Vec<u8>,
}

impl TxInput {
    pub fn new(prev_tx_id: Hash256, prev_out: i32, pubkey: Vec<u8>) -> Self {
        Self {
            prev_tx_id,
            prev_out,
            signature: Vec::new(),
            pubkey,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.prev_tx_id.is_zero() && self.prev_out == -1
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_all(self.prev_tx_id.as_bytes()).unwrap();
        buf.write_all(&self.prev_out.to_le_bytes()).unwrap();
        write_var_bytes(&mut buf, &self.signature).unwrap();
        write_var_bytes(&mut buf, &self.pubkey).unwrap();
        buf
    }

    pub fn deserialize(reader: &mut dyn Read) -> Result<Self> {
        let prev_tx_id = Hash256::new(read_array(reader)?);
        let prev_out = i32::from_le_bytes(read_array(reader)?);
        let signature = read_var_bytes(reader)?;
        let pubkey = read_var_bytes(reader)?;

        Ok(Self {
            prev_tx_id,
            prev_out,
            signature,
            pubkey,
        })
    }
}

/// Transaction output - an amount locked to a public key hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    /// RIPEMD160(SHA256(pubkey)) of the recipient
    pub pubkey_hash: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: u64, pubkey_hash: Vec<u8>) -> Self {
        Self { value, pubkey_hash }
    }

    /// Build an output locked to the pubkey hash carried by a Base58Check address
    pub fn to_address(value: u64, address: &str) -> Result<Self> {
        let pubkey_hash = crate::wallet::pubkey_hash_from_address(address)?;
        Ok(Self { value, pubkey_hash })
    }

    pub fn is_locked_with(&self, pubkey_hash: &[u8]) -> bool {
        self.pubkey_hash == pubkey_hash
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_all(&self.value.to_le_bytes()).unwrap();
        write_var_bytes(&mut buf, &self.pubkey_hash).unwrap();
        buf
    }

    pub fn deserialize(reader: &mut dyn Read) -> Result<Self> {
        let value = u64::from_le_bytes(read_array(reader)?);
        let pubkey_hash = read_var_bytes(reader)?;
        Ok(Self { value, pubkey_hash })
    }
}

/// Bundle of outputs stored per transaction in the UTXO index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOutputs {
    pub outputs: Vec<TxOutput>,
}

impl Serializable for TxOutputs {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, self.outputs.len() as u64).unwrap();
        for output in &self.outputs {
            buf.write_all(&output.serialize()).unwrap();
        }
        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let count = crate::core::serialize::read_varint(&mut cursor)? as usize;
        let mut outputs = Vec::with_capacity(count);
        for _ in 0..count {
            outputs.push(TxOutput::deserialize(&mut cursor)?);
        }
        Ok(Self { outputs })
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        tx.id = tx.hash();
        tx
    }

    /// Create a coinbase transaction minting the block reward to `to`.
    /// An empty tag is replaced by 24 random bytes, hex-encoded.
    pub fn coinbase(to: &str, data: &str) -> Result<Self> {
        let tag = if data.is_empty() {
            let mut random = [0u8; 24];
            rand::rngs::OsRng.fill_bytes(&mut random);
            hex::encode(random)
        } else {
            data.to_string()
        };

        let input = TxInput {
            prev_tx_id: Hash256::zero(),
            prev_out: -1,
            signature: Vec::new(),
            pubkey: tag.into_bytes(),
        };
        let output = TxOutput::to_address(BLOCK_REWARD, to)?;
        Ok(Self::new(vec![input], vec![output]))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Transaction id: SHA256 of the serialization with the id field cleared
    pub fn hash(&self) -> Hash256 {
        let mut stripped = self.clone();
        stripped.id = Hash256::zero();
        sha256(&stripped.serialize())
    }

    /// Copy with every input's signature and pubkey cleared, used as the
    /// signing pre-image skeleton
    pub fn trimmed_copy(&self) -> Self {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                prev_tx_id: input.prev_tx_id,
                prev_out: input.prev_out,
                signature: Vec::new(),
                pubkey: Vec::new(),
            })
            .collect();

        Self {
            id: self.id,
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Canonical textual pre-image for signing and verification.
    ///
    /// One `tx(...)` record in field declaration order: every byte field as
    /// lowercase hex, every integer in decimal, nested `in(...)`/`out(...)`
    /// records, terminated by a newline. Signer and verifier must agree on
    /// this rendering byte-for-byte.
    pub fn signing_payload(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        let _ = write!(out, "tx(id:{}", self.id.to_hex());
        for input in &self.inputs {
            let _ = write!(
                out,
                ",in(prev:{},out:{},sig:{},pub:{})",
                input.prev_tx_id.to_hex(),
                input.prev_out,
                hex::encode(&input.signature),
                hex::encode(&input.pubkey)
            );
        }
        for output in &self.outputs {
            let _ = write!(
                out,
                ",out(value:{},pkh:{})",
                output.value,
                hex::encode(&output.pubkey_hash)
            );
        }
        out.push_str(")\n");
        out
    }

    /// Sign every input with the spender's private key.
    ///
    /// For each input the pre-image is the trimmed copy with that input's
    /// pubkey replaced by the referenced output's pubkey hash. The resulting
    /// signature is stored as r and s fixed-width concatenated.
    pub fn sign(
        &mut self,
        key: &SigningKey,
        prev_txs: &HashMap<Hash256, Transaction>,
    ) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        for input in &self.inputs {
            if !prev_txs.contains_key(&input.prev_tx_id) {
                return Err(ChainError::Sign(
                    "referenced transaction is missing".to_string(),
                ));
            }
        }

        let mut trimmed = self.trimmed_copy();
        for i in 0..self.inputs.len() {
            let prev_tx = &prev_txs[&self.inputs[i].prev_tx_id];
            let prev_out = prev_tx
                .outputs
                .get(self.inputs[i].prev_out as usize)
                .ok_or_else(|| {
                    ChainError::Sign(format!(
                        "output index {} out of range",
                        self.inputs[i].prev_out
                    ))
                })?;

            trimmed.inputs[i].signature.clear();
            trimmed.inputs[i].pubkey = prev_out.pubkey_hash.clone();
            let payload = trimmed.signing_payload();
            trimmed.inputs[i].pubkey.clear();

            let signature: Signature = key
                .try_sign(payload.as_bytes())
                .map_err(|e| ChainError::Sign(e.to_string()))?;
            self.inputs[i].signature = signature.to_vec();
        }

        Ok(())
    }

    /// Verify every input signature against the referenced outputs.
    ///
    /// A missing referenced transaction is structurally fatal; any
    /// cryptographic mismatch simply yields `false`.
    pub fn verify(&self, prev_txs: &HashMap<Hash256, Transaction>) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }

        for input in &self.inputs {
            if !prev_txs.contains_key(&input.prev_tx_id) {
                return Err(ChainError::Verify(
                    "referenced transaction is missing".to_string(),
                ));
            }
        }

        let mut trimmed = self.trimmed_copy();
        for (i, input) in self.inputs.iter().enumerate() {
            let prev_tx = &prev_txs[&input.prev_tx_id];
            let prev_out = prev_tx.outputs.get(input.prev_out as usize).ok_or_else(|| {
                ChainError::Verify(format!("output index {} out of range", input.prev_out))
            })?;

            trimmed.inputs[i].signature.clear();
            trimmed.inputs[i].pubkey = prev_out.pubkey_hash.clone();
            let payload = trimmed.signing_payload();
            trimmed.inputs[i].pubkey.clear();

            let Ok(signature) = Signature::from_slice(&input.signature) else {
                return Ok(false);
            };
            if input.pubkey.len() != 64 {
                return Ok(false);
            }
            let point = EncodedPoint::from_untagged_bytes(GenericArray::from_slice(&input.pubkey));
            let Ok(verifying_key) = VerifyingKey::from_encoded_point(&point) else {
                return Ok(false);
            };
            if verifying_key.verify(payload.as_bytes(), &signature).is_err() {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn from_reader(reader: &mut dyn Read) -> Result<Self> {
        let id = Hash256::new(read_array(reader)?);

        let input_count = crate::core::serialize::read_varint(reader)? as usize;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(TxInput::deserialize(reader)?);
        }

        let output_count = crate::core::serialize::read_varint(reader)? as usize;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(TxOutput::deserialize(reader)?);
        }

        Ok(Self {
            id,
            inputs,
            outputs,
        })
    }
}

impl Serializable for Transaction {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.write_all(self.id.as_bytes()).unwrap();

        write_varint(&mut buf, self.inputs.len() as u64).unwrap();
        for input in &self.inputs {
            buf.write_all(&input.serialize()).unwrap();
        }

        write_varint(&mut buf, self.outputs.len() as u64).unwrap();
        for output in &self.outputs {
            buf.write_all(&output.serialize()).unwrap();
        }

        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        Self::from_reader(&mut cursor)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Transaction {}:", self.id)?;
        for (i, input) in self.inputs.iter().enumerate() {
            if input.is_coinbase() {
                writeln!(f, "  Input {}: coinbase", i)?;
            } else {
                writeln!(
                    f,
                    "  Input {}: prev {} out {}",
                    i, input.prev_tx_id, input.prev_out
                )?;
            }
        }
        for (i, output) in self.outputs.iter().enumerate() {
            writeln!(
                f,
                "  Output {}: value {} locked to {}",
                i,
                output.value,
                hex::encode(&output.pubkey_hash)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn spend_fixture() -> (Wallet, Transaction, Transaction) {
        let sender = Wallet::new();
        let recipient = Wallet::new();

        let prev = Transaction::coinbase(&sender.address(), "fixture genesis").unwrap();

        let input = TxInput::new(prev.id, 0, sender.public_key_raw());
        let output = TxOutput::to_address(BLOCK_REWARD, &recipient.address()).unwrap();
        let tx = Transaction::new(vec![input], vec![output]);

        (sender, prev, tx)
    }

    fn prev_map(prev: &Transaction) -> HashMap<Hash256, Transaction> {
        let mut map = HashMap::new();
        map.insert(prev.id, prev.clone());
        map
    }

    #[test]
    fn test_coinbase_detection() {
        let wallet = Wallet::new();
        let tx = Transaction::coinbase(&wallet.address(), "genesis tag").unwrap();

        assert!(tx.is_coinbase());
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].value, BLOCK_REWARD);
        assert_eq!(tx.inputs[0].pubkey, b"genesis tag");
    }

    #[test]
    fn test_coinbase_random_tag() {
        let wallet = Wallet::new();
        let a = Transaction::coinbase(&wallet.address(), "").unwrap();
        let b = Transaction::coinbase(&wallet.address(), "").unwrap();

        // 24 random bytes, hex-encoded
        assert_eq!(a.inputs[0].pubkey.len(), 48);
        assert_ne!(a.inputs[0].pubkey, b.inputs[0].pubkey);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_id_is_hash_of_cleared_serialization() {
        let (_, prev, tx) = spend_fixture();
        assert_eq!(tx.id, tx.hash());
        assert_eq!(prev.id, prev.hash());

        let mut other = tx.clone();
        other.outputs[0].value += 1;
        assert_ne!(other.hash(), tx.id);
    }

    #[test]
    fn test_serialization_round_trip() {
        let (_, prev, tx) = spend_fixture();
        for t in [&prev, &tx] {
            let decoded = Transaction::deserialize(&t.serialize()).unwrap();
            assert_eq!(&decoded, t);
        }
    }

    #[test]
    fn test_outputs_bundle_round_trip() {
        let (_, prev, tx) = spend_fixture();
        let bundle = TxOutputs {
            outputs: prev.outputs.iter().chain(&tx.outputs).cloned().collect(),
        };
        let decoded = TxOutputs::deserialize(&bundle.serialize()).unwrap();
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn test_trimmed_copy_clears_witness_data() {
        let (sender, prev, mut tx) = spend_fixture();
        tx.sign(sender.signing_key(), &prev_map(&prev)).unwrap();

        let trimmed = tx.trimmed_copy();
        assert_eq!(trimmed.id, tx.id);
        assert_eq!(trimmed.outputs, tx.outputs);
        for (orig, cut) in tx.inputs.iter().zip(&trimmed.inputs) {
            assert_eq!(cut.prev_tx_id, orig.prev_tx_id);
            assert_eq!(cut.prev_out, orig.prev_out);
            assert!(cut.signature.is_empty());
            assert!(cut.pubkey.is_empty());
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let (sender, prev, mut tx) = spend_fixture();
        let prevs = prev_map(&prev);

        tx.sign(sender.signing_key(), &prevs).unwrap();
        assert_eq!(tx.inputs[0].signature.len(), 64);
        assert!(tx.verify(&prevs).unwrap());
    }

    #[test]
    fn test_flipped_byte_breaks_verification() {
        let (sender, prev, mut tx) = spend_fixture();
        let prevs = prev_map(&prev);
        tx.sign(sender.signing_key(), &prevs).unwrap();

        let mut tampered = tx.clone();
        tampered.outputs[0].value = 19;
        assert!(!tampered.verify(&prevs).unwrap());

        let mut bad_sig = tx.clone();
        bad_sig.inputs[0].signature[10] ^= 0xff;
        assert!(!bad_sig.verify(&prevs).unwrap());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let (_, prev, mut tx) = spend_fixture();
        let prevs = prev_map(&prev);

        let stranger = Wallet::new();
        tx.sign(stranger.signing_key(), &prevs).unwrap();
        assert!(!tx.verify(&prevs).unwrap());
    }

    #[test]
    fn test_missing_prev_tx_is_fatal() {
        let (sender, _, mut tx) = spend_fixture();
        let empty = HashMap::new();

        assert!(matches!(
            tx.sign(sender.signing_key(), &empty),
            Err(ChainError::Sign(_))
        ));
        assert!(matches!(tx.verify(&empty), Err(ChainError::Verify(_))));
    }

    #[test]
    fn test_signing_payload_is_stable() {
        let (_, _, tx) = spend_fixture();
        let trimmed = tx.trimmed_copy();
        assert_eq!(trimmed.signing_payload(), trimmed.signing_payload());
        assert!(trimmed.signing_payload().starts_with("tx(id:"));
        assert!(trimmed.signing_payload().ends_with(")\n"));
    }
}
