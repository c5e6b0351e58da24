// Wallet file persistence

use crate::core::{read_var_bytes, write_var_bytes, write_varint};
use crate::error::{ChainError, Result};
use crate::wallet::keys::Wallet;
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

const WALLET_MAGIC: &[u8; 4] = b"TCWS";
const WALLET_VERSION: u8 = 1;

fn wallet_file(node_id: &str) -> PathBuf {
    PathBuf::from(format!("./tmp/wallets_{}.dat", node_id))
}

/// Address-to-keypair mapping persisted per node
#[derive(Default)]
pub struct Wallets {
    wallets: BTreeMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the wallet file for a node. A missing file yields an empty set.
    pub fn load(node_id: &str) -> Result<Self> {
        let path = wallet_file(node_id);
        if !path.exists() {
            return Ok(Self::new());
        }

        let data = fs::read(&path)?;
        Self::from_bytes(&data)
    }

    /// Persist the wallet file for a node (mode 0644)
    pub fn save(&self, node_id: &str) -> Result<()> {
        let path = wallet_file(node_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.to_bytes())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
        }

        Ok(())
    }

    /// Generate a new key pair, register it, and return its address
    pub fn add_wallet(&mut self) -> String {
        let wallet = Wallet::new();
        let address = wallet.address();
        self.wallets.insert(address.clone(), wallet);
        address
    }

    pub fn get_wallet(&self, address: &str) -> Result<&Wallet> {
        self.wallets
            .get(address)
            .ok_or_else(|| ChainError::WalletNotFound(address.to_string()))
    }

    pub fn list_addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    // File layout: magic || version || varint count || entries of
    // var_bytes(address) || 32-byte private scalar. The public key is
    // re-derived from the scalar on load.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(WALLET_MAGIC);
        buf.push(WALLET_VERSION);
        write_varint(&mut buf, self.wallets.len() as u64).unwrap();
        for (address, wallet) in &self.wallets {
            write_var_bytes(&mut buf, address.as_bytes()).unwrap();
            buf.extend_from_slice(&wallet.secret_bytes());
        }
        buf
    }

    fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 5 || &data[..4] != WALLET_MAGIC {
            return Err(ChainError::BadEncoding(
                "not a wallet file".to_string(),
            ));
        }
        if data[4] != WALLET_VERSION {
            return Err(ChainError::BadEncoding(format!(
                "unsupported wallet file version {}",
                data[4]
            )));
        }

        let mut cursor = Cursor::new(&data[5..]);
        let count = crate::core::read_varint(&mut cursor)?;

        let mut wallets = BTreeMap::new();
        for _ in 0..count {
            let address_bytes = read_var_bytes(&mut cursor)?;
            let address = String::from_utf8(address_bytes)
                .map_err(|e| ChainError::BadEncoding(e.to_string()))?;

            let scalar: [u8; 32] = crate::core::read_array(&mut cursor)?;
            let wallet = Wallet::from_secret_bytes(&scalar)?;

            if wallet.address() != address {
                return Err(ChainError::BadEncoding(format!(
                    "wallet file entry for {} does not match its key",
                    address
                )));
            }
            wallets.insert(address, wallet);
        }

        Ok(Self { wallets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleanup(node_id: &str) {
        let _ = fs::remove_file(wallet_file(node_id));
    }

    #[test]
    fn test_add_and_get() {
        let mut wallets = Wallets::new();
        assert!(wallets.is_empty());

        let address = wallets.add_wallet();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets.get_wallet(&address).unwrap().address(), address);

        assert!(matches!(
            wallets.get_wallet("missing"),
            Err(ChainError::WalletNotFound(_))
        ));
    }

    #[test]
    fn test_list_addresses() {
        let mut wallets = Wallets::new();
        let a = wallets.add_wallet();
        let b = wallets.add_wallet();

        let listed = wallets.list_addresses();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&a));
        assert!(listed.contains(&b));
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut wallets = Wallets::new();
        let a = wallets.add_wallet();
        let b = wallets.add_wallet();

        let decoded = Wallets::from_bytes(&wallets.to_bytes()).unwrap();
        assert_eq!(decoded.len(), 2);
        for address in [&a, &b] {
            assert_eq!(
                decoded.get_wallet(address).unwrap().secret_bytes(),
                wallets.get_wallet(address).unwrap().secret_bytes()
            );
        }
    }

    #[test]
    fn test_save_and_load_file() {
        let node_id = format!("walletstore_{}", std::process::id());
        cleanup(&node_id);

        let mut wallets = Wallets::new();
        let address = wallets.add_wallet();
        wallets.save(&node_id).unwrap();

        let loaded = Wallets::load(&node_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded.get_wallet(&address).unwrap().secret_bytes(),
            wallets.get_wallet(&address).unwrap().secret_bytes()
        );

        cleanup(&node_id);
    }

    #[test]
    fn test_load_missing_file_yields_empty_set() {
        let loaded = Wallets::load("no_such_node_id").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_corrupt_file_rejected() {
        assert!(Wallets::from_bytes(b"junkdata").is_err());

        let mut wallets = Wallets::new();
        wallets.add_wallet();
        let mut data = wallets.to_bytes();
        data[4] = 99;
        assert!(Wallets::from_bytes(&data).is_err());
    }
}
