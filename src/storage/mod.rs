// Storage layer: persistent chain store and derived UTXO index

mod chain;
mod utxo;

pub use chain::Blockchain;
pub use utxo::UtxoIndex;

use crate::error::{ChainError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn db_path(node_id: &str) -> PathBuf {
    PathBuf::from(format!("./tmp/blocks_{}", node_id))
}

pub(crate) fn db_exists(path: &Path) -> bool {
    path.join("db").exists()
}

/// Open the embedded store, recovering once from a stale lock.
///
/// If the first open fails with a lock error, a leftover `LOCK` sentinel is
/// removed and the open retried exactly once. A second failure means another
/// process really holds the store.
pub(crate) fn open_db(path: &Path) -> Result<sled::Db> {
    match sled::open(path) {
        Ok(db) => Ok(db),
        Err(err) if err.to_string().to_lowercase().contains("lock") => {
            log::warn!(
                "database at {} reports a stale lock, removing it and retrying",
                path.display()
            );
            let sentinel = path.join("LOCK");
            if sentinel.exists() {
                fs::remove_file(&sentinel)?;
            }
            sled::open(path).map_err(|_| ChainError::StoreLocked)
        }
        Err(err) => Err(err.into()),
    }
}
