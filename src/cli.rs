// Command-line front-end

use crate::consensus::ProofOfWork;
use crate::core::Transaction;
use crate::error::{ChainError, Result};
use crate::storage::{Blockchain, UtxoIndex};
use crate::wallet::{pubkey_hash_from_address, validate_address, TransactionBuilder, Wallets};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tinycoin")]
#[command(about = "Educational UTXO blockchain with proof-of-work mining", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a blockchain and send the genesis reward to an address
    Createblockchain {
        #[arg(short, long)]
        address: String,
    },

    /// Get the balance of an address
    Getbalance {
        #[arg(short, long)]
        address: String,
    },

    /// Generate a new key pair and save it into the wallet file
    Createwallet,

    /// List all addresses in the wallet file
    Listaddresses,

    /// Send an amount from one address to another
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
        /// Mine the transaction into a block on this node
        #[arg(long, default_value = "false")]
        mine: bool,
    },

    /// Print all blocks from the tip back to genesis
    Printchain,

    /// Rebuild the UTXO index from the chain
    Reindexutxo,
}

/// Executes parsed commands against one node's stores
pub struct CliHandler {
    node_id: String,
}

impl CliHandler {
    pub fn new(node_id: String) -> Self {
        Self { node_id }
    }

    pub fn handle(&self, cli: Cli) -> Result<()> {
        match cli.command {
            Commands::Createblockchain { address } => self.create_blockchain(&address),
            Commands::Getbalance { address } => self.get_balance(&address),
            Commands::Createwallet => self.create_wallet(),
            Commands::Listaddresses => self.list_addresses(),
            Commands::Send {
                from,
                to,
                amount,
                mine,
            } => self.send(&from, &to, amount, mine),
            Commands::Printchain => self.print_chain(),
            Commands::Reindexutxo => self.reindex_utxo(),
        }
    }

    fn create_blockchain(&self, address: &str) -> Result<()> {
        if !validate_address(address) {
            return Err(ChainError::BadAddress(address.to_string()));
        }

        let chain = Blockchain::init_chain(address, &self.node_id)?;
        UtxoIndex::new(&chain).reindex()?;

        println!("Blockchain created, genesis reward sent to {}", address);
        Ok(())
    }

    fn get_balance(&self, address: &str) -> Result<()> {
        if !validate_address(address) {
            return Err(ChainError::BadAddress(address.to_string()));
        }

        let chain = Blockchain::continue_chain(&self.node_id)?;
        let utxo = UtxoIndex::new(&chain);

        let pubkey_hash = pubkey_hash_from_address(address)?;
        let balance: u64 = utxo
            .find_address_balance(&pubkey_hash)?
            .iter()
            .map(|output| output.value)
            .sum();

        println!("Balance of {}: {}", address, balance);
        Ok(())
    }

    fn create_wallet(&self) -> Result<()> {
        let mut wallets = Wallets::load(&self.node_id)?;
        let address = wallets.add_wallet();
        wallets.save(&self.node_id)?;

        println!("New address: {}", address);
        Ok(())
    }

    fn list_addresses(&self) -> Result<()> {
        let wallets = Wallets::load(&self.node_id)?;
        for address in wallets.list_addresses() {
            println!("{}", address);
        }
        Ok(())
    }

    fn send(&self, from: &str, to: &str, amount: u64, mine: bool) -> Result<()> {
        if !validate_address(from) {
            return Err(ChainError::BadAddress(from.to_string()));
        }
        if !validate_address(to) {
            return Err(ChainError::BadAddress(to.to_string()));
        }

        let mut chain = Blockchain::continue_chain(&self.node_id)?;
        let wallets = Wallets::load(&self.node_id)?;
        let wallet = wallets.get_wallet(from)?;

        let tx = {
            let utxo = UtxoIndex::new(&chain);
            TransactionBuilder::new(&utxo).build(wallet, to, amount)?
        };

        if mine {
            let coinbase = Transaction::coinbase(from, "")?;
            let block = chain.mine_block(vec![coinbase, tx])?;
            UtxoIndex::new(&chain).update(&block)?;
            println!("Mined block {}", block.hash);
        } else {
            // No gossip layer is attached to this build; the signed
            // transaction stops here.
            log::warn!("no network layer attached, transaction {} not broadcast", tx.id);
        }

        println!("Success!");
        Ok(())
    }

    fn print_chain(&self) -> Result<()> {
        let chain = Blockchain::continue_chain(&self.node_id)?;

        for block in chain.iter() {
            let block = block?;
            println!("Block {} (height {})", block.hash, block.height);
            println!("  Prev: {}", block.prev_block_hash);
            println!("  PoW valid: {}", ProofOfWork::new(&block).validate());
            for tx in &block.transactions {
                print!("{}", tx);
            }
            println!();
        }

        Ok(())
    }

    fn reindex_utxo(&self) -> Result<()> {
        let chain = Blockchain::continue_chain(&self.node_id)?;
        let utxo = UtxoIndex::new(&chain);
        utxo.reindex()?;

        println!(
            "Done! There are {} transactions in the UTXO index.",
            utxo.count_transactions()?
        );
        Ok(())
    }
}
