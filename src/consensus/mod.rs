// Consensus logic

pub mod pow;

pub use pow::{ProofOfWork, DIFFICULTY};
