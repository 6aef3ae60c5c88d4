//! Merkle tree construction, inclusion proofs, and cycle hash-chaining.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod chain;
pub mod tree;

pub use chain::chained_root;
pub use tree::{empty_tree_root, MerkleError, MerkleProof, MerkleTree, Position, ProofStep};
