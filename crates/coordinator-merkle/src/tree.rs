//! Balanced, duplicate-odd-node Merkle tree over SHA-256 leaves.
//!
//! Used for both the per-cycle snapshot tree (leaves = Snapshot
//! `content_hash`es) and the checkpoint's second-level tree (leaves = each
//! cycle's `chained_root`) — same algorithm, different leaf source, per
//! spec §4.3 Phase F and §4.4 step 2.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("invalid leaf index: {index} (tree has {leaf_count} leaves)")]
    InvalidLeafIndex { index: usize, leaf_count: usize },
}

/// Which side of its parent a node sits on, per the external proof-API shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Left,
    Right,
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// `SHA256("")` — the empty-tree root convention (spec §8 boundary behaviors).
pub fn empty_tree_root() -> [u8; 32] {
    let digest = Sha256::new().finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// A balanced Merkle tree built bottom-up from an ordered list of leaf hashes.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    leaves: Vec<[u8; 32]>,
    /// `levels[0]` is the leaf level, `levels.last()` is `[root]`.
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree from leaves, already in the canonical order the caller
    /// wants proofs to be positioned against (e.g. snapshots sorted by
    /// `model_id`).
    pub fn build(leaves: Vec<[u8; 32]>) -> Self {
        if leaves.is_empty() {
            return Self {
                leaves,
                levels: vec![vec![empty_tree_root()]],
            };
        }

        let mut levels = vec![leaves.clone()];
        let mut current = leaves.clone();
        while current.len() > 1 {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for chunk in current.chunks(2) {
                let right = chunk.get(1).unwrap_or(&chunk[0]);
                next.push(hash_pair(&chunk[0], right));
            }
            levels.push(next.clone());
            current = next;
        }
        Self { leaves, levels }
    }

    /// Root of the tree. For an empty tree this is `SHA256("")`; for a
    /// single leaf it is that leaf (no duplication needed).
    ///
    /// `levels` is constructed by [`MerkleTree::build`] to always end in a
    /// singleton level, so this never falls back to the zero root in
    /// practice; the fallback only guards against a future refactor of
    /// `build` breaking that invariant.
    pub fn root(&self) -> [u8; 32] {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// All levels bottom-up, `levels[0]` the leaves and `levels.last()` the
    /// singleton root. Exposed so callers can materialize every node as a
    /// persisted row (spec §4.3 Phase F step 4) rather than only keeping the
    /// tree in memory.
    pub fn levels(&self) -> &[Vec<[u8; 32]>] {
        &self.levels
    }

    /// Inclusion proof for leaf `index`: sibling hashes from the leaf level
    /// up to (not including) the root, each tagged with which side it sits
    /// on relative to the path node.
    pub fn proof(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        if index >= self.leaves.len() {
            return Err(MerkleError::InvalidLeafIndex {
                index,
                leaf_count: self.leaves.len(),
            });
        }

        let mut path = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
            let (sibling_hash, position) = if sibling_idx < level.len() {
                (level[sibling_idx], if idx % 2 == 0 { Position::Right } else { Position::Left })
            } else {
                // odd count at this level: duplicate the last node
                (level[idx], Position::Right)
            };
            path.push(ProofStep { hash: sibling_hash, position });
            idx /= 2;
        }

        Ok(MerkleProof {
            leaf_index: index,
            leaf_hash: self.leaves[index],
            path,
            root: self.root(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofStep {
    pub hash: [u8; 32],
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub leaf_hash: [u8; 32],
    pub path: Vec<ProofStep>,
    pub root: [u8; 32],
}

impl MerkleProof {
    /// Recompute the root from `leaf_hash` and `path` and compare to `root`.
    pub fn verify(&self) -> bool {
        let mut current = self.leaf_hash;
        for step in &self.path {
            current = match step.position {
                Position::Right => hash_pair(&current, &step.hash),
                Position::Left => hash_pair(&step.hash, &current),
            };
        }
        current == self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update([n]);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }

    #[test]
    fn empty_tree_uses_sha256_empty_string() {
        let tree = MerkleTree::build(vec![]);
        assert_eq!(tree.root(), empty_tree_root());
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn single_leaf_root_is_the_leaf_no_duplication() {
        let l = leaf(1);
        let tree = MerkleTree::build(vec![l]);
        assert_eq!(tree.root(), l);
    }

    #[test]
    fn odd_leaf_count_duplicates_deterministically() {
        let leaves = vec![leaf(1), leaf(2), leaf(3)];
        let t1 = MerkleTree::build(leaves.clone());
        let t2 = MerkleTree::build(leaves);
        assert_eq!(t1.root(), t2.root());
    }

    #[test]
    fn all_proofs_verify_for_various_sizes() {
        for n in 1..=9usize {
            let leaves: Vec<_> = (0..n as u8).map(leaf).collect();
            let tree = MerkleTree::build(leaves);
            for i in 0..n {
                let proof = tree.proof(i).unwrap();
                assert!(proof.verify(), "proof for leaf {i} of {n} failed");
            }
        }
    }

    #[test]
    fn invalid_index_is_rejected() {
        let tree = MerkleTree::build(vec![leaf(1), leaf(2)]);
        assert!(matches!(tree.proof(5), Err(MerkleError::InvalidLeafIndex { .. })));
    }

    #[test]
    fn tampered_proof_fails_verification() {
        let tree = MerkleTree::build(vec![leaf(1), leaf(2), leaf(3), leaf(4)]);
        let mut proof = tree.proof(0).unwrap();
        proof.leaf_hash = leaf(99);
        assert!(!proof.verify());
    }
}
