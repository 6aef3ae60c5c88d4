//! The cross-cycle hash chain: `chained_root = SHA256(previous_root ∥ snapshots_root)`.

use sha2::{Digest, Sha256};

/// `chained_root = SHA256(previous_cycle_root ∥ snapshots_root)`. `previous`
/// is `None` for the first cycle, which is equivalent to treating it as the
/// empty byte string (spec §8: "first cycle: `previous_cycle_root = ""`").
pub fn chained_root(previous: Option<&[u8; 32]>, snapshots_root: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    if let Some(prev) = previous {
        hasher.update(prev);
    }
    hasher.update(snapshots_root);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MerkleTree;

    #[test]
    fn first_cycle_equals_hashing_root_alone() {
        let tree = MerkleTree::build(vec![[1u8; 32]]);
        let root = tree.root();
        let mut hasher = Sha256::new();
        hasher.update(root);
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(chained_root(None, &root), expected);
    }

    #[test]
    fn chain_detects_retroactive_mutation() {
        let cycle1_root = MerkleTree::build(vec![[1u8; 32], [2u8; 32]]).root();
        let cycle2_root = MerkleTree::build(vec![[3u8; 32]]).root();
        let chained2 = chained_root(Some(&chained_root(None, &cycle1_root)), &cycle2_root);

        // Tamper with cycle 1 (as if a snapshot were deleted and re-hashed).
        let tampered_cycle1_root = MerkleTree::build(vec![[1u8; 32], [9u8; 32]]).root();
        let chained2_recomputed =
            chained_root(Some(&chained_root(None, &tampered_cycle1_root)), &cycle2_root);

        assert_ne!(chained2, chained2_recomputed);
    }
}
