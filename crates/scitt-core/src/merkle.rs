//! Binary SHA-256 Merkle tree over ledger leaves.
//!
//! Interior nodes are `SHA256(left || right)`. An odd node at the end of a
//! level is promoted unchanged, so its proof simply has no step for that
//! level.

use serde::{Deserialize, Serialize};

use crate::types::Sha256Hash;

/// Side of a sibling in a Merkle proof path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Path of (sibling hash, sibling side) pairs from leaf to root.
pub type MerklePath = Vec<(Sha256Hash, Side)>;

#[derive(Clone, Debug, Default)]
pub struct MerkleTree {
    /// Level 0 = leaves, last level = root.
    levels: Vec<Vec<Sha256Hash>>,
}

impl MerkleTree {
    pub fn from_leaves(leaves: Vec<Sha256Hash>) -> Self {
        if leaves.is_empty() {
            return Self { levels: vec![] };
        }

        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let current = &levels[levels.len() - 1];
            let next = current
                .chunks(2)
                .map(|pair| match pair.get(1) {
                    Some(right) => hash_pair(&pair[0], right),
                    None => pair[0],
                })
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    /// Root hash, or zero for an empty tree.
    pub fn root(&self) -> Sha256Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Sha256Hash::ZERO)
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// Inclusion path for the leaf at `index`.
    pub fn proof(&self, index: usize) -> Option<MerklePath> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling_idx = idx ^ 1;
            if sibling_idx < level.len() {
                let side = if idx % 2 == 0 { Side::Right } else { Side::Left };
                path.push((level[sibling_idx], side));
            }
            idx /= 2;
        }
        Some(path)
    }
}

/// Recompute the root from a leaf hash and its path.
pub fn compute_root(leaf: Sha256Hash, path: &[(Sha256Hash, Side)]) -> Sha256Hash {
    path.iter().fold(leaf, |current, (sibling, side)| match side {
        Side::Left => hash_pair(sibling, &current),
        Side::Right => hash_pair(&current, sibling),
    })
}

fn hash_pair(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    Sha256Hash::hash_parts(&[&left.0[..], &right.0[..]])
}
