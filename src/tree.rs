//! Accumulator primitives: the append-only global state tree and the sparse
//! keyed epoch tree.
//!
//! Both are fixed-depth binary Merkle trees over BLAKE3 with domain-separated
//! node hashing. They are ephemeral: reconstruction queries rebuild them from
//! persisted leaves, and only roots are ever cached.
//!
//! The two trees use different default leaves. The global state tree pads
//! with the deployment's `default_gst_leaf` (hash of an empty user state);
//! the epoch tree's default is the `one_leaf` sentinel meaning "epoch key
//! never used", distinct from the `zero_leaf` the historical nullifier tree
//! padded with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{hash_domain, Field, ZERO};

/// Errors from accumulator operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("tree depth {0} exceeds maximum supported depth")]
    DepthTooLarge(u8),
    #[error("tree is full: capacity {0} leaves")]
    TreeFull(u64),
    #[error("leaf index {index} out of range: tree has {count} leaves")]
    IndexOutOfRange { index: u64, count: u64 },
    #[error("epoch key {key} outside domain [0, 2^{depth})")]
    KeyOutOfRange { key: u64, depth: u8 },
}

/// Merge two child hashes into their parent node.
fn merge(left: &Field, right: &Field) -> Field {
    let mut data = [0u8; 64];
    data[..32].copy_from_slice(left);
    data[32..].copy_from_slice(right);
    hash_domain(b"murmur.tree.node", &data)
}

/// The "unused epoch key" sentinel: hash of (1, 0).
pub fn one_leaf() -> Field {
    let mut one = ZERO;
    one[31] = 1;
    merge(&one, &ZERO)
}

/// The empty-slot sentinel of the historical nullifier tree: hash of (0, 0).
pub fn zero_leaf() -> Field {
    merge(&ZERO, &ZERO)
}

/// Root of a depth-`depth` tree whose every leaf is `default_leaf`.
///
/// Used when deriving the default global-state-tree leaf from the empty
/// user state tree.
pub fn empty_tree_root(depth: u8, default_leaf: &Field) -> Field {
    let mut node = *default_leaf;
    for _ in 0..depth {
        node = merge(&node, &node);
    }
    node
}

/// One step of a Merkle authentication path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleNode {
    pub hash: Field,
    /// True if this sibling sits on the left (the current node is the right
    /// child at this level).
    pub is_left: bool,
}

/// Recompute a root from a leaf and its authentication path.
pub fn compute_merkle_root(leaf: &Field, path: &[MerkleNode]) -> Field {
    let mut current = *leaf;
    for node in path {
        current = if node.is_left {
            merge(&node.hash, &current)
        } else {
            merge(&current, &node.hash)
        };
    }
    current
}

/// Precomputed roots of all-default subtrees, one per level.
///
/// `defaults[0]` is the default leaf; `defaults[l]` is the root of a
/// depth-`l` subtree containing only default leaves.
fn default_subtree_hashes(depth: u8, default_leaf: &Field) -> Vec<Field> {
    let mut hashes = Vec::with_capacity(depth as usize + 1);
    hashes.push(*default_leaf);
    for l in 1..=depth as usize {
        let prev = hashes[l - 1];
        hashes.push(merge(&prev, &prev));
    }
    hashes
}

/// Append-only Merkle accumulator: the global state tree.
///
/// Leaves are inserted in event order; the insertion index is the leaf's
/// permanent position, so replaying the same leaves in a different order
/// produces a different root. Unfilled positions read as the default leaf.
#[derive(Clone, Debug)]
pub struct GlobalStateTree {
    depth: u8,
    leaves: Vec<Field>,
    defaults: Vec<Field>,
}

impl GlobalStateTree {
    /// Create an empty tree of the given depth and default leaf.
    pub fn new(depth: u8, default_leaf: &Field) -> Result<Self, TreeError> {
        if depth > crate::constants::MAX_TREE_DEPTH {
            return Err(TreeError::DepthTooLarge(depth));
        }
        Ok(GlobalStateTree {
            depth,
            leaves: Vec::new(),
            defaults: default_subtree_hashes(depth, default_leaf),
        })
    }

    /// Capacity in leaves: 2^depth.
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn leaf_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Append a leaf at the next free index.
    pub fn insert(&mut self, leaf: Field) -> Result<u64, TreeError> {
        if self.leaf_count() == self.capacity() {
            return Err(TreeError::TreeFull(self.capacity()));
        }
        self.leaves.push(leaf);
        Ok(self.leaves.len() as u64 - 1)
    }

    /// Compute every populated level, bottom up. Level 0 is the padded leaf
    /// layer truncated to the occupied prefix; siblings beyond it are
    /// default-subtree hashes.
    fn levels(&self) -> Vec<Vec<Field>> {
        let mut levels = Vec::with_capacity(self.depth as usize + 1);
        let mut current = self.leaves.clone();
        levels.push(current.clone());
        for l in 0..self.depth as usize {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = pair[0];
                let right = if pair.len() == 2 { pair[1] } else { self.defaults[l] };
                next.push(merge(&left, &right));
            }
            levels.push(next.clone());
            current = next;
        }
        levels
    }

    /// The current root.
    pub fn root(&self) -> Field {
        if self.leaves.is_empty() {
            return self.defaults[self.depth as usize];
        }
        let levels = self.levels();
        levels[self.depth as usize]
            .first()
            .copied()
            .unwrap_or(self.defaults[self.depth as usize])
    }

    /// Authentication path for the leaf at `index`.
    ///
    /// Fails with `IndexOutOfRange` when no leaf has been inserted there;
    /// paths for default-padded positions are never needed by callers.
    pub fn path(&self, index: u64) -> Result<Vec<MerkleNode>, TreeError> {
        if index >= self.leaf_count() {
            return Err(TreeError::IndexOutOfRange {
                index,
                count: self.leaf_count(),
            });
        }
        let levels = self.levels();
        let mut path = Vec::with_capacity(self.depth as usize);
        let mut idx = index as usize;
        for (l, level) in levels.iter().enumerate().take(self.depth as usize) {
            let sibling_idx = idx ^ 1;
            let hash = level.get(sibling_idx).copied().unwrap_or(self.defaults[l]);
            path.push(MerkleNode {
                hash,
                is_left: idx % 2 == 1,
            });
            idx /= 2;
        }
        Ok(path)
    }
}

/// Sparse keyed Merkle accumulator: the epoch tree.
///
/// Maps epoch keys in `[0, 2^depth)` to sealed hashchain results. Updates
/// are keyed rather than append-ordered, so replay order does not affect
/// the root, and re-applying an identical (key, value) pair is a no-op.
#[derive(Clone, Debug)]
pub struct EpochTree {
    depth: u8,
    leaves: BTreeMap<u64, Field>,
    defaults: Vec<Field>,
}

impl EpochTree {
    /// Create an empty epoch tree; every key reads as the `one_leaf`
    /// sentinel until updated.
    pub fn new(depth: u8) -> Result<Self, TreeError> {
        if depth > crate::constants::MAX_TREE_DEPTH {
            return Err(TreeError::DepthTooLarge(depth));
        }
        Ok(EpochTree {
            depth,
            leaves: BTreeMap::new(),
            defaults: default_subtree_hashes(depth, &one_leaf()),
        })
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    fn key_limit(&self) -> u64 {
        (1u64 << self.depth) - 1
    }

    /// Point-write `value` at `key`.
    pub fn update(&mut self, key: u64, value: Field) -> Result<(), TreeError> {
        if key > self.key_limit() {
            return Err(TreeError::KeyOutOfRange {
                key,
                depth: self.depth,
            });
        }
        self.leaves.insert(key, value);
        Ok(())
    }

    /// Root of the subtree at `level` whose leaves span
    /// `[prefix << level, (prefix + 1) << level)`.
    fn subtree_root(&self, level: u8, prefix: u64) -> Field {
        let span_start = prefix << level;
        let span_end = span_start + ((1u64 << level) - 1);
        let mut range = self.leaves.range(span_start..=span_end);
        if level == 0 {
            return match range.next() {
                Some((_, value)) => *value,
                None => self.defaults[0],
            };
        }
        if range.next().is_none() {
            return self.defaults[level as usize];
        }
        let left = self.subtree_root(level - 1, prefix << 1);
        let right = self.subtree_root(level - 1, (prefix << 1) | 1);
        merge(&left, &right)
    }

    /// The current root.
    pub fn root(&self) -> Field {
        self.subtree_root(self.depth, 0)
    }

    /// Authentication path for `key`, usable whether or not the key has been
    /// written (non-membership paths prove the default sentinel).
    pub fn path(&self, key: u64) -> Result<Vec<MerkleNode>, TreeError> {
        if key > self.key_limit() {
            return Err(TreeError::KeyOutOfRange {
                key,
                depth: self.depth,
            });
        }
        let mut path = Vec::with_capacity(self.depth as usize);
        for level in 0..self.depth {
            let prefix = key >> level;
            let sibling_prefix = prefix ^ 1;
            path.push(MerkleNode {
                hash: self.subtree_root(level, sibling_prefix),
                is_left: prefix & 1 == 1,
            });
        }
        Ok(path)
    }

    /// Value currently at `key`, defaulting to the unused sentinel.
    pub fn leaf(&self, key: u64) -> Field {
        self.leaves.get(&key).copied().unwrap_or(self.defaults[0])
    }
}
