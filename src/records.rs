//! Persisted domain records: tree leaves, attestations, nullifiers, posts
//! and comments.
//!
//! The record store exclusively owns these; the accumulator structures in
//! `tree` are rebuilt from them on demand and never persisted (only cached
//! roots are, for fast-path existence checks).

use serde::{Deserialize, Serialize};

use crate::{hash_fields, Field, TxHash};

/// Opaque content identifier derived from an on-chain event field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub [u8; 32]);

impl ContentId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// One appended global-state-tree leaf. Position in the per-epoch list is
/// the leaf's insertion index; leaves are never edited or removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstLeaf {
    pub transaction_hash: TxHash,
    pub hashed_leaf: Field,
}

/// Cached global-state-tree root, one per leaf insertion.
///
/// Answers "did this root exist at this epoch" without replaying the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstRootRecord {
    pub epoch: u64,
    pub root: Field,
    /// Leaf count at the moment this root was produced, minus one.
    pub leaf_index: u64,
}

/// One sealed epoch-tree leaf: an epoch key and its attestation hashchain.
/// Produced exactly once per epoch, when the epoch ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochTreeLeaf {
    pub epoch_key: u64,
    pub hashchain_result: Field,
}

/// Write-once nullifier membership record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullifierRecord {
    pub value: Field,
    /// Epoch the nullifier was revealed in, when known.
    pub epoch: Option<u64>,
}

/// A reputation delta issued by an attester to an epoch key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub transaction_hash: TxHash,
    pub epoch: u64,
    pub attester_id: u64,
    pub pos_rep: u64,
    pub neg_rep: u64,
    pub graffiti: Field,
    pub overwrite_graffiti: bool,
}

/// Reputation tally folded from an epoch key's ordered attestation list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reputation {
    pub pos_rep: u64,
    pub neg_rep: u64,
    pub graffiti: Field,
}

impl Reputation {
    /// Fold an insertion-ordered attestation list: reputation sums, and
    /// last-overwrite-wins graffiti.
    pub fn tally(attestations: &[Attestation]) -> Self {
        let mut rep = Reputation::default();
        for a in attestations {
            rep.pos_rep = rep.pos_rep.saturating_add(a.pos_rep);
            rep.neg_rep = rep.neg_rep.saturating_add(a.neg_rep);
            if a.overwrite_graffiti {
                rep.graffiti = a.graffiti;
            }
        }
        rep
    }
}

/// Confirmation status of user content. Transitions monotonically from
/// `Pending` (local draft) to `Confirmed` (seen on-chain), never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentStatus {
    Pending,
    Confirmed,
}

/// A post published under an epoch key with a proved minimum reputation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: ContentId,
    pub epoch_key: u64,
    pub content: String,
    /// Public signals of the reputation proof, opaque to this crate.
    pub proof: Vec<Field>,
    pub min_rep: u64,
    pub status: ContentStatus,
    pub transaction_hash: Option<TxHash>,
}

/// A comment nested under a post by id.
///
/// Comments live in a single authoritative store; the parent post's comment
/// list is a view derived on read, indexed by `post_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: ContentId,
    pub post_id: ContentId,
    pub epoch: u64,
    pub epoch_key: u64,
    pub content: String,
    pub proof: Vec<Field>,
    pub min_rep: u64,
    pub status: ContentStatus,
    pub transaction_hash: Option<TxHash>,
}

/// Derive the epoch key for `(identity_nullifier, epoch, nonce)`, reduced
/// into the epoch tree's key domain `[0, 2^depth)`.
///
/// Callers outside this crate derive epoch keys during proof construction;
/// the sync core uses this only to sanity-check recorded keys.
pub fn derive_epoch_key(identity_nullifier: &Field, epoch: u64, nonce: u64, depth: u8) -> u64 {
    let digest = hash_fields(&[
        *identity_nullifier,
        crate::field_from_u64(epoch),
        crate::field_from_u64(nonce),
        crate::ZERO,
        crate::ZERO,
    ]);
    let raw = u64::from_be_bytes(digest[24..].try_into().expect("8-byte slice"));
    if depth >= 64 {
        raw
    } else {
        raw & ((1u64 << depth) - 1)
    }
}
