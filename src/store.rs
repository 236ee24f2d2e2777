//! Persistent record store.
//!
//! Provides a `Store` trait and a sled-backed implementation for the
//! collections the ingestion pipeline folds events into: settings, tree
//! leaves, cached roots, nullifiers, attestations, posts and comments.
//!
//! Composite keys are big-endian so sled's lexicographic order matches
//! numeric order; per-epoch leaf lists iterate back in insertion order.

use serde::{Deserialize, Serialize};

use crate::records::{
    Attestation, Comment, ContentId, ContentStatus, EpochTreeLeaf, GstLeaf, GstRootRecord,
    NullifierRecord, Post,
};
use crate::settings::Settings;
use crate::{Field, TxHash};

/// Errors from storage operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Stored nullifier payload: the revealing epoch, when known.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct NullifierMeta {
    epoch: Option<u64>,
}

/// Trait for the record store backing ingestion and reconstruction.
///
/// One writer (the ingestion pipeline) at a time, many readers.
pub trait Store {
    /// Persist the settings singleton. Returns false (and leaves the store
    /// untouched) if a record already exists — settings are immutable.
    fn put_settings(&self, settings: &Settings) -> Result<bool, StoreError>;
    fn get_settings(&self) -> Result<Option<Settings>, StoreError>;

    /// Create an epoch's (empty) leaf collection if it does not exist.
    fn init_gst_epoch(&self, epoch: u64) -> Result<(), StoreError>;
    /// Append a leaf to an epoch's ordered list, creating the collection on
    /// first use. Returns the insertion index.
    fn append_gst_leaf(&self, epoch: u64, leaf: &GstLeaf) -> Result<u64, StoreError>;
    /// Ordered leaves for an epoch; empty if the epoch is unknown.
    fn gst_leaves(&self, epoch: u64) -> Result<Vec<GstLeaf>, StoreError>;
    fn gst_leaf_count(&self, epoch: u64) -> Result<u64, StoreError>;

    fn put_gst_root(&self, record: &GstRootRecord) -> Result<(), StoreError>;
    fn gst_root_exists(&self, epoch: u64, root: &Field) -> Result<bool, StoreError>;

    /// Persist an ended epoch's sealed leaves and epoch-tree root. The seal
    /// is write-once: returns false if the epoch was already sealed.
    fn put_epoch_seal(
        &self,
        epoch: u64,
        leaves: &[EpochTreeLeaf],
        root: &Field,
    ) -> Result<bool, StoreError>;
    /// Sealed leaves for an epoch, keyed by epoch key; empty if unsealed.
    fn epoch_tree_leaves(&self, epoch: u64) -> Result<Vec<EpochTreeLeaf>, StoreError>;
    fn epoch_tree_root_exists(&self, epoch: u64, root: &Field) -> Result<bool, StoreError>;

    fn put_nullifier(&self, record: &NullifierRecord) -> Result<(), StoreError>;
    /// Existence check, globally (`epoch = None`) or epoch-scoped.
    fn nullifier_exists(&self, value: &Field, epoch: Option<u64>) -> Result<bool, StoreError>;

    /// Append to an epoch key's ordered attestation list.
    fn append_attestation(&self, epoch_key: u64, attestation: &Attestation)
        -> Result<(), StoreError>;
    /// Ordered attestations for an epoch key; empty if none recorded.
    fn attestations(&self, epoch_key: u64) -> Result<Vec<Attestation>, StoreError>;

    fn put_post(&self, post: &Post) -> Result<(), StoreError>;
    fn get_post(&self, id: &ContentId) -> Result<Option<Post>, StoreError>;
    /// Flip a post to confirmed and attach its transaction hash. Content and
    /// proof material are untouched. Returns false if the post is unknown.
    fn confirm_post(&self, id: &ContentId, tx: &TxHash) -> Result<bool, StoreError>;

    fn put_comment(&self, comment: &Comment) -> Result<(), StoreError>;
    fn get_comment(&self, id: &ContentId) -> Result<Option<Comment>, StoreError>;
    fn confirm_comment(&self, id: &ContentId, tx: &TxHash) -> Result<bool, StoreError>;
    /// Derived view: all comments whose parent is `post_id`, ordered by
    /// comment id. Comments are stored once; this is an index lookup, not a
    /// second copy.
    fn comments_for_post(&self, post_id: &ContentId) -> Result<Vec<Comment>, StoreError>;

    /// Persist the last block folded into the store, so a restarting poller
    /// can recover its watermark.
    fn put_checkpoint(&self, block: u64) -> Result<(), StoreError>;
    fn get_checkpoint(&self) -> Result<Option<u64>, StoreError>;

    fn flush(&self) -> Result<(), StoreError>;
}

/// Sled-backed store.
pub struct SledStore {
    db: sled::Db,
    settings: sled::Tree,
    gst_meta: sled::Tree,
    gst_leaves: sled::Tree,
    gst_roots: sled::Tree,
    epoch_leaves: sled::Tree,
    epoch_roots: sled::Tree,
    nullifiers: sled::Tree,
    attestations: sled::Tree,
    attestation_meta: sled::Tree,
    posts: sled::Tree,
    comments: sled::Tree,
    comment_index: sled::Tree,
    meta: sled::Tree,
}

impl SledStore {
    /// Open or create a sled database at the given path.
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::Io(e.to_string()))?;
        Self::from_db(db)
    }

    /// Open a temporary in-memory sled database (for testing).
    pub fn open_temporary() -> Result<Self, StoreError> {
        let config = sled::Config::new().temporary(true);
        let db = config.open().map_err(|e| StoreError::Io(e.to_string()))?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let open = |name: &str| {
            db.open_tree(name)
                .map_err(|e| StoreError::Io(e.to_string()))
        };
        Ok(SledStore {
            settings: open("settings")?,
            gst_meta: open("gst_meta")?,
            gst_leaves: open("gst_leaves")?,
            gst_roots: open("gst_roots")?,
            epoch_leaves: open("epoch_leaves")?,
            epoch_roots: open("epoch_roots")?,
            nullifiers: open("nullifiers")?,
            attestations: open("attestations")?,
            attestation_meta: open("attestation_meta")?,
            posts: open("posts")?,
            comments: open("comments")?,
            comment_index: open("comment_index")?,
            meta: open("meta")?,
            db,
        })
    }
}

fn epoch_index_key(epoch: u64, index: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&epoch.to_be_bytes());
    key[8..].copy_from_slice(&index.to_be_bytes());
    key
}

fn epoch_field_key(epoch: u64, field: &Field) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..8].copy_from_slice(&epoch.to_be_bytes());
    key[8..].copy_from_slice(field);
    key
}

fn id_pair_key(a: &ContentId, b: &ContentId) -> [u8; 64] {
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(a.as_bytes());
    key[32..].copy_from_slice(b.as_bytes());
    key
}

impl Store for SledStore {
    fn put_settings(&self, settings: &Settings) -> Result<bool, StoreError> {
        let value =
            crate::serialize(settings).map_err(|e| StoreError::Serialization(e.to_string()))?;
        // compare_and_swap keeps the first record authoritative.
        let swapped = self
            .settings
            .compare_and_swap(b"singleton", None as Option<&[u8]>, Some(value))
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(swapped.is_ok())
    }

    fn get_settings(&self) -> Result<Option<Settings>, StoreError> {
        match self
            .settings
            .get(b"singleton")
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(bytes) => {
                let settings = crate::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(settings))
            }
            None => Ok(None),
        }
    }

    fn init_gst_epoch(&self, epoch: u64) -> Result<(), StoreError> {
        let _ = self
            .gst_meta
            .compare_and_swap(
                epoch.to_be_bytes(),
                None as Option<&[u8]>,
                Some(&0u64.to_be_bytes()[..]),
            )
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn append_gst_leaf(&self, epoch: u64, leaf: &GstLeaf) -> Result<u64, StoreError> {
        let index = self.gst_leaf_count(epoch)?;
        let value = crate::serialize(leaf).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.gst_leaves
            .insert(epoch_index_key(epoch, index), value)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.gst_meta
            .insert(epoch.to_be_bytes(), &(index + 1).to_be_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(index)
    }

    fn gst_leaves(&self, epoch: u64) -> Result<Vec<GstLeaf>, StoreError> {
        let mut leaves = Vec::new();
        for entry in self.gst_leaves.scan_prefix(epoch.to_be_bytes()) {
            let (_, value) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            let leaf: GstLeaf = crate::deserialize(&value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            leaves.push(leaf);
        }
        Ok(leaves)
    }

    fn gst_leaf_count(&self, epoch: u64) -> Result<u64, StoreError> {
        match self
            .gst_meta
            .get(epoch.to_be_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(bytes) => {
                let count = u64::from_be_bytes(
                    bytes
                        .as_ref()
                        .try_into()
                        .map_err(|_| StoreError::Serialization("bad leaf count".into()))?,
                );
                Ok(count)
            }
            None => Ok(0),
        }
    }

    fn put_gst_root(&self, record: &GstRootRecord) -> Result<(), StoreError> {
        self.gst_roots
            .insert(
                epoch_field_key(record.epoch, &record.root),
                &record.leaf_index.to_be_bytes(),
            )
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn gst_root_exists(&self, epoch: u64, root: &Field) -> Result<bool, StoreError> {
        self.gst_roots
            .contains_key(epoch_field_key(epoch, root))
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    fn put_epoch_seal(
        &self,
        epoch: u64,
        leaves: &[EpochTreeLeaf],
        root: &Field,
    ) -> Result<bool, StoreError> {
        // Leaves go in before the root. A crash mid-seal then leaves the
        // epoch unsealed, and redelivery rewrites the same keys; a root
        // without its leaves would be unrecoverable.
        for leaf in leaves {
            self.epoch_leaves
                .insert(
                    epoch_index_key(epoch, leaf.epoch_key),
                    &leaf.hashchain_result[..],
                )
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }
        let sealed = self
            .epoch_roots
            .compare_and_swap(epoch.to_be_bytes(), None as Option<&[u8]>, Some(&root[..]))
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(sealed.is_ok())
    }

    fn epoch_tree_leaves(&self, epoch: u64) -> Result<Vec<EpochTreeLeaf>, StoreError> {
        let mut leaves = Vec::new();
        for entry in self.epoch_leaves.scan_prefix(epoch.to_be_bytes()) {
            let (key, value) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            let epoch_key = u64::from_be_bytes(
                key.as_ref()[8..]
                    .try_into()
                    .map_err(|_| StoreError::Serialization("bad epoch key".into()))?,
            );
            let hashchain_result: Field = value
                .as_ref()
                .try_into()
                .map_err(|_| StoreError::Serialization("bad hashchain length".into()))?;
            leaves.push(EpochTreeLeaf {
                epoch_key,
                hashchain_result,
            });
        }
        Ok(leaves)
    }

    fn epoch_tree_root_exists(&self, epoch: u64, root: &Field) -> Result<bool, StoreError> {
        match self
            .epoch_roots
            .get(epoch.to_be_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(bytes) => Ok(bytes.as_ref() == root),
            None => Ok(false),
        }
    }

    fn put_nullifier(&self, record: &NullifierRecord) -> Result<(), StoreError> {
        let meta = NullifierMeta {
            epoch: record.epoch,
        };
        let value = crate::serialize(&meta).map_err(|e| StoreError::Serialization(e.to_string()))?;
        // Write-once: the first reveal's epoch sticks.
        let _ = self
            .nullifiers
            .compare_and_swap(record.value, None as Option<&[u8]>, Some(value))
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn nullifier_exists(&self, value: &Field, epoch: Option<u64>) -> Result<bool, StoreError> {
        match self
            .nullifiers
            .get(value)
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(bytes) => {
                let meta: NullifierMeta = crate::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                match epoch {
                    None => Ok(true),
                    // Records revealed without a known epoch match any scope.
                    Some(e) => Ok(meta.epoch.is_none() || meta.epoch == Some(e)),
                }
            }
            None => Ok(false),
        }
    }

    fn append_attestation(
        &self,
        epoch_key: u64,
        attestation: &Attestation,
    ) -> Result<(), StoreError> {
        let index = match self
            .attestation_meta
            .get(epoch_key.to_be_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(bytes) => u64::from_be_bytes(
                bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Serialization("bad attestation count".into()))?,
            ),
            None => 0,
        };
        let value =
            crate::serialize(attestation).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.attestations
            .insert(epoch_index_key(epoch_key, index), value)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.attestation_meta
            .insert(epoch_key.to_be_bytes(), &(index + 1).to_be_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn attestations(&self, epoch_key: u64) -> Result<Vec<Attestation>, StoreError> {
        let mut list = Vec::new();
        for entry in self.attestations.scan_prefix(epoch_key.to_be_bytes()) {
            let (_, value) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            let attestation: Attestation = crate::deserialize(&value)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            list.push(attestation);
        }
        Ok(list)
    }

    fn put_post(&self, post: &Post) -> Result<(), StoreError> {
        let value = crate::serialize(post).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.posts
            .insert(post.id.as_bytes(), value)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn get_post(&self, id: &ContentId) -> Result<Option<Post>, StoreError> {
        match self
            .posts
            .get(id.as_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(bytes) => {
                let post = crate::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    fn confirm_post(&self, id: &ContentId, tx: &TxHash) -> Result<bool, StoreError> {
        match self.get_post(id)? {
            Some(mut post) => {
                post.status = ContentStatus::Confirmed;
                post.transaction_hash = Some(*tx);
                self.put_post(&post)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn put_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let value =
            crate::serialize(comment).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.comments
            .insert(comment.id.as_bytes(), value)
            .map_err(|e| StoreError::Io(e.to_string()))?;
        self.comment_index
            .insert(id_pair_key(&comment.post_id, &comment.id), &[])
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn get_comment(&self, id: &ContentId) -> Result<Option<Comment>, StoreError> {
        match self
            .comments
            .get(id.as_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(bytes) => {
                let comment = crate::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(comment))
            }
            None => Ok(None),
        }
    }

    fn confirm_comment(&self, id: &ContentId, tx: &TxHash) -> Result<bool, StoreError> {
        match self.get_comment(id)? {
            Some(mut comment) => {
                comment.status = ContentStatus::Confirmed;
                comment.transaction_hash = Some(*tx);
                self.put_comment(&comment)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn comments_for_post(&self, post_id: &ContentId) -> Result<Vec<Comment>, StoreError> {
        let mut comments = Vec::new();
        for entry in self.comment_index.scan_prefix(post_id.as_bytes()) {
            let (key, _) = entry.map_err(|e| StoreError::Io(e.to_string()))?;
            let comment_id = ContentId(
                key.as_ref()[32..]
                    .try_into()
                    .map_err(|_| StoreError::Serialization("bad comment index key".into()))?,
            );
            if let Some(comment) = self.get_comment(&comment_id)? {
                comments.push(comment);
            }
        }
        Ok(comments)
    }

    fn put_checkpoint(&self, block: u64) -> Result<(), StoreError> {
        self.meta
            .insert(b"checkpoint", &block.to_be_bytes())
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    fn get_checkpoint(&self) -> Result<Option<u64>, StoreError> {
        match self
            .meta
            .get(b"checkpoint")
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            Some(bytes) => {
                let block = u64::from_be_bytes(
                    bytes
                        .as_ref()
                        .try_into()
                        .map_err(|_| StoreError::Serialization("bad checkpoint".into()))?,
                );
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_from_u64;

    fn temp_store() -> SledStore {
        SledStore::open_temporary().unwrap()
    }

    fn test_leaf(n: u64) -> GstLeaf {
        GstLeaf {
            transaction_hash: [n as u8; 32],
            hashed_leaf: field_from_u64(n),
        }
    }

    fn test_post(id: u8) -> Post {
        Post {
            id: ContentId([id; 32]),
            epoch_key: 5,
            content: "hello".into(),
            proof: vec![field_from_u64(1)],
            min_rep: 10,
            status: ContentStatus::Pending,
            transaction_hash: None,
        }
    }

    fn test_comment(id: u8, post: u8) -> Comment {
        Comment {
            id: ContentId([id; 32]),
            post_id: ContentId([post; 32]),
            epoch: 1,
            epoch_key: 6,
            content: "reply".into(),
            proof: vec![],
            min_rep: 3,
            status: ContentStatus::Pending,
            transaction_hash: None,
        }
    }

    #[test]
    fn gst_leaves_append_in_order() {
        let store = temp_store();
        assert!(store.gst_leaves(3).unwrap().is_empty());

        assert_eq!(store.append_gst_leaf(3, &test_leaf(1)).unwrap(), 0);
        assert_eq!(store.append_gst_leaf(3, &test_leaf(2)).unwrap(), 1);
        assert_eq!(store.append_gst_leaf(3, &test_leaf(3)).unwrap(), 2);

        let leaves = store.gst_leaves(3).unwrap();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0], test_leaf(1));
        assert_eq!(leaves[2], test_leaf(3));
        assert_eq!(store.gst_leaf_count(3).unwrap(), 3);
        // Other epochs untouched.
        assert_eq!(store.gst_leaf_count(4).unwrap(), 0);
    }

    #[test]
    fn init_gst_epoch_idempotent() {
        let store = temp_store();
        store.init_gst_epoch(2).unwrap();
        store.append_gst_leaf(2, &test_leaf(1)).unwrap();
        // Re-init must not reset the count.
        store.init_gst_epoch(2).unwrap();
        assert_eq!(store.gst_leaf_count(2).unwrap(), 1);
    }

    #[test]
    fn gst_root_membership() {
        let store = temp_store();
        let root = field_from_u64(77);
        assert!(!store.gst_root_exists(1, &root).unwrap());
        store
            .put_gst_root(&GstRootRecord {
                epoch: 1,
                root,
                leaf_index: 0,
            })
            .unwrap();
        assert!(store.gst_root_exists(1, &root).unwrap());
        // Scoped to the epoch.
        assert!(!store.gst_root_exists(2, &root).unwrap());
    }

    #[test]
    fn epoch_seal_write_once() {
        let store = temp_store();
        let leaves = vec![
            EpochTreeLeaf {
                epoch_key: 5,
                hashchain_result: field_from_u64(50),
            },
            EpochTreeLeaf {
                epoch_key: 2,
                hashchain_result: field_from_u64(20),
            },
        ];
        let root = field_from_u64(99);

        assert!(store.put_epoch_seal(1, &leaves, &root).unwrap());
        assert!(!store.put_epoch_seal(1, &leaves, &root).unwrap());

        let stored = store.epoch_tree_leaves(1).unwrap();
        // Keyed storage returns epoch-key order.
        assert_eq!(stored[0].epoch_key, 2);
        assert_eq!(stored[1].epoch_key, 5);
        assert!(store.epoch_tree_root_exists(1, &root).unwrap());
        assert!(!store
            .epoch_tree_root_exists(1, &field_from_u64(98))
            .unwrap());
        assert!(!store.epoch_tree_root_exists(2, &root).unwrap());
    }

    #[test]
    fn epoch_seal_completes_after_interrupted_attempt() {
        let store = temp_store();
        let leaves = vec![EpochTreeLeaf {
            epoch_key: 5,
            hashchain_result: field_from_u64(50),
        }];
        let root = field_from_u64(99);

        // A sealing attempt that died after the leaf writes: leaves are
        // present, the root is not, so the epoch still counts as unsealed.
        store
            .epoch_leaves
            .insert(epoch_index_key(1, 5), &field_from_u64(50)[..])
            .unwrap();
        assert!(!store.epoch_tree_root_exists(1, &root).unwrap());

        // Redelivery completes the seal.
        assert!(store.put_epoch_seal(1, &leaves, &root).unwrap());
        assert_eq!(store.epoch_tree_leaves(1).unwrap(), leaves);
        assert!(store.epoch_tree_root_exists(1, &root).unwrap());
    }

    #[test]
    fn nullifier_scoping() {
        let store = temp_store();
        let value = field_from_u64(1234);
        assert!(!store.nullifier_exists(&value, None).unwrap());

        store
            .put_nullifier(&NullifierRecord {
                value,
                epoch: Some(3),
            })
            .unwrap();
        assert!(store.nullifier_exists(&value, None).unwrap());
        assert!(store.nullifier_exists(&value, Some(3)).unwrap());
        assert!(!store.nullifier_exists(&value, Some(4)).unwrap());
    }

    #[test]
    fn nullifier_first_reveal_sticks() {
        let store = temp_store();
        let value = field_from_u64(7);
        store
            .put_nullifier(&NullifierRecord {
                value,
                epoch: Some(1),
            })
            .unwrap();
        store
            .put_nullifier(&NullifierRecord {
                value,
                epoch: Some(9),
            })
            .unwrap();
        assert!(store.nullifier_exists(&value, Some(1)).unwrap());
        assert!(!store.nullifier_exists(&value, Some(9)).unwrap());
    }

    #[test]
    fn attestations_ordered_per_epoch_key() {
        let store = temp_store();
        let a1 = Attestation {
            transaction_hash: [1u8; 32],
            epoch: 3,
            attester_id: 1,
            pos_rep: 10,
            neg_rep: 2,
            graffiti: crate::ZERO,
            overwrite_graffiti: false,
        };
        let mut a2 = a1.clone();
        a2.transaction_hash = [2u8; 32];
        a2.pos_rep = 5;

        store.append_attestation(5, &a1).unwrap();
        store.append_attestation(5, &a2).unwrap();
        store.append_attestation(6, &a1).unwrap();

        let list = store.attestations(5).unwrap();
        assert_eq!(list, vec![a1.clone(), a2]);
        assert_eq!(store.attestations(6).unwrap(), vec![a1]);
        assert!(store.attestations(7).unwrap().is_empty());
    }

    #[test]
    fn attestation_index_survives_interleaved_appends() {
        let store = temp_store();
        let a = Attestation {
            transaction_hash: [1u8; 32],
            epoch: 3,
            attester_id: 1,
            pos_rep: 1,
            neg_rep: 0,
            graffiti: crate::ZERO,
            overwrite_graffiti: false,
        };
        for i in 0..5u8 {
            let mut next = a.clone();
            next.transaction_hash = [i; 32];
            // Interleave a second key so its counter cannot leak into the
            // first key's indexes.
            store.append_attestation(5, &next).unwrap();
            store.append_attestation(6, &next).unwrap();
        }
        let list = store.attestations(5).unwrap();
        assert_eq!(list.len(), 5);
        for (i, got) in list.iter().enumerate() {
            assert_eq!(got.transaction_hash, [i as u8; 32]);
        }
        assert_eq!(store.attestations(6).unwrap().len(), 5);
    }

    #[test]
    fn post_confirm_preserves_content() {
        let store = temp_store();
        let post = test_post(1);
        store.put_post(&post).unwrap();

        assert!(store.confirm_post(&post.id, &[9u8; 32]).unwrap());
        let confirmed = store.get_post(&post.id).unwrap().unwrap();
        assert_eq!(confirmed.status, ContentStatus::Confirmed);
        assert_eq!(confirmed.transaction_hash, Some([9u8; 32]));
        assert_eq!(confirmed.content, post.content);
        assert_eq!(confirmed.proof, post.proof);
    }

    #[test]
    fn confirm_unknown_post_reports_absence() {
        let store = temp_store();
        assert!(!store.confirm_post(&ContentId([1u8; 32]), &[0u8; 32]).unwrap());
    }

    #[test]
    fn comments_indexed_by_parent() {
        let store = temp_store();
        store.put_comment(&test_comment(10, 1)).unwrap();
        store.put_comment(&test_comment(11, 1)).unwrap();
        store.put_comment(&test_comment(12, 2)).unwrap();

        let for_post1 = store.comments_for_post(&ContentId([1u8; 32])).unwrap();
        assert_eq!(for_post1.len(), 2);
        assert!(for_post1.iter().all(|c| c.post_id == ContentId([1u8; 32])));
        assert_eq!(
            store.comments_for_post(&ContentId([2u8; 32])).unwrap().len(),
            1
        );
        assert!(store
            .comments_for_post(&ContentId([3u8; 32]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn comment_confirm_visible_through_view() {
        let store = temp_store();
        let comment = test_comment(10, 1);
        store.put_comment(&comment).unwrap();
        assert!(store.confirm_comment(&comment.id, &[8u8; 32]).unwrap());

        let viewed = store.comments_for_post(&ContentId([1u8; 32])).unwrap();
        assert_eq!(viewed[0].status, ContentStatus::Confirmed);
        assert_eq!(viewed[0].transaction_hash, Some([8u8; 32]));
    }

    #[test]
    fn checkpoint_roundtrip() {
        let store = temp_store();
        assert_eq!(store.get_checkpoint().unwrap(), None);
        store.put_checkpoint(42).unwrap();
        assert_eq!(store.get_checkpoint().unwrap(), Some(42));
        store.flush().unwrap();
    }
}
