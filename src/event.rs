//! Event ingestion pipeline.
//!
//! The contract-interaction layer polls the chain's event log in ascending
//! block order and hands each decoded event to `EventPipeline::apply_event`,
//! which folds it into the record store. Apply is strictly sequential: later
//! handlers (a comment attaching to its post) depend on earlier handlers
//! having committed.
//!
//! Duplicate suppression is a single `start_block` watermark: events at or
//! below the last folded block are silently skipped. The caller resumes from
//! a consistent checkpoint and re-delivers at most a bounded tail, never
//! replaying past the watermark. This is deliberately weaker than per-event
//! dedup keys; see DESIGN.md before changing it.

use std::collections::HashMap;

use crate::contract::{ContractError, ContractSource};
use crate::records::{
    Attestation, Comment, ContentId, ContentStatus, GstLeaf, GstRootRecord, NullifierRecord, Post,
};
use crate::settings::{Settings, SettingsError};
use crate::store::{Store, StoreError};
use crate::tree::{EpochTree, GlobalStateTree, TreeError};
use crate::{Field, TxHash};

/// Errors from folding an event into the store.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// A decoded event from the Murmur contract log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainEvent {
    pub block_number: u64,
    pub transaction_hash: TxHash,
    pub kind: EventKind,
}

/// The closed set of event kinds this core folds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    GstLeafInserted {
        epoch: u64,
        hashed_leaf: Field,
    },
    AttestationSubmitted {
        epoch: u64,
        epoch_key: u64,
        attester_id: u64,
        pos_rep: u64,
        neg_rep: u64,
        graffiti: Field,
        overwrite_graffiti: bool,
    },
    PostSubmitted {
        post_id: ContentId,
        epoch_key: u64,
        content: String,
        proof: Vec<Field>,
        min_rep: u64,
    },
    CommentSubmitted {
        comment_id: ContentId,
        post_id: ContentId,
        epoch: u64,
        epoch_key: u64,
        content: String,
        proof: Vec<Field>,
        min_rep: u64,
    },
    EpochEnded {
        epoch: u64,
    },
}

/// Folds the contract event log into the record store.
///
/// Owns the single-writer side of the store. Keeps an in-memory incremental
/// global state tree per epoch so each leaf insertion records its cached
/// root without replaying the whole epoch.
pub struct EventPipeline<S, C> {
    settings: Settings,
    store: S,
    contract: C,
    gst_cache: HashMap<u64, GlobalStateTree>,
}

impl<S: Store, C: ContractSource> EventPipeline<S, C> {
    /// Create a pipeline, initializing settings from the store or the
    /// contract (first run).
    pub fn new(store: S, contract: C) -> Result<Self, SettingsError> {
        let settings = Settings::init(&store, &contract)?;
        Ok(EventPipeline {
            settings,
            store,
            contract,
            gst_cache: HashMap::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The block to resume polling from: the persisted checkpoint, or 0 on
    /// a fresh store.
    pub fn resume_block(&self) -> Result<u64, StoreError> {
        Ok(self.store.get_checkpoint()?.unwrap_or(0))
    }

    /// Fold one event. Events at or below `start_block` have already been
    /// folded and are skipped without touching the store.
    pub fn apply_event(&mut self, event: &ChainEvent, start_block: u64) -> Result<(), IngestError> {
        if event.block_number <= start_block {
            tracing::debug!(
                block = event.block_number,
                start_block,
                "skipping already-processed event"
            );
            return Ok(());
        }

        match &event.kind {
            EventKind::GstLeafInserted { epoch, hashed_leaf } => {
                self.on_gst_leaf(*epoch, hashed_leaf, &event.transaction_hash)?;
            }
            EventKind::AttestationSubmitted {
                epoch,
                epoch_key,
                attester_id,
                pos_rep,
                neg_rep,
                graffiti,
                overwrite_graffiti,
            } => {
                self.on_attestation(
                    *epoch_key,
                    Attestation {
                        transaction_hash: event.transaction_hash,
                        epoch: *epoch,
                        attester_id: *attester_id,
                        pos_rep: *pos_rep,
                        neg_rep: *neg_rep,
                        graffiti: *graffiti,
                        overwrite_graffiti: *overwrite_graffiti,
                    },
                )?;
            }
            EventKind::PostSubmitted {
                post_id,
                epoch_key,
                content,
                proof,
                min_rep,
            } => {
                self.on_post(
                    post_id,
                    *epoch_key,
                    content,
                    proof,
                    *min_rep,
                    &event.transaction_hash,
                )?;
            }
            EventKind::CommentSubmitted {
                comment_id,
                post_id,
                epoch,
                epoch_key,
                content,
                proof,
                min_rep,
            } => {
                self.on_comment(
                    comment_id,
                    post_id,
                    *epoch,
                    *epoch_key,
                    content,
                    proof,
                    *min_rep,
                    &event.transaction_hash,
                )?;
            }
            EventKind::EpochEnded { epoch } => {
                self.on_epoch_ended(*epoch)?;
            }
        }

        self.store.put_checkpoint(event.block_number)?;
        Ok(())
    }

    /// Record a revealed nullifier. Nullifiers arrive as proof public
    /// signals through the contract-interaction glue, not as a distinct
    /// event kind.
    pub fn record_nullifier(&self, epoch: Option<u64>, value: Field) -> Result<(), IngestError> {
        self.store.put_nullifier(&NullifierRecord { value, epoch })?;
        Ok(())
    }

    /// The epoch's incremental tree, rebuilt from persisted leaves on first
    /// touch after a restart.
    fn gst_tree(&mut self, epoch: u64) -> Result<&mut GlobalStateTree, IngestError> {
        if !self.gst_cache.contains_key(&epoch) {
            let mut tree = GlobalStateTree::new(
                self.settings.tree_depths.global_state_tree,
                &self.settings.default_gst_leaf,
            )?;
            for leaf in self.store.gst_leaves(epoch)? {
                tree.insert(leaf.hashed_leaf)?;
            }
            self.gst_cache.insert(epoch, tree);
        }
        Ok(self.gst_cache.get_mut(&epoch).expect("just inserted"))
    }

    fn on_gst_leaf(
        &mut self,
        epoch: u64,
        hashed_leaf: &Field,
        tx: &TxHash,
    ) -> Result<(), IngestError> {
        let leaf = *hashed_leaf;
        let tree = self.gst_tree(epoch)?;
        let leaf_index = tree.insert(leaf)?;
        let root = tree.root();

        if let Err(e) = self.persist_gst_leaf(epoch, leaf, *tx, leaf_index, root) {
            // The cached tree is now ahead of the store. Drop it so the
            // redelivered event rebuilds from persisted leaves instead of
            // inserting into a tree that counted the failed attempt.
            self.gst_cache.remove(&epoch);
            return Err(e);
        }
        tracing::info!(epoch, leaf_index, "appended global state tree leaf");
        Ok(())
    }

    fn persist_gst_leaf(
        &self,
        epoch: u64,
        hashed_leaf: Field,
        transaction_hash: TxHash,
        leaf_index: u64,
        root: Field,
    ) -> Result<(), IngestError> {
        let stored_index = self.store.append_gst_leaf(
            epoch,
            &GstLeaf {
                transaction_hash,
                hashed_leaf,
            },
        )?;
        debug_assert_eq!(leaf_index, stored_index);
        self.store.put_gst_root(&GstRootRecord {
            epoch,
            root,
            leaf_index,
        })?;
        Ok(())
    }

    fn on_attestation(&mut self, epoch_key: u64, attestation: Attestation) -> Result<(), IngestError> {
        let depth = self.settings.tree_depths.epoch_tree;
        if depth < 64 && epoch_key >= 1u64 << depth {
            // The contract enforces the key domain; a key outside it means a
            // decoding bug upstream. Record it anyway so nothing is lost.
            tracing::warn!(epoch_key, depth, "attestation epoch key outside tree domain");
        }
        self.store.append_attestation(epoch_key, &attestation)?;
        tracing::info!(
            epoch = attestation.epoch,
            epoch_key,
            attester = attestation.attester_id,
            "recorded attestation"
        );
        Ok(())
    }

    fn on_post(
        &mut self,
        post_id: &ContentId,
        epoch_key: u64,
        content: &str,
        proof: &[Field],
        min_rep: u64,
        tx: &TxHash,
    ) -> Result<(), IngestError> {
        if self.store.confirm_post(post_id, tx)? {
            // A locally drafted post: only status and tx hash change; the
            // event does not carry content the draft doesn't already have.
            tracing::info!(post = %post_id, "confirmed drafted post");
            return Ok(());
        }
        self.store.put_post(&Post {
            id: *post_id,
            epoch_key,
            content: content.to_owned(),
            proof: proof.to_vec(),
            min_rep,
            status: ContentStatus::Confirmed,
            transaction_hash: Some(*tx),
        })?;
        tracing::info!(post = %post_id, "recorded on-chain post");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn on_comment(
        &mut self,
        comment_id: &ContentId,
        post_id: &ContentId,
        epoch: u64,
        epoch_key: u64,
        content: &str,
        proof: &[Field],
        min_rep: u64,
        tx: &TxHash,
    ) -> Result<(), IngestError> {
        if self.store.confirm_comment(comment_id, tx)? {
            tracing::info!(comment = %comment_id, "confirmed drafted comment");
            return Ok(());
        }
        if self.store.get_post(post_id)?.is_none() {
            // Parent not yet seen; the comment stands alone until the post's
            // own event arrives.
            tracing::debug!(comment = %comment_id, post = %post_id, "comment parent not yet known");
        }
        self.store.put_comment(&Comment {
            id: *comment_id,
            post_id: *post_id,
            epoch,
            epoch_key,
            content: content.to_owned(),
            proof: proof.to_vec(),
            min_rep,
            status: ContentStatus::Confirmed,
            transaction_hash: Some(*tx),
        })?;
        tracing::info!(comment = %comment_id, post = %post_id, "recorded on-chain comment");
        Ok(())
    }

    fn on_epoch_ended(&mut self, epoch: u64) -> Result<(), IngestError> {
        // The sealed set is read back from the contract, not accumulated
        // from prior events: the on-chain hashchains are authoritative.
        let leaves = self.contract.epoch_tree_leaves(epoch)?;

        let mut tree = EpochTree::new(self.settings.tree_depths.epoch_tree)?;
        for leaf in &leaves {
            tree.update(leaf.epoch_key, leaf.hashchain_result)?;
        }
        let root = tree.root();

        if !self.store.put_epoch_seal(epoch, &leaves, &root)? {
            tracing::warn!(epoch, "epoch already sealed, ignoring repeat EpochEnded");
            return Ok(());
        }
        self.store.init_gst_epoch(epoch + 1)?;
        tracing::info!(
            epoch,
            sealed_keys = leaves.len(),
            "sealed epoch tree and opened next epoch"
        );
        Ok(())
    }
}
