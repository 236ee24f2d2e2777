//! State reconstruction queries.
//!
//! Read-only views over the committed record store. Trees are rebuilt from
//! persisted leaves through the accumulator primitives; roots of interest
//! are answered from the cached root log without replay.
//!
//! Queries may run concurrently with ingestion, but a rebuild that races a
//! leaf append can observe a partial set for the epoch being written.
//! Callers needing a stable root snapshot at an epoch boundary should
//! verify with `verified_gst_root` against the authoritative on-chain root.

use crate::records::{Attestation, EpochTreeLeaf, GstLeaf};
use crate::settings::Settings;
use crate::store::{Store, StoreError};
use crate::tree::{EpochTree, GlobalStateTree, TreeError};
use crate::Field;

/// Errors surfaced by reconstruction queries.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("settings not initialized: ingest the deployment settings before reconstructing")]
    SettingsMissing,
    #[error("reconstructed root for epoch {epoch} diverges from on-chain root (expected {expected}, got {got})")]
    InconsistentRoot {
        epoch: u64,
        expected: String,
        got: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Load the settings singleton, failing if initialization never ran.
pub fn load_settings<S: Store>(store: &S) -> Result<Settings, SyncError> {
    store.get_settings()?.ok_or(SyncError::SettingsMissing)
}

/// Ordered global-state-tree leaves for an epoch; empty if unknown.
pub fn gst_leaves<S: Store>(store: &S, epoch: u64) -> Result<Vec<GstLeaf>, SyncError> {
    Ok(store.gst_leaves(epoch)?)
}

/// Sealed epoch-tree leaves for an epoch; empty if the epoch is unsealed.
pub fn epoch_tree_leaves<S: Store>(store: &S, epoch: u64) -> Result<Vec<EpochTreeLeaf>, SyncError> {
    Ok(store.epoch_tree_leaves(epoch)?)
}

/// Rebuild an epoch's global state tree by replaying its persisted leaves
/// in insertion order.
pub fn gen_gst_tree<S: Store>(
    settings: &Settings,
    store: &S,
    epoch: u64,
) -> Result<GlobalStateTree, SyncError> {
    let mut tree = GlobalStateTree::new(
        settings.tree_depths.global_state_tree,
        &settings.default_gst_leaf,
    )?;
    for leaf in store.gst_leaves(epoch)? {
        tree.insert(leaf.hashed_leaf)?;
    }
    Ok(tree)
}

/// Rebuild an epoch's epoch tree from its sealed leaves. Keyed updates make
/// replay order irrelevant; an unsealed epoch yields the all-default tree.
pub fn gen_epoch_tree<S: Store>(
    settings: &Settings,
    store: &S,
    epoch: u64,
) -> Result<EpochTree, SyncError> {
    let mut tree = EpochTree::new(settings.tree_depths.epoch_tree)?;
    for leaf in store.epoch_tree_leaves(epoch)? {
        tree.update(leaf.epoch_key, leaf.hashchain_result)?;
    }
    Ok(tree)
}

/// Did this global-state-tree root ever exist at this epoch? Answered from
/// the cached root log.
pub fn gst_root_exists<S: Store>(store: &S, epoch: u64, root: &Field) -> Result<bool, SyncError> {
    Ok(store.gst_root_exists(epoch, root)?)
}

/// Is this the sealed epoch-tree root for this epoch?
pub fn epoch_tree_root_exists<S: Store>(
    store: &S,
    epoch: u64,
    root: &Field,
) -> Result<bool, SyncError> {
    Ok(store.epoch_tree_root_exists(epoch, root)?)
}

/// Insertion index of a leaf within an epoch's global state tree, or `None`
/// if the leaf was never inserted there. Linear scan: absence is an expected
/// steady state, not an error.
pub fn gst_leaf_index<S: Store>(
    store: &S,
    epoch: u64,
    hashed_leaf: &Field,
) -> Result<Option<u64>, SyncError> {
    for (index, leaf) in store.gst_leaves(epoch)?.iter().enumerate() {
        if leaf.hashed_leaf == *hashed_leaf {
            return Ok(Some(index as u64));
        }
    }
    Ok(None)
}

/// Nullifier existence, globally (`epoch = None`) or epoch-scoped.
pub fn nullifier_exists<S: Store>(
    store: &S,
    value: &Field,
    epoch: Option<u64>,
) -> Result<bool, SyncError> {
    Ok(store.nullifier_exists(value, epoch)?)
}

/// Ordered attestation list for an epoch key; empty if none recorded.
/// Fold with `Reputation::tally` for the reputation sums.
pub fn attestations<S: Store>(store: &S, epoch_key: u64) -> Result<Vec<Attestation>, SyncError> {
    Ok(store.attestations(epoch_key)?)
}

/// Rebuild an epoch's global state tree and verify it against the
/// authoritative on-chain root.
///
/// A mismatch signals upstream data loss or an ordering violation and is
/// surfaced as `InconsistentRoot` — never silently accepted. Callers racing
/// ingestion should retry after the epoch's leaf set stabilizes.
pub fn verified_gst_root<S: Store>(
    settings: &Settings,
    store: &S,
    epoch: u64,
    onchain_root: &Field,
) -> Result<Field, SyncError> {
    let tree = gen_gst_tree(settings, store, epoch)?;
    let got = tree.root();
    if got != *onchain_root {
        tracing::error!(
            epoch,
            expected = %hex::encode(onchain_root),
            got = %hex::encode(got),
            "reconstructed global state tree diverges from chain"
        );
        return Err(SyncError::InconsistentRoot {
            epoch,
            expected: hex::encode(onchain_root),
            got: hex::encode(got),
        });
    }
    Ok(got)
}
