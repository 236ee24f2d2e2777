//! Immutable per-deployment settings.
//!
//! Fetched from the contract exactly once after deployment and cached in the
//! record store. Every reconstruction query takes the settings as an explicit
//! value; there is no ambient singleton, and queries fail with
//! `SettingsMissing` if initialization never ran.

use serde::{Deserialize, Serialize};

use crate::contract::{ContractError, ContractSource, SettingsSnapshot};
use crate::store::{Store, StoreError};
use crate::tree::empty_tree_root;
use crate::{hash_fields, Field, ZERO};

/// Accumulator depths fixed at contract deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDepths {
    pub global_state_tree: u8,
    pub user_state_tree: u8,
    pub epoch_tree: u8,
    pub nullifier_tree: u8,
}

/// The settings singleton.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub tree_depths: TreeDepths,
    pub attesting_fee: u64,
    pub epoch_length: u64,
    pub num_epoch_key_nonce_per_epoch: u64,
    pub num_attestations_per_epoch_key: u64,
    /// Hash of an empty user state: the default (non-membership) leaf of
    /// the global state tree.
    pub default_gst_leaf: Field,
}

/// Errors during settings initialization.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Settings {
    /// Build settings from a contract snapshot, deriving the default
    /// global-state-tree leaf from the empty user state.
    pub fn from_snapshot(snapshot: &SettingsSnapshot) -> Self {
        let empty_user_state_root = empty_user_state_root(snapshot.user_state_tree_depth);
        let default_gst_leaf = hash_fields(&[
            ZERO, // zero identity commitment
            empty_user_state_root,
            ZERO, // airdropped reputation
            ZERO, // negative reputation
            ZERO,
        ]);
        Settings {
            tree_depths: TreeDepths {
                global_state_tree: snapshot.global_state_tree_depth,
                user_state_tree: snapshot.user_state_tree_depth,
                epoch_tree: snapshot.epoch_tree_depth,
                nullifier_tree: snapshot.nullifier_tree_depth,
            },
            attesting_fee: snapshot.attesting_fee,
            epoch_length: snapshot.epoch_length,
            num_epoch_key_nonce_per_epoch: snapshot.num_epoch_key_nonce_per_epoch,
            num_attestations_per_epoch_key: snapshot.num_attestations_per_epoch_key,
            default_gst_leaf,
        }
    }

    /// Load cached settings, or fetch them from the contract and persist.
    ///
    /// The first writer wins: if a concurrent initializer already stored a
    /// record, the cached copy is returned and the fetched one discarded.
    pub fn init<S: Store, C: ContractSource>(
        store: &S,
        contract: &C,
    ) -> Result<Self, SettingsError> {
        if let Some(settings) = store.get_settings()? {
            return Ok(settings);
        }
        let snapshot = contract.settings_snapshot()?;
        let settings = Settings::from_snapshot(&snapshot);
        if !store.put_settings(&settings)? {
            // Lost the race; the stored record is authoritative.
            if let Some(existing) = store.get_settings()? {
                return Ok(existing);
            }
        }
        tracing::info!(
            gst_depth = settings.tree_depths.global_state_tree,
            epoch_tree_depth = settings.tree_depths.epoch_tree,
            epoch_length = settings.epoch_length,
            "initialized deployment settings"
        );
        Ok(settings)
    }
}

/// Root of a user state tree containing no reputation records.
fn empty_user_state_root(depth: u8) -> Field {
    let default_user_state_leaf = hash_fields(&[ZERO; 5]);
    empty_tree_root(depth, &default_user_state_leaf)
}
