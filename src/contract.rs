//! Interface to the Murmur contract collaborator.
//!
//! The sync core never talks to a chain itself. The contract-interaction
//! layer implements `ContractSource` and hands the core decoded values:
//! the deployment settings snapshot, and the sealed epoch-tree leaves the
//! `EpochEnded` handler reaches back out for.

use crate::records::EpochTreeLeaf;

/// Errors reported by the contract-interaction layer.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ContractError {
    #[error("contract query failed: {0}")]
    Query(String),
}

/// Raw per-deployment configuration as read from the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub global_state_tree_depth: u8,
    pub user_state_tree_depth: u8,
    pub epoch_tree_depth: u8,
    pub nullifier_tree_depth: u8,
    pub attesting_fee: u64,
    pub epoch_length: u64,
    pub num_epoch_key_nonce_per_epoch: u64,
    pub num_attestations_per_epoch_key: u64,
}

/// The contract as an event-settings collaborator.
pub trait ContractSource {
    /// Fetch the immutable deployment settings.
    fn settings_snapshot(&self) -> Result<SettingsSnapshot, ContractError>;

    /// Fetch the sealed `(epoch_key, hashchain_result)` pairs for an ended
    /// epoch. This is the one query the ingestion pipeline issues itself:
    /// the sealed set is authoritative on-chain state, not event payload.
    fn epoch_tree_leaves(&self, epoch: u64) -> Result<Vec<EpochTreeLeaf>, ContractError>;
}
