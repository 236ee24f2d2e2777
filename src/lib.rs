//! # Murmur sync-core
//!
//! Off-chain state tracking for the Murmur pseudonymous reputation protocol.
//!
//! The Murmur contract emits an append-only event log: global-state-tree leaf
//! insertions, attestations to epoch keys, post and comment submissions, and
//! epoch transitions. This crate folds that log into a persistent record
//! store and reconstructs the protocol's accumulator structures on demand:
//!
//! - **Global state tree** — append-only Merkle accumulator over user state
//!   commitments, one generation per epoch.
//! - **Epoch tree** — per-epoch sparse keyed accumulator mapping epoch key to
//!   its sealed attestation hashchain.
//! - **Nullifier registry** — write-once set preventing proof double-spends.
//!
//! A reconstructed tree's root must match the authoritative on-chain root;
//! proof construction, contract interaction, and the frontend live elsewhere
//! and consume this crate's queries.

pub mod contract;
pub mod event;
pub mod reconstruct;
pub mod records;
pub mod settings;
pub mod store;
pub mod tree;

/// Protocol constants.
pub mod constants {
    /// Maximum serialized size of a single stored record (1 MiB).
    ///
    /// Post/comment content is hashed on-chain, so no legitimate record
    /// approaches this. The cap bounds allocation when decoding a corrupt
    /// store entry.
    pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

    /// Largest supported accumulator depth. Epoch keys are addressed as
    /// `u64`, so the sparse key domain must fit in 64 bits.
    pub const MAX_TREE_DEPTH: u8 = 63;
}

/// 32-byte element of the protocol's native field, big-endian.
pub type Field = [u8; 32];

/// 32-byte transaction hash from the event log.
pub type TxHash = [u8; 32];

/// The all-zero field element.
pub const ZERO: Field = [0u8; 32];

/// Compute a domain-separated BLAKE3 hash.
///
/// The domain must be valid UTF-8 (all Murmur domains are ASCII); passing a
/// non-UTF-8 domain is a programming error and panics.
pub fn hash_domain(domain: &[u8], data: &[u8]) -> Field {
    let domain_str = std::str::from_utf8(domain).expect("hash_domain: domain must be valid UTF-8");
    let mut hasher = blake3::Hasher::new_derive_key(domain_str);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash a fixed sequence of field elements into one.
///
/// Stands in for the circuit's five-element sponge when computing default
/// leaves off-chain. Concatenation is unambiguous because every element is
/// exactly 32 bytes.
pub fn hash_fields(fields: &[Field]) -> Field {
    let mut hasher = blake3::Hasher::new_derive_key("murmur.fields");
    for f in fields {
        hasher.update(f);
    }
    *hasher.finalize().as_bytes()
}

/// Encode a `u64` as a big-endian field element.
pub fn field_from_u64(value: u64) -> Field {
    let mut f = ZERO;
    f[24..].copy_from_slice(&value.to_be_bytes());
    f
}

/// Serialize a record using bincode with legacy (v1-compatible) encoding.
pub fn serialize<T: serde::Serialize>(val: &T) -> Result<Vec<u8>, bincode::error::EncodeError> {
    bincode::serde::encode_to_vec(val, bincode::config::legacy())
}

/// Deserialize a stored record.
///
/// Rejects inputs larger than `MAX_RECORD_BYTES` so a corrupt store entry
/// cannot trigger an unbounded allocation.
pub fn deserialize<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
) -> Result<T, bincode::error::DecodeError> {
    if bytes.len() > constants::MAX_RECORD_BYTES {
        return Err(bincode::error::DecodeError::LimitExceeded);
    }
    let (val, _len) = bincode::serde::decode_from_slice(bytes, bincode::config::legacy())?;
    Ok(val)
}
