//! Trait interfaces between the mempool and its collaborators.
//!
//! - [`ChainStateSource`] — read-only chain facts (the node implements)
//! - [`Peerage`] — transaction broadcast to peers (the network layer implements)
//! - [`MempoolListener`] — new-transaction notifications (wallets, indexers)

use std::collections::HashSet;

use crate::error::NetworkError;
use crate::params::Params;
use crate::types::{Hash256, Transaction};

/// Read-only view of the chain facts the mempool needs.
pub trait ChainStateSource: Send + Sync {
    /// The shard this node lives on.
    fn shard_id(&self) -> u32;

    /// Shards this node covers and can validate. Immutable after startup.
    fn shard_cover_set(&self) -> HashSet<u32>;

    /// Current chain tip height.
    fn height(&self) -> u64;

    /// Consensus parameters.
    fn params(&self) -> Params;
}

/// Transaction propagation to connected peers.
pub trait Peerage: Send + Sync {
    /// Broadcast a validated transaction to all connected peers.
    fn broadcast(&self, tx: &Transaction) -> Result<(), NetworkError>;
}

/// Callback invoked when the mempool accepts a new transaction.
///
/// Called while the pool lock is held: implementations must not call back
/// into the mempool and should defer real work (enqueue, then return).
pub trait MempoolListener: Send + Sync {
    /// A transaction was accepted, touching the given spec hashes.
    fn on_new_tx(&self, tx: &Transaction, involved_addresses: &HashSet<Hash256>);
}
