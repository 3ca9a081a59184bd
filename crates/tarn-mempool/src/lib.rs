//! # tarn-mempool
//! In-memory pool of unconfirmed transactions for the Tarn protocol.
//!
//! The pool validates candidate transactions against the current
//! unspent-output state, indexes them by spent outpoint and involved
//! address, bundles unconfirmed parent/child chains into
//! [clusters](cluster::Cluster) ordered by fee density, and drains them
//! into size-bounded block candidates. Background
//! [drivers](workers) rebuild the ordering when the chain tip advances and
//! gossip pool transactions to peers.

pub mod cluster;
pub mod config;
pub mod index;
pub mod info;
pub mod pool;
pub mod priority;
pub mod workers;
