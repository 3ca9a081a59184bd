//! The transaction pool core.
//!
//! A single mutex serializes every read and mutation of the pool state:
//! the known-transaction map, the claimed-outpoint and address indices, and
//! the priority map with its root tag. Cluster construction performs UTXO
//! trie reads while the lock is held; releasing it mid-cluster would void
//! the double-spend invariant, and throughput is dominated by validation
//! anyway.
//!
//! Admission order for a candidate transaction:
//! 1. basics validation (outside the lock, pure)
//! 2. p2p gate, duplicate check, capacity checks
//! 3. double-spend check against claimed outpoints
//! 4. cluster construction and priority insertion (if a root is known)
//! 5. index installation and listener notification

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use rand::Rng;
use tracing::{debug, trace};

use tarn_core::error::MempoolError;
use tarn_core::traits::{ChainStateSource, MempoolListener, Peerage};
use tarn_core::types::{Hash256, Transaction};
use tarn_core::utxo::UtxoTrie;
use tarn_core::validation::validate_basics;

use crate::cluster::ClusterBuilder;
use crate::config::MempoolConfig;
use crate::index::{AddressIndex, DoubleSpendIndex};
use crate::info::TxInfo;
use crate::priority::PriorityMap;

/// Everything guarded by the pool lock.
struct PoolState {
    /// The single source of truth: txid → cached transaction view.
    known: HashMap<Hash256, TxInfo>,
    /// Outpoint → claiming txid.
    claimed: DoubleSpendIndex,
    /// Spec hash → txids touching it.
    addresses: AddressIndex,
    /// Fee-density ordering, tagged with its build root.
    priority: PriorityMap,
}

/// Single-slot pending root written by the chain ingestor and drained by
/// the tip driver.
struct TickleSlot {
    pending: Mutex<Option<Hash256>>,
    wake: Condvar,
}

/// In-memory pool of unconfirmed transactions with dependency clustering
/// and fee-density ordering.
pub struct MemPool {
    state: Mutex<PoolState>,
    trie: Arc<dyn UtxoTrie>,
    chain: Arc<dyn ChainStateSource>,
    /// Copied once at construction; immutable after startup by contract.
    shard_cover: HashSet<u32>,
    config: MempoolConfig,
    peerage: RwLock<Option<Arc<dyn Peerage>>>,
    listeners: RwLock<Vec<Arc<dyn MempoolListener>>>,
    tickle: TickleSlot,
}

impl MemPool {
    /// Create a pool over the given UTXO trie and chain state source.
    pub fn new(
        trie: Arc<dyn UtxoTrie>,
        chain: Arc<dyn ChainStateSource>,
        config: MempoolConfig,
    ) -> Self {
        let shard_cover = chain.shard_cover_set();
        Self {
            state: Mutex::new(PoolState {
                known: HashMap::new(),
                claimed: DoubleSpendIndex::new(),
                addresses: AddressIndex::new(),
                priority: PriorityMap::new(),
            }),
            trie,
            chain,
            shard_cover,
            config,
            peerage: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
            tickle: TickleSlot {
                pending: Mutex::new(None),
                wake: Condvar::new(),
            },
        }
    }

    /// Admit a candidate transaction.
    ///
    /// Returns `Ok(true)` if it was accepted, `Ok(false)` if it was a
    /// duplicate or gated out as a p2p submission, and an error for every
    /// rejection. A rejected transaction leaves no trace in any index.
    ///
    /// If no priority root has been set yet, the transaction is accepted
    /// into the pool without a cluster; the first rebuild incorporates it.
    pub fn admit(&self, tx: Transaction, from_p2p: bool) -> Result<bool, MempoolError> {
        validate_basics(&tx)?;
        let txid = tx.txid()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if from_p2p && !self.config.accepts_p2p_tx {
            return Ok(false);
        }
        if state.known.contains_key(&txid) {
            trace!(%txid, "transaction already known");
            return Ok(false);
        }
        if state.known.len() >= self.config.max_pool {
            return Err(MempoolError::PoolFull);
        }

        let info = TxInfo::new(tx)?;

        let low_fee_milli = self.chain.params().low_fee_milli;
        if info.fee_density_milli() < low_fee_milli
            && state.known.len() >= self.config.max_pool_low
        {
            return Err(MempoolError::PoolFullLowFee);
        }

        for input in &info.transaction().inputs {
            if let Some(existing) = state.claimed.claimant(&input.previous_output) {
                if existing != txid {
                    return Err(MempoolError::DoubleSpend {
                        outpoint: input.previous_output.to_string(),
                        existing: existing.to_string(),
                    });
                }
            }
        }

        if let Some(root) = state.priority.built_for_root() {
            let cluster = ClusterBuilder::new(
                self.trie.as_ref(),
                root,
                &state.known,
                self.chain.as_ref(),
                &self.shard_cover,
            )
            .build(&info)?;
            state.priority.insert(Arc::new(cluster));
        }

        state.claimed.claim_inputs(txid, info.transaction());
        state.addresses.insert_tx(txid, info.involved_addresses());
        state.known.insert(txid, info);

        // Listeners run under the pool lock and must not re-enter.
        if let Some(info) = state.known.get(&txid) {
            let listeners = self.listeners.read().clone();
            for listener in &listeners {
                listener.on_new_tx(info.transaction(), info.involved_addresses());
            }
        }

        debug!(%txid, "accepted transaction into mempool");
        Ok(true)
    }

    /// Rebuild the priority map against a new UTXO root.
    ///
    /// Every known transaction is re-clustered; any that no longer clusters
    /// (confirmed in a block, or its ancestry broke) is purged from the pool
    /// and all indices. This never fails: per-transaction failures become
    /// removals.
    pub fn rebuild_priority_map(&self, new_utxo_root: Hash256) {
        let mut guard = self.state.lock();
        self.rebuild_locked(&mut guard, new_utxo_root);
    }

    fn rebuild_locked(&self, state: &mut PoolState, root: Hash256) {
        debug!(%root, "rebuilding mempool priority map");
        state.priority.reset(root);

        let txids: Vec<Hash256> = state.known.keys().copied().collect();
        let mut remove_list: Vec<Hash256> = Vec::new();

        for txid in txids {
            let Some(info) = state.known.get(&txid) else {
                continue;
            };
            let built = ClusterBuilder::new(
                self.trie.as_ref(),
                root,
                &state.known,
                self.chain.as_ref(),
                &self.shard_cover,
            )
            .build(info);

            match built {
                Ok(cluster) => state.priority.insert(Arc::new(cluster)),
                Err(error) => {
                    trace!(%txid, %error, "transaction no longer clusters");
                    remove_list.push(txid);
                }
            }
        }

        for txid in &remove_list {
            if let Some(info) = state.known.remove(txid) {
                state.claimed.release_inputs(info.transaction());
                state.addresses.remove_tx(txid, info.involved_addresses());
            }
        }

        debug!(
            removed = remove_list.len(),
            remaining = state.known.len(),
            "mempool rebuild complete"
        );
    }

    /// Assemble an ordered, size-bounded transaction list for a block
    /// candidate against `utxo_root`.
    ///
    /// Rebuilds the priority map first if it was built for a different
    /// root. Clusters are drained in descending fee density; a cluster that
    /// does not fit is skipped, not a stopping point, since a smaller one
    /// may still fit. Transactions shared between clusters are emitted once.
    pub fn assemble_block(&self, utxo_root: Hash256, max_bytes: usize) -> Vec<Transaction> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.priority.built_for_root() != Some(utxo_root) {
            self.rebuild_locked(state, utxo_root);
        }

        let low_fee_milli = self.chain.params().low_fee_milli;
        let mut included: HashSet<Hash256> = HashSet::new();
        let mut block_list: Vec<Transaction> = Vec::new();
        let mut size = 0usize;
        let mut low_fee_size = 0usize;

        for (density, cluster) in state.priority.snapshot_descending() {
            if size + cluster.total_size() > max_bytes {
                continue;
            }
            let low_fee = density < low_fee_milli;
            if low_fee && low_fee_size >= self.config.low_fee_block_bytes {
                continue;
            }
            for (txid, tx, tx_size) in cluster.entries() {
                if included.insert(*txid) {
                    block_list.push(tx.clone());
                    size += tx_size;
                    if low_fee {
                        low_fee_size += tx_size;
                    }
                }
            }
        }

        debug!(tx_count = block_list.len(), size, "assembled block candidate");
        block_list
    }

    // --- Queries (all under the pool lock) ---

    /// Get a pool transaction by id.
    pub fn get_transaction(&self, txid: &Hash256) -> Option<Transaction> {
        self.state
            .lock()
            .known
            .get(txid)
            .map(|info| info.transaction().clone())
    }

    /// Number of transactions in the pool.
    pub fn pool_size(&self) -> usize {
        self.state.lock().known.len()
    }

    /// Snapshot of all pool transaction ids.
    pub fn pool_hashes(&self) -> Vec<Hash256> {
        self.state.lock().known.keys().copied().collect()
    }

    /// Snapshot of the transactions touching `address`.
    pub fn transactions_for_address(&self, address: &Hash256) -> HashSet<Hash256> {
        self.state.lock().addresses.transactions_for(address)
    }

    /// Ordered transactions of the first cluster containing `txid`.
    pub fn cluster_for(&self, txid: &Hash256) -> Option<Vec<Transaction>> {
        self.state
            .lock()
            .priority
            .find_containing(txid)
            .map(|cluster| cluster.transactions().to_vec())
    }

    /// A uniformly random pool transaction, if any. Used by gossip.
    pub fn random_pool_tx(&self) -> Option<TxInfo> {
        let state = self.state.lock();
        if state.known.is_empty() {
            return None;
        }
        let nth = rand::thread_rng().gen_range(0..state.known.len());
        state.known.values().nth(nth).cloned()
    }

    /// The UTXO root the priority map is currently built against.
    pub fn built_for_root(&self) -> Option<Hash256> {
        self.state.lock().priority.built_for_root()
    }

    pub(crate) fn config(&self) -> &MempoolConfig {
        &self.config
    }

    // --- Collaborators ---

    /// Attach the peer layer. Until set, gossip is a no-op.
    pub fn set_peerage(&self, peerage: Arc<dyn Peerage>) {
        *self.peerage.write() = Some(peerage);
    }

    pub(crate) fn peerage(&self) -> Option<Arc<dyn Peerage>> {
        self.peerage.read().clone()
    }

    /// Register a new-transaction listener (invoked under the pool lock).
    pub fn register_listener(&self, listener: Arc<dyn MempoolListener>) {
        self.listeners.write().push(listener);
    }

    // --- Tip signaling ---

    /// Record that the chain tip advanced to a state with `utxo_root`.
    ///
    /// The rebuild itself happens asynchronously on the tip driver; only
    /// the latest root is kept if several arrive between passes.
    pub fn on_new_tip(&self, utxo_root: Hash256) {
        *self.tickle.pending.lock() = Some(utxo_root);
        self.tickle.wake.notify_all();
    }

    pub(crate) fn take_pending_tip(&self) -> Option<Hash256> {
        self.tickle.pending.lock().take()
    }

    pub(crate) fn wait_for_tip_signal(&self, timeout: Duration) {
        let mut pending = self.tickle.pending.lock();
        if pending.is_none() {
            let _ = self.tickle.wake.wait_for(&mut pending, timeout);
        }
    }

    pub(crate) fn notify_tip_waiters(&self) {
        self.tickle.wake.notify_all();
    }
}
