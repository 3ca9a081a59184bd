//! Dependency clusters and their construction.
//!
//! A cluster is an ordered, dependency-closed bundle of pool transactions
//! ending at a target transaction: applied in sequence against the UTXO
//! snapshot it was built at, the whole bundle confirms. Bundling lets a
//! high-fee child pull its low-fee ancestors into the same block
//! (child-pays-for-parent).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use tarn_core::error::{MempoolError, TransactionError};
use tarn_core::traits::ChainStateSource;
use tarn_core::types::{BlockHeader, Hash256, Transaction, TxInput};
use tarn_core::utxo::{input_utxo_key, UtxoBuffer, UtxoTrie};
use tarn_core::validation::{validate_deep, ExportMap};

use crate::info::TxInfo;

/// An ordered sequence of transactions where every dependency precedes its
/// dependents and the target transaction comes last.
#[derive(Debug, Clone)]
pub struct Cluster {
    txs: Vec<Transaction>,
    ids: Vec<Hash256>,
    sizes: Vec<usize>,
    id_set: HashSet<Hash256>,
    total_size: usize,
    total_fee: u64,
}

impl Cluster {
    /// Build a cluster from an already-ordered transaction sequence,
    /// computing aggregate size and fee.
    pub fn new(ordered: Vec<Transaction>) -> Result<Self, TransactionError> {
        let mut ids = Vec::with_capacity(ordered.len());
        let mut sizes = Vec::with_capacity(ordered.len());
        let mut id_set = HashSet::with_capacity(ordered.len());
        let mut total_size = 0usize;
        let mut total_fee = 0u64;

        for tx in &ordered {
            let txid = tx.txid()?;
            let size = tx.encoded_size()?;
            total_size += size;
            total_fee = total_fee
                .checked_add(tx.fee)
                .ok_or(TransactionError::ValueOverflow)?;
            id_set.insert(txid);
            ids.push(txid);
            sizes.push(size);
        }

        Ok(Self {
            txs: ordered,
            ids,
            sizes,
            id_set,
            total_size,
            total_fee,
        })
    }

    /// Transactions in confirmation order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.txs
    }

    /// Iterate `(txid, transaction, size)` in confirmation order.
    pub fn entries(&self) -> impl Iterator<Item = (&Hash256, &Transaction, usize)> {
        self.ids
            .iter()
            .zip(&self.txs)
            .zip(&self.sizes)
            .map(|((id, tx), size)| (id, tx, *size))
    }

    /// Whether the cluster contains `txid`.
    pub fn contains(&self, txid: &Hash256) -> bool {
        self.id_set.contains(txid)
    }

    /// Number of transactions.
    pub fn len(&self) -> usize {
        self.txs.len()
    }

    /// Whether the cluster is empty.
    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Combined serialized size in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Combined declared fees in base units.
    pub fn total_fee(&self) -> u64 {
        self.total_fee
    }

    /// Aggregate fee density in milli-units per byte.
    pub fn fee_density_milli(&self) -> u64 {
        tarn_core::params::fee_density_milli(self.total_fee, self.total_size)
    }
}

/// Builds the minimal ordered cluster that makes a target transaction
/// confirmable against a UTXO snapshot.
///
/// The walk resolves each needed input either from the trie at the build
/// root (confirmed state) or from another pool transaction, which is then
/// pulled into the cluster and walked in turn. The resulting set is
/// topologically ordered and replayed through deep validation to prove it.
pub struct ClusterBuilder<'a> {
    trie: &'a dyn UtxoTrie,
    root: Hash256,
    known: &'a HashMap<Hash256, TxInfo>,
    chain: &'a dyn ChainStateSource,
    shard_cover: &'a HashSet<u32>,
}

impl<'a> ClusterBuilder<'a> {
    /// Create a builder against the snapshot at `root`.
    pub fn new(
        trie: &'a dyn UtxoTrie,
        root: Hash256,
        known: &'a HashMap<Hash256, TxInfo>,
        chain: &'a dyn ChainStateSource,
        shard_cover: &'a HashSet<u32>,
    ) -> Self {
        Self {
            trie,
            root,
            known,
            chain,
            shard_cover,
        }
    }

    /// Build and verify the cluster for `target`.
    pub fn build(&self, target: &TxInfo) -> Result<Cluster, MempoolError> {
        let target_id = target.txid();
        let mut working: HashMap<Hash256, Transaction> = HashMap::new();
        let mut depends_on: HashMap<Hash256, HashSet<Hash256>> = HashMap::new();
        let mut needed: VecDeque<TxInput> = VecDeque::new();

        working.insert(target_id, target.transaction().clone());
        add_input_requirements(target_id, target.transaction(), &mut depends_on, &mut needed);

        while let Some(input) = needed.pop_front() {
            let source_id = input.previous_output.txid;
            if working.contains_key(&source_id) {
                continue;
            }

            // Satisfied by confirmed state at the build root?
            let key = input_utxo_key(&input);
            if self.trie.lookup(&self.root, &key)?.is_some() {
                continue;
            }

            let Some(parent) = self.known.get(&source_id) else {
                return Err(MempoolError::UnknownInput(source_id.to_string()));
            };

            let output = parent
                .transaction()
                .outputs
                .get(input.previous_output.index as usize)
                .ok_or_else(|| MempoolError::UnknownInput(input.previous_output.to_string()))?;
            if !self.shard_cover.contains(&output.target_shard) {
                return Err(MempoolError::CrossShardDependency {
                    txid: target_id.to_string(),
                    shard: output.target_shard,
                });
            }

            working.insert(source_id, parent.transaction().clone());
            add_input_requirements(source_id, parent.transaction(), &mut depends_on, &mut needed);
        }

        let ordered = order_by_depth(&working, &depends_on, target_id);

        // Replay the sequence against a buffer snapshotted at the build root.
        let height = self.chain.height() + 1;
        let params = self.chain.params();
        let header = BlockHeader {
            version: if params.activation_height_shards <= height { 2 } else { 1 },
            height,
            timestamp_ms: now_millis(),
        };
        let mut buffer = UtxoBuffer::new(self.trie, self.root);
        let mut exports = ExportMap::new();
        for tx in &ordered {
            validate_deep(tx, &mut buffer, &header, &params, self.shard_cover, &mut exports)
                .map_err(MempoolError::InvalidCluster)?;
        }

        Ok(Cluster::new(ordered)?)
    }
}

/// Record dependency edges and queue the inputs a transaction still needs.
fn add_input_requirements(
    txid: Hash256,
    tx: &Transaction,
    depends_on: &mut HashMap<Hash256, HashSet<Hash256>>,
    needed: &mut VecDeque<TxInput>,
) {
    for input in &tx.inputs {
        depends_on
            .entry(txid)
            .or_default()
            .insert(input.previous_output.txid);
        needed.push_back(input.clone());
    }
}

/// Topologically order the working set: target at level 0, parents at -1,
/// grandparents at -2, keeping the minimum level seen per transaction.
///
/// Iterative with an explicit stack so arbitrarily long chains cannot
/// overflow the call stack. The equal-or-lower guard also terminates the
/// walk if a cycle were ever present (impossible for well-formed UTXO
/// transactions, since outputs must pre-exist).
fn order_by_depth(
    working: &HashMap<Hash256, Transaction>,
    depends_on: &HashMap<Hash256, HashSet<Hash256>>,
    target: Hash256,
) -> Vec<Transaction> {
    let mut level_map: HashMap<Hash256, i64> = HashMap::new();
    let mut stack: Vec<(Hash256, i64)> = vec![(target, 0)];

    while let Some((txid, level)) = stack.pop() {
        if !working.contains_key(&txid) {
            continue;
        }
        if let Some(&existing) = level_map.get(&txid) {
            if existing <= level {
                continue;
            }
        }
        level_map.insert(txid, level);
        if let Some(parents) = depends_on.get(&txid) {
            for parent in parents {
                stack.push((*parent, level - 1));
            }
        }
    }

    debug_assert_eq!(level_map.len(), working.len());

    let mut keyed: Vec<(i64, Hash256)> = level_map
        .into_iter()
        .map(|(txid, level)| (level, txid))
        .collect();
    keyed.sort();

    keyed
        .into_iter()
        .filter_map(|(_, txid)| working.get(&txid).cloned())
        .collect()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
