//! Fee-density-ordered cluster map, tagged with the UTXO root it was
//! built against.
//!
//! When a new block is learned the whole map is tossed and rebuilt from the
//! known-transaction set; there is no transaction index over the chain to
//! tell which pool entries were just confirmed, so rebuilding against the
//! new root *is* the confirmation check.

use std::collections::BTreeMap;
use std::sync::Arc;

use tarn_core::types::Hash256;

use crate::cluster::Cluster;

/// Sorted multimap from fee density to cluster.
///
/// Duplicate densities are kept apart by a monotonic insertion counter, so
/// iteration order among equal densities is insertion order.
#[derive(Debug, Default)]
pub struct PriorityMap {
    entries: BTreeMap<(u64, u64), Arc<Cluster>>,
    next_seq: u64,
    built_for_root: Option<Hash256>,
}

impl PriorityMap {
    /// Create an empty map not yet tied to any root.
    pub fn new() -> Self {
        Self::default()
    }

    /// The UTXO root this map's ordering is valid against.
    pub fn built_for_root(&self) -> Option<Hash256> {
        self.built_for_root
    }

    /// Drop all clusters and retag the map for `root`.
    pub fn reset(&mut self, root: Hash256) {
        self.entries.clear();
        self.built_for_root = Some(root);
    }

    /// Insert a cluster at its aggregate fee density.
    pub fn insert(&mut self, cluster: Arc<Cluster>) {
        let key = (cluster.fee_density_milli(), self.next_seq);
        self.next_seq += 1;
        self.entries.insert(key, cluster);
    }

    /// Snapshot of `(density, cluster)` pairs in descending density order.
    pub fn snapshot_descending(&self) -> Vec<(u64, Arc<Cluster>)> {
        self.entries
            .iter()
            .rev()
            .map(|(&(density, _), cluster)| (density, Arc::clone(cluster)))
            .collect()
    }

    /// First cluster (in ascending priority order) containing `txid`.
    pub fn find_containing(&self, txid: &Hash256) -> Option<Arc<Cluster>> {
        self.entries
            .values()
            .find(|cluster| cluster.contains(txid))
            .cloned()
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no clusters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_core::types::{OutPoint, Transaction, TxInput, TxOutput};

    /// A transaction with a chosen fee and rough size; signature bytes are
    /// junk since nothing here validates.
    fn make_cluster(seed: u8, fee: u64) -> Arc<Cluster> {
        let tx = Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint {
                    txid: Hash256([seed; 32]),
                    index: 0,
                },
                spec_hash: Hash256([0xAA; 32]),
                value: fee + 1,
                signature: vec![0; 64],
                public_key: vec![0; 32],
            }],
            outputs: vec![TxOutput {
                value: 1,
                recipient_spec_hash: Hash256([0xBB; 32]),
                target_shard: 0,
            }],
            fee,
            lock_time: 0,
        };
        Arc::new(Cluster::new(vec![tx]).unwrap())
    }

    #[test]
    fn starts_untagged_and_empty() {
        let map = PriorityMap::new();
        assert_eq!(map.built_for_root(), None);
        assert!(map.is_empty());
    }

    #[test]
    fn reset_retags_and_clears() {
        let mut map = PriorityMap::new();
        map.insert(make_cluster(1, 100));
        let root = Hash256([0x0F; 32]);

        map.reset(root);
        assert_eq!(map.built_for_root(), Some(root));
        assert!(map.is_empty());
    }

    #[test]
    fn snapshot_descends_by_density() {
        let mut map = PriorityMap::new();
        let low = make_cluster(1, 10);
        let high = make_cluster(2, 10_000);
        let mid = make_cluster(3, 1_000);
        map.insert(Arc::clone(&low));
        map.insert(Arc::clone(&high));
        map.insert(Arc::clone(&mid));

        let densities: Vec<u64> = map.snapshot_descending().iter().map(|(d, _)| *d).collect();
        assert_eq!(densities.len(), 3);
        assert!(densities[0] >= densities[1] && densities[1] >= densities[2]);
        assert_eq!(densities[0], high.fee_density_milli());
        assert_eq!(densities[2], low.fee_density_milli());
    }

    #[test]
    fn equal_densities_keep_insertion_order() {
        let mut map = PriorityMap::new();
        // Same fee and same shape → same density.
        let first = make_cluster(1, 500);
        let second = make_cluster(2, 500);
        assert_eq!(first.fee_density_milli(), second.fee_density_milli());

        map.insert(Arc::clone(&first));
        map.insert(Arc::clone(&second));
        assert_eq!(map.len(), 2);

        // Descending snapshot visits later insertions first among equals.
        let snapshot = map.snapshot_descending();
        let first_ids: Vec<bool> = snapshot
            .iter()
            .map(|(_, c)| c.contains(&first.transactions()[0].txid().unwrap()))
            .collect();
        assert_eq!(first_ids, vec![false, true]);
    }

    #[test]
    fn find_containing_locates_cluster() {
        let mut map = PriorityMap::new();
        let cluster = make_cluster(1, 100);
        let txid = cluster.transactions()[0].txid().unwrap();
        map.insert(Arc::clone(&cluster));
        map.insert(make_cluster(2, 200));

        assert!(map.find_containing(&txid).unwrap().contains(&txid));
        assert!(map.find_containing(&Hash256::ZERO).is_none());
    }
}
