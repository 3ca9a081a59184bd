//! Secondary indices over the pool: claimed outpoints and involved addresses.

use std::collections::{HashMap, HashSet};

use tarn_core::types::{Hash256, OutPoint, Transaction};

/// Maps each spent outpoint to the single pool transaction claiming it.
///
/// Invariants: every input of every known transaction maps to that
/// transaction here, and no two distinct transactions share an outpoint.
/// The first valid spender of an output therefore keeps its claim until it
/// leaves the pool.
#[derive(Debug, Default)]
pub struct DoubleSpendIndex {
    claimed: HashMap<OutPoint, Hash256>,
}

impl DoubleSpendIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// The transaction currently claiming `outpoint`, if any.
    pub fn claimant(&self, outpoint: &OutPoint) -> Option<Hash256> {
        self.claimed.get(outpoint).copied()
    }

    /// Record `txid` as the claimant of all of its inputs.
    pub fn claim_inputs(&mut self, txid: Hash256, tx: &Transaction) {
        for input in &tx.inputs {
            self.claimed.insert(input.previous_output.clone(), txid);
        }
    }

    /// Release every outpoint claimed by `tx`, making them available again.
    pub fn release_inputs(&mut self, tx: &Transaction) {
        for input in &tx.inputs {
            self.claimed.remove(&input.previous_output);
        }
    }

    /// Number of claimed outpoints.
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    /// Whether no outpoints are claimed.
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Multimap from address spec hash to the pool transactions touching it.
#[derive(Debug, Default)]
pub struct AddressIndex {
    by_address: HashMap<Hash256, HashSet<Hash256>>,
}

impl AddressIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `txid` under every address in `addresses`.
    pub fn insert_tx(&mut self, txid: Hash256, addresses: &HashSet<Hash256>) {
        for address in addresses {
            self.by_address.entry(*address).or_default().insert(txid);
        }
    }

    /// Remove `txid` from every address in `addresses`, dropping empty sets.
    pub fn remove_tx(&mut self, txid: &Hash256, addresses: &HashSet<Hash256>) {
        for address in addresses {
            if let Some(txids) = self.by_address.get_mut(address) {
                txids.remove(txid);
                if txids.is_empty() {
                    self.by_address.remove(address);
                }
            }
        }
    }

    /// Snapshot of the transactions touching `address`.
    pub fn transactions_for(&self, address: &Hash256) -> HashSet<Hash256> {
        self.by_address.get(address).cloned().unwrap_or_default()
    }

    /// Number of indexed addresses.
    pub fn address_count(&self) -> usize {
        self.by_address.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_core::types::{TxInput, TxOutput};

    fn make_tx(outpoints: &[OutPoint]) -> Transaction {
        Transaction {
            version: 1,
            inputs: outpoints
                .iter()
                .map(|op| TxInput {
                    previous_output: op.clone(),
                    spec_hash: Hash256([0xAA; 32]),
                    value: 10,
                    signature: vec![0; 64],
                    public_key: vec![0; 32],
                })
                .collect(),
            outputs: vec![TxOutput {
                value: 5,
                recipient_spec_hash: Hash256([0xBB; 32]),
                target_shard: 0,
            }],
            fee: 10 * outpoints.len() as u64 - 5,
            lock_time: 0,
        }
    }

    fn outpoint(seed: u8, index: u32) -> OutPoint {
        OutPoint {
            txid: Hash256([seed; 32]),
            index,
        }
    }

    // ------------------------------------------------------------------
    // DoubleSpendIndex
    // ------------------------------------------------------------------

    #[test]
    fn claim_and_release_all_inputs() {
        let mut index = DoubleSpendIndex::new();
        let tx = make_tx(&[outpoint(1, 0), outpoint(2, 3)]);
        let txid = Hash256([0x77; 32]);

        index.claim_inputs(txid, &tx);
        assert_eq!(index.len(), 2);
        assert_eq!(index.claimant(&outpoint(1, 0)), Some(txid));
        assert_eq!(index.claimant(&outpoint(2, 3)), Some(txid));

        index.release_inputs(&tx);
        assert!(index.is_empty());
        assert_eq!(index.claimant(&outpoint(1, 0)), None);
    }

    #[test]
    fn later_claim_overwrites_nothing_unless_asked() {
        let mut index = DoubleSpendIndex::new();
        let tx = make_tx(&[outpoint(1, 0)]);
        index.claim_inputs(Hash256([0x01; 32]), &tx);
        // The pool checks claimant() before claiming; the index itself is
        // last-writer-wins.
        assert_eq!(index.claimant(&outpoint(1, 0)), Some(Hash256([0x01; 32])));
    }

    // ------------------------------------------------------------------
    // AddressIndex
    // ------------------------------------------------------------------

    #[test]
    fn insert_and_query_addresses() {
        let mut index = AddressIndex::new();
        let txid = Hash256([0x77; 32]);
        let addresses = HashSet::from([Hash256([0xAA; 32]), Hash256([0xBB; 32])]);

        index.insert_tx(txid, &addresses);
        assert_eq!(index.address_count(), 2);
        assert!(index.transactions_for(&Hash256([0xAA; 32])).contains(&txid));
        assert!(index.transactions_for(&Hash256([0xCC; 32])).is_empty());
    }

    #[test]
    fn shared_address_keeps_other_txs() {
        let mut index = AddressIndex::new();
        let shared = HashSet::from([Hash256([0xAA; 32])]);
        let tx1 = Hash256([0x01; 32]);
        let tx2 = Hash256([0x02; 32]);

        index.insert_tx(tx1, &shared);
        index.insert_tx(tx2, &shared);
        assert_eq!(index.transactions_for(&Hash256([0xAA; 32])).len(), 2);

        index.remove_tx(&tx1, &shared);
        let remaining = index.transactions_for(&Hash256([0xAA; 32]));
        assert_eq!(remaining, HashSet::from([tx2]));
    }

    #[test]
    fn remove_drops_empty_sets() {
        let mut index = AddressIndex::new();
        let addresses = HashSet::from([Hash256([0xAA; 32])]);
        let txid = Hash256([0x01; 32]);

        index.insert_tx(txid, &addresses);
        index.remove_tx(&txid, &addresses);
        assert_eq!(index.address_count(), 0);
    }
}
