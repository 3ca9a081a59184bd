//! Cached per-transaction metadata.

use std::collections::HashSet;

use tarn_core::error::TransactionError;
use tarn_core::params::fee_density_milli;
use tarn_core::types::{Hash256, Transaction};

/// A transaction with the derived data the pool needs, computed once at
/// admission. Immutable after construction.
///
/// `involved_addresses` unions the spec hashes of every input (senders) and
/// every output recipient; indexing only outputs would silently drop wallet
/// notifications for senders.
#[derive(Debug, Clone)]
pub struct TxInfo {
    tx: Transaction,
    txid: Hash256,
    size: usize,
    fee_density_milli: u64,
    involved_addresses: HashSet<Hash256>,
}

impl TxInfo {
    /// Decode and cache a transaction's derived data.
    pub fn new(tx: Transaction) -> Result<Self, TransactionError> {
        let txid = tx.txid()?;
        let size = tx.encoded_size()?;

        let mut involved_addresses = HashSet::new();
        for input in &tx.inputs {
            involved_addresses.insert(input.spec_hash);
        }
        for output in &tx.outputs {
            involved_addresses.insert(output.recipient_spec_hash);
        }

        Ok(Self {
            fee_density_milli: fee_density_milli(tx.fee, size),
            tx,
            txid,
            size,
            involved_addresses,
        })
    }

    /// The underlying transaction.
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    /// Cached transaction ID.
    pub fn txid(&self) -> Hash256 {
        self.txid
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Declared fee in base units.
    pub fn fee(&self) -> u64 {
        self.tx.fee
    }

    /// Fee density in milli-units per byte.
    pub fn fee_density_milli(&self) -> u64 {
        self.fee_density_milli
    }

    /// Spec hashes of every address this transaction touches.
    pub fn involved_addresses(&self) -> &HashSet<Hash256> {
        &self.involved_addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_core::types::{OutPoint, TxInput, TxOutput};

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint {
                    txid: Hash256([0x11; 32]),
                    index: 0,
                },
                spec_hash: Hash256([0xAA; 32]),
                value: 100,
                signature: vec![0; 64],
                public_key: vec![0; 32],
            }],
            outputs: vec![
                TxOutput {
                    value: 60,
                    recipient_spec_hash: Hash256([0xBB; 32]),
                    target_shard: 0,
                },
                TxOutput {
                    value: 35,
                    recipient_spec_hash: Hash256([0xAA; 32]),
                    target_shard: 0,
                },
            ],
            fee: 5,
            lock_time: 0,
        }
    }

    #[test]
    fn txid_matches_transaction_txid() {
        let tx = sample_tx();
        let info = TxInfo::new(tx.clone()).unwrap();
        assert_eq!(info.txid(), tx.txid().unwrap());
        assert_eq!(info.size(), tx.encoded_size().unwrap());
    }

    #[test]
    fn involved_addresses_union_inputs_and_outputs() {
        let info = TxInfo::new(sample_tx()).unwrap();
        // 0xAA appears as sender and change recipient; counted once.
        assert_eq!(info.involved_addresses().len(), 2);
        assert!(info.involved_addresses().contains(&Hash256([0xAA; 32])));
        assert!(info.involved_addresses().contains(&Hash256([0xBB; 32])));
    }

    #[test]
    fn fee_density_computed() {
        let info = TxInfo::new(sample_tx()).unwrap();
        assert_eq!(
            info.fee_density_milli(),
            fee_density_milli(5, info.size())
        );
        assert_eq!(info.fee(), 5);
    }
}
