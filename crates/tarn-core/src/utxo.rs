//! UTXO trie interface, key encoding, and the simulation buffer.
//!
//! The unspent-output set is committed to by a root hash; readers address it
//! as `(root, key) -> leaf`. Keys lead with the owner spec hash so all of an
//! address's outputs are adjacent under range scans, then pin the exact
//! outpoint and value:
//!
//! `spec_hash (32) ‖ txid (32) ‖ out_index (4, BE) ‖ value (8, BE)`
//!
//! Because the key embeds the claimed owner and value, a successful lookup
//! proves an input's claims; no separate leaf comparison is needed. Leaf data
//! is the canonical bincode encoding of the [`TxOutput`].

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{TransactionError, UtxoError};
use crate::types::{Hash256, OutPoint, TxInput, TxOutput};

/// Length in bytes of a UTXO trie key.
pub const UTXO_KEY_LEN: usize = 32 + 32 + 4 + 8;

/// Build the trie key for an output.
pub fn utxo_key(spec_hash: &Hash256, txid: &Hash256, index: u32, value: u64) -> [u8; UTXO_KEY_LEN] {
    let mut key = [0u8; UTXO_KEY_LEN];
    key[0..32].copy_from_slice(spec_hash.as_bytes());
    key[32..64].copy_from_slice(txid.as_bytes());
    key[64..68].copy_from_slice(&index.to_be_bytes());
    key[68..76].copy_from_slice(&value.to_be_bytes());
    key
}

/// Trie key for the output an input claims to spend.
pub fn input_utxo_key(input: &TxInput) -> [u8; UTXO_KEY_LEN] {
    utxo_key(
        &input.spec_hash,
        &input.previous_output.txid,
        input.previous_output.index,
        input.value,
    )
}

/// Trie key for a freshly created output.
pub fn output_utxo_key(txid: &Hash256, index: u32, output: &TxOutput) -> [u8; UTXO_KEY_LEN] {
    utxo_key(&output.recipient_spec_hash, txid, index, output.value)
}

/// Encode a leaf (the canonical bincode encoding of the output).
pub fn encode_leaf(output: &TxOutput) -> Result<Vec<u8>, TransactionError> {
    bincode::encode_to_vec(output, bincode::config::standard())
        .map_err(|e| TransactionError::Serialization(e.to_string()))
}

/// Decode a leaf back into an output.
pub fn decode_leaf(bytes: &[u8]) -> Result<TxOutput, TransactionError> {
    let (output, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| TransactionError::Serialization(e.to_string()))?;
    Ok(output)
}

/// Root-addressed read access to the UTXO set.
///
/// Must be safe to call concurrently with independent readers at arbitrary
/// roots.
pub trait UtxoTrie: Send + Sync {
    /// Look up the leaf stored under `key` in the set committed by `root`.
    fn lookup(&self, root: &Hash256, key: &[u8]) -> Result<Option<Vec<u8>>, UtxoError>;
}

/// Copy-on-write overlay over a trie snapshot.
///
/// Cluster simulation applies transactions in order against this buffer:
/// inputs are consumed (tombstoned), outputs are produced. The underlying
/// trie is never modified.
pub struct UtxoBuffer<'a> {
    trie: &'a dyn UtxoTrie,
    root: Hash256,
    /// `Some(leaf)` = produced or shadowing; `None` = consumed tombstone.
    overlay: HashMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> UtxoBuffer<'a> {
    /// Create a buffer snapshotted at `root`.
    pub fn new(trie: &'a dyn UtxoTrie, root: Hash256) -> Self {
        Self {
            trie,
            root,
            overlay: HashMap::new(),
        }
    }

    /// Current leaf under `key`, honoring overlay writes and tombstones.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, UtxoError> {
        if let Some(entry) = self.overlay.get(key) {
            return Ok(entry.clone());
        }
        self.trie.lookup(&self.root, key)
    }

    /// Consume the leaf under `key`, returning it if it was present.
    ///
    /// The key is tombstoned so a second consume observes it as spent.
    pub fn consume(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, UtxoError> {
        let leaf = self.get(key)?;
        if leaf.is_some() {
            self.overlay.insert(key.to_vec(), None);
        }
        Ok(leaf)
    }

    /// Produce a new leaf under `key`.
    pub fn produce(&mut self, key: &[u8], leaf: Vec<u8>) {
        self.overlay.insert(key.to_vec(), Some(leaf));
    }
}

/// In-memory rooted UTXO store.
///
/// Holds complete key/leaf maps per root. Suitable for tests and local
/// simulation; production nodes back [`UtxoTrie`] with a persistent hashed
/// trie.
#[derive(Default)]
pub struct MemoryUtxoTrie {
    roots: RwLock<HashMap<Hash256, HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryUtxoTrie {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a leaf under `root`, creating the root if absent.
    pub fn insert_leaf(&self, root: Hash256, key: &[u8], leaf: Vec<u8>) {
        self.roots
            .write()
            .entry(root)
            .or_default()
            .insert(key.to_vec(), leaf);
    }

    /// Remove a leaf under `root`. Returns whether it was present.
    pub fn remove_leaf(&self, root: &Hash256, key: &[u8]) -> bool {
        match self.roots.write().get_mut(root) {
            Some(leaves) => leaves.remove(key).is_some(),
            None => false,
        }
    }

    /// Copy all leaves of `from` under a new root `to`.
    ///
    /// Useful for deriving a successor snapshot and then mutating it.
    pub fn clone_root(&self, from: &Hash256, to: Hash256) {
        let mut roots = self.roots.write();
        let leaves = roots.get(from).cloned().unwrap_or_default();
        roots.insert(to, leaves);
    }

    /// Number of leaves under `root`.
    pub fn leaf_count(&self, root: &Hash256) -> usize {
        self.roots.read().get(root).map_or(0, HashMap::len)
    }
}

impl UtxoTrie for MemoryUtxoTrie {
    fn lookup(&self, root: &Hash256, key: &[u8]) -> Result<Option<Vec<u8>>, UtxoError> {
        Ok(self
            .roots
            .read()
            .get(root)
            .and_then(|leaves| leaves.get(key).cloned()))
    }
}
