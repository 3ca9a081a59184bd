//! Core protocol types: hashes, outpoints, transactions.
//!
//! All monetary values are integer base units. Transaction identity is the
//! BLAKE3 hash of the canonical bincode encoding; serialized size is the
//! length of that same encoding, so the two always agree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransactionError;

/// A 32-byte hash value.
///
/// Used for transaction IDs, UTXO root commitments, and address spec hashes
/// (BLAKE3 of the owning public key).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
///
/// Total-ordered (txid, then index) so collections over outpoints iterate
/// deterministically.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
///
/// Inputs carry the *claimed* spec hash and value of the output they spend.
/// The UTXO trie key embeds both, so a successful lookup proves the claim;
/// a wrong claim simply fails to resolve.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent.
    pub previous_output: OutPoint,
    /// Spec hash of the output's owner (BLAKE3 of their public key).
    pub spec_hash: Hash256,
    /// Claimed value of the spent output in base units.
    pub value: u64,
    /// Ed25519 signature (64 bytes) over the input sighash.
    pub signature: Vec<u8>,
    /// Ed25519 public key (32 bytes) whose spec hash must equal `spec_hash`.
    pub public_key: Vec<u8>,
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in base units.
    pub value: u64,
    /// Spec hash of the recipient.
    pub recipient_spec_hash: Hash256,
    /// Shard this output lands in.
    pub target_shard: u32,
}

/// A transaction transferring value between addresses.
///
/// The fee is declared explicitly and must equal the difference between
/// claimed input values and output values ([`validate_basics`] checks this;
/// cluster simulation ties the claims to the UTXO trie).
///
/// [`validate_basics`]: crate::validation::validate_basics
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Declared fee in base units (`sum(input values) - sum(output values)`).
    pub fee: u64,
    /// Block height before which this tx is invalid.
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        Ok(Hash256(blake3::hash(&self.encode()?).into()))
    }

    /// Serialized length in bytes of the canonical encoding.
    pub fn encoded_size(&self) -> Result<usize, TransactionError> {
        Ok(self.encode()?.len())
    }

    /// Canonical bincode encoding (standard config, deterministic).
    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Sum of all claimed input values. Returns None on overflow.
    pub fn total_input_value(&self) -> Option<u64> {
        self.inputs
            .iter()
            .try_fold(0u64, |acc, input| acc.checked_add(input.value))
    }
}

/// Header of the block a transaction cluster is simulated against.
///
/// Synthesized by the cluster builder for the *next* block: height is the
/// current tip height plus one, version is 2 once the shard activation
/// height is reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Header version; 2 enables cross-shard output export.
    pub version: u64,
    /// Block height this header stands in for.
    pub height: u64,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
}
