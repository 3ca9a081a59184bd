//! Error types for the Tarn protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("zero-value output at index {0}")] ZeroValueOutput(usize),
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("oversized: {size} > {max}")] OversizedTransaction { size: usize, max: usize },
    #[error("value overflow")] ValueOverflow,
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("declared fee {declared} does not match input/output difference {actual}")] FeeMismatch { declared: u64, actual: u64 },
    #[error("invalid signature on input {index}")] InvalidSignature { index: usize },
    #[error("missing unspent output: {0}")] MissingUtxo(String),
    #[error("output to shard {shard} before shard activation")] ShardNotActive { shard: u32 },
    #[error("serialization: {0}")] Serialization(String),
    #[error("utxo lookup failed: {0}")] UtxoLookup(#[from] UtxoError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("public key does not hash to the claimed spec hash")] SpecHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UtxoError {
    #[error("trie lookup: {0}")] Lookup(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("peer disconnected: {0}")] PeerDisconnected(String),
    #[error("no peers available")] NoPeers,
    #[error("timeout")] Timeout,
}

/// Admission and rebuild errors surfaced by the mempool.
///
/// Duplicate submissions are not errors; `admit` returns `Ok(false)` for
/// them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("malformed transaction: {0}")] Malformed(#[from] TransactionError),
    #[error("mempool is full")] PoolFull,
    #[error("mempool is too full for low fee transactions")] PoolFullLowFee,
    #[error("outpoint {outpoint} already claimed by {existing}")] DoubleSpend { outpoint: String, existing: String },
    #[error("unable to find source tx {0}")] UnknownInput(String),
    #[error("tx {txid} depends on an output in uncovered shard {shard}")] CrossShardDependency { txid: String, shard: u32 },
    #[error("cluster failed validation: {0}")] InvalidCluster(TransactionError),
    #[error(transparent)] Utxo(#[from] UtxoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_display() {
        let errors: Vec<MempoolError> = vec![
            MempoolError::Malformed(TransactionError::EmptyInputsOrOutputs),
            MempoolError::PoolFull,
            MempoolError::PoolFullLowFee,
            MempoolError::DoubleSpend { outpoint: "op:0".into(), existing: "abc".into() },
            MempoolError::UnknownInput("def".into()),
            MempoolError::CrossShardDependency { txid: "abc".into(), shard: 3 },
            MempoolError::InvalidCluster(TransactionError::MissingUtxo("op:1".into())),
        ];
        for e in &errors {
            assert!(!format!("{e}").is_empty());
        }
    }

    #[test]
    fn transaction_error_converts() {
        let e: MempoolError = TransactionError::ValueOverflow.into();
        assert_eq!(e, MempoolError::Malformed(TransactionError::ValueOverflow));
    }

    #[test]
    fn utxo_error_converts() {
        let e: TransactionError = UtxoError::Lookup("boom".into()).into();
        assert!(matches!(e, TransactionError::UtxoLookup(_)));
    }
}
