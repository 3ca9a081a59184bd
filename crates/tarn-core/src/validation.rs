//! Transaction validation.
//!
//! Two levels:
//!
//! - **Basics** ([`validate_basics`]): context-free checks on format,
//!   declared-value conservation, and input signatures. No external state.
//! - **Deep** ([`validate_deep`]): applies the transaction to a
//!   [`UtxoBuffer`], consuming inputs and producing outputs. Used by cluster
//!   simulation to prove a dependency chain confirms in order.
//!
//! An input's spec hash and value are *claims*: basics verifies the
//! signature against the claimed owner, and deep validation resolves the
//! claim against the UTXO set (the trie key embeds both fields, so a wrong
//! claim simply finds no leaf).

use std::collections::{BTreeMap, HashSet};

use crate::crypto;
use crate::error::TransactionError;
use crate::params::{Params, MAX_TX_SIZE};
use crate::types::{BlockHeader, OutPoint, Transaction, TxOutput};
use crate::utxo::{encode_leaf, input_utxo_key, output_utxo_key, UtxoBuffer};

/// Outputs routed to shards outside this node's cover set, keyed by shard.
pub type ExportMap = BTreeMap<u32, Vec<(OutPoint, TxOutput)>>;

/// Validate transaction basics (context-free).
///
/// - Non-empty inputs and outputs
/// - All output values are non-zero
/// - No duplicate input outpoints
/// - Input/output totals do not overflow
/// - Declared fee equals claimed input total minus output total
/// - Serialized size is within [`MAX_TX_SIZE`]
/// - Each input carries a valid Ed25519 signature by the claimed owner
pub fn validate_basics(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }

    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value == 0 {
            return Err(TransactionError::ZeroValueOutput(i));
        }
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(&input.previous_output) {
            return Err(TransactionError::DuplicateInput(
                input.previous_output.to_string(),
            ));
        }
    }

    let input_total = tx
        .total_input_value()
        .ok_or(TransactionError::ValueOverflow)?;
    let output_total = tx
        .total_output_value()
        .ok_or(TransactionError::ValueOverflow)?;

    if input_total < output_total {
        return Err(TransactionError::InsufficientFunds {
            have: input_total,
            need: output_total,
        });
    }
    let actual_fee = input_total - output_total;
    if actual_fee != tx.fee {
        return Err(TransactionError::FeeMismatch {
            declared: tx.fee,
            actual: actual_fee,
        });
    }

    let size = tx.encoded_size()?;
    if size > MAX_TX_SIZE {
        return Err(TransactionError::OversizedTransaction {
            size,
            max: MAX_TX_SIZE,
        });
    }

    for (i, input) in tx.inputs.iter().enumerate() {
        if input.signature.len() != 64 || input.public_key.len() != 32 {
            return Err(TransactionError::InvalidSignature { index: i });
        }
        crypto::verify_transaction_input(tx, i, &input.spec_hash)
            .map_err(|_| TransactionError::InvalidSignature { index: i })?;
    }

    Ok(())
}

/// Apply a transaction to a UTXO buffer (deep validation).
///
/// Consumes every input's leaf from the buffer and produces the outputs.
/// Outputs targeting a shard outside `shard_cover` are recorded in
/// `export_map` instead; that is only legal once sharding is active for the
/// header being validated against.
///
/// On error the buffer may hold a partial application; callers discard it.
pub fn validate_deep(
    tx: &Transaction,
    buffer: &mut UtxoBuffer<'_>,
    header: &BlockHeader,
    params: &Params,
    shard_cover: &HashSet<u32>,
    export_map: &mut ExportMap,
) -> Result<(), TransactionError> {
    let txid = tx.txid()?;

    for input in &tx.inputs {
        let key = input_utxo_key(input);
        if buffer.consume(&key)?.is_none() {
            return Err(TransactionError::MissingUtxo(
                input.previous_output.to_string(),
            ));
        }
    }

    let shards_active =
        header.version >= 2 && params.activation_height_shards <= header.height;

    for (index, output) in tx.outputs.iter().enumerate() {
        let index = index as u32;
        if shard_cover.contains(&output.target_shard) {
            let key = output_utxo_key(&txid, index, output);
            buffer.produce(&key, encode_leaf(output)?);
        } else {
            if !shards_active {
                return Err(TransactionError::ShardNotActive {
                    shard: output.target_shard,
                });
            }
            export_map
                .entry(output.target_shard)
                .or_default()
                .push((OutPoint { txid, index }, output.clone()));
        }
    }

    Ok(())
}
