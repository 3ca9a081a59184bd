//! Ed25519 cryptographic operations for the Tarn protocol.
//!
//! Provides key generation, input signing, and signature verification.
//! Uses ed25519-dalek for the underlying Ed25519 implementation and BLAKE3
//! for spec hashing and signing hashes.
//!
//! # Signing scheme
//!
//! Transaction inputs are signed over a **sighash** that commits to:
//! - Transaction version, lock_time, and declared fee
//! - All input outpoints plus their claimed spec hashes and values
//! - All outputs (value, recipient spec hash, target shard)
//! - The index of the input being signed
//!
//! Signatures and public keys are excluded from the sighash to avoid
//! circularity and allow inputs to be signed independently in any order.

use ed25519_dalek::{Signer, Verifier};
use std::fmt;

use crate::error::CryptoError;
use crate::types::{Hash256, Transaction};

/// Ed25519 keypair for signing transaction inputs.
///
/// Wraps [`ed25519_dalek::SigningKey`]. Use [`KeyPair::generate`] for random
/// keys or [`KeyPair::from_secret_bytes`] for deterministic derivation.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    /// Derive the public key from this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key for verifying signatures and deriving spec hashes.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    /// Get the raw public key bytes (32 bytes).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Compute the BLAKE3 spec hash identifying this key as an address.
    pub fn spec_hash(&self) -> Hash256 {
        spec_hash_of(&self.to_bytes())
    }

    /// Verify an Ed25519 signature on a message.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

/// BLAKE3 spec hash of raw public key bytes.
pub fn spec_hash_of(public_key: &[u8; 32]) -> Hash256 {
    Hash256(blake3::hash(public_key).into())
}

/// Compute the sighash for one input of a transaction.
fn input_sighash(tx: &Transaction, input_index: usize) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&tx.version.to_le_bytes());
    hasher.update(&tx.lock_time.to_le_bytes());
    hasher.update(&tx.fee.to_le_bytes());
    hasher.update(&(input_index as u64).to_le_bytes());
    for input in &tx.inputs {
        hasher.update(input.previous_output.txid.as_bytes());
        hasher.update(&input.previous_output.index.to_le_bytes());
        hasher.update(input.spec_hash.as_bytes());
        hasher.update(&input.value.to_le_bytes());
    }
    for output in &tx.outputs {
        hasher.update(&output.value.to_le_bytes());
        hasher.update(output.recipient_spec_hash.as_bytes());
        hasher.update(&output.target_shard.to_le_bytes());
    }
    Hash256(hasher.finalize().into())
}

/// Sign one input of a transaction, filling in its signature and public key.
pub fn sign_transaction_input(
    tx: &mut Transaction,
    input_index: usize,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }
    let sighash = input_sighash(tx, input_index);
    let signature = keypair.sign(sighash.as_bytes());
    tx.inputs[input_index].signature = signature.to_vec();
    tx.inputs[input_index].public_key = keypair.public_key().to_bytes().to_vec();
    Ok(())
}

/// Verify one input's signature against the claimed owner spec hash.
///
/// Checks that the input's public key hashes to `expected_spec_hash` and
/// that its signature covers the input sighash.
pub fn verify_transaction_input(
    tx: &Transaction,
    input_index: usize,
    expected_spec_hash: &Hash256,
) -> Result<(), CryptoError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        })?;

    let pk_bytes: [u8; 32] = input
        .public_key
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let public_key = PublicKey::from_bytes(&pk_bytes)?;

    if public_key.spec_hash() != *expected_spec_hash {
        return Err(CryptoError::SpecHashMismatch);
    }

    let sig_bytes: [u8; 64] = input
        .signature
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;

    let sighash = input_sighash(tx, input_index);
    public_key.verify(sighash.as_bytes(), &sig_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutPoint, TxInput, TxOutput};

    fn unsigned_tx(spec_hash: Hash256) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint {
                    txid: Hash256([0x11; 32]),
                    index: 0,
                },
                spec_hash,
                value: 100,
                signature: vec![],
                public_key: vec![],
            }],
            outputs: vec![TxOutput {
                value: 95,
                recipient_spec_hash: Hash256([0x33; 32]),
                target_shard: 0,
            }],
            fee: 5,
            lock_time: 0,
        }
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let kp = KeyPair::from_secret_bytes([7u8; 32]);
        let mut tx = unsigned_tx(kp.public_key().spec_hash());
        sign_transaction_input(&mut tx, 0, &kp).unwrap();
        verify_transaction_input(&tx, 0, &kp.public_key().spec_hash()).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_output() {
        let kp = KeyPair::from_secret_bytes([7u8; 32]);
        let mut tx = unsigned_tx(kp.public_key().spec_hash());
        sign_transaction_input(&mut tx, 0, &kp).unwrap();
        tx.outputs[0].value = 96;
        assert_eq!(
            verify_transaction_input(&tx, 0, &kp.public_key().spec_hash()).unwrap_err(),
            CryptoError::VerificationFailed
        );
    }

    #[test]
    fn verify_rejects_wrong_owner() {
        let signer = KeyPair::from_secret_bytes([7u8; 32]);
        let owner = KeyPair::from_secret_bytes([8u8; 32]);
        let mut tx = unsigned_tx(owner.public_key().spec_hash());
        sign_transaction_input(&mut tx, 0, &signer).unwrap();
        assert_eq!(
            verify_transaction_input(&tx, 0, &owner.public_key().spec_hash()).unwrap_err(),
            CryptoError::SpecHashMismatch
        );
    }

    #[test]
    fn sign_out_of_bounds_index() {
        let kp = KeyPair::generate();
        let mut tx = unsigned_tx(kp.public_key().spec_hash());
        assert!(matches!(
            sign_transaction_input(&mut tx, 5, &kp).unwrap_err(),
            CryptoError::InputIndexOutOfBounds { index: 5, len: 1 }
        ));
    }

    #[test]
    fn verify_rejects_malformed_key_bytes() {
        let kp = KeyPair::generate();
        let mut tx = unsigned_tx(kp.public_key().spec_hash());
        sign_transaction_input(&mut tx, 0, &kp).unwrap();
        tx.inputs[0].public_key = vec![0u8; 31];
        assert_eq!(
            verify_transaction_input(&tx, 0, &kp.public_key().spec_hash()).unwrap_err(),
            CryptoError::InvalidPublicKey
        );
    }

    #[test]
    fn spec_hash_deterministic() {
        let kp = KeyPair::from_secret_bytes([9u8; 32]);
        assert_eq!(kp.public_key().spec_hash(), kp.public_key().spec_hash());
        assert_eq!(
            kp.public_key().spec_hash(),
            spec_hash_of(&kp.public_key().to_bytes())
        );
    }
}
