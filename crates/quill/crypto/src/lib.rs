//! Cryptographic primitives for Quill.
//!
//! Ed25519 key pairs sign permission tickets; BLAKE3 provides every digest in
//! the system, always behind an explicit domain prefix. Verification failures
//! are typed errors, never booleans.

#![deny(unsafe_code)]

use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use quill_types::ActorId;

/// Crypto-layer errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key material")]
    InvalidKey,

    #[error("signature does not verify under the given key")]
    SignatureMismatch,
}

/// An Ed25519 public key, stored as its canonical 32 bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// The actor identity bound to this key.
    pub fn actor_id(&self) -> ActorId {
        ActorId::derive_from_key(&self.0)
    }

    /// Verify `signature` over `message` under this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|_| CryptoError::InvalidKey)?;
        key.verify(message, &signature.0)
            .map_err(|_| CryptoError::SignatureMismatch)
    }
}

/// An Ed25519 signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub ed25519_dalek::Signature);

/// An Ed25519 signing key pair. Secret material is zeroized on drop by the
/// underlying implementation.
pub struct Keypair {
    signing: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing: ed25519_dalek::SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic key pair from a 32-byte seed. The local seed copy is
    /// wiped before returning.
    pub fn from_seed(mut seed: [u8; 32]) -> Self {
        let signing = ed25519_dalek::SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing }
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// The actor identity of this key pair's public half.
    pub fn actor_id(&self) -> ActorId {
        self.public().actor_id()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message))
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public())
            .finish_non_exhaustive()
    }
}

/// Domain-separated BLAKE3 digest over an ordered sequence of parts.
///
/// Each part is length-prefixed so adjacent parts cannot be reassociated.
pub fn domain_digest(domain: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
