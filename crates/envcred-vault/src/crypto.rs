//! AES-256-GCM sealing using the `ring` crate.
//!
//! Ciphertext travels as a single base64 string so it can be stored in a
//! JSON config object:
//!
//! ```text
//! base64( [12 bytes: nonce] [ciphertext + 16-byte GCM tag] )
//! ```
//!
//! A fresh random nonce is drawn for every call, so sealing the same
//! plaintext twice yields different envelopes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::aead::{self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the GCM nonce prefix in bytes.
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// PBKDF2-HMAC-SHA256 iteration count for passphrase-derived keys.
const PBKDF2_ITERATIONS: u32 = 600_000;

static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

/// Yields exactly one nonce; `ring` wants a sequence even for one-shot keys.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

fn check_key(key: &[u8]) -> std::result::Result<(), String> {
    if key.len() == KEY_LEN {
        Ok(())
    } else {
        Err(format!("key must be {KEY_LEN} bytes, got {}", key.len()))
    }
}

/// Encrypt `plaintext` under `key` and return the base64 envelope.
///
/// # Errors
///
/// Returns [`VaultError::EncryptionFailed`] if the key length is wrong or
/// `ring` reports a failure.
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<String> {
    check_key(key).map_err(|reason| VaultError::EncryptionFailed { reason })?;

    let mut nonce = [0u8; NONCE_LEN_BYTES];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "failed to generate random nonce".into(),
        })?;

    let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::EncryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;
    let mut sealing_key = SealingKey::new(unbound, SingleNonce(Some(nonce)));

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::EncryptionFailed {
            reason: "seal_in_place failed".into(),
        })?;

    let mut envelope = Vec::with_capacity(NONCE_LEN_BYTES + in_out.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&in_out);

    tracing::trace!(
        plaintext_len = plaintext.len(),
        envelope_len = envelope.len(),
        "sealed data"
    );

    Ok(STANDARD.encode(envelope))
}

/// Decrypt a base64 envelope produced by [`seal`].
///
/// # Errors
///
/// Returns [`VaultError::DecryptionFailed`] if the envelope is not valid
/// base64, is too short, or fails authentication (wrong key, tampering).
pub fn open(envelope: &str, key: &[u8]) -> Result<Vec<u8>> {
    check_key(key).map_err(|reason| VaultError::DecryptionFailed { reason })?;

    let raw = STANDARD
        .decode(envelope)
        .map_err(|e| VaultError::DecryptionFailed {
            reason: format!("envelope is not base64: {e}"),
        })?;

    if raw.len() < NONCE_LEN_BYTES {
        return Err(VaultError::DecryptionFailed {
            reason: format!("envelope is {} bytes, shorter than the nonce", raw.len()),
        });
    }

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN_BYTES);
    let mut nonce = [0u8; NONCE_LEN_BYTES];
    nonce.copy_from_slice(nonce_bytes);

    let unbound = UnboundKey::new(AEAD_ALG, key).map_err(|_| VaultError::DecryptionFailed {
        reason: "failed to create AES-256-GCM key".into(),
    })?;
    let mut opening_key = OpeningKey::new(unbound, SingleNonce(Some(nonce)));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::DecryptionFailed {
            reason: "authentication failed: wrong key or corrupted data".into(),
        })?
        .to_vec();

    tracing::trace!(plaintext_len = plaintext.len(), "opened envelope");
    Ok(plaintext)
}

/// Derive a 256-bit key from a `passphrase` and a known `salt` with
/// PBKDF2-HMAC-SHA256.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> [u8; KEY_LEN] {
    const ITERATIONS: std::num::NonZeroU32 = match std::num::NonZeroU32::new(PBKDF2_ITERATIONS) {
        Some(n) => n,
        None => panic!("PBKDF2_ITERATIONS must be non-zero"),
    };

    let mut key = [0u8; KEY_LEN];
    pbkdf2::derive(pbkdf2::PBKDF2_HMAC_SHA256, ITERATIONS, salt, passphrase, &mut key);
    key
}

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::Internal`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| VaultError::Internal("failed to generate random bytes".into()))?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
