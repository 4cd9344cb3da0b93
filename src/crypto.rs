//! # Crypto Sealing Adapter
//!
//! Sealed-box encryption of secret values against a provider-supplied
//! X25519 public key (libsodium `crypto_box_seal` format, which is what GitHub
//! expects for Actions secrets).
//!
//! The sealer is a process-wide singleton created on first use. Callers always
//! go through [`sealer`], which waits for initialization to finish, so no one
//! can seal before the primitive has passed its self-test.

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use crypto_box::aead::OsRng;
use crypto_box::{PublicKey, SecretKey, KEY_SIZE};
use tokio::sync::OnceCell;
use tracing::debug;

static SEALER: OnceCell<Sealer> = OnceCell::const_new();

/// Sender-anonymous sealed-box encryptor
#[derive(Debug)]
pub struct Sealer {
    _private: (),
}

/// Get the initialized sealer, initializing it on first call.
///
/// Concurrent first callers all wait on the same initialization.
///
/// # Errors
/// Returns an error if the self-test fails.
pub async fn sealer() -> Result<&'static Sealer> {
    SEALER.get_or_try_init(|| async { Sealer::init() }).await
}

impl Sealer {
    fn init() -> Result<Self> {
        let sealer = Self { _private: () };

        // Round-trip through an ephemeral key pair before anyone relies on it
        let secret = SecretKey::generate(&mut OsRng);
        let probe = b"repo-env-sync";
        let sealed = sealer.seal_bytes(probe, &secret.public_key())?;
        let opened = secret
            .unseal(&sealed)
            .map_err(|e| anyhow!("Sealed box self-test failed to open: {e}"))?;
        if opened != probe {
            bail!("Sealed box self-test produced mismatched plaintext");
        }

        debug!("Sealed box primitive ready");
        Ok(sealer)
    }

    /// Seal `plaintext` for the holder of `public_key_b64` and return base64 ciphertext
    ///
    /// # Errors
    /// Returns an error if the key is not base64 or not a 32-byte X25519 key.
    pub fn seal(&self, plaintext: &[u8], public_key_b64: &str) -> Result<String> {
        let public_key = decode_public_key(public_key_b64)?;
        let sealed = self.seal_bytes(plaintext, &public_key)?;
        Ok(general_purpose::STANDARD.encode(sealed))
    }

    fn seal_bytes(&self, plaintext: &[u8], public_key: &PublicKey) -> Result<Vec<u8>> {
        public_key
            .seal(&mut OsRng, plaintext)
            .map_err(|e| anyhow!("Failed to seal value: {e}"))
    }
}

fn decode_public_key(public_key_b64: &str) -> Result<PublicKey> {
    let bytes = general_purpose::STANDARD
        .decode(public_key_b64.trim())
        .context("Public key is not valid base64")?;
    let len = bytes.len();
    let bytes: [u8; KEY_SIZE] = bytes
        .try_into()
        .map_err(|_| anyhow!("Public key must be {KEY_SIZE} bytes, got {len}"))?;
    Ok(PublicKey::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (SecretKey, String) {
        let secret = SecretKey::generate(&mut OsRng);
        let public_b64 = general_purpose::STANDARD.encode(secret.public_key().as_bytes());
        (secret, public_b64)
    }

    #[tokio::test]
    async fn test_sealed_value_opens_with_recipient_key() {
        let (secret, public_b64) = keypair();
        let sealed = sealer().await.unwrap().seal(b"hunter2", &public_b64).unwrap();

        let raw = general_purpose::STANDARD.decode(&sealed).unwrap();
        assert_eq!(secret.unseal(&raw).unwrap(), b"hunter2");
    }

    #[tokio::test]
    async fn test_sealed_value_is_not_plaintext_and_not_deterministic() {
        let (_, public_b64) = keypair();
        let sealer = sealer().await.unwrap();
        let a = sealer.seal(b"hunter2", &public_b64).unwrap();
        let b = sealer.seal(b"hunter2", &public_b64).unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_other_key_cannot_open() {
        let (_, public_b64) = keypair();
        let (other, _) = keypair();
        let sealed = sealer().await.unwrap().seal(b"hunter2", &public_b64).unwrap();
        let raw = general_purpose::STANDARD.decode(&sealed).unwrap();
        assert!(other.unseal(&raw).is_err());
    }

    #[tokio::test]
    async fn test_concurrent_first_use_shares_one_instance() {
        let (a, b) = tokio::join!(sealer(), sealer());
        assert!(std::ptr::eq(a.unwrap(), b.unwrap()));
    }

    #[tokio::test]
    async fn test_rejects_bad_keys() {
        let sealer = sealer().await.unwrap();
        let err = sealer.seal(b"x", "not base64!").unwrap_err();
        assert!(err.to_string().contains("base64"));

        let short = general_purpose::STANDARD.encode([0u8; 16]);
        let err = sealer.seal(b"x", &short).unwrap_err();
        assert!(err.to_string().contains("32 bytes, got 16"));
    }
}
