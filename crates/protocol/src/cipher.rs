//! Envelope encryption for cipher-mode connections.
//!
//! After a successful challenge/response handshake the whole JSON text of
//! every envelope is encrypted before transmission and decrypted on receipt;
//! ciphertext travels as a base64 text frame in place of the JSON.
//!
//! ## Construction
//!
//! AES-256-CBC with PKCS#7 padding. Both halves of the key context are
//! opaque configuration strings, normalized to cipher-sized material by
//! hashing:
//!
//! ```text
//! key = SHA-256(private key)
//! iv  = SHA-256(public key/identifier)[..16]
//! ```
//!
//! The same context must be configured on both peers; decrypting with a
//! mismatched context fails at the padding or UTF-8 check.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use sha2::{Digest, Sha256};

use crate::error::{ProtocolError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Number of IV bytes taken from the public-key digest.
const IV_LEN: usize = 16;

/// Symmetric key context for envelope encryption.
///
/// Cheap to build and stateless; one instance per (public key, private key)
/// pair. Whether envelopes actually pass through it is decided by the
/// connection's cipher-active flag, which only the handshake may set.
#[derive(Clone)]
pub struct EnvelopeCipher {
    key: [u8; 32],
    iv: [u8; IV_LEN],
}

impl EnvelopeCipher {
    /// Derive a cipher context from the configured key pair.
    pub fn new(public_key: &str, private_key: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(private_key.as_bytes()).into();
        let digest = Sha256::digest(public_key.as_bytes());
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&digest[..IV_LEN]);
        Self { key, iv }
    }

    /// Encrypt envelope text, returning the base64 frame to transmit.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        BASE64.encode(ciphertext)
    }

    /// Decrypt a base64 frame back into envelope text.
    pub fn decrypt(&self, frame: &str) -> Result<String> {
        let ciphertext = BASE64.decode(frame.trim())?;
        if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
            return Err(ProtocolError::Decryption(format!(
                "ciphertext length {} is not a whole number of blocks",
                ciphertext.len()
            )));
        }
        let plaintext = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| ProtocolError::Decryption("invalid padding".to_string()))?;
        String::from_utf8(plaintext)
            .map_err(|e| ProtocolError::Decryption(format!("plaintext is not utf-8: {e}")))
    }
}

impl std::fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCipher")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}
