//! Symmetric encryption for platform tokens at rest.
//!
//! Ciphertexts are `base64(nonce || ChaCha20-Poly1305 ciphertext)`. The key is
//! the SHA-256 digest of the configured secret.

use crate::error::BoardError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12;

#[derive(Clone)]
pub struct TokenCipher {
    cipher: ChaCha20Poly1305,
}

impl TokenCipher {
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&digest));
        Self { cipher }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, BoardError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| BoardError::Crypto(format!("encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, BoardError> {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| BoardError::Crypto(format!("invalid base64: {e}")))?;
        if raw.len() <= NONCE_SIZE {
            return Err(BoardError::Crypto("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| BoardError::Crypto(format!("decrypt failed: {e}")))?;
        String::from_utf8(plain).map_err(|e| BoardError::Crypto(e.to_string()))
    }

    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, BoardError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCipher(..)")
    }
}
