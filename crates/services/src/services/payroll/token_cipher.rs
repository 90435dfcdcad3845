//! AES-256-GCM sealing for provider tokens at rest.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TokenCipherError {
    #[error("token is not valid base64: {0}")]
    Encoding(String),
    #[error("token ciphertext is truncated")]
    Truncated,
    #[error("token could not be decrypted")]
    Decrypt,
    #[error("token could not be encrypted")]
    Encrypt,
    #[error("decrypted token is not utf-8")]
    NotUtf8,
}

/// Output layout: base64(nonce || ciphertext || tag)
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, TokenCipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| TokenCipherError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, sealed: &str) -> Result<String, TokenCipherError> {
        let raw = STANDARD
            .decode(sealed.trim())
            .map_err(|e| TokenCipherError::Encoding(e.to_string()))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(TokenCipherError::Truncated);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| TokenCipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| TokenCipherError::NotUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_token_opens_with_same_key() {
        let cipher = TokenCipher::new(&[3u8; 32]);
        let sealed = cipher.encrypt("gusto-access-token").unwrap();
        assert_ne!(sealed, "gusto-access-token");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "gusto-access-token");
    }

    #[test]
    fn nonce_makes_ciphertexts_differ() {
        let cipher = TokenCipher::new(&[3u8; 32]);
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_key_or_tampering_is_rejected() {
        let sealed = TokenCipher::new(&[3u8; 32]).encrypt("secret").unwrap();
        assert_eq!(
            TokenCipher::new(&[4u8; 32]).decrypt(&sealed),
            Err(TokenCipherError::Decrypt)
        );

        let mut raw = STANDARD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert_eq!(
            TokenCipher::new(&[3u8; 32]).decrypt(&STANDARD.encode(raw)),
            Err(TokenCipherError::Decrypt)
        );
    }

    #[test]
    fn garbage_input_is_rejected() {
        let cipher = TokenCipher::new(&[3u8; 32]);
        assert!(matches!(
            cipher.decrypt("not base64!!"),
            Err(TokenCipherError::Encoding(_))
        ));
        assert_eq!(
            cipher.decrypt(&STANDARD.encode([0u8; 8])),
            Err(TokenCipherError::Truncated)
        );
    }
}
