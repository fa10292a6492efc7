//! Cryptographic functions for the cube protocol
//! Uses AES-128 one block at a time (ECB, no IV, no chaining)

use crate::BLOCK_SIZE;
use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use thiserror::Error;

/// Key size (16 bytes for AES-128)
pub const KEY_SIZE: usize = 16;

/// Key baked into the cube firmware
pub const DEFAULT_KEY: [u8; KEY_SIZE] = [
    87, 177, 249, 171, 205, 90, 232, 167, 156, 185, 140, 231, 87, 140, 81, 8,
];

/// Crypto errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Ciphertext length {0} is not a positive multiple of 16")]
    CipherLength(usize),

    #[error("Invalid key length (expected {expected}, got {got})")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid hex in key: {0}")]
    InvalidKeyHex(String),
}

/// Symmetric key shared with the cube
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CipherKey([u8; KEY_SIZE]);

impl CipherKey {
    pub const fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            got: bytes.len(),
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl Default for CipherKey {
    fn default() -> Self {
        Self(DEFAULT_KEY)
    }
}

// Keep key material out of logs
impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

/// Block codec keyed once at construction
#[derive(Clone)]
pub struct CubeCipher {
    aes: Aes128,
}

impl CubeCipher {
    pub fn new(key: &CipherKey) -> Self {
        Self {
            aes: Aes128::new(key.as_bytes().into()),
        }
    }

    /// Encrypt `plaintext`, zero-padding it to the next block boundary
    ///
    /// The padding is not self-describing: the receiver relies on the
    /// frame's own length byte to find the real payload.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut output = plaintext.to_vec();
        let remainder = output.len() % BLOCK_SIZE;
        if remainder != 0 {
            output.resize(output.len() + BLOCK_SIZE - remainder, 0);
        }

        for block in output.chunks_exact_mut(BLOCK_SIZE) {
            self.aes.encrypt_block(block.into());
        }
        output
    }

    /// Decrypt `ciphertext` block by block
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - Plaintext, same length as the input (padding included)
    /// * `Err(CryptoError::CipherLength)` - Input empty or not block aligned
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::CipherLength(ciphertext.len()));
        }

        let mut output = ciphertext.to_vec();
        for block in output.chunks_exact_mut(BLOCK_SIZE) {
            self.aes.decrypt_block(block.into());
        }
        Ok(output)
    }
}

impl Default for CubeCipher {
    fn default() -> Self {
        Self::new(&CipherKey::default())
    }
}

/// Parse hex-encoded key from configuration
///
/// # Arguments
/// * `hex_str` - Hex string (32 characters = 16 bytes)
pub fn parse_key(hex_str: &str) -> Result<CipherKey, CryptoError> {
    let bytes = hex::decode(hex_str.trim()).map_err(|e| CryptoError::InvalidKeyHex(e.to_string()))?;
    CipherKey::from_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        (0..len).map(|_| rng.r#gen()).collect()
    }

    #[test]
    fn test_known_answer_zero_block() {
        let cipher = CubeCipher::default();
        let ciphertext = cipher.encrypt(&[0u8; 16]);
        assert_eq!(hex::encode(&ciphertext), "4e7fed1cb670c21c17a77122220e8837");
    }

    #[test]
    fn test_encrypt_decrypt_aligned() {
        let cipher = CubeCipher::default();
        for len in [16, 32, 48, 96] {
            let plaintext = random_bytes(len);
            let ciphertext = cipher.encrypt(&plaintext);
            assert_eq!(ciphertext.len(), len);
            assert_eq!(cipher.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_encrypt_pads_with_zeros() {
        let cipher = CubeCipher::default();
        for len in [1, 9, 15, 17, 21, 31] {
            let plaintext = random_bytes(len);
            let ciphertext = cipher.encrypt(&plaintext);
            assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);
            assert!(ciphertext.len() > len);

            let decrypted = cipher.decrypt(&ciphertext).unwrap();
            assert_eq!(&decrypted[..len], &plaintext[..]);
            assert!(decrypted[len..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_blocks_are_independent() {
        // No chaining: identical plaintext blocks give identical ciphertext blocks
        let cipher = CubeCipher::default();
        let block = random_bytes(16);
        let mut plaintext = block.clone();
        plaintext.extend_from_slice(&block);

        let ciphertext = cipher.encrypt(&plaintext);
        assert_eq!(ciphertext[..16], ciphertext[16..]);
    }

    #[test]
    fn test_decrypt_rejects_unaligned() {
        let cipher = CubeCipher::default();
        assert_eq!(cipher.decrypt(&[0u8; 15]), Err(CryptoError::CipherLength(15)));
        assert_eq!(cipher.decrypt(&[0u8; 17]), Err(CryptoError::CipherLength(17)));
        assert_eq!(cipher.decrypt(&[]), Err(CryptoError::CipherLength(0)));
    }

    #[test]
    fn test_decrypt_wrong_key_differs() {
        let plaintext = random_bytes(32);
        let ciphertext = CubeCipher::default().encrypt(&plaintext);

        let other = CubeCipher::new(&CipherKey::new([0x11; KEY_SIZE]));
        assert_ne!(other.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_parse_key() {
        let hex = "57b1f9abcd5ae8a79cb98ce7578c5108";
        let key = parse_key(hex).unwrap();
        assert_eq!(key, CipherKey::default());
        assert_eq!(key.as_bytes()[0], 0x57);
        assert_eq!(key.as_bytes()[15], 0x08);
    }

    #[test]
    fn test_parse_invalid_key() {
        // Too short
        assert_eq!(
            parse_key("abcd"),
            Err(CryptoError::InvalidKeyLength { expected: 16, got: 2 })
        );

        // Invalid hex
        assert!(matches!(
            parse_key("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(CryptoError::InvalidKeyHex(_))
        ));
    }

    #[test]
    fn test_key_debug_hides_bytes() {
        let rendered = format!("{:?}", CipherKey::default());
        assert!(!rendered.contains("87"));
    }
}
