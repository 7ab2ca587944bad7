//! Pluggable compression and encryption, consumed as black-box transforms
//! on the framed-batch byte pipeline. The segment layer never inspects
//! plaintext; it only ever sees the bytes these traits hand back.

use std::io::{Read, Write};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed (auth tag mismatch or corrupt ciphertext)")]
    Decrypt,
}

pub trait Compressor: Send + Sync {
    fn compress(&self, level: u32, data: &[u8]) -> Result<Vec<u8>, TransformError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// zlib/deflate via `flate2`, the same compression family the rest of
/// the corpus reaches for when it needs to shrink batched payloads.
pub struct ZlibCompressor;

impl Compressor for ZlibCompressor {
    fn compress(&self, level: u32, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(data).map_err(TransformError::Compress)?;
        encoder.finish().map_err(TransformError::Compress)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(TransformError::Decompress)?;
        Ok(out)
    }
}

/// 256-bit key, 96-bit IV AEAD. The caller supplies both; key management
/// itself is out of scope here, as it is for the transform consumers
/// upstream of this crate.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, key: &[u8; 32], iv: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, TransformError>;
    fn decrypt(&self, key: &[u8; 32], iv: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>, TransformError>;
}

pub struct AesGcmEncryptor;

impl Encryptor for AesGcmEncryptor {
    fn encrypt(&self, key: &[u8; 32], iv: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, TransformError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .encrypt(Nonce::from_slice(iv), plaintext)
            .map_err(|_| TransformError::Encrypt)
    }

    fn decrypt(&self, key: &[u8; 32], iv: &[u8; 12], ciphertext: &[u8]) -> Result<Vec<u8>, TransformError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| TransformError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_round_trips() {
        let compressor = ZlibCompressor;
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = compressor.compress(6, &data).unwrap();
        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn aes_gcm_round_trips() {
        let encryptor = AesGcmEncryptor;
        let key = [7u8; 32];
        let iv = [3u8; 12];
        let plaintext = b"sensitive audit payload";
        let ciphertext = encryptor.encrypt(&key, &iv, plaintext).unwrap();
        let decrypted = encryptor.decrypt(&key, &iv, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn aes_gcm_detects_tamper() {
        let encryptor = AesGcmEncryptor;
        let key = [7u8; 32];
        let iv = [3u8; 12];
        let mut ciphertext = encryptor.encrypt(&key, &iv, b"payload").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(encryptor.decrypt(&key, &iv, &ciphertext).is_err());
    }
}
