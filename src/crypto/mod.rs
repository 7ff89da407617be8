//! AES-256-CBC payload encryption.
//!
//! Key derivation: SHA-256(password) → 32-byte key.  No salt by design;
//! the member header's `salt` field is reserved for a future KDF.
//!
//! Encrypted payload layout: `[ IV (16 B) | AES-256-CBC(PKCS#7-padded) ]`.
//! The IV is freshly random per encryption.  Decryption verifies every
//! PKCS#7 pad byte; any length or padding violation is reported as
//! [`CryptoError::DecryptionFailed`], which callers surface as a wrong
//! password.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Byte length of the IV prepended to every encrypted payload.
pub const IV_SIZE: usize = 16;

/// AES block size; ciphertext bodies are always a non-zero multiple.
pub const BLOCK_SIZE: usize = 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encrypted payload shorter than the {IV_SIZE}-byte IV")]
    TooShort,
    #[error("decryption failed — wrong password or corrupted payload")]
    DecryptionFailed,
}

/// Derive the 256-bit cipher key from a password.
pub fn derive_key(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

/// Encrypt `plaintext`, returning `IV || ciphertext`.
///
/// Empty plaintext still produces a full pad block, so the minimum output
/// is `IV_SIZE + BLOCK_SIZE` bytes.
pub fn encrypt(password: &str, plaintext: &[u8]) -> Vec<u8> {
    let key = derive_key(password);
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt a payload produced by [`encrypt`].
pub fn decrypt(password: &str, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < IV_SIZE {
        return Err(CryptoError::TooShort);
    }
    let (iv, body) = data.split_at(IV_SIZE);
    if body.is_empty() || body.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::DecryptionFailed);
    }
    let key = derive_key(password);
    Aes256CbcDec::new_from_slices(&key, iv)
        .map_err(|_| CryptoError::DecryptionFailed)?
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trip() {
        let data = b"attack at dawn";
        let sealed = encrypt("Test@123456", data);
        assert_eq!(sealed[IV_SIZE..].len() % BLOCK_SIZE, 0);
        assert_eq!(decrypt("Test@123456", &sealed).unwrap(), data);
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let sealed = encrypt("pw", b"");
        assert_eq!(sealed.len(), IV_SIZE + BLOCK_SIZE);
        assert_eq!(decrypt("pw", &sealed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn wrong_password_fails() {
        let sealed = encrypt("Test@123456", b"attack at dawn");
        assert!(decrypt("Wrong@123456", &sealed).is_err());
    }

    #[test]
    fn fresh_iv_per_call() {
        let a = encrypt("pw", b"same plaintext");
        let b = encrypt("pw", b"same plaintext");
        assert_ne!(a[..IV_SIZE], b[..IV_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let sealed = encrypt("pw", b"payload");
        assert!(decrypt("pw", &sealed[..IV_SIZE - 1]).is_err());
        assert!(decrypt("pw", &sealed[..IV_SIZE]).is_err());
        assert!(decrypt("pw", &sealed[..sealed.len() - 1]).is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            password in "[a-zA-Z0-9@#]{1,24}",
        ) {
            let sealed = encrypt(&password, &data);
            prop_assert_eq!(decrypt(&password, &sealed).unwrap(), data);
        }
    }
}
