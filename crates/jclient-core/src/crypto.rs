//! Login credential encryption
//!
//! AES-128-CBC without block padding. Plaintext and key are padded with
//! `-` to the block size; the key is cut to 16 bytes when longer.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

use crate::error::{ClientError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const BLOCK: usize = 16;
const PAD: u8 = b'-';

/// Encrypted credential for a login request
///
/// Created per login and consumed by the session client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialToken {
    pub uid: String,
    /// Base64 ciphertext
    pub token: String,
    /// Base64 initialization vector
    pub iv: String,
}

impl CredentialToken {
    /// Encrypt `uid` with `pswd` under a fresh random IV
    pub fn new(uid: &str, pswd: &str) -> Result<Self> {
        let iv = random_iv();
        Self::with_iv(uid, pswd, &iv)
    }

    /// Encrypt with a caller supplied IV
    pub fn with_iv(uid: &str, pswd: &str, iv: &[u8; BLOCK]) -> Result<Self> {
        let cipher = encrypt(uid, pswd, iv)?;
        Ok(Self {
            uid: uid.to_string(),
            token: STANDARD.encode(cipher),
            iv: STANDARD.encode(iv),
        })
    }
}

/// 16 fresh random bytes
pub fn random_iv() -> [u8; BLOCK] {
    let mut iv = [0u8; BLOCK];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt `plain` with `key`
pub fn encrypt(plain: &str, key: &str, iv: &[u8; BLOCK]) -> Result<Vec<u8>> {
    let key = pad_key(key);
    let buf = pad_plain(plain.as_bytes());

    Ok(Aes128CbcEnc::new(&key.into(), &(*iv).into()).encrypt_padded_vec_mut::<NoPadding>(&buf))
}

/// Decrypt `cipher` with `key`, stripping the `-` padding
pub fn decrypt(cipher: &[u8], key: &str, iv: &[u8; BLOCK]) -> Result<String> {
    let key = pad_key(key);
    let plain = Aes128CbcDec::new(&key.into(), &(*iv).into())
        .decrypt_padded_vec_mut::<NoPadding>(cipher)
        .map_err(|e| ClientError::CryptoError(format!("Failed to decrypt: {e}")))?;

    let text = String::from_utf8(plain)
        .map_err(|e| ClientError::CryptoError(format!("Decrypted text isn't utf-8: {e}")))?;
    Ok(text.trim_end_matches(PAD as char).to_string())
}

/// Decode a base64 IV
pub fn decode_iv(iv64: &str) -> Result<[u8; BLOCK]> {
    let bytes = STANDARD
        .decode(iv64)
        .map_err(|e| ClientError::CryptoError(format!("Invalid iv: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| ClientError::CryptoError(format!("IV must be 16 bytes, got {}", b.len())))
}

fn pad_key(key: &str) -> [u8; BLOCK] {
    let mut k = [PAD; BLOCK];
    for (dst, src) in k.iter_mut().zip(key.as_bytes()) {
        *dst = *src;
    }
    k
}

fn pad_plain(plain: &[u8]) -> Vec<u8> {
    let len = ((plain.len() + BLOCK - 1) / BLOCK).max(1) * BLOCK;
    let mut buf = vec![PAD; len];
    buf[..plain.len()].copy_from_slice(plain);
    buf
}
