//! Default native AES primitive backed by the RustCrypto `aes` and `cbc` crates
//!
//! Speaks the same string protocol as a mobile native AES module: base64
//! payloads, hex keys and IVs, and a mode token such as `aes-256-cbc`.

use aes::{Aes128, Aes192, Aes256};
use cbc::{Decryptor as CbcDecryptor, Encryptor as CbcEncryptor};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

use super::backend::{AesError, NativeAes};
use super::encoding::{base64_to_bytes, bytes_to_base64, hex_to_bytes};

type Aes128CbcEnc = CbcEncryptor<Aes128>;
type Aes192CbcEnc = CbcEncryptor<Aes192>;
type Aes256CbcEnc = CbcEncryptor<Aes256>;
type Aes128CbcDec = CbcDecryptor<Aes128>;
type Aes192CbcDec = CbcDecryptor<Aes192>;
type Aes256CbcDec = CbcDecryptor<Aes256>;

/// AES block size in bytes, also the required IV length
const BLOCK_SIZE: usize = 16;

/// AES-CBC with PKCS#7 padding for 128, 192 and 256 bit keys
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoAes;

/// Decoded inputs for one cipher call
struct CbcInput {
    key_bits: usize,
    key: Vec<u8>,
    iv: Vec<u8>,
    data: Vec<u8>,
}

impl CbcInput {
    fn decode(data_base64: &str, key_hex: &str, iv_hex: &str, mode: &str) -> Result<Self, AesError> {
        let key_bits = parse_mode(mode)?;
        let key = hex_to_bytes(key_hex).map_err(AesError::Encoding)?;
        let iv = hex_to_bytes(iv_hex).map_err(AesError::Encoding)?;
        let data = base64_to_bytes(data_base64).map_err(AesError::Encoding)?;

        if key.len() * 8 != key_bits {
            return Err(AesError::InvalidKeyLength {
                mode: mode.to_string(),
                expected: key_bits / 8,
                actual: key.len(),
            });
        }
        if iv.len() != BLOCK_SIZE {
            return Err(AesError::InvalidIvLength(iv.len()));
        }

        Ok(Self {
            key_bits,
            key,
            iv,
            data,
        })
    }
}

/// Key size in bits from a token such as `aes-192-cbc`
fn parse_mode(mode: &str) -> Result<usize, AesError> {
    let lower = mode.to_lowercase();
    let bits = lower
        .strip_prefix("aes-")
        .and_then(|rest| rest.strip_suffix("-cbc"))
        .and_then(|bits| bits.parse::<usize>().ok());

    match bits {
        Some(bits @ (128 | 192 | 256)) => Ok(bits),
        _ => Err(AesError::UnsupportedMode(mode.to_string())),
    }
}

fn encrypt_blocks<E: KeyIvInit + BlockEncryptMut>(
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, AesError> {
    let cipher = E::new_from_slices(key, iv).map_err(|e| AesError::Cipher(e.to_string()))?;

    // PKCS7 always adds between 1 and BLOCK_SIZE bytes
    let padded_len = data.len() + BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut buffer = vec![0u8; padded_len];
    buffer[..data.len()].copy_from_slice(data);

    let len = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, data.len())
        .map_err(|_| AesError::Cipher("Encryption failed".to_string()))?
        .len();
    buffer.truncate(len);
    Ok(buffer)
}

fn decrypt_blocks<D: KeyIvInit + BlockDecryptMut>(
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, AesError> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(AesError::InvalidCiphertextLength(data.len()));
    }

    let cipher = D::new_from_slices(key, iv).map_err(|e| AesError::Cipher(e.to_string()))?;
    let mut buffer = data.to_vec();
    let len = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| AesError::Padding)?
        .len();
    buffer.truncate(len);
    Ok(buffer)
}

impl NativeAes for RustCryptoAes {
    fn encrypt(
        &self,
        data_base64: &str,
        key_hex: &str,
        iv_hex: &str,
        mode: &str,
    ) -> Result<String, AesError> {
        let input = CbcInput::decode(data_base64, key_hex, iv_hex, mode)?;
        let output = match input.key_bits {
            128 => encrypt_blocks::<Aes128CbcEnc>(&input.key, &input.iv, &input.data)?,
            192 => encrypt_blocks::<Aes192CbcEnc>(&input.key, &input.iv, &input.data)?,
            _ => encrypt_blocks::<Aes256CbcEnc>(&input.key, &input.iv, &input.data)?,
        };
        Ok(bytes_to_base64(&output))
    }

    fn decrypt(
        &self,
        data_base64: &str,
        key_hex: &str,
        iv_hex: &str,
        mode: &str,
    ) -> Result<String, AesError> {
        let input = CbcInput::decode(data_base64, key_hex, iv_hex, mode)?;
        let output = match input.key_bits {
            128 => decrypt_blocks::<Aes128CbcDec>(&input.key, &input.iv, &input.data)?,
            192 => decrypt_blocks::<Aes192CbcDec>(&input.key, &input.iv, &input.data)?,
            _ => decrypt_blocks::<Aes256CbcDec>(&input.key, &input.iv, &input.data)?,
        };
        Ok(bytes_to_base64(&output))
    }
}
