use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;

use crate::error::{PwgError, Result};
use crate::header::{BLOCK_SIZE, IV_SIZE};
use crate::pipeline::kdf::KEY_SIZE;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

fn check_aligned(data: &[u8]) -> Result<()> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(PwgError::PrimitiveFailure(format!(
            "cbc: {} bytes is not block aligned",
            data.len()
        )));
    }
    Ok(())
}

/// CBC-encrypt a block-aligned buffer in place
pub fn cbc_encrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], data: &mut [u8]) -> Result<()> {
    check_aligned(data)?;
    let mut enc = Aes256CbcEnc::new(GenericArray::from_slice(key), GenericArray::from_slice(iv));
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        enc.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// CBC decryption that can be fed one region at a time.
///
/// The chaining state carries over between calls, so a header block can be
/// decrypted and inspected before committing to the rest of the ciphertext.
pub struct CbcDecryptor {
    inner: Aes256CbcDec,
}

impl CbcDecryptor {
    pub fn new(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE]) -> Self {
        Self {
            inner: Aes256CbcDec::new(GenericArray::from_slice(key), GenericArray::from_slice(iv)),
        }
    }

    /// Decrypt the next block-aligned region in place
    pub fn decrypt(&mut self, data: &mut [u8]) -> Result<()> {
        check_aligned(data)?;
        for block in data.chunks_exact_mut(BLOCK_SIZE) {
            self.inner.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
}

/// CBC-decrypt a block-aligned buffer in place
pub fn cbc_decrypt(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], data: &mut [u8]) -> Result<()> {
    CbcDecryptor::new(key, iv).decrypt(data)
}
