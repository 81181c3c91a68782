use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{PwgError, Result};
use crate::random::arena::{COUNTER_SIZE, KEY_SIZE};

/// Keystream backend used by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum CipherKind {
    /// AES-256 in counter mode
    #[default]
    AesCtr,
    ChaCha20,
}

impl CipherKind {
    pub fn block_size(self) -> usize {
        match self {
            CipherKind::AesCtr => 16,
            CipherKind::ChaCha20 => 64,
        }
    }

    /// Blocks one key may produce before the generator gate must run
    pub fn max_blocks_per_epoch(self) -> u64 {
        match self {
            // 1 MiB
            CipherKind::AesCtr => 1 << 16,
            // 4 GiB, well inside the 32-bit IETF block counter
            CipherKind::ChaCha20 => 1 << 26,
        }
    }
}

impl std::str::FromStr for CipherKind {
    type Err = PwgError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "aesctr" | "aes-ctr" | "aes" => Ok(Self::AesCtr),
            "chacha20" | "chacha" => Ok(Self::ChaCha20),
            _ => Err(PwgError::UnsupportedCipher(s.to_string())),
        }
    }
}

impl TryFrom<String> for CipherKind {
    type Error = PwgError;
    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// A keyed backend for one epoch. Each variant owns its expanded key
/// state, which is wiped when the value is dropped.
pub enum EpochCipher {
    AesCtr(Aes256),
    ChaCha20(ChaCha20),
}

impl EpochCipher {
    /// Key a backend and pass the initial counter once through it, so the
    /// raw timer value that seeded the counter is never used as-is.
    pub fn keyed(
        kind: CipherKind,
        key: &[u8; KEY_SIZE],
        counter: &mut [u8; COUNTER_SIZE],
    ) -> Self {
        match kind {
            CipherKind::AesCtr => {
                let aes = Aes256::new(GenericArray::from_slice(key));
                aes.encrypt_block(GenericArray::from_mut_slice(&mut counter[..]));
                EpochCipher::AesCtr(aes)
            }
            CipherKind::ChaCha20 => {
                let mut whitener = ChaCha20::new(
                    GenericArray::from_slice(key),
                    GenericArray::from_slice(&[0u8; 12]),
                );
                whitener.apply_keystream(&mut counter[..]);
                EpochCipher::ChaCha20(ChaCha20::new(
                    GenericArray::from_slice(key),
                    GenericArray::from_slice(&counter[..12]),
                ))
            }
        }
    }

    pub fn kind(&self) -> CipherKind {
        match self {
            EpochCipher::AesCtr(_) => CipherKind::AesCtr,
            EpochCipher::ChaCha20(_) => CipherKind::ChaCha20,
        }
    }

    pub fn block_size(&self) -> usize {
        self.kind().block_size()
    }

    pub fn max_blocks_per_epoch(&self) -> u64 {
        self.kind().max_blocks_per_epoch()
    }

    /// Write whole blocks of keystream into `dest`, advancing `counter`
    pub fn fill_blocks(&mut self, counter: &mut [u8; COUNTER_SIZE], dest: &mut [u8]) {
        let block_size = self.block_size();
        debug_assert_eq!(dest.len() % block_size, 0);
        let blocks = dest.len() / block_size;
        match self {
            EpochCipher::AesCtr(aes) => {
                for block in dest.chunks_exact_mut(block_size) {
                    block.copy_from_slice(counter);
                    aes.encrypt_block(GenericArray::from_mut_slice(block));
                    increment_be(counter);
                }
            }
            EpochCipher::ChaCha20(chacha) => {
                dest.fill(0);
                chacha.apply_keystream(dest);
                // the stream tracks its own position; keep the counter in step
                let mut pos = [0u8; 4];
                pos.copy_from_slice(&counter[12..]);
                let pos = u32::from_le_bytes(pos).wrapping_add(blocks as u32);
                counter[12..].copy_from_slice(&pos.to_le_bytes());
            }
        }
    }

    /// Derive the next epoch key from this cipher's own keystream
    pub fn self_key(&mut self, counter: &mut [u8; COUNTER_SIZE], new_key: &mut [u8; KEY_SIZE]) {
        let block_size = self.block_size();
        let len = KEY_SIZE.div_ceil(block_size) * block_size;
        let mut stream = Zeroizing::new([0u8; 64]);
        self.fill_blocks(counter, &mut stream[..len]);
        new_key.copy_from_slice(&stream[..KEY_SIZE]);
        stream.zeroize();
    }
}

impl std::fmt::Debug for EpochCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EpochCipher").field(&self.kind()).finish()
    }
}

fn increment_be(counter: &mut [u8; COUNTER_SIZE]) {
    for byte in counter.iter_mut().rev() {
        let (next, carry) = byte.overflowing_add(1);
        *byte = next;
        if !carry {
            break;
        }
    }
}
