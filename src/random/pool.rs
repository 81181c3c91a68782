//! Reseeding entropy pool with a gated keystream generator.
//!
//! Entropy is XOR-folded into an add buffer; a full buffer (or an explicit
//! flush) rehashes the pool with a BLAKE3 keyed hash and destroys whatever
//! epoch key was live. Output comes from a block or stream cipher keyed from
//! the pool. After every epoch budget, and after every request that wrote
//! blocks straight into the caller's buffer, the generator gate replaces
//! the key with the cipher's own keystream so earlier output cannot be
//! recomputed from later state.

use std::path::Path;

use digest::Digest;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::Result;
use crate::random::arena::{
    Region, SecureArena, ADD_BUFFER_SIZE, COUNTER_SIZE, GET_BUFFER_SIZE, KEY_SIZE, POOL_SIZE,
};
use crate::random::cipher::{CipherKind, EpochCipher};
use crate::random::entropy::{timer_sample, EntropySource, SystemEntropy};
use crate::random::RandomGenerator;

/// Seed files hold two pools' worth of generator output
pub const SEED_FILE_SIZE: usize = 2 * POOL_SIZE;

pub struct RandomPool {
    arena: SecureArena,
    kind: CipherKind,
    cipher: Option<EpochCipher>,
    add_pos: usize,
    get_pos: usize,
    blocks_in_epoch: u64,
    gates: u64,
}

fn as_key(bytes: &[u8]) -> &[u8; KEY_SIZE] {
    bytes.try_into().expect("key region has KEY_SIZE bytes")
}

fn as_counter(bytes: &mut [u8]) -> &mut [u8; COUNTER_SIZE] {
    bytes.try_into().expect("counter region has COUNTER_SIZE bytes")
}

impl RandomPool {
    /// Create an unkeyed pool. Callers should stir in entropy with
    /// [`randomize`](Self::randomize) or a seed file before first use.
    pub fn new(kind: CipherKind) -> Result<Self> {
        let mut pool = Self {
            arena: SecureArena::new()?,
            kind,
            cipher: None,
            add_pos: 0,
            get_pos: GET_BUFFER_SIZE,
            blocks_in_epoch: 0,
            gates: 0,
        };
        pool.update_pool();
        Ok(pool)
    }

    /// Create a pool already stirred with [`SystemEntropy`]
    pub fn with_system_entropy(kind: CipherKind) -> Result<Self> {
        let mut pool = Self::new(kind)?;
        pool.randomize();
        Ok(pool)
    }

    pub fn cipher_kind(&self) -> CipherKind {
        self.kind
    }

    pub fn is_keyed(&self) -> bool {
        self.cipher.is_some()
    }

    /// Number of generator gates since creation
    pub fn gate_count(&self) -> u64 {
        self.gates
    }

    /// Blocks emitted under the current epoch key
    pub fn blocks_in_epoch(&self) -> u64 {
        self.blocks_in_epoch
    }

    /// XOR bytes into the add buffer, rehashing the pool whenever it fills
    pub fn add_data(&mut self, data: &[u8]) {
        let mut rest = data;
        while !rest.is_empty() {
            let take = (ADD_BUFFER_SIZE - self.add_pos).min(rest.len());
            let start = self.add_pos;
            let buffer = &mut self.arena.region_mut(Region::AddBuffer)[start..start + take];
            for (dst, src) in buffer.iter_mut().zip(&rest[..take]) {
                *dst ^= src;
            }
            self.add_pos += take;
            rest = &rest[take..];
            if self.add_pos == ADD_BUFFER_SIZE {
                self.update_pool();
            }
        }
    }

    /// Rehash pool, pending entropy, epoch block count and a timer sample
    /// into a new pool state, destroying any keyed state.
    pub fn update_pool(&mut self) {
        let mut pool_key = Zeroizing::new([0u8; 32]);
        pool_key.copy_from_slice(&self.arena.region(Region::Pool)[..32]);

        let mut hasher = blake3::Hasher::new_keyed(&pool_key);
        hasher.update(&self.arena.region(Region::Pool)[32..]);
        hasher.update(self.arena.region(Region::AddBuffer));
        if self.cipher.is_some() {
            hasher.update(&self.blocks_in_epoch.to_le_bytes());
        }
        hasher.update(&timer_sample());

        let mut next = Zeroizing::new([0u8; POOL_SIZE]);
        let mut reader = hasher.finalize_xof();
        reader.fill(&mut next[..]);
        reader.zeroize();
        hasher.zeroize();

        self.arena.region_mut(Region::Pool).copy_from_slice(&next[..]);
        self.arena.zeroize_region(Region::AddBuffer);
        self.add_pos = 0;
        self.destroy_key();
    }

    fn destroy_key(&mut self) {
        self.cipher = None;
        self.arena.zeroize_region(Region::Key);
        self.arena.zeroize_region(Region::Counter);
        self.arena.zeroize_region(Region::GetBuffer);
        self.get_pos = GET_BUFFER_SIZE;
        self.blocks_in_epoch = 0;
    }

    /// Start a new epoch keyed from the pool
    pub fn set_key(&mut self) {
        self.update_pool();

        // key = SHA256(timestamp || pool): never the pool itself
        let mut hasher = Sha256::new();
        hasher.update(timer_sample());
        hasher.update(self.arena.region(Region::Pool));
        let mut digest = hasher.finalize();
        self.arena.region_mut(Region::Key).copy_from_slice(&digest);
        digest.as_mut_slice().zeroize();

        let (key, counter) = self.arena.pair_mut(Region::Key, Region::Counter);
        counter.copy_from_slice(&timer_sample());
        self.cipher = Some(EpochCipher::keyed(self.kind, as_key(key), as_counter(counter)));
        self.blocks_in_epoch = 0;
        log::debug!("generator keyed with {:?}", self.kind);
    }

    /// Re-key from the cipher's own keystream and re-derive the counter
    /// from the old one mixed with a fresh timestamp.
    pub fn generator_gate(&mut self) {
        let Some(cipher) = self.cipher.as_mut() else {
            self.set_key();
            return;
        };

        let (key, counter) = self.arena.pair_mut(Region::Key, Region::Counter);
        let counter = as_counter(counter);
        let mut new_key = Zeroizing::new([0u8; KEY_SIZE]);
        cipher.self_key(counter, &mut new_key);
        key.copy_from_slice(&new_key[..]);

        for (c, t) in counter.iter_mut().zip(timer_sample()) {
            *c ^= t;
        }
        self.cipher = Some(EpochCipher::keyed(self.kind, &new_key, counter));
        self.blocks_in_epoch = 0;
        self.gates += 1;
        log::trace!("generator gate #{}", self.gates);
    }

    /// Fill `dest` (a whole number of blocks) with keystream, gating when
    /// the epoch budget runs out.
    fn fill_buf(&mut self, dest: &mut [u8]) {
        let block_size = self.kind.block_size();
        let max_blocks = self.kind.max_blocks_per_epoch();
        debug_assert_eq!(dest.len() % block_size, 0);

        let mut offset = 0;
        while offset < dest.len() {
            if self.blocks_in_epoch >= max_blocks {
                self.generator_gate();
            }
            let Some(cipher) = self.cipher.as_mut() else {
                self.set_key();
                continue;
            };
            let budget = (max_blocks - self.blocks_in_epoch) as usize;
            let blocks = budget.min((dest.len() - offset) / block_size);
            let end = offset + blocks * block_size;
            let counter = as_counter(self.arena.region_mut(Region::Counter));
            cipher.fill_blocks(counter, &mut dest[offset..end]);
            self.blocks_in_epoch += blocks as u64;
            offset = end;
        }
    }

    fn refill_get_buffer(&mut self) {
        let blocks = (GET_BUFFER_SIZE / self.kind.block_size()) as u64;
        if self.blocks_in_epoch + blocks > self.kind.max_blocks_per_epoch() {
            self.generator_gate();
        }
        if self.cipher.is_none() {
            self.set_key();
        }
        if let Some(cipher) = self.cipher.as_mut() {
            let (counter, cache) = self.arena.pair_mut(Region::Counter, Region::GetBuffer);
            cipher.fill_blocks(as_counter(counter), cache);
            self.blocks_in_epoch += blocks;
            self.get_pos = 0;
        }
    }

    /// Copy cached keystream into `out`, wiping what was handed out
    fn drain_get_buffer<'a>(&mut self, out: &'a mut [u8]) -> &'a mut [u8] {
        let take = (GET_BUFFER_SIZE - self.get_pos).min(out.len());
        let start = self.get_pos;
        let cache = &mut self.arena.region_mut(Region::GetBuffer)[start..start + take];
        let (head, tail) = out.split_at_mut(take);
        head.copy_from_slice(cache);
        cache.zeroize();
        self.get_pos += take;
        tail
    }

    /// Fill `buf` with random bytes
    pub fn get_data(&mut self, buf: &mut [u8]) {
        if buf.is_empty() {
            return;
        }
        if self.cipher.is_none() {
            self.set_key();
        }

        let mut out = self.drain_get_buffer(buf);

        let mut direct_fill = false;
        if out.len() >= GET_BUFFER_SIZE {
            let block_size = self.kind.block_size();
            let whole = out.len() / block_size * block_size;
            let (head, tail) = std::mem::take(&mut out).split_at_mut(whole);
            self.fill_buf(head);
            out = tail;
            direct_fill = true;
        }

        while !out.is_empty() {
            self.refill_get_buffer();
            out = self.drain_get_buffer(std::mem::take(&mut out));
        }

        if direct_fill {
            self.generator_gate();
        }
    }

    pub fn get_byte(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        self.get_data(&mut byte);
        byte[0]
    }

    /// Destroy keyed state so no single memory snapshot spans the
    /// operations on either side of the call.
    pub fn flush(&mut self) {
        self.update_pool();
    }

    /// Stir in process/timing signals and an OS CSPRNG sample
    pub fn randomize(&mut self) {
        self.randomize_from(&mut SystemEntropy);
    }

    /// Stir in whatever `source` can offer; a failing source still
    /// contributes what it gathered before failing.
    pub fn randomize_from(&mut self, source: &mut dyn EntropySource) {
        let mut sample = Zeroizing::new(Vec::new());
        if let Err(e) = source.gather(&mut sample) {
            log::warn!("entropy source '{}' degraded: {}", source.name(), e);
        }
        log::debug!("mixing {} bytes from '{}'", sample.len(), source.name());
        self.add_data(&sample);
    }

    /// Write a seed file of fresh generator output for the next session
    pub fn write_seed_file(&mut self, path: &Path) -> Result<()> {
        let mut seed = Zeroizing::new([0u8; SEED_FILE_SIZE]);
        self.get_data(&mut seed[..]);
        self.flush();
        std::fs::write(path, &seed[..])?;
        log::debug!("wrote seed file {}", path.display());
        Ok(())
    }

    /// Mix a seed file into the pool
    pub fn read_seed_file(&mut self, path: &Path) -> Result<()> {
        let seed = Zeroizing::new(std::fs::read(path)?);
        self.add_data(&seed);
        self.flush();
        log::debug!("mixed {} seed bytes from {}", seed.len(), path.display());
        Ok(())
    }

    #[cfg(test)]
    fn epoch_key(&self) -> [u8; KEY_SIZE] {
        *as_key(self.arena.region(Region::Key))
    }

    #[cfg(test)]
    fn epoch_counter(&self) -> [u8; COUNTER_SIZE] {
        let mut counter = [0u8; COUNTER_SIZE];
        counter.copy_from_slice(self.arena.region(Region::Counter));
        counter
    }
}

impl RandomGenerator for RandomPool {
    fn get_data(&mut self, buf: &mut [u8]) {
        RandomPool::get_data(self, buf);
    }
}

impl rand_core::RngCore for RandomPool {
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.get_data(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        self.get_data(dest);
        Ok(())
    }
}

impl rand_core::CryptoRng for RandomPool {}

impl std::fmt::Debug for RandomPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomPool")
            .field("kind", &self.kind)
            .field("keyed", &self.is_keyed())
            .field("gates", &self.gates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::entropy::StaticEntropy;
    use aes::cipher::generic_array::GenericArray;
    use aes::cipher::KeyInit;
    use aes::Aes256;
    use tempfile::tempdir;

    fn pool(kind: CipherKind) -> RandomPool {
        let mut pool = RandomPool::new(kind).unwrap();
        pool.randomize_from(&mut StaticEntropy(b"test entropy".to_vec()));
        pool
    }

    #[test]
    fn test_lazy_keying() {
        let mut pool = pool(CipherKind::AesCtr);
        assert!(!pool.is_keyed());
        pool.get_byte();
        assert!(pool.is_keyed());
    }

    #[test]
    fn test_output_is_not_constant() {
        for kind in [CipherKind::AesCtr, CipherKind::ChaCha20] {
            let mut pool = pool(kind);
            let mut a = [0u8; 32];
            let mut b = [0u8; 32];
            pool.get_data(&mut a);
            pool.get_data(&mut b);
            assert_ne!(a, [0u8; 32]);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_independent_pools_differ() {
        let mut a = RandomPool::with_system_entropy(CipherKind::AesCtr).unwrap();
        let mut b = RandomPool::with_system_entropy(CipherKind::AesCtr).unwrap();
        let mut out_a = [0u8; 64];
        let mut out_b = [0u8; 64];
        a.get_data(&mut out_a);
        b.get_data(&mut out_b);
        assert_ne!(out_a, out_b);
    }

    #[test]
    fn test_odd_request_sizes() {
        for kind in [CipherKind::AesCtr, CipherKind::ChaCha20] {
            let mut pool = pool(kind);
            for len in [1usize, 3, 15, 16, 17, 63, 64, 65, 100, 1000] {
                let mut buf = vec![0u8; len];
                pool.get_data(&mut buf);
                if len >= 16 {
                    assert!(buf.iter().any(|&b| b != 0), "len {}", len);
                }
            }
        }
    }

    #[test]
    fn test_small_requests_use_the_get_buffer() {
        let mut pool = pool(CipherKind::AesCtr);
        pool.get_byte();
        let gates = pool.gate_count();
        let mut small = [0u8; 8];
        pool.get_data(&mut small);
        assert_eq!(pool.gate_count(), gates);
    }

    #[test]
    fn test_direct_fill_is_followed_by_gate() {
        let mut pool = pool(CipherKind::AesCtr);
        pool.get_byte();
        let key = pool.epoch_key();
        let gates = pool.gate_count();

        let mut large = [0u8; 256];
        pool.get_data(&mut large);
        assert_eq!(pool.gate_count(), gates + 1);
        assert_ne!(pool.epoch_key(), key);
    }

    #[test]
    fn test_full_add_buffer_destroys_key() {
        let mut pool = pool(CipherKind::AesCtr);
        pool.get_byte();
        assert!(pool.is_keyed());
        pool.add_data(&[0x5A; ADD_BUFFER_SIZE]);
        assert!(!pool.is_keyed());
        assert_eq!(pool.epoch_key(), [0u8; KEY_SIZE]);
    }

    #[test]
    fn test_partial_add_keeps_key() {
        let mut pool = pool(CipherKind::AesCtr);
        pool.get_byte();
        let key = pool.epoch_key();
        pool.add_data(&[1, 2, 3]);
        assert!(pool.is_keyed());
        assert_eq!(pool.epoch_key(), key);
    }

    #[test]
    fn test_flush_destroys_key_and_recovers() {
        let mut pool = pool(CipherKind::ChaCha20);
        let mut before = [0u8; 16];
        pool.get_data(&mut before);
        pool.flush();
        assert!(!pool.is_keyed());
        assert_eq!(pool.epoch_key(), [0u8; KEY_SIZE]);
        assert_eq!(pool.epoch_counter(), [0u8; COUNTER_SIZE]);

        let mut after = [0u8; 16];
        pool.get_data(&mut after);
        assert!(pool.is_keyed());
        assert_ne!(before, after);
    }

    #[test]
    fn test_epoch_budget_forces_rekey() {
        let mut pool = pool(CipherKind::AesCtr);
        let budget = (CipherKind::AesCtr.max_blocks_per_epoch() as usize) * 16;
        let mut big = vec![0u8; budget + 64];
        pool.get_data(&mut big);
        // one gate at the budget boundary, one after the direct fill
        assert!(pool.gate_count() >= 2, "gates: {}", pool.gate_count());
        assert!(pool.blocks_in_epoch() < CipherKind::AesCtr.max_blocks_per_epoch());
    }

    #[test]
    fn test_gate_prevents_backtracking() {
        let mut pool = pool(CipherKind::AesCtr);
        pool.get_byte();

        let mut emitted = [0u8; 256];
        pool.get_data(&mut emitted);

        // state an attacker could capture after the gate
        let key = pool.epoch_key();
        let mut counter = pool.epoch_counter();
        let mut cipher = EpochCipher::AesCtr(Aes256::new(GenericArray::from_slice(&key)));

        let mut replay = vec![0u8; 16 * 4096];
        cipher.fill_blocks(&mut counter, &mut replay);
        for block in emitted.chunks(16) {
            assert!(
                !replay.chunks(16).any(|r| r == block),
                "pre-gate block reproduced from post-gate state"
            );
        }
    }

    #[test]
    fn test_rng_core() {
        use rand::Rng;
        let mut pool = pool(CipherKind::AesCtr);
        let values: Vec<u32> = (0..8).map(|_| pool.gen_range(0..1000)).collect();
        assert!(values.iter().all(|&v| v < 1000));
        assert_ne!(rand_core::RngCore::next_u64(&mut pool), 0);
    }

    #[test]
    fn test_seed_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seed.bin");

        let mut writer = pool(CipherKind::AesCtr);
        writer.write_seed_file(&path).unwrap();
        assert!(!writer.is_keyed());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), SEED_FILE_SIZE as u64);

        let mut reader = RandomPool::new(CipherKind::AesCtr).unwrap();
        reader.read_seed_file(&path).unwrap();
        let mut out = [0u8; 32];
        reader.get_data(&mut out);
        assert_ne!(out, [0u8; 32]);
    }

    #[test]
    fn test_missing_seed_file() {
        let dir = tempdir().unwrap();
        let mut pool = pool(CipherKind::AesCtr);
        let result = pool.read_seed_file(&dir.path().join("absent.bin"));
        assert!(matches!(result, Err(crate::error::PwgError::Io(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_pool_state_is_locked() {
        let page_kb = (crate::random::arena::page_size() / 1024) as u64;
        let mut pool = pool(CipherKind::ChaCha20);
        pool.get_byte();
        assert!(pool.is_keyed());
        assert!(crate::random::arena::locked_kb() >= page_kb);
    }
}
