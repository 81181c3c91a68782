pub mod arena;
pub mod cipher;
pub mod entropy;
pub mod pool;

pub use cipher::CipherKind;
pub use entropy::{EntropySource, StaticEntropy, SystemEntropy};
pub use pool::{RandomPool, SEED_FILE_SIZE};

/// Source of key, IV and salt bytes.
///
/// Implementations are cryptographically strong and never block, but are not
/// internally synchronized: share one behind a `Mutex` if several threads
/// need it.
pub trait RandomGenerator {
    fn get_data(&mut self, buf: &mut [u8]);
}

impl<G: RandomGenerator + ?Sized> RandomGenerator for &mut G {
    fn get_data(&mut self, buf: &mut [u8]) {
        (**self).get_data(buf);
    }
}
