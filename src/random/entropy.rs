use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{PwgError, Result};

/// Bytes of OS randomness mixed in by [`SystemEntropy`]
const OS_SAMPLE_SIZE: usize = 32;

/// A source of bytes to stir into the entropy pool.
///
/// Nothing is assumed about quality: the pool stays sound even if every
/// byte a source emits is known to an attacker.
pub trait EntropySource {
    fn name(&self) -> &'static str;

    /// Append whatever this source can offer to `out`
    fn gather(&mut self, out: &mut Vec<u8>) -> Result<()>;
}

/// Monotonic nanoseconds since first use followed by wall-clock nanoseconds
pub fn timer_sample() -> [u8; 16] {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let mono = ANCHOR.get_or_init(Instant::now).elapsed().as_nanos() as u64;
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&mono.to_le_bytes());
    out[8..].copy_from_slice(&wall.to_le_bytes());
    out
}

/// Process and timing signals plus an OS CSPRNG sample when available
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEntropy;

impl SystemEntropy {
    fn weak_signals(out: &mut Vec<u8>) {
        out.extend_from_slice(&timer_sample());
        out.extend_from_slice(&std::process::id().to_le_bytes());

        let thread = format!("{:?}", std::thread::current().id());
        out.extend_from_slice(thread.as_bytes());

        let marker = 0u8;
        let stack_addr = &marker as *const u8 as usize;
        out.extend_from_slice(&stack_addr.to_le_bytes());

        let heap_marker = Box::new(0u64);
        let heap_addr = &*heap_marker as *const u64 as usize;
        out.extend_from_slice(&heap_addr.to_le_bytes());

        out.extend_from_slice(&timer_sample());
    }
}

impl EntropySource for SystemEntropy {
    fn name(&self) -> &'static str {
        "system"
    }

    fn gather(&mut self, out: &mut Vec<u8>) -> Result<()> {
        Self::weak_signals(out);

        let mut sample = [0u8; OS_SAMPLE_SIZE];
        let os = OsRng.try_fill_bytes(&mut sample);
        out.extend_from_slice(&sample);
        zeroize::Zeroize::zeroize(&mut sample);
        os.map_err(|e| PwgError::PrimitiveFailure(format!("os rng: {}", e)))
    }
}

/// Fixed bytes, for callers that already hold entropy (and for tests)
#[derive(Debug, Clone)]
pub struct StaticEntropy(pub Vec<u8>);

impl EntropySource for StaticEntropy {
    fn name(&self) -> &'static str {
        "static"
    }

    fn gather(&mut self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(&self.0);
        Ok(())
    }
}
