use crate::error::Result;
use crate::random::{RandomGenerator, RandomPool};

/// Options for the random command
#[derive(Debug, Clone)]
pub struct RandomOptions {
    pub count: usize,
}

impl Default for RandomOptions {
    fn default() -> Self {
        Self { count: 32 }
    }
}

/// Draw `count` bytes from the generator, hex encoded
pub fn random_hex(rng: &mut dyn RandomGenerator, count: usize) -> String {
    let mut buf = zeroize::Zeroizing::new(vec![0u8; count]);
    rng.get_data(&mut buf);
    hex::encode(&buf[..])
}

/// Describe a generator run: backend, bytes drawn and gates passed
pub fn show_random(pool: &mut RandomPool, options: &RandomOptions) -> Result<String> {
    let hex = random_hex(pool, options.count);

    let mut output = String::new();
    output.push_str(&format!("{}\n", hex));
    log::info!(
        "drew {} bytes from {:?} generator ({} gates)",
        options.count,
        pool.cipher_kind(),
        pool.gate_count()
    );
    Ok(output)
}
