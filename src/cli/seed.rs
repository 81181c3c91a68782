use crate::error::{PwgError, Result};
use crate::random::{RandomPool, SEED_FILE_SIZE};
use std::path::Path;

/// Mix an existing seed file (if any) and fresh system entropy into the
/// pool, then replace the seed file with new generator output.
/// Returns true when a previous seed was found and consumed.
pub fn refresh_seed_file(pool: &mut RandomPool, path: &Path) -> Result<bool> {
    let had_seed = match pool.read_seed_file(path) {
        Ok(()) => true,
        Err(PwgError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };
    pool.randomize();
    pool.write_seed_file(path)?;
    log::info!("wrote {} byte seed to {}", SEED_FILE_SIZE, path.display());
    Ok(had_seed)
}
