use crate::error::{PwgError, Result};
use zeroize::Zeroizing;

/// zstd level used for container payloads
const ZSTD_LEVEL: i32 = 3;

/// First magic number of the zstd skippable frame range
const SKIPPABLE_FRAME_MAGIC: u32 = 0x184D_2A50;

/// Skippable frame header: magic (4) + frame size (4)
pub const SKIPPABLE_FRAME_HEADER: usize = 8;

/// Compress plaintext for a container payload
pub fn compress(data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    zstd::bulk::compress(data, ZSTD_LEVEL)
        .map(Zeroizing::new)
        .map_err(|e| PwgError::PrimitiveFailure(format!("zstd: {}", e)))
}

/// Extend a compressed stream to at least `min_len` bytes by appending a
/// zero-filled skippable frame, which decoders pass over. Short texts would
/// otherwise produce containers below the decoder's minimum size.
pub fn pad_to_min_len(compressed: &mut Zeroizing<Vec<u8>>, min_len: usize) -> Result<()> {
    if compressed.len() >= min_len {
        return Ok(());
    }
    let frame_len = (min_len - compressed.len()).max(SKIPPABLE_FRAME_HEADER);
    let content_len = (frame_len - SKIPPABLE_FRAME_HEADER) as u32;
    compressed.try_reserve_exact(frame_len)?;
    compressed.extend_from_slice(&SKIPPABLE_FRAME_MAGIC.to_le_bytes());
    compressed.extend_from_slice(&content_len.to_le_bytes());
    let padded_len = compressed.len() + content_len as usize;
    compressed.resize(padded_len, 0u8);
    Ok(())
}

/// Decompress a payload that must expand to exactly `expected_len` bytes
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let output = zstd::bulk::decompress(data, expected_len)
        .map(Zeroizing::new)
        .map_err(|_| PwgError::DecompressFailed)?;
    if output.len() != expected_len {
        return Err(PwgError::DecompressFailed);
    }
    Ok(output)
}
