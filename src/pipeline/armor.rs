use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroizing;

use crate::error::{PwgError, Result};

/// Encoded line width
pub const LINE_WIDTH: usize = 76;

/// Base64-encode with CRLF line breaks every 76 characters
pub fn encode_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + 2 * (encoded.len() / LINE_WIDTH));
    for (i, line) in encoded.as_bytes().chunks(LINE_WIDTH).enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        // chunks of an ASCII string stay valid UTF-8
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
    }
    out
}

/// Decode base64, ignoring any whitespace and line breaks
pub fn decode_wrapped(text: &str) -> Result<Zeroizing<Vec<u8>>> {
    let compact: Zeroizing<Vec<u8>> = Zeroizing::new(
        text.bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect(),
    );
    STANDARD
        .decode(&compact[..])
        .map(Zeroizing::new)
        .map_err(|_| PwgError::TextCorrupted)
}
