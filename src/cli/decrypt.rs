use crate::clipboard::{decrypt_clipboard, Clipboard, MemoryClipboard};
use crate::error::{PwgError, Result};
use std::path::Path;

/// Options for the decrypt command
#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    pub password: String,
}

/// Decrypt an armored container file of any version.
/// Returns the plaintext length in bytes.
pub fn decrypt_file(input_path: &Path, output_path: &Path, options: &DecryptOptions) -> Result<usize> {
    let armored = std::fs::read_to_string(input_path).map_err(|e| match e.kind() {
        std::io::ErrorKind::InvalidData => PwgError::TextCorrupted,
        _ => PwgError::Io(e),
    })?;

    let mut clipboard = MemoryClipboard::with_text(&armored);
    decrypt_clipboard(&mut clipboard, &options.password)?;

    let text = clipboard.get_text()?.ok_or(PwgError::NoText)?;
    std::fs::write(output_path, text.as_bytes())?;
    Ok(text.len())
}
