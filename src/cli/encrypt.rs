use crate::clipboard::{encrypt_clipboard_with_version, Clipboard, MemoryClipboard};
use crate::error::{PwgError, Result};
use crate::header::ContainerVersion;
use crate::random::RandomGenerator;
use std::path::Path;

/// Options for the encrypt command
#[derive(Debug, Clone)]
pub struct EncryptOptions {
    pub password: String,
    pub version: ContainerVersion,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            password: String::new(),
            version: ContainerVersion::CURRENT,
        }
    }
}

/// Encrypt a UTF-8 text file into an armored container file.
/// Returns the size of the armored output in bytes.
pub fn encrypt_file(
    input_path: &Path,
    output_path: &Path,
    options: &EncryptOptions,
    rng: &mut dyn RandomGenerator,
) -> Result<usize> {
    let bytes = zeroize::Zeroizing::new(std::fs::read(input_path)?);
    let text = std::str::from_utf8(&bytes).map_err(|_| PwgError::TextCorrupted)?;

    let mut clipboard = MemoryClipboard::with_text(text);
    encrypt_clipboard_with_version(&mut clipboard, &options.password, options.version, rng)?;

    let armored = clipboard.get_text()?.ok_or(PwgError::NoText)?;
    std::fs::write(output_path, armored.as_bytes())?;
    Ok(armored.len())
}
