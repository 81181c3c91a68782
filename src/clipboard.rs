//! Clipboard-driven encryption.
//!
//! The codec never talks to an OS clipboard. Callers hand in anything that
//! implements [`Clipboard`]; [`MemoryClipboard`] is the in-process one.

use zeroize::{Zeroize, Zeroizing};

use crate::container::{decrypt_text, encrypt_text_with_version};
use crate::error::{PwgError, Result};
use crate::header::ContainerVersion;
use crate::random::RandomGenerator;

pub trait Clipboard {
    /// Current clipboard text, `None` when it holds no text at all
    fn get_text(&mut self) -> Result<Option<Zeroizing<String>>>;

    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// Clipboard contents held in process memory and wiped on drop
#[derive(Default)]
pub struct MemoryClipboard {
    text: Option<Zeroizing<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            text: Some(Zeroizing::new(text.to_owned())),
        }
    }

    /// Load UTF-16 code units, as handed over by wide-character clipboards
    pub fn from_utf16(units: &[u16]) -> Result<Self> {
        let text = String::from_utf16(units).map_err(|_| PwgError::TextCorrupted)?;
        Ok(Self {
            text: Some(Zeroizing::new(text)),
        })
    }

    pub fn to_utf16(&self) -> Option<Zeroizing<Vec<u16>>> {
        self.text
            .as_ref()
            .map(|text| Zeroizing::new(text.encode_utf16().collect()))
    }

    pub fn clear(&mut self) {
        self.text = None;
    }
}

impl Clipboard for MemoryClipboard {
    fn get_text(&mut self) -> Result<Option<Zeroizing<String>>> {
        Ok(self.text.clone())
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        match self.text.as_mut() {
            Some(current) => {
                current.zeroize();
                current.push_str(text);
            }
            None => self.text = Some(Zeroizing::new(text.to_owned())),
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClipboard")
            .field("len", &self.text.as_ref().map(|t| t.len()))
            .finish()
    }
}

fn read_clipboard(clipboard: &mut dyn Clipboard) -> Result<Zeroizing<String>> {
    let text = match clipboard.get_text() {
        Ok(Some(text)) => text,
        Ok(None) => return Err(PwgError::NoText),
        Err(e) => {
            log::debug!("clipboard read failed: {}", e);
            return Err(PwgError::ClipboardUnavailable);
        }
    };
    if text.is_empty() {
        return Err(PwgError::NoText);
    }
    Ok(text)
}

/// Replace the clipboard text with its encrypted container
pub fn encrypt_clipboard(
    clipboard: &mut dyn Clipboard,
    password: &str,
    rng: &mut dyn RandomGenerator,
) -> Result<()> {
    encrypt_clipboard_with_version(clipboard, password, ContainerVersion::CURRENT, rng)
}

pub fn encrypt_clipboard_with_version(
    clipboard: &mut dyn Clipboard,
    password: &str,
    version: ContainerVersion,
    rng: &mut dyn RandomGenerator,
) -> Result<()> {
    let text = read_clipboard(clipboard)?;
    let encrypted = encrypt_text_with_version(&text, password, version, rng)?;
    clipboard.set_text(&encrypted)
}

/// Replace an encrypted container on the clipboard with its plaintext.
/// The clipboard is left untouched when decryption fails.
pub fn decrypt_clipboard(clipboard: &mut dyn Clipboard, password: &str) -> Result<()> {
    let encrypted = read_clipboard(clipboard)?;
    let text = decrypt_text(&encrypted, password)?;
    clipboard.set_text(&text)
}
