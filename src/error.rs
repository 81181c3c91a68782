use thiserror::Error;

#[derive(Error, Debug)]
pub enum PwgError {
    #[error("Clipboard is unavailable")]
    ClipboardUnavailable,

    #[error("No text to process")]
    NoText,

    #[error("Text is too long: {0} bytes exceeds the container limit")]
    TextTooLong(usize),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Encrypted text is corrupted")]
    TextCorrupted,

    /// Wrong password and tampered ciphertext are deliberately indistinguishable.
    #[error("Invalid password or corrupted ciphertext")]
    BadKey,

    #[error("Decompression failed")]
    DecompressFailed,

    #[error("Secure memory allocation failed")]
    AllocationFailed,

    #[error("Unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("Cryptographic primitive failure: {0}")]
    PrimitiveFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl PwgError {
    /// True for errors that leave the random generator unusable.
    pub fn is_generator_fatal(&self) -> bool {
        matches!(
            self,
            PwgError::AllocationFailed | PwgError::UnsupportedCipher(_) | PwgError::PrimitiveFailure(_)
        )
    }
}

impl From<std::collections::TryReserveError> for PwgError {
    fn from(_: std::collections::TryReserveError) -> Self {
        PwgError::OutOfMemory
    }
}

pub type Result<T> = std::result::Result<T, PwgError>;
