//! pwgcrypt - crypto core for a password manager
//!
//! Two pieces live here: a continuously reseeded random generator that
//! supplies every key, IV and salt, and an authenticated container that
//! protects secret text on its way through the clipboard.
//!
//! ## Random generator
//!
//! ```text
//! entropy → add buffer → BLAKE3 pool → SHA-256 key → AES-CTR / ChaCha20 → gate → output
//! ```
//!
//! - **Pool**: keyed BLAKE3 over the previous pool and the pending input
//! - **Generator**: block cipher in counter mode, re-keyed from its own
//!   keystream after every request (the generator gate)
//! - **Epochs**: a key never produces more than a fixed block budget
//!
//! ## Container
//!
//! ```text
//! Text → zstd → header + pad → HMAC-SHA256 → AES-256-CBC → base64
//! ```
//!
//! Versions 0 through 3 decode; version 3 is produced by default.
//!
//! ## Example
//!
//! ```no_run
//! use pwgcrypt::random::{CipherKind, RandomPool};
//! use pwgcrypt::{decrypt_text, encrypt_text};
//!
//! let mut rng = RandomPool::with_system_entropy(CipherKind::AesCtr).unwrap();
//! let sealed = encrypt_text("Hello, world!", "correct-horse", &mut rng).unwrap();
//! let opened = decrypt_text(&sealed, "correct-horse").unwrap();
//! assert_eq!(opened.as_str(), "Hello, world!");
//! ```

pub mod cli;
pub mod clipboard;
pub mod config;
pub mod container;
pub mod error;
pub mod header;
pub mod pipeline;
pub mod random;

pub use clipboard::{decrypt_clipboard, encrypt_clipboard, Clipboard, MemoryClipboard};
pub use config::CryptConfig;
pub use container::{decrypt_text, decrypt_text_versioned, encrypt_text, encrypt_text_with_version};
pub use error::{PwgError, Result};
pub use header::ContainerVersion;
pub use random::{RandomGenerator, RandomPool};
