//! Password-based key derivation for containers.
//!
//! Versions 1 and later derive their key with PBKDF2-HMAC-SHA256 using the
//! container IV as salt. Version 0 used an iterated SHA-256 chain, kept here
//! only so old containers stay decodable.

use std::sync::atomic::{AtomicBool, Ordering};

use digest::Digest;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{PwgError, Result};
use crate::header::{ContainerVersion, IV_SIZE};

type HmacSha256 = Hmac<Sha256>;

pub const KEY_SIZE: usize = 32;

/// PBKDF2 iterations for versions 1 and later
pub const KDF_ITERATIONS: u32 = 8192;

/// SHA-256 chain rounds for version 0
pub const LEGACY_KDF_ROUNDS: u32 = 8192;

/// PBKDF2-HMAC-SHA256 producing a single 32-byte block.
///
/// `cancel` is polled once per iteration. A cancelled run wipes its partial
/// state and returns `None`.
pub fn pbkdf2_256bit(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    cancel: Option<&AtomicBool>,
) -> Option<Zeroizing<[u8; KEY_SIZE]>> {
    let prf = HmacSha256::new_from_slice(password).expect("HMAC can take key of any size");

    // U1 = PRF(P, S || INT(1))
    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut u: Zeroizing<[u8; KEY_SIZE]> = Zeroizing::new(mac.finalize().into_bytes().into());
    let mut result = Zeroizing::new(*u);

    for _ in 1..iterations.max(1) {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            log::debug!("pbkdf2 cancelled");
            return None;
        }
        let mut mac = prf.clone();
        mac.update(&u[..]);
        let mut next = mac.finalize().into_bytes();
        u.copy_from_slice(&next);
        next.as_mut_slice().zeroize();
        for (r, x) in result.iter_mut().zip(u.iter()) {
            *r ^= x;
        }
    }

    if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        return None;
    }
    Some(result)
}

/// Version 0 key: K0 = SHA256(password || salt), then K = SHA256(K || password)
pub fn legacy_sha256_kdf(password: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    let mut key: Zeroizing<[u8; KEY_SIZE]> = Zeroizing::new(hasher.finalize().into());

    for _ in 0..LEGACY_KDF_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(&key[..]);
        hasher.update(password);
        let mut next = hasher.finalize();
        key.copy_from_slice(&next);
        next.as_mut_slice().zeroize();
    }
    key
}

/// Derive the single key that drives both CBC and HMAC for a container
pub fn init_crypto(
    password: &[u8],
    iv: &[u8; IV_SIZE],
    version: ContainerVersion,
) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    match version {
        ContainerVersion::V0 => Ok(legacy_sha256_kdf(password, iv)),
        _ => pbkdf2_256bit(password, iv, KDF_ITERATIONS, None)
            .ok_or_else(|| PwgError::PrimitiveFailure("pbkdf2 did not complete".into())),
    }
}
