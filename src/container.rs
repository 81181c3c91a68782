//! Encrypted text container.
//!
//! ```text
//! v3:    IV(16) || CBC{ header(8) || zstd || pad || HMAC(32) }
//! v1/v2: IV(16) || CBC{ header(8) || zstd || pad } || HMAC(32)
//! v0:    IV(16) || CBC{ len(4) || zstd || pad } || HMAC16(ciphertext)
//! ```
//!
//! The random pad length (0..15) lives in the low nibble of the last IV
//! byte. Versions 1 and later authenticate the plaintext domain (header and
//! compressed text); version 0 authenticated the ciphertext. The whole
//! container is base64 armored with 76-column lines.

use zeroize::{Zeroize, Zeroizing};

use crate::error::{PwgError, Result};
use crate::header::{
    pad_len_from_iv, store_pad_len_in_iv, ContainerHeader, ContainerVersion, LegacyHeader,
    BLOCK_SIZE, HMAC_SIZE, IV_SIZE, LEGACY_HMAC_SIZE, MAX_TEXT_LEN, MIN_CONTAINER_SIZE,
};
use crate::pipeline::{
    cbc_encrypt, compress, compute_mac, decode_wrapped, decompress, encode_wrapped, init_crypto,
    pad_to_min_len, verify_mac, CbcDecryptor, KEY_SIZE,
};
use crate::random::RandomGenerator;

/// Plaintext recovered from a container, with the format it was stored in
pub struct DecryptedText {
    pub text: Zeroizing<String>,
    pub version: ContainerVersion,
}

impl std::fmt::Debug for DecryptedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedText")
            .field("len", &self.text.len())
            .field("version", &self.version)
            .finish()
    }
}

/// Encrypt text into a current-version container
pub fn encrypt_text(text: &str, password: &str, rng: &mut dyn RandomGenerator) -> Result<String> {
    encrypt_text_with_version(text, password, ContainerVersion::CURRENT, rng)
}

/// Encrypt text in any supported container layout
pub fn encrypt_text_with_version(
    text: &str,
    password: &str,
    version: ContainerVersion,
    rng: &mut dyn RandomGenerator,
) -> Result<String> {
    let container = encrypt_container(text.as_bytes(), password.as_bytes(), version, rng)?;
    Ok(encode_wrapped(&container))
}

/// Smallest header+payload that still yields a container of at least
/// MIN_CONTAINER_SIZE bytes once padded, tagged and prefixed with the IV
fn min_payload_len(version: ContainerVersion) -> usize {
    let min_padded = (MIN_CONTAINER_SIZE - IV_SIZE - version.hmac_size()).next_multiple_of(BLOCK_SIZE);
    min_padded - BLOCK_SIZE + 1
}

/// Build the raw (unarmored) container bytes
pub fn encrypt_container(
    plaintext: &[u8],
    password: &[u8],
    version: ContainerVersion,
    rng: &mut dyn RandomGenerator,
) -> Result<Zeroizing<Vec<u8>>> {
    if plaintext.is_empty() {
        return Err(PwgError::NoText);
    }
    if plaintext.len() > MAX_TEXT_LEN {
        return Err(PwgError::TextTooLong(plaintext.len()));
    }
    let plaintext_len = plaintext.len() as u32;

    let header: Vec<u8> = match version {
        ContainerVersion::V0 => LegacyHeader { plaintext_len }.to_bytes().to_vec(),
        _ => ContainerHeader::new(version, plaintext_len).to_bytes().to_vec(),
    };

    let mut compressed = compress(plaintext)?;
    let min_compressed = min_payload_len(version).saturating_sub(version.header_size());
    pad_to_min_len(&mut compressed, min_compressed)?;

    let payload_len = header.len() + compressed.len();
    let pad_len = (BLOCK_SIZE - payload_len % BLOCK_SIZE) % BLOCK_SIZE;

    let mut iv = [0u8; IV_SIZE];
    rng.get_data(&mut iv);
    store_pad_len_in_iv(&mut iv, pad_len);

    let key = init_crypto(password, &iv, version)?;

    let mut body = Zeroizing::new(Vec::new());
    body.try_reserve_exact(payload_len + pad_len + HMAC_SIZE)?;
    body.extend_from_slice(&header);
    body.extend_from_slice(&compressed);
    drop(compressed);

    let mut pad = Zeroizing::new([0u8; BLOCK_SIZE]);
    rng.get_data(&mut pad[..pad_len]);
    body.extend_from_slice(&pad[..pad_len]);

    match version {
        ContainerVersion::V3 => {
            let tag = compute_mac(&key[..], &[&body[..payload_len]]);
            body.extend_from_slice(&tag);
            cbc_encrypt(&key, &iv, &mut body)?;
        }
        ContainerVersion::V1 | ContainerVersion::V2 => {
            let tag = compute_mac(&key[..], &[&body[..payload_len]]);
            cbc_encrypt(&key, &iv, &mut body)?;
            body.extend_from_slice(&tag);
        }
        ContainerVersion::V0 => {
            cbc_encrypt(&key, &iv, &mut body)?;
            let tag = compute_mac(&key[..], &[&body[..]]);
            body.extend_from_slice(&tag[..LEGACY_HMAC_SIZE]);
        }
    }

    let mut container = Zeroizing::new(Vec::new());
    container.try_reserve_exact(IV_SIZE + body.len())?;
    container.extend_from_slice(&iv);
    container.extend_from_slice(&body);
    log::debug!(
        "encrypted {} bytes into a v{} container of {} bytes",
        plaintext.len(),
        version.as_byte(),
        container.len()
    );
    Ok(container)
}

/// Decrypt an armored container of any supported version
pub fn decrypt_text(encrypted: &str, password: &str) -> Result<Zeroizing<String>> {
    Ok(decrypt_text_versioned(encrypted, password)?.text)
}

/// Decrypt an armored container, also reporting its version
pub fn decrypt_text_versioned(encrypted: &str, password: &str) -> Result<DecryptedText> {
    let data = decode_wrapped(encrypted)?;
    decrypt_container(&data, password.as_bytes())
}

/// Decrypt raw container bytes.
///
/// The current key derivation is tried first; its first block reveals the
/// header magic and version byte. Without the magic the container is either
/// a version 0 container or the password is wrong, and the legacy path
/// decides which by its HMAC.
pub fn decrypt_container(data: &[u8], password: &[u8]) -> Result<DecryptedText> {
    if data.len() < MIN_CONTAINER_SIZE || data.len() % BLOCK_SIZE != 0 {
        return Err(PwgError::TextCorrupted);
    }
    let (iv_bytes, body) = data.split_at(IV_SIZE);
    let iv: [u8; IV_SIZE] = iv_bytes.try_into().map_err(|_| PwgError::TextCorrupted)?;

    let key = init_crypto(password, &iv, ContainerVersion::V1)?;
    let mut decryptor = CbcDecryptor::new(&key, &iv);
    let mut first = Zeroizing::new([0u8; BLOCK_SIZE]);
    first.copy_from_slice(&body[..BLOCK_SIZE]);
    decryptor.decrypt(&mut first[..])?;

    match ContainerHeader::from_bytes(&first[..]) {
        Some(header) => {
            let version = match ContainerVersion::from_byte(header.version) {
                Some(ContainerVersion::V0) | None => {
                    log::debug!("unknown container version byte {}", header.version);
                    return Err(PwgError::TextCorrupted);
                }
                Some(version) => version,
            };
            log::debug!("decoding v{} container", version.as_byte());
            let decoded = VersionedBlocks {
                version,
                header,
                key: &key,
                iv: &iv,
                first: &first,
                body,
            };
            decoded.decrypt(decryptor)
        }
        None => {
            drop(key);
            log::debug!("no header magic, trying legacy v0 layout");
            decrypt_legacy(&iv, body, password)
        }
    }
}

/// State for decoding a v1..v3 container once its header block is known
struct VersionedBlocks<'a> {
    version: ContainerVersion,
    header: ContainerHeader,
    key: &'a [u8; KEY_SIZE],
    iv: &'a [u8; IV_SIZE],
    first: &'a [u8; BLOCK_SIZE],
    body: &'a [u8],
}

impl VersionedBlocks<'_> {
    fn decrypt(self, mut decryptor: CbcDecryptor) -> Result<DecryptedText> {
        if !self.header.length_is_valid() {
            return Err(PwgError::BadKey);
        }

        let encrypted_hmac = self.version.encrypted_hmac();
        let ciphertext_len = if encrypted_hmac {
            self.body.len()
        } else {
            self.body.len() - HMAC_SIZE
        };

        let mut plain = Zeroizing::new(Vec::new());
        plain.try_reserve_exact(ciphertext_len)?;
        plain.extend_from_slice(self.first);
        plain.extend_from_slice(&self.body[BLOCK_SIZE..ciphertext_len]);
        decryptor.decrypt(&mut plain[BLOCK_SIZE..])?;

        let inner_tag = if encrypted_hmac { HMAC_SIZE } else { 0 };
        let payload_end = ciphertext_len
            .checked_sub(inner_tag + pad_len_from_iv(self.iv))
            .filter(|&end| end >= ContainerHeader::SIZE)
            .ok_or(PwgError::BadKey)?;

        let tag = if encrypted_hmac {
            &plain[ciphertext_len - HMAC_SIZE..]
        } else {
            &self.body[ciphertext_len..]
        };
        if !verify_mac(&self.key[..], &[&plain[..payload_end]], tag) {
            return Err(PwgError::BadKey);
        }

        let text = inflate(
            &plain[ContainerHeader::SIZE..payload_end],
            self.header.plaintext_len,
        )?;
        Ok(DecryptedText {
            text,
            version: self.version,
        })
    }
}

fn decrypt_legacy(iv: &[u8; IV_SIZE], body: &[u8], password: &[u8]) -> Result<DecryptedText> {
    let key = init_crypto(password, iv, ContainerVersion::V0)?;
    let ciphertext_len = body.len() - LEGACY_HMAC_SIZE;
    let (ciphertext, tag) = body.split_at(ciphertext_len);
    if !verify_mac(&key[..], &[ciphertext], tag) {
        return Err(PwgError::BadKey);
    }

    let mut plain = Zeroizing::new(Vec::new());
    plain.try_reserve_exact(ciphertext_len)?;
    plain.extend_from_slice(ciphertext);
    CbcDecryptor::new(&key, iv).decrypt(&mut plain)?;

    // authenticated from here on, so framing errors mean malformed content
    let header = LegacyHeader::from_bytes(&plain)
        .filter(LegacyHeader::length_is_valid)
        .ok_or(PwgError::DecompressFailed)?;
    let payload_end = ciphertext_len
        .checked_sub(pad_len_from_iv(iv))
        .filter(|&end| end >= LegacyHeader::SIZE)
        .ok_or(PwgError::DecompressFailed)?;

    let text = inflate(&plain[LegacyHeader::SIZE..payload_end], header.plaintext_len)?;
    Ok(DecryptedText {
        text,
        version: ContainerVersion::V0,
    })
}

fn inflate(compressed: &[u8], plaintext_len: u32) -> Result<Zeroizing<String>> {
    let mut bytes = decompress(compressed, plaintext_len as usize)?;
    match String::from_utf8(std::mem::take(&mut *bytes)) {
        Ok(text) => Ok(Zeroizing::new(text)),
        Err(e) => {
            e.into_bytes().zeroize();
            Err(PwgError::DecompressFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{CipherKind, RandomPool};

    fn rng() -> RandomPool {
        RandomPool::with_system_entropy(CipherKind::AesCtr).unwrap()
    }

    #[test]
    fn test_roundtrip_current_version() {
        let mut rng = rng();
        let encrypted = encrypt_text("Hello, world!", "correct-horse", &mut rng).unwrap();
        let decrypted = decrypt_text_versioned(&encrypted, "correct-horse").unwrap();
        assert_eq!(decrypted.text.as_str(), "Hello, world!");
        assert_eq!(decrypted.version, ContainerVersion::V3);
    }

    #[test]
    fn test_wrong_password() {
        let mut rng = rng();
        let encrypted = encrypt_text("Hello, world!", "correct-horse", &mut rng).unwrap();
        assert!(matches!(
            decrypt_text(&encrypted, "wrong-password"),
            Err(PwgError::BadKey)
        ));
    }

    #[test]
    fn test_every_version_roundtrips() {
        let mut rng = rng();
        for version in ContainerVersion::ALL {
            let encrypted =
                encrypt_text_with_version("legacy text", "pw", version, &mut rng).unwrap();
            let decrypted = decrypt_text_versioned(&encrypted, "pw").unwrap();
            assert_eq!(decrypted.text.as_str(), "legacy text");
            assert_eq!(decrypted.version, version);
            assert!(matches!(
                decrypt_text(&encrypted, "not pw"),
                Err(PwgError::BadKey)
            ));
        }
    }

    #[test]
    fn test_single_character_meets_minimum_size() {
        let mut rng = rng();
        for version in ContainerVersion::ALL {
            let raw = encrypt_container(b"a", b"pw", version, &mut rng).unwrap();
            assert!(raw.len() >= MIN_CONTAINER_SIZE, "{:?}: {}", version, raw.len());
            assert_eq!(raw.len() % BLOCK_SIZE, 0);
            let decrypted = decrypt_container(&raw, b"pw").unwrap();
            assert_eq!(decrypted.text.as_str(), "a");
        }
    }

    #[test]
    fn test_pad_length_recorded_in_iv() {
        let mut rng = rng();
        for text in ["a", "ab", "abcdefghijklmnopqrstuvwxyz", "0123456789abcdef0123456789"] {
            let raw = encrypt_container(text.as_bytes(), b"pw", ContainerVersion::V3, &mut rng).unwrap();
            let iv: [u8; IV_SIZE] = raw[..IV_SIZE].try_into().unwrap();
            assert!(pad_len_from_iv(&iv) < BLOCK_SIZE);
            assert_eq!(decrypt_container(&raw, b"pw").unwrap().text.as_str(), text);
        }
    }

    #[test]
    fn test_empty_and_oversized_text() {
        let mut rng = rng();
        assert!(matches!(encrypt_text("", "pw", &mut rng), Err(PwgError::NoText)));
        let huge = "x".repeat(MAX_TEXT_LEN + 1);
        assert!(matches!(
            encrypt_text(&huge, "pw", &mut rng),
            Err(PwgError::TextTooLong(_))
        ));
    }

    #[test]
    fn test_short_input_rejected_before_decryption() {
        for len in [0usize, 16, 64, 80, 89] {
            let data = vec![0u8; len];
            assert!(matches!(
                decrypt_container(&data, b"pw"),
                Err(PwgError::TextCorrupted)
            ));
        }
        // long enough but not block aligned
        assert!(matches!(
            decrypt_container(&[0u8; 97], b"pw"),
            Err(PwgError::TextCorrupted)
        ));
    }

    #[test]
    fn test_unknown_version_with_valid_magic() {
        let mut rng = rng();
        let mut raw = encrypt_container(b"future", b"pw", ContainerVersion::V3, &mut rng).unwrap();
        let iv: [u8; IV_SIZE] = raw[..IV_SIZE].try_into().unwrap();
        let key = init_crypto(b"pw", &iv, ContainerVersion::V3).unwrap();

        // flip the version byte by re-encrypting the first block
        let mut first = [0u8; BLOCK_SIZE];
        first.copy_from_slice(&raw[IV_SIZE..IV_SIZE + BLOCK_SIZE]);
        CbcDecryptor::new(&key, &iv).decrypt(&mut first).unwrap();
        first[3] = 9;
        cbc_encrypt(&key, &iv, &mut first).unwrap();
        raw[IV_SIZE..IV_SIZE + BLOCK_SIZE].copy_from_slice(&first);

        assert!(matches!(
            decrypt_container(&raw, b"pw"),
            Err(PwgError::TextCorrupted)
        ));
    }

    #[test]
    fn test_tampered_tag_is_bad_key() {
        let mut rng = rng();
        for version in ContainerVersion::ALL {
            let mut raw = encrypt_container(b"tamper me", b"pw", version, &mut rng).unwrap();
            let last = raw.len() - 1;
            raw[last] ^= 0x01;
            assert!(
                matches!(decrypt_container(&raw, b"pw"), Err(PwgError::BadKey)),
                "{:?}",
                version
            );
        }
    }

    #[test]
    fn test_unicode_text() {
        let mut rng = rng();
        let text = "pässwörd ✓ 密码 🔑";
        let encrypted = encrypt_text(text, "κλειδί", &mut rng).unwrap();
        assert_eq!(decrypt_text(&encrypted, "κλειδί").unwrap().as_str(), text);
    }

    #[test]
    fn test_armor_is_wrapped() {
        let mut rng = rng();
        let text = "long secret ".repeat(40);
        let encrypted = encrypt_text(&text, "pw", &mut rng).unwrap();
        assert!(encrypted.contains("\r\n"));
        assert!(encrypted.split("\r\n").all(|line| line.len() <= 76));
        let unwrapped: String = encrypted.split("\r\n").collect();
        assert_eq!(decrypt_text(&unwrapped, "pw").unwrap().as_str(), text);
    }
}
