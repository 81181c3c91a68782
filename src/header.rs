use crate::error::{PwgError, Result};

/// Container magic, first three bytes of every v1+ header
pub const MAGIC: &[u8; 3] = b"PWG";

/// AES block size; also the IV size
pub const BLOCK_SIZE: usize = 16;
pub const IV_SIZE: usize = 16;

/// Full HMAC-SHA256 tag size
pub const HMAC_SIZE: usize = 32;

/// Truncated tag used by version 0 containers
pub const LEGACY_HMAC_SIZE: usize = 16;

/// Largest plaintext (UTF-8 bytes) a container may hold: 128 MiB
pub const MAX_TEXT_LEN: usize = 128 << 20;

/// Smallest decoded container accepted by the decoder
pub const MIN_CONTAINER_SIZE: usize = 90;

/// Container format versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContainerVersion {
    /// Legacy: SHA-256 chain KDF, bare length header, truncated HMAC over ciphertext
    V0,
    /// PBKDF2 key, HMAC over plaintext appended after the ciphertext
    V1,
    V2,
    /// HMAC encrypted together with the payload
    V3,
}

impl ContainerVersion {
    pub const CURRENT: ContainerVersion = ContainerVersion::V3;

    pub const ALL: [ContainerVersion; 4] = [
        ContainerVersion::V0,
        ContainerVersion::V1,
        ContainerVersion::V2,
        ContainerVersion::V3,
    ];

    /// Map a header version byte to a known version
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::V0),
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::V0 => 0,
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    /// Whether the HMAC travels inside the encrypted region
    pub fn encrypted_hmac(self) -> bool {
        self >= Self::V3
    }

    /// Size of the in-band header for this version
    pub fn header_size(self) -> usize {
        match self {
            Self::V0 => LegacyHeader::SIZE,
            _ => ContainerHeader::SIZE,
        }
    }

    /// Size of the authentication tag stored in the container
    pub fn hmac_size(self) -> usize {
        match self {
            Self::V0 => LEGACY_HMAC_SIZE,
            _ => HMAC_SIZE,
        }
    }
}

impl std::str::FromStr for ContainerVersion {
    type Err = PwgError;
    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .trim_start_matches(['v', 'V'])
            .parse::<u8>()
            .ok()
            .and_then(Self::from_byte)
            .ok_or_else(|| {
                PwgError::Config(<serde_json::Error as serde::de::Error>::custom(format!(
                    "unknown container version '{}', expected v0..v3",
                    s
                )))
            })
    }
}

/// Container header for versions 1 and later
/// Layout: [magic: 3][version: 1][plaintext_len: 4, LE]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Raw version byte, which may name a version this build does not know
    pub version: u8,
    /// UTF-8 plaintext length before compression
    pub plaintext_len: u32,
}

impl ContainerHeader {
    pub const SIZE: usize = 8;

    pub fn new(version: ContainerVersion, plaintext_len: u32) -> Self {
        Self {
            version: version.as_byte(),
            plaintext_len,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..3].copy_from_slice(MAGIC);
        buf[3] = self.version;
        buf[4..8].copy_from_slice(&self.plaintext_len.to_le_bytes());
        buf
    }

    /// Parse a decrypted header; `None` when the magic does not match
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || &data[0..3] != MAGIC {
            return None;
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&data[4..8]);
        Some(Self {
            version: data[3],
            plaintext_len: u32::from_le_bytes(len),
        })
    }

    /// Declared length must be in (0, MAX_TEXT_LEN]
    pub fn length_is_valid(&self) -> bool {
        plaintext_len_is_valid(self.plaintext_len)
    }
}

/// Version 0 header: only the plaintext length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyHeader {
    pub plaintext_len: u32,
}

impl LegacyHeader {
    pub const SIZE: usize = 4;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        self.plaintext_len.to_le_bytes()
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let bytes: [u8; Self::SIZE] = data.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self {
            plaintext_len: u32::from_le_bytes(bytes),
        })
    }

    pub fn length_is_valid(&self) -> bool {
        plaintext_len_is_valid(self.plaintext_len)
    }
}

fn plaintext_len_is_valid(len: u32) -> bool {
    len > 0 && len as usize <= MAX_TEXT_LEN
}

/// Random pad length is carried in the low nibble of the IV's final byte
pub fn pad_len_from_iv(iv: &[u8; IV_SIZE]) -> usize {
    (iv[IV_SIZE - 1] & 0x0F) as usize
}

pub fn store_pad_len_in_iv(iv: &mut [u8; IV_SIZE], pad_len: usize) {
    debug_assert!(pad_len < BLOCK_SIZE);
    iv[IV_SIZE - 1] = (iv[IV_SIZE - 1] & 0xF0) | (pad_len as u8 & 0x0F);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = ContainerHeader::new(ContainerVersion::V3, 0x0102_0304);
        let bytes = header.to_bytes();
        assert_eq!(&bytes, b"PWG\x03\x04\x03\x02\x01");
        assert_eq!(ContainerHeader::from_bytes(&bytes), Some(header));
    }

    #[test]
    fn test_bad_magic() {
        assert!(ContainerHeader::from_bytes(b"PWX\x03\x01\x00\x00\x00").is_none());
        assert!(ContainerHeader::from_bytes(b"PWG").is_none());
    }

    #[test]
    fn test_length_bounds() {
        assert!(!ContainerHeader::new(ContainerVersion::V1, 0).length_is_valid());
        assert!(ContainerHeader::new(ContainerVersion::V1, 1).length_is_valid());
        assert!(ContainerHeader::new(ContainerVersion::V1, MAX_TEXT_LEN as u32).length_is_valid());
        assert!(!ContainerHeader::new(ContainerVersion::V1, MAX_TEXT_LEN as u32 + 1).length_is_valid());
        assert!(!LegacyHeader { plaintext_len: 0 }.length_is_valid());
    }

    #[test]
    fn test_version_properties() {
        assert!(!ContainerVersion::V1.encrypted_hmac());
        assert!(!ContainerVersion::V2.encrypted_hmac());
        assert!(ContainerVersion::V3.encrypted_hmac());
        assert_eq!(ContainerVersion::V0.hmac_size(), 16);
        assert_eq!(ContainerVersion::V0.header_size(), 4);
        assert_eq!(ContainerVersion::from_byte(4), None);
        assert_eq!("v2".parse::<ContainerVersion>().unwrap(), ContainerVersion::V2);
    }

    #[test]
    fn test_version_from_str() {
        assert_eq!("0".parse::<ContainerVersion>().unwrap(), ContainerVersion::V0);
        assert_eq!(" V3 ".parse::<ContainerVersion>().unwrap(), ContainerVersion::V3);
        for bad in ["v4", "three", ""] {
            match bad.parse::<ContainerVersion>() {
                Err(PwgError::Config(e)) => assert!(e.to_string().contains("unknown container version")),
                other => panic!("expected a configuration error for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_pad_nibble() {
        let mut iv = [0xABu8; IV_SIZE];
        store_pad_len_in_iv(&mut iv, 7);
        assert_eq!(iv[15], 0xA7);
        assert_eq!(pad_len_from_iv(&iv), 7);
        assert_eq!(&iv[..15], &[0xAB; 15]);
    }
}
