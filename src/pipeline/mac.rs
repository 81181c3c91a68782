use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::header::HMAC_SIZE;

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(key: &[u8], parts: &[&[u8]]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    for part in parts {
        mac.update(part);
    }
    mac
}

/// HMAC-SHA256 over the concatenation of `parts`
pub fn compute_mac(key: &[u8], parts: &[&[u8]]) -> [u8; HMAC_SIZE] {
    keyed_mac(key, parts).finalize().into_bytes().into()
}

/// Verify a tag, which may be a truncated prefix of the full HMAC
pub fn verify_mac(key: &[u8], parts: &[&[u8]], tag: &[u8]) -> bool {
    // an empty prefix would verify trivially
    if tag.is_empty() || tag.len() > HMAC_SIZE {
        return false;
    }
    keyed_mac(key, parts).verify_truncated_left(tag).is_ok()
}
