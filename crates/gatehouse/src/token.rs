//! Random url-safe token generation.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Generate a url-safe token from `byte_count` cryptographically random bytes
pub fn random_urlsafe(byte_count: usize) -> String {
    let mut bytes = vec![0u8; byte_count];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_distinct_and_sized() {
        let a = random_urlsafe(20);
        let b = random_urlsafe(20);
        assert_ne!(a, b);
        // 20 bytes -> 27 base64 characters without padding
        assert_eq!(a.len(), 27);
        assert!(!a.contains('='));
    }
}
