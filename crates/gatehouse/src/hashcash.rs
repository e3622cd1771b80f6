//! Proof-of-work (hashcash-style) token parsing and validation.
//!
//! Token layout: `zero_count:timestamp:client_ip:server_string:salt:nonce`.
//! The last two fields are client-chosen to satisfy the digest requirement
//! and are never interpreted beyond being part of the hashed bytes.

use sha2::{Digest, Sha256};
use thiserror::Error;

use palisade_common::constants::HASHCASH_FIELDS;

/// Structural errors in a submitted proof-of-work token
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashcashParseError {
    #[error("expected 6 colon-separated fields, got {0}")]
    FieldCount(usize),

    #[error("zero count is not an integer")]
    ZeroCount,
}

/// A parsed client proof-of-work token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashcashToken {
    /// Leading zero bits the client claims to have achieved
    pub zero_count: u32,

    /// Client clock in wire format, validated against `submit_timeout`
    pub timestamp: String,

    /// Client's claim of its own address
    pub client_ip: String,

    /// Server-issued random string, cross-checked against the state
    pub server_string: String,

    raw: String,
}

impl HashcashToken {
    pub fn parse(raw: &str) -> Result<Self, HashcashParseError> {
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() != HASHCASH_FIELDS {
            return Err(HashcashParseError::FieldCount(parts.len()));
        }

        let zero_count = parts[0].parse().map_err(|_| HashcashParseError::ZeroCount)?;

        Ok(Self {
            zero_count,
            timestamp: parts[1].to_string(),
            client_ip: parts[2].to_string(),
            server_string: parts[3].to_string(),
            raw: raw.to_string(),
        })
    }

    /// Digest check over the full token bytes at the claimed difficulty
    pub fn meets_difficulty(&self) -> bool {
        validate_zero_bits(self.raw.as_bytes(), self.zero_count)
    }
}

/// Check that the SHA-256 digest of `token` begins with `zero_bits` zero bits.
///
/// Pure and stateless; the cost asymmetry (the client searched for a nonce,
/// we hash once) is the security property.
pub fn validate_zero_bits(token: &[u8], zero_bits: u32) -> bool {
    let digest = Sha256::digest(token);
    leading_zero_bits(&digest) >= zero_bits
}

fn leading_zero_bits(bytes: &[u8]) -> u32 {
    let mut count = 0;
    for byte in bytes {
        if *byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count
}
