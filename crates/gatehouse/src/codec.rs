//! Rotating-key authenticated encryption for state tokens.
//!
//! A token is `version || issue-time || nonce || ciphertext`, url-safe
//! base64 encoded, with the plaintext header authenticated as AAD. The
//! key ring holds `max_keys` symmetric keys, newest first; decryption
//! tries them in order, so a token issued under a key that has since
//! rotated still decrypts while its age stays within tolerance. The ring
//! is replaced wholesale on rotation - readers always see a complete
//! snapshot.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::XChaCha20Poly1305;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

use palisade_common::constants::REASONABLE_NUMBER_OF_KEYS;
use palisade_common::PalisadeError;

const TOKEN_VERSION: u8 = 1;
const NONCE_LEN: usize = 24;
const HEADER_LEN: usize = 1 + 8;
const KEY_LEN: usize = 32;

/// Codec construction parameters
#[derive(Debug, Clone)]
pub struct StateCodecConfig {
    /// Maximum token age still accepted for decryption (must be > 0)
    pub aging_tolerance_secs: u64,

    /// Seconds between key rotations; 0 disables rotation
    pub renewal_frequency_secs: u64,
}

/// Encrypts and decrypts opaque state blobs under a sliding window of keys
pub struct StateCodec {
    config: StateCodecConfig,
    max_keys: usize,
    ring: RwLock<Arc<Vec<[u8; KEY_LEN]>>>,
}

impl StateCodec {
    /// Create a codec with a single fresh key.
    ///
    /// Fails when `aging_tolerance_secs` is zero or the computed ring size
    /// reaches the sane ceiling.
    pub fn new(config: StateCodecConfig) -> Result<Self, PalisadeError> {
        if config.aging_tolerance_secs == 0 {
            return Err(PalisadeError::Config(
                "state aging tolerance must be positive".to_string(),
            ));
        }

        let max_keys = if config.renewal_frequency_secs == 0 {
            1
        } else {
            1 + config
                .aging_tolerance_secs
                .div_ceil(config.renewal_frequency_secs) as usize
        };

        if max_keys >= REASONABLE_NUMBER_OF_KEYS {
            return Err(PalisadeError::Config(format!(
                "key ring of {max_keys} keys exceeds the ceiling of {REASONABLE_NUMBER_OF_KEYS}"
            )));
        }

        Ok(Self {
            config,
            max_keys,
            ring: RwLock::new(Arc::new(vec![generate_key()])),
        })
    }

    /// Computed ring capacity
    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Rotation interval; zero means rotation is disabled
    pub fn renewal_frequency(&self) -> Duration {
        Duration::from_secs(self.config.renewal_frequency_secs)
    }

    /// Prepend a fresh key and drop the tail beyond capacity.
    ///
    /// Installs a new ring snapshot; in-flight decrypts keep the snapshot
    /// they already read.
    pub async fn rotate(&self) {
        let mut guard = self.ring.write().await;
        let mut next = Vec::with_capacity(self.max_keys);
        next.push(generate_key());
        next.extend(guard.iter().take(self.max_keys - 1).copied());
        let ring_len = next.len();
        *guard = Arc::new(next);
        drop(guard);

        tracing::debug!(ring_len = ring_len, "State key rotated");
    }

    /// Encrypt `state` under the newest key
    pub async fn encrypt<S: Serialize>(&self, state: &S) -> Result<String, PalisadeError> {
        self.encrypt_at(state, chrono::Utc::now().timestamp()).await
    }

    async fn encrypt_at<S: Serialize>(
        &self,
        state: &S,
        issued_at: i64,
    ) -> Result<String, PalisadeError> {
        let plaintext = bincode::serialize(state)
            .map_err(|e| PalisadeError::Internal(format!("state serialization failed: {e}")))?;

        let mut header = [0u8; HEADER_LEN];
        header[0] = TOKEN_VERSION;
        header[1..].copy_from_slice(&issued_at.to_be_bytes());

        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let ring = self.ring.read().await.clone();
        let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(&ring[0]));
        let ciphertext = cipher
            .encrypt(
                GenericArray::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: &header,
                },
            )
            .map_err(|e| PalisadeError::Internal(format!("state encryption failed: {e}")))?;

        let mut token = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&header);
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(&token))
    }

    /// Decrypt a token, trying ring keys newest first.
    ///
    /// Every failure - malformed, expired, tampered, or issued under a
    /// purged key - collapses into the same `CannotDecrypt` error.
    pub async fn decrypt<S: DeserializeOwned>(&self, token: &str) -> Result<S, PalisadeError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| PalisadeError::CannotDecrypt)?;

        if raw.len() <= HEADER_LEN + NONCE_LEN || raw[0] != TOKEN_VERSION {
            return Err(PalisadeError::CannotDecrypt);
        }

        let (header, rest) = raw.split_at(HEADER_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        let mut issued_at_bytes = [0u8; 8];
        issued_at_bytes.copy_from_slice(&header[1..]);
        let issued_at = i64::from_be_bytes(issued_at_bytes);

        let age = chrono::Utc::now().timestamp() - issued_at;
        if age < 0 || age > self.config.aging_tolerance_secs as i64 {
            return Err(PalisadeError::CannotDecrypt);
        }

        let ring = self.ring.read().await.clone();
        for key in ring.iter() {
            let cipher = XChaCha20Poly1305::new(GenericArray::from_slice(key));
            if let Ok(plaintext) = cipher.decrypt(
                GenericArray::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            ) {
                return bincode::deserialize(&plaintext).map_err(|_| PalisadeError::CannotDecrypt);
            }
        }

        Err(PalisadeError::CannotDecrypt)
    }
}

fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Background worker that rotates the key ring on a timer
pub async fn rotation_worker(codec: Arc<StateCodec>, mut shutdown: broadcast::Receiver<()>) {
    let every = codec.renewal_frequency();
    if every.is_zero() {
        tracing::info!("Key rotation disabled (renewal frequency is 0)");
        return;
    }

    tracing::info!(every_secs = every.as_secs(), "Key rotation worker started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(every) => {
                codec.rotate().await;
            }
            _ = shutdown.recv() => {
                tracing::info!("Key rotation worker shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_common::{ChallengeState, HashcashParams};
    use std::collections::BTreeSet;

    fn sample_state() -> ChallengeState {
        ChallengeState {
            server_time: "20260101-120000".to_string(),
            captcha_solutions: BTreeSet::from(["otter".to_string(), "otters".to_string()]),
            csrf_token: "csrf-abc".to_string(),
            hashcash: HashcashParams {
                server_string: "srv-xyz".to_string(),
                zero_count: 18,
            },
        }
    }

    fn codec(tolerance: u64, renewal: u64) -> StateCodec {
        StateCodec::new(StateCodecConfig {
            aging_tolerance_secs: tolerance,
            renewal_frequency_secs: renewal,
        })
        .unwrap()
    }

    #[test]
    fn ring_capacity_follows_the_window() {
        assert_eq!(codec(120, 0).max_keys(), 1);
        assert_eq!(codec(10, 30).max_keys(), 2);
        assert_eq!(codec(120, 30).max_keys(), 5);
        // Non-divisible window rounds up
        assert_eq!(codec(100, 30).max_keys(), 5);
    }

    #[test]
    fn construction_rejects_bad_parameters() {
        assert!(StateCodec::new(StateCodecConfig {
            aging_tolerance_secs: 0,
            renewal_frequency_secs: 30,
        })
        .is_err());

        assert!(StateCodec::new(StateCodecConfig {
            aging_tolerance_secs: 100_000,
            renewal_frequency_secs: 1,
        })
        .is_err());
    }

    #[tokio::test]
    async fn round_trip() {
        let codec = codec(120, 30);
        let state = sample_state();
        let token = codec.encrypt(&state).await.unwrap();
        let decrypted: ChallengeState = codec.decrypt(&token).await.unwrap();
        assert_eq!(decrypted, state);
    }

    #[tokio::test]
    async fn tampered_token_fails() {
        let codec = codec(120, 30);
        let token = codec.encrypt(&sample_state()).await.unwrap();

        let mut tampered: Vec<u8> = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(&tampered);

        let result: Result<ChallengeState, _> = codec.decrypt(&tampered).await;
        assert!(matches!(result, Err(PalisadeError::CannotDecrypt)));
    }

    #[tokio::test]
    async fn garbage_tokens_fail_generically() {
        let codec = codec(120, 30);
        for garbage in ["", "not base64 !!", "AAAA"] {
            let result: Result<ChallengeState, _> = codec.decrypt(garbage).await;
            assert!(matches!(result, Err(PalisadeError::CannotDecrypt)));
        }
    }

    #[tokio::test]
    async fn survives_rotation_within_the_window() {
        let codec = codec(120, 30); // 5 keys
        let token = codec.encrypt(&sample_state()).await.unwrap();

        // Issue key may rotate out of first place but stays in the ring
        for _ in 0..codec.max_keys() - 1 {
            codec.rotate().await;
        }
        let decrypted: ChallengeState = codec.decrypt(&token).await.unwrap();
        assert_eq!(decrypted, sample_state());

        // One rotation more and the issue key is purged
        codec.rotate().await;
        let result: Result<ChallengeState, _> = codec.decrypt(&token).await;
        assert!(matches!(result, Err(PalisadeError::CannotDecrypt)));
    }

    #[tokio::test]
    async fn aged_out_token_fails() {
        let codec = codec(60, 0);
        let now = chrono::Utc::now().timestamp();

        let stale = codec
            .encrypt_at(&sample_state(), now - 61)
            .await
            .unwrap();
        let result: Result<ChallengeState, _> = codec.decrypt(&stale).await;
        assert!(matches!(result, Err(PalisadeError::CannotDecrypt)));

        // Age just inside the tolerance bound still decrypts
        let edge = codec.encrypt_at(&sample_state(), now - 58).await.unwrap();
        let decrypted: ChallengeState = codec.decrypt(&edge).await.unwrap();
        assert_eq!(decrypted, sample_state());
    }

    #[tokio::test]
    async fn future_dated_token_fails() {
        let codec = codec(60, 0);
        let now = chrono::Utc::now().timestamp();
        let token = codec.encrypt_at(&sample_state(), now + 30).await.unwrap();
        let result: Result<ChallengeState, _> = codec.decrypt(&token).await;
        assert!(matches!(result, Err(PalisadeError::CannotDecrypt)));
    }
}
