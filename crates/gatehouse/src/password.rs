//! Salted double-hash credential repository.
//!
//! The pipeline hands over credentials that are already hashed client-side;
//! this layer adds the server-side salting. Usernames are hashed with the
//! repository-wide salt and passwords with the resulting hashed username,
//! so per-user salts are derived, never stored. Plaintext credentials never
//! reach the storage backend.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::RwLock;

use palisade_common::constants::MIN_SECURITY_STRING_LEN;
use palisade_common::CredentialError;

/// Storage backend holding hashed pairs; durable engines live outside this
/// crate and plug in here
pub trait PasswordStore: Send + Sync {
    fn store(&self, hashed_username: String, hashed_password: String);

    fn load(&self, hashed_username: &str) -> Option<String>;
}

/// In-memory store for tests and the reference server
#[derive(Default)]
pub struct MemoryPasswordStore {
    records: RwLock<HashMap<String, String>>,
}

impl PasswordStore for MemoryPasswordStore {
    fn store(&self, hashed_username: String, hashed_password: String) {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(hashed_username, hashed_password);
    }

    fn load(&self, hashed_username: &str) -> Option<String> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(hashed_username)
            .cloned()
    }
}

/// Credential verification over a pluggable store
pub struct PasswordRepository {
    username_salt: String,
    store: Box<dyn PasswordStore>,
}

impl PasswordRepository {
    /// Fails when the repository salt is below the minimum length floor
    pub fn new(
        username_salt: impl Into<String>,
        store: Box<dyn PasswordStore>,
    ) -> Result<Self, CredentialError> {
        let username_salt = username_salt.into();
        check_security_string(&username_salt, "username salt")?;
        Ok(Self {
            username_salt,
            store,
        })
    }

    /// Hash and persist a credential pair
    pub fn save(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        check_security_string(username, "username")?;
        check_security_string(password, "password")?;

        let hashed_username = hash_with_salt(username, &self.username_salt);
        let hashed_password = hash_with_salt(password, &hashed_username);
        self.store.store(hashed_username, hashed_password);
        Ok(())
    }

    /// Verify a credential pair.
    ///
    /// `UserNotFound` and `WrongPassword` stay distinct here; callers that
    /// face the outside world collapse them.
    pub fn verify(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let hashed_username = hash_with_salt(username, &self.username_salt);

        match self.store.load(&hashed_username) {
            None => Err(CredentialError::UserNotFound),
            Some(stored) => {
                if stored == hash_with_salt(password, &hashed_username) {
                    Ok(())
                } else {
                    Err(CredentialError::WrongPassword)
                }
            }
        }
    }
}

fn check_security_string(value: &str, field: &'static str) -> Result<(), CredentialError> {
    if value.trim().len() < MIN_SECURITY_STRING_LEN {
        return Err(CredentialError::TooShort {
            field,
            minimum: MIN_SECURITY_STRING_LEN,
        });
    }
    Ok(())
}

fn hash_with_salt(value: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.as_bytes());
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
}
