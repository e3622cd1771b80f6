//! Configuration management for Gatehouse.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use palisade_common::constants::{
    DEFAULT_HASHCASH_ZERO_COUNT, DEFAULT_KEY_RENEWAL_FREQUENCY_SECS, DEFAULT_LISTEN_ADDR,
    DEFAULT_LOGIN_FORM_TIMEOUT_SECS, DEFAULT_STATE_AGING_TOLERANCE_SECS,
    DEFAULT_SUBMIT_TIMEOUT_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Root of the curated CAPTCHA image tree
    #[serde(default = "default_captcha_image_root")]
    pub captcha_image_root: String,

    /// Repository-wide username hash salt
    #[serde(default = "default_username_salt")]
    pub username_salt: String,

    /// State codec configuration
    #[serde(default)]
    pub codec: CodecSettings,

    /// Validation pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Challenge issuing policy
    #[serde(default)]
    pub challenge: ChallengeSettings,

    /// Latency normalization configuration
    #[serde(default)]
    pub staller: StallerSettings,
}

/// State codec configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CodecSettings {
    /// Maximum accepted state token age in seconds
    #[serde(default = "default_state_aging_tolerance")]
    pub state_aging_tolerance_secs: u64,

    /// Seconds between key rotations; 0 disables rotation
    #[serde(default = "default_key_renewal_frequency")]
    pub key_renewal_frequency_secs: u64,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            state_aging_tolerance_secs: default_state_aging_tolerance(),
            key_renewal_frequency_secs: default_key_renewal_frequency(),
        }
    }
}

/// Validation pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Freshness window for a submitted hashcash in seconds
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,

    /// Freshness window for an issued login form in seconds
    #[serde(default = "default_login_form_timeout")]
    pub login_form_timeout_secs: u64,

    /// Trusted addresses accepted when the request arrives through a proxy
    /// tier and the remote address is one of our own
    #[serde(default)]
    pub self_ip_addresses: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            submit_timeout_secs: default_submit_timeout(),
            login_form_timeout_secs: default_login_form_timeout(),
            self_ip_addresses: vec![],
        }
    }
}

/// Challenge issuing policy
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeSettings {
    /// Leading zero bits required of a hashcash digest
    #[serde(default = "default_hashcash_zero_count")]
    pub hashcash_zero_count: u32,

    /// Random bytes behind a CSRF token
    #[serde(default = "default_token_bytes")]
    pub csrf_token_bytes: usize,

    /// Random bytes behind a hashcash server string
    #[serde(default = "default_token_bytes")]
    pub server_string_bytes: usize,

    /// Minimum password length published to clients
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,

    /// Minimum passphrase length published to clients
    #[serde(default = "default_passphrase_min_length")]
    pub passphrase_min_length: usize,

    /// Hash cycles the client applies before submitting
    #[serde(default = "default_client_hash_cycles")]
    pub client_hash_cycles: u32,

    /// Length of the client-side hash result
    #[serde(default = "default_client_hash_length")]
    pub client_hash_length: u32,

    /// Accept plural/singular variants of CAPTCHA category names
    #[serde(default = "default_true")]
    pub plural_solutions: bool,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            hashcash_zero_count: default_hashcash_zero_count(),
            csrf_token_bytes: default_token_bytes(),
            server_string_bytes: default_token_bytes(),
            password_min_length: default_password_min_length(),
            passphrase_min_length: default_passphrase_min_length(),
            client_hash_cycles: default_client_hash_cycles(),
            client_hash_length: default_client_hash_length(),
            plural_solutions: true,
        }
    }
}

/// Latency normalization configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StallerSettings {
    /// Normalized wall-clock budget per validation in milliseconds
    #[serde(default = "default_stall_unit_ms")]
    pub unit_time_ms: u64,

    /// Stall successful validations too
    #[serde(default)]
    pub stall_if_successful: bool,

    /// Abort work that overruns the budget
    #[serde(default = "default_true")]
    pub cut_if_delayed: bool,
}

impl Default for StallerSettings {
    fn default() -> Self {
        Self {
            unit_time_ms: default_stall_unit_ms(),
            stall_if_successful: false,
            cut_if_delayed: true,
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_captcha_image_root() -> String { "assets/captcha-images".to_string() }
fn default_username_salt() -> String { "gatehouse-dev-salt".to_string() }
fn default_state_aging_tolerance() -> u64 { DEFAULT_STATE_AGING_TOLERANCE_SECS }
fn default_key_renewal_frequency() -> u64 { DEFAULT_KEY_RENEWAL_FREQUENCY_SECS }
fn default_submit_timeout() -> u64 { DEFAULT_SUBMIT_TIMEOUT_SECS }
fn default_login_form_timeout() -> u64 { DEFAULT_LOGIN_FORM_TIMEOUT_SECS }
fn default_hashcash_zero_count() -> u32 { DEFAULT_HASHCASH_ZERO_COUNT }
fn default_token_bytes() -> usize { 20 }
fn default_password_min_length() -> usize { 8 }
fn default_passphrase_min_length() -> usize { 16 }
fn default_client_hash_cycles() -> u32 { 64 }
fn default_client_hash_length() -> u32 { 40 }
fn default_stall_unit_ms() -> u64 { 2_000 }
fn default_true() -> bool { true }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref image_root) = args.captcha_images {
            config.captcha_image_root = image_root.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            captcha_image_root: default_captcha_image_root(),
            username_salt: default_username_salt(),
            codec: CodecSettings::default(),
            pipeline: PipelineSettings::default(),
            challenge: ChallengeSettings::default(),
            staller: StallerSettings::default(),
        }
    }
}
