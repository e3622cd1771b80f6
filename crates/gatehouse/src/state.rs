//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::captcha::{self, CaptchaForge};
use crate::codec::{StateCodec, StateCodecConfig};
use crate::config::AppConfig;
use crate::password::{MemoryPasswordStore, PasswordRepository};
use crate::staller::Staller;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Rotating-key state codec
    pub codec: Arc<StateCodec>,

    /// CAPTCHA challenge forge
    pub captcha: Arc<CaptchaForge>,

    /// Credential repository
    pub passwords: Arc<PasswordRepository>,

    /// Latency normalizer for validation flows
    pub staller: Arc<Staller>,
}

impl AppState {
    /// Create new application state.
    ///
    /// All construction-time validation happens here: codec parameters,
    /// CAPTCHA inventory, and the repository salt are checked before the
    /// server accepts a single request.
    pub fn new(config: AppConfig) -> Result<Self> {
        let codec = StateCodec::new(StateCodecConfig {
            aging_tolerance_secs: config.codec.state_aging_tolerance_secs,
            renewal_frequency_secs: config.codec.key_renewal_frequency_secs,
        })
        .context("State codec rejected its configuration")?;

        let namer = if config.challenge.plural_solutions {
            captcha::plural_variants
        } else {
            captcha::exact_name
        };
        let captcha = CaptchaForge::new(&config.captcha_image_root, namer)
            .context("CAPTCHA inventory rejected")?;

        let passwords = PasswordRepository::new(
            config.username_salt.clone(),
            Box::new(MemoryPasswordStore::default()),
        )
        .context("Password repository rejected its salt")?;

        let staller = Staller::new(
            Duration::from_millis(config.staller.unit_time_ms),
            config.staller.stall_if_successful,
            config.staller.cut_if_delayed,
        );

        Ok(Self {
            config,
            codec: Arc::new(codec),
            captcha: Arc::new(captcha),
            passwords: Arc::new(passwords),
            staller: Arc::new(staller),
        })
    }
}
