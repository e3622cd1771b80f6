//! Shared constants for Palisade components.

/// Default Gatehouse HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8710";

/// Wire timestamp format (UTC), used by both the hashcash clock and the
/// state clock
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Upper bound on the key ring; a computed ring this large is a
/// misconfiguration, not a workload
pub const REASONABLE_NUMBER_OF_KEYS: usize = 500;

/// Minimum length for usernames, passwords, and salts
pub const MIN_SECURITY_STRING_LEN: usize = 3;

/// Random bytes behind a session key
pub const SESSION_KEY_BYTES: usize = 40;

/// Number of colon-separated fields in a hashcash token
pub const HASHCASH_FIELDS: usize = 6;

/// Default freshness window for a submitted hashcash (seconds)
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 120;

/// Default freshness window for an issued login form (seconds)
pub const DEFAULT_LOGIN_FORM_TIMEOUT_SECS: u64 = 120;

/// Default state token aging tolerance (seconds)
pub const DEFAULT_STATE_AGING_TOLERANCE_SECS: u64 = 120;

/// Default key rotation interval (seconds); 0 disables rotation
pub const DEFAULT_KEY_RENEWAL_FREQUENCY_SECS: u64 = 30;

/// Default leading zero bits required of a hashcash digest
pub const DEFAULT_HASHCASH_ZERO_COUNT: u32 = 18;

/// CAPTCHA grid geometry
pub mod captcha {
    /// Edge of one tile in pixels
    pub const TILE_EDGE: u32 = 200;

    /// Edge of the composed grid in pixels (2x2 tiles)
    pub const GRID_EDGE: u32 = 400;

    /// Images drawn from the main category
    pub const MAIN_IMAGES: usize = 3;

    /// Minimum category folders under the image root
    pub const MIN_CATEGORIES: usize = 2;

    /// Minimum qualifying images per category folder
    pub const MIN_IMAGES_PER_CATEGORY: usize = 3;
}

/// HTTP header names
pub mod headers {
    /// Username header
    pub const X_USERNAME: &str = "X-Username";

    /// Client-side hashed password header
    pub const X_HASHED_PASSTEXT: &str = "X-hashed-Passtext";

    /// CSRF token header
    pub const X_CSRF_TOKEN: &str = "X-Csrf-Token";

    /// CAPTCHA answer header
    pub const X_CAPTCHA: &str = "X-Captcha";

    /// Proof-of-work token header
    pub const X_HASHCASH: &str = "X-Hashcash";
}
