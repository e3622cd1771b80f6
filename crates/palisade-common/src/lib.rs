//! # Palisade Common
//!
//! Shared types, errors, and constants used across Palisade components.
//!
//! ## Modules
//! - `types` - Core data structures (ChallengeState, ValidationReport, etc.)
//! - `error` - Common error types
//! - `constants` - Shared configuration constants and wire formats

pub mod constants;
pub mod error;
pub mod types;

pub use error::{CredentialError, PalisadeError};
pub use types::*;
