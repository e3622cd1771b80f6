//! Core types shared across Palisade components.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::constants::TIMESTAMP_FORMAT;

/// Proof-of-work parameters issued with a challenge and echoed back inside
/// the encrypted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashcashParams {
    /// Server-chosen random string the client must include in its token
    pub server_string: String,

    /// Leading zero bits required of the token digest
    pub zero_count: u32,
}

/// Per-challenge secrets bundled at preparation time and returned by the
/// client, unmodified, inside the encrypted state token.
///
/// The plaintext exists only inside the preparation and validation calls;
/// between them it travels encrypted through the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeState {
    /// Issue time in wire format (UTC)
    pub server_time: String,

    /// Closed set of accepted CAPTCHA answers
    pub captcha_solutions: BTreeSet<String>,

    /// CSRF token the client must echo in its header
    pub csrf_token: String,

    /// Proof-of-work parameters for this challenge
    pub hashcash: HashcashParams,
}

/// Stage at which validation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Referrer,
    Host,
    RemoteAddress,
    Body,
    Username,
    Password,
    Csrf,
    Captcha,
    Hashcash,
    State,
    #[serde(rename = "username-password")]
    Credentials,
    General,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Referrer => "referrer",
            Self::Host => "host",
            Self::RemoteAddress => "remote_address",
            Self::Body => "body",
            Self::Username => "username",
            Self::Password => "password",
            Self::Csrf => "csrf",
            Self::Captcha => "captcha",
            Self::Hashcash => "hashcash",
            Self::State => "state",
            Self::Credentials => "username-password",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-visible portion of a validation outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibleResponse {
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

/// Server-side diagnostics for a failed validation; logged, not
/// necessarily exposed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityDetails {
    pub failure_stage: FailureStage,
    pub failure_reason: String,
}

/// Outcome of one validation flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub visible_response: VisibleResponse,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_details: Option<SecurityDetails>,
}

impl ValidationReport {
    /// Terminal success with a fresh session key
    pub fn passed(session_key: String) -> Self {
        Self {
            visible_response: VisibleResponse {
                passed: true,
                session_key: Some(session_key),
            },
            security_details: None,
        }
    }

    /// Terminal failure at `stage`
    pub fn failure(stage: FailureStage, reason: impl Into<String>) -> Self {
        Self {
            visible_response: VisibleResponse {
                passed: false,
                session_key: None,
            },
            security_details: Some(SecurityDetails {
                failure_stage: stage,
                failure_reason: reason.into(),
            }),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.visible_response.passed
    }

    pub fn stage(&self) -> Option<FailureStage> {
        self.security_details.as_ref().map(|d| d.failure_stage)
    }
}

/// Client policy published with every challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInstructions {
    pub captcha: RequirementPolicy,
    pub hashcash: HashcashPolicy,
    pub csrf_token: RequirementPolicy,
    pub tolerance: TolerancePolicy,
    pub hashing: HashingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementPolicy {
    pub require: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashcashPolicy {
    pub require: bool,
    pub zero_count: u32,
    pub server_string: String,
}

/// Minimum lengths the client should enforce before submitting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TolerancePolicy {
    pub minimum_characters_password: usize,
    pub minimum_alphabet_passphrase: usize,
}

/// Client-side hashing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashingPolicy {
    pub salt_hash_by_username: bool,
    pub hash_cycles: u32,
    pub result_length: u32,
}

/// Preparation output, embedded by the transport layer in a login form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedChallenge {
    /// CAPTCHA grid as a JPEG data URI
    pub captcha: String,

    /// Encrypted state token (opaque to the client)
    pub state: String,

    #[serde(rename = "csrfToken")]
    pub csrf_token: String,

    #[serde(rename = "server-instructions")]
    pub server_instructions: ServerInstructions,
}

/// Format a UTC instant in the wire timestamp format
pub fn wire_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a wire timestamp back into a UTC instant
pub fn parse_wire_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_timestamp_round_trips() {
        let now = Utc::now();
        let parsed = parse_wire_timestamp(&wire_timestamp(now)).unwrap();
        // Sub-second precision is not carried on the wire
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn failure_report_serializes_stage_tag() {
        let report = ValidationReport::failure(FailureStage::Credentials, "invalid credentials");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json["security_details"]["failure_stage"],
            "username-password"
        );
        assert_eq!(json["visible_response"]["passed"], false);
        assert!(json["visible_response"].get("session_key").is_none());
    }

    #[test]
    fn passed_report_carries_session_key() {
        let report = ValidationReport::passed("abc".into());
        assert!(report.is_passed());
        assert_eq!(report.stage(), None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["visible_response"]["session_key"], "abc");
    }
}
