//! Fail-fast validation of a challenge response.
//!
//! Validation is a strict ordered chain; the first failed check returns
//! immediately with its stage and reason. State age is bounded but single
//! use is not enforced: a replayed, still-fresh token revalidates. The
//! hashcash timestamp and the state's embedded server time are two
//! independent clocks, each bounded by its own timeout.

use anyhow::Context;
use chrono::TimeDelta;
use serde_json::Value;

use palisade_common::constants::SESSION_KEY_BYTES;
use palisade_common::{parse_wire_timestamp, ChallengeState, FailureStage, ValidationReport};

use crate::codec::StateCodec;
use crate::config::PipelineSettings;
use crate::hashcash::HashcashToken;
use crate::password::PasswordRepository;
use crate::token::random_urlsafe;

/// Transport-extracted request metadata
#[derive(Debug, Clone, Default)]
pub struct RequestDetails {
    pub referrer: Option<String>,
    pub host: Option<String>,
    pub remote_addr: Option<String>,
    pub body: Option<String>,
}

/// Transport-extracted authentication headers
#[derive(Debug, Clone, Default)]
pub struct AuthHeaders {
    pub username: Option<String>,
    pub passtext: Option<String>,
    pub csrf_token: Option<String>,
    pub captcha: Option<String>,
    pub hashcash: Option<String>,
}

/// Outcome of the shared challenge-response chain
enum ChainOutcome {
    /// Steps 1-21 cleared; the credential pair is ready for its flow
    Cleared { username: String, passtext: String },
    Rejected(ValidationReport),
}

/// Validate a login response: the full chain, then credential verification.
///
/// Both "no such user" and "wrong password" surface as one opaque
/// credential failure; distinguishing them would enable enumeration.
pub async fn validate_login(
    request: &RequestDetails,
    headers: &AuthHeaders,
    codec: &StateCodec,
    passwords: &PasswordRepository,
    settings: &PipelineSettings,
) -> ValidationReport {
    let result = async {
        match challenge_chain(request, headers, codec, settings).await? {
            ChainOutcome::Rejected(report) => Ok(report),
            ChainOutcome::Cleared { username, passtext } => {
                Ok(match passwords.verify(&username, &passtext) {
                    Ok(()) => ValidationReport::passed(random_urlsafe(SESSION_KEY_BYTES)),
                    Err(_) => ValidationReport::failure(
                        FailureStage::Credentials,
                        "invalid credentials",
                    ),
                })
            }
        }
    }
    .await;

    finish(result, "login")
}

/// Validate a signup response: the full chain, then credential storage
pub async fn validate_signup(
    request: &RequestDetails,
    headers: &AuthHeaders,
    codec: &StateCodec,
    passwords: &PasswordRepository,
    settings: &PipelineSettings,
) -> ValidationReport {
    let result = async {
        match challenge_chain(request, headers, codec, settings).await? {
            ChainOutcome::Rejected(report) => Ok(report),
            ChainOutcome::Cleared { username, passtext } => {
                Ok(match passwords.save(&username, &passtext) {
                    Ok(()) => ValidationReport::passed(random_urlsafe(SESSION_KEY_BYTES)),
                    Err(e) => ValidationReport::failure(FailureStage::Credentials, e.to_string()),
                })
            }
        }
    }
    .await;

    finish(result, "signup")
}

/// Steps 1-21: everything up to the credential decision
async fn challenge_chain(
    request: &RequestDetails,
    headers: &AuthHeaders,
    codec: &StateCodec,
    settings: &PipelineSettings,
) -> anyhow::Result<ChainOutcome> {
    use FailureStage as Stage;

    // A legitimate browser always sends a referrer; its absence is the
    // cheapest reject
    let Some(referrer) = non_empty(&request.referrer) else {
        return rejected(Stage::Referrer, "not provided");
    };

    let Some(host) = non_empty(&request.host) else {
        return rejected(Stage::Host, "not provided");
    };

    let acceptable_referrer = format!("http://{host}/");
    if !referrer.starts_with(&acceptable_referrer) {
        return rejected(Stage::Referrer, "doesn't match");
    }

    let Some(remote_addr) = non_empty(&request.remote_addr) else {
        return rejected(Stage::RemoteAddress, "not provided");
    };

    let Some(body) = non_empty(&request.body) else {
        return rejected(Stage::Body, "not provided");
    };

    let Some(username) = non_empty(&headers.username) else {
        return rejected(Stage::Username, "not provided");
    };

    let Some(passtext) = non_empty(&headers.passtext) else {
        return rejected(Stage::Password, "not provided");
    };

    let Some(csrf) = non_empty(&headers.csrf_token) else {
        return rejected(Stage::Csrf, "not provided");
    };

    let Some(captcha_answer) = non_empty(&headers.captcha) else {
        return rejected(Stage::Captcha, "not provided");
    };

    let Some(hashcash) = non_empty(&headers.hashcash) else {
        return rejected(Stage::Hashcash, "not provided");
    };

    let Ok(pow) = HashcashToken::parse(hashcash) else {
        return rejected(Stage::Hashcash, "illegal structure");
    };

    let now = chrono::Utc::now();

    let Ok(minted_at) = parse_wire_timestamp(&pow.timestamp) else {
        return rejected(Stage::Hashcash, "timestamp doesn't parse");
    };

    let pow_age = now.signed_duration_since(minted_at);
    if !(pow_age > TimeDelta::zero()
        && pow_age <= TimeDelta::seconds(settings.submit_timeout_secs as i64))
    {
        return rejected(Stage::Hashcash, "timestamp exceeds the submit timeout");
    }

    if remote_addr != pow.client_ip
        && !settings.self_ip_addresses.iter().any(|ip| ip == remote_addr)
    {
        return rejected(
            Stage::Hashcash,
            format!("ip address doesn't match: {remote_addr}"),
        );
    }

    if !pow.meets_difficulty() {
        return rejected(Stage::Hashcash, "zeros not validated");
    }

    let Ok(payload) = serde_json::from_str::<Value>(body) else {
        return rejected(Stage::Body, "bad format");
    };

    let Some(encrypted_state) = payload.get("state").and_then(Value::as_str) else {
        return rejected(Stage::State, "not provided");
    };

    let state: ChallengeState = match codec.decrypt(encrypted_state).await {
        Ok(state) => state,
        Err(e) => return rejected(Stage::State, e.to_string()),
    };

    // The state was issued by us; an unparseable server time is an
    // internal fault, not a client failure
    let issued_at =
        parse_wire_timestamp(&state.server_time).context("state carries a bad server time")?;

    let form_age = now.signed_duration_since(issued_at);
    if !(form_age > TimeDelta::zero()
        && form_age <= TimeDelta::seconds(settings.login_form_timeout_secs as i64))
    {
        return rejected(Stage::State, "login form age exceeds the timeout");
    }

    if pow.zero_count != state.hashcash.zero_count {
        return rejected(Stage::Hashcash, "zeros don't match the state");
    }

    if pow.server_string != state.hashcash.server_string {
        return rejected(Stage::Hashcash, "server string doesn't match the state");
    }

    if csrf != state.csrf_token {
        return rejected(Stage::Csrf, "csrf token doesn't match the state");
    }

    if !state.captcha_solutions.contains(captcha_answer) {
        return rejected(Stage::Captcha, "captcha solution doesn't match");
    }

    Ok(ChainOutcome::Cleared {
        username: username.to_string(),
        passtext: passtext.to_string(),
    })
}

fn rejected(stage: FailureStage, reason: impl Into<String>) -> anyhow::Result<ChainOutcome> {
    Ok(ChainOutcome::Rejected(ValidationReport::failure(
        stage, reason,
    )))
}

/// Convert internal faults into the generic failure stage and log the outcome
fn finish(result: anyhow::Result<ValidationReport>, flow: &str) -> ValidationReport {
    let report = result.unwrap_or_else(|fault| {
        tracing::error!(flow = flow, error = %fault, "Unexpected validation fault");
        ValidationReport::failure(FailureStage::General, fault.to_string())
    });

    match &report.security_details {
        Some(details) => tracing::debug!(
            flow = flow,
            stage = %details.failure_stage,
            reason = %details.failure_reason,
            "Validation rejected"
        ),
        None => tracing::info!(flow = flow, "Validation passed"),
    }

    report
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
