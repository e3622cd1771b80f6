//! Challenge preparation and validation endpoints.

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::net::SocketAddr;

use palisade_common::constants::headers as header_names;
use palisade_common::{FailureStage, PreparedChallenge, ValidationReport};

use crate::auth::{self, AuthHeaders, RequestDetails};
use crate::state::AppState;

/// Issue a fresh challenge for the login form
pub async fn get_challenge(
    State(state): State<AppState>,
) -> Result<Json<PreparedChallenge>, StatusCode> {
    auth::prepare_challenge(&state.codec, &state.captcha, &state.config.challenge)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "Challenge preparation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Validate a login response
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> Json<ValidationReport> {
    let request = request_details(&headers, addr, body);
    let auth_headers = extract_auth_headers(&headers);

    let shared = state.clone();
    let outcome = state
        .staller
        .stall(
            async move {
                auth::validate_login(
                    &request,
                    &auth_headers,
                    &shared.codec,
                    &shared.passwords,
                    &shared.config.pipeline,
                )
                .await
            },
            ValidationReport::is_passed,
        )
        .await;

    Json(unwrap_outcome(outcome, "login"))
}

/// Validate a signup response and store the credential pair
pub async fn signup(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> Json<ValidationReport> {
    let request = request_details(&headers, addr, body);
    let auth_headers = extract_auth_headers(&headers);

    let shared = state.clone();
    let outcome = state
        .staller
        .stall(
            async move {
                auth::validate_signup(
                    &request,
                    &auth_headers,
                    &shared.codec,
                    &shared.passwords,
                    &shared.config.pipeline,
                )
                .await
            },
            ValidationReport::is_passed,
        )
        .await;

    Json(unwrap_outcome(outcome, "signup"))
}

fn unwrap_outcome(
    outcome: crate::staller::StallOutcome<ValidationReport>,
    flow: &str,
) -> ValidationReport {
    if !outcome.completed {
        tracing::warn!(flow = flow, "Validation overran its stall budget");
    }
    outcome
        .result
        .unwrap_or_else(|| ValidationReport::failure(FailureStage::General, "validation overran its budget"))
}

fn request_details(headers: &HeaderMap, addr: SocketAddr, body: String) -> RequestDetails {
    RequestDetails {
        referrer: header_string(headers, header::REFERER.as_str()),
        host: header_string(headers, header::HOST.as_str()),
        remote_addr: Some(addr.ip().to_string()),
        body: (!body.is_empty()).then_some(body),
    }
}

fn extract_auth_headers(headers: &HeaderMap) -> AuthHeaders {
    AuthHeaders {
        username: header_string(headers, header_names::X_USERNAME),
        passtext: header_string(headers, header_names::X_HASHED_PASSTEXT),
        csrf_token: header_string(headers, header_names::X_CSRF_TOKEN),
        captcha: header_string(headers, header_names::X_CAPTCHA),
        hashcash: header_string(headers, header_names::X_HASHCASH),
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
