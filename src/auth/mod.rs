//! Passphrase and PSK authentication.
//!
//! Implements constant-time comparison to mitigate timing attacks.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{codes, ErrorDetails, ErrorResponse};

/// Header name for the hub API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// The single shared admin passphrase.
///
/// A process serves one editing session and admin mode belongs to that
/// session, not to a client. Once anyone logs in, every connected client
/// edits as admin until someone logs out. Run one process per editor when
/// that is not wanted.
#[derive(Debug, Clone)]
pub struct AdminGate {
    passphrase: Option<String>,
}

impl AdminGate {
    pub fn new(passphrase: Option<String>) -> Self {
        Self { passphrase }
    }

    /// Check a login attempt. Always false when no passphrase is configured.
    pub fn verify(&self, attempt: &str) -> bool {
        match &self.passphrase {
            Some(expected) => constant_time_compare(attempt, expected),
            None => false,
        }
    }
}

/// PSK authentication layer for hub writes, taking the expected key as a parameter.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    // No key configured: the hub accepts every write (dev mode)
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    match provided {
        Some(provided_key) => {
            if constant_time_compare(&provided_key, &expected) {
                next.run(request).await
            } else {
                unauthorized_response("Invalid API key")
            }
        }
        None => {
            let bearer = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string());

            match bearer {
                Some(bearer_key) if constant_time_compare(&bearer_key, &expected) => {
                    next.run(request).await
                }
                _ => unauthorized_response("Missing or invalid API key"),
            }
        }
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
        },
        revision_id: 0,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
