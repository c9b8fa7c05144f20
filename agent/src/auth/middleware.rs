//! Bearer token extraction.
//!
//! The control API listens on loopback for the application's own data
//! layer. When `AUTH_SECRET` is configured every request must present it
//! as a bearer token; otherwise requests are accepted anonymously.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// Caller that passed the bearer check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    /// No secret is configured.
    Anonymous,
    /// Presented the configured secret.
    Token,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.config.auth_secret.as_deref() else {
            return Ok(AuthUser::Anonymous);
        };

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "));

        match token {
            Some(token) if token == secret => Ok(AuthUser::Token),
            Some(_) => {
                tracing::warn!("Rejected control request with wrong bearer token");
                Err(AppError::Unauthorized)
            }
            None => Err(AppError::Unauthorized),
        }
    }
}
