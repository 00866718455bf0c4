//! JWT Extractor
//!
//! Resolves the calling client from `Authorization: Bearer <jwt>`, or from a
//! `?token=` query parameter for WebSocket upgrades where browsers cannot
//! set headers.

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::error::AppError;

use crate::auth::{JwtError, JwtService};
use crate::core::ServerState;

/// Authenticated client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentClient {
    pub id: String,
}

fn query_token(parts: &Parts) -> Option<String> {
    parts.uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}

impl FromRequestParts<ServerState> for CurrentClient {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(client) = parts.extensions.get::<CurrentClient>() {
            return Ok(client.clone());
        }

        let header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = match header {
            Some(header) => JwtService::extract_from_header(header)
                .map(str::to_string)
                .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
            None => match query_token(parts) {
                Some(token) => token,
                None => {
                    tracing::debug!(target: "security", uri = %parts.uri, "Missing credentials");
                    return Err(AppError::not_authenticated());
                }
            },
        };

        match state.jwt_service().validate_token(&token) {
            Ok(claims) => {
                let client = CurrentClient { id: claims.sub };
                parts.extensions.insert(client.clone());
                Ok(client)
            }
            Err(e) => {
                tracing::warn!(target: "security", uri = %parts.uri, error = %e, "Token rejected");
                match e {
                    JwtError::ExpiredToken => Err(AppError::token_expired()),
                    _ => Err(AppError::invalid_token("Invalid token")),
                }
            }
        }
    }
}
