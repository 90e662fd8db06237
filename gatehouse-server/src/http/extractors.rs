//! Custom Axum extractors

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use gatehouse_core::{Connector, Identity};

use super::error::ApiError;
use crate::state::AppState;

/// Session token sent with the request, if any.
///
/// Read from `Authorization: Bearer <token>`, a bare `Authorization: <token>`,
/// or a `Token: <token>` header, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(token_from_headers(&parts.headers)))
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = |name: &'static str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let token = match header("authorization") {
        Some(value) => value
            .strip_prefix("Bearer")
            .filter(|rest| rest.is_empty() || rest.starts_with(' '))
            .map(str::trim)
            .unwrap_or(value),
        None => header("token")?,
    };

    (!token.is_empty()).then(|| token.to_string())
}

/// Identity behind a valid session token; rejects with 401 otherwise
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<K: Connector> FromRequestParts<AppState<K>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<K>,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(ApiError::Unauthorized {
            message: "missing or invalid token",
        })?;

        let identity = state.sessions().validate(&token)?;
        Ok(Self(identity))
    }
}
