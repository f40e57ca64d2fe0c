//! Bearer token extraction
//!
//! Handlers that need a caller take a [`BearerToken`] argument; the token
//! itself is checked by the token authority, not here.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use cdss_common::api::ApiError;

/// Token from `Authorization: Bearer <token>`
#[derive(Debug, Clone, PartialEq)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::Authentication("missing Authorization header".to_string()))?;

        let malformed = || ApiError::Authentication("malformed Authorization header".to_string());
        let value = value.to_str().map_err(|_| malformed())?;
        let (scheme, token) = value.trim().split_once(' ').ok_or_else(malformed)?;
        let token = token.trim();

        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(malformed());
        }

        Ok(BearerToken(token.to_string()))
    }
}
