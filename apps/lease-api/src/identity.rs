//! Caller identity taken from the `X-User-Id` header
//!
//! The id is opaque and not authenticated here; it only scopes documents
//! and conversations.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const CALLER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CallerId(value.to_string()))
            .ok_or(ApiError::MissingCaller)
    }
}
