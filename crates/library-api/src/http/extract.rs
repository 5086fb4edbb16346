//! Per-request context extraction.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use library_server::RequestContext;
use library_storage::DataStore;
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::middleware::RequestId;

/// A fresh [`RequestContext`] for the current request.
///
/// The identity comes from an `Authorization: Bearer <token>` header. A
/// missing or unknown token yields an anonymous context rather than a
/// rejection; operations that need a user refuse on their own.
pub struct Ctx<S>(pub RequestContext<S>);

#[async_trait]
impl<S: DataStore> FromRequestParts<Arc<AppState<S>>> for Ctx<S> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let identity = state
            .library
            .authenticate(bearer_token(&parts.headers))
            .await?;

        Ok(Ctx(state.library.context(identity, request_id)))
    }
}

/// Token of a `Bearer` authorization header. The scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
