//! JSON error bodies and their HTTP statuses.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use library_server::LibraryError;
use library_storage::StorageError;
use serde::Serialize;
use tracing::error;

/// Stable error codes. Each maps to one HTTP status in
/// [`ApiError::status`].
pub mod error_codes {
    /// 400: input failed validation or could not be parsed.
    pub const VALIDATION_ERROR: &str = "validation_error";
    /// 401: login with a wrong username or password.
    pub const INVALID_CREDENTIALS: &str = "invalid_credentials";
    /// 403: a write without an authenticated user.
    pub const FORBIDDEN: &str = "forbidden";
    /// 404
    pub const NOT_FOUND: &str = "not_found";
    /// 409: a unique field is already taken.
    pub const CONFLICT: &str = "conflict";
    /// 413
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    /// 502: a batch loader could not fetch its keys.
    pub const UPSTREAM_FETCH_FAILED: &str = "upstream_fetch_failed";
    /// 503
    pub const SERVICE_UNAVAILABLE: &str = "service_unavailable";
    /// 500
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::VALIDATION_ERROR, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        use error_codes::*;

        match self.code.as_str() {
            VALIDATION_ERROR => StatusCode::BAD_REQUEST,
            INVALID_CREDENTIALS => StatusCode::UNAUTHORIZED,
            FORBIDDEN => StatusCode::FORBIDDEN,
            NOT_FOUND => StatusCode::NOT_FOUND,
            CONFLICT => StatusCode::CONFLICT,
            PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            UPSTREAM_FETCH_FAILED => StatusCode::BAD_GATEWAY,
            SERVICE_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<LibraryError> for ApiError {
    fn from(err: LibraryError) -> Self {
        use error_codes::*;

        match &err {
            LibraryError::Validation { .. } => ApiError::validation_error(err.to_string()),
            LibraryError::InvalidCredentials => ApiError::new(INVALID_CREDENTIALS, err.to_string()),
            LibraryError::Forbidden { .. } => ApiError::new(FORBIDDEN, err.to_string()),
            LibraryError::NotFound { .. } => ApiError::new(NOT_FOUND, err.to_string()),
            LibraryError::Conflict { .. } => ApiError::new(CONFLICT, err.to_string()),
            LibraryError::Upstream(_) => {
                error!(error = %err, "batch fetch failed");
                ApiError::new(UPSTREAM_FETCH_FAILED, err.to_string())
            }
            LibraryError::Storage(StorageError::Unavailable { .. }) => {
                error!(error = %err, "storage unavailable");
                ApiError::new(SERVICE_UNAVAILABLE, "storage backend unavailable")
            }
            LibraryError::Storage(_) => {
                // Internal details stay in the log.
                error!(error = %err, "storage failure");
                ApiError::internal_error("internal storage error")
            }
        }
    }
}

/// `Json` extractor whose rejections use [`ApiError`]: 400 for bodies that
/// do not parse, 413 kept for bodies over the limit.
pub struct JsonBadRequest<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBadRequest<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBadRequest(value)),
            Err(rejection) => {
                let too_large = matches!(rejection, JsonRejection::BytesRejection(_))
                    && rejection.status() == StatusCode::PAYLOAD_TOO_LARGE;
                let message = rejection.body_text();
                if too_large {
                    Err(ApiError::new(error_codes::PAYLOAD_TOO_LARGE, message))
                } else {
                    Err(ApiError::validation_error(message))
                }
            }
        }
    }
}
