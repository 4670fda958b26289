//! Shared-secret authentication for the upload routes.

use super::error_response;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the client key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Expected key digest; `None` disables authentication.
#[derive(Clone, Default)]
pub(crate) struct ApiKeyGuard {
    expected: Option<Arc<[u8; 32]>>,
}

impl ApiKeyGuard {
    pub(crate) fn new(api_key: Option<&str>) -> Self {
        Self {
            expected: api_key.map(|key| Arc::new(digest(key))),
        }
    }

    /// Compare digests so neither the key length nor a matching prefix leaks through timing.
    fn accepts(&self, presented: Option<&str>) -> bool {
        let Some(expected) = &self.expected else {
            return true;
        };
        let presented = digest(presented.unwrap_or_default());
        bool::from(presented.as_slice().ct_eq(expected.as_slice()))
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Reject requests without the configured key before the body is read.
pub(crate) async fn require_api_key(
    State(guard): State<ApiKeyGuard>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if !guard.accepts(presented) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
        return error_response(StatusCode::UNAUTHORIZED, "Invalid or missing API key");
    }

    next.run(request).await
}
