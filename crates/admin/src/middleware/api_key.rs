//! Bearer key extractor for the ledger endpoints.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;

use crate::error::AppError;
use crate::state::AppState;

/// Extractor that requires `Authorization: Bearer <key>` matching the
/// configured ledger API key.
///
/// Rejects with 403 when no key is configured, and 401 when the header is
/// missing or wrong.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(_: RequireLedgerKey) -> impl IntoResponse {
///     "ok"
/// }
/// ```
#[derive(Debug)]
pub struct RequireLedgerKey;

impl FromRequestParts<AppState> for RequireLedgerKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .api_key()
            .ok_or_else(|| AppError::Forbidden("ledger API is disabled".to_string()))?;

        let provided = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::Unauthorized("missing bearer key".to_string()))?;

        if !constant_time_eq(provided.as_bytes(), expected.expose_secret().as_bytes()) {
            tracing::warn!(path = %parts.uri.path(), "Rejected ledger API key");
            return Err(AppError::Unauthorized("invalid key".to_string()));
        }

        Ok(Self)
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
