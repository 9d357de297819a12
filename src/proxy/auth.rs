//! Service token check for inbound requests
//!
//! The only accepted form is `Authorization: Bearer <token>`, compared byte
//! for byte. No trimming, no case folding of the scheme.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("missing Authorization header")]
    Missing,
    #[error("service token mismatch")]
    Mismatch,
}

pub struct AuthGate {
    expected: Vec<u8>,
}

impl AuthGate {
    pub fn new(service_token: &str) -> Self {
        Self {
            expected: format!("Bearer {service_token}").into_bytes(),
        }
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthFailure> {
        let presented = headers.get(AUTHORIZATION).ok_or(AuthFailure::Missing)?;
        if bool::from(presented.as_bytes().ct_eq(&self.expected)) {
            Ok(())
        } else {
            Err(AuthFailure::Mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(AUTHORIZATION, HeaderValue::from_static(v));
        }
        headers
    }

    #[test]
    fn test_exact_match_accepted() {
        let gate = AuthGate::new("tok");
        assert_eq!(gate.check(&headers(Some("Bearer tok"))), Ok(()));
    }

    #[test]
    fn test_missing_header() {
        let gate = AuthGate::new("tok");
        assert_eq!(gate.check(&headers(None)), Err(AuthFailure::Missing));
    }

    #[test]
    fn test_near_misses_rejected() {
        let gate = AuthGate::new("tok");
        for value in [
            "bearer tok",
            "Bearer  tok",
            "Bearer tok ",
            "Bearer TOK",
            "Bearer to",
            "Bearer tokk",
            "Basic tok",
            "tok",
            "",
        ] {
            assert_eq!(
                gate.check(&headers(Some(value))),
                Err(AuthFailure::Mismatch),
                "{value:?} should be rejected"
            );
        }
    }
}
