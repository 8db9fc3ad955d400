//! Bearer-token validation.
//!
//! Token issuance, password hashing, and email verification belong to the
//! external auth service; this module only validates HS256 bearer tokens
//! and surfaces the caller identity to handlers via the [`CurrentUser`]
//! extractor.

use super::{ApiError, AppState};
use crate::{Error, Result};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user identifier).
    pub sub: String,
    /// Caller email, when the issuer includes it.
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (Unix timestamp).
    pub exp: usize,
    /// Issued at time (Unix timestamp).
    #[serde(default)]
    pub iat: usize,
}

impl Claims {
    /// The caller's email, falling back to the subject.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.sub)
    }
}

/// Validates HS256 bearer tokens against the configured secret.
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    /// Creates a validator from auth configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when no JWT secret is configured.
    pub fn new(config: &crate::config::AuthConfig) -> Result<Self> {
        let secret = config.jwt_secret.as_deref().ok_or_else(|| {
            Error::InvalidInput("ENGRAM_JWT_SECRET must be set to serve the API".to_string())
        })?;

        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &config.audience {
            validation.set_audience(&[audience]);
        }

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Validates a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] when the signature, expiry, or
    /// configured claims do not check out.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| Error::Unauthorized(format!("invalid bearer token: {e}")))
    }
}

/// The authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Stable subject identifier.
    pub subject: String,
    /// Email used for metadata tagging.
    pub email: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ApiError(Error::Unauthorized(
                    "missing Authorization header".to_string(),
                ))
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError(Error::Unauthorized(
                "Authorization header is not a bearer token".to_string(),
            ))
        })?;

        let claims = state.auth.validate(token)?;
        Ok(Self {
            email: claims.email().to_string(),
            subject: claims.sub,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn validator() -> TokenValidator {
        TokenValidator::new(&AuthConfig {
            jwt_secret: Some(SECRET.to_string()),
            issuer: None,
            audience: None,
        })
        .unwrap()
    }

    fn token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp_offset: i64) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            exp: usize::try_from(now + exp_offset).unwrap_or(0),
            iat: usize::try_from(now).unwrap_or(0),
        }
    }

    #[test]
    fn test_valid_token_round_trips() {
        let validated = validator().validate(&token(&claims(3600), SECRET)).unwrap();
        assert_eq!(validated.email(), "user@example.com");
        assert_eq!(validated.sub, "user-1");
    }

    #[test]
    fn test_expired_token_rejected() {
        let result = validator().validate(&token(&claims(-3600), SECRET));
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let forged = token(&claims(3600), "another-secret-another-secret!!!");
        assert!(matches!(
            validator().validate(&forged),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_email_falls_back_to_subject() {
        let mut c = claims(3600);
        c.email = None;
        assert_eq!(c.email(), "user-1");
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let result = TokenValidator::new(&AuthConfig::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
