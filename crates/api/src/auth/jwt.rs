//! JWT generation and validation.
//!
//! Tokens are HS256-signed and carry only the user id; the role is looked up
//! on every request so role changes and deactivation apply immediately.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use natours_core::types::DocId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's document id.
    pub sub: DocId,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Unique token identifier.
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Token lifetime in days (default: 90).
    pub expires_in_days: i64,
    /// Lifetime of the `jwt` cookie in days (default: 90).
    pub cookie_expires_in_days: i64,
}

const DEFAULT_EXPIRES_IN_DAYS: i64 = 90;
const DEFAULT_COOKIE_EXPIRES_IN_DAYS: i64 = 90;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                      | Required | Default |
    /// |------------------------------|----------|---------|
    /// | `JWT_SECRET`                 | **yes**  | --      |
    /// | `JWT_EXPIRES_IN_DAYS`        | no       | `90`    |
    /// | `JWT_COOKIE_EXPIRES_IN_DAYS` | no       | `90`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let expires_in_days: i64 = std::env::var("JWT_EXPIRES_IN_DAYS")
            .unwrap_or_else(|_| DEFAULT_EXPIRES_IN_DAYS.to_string())
            .parse()
            .expect("JWT_EXPIRES_IN_DAYS must be a valid i64");

        let cookie_expires_in_days: i64 = std::env::var("JWT_COOKIE_EXPIRES_IN_DAYS")
            .unwrap_or_else(|_| DEFAULT_COOKIE_EXPIRES_IN_DAYS.to_string())
            .parse()
            .expect("JWT_COOKIE_EXPIRES_IN_DAYS must be a valid i64");

        Self {
            secret,
            expires_in_days,
            cookie_expires_in_days,
        }
    }
}

/// Sign a token for `user_id`.
pub fn generate_token(
    user_id: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + config.expires_in_days * 24 * 60 * 60,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Validate and decode a token. Checks signature and expiry.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            expires_in_days: 90,
            cookie_expires_in_days: 90,
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = test_config();
        let token = generate_token("5c8a1d5b0190b214360dc057", &config)
            .expect("token generation should succeed");

        let claims = validate_token(&token, &config).expect("token validation should succeed");
        assert_eq!(claims.sub, "5c8a1d5b0190b214360dc057");
        assert_eq!(claims.exp - claims.iat, 90 * 24 * 60 * 60);
    }

    #[test]
    fn test_expired_token_fails() {
        let config = test_config();
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: "u1".to_string(),
            iat: now - 600,
            exp: now - 300, // well past the default leeway
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .expect("encoding should succeed");

        assert!(validate_token(&token, &config).is_err());
    }

    #[test]
    fn test_different_secrets_fail() {
        let config_a = test_config();
        let config_b = JwtConfig {
            secret: "secret-bravo".to_string(),
            ..test_config()
        };
        let token = generate_token("u1", &config_a).expect("token generation should succeed");
        assert!(validate_token(&token, &config_b).is_err());
    }
}
