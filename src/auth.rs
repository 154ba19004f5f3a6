//! Bearer-credential authentication.
//!
//! Token issuance (registration, login, refresh) lives in the account
//! service; this server only *consumes* credentials. The client presents an
//! `access_token` cookie containing an HS256 JWT whose `sub` claim is the
//! user's email; the user row is then looked up to obtain the numeric id
//! the match tables reference.

use actix_web::HttpRequest;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;

/// Name of the session cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Claims carried by an access token.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// The user's email.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// An authenticated user, as far as this server cares.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub userid: i64,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Authentication failures. All of them render as the same 401 / policy
/// close to the client; the variants exist for server-side logging.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing access token cookie")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("user not found")]
    UnknownUser,
    #[error("database error")]
    Db(#[from] sqlx::Error),
}

/// Decodes and validates an access token, returning its claims.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

/// Authenticates an HTTP or WebSocket-upgrade request from its
/// `access_token` cookie and resolves the user row.
pub async fn current_user(
    req: &HttpRequest,
    pool: &SqlitePool,
    secret: &str,
) -> Result<User, AuthError> {
    let cookie = req
        .cookie(ACCESS_TOKEN_COOKIE)
        .ok_or(AuthError::MissingToken)?;
    let claims = decode_token(cookie.value(), secret)?;

    sqlx::query_as::<_, User>(
        "SELECT userid, email, username, created_at FROM users WHERE email = ?",
    )
    .bind(&claims.sub)
    .fetch_optional(pool)
    .await?
    .ok_or(AuthError::UnknownUser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        iat: i64,
        exp: i64,
    }

    fn mint(sub: &str, secret: &str, ttl: Duration) -> String {
        let now = Utc::now();
        let claims = TestClaims {
            sub: sub.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_round_trips() {
        let token = mint("player@example.com", "s3cret", Duration::minutes(60));
        let claims = decode_token(&token, "s3cret").unwrap();
        assert_eq!(claims.sub, "player@example.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint("player@example.com", "s3cret", Duration::minutes(60));
        assert!(matches!(
            decode_token(&token, "other"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint("player@example.com", "s3cret", Duration::minutes(-10));
        assert!(matches!(
            decode_token(&token, "s3cret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            decode_token("not-a-jwt", "s3cret"),
            Err(AuthError::InvalidToken)
        ));
    }
}
