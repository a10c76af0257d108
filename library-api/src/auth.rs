//! Password-to-token exchange and bearer token checks.
//!
//! Passwords are stored base64-encoded and the stored value doubles as the
//! bearer token, so a token never expires and cannot be revoked short of
//! changing the password.

use crate::db;
use crate::errors::{Error, Result};
use crate::model::{NewUser, Token, User};
use crate::rest::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sqlx::SqlitePool;
use tracing::{debug, info};

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo";
pub const DEMO_FULLNAME: &str = "Demo User";
pub const DEMO_EMAIL: &str = "demo@demo.local";

const INCORRECT_CREDENTIALS: &str = "Incorrect username or password";

/// Reversible encoding the stored password goes through. Not a hash.
pub fn hash_password(password: &str) -> String {
    STANDARD.encode(password.as_bytes())
}

/// Exchanges a username and password for the user's bearer token.
pub async fn issue_token(pool: &SqlitePool, username: &str, password: &str) -> Result<Token> {
    let user = db::find_user_by_username(pool, username)
        .await?
        .ok_or_else(|| Error::BadRequest(INCORRECT_CREDENTIALS.to_string()))?;

    if hash_password(password) != user.hashed_password {
        debug!("Password mismatch for {:?}", username);
        return Err(Error::BadRequest(INCORRECT_CREDENTIALS.to_string()));
    }

    Ok(Token::bearer(user.hashed_password))
}

/// Resolves a bearer token to its user. An unknown token is reported as not found.
pub async fn authenticate(pool: &SqlitePool, token: &str) -> Result<User> {
    db::find_user_by_hashed_password(pool, token)
        .await?
        .ok_or_else(Error::object_does_not_exist)
}

/// Creates the demo account unless a user with its name already exists.
/// Returns whether a user was created.
pub async fn bootstrap_demo_user(pool: &SqlitePool) -> Result<bool> {
    if db::find_user_by_username(pool, DEMO_USERNAME).await?.is_some() {
        return Ok(false);
    }

    let user = NewUser {
        username: DEMO_USERNAME.to_string(),
        fullname: DEMO_FULLNAME.to_string(),
        email: DEMO_EMAIL.to_string(),
        hashed_password: hash_password(DEMO_PASSWORD),
    };
    db::insert_user(pool, &user).await?;
    info!("Demo user {:?} created", DEMO_USERNAME);
    Ok(true)
}

/// Token from an `Authorization: Bearer <token>` header. The scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

/// Handler argument that resolves the caller from the bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(Error::Unauthorized)?;
        let user = authenticate(&state.pool, token).await?;
        Ok(CurrentUser(user))
    }
}
